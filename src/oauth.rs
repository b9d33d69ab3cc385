//! [`TokenExchanger`] backed by the `oauth2` crate's client-credentials request builder.

pub use oauth2;

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	config::ClientAuthMethod,
	error::{ConfigError, ExchangeError, TransportError},
	exchange::{ExchangeFuture, ExchangeRequest, IssuedToken, TokenExchanger},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

/// Exchanger specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestExchanger = OAuth2Exchanger<ReqwestHttpClient>;

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Client-credentials exchanger that drives [`BasicClient`] over a [`TokenHttpClient`].
///
/// A fresh [`BasicClient`] is assembled for every exchange from the request's credentials, so a
/// single exchanger can serve brokers configured for different clients.
#[derive(Debug)]
pub struct OAuth2Exchanger<C>
where
	C: TokenHttpClient,
{
	http_client: Arc<C>,
}
impl<C> OAuth2Exchanger<C>
where
	C: TokenHttpClient,
{
	/// Wraps an HTTP transport.
	pub fn new(http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into() }
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestExchanger {
	fn default() -> Self {
		Self::new(ReqwestHttpClient::default())
	}
}
impl<C> Clone for OAuth2Exchanger<C>
where
	C: TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { http_client: Arc::clone(&self.http_client) }
	}
}
impl<C> TokenExchanger for OAuth2Exchanger<C>
where
	C: TokenHttpClient,
{
	fn exchange<'a>(&'a self, request: &'a ExchangeRequest<'a>) -> ExchangeFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let oauth_client = build_client(request)?;
			let handle = self.http_client.with_metadata(meta.clone(), request.skip_tls_verify)?;
			let mut token_request = oauth_client.exchange_client_credentials();

			for scope in request.scopes {
				token_request = token_request.add_scope(Scope::new(scope.to_owned()));
			}

			let response = token_request
				.request_async(&handle)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;

			Ok(map_token_response(&response, OffsetDateTime::now_utc()))
		})
	}
}

fn build_client(request: &ExchangeRequest<'_>) -> Result<ConfiguredBasicClient, ConfigError> {
	let token_url = TokenUrl::new(request.token_url.to_string())
		.map_err(|source| ConfigError::InvalidTokenUrl { source })?;
	let oauth_client = BasicClient::new(ClientId::new(request.client_id.to_owned()))
		.set_client_secret(ClientSecret::new(request.client_secret.expose().to_owned()))
		.set_token_uri(token_url);

	Ok(match request.auth_method {
		ClientAuthMethod::ClientSecretBasic => oauth_client,
		ClientAuthMethod::ClientSecretPost => oauth_client.set_auth_type(AuthType::RequestBody),
	})
}

/// Absent or zero `expires_in` yields a token without expiry, as does a lifetime too large to
/// represent.
fn map_token_response(response: &BasicTokenResponse, now: OffsetDateTime) -> IssuedToken {
	let token = IssuedToken::new(response.access_token().secret().to_owned());

	match response.expires_in().and_then(|lifetime| expiry_after(now, lifetime)) {
		Some(expires_at) => token.expiring_at(expires_at),
		None => token,
	}
}

fn expiry_after(now: OffsetDateTime, lifetime: StdDuration) -> Option<OffsetDateTime> {
	if lifetime.is_zero() {
		return None;
	}

	now.checked_add(Duration::try_from(lifetime).ok()?)
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> ExchangeError
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, status),
		RequestTokenError::Request(err) => map_transport_error(err, status),
		RequestTokenError::Parse(source, _body) =>
			ExchangeError::MalformedResponse { source, status },
		RequestTokenError::Other(message) => ExchangeError::Unexpected { message, status },
	}
}

fn map_server_response(response: BasicErrorResponse, status: Option<u16>) -> ExchangeError {
	ExchangeError::Rejected {
		error: response.error().as_ref().to_owned(),
		description: response.error_description().cloned(),
		status,
	}
}

fn map_transport_error<E>(err: HttpClientError<E>, status: Option<u16>) -> ExchangeError
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => ExchangeError::Unexpected {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status,
		},
		_ => ExchangeError::Unexpected {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{
		AccessToken, EmptyExtraTokenFields, StandardErrorResponse, StandardTokenResponse,
		basic::{BasicErrorResponseType, BasicTokenType},
	};
	use time::macros;
	// self
	use super::*;
	use crate::auth::{ScopeList, Secret};

	fn token_response(expires_in: Option<u64>) -> BasicTokenResponse {
		let mut response = StandardTokenResponse::new(
			AccessToken::new("issued".into()),
			BasicTokenType::Bearer,
			EmptyExtraTokenFields {},
		);

		response.set_expires_in(expires_in.map(StdDuration::from_secs).as_ref());

		response
	}

	#[test]
	fn token_response_expiry_follows_expires_in() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let token = map_token_response(&token_response(Some(600)), now);

		assert_eq!(token.access_token.expose(), "issued");
		assert_eq!(token.expires_at, Some(macros::datetime!(2025-11-10 12:10 UTC)));
		assert_eq!(map_token_response(&token_response(None), now).expires_at, None);
		assert_eq!(map_token_response(&token_response(Some(0)), now).expires_at, None);
		assert_eq!(map_token_response(&token_response(Some(u64::MAX)), now).expires_at, None);
	}

	#[test]
	fn server_error_keeps_code_description_and_status() {
		let response = StandardErrorResponse::new(
			BasicErrorResponseType::InvalidClient,
			Some("client authentication failed".into()),
			None,
		);
		let err = map_request_error::<std::io::Error>(
			Some(ResponseMetadata { status: Some(401) }),
			RequestTokenError::ServerResponse(response),
		);

		match err {
			ExchangeError::Rejected { error, description, status } => {
				assert_eq!(error, "invalid_client");
				assert_eq!(description.as_deref(), Some("client authentication failed"));
				assert_eq!(status, Some(401));
			},
			other => panic!("Expected a rejected exchange, got {other:?}."),
		}
	}

	#[test]
	fn transport_errors_are_classified() {
		let io = map_request_error::<std::io::Error>(
			None,
			RequestTokenError::Request(HttpClientError::Io(std::io::Error::other("reset"))),
		);
		let other = map_request_error::<std::io::Error>(
			Some(ResponseMetadata { status: Some(502) }),
			RequestTokenError::Other("unexpected content type".into()),
		);
		let network = map_request_error::<std::io::Error>(
			None,
			RequestTokenError::Request(HttpClientError::Reqwest(Box::new(std::io::Error::other(
				"connection refused",
			)))),
		);

		assert!(matches!(io, ExchangeError::Transport(TransportError::Io(_))));
		assert!(matches!(other, ExchangeError::Unexpected { status: Some(502), .. }));
		assert!(matches!(network, ExchangeError::Transport(TransportError::Network { .. })));
	}

	#[test]
	fn builds_client_for_both_auth_methods() {
		let secret = Secret::new("secret");
		let url = Url::parse("https://auth.example.com/oauth2/token")
			.expect("Token URL fixture should parse.");
		let scopes = ScopeList::default();

		for auth_method in [ClientAuthMethod::ClientSecretBasic, ClientAuthMethod::ClientSecretPost]
		{
			let request = ExchangeRequest {
				client_id: "client",
				client_secret: &secret,
				token_url: &url,
				auth_method,
				skip_tls_verify: false,
				scopes: &scopes,
			};

			build_client(&request).expect("Client should build from a parsed URL.");
		}
	}
}
