//! Broker-level error types shared by the exchanger, the cache layer, and the orchestrator.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Cache backend failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token exchange failed after exhausting its retry budget, or yielded an unusable token.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// Transport failure raised by a downstream call.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl From<crate::auth::ScopeValidationError> for Error {
	fn from(e: crate::auth::ScopeValidationError) -> Self {
		ConfigError::from(e).into()
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for Error {
	fn from(e: ReqwestError) -> Self {
		TransportError::from(e).into()
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required constructor argument was empty.
	#[error("Missing required argument: {field}.")]
	MissingArgument {
		/// Name of the empty argument.
		field: &'static str,
	},
	/// Token endpoint URL cannot be parsed.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenUrl {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Requested scopes are malformed.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token exchange could not produce a usable access token.
#[derive(Debug, ThisError)]
#[error("Authentication failed: {reason}.")]
pub struct AuthenticationError {
	/// Human-readable cause.
	pub reason: String,
	/// Last exchange failure, when the exchanger produced one.
	#[source]
	pub source: Option<ExchangeError>,
}
impl AuthenticationError {
	/// Wraps the last exchange failure observed before the retry budget ran out.
	pub fn exhausted(last: ExchangeError) -> Self {
		Self { reason: last.to_string(), source: Some(last) }
	}

	/// The token endpoint answered successfully but the access token was empty.
	pub fn empty_token() -> Self {
		Self { reason: "Invalid access token".into(), source: None }
	}
}

/// Failure of a single client-credentials exchange attempt.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Token endpoint answered with an OAuth error body.
	#[error("Token endpoint rejected the request: {error}")]
	Rejected {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with a body that is not a valid token response.
	#[error("Token endpoint returned malformed JSON")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint or HTTP client failed in a way the other variants do not cover.
	#[error("Token endpoint returned an unexpected response: {message}")]
	Unexpected {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network or IO failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The exchange request could not be prepared.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl ExchangeError {
	/// HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::MalformedResponse { status, .. }
			| Self::Unexpected { status, .. } => *status,
			Self::Transport(_) | Self::Config(_) => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred during the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authentication_error_keeps_last_exchange_failure_as_source() {
		let last = ExchangeError::Rejected {
			error: "invalid_client".into(),
			description: None,
			status: Some(401),
		};
		let err: Error = AuthenticationError::exhausted(last).into();

		assert!(matches!(err, Error::Authentication(_)));
		assert_eq!(
			err.to_string(),
			"Authentication failed: Token endpoint rejected the request: invalid_client."
		);

		let source = StdError::source(&err)
			.expect("Authentication errors should expose the exchange error.");

		assert!(source.to_string().contains("invalid_client"));
	}

	#[test]
	fn empty_token_has_no_source() {
		let err = AuthenticationError::empty_token();

		assert_eq!(err.to_string(), "Authentication failed: Invalid access token.");
		assert!(StdError::source(&err).is_none());
	}

	#[test]
	fn exchange_error_reports_status() {
		let err = ExchangeError::Unexpected { message: "boom".into(), status: Some(502) };
		let transport = ExchangeError::from(TransportError::Io(std::io::Error::other("reset")));

		assert_eq!(err.status(), Some(502));
		assert_eq!(transport.status(), None);
	}

	#[test]
	fn missing_argument_names_the_field() {
		let err = ConfigError::MissingArgument { field: "client_id" };

		assert_eq!(err.to_string(), "Missing required argument: client_id.");
	}
}
