//! Transport primitives for token exchanges.
//!
//! [`TokenHttpClient`] is the exchanger's only dependency on an HTTP stack. Each exchange asks
//! the client for a short-lived [`AsyncHttpClient`] handle bound to a [`ResponseMetadataSlot`]
//! and to the TLS verification mode of the current request, so failures can be reported with
//! the HTTP status that produced them.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::{_prelude::*, error::ConfigError};

/// Abstraction over HTTP transports capable of executing token exchanges while publishing
/// response metadata.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back many exchanger
/// instances, and the request futures of their handles must be `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records outcomes in `slot`.
	///
	/// When `skip_tls_verify` is true the handle must accept invalid certificates. Call
	/// [`ResponseMetadataSlot::take`] before submitting a request and
	/// [`ResponseMetadataSlot::store`] once the response status is known.
	fn with_metadata(
		&self,
		slot: ResponseMetadataSlot,
		skip_tls_verify: bool,
	) -> Result<Self::Handle, ConfigError>;
}

/// Metadata captured from the most recent HTTP response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest transport holding one client per TLS verification mode, each built on first use.
///
/// Token endpoints answer directly, so the built clients do not follow redirects; apply the
/// same policy to any client passed to [`ReqwestHttpClient::with_client`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient {
	verified: Arc<Mutex<Option<ReqwestClient>>>,
	insecure: Arc<Mutex<Option<ReqwestClient>>>,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`] used for verified TLS.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { verified: Arc::new(Mutex::new(Some(client))), insecure: Default::default() }
	}

	fn client_for(&self, skip_tls_verify: bool) -> Result<ReqwestClient, ConfigError> {
		let slot = if skip_tls_verify { &self.insecure } else { &self.verified };
		let mut cached = slot.lock();

		if let Some(client) = cached.as_ref() {
			return Ok(client.clone());
		}

		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(skip_tls_verify)
			.redirect(Policy::none())
			.build()?;

		*cached = Some(client.clone());

		Ok(client)
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(
		&self,
		slot: ResponseMetadataSlot,
		skip_tls_verify: bool,
	) -> Result<Self::Handle, ConfigError> {
		Ok(InstrumentedHandle::new(self.client_for(skip_tls_verify)?, slot))
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that records response status codes.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			inner.slot.take();

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			inner.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}
