//! Broker configuration: client identity, token endpoint, retry budget, and cache namespace.
//!
//! [`BrokerConfig`] derives serde traits so it can be embedded in an application's own
//! configuration file. Values built through [`BrokerConfig::new`] are validated up front;
//! deserialized values are validated when handed to a broker constructor.

// self
use crate::{_prelude::*, auth::Secret, cache::TokenClass, error::ConfigError};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Settings shared by every token request a broker performs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: Secret,
	/// Token endpoint of the authority, e.g. `https://auth.example.com/oauth2/token`.
	pub token_url: Url,
	/// How the client authenticates against the token endpoint.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
	/// Skips TLS certificate verification for the token endpoint. Keep `false` in production.
	#[serde(default)]
	pub skip_tls_verify: bool,
	/// Default retry budget for token exchanges and unauthorized downstream responses.
	#[serde(default = "BrokerConfig::default_max_retry")]
	pub max_retry: u32,
	/// Root segment of every cache key.
	#[serde(default = "BrokerConfig::default_cache_root")]
	pub cache_root: String,
	/// Token population label inserted after the cache root.
	#[serde(default)]
	pub token_class: TokenClass,
}
impl BrokerConfig {
	/// Default retry budget.
	pub const DEFAULT_MAX_RETRY: u32 = 5;
	/// Default cache key root.
	pub const DEFAULT_CACHE_ROOT: &'static str = "broker";

	/// Creates a configuration with default options, rejecting empty arguments.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		token_url: impl AsRef<str>,
	) -> Result<Self, ConfigError> {
		let client_id = client_id.into();
		let client_secret = Secret::new(client_secret);
		let token_url = token_url.as_ref();

		ensure_present("client_id", &client_id)?;
		ensure_present("client_secret", client_secret.expose())?;
		ensure_present("token_url", token_url)?;

		let token_url =
			Url::parse(token_url).map_err(|source| ConfigError::InvalidTokenUrl { source })?;

		Ok(Self {
			client_id,
			client_secret,
			token_url,
			client_auth_method: ClientAuthMethod::default(),
			skip_tls_verify: false,
			max_retry: Self::DEFAULT_MAX_RETRY,
			cache_root: Self::DEFAULT_CACHE_ROOT.into(),
			token_class: TokenClass::default(),
		})
	}

	/// Re-checks the constructor contract, e.g. for deserialized values.
	pub fn validate(&self) -> Result<(), ConfigError> {
		ensure_present("client_id", &self.client_id)?;
		ensure_present("client_secret", self.client_secret.expose())?;

		Ok(())
	}

	/// Overrides the client authentication method.
	pub fn with_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Overrides the TLS verification skip flag.
	pub fn with_skip_tls_verify(mut self, skip: bool) -> Self {
		self.skip_tls_verify = skip;

		self
	}

	/// Overrides the default retry budget.
	pub fn with_max_retry(mut self, max_retry: u32) -> Self {
		self.max_retry = max_retry;

		self
	}

	/// Overrides the cache key root.
	pub fn with_cache_root(mut self, root: impl Into<String>) -> Self {
		self.cache_root = root.into();

		self
	}

	/// Overrides the token class label.
	pub fn with_token_class(mut self, class: TokenClass) -> Self {
		self.token_class = class;

		self
	}

	fn default_max_retry() -> u32 {
		Self::DEFAULT_MAX_RETRY
	}

	fn default_cache_root() -> String {
		Self::DEFAULT_CACHE_ROOT.into()
	}
}

fn ensure_present(field: &'static str, value: &str) -> Result<(), ConfigError> {
	if value.is_empty() {
		return Err(ConfigError::MissingArgument { field });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const TOKEN_URL: &str = "https://auth.example.com/oauth2/token";

	#[test]
	fn new_applies_defaults() {
		let config =
			BrokerConfig::new("client", "secret", TOKEN_URL).expect("Config should be valid.");

		assert_eq!(config.max_retry, 5);
		assert_eq!(config.cache_root, "broker");
		assert_eq!(config.token_class, TokenClass::Resources);
		assert_eq!(config.client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert!(!config.skip_tls_verify);
		assert_eq!(config.token_url.as_str(), TOKEN_URL);
	}

	#[test]
	fn new_rejects_empty_arguments() {
		let cases = [("", "secret", TOKEN_URL), ("client", "", TOKEN_URL), ("client", "secret", "")];
		let fields = cases
			.into_iter()
			.map(|(id, secret, url)| match BrokerConfig::new(id, secret, url) {
				Err(ConfigError::MissingArgument { field }) => field,
				other => panic!("Expected a missing argument error, got {other:?}."),
			})
			.collect::<Vec<_>>();

		assert_eq!(fields, vec!["client_id", "client_secret", "token_url"]);
	}

	#[test]
	fn new_rejects_unparseable_urls() {
		let err = BrokerConfig::new("client", "secret", "not a url")
			.expect_err("Relative garbage should not parse as a token URL.");

		assert!(matches!(err, ConfigError::InvalidTokenUrl { .. }));
	}

	#[test]
	fn builders_override_fields() {
		let config = BrokerConfig::new("client", "secret", TOKEN_URL)
			.expect("Config should be valid.")
			.with_max_retry(0)
			.with_cache_root("svc")
			.with_token_class(TokenClass::Tokens)
			.with_skip_tls_verify(true)
			.with_client_auth_method(ClientAuthMethod::ClientSecretPost);

		assert_eq!(config.max_retry, 0);
		assert_eq!(config.cache_root, "svc");
		assert_eq!(config.token_class, TokenClass::Tokens);
		assert!(config.skip_tls_verify);
		assert_eq!(config.client_auth_method, ClientAuthMethod::ClientSecretPost);
	}

	#[test]
	fn deserialize_fills_defaults_and_validates() {
		let config: BrokerConfig = serde_json::from_str(
			r#"{"client_id":"client","client_secret":"secret","token_url":"https://auth.example.com/token"}"#,
		)
		.expect("Minimal config should deserialize.");

		assert_eq!(config.max_retry, BrokerConfig::DEFAULT_MAX_RETRY);
		assert_eq!(config.cache_root, BrokerConfig::DEFAULT_CACHE_ROOT);
		config.validate().expect("Deserialized config should validate.");

		let config: BrokerConfig = serde_json::from_str(
			r#"{"client_id":"","client_secret":"secret","token_url":"https://auth.example.com/token","token_class":"tokens","max_retry":2}"#,
		)
		.expect("Config with empty id should still deserialize.");

		assert_eq!(config.token_class, TokenClass::Tokens);
		assert_eq!(config.max_retry, 2);
		assert!(matches!(config.validate(), Err(ConfigError::MissingArgument { field: "client_id" })));
	}
}
