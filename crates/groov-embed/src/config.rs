use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Environment variable overriding `service.uri`.
pub const ENV_URI: &str = "GROOV_URI";
/// Environment variable overriding `service.token_uri`.
pub const ENV_TOKEN_URI: &str = "GROOV_URI2";
/// Environment variable overriding `service.auth_key`.
pub const ENV_AUTH_KEY: &str = "GROOV_AUTH_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct GroovConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub embed: EmbedOptions,
}

/// Fixed Groov service endpoints, injected into every session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Lookup endpoint queried with the router session id.
    pub uri: String,
    /// Base of the `{token_uri}/{external_user_id}/token` endpoint.
    pub token_uri: String,
    /// Header name carrying the session id or the caller credential.
    pub auth_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedOptions {
    /// Treat a response without `campaign.groovEmbedUrl` as a failure.
    #[serde(default)]
    pub require_url: bool,
}

impl GroovConfig {
    pub fn new(service: ServiceConfig) -> Self {
        Self {
            service,
            http: HttpConfig::default(),
            embed: EmbedOptions::default(),
        }
    }

    /// Load from a TOML file, apply environment overrides and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `GROOV_*` overrides using the given lookup (usually the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(ENV_URI) {
            self.service.uri = uri;
        }
        if let Some(token_uri) = lookup(ENV_TOKEN_URI) {
            self.service.token_uri = token_uri;
        }
        if let Some(auth_key) = lookup(ENV_AUTH_KEY) {
            self.service.auth_key = auth_key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("service.uri", &self.service.uri),
            ("service.token_uri", &self.service.token_uri),
            ("service.auth_key", &self.service.auth_key),
        ];
        for (name, value) in checks {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        if self.http.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn build_transport(&self) -> Result<Arc<dyn HttpTransport>, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.http.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = &self.http.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Arc::new(ReqwestTransport::with_client(client)))
    }
}
