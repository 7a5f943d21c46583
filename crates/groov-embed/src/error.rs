use thiserror::Error;

/// Message shown to the end user whenever an embed fails to resolve.
///
/// The underlying cause is only ever logged.
pub const FAILURE_MESSAGE: &str = "Failed to load Groov Widget. Please try again later.";

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("{method} {url} returned {status}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response did not contain campaign.groovEmbedUrl")]
    MissingEmbedUrl,
}

impl EmbedError {
    /// Response body attached to the failure, when the server sent one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            EmbedError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
