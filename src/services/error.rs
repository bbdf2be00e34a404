use thiserror::Error;

/// Upstream error bodies are cut to this many characters.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure talking to an AI or email provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} error ({status}): {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request timed out")]
    Timeout { provider: &'static str },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an unreadable response: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ProviderError {
    pub fn status(provider: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        ProviderError::Status {
            provider,
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }

    pub fn transport(provider: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ProviderError::Timeout { provider }
        } else {
            ProviderError::Transport { provider, source }
        }
    }

    /// HTTP status reported by the provider, if the request got that far.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }
}

/// The model reply could not be turned into JSON at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Could not find JSON in response: no JSON boundaries found")]
    NoJsonBoundaries,

    #[error("Malformed JSON in response: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

pub fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
