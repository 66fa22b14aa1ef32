use thiserror::Error;

/// Failures of a call to an external enrichment service
///
/// The sub-kinds are kept apart so callers can word messages differently;
/// every kind counts the same toward the batch circuit breaker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalApiError {
    #[error("A network error occurred: {0}")]
    Network(String),

    #[error("The request for {input} returned a wrong HTTP answer: {detail}")]
    Protocol { input: String, detail: String },

    #[error("The request for {input} ran into a time out: {detail}")]
    Timeout { input: String, detail: String },

    #[error("While trying to enrich {input}, an error occurred: {detail}")]
    Request { input: String, detail: String },

    #[error("No API key was supplied for {service}")]
    MissingApiKey { service: String },
}

impl ExternalApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Protocol { .. } => "protocol",
            Self::Timeout { .. } => "timeout",
            Self::Request { .. } => "request",
            Self::MissingApiKey { .. } => "missing_api_key",
        }
    }
}
