use thiserror::Error;

use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("fixture `{origin}` could not be loaded: {message}")]
    Fixture { origin: String, message: String },
    #[error("fixture `{origin}` is inconsistent: {source}")]
    FixtureInvariant {
        origin: String,
        #[source]
        source: DomainError,
    },
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn fixture(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fixture {
            origin: origin.into(),
            message: message.into(),
        }
    }
}
