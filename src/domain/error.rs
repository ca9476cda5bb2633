use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
    #[error("{entity} `{owner}` references unknown {target} `{id}`")]
    DanglingReference {
        entity: &'static str,
        owner: String,
        target: &'static str,
        id: String,
    },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    pub fn dangling(
        entity: &'static str,
        owner: impl Into<String>,
        target: &'static str,
        id: impl Into<String>,
    ) -> Self {
        Self::DanglingReference {
            entity,
            owner: owner.into(),
            target,
            id: id.into(),
        }
    }
}
