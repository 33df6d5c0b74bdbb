use crate::dependency::DependencyViolation;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the configuration services.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: {reason}")]
    Validation { key: String, reason: String },

    #[error("dependency violation: {0}")]
    Dependency(DependencyViolation),

    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },

    #[error("backing store error: {0}")]
    BackingStore(#[from] StoreError),

    #[error("secret handling failed: {0}")]
    Secret(#[from] CipherError),
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// The vetoing rule, when this is a dependency violation.
    pub fn as_violation(&self) -> Option<&DependencyViolation> {
        match self {
            Self::Dependency(v) => Some(v),
            _ => None,
        }
    }
}

impl From<DependencyViolation> for ConfigError {
    fn from(v: DependencyViolation) -> Self {
        Self::Dependency(v)
    }
}

/// Failures reported by a persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record `{key}`: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the symmetric cipher used for secret settings.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed ciphertext")]
    Malformed,

    #[error("decryption failed: ciphertext was tampered with or the key is wrong")]
    Authentication,

    #[error("encryption failed")]
    Encryption,
}

/// Failure of the audit collaborator. Never propagated out of a write.
#[derive(Error, Debug)]
#[error("audit sink failed: {0}")]
pub struct AuditError(pub String);
