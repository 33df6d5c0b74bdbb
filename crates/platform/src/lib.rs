//! Platform collaborators for the configuration engine: a hash-chained audit
//! log and AES-256-GCM encryption for secret settings.

#![warn(clippy::unwrap_used)]

pub mod audit;
pub mod secrets;

pub use audit::AuditLogger;
pub use secrets::{AesGcmCipher, SecretKey};
