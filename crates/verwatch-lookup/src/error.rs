//! Error types for deployed-version lookups

use thiserror::Error;
use verwatch_core::CoreError;

/// Lookup errors
///
/// Only the configuration errors are fatal (they reject a config load). Every
/// other error is reported and the next poll tries again.
#[derive(Debug, Error)]
pub enum LookupError {
    // ============ Configuration Errors ============
    #[error("{message}")]
    InvalidConfig { message: String },

    #[error("unsupported deployed_version type {kind:?} (expected one of: url, web, manual)")]
    UnknownType { kind: String },

    #[error("failed to unmarshal {kind} lookup:\n  {message}")]
    Decode { kind: String, message: String },

    // ============ Network Errors ============
    #[error("failed creating http request for {url:?}: {message}")]
    Request { url: String, message: String },

    #[error("{message}")]
    Transport { message: String },

    #[error("x509 (certificate invalid)")]
    CertificateInvalid,

    #[error("non-2XX response code: {status}")]
    HttpStatus { status: u16 },

    // ============ Version Errors ============
    #[error("{message}")]
    Extraction { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("deployed version was set {elapsed_ms}ms ago, wait at least a second between sets")]
    RateLimited { elapsed_ms: i64 },

    // ============ Other ============
    #[error("no deployed_version lookup to refresh")]
    MissingLookup,

    #[error("query is not implemented for {kind} lookups")]
    NotImplemented { kind: String },
}

/// Result type for lookup operations
pub type Result<T> = std::result::Result<T, LookupError>;

impl LookupError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        LookupError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        LookupError::Extraction {
            message: message.into(),
        }
    }

    /// Errors that reject a config rather than a single query
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LookupError::InvalidConfig { .. }
                | LookupError::UnknownType { .. }
                | LookupError::Decode { .. }
        )
    }

    /// Expected failures of a remote source, reported at WARN
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            LookupError::CertificateInvalid
                | LookupError::HttpStatus { .. }
                | LookupError::RateLimited { .. }
        )
    }

    /// Log a failed query at the severity the error deserves
    pub(crate) fn log(&self) {
        if self.is_warning() {
            tracing::warn!("{}", self);
        } else {
            tracing::error!("{}", self);
        }
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(e: serde_json::Error) -> Self {
        LookupError::InvalidConfig {
            message: e.to_string(),
        }
    }
}
