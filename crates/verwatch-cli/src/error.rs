//! CLI error types with exit code handling

use miette::Diagnostic;
use thiserror::Error;
use verwatch_core::CoreError;
use verwatch_lookup::LookupError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// The service file or lookup config is invalid
    #[error("Invalid config: {message}")]
    #[diagnostic(code(verwatch::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A query or refresh failed
    #[error("Lookup failed: {message}")]
    #[diagnostic(code(verwatch::cli::lookup))]
    Lookup {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(verwatch::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(verwatch::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Lookup { .. } => exit_codes::LOOKUP_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::config(err.to_string())
    }
}

impl From<LookupError> for CliError {
    fn from(err: LookupError) -> Self {
        let help = match &err {
            LookupError::UnknownType { .. } => {
                Some("set deployed_version.type to url or manual".to_string())
            }
            LookupError::CertificateInvalid => {
                Some("set deployed_version.allow_invalid_certs to true to skip verification".to_string())
            }
            LookupError::RateLimited { .. } => Some("try again in a second".to_string()),
            _ => None,
        };

        if err.is_config_error() {
            CliError::Config {
                message: err.to_string(),
                help,
            }
        } else {
            CliError::Lookup {
                message: err.to_string(),
                help,
            }
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
