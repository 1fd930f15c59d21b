//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(
        "failed to convert {version:?} to a semantic version. If all versions are in this style, \
         consider adding json/regex to get the version into the style of 'MAJOR.MINOR.PATCH' \
         (https://semver.org/), or disabling semantic versioning (globally with \
         defaults.service.semantic_versioning or just for this service with the \
         semantic_versioning var)"
    )]
    SemanticVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("{prefix}interval: {value:?} <invalid> (Use 'AhBmCs' duration format)")]
    InvalidInterval { prefix: String, value: String },

    #[error("hard defaults incomplete, missing: {field}")]
    IncompleteDefaults { field: String },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
