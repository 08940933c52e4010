// Service Errors
// Crate-wide error type aggregating schema, filter, config and session failures

use crate::filter::FilterError;
use crate::schema::{ConfigError, SchemaError};
use crate::tree::Status;

use thiserror::Error;

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("node '{0}' is not a leaf")]
    NotALeaf(String),

    #[error("unknown result key '{0}'")]
    UnknownResultKey(String),

    #[error("status '{0}' cannot be set directly on a leaf")]
    InvalidManualStatus(Status),

    #[error("a run is already in progress")]
    SchedulerBusy,

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
