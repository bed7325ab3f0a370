//! Typed errors and structured error bodies.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("config parse: {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("no datasource configured")]
    NoDatasource,
    #[error("invalid datasource '{name}': {reason}")]
    InvalidDatasource { name: String, reason: String },
    #[error("schema introspection failed for '{db}': {message}")]
    Introspection { db: String, message: String },
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("search engine: {0}")]
    Search(#[from] reqwest::Error),
}

/// Machine-checkable error category carried in every error body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedRequest,
    UnknownTarget,
    UnsupportedOperation,
    ConfigurationError,
    DatabaseError,
    SearchEngineError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::UnknownTarget => "unknown_target",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::DatabaseError => "database_error",
            ErrorKind::SearchEngineError => "search_engine_error",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) => ErrorKind::ConfigurationError,
            AppError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            AppError::UnknownTarget(_) => ErrorKind::UnknownTarget,
            AppError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            AppError::Db(_) => ErrorKind::DatabaseError,
            AppError::Search(_) => ErrorKind::SearchEngineError,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            AppError::Config(ConfigError::InvalidDatasource { name, .. }) => {
                Some(serde_json::json!({ "datasource": name }))
            }
            AppError::Config(ConfigError::Introspection { db, .. }) => Some(serde_json::json!({ "database": db })),
            _ => None,
        };
        ErrorBody {
            error: ErrorDetail {
                code: self.kind(),
                message: self.to_string(),
                details,
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_body()).unwrap_or_else(|_| {
            serde_json::json!({ "error": { "code": self.kind().as_str(), "message": self.to_string() } })
        })
    }
}
