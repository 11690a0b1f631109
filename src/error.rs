use std::io;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum CagError {
    #[error("Bulk write to '{collection}' failed at item '{item}': {reason}")]
    BulkWrite {
        collection: String,
        item: String,
        reason: String,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Concept '{concept}' already names a node in graph {model_id}")]
    DuplicateConcept { model_id: String, concept: String },
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Document store error: {0}")]
    Store(String),
}

impl CagError {
    /// The HTTP status an orchestrating handler should surface for this
    /// failure. All engine errors bubble up uninterpreted; this mapping is
    /// the only translation layer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CagError::BulkWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CagError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CagError::DuplicateConcept { .. } => StatusCode::CONFLICT,
            CagError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CagError::NotFound(_) => StatusCode::NOT_FOUND,
            CagError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CagError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonError> for CagError {
    fn from(src: JsonError) -> CagError {
        CagError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for CagError {
    fn from(src: toml::de::Error) -> CagError {
        CagError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for CagError {
    fn from(src: toml::ser::Error) -> CagError {
        CagError::Config(format!("Toml serialization error: {src}"))
    }
}

impl From<uuid::Error> for CagError {
    fn from(src: uuid::Error) -> CagError {
        CagError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for CagError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CagError::NotFound(format!("{x}")),
            _ => CagError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<SqlxError> for CagError {
    fn from(db_error: SqlxError) -> Self {
        match db_error {
            SqlxError::RowNotFound => CagError::NotFound("row not found".to_string()),
            other => CagError::Store(format!("database error: {other:?}")),
        }
    }
}
