use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Script compile error: {0}")]
    ScriptCompile(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Wire format error: {0}")]
    Wire(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
}

pub type Result<T> = std::result::Result<T, Error>;
