use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Path is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("File too large: {size} bytes > {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported extension {extension:?}, supported: {supported:?}")]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No event emitter available")]
    EmitterUnavailable,

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
