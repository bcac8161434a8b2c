use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathGrabError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown entity: {name}")]
    UnknownEntity { name: String },

    #[error("Type mismatch: entity '{entity}' cannot hold '{value}' as {dtype}")]
    TypeMismatch {
        entity: String,
        value: String,
        dtype: String,
    },

    #[error("Path collision: {path} is indexed by both '{first}' and '{second}'")]
    PathCollision {
        path: String,
        first: String,
        second: String,
    },

    #[error("Cardinality error: expected {expected} paths, built {actual}")]
    Cardinality { expected: String, actual: usize },

    #[error("Scan failure in domain '{domain}': {message}")]
    ScanFailure { domain: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl PathGrabError {
    /// Configuration and merge errors are fatal at Layout-construction time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PathGrabError::Configuration(_) | PathGrabError::UnknownEntity { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PathGrabError>;
