use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which top-level list of targets a runner reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Load,
    Search,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Load => f.write_str("Load"),
            Section::Search => f.write_str("Search"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Collection operation failed: {0}")]
    Collection(String),

    #[error("Upsert failed: {0}")]
    Upsert(String),

    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} config not found")]
    MissingSection(Section),

    #[error("Unknown type: {0}")]
    UnrecognizedBackend(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Cannot read vector array {}: {reason}", path.display())]
    VectorFile { path: PathBuf, reason: String },

    #[error("Vector rows {start}..{end} requested but the array only has {rows} rows")]
    VectorOutOfRange { start: usize, end: usize, rows: usize },

    #[error("Invalid record at {}:{line}: {source}", path.display())]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yaml::Error),
}
