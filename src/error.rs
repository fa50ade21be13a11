use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::pipeline::Stage;

/// Coarse classification every [`GconError`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    DataIntegrity,
    Retrieval,
    Execution,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Argument => "argument",
            ErrorKind::DataIntegrity => "data-integrity",
            ErrorKind::Retrieval => "retrieval",
            ErrorKind::Execution => "execution",
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum GconError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("source table file not found: {0}")]
    SourceTableNotFound(PathBuf),

    #[error("invalid directory path: {0}")]
    InvalidDirectory(PathBuf),

    #[error("invalid marker name: {0}")]
    InvalidMarker(String),

    #[error("invalid source table: {0}")]
    InvalidSourceTable(String),

    #[error(
        "duplicate accessions found ({0}); re-run with --ignore-duplicates if the duplication is intentional"
    )]
    DuplicateAccessions(String),

    #[error("metadata key `{key}` is registered in both {first} and {second}")]
    DuplicateGroupKey {
        key: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid metadata key: {0}")]
    InvalidMetadataKey(String),

    #[error("qualifier `{0}` has no values")]
    EmptyQualifier(String),

    #[error("metadata source feature not available for `{0}`")]
    MissingSourceFeature(String),

    #[error("unable to find metadata for marker `{0}`")]
    MarkerNotCollected(String),

    #[error("missing contact email; set CURRENT_USER_EMAIL or `email` in gcon.json")]
    MissingEmail,

    #[error("Entrez request failed: {0}")]
    EntrezHttp(String),

    #[error("Entrez returned status {status}: {message}")]
    EntrezStatus { status: u16, message: String },

    #[error("failed to parse GenBank content: {0}")]
    GenbankParse(String),

    #[error("record cache error: {0}")]
    CacheStore(String),

    #[error("invalid report: {0}")]
    InvalidReport(String),

    #[error(
        "reference data does not match connections length ({rows} rows, {connections} connections)"
    )]
    ConnectionCountMismatch { rows: usize, connections: usize },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<GconError>,
    },
}

impl GconError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GconError::InvalidArgument(_)
            | GconError::SourceTableNotFound(_)
            | GconError::InvalidDirectory(_)
            | GconError::MissingEmail
            | GconError::ConfigRead(_)
            | GconError::ConfigParse(_) => ErrorKind::Argument,
            GconError::InvalidMarker(_)
            | GconError::InvalidSourceTable(_)
            | GconError::DuplicateAccessions(_)
            | GconError::DuplicateGroupKey { .. }
            | GconError::InvalidMetadataKey(_)
            | GconError::EmptyQualifier(_)
            | GconError::InvalidReport(_) => ErrorKind::DataIntegrity,
            GconError::EntrezHttp(_)
            | GconError::EntrezStatus { .. }
            | GconError::GenbankParse(_)
            | GconError::MissingSourceFeature(_) => ErrorKind::Retrieval,
            GconError::MarkerNotCollected(_)
            | GconError::CacheStore(_)
            | GconError::ConnectionCountMismatch { .. }
            | GconError::Filesystem(_) => ErrorKind::Execution,
            GconError::Stage { source, .. } => source.kind(),
        }
    }

    /// Tags the error with the pipeline stage it escaped from. Already tagged
    /// errors keep their innermost stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            GconError::Stage { .. } => self,
            other => GconError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            GconError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
