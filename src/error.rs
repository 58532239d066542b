use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MetabError {
    #[error("{table}: no entry for {id}")]
    NotFound { table: &'static str, id: String },

    #[error("{service} unavailable while resolving {id}: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        id: String,
        message: String,
    },

    #[error("{service} returned status {status}: {message}")]
    UpstreamStatus {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("malformed {family} record {id}: {reason}")]
    #[diagnostic(help("check the knowledge-base file for this entry"))]
    MalformedRecord {
        family: &'static str,
        id: String,
        reason: String,
    },

    #[error("invalid {kind} id: {value}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid network document: {0}")]
    Interchange(String),

    #[error("organism not found in store: {0}")]
    OrganismNotFound(String),

    #[error("no requested organism id is in the gene table (requested: {examples})")]
    #[diagnostic(help("ids must match the first column of the precalculated table"))]
    NoMatchingOrganisms { examples: String },

    #[error("{missing} requested organism ids are not in the gene table (e.g. {examples})")]
    MissingOrganisms { missing: usize, examples: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl MetabError {
    pub fn not_found(table: &'static str, id: impl Into<String>) -> Self {
        MetabError::NotFound {
            table,
            id: id.into(),
        }
    }

    /// Upstream failures never abort a batch; callers use this to decide
    /// whether an error degrades to an empty result.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            MetabError::UpstreamUnavailable { .. } | MetabError::UpstreamStatus { .. }
        )
    }
}
