use thiserror::Error;

/// Rejection of a replayed change by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("database '{0}' already exists")]
    DatabaseExists(String),

    #[error("table '{db}.{table}' not found")]
    TableNotFound { db: String, table: String },

    #[error("table '{db}.{table}' already exists")]
    TableExists { db: String, table: String },

    #[error("index '{index}' on '{table}' not found")]
    IndexNotFound { table: String, index: String },

    #[error("index '{index}' on '{table}' already exists")]
    IndexExists { table: String, index: String },

    #[error("segment {segment_id} of '{table}' not found")]
    SegmentNotFound { table: String, segment_id: u32 },

    #[error("segment {segment_id} cannot be compacted: {reason}")]
    SegmentTransition { segment_id: u32, reason: String },

    #[error("column '{column}' of '{table}': {reason}")]
    Column {
        table: String,
        column: String,
        reason: String,
    },

    #[error("persistence: {0}")]
    Persistence(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
