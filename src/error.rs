/// Error types for the dashboard
///
/// Most failures degrade silently (a missing thumbnail, a failed decode).
/// The variants flagged by [`DashError::is_fatal`] mean the database and the
/// live widget tree disagree, and the shell aborts on them.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DashError {
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to decode thumbnail {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("launch path too short to derive a thumbnail path: {0:?}")]
    LaunchPathTooShort(String),

    #[error("unexpected query columns {found:?}, expected {expected:?}")]
    ColumnOrder {
        expected: &'static [&'static str],
        found: Vec<String>,
    },

    #[error("title {db_id} returned by the sort query has no widget on page {page:?}")]
    ResortDesync { page: String, db_id: i64 },

    #[error("page {0:?} is still being scanned")]
    ScanInProgress(String),

    #[error("scan task failed: {0}")]
    ScanTask(String),

    #[error("no page named {0:?}")]
    UnknownPage(String),

    #[error("no title with id {0}")]
    MissingTitle(i64),
}

impl DashError {
    /// Invariant violations: the database and the widget tree are out of sync.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DashError::ColumnOrder { .. } | DashError::ResortDesync { .. } | DashError::UnknownPage(_)
        )
    }
}

pub type DashResult<T> = Result<T, DashError>;
