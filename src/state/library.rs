use rusqlite::{params, Connection, OptionalExtension};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use super::data::{SortMode, TitleDetails, TitleRow};
use crate::error::{DashError, DashResult};

/// Format of every timestamp stored in the database (ISO 8601, UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Columns a title scan must return, in this order
pub const SCAN_COLUMNS: &[&str] = &["id", "title", "launch_path"];

/// Which titles a page scan streams
#[derive(Debug, Clone, PartialEq)]
pub enum PageQuery {
    /// Titles launched after `since`, newest first
    Recent { since: String, limit: u32 },
    /// Every title of `page` in `sort` order
    Sorted { page: String, sort: SortMode },
}

/// The Library manages the SQLite title database.
/// It stores one row per launchable title and which page it belongs to.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the database at `db_path` and initialize the schema.
    ///
    /// Every thread opens its own Library: rusqlite::Connection is not Sync,
    /// so scan workers never share the GUI thread's connection.
    pub fn open(db_path: &Path) -> DashResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| DashError::ConfigIo {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        log::debug!("📁 Database opened at: {}", db_path.display());

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates the titles table and its indexes if they don't exist.
    fn init_schema(&self) -> DashResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS titles (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                launch_path     TEXT NOT NULL UNIQUE,
                page            TEXT NOT NULL,
                rating          REAL,
                last_launch     TEXT,
                release_date    TEXT
            )",
            [],
        )?;

        // Scans always filter by page
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_titles_page
             ON titles(page)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_titles_last_launch
             ON titles(last_launch DESC)",
            [],
        )?;

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a count of titles in the library
    pub fn title_count(&self) -> DashResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM titles", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Add a title, returning its database id
    pub fn insert_title(
        &self,
        title: &str,
        launch_path: &str,
        page: &str,
        rating: Option<f64>,
        release_date: Option<&str>,
    ) -> DashResult<i64> {
        self.conn.execute(
            "INSERT INTO titles (title, launch_path, page, rating, release_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![title, launch_path, page, rating, release_date],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Stream the titles selected by `query`, in query order.
    ///
    /// `on_row` is called once per row and may stop the scan early by
    /// returning `ControlFlow::Break`. Returns the number of rows delivered.
    pub fn for_each_title(
        &self,
        query: &PageQuery,
        mut on_row: impl FnMut(TitleRow) -> ControlFlow<()>,
    ) -> DashResult<usize> {
        let sql = match query {
            PageQuery::Recent { .. } => "SELECT id, title, launch_path FROM titles
                 WHERE last_launch IS NOT NULL AND last_launch > ?1
                 ORDER BY last_launch DESC LIMIT ?2"
                .to_string(),
            PageQuery::Sorted { sort, .. } => {
                let (column, order) = sort.order_by();
                format!(
                    "SELECT id, title, launch_path FROM titles WHERE page = ?1 ORDER BY {} {}, id ASC",
                    column, order
                )
            }
        };

        let mut stmt = self.conn.prepare(&sql)?;
        check_columns(stmt.column_names())?;

        let mut rows = match query {
            PageQuery::Recent { since, limit } => stmt.query(params![since, limit])?,
            PageQuery::Sorted { page, .. } => stmt.query(params![page])?,
        };

        let mut delivered = 0;
        while let Some(row) = rows.next()? {
            let title_row = TitleRow {
                db_id: row.get(0)?,
                title: row.get(1)?,
                launch_path: row.get(2)?,
            };
            delivered += 1;

            if on_row(title_row).is_break() {
                break;
            }
        }

        Ok(delivered)
    }

    /// Ids of the titles of `page` in `sort` order
    pub fn sorted_ids(&self, page: &str, sort: SortMode) -> DashResult<Vec<i64>> {
        let (column, order) = sort.order_by();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id FROM titles WHERE page = ?1 ORDER BY {} {}, id ASC",
            column, order
        ))?;

        let ids = stmt
            .query_map(params![page], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    pub fn launch_path(&self, db_id: i64) -> DashResult<String> {
        self.conn
            .query_row(
                "SELECT launch_path FROM titles WHERE id = ?1",
                params![db_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(DashError::MissingTitle(db_id))
    }

    /// Record when a title was last launched
    pub fn set_last_launch(&self, db_id: i64, timestamp: &str) -> DashResult<()> {
        let updated = self.conn.execute(
            "UPDATE titles SET last_launch = ?1 WHERE id = ?2",
            params![timestamp, db_id],
        )?;

        if updated == 0 {
            return Err(DashError::MissingTitle(db_id));
        }
        Ok(())
    }

    /// Everything the info overlay shows about a title
    pub fn title_details(&self, db_id: i64) -> DashResult<TitleDetails> {
        self.conn
            .query_row(
                "SELECT id, title, launch_path, rating, release_date, last_launch
                 FROM titles WHERE id = ?1",
                params![db_id],
                |row| {
                    Ok(TitleDetails {
                        db_id: row.get(0)?,
                        title: row.get(1)?,
                        launch_path: row.get(2)?,
                        rating: row.get(3)?,
                        release_date: row.get(4)?,
                        last_launch: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or(DashError::MissingTitle(db_id))
    }
}

/// Rows are read by position, so the column order must be exactly SCAN_COLUMNS
fn check_columns(found: Vec<&str>) -> DashResult<()> {
    if found != SCAN_COLUMNS {
        return Err(DashError::ColumnOrder {
            expected: SCAN_COLUMNS,
            found: found.into_iter().map(str::to_string).collect(),
        });
    }
    Ok(())
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
