/// Background page scan
///
/// One worker per page streams that page's titles from the database and
/// appends an item widget per row. Rows are appended in query order; the
/// worker never re-sorts. Every tree mutation happens under the tree lock,
/// since the GUI thread renders the same tree concurrently.
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DashError, DashResult};
use crate::state::config::{DashConfig, RECENT_PAGE};
use crate::state::data::{ThumbnailState, TitleItem, TitleRow};
use crate::state::library::{Library, PageQuery};
use crate::state::tree::SharedTree;
use crate::thumb::decoder::{thumbnail_exists, thumbnail_path_for};

/// Query a page is filled with: the Recent page uses the recency window,
/// every other page its configured sort (name ascending by default)
pub fn page_query(config: &DashConfig, page: &str, now: DateTime<Utc>) -> PageQuery {
    if page == RECENT_PAGE {
        PageQuery::Recent {
            since: config.earliest_recent(now),
            limit: config.max_recent,
        }
    } else {
        PageQuery::Sorted {
            page: page.to_string(),
            sort: config.sort_for_page(page).unwrap_or_default(),
        }
    }
}

/// Shared view of a running scan
#[derive(Debug, Clone, Default)]
pub struct ScanHandle {
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl ScanHandle {
    /// Ask the scan to stop at its next row
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }
}

/// Marks the scan finished however the worker exits
struct FinishGuard(Arc<AtomicBool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Result of a scan, reported back to the GUI thread
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub page: usize,
    pub title: String,
    /// Rows added, or the error that stopped the scan
    pub result: Result<usize, Arc<DashError>>,
}

impl ScanSummary {
    /// The scan stopped on a tree/database desync
    pub fn is_fatal(&self) -> bool {
        self.result.as_ref().is_err_and(|e| e.is_fatal())
    }
}

#[derive(Debug)]
pub struct PageScanWorker {
    page: usize,
    generation: u64,
    title: String,
    query: PageQuery,
    db_path: PathBuf,
    tree: SharedTree,
    handle: ScanHandle,
}

impl PageScanWorker {
    pub fn new(
        page: usize,
        generation: u64,
        title: &str,
        query: PageQuery,
        db_path: PathBuf,
        tree: SharedTree,
    ) -> (Self, ScanHandle) {
        let handle = ScanHandle::default();
        let worker = Self {
            page,
            generation,
            title: title.to_string(),
            query,
            db_path,
            tree,
            handle: handle.clone(),
        };
        (worker, handle)
    }

    /// Scan the page to completion (blocking). Returns the rows added.
    pub fn run(self) -> DashResult<usize> {
        let _finished = FinishGuard(self.handle.finished.clone());

        // Open a new database connection for this worker thread
        let library = Library::open(&self.db_path)?;

        let mut added = 0;
        let mut failure = None;
        library.for_each_title(&self.query, |row| match self.add_row(row) {
            Ok(ControlFlow::Continue(())) => {
                added += 1;
                ControlFlow::Continue(())
            }
            Ok(ControlFlow::Break(())) => ControlFlow::Break(()),
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        })?;

        if let Some(e) = failure {
            return Err(e);
        }

        log::info!("Scanned page {:?}: {} titles", self.title, added);
        Ok(added)
    }

    /// Create the item widget for one row
    pub fn add_row(&self, row: TitleRow) -> DashResult<ControlFlow<()>> {
        if self.handle.is_cancelled() {
            return Ok(ControlFlow::Break(()));
        }

        // Check if a thumbnail exists, outside the lock
        let thumb_path = thumbnail_path_for(&row.launch_path)?;
        let mut item = TitleItem::new(row.db_id, &row.title);
        if thumbnail_exists(&thumb_path) {
            item.thumbnail = Some(ThumbnailState::new(thumb_path));
        }

        let mut tree = self.tree.lock();
        // The page was destroyed or recreated by a newer scan
        if !tree.is_current(self.page, self.generation) {
            return Ok(ControlFlow::Break(()));
        }

        match tree.create_item(self.page, item) {
            Some(id) => {
                log::debug!("Added {:?} as {:?} to page {:?}", row.title, id, self.title);
                Ok(ControlFlow::Continue(()))
            }
            None => Err(DashError::UnknownPage(self.title.clone())),
        }
    }
}

/// Run a page scan on the blocking pool
pub async fn run_page_scan(worker: PageScanWorker) -> ScanSummary {
    let page = worker.page;
    let title = worker.title.clone();

    // Spawn blocking because the query streams synchronously
    let result = tokio::task::spawn_blocking(move || worker.run())
        .await
        .unwrap_or_else(|e| Err(DashError::ScanTask(e.to_string())))
        .map_err(Arc::new);

    ScanSummary {
        page,
        title,
        result,
    }
}
