/// The paged title dashboard
///
/// Architecture:
/// - `scanner.rs` - background workers filling each page from the database
/// - `navigator.rs` - selection and page switching on directional input
/// - `resort.rs` - reordering a page's widgets to a new sort order
///
/// [`Dashboard`] owns everything the GUI thread touches: the shared widget
/// tree, the thumbnail cache, the pending decode list and the navigator.
/// Scan workers only ever reach the tree, through its lock.
pub mod navigator;
pub mod resort;
pub mod scanner;

use chrono::Utc;
use iced::widget::image;
use std::path::PathBuf;

use crate::error::{DashError, DashResult};
use crate::state::config::{DashConfig, RECENT_PAGE};
use crate::state::data::{
    Canvas, ItemId, SortMode, TitleDetails, TitleItem, NO_ITEMS_DB_ID, THUMBNAIL_WIDTH,
};
use crate::state::library::{Library, TIMESTAMP_FORMAT};
use crate::state::tree::{SharedTree, WidgetTree};
use crate::thumb::cache::ThumbnailCache;
use crate::thumb::decoder::{DecodeJob, DecodeOutcome, ThumbnailDecoder};
use crate::thumb::pending::{PendingDecodeTracker, PendingStatus};

use navigator::{DashInput, GridNavigator};
use scanner::{page_query, PageScanWorker, ScanHandle, ScanSummary};

/// A configured page and its scan
#[derive(Debug)]
pub struct Page {
    pub title: String,
    /// Index of the page's grid in the widget tree
    pub grid: usize,
    pub scan: ScanHandle,
}

/// Where the selection ended up after an input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Focus {
    pub page: usize,
    pub index: usize,
    /// New scroll offset needed to bring the selection into view
    pub scroll_to: Option<f32>,
}

/// What the shell has to do after an input
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Ignored,
    Focus(Focus),
    OpenInfo(TitleDetails),
    OpenSettings,
    ConfirmLaunch { item: ItemId, title: String },
}

/// Why the dashboard closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuitReason {
    #[default]
    User,
    Launch,
}

impl QuitReason {
    pub fn exit_code(self) -> i32 {
        match self {
            QuitReason::User => 0,
            QuitReason::Launch => 2,
        }
    }
}

/// A title the user chose to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub db_id: i64,
    pub launch_path: String,
}

#[derive(Debug)]
pub struct Dashboard {
    config: DashConfig,
    config_path: Option<PathBuf>,
    library: Library,
    tree: SharedTree,
    pages: Vec<Page>,
    generation: u64,
    navigator: GridNavigator,
    cache: ThumbnailCache,
    pending: PendingDecodeTracker,
    decoder: ThumbnailDecoder,
    decode_jobs: Vec<DecodeJob>,
}

impl Dashboard {
    pub fn new(config: DashConfig, library: Library) -> Self {
        let navigator = GridNavigator::new(config.default_page);

        Self {
            config,
            config_path: None,
            library,
            tree: WidgetTree::new().shared(),
            pages: Vec::new(),
            generation: 0,
            navigator,
            cache: ThumbnailCache::default(),
            pending: PendingDecodeTracker::new(),
            decoder: ThumbnailDecoder::new(),
            decode_jobs: Vec::new(),
        }
    }

    /// Save sort changes back to `path`
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn tree(&self) -> SharedTree {
        self.tree.clone()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_title(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(|p| p.title.as_str())
    }

    pub fn current_page(&self) -> usize {
        self.navigator.page()
    }

    /// Sort mode a page is shown in
    pub fn page_sort(&self, title: &str) -> SortMode {
        self.config.sort_for_page(title).unwrap_or_default()
    }

    /// Destroy all pages and start a fresh scan of every configured page.
    /// The returned workers must be run (see [`scanner::run_page_scan`]).
    pub fn scan_db(&mut self) -> Vec<PageScanWorker> {
        for page in &self.pages {
            page.scan.cancel();
        }

        {
            let mut tree = self.tree.lock();
            for (id, item) in tree.remove_pages() {
                destroy_item(&mut self.cache, id, item);
            }
        }
        self.pending.clear();
        self.pages.clear();
        self.generation += 1;

        let now = Utc::now();
        let mut workers = Vec::with_capacity(self.config.pages.len());

        for def in &self.config.pages {
            let grid = self.tree.lock().add_page(&def.name, self.generation);
            let query = page_query(&self.config, &def.name, now);

            // Start a worker that reads the database for items on this page
            let (worker, scan) = PageScanWorker::new(
                grid,
                self.generation,
                &def.name,
                query,
                self.library.path().to_path_buf(),
                self.tree.clone(),
            );
            workers.push(worker);
            self.pages.push(Page {
                title: def.name.clone(),
                grid,
                scan,
            });
        }

        log::info!("Scanning {} pages (generation {})", self.pages.len(), self.generation);
        self.set_page(self.navigator.page());
        workers
    }

    /// Show page `page` (clamped) and focus its selected item
    pub fn set_page(&mut self, page: usize) -> Focus {
        let page = self.navigator.go_to_page(page, self.pages.len());
        let mut tree = self.tree.lock();
        tree.set_active_page(page);

        let Some(grid) = tree.page_mut(page) else {
            return Focus {
                page,
                index: 0,
                scroll_to: None,
            };
        };
        grid.selected = GridNavigator::entry_index(grid.selected);
        let selected = grid.selected;

        let index = if tree.child(page, selected).is_some() {
            selected
        } else {
            // Trying to focus an item that is gone, revert to the placeholder
            // which is always present
            log::debug!("Selection {} on page {} is gone, focusing placeholder", selected, page);
            0
        };

        let mut scroll_to = None;
        if let Some(grid) = tree.page_mut(page) {
            grid.selected = index;
            scroll_to = grid.scroll_target(index);
        }

        Focus {
            page,
            index,
            scroll_to,
        }
    }

    /// A page scan ended. Refocuses the current page if it was waiting on
    /// its placeholder for the first item to arrive.
    ///
    /// Scan errors are left to the caller, see [`ScanSummary::is_fatal`].
    pub fn scan_finished(&mut self, summary: &ScanSummary) -> Option<Focus> {
        if let Ok(count) = &summary.result {
            log::debug!("Scan of {:?} added {} titles", summary.title, count);
        }

        let page = self.navigator.page();
        if summary.page != page {
            return None;
        }

        let waiting = self.tree.lock().page(page).is_some_and(|grid| grid.selected == 0);
        waiting.then(|| self.set_page(page))
    }

    /// React to one input on the current page
    pub fn handle_input(&mut self, input: DashInput) -> InputOutcome {
        match input {
            DashInput::PrevPage | DashInput::NextPage => {
                let forward = input == DashInput::NextPage;
                let page = self.navigator.switch_page(forward, self.pages.len());
                InputOutcome::Focus(self.set_page(page))
            }
            DashInput::Move(motion) => {
                let page = self.navigator.page();
                let mut tree = self.tree.lock();
                let count = tree.child_count(page);
                let Some(grid) = tree.page(page) else {
                    return InputOutcome::Ignored;
                };

                let mut index =
                    GridNavigator::move_selection(grid.selected, motion, grid.tiles_per_row(), count);
                if tree.child(page, index).is_none() {
                    index = 0;
                }

                let Some(grid) = tree.page_mut(page) else {
                    return InputOutcome::Ignored;
                };
                grid.selected = index;
                InputOutcome::Focus(Focus {
                    page,
                    index,
                    scroll_to: grid.scroll_target(index),
                })
            }
            DashInput::Settings => InputOutcome::OpenSettings,
            DashInput::Info | DashInput::Confirm => {
                let Some((item, db_id, title)) = self.selected_item() else {
                    self.drop_stale_selection();
                    return InputOutcome::Ignored;
                };

                if input == DashInput::Confirm {
                    return InputOutcome::ConfirmLaunch { item, title };
                }

                match self.library.title_details(db_id) {
                    Ok(details) => InputOutcome::OpenInfo(details),
                    Err(e) => {
                        log::warn!("⚠️  No details for {}: {}", db_id, e);
                        InputOutcome::Ignored
                    }
                }
            }
        }
    }

    /// Move the selection of the current page back to the placeholder if
    /// its item was deleted underneath it
    fn drop_stale_selection(&mut self) {
        let page = self.navigator.page();
        let mut tree = self.tree.lock();
        let Some(selected) = tree.page(page).map(|grid| grid.selected) else {
            return;
        };

        if tree.child(page, selected).is_none() {
            log::debug!("Selection {} on page {} is gone, focusing placeholder", selected, page);
            if let Some(grid) = tree.page_mut(page) {
                grid.selected = 0;
            }
        }
    }

    /// Selected real item of the current page, if any
    pub fn selected_item(&self) -> Option<(ItemId, i64, String)> {
        let page = self.navigator.page();
        let tree = self.tree.lock();
        let selected = tree.page(page)?.selected;
        if !DashInput::Confirm.allowed_at(selected) {
            return None;
        }

        let id = tree.child(page, selected)?;
        let item = tree.item(id)?;
        Some((id, item.db_id, item.title.clone()))
    }

    /// Text of the footer label: title of the focused item
    pub fn focused_title(&self) -> String {
        let page = self.navigator.page();
        let tree = self.tree.lock();
        tree.page(page)
            .and_then(|grid| tree.child(page, grid.selected))
            .and_then(|id| tree.item(id))
            .map(|item| item.title.clone())
            .unwrap_or_default()
    }

    /// Record the launch of `item` and return what to run
    pub fn launch(&mut self, item: ItemId) -> DashResult<LaunchRequest> {
        let db_id = self
            .tree
            .lock()
            .item(item)
            .map(|item| item.db_id)
            .filter(|db_id| *db_id != NO_ITEMS_DB_ID)
            .ok_or(DashError::MissingTitle(NO_ITEMS_DB_ID))?;

        let launch_path = self.library.launch_path(db_id)?;
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        self.library.set_last_launch(db_id, &now)?;

        log::info!("🚀 Launching {} ({})", launch_path, db_id);
        Ok(LaunchRequest { db_id, launch_path })
    }

    pub fn title_details(&self, db_id: i64) -> DashResult<TitleDetails> {
        self.library.title_details(db_id)
    }

    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.tree.lock().set_view_size(width, height);
    }

    /// Stored scroll offset of the current page
    pub fn scroll_offset(&self) -> f32 {
        let page = self.navigator.page();
        self.tree.lock().page(page).map_or(0.0, |grid| grid.scroll_offset)
    }

    /// The current page's scroll container moved
    pub fn set_scroll_offset(&mut self, offset: f32) {
        let page = self.navigator.page();
        self.tree.lock().set_scroll_offset(page, offset);
    }

    /// Start decodes for visible items whose thumbnail is untried
    pub fn request_visible_thumbnails(&mut self) -> usize {
        let mut tree = self.tree.lock();
        let mut queued = 0;

        for id in tree.visible_items() {
            let Some(thumb) = tree.item_mut(id).and_then(|item| item.thumbnail.as_mut()) else {
                continue;
            };
            if !thumb.wants_decode() {
                continue;
            }

            let job = self.decoder.queue(id, &thumb.path);
            thumb.decode = Some(job.handle.clone());
            self.pending.register(id);
            self.decode_jobs.push(job);
            queued += 1;
        }

        if queued > 0 {
            log::debug!("Queued {} thumbnail decodes", queued);
        }
        queued
    }

    /// Decodes queued since the last call
    pub fn take_decode_jobs(&mut self) -> Vec<DecodeJob> {
        std::mem::take(&mut self.decode_jobs)
    }

    /// Apply a finished decode. Returns true if the thumbnail became resident.
    ///
    /// Outcomes for destroyed items, aborted handles or superseded tickets
    /// are stale and dropped.
    pub fn apply_decoded(&mut self, outcome: DecodeOutcome) -> bool {
        let mut tree = self.tree.lock();
        let page = tree.page_of(outcome.item);

        let Some(thumb) = tree
            .item_mut(outcome.item)
            .and_then(|item| item.thumbnail.as_mut())
        else {
            log::debug!("Dropping decode for destroyed item {:?}", outcome.item);
            return false;
        };

        let current = thumb
            .decode
            .as_ref()
            .is_some_and(|handle| handle.accepts(outcome.ticket));
        if !current {
            log::debug!("Dropping stale decode for {:?}", outcome.item);
            return false;
        }
        thumb.decode = None;

        let Some(decoded) = outcome.image else {
            thumb.failures += 1;
            log::debug!(
                "Thumbnail decode failed for {:?} ({} failures)",
                outcome.item,
                thumb.failures
            );
            // Still visible, the next tick retries it
            if let Some(page) = page {
                tree.mark_layout_dirty(page);
            }
            return false;
        };

        let size = decoded.byte_size();
        if size > self.cache.capacity() {
            thumb.too_large = true;
            log::warn!(
                "⚠️  Thumbnail of {:?} needs {} bytes, more than the {} byte cache, skipping it",
                outcome.item,
                size,
                self.cache.capacity()
            );
            return false;
        }

        let zoom = decoded.zoom_for_width(THUMBNAIL_WIDTH);
        thumb.canvas = Some(Canvas {
            width: decoded.width,
            height: decoded.height,
            zoom,
            handle: image::Handle::from_rgba(decoded.width, decoded.height, decoded.pixels),
        });
        if let Some(page) = page {
            tree.mark_layout_dirty(page);
        }

        let resident = self
            .cache
            .insert(outcome.item, size, |evicted| release_thumbnail(&mut tree, evicted));
        if !resident {
            release_thumbnail(&mut tree, outcome.item);
        }
        resident
    }

    /// Refresh tick: sweep in-flight decodes, then request thumbnails if the
    /// current page's layout changed since the last tick. Returns the
    /// decodes queued.
    pub fn tick(&mut self) -> usize {
        self.sweep_pending();

        let page = self.navigator.page();
        if !self.tree.lock().take_layout_dirty(page) {
            return 0;
        }
        self.request_visible_thumbnails()
    }

    /// Periodic maintenance of in-flight decodes: abort the ones that
    /// scrolled out of view and forget the finished ones
    pub fn sweep_pending(&mut self) -> usize {
        let mut tree = self.tree.lock();

        self.pending.sweep(|id| {
            let visible = tree.is_visible(id);
            let Some(thumb) = tree.item_mut(id).and_then(|item| item.thumbnail.as_mut()) else {
                return PendingStatus::Done;
            };

            // Still decoding but no longer visible, abort it
            if !visible {
                thumb.abort_decode();
            }

            if thumb.decode.is_none() {
                PendingStatus::Done
            } else {
                PendingStatus::Running
            }
        })
    }

    /// Delete every item of page `title` except the placeholder
    pub fn clear_page(&mut self, title: &str) -> DashResult<()> {
        let page = self.find_page(title)?;
        let mut tree = self.tree.lock();
        let children = tree
            .page(page)
            .map(|grid| grid.children()[1..].to_vec())
            .unwrap_or_default();

        for id in children {
            if let Some(item) = tree.delete_item(id) {
                destroy_item(&mut self.cache, id, item);
            }
        }
        Ok(())
    }

    /// Reorder page `title` to its configured sort without recreating items
    pub fn resort_page(&mut self, title: &str) -> DashResult<()> {
        let page = self.find_page(title)?;

        // The Recent page is ordered by the recency query
        if title == RECENT_PAGE {
            return Ok(());
        }
        if self.pages[page].scan.is_running() {
            return Err(DashError::ScanInProgress(title.to_string()));
        }

        let sort = self.page_sort(title);
        let ids = self.library.sorted_ids(title, sort)?;

        let grid = self.pages[page].grid;
        let mut tree = self.tree.lock();
        let selected_id = tree.page(grid).and_then(|g| tree.child(grid, g.selected));

        resort::resort_children(&mut tree, grid, &ids)?;

        // Keep the same item focused
        if let Some(selected_id) = selected_id {
            let index = tree
                .page(grid)
                .and_then(|g| g.children().iter().position(|id| *id == selected_id));
            if let (Some(index), Some(g)) = (index, tree.page_mut(grid)) {
                g.selected = index;
            }
        }

        log::info!("Resorted page {:?} by {}", title, sort.label());
        Ok(())
    }

    /// Change the sort of page `title`, save it and resort the page
    pub fn set_page_sort(&mut self, title: &str, sort: SortMode) -> DashResult<()> {
        self.config.set_page_sort(title, sort);
        if let Some(path) = &self.config_path {
            self.config.save(path)?;
        }
        self.resort_page(title)
    }

    fn find_page(&self, title: &str) -> DashResult<usize> {
        self.pages
            .iter()
            .position(|p| p.title == title)
            .ok_or_else(|| DashError::UnknownPage(title.to_string()))
    }
}

/// Cache eviction: free the canvas (and with it the pixels) of `id`,
/// returning it to untried. A no-op if nothing is resident.
fn release_thumbnail(tree: &mut WidgetTree, id: ItemId) {
    let page = tree.page_of(id);
    let Some(thumb) = tree.item_mut(id).and_then(|item| item.thumbnail.as_mut()) else {
        return;
    };

    if thumb.canvas.is_none() {
        log::warn!("⚠️  Releasing thumbnail {:?} that holds no canvas", id);
    }
    thumb.abort_decode();
    thumb.canvas = None;

    if let Some(page) = page {
        tree.mark_layout_dirty(page);
    }
}

/// Item widget destroyed: drop it from the cache and stop its decode
fn destroy_item(cache: &mut ThumbnailCache, id: ItemId, mut item: TitleItem) {
    if let Some(thumb) = item.thumbnail.as_mut() {
        cache.remove(id);
        thumb.abort_decode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{ThumbPhase, ThumbnailState};
    use crate::state::library::tests::temp_library;
    use crate::thumb::decoder::DecodedImage;
    use navigator::{Direction, Motion};
    use std::sync::Arc;

    impl Dashboard {
        fn with_cache(mut self, cache: ThumbnailCache) -> Self {
            self.cache = cache;
            self
        }

        fn cache(&self) -> &ThumbnailCache {
            &self.cache
        }

        fn pending(&self) -> &PendingDecodeTracker {
            &self.pending
        }

        fn thumbnail_phase(&self, item: ItemId) -> Option<ThumbPhase> {
            let tree = self.tree.lock();
            tree.item(item)?.thumbnail.as_ref().map(|t| t.phase())
        }
    }

    const IMAGE_BYTES: usize = 10 * 10 * 4;

    fn image() -> DecodedImage {
        DecodedImage {
            width: 10,
            height: 10,
            pixels: vec![0; IMAGE_BYTES],
        }
    }

    fn config(pages: &[&str]) -> DashConfig {
        DashConfig {
            pages: pages.iter().map(|p| crate::state::config::PageDef::new(p)).collect(),
            default_page: 0,
            ..DashConfig::default()
        }
    }

    /// Dashboard with scanned pages whose database holds `titles` on "Games"
    fn scanned(titles: &[(&str, f64)]) -> (tempfile::TempDir, Dashboard) {
        let (dir, library) = temp_library();
        for (i, (title, rating)) in titles.iter().enumerate() {
            library
                .insert_title(title, &format!("/g/{}/default.xbe", i), "Games", Some(*rating), None)
                .unwrap();
        }

        let mut dash = Dashboard::new(config(&["Games", "Empty"]), library);
        for worker in dash.scan_db() {
            worker.run().unwrap();
        }
        dash.set_page(0);
        (dir, dash)
    }

    /// Dashboard with one page of items that all have a thumbnail
    fn with_thumbnails(count: usize, cache_bytes: usize) -> (tempfile::TempDir, Dashboard, Vec<ItemId>) {
        let (dir, mut dash) = scanned(&[]);
        dash = dash.with_cache(ThumbnailCache::new(cache_bytes, IMAGE_BYTES));

        let ids = {
            let mut tree = dash.tree.lock();
            (0..count)
                .map(|i| {
                    let mut item = TitleItem::new(i as i64 + 1, "Thumb");
                    item.thumbnail = Some(ThumbnailState::new(PathBuf::from(format!("/t/{}.tbn", i))));
                    tree.create_item(0, item).unwrap()
                })
                .collect()
        };
        (dir, dash, ids)
    }

    fn succeed(dash: &mut Dashboard, job: &DecodeJob) -> bool {
        dash.apply_decoded(DecodeOutcome {
            item: job.item,
            ticket: job.handle.ticket(),
            image: Some(image()),
        })
    }

    #[test]
    fn test_scan_creates_pages_with_placeholder() {
        let (_dir, dash) = scanned(&[("Zeta", 1.0), ("Alpha", 2.0)]);

        assert_eq!(dash.page_count(), 2);
        assert_eq!(dash.page_title(1), Some("Empty"));
        assert_eq!(dash.page_title(2), None);

        let tree = dash.tree.lock();
        assert_eq!(tree.child_count(0), 3);
        assert_eq!(tree.child_count(1), 1);
        assert!(!dash.pages[0].scan.is_running());
    }

    #[test]
    fn test_navigation_wraps_and_follows_pages() {
        let titles: Vec<(String, f64)> = (0..12).map(|i| (format!("T{:02}", i), 0.0)).collect();
        let refs: Vec<(&str, f64)> = titles.iter().map(|(t, r)| (t.as_str(), *r)).collect();
        let (_dir, mut dash) = scanned(&refs);

        assert_eq!(dash.focused_title(), "T00");
        let up = DashInput::Move(Motion::Step(Direction::Up));
        assert!(matches!(dash.handle_input(up), InputOutcome::Focus(Focus { index: 12, .. })));
        let down = DashInput::Move(Motion::Step(Direction::Down));
        assert!(matches!(dash.handle_input(down), InputOutcome::Focus(Focus { index: 1, .. })));

        // The empty page can only focus its placeholder
        assert!(matches!(
            dash.handle_input(DashInput::NextPage),
            InputOutcome::Focus(Focus { page: 1, index: 0, .. })
        ));
        assert_eq!(dash.focused_title(), "No items found");
        assert_eq!(dash.handle_input(DashInput::Confirm), InputOutcome::Ignored);
        assert_eq!(dash.handle_input(DashInput::Info), InputOutcome::Ignored);
        assert_eq!(dash.handle_input(DashInput::Settings), InputOutcome::OpenSettings);

        // Clamped at the last page, then back
        dash.handle_input(DashInput::NextPage);
        assert_eq!(dash.current_page(), 1);
        dash.handle_input(DashInput::PrevPage);
        assert_eq!(dash.current_page(), 0);
    }

    #[test]
    fn test_stale_selection_falls_back_to_placeholder() {
        let (_dir, mut dash) = scanned(&[("A", 0.0), ("B", 0.0)]);
        dash.tree.lock().page_mut(0).unwrap().selected = 2;

        // A concurrent clear removed the selected item
        dash.clear_page("Games").unwrap();
        let focus = dash.set_page(0);
        assert_eq!(focus.index, 0);
        assert_eq!(dash.tree.lock().child_count(0), 1);
    }

    #[test]
    fn test_info_on_deleted_selection_resets_to_placeholder() {
        let (_dir, mut dash) = scanned(&[("A", 0.0), ("B", 0.0)]);
        dash.tree.lock().page_mut(0).unwrap().selected = 2;
        dash.clear_page("Games").unwrap();

        assert_eq!(dash.handle_input(DashInput::Info), InputOutcome::Ignored);
        assert_eq!(dash.tree.lock().page(0).unwrap().selected, 0);
        assert_eq!(dash.focused_title(), "No items found");
        assert_eq!(dash.handle_input(DashInput::Confirm), InputOutcome::Ignored);
    }

    #[test]
    fn test_info_and_launch() {
        let (_dir, mut dash) = scanned(&[("Halo", 5.0)]);

        let InputOutcome::OpenInfo(details) = dash.handle_input(DashInput::Info) else {
            panic!("expected info");
        };
        assert_eq!(details.title, "Halo");
        assert!(details.last_launch.is_none());

        let InputOutcome::ConfirmLaunch { item, title } = dash.handle_input(DashInput::Confirm) else {
            panic!("expected launch confirmation");
        };
        assert_eq!(title, "Halo");

        let request = dash.launch(item).unwrap();
        assert_eq!(request.launch_path, "/g/0/default.xbe");
        assert!(dash.title_details(request.db_id).unwrap().last_launch.is_some());
        assert_eq!(QuitReason::Launch.exit_code(), 2);
    }

    #[test]
    fn test_decode_becomes_resident() {
        let (_dir, mut dash, ids) = with_thumbnails(2, 10 * IMAGE_BYTES);

        assert_eq!(dash.request_visible_thumbnails(), 2);
        // Already decoding, nothing new
        assert_eq!(dash.request_visible_thumbnails(), 0);
        assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Decoding));
        assert_eq!(dash.pending().len(), 2);

        let jobs = dash.take_decode_jobs();
        assert!(succeed(&mut dash, &jobs[0]));
        assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Resident));
        assert!(dash.cache().contains(ids[0]));

        {
            let tree = dash.tree.lock();
            let thumb = tree.item(ids[0]).unwrap().thumbnail.as_ref().unwrap();
            let canvas = thumb.canvas.as_ref().unwrap();
            assert_eq!((canvas.width, canvas.height), (10, 10));
            assert_eq!(canvas.zoom, THUMBNAIL_WIDTH * 256 / 10);
            assert_eq!(canvas.shown_width(), THUMBNAIL_WIDTH);
        }

        // The finished entry is dropped, the running one is kept
        assert_eq!(dash.sweep_pending(), 1);
        assert_eq!(dash.pending().len(), 1);
    }

    #[test]
    fn test_abort_then_complete_never_resident() {
        let (_dir, mut dash, ids) = with_thumbnails(1, 10 * IMAGE_BYTES);
        dash.request_visible_thumbnails();
        let jobs = dash.take_decode_jobs();

        // Scroll far away: the sweep aborts the decode
        dash.set_scroll_offset(100_000.0);
        assert_eq!(dash.sweep_pending(), 1);
        assert!(jobs[0].handle.is_aborted());
        assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Untried));

        // The late completion is stale
        assert!(!succeed(&mut dash, &jobs[0]));
        assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Untried));
        assert!(dash.cache().is_empty());

        // Back in view, a fresh decode is queued and a new ticket wins
        dash.set_scroll_offset(0.0);
        assert_eq!(dash.request_visible_thumbnails(), 1);
        let retry = dash.take_decode_jobs();
        assert!(!succeed(&mut dash, &jobs[0]));
        assert!(succeed(&mut dash, &retry[0]));
    }

    #[test]
    fn test_failed_decode_retries_then_gives_up() {
        let (_dir, mut dash, ids) = with_thumbnails(1, 10 * IMAGE_BYTES);

        for _ in 0..crate::state::data::MAX_DECODE_FAILURES {
            assert_eq!(dash.request_visible_thumbnails(), 1);
            let job = dash.take_decode_jobs().remove(0);
            assert!(!dash.apply_decoded(DecodeOutcome {
                item: job.item,
                ticket: job.handle.ticket(),
                image: None,
            }));
            assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Untried));
        }

        assert_eq!(dash.request_visible_thumbnails(), 0);
    }

    #[test]
    fn test_oversized_thumbnail_is_decoded_once() {
        let (_dir, mut dash, ids) = with_thumbnails(1, IMAGE_BYTES / 2);

        let mut decodes = 0;
        for _ in 0..20 {
            dash.tick();
            for job in dash.take_decode_jobs() {
                decodes += 1;
                assert!(!succeed(&mut dash, &job));
            }
        }

        assert_eq!(decodes, 1);
        assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Untried));
        assert!(dash.cache().is_empty());
        assert_eq!(dash.request_visible_thumbnails(), 0);

        let tree = dash.tree.lock();
        let thumb = tree.item(ids[0]).unwrap().thumbnail.as_ref().unwrap();
        assert!(thumb.too_large && thumb.canvas.is_none());
    }

    #[test]
    fn test_tick_requests_only_after_layout_change() {
        let (_dir, mut dash, ids) = with_thumbnails(2, 10 * IMAGE_BYTES);

        // The streamed rows left the page dirty
        assert_eq!(dash.tick(), 2);
        assert_eq!(dash.tick(), 0);

        // A failed decode is retried on the following tick
        let jobs = dash.take_decode_jobs();
        assert!(!dash.apply_decoded(DecodeOutcome {
            item: jobs[0].item,
            ticket: jobs[0].handle.ticket(),
            image: None,
        }));
        assert_eq!(dash.tick(), 1);
        assert_eq!(dash.tick(), 0);

        // A row streamed in later
        let late = {
            let mut tree = dash.tree.lock();
            let mut item = TitleItem::new(99, "Late");
            item.thumbnail = Some(ThumbnailState::new(PathBuf::from("/t/late.tbn")));
            tree.create_item(0, item).unwrap()
        };
        assert_eq!(dash.tick(), 1);
        assert_eq!(dash.thumbnail_phase(late), Some(ThumbPhase::Decoding));
        assert_eq!(dash.thumbnail_phase(ids[1]), Some(ThumbPhase::Decoding));
    }

    #[test]
    fn test_cache_pressure_evicts_oldest() {
        let (_dir, mut dash, ids) = with_thumbnails(3, 2 * IMAGE_BYTES);
        dash.request_visible_thumbnails();

        for job in dash.take_decode_jobs() {
            assert!(succeed(&mut dash, &job));
        }

        assert_eq!(dash.thumbnail_phase(ids[0]), Some(ThumbPhase::Untried));
        assert_eq!(dash.thumbnail_phase(ids[1]), Some(ThumbPhase::Resident));
        assert_eq!(dash.thumbnail_phase(ids[2]), Some(ThumbPhase::Resident));
        assert!(dash.cache().used() <= dash.cache().capacity());

        let tree = dash.tree.lock();
        let evicted = tree.item(ids[0]).unwrap().thumbnail.as_ref().unwrap();
        assert!(evicted.canvas.is_none());
    }

    #[test]
    fn test_release_of_untried_is_a_noop() {
        let (_dir, dash, ids) = with_thumbnails(1, 10 * IMAGE_BYTES);
        let mut tree = dash.tree.lock();
        release_thumbnail(&mut tree, ids[0]);
        release_thumbnail(&mut tree, ids[0]);
        release_thumbnail(&mut tree, ItemId(9999));
        assert_eq!(tree.item(ids[0]).unwrap().thumbnail.as_ref().unwrap().phase(), ThumbPhase::Untried);
    }

    #[test]
    fn test_destroyed_item_leaves_cache_and_drops_late_decode() {
        let (_dir, mut dash, ids) = with_thumbnails(2, 10 * IMAGE_BYTES);
        dash.request_visible_thumbnails();
        let jobs = dash.take_decode_jobs();
        assert!(succeed(&mut dash, &jobs[0]));

        dash.clear_page("Games").unwrap();
        assert!(dash.cache().is_empty());
        assert!(jobs[1].handle.is_aborted());
        assert!(!succeed(&mut dash, &jobs[1]));
        assert_eq!(dash.thumbnail_phase(ids[1]), None);
        assert_eq!(dash.sweep_pending(), 2);
    }

    #[test]
    fn test_resort_page_by_rating() {
        let (dir, mut dash) = scanned(&[("Alpha", 1.0), ("Beta", 3.0), ("Gamma", 2.0)]);
        let config_path = dir.path().join("config.json");
        dash = dash.with_config_path(config_path.clone());

        // Focus Alpha, it stays focused after the resort
        assert_eq!(dash.focused_title(), "Alpha");
        dash.set_page_sort("Games", SortMode::RatingDesc).unwrap();

        let tree = dash.tree.lock();
        let order: Vec<String> = tree.page(0).unwrap().children()[1..]
            .iter()
            .map(|id| tree.item(*id).unwrap().title.clone())
            .collect();
        assert_eq!(order, vec!["Beta", "Gamma", "Alpha"]);
        assert_eq!(tree.page(0).unwrap().selected, 3);
        drop(tree);

        assert_eq!(dash.focused_title(), "Alpha");
        let saved = DashConfig::load(&config_path).unwrap();
        assert_eq!(saved.sort_for_page("Games"), Some(SortMode::RatingDesc));
    }

    #[test]
    fn test_resort_waits_for_scan() {
        let (_dir, library) = temp_library();
        let mut dash = Dashboard::new(config(&["Games", "Recent"]), library);
        let workers = dash.scan_db();

        assert!(matches!(
            dash.resort_page("Games"),
            Err(DashError::ScanInProgress(_))
        ));
        // The Recent page keeps its recency order
        assert!(dash.resort_page("Recent").is_ok());
        assert!(matches!(
            dash.resort_page("Nope"),
            Err(DashError::UnknownPage(_))
        ));

        for worker in workers {
            worker.run().unwrap();
        }
        assert!(dash.resort_page("Games").is_ok());
    }

    #[test]
    fn test_finished_scan_refocuses_first_item() {
        let (_dir, library) = temp_library();
        library.insert_title("Halo", "/g/halo/default.xbe", "Games", None, None).unwrap();
        let mut dash = Dashboard::new(config(&["Games"]), library);

        let workers = dash.scan_db();
        // Nothing scanned yet, the placeholder holds the focus
        assert_eq!(dash.focused_title(), "No items found");

        for worker in workers {
            let added = worker.run();
            let summary = ScanSummary {
                page: 0,
                title: "Games".to_string(),
                result: added.map_err(Arc::new),
            };
            assert_eq!(dash.scan_finished(&summary).map(|f| f.index), Some(1));
        }
        assert_eq!(dash.focused_title(), "Halo");
    }

    #[test]
    fn test_rescan_replaces_pages() {
        let (_dir, mut dash, _) = with_thumbnails(2, 10 * IMAGE_BYTES);
        dash.request_visible_thumbnails();
        let jobs = dash.take_decode_jobs();
        assert!(succeed(&mut dash, &jobs[0]));

        let workers = dash.scan_db();
        assert_eq!(workers.len(), 2);
        assert!(dash.cache().is_empty());
        assert!(dash.pending().is_empty());
        assert!(jobs[1].handle.is_aborted());
        assert_eq!(dash.tree.lock().child_count(0), 1);
    }
}
