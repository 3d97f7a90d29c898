/// Shared data structures for the dashboard state
///
/// These structs represent the data model that flows between
/// the database layer, the widget tree and the thumbnail pipeline.
use iced::widget::image;
use std::path::PathBuf;

use crate::thumb::decoder::DecodeHandle;

/// Database id of the placeholder item shown when a page has no titles
pub const NO_ITEMS_DB_ID: i64 = -1;

/// Text of the placeholder item
pub const NO_ITEMS_TITLE: &str = "No items found";

/// Longest title kept for display (in characters)
pub const TITLE_MAX_LEN: usize = 255;

/// Width every thumbnail is scaled to, in pixels
pub const THUMBNAIL_WIDTH: u32 = 175;

/// Height of one grid tile, in pixels
pub const THUMBNAIL_HEIGHT: u32 = 248;

/// Failed decodes allowed before a thumbnail is given up for the session
pub const MAX_DECODE_FAILURES: u8 = 3;

/// Stable identity of one item widget in the tree.
///
/// Widgets refer to their TitleItem through this id instead of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

/// One entry of a page's grid
#[derive(Debug)]
pub struct TitleItem {
    /// Database id (NO_ITEMS_DB_ID for the placeholder)
    pub db_id: i64,
    /// Display title
    pub title: String,
    /// Thumbnail decode state, None if the title has no thumbnail file
    pub thumbnail: Option<ThumbnailState>,
}

impl TitleItem {
    pub fn new(db_id: i64, title: &str) -> Self {
        Self {
            db_id,
            title: title.chars().take(TITLE_MAX_LEN).collect(),
            thumbnail: None,
        }
    }

    /// The always-present index 0 item of a page
    pub fn placeholder() -> Self {
        Self::new(NO_ITEMS_DB_ID, NO_ITEMS_TITLE)
    }

    pub fn is_placeholder(&self) -> bool {
        self.db_id == NO_ITEMS_DB_ID
    }
}

/// Where a thumbnail is in its decode lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbPhase {
    /// Nothing decoded and nothing running
    Untried,
    /// A decode is in flight
    Decoding,
    /// A canvas holding the decoded pixels exists (and is accounted in the cache)
    Resident,
}

/// Visual resource built from a decoded thumbnail. The handle owns the
/// only copy of the pixels.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub handle: image::Handle,
    pub width: u32,
    pub height: u32,
    /// Zoom in 1/256 units, chosen so the canvas is THUMBNAIL_WIDTH wide
    pub zoom: u32,
}

impl Canvas {
    /// Width the canvas is drawn at
    pub fn shown_width(&self) -> u32 {
        self.width * self.zoom / 256
    }
}

/// Thumbnail bookkeeping of a TitleItem
#[derive(Debug)]
pub struct ThumbnailState {
    /// The `.tbn` file next to the launch path
    pub path: PathBuf,
    /// Running decode, if any
    pub decode: Option<DecodeHandle>,
    /// Canvas drawn in the tile, if resident
    pub canvas: Option<Canvas>,
    /// Number of decodes that came back empty
    pub failures: u8,
    /// Decoded image is larger than the whole thumbnail cache
    pub too_large: bool,
}

impl ThumbnailState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            decode: None,
            canvas: None,
            failures: 0,
            too_large: false,
        }
    }

    pub fn phase(&self) -> ThumbPhase {
        if self.decode.is_some() {
            ThumbPhase::Decoding
        } else if self.canvas.is_some() {
            ThumbPhase::Resident
        } else {
            ThumbPhase::Untried
        }
    }

    /// Whether a visibility event should start a decode
    pub fn wants_decode(&self) -> bool {
        self.phase() == ThumbPhase::Untried && self.failures < MAX_DECODE_FAILURES && !self.too_large
    }

    /// Abort a running decode. Clearing an already empty handle is a no-op.
    pub fn abort_decode(&mut self) {
        if let Some(handle) = self.decode.take() {
            handle.abort();
        }
    }
}

/// Sort order of a page's titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    NameAsc,
    RatingDesc,
    LastLaunchDesc,
    ReleaseDateDesc,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [
        SortMode::NameAsc,
        SortMode::RatingDesc,
        SortMode::LastLaunchDesc,
        SortMode::ReleaseDateDesc,
    ];

    /// Map a configured index to a mode, clamping out-of-range values
    pub fn from_index(index: i64) -> Self {
        let clamped = index.clamp(0, Self::ALL.len() as i64 - 1);
        Self::ALL[clamped as usize]
    }

    pub fn index(self) -> usize {
        match self {
            SortMode::NameAsc => 0,
            SortMode::RatingDesc => 1,
            SortMode::LastLaunchDesc => 2,
            SortMode::ReleaseDateDesc => 3,
        }
    }

    /// Column and direction used in ORDER BY
    pub fn order_by(self) -> (&'static str, &'static str) {
        match self {
            SortMode::NameAsc => ("title", "ASC"),
            SortMode::RatingDesc => ("rating", "DESC"),
            SortMode::LastLaunchDesc => ("last_launch", "DESC"),
            SortMode::ReleaseDateDesc => ("release_date", "DESC"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::NameAsc => "Name",
            SortMode::RatingDesc => "Rating",
            SortMode::LastLaunchDesc => "Last played",
            SortMode::ReleaseDateDesc => "Release date",
        }
    }

    /// Next mode, wrapping around
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// One row streamed by a page scan
#[derive(Debug, Clone, PartialEq)]
pub struct TitleRow {
    pub db_id: i64,
    pub title: String,
    pub launch_path: String,
}

/// Synopsis data shown by the info overlay
#[derive(Debug, Clone, PartialEq)]
pub struct TitleDetails {
    pub db_id: i64,
    pub title: String,
    pub launch_path: String,
    pub rating: Option<f64>,
    pub release_date: Option<String>,
    pub last_launch: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_mode_clamps_index() {
        assert_eq!(SortMode::from_index(-4), SortMode::NameAsc);
        assert_eq!(SortMode::from_index(2), SortMode::LastLaunchDesc);
        assert_eq!(SortMode::from_index(99), SortMode::ReleaseDateDesc);
    }

    #[test]
    fn test_sort_mode_cycles() {
        assert_eq!(SortMode::ReleaseDateDesc.next(), SortMode::NameAsc);
        assert_eq!(SortMode::NameAsc.prev(), SortMode::ReleaseDateDesc);
    }

    #[test]
    fn test_untried_phase_and_retry_limit() {
        let mut thumb = ThumbnailState::new(PathBuf::from("/games/a/default.tbn"));
        assert_eq!(thumb.phase(), ThumbPhase::Untried);
        assert!(thumb.wants_decode());

        thumb.failures = MAX_DECODE_FAILURES;
        assert!(!thumb.wants_decode());

        // Nothing running, aborting is a no-op
        thumb.abort_decode();
        assert_eq!(thumb.phase(), ThumbPhase::Untried);
    }

    #[test]
    fn test_too_large_is_never_retried() {
        let mut thumb = ThumbnailState::new(PathBuf::from("/games/a/default.tbn"));
        thumb.too_large = true;
        assert_eq!(thumb.phase(), ThumbPhase::Untried);
        assert!(!thumb.wants_decode());
    }

    #[test]
    fn test_canvas_shown_width() {
        let canvas = Canvas {
            handle: image::Handle::from_rgba(2, 1, vec![0; 8]),
            width: 2,
            height: 1,
            zoom: THUMBNAIL_WIDTH * 256 / 2,
        };
        assert_eq!(canvas.shown_width(), THUMBNAIL_WIDTH);
    }

    #[test]
    fn test_title_is_truncated() {
        let long = "x".repeat(TITLE_MAX_LEN + 20);
        assert_eq!(TitleItem::new(4, &long).title.chars().count(), TITLE_MAX_LEN);
        assert!(TitleItem::placeholder().is_placeholder());
    }
}
