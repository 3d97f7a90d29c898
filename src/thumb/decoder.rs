/// Asynchronous thumbnail decoding
///
/// A decode is queued with [`ThumbnailDecoder::queue`], which hands back a
/// [`DecodeJob`]. The shell runs the job through [`decode_thumbnail`] and the
/// resulting [`DecodeOutcome`] comes back to the GUI thread as a message.
///
/// Aborting a [`DecodeHandle`] is idempotent. An aborted decode may still
/// produce an outcome, but the outcome carries the old ticket and the
/// dashboard drops it, so an aborted thumbnail never becomes resident.
use image::ImageReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DashError, DashResult};
use crate::state::data::ItemId;

/// Extension of the thumbnail stored next to a launch path
pub const THUMBNAIL_EXTENSION: &str = "tbn";

/// Decoded thumbnails are RGBA8
pub const BYTES_PER_PIXEL: usize = 4;

/// Cancellable reference to a queued decode
#[derive(Debug, Clone)]
pub struct DecodeHandle {
    ticket: u64,
    aborted: Arc<AtomicBool>,
}

impl DecodeHandle {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Whether an outcome with this ticket may still be applied
    pub fn accepts(&self, ticket: u64) -> bool {
        self.ticket == ticket && !self.is_aborted()
    }
}

/// RGBA8 pixels of a decoded thumbnail
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Bytes accounted in the thumbnail cache
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Zoom (1/256 units) that scales this image to `target_width` pixels
    pub fn zoom_for_width(&self, target_width: u32) -> u32 {
        target_width * 256 / self.width.max(1)
    }
}

/// A decode waiting to be run
#[derive(Debug)]
pub struct DecodeJob {
    pub item: ItemId,
    pub path: PathBuf,
    pub handle: DecodeHandle,
}

/// Result of a decode, delivered back to the GUI thread.
/// `image` is None when the decode failed or was aborted.
#[derive(Debug, Clone)]
pub struct DecodeOutcome {
    pub item: ItemId,
    pub ticket: u64,
    pub image: Option<DecodedImage>,
}

/// Issues decode jobs with unique tickets
#[derive(Debug, Default)]
pub struct ThumbnailDecoder {
    next_ticket: u64,
}

impl ThumbnailDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a decode of `path` for `item`
    pub fn queue(&mut self, item: ItemId, path: &Path) -> DecodeJob {
        self.next_ticket += 1;
        let handle = DecodeHandle {
            ticket: self.next_ticket,
            aborted: Arc::new(AtomicBool::new(false)),
        };

        DecodeJob {
            item,
            path: path.to_path_buf(),
            handle,
        }
    }
}

/// Run a decode job on the blocking pool
pub async fn decode_thumbnail(job: DecodeJob) -> DecodeOutcome {
    let DecodeJob { item, path, handle } = job;
    let ticket = handle.ticket();

    // Spawn blocking because image decoding is CPU-intensive
    let image = tokio::task::spawn_blocking(move || {
        if handle.is_aborted() {
            return None;
        }

        match decode_blocking(&path) {
            // Aborted while decoding, the pixels are not wanted anymore
            Ok(_) if handle.is_aborted() => None,
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("⚠️  {}", e);
                None
            }
        }
    })
    .await
    .unwrap_or_else(|e| {
        log::warn!("Thumbnail task join error: {}", e);
        None
    });

    DecodeOutcome {
        item,
        ticket,
        image,
    }
}

/// Blocking implementation of thumbnail decoding
fn decode_blocking(path: &Path) -> DashResult<DecodedImage> {
    let decode_error = |reason: String| DashError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    // Thumbnails use a .tbn extension, so the format comes from the content
    let reader = ImageReader::open(path)
        .map_err(|e| decode_error(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?;

    let rgba = reader
        .decode()
        .map_err(|e| decode_error(e.to_string()))?
        .to_rgba8();

    let (width, height) = rgba.dimensions();
    log::debug!("Decoded thumbnail {}x{}: {}", width, height, path.display());

    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Thumbnail path for a launch path: the final three characters
/// (the extension) are replaced with `tbn`.
pub fn thumbnail_path_for(launch_path: &str) -> DashResult<PathBuf> {
    let len = launch_path.len();
    if len <= THUMBNAIL_EXTENSION.len() || !launch_path.is_char_boundary(len - 3) {
        return Err(DashError::LaunchPathTooShort(launch_path.to_string()));
    }

    let stem = &launch_path[..len - 3];
    Ok(PathBuf::from(format!("{}{}", stem, THUMBNAIL_EXTENSION)))
}

/// A thumbnail is only attempted if the file exists and is not a directory
pub fn thumbnail_exists(path: &Path) -> bool {
    path.is_file()
}
