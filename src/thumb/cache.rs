/// Byte-bounded LRU of resident thumbnails
///
/// The cache only tracks sizes and recency. It does not own the pixels:
/// when an entry is evicted the caller's release closure drops the item's
/// canvas, which holds the pixels. The closure cannot reach the cache,
/// so eviction never re-enters it.
use lru::LruCache;

use crate::state::data::{ItemId, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use crate::thumb::decoder::BYTES_PER_PIXEL;

/// Total bytes of decoded thumbnails kept resident
pub const THUMBNAIL_CACHE_SIZE: usize = 16 * 1024 * 1024;

/// Worst-case decoded size of one thumbnail
pub const THUMBNAIL_SIZE_HINT: usize =
    THUMBNAIL_WIDTH as usize * THUMBNAIL_HEIGHT as usize * BYTES_PER_PIXEL;

#[derive(Debug)]
pub struct ThumbnailCache {
    entries: LruCache<ItemId, usize>,
    capacity: usize,
    used: usize,
}

impl ThumbnailCache {
    /// Create a cache holding at most `capacity` bytes.
    /// `size_hint` is the expected size of one entry.
    pub fn new(capacity: usize, size_hint: usize) -> Self {
        log::info!(
            "Thumbnail cache: {} KB, about {} thumbnails",
            capacity / 1024,
            capacity / size_hint.max(1)
        );

        Self {
            // Memory-based eviction, the entry count is unbounded
            entries: LruCache::unbounded(),
            capacity,
            used: 0,
        }
    }

    /// Record `item` as the most recent entry of `size` bytes, then evict
    /// least recently inserted entries (never `item` itself) until the total
    /// fits. `release` is called for every evicted item.
    ///
    /// Returns false if `item` alone exceeds the capacity; it is not kept
    /// and the caller must release it.
    pub fn insert(&mut self, item: ItemId, size: usize, mut release: impl FnMut(ItemId)) -> bool {
        if let Some(old) = self.entries.pop(&item) {
            self.used -= old;
        }

        if size > self.capacity {
            log::warn!(
                "Thumbnail of {} bytes exceeds the {} byte cache, not keeping it",
                size,
                self.capacity
            );
            return false;
        }

        self.entries.put(item, size);
        self.used += size;

        while self.used > self.capacity {
            match self.entries.pop_lru() {
                Some((evicted, evicted_size)) => {
                    self.used -= evicted_size;
                    log::debug!("Evicting thumbnail {:?} ({} bytes)", evicted, evicted_size);
                    release(evicted);
                }
                None => break,
            }
        }

        true
    }

    /// Forget `item` without releasing anything. No-op if absent.
    pub fn remove(&mut self, item: ItemId) -> Option<usize> {
        let size = self.entries.pop(&item)?;
        self.used -= size;
        Some(size)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
impl ThumbnailCache {
    pub fn contains(&self, item: ItemId) -> bool {
        self.entries.contains(&item)
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(THUMBNAIL_CACHE_SIZE, THUMBNAIL_SIZE_HINT)
    }
}
