/// Decodes in flight, swept on every refresh tick
///
/// The sweep aborts decodes whose tile scrolled out of view and drops
/// entries whose decode is finished. It never evicts resident thumbnails;
/// only cache pressure does that.
use crate::state::data::ItemId;

/// What the sweep found for one pending item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    /// Still decoding and visible, keep tracking it
    Running,
    /// Finished, aborted, or the item is gone
    Done,
}

#[derive(Debug, Default)]
pub struct PendingDecodeTracker {
    items: Vec<ItemId>,
}

impl PendingDecodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a decoding item. Each item is tracked at most once.
    pub fn register(&mut self, item: ItemId) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    /// Visit every tracked item in registration order and drop the ones
    /// reported as [`PendingStatus::Done`]. Returns how many were dropped.
    pub fn sweep(&mut self, mut visit: impl FnMut(ItemId) -> PendingStatus) -> usize {
        let before = self.items.len();
        self.items.retain(|item| visit(*item) == PendingStatus::Running);
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
impl PendingDecodeTracker {
    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
