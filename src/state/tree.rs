/// Widget tree shared by the GUI thread and the scan workers
///
/// Items live in an arena keyed by [`ItemId`]; each page keeps the order of
/// its children. Index 0 of every page is the hidden placeholder item.
///
/// The tree is only ever touched through [`SharedTree`], whose mutex is the
/// single exclusivity lock of the dashboard. It is not reentrant.
///
/// Every change to a page's children, geometry or thumbnails sets its layout
/// dirty flag. The refresh tick reads it back to decide whether visible
/// thumbnails need requesting.
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use super::data::{ItemId, TitleItem, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};

pub type SharedTree = Arc<Mutex<WidgetTree>>;

/// Window size assumed until the first resize event
pub const DEFAULT_VIEW_SIZE: (f32, f32) = (1280.0, 720.0);

/// Height of the page header and footer labels
pub const LABEL_HEIGHT: f32 = 40.0;

#[derive(Debug)]
struct Node {
    page: usize,
    item: TitleItem,
}

/// The scroll container of one page
#[derive(Debug)]
pub struct PageGrid {
    pub title: String,
    /// Bumped every time the page is recreated, so old scans can tell
    pub generation: u64,
    /// Selected child index
    pub selected: usize,
    /// Container width, a whole number of tiles
    pub width: u32,
    /// Scroll offset of the container
    pub scroll_offset: f32,
    /// Visible height of the container
    pub view_height: f32,
    children: Vec<ItemId>,
    layout_dirty: bool,
}

impl PageGrid {
    pub fn tiles_per_row(&self) -> usize {
        (self.width / THUMBNAIL_WIDTH).max(1) as usize
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    /// Child indices (never the placeholder) in rows overlapping the viewport
    pub fn visible_range(&self) -> Range<usize> {
        let tile = THUMBNAIL_HEIGHT as f32;
        let tiles_per_row = self.tiles_per_row();
        let first_row = (self.scroll_offset.max(0.0) / tile).floor() as usize;
        let end_row = ((self.scroll_offset.max(0.0) + self.view_height.max(0.0)) / tile).ceil() as usize;

        let start = (1 + first_row * tiles_per_row).min(self.children.len());
        let end = (1 + end_row * tiles_per_row).min(self.children.len());
        start..end.max(start)
    }

    /// Scroll offset that brings child `index` fully into view,
    /// or None if it already is
    pub fn scroll_target(&self, index: usize) -> Option<f32> {
        if index == 0 {
            return None;
        }

        let tile = THUMBNAIL_HEIGHT as f32;
        let top = ((index - 1) / self.tiles_per_row()) as f32 * tile;
        let bottom = top + tile;

        if top < self.scroll_offset {
            Some(top)
        } else if bottom > self.scroll_offset + self.view_height {
            Some((bottom - self.view_height).max(0.0))
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct WidgetTree {
    nodes: HashMap<ItemId, Node>,
    pages: Vec<PageGrid>,
    active_page: usize,
    next_id: u64,
    view_size: (f32, f32),
}

impl Default for WidgetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetTree {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            pages: Vec::new(),
            active_page: 0,
            next_id: 0,
            view_size: DEFAULT_VIEW_SIZE,
        }
    }

    pub fn shared(self) -> SharedTree {
        Arc::new(Mutex::new(self))
    }

    /// Append a page holding only its placeholder. Returns the page index.
    pub fn add_page(&mut self, title: &str, generation: u64) -> usize {
        let index = self.pages.len();
        let (width, view_height) = self.page_geometry();

        self.pages.push(PageGrid {
            title: title.to_string(),
            generation,
            // Start on the first real item
            selected: 1,
            width,
            scroll_offset: 0.0,
            view_height,
            children: Vec::new(),
            layout_dirty: true,
        });

        let placeholder = self.alloc_id();
        self.nodes.insert(
            placeholder,
            Node {
                page: index,
                item: TitleItem::placeholder(),
            },
        );
        self.pages[index].children.push(placeholder);

        index
    }

    /// Destroy every page and item, returning the destroyed items
    pub fn remove_pages(&mut self) -> Vec<(ItemId, TitleItem)> {
        self.pages.clear();
        self.active_page = 0;
        self.nodes.drain().map(|(id, node)| (id, node.item)).collect()
    }

    pub fn page(&self, page: usize) -> Option<&PageGrid> {
        self.pages.get(page)
    }

    pub fn page_mut(&mut self, page: usize) -> Option<&mut PageGrid> {
        self.pages.get_mut(page)
    }

    /// Whether `page` still belongs to the scan of `generation`
    pub fn is_current(&self, page: usize, generation: u64) -> bool {
        self.pages.get(page).is_some_and(|p| p.generation == generation)
    }

    pub fn set_active_page(&mut self, page: usize) {
        self.active_page = page;
    }

    /// Append a child item to `page`. None if the page does not exist.
    pub fn create_item(&mut self, page: usize, item: TitleItem) -> Option<ItemId> {
        if page >= self.pages.len() {
            return None;
        }

        let id = self.alloc_id();
        self.nodes.insert(id, Node { page, item });

        let grid = &mut self.pages[page];
        grid.children.push(id);
        grid.layout_dirty = true;
        Some(id)
    }

    /// Remove an item from its page and the arena
    pub fn delete_item(&mut self, id: ItemId) -> Option<TitleItem> {
        let node = self.nodes.remove(&id)?;

        if let Some(grid) = self.pages.get_mut(node.page) {
            grid.children.retain(|child| *child != id);
            grid.layout_dirty = true;
        }
        Some(node.item)
    }

    pub fn item(&self, id: ItemId) -> Option<&TitleItem> {
        self.nodes.get(&id).map(|node| &node.item)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut TitleItem> {
        self.nodes.get_mut(&id).map(|node| &mut node.item)
    }

    pub fn page_of(&self, id: ItemId) -> Option<usize> {
        self.nodes.get(&id).map(|node| node.page)
    }

    pub fn child(&self, page: usize, index: usize) -> Option<ItemId> {
        self.pages.get(page)?.children.get(index).copied()
    }

    pub fn child_count(&self, page: usize) -> usize {
        self.pages.get(page).map_or(0, |p| p.children.len())
    }

    /// Replace the child order of `page`. The new order must hold the same ids.
    pub fn set_children(&mut self, page: usize, children: Vec<ItemId>) {
        if let Some(grid) = self.pages.get_mut(page) {
            debug_assert_eq!(grid.children.len(), children.len());
            grid.children = children;
            grid.layout_dirty = true;
        }
    }

    pub fn mark_layout_dirty(&mut self, page: usize) {
        if let Some(grid) = self.pages.get_mut(page) {
            grid.layout_dirty = true;
        }
    }

    /// Read and clear the dirty flag of `page`
    pub fn take_layout_dirty(&mut self, page: usize) -> bool {
        self.pages
            .get_mut(page)
            .map(|grid| std::mem::take(&mut grid.layout_dirty))
            .unwrap_or(false)
    }

    /// An item is visible if it sits in the viewport of the active page
    pub fn is_visible(&self, id: ItemId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if node.page != self.active_page {
            return false;
        }

        let grid = &self.pages[node.page];
        let range = grid.visible_range();
        grid.children[range].contains(&id)
    }

    /// Visible items of the active page
    pub fn visible_items(&self) -> Vec<ItemId> {
        match self.pages.get(self.active_page) {
            Some(grid) => grid.children[grid.visible_range()].to_vec(),
            None => Vec::new(),
        }
    }

    /// Resize every page to a window of `width` x `height`
    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.view_size = (width, height);
        let (grid_width, view_height) = self.page_geometry();

        for grid in &mut self.pages {
            grid.width = grid_width;
            grid.view_height = view_height;
            grid.layout_dirty = true;
        }
    }

    pub fn set_scroll_offset(&mut self, page: usize, offset: f32) {
        if let Some(grid) = self.pages.get_mut(page) {
            grid.scroll_offset = offset.max(0.0);
        }
    }

    /// Make the width exactly equal to the highest number of thumbnails that fit
    fn page_geometry(&self) -> (u32, f32) {
        let (width, height) = self.view_size;
        let width = width.max(0.0) as u32;
        let grid_width = (width - width % THUMBNAIL_WIDTH).max(THUMBNAIL_WIDTH);
        let view_height = (height - 2.0 * LABEL_HEIGHT).max(THUMBNAIL_HEIGHT as f32);
        (grid_width, view_height)
    }

    fn alloc_id(&mut self) -> ItemId {
        self.next_id += 1;
        ItemId(self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_items(count: usize) -> (WidgetTree, Vec<ItemId>) {
        let mut tree = WidgetTree::new();
        let page = tree.add_page("Games", 1);
        let ids = (0..count)
            .map(|i| tree.create_item(page, TitleItem::new(i as i64 + 1, "Title")).unwrap())
            .collect();
        (tree, ids)
    }

    #[test]
    fn test_page_starts_with_placeholder() {
        let mut tree = WidgetTree::new();
        let page = tree.add_page("Games", 1);

        assert_eq!(tree.child_count(page), 1);
        let placeholder = tree.child(page, 0).unwrap();
        assert!(tree.item(placeholder).unwrap().is_placeholder());
        assert!(tree.take_layout_dirty(page));
        assert!(!tree.take_layout_dirty(page));
    }

    #[test]
    fn test_delete_item_removes_child() {
        let (mut tree, ids) = tree_with_items(3);

        let item = tree.delete_item(ids[1]).unwrap();
        assert_eq!(item.db_id, 2);
        assert!(tree.item(ids[1]).is_none());
        assert_eq!(tree.children_of(0), vec![ids[0], ids[2]]);
        assert!(tree.delete_item(ids[1]).is_none());
    }

    #[test]
    fn test_visible_range_follows_scroll() {
        let (mut tree, ids) = tree_with_items(40);
        // 5 tiles per row, 2 rows tall
        tree.set_view_size(5.0 * THUMBNAIL_WIDTH as f32 + 30.0, 2.0 * THUMBNAIL_HEIGHT as f32 + 2.0 * LABEL_HEIGHT);

        let grid = tree.page(0).unwrap();
        assert_eq!(grid.tiles_per_row(), 5);
        assert_eq!(grid.visible_range(), 1..11);
        assert!(tree.is_visible(ids[0]));
        assert!(!tree.is_visible(ids[10]));

        tree.set_scroll_offset(0, 3.0 * THUMBNAIL_HEIGHT as f32);
        assert_eq!(tree.page(0).unwrap().visible_range(), 16..26);
        assert!(tree.is_visible(ids[15]));
        assert!(!tree.is_visible(ids[0]));
    }

    #[test]
    fn test_inactive_page_is_not_visible() {
        let (mut tree, ids) = tree_with_items(2);
        tree.add_page("Other", 1);
        tree.set_active_page(1);
        assert!(!tree.is_visible(ids[0]));
        assert!(tree.visible_items().is_empty());
    }

    #[test]
    fn test_scroll_target() {
        let (mut tree, _) = tree_with_items(40);
        tree.set_view_size(5.0 * THUMBNAIL_WIDTH as f32, 2.0 * THUMBNAIL_HEIGHT as f32 + 2.0 * LABEL_HEIGHT);
        let tile = THUMBNAIL_HEIGHT as f32;

        let grid = tree.page(0).unwrap();
        assert_eq!(grid.scroll_target(3), None);
        // Row 3 needs the view to end at its bottom edge
        assert_eq!(grid.scroll_target(16), Some(2.0 * tile));

        tree.set_scroll_offset(0, 4.0 * tile);
        assert_eq!(tree.page(0).unwrap().scroll_target(1), Some(0.0));
    }

    #[test]
    fn test_generation_check() {
        let mut tree = WidgetTree::new();
        tree.add_page("Games", 7);
        assert!(tree.is_current(0, 7));
        assert!(!tree.is_current(0, 6));

        let removed = tree.remove_pages();
        assert_eq!(removed.len(), 1);
        assert!(!tree.is_current(0, 7));
        assert!(tree.create_item(0, TitleItem::new(1, "Late")).is_none());
    }

    impl WidgetTree {
        fn children_of(&self, page: usize) -> Vec<ItemId> {
            self.page(page).unwrap().children()[1..].to_vec()
        }
    }
}
