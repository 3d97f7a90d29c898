/// Reorder a page's existing item widgets to a new sort order
///
/// Widgets are moved, never recreated, so resident thumbnails survive.
/// Finding each id is a linear scan over the children (O(n²) overall),
/// fine for the page sizes the dashboard shows.
use crate::error::{DashError, DashResult};
use crate::state::data::ItemId;
use crate::state::tree::WidgetTree;

/// Reorder the children of `page` to follow `sorted_ids` (database ids).
///
/// The placeholder stays at index 0. Children the query did not return keep
/// their relative order after the sorted ones. An id with no matching child
/// means the database and the tree disagree and is a fatal error.
pub fn resort_children(tree: &mut WidgetTree, page: usize, sorted_ids: &[i64]) -> DashResult<()> {
    let grid = tree
        .page(page)
        .ok_or_else(|| DashError::UnknownPage(page.to_string()))?;
    let title = grid.title.clone();
    let children = grid.children().to_vec();

    // The first child is the placeholder; nothing to sort without real items
    if children.len() <= 1 {
        return Ok(());
    }

    let mut remaining: Vec<ItemId> = children[1..].to_vec();
    let mut sorted = Vec::with_capacity(children.len());
    sorted.push(children[0]);

    for db_id in sorted_ids {
        let position = remaining
            .iter()
            .position(|id| tree.item(*id).is_some_and(|item| item.db_id == *db_id))
            .ok_or_else(|| DashError::ResortDesync {
                page: title.clone(),
                db_id: *db_id,
            })?;
        sorted.push(remaining.remove(position));
    }

    if !remaining.is_empty() {
        log::warn!(
            "⚠️  {} items on page {:?} were not returned by the sort query",
            remaining.len(),
            title
        );
        sorted.extend(remaining);
    }

    tree.set_children(page, sorted);
    tree.mark_layout_dirty(page);
    Ok(())
}
