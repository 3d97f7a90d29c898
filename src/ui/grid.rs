/// Page view: header label, scrollable tile grid and footer label
use iced::widget::{column, container, image, row, scrollable, text, Space};
use iced::{Alignment, Border, Element, Length, Theme};

use crate::dash::Dashboard;
use crate::state::data::{TitleItem, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use crate::state::tree::{PageGrid, WidgetTree, LABEL_HEIGHT};
use crate::Message;

/// Id of the scroll container showing the current page
pub fn grid_scroll_id() -> scrollable::Id {
    scrollable::Id::new("page-grid")
}

pub fn dashboard_view(dashboard: &Dashboard) -> Element<'_, Message> {
    let page = dashboard.current_page();
    let Some(title) = dashboard.page_title(page) else {
        return container(text("No pages configured").size(24))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into();
    };

    let header = format!(
        "{}  ({}/{})  sorted by {}",
        title,
        page + 1,
        dashboard.page_count(),
        dashboard.page_sort(title).label()
    );

    let shared = dashboard.tree();
    let tree = shared.lock();
    let Some(grid) = tree.page(page) else {
        return text(header).into();
    };

    let footer = tree
        .child(page, grid.selected)
        .and_then(|id| tree.item(id))
        .map(|item| item.title.clone())
        .unwrap_or_default();

    column![
        label(header, 22.0),
        page_grid(&tree, grid),
        label(footer, 18.0),
    ]
    .width(Length::Fill)
    .height(Length::Fill)
    .into()
}

fn label<'a>(content: String, size: f32) -> Element<'a, Message> {
    container(text(content).size(size))
        .height(Length::Fixed(LABEL_HEIGHT))
        .center_y(Length::Fixed(LABEL_HEIGHT))
        .padding([0, 16])
        .into()
}

fn page_grid<'a>(tree: &WidgetTree, grid: &PageGrid) -> Element<'a, Message> {
    let children = grid.children();

    // Only the placeholder: show its text instead of an empty grid
    if children.len() <= 1 {
        let placeholder = children
            .first()
            .and_then(|id| tree.item(*id))
            .map(|item| item.title.clone())
            .unwrap_or_default();

        return container(text(placeholder).size(24))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into();
    }

    let tiles: Vec<Element<'a, Message>> = children
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(index, id)| tree.item(*id).map(|item| tile(item, index == grid.selected)))
        .collect();

    let content = create_grid(tiles, grid.tiles_per_row());

    scrollable(
        container(content)
            .width(Length::Fixed(grid.width as f32))
            .center_x(Length::Fill),
    )
    .id(grid_scroll_id())
    .on_scroll(Message::Scrolled)
    .direction(scrollable::Direction::Vertical(scrollable::Scrollbar::default()))
    .width(Length::Fill)
    .height(Length::Fill)
    .into()
}

fn create_grid<'a>(tiles: Vec<Element<'a, Message>>, tiles_per_row: usize) -> Element<'a, Message> {
    let mut rows = Vec::new();
    let mut tiles = tiles.into_iter().peekable();

    while tiles.peek().is_some() {
        let mut row_content = row![];
        for tile in tiles.by_ref().take(tiles_per_row) {
            row_content = row_content.push(tile);
        }
        rows.push(row_content.into());
    }

    column(rows).into()
}

fn tile<'a>(item: &TitleItem, selected: bool) -> Element<'a, Message> {
    let width = THUMBNAIL_WIDTH as f32;

    let picture: Element<'a, Message> = match item
        .thumbnail
        .as_ref()
        .and_then(|thumb| thumb.canvas.as_ref())
    {
        Some(canvas) => image(canvas.handle.clone())
            .width(Length::Fixed(canvas.shown_width() as f32))
            .into(),
        None => Space::new(Length::Fixed(width), Length::Fill).into(),
    };

    let content = column![
        container(picture).height(Length::Fill).center_x(Length::Fill),
        text(item.title.clone()).size(13),
    ]
    .align_x(Alignment::Center)
    .spacing(4);

    container(content)
        .width(Length::Fixed(width))
        .height(Length::Fixed(THUMBNAIL_HEIGHT as f32))
        .padding(6)
        .style(move |theme: &Theme| tile_style(theme, selected))
        .into()
}

fn tile_style(theme: &Theme, selected: bool) -> container::Style {
    let palette = theme.extended_palette();

    if selected {
        container::Style {
            background: Some(palette.background.weak.color.into()),
            border: Border {
                color: palette.primary.strong.color,
                width: 3.0,
                radius: 6.0.into(),
            },
            ..Default::default()
        }
    } else {
        container::Style::default()
    }
}
