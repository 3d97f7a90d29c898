/// Panels drawn over the page grid
use iced::widget::{column, container, text};
use iced::{Element, Length};

use crate::dash::Dashboard;
use crate::state::data::{ItemId, SortMode, TitleDetails};
use crate::Message;

/// The panel currently open, if any
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Overlay {
    #[default]
    None,
    /// Synopsis of the selected title
    Info(TitleDetails),
    /// Sort picker for one page
    Settings { page: String, sort: SortMode },
    /// Launch confirmation
    ConfirmLaunch { item: ItemId, title: String },
}

impl Overlay {
    /// Settings panel for the current page
    pub fn settings(dashboard: &Dashboard) -> Self {
        match dashboard.page_title(dashboard.current_page()) {
            Some(page) => Overlay::Settings {
                page: page.to_string(),
                sort: dashboard.page_sort(page),
            },
            None => Overlay::None,
        }
    }
}

pub fn overlay_view(overlay: &Overlay) -> Option<Element<'_, Message>> {
    let lines: Vec<String> = match overlay {
        Overlay::None => return None,
        Overlay::Info(details) => vec![
            details.title.clone(),
            format!(
                "Rating: {}",
                details.rating.map_or("-".to_string(), |r| format!("{:.1}", r))
            ),
            format!("Released: {}", details.release_date.as_deref().unwrap_or("-")),
            format!("Last played: {}", details.last_launch.as_deref().unwrap_or("never")),
            details.launch_path.clone(),
            "Esc to close".to_string(),
        ],
        Overlay::Settings { page, sort } => vec![
            format!("Sort {} by", page),
            format!("<  {}  >", sort.label()),
            "Left/Right to change, Enter to apply, Esc to close".to_string(),
        ],
        Overlay::ConfirmLaunch { title, .. } => vec![
            format!("Launch {}?", title),
            "Enter to launch, Esc to cancel".to_string(),
        ],
    };

    let panel = column(lines.into_iter().map(|line| text(line).size(18).into())).spacing(12);

    Some(
        container(container(panel).padding(24).max_width(640).style(container::rounded_box))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into(),
    )
}
