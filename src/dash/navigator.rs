/// Grid navigation state machine
///
/// Selection moves over a wrapping grid of `tiles_per_row` columns. Index 0
/// is the placeholder: it is only selected when a page has no real items.

/// Rows skipped by one press of a shoulder trigger
pub const BIG_STEP_ROWS: usize = 8;

/// Directional pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Selection movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Step(Direction),
    /// Left trigger: up by BIG_STEP_ROWS rows
    JumpBack,
    /// Right trigger: down by BIG_STEP_ROWS rows
    JumpForward,
}

/// Every input the dashboard reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashInput {
    Move(Motion),
    PrevPage,
    NextPage,
    Info,
    Settings,
    Confirm,
}

impl DashInput {
    /// Info and launch need a real item selected; settings are always open
    pub fn allowed_at(self, selected: usize) -> bool {
        match self {
            DashInput::Info | DashInput::Confirm => selected > 0,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridNavigator {
    page: usize,
}

impl GridNavigator {
    pub fn new(page: usize) -> Self {
        Self { page }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Move to page `page`, clamped to the existing pages
    pub fn go_to_page(&mut self, page: usize, page_count: usize) -> usize {
        self.page = page.min(page_count.saturating_sub(1));
        self.page
    }

    /// Previous or next page, clamped at both ends
    pub fn switch_page(&mut self, forward: bool, page_count: usize) -> usize {
        let target = if forward {
            self.page.saturating_add(1)
        } else {
            self.page.saturating_sub(1)
        };
        self.go_to_page(target, page_count)
    }

    /// Selection when (re-)entering a page: never the placeholder
    pub fn entry_index(selected: usize) -> usize {
        selected.max(1)
    }

    /// New selection after `motion` from `current` on a page with
    /// `child_count` children (placeholder included).
    pub fn move_selection(
        current: usize,
        motion: Motion,
        tiles_per_row: usize,
        child_count: usize,
    ) -> usize {
        let last_index = child_count.saturating_sub(1) as isize;
        let row = tiles_per_row.max(1) as isize;
        let current = current as isize;

        let new_index = match motion {
            // Never stay on the placeholder
            Motion::Step(Direction::Up) | Motion::Step(Direction::Down) if current == 0 => 1,
            // At the start, loop to end
            Motion::Step(Direction::Up) if current <= 1 => last_index,
            // At the end, loop to start
            Motion::Step(Direction::Down) if current == last_index => 1,
            Motion::Step(Direction::Left) => current - 1,
            Motion::Step(Direction::Right) => current + 1,
            Motion::Step(Direction::Up) => current - row,
            Motion::Step(Direction::Down) => current + row,
            Motion::JumpBack => current - row * BIG_STEP_ROWS as isize,
            Motion::JumpForward => current + row * BIG_STEP_ROWS as isize,
        };

        // Prefer index 1 as index 0 is the placeholder,
        // but fall back to 0 if the page has no items
        new_index.max(1).clamp(0, last_index.max(0)) as usize
    }
}
