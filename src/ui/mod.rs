/// Dashboard views and key bindings
///
/// - `grid.rs` - the page header, the tile grid and the footer
/// - `overlay.rs` - info, settings and launch confirmation panels
pub mod grid;
pub mod overlay;

use iced::keyboard::{key::Named, Key, Modifiers};

use crate::dash::navigator::{DashInput, Direction, Motion};
use crate::Message;

/// A key the dashboard reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Input(DashInput),
    /// Close the open overlay
    Back,
}

/// Translate a key into a dashboard key press
pub fn key_press(key: &Key) -> Option<KeyPress> {
    let input = match key {
        Key::Named(Named::ArrowUp) => DashInput::Move(Motion::Step(Direction::Up)),
        Key::Named(Named::ArrowDown) => DashInput::Move(Motion::Step(Direction::Down)),
        Key::Named(Named::ArrowLeft) => DashInput::Move(Motion::Step(Direction::Left)),
        Key::Named(Named::ArrowRight) => DashInput::Move(Motion::Step(Direction::Right)),
        Key::Named(Named::PageUp) => DashInput::Move(Motion::JumpBack),
        Key::Named(Named::PageDown) => DashInput::Move(Motion::JumpForward),
        Key::Named(Named::Enter) => DashInput::Confirm,
        Key::Named(Named::Escape) | Key::Named(Named::Backspace) => return Some(KeyPress::Back),
        Key::Character(c) => match c.as_str() {
            "[" | "q" => DashInput::PrevPage,
            "]" | "e" => DashInput::NextPage,
            "i" => DashInput::Info,
            "s" => DashInput::Settings,
            _ => return None,
        },
        _ => return None,
    };
    Some(KeyPress::Input(input))
}

/// Keyboard subscription handler
pub fn on_key(key: Key, _modifiers: Modifiers) -> Option<Message> {
    key_press(&key).map(Message::Key)
}
