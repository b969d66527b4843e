mod handler;
mod ui;

pub use handler::{handle_key_event, AppAction, KeyMode};
pub use ui::draw;
