//! User interface rendering and input handling.
//!
//! - **keymapper**: crossterm events to the raw byte stream the decoder reads
//! - **screen**: three-region layout (title, expression, output)
//! - **terminal**: raw mode / alternate screen guard and the crossterm console

pub mod keymapper;
pub mod screen;
pub mod terminal;

pub use keymapper::*;
pub use screen::{Screen, ScreenColors};
pub use terminal::{TerminalConsole, TerminalGuard};
