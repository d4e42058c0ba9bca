//! Terminal lifecycle and input using crossterm

use std::collections::VecDeque;
use std::io::{self, Write};

use crossterm::{
    cursor::Show,
    event, execute,
    style::{Attribute, ResetColor, SetAttribute},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::{debug, warn};

use crate::controller::Console;
use crate::core::keys::RawKey;
use crate::ui::KeyMapper;

/// Raw mode + alternate screen for as long as the guard lives.
///
/// Dropping the guard restores the terminal, which also covers early
/// returns and errors out of the main loop.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Clear(ClearType::All)) {
            let _ = terminal::disable_raw_mode();
            return Err(e);
        }
        debug!("Terminal initialized");
        Ok(Self { active: true })
    }

    /// Restore the terminal
    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset), Show);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;
        debug!("Terminal restored");
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Console reading crossterm events and handing them out one raw key at a time
#[derive(Default)]
pub struct TerminalConsole {
    pending: VecDeque<RawKey>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for TerminalConsole {
    fn read_key(&mut self) -> io::Result<RawKey> {
        loop {
            if let Some(key) = self.pending.pop_front() {
                return Ok(key);
            }
            let ev = event::read()?;
            self.pending.extend(KeyMapper::map_event(&ev));
        }
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let (cols, rows) = terminal::size()?;
        Ok((rows, cols))
    }
}
