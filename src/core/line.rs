//! Line editing buffer
//!
//! Holds the expression being edited together with a cursor. The cursor is
//! a character index and always stays within `0..=len`.

use unicode_width::UnicodeWidthChar;

use super::keys::KeyEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    chars: Vec<char>,
    cursor: usize,
}

impl LineBuffer {
    /// Create a buffer holding `text` with the cursor at the end
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let cursor = chars.len();
        Self { chars, cursor }
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Terminal column of the cursor, accounting for wide characters
    pub fn display_column(&self) -> usize {
        self.chars[..self.cursor]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    pub fn insert(&mut self, ch: char) {
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn move_to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_to_end(&mut self) {
        self.cursor = self.chars.len();
    }

    pub fn delete_backward(&mut self) {
        if self.cursor > 0 {
            self.chars.remove(self.cursor - 1);
            self.cursor -= 1;
        }
    }

    pub fn delete_to_end(&mut self) {
        self.chars.truncate(self.cursor);
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
    }

    /// Apply an editing event. Returns false for events that do not edit
    /// the line (submit, resize, quit, unknown).
    pub fn apply(&mut self, event: &KeyEvent) -> bool {
        match *event {
            KeyEvent::InsertChar(ch) => self.insert(ch),
            KeyEvent::MoveLeft => self.move_left(),
            KeyEvent::MoveRight => self.move_right(),
            KeyEvent::MoveToStart => self.move_to_start(),
            KeyEvent::MoveToEnd => self.move_to_end(),
            KeyEvent::DeleteBackward => self.delete_backward(),
            KeyEvent::DeleteToEnd => self.delete_to_end(),
            KeyEvent::ClearLine => self.clear(),
            KeyEvent::Submit | KeyEvent::Resize | KeyEvent::Quit | KeyEvent::Unknown => {
                return false
            }
        }
        true
    }
}
