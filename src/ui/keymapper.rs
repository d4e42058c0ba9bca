//! Key mapping for terminal input
//!
//! Converts crossterm events back into the raw byte stream the key decoder
//! understands.

use bitflags::bitflags;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::keys::{
    RawKey, CSI_DOWN, CSI_END, CSI_HOME, CSI_LEFT, CSI_RIGHT, CSI_UP, KEY_BACKSPACE, KEY_ENTER,
    KEY_ESCAPE, KEY_LEFT_BRACKET,
};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const CTRL = 0b0001;
        const ALT  = 0b0010;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting terminal events to raw keys
pub struct KeyMapper;

impl KeyMapper {
    /// Map a terminal event to the raw keys it stands for
    pub fn map_event(event: &Event) -> Vec<RawKey> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => Self::map(key)
                .unwrap_or_default()
                .into_iter()
                .map(RawKey::Byte)
                .collect(),
            Event::Resize(_, _) => vec![RawKey::Resize],
            _ => Vec::new(),
        }
    }

    /// Map a crossterm KeyEvent to bytes
    pub fn map(event: &KeyEvent) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Some(Self::map_char(ch, mods)),

            KeyCode::Enter => Some(vec![KEY_ENTER]),

            KeyCode::Backspace => {
                if mods.contains(Modifiers::ALT) {
                    Some(vec![KEY_ESCAPE, KEY_BACKSPACE])
                } else {
                    Some(vec![KEY_BACKSPACE])
                }
            }

            KeyCode::Tab => Some(vec![0x09]),
            KeyCode::Esc => Some(vec![KEY_ESCAPE]),

            // Modifiers are dropped: the decoder only knows plain sequences
            KeyCode::Up => Some(Self::csi(CSI_UP)),
            KeyCode::Down => Some(Self::csi(CSI_DOWN)),
            KeyCode::Right => Some(Self::csi(CSI_RIGHT)),
            KeyCode::Left => Some(Self::csi(CSI_LEFT)),
            KeyCode::Home => Some(Self::csi(CSI_HOME)),
            KeyCode::End => Some(Self::csi(CSI_END)),

            _ => None,
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: Modifiers) -> Vec<u8> {
        // Ctrl + letter = control character
        if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
            if ch.is_ascii_lowercase() {
                return vec![(ch as u8) - b'a' + 1];
            } else if ch.is_ascii_uppercase() {
                return vec![(ch as u8) - b'A' + 1];
            }
        }

        // Alt + key = ESC + key
        if mods.contains(Modifiers::ALT) && !mods.contains(Modifiers::CTRL) {
            let mut bytes = vec![KEY_ESCAPE];
            bytes.extend(ch.to_string().as_bytes());
            return bytes;
        }

        ch.to_string().into_bytes()
    }

    fn csi(key: u8) -> Vec<u8> {
        vec![KEY_ESCAPE, KEY_LEFT_BRACKET, key]
    }
}
