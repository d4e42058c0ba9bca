//! Key decoder
//!
//! Turns raw input bytes into logical edit commands, resolving escape
//! sequences one byte at a time.

use tracing::debug;

pub const KEY_CTRL_A: u8 = 1;
pub const KEY_CTRL_C: u8 = 3;
pub const KEY_CTRL_D: u8 = 4;
pub const KEY_CTRL_E: u8 = 5;
pub const KEY_ENTER: u8 = 10;
pub const KEY_CTRL_K: u8 = 11;
pub const KEY_RETURN: u8 = 13;
pub const KEY_CTRL_U: u8 = 21;
pub const KEY_ESCAPE: u8 = 27;
pub const KEY_LEFT_BRACKET: u8 = b'[';
pub const KEY_BACKSPACE: u8 = 127;

pub const CSI_UP: u8 = b'A';
pub const CSI_DOWN: u8 = b'B';
pub const CSI_RIGHT: u8 = b'C';
pub const CSI_LEFT: u8 = b'D';
pub const CSI_END: u8 = b'F';
pub const CSI_HOME: u8 = b'H';

/// One unit of input as delivered by the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKey {
    /// A single input byte
    Byte(u8),
    /// The terminal was resized
    Resize,
    /// The blocking read was interrupted by the user
    Interrupt,
}

/// Logical edit command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    InsertChar(char),
    MoveLeft,
    MoveRight,
    MoveToStart,
    MoveToEnd,
    DeleteBackward,
    DeleteToEnd,
    ClearLine,
    Submit,
    Resize,
    Quit,
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DecoderState {
    #[default]
    Normal,
    EscapeSeen,
    CsiSeen,
    /// Inside a multi-byte UTF-8 character
    Utf8 { buf: [u8; 4], len: u8, need: u8 },
}

/// Decoder state machine
#[derive(Debug, Default)]
pub struct KeyDecoder {
    state: DecoderState,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no escape or multi-byte sequence is pending
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Normal
    }

    /// Feed one raw key; returns an event once a full key has been seen
    pub fn feed(&mut self, key: RawKey) -> Option<KeyEvent> {
        let byte = match key {
            RawKey::Byte(b) => b,
            RawKey::Resize => {
                self.state = DecoderState::Normal;
                return Some(KeyEvent::Resize);
            }
            RawKey::Interrupt => {
                self.state = DecoderState::Normal;
                return Some(KeyEvent::Quit);
            }
        };

        match self.state {
            DecoderState::Normal => self.feed_normal(byte),
            DecoderState::EscapeSeen => {
                // alt-b, alt-f and alt-backspace land here and are not bound yet
                if byte == KEY_LEFT_BRACKET {
                    self.state = DecoderState::CsiSeen;
                } else {
                    debug!("Ignoring alt sequence ESC 0x{:02X}", byte);
                    self.state = DecoderState::Normal;
                }
                None
            }
            DecoderState::CsiSeen => {
                self.state = DecoderState::Normal;
                match byte {
                    CSI_RIGHT => Some(KeyEvent::MoveRight),
                    CSI_LEFT => Some(KeyEvent::MoveLeft),
                    CSI_HOME => Some(KeyEvent::MoveToStart),
                    CSI_END => Some(KeyEvent::MoveToEnd),
                    // History navigation is not implemented
                    CSI_UP | CSI_DOWN => None,
                    _ => {
                        debug!("Ignoring CSI final 0x{:02X}", byte);
                        None
                    }
                }
            }
            DecoderState::Utf8 { mut buf, len, need } => {
                if byte & 0xC0 != 0x80 {
                    // The truncated character is dropped; the byte starts a new key
                    debug!("Dropping truncated UTF-8 sequence {:02X?}", &buf[..len as usize]);
                    self.state = DecoderState::Normal;
                    return self.feed_normal(byte);
                }
                buf[len as usize] = byte;
                let len = len + 1;
                if len < need {
                    self.state = DecoderState::Utf8 { buf, len, need };
                    return None;
                }
                self.state = DecoderState::Normal;
                let ch = std::str::from_utf8(&buf[..len as usize])
                    .ok()
                    .and_then(|s| s.chars().next());
                Some(ch.map_or(KeyEvent::Unknown, KeyEvent::InsertChar))
            }
        }
    }

    fn feed_normal(&mut self, byte: u8) -> Option<KeyEvent> {
        let event = match byte {
            KEY_BACKSPACE => KeyEvent::DeleteBackward,
            KEY_CTRL_A => KeyEvent::MoveToStart,
            KEY_CTRL_C | KEY_CTRL_D => KeyEvent::Quit,
            KEY_CTRL_E => KeyEvent::MoveToEnd,
            KEY_CTRL_K => KeyEvent::DeleteToEnd,
            KEY_CTRL_U => KeyEvent::ClearLine,
            KEY_ENTER | KEY_RETURN => KeyEvent::Submit,
            KEY_ESCAPE => {
                self.state = DecoderState::EscapeSeen;
                return None;
            }
            0x00..=0x7F => KeyEvent::InsertChar(byte as char),
            0xC2..=0xF4 => {
                let need = match byte {
                    0xC2..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    _ => 4,
                };
                let mut buf = [0u8; 4];
                buf[0] = byte;
                self.state = DecoderState::Utf8 { buf, len: 1, need };
                return None;
            }
            _ => KeyEvent::Unknown,
        };
        Some(event)
    }
}
