//! Core editing components.
//!
//! This module contains the terminal-independent logic:
//!
//! - **keys**: raw byte decoder producing logical key events
//! - **line**: expression buffer with cursor
//! - **eval**: external evaluator invocation with capped output
//! - **session**: expression + document state and the replay command
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── LineBuffer (expression + cursor)
//! └── document path
//!
//! KeyDecoder ──KeyEvent──> Controller ──> Evaluator
//! ```

pub mod eval;
pub mod keys;
pub mod line;
pub mod session;
