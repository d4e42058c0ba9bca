//! Session management
//!
//! Owns the expression being edited and the document it runs against.

use std::path::{Path, PathBuf};

use super::line::LineBuffer;

/// Interactive editing session
#[derive(Debug)]
pub struct Session {
    /// Expression being edited
    pub line: LineBuffer,
    /// Document the expression is evaluated against
    document: PathBuf,
    /// Running flag
    running: bool,
}

/// What is left of a session once it stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub expression: String,
    pub document: PathBuf,
}

impl Session {
    /// Create a new session with the cursor at the end of `expression`
    pub fn new(expression: &str, document: impl Into<PathBuf>) -> Self {
        Self {
            line: LineBuffer::new(expression),
            document: document.into(),
            running: true,
        }
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            expression: self.line.as_string(),
            document: self.document,
        }
    }
}

impl SessionOutcome {
    /// Command line that reopens jqq in the same state.
    ///
    /// The expression is single-quoted when it holds a space or a bracket.
    pub fn replay_command(&self, program: &str) -> String {
        let expression = if self.expression.contains([' ', '[', ']']) {
            format!("'{}'", self.expression)
        } else {
            self.expression.clone()
        };
        format!("{} {} {}", program, expression, self.document.display())
    }
}
