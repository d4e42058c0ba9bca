//! Main editing loop
//!
//! Reads one raw key at a time, decodes it, applies it to the session and
//! decides how much of the screen to redraw:
//!
//! | Event                        | Redraw                               |
//! |------------------------------|--------------------------------------|
//! | editing keys                 | expression line only                 |
//! | Enter                        | evaluate, then everything            |
//! | terminal resize              | new layout, evaluate, then everything|
//! | Ctrl-D / Ctrl-C / interrupt  | nothing, the loop ends               |
//!
//! Evaluation is synchronous: no key is read while the evaluator runs.

use std::io::{self, Write};

use anyhow::Context;
use bitflags::bitflags;
use tracing::{debug, info, warn};

use crate::core::eval::{Evaluation, Evaluator};
use crate::core::keys::{KeyDecoder, KeyEvent, RawKey};
use crate::core::session::{Session, SessionOutcome};
use crate::ui::Screen;

/// Source of raw keys and terminal geometry
pub trait Console {
    /// Block until the next raw key is available
    fn read_key(&mut self) -> io::Result<RawKey>;
    /// Current terminal size as (rows, cols)
    fn size(&self) -> io::Result<(u16, u16)>;
}

bitflags! {
    /// Screen regions that need redrawing after an event
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Redraw: u8 {
        const TITLE      = 0b001;
        const EXPRESSION = 0b010;
        /// Re-run the evaluator and redraw its output
        const OUTPUT     = 0b100;
        const FULL = Self::TITLE.bits() | Self::EXPRESSION.bits() | Self::OUTPUT.bits();
    }
}

pub struct Controller<C: Console, E: Evaluator, W: Write> {
    session: Session,
    decoder: KeyDecoder,
    console: C,
    evaluator: E,
    screen: Screen<W>,
    /// Output line cap; the terminal height when unset
    max_lines: Option<usize>,
}

impl<C: Console, E: Evaluator, W: Write> Controller<C, E, W> {
    pub fn new(session: Session, console: C, evaluator: E, screen: Screen<W>, max_lines: Option<usize>) -> Self {
        Self {
            session,
            decoder: KeyDecoder::new(),
            console,
            evaluator,
            screen,
            max_lines,
        }
    }

    /// Run until the user quits and hand back the final expression
    pub fn run(mut self) -> anyhow::Result<SessionOutcome> {
        info!("Editing {:?} against {}", self.session.line.as_string(), self.session.document().display());

        self.redraw(Redraw::FULL).context("Failed to draw screen")?;

        while self.session.is_running() {
            let key = match self.console.read_key() {
                Ok(key) => key,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => RawKey::Interrupt,
                Err(e) => return Err(e).context("Failed to read input"),
            };

            let Some(event) = self.decoder.feed(key) else {
                continue;
            };

            let redraw = self.dispatch(event);
            self.redraw(redraw).context("Failed to draw screen")?;
        }

        info!("Session finished with {:?}", self.session.line.as_string());
        Ok(self.session.into_outcome())
    }

    /// Apply one event and report what must be redrawn
    fn dispatch(&mut self, event: KeyEvent) -> Redraw {
        debug!("Key event: {:?}", event);

        match event {
            KeyEvent::Submit => Redraw::FULL,
            KeyEvent::Resize => {
                match self.console.size() {
                    Ok((rows, cols)) => {
                        debug!("Resized to {}x{}", cols, rows);
                        self.screen.resize(rows, cols);
                    }
                    // Redraw with the previous layout
                    Err(e) => warn!("Failed to query terminal size: {}", e),
                }
                Redraw::FULL
            }
            KeyEvent::Quit => {
                self.session.stop();
                Redraw::empty()
            }
            KeyEvent::Unknown => Redraw::empty(),
            edit => {
                let line = &mut self.session.line;
                line.apply(&edit);
                debug!("Expression {:?}, cursor {}", line.as_string(), line.cursor());
                Redraw::EXPRESSION
            }
        }
    }

    fn redraw(&mut self, redraw: Redraw) -> io::Result<()> {
        if redraw.is_empty() {
            return Ok(());
        }

        let evaluation = if redraw.contains(Redraw::OUTPUT) {
            Some(self.evaluate())
        } else {
            None
        };

        if redraw.contains(Redraw::TITLE) {
            let title = format!("jqq: {}", self.session.document().display());
            self.screen.set_title(&title)?;
        }
        if redraw.contains(Redraw::EXPRESSION) {
            let line = &self.session.line;
            self.screen.set_expression(&line.as_string(), line.display_column())?;
        }
        if let Some(evaluation) = evaluation {
            self.screen.set_output(&evaluation.text, evaluation.succeeded)?;
            self.screen.focus_expression()?;
        }
        Ok(())
    }

    fn evaluate(&mut self) -> Evaluation {
        let max_lines = self
            .max_lines
            .unwrap_or(self.screen.layout().rows as usize);
        self.evaluator.evaluate(
            &self.session.line.as_string(),
            self.session.document(),
            max_lines,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::{KEY_BACKSPACE, KEY_CTRL_D, KEY_ENTER, KEY_ESCAPE};
    use crate::ui::ScreenColors;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    enum Step {
        Key(RawKey),
        Resize(u16, u16),
        /// A resize after which the size query fails
        BrokenResize,
    }

    /// Console replaying a fixed script; an exhausted script reads as an
    /// interrupted read
    struct ScriptedConsole {
        steps: VecDeque<Step>,
        size: Cell<(u16, u16)>,
        size_broken: Cell<bool>,
    }

    impl ScriptedConsole {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                size: Cell::new((24, 80)),
                size_broken: Cell::new(false),
            }
        }

        fn bytes(bytes: &[u8]) -> Self {
            Self::new(bytes.iter().map(|b| Step::Key(RawKey::Byte(*b))).collect())
        }
    }

    impl Console for ScriptedConsole {
        fn read_key(&mut self) -> io::Result<RawKey> {
            match self.steps.pop_front() {
                Some(Step::Key(key)) => Ok(key),
                Some(Step::Resize(rows, cols)) => {
                    self.size.set((rows, cols));
                    Ok(RawKey::Resize)
                }
                Some(Step::BrokenResize) => {
                    self.size_broken.set(true);
                    Ok(RawKey::Resize)
                }
                None => Err(io::Error::new(io::ErrorKind::Interrupted, "script exhausted")),
            }
        }

        fn size(&self) -> io::Result<(u16, u16)> {
            if self.size_broken.get() {
                return Err(io::Error::new(io::ErrorKind::Other, "no terminal"));
            }
            Ok(self.size.get())
        }
    }

    type Calls = Rc<RefCell<Vec<(String, PathBuf, usize)>>>;

    /// Behaves like jq on the document `{"a":1}`
    struct FakeEvaluator {
        calls: Calls,
    }

    impl Evaluator for FakeEvaluator {
        fn evaluate(&mut self, expression: &str, document: &Path, max_lines: usize) -> Evaluation {
            self.calls
                .borrow_mut()
                .push((expression.to_string(), document.to_path_buf(), max_lines));
            let (text, succeeded) = match expression {
                "." => ("{\n  \"a\": 1\n}\n", true),
                ".a" => ("1\n", true),
                _ => ("jq: error: syntax error\n", false),
            };
            Evaluation {
                text: text.to_string(),
                succeeded,
                status: Some(if succeeded { 0 } else { 3 }),
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }

        fn len(&self) -> usize {
            self.0.borrow().len()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        calls: Calls,
        out: SharedBuf,
    }

    fn run(expression: &str, console: ScriptedConsole, max_lines: Option<usize>) -> (SessionOutcome, Harness) {
        let calls = Calls::default();
        let out = SharedBuf::default();
        let (rows, cols) = console.size.get();
        let screen = Screen::new(out.clone(), rows, cols, ScreenColors::default());
        let evaluator = FakeEvaluator { calls: calls.clone() };
        let session = Session::new(expression, "data.json");
        let outcome = Controller::new(session, console, evaluator, screen, max_lines)
            .run()
            .unwrap();
        (outcome, Harness { calls, out })
    }

    fn expressions(calls: &Calls) -> Vec<String> {
        calls.borrow().iter().map(|(e, _, _)| e.clone()).collect()
    }

    #[test]
    fn test_initial_full_redraw() {
        let (outcome, harness) = run(".a", ScriptedConsole::bytes(&[KEY_CTRL_D]), None);
        assert_eq!(expressions(&harness.calls), vec![".a"]);
        let out = harness.out.contents();
        assert!(out.contains("jqq: data.json"));
        assert!(out.contains(".a"));
        assert_eq!(outcome.expression, ".a");
        assert_eq!(outcome.document, PathBuf::from("data.json"));
    }

    #[test]
    fn test_backspace_then_submit_evaluates_new_expression() {
        let console = ScriptedConsole::bytes(&[KEY_BACKSPACE, KEY_ENTER, KEY_CTRL_D]);
        let (outcome, harness) = run(".a", console, None);
        assert_eq!(expressions(&harness.calls), vec![".a", "."]);
        assert!(harness.out.contents().contains("\"a\": 1"));
        assert_eq!(outcome.expression, ".");
    }

    #[test]
    fn test_editing_does_not_evaluate() {
        let console = ScriptedConsole::bytes(b"[]\x1b[D\x01\x05\x0b\x15x");
        let (outcome, harness) = run(".", console, None);
        assert_eq!(expressions(&harness.calls), vec!["."]);
        assert_eq!(outcome.expression, "x");
    }

    #[test]
    fn test_cursor_moves_before_insert() {
        // ".a", left, left, insert "x" -> "x.a"
        let console = ScriptedConsole::bytes(b"\x1b[D\x1b[Dx\n");
        let (outcome, harness) = run(".a", console, None);
        assert_eq!(outcome.expression, "x.a");
        assert_eq!(expressions(&harness.calls), vec![".a", "x.a"]);
    }

    #[test]
    fn test_failed_evaluation_shows_diagnostic() {
        let console = ScriptedConsole::bytes(b"[\n");
        let (_, harness) = run(".", console, None);
        assert!(harness.out.contents().contains("syntax error"));
    }

    #[test]
    fn test_resize_recomputes_layout_and_evaluates() {
        let console = ScriptedConsole::new(vec![Step::Resize(10, 40), Step::Key(RawKey::Byte(KEY_CTRL_D))]);
        let (_, harness) = run(".", console, None);
        let calls = harness.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].2, 24);
        assert_eq!(calls[1].2, 10);
    }

    #[test]
    fn test_resize_to_tiny_terminal_does_not_panic() {
        let console = ScriptedConsole::new(vec![
            Step::Resize(1, 80),
            Step::Key(RawKey::Byte(KEY_ENTER)),
            Step::Resize(0, 0),
            Step::Key(RawKey::Byte(b'x')),
            Step::Key(RawKey::Byte(KEY_ENTER)),
        ]);
        let (outcome, harness) = run(".", console, None);
        assert_eq!(outcome.expression, ".x");
        assert_eq!(harness.calls.borrow().len(), 5);
    }

    #[test]
    fn test_failed_size_query_keeps_layout() {
        let console = ScriptedConsole::new(vec![
            Step::BrokenResize,
            Step::Key(RawKey::Byte(b'x')),
            Step::Key(RawKey::Byte(KEY_ENTER)),
        ]);
        let (outcome, harness) = run(".", console, None);
        assert_eq!(outcome.expression, ".x");
        let calls = harness.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, _, max_lines)| *max_lines == 24));
    }

    #[test]
    fn test_configured_max_lines() {
        let (_, harness) = run(".", ScriptedConsole::bytes(&[KEY_CTRL_D]), Some(3));
        assert_eq!(harness.calls.borrow()[0].2, 3);
    }

    #[test]
    fn test_unknown_and_pending_escape_do_not_redraw() {
        let calls = Calls::default();
        let out = SharedBuf::default();
        let screen = Screen::new(out.clone(), 24, 80, ScreenColors::default());
        let evaluator = FakeEvaluator { calls: calls.clone() };
        let mut controller = Controller::new(
            Session::new(".", "data.json"),
            ScriptedConsole::new(Vec::new()),
            evaluator,
            screen,
            None,
        );

        assert_eq!(controller.dispatch(KeyEvent::Unknown), Redraw::empty());
        assert_eq!(controller.decoder.feed(RawKey::Byte(KEY_ESCAPE)), None);
        let before = out.len();
        controller.redraw(Redraw::empty()).unwrap();
        assert_eq!(out.len(), before);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_interrupt_ends_loop_without_redraw() {
        let console = ScriptedConsole::new(vec![Step::Key(RawKey::Byte(b'x')), Step::Key(RawKey::Interrupt)]);
        let (outcome, harness) = run(".", console, None);
        assert_eq!(outcome.expression, ".x");
        assert_eq!(harness.calls.borrow().len(), 1);
    }

    #[test]
    fn test_dispatch_redraw_policy() {
        let mut controller = Controller::new(
            Session::new(".", "data.json"),
            ScriptedConsole::new(Vec::new()),
            FakeEvaluator { calls: Calls::default() },
            Screen::new(Vec::new(), 24, 80, ScreenColors::default()),
            None,
        );

        assert_eq!(controller.dispatch(KeyEvent::InsertChar('a')), Redraw::EXPRESSION);
        assert_eq!(controller.dispatch(KeyEvent::MoveToStart), Redraw::EXPRESSION);
        assert_eq!(controller.dispatch(KeyEvent::Submit), Redraw::FULL);
        assert_eq!(controller.dispatch(KeyEvent::Resize), Redraw::FULL);
        assert!(controller.session.is_running());
        assert_eq!(controller.dispatch(KeyEvent::Quit), Redraw::empty());
        assert!(!controller.session.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn test_end_to_end_with_process_evaluator() {
        use crate::core::eval::ProcessEvaluator;

        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("doc.json");
        std::fs::write(&document, "{\"a\":1}\n").unwrap();

        // Prints the document for "." and fails for anything else
        let evaluator = ProcessEvaluator::new(
            "/bin/sh",
            vec![
                "-c".to_string(),
                r#"if [ "$1" = "." ]; then cat "$2"; else echo "error: $1" >&2; exit 1; fi"#.to_string(),
                "sh".to_string(),
            ],
        );
        let out = SharedBuf::default();
        let screen = Screen::new(out.clone(), 24, 80, ScreenColors::default());
        let console = ScriptedConsole::bytes(&[KEY_BACKSPACE, KEY_ENTER, KEY_CTRL_D]);
        let outcome = Controller::new(Session::new(".a", &document), console, evaluator, screen, None)
            .run()
            .unwrap();

        assert_eq!(outcome.expression, ".");
        let contents = out.contents();
        assert!(contents.contains("error: .a"));
        assert!(contents.contains("{\"a\":1}"));
    }
}
