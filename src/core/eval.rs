//! Evaluation pipeline
//!
//! Runs the external evaluator once per request and returns what it
//! printed. Output is capped to a number of lines so a large document
//! cannot flood the screen or memory.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read evaluator output: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to wait for evaluator: {0}")]
    Wait(#[source] io::Error),
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// stdout on success, stderr on failure
    pub text: String,
    pub succeeded: bool,
    /// Exit code, `None` when the evaluator was killed by a signal
    pub status: Option<i32>,
}

impl Evaluation {
    fn from_error(err: &EvalError) -> Self {
        Self {
            text: err.to_string(),
            succeeded: false,
            status: None,
        }
    }
}

/// Something that can evaluate an expression against a document
pub trait Evaluator {
    fn evaluate(&mut self, expression: &str, document: &Path, max_lines: usize) -> Evaluation;
}

/// Evaluator backed by an external program such as `jq`
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: String,
    args: Vec<String>,
}

impl ProcessEvaluator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn run(&self, expression: &str, document: &Path, max_lines: usize) -> Result<Evaluation, EvalError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(expression)
            .arg(document)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EvalError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // stderr is read on its own thread so a full pipe on either stream
        // cannot block the other
        let (out, err) = thread::scope(|scope| {
            let err_reader = scope.spawn(move || match stderr {
                Some(pipe) => cap_lines(pipe, max_lines),
                None => Ok(Vec::new()),
            });
            let out = match stdout {
                Some(pipe) => cap_lines(pipe, max_lines),
                None => Ok(Vec::new()),
            };
            let err = err_reader
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stderr reader panicked")));
            (out, err)
        });

        let status = child.wait().map_err(EvalError::Wait)?;
        let out = out.map_err(EvalError::Read)?;
        let err = err.map_err(EvalError::Read)?;

        let succeeded = status.success();
        let text = if succeeded { out } else { err };
        Ok(Evaluation {
            text: String::from_utf8_lossy(&text).into_owned(),
            succeeded,
            status: status.code(),
        })
    }
}

impl Evaluator for ProcessEvaluator {
    fn evaluate(&mut self, expression: &str, document: &Path, max_lines: usize) -> Evaluation {
        let started = Instant::now();
        let evaluation = match self.run(expression, document, max_lines) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!("Evaluation failed: {}", e);
                Evaluation::from_error(&e)
            }
        };
        info!(
            "Evaluated {:?} in {:?} (status {:?})",
            expression,
            started.elapsed(),
            evaluation.status
        );
        evaluation
    }
}

/// Longest line kept from the evaluator; the rest of the line is dropped
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Read at most `max_lines` lines from `reader`, each cut to
/// `MAX_LINE_BYTES`.
///
/// Anything past the limit is read and thrown away so the writer never
/// blocks on a full pipe.
pub fn cap_lines<R: Read>(reader: R, max_lines: usize) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    let mut lines = 0;

    while lines < max_lines {
        let start = captured.len();
        let n = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut captured)?;
        if n == 0 {
            return Ok(captured);
        }
        if captured.last() != Some(&b'\n') && n == MAX_LINE_BYTES {
            let dropped = skip_line(&mut reader)?;
            debug!("Cut line of {} bytes", n + dropped);
            // Keep the cut on a char boundary and end the line
            let keep = valid_utf8_prefix(&captured[start..]);
            captured.truncate(start + keep);
            captured.push(b'\n');
        }
        lines += 1;
    }

    let discarded = io::copy(&mut reader, &mut io::sink())?;
    if discarded > 0 {
        debug!("Discarded {} bytes past {} lines", discarded, max_lines);
    }
    Ok(captured)
}

/// Consume the remainder of the current line, including its newline
fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut dropped = 0;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(dropped);
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(dropped + i + 1);
            }
            None => {
                let len = buf.len();
                reader.consume(len);
                dropped += len;
            }
        }
    }
}

fn valid_utf8_prefix(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => bytes.len(),
    }
}
