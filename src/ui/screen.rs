//! Screen layout
//!
//! The screen is split into three stacked regions:
//!
//! ```text
//! row 0      title       "jqq: <document>"
//! row 1      expression  the line being edited
//! row 2..    output      evaluator result or diagnostic
//! ```
//!
//! Every `set_*` call clears and redraws one region and flushes right away.

use std::io::{self, Write};

use crossterm::{
    cursor::{MoveTo, Show},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use unicode_width::UnicodeWidthChar;

const TAB_WIDTH: usize = 8;

/// A rectangular slice of the screen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub top: u16,
    pub height: u16,
    pub width: u16,
}

impl Region {
    fn rows(&self) -> std::ops::Range<u16> {
        self.top..self.top.saturating_add(self.height)
    }
}

/// Positions of the three regions for a given terminal size
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    /// Terminal height the layout was computed for
    pub rows: u16,
    pub title: Region,
    pub expression: Region,
    pub output: Region,
}

impl Layout {
    /// Stack title, expression and output. The output region takes whatever
    /// is left and shrinks to zero on very short terminals.
    pub fn new(rows: u16, cols: u16) -> Self {
        let title_height = rows.min(1);
        let expression_height = rows.saturating_sub(title_height).min(1);
        Self {
            rows,
            title: Region {
                top: 0,
                height: title_height,
                width: cols,
            },
            expression: Region {
                top: 1,
                height: expression_height,
                width: cols,
            },
            output: Region {
                top: 2,
                height: rows.saturating_sub(2),
                width: cols,
            },
        }
    }
}

/// Colors used when drawing
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenColors {
    pub title_fg: Option<Color>,
    pub title_bg: Option<Color>,
    pub error_fg: Option<Color>,
}

/// Region-based screen writer
pub struct Screen<W: Write> {
    out: W,
    layout: Layout,
    colors: ScreenColors,
    /// Column of the expression cursor after the last `set_expression`
    expression_column: u16,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W, rows: u16, cols: u16, colors: ScreenColors) -> Self {
        Self {
            out,
            layout: Layout::new(rows, cols),
            colors,
            expression_column: 0,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Recompute regions for a new terminal size. Nothing is drawn.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.layout = Layout::new(rows, cols);
    }

    pub fn set_title(&mut self, text: &str) -> io::Result<()> {
        let region = self.layout.title;
        self.clear_region(region)?;
        if region.height == 0 {
            return self.out.flush();
        }

        let mut line = fit_to_width(text, region.width as usize);
        if self.colors.title_bg.is_some() {
            // Paint the whole bar, not just the text
            let padding = (region.width as usize).saturating_sub(used_columns(&line));
            line.extend(std::iter::repeat(' ').take(padding));
        }

        queue!(self.out, MoveTo(0, region.top))?;
        if let Some(fg) = self.colors.title_fg {
            queue!(self.out, SetForegroundColor(fg))?;
        }
        if let Some(bg) = self.colors.title_bg {
            queue!(self.out, SetBackgroundColor(bg))?;
        }
        queue!(self.out, Print(line), ResetColor)?;
        self.out.flush()
    }

    /// Draw the expression and park the cursor at `cursor_column`
    pub fn set_expression(&mut self, text: &str, cursor_column: usize) -> io::Result<()> {
        let region = self.layout.expression;
        self.clear_region(region)?;
        if region.height == 0 || region.width == 0 {
            return self.out.flush();
        }

        let width = region.width as usize;
        // Scroll horizontally so the cursor stays on screen
        let offset = (cursor_column + 1).saturating_sub(width);
        let (rest, skipped) = skip_columns(text, offset);
        let visible = fit_to_width(&rest, width);
        // A wide character straddling the offset is skipped whole
        let column = cursor_column.saturating_sub(skipped).min(width - 1);

        self.expression_column = column as u16;
        queue!(
            self.out,
            MoveTo(0, region.top),
            Print(visible),
            MoveTo(self.expression_column, region.top),
            Show
        )?;
        self.out.flush()
    }

    /// Draw evaluator output from the top-left corner of the output region
    pub fn set_output(&mut self, text: &str, succeeded: bool) -> io::Result<()> {
        let region = self.layout.output;
        self.clear_region(region)?;

        let rows = wrap_lines(text, region.width as usize);
        let error_fg = if succeeded { None } else { self.colors.error_fg };
        if let Some(fg) = error_fg {
            queue!(self.out, SetForegroundColor(fg))?;
        }
        for (row, line) in region.rows().zip(rows) {
            queue!(self.out, MoveTo(0, row), Print(line))?;
        }
        if error_fg.is_some() {
            queue!(self.out, ResetColor)?;
        }
        self.out.flush()
    }

    /// Put the terminal cursor back on the expression line
    pub fn focus_expression(&mut self) -> io::Result<()> {
        let region = self.layout.expression;
        if region.height > 0 {
            queue!(self.out, MoveTo(self.expression_column, region.top))?;
        }
        self.out.flush()
    }

    fn clear_region(&mut self, region: Region) -> io::Result<()> {
        for row in region.rows() {
            queue!(self.out, MoveTo(0, row), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }
}

fn used_columns(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Drop the first `columns` display columns of `text`, returning the rest
/// and the number of columns actually dropped
fn skip_columns(text: &str, columns: usize) -> (String, usize) {
    let mut skipped = 0;
    let rest = text
        .chars()
        .skip_while(|c| {
            if skipped >= columns {
                return false;
            }
            skipped += c.width().unwrap_or(0);
            true
        })
        .collect();
    (rest, skipped)
}

/// Truncate `text` to at most `width` display columns
fn fit_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut result = String::new();
    for ch in text.chars().filter(|c| !c.is_control()) {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        result.push(ch);
    }
    result
}

/// Split text into screen rows of at most `width` columns, expanding tabs
/// and dropping other control characters
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    if width == 0 {
        return rows;
    }

    for line in text.lines() {
        let mut row = String::new();
        let mut used = 0;
        let mut push_cell = |ch: char, w: usize, row: &mut String, rows: &mut Vec<String>| {
            if used + w > width && used > 0 {
                rows.push(std::mem::take(row));
                used = 0;
            }
            row.push(ch);
            used += w;
        };
        for ch in line.chars() {
            match ch {
                '\t' => {
                    let spaces = TAB_WIDTH - used_columns(&row) % TAB_WIDTH;
                    for _ in 0..spaces {
                        push_cell(' ', 1, &mut row, &mut rows);
                    }
                }
                c if c.is_control() => {}
                c => push_cell(c, c.width().unwrap_or(0), &mut row, &mut rows),
            }
        }
        rows.push(row);
    }
    rows
}
