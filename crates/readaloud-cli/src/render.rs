//! Terminal rendering of the spoken text.
//!
//! Each state update redraws a single line: the focused paragraph or
//! sentence when isolation is on, otherwise a window of words around the
//! current one. The current word is shown in reverse video and dimmed words
//! are drawn faint.

use std::io::{self, Write};

use crossterm::style::{Print, Stylize, style};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};
use readaloud_core::{FOCUSED, SessionState};

/// Words shown around the current word when nothing is isolated.
pub const DEFAULT_WINDOW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Current,
    Focused,
    Dimmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub word_index: usize,
    pub text: String,
    pub emphasis: Emphasis,
}

/// Words to draw for `state`, at most `window` of them unless a focused
/// range is active.
pub fn frame(state: &SessionState, window: usize) -> Vec<Segment> {
    let Some(structure) = state.structure.as_deref() else {
        return Vec::new();
    };
    let Some(view) = state.isolation() else {
        return Vec::new();
    };
    let words = structure.words();
    let current = state
        .current_word_index
        .filter(|&i| i < words.len());

    let range = view.focused_word_range().unwrap_or_else(|| {
        let anchor = current.unwrap_or(0);
        let start = anchor.saturating_sub(window / 2);
        let end = (start + window).min(words.len());
        end.saturating_sub(window)..end
    });

    words[range.clone()]
        .iter()
        .map(|word| {
            let emphasis = if Some(word.index) == current {
                Emphasis::Current
            } else if view.word_weight(word.index) < FOCUSED {
                Emphasis::Dimmed
            } else {
                Emphasis::Focused
            };
            Segment {
                word_index: word.index,
                text: word.text.clone(),
                emphasis,
            }
        })
        .collect()
}

/// Redraws the current line on every update.
pub struct TerminalRenderer<W: Write> {
    out: W,
    window: usize,
    last: Option<Vec<Segment>>,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), DEFAULT_WINDOW)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub const fn new(out: W, window: usize) -> Self {
        Self {
            out,
            window,
            last: None,
        }
    }

    /// Draw `state` unless it looks the same as the previous frame.
    pub fn draw(&mut self, state: &SessionState) -> io::Result<()> {
        let segments = frame(state, self.window);
        if self.last.as_ref() == Some(&segments) {
            return Ok(());
        }

        queue!(self.out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                queue!(self.out, Print(' '))?;
            }
            let text = segment.text.as_str();
            match segment.emphasis {
                Emphasis::Current => queue!(self.out, Print(style(text).bold().reverse()))?,
                Emphasis::Focused => queue!(self.out, Print(text))?,
                Emphasis::Dimmed => queue!(self.out, Print(style(text).dim()))?,
            }
        }
        self.out.flush()?;
        self.last = Some(segments);
        Ok(())
    }

    /// Move past the rendered line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.last.take().is_some() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
