//! Focus ("isolation") weights derived from the current word.
//!
//! When a focus mode is active, every word outside the current word's
//! paragraph (or sentence) is dimmed. Characters between words inherit the
//! weight of their neighbours so whitespace and punctuation never flicker.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::text::TextStructure;

/// Weight of focused text.
pub const FOCUSED: f32 = 1.0;

/// Weight of text outside the focused paragraph or sentence.
pub const DIMMED: f32 = 0.3;

/// Which structural unit stays in focus while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    #[default]
    None,
    Paragraph,
    Sentence,
}

impl IsolationMode {
    /// Collapse two independent UI toggles into one mode. Sentence wins.
    pub const fn from_toggles(paragraph: bool, sentence: bool) -> Self {
        match (paragraph, sentence) {
            (_, true) => Self::Sentence,
            (true, false) => Self::Paragraph,
            (false, false) => Self::None,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Paragraph => "paragraph",
            Self::Sentence => "sentence",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "paragraph" => Ok(Self::Paragraph),
            "sentence" => Ok(Self::Sentence),
            other => Err(format!("unknown isolation mode: {other}")),
        }
    }
}

/// Weights for one (structure, current word, mode) triple.
#[derive(Debug, Clone)]
pub struct IsolationView<'a> {
    structure: &'a TextStructure,
    current: Option<usize>,
    focus: Option<Range<usize>>,
}

/// Resolve the focused word range for `current_word` under `mode`.
///
/// An out-of-range index behaves like "no current word".
pub fn resolve(
    structure: &TextStructure,
    current_word: Option<usize>,
    mode: IsolationMode,
) -> IsolationView<'_> {
    let current = current_word.filter(|&i| i < structure.word_count());
    let focus = current.and_then(|word| match mode {
        IsolationMode::None => None,
        IsolationMode::Paragraph => structure
            .paragraph_of(word)
            .map(|p| structure.words_in_paragraph(p)),
        IsolationMode::Sentence => structure
            .sentence_of(word)
            .map(|s| structure.words_in_sentence(s)),
    });

    IsolationView {
        structure,
        current,
        focus,
    }
}

impl IsolationView<'_> {
    /// The contiguous word-index range that stays undimmed, if dimming applies.
    pub fn focused_word_range(&self) -> Option<Range<usize>> {
        self.focus.clone()
    }

    pub fn is_dimming(&self) -> bool {
        self.focus.is_some()
    }

    fn is_focused(&self, word: usize) -> bool {
        match &self.focus {
            None => true,
            Some(range) => self.current == Some(word) || range.contains(&word),
        }
    }

    pub fn word_weight(&self, word: usize) -> f32 {
        weight(self.is_focused(word))
    }

    pub fn word_weights(&self) -> Vec<f32> {
        (0..self.structure.word_count())
            .map(|i| self.word_weight(i))
            .collect()
    }

    /// One weight per character of the analysed text.
    pub fn char_weights(&self) -> Vec<f32> {
        let len = self.structure.char_len();
        if self.focus.is_none() {
            return vec![FOCUSED; len];
        }

        let mut out = Vec::with_capacity(len);
        let mut previous: Option<bool> = None;
        for word in self.structure.words() {
            let here = self.is_focused(word.index);
            // A gap takes the preceding word's weight; a leading gap the first word's.
            out.resize(word.start, weight(previous.unwrap_or(here)));
            out.resize(word.end, weight(here));
            previous = Some(here);
        }
        out.resize(len, weight(previous.unwrap_or(true)));
        out
    }
}

const fn weight(focused: bool) -> f32 {
    if focused { FOCUSED } else { DIMMED }
}
