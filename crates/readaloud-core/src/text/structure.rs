//! Text structure analysis: words, sentences and paragraphs with offsets.
//!
//! All offsets are **character** offsets (Unicode scalar values) into the
//! exact text that was analysed, half-open `[start, end)`. Speech providers
//! report boundary positions in the same unit, so a boundary offset can be
//! mapped straight to a word index with [`TextStructure::word_at_char`].
//!
//! # Splitting rules
//!
//! - **Words** are maximal runs of non-whitespace characters.
//! - **Paragraphs** are separated by a blank line (`\n`, optional whitespace,
//!   `\n`). Whitespace-only paragraphs are dropped; every span is trimmed.
//! - **Sentences** end at a run of `.`, `!` or `?` and keep that run. A
//!   trailing unterminated fragment is still a sentence. Sentences are split
//!   inside paragraphs, so a sentence never crosses a paragraph break.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence pattern is valid"));

/// A contiguous piece of the analysed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Zero-based position among spans of the same kind.
    pub index: usize,
    /// The exact slice of the source text.
    pub text: String,
    /// First character offset (inclusive).
    pub start: usize,
    /// Last character offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Length in characters.
    pub const fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// Whether `offset` falls inside this span.
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Words, sentences and paragraphs of one text, plus the derived
/// word → paragraph and word → sentence membership maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStructure {
    text: String,
    char_len: usize,
    words: Vec<Span>,
    sentences: Vec<Span>,
    paragraphs: Vec<Span>,
    word_paragraph: Vec<usize>,
    word_sentence: Vec<usize>,
}

impl TextStructure {
    /// Analyse `text`. Pure function of its input.
    pub fn analyze(text: &str) -> Self {
        let words = split_words(text);

        let paragraph_ranges = split_paragraphs(text);
        let sentence_ranges: Vec<Range<usize>> = paragraph_ranges
            .iter()
            .flat_map(|paragraph| split_sentences(text, paragraph.clone()))
            .collect();

        let paragraphs = spans_from_byte_ranges(text, &paragraph_ranges);
        let sentences = spans_from_byte_ranges(text, &sentence_ranges);

        let word_paragraph = membership(&words, &paragraphs);
        let word_sentence = membership(&words, &sentences);

        tracing::trace!(
            words = words.len(),
            sentences = sentences.len(),
            paragraphs = paragraphs.len(),
            "Analysed text structure"
        );

        Self {
            text: text.to_owned(),
            char_len: text.chars().count(),
            words,
            sentences,
            paragraphs,
            word_paragraph,
            word_sentence,
        }
    }

    /// The analysed text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the analysed text in characters.
    pub const fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn words(&self) -> &[Span] {
        &self.words
    }

    pub fn sentences(&self) -> &[Span] {
        &self.sentences
    }

    pub fn paragraphs(&self) -> &[Span] {
        &self.paragraphs
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn word(&self, index: usize) -> Option<&Span> {
        self.words.get(index)
    }

    /// Paragraph index containing word `word`.
    pub fn paragraph_of(&self, word: usize) -> Option<usize> {
        self.word_paragraph.get(word).copied()
    }

    /// Sentence index containing word `word`.
    pub fn sentence_of(&self, word: usize) -> Option<usize> {
        self.word_sentence.get(word).copied()
    }

    /// Word indices belonging to paragraph `paragraph`.
    pub fn words_in_paragraph(&self, paragraph: usize) -> Range<usize> {
        member_range(&self.word_paragraph, paragraph)
    }

    /// Word indices belonging to sentence `sentence`.
    pub fn words_in_sentence(&self, sentence: usize) -> Range<usize> {
        member_range(&self.word_sentence, sentence)
    }

    /// Map a character offset reported by a speech provider to a word index.
    ///
    /// Offsets inside a word resolve to that word, offsets in whitespace
    /// resolve to the following word, and offsets past the last word clamp
    /// to the last word. Returns `None` only when the text has no words.
    pub fn word_at_char(&self, offset: usize) -> Option<usize> {
        if self.words.is_empty() {
            return None;
        }
        let index = self.words.partition_point(|word| word.end <= offset);
        Some(index.min(self.words.len() - 1))
    }

    /// Slice the analysed text by character offsets.
    pub fn slice_chars(&self, start: usize, end: usize) -> String {
        self.text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }
}

// ── Splitting ──────────────────────────────────────────────────────

fn split_words(text: &str) -> Vec<Span> {
    let mut words = Vec::new();
    // (byte start, char start) of the run in progress
    let mut run: Option<(usize, usize)> = None;
    let mut char_pos = 0;

    for (byte, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some((run_byte, run_char)) = run.take() {
                words.push(Span {
                    index: words.len(),
                    text: text[run_byte..byte].to_owned(),
                    start: run_char,
                    end: char_pos,
                });
            }
        } else if run.is_none() {
            run = Some((byte, char_pos));
        }
        char_pos += 1;
    }

    if let Some((run_byte, run_char)) = run {
        words.push(Span {
            index: words.len(),
            text: text[run_byte..].to_owned(),
            start: run_char,
            end: char_pos,
        });
    }

    words
}

fn split_paragraphs(text: &str) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for separator in PARAGRAPH_BREAK.find_iter(text) {
        pieces.push(last..separator.start());
        last = separator.end();
    }
    pieces.push(last..text.len());

    pieces
        .into_iter()
        .filter_map(|piece| trim_range(text, piece))
        .collect()
}

fn split_sentences(text: &str, paragraph: Range<usize>) -> Vec<Range<usize>> {
    let body = &text[paragraph.clone()];
    let mut sentences = Vec::new();
    let mut last = 0;

    for terminator in SENTENCE_END.find_iter(body) {
        if let Some(range) = trim_range(body, last..terminator.end()) {
            sentences.push(paragraph.start + range.start..paragraph.start + range.end);
        }
        last = terminator.end();
    }
    if let Some(range) = trim_range(body, last..body.len()) {
        sentences.push(paragraph.start + range.start..paragraph.start + range.end);
    }

    sentences
}

/// Shrink a byte range to exclude leading/trailing whitespace; `None` if
/// nothing but whitespace remains.
fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    let start = range.start + lead;
    Some(start..start + trimmed.len())
}

/// Convert ascending, non-overlapping byte ranges into character spans in a
/// single forward pass.
fn spans_from_byte_ranges(text: &str, ranges: &[Range<usize>]) -> Vec<Span> {
    let mut cursor = CharCursor::default();
    ranges
        .iter()
        .enumerate()
        .map(|(index, range)| {
            let start = cursor.advance_to(text, range.start);
            let end = cursor.advance_to(text, range.end);
            Span {
                index,
                text: text[range.clone()].to_owned(),
                start,
                end,
            }
        })
        .collect()
}

#[derive(Default)]
struct CharCursor {
    byte: usize,
    chars: usize,
}

impl CharCursor {
    fn advance_to(&mut self, text: &str, byte: usize) -> usize {
        debug_assert!(byte >= self.byte, "ranges must be ascending");
        self.chars += text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

/// For every word, the index of the container span holding its first
/// character. Both slices are sorted, so one merge pass suffices.
fn membership(words: &[Span], containers: &[Span]) -> Vec<usize> {
    let mut owner = 0;
    words
        .iter()
        .map(|word| {
            while owner + 1 < containers.len() && containers[owner + 1].start <= word.start {
                owner += 1;
            }
            owner
        })
        .collect()
}

fn member_range(map: &[usize], container: usize) -> Range<usize> {
    let start = map.partition_point(|&owner| owner < container);
    let end = map.partition_point(|&owner| owner <= container);
    start..end
}
