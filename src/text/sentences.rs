/*!
 * Sentence segmentation.
 *
 * Paragraphs are separated by blank lines. Inside a paragraph, a run of
 * `.`, `!` or `?` ends a sentence when it is followed by whitespace and then
 * an uppercase letter, an opening quote, or the end of the paragraph.
 *
 * Periods that belong to abbreviations, initials, decimals, times of day or
 * ellipses are classified by a rule table and never end a sentence. The
 * scanner reads the text in place, so sentence offsets always refer to the
 * original chapter text. Sentence text itself is NFKC-normalized with
 * whitespace collapsed.
 */

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "ltd", "inc", "vs", "etc", "al", "eg",
        "ie", "cf", "no", "vol", "pp", "ed", "jan", "feb", "mar", "apr", "jun", "jul", "aug",
        "sep", "oct", "nov", "dec", "fig", "figs", "eq", "eqs", "sec", "ch", "pt", "para",
    ]
    .into_iter()
    .collect()
});

const OPENING_QUOTES: [char; 6] = ['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// A sentence within a chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// `<chapterId>_s<NNNN>`
    pub id: String,
    /// Sentence text with internal whitespace collapsed
    pub text: String,
    /// Character offset of the first character in the chapter text
    pub start_char: usize,
    /// Character offset one past the last character
    pub end_char: usize,
    /// Index of the paragraph within the chapter
    pub paragraph_id: usize,
}

/// How a period inside the text is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodKind {
    Terminal,
    Abbreviation,
    Initial,
    Decimal,
    TimeOfDay,
    Ellipsis,
}

impl PeriodKind {
    fn protects(self) -> bool {
        self != PeriodKind::Terminal
    }
}

type PeriodRule = fn(&[char], usize) -> bool;

// Evaluated in order against the first period of a run; first match wins.
const PERIOD_RULES: &[(PeriodKind, PeriodRule)] = &[
    (PeriodKind::TimeOfDay, is_time_of_day),
    (PeriodKind::Decimal, is_decimal),
    (PeriodKind::Abbreviation, is_abbreviation),
    (PeriodKind::Initial, is_initial),
];

fn is_terminal_punct(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Start index of the word ending right before `i`
fn word_start(chars: &[char], i: usize) -> usize {
    let mut start = i;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    start
}

fn is_decimal(chars: &[char], i: usize) -> bool {
    i > 0
        && chars[i - 1].is_ascii_digit()
        && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

// 3.30 pm, 11.05 a.m.
fn is_time_of_day(chars: &[char], i: usize) -> bool {
    let start = word_start(chars, i);
    let hours = &chars[start..i];
    if hours.is_empty() || hours.len() > 2 || !hours.iter().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let mut k = i + 1;
    for _ in 0..2 {
        if !chars.get(k).is_some_and(|c| c.is_ascii_digit()) {
            return false;
        }
        k += 1;
    }
    while chars.get(k).is_some_and(|c| c.is_whitespace()) {
        k += 1;
    }
    if !chars.get(k).is_some_and(|c| matches!(c, 'a' | 'p' | 'A' | 'P')) {
        return false;
    }
    k += 1;
    if chars.get(k) == Some(&'.') {
        k += 1;
    }
    chars.get(k).is_some_and(|c| matches!(c, 'm' | 'M'))
}

fn is_abbreviation(chars: &[char], i: usize) -> bool {
    let start = word_start(chars, i);
    if start == i {
        return false;
    }
    let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
    ABBREVIATIONS.contains(word.as_str())
}

fn is_single_capital(chars: &[char], letter: usize) -> bool {
    chars[letter].is_ascii_uppercase() && (letter == 0 || !is_word_char(chars[letter - 1]))
}

// Any initial in a run of two or more (J. R. R. Tolkien)
fn is_initial(chars: &[char], i: usize) -> bool {
    if i == 0 || !is_single_capital(chars, i - 1) {
        return false;
    }

    let mut k = i + 1;
    while chars.get(k).is_some_and(|c| c.is_whitespace()) {
        k += 1;
    }
    let initial_follows = chars.get(k).is_some_and(|c| c.is_ascii_uppercase())
        && chars.get(k + 1) == Some(&'.')
        && is_single_capital(chars, k);
    if initial_follows {
        return true;
    }

    let mut k = i - 1;
    while k > 0 && chars[k - 1].is_whitespace() {
        k -= 1;
    }
    k >= 2 && chars[k - 1] == '.' && is_single_capital(chars, k - 2)
}

fn classify_run(chars: &[char], start: usize, end: usize) -> PeriodKind {
    if chars[start..end].iter().any(|c| *c != '.') {
        return PeriodKind::Terminal;
    }
    if end - start >= 3 {
        return PeriodKind::Ellipsis;
    }
    PERIOD_RULES
        .iter()
        .find(|(_, rule)| rule(chars, start))
        .map(|(kind, _)| *kind)
        .unwrap_or(PeriodKind::Terminal)
}

fn boundary_follows(chars: &[char], end: usize) -> bool {
    let mut k = end;
    match chars.get(k) {
        None => return true,
        Some(c) if !c.is_whitespace() => return false,
        _ => {}
    }
    while chars.get(k).is_some_and(|c| c.is_whitespace()) {
        k += 1;
    }
    match chars.get(k) {
        None => true,
        Some(c) => c.is_uppercase() || OPENING_QUOTES.contains(c),
    }
}

/// Char-index ranges of the sentences in one paragraph
fn scan_paragraph(chars: &[char]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if start.is_none() {
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            start = Some(i);
        }

        if !is_terminal_punct(c) {
            i += 1;
            continue;
        }

        let mut end = i;
        while end < chars.len() && is_terminal_punct(chars[end]) {
            end += 1;
        }
        if boundary_follows(chars, end) && !classify_run(chars, i, end).protects() {
            if let Some(s) = start.take() {
                ranges.push((s, end));
            }
        }
        i = end;
    }

    if let Some(s) = start {
        let mut end = chars.len();
        while end > s && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        if end > s {
            ranges.push((s, end));
        }
    }

    ranges
}

/// Splits chapter text into identified sentences
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    chapter_id: String,
    counter: usize,
}

impl SentenceSplitter {
    /// Create a splitter producing ids scoped to `chapter_id`
    pub fn new(chapter_id: impl Into<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            counter: 0,
        }
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    /// Restart sentence numbering at zero
    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    /// Split `text` into sentences in document order.
    ///
    /// Numbering continues from previous calls on the same splitter.
    pub fn split(&mut self, text: &str) -> Vec<Sentence> {
        let mut sentences = Vec::new();
        let mut paragraph_id = 0;
        let mut char_base = 0;
        let mut byte_cursor = 0;

        let mut pieces: Vec<&str> = Vec::new();
        let mut gaps: Vec<&str> = Vec::new();
        for m in PARAGRAPH_BREAK.find_iter(text) {
            pieces.push(&text[byte_cursor..m.start()]);
            gaps.push(m.as_str());
            byte_cursor = m.end();
        }
        pieces.push(&text[byte_cursor..]);

        for (index, piece) in pieces.iter().enumerate() {
            let chars: Vec<char> = piece.chars().collect();
            let ranges = scan_paragraph(&chars);

            if !ranges.is_empty() {
                for (start, end) in ranges {
                    let collapsed: String = chars[start..end]
                        .iter()
                        .copied()
                        .nfkc()
                        .collect::<String>()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ");
                    sentences.push(Sentence {
                        id: format!("{}_s{:04}", self.chapter_id, self.counter),
                        text: collapsed,
                        start_char: char_base + start,
                        end_char: char_base + end,
                        paragraph_id,
                    });
                    self.counter += 1;
                }
                paragraph_id += 1;
            }

            char_base += chars.len();
            if let Some(gap) = gaps.get(index) {
                char_base += gap.chars().count();
            }
        }

        sentences
    }
}
