/*!
 * Text normalization applied before chapter detection.
 *
 * Extracted text tends to carry layout debris: words hyphenated across
 * lines, page numbers, footnote markers, links. The cleaner removes that
 * debris while keeping paragraph breaks intact, since the sentence splitter
 * relies on blank lines to find paragraphs.
 */

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static HYPHENATED_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)-[ \t]*\n[ \t]*(\w+)").unwrap());
static REPEATED_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+([,.!?;:])").unwrap());
static MISSING_SPACE_AFTER_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,;:!?])([A-Za-z])").unwrap());
static THOUSANDS_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d),(\d{3})").unwrap());
static PAGE_NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*-?[ \t]*\d+[ \t]*-?[ \t]*$").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").unwrap());
static FOOTNOTE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());
static ASTERISKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{1,3}").unwrap());
static ISBN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ISBN[:\s]*[\d-]+").unwrap());
static DOT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());
static BANG_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"!{2,}").unwrap());
static QUESTION_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?{2,}").unwrap());
static ELLIPSIS_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\.\.\.[ \t]*").unwrap());
static ORPHAN_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[,;:][ \t]*").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static LEADING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]+").unwrap());

const QUOTE_REPLACEMENTS: [(char, char); 6] = [
    ('\u{201C}', '"'),
    ('\u{201D}', '"'),
    ('\u{2018}', '\''),
    ('\u{2019}', '\''),
    ('\u{00AB}', '"'),
    ('\u{00BB}', '"'),
];

/// Normalizes extracted text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCleaner;

impl TextCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Run every cleaning step in order and trim the result
    pub fn clean(&self, text: &str) -> String {
        let text = text.replace("\r\n", "\n");
        let text = Self::fix_hyphenation(&text);
        let text = Self::normalize_whitespace(&text);
        let text = Self::normalize_quotes(&text);
        let text = THOUSANDS_SEPARATOR.replace_all(&text, "${1}${2}").into_owned();
        let text = Self::remove_artifacts(&text);
        let text = Self::fix_punctuation(&text);
        let text = Self::normalize_paragraphs(&text);
        text.trim().to_string()
    }

    fn fix_hyphenation(text: &str) -> Cow<'_, str> {
        HYPHENATED_BREAK.replace_all(text, "${1}${2}")
    }

    fn normalize_whitespace(text: &str) -> String {
        let text = text.replace('\t', " ");
        let text = REPEATED_SPACES.replace_all(&text, " ");
        let text = SPACE_BEFORE_PUNCT.replace_all(&text, "${1}");
        MISSING_SPACE_AFTER_PUNCT
            .replace_all(&text, "${1} ${2}")
            .into_owned()
    }

    fn normalize_quotes(text: &str) -> String {
        text.chars()
            .map(|c| {
                QUOTE_REPLACEMENTS
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map(|(_, to)| *to)
                    .unwrap_or(c)
            })
            .collect()
    }

    fn remove_artifacts(text: &str) -> String {
        let text = PAGE_NUMBER_LINE.replace_all(text, "");
        let text = URL.replace_all(&text, "");
        let text = EMAIL.replace_all(&text, "");
        let text = FOOTNOTE_MARKER.replace_all(&text, "");
        let text = ASTERISKS.replace_all(&text, "");
        ISBN.replace_all(&text, "").into_owned()
    }

    fn fix_punctuation(text: &str) -> String {
        let text = DOT_RUN.replace_all(text, "...");
        let text = BANG_RUN.replace_all(&text, "!");
        let text = QUESTION_RUN.replace_all(&text, "?");
        let text = ELLIPSIS_SPACING.replace_all(&text, "... ");
        ORPHAN_PUNCT.replace_all(&text, "").into_owned()
    }

    fn normalize_paragraphs(text: &str) -> String {
        let text = TRAILING_SPACE.replace_all(text, "");
        let text = LEADING_SPACE.replace_all(&text, "");
        EXCESS_NEWLINES.replace_all(&text, "\n\n").into_owned()
    }
}
