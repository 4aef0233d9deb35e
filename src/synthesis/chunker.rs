/*!
 * Splitting of over-long sentences into backend-sized chunks.
 *
 * Some engines run out of memory or degrade badly on long inputs. A long
 * sentence is cut at clause punctuation first, then at word boundaries;
 * the chunks are synthesized one by one and joined with a short pause.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Silence inserted between the chunks of one sentence
pub const CHUNK_PAUSE_SECS: f64 = 0.1;

static CLAUSE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"([,;:\-\u{2014}])\s*").unwrap());

fn char_len(s: &str) -> usize {
    s.chars().count()
}

enum Token<'a> {
    Text(&'a str),
    Delimiter(&'a str),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in CLAUSE_BREAK.captures_iter(text) {
        let (Some(whole), Some(delimiter)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            tokens.push(Token::Text(&text[last..whole.start()]));
        }
        tokens.push(Token::Delimiter(delimiter.as_str()));
        last = whole.end();
    }
    if last < text.len() {
        tokens.push(Token::Text(&text[last..]));
    }

    tokens
}

fn split_words(chunk: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    for word in chunk.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if char_len(&current) + char_len(word) + 1 <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Split `text` into chunks of at most `max_chars` characters where possible.
///
/// A single word longer than the limit becomes its own chunk. A limit of
/// zero disables splitting.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 || char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut clauses = Vec::new();
    let mut current = String::new();
    for token in tokenize(text) {
        match token {
            Token::Delimiter(d) => current.push_str(d),
            Token::Text(part) => {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if current.is_empty() {
                    current.push_str(part);
                } else if char_len(&current) + char_len(part) + 1 <= max_chars {
                    current.push(' ');
                    current.push_str(part);
                } else {
                    clauses.push(std::mem::take(&mut current).trim().to_string());
                    current.push_str(part);
                }
            }
        }
    }
    if !current.trim().is_empty() {
        clauses.push(current.trim().to_string());
    }

    let mut chunks = Vec::new();
    for clause in clauses {
        if char_len(&clause) <= max_chars {
            chunks.push(clause);
        } else {
            split_words(&clause, max_chars, &mut chunks);
        }
    }
    chunks
}
