//! Tokens, inversions and analyzers.
//!
//! An [`Analyzer`] turns the text of a field value into an [`Inversion`]: the ordered
//! list of [`Token`]s that the posting-list builder consumes downstream of the
//! inverter. Offsets are measured in Unicode code points of the source text.

use std::fmt::Debug;

/// Default maximum length of a single term in bytes before truncation.
pub const DEFAULT_MAX_TERM_LENGTH: usize = 128;

/// Default minimum length of a single term in bytes.
pub const DEFAULT_MIN_TERM_LENGTH: usize = 1;

/// A single term together with its position information.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    /// Code point offset of the first character of the term in the source text.
    pub start_offset: u32,
    /// Code point offset one past the last character of the term.
    pub end_offset: u32,
    pub boost: f32,
    /// Position increment relative to the previous token.
    pub pos_inc: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, start_offset: u32, end_offset: u32) -> Token {
        Token {
            text: text.into(),
            start_offset,
            end_offset,
            boost: 1.0,
            pos_inc: 1,
        }
    }
}

/// Ordered tokens produced for one field value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inversion {
    tokens: Vec<Token>,
}

impl Inversion {
    pub fn new() -> Inversion {
        Default::default()
    }

    /// An inversion holding `text` as its only token.
    pub fn single(text: impl Into<String>) -> Inversion {
        let text = text.into();
        let end = text.chars().count() as u32;
        Inversion {
            tokens: vec![Token::new(text, 0, end)],
        }
    }

    pub fn append(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Term texts in order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.text.as_str())
    }

    /// Removes all tokens, keeping the allocation.
    pub fn reset(&mut self) {
        self.tokens.clear();
    }
}

impl<'a> IntoIterator for &'a Inversion {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// Transforms field text into an [`Inversion`].
pub trait Analyzer: Send + Sync + Debug {
    fn transform_text(&self, text: &str) -> Inversion;
}

/// Splits text into words.
///
/// A word is the longest run of alphanumeric characters and underscores. An
/// apostrophe (`'` or `’`) between two word characters joins them, so `don't` is a
/// single term. Terms longer than the maximum length are truncated at a UTF-8
/// character boundary, terms shorter than the minimum length are dropped.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    max_term_length: usize,
    min_term_length: usize,
}

impl WordTokenizer {
    pub fn new() -> WordTokenizer {
        Self::with_lengths(DEFAULT_MAX_TERM_LENGTH, DEFAULT_MIN_TERM_LENGTH)
    }

    pub fn with_lengths(max_term_length: usize, min_term_length: usize) -> WordTokenizer {
        WordTokenizer {
            max_term_length,
            min_term_length,
        }
    }

    pub fn max_term_length(&self) -> usize {
        self.max_term_length
    }

    pub fn min_term_length(&self) -> usize {
        self.min_term_length
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for WordTokenizer {
    fn transform_text(&self, text: &str) -> Inversion {
        let mut inversion = Inversion::new();
        let chars = text.char_indices().collect::<Vec<_>>();
        let mut i = 0;
        while i < chars.len() {
            if !is_word_char(chars[i].1) {
                i += 1;
                continue;
            }
            let start = i;
            i += 1;
            while i < chars.len() {
                if is_word_char(chars[i].1) {
                    i += 1;
                } else if is_apostrophe(chars[i].1)
                    && chars.get(i + 1).is_some_and(|&(_, c)| is_word_char(c))
                {
                    i += 2;
                } else {
                    break;
                }
            }
            let byte_start = chars[start].0;
            let byte_end = chars.get(i).map_or(text.len(), |&(pos, _)| pos);
            let word = &text[byte_start..byte_end];
            if word.len() < self.min_term_length {
                continue;
            }
            inversion.append(Token::new(
                truncate_str(word, self.max_term_length),
                start as u32,
                i as u32,
            ));
        }
        inversion
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

/// Truncates `input` to at most `max_len` bytes at a character boundary.
pub(crate) fn truncate_str(input: &str, max_len: usize) -> &str {
    if input.len() <= max_len {
        return input;
    }
    let mut boundary = max_len;
    while boundary > 0 && !input.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &input[..boundary]
}

#[cfg(test)]
mod tests {
    use super::{Analyzer, Inversion, Token, WordTokenizer, truncate_str};

    fn terms(analyzer: &dyn Analyzer, text: &str) -> Vec<String> {
        analyzer
            .transform_text(text)
            .terms()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_word_tokenizer() {
        let tokenizer = WordTokenizer::new();
        assert_eq!(
            terms(&tokenizer, "Typically 3-4 levels deep,"),
            ["Typically", "3", "4", "levels", "deep"]
        );
        assert!(terms(&tokenizer, "").is_empty());
        assert!(terms(&tokenizer, " ,.;- ").is_empty());
        assert_eq!(terms(&tokenizer, "snake_case word"), ["snake_case", "word"]);
    }

    #[test]
    fn test_apostrophes() {
        let tokenizer = WordTokenizer::new();
        assert_eq!(
            terms(&tokenizer, "don't stop rock\u{2019}n\u{2019}roll"),
            ["don't", "stop", "rock\u{2019}n\u{2019}roll"]
        );
        assert_eq!(terms(&tokenizer, "'quoted' ends'"), ["quoted", "ends"]);
        assert_eq!(terms(&tokenizer, "a''b"), ["a", "b"]);
    }

    #[test]
    fn test_offsets_are_code_points() {
        let inversion = WordTokenizer::new().transform_text("\u{e9}t\u{e9} caf\u{e9}");
        let tokens = inversion.iter().collect::<Vec<_>>();
        assert_eq!(tokens.len(), 2);
        assert_eq!((tokens[0].start_offset, tokens[0].end_offset), (0, 3));
        assert_eq!((tokens[1].start_offset, tokens[1].end_offset), (4, 8));
        assert!(tokens.iter().all(|t| t.pos_inc == 1 && t.boost == 1.0));
    }

    #[test]
    fn test_term_lengths() {
        let tokenizer = WordTokenizer::with_lengths(4, 2);
        let inversion = tokenizer.transform_text("a bb cccccc");
        assert_eq!(inversion.terms().collect::<Vec<_>>(), ["bb", "cccc"]);
        let last = inversion.iter().last().unwrap();
        assert_eq!((last.start_offset, last.end_offset), (5, 11));

        assert_eq!(truncate_str("\u{4f60}\u{597d}", 4), "\u{4f60}");
        assert_eq!(truncate_str("abc", 8), "abc");
    }

    #[test]
    fn test_inversion() {
        let mut inversion = Inversion::single("caf\u{e9}");
        assert_eq!(inversion.len(), 1);
        assert_eq!(
            inversion.iter().next(),
            Some(&Token::new("caf\u{e9}", 0, 4))
        );
        inversion.append(Token::new("x", 5, 6));
        assert_eq!(inversion.len(), 2);
        inversion.reset();
        assert!(inversion.is_empty());
    }
}
