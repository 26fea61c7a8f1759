
use std::iter::Peekable;

use super::ReadError;

/// Longest token or string literal the reader accepts.
pub const MAX_STRING_SIZE: usize = 1024;

pub fn is_delimiter(c: char) -> bool {
    match c {
        ' ' | '\n' | '(' | ')' | '"' | '\\' => true,
        _ => false,
    }
}

pub fn is_whitespace(token: &str) -> bool {
    token == " " || token == "\n"
}

/// Splits a character source into textual tokens: maximal runs of
/// non-delimiters, or a single delimiter character (whitespace included, so
/// string literals can keep their spacing).
pub struct Lexer<I: Iterator<Item = char>> {
    source: Peekable<I>,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(source: I) -> Lexer<I> {
        Lexer {
            source: source.peekable(),
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Lexer<I> {
    type Item = Result<String, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.source.next()?;
        let mut token = first.to_string();
        if is_delimiter(first) {
            return Some(Ok(token));
        }

        let mut length = 1;
        while let Some(&c) = self.source.peek() {
            if is_delimiter(c) {
                break;
            }
            if length == MAX_STRING_SIZE {
                return Some(Err(ReadError::TokenTooLong));
            }
            token.push(c);
            length += 1;
            self.source.next();
        }
        Some(Ok(token))
    }
}

#[cfg(test)]
mod test {
    use super::{Lexer, MAX_STRING_SIZE};
    use crate::read::ReadError;

    fn tokens(input: &str) -> Vec<String> {
        Lexer::new(input.chars()).collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn test_lexer() {
        assert_eq!(tokens("(x y)"), vec!["(", "x", " ", "y", ")"]);
    }

    #[test]
    fn test_delimiters_split() {
        assert_eq!(tokens("\"a b\"c"), vec!["\"", "a", " ", "b", "\"", "c"]);
        assert_eq!(tokens("#\\space"), vec!["#", "\\", "space"]);
        assert_eq!(tokens("'(1\n2)"), vec!["'", "(", "1", "\n", "2", ")"]);
    }

    #[test]
    fn test_non_delimiters_join() {
        assert_eq!(tokens("''foo\tbar"), vec!["''foo\tbar"]);
        assert_eq!(tokens("#t"), vec!["#t"]);
    }

    #[test]
    fn test_empty() {
        assert!(tokens("").is_empty());
    }

    #[test]
    fn test_token_too_long() {
        let long: String = std::iter::repeat('a').take(MAX_STRING_SIZE + 1)
            .collect();
        let mut lexer = Lexer::new(long.chars());
        assert_eq!(lexer.next(), Some(Err(ReadError::TokenTooLong)));

        let fits: String = std::iter::repeat('a').take(MAX_STRING_SIZE)
            .collect();
        assert_eq!(tokens(&fits), vec![fits.clone()]);
    }
}
