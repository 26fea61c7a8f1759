mod grammar;
mod lexer;

use std::fmt;
use std::mem;
use std::str::Chars;

use crate::scheme::Scheme;
use self::grammar::TokenClass;
use self::lexer::{is_delimiter, is_whitespace, Lexer, MAX_STRING_SIZE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadError {
    UnknownToken(String),
    UnterminatedString,
    BadQuoteTermination(String),
    UnclosedParen,
    TokenTooLong,
    BadCharacter(String),
    UnexpectedEof,
}

impl ReadError {
    /// Whether more input could still turn this into a complete expression.
    pub fn is_incomplete(&self) -> bool {
        match *self {
            ReadError::UnterminatedString
            | ReadError::UnclosedParen
            | ReadError::UnexpectedEof => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ReadError::UnknownToken(ref token) =>
                write!(f, "Unknown token {}", token),
            ReadError::UnterminatedString => write!(f, "Unterminated string"),
            ReadError::BadQuoteTermination(ref token) =>
                write!(f, "Can't terminate quote here: {}", token),
            ReadError::UnclosedParen => write!(f, "Unclosed parenthesis"),
            ReadError::TokenTooLong =>
                write!(f, "Token longer than {} characters", MAX_STRING_SIZE),
            ReadError::BadCharacter(ref token) =>
                write!(f, "Invalid character literal {}", token),
            ReadError::UnexpectedEof => write!(f, "Unexpected end of input"),
        }
    }
}

/// Read the first expression of `input`.
#[cfg(test)]
pub fn read(input: &str) -> Result<Scheme, ReadError> {
    Reader::new(input).read_expr()?.ok_or(ReadError::UnexpectedEof)
}

pub struct Reader<I: Iterator<Item = char>> {
    lexer: Lexer<I>,
    cur_token: Option<String>,
}

impl<'a> Reader<Chars<'a>> {
    pub fn new(input: &'a str) -> Self {
        Reader::from_chars(input.chars())
    }
}

impl<I: Iterator<Item = char>> Reader<I> {
    pub fn from_chars(source: I) -> Self {
        Reader {
            lexer: Lexer::new(source),
            cur_token: None,
        }
    }

    fn fill_cur_token(&mut self) -> Result<(), ReadError> {
        if self.cur_token.is_some() {
            return Ok(());
        }

        match self.lexer.next() {
            Some(Ok(tok)) => self.cur_token = Some(tok),
            Some(Err(err)) => return Err(err),
            None => {},
        }

        Ok(())
    }

    pub fn peek_token(&mut self) -> Result<Option<&str>, ReadError> {
        self.fill_cur_token()?;

        Ok(self.cur_token.as_ref().map(String::as_str))
    }

    pub fn read_token(&mut self) -> Result<Option<String>, ReadError> {
        self.fill_cur_token()?;
        Ok(mem::replace(&mut self.cur_token, None))
    }

    pub fn consume_whitespace(&mut self) -> Result<(), ReadError> {
        loop {
            let blank = match self.peek_token()? {
                Some(token) => is_whitespace(token),
                None => false,
            };
            if !blank {
                return Ok(());
            }
            self.cur_token = None;
        }
    }

    fn next_significant(&mut self) -> Result<Option<String>, ReadError> {
        self.consume_whitespace()?;
        self.read_token()
    }

    /// Read one top-level expression; `None` once the input is exhausted.
    pub fn read_expr(&mut self) -> Result<Option<Scheme>, ReadError> {
        match self.next_significant()? {
            Some(token) => self.parse_expression(token).map(Some),
            None => Ok(None),
        }
    }

    /// Read every remaining expression as the body of one `(begin ...)`.
    pub fn read_program(&mut self) -> Result<Scheme, ReadError> {
        let mut forms = Vec::new();
        while let Some(form) = self.read_expr()? {
            forms.push(form);
        }
        Ok(Scheme::cons(Scheme::symbol("begin"), Scheme::list(forms)))
    }

    /// Parse the expression starting with `token`, leaving the stream just
    /// past its last token.
    pub fn parse_expression(&mut self, token: String) ->
        Result<Scheme, ReadError> {

        if let Some(rest) = token.strip_prefix('\'') {
            let quoted = if rest.is_empty() {
                let next = self.next_significant()?
                    .ok_or(ReadError::UnexpectedEof)?;
                self.parse_expression(next)?
            } else {
                self.parse_expression(rest.to_string())?
            };
            return Ok(Scheme::list(&[Scheme::symbol("quote"), quoted]));
        }

        if token == "(" {
            self.parse_list()
        } else {
            self.parse_atom(token)
        }
    }

    fn parse_list(&mut self) -> Result<Scheme, ReadError> {
        let first = self.next_significant()?.ok_or(ReadError::UnclosedParen)?;
        if first == ")" {
            return Ok(Scheme::null());
        }

        let mut list = vec![self.parse_expression(first)?];
        loop {
            self.consume_whitespace()?;
            match self.peek_token()? {
                None => return Err(ReadError::UnclosedParen),
                Some(")") => break,
                Some(_) => {},
            }
            let token = self.read_token()?.ok_or(ReadError::UnclosedParen)?;
            list.push(self.parse_expression(token)?);
        }

        match self.read_token()? {
            Some(ref token) if token == ")" => Ok(Scheme::list(list)),
            _ => Err(ReadError::UnclosedParen),
        }
    }

    fn parse_atom(&mut self, token: String) -> Result<Scheme, ReadError> {
        match grammar::classify(&token) {
            TokenClass::Number(n) => Ok(Scheme::int(n)),
            TokenClass::Boolean(b) => Ok(Scheme::boolean(b)),
            TokenClass::CharacterPrefix => self.parse_character(),
            TokenClass::StringStart => self.parse_string(),
            TokenClass::Symbol => Ok(Scheme::symbol(token)),
            TokenClass::Unknown => Err(ReadError::UnknownToken(token)),
        }
    }

    // After a bare `#`: `\` then one character or a character name.
    fn parse_character(&mut self) -> Result<Scheme, ReadError> {
        match self.read_token()? {
            Some(ref token) if token == "\\" => {},
            Some(token) => return Err(ReadError::BadCharacter(
                format!("#{}", token))),
            None => return Err(ReadError::UnexpectedEof),
        }
        let name = self.read_token()?.ok_or(ReadError::UnexpectedEof)?;
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Scheme::character(c)),
            _ if name == "newline" => Ok(Scheme::character('\n')),
            _ if name == "space" => Ok(Scheme::character(' ')),
            _ => Err(ReadError::BadCharacter(format!("#\\{}", name))),
        }
    }

    // After the opening `"`. Tokens are taken verbatim until an unescaped
    // `"`; a `\` token escapes the first character of the next token.
    fn parse_string(&mut self) -> Result<Scheme, ReadError> {
        let mut buffer = String::new();
        let mut length = 0;
        let mut escaped = false;

        loop {
            let token = self.read_token()?
                .ok_or(ReadError::UnterminatedString)?;
            let mut rest = token.as_str();

            if escaped {
                let mut chars = rest.chars();
                match chars.next() {
                    Some('n') => buffer.push('\n'),
                    Some(c) => buffer.push(c),
                    None => {},
                }
                length += 1;
                rest = chars.as_str();
                escaped = false;
            } else if rest == "\"" {
                let terminated = match self.peek_token()? {
                    Some(next) => next.chars().next().map_or(true, is_delimiter),
                    None => true,
                };
                if !terminated {
                    return Err(ReadError::BadQuoteTermination(format!(
                        "\"{}\"{}", buffer, self.peek_token()?.unwrap_or(""))));
                }
                return Ok(Scheme::string(buffer));
            } else if rest == "\\" {
                escaped = true;
                continue;
            }

            buffer.push_str(rest);
            length += rest.chars().count();
            if length > MAX_STRING_SIZE {
                return Err(ReadError::TokenTooLong);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::scheme::Scheme;
    use super::{read, ReadError, Reader};

    fn reprint(input: &str) -> String {
        read(input).unwrap().to_string()
    }

    fn read_err(input: &str) -> ReadError {
        read(input).unwrap_err()
    }

    #[test]
    fn test_read_0() {
        read("0").unwrap();
    }

    #[test]
    fn test_atoms() {
        assert_eq!(read("42").unwrap(), Scheme::int(42));
        assert_eq!(read("0x2a").unwrap(), Scheme::int(42));
        assert_eq!(read("#t").unwrap(), Scheme::boolean(true));
        assert_eq!(read("#f").unwrap(), Scheme::boolean(false));
        assert_eq!(read("#\\a").unwrap(), Scheme::character('a'));
        assert_eq!(read("#\\space").unwrap(), Scheme::character(' '));
        assert_eq!(read("#\\newline").unwrap(), Scheme::character('\n'));
        assert_eq!(read("#\\(").unwrap(), Scheme::character('('));
        assert_eq!(read("foo").unwrap(), Scheme::symbol("foo"));
        assert!(read("#f").unwrap().is(&Scheme::boolean(false)));
    }

    #[test]
    fn test_strings() {
        assert_eq!(read("\"hi\"").unwrap(), Scheme::string("hi"));
        assert_eq!(read("\"\"").unwrap(), Scheme::string(""));
        assert_eq!(read("\"a  b (c)\"").unwrap(), Scheme::string("a  b (c)"));
        assert_eq!(read("\"hi\\nthere\"").unwrap(),
            Scheme::string("hi\nthere"));
        assert_eq!(read("\"say \\\"x\\\"\"").unwrap(),
            Scheme::string("say \"x\""));
        assert_eq!(read("\"back\\\\slash\"").unwrap(),
            Scheme::string("back\\slash"));
    }

    #[test]
    fn test_string_errors() {
        assert_eq!(read_err("\"abc"), ReadError::UnterminatedString);
        match read_err("\"abc\"def") {
            ReadError::BadQuoteTermination(_) => {},
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(read("(\"abc\")").unwrap().to_string(), "(\"abc\")");
    }

    #[test]
    fn test_string_length_limit() {
        let words = vec!["word"; 300].join(" ");
        assert_eq!(read_err(&format!("\"{}\"", words)), ReadError::TokenTooLong);

        let longest = "abc ".repeat(256);
        assert_eq!(longest.len(), 1024);
        assert_eq!(read(&format!("\"{}\"", longest)).unwrap().to_string(),
            format!("\"{}\"", longest));
        assert_eq!(read_err(&format!("\"{}x\"", longest)),
            ReadError::TokenTooLong);
    }

    #[test]
    fn test_lists() {
        assert_eq!(reprint("()"), "()");
        assert_eq!(reprint("(1 2 3)"), "(1 2 3)");
        assert_eq!(reprint("( 1\n (2 ()) 3 )"), "(1 (2 ()) 3)");
        assert_eq!(reprint("(a(b)c)"), "(a (b) c)");
    }

    #[test]
    fn test_quote() {
        assert_eq!(reprint("'foo"), "(quote foo)");
        assert_eq!(reprint("''foo"), "(quote (quote foo))");
        assert_eq!(reprint("'(a b)"), "(quote (a b))");
        assert_eq!(reprint("' x"), "(quote x)");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(read_err("(1 2"), ReadError::UnclosedParen);
        assert_eq!(read_err("("), ReadError::UnclosedParen);
        assert_eq!(read_err("08"), ReadError::UnknownToken("08".to_string()));
        assert_eq!(read_err(")"), ReadError::UnknownToken(")".to_string()));
        assert_eq!(read_err("(a . b)"),
            ReadError::UnknownToken(".".to_string()));
        assert_eq!(read_err("#\\"), ReadError::UnexpectedEof);
        assert_eq!(read_err("#\\abc"),
            ReadError::BadCharacter("#\\abc".to_string()));
        assert_eq!(read_err("# a"), ReadError::BadCharacter("# ".to_string()));
        assert_eq!(read_err(""), ReadError::UnexpectedEof);
        assert!(read_err("(1 \"x").is_incomplete());
        assert!(!read_err("08").is_incomplete());
    }

    #[test]
    fn test_read_expr_one_at_a_time() {
        let mut reader = Reader::new("(define x 1) x\n 'y");
        assert_eq!(reader.read_expr().unwrap().unwrap().to_string(),
            "(define x 1)");
        assert_eq!(reader.read_expr().unwrap().unwrap().to_string(), "x");
        assert_eq!(reader.read_expr().unwrap().unwrap().to_string(),
            "(quote y)");
        assert!(reader.read_expr().unwrap().is_none());
    }

    #[test]
    fn test_read_program() {
        let program = Reader::new("(define x 1)\n(+ x 1)\n").read_program()
            .unwrap();
        assert_eq!(program.to_string(), "(begin (define x 1) (+ x 1))");
        assert_eq!(Reader::new("").read_program().unwrap().to_string(),
            "(begin)");
    }

    #[test]
    fn test_peek_and_whitespace() {
        let mut reader = Reader::new("  \n a b");
        assert_eq!(reader.peek_token().unwrap(), Some(" "));
        reader.consume_whitespace().unwrap();
        assert_eq!(reader.peek_token().unwrap(), Some("a"));
        assert_eq!(reader.read_token().unwrap(), Some("a".to_string()));
        assert_eq!(reader.read_token().unwrap(), Some(" ".to_string()));
        assert_eq!(reader.read_token().unwrap(), Some("b".to_string()));
        assert_eq!(reader.read_token().unwrap(), None);
    }
}
