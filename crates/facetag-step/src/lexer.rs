//! Part 21 (STEP physical file format) lexer.
//!
//! Tokenizes STEP files according to ISO 10303-21. Handles:
//! - Keywords (e.g., `CARTESIAN_POINT`, `DATA`, `ENDSEC`) and user-defined `!KEYWORDS`
//! - Entity references (e.g., `#123`)
//! - Strings (e.g., `'hello'`) and binary literals (e.g., `"0FF"`)
//! - Real numbers (e.g., `1.5E-10`, `-3.14`) and integers
//! - Enumerations (e.g., `.TRUE.`, `.UNSPECIFIED.`)
//! - Punctuation (parentheses, comma, semicolon, equals, asterisk, dollar)
//! - Comments, which are skipped unless the lexer is built with
//!   [`Lexer::with_comments`]
//!
//! Every token records the byte range it was read from, so callers can edit
//! the source text without re-serializing it.

use std::ops::Range;

use crate::error::StepError;

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or identifier (e.g., `CARTESIAN_POINT`, `DATA`).
    Keyword(String),
    /// Entity reference (e.g., `#123` becomes `EntityRef(123)`).
    EntityRef(u64),
    /// String literal (contents without quotes, `''` unescaped).
    String(String),
    /// Binary literal (hex digits without quotes).
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (e.g., `.TRUE.` becomes `Enum("TRUE")`).
    Enum(String),
    /// Comment body, without the `/*` and `*/` delimiters.
    Comment(String),
    /// Left parenthesis `(`.
    LParen,
    /// Right parenthesis `)`.
    RParen,
    /// Comma `,`.
    Comma,
    /// Semicolon `;`.
    Semicolon,
    /// Equals `=`.
    Equals,
    /// Asterisk `*` (derived value marker).
    Asterisk,
    /// Dollar `$` (null/unset value marker).
    Dollar,
}

/// Line and column of a token start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub col: usize,
}

/// A token with its position in the source.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Position where the token starts.
    pub pos: Position,
    /// Byte range of the token in the input, delimiters included.
    pub span: Range<usize>,
}

impl SpannedToken {
    /// Byte range of a string literal's raw contents (between the quotes,
    /// escapes left as written). `None` for other tokens.
    pub fn string_contents(&self) -> Option<Range<usize>> {
        match self.token {
            Token::String(_) => Some(self.span.start + 1..self.span.end - 1),
            _ => None,
        }
    }
}

/// Lexer for Part 21 STEP files.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    keep_comments: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input. Comments are skipped.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
            keep_comments: false,
        }
    }

    /// Create a lexer that reports comments as [`Token::Comment`].
    pub fn with_comments(input: &'a [u8]) -> Self {
        Self {
            keep_comments: true,
            ..Self::new(input)
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, StepError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    /// Get the next token, or `None` if at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, StepError> {
        self.skip_trivia();

        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };

        let start = self.pos;
        let start_pos = Position {
            line: self.line,
            col: self.col,
        };

        let token = match ch {
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b',' => self.single(Token::Comma),
            b';' => self.single(Token::Semicolon),
            b'=' => self.single(Token::Equals),
            b'*' => self.single(Token::Asterisk),
            b'$' => self.single(Token::Dollar),
            b'/' if self.peek_at(1) == Some(b'*') => self.read_comment(),
            b'#' => self.read_entity_ref()?,
            b'\'' => self.read_string()?,
            b'"' => self.read_binary()?,
            b'.' => self.read_enum()?,
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()?
            }
            b'0'..=b'9' => self.read_number()?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'!' => self.read_keyword(),
            _ => {
                return Err(StepError::lexer(
                    self.line,
                    self.col,
                    format!("unexpected character: '{}'", ch as char),
                ));
            }
        };

        Ok(Some(SpannedToken {
            token,
            pos: start_pos,
            span: start..self.pos,
        }))
    }

    fn peek_char(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn at_comment(&self) -> bool {
        self.peek_char() == Some(b'/') && self.peek_at(1) == Some(b'*')
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek_char().is_some_and(|ch| ch.is_ascii_whitespace()) {
                self.advance();
            }
            if !self.keep_comments && self.at_comment() {
                self.read_comment();
                continue;
            }
            break;
        }
    }

    /// Reads `/* ... */`. An unterminated comment runs to end of input.
    fn read_comment(&mut self) -> Token {
        self.advance(); // /
        self.advance(); // *
        let body_start = self.pos;
        let mut body_end = self.input.len();
        while self.pos < self.input.len() {
            if self.peek_char() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                body_end = self.pos;
                self.advance();
                self.advance();
                break;
            }
            self.advance();
        }
        let body = String::from_utf8_lossy(&self.input[body_start..body_end]).into_owned();
        Token::Comment(body)
    }

    fn read_entity_ref(&mut self) -> Result<Token, StepError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // skip '#'

        let digits_start = self.pos;
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[digits_start..self.pos];

        if digits.is_empty() {
            return Err(StepError::lexer(
                start_line,
                start_col,
                "expected digits after '#'",
            ));
        }

        let s = String::from_utf8_lossy(digits);
        let id: u64 = s.parse().map_err(|_| {
            StepError::lexer(start_line, start_col, format!("invalid entity ID: {s}"))
        })?;

        Ok(Token::EntityRef(id))
    }

    fn read_string(&mut self) -> Result<Token, StepError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // skip opening quote

        let mut content = Vec::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(StepError::lexer(
                        start_line,
                        start_col,
                        "unterminated string",
                    ));
                }
                Some(b'\'') => {
                    self.advance();
                    // Check for escaped quote ''
                    if self.peek_char() == Some(b'\'') {
                        content.push(b'\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(ch) => {
                    content.push(ch);
                    self.advance();
                }
            }
        }

        let s = String::from_utf8_lossy(&content).into_owned();
        Ok(Token::String(s))
    }

    fn read_binary(&mut self) -> Result<Token, StepError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // skip opening '"'

        let digits_start = self.pos;
        loop {
            match self.peek_char() {
                Some(b'"') => break,
                Some(ch) if ch.is_ascii_hexdigit() => {
                    self.advance();
                }
                Some(ch) => {
                    return Err(StepError::lexer(
                        start_line,
                        start_col,
                        format!("invalid character in binary: '{}'", ch as char),
                    ));
                }
                None => {
                    return Err(StepError::lexer(
                        start_line,
                        start_col,
                        "unterminated binary",
                    ));
                }
            }
        }
        let digits = String::from_utf8_lossy(&self.input[digits_start..self.pos]).into_owned();
        self.advance(); // skip closing '"'
        Ok(Token::Binary(digits))
    }

    fn read_enum(&mut self) -> Result<Token, StepError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // skip opening '.'

        let name_start = self.pos;
        loop {
            match self.peek_char() {
                Some(b'.') => break,
                Some(ch) if ch.is_ascii_alphanumeric() || ch == b'_' => {
                    self.advance();
                }
                Some(ch) => {
                    return Err(StepError::lexer(
                        start_line,
                        start_col,
                        format!("invalid character in enumeration: '{}'", ch as char),
                    ));
                }
                None => {
                    return Err(StepError::lexer(
                        start_line,
                        start_col,
                        "unterminated enumeration",
                    ));
                }
            }
        }
        let name = String::from_utf8_lossy(&self.input[name_start..self.pos]).into_owned();
        self.advance(); // skip closing '.'

        if name.is_empty() {
            return Err(StepError::lexer(start_line, start_col, "empty enumeration"));
        }

        Ok(Token::Enum(name))
    }

    fn read_number(&mut self) -> Result<Token, StepError> {
        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        let mut is_real = false;

        // Sign
        if matches!(self.peek_char(), Some(b'-' | b'+')) {
            self.advance();
        }

        // Integer part
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part. Part 21 allows a bare trailing point (`1.`).
        if self.peek_char() == Some(b'.')
            && !self.peek_at(1).is_some_and(|ch| ch.is_ascii_alphabetic() && ch != b'E' && ch != b'e')
        {
            is_real = true;
            self.advance();
            while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if matches!(self.peek_char(), Some(b'E' | b'e')) {
            is_real = true;
            self.advance();
            if matches!(self.peek_char(), Some(b'-' | b'+')) {
                self.advance();
            }
            while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
                self.advance();
            }
        }

        let s = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();

        if is_real {
            let val: f64 = s.parse().map_err(|_| {
                StepError::lexer(start_line, start_col, format!("invalid real number: {s}"))
            })?;
            Ok(Token::Real(val))
        } else {
            let val: i64 = s.parse().map_err(|_| {
                StepError::lexer(start_line, start_col, format!("invalid integer: {s}"))
            })?;
            Ok(Token::Integer(val))
        }
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.pos;
        if self.peek_char() == Some(b'!') {
            self.advance();
        }
        // Keywords can include alphanumeric, underscore, and hyphen
        // (for identifiers like ISO-10303-21 and END-ISO-10303-21)
        while self
            .peek_char()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'-')
        {
            self.advance();
        }
        let s = String::from_utf8_lossy(&self.input[start..self.pos]).to_uppercase();
        Token::Keyword(s)
    }
}
