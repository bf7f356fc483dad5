//! Part 21 parser: builds a raw entity graph from tokens.
//!
//! The parser constructs a graph of STEP entities without interpreting their
//! semantics. Each entity has an ID, a type name, and a list of arguments.
//! Arguments can be nested (lists within lists).
//!
//! Complex entity instances (`#7 = (A(...) B(...));`) are stored under the
//! first partial type name, with one [`StepValue::Typed`] argument per part.

use crate::error::StepError;
use crate::lexer::{Lexer, SpannedToken, Token};
use std::collections::HashMap;

/// A single argument value in a STEP entity.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference (e.g., `#123`).
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Binary literal.
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (e.g., `.TRUE.`).
    Enum(String),
    /// List of values (nested in parentheses).
    List(Vec<StepValue>),
    /// Derived/computed value (`*`).
    Derived,
    /// Null/unset value (`$`).
    Null,
    /// Typed value: `TYPE_NAME(args)` inline or complex entity part.
    Typed {
        /// The type name.
        type_name: String,
        /// Arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// Try to get as an entity reference.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as a real number (also accepts integer).
    pub fn as_real(&self) -> Option<f64> {
        match self {
            StepValue::Real(v) => Some(*v),
            StepValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a list.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, StepValue::Null)
    }

    /// Check if this is a derived value.
    pub fn is_derived(&self) -> bool {
        matches!(self, StepValue::Derived)
    }
}

/// A parsed STEP entity.
#[derive(Debug, Clone)]
pub struct StepEntity {
    /// Entity ID (from `#123`).
    pub id: u64,
    /// Entity type name (e.g., `CARTESIAN_POINT`).
    pub type_name: String,
    /// Arguments to the entity constructor.
    pub args: Vec<StepValue>,
    /// True for complex instances, whose args are the `Typed` parts.
    pub complex: bool,
}

impl StepEntity {
    /// The partial type of a complex instance named `type_name`.
    pub fn part(&self, type_name: &str) -> Option<&[StepValue]> {
        if !self.complex {
            return None;
        }
        self.args.iter().find_map(|arg| match arg {
            StepValue::Typed { type_name: t, args } if t == type_name => Some(args.as_slice()),
            _ => None,
        })
    }
}

/// The complete parsed content of a STEP file.
#[derive(Debug, Clone)]
pub struct StepFile {
    /// Header section contents.
    pub header: Vec<StepEntity>,
    /// Data section entities, indexed by ID.
    pub entities: HashMap<u64, StepEntity>,
}

impl StepFile {
    /// Get an entity by ID.
    pub fn get(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    /// Get an entity by ID, returning an error if not found.
    pub fn require(&self, id: u64) -> Result<&StepEntity, StepError> {
        self.entities.get(&id).ok_or(StepError::MissingEntity(id))
    }

    /// Get all entities of a given type, ordered by ID.
    pub fn entities_of_type(&self, type_name: &str) -> Vec<&StepEntity> {
        let mut found: Vec<&StepEntity> = self
            .entities
            .values()
            .filter(|e| e.type_name == type_name)
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }
}

/// Parser for Part 21 STEP files.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    /// Parse a STEP file from bytes.
    pub fn parse(input: &[u8]) -> Result<StepFile, StepError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        parser.parse_file()
    }

    fn parse_file(&mut self) -> Result<StepFile, StepError> {
        let mut header = Vec::new();
        let mut entities = HashMap::new();

        self.expect_keyword("ISO-10303-21")?;
        self.expect_token(&Token::Semicolon)?;

        while !self.is_at_end() {
            if self.check_keyword("HEADER") {
                self.advance();
                self.expect_token(&Token::Semicolon)?;
                header = self.parse_section_entities()?;
                self.expect_keyword("ENDSEC")?;
                self.expect_token(&Token::Semicolon)?;
            } else if self.check_keyword("DATA") {
                self.advance();
                // DATA may carry a parameter list in edition 3 files.
                if self.check_token(&Token::LParen) {
                    self.parse_args()?;
                }
                self.expect_token(&Token::Semicolon)?;
                for entity in self.parse_data_section()? {
                    entities.insert(entity.id, entity);
                }
                self.expect_keyword("ENDSEC")?;
                self.expect_token(&Token::Semicolon)?;
            } else if self.check_keyword("END-ISO-10303-21") {
                self.advance();
                self.expect_token(&Token::Semicolon)?;
                break;
            } else {
                let tok = self.peek().cloned();
                return Err(StepError::parser(
                    None,
                    format!("unexpected token: {tok:?}"),
                ));
            }
        }

        Ok(StepFile { header, entities })
    }

    fn parse_section_entities(&mut self) -> Result<Vec<StepEntity>, StepError> {
        let mut entities = Vec::new();
        while !self.check_keyword("ENDSEC") && !self.is_at_end() {
            // Header entities don't have IDs, just type and args
            if let Some(Token::Keyword(type_name)) = self.peek().map(|t| t.token.clone()) {
                self.advance();
                let args = self.parse_args()?;
                self.expect_token(&Token::Semicolon)?;
                entities.push(StepEntity {
                    id: 0,
                    type_name,
                    args,
                    complex: false,
                });
            } else {
                break;
            }
        }
        Ok(entities)
    }

    fn parse_data_section(&mut self) -> Result<Vec<StepEntity>, StepError> {
        let mut entities = Vec::new();
        while !self.check_keyword("ENDSEC") && !self.is_at_end() {
            if let Some(Token::EntityRef(id)) = self.peek().map(|t| t.token.clone()) {
                self.advance();
                self.expect_token(&Token::Equals)?;

                let entity = match self.peek().map(|t| t.token.clone()) {
                    Some(Token::Keyword(type_name)) => {
                        self.advance();
                        let args = self.parse_args()?;
                        StepEntity {
                            id,
                            type_name,
                            args,
                            complex: false,
                        }
                    }
                    Some(Token::LParen) => self.parse_complex(id)?,
                    other => {
                        return Err(StepError::parser(
                            Some(id),
                            format!("expected type name, got {other:?}"),
                        ));
                    }
                };
                self.expect_token(&Token::Semicolon)?;
                entities.push(entity);
            } else {
                break;
            }
        }
        Ok(entities)
    }

    fn parse_complex(&mut self, id: u64) -> Result<StepEntity, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut parts = Vec::new();
        while let Some(Token::Keyword(type_name)) = self.peek().map(|t| t.token.clone()) {
            self.advance();
            let args = self.parse_args()?;
            parts.push(StepValue::Typed { type_name, args });
        }
        self.expect_token(&Token::RParen)?;

        let type_name = match parts.first() {
            Some(StepValue::Typed { type_name, .. }) => type_name.clone(),
            _ => {
                return Err(StepError::parser(Some(id), "empty complex entity"));
            }
        };
        Ok(StepEntity {
            id,
            type_name,
            args: parts,
            complex: true,
        })
    }

    fn parse_args(&mut self) -> Result<Vec<StepValue>, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.check_token(&Token::RParen) {
            args.push(self.parse_value()?);
            while self.check_token(&Token::Comma) {
                self.advance();
                args.push(self.parse_value()?);
            }
        }
        self.expect_token(&Token::RParen)?;
        Ok(args)
    }

    fn parse_value(&mut self) -> Result<StepValue, StepError> {
        let tok = self.peek().cloned();
        match tok.map(|t| t.token) {
            Some(Token::EntityRef(id)) => {
                self.advance();
                Ok(StepValue::EntityRef(id))
            }
            Some(Token::String(s)) => {
                self.advance();
                Ok(StepValue::String(s))
            }
            Some(Token::Binary(s)) => {
                self.advance();
                Ok(StepValue::Binary(s))
            }
            Some(Token::Real(v)) => {
                self.advance();
                Ok(StepValue::Real(v))
            }
            Some(Token::Integer(v)) => {
                self.advance();
                Ok(StepValue::Integer(v))
            }
            Some(Token::Enum(s)) => {
                self.advance();
                Ok(StepValue::Enum(s))
            }
            Some(Token::Asterisk) => {
                self.advance();
                Ok(StepValue::Derived)
            }
            Some(Token::Dollar) => {
                self.advance();
                Ok(StepValue::Null)
            }
            Some(Token::LParen) => Ok(StepValue::List(self.parse_args()?)),
            Some(Token::Keyword(type_name)) => {
                // Typed value: TYPE_NAME(args)
                self.advance();
                let args = self.parse_args()?;
                Ok(StepValue::Typed { type_name, args })
            }
            other => Err(StepError::parser(None, format!("unexpected value: {other:?}"))),
        }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check_token(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn check_keyword(&self, name: &str) -> bool {
        matches!(self.peek(), Some(SpannedToken { token: Token::Keyword(k), .. }) if k == name)
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), StepError> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            let actual = self.peek().cloned();
            Err(StepError::parser(
                None,
                format!("expected {expected:?}, got {actual:?}"),
            ))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<(), StepError> {
        if self.check_keyword(name) {
            self.advance();
            Ok(())
        } else {
            let actual = self.peek().cloned();
            Err(StepError::parser(
                None,
                format!("expected keyword '{name}', got {actual:?}"),
            ))
        }
    }
}
