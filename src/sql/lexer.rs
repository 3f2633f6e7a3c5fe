//! SQL Lexer (Tokenizer)
//!
//! This module converts SQL strings into a stream of positioned tokens.
//! Comments are not part of the grammar; callers strip them first
//! (see [`crate::sql::script`]).

use super::token::{Spanned, Token};
use crate::error::{Error, Result};

/// SQL Lexer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Current position in input
    position: usize,
    /// 1-based line of `position`
    line: usize,
    /// 1-based column of `position`
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input. Any unrecognized character fails the
    /// whole call.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace();

        let (line, column) = (self.line, self.column);
        if self.is_at_end() {
            return Ok(Spanned::new(Token::Eof, line, column));
        }

        let ch = self.current_char();

        let token = match ch {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '.' => Some(Token::Dot),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Asterisk),
            '/' => Some(Token::Slash),
            '=' => Some(Token::Eq),
            _ => None,
        };

        if let Some(token) = token {
            self.advance();
            return Ok(Spanned::new(token, line, column));
        }

        let token = match ch {
            '<' => {
                self.advance();
                match self.peek_current() {
                    Some('=') => {
                        self.advance();
                        Token::Lte
                    }
                    Some('>') => {
                        self.advance();
                        Token::Neq
                    }
                    _ => Token::Lt,
                }
            }
            '>' => {
                self.advance();
                if self.peek_current() == Some('=') {
                    self.advance();
                    Token::Gte
                } else {
                    Token::Gt
                }
            }
            '!' => {
                self.advance();
                if self.peek_current() == Some('=') {
                    self.advance();
                    Token::Neq
                } else {
                    Token::Bang
                }
            }
            '\'' | '"' => self.read_string(ch, line, column)?,
            c if c.is_ascii_digit() => self.read_number(line, column)?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            other => {
                return Err(Error::UnexpectedCharacter {
                    ch: other,
                    line,
                    column,
                })
            }
        };

        Ok(Spanned::new(token, line, column))
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get the current character
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Advance to the next character, tracking line and column
    fn advance(&mut self) {
        if let Some(&ch) = self.input.get(self.position) {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Read a string literal delimited by `quote`; a backslash escapes the
    /// next character
    fn read_string(&mut self, quote: char, line: usize, column: usize) -> Result<Token> {
        self.advance(); // skip opening quote

        let mut value = String::new();
        let mut escaped = false;

        while !self.is_at_end() {
            let ch = self.current_char();
            self.advance();

            if escaped {
                value.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                return Ok(Token::StringLiteral(value));
            } else {
                value.push(ch);
            }
        }

        Err(Error::UnterminatedString { line, column })
    }

    /// Read an unsigned number with at most one decimal point
    fn read_number(&mut self, line: usize, column: usize) -> Result<Token> {
        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();
            if ch.is_ascii_digit() || ch == '.' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let invalid = || Error::InvalidNumber {
            text: value.clone(),
            line,
            column,
        };

        match value.matches('.').count() {
            0 => value
                .parse::<i64>()
                .map(Token::IntegerLiteral)
                .map_err(|_| invalid()),
            1 => value
                .parse::<f64>()
                .map(Token::FloatLiteral)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Read an identifier or keyword; identifiers keep their case
    fn read_identifier(&mut self) -> Token {
        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::from_keyword(&value).unwrap_or(Token::Identifier(value))
    }
}
