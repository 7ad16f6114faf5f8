use std::{iter::Peekable, str::CharIndices};

use tracing::{debug, trace};

use crate::{
    error::{ErrorKind, OkraError},
    token::{Literal, Token, TokenType},
};

/// Scans `source` into tokens. Lexical errors do not stop the scan: each one
/// leaves an `Invalid` token in the stream and an entry in the error list.
pub fn scan(source: &str) -> (Vec<Token>, Vec<OkraError>) {
    Scanner::new(source).scan_tokens()
}

pub struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    tokens: Vec<Token>,
    errors: Vec<OkraError>,
    start: usize,
    current: usize,
    line: usize,
    col: usize,
    start_line: usize,
    start_col: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            iter: source.char_indices().peekable(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            col: 0,
            start_line: 1,
            start_col: 1,
        }
    }

    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<OkraError>) {
        loop {
            self.start = self.current;
            self.start_line = self.line;
            self.start_col = self.col + 1;

            let Some(character) = self.advance() else {
                break;
            };
            self.scan_token(character);
        }

        self.tokens.push(Token::new(
            TokenType::EOF,
            "",
            None,
            self.line,
            self.col + 1,
        ));

        debug!(
            tokens = self.tokens.len(),
            errors = self.errors.len(),
            "scan complete"
        );

        (self.tokens, self.errors)
    }

    fn scan_token(&mut self, character: char) {
        match character {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' if self.peek_and_match('=') => self.add_token(TokenType::BangEqual),
            '!' => self.add_token(TokenType::Bang),
            '=' if self.peek_and_match('=') => self.add_token(TokenType::EqualEqual),
            '=' => self.add_token(TokenType::Equal),
            '<' if self.peek_and_match('=') => self.add_token(TokenType::LessEqual),
            '<' => self.add_token(TokenType::Less),
            '>' if self.peek_and_match('=') => self.add_token(TokenType::GreaterEqual),
            '>' => self.add_token(TokenType::Greater),
            // comments run until the end of the line
            '/' if self.peek_and_match('/') => {
                while self.peek().is_some_and(|x| x != '\n') {
                    self.advance();
                }
            }
            '/' => self.add_token(TokenType::Slash),

            ' ' | '\r' | '\t' | '\n' => (),

            '"' | '\'' => self.string(character),
            c if c.is_ascii_digit() => self.number(),
            c if is_identifier_start(c) => self.identifier(),

            c => self.invalid(&format!("Unexpected character '{c}'.")),
        }
    }

    fn string(&mut self, quote: char) {
        while self.peek().is_some_and(|x| x != quote) {
            self.advance();
        }

        if self.peek().is_none() {
            self.invalid("Unterminated string.");
            return;
        }

        // closing quote
        self.advance();

        let value = &self.source[self.start + 1..self.current - 1];
        self.add_token_literal(TokenType::String, Some(Literal::String(value.to_string())));
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|x| x.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|x| x.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|x| x.is_ascii_digit()) {
                self.advance();
            }
        }

        match self.source[self.start..self.current].parse::<f64>() {
            Ok(value) => self.add_token_literal(TokenType::Number, Some(Literal::Number(value))),
            Err(_) => self.invalid("Malformed number literal."),
        }
    }

    fn identifier(&mut self) {
        while self.peek().is_some_and(is_identifier_part) {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let t_type = TokenType::keyword(text).unwrap_or(TokenType::Identifier);
        self.add_token(t_type);
    }

    fn advance(&mut self) -> Option<char> {
        let (index, character) = self.iter.next()?;
        self.current = index + character.len_utf8();

        if character == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }

        Some(character)
    }

    fn add_token(&mut self, t_type: TokenType) {
        self.add_token_literal(t_type, None)
    }

    fn add_token_literal(&mut self, t_type: TokenType, literal: Option<Literal>) {
        let text = &self.source[self.start..self.current];
        let token = Token::new(t_type, text, literal, self.start_line, self.start_col);
        trace!(%token, line = token.line, col = token.col, "token");
        self.tokens.push(token);
    }

    fn invalid(&mut self, message: &str) {
        self.add_token(TokenType::Invalid);
        self.errors.push(OkraError::new(
            ErrorKind::LexError,
            self.start_line,
            self.start_col,
            message,
        ));
    }

    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|&(_, c)| c)
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn peek_and_match(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true;
        }

        false
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
