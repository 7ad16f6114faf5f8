use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Identifier,
    String,
    Number,

    And,
    Class,
    Else,
    False,
    For,
    Func,
    If,
    Null,
    Or,
    Print,
    Return,
    Struct,
    Super,
    This,
    True,
    Var,
    While,

    Invalid,
    EOF,
}

impl TokenType {
    pub fn keyword(text: &str) -> Option<TokenType> {
        use TokenType::*;
        let t_type = match text {
            "and" => And,
            "class" => Class,
            "else" => Else,
            "false" => False,
            "for" => For,
            "func" => Func,
            "if" => If,
            "null" => Null,
            "or" => Or,
            "print" => Print,
            "return" => Return,
            "struct" => Struct,
            "super" => Super,
            "this" => This,
            "true" => True,
            "var" => Var,
            "while" => While,
            _ => return None,
        };

        Some(t_type)
    }
}

/// Decoded payload of number and string tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub t_type: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(
        t_type: TokenType,
        lexeme: &str,
        literal: Option<Literal>,
        line: usize,
        col: usize,
    ) -> Self {
        Self {
            t_type,
            lexeme: lexeme.to_string(),
            literal,
            line,
            col,
        }
    }

    /// Human readable description used in "expected vs found" messages.
    pub fn describe(&self) -> String {
        match self.t_type {
            TokenType::EOF => "end of input".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {} {:?}", self.t_type, self.lexeme, self.literal)
    }
}
