use std::{mem, rc::Rc};

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    ast::{Expr, FunctionDecl, LiteralValue, Stmt},
    callable::INITIALIZER,
    error::{ErrorKind, OkraError},
    printer,
    token::{Literal, Token, TokenType},
};

const MAX_ARGS: usize = 255;

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    errors: Vec<ParseError>,
    block_depth: u32,
    function_depth: u32,
    struct_depth: u32,
    in_initializer: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{msg}")]
pub struct ParseError {
    pub token: Token,
    pub msg: String,
}

impl ParseError {
    fn new(token: &Token, msg: &str) -> Self {
        Self {
            token: token.clone(),
            msg: msg.to_string(),
        }
    }

    fn expected(token: &Token, msg: &str) -> Self {
        Self {
            token: token.clone(),
            msg: format!("{msg} Found {}.", token.describe()),
        }
    }
}

impl From<ParseError> for OkraError {
    fn from(err: ParseError) -> Self {
        OkraError::new(ErrorKind::SyntaxError, err.token.line, err.token.col, err.msg)
    }
}

impl Parser<'_> {
    /// `tokens` must end with an `EOF` token, as produced by the scanner.
    pub fn new(tokens: &[Token]) -> Parser<'_> {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            block_depth: 0,
            function_depth: 0,
            struct_depth: 0,
            in_initializer: false,
        }
    }

    // maps to program rule in the grammar
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => {
                    trace!(stmt = %printer::summarize(&stmt), "parsed");
                    statements.push(stmt);
                }
                Err(e) => self.recover(e),
            }
        }

        debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parse complete"
        );

        (statements, self.errors)
    }

    fn recover(&mut self, error: ParseError) {
        debug!(line = error.token.line, col = error.token.col, msg = %error.msg, "syntax error");
        self.errors.push(error);
        self.synchronize();
    }

    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.match_token(&[TokenType::Struct]) {
            self.struct_declaration()
        } else if self.match_token(&[TokenType::Func]) {
            Ok(Stmt::Function(self.function("function")?))
        } else if self.match_token(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn struct_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenType::Identifier, "Expect struct name.")?;
        self.consume(TokenType::LeftBrace, "Expect '{' before struct body.")?;

        self.struct_depth += 1;
        let methods = self.struct_body();
        self.struct_depth -= 1;
        let methods = methods?;

        self.consume(TokenType::RightBrace, "Expect '}' after struct body.")?;

        Ok(Stmt::Struct { name, methods })
    }

    fn struct_body(&mut self) -> Result<Vec<Rc<FunctionDecl>>, ParseError> {
        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            self.consume(TokenType::Func, "Expect 'func' before method declaration.")?;
            methods.push(self.function("method")?);
        }

        Ok(methods)
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, ParseError> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {kind} name."),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.errors.push(ParseError::new(
                        &token,
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);

                if !self.match_token(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
        )?;

        let is_initializer = kind == "method" && name.lexeme == INITIALIZER;
        let enclosing = mem::replace(&mut self.in_initializer, is_initializer);
        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;
        self.in_initializer = enclosing;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_token(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_token(&[TokenType::For]) {
            return self.for_statement();
        }
        if self.match_token(&[TokenType::If]) {
            return self.if_statement();
        }
        if self.match_token(&[TokenType::Print]) {
            return self.print_statement();
        }
        if self.match_token(&[TokenType::Return]) {
            return self.return_statement();
        }
        if self.match_token(&[TokenType::While]) {
            return self.while_statement();
        }

        if self.match_token(&[TokenType::LeftBrace]) {
            return Ok(Stmt::Block {
                statements: self.block()?,
            });
        }

        self.expression_statement()
    }

    // the opening brace has already been consumed
    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.block_depth += 1;
        let statements = self.block_statements();
        self.block_depth -= 1;
        let statements = statements?;

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => self.recover(e),
            }
        }

        Ok(statements)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    // for loops are desugared into a while loop wrapped in a block
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = if self.match_token(&[TokenType::Semicolon]) {
            None
        } else if self.match_token(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let body = match increment {
            Some(inc) => Stmt::Block {
                statements: vec![self.statement()?, Stmt::Expression { expression: inc }],
            },
            None => self.statement()?,
        };

        let condition = condition.unwrap_or(Expr::Literal {
            value: LiteralValue::Bool(true),
        });

        let body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        let body = match initializer {
            Some(init) => Stmt::Block {
                statements: vec![init, body],
            },
            None => body,
        };

        Ok(body)
    }

    fn print_statement(&mut self) -> Result<Stmt, ParseError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;

        Ok(Stmt::Print { expression })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        if self.function_depth == 0 {
            self.errors.push(ParseError::new(
                &keyword,
                "Can't return from top-level code.",
            ));
        }

        let value = if !self.check(TokenType::Semicolon) {
            if self.in_initializer {
                self.errors.push(ParseError::new(
                    &keyword,
                    "Can't return a value from an initializer.",
                ));
            }
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;

        Ok(Stmt::Expression { expression })
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.or()?;

        if self.match_token(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name } => Ok(Expr::Assign { name, value }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),
                expr => {
                    // reported without unwinding, the parser is not confused
                    self.errors
                        .push(ParseError::new(&equals, "Invalid assignment target."));
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        self.left_association_logical(TokenType::Or, Self::and)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        self.left_association_logical(TokenType::And, Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        use TokenType::*;
        self.left_association_binary(&[BangEqual, EqualEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        use TokenType::*;
        self.left_association_binary(&[Greater, GreaterEqual, Less, LessEqual], Self::term)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        use TokenType::*;
        self.left_association_binary(&[Minus, Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        use TokenType::*;
        self.left_association_binary(&[Slash, Star], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        use TokenType::*;
        if self.match_token(&[Bang, Minus]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&[TokenType::Dot]) {
                let name =
                    self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.errors
                        .push(ParseError::new(&token, "Can't have more than 255 arguments."));
                }
                args.push(self.expression()?);
                if !self.match_token(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            args,
        })
    }

    /* error boundaries:
      ("!=" | "==") equality
    | (">" | ">=" | "<" | "<=") comparison
    | ("+") term
    | ("/" | "*") factor ; */
    fn primary(&mut self) -> Result<Expr, ParseError> {
        use TokenType::*;

        fn create_literal(value: LiteralValue) -> Expr {
            Expr::Literal { value }
        }

        if self.match_token(&[False]) {
            return Ok(create_literal(LiteralValue::Bool(false)));
        }

        if self.match_token(&[True]) {
            return Ok(create_literal(LiteralValue::Bool(true)));
        }

        if self.match_token(&[Null]) {
            return Ok(create_literal(LiteralValue::Null));
        }

        if self.match_token(&[Number, String]) {
            let token = self.previous();
            return match &token.literal {
                Some(Literal::Number(n)) => Ok(create_literal(LiteralValue::Number(*n))),
                Some(Literal::String(s)) => Ok(create_literal(LiteralValue::String(s.clone()))),
                None => Err(ParseError::new(token, "Literal token carries no value.")),
            };
        }

        if self.match_token(&[This]) {
            let keyword = self.previous().clone();
            if self.struct_depth == 0 {
                self.errors.push(ParseError::new(
                    &keyword,
                    "Can't use 'this' outside of a struct method.",
                ));
            }
            return Ok(Expr::This { keyword });
        }

        if self.match_token(&[LeftParen]) {
            let expr = self.expression()?;
            self.consume(RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping {
                expression: Box::new(expr),
            });
        }

        if self.match_token(&[Identifier]) {
            return Ok(Expr::Variable {
                name: self.previous().clone(),
            });
        }

        if self.match_token(&[EqualEqual, BangEqual]) {
            return self.missing_left_operand(Self::equality);
        }

        if self.match_token(&[Greater, GreaterEqual, Less, LessEqual]) {
            return self.missing_left_operand(Self::comparison);
        }

        if self.match_token(&[Plus]) {
            return self.missing_left_operand(Self::term);
        }

        if self.match_token(&[Star, Slash]) {
            return self.missing_left_operand(Self::factor);
        }

        Err(ParseError::expected(self.peek(), "Expect expression."))
    }

    // the right operand is parsed and discarded; its own errors are still reported
    fn missing_left_operand(
        &mut self,
        operand_fn: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let op = self.previous().clone();
        if let Err(e) = operand_fn(self) {
            self.errors.push(e);
        }
        Err(ParseError::new(&op, "Missing left-hand operand."))
    }

    fn consume(&mut self, t_type: TokenType, err_msg: &str) -> Result<Token, ParseError> {
        if self.check(t_type) {
            return Ok(self.advance().clone());
        }

        Err(ParseError::expected(self.peek(), err_msg))
    }

    // used for error recovery
    fn synchronize(&mut self) {
        use TokenType::*;
        if !self.at_block_end() {
            self.advance();
        }

        while !self.is_at_end() {
            if self.at_block_end() {
                return;
            }

            if self.current > 0 && self.previous().t_type == Semicolon {
                return;
            }

            if let Struct | Func | Var | For | If | While | Print | Return = self.peek().t_type {
                return;
            }
            self.advance();
        }
    }

    fn at_block_end(&self) -> bool {
        self.block_depth > 0 && self.check(TokenType::RightBrace)
    }

    fn left_association_binary(
        &mut self,
        types: &[TokenType],
        expr_fn: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut expr = expr_fn(self)?;
        while self.match_token(types) {
            let op = self.previous().clone();
            let right = expr_fn(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            }
        }

        Ok(expr)
    }

    fn left_association_logical(
        &mut self,
        t_type: TokenType,
        expr_fn: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut expr = expr_fn(self)?;
        while self.match_token(&[t_type]) {
            let op = self.previous().clone();
            let right = expr_fn(self)?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn match_token(&mut self, types: &[TokenType]) -> bool {
        for t_type in types {
            if self.check(*t_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, t_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().t_type == t_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().t_type, TokenType::EOF)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}
