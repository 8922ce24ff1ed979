//! cotlinc-par - Recursive-descent parser for the Cotlin language.
//!
//! Grammar (statements):
//!
//! ```text
//! program   := statement*
//! statement := print | let | set | if | repeat | expr_stmt
//! print     := "исп.команду.print" "(" expression ")" ";"?
//! let       := "пусть" IDENT "=" expression ";"?
//! set       := IDENT "=" expression ";"?
//! if        := "в" "таком" "случае" expression block ("иначе.если" block)?
//! repeat    := "повторять.раз" expression block
//! block     := "{" statement* "}"
//! ```
//!
//! Expressions run the usual precedence chain: or, and, equality,
//! comparison, additive, multiplicative, unary, postfix call, primary.
//! `( IDENT ) =>` is disambiguated from a parenthesized expression by
//! three-token lookahead.

mod ast;

pub use ast::{BinOp, Expr, Program, Stmt, StrId, StringTable, UnOp};

use cotlinc_lex::Token;
use thiserror::Error;

/// Errors raised during parsing. All are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: Token },

    #[error("bad expression at {0:?}")]
    BadExpr(Token),

    #[error("call on non-name")]
    CallOnNonName,

    #[error("expected }} before end of input")]
    UnclosedBlock,
}

/// Parses a token stream (terminated by `Token::Eof`) into a program.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    strings: StringTable,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            strings: StringTable::new(),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    /// Consumes the next token if it equals `tok`.
    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, what: &'static str) -> Result<(), ParseError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(ParseError::Expected {
                expected: what,
                found: self.peek().clone(),
            })
        }
    }

    fn expect_ident(&mut self, what: &'static str) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(_) => match self.advance() {
                Token::Ident(name) => Ok(name),
                _ => unreachable!(),
            },
            other => Err(ParseError::Expected {
                expected: what,
                found: other.clone(),
            }),
        }
    }

    fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while *self.peek() != Token::Eof {
            stmts.push(self.parse_statement()?);
        }
        Ok(Program {
            stmts,
            strings: self.strings,
        })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Token::Print => {
                self.advance();
                self.expect(Token::LParen, "`(`")?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "`)`")?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Print(expr))
            }
            Token::Let => {
                self.advance();
                let name = self.expect_ident("variable name")?;
                self.expect(Token::Eq, "`=`")?;
                let value = self.parse_expression()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Let { name, value })
            }
            Token::In => {
                self.advance();
                self.expect(Token::Such, "`таком`")?;
                self.expect(Token::Case, "`случае`")?;
                let cond = self.parse_expression()?;
                let then_block = Box::new(self.parse_block()?);
                let else_block = if self.eat(&Token::Else) {
                    Some(Box::new(self.parse_block()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_block,
                    else_block,
                })
            }
            Token::Repeat => {
                self.advance();
                let count = self.parse_expression()?;
                let body = Box::new(self.parse_block()?);
                Ok(Stmt::Repeat { count, body })
            }
            // Assignment needs one token of lookahead: IDENT `=`.
            Token::Ident(_) if *self.peek_ahead(1) == Token::Eq => {
                let name = self.expect_ident("variable name")?;
                self.advance();
                let value = self.parse_expression()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Set { name, value })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_block(&mut self) -> Result<Stmt, ParseError> {
        self.expect(Token::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace) {
            if *self.peek() == Token::Eof {
                return Err(ParseError::UnclosedBlock);
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(Stmt::Block(stmts))
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_logic_or()
    }

    fn parse_logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logic_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_logic_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_compare()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_compare()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::LtEq => BinOp::Le,
                Token::GtEq => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnOp::Neg,
            Token::Not => UnOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::LParen) {
            let mut args = Vec::new();
            if !self.eat(&Token::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(Token::Comma, "`,`")?;
                }
            }
            let name = match expr {
                Expr::Var(name) => name,
                _ => return Err(ParseError::CallOnNonName),
            };
            expr = Expr::Call { name, args };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Number(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Num(n))
            }
            Token::Str(_) => match self.advance() {
                Token::Str(text) => Ok(Expr::Str(self.strings.intern(text))),
                _ => unreachable!(),
            },
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Ident(_) => {
                let name = self.expect_ident("identifier")?;
                Ok(Expr::Var(name))
            }
            Token::LParen => {
                // `( IDENT ) =>` starts a lambda; anything else after `(`
                // is a parenthesized expression.
                if matches!(self.peek_ahead(1), Token::Ident(_))
                    && *self.peek_ahead(2) == Token::RParen
                    && *self.peek_ahead(3) == Token::FatArrow
                {
                    self.advance();
                    let param = self.expect_ident("lambda parameter")?;
                    self.expect(Token::RParen, "`)`")?;
                    self.expect(Token::FatArrow, "`=>`")?;
                    let body = self.parse_expression()?;
                    return Ok(Expr::Lambda {
                        param,
                        body: Box::new(body),
                    });
                }
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(expr)
            }
            other => Err(ParseError::BadExpr(other.clone())),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
