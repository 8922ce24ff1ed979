//! cotlinc-lex - Lexical analyzer for the Cotlin language.
//!
//! Transforms UTF-8 source bytes into a flat token stream. Keywords are
//! Cyrillic dotted identifiers (`исп.команду.print`, `повторять.раз`, ...)
//! that lex as single identifier tokens and are reclassified by exact
//! match against the keyword table.

mod cursor;
mod token;

pub use token::{Token, KEYWORDS};

use cursor::Cursor;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors raised during tokenization. All are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum LexError {
    #[error("bad character at offset {offset}: {byte:#04x}")]
    BadChar { offset: usize, byte: u8 },

    #[error("unterminated string")]
    UnterminatedString,

    #[error("number literal out of range: {0}")]
    NumberOutOfRange(String),
}

/// Returns true for bytes that may start an identifier.
///
/// Any byte >= 0x80 qualifies, which is how multi-byte UTF-8 sequences
/// extend names without the lexer decoding them.
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

/// Returns true for bytes that may continue an identifier.
///
/// `.` is an identifier byte; the dotted keywords depend on it.
fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit() || b == b'.'
}

/// Lexer state over a single source buffer.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    keywords: FxHashMap<&'static str, Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            keywords: KEYWORDS.iter().cloned().collect(),
        }
    }

    /// Tokenizes the remaining input, ending with `Token::Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::with_capacity(128);
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Scans the next token.
    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        if self.cursor.is_at_end() {
            return Ok(Token::Eof);
        }

        let b = self.cursor.peek();
        if is_ident_start(b) {
            return Ok(self.lex_ident());
        }
        if b.is_ascii_digit() {
            return self.lex_number();
        }
        if b == b'"' {
            return self.lex_string();
        }
        self.lex_operator()
    }

    /// Whitespace is ASCII space, tab, CR, LF.
    fn skip_whitespace(&mut self) {
        while matches!(self.cursor.peek(), b' ' | b'\t' | b'\r' | b'\n') {
            self.cursor.bump();
        }
    }

    /// Lexes an identifier and reclassifies keywords.
    fn lex_ident(&mut self) -> Token {
        let start = self.cursor.position();
        self.cursor.bump();
        while is_ident_continue(self.cursor.peek()) {
            self.cursor.bump();
        }
        // Identifier bytes are a subset of the valid UTF-8 input.
        let text = std::str::from_utf8(self.cursor.slice_from(start))
            .expect("identifier bytes are valid UTF-8")
            .to_owned();

        match self.keywords.get(text.as_str()) {
            Some(kw) => kw.clone(),
            None => Token::Ident(text),
        }
    }

    /// Lexes a decimal integer literal as a signed 64-bit value.
    fn lex_number(&mut self) -> Result<Token, LexError> {
        let start = self.cursor.position();
        while self.cursor.peek().is_ascii_digit() {
            self.cursor.bump();
        }
        let text = std::str::from_utf8(self.cursor.slice_from(start))
            .expect("digit bytes are valid UTF-8");
        text.parse::<i64>()
            .map(Token::Number)
            .map_err(|_| LexError::NumberOutOfRange(text.to_owned()))
    }

    /// Lexes a `"..."` literal.
    ///
    /// Escapes: `\n`, `\t`, `\"`, `\\`; any other `\x` yields `x`
    /// literally. Reaching end of input before the closing quote is fatal.
    fn lex_string(&mut self) -> Result<Token, LexError> {
        self.cursor.bump();
        let mut buf = Vec::new();
        loop {
            let c = self.cursor.bump();
            match c {
                0 => return Err(LexError::UnterminatedString),
                b'"' => break,
                b'\\' => {
                    let e = self.cursor.bump();
                    if e == 0 {
                        return Err(LexError::UnterminatedString);
                    }
                    buf.push(match e {
                        b'n' => b'\n',
                        b't' => b'\t',
                        other => other,
                    });
                }
                other => buf.push(other),
            }
        }
        // Escape handling only ever substitutes ASCII bytes, so the buffer
        // stays valid UTF-8.
        Ok(Token::Str(
            String::from_utf8(buf).expect("string bytes are valid UTF-8"),
        ))
    }

    /// Lexes operators and symbols with maximal munch: `=/=` first, then
    /// the two-character operators, then single characters.
    fn lex_operator(&mut self) -> Result<Token, LexError> {
        let offset = self.cursor.position();
        let (b1, b2, b3) = (
            self.cursor.peek(),
            self.cursor.peek_ahead(1),
            self.cursor.peek_ahead(2),
        );

        if (b1, b2, b3) == (b'=', b'/', b'=') {
            self.cursor.bump();
            self.cursor.bump();
            self.cursor.bump();
            return Ok(Token::NotEq);
        }

        let two = match (b1, b2) {
            (b'=', b'=') => Some(Token::EqEq),
            (b'!', b'=') => Some(Token::NotEq),
            (b'<', b'=') => Some(Token::LtEq),
            (b'>', b'=') => Some(Token::GtEq),
            (b'=', b'>') => Some(Token::FatArrow),
            _ => None,
        };
        if let Some(op) = two {
            self.cursor.bump();
            self.cursor.bump();
            return Ok(op);
        }

        let one = match b1 {
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'=' => Some(Token::Eq),
            b'<' => Some(Token::Lt),
            b'>' => Some(Token::Gt),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'{' => Some(Token::LBrace),
            b'}' => Some(Token::RBrace),
            b';' => Some(Token::Semicolon),
            b',' => Some(Token::Comma),
            _ => None,
        };
        match one {
            Some(op) => {
                self.cursor.bump();
                Ok(op)
            }
            None => Err(LexError::BadChar { offset, byte: b1 }),
        }
    }
}

/// Tokenizes an entire source buffer.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}
