//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer is
//! tolerant: bytes that cannot start a token come back as [`Token::Error`]
//! instead of failing, and `Err` is reserved for I/O failures.

use super::scanner::ByteScanner;
use super::ParseResult;
use std::io::{Read, Seek};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String (literal or hexadecimal), already unescaped
    String(Vec<u8>),

    /// Name object without the leading slash
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// true or false
    Boolean(bool),

    /// null
    Null,

    /// obj
    Obj,

    /// endobj
    EndObj,

    /// stream
    Stream,

    /// endstream
    EndStream,

    /// R
    R,

    /// xref
    XRef,

    /// trailer
    Trailer,

    /// startxref
    StartXRef,

    /// Any other run of regular characters
    Keyword(Vec<u8>),

    /// A byte that cannot start a token. It is left unconsumed.
    Error,

    /// End of file
    Eof,
}

/// PDF white-space characters (Table 1)
pub fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// PDF delimiter characters (Table 2)
pub fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(ch: u8) -> bool {
    !is_whitespace(ch) && !is_delimiter(ch)
}

/// PDF Lexer over a [`ByteScanner`]
pub struct Lexer<R> {
    scanner: ByteScanner<R>,
    token_start: u64,
}

impl<R: Read + Seek> Lexer<R> {
    /// Create a lexer at the start of `reader`
    pub fn new(reader: R) -> ParseResult<Self> {
        Ok(Self::from_scanner(ByteScanner::new(reader)?))
    }

    /// Create a lexer over an existing scanner
    pub fn from_scanner(scanner: ByteScanner<R>) -> Self {
        let token_start = scanner.tell();
        Self {
            scanner,
            token_start,
        }
    }

    /// Current absolute position
    pub fn position(&self) -> u64 {
        self.scanner.tell()
    }

    /// Move to an absolute position
    pub fn seek(&mut self, position: u64) -> ParseResult<()> {
        self.scanner.seek(position)?;
        Ok(())
    }

    /// Offset of the first byte of the most recently lexed token
    pub fn token_start(&self) -> u64 {
        self.token_start
    }

    /// Push the most recently lexed token back so the next call returns it again
    pub fn unread_token(&mut self) -> ParseResult<()> {
        self.scanner.seek(self.token_start)?;
        Ok(())
    }

    /// Access the underlying scanner
    pub fn scanner(&self) -> &ByteScanner<R> {
        &self.scanner
    }

    /// Mutable access to the underlying scanner
    pub fn scanner_mut(&mut self) -> &mut ByteScanner<R> {
        &mut self.scanner
    }

    /// Give back the scanner
    pub fn into_scanner(self) -> ByteScanner<R> {
        self.scanner
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace_and_comments()?;
        self.token_start = self.scanner.tell();

        let ch = match self.scanner.peek_byte()? {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'/' => {
                self.scanner.read_byte()?;
                self.read_name()
            }
            b'(' => {
                self.scanner.read_byte()?;
                self.read_literal_string()
            }
            b'<' => {
                self.scanner.read_byte()?;
                if self.scanner.peek_byte()? == Some(b'<') {
                    self.scanner.read_byte()?;
                    Ok(Token::DictStart)
                } else {
                    self.read_hex_string()
                }
            }
            b'>' => {
                self.scanner.read_byte()?;
                if self.scanner.peek_byte()? == Some(b'>') {
                    self.scanner.read_byte()?;
                    Ok(Token::DictEnd)
                } else {
                    self.scanner.unread_byte()?;
                    Ok(Token::Error)
                }
            }
            b'[' => {
                self.scanner.read_byte()?;
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.scanner.read_byte()?;
                Ok(Token::ArrayEnd)
            }
            b')' | b'{' | b'}' => Ok(Token::Error),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(),
            _ => self.read_keyword(),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> ParseResult<()> {
        while let Some(ch) = self.scanner.peek_byte()? {
            if is_whitespace(ch) {
                self.scanner.read_byte()?;
            } else if ch == b'%' {
                while let Some(c) = self.scanner.peek_byte()? {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.scanner.read_byte()?;
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn read_regular_run(&mut self) -> ParseResult<Vec<u8>> {
        let mut word = Vec::new();
        while let Some(ch) = self.scanner.peek_byte()? {
            if !is_regular(ch) {
                break;
            }
            self.scanner.read_byte()?;
            word.push(ch);
        }
        Ok(word)
    }

    /// Read a name object; `#xx` escapes are decoded, malformed ones kept verbatim
    fn read_name(&mut self) -> ParseResult<Token> {
        let raw = self.read_regular_run()?;
        let mut name = String::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let Some(value) = decode_hex_pair(raw[i + 1], raw[i + 2]) {
                    name.push(value as char);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i] as char);
            i += 1;
        }
        Ok(Token::Name(name))
    }

    /// Read a literal string. An unterminated string ends at end of file.
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        let mut string = Vec::new();
        let mut depth = 1;

        while let Some(ch) = self.scanner.read_byte()? {
            match ch {
                b'\\' => {
                    let Some(esc) = self.scanner.read_byte()? else {
                        break;
                    };
                    match esc {
                        b'n' => string.push(b'\n'),
                        b'r' => string.push(b'\r'),
                        b't' => string.push(b'\t'),
                        b'b' => string.push(b'\x08'),
                        b'f' => string.push(b'\x0C'),
                        b'\r' => {
                            // line continuation
                            if self.scanner.peek_byte()? == Some(b'\n') {
                                self.scanner.read_byte()?;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.scanner.peek_byte()? {
                                    Some(d @ b'0'..=b'7') => {
                                        self.scanner.read_byte()?;
                                        value = value * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            string.push((value & 0xFF) as u8);
                        }
                        other => string.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    string.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    string.push(ch);
                }
                _ => string.push(ch),
            }
        }

        Ok(Token::String(string))
    }

    /// Read a hexadecimal string; stray characters are ignored
    fn read_hex_string(&mut self) -> ParseResult<Token> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;

        while let Some(ch) = self.scanner.read_byte()? {
            if ch == b'>' {
                break;
            }
            let Some(nibble) = hex_value(ch) else {
                continue;
            };
            match high.take() {
                Some(h) => bytes.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        // odd digit count: the final digit is followed by an implied 0
        if let Some(h) = high {
            bytes.push(h << 4);
        }

        Ok(Token::String(bytes))
    }

    /// Read a number. A sign or dot without digits reads as zero.
    fn read_number(&mut self) -> ParseResult<Token> {
        let mut text = String::new();
        let mut is_real = false;

        if let Some(ch @ (b'+' | b'-')) = self.scanner.peek_byte()? {
            self.scanner.read_byte()?;
            text.push(ch as char);
        }

        while let Some(ch) = self.scanner.peek_byte()? {
            match ch {
                b'0'..=b'9' => text.push(ch as char),
                b'.' if !is_real => {
                    is_real = true;
                    text.push('.');
                }
                _ => break,
            }
            self.scanner.read_byte()?;
        }

        let digits = text.trim_start_matches(['+', '-']);
        if digits.is_empty() || digits == "." {
            return Ok(if is_real {
                Token::Real(0.0)
            } else {
                Token::Integer(0)
            });
        }

        if is_real {
            Ok(Token::Real(text.parse::<f64>().unwrap_or(0.0)))
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(Token::Integer(value)),
                Err(_) => Ok(Token::Real(text.parse::<f64>().unwrap_or(0.0))),
            }
        }
    }

    fn read_keyword(&mut self) -> ParseResult<Token> {
        let word = self.read_regular_run()?;
        if word.is_empty() {
            return Ok(Token::Error);
        }
        Ok(match word.as_slice() {
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            b"obj" => Token::Obj,
            b"endobj" => Token::EndObj,
            b"stream" => Token::Stream,
            b"endstream" => Token::EndStream,
            b"R" => Token::R,
            b"xref" => Token::XRef,
            b"trailer" => Token::Trailer,
            b"startxref" => Token::StartXRef,
            _ => Token::Keyword(word),
        })
    }
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

fn decode_hex_pair(high: u8, low: u8) -> Option<u8> {
    Some((hex_value(high)? << 4) | hex_value(low)?)
}
