//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+). The
//! decoded payload starts with `N` pairs of `object-number offset`, followed
//! by the objects themselves starting at byte `First`.

use super::lexer::{Lexer, Token};
use super::objects::{parse_object, PdfDictionary, PdfObject};
use super::{ParseError, ParseOptions, ParseResult};
use std::io::Cursor;

/// A decoded object stream
#[derive(Debug, Clone)]
pub struct ObjectStream {
    /// Offset of the first object inside the decoded data
    first: u64,
    /// `(object number, offset relative to first)` in stream order
    entries: Vec<(u32, u64)>,
    data: Vec<u8>,
}

impl ObjectStream {
    /// Parse the header of a decoded object stream
    pub fn parse(dict: &PdfDictionary, data: Vec<u8>) -> ParseResult<Self> {
        let count = object_count(dict)?;
        let first = dict
            .get("First")
            .and_then(|obj| obj.as_integer())
            .and_then(|first| u64::try_from(first).ok())
            .ok_or_else(|| ParseError::SyntaxError {
                position: 0,
                message: "object stream has no valid /First".to_string(),
            })?;

        let entries = read_object_numbers(&data, count)?;
        Ok(Self {
            first,
            entries,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(u32, u64)] {
        &self.entries
    }

    /// Parse the object at `index`. If the header disagrees about which
    /// object sits there, the header is searched for `number` instead.
    pub fn get_object(
        &self,
        index: u32,
        number: u32,
        options: &ParseOptions,
    ) -> ParseResult<PdfObject> {
        let offset = match self.entries.get(index as usize) {
            Some(&(n, offset)) if n == number => offset,
            _ => self
                .entries
                .iter()
                .find(|(n, _)| *n == number)
                .map(|&(_, offset)| offset)
                .ok_or_else(|| ParseError::SyntaxError {
                    position: 0,
                    message: format!("object {number} not found in object stream"),
                })?,
        };

        let mut lexer = Lexer::new(Cursor::new(self.data.as_slice()))?;
        lexer.seek(self.first + offset)?;
        parse_object(&mut lexer, options)
    }
}

/// Read the `/N` entry of an object stream dictionary
pub fn object_count(dict: &PdfDictionary) -> ParseResult<usize> {
    dict.get("N")
        .and_then(|obj| obj.as_integer())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ParseError::SyntaxError {
            position: 0,
            message: "object stream has no valid /N".to_string(),
        })
}

/// Lex `count` pairs of `object-number offset` from the start of `data`
pub fn read_object_numbers(data: &[u8], count: usize) -> ParseResult<Vec<(u32, u64)>> {
    let mut lexer = Lexer::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(count.min(data.len() / 2));

    for _ in 0..count {
        let number = read_header_integer(&mut lexer, "object number")?;
        let number = u32::try_from(number).map_err(|_| ParseError::SyntaxError {
            position: lexer.token_start(),
            message: format!("object number {number} out of range"),
        })?;
        let offset = read_header_integer(&mut lexer, "object offset")?;
        entries.push((number, offset));
    }

    Ok(entries)
}

fn read_header_integer(lexer: &mut Lexer<Cursor<&[u8]>>, what: &str) -> ParseResult<u64> {
    match lexer.next_token()? {
        Token::Integer(n) if n >= 0 => Ok(n as u64),
        other => Err(ParseError::UnexpectedToken {
            expected: what.to_string(),
            found: format!("{other:?}"),
        }),
    }
}
