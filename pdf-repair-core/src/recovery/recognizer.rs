//! Object body recognition
//!
//! Given a lexer positioned right after `n g obj`, skips over the object's
//! body and locates its stream payload. The body is parsed without a
//! reference table, so a declared `/Length` is only used when it is a direct
//! integer, and even then it is checked against the `endstream` keyword.

use super::{RepairOptions, RepairReport};
use crate::parser::lexer::{Lexer, Token};
use crate::parser::objects::{parse_dictionary, PdfDictionary, PdfObject};
use crate::parser::scanner::ByteScanner;
use crate::parser::xref::StreamSpan;
use crate::parser::ParseResult;
use std::io::{Read, Seek};
use tracing::warn;

const ENDSTREAM: &[u8; 9] = b"endstream";

/// Trailer values captured while scanning. Each key keeps the last value seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailerFragments {
    pub root: Option<PdfObject>,
    pub info: Option<PdfObject>,
    pub encrypt: Option<PdfObject>,
    pub id: Option<PdfObject>,
}

impl TrailerFragments {
    /// Take Encrypt and ID from an xref stream dictionary
    pub fn capture_xref_stream(&mut self, dict: &PdfDictionary) {
        replace_from(&mut self.encrypt, dict, "Encrypt");
        replace_from(&mut self.id, dict, "ID");
    }

    /// Take Encrypt, ID, Root and Info from a trailer dictionary
    pub fn capture_trailer(&mut self, dict: &PdfDictionary) {
        replace_from(&mut self.encrypt, dict, "Encrypt");
        replace_from(&mut self.id, dict, "ID");
        replace_from(&mut self.root, dict, "Root");
        replace_from(&mut self.info, dict, "Info");
    }

    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }
}

fn replace_from(slot: &mut Option<PdfObject>, dict: &PdfDictionary, key: &str) {
    if let Some(value) = dict.get(key) {
        *slot = Some(value.clone());
    }
}

/// What was found in an object body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectBody {
    /// Stream payload; `corrected_length` is set when the declared length
    /// was missing or wrong and the payload had to be measured
    pub stream: Option<StreamSpan>,
    /// The body was a `/Type/XRef` dictionary
    pub is_xref_stream: bool,
}

/// Skip over an object body, stopping at `stream`, `endobj`, an unreadable
/// byte, end of file, or an integer that starts the next object's header.
///
/// A dictionary that fails to parse is treated as empty unless the failure
/// was caused by end of file, which is returned as an error.
pub fn recognize_object_body<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    options: &RepairOptions,
    fragments: &mut TrailerFragments,
    report: &mut RepairReport,
) -> ParseResult<ObjectBody> {
    let mut body = ObjectBody::default();
    let mut length_hint = 0i64;

    let mut token = lexer.next_token()?;
    if token == Token::DictStart {
        let position = lexer.token_start();
        let dict = match parse_dictionary(lexer, &options.parse) {
            Ok(dict) => dict,
            Err(e) if e.is_eof() => return Err(e),
            Err(e) => {
                let message = format!("cannot parse object at {position}, proceeding anyway: {e}");
                warn!(offset = position, "{message}");
                report.note(options, message);
                PdfDictionary::new()
            }
        };

        if dict.get_type() == Some("XRef") {
            fragments.capture_xref_stream(&dict);
            body.is_xref_stream = true;
        }
        if let Some(PdfObject::Integer(length)) = dict.get("Length") {
            length_hint = *length;
        }

        token = lexer.next_token()?;
    }

    loop {
        match token {
            Token::Stream => break,
            Token::EndObj | Token::Error | Token::Eof => return Ok(body),
            Token::Integer(_) => {
                // belongs to the next object's header
                lexer.unread_token()?;
                return Ok(body);
            }
            _ => token = lexer.next_token()?,
        }
    }

    let span = locate_stream(lexer, length_hint, options, report)?;
    body.stream = Some(span);

    let end = lexer.next_token()?;
    if end != Token::EndObj {
        let message = format!(
            "object with stream at {} is missing 'endobj', found {end:?}",
            span.offset
        );
        warn!(offset = span.offset, "{message}");
        report.note(options, message);
        if end != Token::Eof {
            lexer.unread_token()?;
        }
    }

    Ok(body)
}

/// Find the payload after the `stream` keyword and leave the lexer just after
/// `endstream`
fn locate_stream<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    length_hint: i64,
    options: &RepairOptions,
    report: &mut RepairReport,
) -> ParseResult<StreamSpan> {
    let scanner = lexer.scanner_mut();
    match scanner.peek_byte()? {
        Some(b'\r') => {
            scanner.read_byte()?;
            if scanner.peek_byte()? == Some(b'\n') {
                scanner.read_byte()?;
            }
        }
        Some(b'\n') => {
            scanner.read_byte()?;
        }
        _ => {}
    }
    let offset = scanner.tell();

    if length_hint > 0 {
        let end = u64::try_from(length_hint)
            .ok()
            .and_then(|hint| offset.checked_add(hint))
            .filter(|end| *end <= lexer.scanner().len());
        if let Some(end) = end {
            lexer.seek(end)?;
            if lexer.next_token()? == Token::EndStream {
                return Ok(StreamSpan {
                    offset,
                    corrected_length: None,
                });
            }
        }
        let message = format!(
            "stream at {offset} declares length {length_hint}, not followed by 'endstream'"
        );
        warn!(offset, length = length_hint, "{message}");
        report.note(options, message);
    }

    lexer.seek(offset)?;
    let length = match find_endstream(lexer.scanner_mut(), offset)? {
        Some(length) => length,
        None => {
            let length = lexer.scanner().len().saturating_sub(offset);
            let message = format!("stream at {offset} has no 'endstream', running to end of file");
            warn!(offset, length, "{message}");
            report.note(options, message);
            length
        }
    };

    Ok(StreamSpan {
        offset,
        corrected_length: Some(length),
    })
}

/// Slide a 9-byte window from `start` until it reads `endstream`. Returns the
/// distance from `start` to the keyword and leaves the scanner after it.
fn find_endstream<R: Read + Seek>(
    scanner: &mut ByteScanner<R>,
    start: u64,
) -> ParseResult<Option<u64>> {
    let mut window = [0u8; 9];
    if scanner.read_into(&mut window)? < window.len() {
        return Ok(None);
    }

    while &window != ENDSTREAM {
        let Some(byte) = scanner.read_byte()? else {
            return Ok(None);
        };
        window.copy_within(1.., 0);
        window[8] = byte;
    }

    Ok(Some(scanner.tell() - start - ENDSTREAM.len() as u64))
}
