//! PDF Stream Filters
//!
//! Decodes stream payloads according to ISO 32000-1 Section 7.4. Only the
//! filters needed to read object streams and ordinary text payloads are
//! supported; predictors are not applied.

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,
}

impl Filter {
    /// Parse filter from name, accepting the inline-image abbreviations
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            _ => None,
        }
    }
}

/// Decode stream data according to the filters named in `dict`
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let names: Vec<&str> = match dict.get("Filter") {
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => array
            .0
            .iter()
            .map(|obj| {
                obj.as_name().map(|n| n.as_str()).ok_or_else(|| {
                    ParseError::StreamDecodeError("invalid entry in filter array".to_string())
                })
            })
            .collect::<ParseResult<_>>()?,
        Some(other) => {
            return Err(ParseError::StreamDecodeError(format!(
                "invalid Filter value: {other:?}"
            )))
        }
    };

    let mut result = data.to_vec();
    for name in names {
        let filter = Filter::from_name(name)
            .ok_or_else(|| ParseError::StreamDecodeError(format!("unsupported filter: {name}")))?;
        result = apply_filter(&result, filter)?;
    }

    Ok(result)
}

/// Apply a single filter to data
pub fn apply_filter(data: &[u8], filter: Filter) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| ParseError::StreamDecodeError(format!("Flate decode error: {e}")))?;
    Ok(result)
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::StreamDecodeError(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Decode ASCIIHexDecode data; an odd final digit is padded with 0
fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &ch in data {
        if ch.is_ascii_whitespace() {
            continue;
        }
        if ch == b'>' {
            break;
        }
        let value = hex_digit_value(ch).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("invalid hex digit: {}", ch as char))
        })?;
        match high.take() {
            Some(h) => result.push((h << 4) | value),
            None => high = Some(value),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }

    Ok(result)
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &ch in body {
        match ch {
            b'~' => break,
            b'z' if count == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = ch - b'!';
                count += 1;
                if count == 5 {
                    result.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            ch if ch.is_ascii_whitespace() => {}
            other => {
                return Err(ParseError::StreamDecodeError(format!(
                    "invalid ASCII85 character: {}",
                    other as char
                )))
            }
        }
    }

    if count == 1 {
        return Err(ParseError::StreamDecodeError(
            "ASCII85 data ends with a single character".to_string(),
        ));
    }
    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let bytes = ascii85_group(&group)?;
        result.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(result)
}

fn ascii85_group(group: &[u8; 5]) -> ParseResult<[u8; 4]> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    let value = u32::try_from(value)
        .map_err(|_| ParseError::StreamDecodeError("ASCII85 group overflow".to_string()))?;
    Ok(value.to_be_bytes())
}
