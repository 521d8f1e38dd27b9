//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3.
//! Indirect references (`a b R`) are recognised with a seek-based look-ahead,
//! so no reference table is needed while parsing.

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseOptions, ParseResult};
use indexmap::IndexMap;
use std::fmt;
use std::io::{Read, Seek};

/// Identifier of an indirect object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        PdfName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

impl PdfString {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

impl PdfArray {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }
}

/// PDF Dictionary object, keeps keys in file order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub IndexMap<PdfName, PdfObject>);

impl PdfDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(&PdfName::new(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PdfObject> {
        self.0.get_mut(&PdfName::new(key))
    }

    /// Insert a key-value pair, dropping any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName::new(key), value);
    }

    /// Remove a key, keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.shift_remove(&PdfName::new(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&PdfName::new(key))
    }

    /// Get the /Type entry as a name
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(|obj| obj.as_name()).map(|n| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Reference(ObjectId),
}

impl PdfObject {
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, integers are widened
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

/// Parse one value starting at the lexer's position
pub fn parse_object<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    options: &ParseOptions,
) -> ParseResult<PdfObject> {
    let token = lexer.next_token()?;
    parse_value(lexer, token, options, 0)
}

/// Parse the body of a dictionary whose `<<` has already been consumed
pub fn parse_dictionary<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    options: &ParseOptions,
) -> ParseResult<PdfDictionary> {
    parse_dictionary_at(lexer, options, 1)
}

fn check_depth<R: Read + Seek>(
    lexer: &Lexer<R>,
    options: &ParseOptions,
    depth: usize,
) -> ParseResult<()> {
    if depth > options.max_nesting_depth {
        return Err(ParseError::NestingTooDeep {
            position: lexer.token_start(),
            limit: options.max_nesting_depth,
        });
    }
    Ok(())
}

fn parse_value<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    token: Token,
    options: &ParseOptions,
    depth: usize,
) -> ParseResult<PdfObject> {
    match token {
        Token::Null => Ok(PdfObject::Null),
        Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
        Token::Real(r) => Ok(PdfObject::Real(r)),
        Token::String(s) => Ok(PdfObject::String(PdfString(s))),
        Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
        Token::Integer(i) => parse_integer_or_reference(lexer, i),
        Token::ArrayStart => {
            check_depth(lexer, options, depth + 1)?;
            parse_array(lexer, options, depth + 1)
        }
        Token::DictStart => {
            check_depth(lexer, options, depth + 1)?;
            Ok(PdfObject::Dictionary(parse_dictionary_at(
                lexer,
                options,
                depth + 1,
            )?))
        }
        Token::Eof => Err(ParseError::UnexpectedEof {
            position: lexer.position(),
        }),
        Token::Error => Err(ParseError::SyntaxError {
            position: lexer.token_start(),
            message: "unexpected character".to_string(),
        }),
        other => Err(ParseError::UnexpectedToken {
            expected: "PDF object".to_string(),
            found: format!("{other:?}"),
        }),
    }
}

/// After an integer, look ahead for `gen R`. The lexer is rewound when the
/// look-ahead does not form a reference.
fn parse_integer_or_reference<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    value: i64,
) -> ParseResult<PdfObject> {
    let Ok(number) = u32::try_from(value) else {
        return Ok(PdfObject::Integer(value));
    };

    let resume = lexer.position();
    if let Token::Integer(gen) = lexer.next_token()? {
        if let Ok(generation) = u16::try_from(gen) {
            if lexer.next_token()? == Token::R {
                return Ok(PdfObject::Reference(ObjectId::new(number, generation)));
            }
        }
    }

    lexer.seek(resume)?;
    Ok(PdfObject::Integer(value))
}

fn parse_array<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    options: &ParseOptions,
    depth: usize,
) -> ParseResult<PdfObject> {
    let mut elements = PdfArray::default();

    loop {
        let token = lexer.next_token()?;
        match token {
            Token::ArrayEnd => break,
            Token::Eof => {
                return Err(ParseError::UnexpectedEof {
                    position: lexer.position(),
                })
            }
            token => elements.push(parse_value(lexer, token, options, depth)?),
        }
    }

    Ok(PdfObject::Array(elements))
}

fn parse_dictionary_at<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    options: &ParseOptions,
    depth: usize,
) -> ParseResult<PdfDictionary> {
    let mut dict = PdfDictionary::new();

    loop {
        let key = match lexer.next_token()? {
            Token::DictEnd => break,
            Token::Name(name) => name,
            Token::Eof => {
                return Err(ParseError::UnexpectedEof {
                    position: lexer.position(),
                })
            }
            other => {
                return Err(ParseError::SyntaxError {
                    position: lexer.token_start(),
                    message: format!("expected name as dictionary key, found {other:?}"),
                })
            }
        };

        let value = match lexer.next_token()? {
            // a key with no value right before >> reads as null
            Token::DictEnd => {
                dict.insert(key, PdfObject::Null);
                break;
            }
            token => parse_value(lexer, token, options, depth)?,
        };
        dict.insert(key, value);
    }

    Ok(dict)
}
