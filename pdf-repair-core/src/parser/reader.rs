//! Table-backed PDF Reader
//!
//! Resolves objects through a reference table. This is what a successful
//! repair hands back: the byte source, the rebuilt table and the trailer.

use super::filters::decode_stream;
use super::lexer::{Lexer, Token};
use super::object_stream::ObjectStream;
use super::objects::{parse_object, ObjectId, PdfDictionary, PdfObject};
use super::xref::{EntryKind, XrefTable};
use super::{ParseError, ParseOptions};
use crate::error::{PdfError, RepairPhase, Result};
use std::collections::HashMap;
use std::io::{Read, Seek};

/// References followed by [`PdfReader::resolve`] before giving up
const MAX_RESOLVE_DEPTH: usize = 32;

/// PDF reader over a reference table
pub struct PdfReader<R> {
    lexer: Lexer<R>,
    xref: XrefTable,
    options: ParseOptions,
    /// Decoded object streams, by container number
    object_streams: HashMap<u32, ObjectStream>,
}

impl<R: Read + Seek> PdfReader<R> {
    /// Wrap a lexer and a table
    pub fn new(lexer: Lexer<R>, xref: XrefTable, options: ParseOptions) -> Self {
        Self {
            lexer,
            xref,
            options,
            object_streams: HashMap::new(),
        }
    }

    /// Get the reference table
    pub fn xref(&self) -> &XrefTable {
        &self.xref
    }

    pub fn xref_mut(&mut self) -> &mut XrefTable {
        &mut self.xref
    }

    /// Get the trailer dictionary
    pub fn trailer(&self) -> &PdfDictionary {
        self.xref.trailer()
    }

    /// Get parsing options
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Load an object by number, caching it in its table entry
    pub fn load_object(&mut self, number: u32) -> Result<&PdfObject> {
        let cached = self
            .xref
            .get(number)
            .ok_or(PdfError::InvalidObjectReference(number, 0))?
            .cached
            .is_some();

        if !cached {
            let object = self.read_object(number)?;
            if let Some(entry) = self.xref.get_mut(number) {
                entry.cached = Some(object);
            }
        }

        self.xref
            .get(number)
            .and_then(|entry| entry.cached.as_ref())
            .ok_or(PdfError::InvalidObjectReference(number, 0))
    }

    /// Load an object, checking the generation against the table
    pub fn get_object(&mut self, id: ObjectId) -> Result<&PdfObject> {
        let entry = self
            .xref
            .get(id.number)
            .ok_or(PdfError::InvalidObjectReference(id.number, id.generation))?;
        if entry.is_in_use() && entry.generation != id.generation {
            return Err(PdfError::InvalidObjectReference(id.number, id.generation));
        }
        self.load_object(id.number)
    }

    /// Follow references until a direct value is reached. References to
    /// free or missing objects resolve to null.
    pub fn resolve(&mut self, object: &PdfObject) -> Result<PdfObject> {
        let mut current = object.clone();
        for _ in 0..MAX_RESOLVE_DEPTH {
            let PdfObject::Reference(id) = current else {
                return Ok(current);
            };
            current = match self.get_object(id) {
                Ok(value) => value.clone(),
                Err(PdfError::FreeObject(_)) | Err(PdfError::InvalidObjectReference(..)) => {
                    PdfObject::Null
                }
                Err(e) => return Err(e),
            };
        }
        Err(PdfError::Parse(ParseError::SyntaxError {
            position: 0,
            message: format!("reference chain longer than {MAX_RESOLVE_DEPTH} starting at {object:?}"),
        }))
    }

    /// Length of a stream payload. A length measured during repair wins over
    /// the dictionary's /Length, which may be indirect.
    pub fn stream_length(&mut self, number: u32) -> Result<u64> {
        let span = self
            .xref
            .get(number)
            .and_then(|entry| entry.stream)
            .ok_or_else(|| not_a_stream(number))?;
        if let Some(length) = span.corrected_length {
            return Ok(length);
        }

        let declared = self
            .load_object(number)?
            .as_dict()
            .and_then(|dict| dict.get("Length"))
            .cloned()
            .ok_or_else(|| {
                PdfError::Parse(ParseError::SyntaxError {
                    position: span.offset,
                    message: format!("stream {number} has no /Length"),
                })
            })?;

        match self.resolve(&declared)?.as_integer() {
            Some(length) if length >= 0 => Ok(length as u64),
            _ => Err(PdfError::Parse(ParseError::SyntaxError {
                position: span.offset,
                message: format!("stream {number} has an invalid /Length"),
            })),
        }
    }

    /// Raw stream payload of an object
    pub fn stream_data(&mut self, number: u32) -> Result<Vec<u8>> {
        let length = self.stream_length(number)?;
        let offset = self
            .xref
            .get(number)
            .and_then(|entry| entry.stream)
            .map(|span| span.offset)
            .ok_or_else(|| not_a_stream(number))?;
        let length = usize::try_from(length).map_err(|_| not_a_stream(number))?;
        Ok(self.lexer.scanner_mut().read_range(offset, length)?)
    }

    /// Stream payload with the dictionary's filters applied
    pub fn decoded_stream(&mut self, number: u32) -> Result<Vec<u8>> {
        let dict = self
            .load_object(number)?
            .as_dict()
            .cloned()
            .ok_or_else(|| not_a_stream(number))?;
        let data = self.stream_data(number)?;
        Ok(decode_stream(&data, &dict)?)
    }

    /// Drop cached objects and decoded object streams
    pub fn clear_cache(&mut self) {
        self.xref.clear_cache();
        self.object_streams.clear();
    }

    /// Give back the byte source
    pub fn into_inner(self) -> R {
        self.lexer.into_scanner().into_inner()
    }

    /// Split into the lexer and the table
    pub fn into_parts(self) -> (Lexer<R>, XrefTable) {
        (self.lexer, self.xref)
    }

    fn read_object(&mut self, number: u32) -> Result<PdfObject> {
        let entry = self
            .xref
            .get(number)
            .ok_or(PdfError::InvalidObjectReference(number, 0))?;

        match entry.kind {
            EntryKind::Free { .. } => Err(PdfError::FreeObject(number)),
            EntryKind::InUse { offset } => {
                let generation = entry.generation;
                self.read_direct_object(number, generation, offset)
            }
            EntryKind::Compressed { container, index } => {
                self.read_compressed_object(number, container, index)
            }
        }
    }

    /// Parse `number generation obj <value>` at `offset`
    fn read_direct_object(&mut self, number: u32, generation: u16, offset: u64) -> Result<PdfObject> {
        self.lexer.seek(offset)?;

        let header = (
            self.lexer.next_token()?,
            self.lexer.next_token()?,
            self.lexer.next_token()?,
        );
        match header {
            (Token::Integer(n), Token::Integer(g), Token::Obj)
                if n == i64::from(number) && g == i64::from(generation) => {}
            found => {
                return Err(PdfError::Parse(ParseError::SyntaxError {
                    position: offset,
                    message: format!(
                        "expected header '{number} {generation} obj', found {found:?}"
                    ),
                }))
            }
        }

        Ok(parse_object(&mut self.lexer, &self.options)?)
    }

    fn read_compressed_object(&mut self, number: u32, container: u32, index: u32) -> Result<PdfObject> {
        let container_entry = self
            .xref
            .get(container)
            .ok_or(PdfError::InvalidObjectReference(container, 0))?;
        if !container_entry.is_in_use() {
            return Err(PdfError::InvalidContainer {
                object: number,
                container,
            });
        }

        if !self.object_streams.contains_key(&container) {
            let generation = container_entry.generation;
            let stream = self
                .open_object_stream(container)
                .map_err(|e| e.in_object(container, generation, RepairPhase::Load))?;
            self.object_streams.insert(container, stream);
        }

        let stream = self
            .object_streams
            .get(&container)
            .ok_or(PdfError::InvalidObjectReference(container, 0))?;
        Ok(stream.get_object(index, number, &self.options)?)
    }

    fn open_object_stream(&mut self, container: u32) -> Result<ObjectStream> {
        let dict = self
            .load_object(container)?
            .as_dict()
            .cloned()
            .ok_or_else(|| not_a_stream(container))?;
        let data = self.decoded_stream(container)?;
        Ok(ObjectStream::parse(&dict, data)?)
    }
}

fn not_a_stream(number: u32) -> PdfError {
    PdfError::Parse(ParseError::SyntaxError {
        position: 0,
        message: format!("object {number} is not a stream"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::xref::{StreamSpan, XrefEntry};
    use std::io::Cursor;

    const DOC: &[u8] = b"1 0 obj\n<</Type/Catalog/Pages 2 0 R>>\nendobj\n\
2 0 obj\n<</Length 3 0 R>>\nstream\nhello\nendstream\nendobj\n\
3 0 obj\n6\nendobj\n";

    fn offset_of(needle: &[u8]) -> u64 {
        DOC.windows(needle.len())
            .position(|w| w == needle)
            .unwrap() as u64
    }

    fn reader() -> PdfReader<Cursor<Vec<u8>>> {
        let mut table = XrefTable::with_len(4);
        *table.get_mut(1).unwrap() = XrefEntry::in_use(offset_of(b"1 0 obj"), 0);
        let mut stream_entry = XrefEntry::in_use(offset_of(b"2 0 obj"), 0);
        stream_entry.stream = Some(StreamSpan {
            offset: offset_of(b"hello"),
            corrected_length: None,
        });
        *table.get_mut(2).unwrap() = stream_entry;
        *table.get_mut(3).unwrap() = XrefEntry::in_use(offset_of(b"3 0 obj"), 0);
        table.relink_free_list(true);

        let lexer = Lexer::new(Cursor::new(DOC.to_vec())).unwrap();
        PdfReader::new(lexer, table, ParseOptions::default())
    }

    #[test]
    fn test_load_and_cache() {
        let mut reader = reader();
        let catalog = reader.load_object(1).unwrap();
        assert_eq!(catalog.as_dict().unwrap().get_type(), Some("Catalog"));
        assert!(reader.xref().get(1).unwrap().cached.is_some());
        reader.clear_cache();
        assert!(reader.xref().get(1).unwrap().cached.is_none());
    }

    #[test]
    fn test_free_and_missing_objects() {
        let mut reader = reader();
        assert!(matches!(reader.load_object(0), Err(PdfError::FreeObject(0))));
        assert!(matches!(
            reader.load_object(9),
            Err(PdfError::InvalidObjectReference(9, 0))
        ));
    }

    #[test]
    fn test_get_object_checks_generation() {
        let mut reader = reader();
        assert!(reader.get_object(ObjectId::new(1, 0)).is_ok());
        assert!(matches!(
            reader.get_object(ObjectId::new(1, 2)),
            Err(PdfError::InvalidObjectReference(1, 2))
        ));
    }

    #[test]
    fn test_resolve() {
        let mut reader = reader();
        let length = reader
            .resolve(&PdfObject::Reference(ObjectId::new(3, 0)))
            .unwrap();
        assert_eq!(length, PdfObject::Integer(6));
        let free = reader
            .resolve(&PdfObject::Reference(ObjectId::new(0, 65535)))
            .unwrap();
        assert!(free.is_null());
        assert_eq!(
            reader.resolve(&PdfObject::Integer(1)).unwrap(),
            PdfObject::Integer(1)
        );
    }

    #[test]
    fn test_stream_data_uses_indirect_length() {
        let mut reader = reader();
        assert_eq!(reader.stream_length(2).unwrap(), 6);
        assert_eq!(reader.stream_data(2).unwrap(), b"hello\n");
        assert_eq!(reader.decoded_stream(2).unwrap(), b"hello\n");
    }

    #[test]
    fn test_corrected_length_wins() {
        let mut reader = reader();
        if let Some(span) = reader.xref_mut().get_mut(2).unwrap().stream.as_mut() {
            span.corrected_length = Some(5);
        }
        assert_eq!(reader.stream_data(2).unwrap(), b"hello");
    }

    #[test]
    fn test_stream_data_on_plain_object() {
        let mut reader = reader();
        assert!(reader.stream_data(1).is_err());
    }

    #[test]
    fn test_header_mismatch() {
        let mut reader = reader();
        reader.xref_mut().get_mut(3).unwrap().kind = EntryKind::InUse {
            offset: offset_of(b"2 0 obj"),
        };
        assert!(matches!(reader.load_object(3), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_container_without_stream() {
        let mut reader = reader();
        reader.xref_mut().get_mut(3).unwrap().kind = EntryKind::Compressed {
            container: 1,
            index: 0,
        };
        let err = reader.load_object(3).err().unwrap();
        assert!(matches!(
            err,
            PdfError::Object {
                number: 1,
                phase: RepairPhase::Load,
                ..
            }
        ));
        assert!(!err.is_structural());
    }

    #[test]
    fn test_compressed_object_needs_plain_container() {
        let mut reader = reader();
        reader.xref_mut().get_mut(3).unwrap().kind = EntryKind::Compressed {
            container: 0,
            index: 0,
        };
        assert!(matches!(
            reader.load_object(3),
            Err(PdfError::InvalidContainer {
                object: 3,
                container: 0
            })
        ));
    }
}
