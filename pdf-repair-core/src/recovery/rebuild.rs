//! Linear scan for object definitions and trailers
//!
//! Tracks the two most recent integers so that an `obj` keyword can be
//! matched with its `number generation` prefix, hands every object body to
//! the recognizer and harvests trailer dictionaries found between objects.

use super::recognizer::{recognize_object_body, TrailerFragments};
use super::{RepairOptions, RepairReport};
use crate::error::{PdfError, RepairPhase, Result};
use crate::parser::lexer::{Lexer, Token};
use crate::parser::objects::{parse_dictionary, ObjectId};
use crate::parser::xref::StreamSpan;
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// One object definition found by the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: ObjectId,
    /// Offset of the object number token
    pub offset: u64,
    pub stream: Option<StreamSpan>,
}

/// Everything the scan gathered, ready for [`super::finalize`]
pub struct ScanOutcome<R> {
    pub lexer: Lexer<R>,
    /// Object definitions in file order
    pub candidates: Vec<Candidate>,
    pub fragments: TrailerFragments,
    /// Highest object number among the candidates
    pub max_number: u32,
    pub report: RepairReport,
}

enum Step {
    Continue,
    Stop,
}

/// Drives the lexer over the whole file
pub struct Rebuilder<'a, R> {
    lexer: Lexer<R>,
    options: &'a RepairOptions,
    /// The two most recent integers as `(offset, value)`, oldest first
    pending: [Option<(u64, i64)>; 2],
    candidates: Vec<Candidate>,
    fragments: TrailerFragments,
    max_number: u32,
    report: RepairReport,
}

impl<'a, R: Read + Seek> Rebuilder<'a, R> {
    pub fn new(lexer: Lexer<R>, options: &'a RepairOptions) -> Self {
        Self {
            lexer,
            options,
            pending: [None, None],
            candidates: Vec::with_capacity(1024),
            fragments: TrailerFragments::default(),
            max_number: 0,
            report: RepairReport::default(),
        }
    }

    /// Scan from the version marker to the end of the file.
    ///
    /// A failure after a Root has been captured ends the scan early and keeps
    /// what was gathered; before that it fails the whole repair.
    pub fn run(mut self) -> Result<ScanOutcome<R>> {
        self.skip_version_marker()?;

        loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Stop) => break,
                Err(e) if self.fragments.has_root() => {
                    let message = format!("ignoring the rest of the file: {e}");
                    warn!(offset = self.lexer.position(), "{message}");
                    self.report.note(self.options, message);
                    self.report.truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.report.objects_found = self.candidates.len();
        self.report.max_object_number = self.max_number;
        debug!(
            objects = self.candidates.len(),
            max_number = self.max_number,
            trailers = self.report.trailers_found,
            "scan finished"
        );

        Ok(ScanOutcome {
            lexer: self.lexer,
            candidates: self.candidates,
            fragments: self.fragments,
            max_number: self.max_number,
            report: self.report,
        })
    }

    /// Position the lexer after `%PDF-x.y` and any spaces or `%` that follow
    fn skip_version_marker(&mut self) -> Result<()> {
        let scanner = self.lexer.scanner_mut();
        let mut head = vec![0u8; self.options.header_search_window];
        let read = scanner.read_into(&mut head)?;

        let start = head[..read]
            .windows(4)
            .position(|w| w == b"%PDF")
            .map_or(0, |i| i as u64 + 8);
        scanner.seek(start)?;

        while let Some(b' ' | b'%') = scanner.peek_byte()? {
            scanner.read_byte()?;
        }
        debug!(offset = scanner.tell(), "scan starts");
        Ok(())
    }

    fn step(&mut self) -> Result<Step> {
        let token = self.lexer.next_token()?;
        let start = self.lexer.token_start();

        match token {
            Token::Integer(value) => {
                self.pending = [self.pending[1], Some((start, value))];
            }
            Token::Obj => self.scan_object(start)?,
            Token::DictStart => self.scan_trailer(start)?,
            Token::Error => {
                let message = format!("skipping unreadable byte at {start}");
                warn!(offset = start, "{message}");
                self.report.note(self.options, message);
                self.lexer.scanner_mut().read_byte()?;
            }
            Token::Eof => return Ok(Step::Stop),
            _ => {}
        }

        Ok(Step::Continue)
    }

    /// Take the pending `number generation` pair for an `obj` keyword
    fn take_header(&mut self, obj_offset: u64) -> Option<(ObjectId, u64)> {
        // the pair is consumed here, so a second `obj` never reuses the
        // integers that preceded the first one
        let pending = std::mem::take(&mut self.pending);
        let [Some((offset, number)), Some((_, generation))] = pending else {
            let message = format!("'obj' at {obj_offset} has no object number, skipping");
            warn!(offset = obj_offset, "{message}");
            self.report.note(self.options, message);
            return None;
        };

        let number = u32::try_from(number)
            .ok()
            .filter(|n| *n <= self.options.max_object_number);
        let generation = u16::try_from(generation).ok();
        match (number, generation) {
            (Some(number), Some(generation)) => Some((ObjectId::new(number, generation), offset)),
            _ => {
                let message = format!("object header at {offset} is out of range, skipping");
                warn!(offset, "{message}");
                self.report.note(self.options, message);
                None
            }
        }
    }

    fn scan_object(&mut self, obj_offset: u64) -> Result<()> {
        let header = self.take_header(obj_offset);

        let body = recognize_object_body(
            &mut self.lexer,
            self.options,
            &mut self.fragments,
            &mut self.report,
        )
        .map_err(|e| match header {
            Some((id, _)) => PdfError::from(e).in_object(id.number, id.generation, RepairPhase::Scan),
            None => PdfError::from(e),
        })?;

        if body.is_xref_stream {
            self.report.trailers_found += 1;
        }

        if let Some((id, offset)) = header {
            self.candidates.push(Candidate {
                id,
                offset,
                stream: body.stream,
            });
            self.max_number = self.max_number.max(id.number);
        }
        Ok(())
    }

    fn scan_trailer(&mut self, offset: u64) -> Result<()> {
        let dict = parse_dictionary(&mut self.lexer, &self.options.parse)?;
        debug!(offset, keys = dict.len(), "trailer dictionary");
        self.fragments.capture_trailer(&dict);
        self.report.trailers_found += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PdfObject;
    use std::io::Cursor;

    fn scan(input: &[u8]) -> Result<ScanOutcome<Cursor<Vec<u8>>>> {
        scan_with(input, &RepairOptions::default())
    }

    fn scan_with(input: &[u8], options: &RepairOptions) -> Result<ScanOutcome<Cursor<Vec<u8>>>> {
        let lexer = Lexer::new(Cursor::new(input.to_vec()))?;
        Rebuilder::new(lexer, options).run()
    }

    fn offset_of(haystack: &[u8], needle: &[u8]) -> u64 {
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap() as u64
    }

    #[test]
    fn test_candidates_in_file_order() {
        let input = b"%PDF-1.4\n1 0 obj<</Type/Catalog>>endobj\n2 0 obj [1 2] endobj\n3 1 obj 7 endobj";
        let outcome = scan(input).unwrap();
        let ids: Vec<ObjectId> = outcome.candidates.iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec![ObjectId::new(1, 0), ObjectId::new(2, 0), ObjectId::new(3, 1)]
        );
        assert_eq!(outcome.candidates[0].offset, offset_of(input, b"1 0 obj"));
        assert_eq!(outcome.candidates[2].offset, offset_of(input, b"3 1 obj"));
        assert_eq!(outcome.max_number, 3);
        assert_eq!(outcome.report.objects_found, 3);
    }

    #[test]
    fn test_header_comment_is_skipped() {
        // the version comment is not terminated by a newline
        let input = b"%PDF-1.7 %\xE2\xE3 1 0 obj null endobj";
        let outcome = scan(input).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].offset, offset_of(input, b"1 0 obj"));
    }

    #[test]
    fn test_marker_after_leading_garbage() {
        let input = b"garbage 5 6 %PDF-1.5\n4 0 obj null endobj";
        let outcome = scan(input).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].id, ObjectId::new(4, 0));
    }

    #[test]
    fn test_trailer_fragments() {
        let input = b"1 0 obj<<>>endobj\ntrailer\n<</Size 3/Root 1 0 R/Info 2 0 R/ID[<aa><bb>]>>\n\
trailer<</Root 5 0 R>>";
        let outcome = scan(input).unwrap();
        assert_eq!(outcome.report.trailers_found, 2);
        assert_eq!(
            outcome.fragments.root,
            Some(PdfObject::Reference(ObjectId::new(5, 0)))
        );
        assert_eq!(
            outcome.fragments.info,
            Some(PdfObject::Reference(ObjectId::new(2, 0)))
        );
        assert!(outcome.fragments.id.is_some());
    }

    #[test]
    fn test_unreadable_bytes_are_skipped() {
        let input = b") } 1 0 obj null endobj > 2 0 obj null endobj";
        let outcome = scan(input).unwrap();
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.report.warnings.len(), 3);
    }

    #[test]
    fn test_obj_without_numbers_is_skipped() {
        let input = b"obj null endobj 7 obj null endobj 2 0 obj null endobj";
        let outcome = scan(input).unwrap();
        let ids: Vec<ObjectId> = outcome.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ObjectId::new(2, 0)]);
        assert_eq!(outcome.report.warnings.len(), 2);
    }

    #[test]
    fn test_out_of_range_numbers_are_skipped() {
        let options = RepairOptions::default().with_max_object_number(10);
        let input = b"11 0 obj null endobj 1 70000 obj null endobj -1 0 obj null endobj 3 0 obj null endobj";
        let outcome = scan_with(input, &options).unwrap();
        let ids: Vec<ObjectId> = outcome.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ObjectId::new(3, 0)]);
        assert_eq!(outcome.max_number, 3);
    }

    #[test]
    fn test_stream_body_is_not_scanned() {
        let input = b"1 0 obj<</Length 12>>stream\n9 0 obj oops\nendstream endobj 2 0 obj null endobj";
        let outcome = scan(input).unwrap();
        let ids: Vec<u32> = outcome.candidates.iter().map(|c| c.id.number).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(outcome.candidates[0].stream.is_some());
    }

    #[test]
    fn test_truncation_after_root_keeps_results() {
        let input = b"1 0 obj<</Type/Catalog>>endobj trailer<</Root 1 0 R>> 2 0 obj<</Kids[";
        let outcome = scan(input).unwrap();
        assert!(outcome.report.truncated);
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.report.warnings.iter().any(|w| w.contains("rest of the file")));
    }

    #[test]
    fn test_truncation_before_root_fails() {
        let input = b"1 0 obj<</Type/Catalog>>endobj 2 0 obj<</Kids[";
        let err = scan(input).err().unwrap();
        assert!(matches!(
            err,
            PdfError::Object {
                number: 2,
                phase: RepairPhase::Scan,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_trailer_without_root_fails() {
        let input = b"1 0 obj null endobj trailer<</Root 1 0 R 5>>";
        assert!(matches!(scan(input), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_bad_trailer_after_root_truncates() {
        let input = b"trailer<</Root 1 0 R>> 1 0 obj null endobj trailer<</Info 1 0 R 5>> 2 0 obj null endobj";
        let outcome = scan(input).unwrap();
        assert!(outcome.report.truncated);
        assert_eq!(outcome.candidates.len(), 1);
    }
}
