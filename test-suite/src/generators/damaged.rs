//! Damaged PDF Generators
//!
//! Deliberate corruptions applied to generated documents. Each kind of
//! damage knows how it moves the bytes that survive it, so tests can still
//! predict where every object ends up.

use super::test_pdf_builder::{BuiltPdf, ObjectLocation};
use std::collections::BTreeMap;

/// Bytes that the tokenizer rejects one at a time
pub const GARBAGE: &[u8] = b")}>)}";

/// A corruption applied to a whole file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Damage {
    /// Remove everything from `xref` up to `trailer`, and `startxref`
    StripXref,
    /// Overwrite every offset in the xref table with nines
    ScrambleXref,
    /// Keep only the first `len` bytes
    Truncate(usize),
    /// Insert bytes at a position
    InsertGarbage { at: usize, bytes: Vec<u8> },
    /// Put junk in front of the version marker
    LeadingJunk(Vec<u8>),
    /// Delete every `endobj` keyword
    DropEndobj,
}

impl Damage {
    /// Garbage inserted right before the definition of `number`
    pub fn garbage_before(built: &BuiltPdf, number: u32) -> Option<Self> {
        let at = built.offset_of(number)? as usize;
        Some(Damage::InsertGarbage {
            at,
            bytes: GARBAGE.to_vec(),
        })
    }

    /// Apply the damage to `data`
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Damage::StripXref => {
                let mut out = data.to_vec();
                if let (Some(start), Some(end)) =
                    (find(&out, b"xref\n"), find(&out, b"trailer"))
                {
                    if start < end {
                        out.drain(start..end);
                    }
                }
                if let Some(start) = find(&out, b"startxref") {
                    let end = find(&out[start..], b"%%EOF").map_or(out.len(), |i| start + i);
                    out.drain(start..end);
                }
                out
            }
            Damage::ScrambleXref => {
                let mut out = data.to_vec();
                let Some(start) = find(&out, b"xref\n") else {
                    return out;
                };
                let end = find(&out[start..], b"trailer").map_or(out.len(), |i| start + i);
                // entries are `oooooooooo ggggg n \n`, 20 bytes each
                let mut line = start;
                while line < end {
                    let line_end = out[line..end]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(end, |i| line + i);
                    if line_end - line == 19 && out[line_end - 2] == b'n' {
                        out[line..line + 10].fill(b'9');
                    }
                    line = line_end + 1;
                }
                out
            }
            Damage::Truncate(len) => data[..(*len).min(data.len())].to_vec(),
            Damage::InsertGarbage { at, bytes } => {
                let at = (*at).min(data.len());
                let mut out = Vec::with_capacity(data.len() + bytes.len());
                out.extend_from_slice(&data[..at]);
                out.extend_from_slice(bytes);
                out.extend_from_slice(&data[at..]);
                out
            }
            Damage::LeadingJunk(junk) => {
                let mut out = junk.clone();
                out.extend_from_slice(data);
                out
            }
            Damage::DropEndobj => {
                let mut out = Vec::with_capacity(data.len());
                let mut i = 0;
                while i < data.len() {
                    if data[i..].starts_with(b"endobj") {
                        i += 6;
                    } else {
                        out.push(data[i]);
                        i += 1;
                    }
                }
                out
            }
        }
    }

    /// Where a byte at `offset` in the original ends up, if it survives
    pub fn relocate(&self, data: &[u8], offset: u64) -> Option<u64> {
        match self {
            Damage::StripXref | Damage::ScrambleXref => Some(offset),
            Damage::Truncate(len) => (offset < *len as u64).then_some(offset),
            Damage::InsertGarbage { at, bytes } => {
                if offset >= *at as u64 {
                    Some(offset + bytes.len() as u64)
                } else {
                    Some(offset)
                }
            }
            Damage::LeadingJunk(junk) => Some(offset + junk.len() as u64),
            Damage::DropEndobj => {
                let end = (offset as usize).min(data.len());
                let removed = count(&data[..end], b"endobj") * 6;
                Some(offset - removed as u64)
            }
        }
    }

    /// Apply to a built document, moving its recorded locations along
    pub fn apply_to(&self, built: &BuiltPdf) -> BuiltPdf {
        let locations: BTreeMap<u32, ObjectLocation> = built
            .locations
            .iter()
            .filter_map(|(&number, &location)| match location {
                ObjectLocation::Direct { offset, generation } => {
                    let offset = self.relocate(&built.data, offset)?;
                    Some((number, ObjectLocation::Direct { offset, generation }))
                }
                packed => Some((number, packed)),
            })
            .collect();

        BuiltPdf {
            data: self.apply(&built.data),
            locations,
            root: built.root,
            info: built.info,
            streams: built.streams.clone(),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}
