//! PDF Cross-Reference Table
//!
//! A dense, identifier-indexed table of entries plus the trailer dictionary.
//! Free entries are threaded into a singly linked list through
//! [`EntryKind::Free`], starting at entry 0.

use super::objects::{PdfDictionary, PdfObject};

/// Generation number carried by the head of the free list
pub const FREE_HEAD_GENERATION: u16 = 65535;

/// Where an object lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EntryKind {
    /// Unused identifier; `next` is the following free identifier (0 ends the list)
    Free { next: u32 },
    /// Object stored directly in the file at `offset`
    InUse { offset: u64 },
    /// Object stored inside the object stream `container` at position `index`
    Compressed { container: u32, index: u32 },
}

/// Location of a stream payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StreamSpan {
    /// Offset of the first payload byte
    pub offset: u64,
    /// Length measured during repair when the declared one could not be trusted
    pub corrected_length: Option<u64>,
}

/// Cross-reference entry
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct XrefEntry {
    pub kind: EntryKind,
    pub generation: u16,
    /// Stream payload, for objects that carry one
    pub stream: Option<StreamSpan>,
    /// Lazily parsed value
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cached: Option<PdfObject>,
}

impl XrefEntry {
    /// A free entry that has not been linked yet
    pub fn free() -> Self {
        Self {
            kind: EntryKind::Free { next: 0 },
            generation: 0,
            stream: None,
            cached: None,
        }
    }

    /// An object stored directly in the file
    pub fn in_use(offset: u64, generation: u16) -> Self {
        Self {
            kind: EntryKind::InUse { offset },
            generation,
            stream: None,
            cached: None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.kind, EntryKind::Free { .. })
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self.kind, EntryKind::InUse { .. })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.kind, EntryKind::Compressed { .. })
    }
}

impl Default for XrefEntry {
    fn default() -> Self {
        Self::free()
    }
}

/// Cross-reference table
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: Vec<XrefEntry>,
    trailer: PdfDictionary,
}

impl XrefTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table of `len` unlinked free entries
    pub fn with_len(len: usize) -> Self {
        Self {
            entries: vec![XrefEntry::free(); len],
            trailer: PdfDictionary::new(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the entry for an object number
    pub fn get(&self, number: u32) -> Option<&XrefEntry> {
        self.entries.get(number as usize)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut XrefEntry> {
        self.entries.get_mut(number as usize)
    }

    /// Iterate over `(object number, entry)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XrefEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i as u32, entry))
    }

    /// Grow with unlinked free entries, or truncate
    pub fn resize(&mut self, len: usize) {
        self.entries.resize_with(len, XrefEntry::free);
    }

    /// Get the trailer dictionary
    pub fn trailer(&self) -> &PdfDictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut PdfDictionary {
        &mut self.trailer
    }

    pub fn set_trailer(&mut self, trailer: PdfDictionary) {
        self.trailer = trailer;
    }

    /// The trailer's /Size
    pub fn size(&self) -> Option<i64> {
        self.trailer.get("Size").and_then(|obj| obj.as_integer())
    }

    pub fn root(&self) -> Option<&PdfObject> {
        self.trailer.get("Root")
    }

    pub fn info(&self) -> Option<&PdfObject> {
        self.trailer.get("Info")
    }

    pub fn encrypt(&self) -> Option<&PdfObject> {
        self.trailer.get("Encrypt")
    }

    pub fn id(&self) -> Option<&PdfObject> {
        self.trailer.get("ID")
    }

    /// Rebuild the free list from the current set of free entries.
    ///
    /// Entry 0 becomes the head with generation 65535. Free entries are chained
    /// in ascending order so that walking from 0 visits each exactly once and
    /// ends back at 0. With `bump_generations`, every free entry other than the
    /// head gets its generation raised by one, capped at 65535.
    pub fn relink_free_list(&mut self, bump_generations: bool) {
        if self.entries.is_empty() {
            self.entries.push(XrefEntry::free());
        }

        let mut next = 0u32;
        for number in (1..self.entries.len()).rev() {
            let entry = &mut self.entries[number];
            if entry.is_free() {
                entry.kind = EntryKind::Free { next };
                if bump_generations && entry.generation < FREE_HEAD_GENERATION {
                    entry.generation += 1;
                }
                next = number as u32;
            }
        }

        let head = &mut self.entries[0];
        head.kind = EntryKind::Free { next };
        head.generation = FREE_HEAD_GENERATION;
        head.stream = None;
        head.cached = None;
    }

    /// Walk the free list from entry 0, stopping at the first repeated or
    /// out-of-range identifier
    pub fn free_list(&self) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut seen = vec![false; self.entries.len()];
        let mut current = 0u32;

        while let Some(entry) = self.entries.get(current as usize) {
            if seen[current as usize] {
                break;
            }
            seen[current as usize] = true;
            chain.push(current);
            match entry.kind {
                EntryKind::Free { next } if next != 0 => current = next,
                _ => break,
            }
        }

        chain
    }

    /// Drop every cached value
    pub fn clear_cache(&mut self) {
        for entry in &mut self.entries {
            entry.cached = None;
        }
    }
}
