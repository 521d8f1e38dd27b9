//! Cross-reference table repair
//!
//! Rebuilds the reference table of a PDF whose xref data is missing or
//! wrong. The work happens in four stages:
//!
//! 1. [`rebuild::Rebuilder`] scans the file from the version marker to the
//!    end, recording every `n g obj` it meets and every trailer dictionary.
//! 2. [`recognizer::recognize_object_body`] is called for each object to skip
//!    over its body and measure its stream payload, if any.
//! 3. [`finalize::finalize`] turns the scan into a table: later definitions
//!    win, measured stream lengths are written back, free entries are linked
//!    and a trailer is synthesized.
//! 4. [`object_streams::expand_object_streams`] publishes the objects stored
//!    inside object streams as compressed entries.
//!
//! # Example
//!
//! ```rust,no_run
//! use pdf_repair::recovery::{repair_bytes, RepairOptions};
//!
//! # fn main() -> pdf_repair::Result<()> {
//! let data = b"1 0 obj<</Type/Catalog>>endobj trailer<</Root 1 0 R/Size 2>>".to_vec();
//! let repaired = repair_bytes(data, &RepairOptions::default())?;
//!
//! assert_eq!(repaired.reader.xref().size(), Some(2));
//! println!("{} warnings", repaired.report.warnings.len());
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::parser::{Lexer, ParseOptions, PdfReader};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{info, instrument};

pub mod finalize;
pub mod object_streams;
pub mod rebuild;
pub mod recognizer;

pub use finalize::finalize;
pub use object_streams::expand_object_streams;
pub use rebuild::{Candidate, Rebuilder, ScanOutcome};
pub use recognizer::{recognize_object_body, ObjectBody, TrailerFragments};

/// Options for xref repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOptions {
    /// Bytes at the start of the file searched for `%PDF`
    pub header_search_window: usize,
    /// Largest object number accepted; larger ones are skipped
    pub max_object_number: u32,
    /// Publish objects stored in object streams
    pub expand_object_streams: bool,
    /// Write measured stream lengths back into /Length
    pub correct_stream_lengths: bool,
    /// Keep warnings in the report as well as logging them
    pub collect_warnings: bool,
    /// Options for the value parser
    pub parse: ParseOptions,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            header_search_window: 1024,
            max_object_number: 8_388_607,
            expand_object_streams: true,
            correct_stream_lengths: true,
            collect_warnings: true,
            parse: ParseOptions::default(),
        }
    }
}

impl RepairOptions {
    /// Full repair, same as the defaults
    pub fn lenient() -> Self {
        Self::default()
    }

    /// Offsets only: no stream length rewriting and no object stream expansion
    pub fn minimal() -> Self {
        Self {
            expand_object_streams: false,
            correct_stream_lengths: false,
            ..Self::default()
        }
    }

    /// Set the header search window
    pub fn with_header_search_window(mut self, bytes: usize) -> Self {
        self.header_search_window = bytes;
        self
    }

    /// Set the largest accepted object number
    pub fn with_max_object_number(mut self, number: u32) -> Self {
        self.max_object_number = number;
        self
    }

    /// Enable or disable object stream expansion
    pub fn with_expand_object_streams(mut self, expand: bool) -> Self {
        self.expand_object_streams = expand;
        self
    }

    /// Enable or disable stream length correction
    pub fn with_correct_stream_lengths(mut self, correct: bool) -> Self {
        self.correct_stream_lengths = correct;
        self
    }

    /// Enable or disable warning collection
    pub fn with_collect_warnings(mut self, collect: bool) -> Self {
        self.collect_warnings = collect;
        self
    }

    /// Set the value parser options
    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }
}

/// What the repair found and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RepairReport {
    /// Object definitions found by the scan, duplicates included
    pub objects_found: usize,
    /// Trailer and xref stream dictionaries found
    pub trailers_found: usize,
    /// Highest object number defined directly in the file
    pub max_object_number: u32,
    /// Streams whose /Length was rewritten
    pub streams_corrected: usize,
    /// Object streams expanded
    pub containers_expanded: usize,
    /// Table entries pointing into object streams
    pub objects_in_containers: usize,
    /// The scan stopped early and kept what it had
    pub truncated: bool,
    /// Tolerated problems, in the order they were met
    pub warnings: Vec<String>,
}

impl RepairReport {
    pub(crate) fn note(&mut self, options: &RepairOptions, message: String) {
        if options.collect_warnings {
            self.warnings.push(message);
        }
    }
}

/// A repaired document
pub struct Repaired<R> {
    /// Reader over the rebuilt table
    pub reader: PdfReader<R>,
    pub report: RepairReport,
}

/// Rebuild the reference table of `source`
#[instrument(level = "debug", skip_all)]
pub fn repair_xref<R: Read + Seek>(source: R, options: &RepairOptions) -> Result<Repaired<R>> {
    let lexer = Lexer::new(source)?;
    let scan = Rebuilder::new(lexer, options).run()?;
    let (mut reader, mut report) = finalize(scan, options)?;

    if options.expand_object_streams {
        expand_object_streams(&mut reader, options, &mut report)?;
    }

    info!(
        objects = report.objects_found,
        size = reader.xref().len(),
        streams_corrected = report.streams_corrected,
        containers = report.containers_expanded,
        truncated = report.truncated,
        warnings = report.warnings.len(),
        "xref repaired"
    );

    Ok(Repaired { reader, report })
}

/// Open a file and rebuild its reference table
pub fn repair_file<P: AsRef<Path>>(path: P, options: &RepairOptions) -> Result<Repaired<File>> {
    let file = File::open(path)?;
    repair_xref(file, options)
}

/// Rebuild the reference table of an in-memory document
pub fn repair_bytes(
    data: impl Into<Vec<u8>>,
    options: &RepairOptions,
) -> Result<Repaired<Cursor<Vec<u8>>>> {
    repair_xref(Cursor::new(data.into()), options)
}
