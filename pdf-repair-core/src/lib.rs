//! # pdf-repair
//!
//! Cross-reference table reconstruction for damaged PDF files.
//!
//! When a document's xref table is missing, truncated or points at the wrong
//! bytes, this crate rebuilds one by scanning the file from the top for
//! `n g obj` headers and `trailer` dictionaries.
//!
//! ## Features
//!
//! - **Linear scan**: finds every object definition, later definitions win
//! - **Stream length correction**: measures streams whose /Length is wrong
//! - **Free list**: threads unused identifiers into a valid free list
//! - **Trailer synthesis**: Root, Info, Encrypt and ID from whatever trailers
//!   and xref stream dictionaries were found
//! - **Object streams**: republishes objects stored inside `/Type/ObjStm`
//!   containers as compressed entries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_repair::recovery::{repair_file, RepairOptions};
//!
//! # fn main() -> pdf_repair::Result<()> {
//! let mut repaired = repair_file("damaged.pdf", &RepairOptions::default())?;
//!
//! println!("Recovered {} objects", repaired.report.objects_found);
//! for warning in &repaired.report.warnings {
//!     println!("warning: {warning}");
//! }
//!
//! let root = repaired.reader.trailer().get("Root").cloned();
//! if let Some(root) = root {
//!     let catalog = repaired.reader.resolve(&root)?;
//!     println!("Catalog: {catalog:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod parser;
pub mod recovery;

pub use error::{PdfError, RepairPhase, Result};
pub use parser::{ObjectId, PdfDictionary, PdfObject, PdfReader, XrefTable};
pub use recovery::{repair_bytes, repair_file, repair_xref, RepairOptions, RepairReport, Repaired};

/// Current version of pdf-repair
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
