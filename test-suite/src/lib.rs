//! Test Suite for pdf-repair
//!
//! Document generators with known object locations, deliberate damage and
//! checks that a repaired table is consistent with what was generated.

pub mod generators;
pub mod validators;

pub use generators::{BuiltPdf, Damage, ObjectLocation, TestPdfBuilder};
pub use validators::{check_free_list, check_locations, TableIssue};

/// Common test utilities
pub mod utils {
    use std::io::Write;

    /// Write a document to a temporary file
    pub fn write_temp_pdf(data: &[u8]) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }
}
