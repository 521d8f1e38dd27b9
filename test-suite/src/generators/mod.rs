//! PDF Test Generators
//!
//! This module provides utilities for generating test PDFs programmatically,
//! intact or deliberately damaged.

pub mod damaged;
pub mod test_pdf_builder;

pub use damaged::Damage;
pub use test_pdf_builder::{BuiltPdf, ObjectLocation, PdfVersion, TestPdfBuilder};
