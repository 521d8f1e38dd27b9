use crate::parser::ParseError;
use std::fmt;
use thiserror::Error;

/// Stage of the repair in which an object-level failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    /// Linear scan of the file for object headers and trailers
    Scan,
    /// Rewriting /Length of a stream whose length was measured
    StreamLength,
    /// Expanding object streams into table entries
    ObjectStream,
    /// Loading an object through the finished table
    Load,
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairPhase::Scan => "scan",
            RepairPhase::StreamLength => "stream length correction",
            RepairPhase::ObjectStream => "object stream expansion",
            RepairPhase::Load => "object load",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Object {number} {generation} failed during {phase}: {source}")]
    Object {
        number: u32,
        generation: u16,
        phase: RepairPhase,
        #[source]
        source: Box<PdfError>,
    },

    #[error("Corrupt object stream {number} {generation} R: {reason}")]
    CorruptObjectStream {
        number: u32,
        generation: u16,
        reason: String,
    },

    #[error("Object {object} is stored in object {container}, which is not a plain object")]
    InvalidContainer { object: u32, container: u32 },

    #[error("Object {0} is free")]
    FreeObject(u32),

    #[error("Invalid object reference: {0} {1} R")]
    InvalidObjectReference(u32, u16),
}

impl PdfError {
    /// Attach object and phase context to an error
    pub fn in_object(self, number: u32, generation: u16, phase: RepairPhase) -> Self {
        PdfError::Object {
            number,
            generation,
            phase,
            source: Box::new(self),
        }
    }

    /// Whether the table itself is inconsistent, as opposed to an I/O or
    /// syntax failure
    pub fn is_structural(&self) -> bool {
        match self {
            PdfError::InvalidContainer { .. } => true,
            PdfError::Object { source, .. } => source.is_structural(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::InvalidContainer {
            object: 5,
            container: 9,
        };
        assert_eq!(
            error.to_string(),
            "Object 5 is stored in object 9, which is not a plain object"
        );
        assert_eq!(PdfError::FreeObject(3).to_string(), "Object 3 is free");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error: PdfError = io_error.into();
        assert!(matches!(pdf_error, PdfError::Io(_)));
        assert!(!pdf_error.is_structural());
    }

    #[test]
    fn test_parse_error_conversion() {
        let pdf_error: PdfError = ParseError::UnexpectedEof { position: 7 }.into();
        assert_eq!(
            pdf_error.to_string(),
            "Parse error: Unexpected end of file at position 7"
        );
    }

    #[test]
    fn test_object_context() {
        let inner = PdfError::Parse(ParseError::InvalidReference(4, 0));
        let error = inner.in_object(4, 0, RepairPhase::StreamLength);
        assert_eq!(
            error.to_string(),
            "Object 4 0 failed during stream length correction: Parse error: Invalid object reference: 4 0 R"
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_structural_through_context() {
        let error = PdfError::InvalidContainer {
            object: 1,
            container: 2,
        }
        .in_object(1, 0, RepairPhase::ObjectStream);
        assert!(error.is_structural());
        assert!(!PdfError::FreeObject(1).is_structural());
    }
}
