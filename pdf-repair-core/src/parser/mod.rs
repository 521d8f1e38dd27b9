//! PDF Parser Module
//!
//! The low-level pieces the repair engine is built on: a buffered byte
//! scanner, a tolerant lexer, the object model, stream filters, the
//! reference table and a reader that resolves objects through that table.

pub mod filters;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod scanner;
pub mod xref;

pub use self::lexer::{Lexer, Token};
pub use self::object_stream::ObjectStream;
pub use self::objects::{ObjectId, PdfDictionary, PdfName, PdfObject};
pub use self::reader::PdfReader;
pub use self::scanner::ByteScanner;
pub use self::xref::{EntryKind, StreamSpan, XrefEntry, XrefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: u64, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Unexpected end of file at position {position}")]
    UnexpectedEof { position: u64 },

    #[error("Nesting deeper than {limit} levels at position {position}")]
    NestingTooDeep { position: u64, limit: usize },

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Invalid object reference: {0} {1} R")]
    InvalidReference(u32, u16),
}

impl ParseError {
    /// Whether the failure was caused by running out of input.
    pub fn is_eof(&self) -> bool {
        match self {
            ParseError::UnexpectedEof { .. } => true,
            ParseError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

/// Options for the value parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum nesting of arrays and dictionaries before parsing gives up
    pub max_nesting_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 256,
        }
    }
}

impl ParseOptions {
    /// Set the maximum nesting depth
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}
