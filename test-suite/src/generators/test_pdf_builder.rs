//! Test PDF Builder
//!
//! A builder for creating test PDFs whose object locations are known, so
//! that a repaired table can be checked against them.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::Write;

/// PDF version to generate
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum PdfVersion {
    V1_4,
    V1_5,
    V1_7,
    V2_0,
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = match self {
            PdfVersion::V1_4 => "1.4",
            PdfVersion::V1_5 => "1.5",
            PdfVersion::V1_7 => "1.7",
            PdfVersion::V2_0 => "2.0",
        };
        write!(f, "{version}")
    }
}

/// Where the builder put an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLocation {
    /// Written directly, `n g obj` starting at `offset`
    Direct { offset: u64, generation: u16 },
    /// Stored inside object stream `container` at position `index`
    Packed { container: u32, index: u32 },
}

/// A generated document and the location of every object in it
#[derive(Debug, Clone)]
pub struct BuiltPdf {
    pub data: Vec<u8>,
    pub locations: BTreeMap<u32, ObjectLocation>,
    pub root: u32,
    pub info: Option<u32>,
    /// Content stream payloads by object number
    pub streams: BTreeMap<u32, Vec<u8>>,
}

impl BuiltPdf {
    /// Highest object number in the document
    pub fn max_object_number(&self) -> u32 {
        self.locations.keys().next_back().copied().unwrap_or(0)
    }

    /// Offset of a directly written object
    pub fn offset_of(&self, number: u32) -> Option<u64> {
        match self.locations.get(&number)? {
            ObjectLocation::Direct { offset, .. } => Some(*offset),
            ObjectLocation::Packed { .. } => None,
        }
    }

    /// Append an incremental update that redefines `number` with `body`
    pub fn append_update(&mut self, number: u32, generation: u16, body: &str) -> &mut Self {
        if !self.data.ends_with(b"\n") {
            self.data.push(b'\n');
        }
        let offset = self.data.len() as u64;
        self.data
            .extend_from_slice(format!("{number} {generation} obj\n{body}\nendobj\n").as_bytes());
        self.data.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n0\n%%EOF\n",
                self.max_object_number().max(number) + 1,
                self.root
            )
            .as_bytes(),
        );
        self.locations
            .insert(number, ObjectLocation::Direct { offset, generation });
        self
    }
}

/// Builder for creating test PDFs
pub struct TestPdfBuilder {
    version: PdfVersion,
    pages: Vec<String>,
    info: Vec<(String, String)>,
    objects: Vec<ExtraObject>,
    include_binary_marker: bool,
    compress_streams: bool,
    use_object_streams: bool,
    write_xref: bool,
    length_error: i64,
}

#[derive(Clone)]
struct ExtraObject {
    number: u32,
    generation: u16,
    content: String,
}

impl TestPdfBuilder {
    /// Create a new PDF builder with default settings
    pub fn new() -> Self {
        Self {
            version: PdfVersion::V1_4,
            pages: Vec::new(),
            info: Vec::new(),
            objects: Vec::new(),
            include_binary_marker: true,
            compress_streams: false,
            use_object_streams: false,
            write_xref: true,
            length_error: 0,
        }
    }

    /// Create a minimal valid PDF with one empty page
    pub fn minimal() -> Self {
        let mut builder = Self::new();
        builder.add_text_page("");
        builder
    }

    /// Set PDF version
    pub fn with_version(mut self, version: PdfVersion) -> Self {
        self.version = version;
        self
    }

    /// Add document info
    pub fn with_info(mut self, key: &str, value: &str) -> Self {
        self.info.push((key.to_string(), value.to_string()));
        self
    }

    /// Add title
    pub fn with_title(self, title: &str) -> Self {
        self.with_info("Title", title)
    }

    /// Add producer
    pub fn with_producer(self, producer: &str) -> Self {
        self.with_info("Producer", producer)
    }

    /// Add a page showing `text`; an empty string gives a page without contents
    pub fn add_text_page(&mut self, text: &str) -> &mut Self {
        let content = if text.is_empty() {
            String::new()
        } else {
            format!(
                "BT\n/F1 12 Tf\n100 700 Td\n({}) Tj\nET",
                escape_pdf_string(text)
            )
        };
        self.pages.push(content);
        self
    }

    /// Add an arbitrary object after the generated ones
    pub fn add_object(&mut self, number: u32, generation: u16, content: &str) -> &mut Self {
        self.objects.push(ExtraObject {
            number,
            generation,
            content: content.to_string(),
        });
        self
    }

    /// Deflate content streams and object streams
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_streams = compress;
        self
    }

    /// Store page dictionaries and the info dictionary in an object stream
    pub fn with_object_streams(mut self, enabled: bool) -> Self {
        self.use_object_streams = enabled;
        if enabled && self.version < PdfVersion::V1_5 {
            self.version = PdfVersion::V1_5;
        }
        self
    }

    /// Leave out the xref table and startxref
    pub fn without_xref(mut self) -> Self {
        self.write_xref = false;
        self
    }

    /// Declare every content stream `error` bytes longer than it is
    pub fn with_length_error(mut self, error: i64) -> Self {
        self.length_error = error;
        self
    }

    /// Build the PDF
    pub fn build(&self) -> BuiltPdf {
        let mut pdf = Vec::new();
        let mut locations = BTreeMap::new();
        let mut streams = BTreeMap::new();

        pdf.extend_from_slice(format!("%PDF-{}\n", self.version).as_bytes());
        if self.include_binary_marker {
            pdf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        }

        let catalog_obj = 1u32;
        let pages_obj = 2u32;
        let first_page = 3u32;
        let first_content = first_page + self.pages.len() as u32;
        let content_count = self.pages.iter().filter(|c| !c.is_empty()).count() as u32;
        let info_obj = (!self.info.is_empty()).then_some(first_content + content_count);
        let mut next_obj = first_content + content_count + u32::from(info_obj.is_some());

        write_direct(
            &mut pdf,
            &mut locations,
            catalog_obj,
            0,
            &format!("<< /Type /Catalog /Pages {pages_obj} 0 R >>"),
        );

        let page_refs: Vec<String> = (0..self.pages.len())
            .map(|i| format!("{} 0 R", first_page + i as u32))
            .collect();
        write_direct(
            &mut pdf,
            &mut locations,
            pages_obj,
            0,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                page_refs.join(" "),
                self.pages.len()
            ),
        );

        // Page and info dictionaries, possibly packed later
        let mut packable: Vec<(u32, String)> = Vec::new();
        let mut content_obj = first_content;
        for (i, content) in self.pages.iter().enumerate() {
            let mut page_dict = format!(
                "<< /Type /Page /Parent {pages_obj} 0 R /MediaBox [0 0 612 792]"
            );
            if !content.is_empty() {
                page_dict.push_str(
                    " /Resources << /Font << /F1 << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> >> >>",
                );
                page_dict.push_str(&format!(" /Contents {content_obj} 0 R"));
                content_obj += 1;
            }
            page_dict.push_str(" >>");
            packable.push((first_page + i as u32, page_dict));
        }
        if let Some(info_obj) = info_obj {
            let mut info_dict = "<< ".to_string();
            for (key, value) in &self.info {
                info_dict.push_str(&format!("/{} ({}) ", key, escape_pdf_string(value)));
            }
            info_dict.push_str(">>");
            packable.push((info_obj, info_dict));
        }

        if self.use_object_streams {
            let container = next_obj;
            next_obj += 1;
            let (payload, first) = object_stream_payload(&packable);
            let (payload, filter) = self.encode(payload);
            write_stream(
                &mut pdf,
                &mut locations,
                container,
                &format!(
                    "/Type /ObjStm /N {} /First {first}{filter}",
                    packable.len()
                ),
                &payload,
                payload.len() as i64,
            );
            for (index, (number, _)) in packable.iter().enumerate() {
                locations.insert(
                    *number,
                    ObjectLocation::Packed {
                        container,
                        index: index as u32,
                    },
                );
            }
        } else {
            for (number, body) in &packable {
                write_direct(&mut pdf, &mut locations, *number, 0, body);
            }
        }

        let mut content_obj = first_content;
        for content in self.pages.iter().filter(|c| !c.is_empty()) {
            let (payload, filter) = self.encode(content.as_bytes().to_vec());
            write_stream(
                &mut pdf,
                &mut locations,
                content_obj,
                filter.trim_start(),
                &payload,
                payload.len() as i64 + self.length_error,
            );
            streams.insert(content_obj, payload);
            content_obj += 1;
        }

        for obj in &self.objects {
            write_direct(&mut pdf, &mut locations, obj.number, obj.generation, &obj.content);
            next_obj = next_obj.max(obj.number + 1);
        }

        let xref_offset = pdf.len();
        if self.write_xref {
            write_traditional_xref(&mut pdf, &locations, next_obj);
        }

        let mut trailer_dict = format!("<< /Size {next_obj} /Root {catalog_obj} 0 R");
        if let Some(info_obj) = info_obj {
            trailer_dict.push_str(&format!(" /Info {info_obj} 0 R"));
        }
        trailer_dict.push_str(" >>");
        pdf.extend_from_slice(format!("trailer\n{trailer_dict}\n").as_bytes());
        if self.write_xref {
            pdf.extend_from_slice(format!("startxref\n{xref_offset}\n").as_bytes());
        }
        pdf.extend_from_slice(b"%%EOF");

        BuiltPdf {
            data: pdf,
            locations,
            root: catalog_obj,
            info: info_obj,
            streams,
        }
    }

    fn encode(&self, data: Vec<u8>) -> (Vec<u8>, String) {
        if !self.compress_streams {
            return (data, String::new());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        match encoder.write_all(&data).and_then(|_| encoder.finish()) {
            Ok(compressed) => (compressed, " /Filter /FlateDecode".to_string()),
            Err(_) => (data, String::new()),
        }
    }
}

fn write_direct(
    pdf: &mut Vec<u8>,
    locations: &mut BTreeMap<u32, ObjectLocation>,
    number: u32,
    generation: u16,
    body: &str,
) {
    locations.insert(
        number,
        ObjectLocation::Direct {
            offset: pdf.len() as u64,
            generation,
        },
    );
    pdf.extend_from_slice(format!("{number} {generation} obj\n{body}\nendobj\n").as_bytes());
}

fn write_stream(
    pdf: &mut Vec<u8>,
    locations: &mut BTreeMap<u32, ObjectLocation>,
    number: u32,
    dict_entries: &str,
    payload: &[u8],
    declared_length: i64,
) {
    locations.insert(
        number,
        ObjectLocation::Direct {
            offset: pdf.len() as u64,
            generation: 0,
        },
    );
    let separator = if dict_entries.is_empty() { "" } else { " " };
    pdf.extend_from_slice(
        format!("{number} 0 obj\n<< {dict_entries}{separator}/Length {declared_length} >>\nstream\n")
            .as_bytes(),
    );
    pdf.extend_from_slice(payload);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");
}

/// Header of `number offset` pairs followed by the bodies; returns the
/// payload and the offset of the first body
fn object_stream_payload(objects: &[(u32, String)]) -> (Vec<u8>, usize) {
    let mut header = String::new();
    let mut bodies = String::new();
    for (number, body) in objects {
        header.push_str(&format!("{number} {} ", bodies.len()));
        bodies.push_str(body);
        bodies.push(' ');
    }
    let first = header.len();
    (format!("{header}{bodies}").into_bytes(), first)
}

/// Write traditional cross-reference table
fn write_traditional_xref(
    pdf: &mut Vec<u8>,
    locations: &BTreeMap<u32, ObjectLocation>,
    size: u32,
) {
    pdf.extend_from_slice(b"xref\n");
    pdf.extend_from_slice(format!("0 {size}\n").as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for number in 1..size {
        match locations.get(&number) {
            Some(ObjectLocation::Direct { offset, generation }) => {
                pdf.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
            }
            _ => pdf.extend_from_slice(b"0000000000 00001 f \n"),
        }
    }
}

/// Escape special characters in PDF strings
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            '\n' => "\\n".to_string(),
            '\r' => "\\r".to_string(),
            '\t' => "\\t".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_pdf_generation() {
        let built = TestPdfBuilder::minimal().build();
        assert!(built.data.starts_with(b"%PDF-1.4"));
        assert!(built.data.ends_with(b"%%EOF"));
        assert_eq!(built.max_object_number(), 3);
    }

    #[test]
    fn test_recorded_offsets_point_at_headers() {
        let mut builder = TestPdfBuilder::new().with_title("Offsets");
        builder.add_text_page("one").add_text_page("two");
        let built = builder.build();

        for (number, location) in &built.locations {
            let ObjectLocation::Direct { offset, generation } = location else {
                panic!("nothing is packed");
            };
            let header = format!("{number} {generation} obj");
            assert!(built.data[*offset as usize..].starts_with(header.as_bytes()));
        }
        assert_eq!(built.info, Some(7));
    }

    #[test]
    fn test_object_streams_pack_dictionaries() {
        let mut builder = TestPdfBuilder::new().with_object_streams(true);
        builder.add_text_page("packed");
        let built = builder.build();

        assert!(built.data.starts_with(b"%PDF-1.5"));
        assert!(matches!(
            built.locations.get(&3),
            Some(ObjectLocation::Packed { index: 0, .. })
        ));
        assert!(built.offset_of(4).is_some());
    }

    #[test]
    fn test_append_update_moves_object() {
        let mut built = TestPdfBuilder::minimal().build();
        let before = built.offset_of(2).unwrap();
        built.append_update(2, 0, "<< /Type /Pages /Kids [] /Count 0 >>");
        assert!(built.offset_of(2).unwrap() > before);
    }
}
