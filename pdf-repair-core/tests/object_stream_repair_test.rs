//! Object streams and stream lengths after repair

use pdf_repair::parser::{EntryKind, ObjectId};
use pdf_repair::recovery::{repair_bytes, RepairOptions};
use pdf_repair::PdfError;

fn stream_object(number: u32, dict: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{number} 0 obj\n<<{dict}/Length {}>>\nstream\n", payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out
}

fn document(parts: &[Vec<u8>], trailer: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    for part in parts {
        out.extend_from_slice(part);
    }
    out.extend_from_slice(format!("trailer\n{trailer}\n%%EOF\n").as_bytes());
    out
}

#[test]
fn test_wrong_length_is_measured_and_written_back() {
    let data = b"%PDF-1.4\n\
1 0 obj<</Type/Catalog>>endobj\n\
4 0 obj<</Length 999999>>stream\n0123456789endstream\nendobj\n\
trailer<</Root 1 0 R>>\n";
    let mut repaired = repair_bytes(data.to_vec(), &RepairOptions::default()).unwrap();
    assert_eq!(repaired.report.streams_corrected, 1);

    let length = repaired
        .reader
        .load_object(4)
        .unwrap()
        .as_dict()
        .and_then(|d| d.get("Length"))
        .and_then(|l| l.as_integer());
    assert_eq!(length, Some(10));
    assert_eq!(repaired.reader.stream_data(4).unwrap(), b"0123456789");
}

#[test]
fn test_indirect_length_is_measured() {
    let data = b"3 0 obj<</Length 9 0 R>>stream\nabcdefendstream endobj 9 0 obj 6 endobj";
    let mut repaired = repair_bytes(data.to_vec(), &RepairOptions::default()).unwrap();
    assert_eq!(repaired.reader.stream_data(3).unwrap(), b"abcdef");
    assert_eq!(repaired.report.streams_corrected, 1);
}

#[test]
fn test_correct_length_is_kept() {
    let data = b"3 0 obj<</Length 6>>stream\nabcdef\nendstream endobj";
    let mut repaired = repair_bytes(data.to_vec(), &RepairOptions::default()).unwrap();
    assert_eq!(repaired.report.streams_corrected, 0);
    assert_eq!(repaired.reader.stream_data(3).unwrap(), b"abcdef");
}

#[test]
fn test_missing_endstream_runs_to_end_of_file() {
    let data = b"1 0 obj<</Type/Catalog>>endobj trailer<</Root 1 0 R>> 2 0 obj<</Length 1>>stream\nabc";
    let mut repaired = repair_bytes(data.to_vec(), &RepairOptions::default()).unwrap();
    assert_eq!(repaired.reader.stream_data(2).unwrap(), b"abc");
    assert!(!repaired.report.warnings.is_empty());
}

#[test]
fn test_object_stream_members_are_published() {
    let parts = vec![
        b"1 0 obj<</Type/Catalog/Pages 5 0 R>>endobj\n".to_vec(),
        stream_object(3, "/Type/ObjStm/N 2/First 8", b"5 0 7 24<</Type/Pages/Count 0>> (seven)"),
    ];
    let data = document(&parts, "<</Size 4/Root 1 0 R>>");
    let mut repaired = repair_bytes(data, &RepairOptions::default()).unwrap();

    let xref = repaired.reader.xref();
    assert_eq!(
        xref.get(5).unwrap().kind,
        EntryKind::Compressed {
            container: 3,
            index: 0
        }
    );
    assert_eq!(
        xref.get(7).unwrap().kind,
        EntryKind::Compressed {
            container: 3,
            index: 1
        }
    );
    assert_eq!(xref.size(), Some(8));
    assert_eq!(xref.free_list(), vec![0, 2, 4, 6]);
    assert_eq!(repaired.report.containers_expanded, 1);
    assert_eq!(repaired.report.objects_in_containers, 2);

    let root = repaired.reader.trailer().get("Root").cloned().unwrap();
    let catalog = repaired.reader.resolve(&root).unwrap();
    let pages = catalog.as_dict().unwrap().get("Pages").cloned().unwrap();
    let pages = repaired.reader.resolve(&pages).unwrap();
    assert_eq!(pages.as_dict().unwrap().get_type(), Some("Pages"));

    let seven = repaired.reader.get_object(ObjectId::new(7, 0)).unwrap();
    assert_eq!(seven.as_string().unwrap().as_bytes(), b"seven");
}

#[cfg(feature = "compression")]
#[test]
fn test_compressed_object_stream() {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"5 0 7 4 true false").unwrap();
    let payload = encoder.finish().unwrap();

    let parts = vec![
        b"1 0 obj<</Type/Catalog>>endobj\n".to_vec(),
        stream_object(3, "/Type/ObjStm/N 2/First 8/Filter/FlateDecode", &payload),
    ];
    let data = document(&parts, "<</Root 1 0 R>>");
    let mut repaired = repair_bytes(data, &RepairOptions::default()).unwrap();

    assert_eq!(repaired.report.objects_in_containers, 2);
    assert_eq!(repaired.reader.load_object(5).unwrap().as_bool(), Some(true));
    assert_eq!(repaired.reader.load_object(7).unwrap().as_bool(), Some(false));
}

#[test]
fn test_minimal_options_skip_expansion() {
    let parts = vec![stream_object(3, "/Type/ObjStm/N 1/First 4", b"5 0 null")];
    let data = document(&parts, "<<>>");
    let repaired = repair_bytes(data, &RepairOptions::minimal()).unwrap();

    assert_eq!(repaired.report.containers_expanded, 0);
    assert_eq!(repaired.reader.xref().len(), 4);
}

#[test]
fn test_directly_defined_object_is_replaced_by_container_entry() {
    let parts = vec![
        b"5 0 obj (direct) endobj\n".to_vec(),
        stream_object(3, "/Type/ObjStm/N 1/First 4", b"5 0 (packed)"),
    ];
    let data = document(&parts, "<<>>");
    let mut repaired = repair_bytes(data, &RepairOptions::default()).unwrap();

    assert!(repaired.reader.xref().get(5).unwrap().is_compressed());
    let five = repaired.reader.load_object(5).unwrap();
    assert_eq!(five.as_string().unwrap().as_bytes(), b"packed");
}

#[test]
fn test_corrupt_object_stream_fails() {
    let parts = vec![stream_object(3, "/Type/ObjStm/N 2/First 8", b"5 0 7")];
    let data = document(&parts, "<<>>");
    let err = repair_bytes(data, &RepairOptions::default()).err().unwrap();
    assert!(matches!(err, PdfError::CorruptObjectStream { number: 3, .. }));
    assert!(!err.is_structural());
}

#[test]
fn test_container_inside_container_fails() {
    // object 4 moves object 3 into itself, stranding object 8
    let parts = vec![
        stream_object(3, "/Type/ObjStm/N 1/First 4", b"8 0 null"),
        stream_object(4, "/Type/ObjStm/N 1/First 4", b"3 0 null"),
    ];
    let data = document(&parts, "<<>>");
    let err = repair_bytes(data, &RepairOptions::default()).err().unwrap();
    assert!(err.is_structural());
    assert!(matches!(
        err,
        PdfError::InvalidContainer {
            object: 8,
            container: 3
        }
    ));
}
