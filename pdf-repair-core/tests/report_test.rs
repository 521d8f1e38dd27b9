//! Repair report contents and logging

use pdf_repair::recovery::{repair_bytes, RepairOptions, RepairReport};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn damaged_document() -> Vec<u8> {
    b"%PDF-1.4\n\
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[]/Count 0>>\n\
3 0 obj<</Length 999>>stream\nabcdendstream endobj\n\
) trailer<</Root 1 0 R>>\n\
4 0 obj<</Broken"
        .to_vec()
}

#[test]
fn test_report_counts() {
    init_tracing();
    let repaired = repair_bytes(damaged_document(), &RepairOptions::default()).unwrap();
    let report = &repaired.report;

    assert_eq!(report.objects_found, 3);
    assert_eq!(report.trailers_found, 1);
    assert_eq!(report.max_object_number, 3);
    assert_eq!(report.streams_corrected, 1);
    assert!(report.truncated);
    // wrong length, stray byte and truncation
    assert_eq!(report.warnings.len(), 3);
}

#[test]
fn test_repair_is_deterministic() {
    let first = repair_bytes(damaged_document(), &RepairOptions::default()).unwrap();
    let second = repair_bytes(damaged_document(), &RepairOptions::default()).unwrap();

    assert_eq!(first.report, second.report);
    assert_eq!(
        first.reader.xref().iter().map(|(n, e)| (n, e.kind, e.generation)).collect::<Vec<_>>(),
        second.reader.xref().iter().map(|(n, e)| (n, e.kind, e.generation)).collect::<Vec<_>>()
    );
    assert_eq!(first.reader.trailer(), second.reader.trailer());
}

#[test]
fn test_default_report_is_empty() {
    let report = RepairReport::default();
    assert_eq!(report.objects_found, 0);
    assert!(report.warnings.is_empty());
    assert!(!report.truncated);
}

#[cfg(feature = "serde")]
#[test]
fn test_report_serializes() {
    let repaired = repair_bytes(damaged_document(), &RepairOptions::default()).unwrap();
    let json = serde_json::to_value(&repaired.report).unwrap();

    assert_eq!(json["objects_found"], 3);
    assert_eq!(json["truncated"], true);
    assert_eq!(json["warnings"].as_array().map(Vec::len), Some(3));

    let entry = serde_json::to_value(repaired.reader.xref().get(3).unwrap()).unwrap();
    assert_eq!(entry["generation"], 0);
}
