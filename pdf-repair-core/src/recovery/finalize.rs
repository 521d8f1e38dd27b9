//! Turning a scan into a reference table

use super::rebuild::ScanOutcome;
use super::{RepairOptions, RepairReport};
use crate::error::{RepairPhase, Result};
use crate::parser::objects::{PdfDictionary, PdfObject};
use crate::parser::reader::PdfReader;
use crate::parser::xref::{XrefEntry, XrefTable};
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Build the table from the scan.
///
/// Candidates are applied in file order so the last definition of an object
/// wins. Measured stream lengths are written into the loaded dictionaries,
/// unused identifiers are linked into the free list and a trailer is
/// synthesized with `Size`, `Root`, `Info`, `Encrypt` and `ID`.
pub fn finalize<R: Read + Seek>(
    scan: ScanOutcome<R>,
    options: &RepairOptions,
) -> Result<(PdfReader<R>, RepairReport)> {
    let ScanOutcome {
        lexer,
        candidates,
        fragments,
        max_number,
        mut report,
    } = scan;

    let size = max_number as usize + 1;
    let mut table = XrefTable::with_len(size);
    for candidate in &candidates {
        if let Some(entry) = table.get_mut(candidate.id.number) {
            *entry = XrefEntry {
                stream: candidate.stream,
                ..XrefEntry::in_use(candidate.offset, candidate.id.generation)
            };
        }
    }
    drop(candidates);

    let mut reader = PdfReader::new(lexer, table, options.parse.clone());
    if options.correct_stream_lengths {
        correct_stream_lengths(&mut reader, options, &mut report)?;
    }

    reader.xref_mut().relink_free_list(true);

    let mut trailer = PdfDictionary::new();
    trailer.insert("Size", PdfObject::Integer(size as i64));
    if let Some(root) = fragments.root {
        trailer.insert("Root", root);
    }
    if let Some(info) = fragments.info {
        trailer.insert("Info", info);
    }
    if let Some(encrypt) = fragments.encrypt {
        trailer.insert("Encrypt", encrypt);
    }
    if let Some(id) = fragments.id {
        trailer.insert("ID", id);
    }
    reader.xref_mut().set_trailer(trailer);

    debug!(
        size,
        free = reader.xref().free_list().len() - 1,
        "table finalized"
    );
    Ok((reader, report))
}

/// Overwrite /Length of every stream whose length had to be measured
fn correct_stream_lengths<R: Read + Seek>(
    reader: &mut PdfReader<R>,
    options: &RepairOptions,
    report: &mut RepairReport,
) -> Result<()> {
    let measured: Vec<(u32, u16, u64)> = reader
        .xref()
        .iter()
        .filter_map(|(number, entry)| {
            let length = entry.stream?.corrected_length?;
            Some((number, entry.generation, length))
        })
        .collect();

    for (number, generation, length) in measured {
        reader
            .load_object(number)
            .map_err(|e| e.in_object(number, generation, RepairPhase::StreamLength))?;

        let dict = reader
            .xref_mut()
            .get_mut(number)
            .and_then(|entry| entry.cached.as_mut())
            .and_then(|object| object.as_dict_mut());
        match dict {
            Some(dict) => {
                dict.insert("Length", PdfObject::Integer(length as i64));
                report.streams_corrected += 1;
            }
            None => {
                let message =
                    format!("object {number} {generation} has a stream but no dictionary");
                warn!(number, generation, "{message}");
                report.note(options, message);
            }
        }
    }

    Ok(())
}
