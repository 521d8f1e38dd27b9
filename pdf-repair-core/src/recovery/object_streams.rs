//! Object stream expansion
//!
//! After the table is built, every object stream found in it is opened and
//! the objects it declares are re-pointed at it as compressed entries.

use super::{RepairOptions, RepairReport};
use crate::error::{PdfError, RepairPhase, Result};
use crate::parser::object_stream::{object_count, read_object_numbers};
use crate::parser::objects::PdfObject;
use crate::parser::reader::PdfReader;
use crate::parser::xref::EntryKind;
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Expand every `/Type/ObjStm` object in the table, then check that each
/// compressed entry points at a plain in-use object.
pub fn expand_object_streams<R: Read + Seek>(
    reader: &mut PdfReader<R>,
    options: &RepairOptions,
    report: &mut RepairReport,
) -> Result<()> {
    let mut grown = false;
    let mut changed = false;

    let mut number = 0u32;
    while (number as usize) < reader.xref().len() {
        let current = number;
        number += 1;

        let Some(entry) = reader.xref().get(current) else {
            break;
        };
        if !entry.is_in_use() || entry.stream.is_none() {
            continue;
        }
        let generation = entry.generation;

        let dict = match reader.load_object(current) {
            Ok(PdfObject::Dictionary(dict)) => dict,
            Ok(_) => continue,
            Err(e) => {
                let message = format!("cannot load stream object {current} {generation}, skipping: {e}");
                warn!(number = current, generation, "{message}");
                report.note(options, message);
                continue;
            }
        };
        if dict.get_type() != Some("ObjStm") {
            continue;
        }

        let count = object_count(dict).map_err(|e| PdfError::CorruptObjectStream {
            number: current,
            generation,
            reason: e.to_string(),
        })?;
        let data = reader
            .decoded_stream(current)
            .map_err(|e| e.in_object(current, generation, RepairPhase::ObjectStream))?;
        let members =
            read_object_numbers(&data, count).map_err(|e| PdfError::CorruptObjectStream {
                number: current,
                generation,
                reason: e.to_string(),
            })?;

        debug!(number = current, count, "expanding object stream");
        for (index, &(member, _offset)) in members.iter().enumerate() {
            if member > options.max_object_number {
                let message = format!(
                    "object stream {current} lists object {member} beyond the limit, skipping"
                );
                warn!(number = current, member, "{message}");
                report.note(options, message);
                continue;
            }
            if member as usize >= reader.xref().len() {
                reader.xref_mut().resize(member as usize + 1);
                grown = true;
            }
            if let Some(entry) = reader.xref_mut().get_mut(member) {
                entry.kind = EntryKind::Compressed {
                    container: current,
                    index: index as u32,
                };
                entry.generation = 0;
                entry.stream = None;
                entry.cached = None;
                report.objects_in_containers += 1;
                changed = true;
            }
        }
        report.containers_expanded += 1;
    }

    if changed {
        reader.xref_mut().relink_free_list(false);
    }
    if grown {
        let size = reader.xref().len() as i64;
        reader
            .xref_mut()
            .trailer_mut()
            .insert("Size", PdfObject::Integer(size));
    }

    validate_containers(reader)
}

/// Every compressed entry must live in an in-use object
fn validate_containers<R: Read + Seek>(reader: &PdfReader<R>) -> Result<()> {
    let xref = reader.xref();
    for (object, entry) in xref.iter() {
        if let EntryKind::Compressed { container, .. } = entry.kind {
            let valid = xref.get(container).is_some_and(|c| c.is_in_use());
            if !valid {
                return Err(PdfError::InvalidContainer { object, container });
            }
        }
    }
    Ok(())
}
