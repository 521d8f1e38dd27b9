//! Table Validators
//!
//! Consistency checks for repaired reference tables. Each check returns the
//! list of problems found, empty when the table is sound.

use crate::generators::{BuiltPdf, ObjectLocation};
use pdf_repair::parser::xref::FREE_HEAD_GENERATION;
use pdf_repair::parser::{EntryKind, XrefTable};
use std::collections::HashSet;

/// A problem found in a repaired table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableIssue {
    #[error("entry 0 is not the head of the free list")]
    BadHead,

    #[error("free list visits {0} twice")]
    Cycle(u32),

    #[error("free list links to {0}, which is not a free entry")]
    NotFree(u32),

    #[error("free list is not ascending at {0}")]
    OutOfOrder(u32),

    #[error("free entry {0} is not on the free list")]
    Unlinked(u32),

    #[error("trailer Size is {found:?}, table holds {expected} entries")]
    SizeMismatch { expected: usize, found: Option<i64> },

    #[error("compressed entry {object} lives in {container}, which is not in use")]
    BadContainer { object: u32, container: u32 },

    #[error("object {number} should be at {expected:?}, table has {found:?}")]
    WrongLocation {
        number: u32,
        expected: ObjectLocation,
        found: Option<(EntryKind, u16)>,
    },
}

/// Check that free entries form one ascending chain from entry 0 back to 0,
/// that compressed entries live in in-use containers and that Size matches
pub fn check_free_list(table: &XrefTable) -> Vec<TableIssue> {
    let mut issues = Vec::new();

    let Some(head) = table.get(0) else {
        return vec![TableIssue::BadHead];
    };
    if !head.is_free() || head.generation != FREE_HEAD_GENERATION {
        issues.push(TableIssue::BadHead);
    }

    let mut visited = HashSet::new();
    let mut current = 0u32;
    while let Some(EntryKind::Free { next }) = table.get(current).map(|e| e.kind) {
        if next == 0 {
            break;
        }
        if !visited.insert(next) {
            issues.push(TableIssue::Cycle(next));
            break;
        }
        if !table.get(next).is_some_and(|e| e.is_free()) {
            issues.push(TableIssue::NotFree(next));
            break;
        }
        if next <= current {
            issues.push(TableIssue::OutOfOrder(next));
        }
        current = next;
    }

    for (number, entry) in table.iter().skip(1) {
        if entry.is_free() && !visited.contains(&number) {
            issues.push(TableIssue::Unlinked(number));
        }
        if let EntryKind::Compressed { container, .. } = entry.kind {
            if !table.get(container).is_some_and(|c| c.is_in_use()) {
                issues.push(TableIssue::BadContainer {
                    object: number,
                    container,
                });
            }
        }
    }

    if table.size() != Some(table.len() as i64) {
        issues.push(TableIssue::SizeMismatch {
            expected: table.len(),
            found: table.size(),
        });
    }

    issues
}

/// Check that every object the builder placed is found where it was put
pub fn check_locations(built: &BuiltPdf, table: &XrefTable) -> Vec<TableIssue> {
    built
        .locations
        .iter()
        .filter_map(|(&number, &expected)| {
            let found = table.get(number).map(|e| (e.kind, e.generation));
            let matches = match (expected, found) {
                (
                    ObjectLocation::Direct { offset, generation },
                    Some((EntryKind::InUse { offset: at }, gen)),
                ) => offset == at && generation == gen,
                (
                    ObjectLocation::Packed { container, index },
                    Some((
                        EntryKind::Compressed {
                            container: c,
                            index: i,
                        },
                        _,
                    )),
                ) => container == c && index == i,
                _ => false,
            };
            (!matches).then_some(TableIssue::WrongLocation {
                number,
                expected,
                found,
            })
        })
        .collect()
}
