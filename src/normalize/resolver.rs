//! Tolerant lookup of a logical field across the column names different exports use for it.

use crate::domain::record::RawRecord;

/// Some exports carry a byte order mark glued to their first header.
const BOM: char = '\u{feff}';

fn non_empty<'r>(record: &'r RawRecord, name: &str) -> Option<&'r str> {
    record.get(name).filter(|value| !value.is_empty())
}

/// Returns the value of the first candidate column that is present and non-empty.
///
/// Candidates are probed in order, each one as written and then with a leading BOM.
/// The first hit wins; values are never merged.
pub fn resolve<'r>(record: &'r RawRecord, candidates: &[&str]) -> Option<&'r str> {
    candidates.iter().find_map(|name| {
        non_empty(record, name).or_else(|| non_empty(record, &format!("{BOM}{name}")))
    })
}

/// Like [`resolve`], falling back to `default` when no candidate matches.
pub fn resolve_or<'r>(record: &'r RawRecord, candidates: &[&str], default: &'r str) -> &'r str {
    resolve(record, candidates).unwrap_or(default)
}
