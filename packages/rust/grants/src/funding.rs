//! Delimited free-text fields from the metadata sheet.

use std::collections::BTreeSet;

use collections_shared::NOT_FOUND;
use tracing::debug;

use crate::codes::CodeTables;

/// Split a comma- or pipe-delimited cell into trimmed items.
///
/// Asterisks are stripped first. Commas take precedence over pipes; a cell
/// with neither is a single item. Blank items are dropped, order and
/// duplicates are kept. An absent cell or the literal `not found` is empty.
pub fn split_delimited(text: Option<&str>) -> Vec<String> {
    let Some(text) = text.filter(|t| *t != NOT_FOUND) else {
        return Vec::new();
    };

    let cleaned = text.replace('*', "");
    let items: Vec<&str> = if cleaned.contains(',') {
        cleaned.split(',').collect()
    } else if cleaned.contains('|') {
        cleaned.split('|').collect()
    } else {
        vec![cleaned.as_str()]
    };

    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical search keys for every grant in a delimited cell.
pub fn to_canonical_keys(text: Option<&str>, tables: &CodeTables) -> BTreeSet<String> {
    split_delimited(text)
        .iter()
        .map(|grant| {
            let outcome = tables.parse(grant);
            if outcome.is_degraded() {
                debug!(grant = %grant, ?outcome, "grant did not decompose, searching raw text");
            }
            outcome.canonical_key()
        })
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeTable;

    fn tables() -> CodeTables {
        CodeTables::new(
            CodeTable::new(["R01", "U19"]).unwrap(),
            CodeTable::new(["AI"]).unwrap(),
        )
    }

    #[test]
    fn absent_and_not_found_are_empty() {
        assert!(split_delimited(None).is_empty());
        assert!(split_delimited(Some("not found")).is_empty());
        assert!(split_delimited(Some("  ,  ")).is_empty());
    }

    #[test]
    fn commas_win_over_pipes() {
        assert_eq!(
            split_delimited(Some("A|B, C")),
            vec!["A|B".to_string(), "C".to_string()]
        );
        assert_eq!(
            split_delimited(Some("A | B |B")),
            vec!["A".to_string(), "B".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn asterisks_are_stripped() {
        assert_eq!(
            split_delimited(Some("*R01AI073685*, U19AI057229")),
            vec!["R01AI073685".to_string(), "U19AI057229".to_string()]
        );
        assert_eq!(split_delimited(Some("NIAID")), vec!["NIAID".to_string()]);
    }

    #[test]
    fn canonical_keys_are_deduplicated() {
        let keys = to_canonical_keys(
            Some("1-R01-AI073685-01, R01AI073685, AI073685-01, HHSN272201400008C"),
            &tables(),
        );
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["AI073685".to_string(), "HHSN272201400008C".to_string()]
        );
    }

    #[test]
    fn unparseable_list_yields_no_keys() {
        assert!(to_canonical_keys(Some("not found"), &tables()).is_empty());
        assert!(to_canonical_keys(None, &tables()).is_empty());
    }
}
