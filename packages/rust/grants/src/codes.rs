//! Ordered code tables used for prefix matching.

use collections_shared::CollectionsError;

/// A code that can never match because an earlier code is a prefix of it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeTableError {
    #[error("code '{earlier}' is a prefix of later code '{later}' and would shadow it")]
    Shadowed { earlier: String, later: String },
}

impl From<CodeTableError> for CollectionsError {
    fn from(err: CodeTableError) -> Self {
        CollectionsError::validation(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// CodeTable
// ---------------------------------------------------------------------------

/// An ordered list of codes where the first prefix match wins.
///
/// Construction guarantees every code is reachable: no code is a strict
/// prefix of a code that appears after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    codes: Vec<String>,
}

impl CodeTable {
    /// Build a table in the given order, rejecting shadowed codes.
    pub fn new<I, S>(codes: I) -> Result<Self, CodeTableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes.into_iter().map(Into::into).collect();

        for (i, earlier) in codes.iter().enumerate() {
            if let Some(later) = codes[i + 1..]
                .iter()
                .find(|later| later.len() > earlier.len() && later.starts_with(earlier.as_str()))
            {
                return Err(CodeTableError::Shadowed {
                    earlier: earlier.clone(),
                    later: later.clone(),
                });
            }
        }

        Ok(Self { codes })
    }

    /// Build a table from an unordered list: duplicates dropped (first kept),
    /// then a stable sort putting longer codes first.
    pub fn longest_first<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for code in codes.into_iter().map(Into::into) {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        unique.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        Self { codes: unique }
    }

    /// The first code (in table order) that is a case-sensitive prefix of `input`.
    pub fn match_prefix(&self, input: &str) -> Option<&str> {
        self.codes
            .iter()
            .find(|code| input.starts_with(code.as_str()))
            .map(String::as_str)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// The activity-code and IC-code tables, read-only for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTables {
    pub activity: CodeTable,
    pub ic: CodeTable,
}

impl CodeTables {
    pub fn new(activity: CodeTable, ic: CodeTable) -> Self {
        Self { activity, ic }
    }
}
