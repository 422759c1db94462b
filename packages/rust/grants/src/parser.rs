//! NIH grant identifier parser.
//!
//! Layout of a full identifier, each part optional:
//! - application type code: one digit, followed by `-`, `_` or a space
//! - activity code: from the activity table (`R01`), optional `-`
//! - IC code: from the IC table (`AI`), optional `-`
//! - serial number: up to six digits
//! - support year: two characters after a trailing `-`
//!
//! Components are consumed left to right and never revisited.

use crate::codes::{CodeTable, CodeTables};

/// Maximum number of digits in a serial number.
const SERIAL_DIGITS: usize = 6;

/// Width of the tail inspected for a support-year separator.
const SUPPORT_YEAR_WINDOW: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Components of one grant identifier. `None` means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedGrant {
    /// The trimmed input.
    pub grant_id: String,
    pub application_type_code: Option<char>,
    pub activity_code: Option<String>,
    pub ic_code: Option<String>,
    pub serial_number: Option<String>,
    pub support_year: Option<String>,
}

impl ParsedGrant {
    fn unresolved(grant_id: &str) -> Self {
        Self {
            grant_id: grant_id.to_string(),
            ..Default::default()
        }
    }

    /// `icCode + serialNumber` when both resolved, else the asterisk-free input.
    pub fn canonical_key(&self) -> String {
        match (&self.ic_code, &self.serial_number) {
            (Some(ic), Some(serial)) => format!("{ic}{serial}"),
            _ => self.grant_id.replace('*', "").trim().to_string(),
        }
    }
}

/// Why a parse stopped short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFault {
    /// Nothing left after trimming.
    EmptyInput,
    /// No activity code, IC code or serial digits could be read.
    NoComponents,
}

/// Tagged result of parsing one identifier. Parsing never fails outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A research grant with at least one component resolved.
    Grant(ParsedGrant),
    /// Starts with two digits: a contract number. Only `grant_id` and
    /// `support_year` are set.
    Contract(ParsedGrant),
    /// Whatever was resolved before the fault.
    Degraded { partial: ParsedGrant, fault: ParseFault },
}

impl ParseOutcome {
    pub fn grant(&self) -> &ParsedGrant {
        match self {
            Self::Grant(g) | Self::Contract(g) => g,
            Self::Degraded { partial, .. } => partial,
        }
    }

    pub fn into_grant(self) -> ParsedGrant {
        match self {
            Self::Grant(g) | Self::Contract(g) => g,
            Self::Degraded { partial, .. } => partial,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn canonical_key(&self) -> String {
        self.grant().canonical_key()
    }
}

impl CodeTables {
    /// Parse `raw` against these tables.
    pub fn parse(&self, raw: &str) -> ParseOutcome {
        parse_grant(raw, &self.activity, &self.ic)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Decompose one raw grant string into its components.
pub fn parse_grant(raw: &str, activity_codes: &CodeTable, ic_codes: &CodeTable) -> ParseOutcome {
    let grant_id = raw.trim();
    let mut parsed = ParsedGrant::unresolved(grant_id);

    if grant_id.is_empty() {
        return ParseOutcome::Degraded {
            partial: parsed,
            fault: ParseFault::EmptyInput,
        };
    }

    parsed.support_year = support_year(grant_id);

    let mut chars = grant_id.chars();
    let mut remaining = grant_id;

    if let Some(first) = chars.next().filter(char::is_ascii_digit) {
        let second = chars.next();
        if second.is_none_or(|c| c.is_ascii_digit()) {
            return ParseOutcome::Contract(parsed);
        }
        parsed.application_type_code = Some(first);
        remaining = &remaining[first.len_utf8()..];
        if let Some(sep) = remaining.chars().next().filter(|c| matches!(c, '-' | '_' | ' ')) {
            remaining = &remaining[sep.len_utf8()..];
        }
    }

    if let Some(code) = activity_codes.match_prefix(remaining) {
        parsed.activity_code = Some(code.to_string());
        remaining = skip_dash(&remaining[code.len()..]);
    }

    if let Some(code) = ic_codes.match_prefix(remaining) {
        parsed.ic_code = Some(code.to_string());
        remaining = skip_dash(&remaining[code.len()..]);
    }

    parsed.serial_number = serial_number(remaining);

    if parsed.activity_code.is_none() && parsed.ic_code.is_none() && parsed.serial_number.is_none()
    {
        return ParseOutcome::Degraded {
            partial: parsed,
            fault: ParseFault::NoComponents,
        };
    }

    ParseOutcome::Grant(parsed)
}

/// The last two characters, when the last five contain a `-`.
fn support_year(grant_id: &str) -> Option<String> {
    let has_dash = grant_id
        .chars()
        .rev()
        .take(SUPPORT_YEAR_WINDOW)
        .any(|c| c == '-');
    if !has_dash {
        return None;
    }
    let tail: Vec<char> = grant_id.chars().rev().take(2).collect();
    Some(tail.into_iter().rev().collect())
}

fn skip_dash(s: &str) -> &str {
    s.strip_prefix('-').unwrap_or(s)
}

/// Digits up to six, stopping at the first `-`. Other characters are skipped.
fn serial_number(remaining: &str) -> Option<String> {
    let mut serial = String::new();
    for c in remaining.chars() {
        if c.is_ascii_digit() {
            serial.push(c);
            if serial.len() >= SERIAL_DIGITS {
                break;
            }
        } else if c == '-' {
            break;
        }
    }
    (!serial.is_empty()).then_some(serial)
}
