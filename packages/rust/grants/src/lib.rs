//! Grant identifier parsing.
//!
//! Decomposes free-text NIH grant identifiers (`1-R01-AI073685-01`) into
//! their components using ordered tables of known activity and IC codes,
//! and derives the canonical key used to search the catalog.
//!
//! Everything in this crate is pure: no I/O, no shared state.

mod codes;
mod funding;
mod parser;

pub use codes::{CodeTable, CodeTableError, CodeTables};
pub use funding::{split_delimited, to_canonical_keys};
pub use parser::{ParseFault, ParseOutcome, ParsedGrant, parse_grant};
