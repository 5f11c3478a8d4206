//! Row normalization: raw export rows in, canonical track rows out.
//!
//! Everything under this module is pure. No I/O, no errors, no shared state.

pub mod categorize;
pub mod duration;
pub mod resolver;
pub mod row;

pub use row::normalize_row;
