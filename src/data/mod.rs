//! Dataset schema, CSV parsing and sources
//!
//! The loader never fails: if the configured source cannot produce a valid
//! table, a seeded synthetic table with the same schema is used instead.

pub mod csv;
pub mod record;
pub mod source;
pub mod synthetic;

pub use self::csv::parse_records;
pub use self::record::*;
pub use self::source::*;
