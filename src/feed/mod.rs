//! Reading the FPDS Atom feed: documents, field lookup, entry decoding,
//! query construction, and pagination.

pub mod decoder;
pub mod document;
pub mod extract;
pub mod query;
pub mod walker;
