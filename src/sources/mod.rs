//! Per-source scraper adapters.
//!
//! Every source implements the same four operations (recent listing,
//! search, detail, streams) and converts any internal failure into the
//! operation's empty value so the aggregator never fails because one
//! source did.

pub mod indoanime;
pub mod jikan;
