//! Note search.
//!
//! # Responsibility
//! - Parse the free-text search box into a typed predicate.
//! - Match notes in memory against that predicate.
//!
//! Search never touches the tag catalog and never writes.

pub mod query;

pub use query::{SearchPredicate, SearchQuery};
