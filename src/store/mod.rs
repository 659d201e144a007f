//! In-memory state: the entry list and the metadata cache.
//!
//! Both are mutated only through their own methods; the hub owns them.

mod entries;
mod metadata;

pub use entries::*;
pub use metadata::*;
