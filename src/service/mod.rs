//! Collection operations and duplicate suppression, on top of a `DocumentStore`.

mod collection;
mod dedupe;
pub use collection::{CollectionService, DiffFilter};
pub use dedupe::DuplicateFilter;
