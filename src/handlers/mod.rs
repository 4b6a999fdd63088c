//! HTTP handlers for collection operations.

pub mod collection;
