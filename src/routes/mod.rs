pub mod collection;
pub mod common;

pub use collection::collection_routes;
pub use common::common_routes_with_ready;
