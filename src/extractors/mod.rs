pub mod normalized;

pub use normalized::NormalizedJson;
