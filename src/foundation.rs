pub mod core;
pub mod error;
pub mod json;
pub(crate) mod math;
