//! Shared store test utilities.

pub mod backends;

#[allow(unused_imports)]
pub use backends::*;
