//! HTTP request handlers.

pub mod common;
pub mod dashboard;
pub mod health;
pub mod records;

pub use dashboard::*;
pub use health::*;
pub use records::*;
