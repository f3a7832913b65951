//! Error types

mod resolve;
mod tree;

pub use resolve::*;
pub use tree::*;
