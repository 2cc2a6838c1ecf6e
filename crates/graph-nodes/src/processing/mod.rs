//! Nodes that transform values

pub mod arithmetic;
pub mod concat;

pub use arithmetic::*;
pub use concat::*;
