//! Source nodes that feed values into a graph

pub mod constant;

pub use constant::*;
