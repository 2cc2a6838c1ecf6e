//! Sink nodes at the end of a graph

pub mod display;

pub use display::*;
