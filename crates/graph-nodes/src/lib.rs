//! Graph Nodes
//!
//! Built-in node types for Trellis graphs. Each node is a self-contained
//! file providing a template (ports plus UI value components) and a `call`
//! implementation, registered at link time via `inventory`.
//!
//! # Categories
//!
//! - **Input**: sources feeding values into a graph
//! - **Processing**: transformations between ports
//! - **Output**: sinks rendering final values

pub mod input;
pub mod output;
pub mod processing;

// Re-export all nodes for convenience
pub use input::*;
pub use output::*;
pub use processing::*;

use graph_engine::NodeRegistry;

/// Registry containing every built-in node type
///
/// Call this instead of `NodeRegistry::with_builtins` from binaries: the
/// call keeps this crate linked, which is what makes its `inventory`
/// submissions visible in the first place.
pub fn registry() -> NodeRegistry {
    NodeRegistry::with_builtins()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_collects_all_builtins() {
        let registry = registry();
        let templates = registry.templates();
        assert_eq!(templates.len(), 4, "Expected 4 built-in nodes");

        // Spot-check known types
        assert!(registry.has_node_type("Constant"));
        assert!(registry.has_node_type("Arithmetic"));
        assert!(registry.has_node_type("Concat"));
        assert!(registry.has_node_type("Display"));
    }

    #[test]
    fn test_builtins_have_factories() {
        let registry = registry();
        for name in ["Constant", "Arithmetic", "Concat", "Display"] {
            let instance = registry.instantiate(
                name,
                &registry.get_template(name).unwrap().default_values(),
                graph_engine::Position::default(),
            );
            assert!(instance.is_ok(), "{} should instantiate", name);
        }
    }
}
