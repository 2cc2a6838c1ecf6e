//! Node type registry
//!
//! Maps node type names to their template and a factory building node
//! instances from `(values, position)`. Node types register themselves at
//! link time via `inventory`; `NodeRegistry::with_builtins` collects every
//! submitted [`NodeDefinition`], so there is no runtime discovery step.
//!
//! # Usage
//!
//! ```ignore
//! use graph_engine::{NodeDefinition, NodeRegistry};
//!
//! inventory::submit!(NodeDefinition {
//!     template: MyNode::template,
//!     factory: MyNode::factory,
//! });
//!
//! let registry = NodeRegistry::with_builtins();
//! let node = registry.instantiate("MyNode", &values, position)?;
//! let outputs = node.call(inputs).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{GraphEngineError, Result};
use crate::template::NodeTemplate;
use crate::types::{Position, ValueMap};

/// A constructed node instance, ready to be called
///
/// This is the whole execution contract: given named inputs, produce named
/// outputs, or fail. The engine does not look inside.
#[async_trait]
pub trait ComputeNode: Send + Sync {
    /// Execute this node with the given inputs
    async fn call(
        &self,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>>;
}

impl std::fmt::Debug for dyn ComputeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ComputeNode")
    }
}

/// Factory building node instances of one type
pub trait NodeFactory: Send + Sync {
    /// Construct an instance from its values and display position
    fn instantiate(&self, values: &ValueMap, position: Position) -> Result<Box<dyn ComputeNode>>;
}

/// Link-time registration record for a node type
///
/// Function pointers keep the static const-constructible; both are invoked
/// once per `with_builtins` call.
pub struct NodeDefinition {
    /// Returns the type's template
    pub template: fn() -> NodeTemplate,
    /// Returns the type's factory
    pub factory: fn() -> Arc<dyn NodeFactory>,
}

inventory::collect!(NodeDefinition);

/// A registration entry combining a template with an optional factory
struct RegistryEntry {
    template: NodeTemplate,
    factory: Option<Arc<dyn NodeFactory>>,
}

/// Registry of node types
///
/// Server processes typically only need templates (validation and the read
/// endpoint); worker processes also use the factories.
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry populated with every link-time [`NodeDefinition`]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for def in inventory::iter::<NodeDefinition> {
            registry.register((def.template)(), (def.factory)());
        }
        registry
    }

    /// Register a node type with a template and factory
    pub fn register(&mut self, template: NodeTemplate, factory: Arc<dyn NodeFactory>) {
        self.entries.insert(
            template.node_type.clone(),
            RegistryEntry {
                template,
                factory: Some(factory),
            },
        );
    }

    /// Register a node type with a template only (no factory)
    ///
    /// Useful when a process serves templates but never executes nodes.
    pub fn register_template(&mut self, template: NodeTemplate) {
        self.entries.insert(
            template.node_type.clone(),
            RegistryEntry {
                template,
                factory: None,
            },
        );
    }

    /// Register a node type backed by a plain function
    ///
    /// The function receives the instance's values and the call inputs.
    pub fn register_fn<F>(&mut self, template: NodeTemplate, f: F)
    where
        F: Fn(
                &ValueMap,
                HashMap<String, serde_json::Value>,
            ) -> Result<HashMap<String, serde_json::Value>>
            + Send
            + Sync
            + 'static,
    {
        self.register(template, Arc::new(FnFactory { f: Arc::new(f) }));
    }

    /// Get the template for a node type
    pub fn get_template(&self, node_type: &str) -> Option<&NodeTemplate> {
        self.entries.get(node_type).map(|e| &e.template)
    }

    /// All templates, keyed by type name in stable order
    pub fn templates(&self) -> BTreeMap<String, NodeTemplate> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.template.clone()))
            .collect()
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type names
    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Construct a node instance of the given type
    pub fn instantiate(
        &self,
        node_type: &str,
        values: &ValueMap,
        position: Position,
    ) -> Result<Box<dyn ComputeNode>> {
        let entry = self
            .entries
            .get(node_type)
            .ok_or_else(|| GraphEngineError::UnknownType(node_type.to_string()))?;
        let factory = entry
            .factory
            .as_ref()
            .ok_or_else(|| GraphEngineError::NoFactory(node_type.to_string()))?;
        factory.instantiate(values, position)
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries sharing the same type name.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

type NodeFn = dyn Fn(
        &ValueMap,
        HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>>
    + Send
    + Sync;

/// Factory for function-backed node types
struct FnFactory {
    f: Arc<NodeFn>,
}

impl NodeFactory for FnFactory {
    fn instantiate(&self, values: &ValueMap, _position: Position) -> Result<Box<dyn ComputeNode>> {
        Ok(Box::new(FnNode {
            values: values.clone(),
            f: self.f.clone(),
        }))
    }
}

/// Node instance wrapping a plain function
struct FnNode {
    values: ValueMap,
    f: Arc<NodeFn>,
}

#[async_trait]
impl ComputeNode for FnNode {
    async fn call(
        &self,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        (self.f)(&self.values, inputs)
    }
}
