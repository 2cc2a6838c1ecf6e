//! Concat node
//!
//! Joins two inputs as text with a configurable separator. Non-string
//! inputs are rendered as compact JSON.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graph_engine::{
    ComputeNode, DataType, NodeDefinition, NodeFactory, NodeTemplate, Position, Result,
    ValueComponent, ValueMap,
};

/// Text concatenation node
pub struct ConcatNode {
    separator: String,
}

impl ConcatNode {
    pub const PORT_A: &'static str = "a";
    pub const PORT_B: &'static str = "b";
    pub const PORT_OUT: &'static str = "out";

    pub fn template() -> NodeTemplate {
        NodeTemplate::new("Concat", "Concat")
            .input(Self::PORT_A, "A", DataType::String)
            .input(Self::PORT_B, "B", DataType::String)
            .output(Self::PORT_OUT, "Text", DataType::String)
            .value(
                "separator",
                "Separator",
                ValueComponent::TextBox {
                    default: String::new(),
                    placeholder: "separator".to_string(),
                    maxlen: 16,
                    regex: String::new(),
                },
            )
    }

    pub fn factory() -> Arc<dyn NodeFactory> {
        Arc::new(ConcatFactory)
    }
}

struct ConcatFactory;

impl NodeFactory for ConcatFactory {
    fn instantiate(&self, values: &ValueMap, _position: Position) -> Result<Box<dyn ComputeNode>> {
        let separator = values
            .get("separator")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Box::new(ConcatNode { separator }))
    }
}

inventory::submit!(NodeDefinition {
    template: ConcatNode::template,
    factory: ConcatNode::factory,
});

fn render(value: Option<&serde_json::Value>) -> String {
    match value {
        None => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl ComputeNode for ConcatNode {
    async fn call(
        &self,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        let a = render(inputs.get(Self::PORT_A));
        let b = render(inputs.get(Self::PORT_B));
        let joined = format!("{}{}{}", a, self.separator, b);
        Ok(HashMap::from([(
            Self::PORT_OUT.to_string(),
            serde_json::Value::String(joined),
        )]))
    }
}
