//! Constant node
//!
//! Emits a fixed value with no inputs. The value is edited as text; if the
//! text parses as JSON it is emitted as that value (so `3` is a number and
//! `true` a boolean), otherwise it is emitted as a plain string.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graph_engine::{
    ComputeNode, DataType, NodeDefinition, NodeFactory, NodeTemplate, Position, Result,
    ValueComponent, ValueMap,
};

/// Constant source node
pub struct ConstantNode {
    value: String,
}

impl ConstantNode {
    /// Port id for the emitted value
    pub const PORT_OUT: &'static str = "out";

    pub fn template() -> NodeTemplate {
        NodeTemplate::new("Constant", "Constant")
            .output(Self::PORT_OUT, "Value", DataType::Any)
            .value(
                "value",
                "Value",
                ValueComponent::TextBox {
                    default: "0".to_string(),
                    placeholder: "value".to_string(),
                    maxlen: 256,
                    regex: String::new(),
                },
            )
    }

    pub fn factory() -> Arc<dyn NodeFactory> {
        Arc::new(ConstantFactory)
    }
}

struct ConstantFactory;

impl NodeFactory for ConstantFactory {
    fn instantiate(&self, values: &ValueMap, _position: Position) -> Result<Box<dyn ComputeNode>> {
        let value = values
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Box::new(ConstantNode { value }))
    }
}

inventory::submit!(NodeDefinition {
    template: ConstantNode::template,
    factory: ConstantNode::factory,
});

#[async_trait]
impl ComputeNode for ConstantNode {
    async fn call(
        &self,
        _inputs: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        let value = serde_json::from_str(&self.value)
            .unwrap_or_else(|_| serde_json::Value::String(self.value.clone()));
        Ok(HashMap::from([(Self::PORT_OUT.to_string(), value)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn emit(text: &str) -> serde_json::Value {
        let mut values = ValueMap::new();
        values.insert("value".to_string(), json!(text));
        let node = ConstantNode::factory()
            .instantiate(&values, Position::default())
            .unwrap();
        let mut outputs = node.call(HashMap::new()).await.unwrap();
        outputs.remove(ConstantNode::PORT_OUT).unwrap()
    }

    #[test]
    fn test_template_shape() {
        let template = ConstantNode::template();
        assert_eq!(template.node_type, "Constant");
        assert!(template.inputs.is_empty());
        assert!(template.outputs.contains_key("out"));
        assert_eq!(template.default_values()["value"], json!("0"));
    }

    #[tokio::test]
    async fn test_numeric_text_emits_number() {
        assert_eq!(emit("3").await, json!(3));
        assert_eq!(emit("2.5").await, json!(2.5));
    }

    #[tokio::test]
    async fn test_plain_text_emits_string() {
        assert_eq!(emit("hello").await, json!("hello"));
    }

    #[tokio::test]
    async fn test_json_text_emits_value() {
        assert_eq!(emit("true").await, json!(true));
        assert_eq!(emit("[1, 2]").await, json!([1, 2]));
    }
}
