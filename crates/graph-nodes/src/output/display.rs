//! Display node
//!
//! Sink that renders whatever arrives on its input as text. The rendered
//! string is also its output, so it shows up in the per-node completion
//! status without any extra channel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graph_engine::{
    ComputeNode, DataType, NodeDefinition, NodeFactory, NodeTemplate, Position, Result,
    ValueComponent, ValueMap,
};

/// Display sink node
pub struct DisplayNode {
    verbose: bool,
}

impl DisplayNode {
    pub const PORT_IN: &'static str = "in";
    pub const PORT_OUT: &'static str = "out";

    pub fn template() -> NodeTemplate {
        NodeTemplate::new("Display", "Display")
            .input(Self::PORT_IN, "Value", DataType::Any)
            .output(Self::PORT_OUT, "Rendered", DataType::String)
            .value(
                "verbose",
                "Verbose",
                ValueComponent::Checkbox { default: false },
            )
    }

    pub fn factory() -> Arc<dyn NodeFactory> {
        Arc::new(DisplayFactory)
    }
}

struct DisplayFactory;

impl NodeFactory for DisplayFactory {
    fn instantiate(&self, values: &ValueMap, _position: Position) -> Result<Box<dyn ComputeNode>> {
        let verbose = values
            .get("verbose")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Box::new(DisplayNode { verbose }))
    }
}

inventory::submit!(NodeDefinition {
    template: DisplayNode::template,
    factory: DisplayNode::factory,
});

#[async_trait]
impl ComputeNode for DisplayNode {
    async fn call(
        &self,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        let value = inputs
            .get(Self::PORT_IN)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let rendered = if self.verbose {
            serde_json::to_string_pretty(&value)?
        } else {
            match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }
        };
        log::debug!("display: {}", rendered);
        Ok(HashMap::from([(
            Self::PORT_OUT.to_string(),
            serde_json::Value::String(rendered),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn display(verbose: bool, input: serde_json::Value) -> String {
        let mut values = ValueMap::new();
        values.insert("verbose".to_string(), json!(verbose));
        let node = DisplayNode::factory()
            .instantiate(&values, Position::default())
            .unwrap();
        let inputs = HashMap::from([(DisplayNode::PORT_IN.to_string(), input)]);
        let mut outputs = node.call(inputs).await.unwrap();
        outputs
            .remove("out")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap()
    }

    #[tokio::test]
    async fn test_renders_strings_bare() {
        assert_eq!(display(false, json!("hello")).await, "hello");
    }

    #[tokio::test]
    async fn test_renders_values_compact() {
        assert_eq!(display(false, json!({"a": 1})).await, r#"{"a":1}"#);
        assert_eq!(display(false, json!(2.5)).await, "2.5");
    }

    #[tokio::test]
    async fn test_verbose_pretty_prints() {
        let rendered = display(true, json!({"a": 1})).await;
        assert!(rendered.contains('\n'));
        assert!(rendered.contains("\"a\": 1"));
    }

    #[tokio::test]
    async fn test_missing_input_renders_null() {
        let node = DisplayNode::factory()
            .instantiate(&ValueMap::new(), Position::default())
            .unwrap();
        let mut outputs = node.call(HashMap::new()).await.unwrap();
        assert_eq!(outputs.remove("out").unwrap(), json!("null"));
    }
}
