//! Arithmetic node
//!
//! Applies one of four operations to two numbers. Each input port has a
//! slider value as its fallback, used when the port is not connected.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graph_engine::{
    ComputeNode, DataType, GraphEngineError, NodeDefinition, NodeFactory, NodeTemplate, Position,
    Result, ValueComponent, ValueMap,
};

/// Binary arithmetic node
pub struct ArithmeticNode {
    operation: String,
    fallback_a: f64,
    fallback_b: f64,
}

impl ArithmeticNode {
    pub const PORT_A: &'static str = "a";
    pub const PORT_B: &'static str = "b";
    pub const PORT_OUT: &'static str = "out";

    pub fn template() -> NodeTemplate {
        let operand = || ValueComponent::FloatSlider {
            default: 0.0,
            minimum: -100.0,
            maximum: 100.0,
            step: 0.1,
        };
        NodeTemplate::new("Arithmetic", "Arithmetic")
            .input(Self::PORT_A, "A", DataType::Number)
            .input(Self::PORT_B, "B", DataType::Number)
            .output(Self::PORT_OUT, "Result", DataType::Number)
            .value(Self::PORT_A, "A", operand())
            .value(Self::PORT_B, "B", operand())
            .value(
                "operation",
                "Operation",
                ValueComponent::TextBox {
                    default: "add".to_string(),
                    placeholder: "add | sub | mul | div".to_string(),
                    maxlen: 3,
                    regex: "add|sub|mul|div".to_string(),
                },
            )
    }

    pub fn factory() -> Arc<dyn NodeFactory> {
        Arc::new(ArithmeticFactory)
    }

    fn operand(
        &self,
        inputs: &HashMap<String, serde_json::Value>,
        port: &str,
        fallback: f64,
    ) -> Result<f64> {
        match inputs.get(port) {
            Some(value) => value.as_f64().ok_or_else(|| {
                GraphEngineError::failed(format!("Input `{}` is not a number", port))
            }),
            None => Ok(fallback),
        }
    }
}

struct ArithmeticFactory;

impl NodeFactory for ArithmeticFactory {
    fn instantiate(&self, values: &ValueMap, _position: Position) -> Result<Box<dyn ComputeNode>> {
        Ok(Box::new(ArithmeticNode {
            operation: values
                .get("operation")
                .and_then(|v| v.as_str())
                .unwrap_or("add")
                .to_string(),
            fallback_a: values.get("a").and_then(|v| v.as_f64()).unwrap_or(0.0),
            fallback_b: values.get("b").and_then(|v| v.as_f64()).unwrap_or(0.0),
        }))
    }
}

inventory::submit!(NodeDefinition {
    template: ArithmeticNode::template,
    factory: ArithmeticNode::factory,
});

#[async_trait]
impl ComputeNode for ArithmeticNode {
    async fn call(
        &self,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        let a = self.operand(&inputs, Self::PORT_A, self.fallback_a)?;
        let b = self.operand(&inputs, Self::PORT_B, self.fallback_b)?;

        let result = match self.operation.as_str() {
            "add" => a + b,
            "sub" => a - b,
            "mul" => a * b,
            "div" => {
                if b == 0.0 {
                    return Err(GraphEngineError::failed("Division by zero"));
                }
                a / b
            }
            other => {
                return Err(GraphEngineError::failed(format!(
                    "Unknown operation `{}`",
                    other
                )));
            }
        };

        Ok(HashMap::from([(
            Self::PORT_OUT.to_string(),
            serde_json::json!(result),
        )]))
    }
}
