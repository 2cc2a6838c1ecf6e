//! Node templates: the static, per-type schema
//!
//! A template declares a node type's input and output ports and its editable
//! values. Templates are immutable after registration and shared by every
//! instance of the type; the read endpoint serves them to clients for UI
//! generation and value validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{GraphEngineError, Result};
use crate::types::{DataType, ValueMap};

/// Schema of a single input or output port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSchema {
    /// Human-readable label
    pub name: String,
    /// Data type of the port
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// Schema of a single editable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSchema {
    /// Human-readable label
    pub name: String,
    /// UI component rendering this value
    pub component: ValueComponent,
}

/// UI component vocabulary for editable values
///
/// Tagged by a `type` field carrying the component name, e.g.
/// `{"type": "Checkbox", "default": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValueComponent {
    Checkbox {
        default: bool,
    },
    FileDropdown {
        /// Path segments below the data directory to list
        directory: Vec<String>,
    },
    FloatSlider {
        default: f64,
        minimum: f64,
        maximum: f64,
        step: f64,
    },
    TextBox {
        default: String,
        placeholder: String,
        maxlen: u32,
        regex: String,
    },
}

impl ValueComponent {
    /// The initial value for a fresh node, if the component declares one
    pub fn default_value(&self) -> Option<serde_json::Value> {
        match self {
            Self::Checkbox { default } => Some(json!(default)),
            Self::FloatSlider { default, .. } => Some(json!(default)),
            Self::TextBox { default, .. } => Some(json!(default)),
            Self::FileDropdown { .. } => None,
        }
    }
}

/// Complete schema for a node type
///
/// Maps are ordered so the serialized template is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    /// Unique type identifier (e.g., "Constant")
    pub node_type: String,
    /// Human-readable label
    pub label: String,
    /// Input port schemas, keyed by port id
    pub inputs: BTreeMap<String, PortSchema>,
    /// Output port schemas, keyed by port id
    pub outputs: BTreeMap<String, PortSchema>,
    /// Value schemas, keyed by value name
    pub values: BTreeMap<String, ValueSchema>,
}

impl NodeTemplate {
    /// Create an empty template for a type
    pub fn new(node_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            label: label.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    /// Declare an input port
    pub fn input(
        mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        self.inputs.insert(
            id.into(),
            PortSchema {
                name: label.into(),
                data_type,
            },
        );
        self
    }

    /// Declare an output port
    pub fn output(
        mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        self.outputs.insert(
            id.into(),
            PortSchema {
                name: label.into(),
                data_type,
            },
        );
        self
    }

    /// Declare an editable value
    pub fn value(
        mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        component: ValueComponent,
    ) -> Self {
        self.values.insert(
            id.into(),
            ValueSchema {
                name: label.into(),
                component,
            },
        );
        self
    }

    /// The initial value map for a fresh node of this type
    pub fn default_values(&self) -> ValueMap {
        let mut values = ValueMap::new();
        for (id, schema) in &self.values {
            if let Some(default) = schema.component.default_value() {
                values.insert(id.clone(), default);
            }
        }
        values
    }

    /// Check that every provided value name is declared by this template
    pub fn validate_values(&self, values: &ValueMap) -> Result<()> {
        for name in values.keys() {
            if !self.values.contains_key(name) {
                return Err(GraphEngineError::UnknownValue {
                    node_type: self.node_type.clone(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider() -> ValueComponent {
        ValueComponent::FloatSlider {
            default: 1.0,
            minimum: 0.0,
            maximum: 10.0,
            step: 0.5,
        }
    }

    #[test]
    fn test_template_builder() {
        let template = NodeTemplate::new("Blend", "Blend")
            .input("a", "A", DataType::Number)
            .input("b", "B", DataType::Number)
            .output("out", "Out", DataType::Number)
            .value("ratio", "Ratio", slider());

        assert_eq!(template.inputs.len(), 2);
        assert_eq!(template.outputs["out"].data_type, DataType::Number);
        assert_eq!(template.values["ratio"].name, "Ratio");
    }

    #[test]
    fn test_component_tagged_serialization() {
        let json = serde_json::to_value(ValueComponent::Checkbox { default: true }).unwrap();
        assert_eq!(json["type"], "Checkbox");
        assert_eq!(json["default"], true);

        let json = serde_json::to_value(ValueComponent::FileDropdown {
            directory: vec!["models".to_string(), "configs".to_string()],
        })
        .unwrap();
        assert_eq!(json["type"], "FileDropdown");
        assert_eq!(json["directory"][1], "configs");
    }

    #[test]
    fn test_default_values() {
        let template = NodeTemplate::new("Mixed", "Mixed")
            .value("enabled", "Enabled", ValueComponent::Checkbox { default: false })
            .value("ratio", "Ratio", slider())
            .value(
                "file",
                "File",
                ValueComponent::FileDropdown { directory: vec![] },
            );

        let defaults = template.default_values();
        assert_eq!(defaults["enabled"], json!(false));
        assert_eq!(defaults["ratio"], json!(1.0));
        // FileDropdown declares no default.
        assert!(!defaults.contains_key("file"));
    }

    #[test]
    fn test_validate_values_rejects_unknown() {
        let template = NodeTemplate::new("Blend", "Blend").value("ratio", "Ratio", slider());

        let mut values = ValueMap::new();
        values.insert("ratio".to_string(), json!(0.5));
        assert!(template.validate_values(&values).is_ok());

        values.insert("bogus".to_string(), json!(1));
        let err = template.validate_values(&values).unwrap_err();
        assert!(matches!(
            err,
            GraphEngineError::UnknownValue { ref name, .. } if name == "bogus"
        ));
    }

    #[test]
    fn test_template_wire_shape() {
        let template = NodeTemplate::new("Blend", "Blend")
            .input("a", "A", DataType::Number)
            .value("ratio", "Ratio", slider());

        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["nodeType"], "Blend");
        assert_eq!(json["inputs"]["a"]["type"], "number");
        assert_eq!(json["values"]["ratio"]["component"]["type"], "FloatSlider");
    }
}
