//! Function-call schemas offered to the model.
//!
//! A [`FunctionSchema`] lists the arguments of one callable function and renders them as the
//! JSON schema object expected by OpenAI style function calling.
//!
//! # Example
//!
//! ```rust
//! use npcbrain::tool_schema::{Argument, FunctionSchema};
//!
//! let definition = FunctionSchema::new("wave", "Wave at someone")
//!     .with_argument(Argument::text("target").describe("Who to wave at").mandatory())
//!     .with_argument(Argument::choice("hand", ["LEFT", "RIGHT"]))
//!     .to_definition();
//!
//! assert_eq!(definition.parameters["required"][0], "target");
//! assert_eq!(definition.parameters["properties"]["hand"]["enum"][1], "RIGHT");
//! ```

use crate::npcbrain::client_wrapper::ToolDefinition;
use serde_json::{json, Map, Value};

/// Shape of a string argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentKind {
    Text,
    /// Restricted to a closed vocabulary.
    Choice(Vec<String>),
}

/// One named argument of a [`FunctionSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub kind: ArgumentKind,
    pub description: Option<String>,
    pub mandatory: bool,
}

impl Argument {
    pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Argument {
            name: name.into(),
            kind,
            description: None,
            mandatory: false,
        }
    }

    /// Free-form string argument.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::Text)
    }

    /// String argument limited to `values`.
    pub fn choice<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ArgumentKind::Choice(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The model must always supply this argument.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!("string"));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let ArgumentKind::Choice(values) = &self.kind {
            schema.insert("enum".into(), json!(values));
        }
        Value::Object(schema)
    }
}

/// A callable function: its name, what it is for and its arguments, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub purpose: String,
    pub arguments: Vec<Argument>,
}

impl FunctionSchema {
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Self {
        FunctionSchema {
            name: name.into(),
            purpose: purpose.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Render into the definition sent alongside a chat request.
    pub fn to_definition(&self) -> ToolDefinition {
        let properties: Map<String, Value> = self
            .arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.schema()))
            .collect();
        let mandatory: Vec<&str> = self
            .arguments
            .iter()
            .filter(|arg| arg.mandatory)
            .map(|arg| arg.name.as_str())
            .collect();

        ToolDefinition {
            name: self.name.clone(),
            description: self.purpose.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": mandatory,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_arguments_are_not_required() {
        let definition = FunctionSchema::new("look", "Look around")
            .with_argument(Argument::text("direction"))
            .with_argument(Argument::new("mood", ArgumentKind::Text))
            .to_definition();

        let params = &definition.parameters;
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["direction"]["type"], "string");
        assert_eq!(params["properties"]["mood"]["type"], "string");
        assert!(params["properties"]["direction"].get("description").is_none());
        assert_eq!(params["required"], json!([]));
    }

    #[test]
    fn test_choice_renders_as_enum() {
        let definition = FunctionSchema::new("pick", "Pick one")
            .with_argument(Argument::choice("choice", ["A", "B"]).mandatory())
            .to_definition();

        assert_eq!(definition.parameters["properties"]["choice"]["type"], "string");
        assert_eq!(
            definition.parameters["properties"]["choice"]["enum"],
            json!(["A", "B"])
        );
        assert_eq!(definition.parameters["required"], json!(["choice"]));
    }
}
