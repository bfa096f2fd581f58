//! Arithmetic tools.
//!
//! `calculator` takes an `operation` name plus `x` and `y`; the arithmetic
//! toolkit exposes one two-argument tool per operation.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::tool::{Tool, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "subtract" => Some(Self::Subtract),
            "multiply" => Some(Self::Multiply),
            "divide" => Some(Self::Divide),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Add => "Add two numbers.",
            Self::Subtract => "Subtract the second number from the first.",
            Self::Multiply => "Multiply two numbers.",
            Self::Divide => "Divide the first number by the second.",
        }
    }

    /// Text result, or the divide-by-zero message.
    fn apply(self, x: f64, y: f64) -> String {
        let value = match self {
            Self::Add => x + y,
            Self::Subtract => x - y,
            Self::Multiply => x * y,
            Self::Divide if y == 0.0 => return "Cannot divide by zero".to_string(),
            Self::Divide => x / y,
        };
        format_number(value)
    }
}

/// Whole numbers print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// `{operation, x, y}` calculator.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform basic math operations: add, subtract, multiply, divide"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"]
                },
                "x": {"type": "number"},
                "y": {"type": "number"}
            },
            "required": ["operation", "x", "y"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let operation = input
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Protocol("missing `operation` for calculator".into()))?;
        let x = get_number(&input, "x", "calculator")?;
        let y = get_number(&input, "y", "calculator")?;

        let text = match Operation::parse(operation) {
            Some(op) => op.apply(x, y),
            None => "Unknown operation".to_string(),
        };
        Ok(Value::String(text))
    }
}

struct ArithmeticTool {
    op: Operation,
}

#[async_trait]
impl Tool for ArithmeticTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["a", "b"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let a = get_number(&input, "a", self.op.name())?;
        let b = get_number(&input, "b", self.op.name())?;
        Ok(Value::String(self.op.apply(a, b)))
    }
}

/// `add`, `subtract`, `multiply`, `divide`, each taking `{a, b}`.
pub fn arithmetic_toolkit() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for op in [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ] {
        registry.register(ArithmeticTool { op });
    }
    registry
}

// Models sometimes send numbers as strings ("12"), so accept both.
fn get_number(input: &Value, field: &str, tool_name: &str) -> Result<f64> {
    let value = input
        .get(field)
        .ok_or_else(|| EngineError::Protocol(format!("missing `{field}` for {tool_name}")))?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| EngineError::Protocol(format!("`{field}` for {tool_name} is not a number")))
}
