//! Arithmetic on two operands.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Params, Tool, ToolMetadata};

pub struct Calculator {
    meta: ToolMetadata,
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            meta: ToolMetadata::new(
                "calculator",
                "Performs arithmetic (add, subtract, multiply, divide) on two numbers",
            )
            .with_capabilities(["math"])
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["add", "subtract", "multiply", "divide"]
                    },
                    "a": { "type": "number" },
                    "b": { "type": "number" },
                    "operands": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "Alternative to a/b: exactly two numbers"
                    }
                },
                "required": ["operation"]
            }))
            .synchronous()
            .with_cost_estimate("low"),
        }
    }

    fn operands(params: &Params) -> Result<(f64, f64), String> {
        if let Some(list) = params.get("operands").and_then(Value::as_array) {
            return match list.as_slice() {
                [a, b] => match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => Ok((a, b)),
                    _ => Err("operands must be numbers".to_string()),
                },
                _ => Err(format!("expected 2 operands, got {}", list.len())),
            };
        }

        match (number(params.get("a")), number(params.get("b"))) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err("missing numeric 'a' and 'b'".to_string()),
        }
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept numbers and numeric strings (planners often quote them).
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn operation(params: &Params) -> Option<&'static str> {
    let op = params.get("operation")?.as_str()?.trim().to_lowercase();
    match op.as_str() {
        "add" | "plus" | "sum" | "+" => Some("add"),
        "subtract" | "minus" | "sub" | "-" => Some("subtract"),
        "multiply" | "times" | "mul" | "*" => Some("multiply"),
        "divide" | "div" | "/" => Some("divide"),
        _ => None,
    }
}

/// Integral results are reported as JSON integers (`5`, not `5.0`).
fn to_json(result: f64) -> Value {
    if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        json!(result as i64)
    } else {
        json!(result)
    }
}

#[async_trait]
impl Tool for Calculator {
    fn metadata(&self) -> &ToolMetadata {
        &self.meta
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        if operation(params).is_none() {
            return Err("operation must be one of add, subtract, multiply, divide".to_string());
        }
        Self::operands(params).map(|_| ())
    }

    async fn execute(&self, params: &Params) -> anyhow::Result<Value> {
        let op = operation(params).ok_or_else(|| anyhow::anyhow!("unknown operation"))?;
        let (a, b) = Self::operands(params).map_err(|e| anyhow::anyhow!(e))?;

        let result = match op {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    anyhow::bail!("division by zero");
                }
                a / b
            }
            _ => anyhow::bail!("unknown operation: {}", op),
        };

        Ok(to_json(result))
    }
}
