//! Attribute types: the value-level building blocks of a page type blueprint.
//!
//! Each attribute type turns a submitted JSON value into its canonical stored
//! form (or a message explaining why it can't), decides what counts as empty
//! for required checks, and renders a stored value as plain text.

use serde_json::Value;

/// Maximum length of a single-line text value, in characters.
pub const MAX_TEXTLINE_LENGTH: usize = 255;

/// Capability interface for one kind of attribute value.
pub trait AttributeType: Send + Sync {
    /// Identifier referenced from blueprints (`"textline"`).
    fn identifier(&self) -> &str;

    /// Canonicalise a submitted value, or explain why it is invalid.
    /// A missing value arrives as [`Value::Null`].
    fn validate(&self, value: &Value) -> Result<Value, String>;

    /// Whether a canonical value is "empty" for the purpose of required
    /// checks.
    fn is_empty(&self, value: &Value) -> bool;

    /// Plain-text rendering of a canonical value.
    fn render(&self, value: &Value) -> String;
}

/// Single line of text, trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLine;

impl AttributeType for TextLine {
    fn identifier(&self) -> &str {
        "textline"
    }

    fn validate(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::String(String::new())),
            Value::String(s) => {
                if s.contains('\n') {
                    return Err("Must be a single line of text".to_string());
                }
                let trimmed = s.trim();
                if trimmed.chars().count() > MAX_TEXTLINE_LENGTH {
                    return Err(format!(
                        "Must not exceed {MAX_TEXTLINE_LENGTH} characters"
                    ));
                }
                Ok(Value::String(trimmed.to_string()))
            }
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err("Must be text".to_string()),
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        value.as_str().map_or(true, |s| s.trim().is_empty())
    }

    fn render(&self, value: &Value) -> String {
        value.as_str().unwrap_or_default().to_string()
    }
}

/// Free-form multi-line text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextArea;

impl AttributeType for TextArea {
    fn identifier(&self) -> &str {
        "textarea"
    }

    fn validate(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::String(String::new())),
            Value::String(s) => Ok(Value::String(s.replace("\r\n", "\n"))),
            _ => Err("Must be text".to_string()),
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        value.as_str().map_or(true, |s| s.trim().is_empty())
    }

    fn render(&self, value: &Value) -> String {
        value.as_str().unwrap_or_default().to_string()
    }
}

/// Checkbox. Form posts send `"yes"` when ticked and nothing otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl AttributeType for Boolean {
    fn identifier(&self) -> &str {
        "boolean"
    }

    fn validate(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Bool(false)),
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err("Must be yes or no".to_string()),
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "yes" | "true" | "on" | "1" => Ok(Value::Bool(true)),
                "no" | "false" | "off" | "0" | "" => Ok(Value::Bool(false)),
                _ => Err("Must be yes or no".to_string()),
            },
            _ => Err("Must be yes or no".to_string()),
        }
    }

    /// An unticked box does not satisfy "required".
    fn is_empty(&self, value: &Value) -> bool {
        !value.as_bool().unwrap_or(false)
    }

    fn render(&self, value: &Value) -> String {
        if value.as_bool().unwrap_or(false) {
            "yes".to_string()
        } else {
            "no".to_string()
        }
    }
}

/// Whole number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

impl AttributeType for Integer {
    fn identifier(&self) -> &str {
        "integer"
    }

    fn validate(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| "Must be a whole number".to_string()),
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "Must be a whole number".to_string()),
            _ => Err("Must be a whole number".to_string()),
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        value.is_null()
    }

    fn render(&self, value: &Value) -> String {
        value.as_i64().map(|n| n.to_string()).unwrap_or_default()
    }
}
