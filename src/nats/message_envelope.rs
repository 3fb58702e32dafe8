/// Outer message envelope
///
/// Producers wrap the contact in `{"message": <payload>}`. The payload is either
/// a JSON-encoded string or the contact object itself.

use serde_json::Value;

/// Result of unwrapping an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Inner payload as JSON text, ready for the next stage.
    Valid(String),

    /// The body is a JSON object without a non-null `message` property.
    MissingField,

    /// The body is not JSON, or not a JSON object.
    Malformed(String),
}

impl Envelope {
    /// Property that carries the business payload
    pub const FIELD: &'static str = "message";

    /// Unwrap the envelope from raw message text.
    ///
    /// A string `message` is returned as is. Any other value is serialized back
    /// to compact JSON text.
    pub fn parse(text: &str) -> Self {
        let root: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Envelope::Malformed(e.to_string()),
        };

        let mut fields = match root {
            Value::Object(fields) => fields,
            other => {
                return Envelope::Malformed(format!(
                    "expected a JSON object, got {}",
                    kind(&other)
                ))
            }
        };

        match fields.remove(Self::FIELD) {
            None | Some(Value::Null) => Envelope::MissingField,
            Some(Value::String(inner)) => Envelope::Valid(inner),
            Some(inner) => Envelope::Valid(inner.to_string()),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
