//! Field tables for request messages.
//!
//! Messages stay opaque serde values; the binder only needs to know, per
//! field path, which scalar type a raw string must be coerced into.

use serde_json::Value;

/// Scalar type of a bindable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
}

impl FieldKind {
    /// Coerce a raw path or query value into a JSON value of this kind.
    pub fn parse(self, raw: &str) -> Result<Value, String> {
        match self {
            FieldKind::String => Ok(Value::String(raw.to_string())),
            FieldKind::Bool => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("invalid bool {raw:?}, expected \"true\" or \"false\"")),
            },
            FieldKind::Int32 => raw.parse::<i32>().map(Value::from).map_err(|e| e.to_string()),
            FieldKind::Int64 => raw.parse::<i64>().map(Value::from).map_err(|e| e.to_string()),
            FieldKind::UInt32 => raw.parse::<u32>().map(Value::from).map_err(|e| e.to_string()),
            FieldKind::UInt64 => raw.parse::<u64>().map(Value::from).map_err(|e| e.to_string()),
            FieldKind::Float | FieldKind::Double => {
                let v = raw.parse::<f64>().map_err(|e| e.to_string())?;
                if !v.is_finite() {
                    return Err(format!("non-finite value {raw:?}"));
                }
                if self == FieldKind::Float && v.abs() > f32::MAX as f64 {
                    return Err(format!("value {raw:?} out of range for float"));
                }
                Ok(Value::from(v))
            }
        }
    }
}

/// One bindable field of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field path; nested fields use dots (`user.id`).
    pub name: &'static str,
    pub kind: FieldKind,
    pub repeated: bool,
}

impl FieldDescriptor {
    pub const fn scalar(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: false,
        }
    }

    pub const fn repeated(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: true,
        }
    }
}

/// Implemented by request messages so path and query values can be typed.
pub trait MessageSchema {
    /// All fields that may be bound from the URL.
    fn fields() -> &'static [FieldDescriptor];
}

/// Find a field by its dotted path.
pub fn find_field(fields: &[FieldDescriptor], name: &str) -> Option<FieldDescriptor> {
    fields.iter().copied().find(|f| f.name == name)
}
