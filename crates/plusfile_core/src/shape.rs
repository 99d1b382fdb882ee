//! Shape assertions over untyped JSON values.

use serde_json::Value;

use crate::error::{CoreError, Result};

/// Expected type of an object property, as checked by [`has_prop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    Boolean,
    Number,
    String,
    /// A JSON object (never null, never an array).
    Object,
    Array,
    /// An array whose elements are all strings.
    StringArray,
    Null,
    /// The property is absent.
    Undefined,
    /// Any present value.
    Unknown,
}

/// Returns true iff `value` is a JSON object.
pub fn is_object(value: &Value) -> bool {
    value.is_object()
}

/// Returns whether `value` is an object holding `key` with a value of type `expected`.
///
/// An absent key satisfies [`PropType::Undefined`] and nothing else.
pub fn has_prop(value: &Value, key: &str, expected: PropType) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    let Some(prop) = object.get(key) else {
        return expected == PropType::Undefined;
    };

    match expected {
        PropType::Boolean => prop.is_boolean(),
        PropType::Number => prop.is_number(),
        PropType::String => prop.is_string(),
        PropType::Object => is_object(prop),
        PropType::Array => prop.is_array(),
        PropType::StringArray => prop
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        PropType::Null => prop.is_null(),
        PropType::Undefined => false,
        PropType::Unknown => true,
    }
}

/// Fails with [`CoreError::Internal`] when `condition` is false.
pub fn assert_invariant(condition: bool, context: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(CoreError::Internal(context.into()))
    }
}

/// Fails with a user-facing [`CoreError::Usage`] when `condition` is false.
pub fn assert_usage(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(CoreError::Usage(message.into()))
    }
}
