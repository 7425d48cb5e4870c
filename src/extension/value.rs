//! Runtime values injected into invocations, and the declared types they are checked against.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use trellis_core::UniqueId;

/// Declared type of a formal input.
///
/// `Number` and `Any` are abstract: no runtime value reports them as its own type, they only widen what a
/// declaration accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Number,
    Int,
    Float,
    Str,
    Bool,
    TestInfo,
    Custom(String),
}

impl ValueType {
    pub fn custom(name: impl Into<String>) -> Self {
        ValueType::Custom(name.into())
    }

    /// Whether a value whose runtime type is `runtime` may be bound to an input declared as `self`.
    pub fn is_assignable_from(&self, runtime: &ValueType) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Number => matches!(runtime, ValueType::Int | ValueType::Float | ValueType::Number),
            declared => declared == runtime,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "Any"),
            ValueType::Number => write!(f, "Number"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Float => write!(f, "Float"),
            ValueType::Str => write!(f, "Str"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::TestInfo => write!(f, "TestInfo"),
            ValueType::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Display name and identity of the node an invocation belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInfo {
    pub display_name: String,
    pub unique_id: UniqueId,
    pub tags: BTreeSet<String>,
}

/// A value of a user-defined type, tagged with its type name.
#[derive(Clone)]
pub struct CustomValue {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValue({})", self.type_name)
    }
}

/// A value produced by a parameter resolver.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    TestInfo(TestInfo),
    Custom(CustomValue),
}

impl Value {
    pub fn custom<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Value::Custom(CustomValue::new(type_name, value))
    }

    /// The concrete runtime type; never `Any` or `Number`.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Bool(_) => ValueType::Bool,
            Value::TestInfo(_) => ValueType::TestInfo,
            Value::Custom(c) => ValueType::Custom(c.type_name.clone()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_test_info(&self) -> Option<&TestInfo> {
        match self {
            Value::TestInfo(info) => Some(info),
            _ => None,
        }
    }

    pub fn downcast_custom<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Custom(c) => c.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ========================================
    // Assignability
    // ========================================

    #[test]
    fn test_number_accepts_int_and_float() {
        assert!(ValueType::Number.is_assignable_from(&ValueType::Int));
        assert!(ValueType::Number.is_assignable_from(&ValueType::Float));
        assert!(!ValueType::Number.is_assignable_from(&ValueType::Str));
    }

    #[test]
    fn test_float_rejects_int() {
        assert!(!ValueType::Float.is_assignable_from(&ValueType::Int));
        assert!(ValueType::Int.is_assignable_from(&ValueType::Int));
    }

    #[test]
    fn test_custom_matches_by_name() {
        let declared = ValueType::custom("CustomType");
        assert!(declared.is_assignable_from(&ValueType::custom("CustomType")));
        assert!(!declared.is_assignable_from(&ValueType::custom("OtherType")));
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(ValueType::Any.is_assignable_from(&ValueType::TestInfo));
        assert!(ValueType::Any.is_assignable_from(&ValueType::custom("X")));
    }

    // ========================================
    // Values
    // ========================================

    #[test]
    fn test_value_type_of_custom() {
        let v = Value::custom("CustomType", 7u8);
        assert_eq!(v.value_type(), ValueType::custom("CustomType"));
        assert_eq!(v.downcast_custom::<u8>(), Some(&7));
        assert_eq!(v.downcast_custom::<u16>(), None);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(42i64).as_int(), Some(42));
        assert_eq!(Value::from(1.5f64).as_float(), Some(1.5));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(42i64).as_float(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ValueType::Int.to_string(), "Int");
        assert_eq!(ValueType::custom("CustomType").to_string(), "CustomType");
    }
}
