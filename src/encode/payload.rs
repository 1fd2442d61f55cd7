//! Loggable value model
//!
//! `Payload` is the arbitrary value handed to the pipeline. Objects are
//! shared by reference (`ObjectRef`), so a payload can describe any object
//! graph, including one that refers back to itself. Conversion to JSON
//! (`to_json`) replaces such back references with a `[Circular ~.path]`
//! marker instead of recursing.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// Arbitrary application-supplied value
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Payload>),
    Object(ObjectRef),
    Error(ErrorPayload),
}

/// Shared, mutable object node
///
/// Cloning an `ObjectRef` clones the handle, not the fields. Two handles
/// that point at the same node are the same reference for cycle detection.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<Vec<(String, Payload)>>>);

// Shallow: a node may contain itself
impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &self.id())
            .field("fields", &self.len())
            .finish()
    }
}

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an existing field of the same name in place
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Payload>) {
        let key = key.into();
        let value = value.into();
        let mut fields = self.0.write();
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => fields.push((key, value)),
        }
    }

    /// Builder-style `insert`
    pub fn with(self, key: impl Into<String>, value: impl Into<Payload>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove every field (breaks any cycle running through this node)
    pub fn clear(&self) {
        self.0.write().clear();
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    #[inline]
    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Error-like value: message, optional stack, extra own fields
#[derive(Debug, Clone, Default)]
pub struct ErrorPayload {
    pub message: String,
    pub stack: Option<String>,
    pub fields: Vec<(String, Payload)>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Payload>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

impl Payload {
    /// Build an error payload from a Rust error and its `source()` chain
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut error = ErrorPayload::new(err.to_string());

        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        if !causes.is_empty() {
            error.stack = Some(causes.join("\n"));
        }

        Payload::Error(error)
    }

    /// Build a payload from any serializable value
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => v.into(),
            Err(e) => Payload::String(format!("unserializable value: {}", e)),
        }
    }

    /// True for values that are not objects, arrays or errors
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Payload::Array(_) | Payload::Object(_) | Payload::Error(_)
        )
    }

    /// Plain textual form of a primitive (`None` for composite values)
    pub fn primitive_text(&self) -> Option<String> {
        let text = match self {
            Payload::Undefined => "undefined".to_string(),
            Payload::Null => "null".to_string(),
            Payload::Bool(b) => b.to_string(),
            Payload::Int(i) => i.to_string(),
            Payload::Float(f) => format_float(*f),
            Payload::String(s) => s.clone(),
            _ => return None,
        };
        Some(text)
    }

    /// Convert to a JSON tree, replacing cycles with back-reference markers
    ///
    /// `Undefined` becomes `None` at the top level, is omitted as an object
    /// field and becomes `null` inside arrays.
    pub fn to_json(&self) -> Option<Value> {
        let mut ancestors = Vec::new();
        to_json_inner(self, "", &mut ancestors)
    }
}

fn to_json_inner(value: &Payload, path: &str, ancestors: &mut Vec<(usize, String)>) -> Option<Value> {
    let json = match value {
        Payload::Undefined => return None,
        Payload::Null => Value::Null,
        Payload::Bool(b) => Value::Bool(*b),
        Payload::Int(i) => Value::Number((*i).into()),
        Payload::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Payload::String(s) => Value::String(s.clone()),
        Payload::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    to_json_inner(item, &child_path(path, &i.to_string()), ancestors)
                        .unwrap_or(Value::Null)
                })
                .collect(),
        ),
        Payload::Object(obj) => {
            let id = obj.id();
            if let Some((_, seen)) = ancestors.iter().find(|(a, _)| *a == id) {
                return Some(Value::String(circular_marker(seen)));
            }

            ancestors.push((id, path.to_string()));
            let mut map = Map::new();
            for (key, field) in obj.0.read().iter() {
                if let Some(v) = to_json_inner(field, &child_path(path, key), ancestors) {
                    map.insert(key.clone(), v);
                }
            }
            ancestors.pop();
            Value::Object(map)
        }
        Payload::Error(err) => {
            let mut map = Map::new();
            for (key, field) in &err.fields {
                if let Some(v) = to_json_inner(field, &child_path(path, key), ancestors) {
                    map.insert(key.clone(), v);
                }
            }
            map.insert("message".into(), Value::String(err.message.clone()));
            if let Some(stack) = &err.stack {
                map.insert("stack".into(), Value::String(stack.clone()));
            }
            Value::Object(map)
        }
    };
    Some(json)
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn circular_marker(path: &str) -> String {
    if path.is_empty() {
        "[Circular ~]".to_string()
    } else {
        format!("[Circular ~.{}]", path)
    }
}

/// Integral floats print without a fraction, like the numbers they denote
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::String(s)
    }
}

impl From<&String> for Payload {
    fn from(s: &String) -> Self {
        Payload::String(s.clone())
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

macro_rules! payload_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Payload {
            fn from(i: $t) -> Self {
                Payload::Int(i as i64)
            }
        })*
    };
}

payload_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Payload {
    fn from(f: f64) -> Self {
        Payload::Float(f)
    }
}

impl From<f32> for Payload {
    fn from(f: f32) -> Self {
        Payload::Float(f as f64)
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Null
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Payload::Undefined, Into::into)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(items: Vec<T>) -> Self {
        Payload::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<ObjectRef> for Payload {
    fn from(obj: ObjectRef) -> Self {
        Payload::Object(obj)
    }
}

impl From<ErrorPayload> for Payload {
    fn from(err: ErrorPayload) -> Self {
        Payload::Error(err)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Payload::Int(i),
                None => Payload::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                let obj = ObjectRef::new();
                for (k, v) in map {
                    obj.insert(k, Payload::from(v));
                }
                Payload::Object(obj)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitive_text() {
        assert_eq!(Payload::Undefined.primitive_text().unwrap(), "undefined");
        assert_eq!(Payload::Null.primitive_text().unwrap(), "null");
        assert_eq!(Payload::from(true).primitive_text().unwrap(), "true");
        assert_eq!(Payload::from(42).primitive_text().unwrap(), "42");
        assert_eq!(Payload::from(1.5).primitive_text().unwrap(), "1.5");
        assert_eq!(Payload::from(3.0).primitive_text().unwrap(), "3");
        assert!(Payload::Array(vec![]).primitive_text().is_none());
    }

    #[test]
    fn test_self_reference_becomes_marker() {
        let obj = ObjectRef::new().with("name", "root");
        obj.insert("self", obj.clone());

        let json = Payload::Object(obj.clone()).to_json().unwrap();
        assert_eq!(json, json!({"name": "root", "self": "[Circular ~]"}));

        obj.clear();
    }

    #[test]
    fn test_nested_cycle_marker_has_path() {
        let root = ObjectRef::new();
        let child = ObjectRef::new();
        child.insert("back", child.clone());
        root.insert("a", child.clone());

        let json = Payload::Object(root).to_json().unwrap();
        assert_eq!(json, json!({"a": {"back": "[Circular ~.a]"}}));

        child.clear();
    }

    #[test]
    fn test_shared_sibling_is_not_circular() {
        let shared = ObjectRef::new().with("v", 1);
        let root = ObjectRef::new().with("x", shared.clone()).with("y", shared);

        let json = Payload::Object(root).to_json().unwrap();
        assert_eq!(json, json!({"x": {"v": 1}, "y": {"v": 1}}));
    }

    #[test]
    fn test_undefined_fields_omitted_and_array_slots_null() {
        let obj = ObjectRef::new()
            .with("gone", Payload::Undefined)
            .with("list", vec![Payload::Undefined, Payload::from(1)]);

        let json = Payload::Object(obj).to_json().unwrap();
        assert_eq!(json, json!({"list": [null, 1]}));
    }

    #[test]
    fn test_error_flattening_keeps_fields_message_and_stack() {
        let err = ErrorPayload::new("boom")
            .with_stack("at main")
            .with_field("code", 7);

        let json = Payload::Error(err).to_json().unwrap();
        assert_eq!(json, json!({"code": 7, "message": "boom", "stack": "at main"}));
    }

    #[test]
    fn test_from_error_collects_source_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "outer failed")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        match Payload::from_error(&err) {
            Payload::Error(e) => {
                assert_eq!(e.message, "outer failed");
                assert_eq!(e.stack.as_deref(), Some("caused by: disk gone"));
            }
            other => panic!("Expected Error payload, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_value_keeps_key_order() {
        let payload = Payload::from(json!({"b": 1, "a": [true, null]}));
        let text = serde_json::to_string(&payload.to_json().unwrap()).unwrap();
        assert_eq!(text, r#"{"b":1,"a":[true,null]}"#);
    }

    #[test]
    fn test_insert_replaces_existing_key() {
        let obj = ObjectRef::new().with("k", 1);
        obj.insert("k", 2);
        assert_eq!(obj.len(), 1);
        assert_eq!(Payload::Object(obj).to_json().unwrap(), json!({"k": 2}));
    }

    #[derive(Serialize)]
    struct Request<'a> {
        method: &'a str,
        path: &'a str,
        status: u16,
        cached: Option<bool>,
    }

    #[test]
    fn test_from_serialize_struct() {
        let request = Request {
            method: "GET",
            path: "/health",
            status: 200,
            cached: None,
        };

        let payload = Payload::from_serialize(&request);
        assert!(matches!(payload, Payload::Object(_)));
        assert_eq!(
            payload.to_json().unwrap(),
            json!({"method": "GET", "path": "/health", "status": 200, "cached": null})
        );
    }

    #[test]
    fn test_from_serialize_failure_becomes_text() {
        // JSON object keys must be strings
        let mut by_pair = std::collections::BTreeMap::new();
        by_pair.insert((1u8, 2u8), "x");

        match Payload::from_serialize(&by_pair) {
            Payload::String(text) => assert!(text.starts_with("unserializable value: ")),
            other => panic!("Expected String payload, got {:?}", other),
        }
    }
}
