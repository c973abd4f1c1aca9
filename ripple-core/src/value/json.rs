//! JSON conversion for building and snapshotting state.
//!
//! Serialization reads raw contents and never tracks; refs serialize their
//! held value. Symbols, functions, weak collections and promises have no
//! JSON form and fail serialization, as does a container that contains
//! itself.

use std::cell::RefCell;
use std::collections::HashSet;

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::object::Data;
use super::{Object, ObjectId, Value};
use crate::error::{ReactiveError, Result};
use crate::reactive::untracked;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Symbol(s) => Err(S::Error::custom(format!("cannot serialize {s}"))),
            Value::Function(_) => Err(S::Error::custom("cannot serialize a function")),
            Value::Object(object) => object.serialize(serializer),
            Value::Reactive(reactive) => reactive.raw().serialize(serializer),
            Value::Ref(cell) => untracked(|| cell.value()).serialize(serializer),
        }
    }
}

thread_local! {
    /// Containers currently being serialized on this thread.
    static IN_PROGRESS: RefCell<HashSet<ObjectId>> = RefCell::new(HashSet::new());
}

/// Marks a container as being serialized until dropped.
struct Visit(ObjectId);

impl Visit {
    /// Returns `None` if the container is already being serialized.
    fn enter(id: ObjectId) -> Option<Self> {
        IN_PROGRESS
            .with(|open| open.borrow_mut().insert(id))
            .then_some(Visit(id))
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        IN_PROGRESS.with(|open| open.borrow_mut().remove(&self.0));
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let Some(_visit) = Visit::enter(self.id()) else {
            return Err(S::Error::custom("cyclic structure"));
        };
        match &*self.data() {
            Data::Record(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(&key.to_string(), value)?;
                }
                out.end()
            }
            Data::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for index in 0..items.len() {
                    out.serialize_element(items.get(index).unwrap_or(&Value::Null))?;
                }
                out.end()
            }
            Data::Map(map) => {
                let mut out = serializer.serialize_seq(Some(map.len()))?;
                for pair in map {
                    out.serialize_element(&pair)?;
                }
                out.end()
            }
            Data::Set(set) => {
                let mut out = serializer.serialize_seq(Some(set.len()))?;
                for value in set {
                    out.serialize_element(value)?;
                }
                out.end()
            }
            Data::Date(millis) => serializer.serialize_f64(*millis),
            Data::RegExp(source) => serializer.serialize_str(source),
            other => Err(S::Error::custom(format!("cannot serialize a {}", other.shape()))),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::Object(Object::array(items.into_iter().map(Value::from))),
            Json::Object(map) => Value::Object(Object::from_entries(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl Value {
    /// Parse JSON text into fresh raw containers.
    pub fn from_json(text: &str) -> Result<Value> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ReactiveError::Json(e.to_string()))?;
        Ok(Value::from(json))
    }

    /// Snapshot the value as JSON without tracking.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| ReactiveError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_state() {
        let value = Value::from_json(r#"{"a": 1, "list": [true, null, "x"]}"#).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.get("a"), Value::from(1));
        let list = object.get("list");
        let list = list.as_object().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(2), Value::from("x"));
    }

    #[test]
    fn snapshot_keeps_holes_and_collections() {
        let arr = Object::array([1, 2]);
        arr.set(3, 4);
        assert_eq!(Value::from(&arr).to_json().unwrap(), json!([1, 2, null, 4]));

        let map = Object::map_from([("k", 1)]);
        assert_eq!(Value::from(map).to_json().unwrap(), json!([["k", 1]]));
    }

    #[test]
    fn functions_cannot_be_serialized() {
        let f = Value::from(crate::value::Function::new(|_| Value::Undefined));
        assert!(matches!(f.to_json(), Err(ReactiveError::Json(_))));
    }

    #[test]
    fn self_containing_record_is_an_error() {
        let record = Object::record();
        record.set("me", &record);
        let result = Value::from(&record).to_json();
        assert!(matches!(result, Err(ReactiveError::Json(ref msg)) if msg.contains("cyclic")));
    }

    #[test]
    fn shared_children_are_not_cycles() {
        let child = Object::from_entries([("n", 1)]);
        let parent = Object::from_entries([("a", &child), ("b", &child)]);
        assert_eq!(
            Value::from(&parent).to_json().unwrap(),
            json!({"a": {"n": 1}, "b": {"n": 1}})
        );
    }

    #[test]
    fn invalid_text_is_an_error() {
        assert!(matches!(Value::from_json("{"), Err(ReactiveError::Json(_))));
    }
}
