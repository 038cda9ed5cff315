//! JSON-shaped values threaded through pipelines.

use serde_json::{Map, Number};
use std::collections::BTreeMap;
use std::fmt;

/// A closed JSON value.
///
/// Maps keep their keys sorted, which is also the order they are rendered in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a number value from a float, keeping integral values as integers.
    ///
    /// Returns `None` for NaN and infinities, which JSON cannot carry.
    pub fn from_f64(f: f64) -> Option<Value> {
        if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            return Some(Value::Number(Number::from(f as i64)));
        }
        Number::from_f64(f).map(Value::Number)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Compact JSON text of this value.
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self.clone()).to_string()
    }
}

/// Plain-text form: strings unquoted, containers as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::List(_) | Value::Map(_) => f.write_str(&self.to_json_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => serde_json::Value::Array(items.into_iter().map(Into::into).collect()),
            Value::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// How the final result of a command is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Raw,
    Pretty,
    Table,
}

/// The record produced by a module or a literal pipeline head.
///
/// `output` and `status` are the conventional keys of the module protocol;
/// any other key is kept in `extra` and passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleResult {
    pub output: Option<Value>,
    pub status: Option<String>,
    pub display: DisplayMode,
    pub extra: BTreeMap<String, Value>,
}

impl ModuleResult {
    /// A successful result carrying `output`.
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            output: Some(output.into()),
            status: Some("success".to_string()),
            ..Self::default()
        }
    }

    /// Builds a result from a decoded JSON object.
    ///
    /// A non-string `status` is not a status: it stays in `extra`.
    pub fn from_json_object(mut obj: Map<String, serde_json::Value>) -> Self {
        let output = obj.remove("output").map(Value::from);
        let status = match obj.remove("status") {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => {
                obj.insert("status".to_string(), other);
                None
            }
            None => None,
        };
        Self {
            output,
            status,
            display: DisplayMode::Raw,
            extra: obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }

    /// The wire form of this result. `display` is never part of it.
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = Map::new();
        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone().into());
        }
        if let Some(output) = &self.output {
            obj.insert("output".to_string(), output.clone().into());
        }
        if let Some(status) = &self.status {
            obj.insert("status".to_string(), serde_json::Value::String(status.clone()));
        }
        serde_json::Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object_splits_known_keys() {
        let obj = json!({"output": {"a": 1}, "status": "success", "took": 3});
        let serde_json::Value::Object(obj) = obj else { unreachable!() };
        let res = ModuleResult::from_json_object(obj);

        assert_eq!(res.status.as_deref(), Some("success"));
        assert_eq!(res.extra.get("took"), Some(&Value::from(3i64)));
        let out = res.output.unwrap();
        assert_eq!(out.as_map().unwrap().get("a"), Some(&Value::from(1i64)));
    }

    #[test]
    fn test_non_string_status_is_passed_through() {
        let serde_json::Value::Object(obj) = json!({"status": 0}) else { unreachable!() };
        let res = ModuleResult::from_json_object(obj);
        assert_eq!(res.status, None);
        assert_eq!(res.to_json(), json!({"status": 0}));
    }

    #[test]
    fn test_to_json_omits_display_mode() {
        let mut res = ModuleResult::success("hi");
        res.display = DisplayMode::Table;
        res.extra.insert("error".into(), Value::Null);
        assert_eq!(
            res.to_json(),
            json!({"output": "hi", "status": "success", "error": null})
        );
    }

    #[test]
    fn test_absent_output_is_not_serialized() {
        let res = ModuleResult {
            status: Some("error".into()),
            ..ModuleResult::default()
        };
        assert_eq!(res.to_json(), json!({"status": "error"}));
    }

    #[test]
    fn test_from_f64_prefers_integers() {
        assert_eq!(Value::from_f64(3.0), Some(Value::from(3i64)));
        assert_eq!(Value::from_f64(2.5).unwrap().to_string(), "2.5");
        assert_eq!(Value::from_f64(f64::NAN), None);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::from("x").to_string(), "x");
        assert_eq!(Value::Null.to_string(), "null");
        let list = Value::List(vec![Value::from(1i64), Value::from("a")]);
        assert_eq!(list.to_string(), r#"[1,"a"]"#);
    }
}
