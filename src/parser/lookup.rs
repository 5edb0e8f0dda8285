//! Chained optional-path access over `serde_json::Value`.
//!
//! `Lookup::new(&v).key("data").key("item").at(0).str()` never faults on a
//! missing segment or a type mismatch; it just goes absent.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a>(Option<&'a Value>);

impl<'a> Lookup<'a> {
    pub fn new(value: &'a Value) -> Self {
        Lookup(Some(value))
    }

    pub fn key(self, name: &str) -> Self {
        Lookup(self.0.and_then(|v| v.as_object()).and_then(|o| o.get(name)))
    }

    /// Follows a dotted path of object keys.
    pub fn path(self, dotted: &str) -> Self {
        dotted.split('.').fold(self, |acc, seg| acc.key(seg))
    }

    pub fn at(self, index: usize) -> Self {
        Lookup(self.0.and_then(|v| v.as_array()).and_then(|a| a.get(index)))
    }

    pub fn object(self) -> Option<&'a Map<String, Value>> {
        self.0.and_then(|v| v.as_object())
    }

    pub fn array(self) -> Option<&'a Vec<Value>> {
        self.0.and_then(|v| v.as_array())
    }

    pub fn str(self) -> Option<&'a str> {
        self.0.and_then(|v| v.as_str())
    }

    /// Strings as-is, numbers and booleans rendered; containers and null are absent.
    pub fn text(self) -> Option<String> {
        match self.0? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integers, floats (truncated) and numeric strings.
    pub fn int(self) -> Option<i64> {
        match self.0? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Floats from numbers or numeric strings.
    pub fn float(self) -> Option<f64> {
        match self.0? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}
