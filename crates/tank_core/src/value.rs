//! Valor dinâmico armazenado no [`StatusRegistry`](crate::status::StatusRegistry).
//!
//! Os canais de status carregam tipos diferentes (contador inteiro, corrente
//! em amperes, IP em texto, flag booleana do ping), então o registro guarda
//! um enum em vez de um tipo genérico.

use serde::Serialize;
use std::fmt;

/// Valor heterogêneo de um canal de status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Inteiros também são aceitos como float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(42_i64).as_i64(), Some(42));
        assert_eq!(Value::from(42_i64).as_f64(), Some(42.0));
        assert_eq!(Value::from("OK").as_str(), Some("OK"));
        assert_eq!(Value::from("OK").as_i64(), None);
    }

    #[test]
    fn display_is_raw_payload_form() {
        assert_eq!(Value::from("10.0.0.5").to_string(), "10.0.0.5");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(false).to_string(), "false");
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&Value::from(7_i64)).unwrap();
        assert_eq!(json, "7");
        let json = serde_json::to_string(&Value::from("on")).unwrap();
        assert_eq!(json, "\"on\"");
    }
}
