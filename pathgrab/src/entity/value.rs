use crate::schema::DType;
use crate::util::natural_cmp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A typed entity value extracted from a path.
///
/// Ordering is "natural": numbers sort numerically before strings, strings
/// sort with digit runs compared by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Coerce a raw captured string to `dtype`. Returns `None` when the text
    /// is not a valid number for a numeric dtype.
    pub fn parse(raw: &str, dtype: DType) -> Option<Value> {
        match dtype {
            DType::Str => Some(Value::Str(raw.to_string())),
            DType::Int => raw.trim().parse::<i64>().ok().map(Value::Int),
            DType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
        }
    }

    /// Re-express an existing value under `dtype`.
    pub fn coerce(&self, dtype: DType) -> Option<Value> {
        match (self, dtype) {
            (Value::Str(s), _) => Value::parse(s, dtype),
            (Value::Int(n), DType::Int) => Some(Value::Int(*n)),
            (Value::Int(n), DType::Float) => Some(Value::Float(*n as f64)),
            (Value::Float(f), DType::Float) => Some(Value::Float(*f)),
            (Value::Float(f), DType::Int) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(Value::Int(*f as i64))
                } else {
                    None
                }
            }
            (v, DType::Str) => Some(Value::Str(v.to_string())),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Value::Int(_) => DType::Int,
            Value::Float(_) => DType::Float,
            Value::Str(_) => DType::Str,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    /// Literal comparison used by query filters. Numeric literals tolerate
    /// leading zeros in stored strings ("02" matches 2).
    pub fn matches_literal(&self, literal: &Value) -> bool {
        match (self, literal) {
            (Value::Str(stored), Value::Str(wanted)) => stored == wanted,
            (Value::Str(stored), Value::Int(n)) => {
                let trimmed = stored.trim_start_matches('0');
                if *n == 0 {
                    !stored.is_empty() && trimmed.is_empty()
                } else {
                    trimmed == n.to_string()
                }
            }
            (Value::Str(stored), Value::Float(f)) => {
                stored.parse::<f64>().map(|v| v == *f).unwrap_or(false)
            }
            (stored, Value::Str(wanted)) => match wanted.trim().parse::<f64>() {
                Ok(v) => stored.as_f64() == Some(v),
                Err(_) => false,
            },
            (stored, wanted) => stored.as_f64() == wanted.as_f64(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => natural_cmp(a, b),
            (Value::Str(_), _) => Ordering::Greater,
            (_, Value::Str(_)) => Ordering::Less,
            (a, b) => {
                let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
                x.total_cmp(&y)
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Str(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Value::Int(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Value::Float(f) => {
                0u8.hash(state);
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).hash(state);
                } else {
                    f.to_bits().hash(state);
                }
            }
        }
    }
}
