//! Raw document values and the keys term buckets are grouped by.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single raw value read from a document field or produced by a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
}

impl Value {
    /// Convert a scalar JSON value. Arrays, objects and `null` have no
    /// scalar form and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::I64(i))
                } else if let Some(u) = n.as_u64() {
                    Some(Value::U64(u))
                } else {
                    n.as_f64().map(Value::F64)
                }
            }
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            _ => None,
        }
    }

    /// Numeric view of the value. Strings have none; booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::I64(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    /// Equality used by term matching: numbers compare by numeric value
    /// regardless of their stored width.
    pub fn term_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(_), _) | (_, Value::Str(_)) => false,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// Key of a term bucket.
///
/// Keys are totally ordered: numbers first (by numeric value), then
/// booleans, then strings. `Long(1)` and `Double(1.0)` are the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketKey {
    Long(i64),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl BucketKey {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => BucketKey::Bool(*b),
            Value::I64(v) => BucketKey::Long(*v),
            Value::U64(v) => match i64::try_from(*v) {
                Ok(v) => BucketKey::Long(v),
                Err(_) => BucketKey::Double(*v as f64),
            },
            Value::F64(v) => BucketKey::Double(*v),
            Value::Str(s) => BucketKey::Str(s.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BucketKey::Long(v) => Some(*v as f64),
            BucketKey::Double(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            BucketKey::Long(_) | BucketKey::Double(_) => 0,
            BucketKey::Bool(_) => 1,
            BucketKey::Str(_) => 2,
        }
    }
}

impl Ord for BucketKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (BucketKey::Long(a), BucketKey::Long(b)) => a.cmp(b),
            (BucketKey::Bool(a), BucketKey::Bool(b)) => a.cmp(b),
            (BucketKey::Str(a), BucketKey::Str(b)) => a.cmp(b),
            (BucketKey::Double(a), BucketKey::Double(b)) => cmp_doubles(*a, *b),
            (BucketKey::Long(a), BucketKey::Double(b)) => cmp_long_double(*a, *b),
            (BucketKey::Double(a), BucketKey::Long(b)) => cmp_long_double(*b, *a).reverse(),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// `-0.0` and `0.0` are one key; otherwise IEEE total order.
fn cmp_doubles(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Exact comparison of an integer with a double, without rounding the
/// integer through `f64`.
fn cmp_long_double(a: i64, b: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= TWO_POW_63 {
        return Ordering::Less;
    }
    if b < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // -2^63 <= trunc(b) < 2^63, so the cast is exact
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal if b > whole => Ordering::Less,
        Ordering::Equal if b < whole => Ordering::Greater,
        ord => ord,
    }
}

impl PartialOrd for BucketKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BucketKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BucketKey {}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Long(v) => write!(f, "{}", v),
            BucketKey::Double(v) => write!(f, "{}", v),
            BucketKey::Bool(v) => write!(f, "{}", v),
            BucketKey::Str(v) => f.write_str(v),
        }
    }
}
