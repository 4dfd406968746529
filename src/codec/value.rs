//! Dynamic value model
//!
//! The closed set of shapes the fast format can carry. Anything that does
//! not map onto one of these variants goes through the fallback format.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value in the fast format's data model
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent / null (`()` and `None` both map here)
    Nil,

    Bool(bool),

    /// Every integer type that fits in `i64`
    Int(i64),

    Float(f64),

    Text(String),

    Bytes(Vec<u8>),

    /// Ordered sequence. Tuples and arrays also land here.
    List(Vec<Value>),

    /// Unordered collection of unique values
    Set(BTreeSet<Value>),

    /// Key-unique mapping
    Map(BTreeMap<Value, Value>),
}

impl Value {
    /// Position of the variant in the total order across kinds
    fn rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
            Value::Bytes(_) => 5,
            Value::List(_) => 6,
            Value::Set(_) => 7,
            Value::Map(_) => 8,
        }
    }

    /// Human-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Build a set value from any iterator of convertible items
    pub fn set<I, T>(items: I) -> Value
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    /// Build a list value from any iterator of convertible items
    pub fn list<I, T>(items: I) -> Value
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Equality / ordering / hashing
// =============================================================================
//
// Floats compare with `total_cmp` so that `Value` is a lawful `Ord` key for
// `BTreeMap`/`BTreeSet` and for `HashMap` results (NaN == NaN, -0.0 != 0.0).

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
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
        self.rank().hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::List(items) => items.hash(state),
            Value::Set(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
        }
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, "\"")
            }
            Value::List(items) => {
                write!(f, "[")?;
                write_joined(f, items.iter())?;
                write!(f, "]")
            }
            Value::Set(items) => {
                if items.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                write_joined(f, items.iter())?;
                write!(f, "}}")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

// =============================================================================
// Conversions
// =============================================================================

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! from_small_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

from_small_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(v: BTreeSet<Value>) -> Self {
        Value::Set(v)
    }
}

impl From<BTreeMap<Value, Value>> for Value {
    fn from(v: BTreeMap<Value, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Nil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_float_total_order() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert!(Value::Float(1.0) < Value::Float(2.0));
    }

    #[test]
    fn test_cross_kind_order_is_stable() {
        assert!(Value::Nil < Value::Bool(false));
        assert!(Value::Int(i64::MAX) < Value::Float(f64::MIN));
        assert!(Value::Text("z".into()) < Value::Bytes(vec![]));
    }

    #[test]
    fn test_hash_agrees_with_eq() {
        let mut seen = HashSet::new();
        seen.insert(Value::list([1, 2]));
        assert!(seen.contains(&Value::List(vec![Value::Int(1), Value::Int(2)])));
        assert!(!seen.contains(&Value::set([1, 2])));
    }

    #[test]
    fn test_set_deduplicates() {
        let set = Value::set(["a", "b", "a"]);
        match set {
            Value::Set(items) => assert_eq!(items.len(), 2),
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let mut map = BTreeMap::new();
        map.insert(Value::from("k"), Value::list([1, 2]));
        assert_eq!(Value::Map(map).to_string(), "{\"k\": [1, 2]}");
        assert_eq!(Value::set(Vec::<i64>::new()).to_string(), "set()");
        assert_eq!(Value::Bytes(vec![0, 255]).to_string(), "b\"\\x00\\xff\"");
    }
}
