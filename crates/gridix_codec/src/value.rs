//! Dynamic value type shared by keys, cache values and indexed fields.

use std::cmp::Ordering;
use std::fmt;

/// A dynamic value.
///
/// Cache keys, cache values and the field values extracted from them are all
/// represented as `Value`. Floats are intentionally not supported so that
/// every value has a total order and a stable hash.
///
/// # Ordering
///
/// Values of different kinds order by kind rank:
/// `Null < Bool < Integer < Text < Bytes < Array < Map`.
/// Within a kind, values use their natural order (numeric for integers,
/// lexicographic for text and bytes, element-wise for arrays and maps).
/// Ordered indexes rely on this order for range scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs, sorted by key.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value with sorted keys.
    ///
    /// Duplicate keys keep the last occurrence.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.reverse();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);
        Value::Map(pairs)
    }

    /// Create a map value from text keys.
    pub fn object<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::map(
            fields
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v.into()))
                .collect(),
        )
    }

    /// Rank of the value kind used for cross-kind ordering.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Text(_) => 3,
            Value::Bytes(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Returns the kind name of this value.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Returns true if both values are of the same kind.
    pub fn same_kind(&self, other: &Value) -> bool {
        self.rank() == other.rank()
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Navigates nested maps along `path`.
    ///
    /// An empty path returns the value itself.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let mut current = self;
        for segment in path {
            current = current.get(segment.as_ref())?;
        }
        Some(current)
    }

    /// Appends every text fragment held by this value (recursively) to `out`.
    ///
    /// Map keys are skipped; only values contribute text.
    pub fn collect_text(&self, out: &mut Vec<String>) {
        match self {
            Value::Null | Value::Bytes(_) => {}
            Value::Bool(b) => out.push(b.to_string()),
            Value::Integer(n) => out.push(n.to_string()),
            Value::Text(s) => out.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|v| v.collect_text(out)),
            Value::Map(pairs) => pairs.iter().for_each(|(_, v)| v.collect_text(out)),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => {
                write!(f, "h'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn map_keys_are_sorted_and_deduplicated() {
        let map = Value::map(vec![
            (Value::from("z"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
            (Value::from("z"), Value::Integer(3)),
        ]);

        let pairs = map.as_map().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (Value::from("a"), Value::Integer(2)));
        assert_eq!(pairs[1], (Value::from("z"), Value::Integer(3)));
    }

    #[test]
    fn integers_order_numerically() {
        let mut values = vec![
            Value::Integer(2),
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(-300),
            Value::Integer(1000),
        ];
        values.sort();
        let ints: Vec<i64> = values.iter().filter_map(Value::as_integer).collect();
        assert_eq!(ints, vec![-300, -1, 0, 2, 1000]);
    }

    #[test]
    fn kinds_order_by_rank() {
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Bool(true) < Value::Integer(i64::MIN));
        assert!(Value::Integer(i64::MAX) < Value::from(""));
        assert!(Value::from("zzz") < Value::Bytes(vec![]));
    }

    #[test]
    fn nested_path_lookup() {
        let value = Value::object([
            ("name", Value::from("Alice")),
            ("address", Value::object([("city", "Oslo")])),
        ]);

        assert_eq!(value.get_path(&["address", "city"]), Some(&Value::from("Oslo")));
        assert_eq!(value.get_path(&["address", "zip"]), None);
        assert_eq!(value.get_path::<&str>(&[]), Some(&value));
    }

    #[test]
    fn collect_text_skips_keys() {
        let value = Value::object([
            ("title", Value::from("Rust in action")),
            ("pages", Value::Integer(400)),
        ]);
        let mut out = Vec::new();
        value.collect_text(&mut out);
        assert_eq!(out, vec!["400".to_string(), "Rust in action".to_string()]);
    }

    #[test]
    fn display_renders_nested_values() {
        let value = Value::object([("k", Value::Array(vec![1i64.into(), Value::Null]))]);
        assert_eq!(value.to_string(), "{\"k\": [1, null]}");
    }

    proptest! {
        #[test]
        fn ordering_is_antisymmetric(a in any::<i64>(), b in ".{0,8}") {
            let x = Value::Integer(a);
            let y = Value::Text(b);
            prop_assert_eq!(x.cmp(&y), y.cmp(&x).reverse());
        }
    }
}
