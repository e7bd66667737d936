//! Runtime values and the capability trait for custom objects.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

/// Insertion-ordered string map.
pub type Object = IndexMap<String, Value>;

/// Capability implemented by host objects exposed to templates
/// (Liquid "drops").
///
/// Every method has a default, so a drop only implements what it needs.
pub trait ObjectLike: fmt::Debug + Send + Sync {
    /// Own property lookup.
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Inherited property lookup, skipped under `ownPropertyOnly`.
    fn inherited(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Fallback for keys that neither lookup found.
    fn method_missing(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Scalar stand-in used for output, truthiness and comparisons.
    fn value_of(&self) -> Option<Value> {
        None
    }

    /// Custom equality. `None` defers to the default comparison.
    fn equals(&self, _other: &Value) -> Option<bool> {
        None
    }

    /// Custom ordering. `None` defers to the default comparison.
    fn compare(&self, _other: &Value) -> Option<Ordering> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    Drop(Arc<dyn ObjectLike>),
}

impl Value {
    /// Convert any serializable value through its JSON form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error for values JSON cannot represent.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    #[must_use]
    pub fn drop(object: impl ObjectLike + 'static) -> Self {
        Self::Drop(Arc::new(object))
    }

    /// Drops are replaced by their scalar stand-in when they have one.
    #[must_use]
    pub fn to_value(&self) -> Cow<'_, Self> {
        match self {
            Self::Drop(d) => d.value_of().map_or(Cow::Borrowed(self), Cow::Owned),
            other => Cow::Borrowed(other),
        }
    }

    /// Only `nil` and `false` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil | Self::Bool(false) => false,
            Self::Drop(d) => d.value_of().is_none_or(|v| v.is_truthy()),
            _ => true,
        }
    }

    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::String(s) => s.trim().parse().ok(),
            Self::Drop(d) => d.value_of().and_then(|v| v.as_integer()),
            _ => None,
        }
    }

    /// Text written to the output for this value. Arrays concatenate
    /// their elements and objects render as JSON.
    #[must_use]
    pub fn to_output(&self) -> Cow<'_, str> {
        match self {
            Self::Nil => Cow::Borrowed(""),
            Self::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Self::Integer(n) => Cow::Owned(n.to_string()),
            Self::Float(f) => Cow::Owned(f.to_string()),
            Self::String(s) => Cow::Borrowed(s),
            Self::Array(items) => Cow::Owned(items.iter().map(|v| v.to_output()).collect()),
            Self::Object(_) => Cow::Owned(self.to_json().to_string()),
            Self::Drop(d) => d
                .value_of()
                .map_or(Cow::Borrowed(""), |v| Cow::Owned(v.to_output().into_owned())),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Nil => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => items.iter().map(Self::to_json).collect(),
            Self::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Self::Drop(d) => d.value_of().map_or(serde_json::Value::Null, |v| v.to_json()),
        }
    }

    /// Number of elements, characters or keys.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::Array(items) => Some(items.len()),
            Self::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    /// One step of a property chain.
    ///
    /// Arrays accept negative indexes and expose `size`, `first` and
    /// `last`; strings and objects expose `size` unless an own key
    /// shadows it. Drops go through their own lookup, then inherited
    /// properties (unless `own_only`), then `method_missing`.
    #[must_use]
    pub fn property(&self, key: &Self, own_only: bool) -> Option<Cow<'_, Self>> {
        match self {
            Self::Array(items) => {
                let index = match key {
                    Self::Integer(n) => Some(*n),
                    Self::Float(_) => key.as_integer(),
                    Self::String(s) => match s.as_str() {
                        "size" => return Some(Cow::Owned(Self::from(items.len()))),
                        "first" => return items.first().map(Cow::Borrowed),
                        "last" => return items.last().map(Cow::Borrowed),
                        other => other.parse().ok(),
                    },
                    _ => None,
                }?;
                let len = i64::try_from(items.len()).ok()?;
                let index = if index < 0 { index + len } else { index };
                usize::try_from(index).ok().and_then(|i| items.get(i)).map(Cow::Borrowed)
            }
            Self::Object(map) => {
                let name = key.to_output();
                match map.get(name.as_ref()) {
                    Some(v) => Some(Cow::Borrowed(v)),
                    None if name == "size" => Some(Cow::Owned(Self::from(map.len()))),
                    None => None,
                }
            }
            Self::String(s) if key.as_str() == Some("size") => {
                Some(Cow::Owned(Self::from(s.chars().count())))
            }
            Self::Drop(d) => {
                let name = key.to_output();
                d.get(&name)
                    .or_else(|| if own_only { None } else { d.inherited(&name) })
                    .or_else(|| d.method_missing(&name))
                    .map(Cow::Owned)
            }
            _ => None,
        }
    }

    /// Liquid `==`: arrays compare element-wise first, then any custom
    /// equality on either side, then plain value equality.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        if let (Self::Array(a), Self::Array(b)) = (self, other) {
            return a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y));
        }
        if let Self::Drop(d) = self {
            if let Some(eq) = d.equals(other) {
                return eq;
            }
        }
        if let Self::Drop(d) = other {
            if let Some(eq) = d.equals(self) {
                return eq;
            }
        }
        *self.to_value() == *other.to_value()
    }

    /// Ordering for `<`, `>`, `<=` and `>=`. Values of unrelated types
    /// have no order and every comparison between them is false.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if let Self::Drop(d) = self {
            if let Some(ord) = d.compare(other) {
                return Some(ord);
            }
        }
        if let Self::Drop(d) = other {
            if let Some(ord) = d.compare(self) {
                return Some(ord.reverse());
            }
        }
        match (self.to_value().as_ref(), other.to_value().as_ref()) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (a, b) => a.as_number()?.partial_cmp(&b.as_number()?),
        }
    }

    /// Liquid `contains`: substring, array membership or object key.
    #[must_use]
    pub fn contains(&self, needle: &Self) -> bool {
        match self.to_value().as_ref() {
            Self::String(s) => !needle.is_nil() && s.contains(needle.to_output().as_ref()),
            Self::Array(items) => items.iter().any(|item| item.equals(needle)),
            Self::Object(map) => map.contains_key(needle.to_output().as_ref()),
            _ => false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Structural equality. Integers and floats compare numerically and
/// drops compare by identity.
impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Drop(a), Self::Drop(b)) => Arc::ptr_eq(a, b),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_output())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Integer),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or_else(
            |_| {
                #[allow(clippy::cast_precision_loss)]
                Self::Float(n as f64)
            },
            Self::Integer,
        )
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Self::Object(map)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

impl<K: Into<String>, V: Into<Self>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The `empty` literal: equal to empty strings, arrays and objects.
#[derive(Debug)]
pub struct EmptyDrop;

impl ObjectLike for EmptyDrop {
    fn value_of(&self) -> Option<Value> {
        Some(Value::String(String::new()))
    }

    fn equals(&self, other: &Value) -> Option<bool> {
        Some(match other.to_value().as_ref() {
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        })
    }

    fn compare(&self, _other: &Value) -> Option<Ordering> {
        None
    }
}

/// The `blank` literal: like `empty`, and also equal to nil, false and
/// whitespace-only strings.
#[derive(Debug)]
pub struct BlankDrop;

impl ObjectLike for BlankDrop {
    fn value_of(&self) -> Option<Value> {
        Some(Value::String(String::new()))
    }

    fn equals(&self, other: &Value) -> Option<bool> {
        Some(match other.to_value().as_ref() {
            Value::Nil | Value::Bool(false) => true,
            Value::String(s) => s.trim().is_empty(),
            other => EmptyDrop.equals(other).unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn array_properties() {
        let v = Value::from(json!([1, 2, 3]));
        let get = |k: Value| v.property(&k, true).map(Cow::into_owned);
        assert_eq!(get(Value::from(-1)), Some(Value::from(3)));
        assert_eq!(get(Value::from(5)), None);
        assert_eq!(get(Value::from("size")), Some(Value::from(3)));
        assert_eq!(get(Value::from("first")), Some(Value::from(1)));
        assert_eq!(get(Value::from("last")), Some(Value::from(3)));
    }

    #[test]
    fn object_size_is_shadowed_by_own_key() {
        let v = Value::from(json!({"size": "big", "a": 1}));
        assert_eq!(
            v.property(&Value::from("size"), true).map(Cow::into_owned),
            Some(Value::from("big"))
        );
        let w = Value::from(json!({"a": 1}));
        assert_eq!(
            w.property(&Value::from("size"), true).map(Cow::into_owned),
            Some(Value::from(1))
        );
    }

    #[derive(Debug)]
    struct Product;

    impl ObjectLike for Product {
        fn get(&self, key: &str) -> Option<Value> {
            (key == "title").then(|| Value::from("Shirt"))
        }

        fn inherited(&self, key: &str) -> Option<Value> {
            (key == "kind").then(|| Value::from("product"))
        }

        fn method_missing(&self, key: &str) -> Option<Value> {
            Some(Value::from(format!("missing:{key}")))
        }
    }

    #[test]
    fn drop_lookup_order() {
        let v = Value::drop(Product);
        let get = |k: &str, own| v.property(&Value::from(k), own).map(Cow::into_owned);
        assert_eq!(get("title", true), Some(Value::from("Shirt")));
        assert_eq!(get("kind", false), Some(Value::from("product")));
        assert_eq!(get("kind", true), Some(Value::from("missing:kind")));
    }

    #[test]
    fn equality_rules() {
        assert!(Value::from(1).equals(&Value::from(1.0)));
        assert!(Value::from(json!([1, [2]])).equals(&Value::from(json!([1, [2]]))));
        assert!(!Value::from(json!([1])).equals(&Value::from(json!([1, 2]))));
        assert!(!Value::from("1").equals(&Value::from(1)));
    }

    #[test]
    fn empty_and_blank() {
        let empty = Value::drop(EmptyDrop);
        let blank = Value::drop(BlankDrop);
        assert!(Value::from("").equals(&empty));
        assert!(empty.equals(&Value::from(json!([]))));
        assert!(!empty.equals(&Value::Nil));
        assert!(blank.equals(&Value::Nil));
        assert!(blank.equals(&Value::from("  ")));
        assert!(!blank.equals(&Value::from("x")));
    }

    #[test]
    fn ordering() {
        assert_eq!(
            Value::from(1).compare(&Value::from(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::from("1").compare(&Value::from(1)), None);
    }

    #[test]
    fn contains() {
        assert!(Value::from("hello").contains(&Value::from("ell")));
        assert!(Value::from(json!([1, 2])).contains(&Value::from(2)));
        assert!(Value::from(json!({"a": 1})).contains(&Value::from("a")));
        assert!(!Value::Nil.contains(&Value::from("a")));
    }

    #[test]
    fn output() {
        assert_eq!(Value::Nil.to_output(), "");
        assert_eq!(Value::from(json!(["a", 1, true])).to_output(), "a1true");
        assert_eq!(Value::from(json!({"a": 1})).to_output(), r#"{"a":1}"#);
        assert_eq!(Value::from(2.5).to_output(), "2.5");
    }

    #[test]
    fn from_serialize_keeps_key_order() {
        #[derive(Serialize)]
        struct Row {
            zeta: u8,
            alpha: &'static str,
        }
        let v = Value::from_serialize(&Row {
            zeta: 1,
            alpha: "a",
        })
        .expect("serializable");
        let Value::Object(map) = v else {
            panic!("expected object");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), ["zeta", "alpha"]);
    }
}
