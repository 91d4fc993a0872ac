//! Bound values and the parameter map handed to the converter.

use std::collections::HashMap;

/// An opaque value bound to one placeholder occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),+ => $target:ty) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

value_from!(Int: i8, i16, i32, i64 => i64);
value_from!(UInt: u8, u16, u32, u64 => u64);
value_from!(Float: f32, f64 => f64);
value_from!(Text: String, &str => String);
value_from!(Bytes: Vec<u8>, &[u8] => Vec<u8>);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Key of a [`Parameters`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// A named placeholder, stored without its leading colon.
    Named(String),
    /// A positional placeholder, counted from zero in statement order.
    Positional(usize),
}

impl ParamKey {
    /// Builds a named key, dropping one leading `:` if present.
    pub fn named(name: &str) -> Self {
        ParamKey::Named(name.strip_prefix(':').unwrap_or(name).to_string())
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::named(name)
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::named(&name)
    }
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Positional(index)
    }
}

/// Values supplied for the placeholders of one statement.
///
/// Named keys may be given with or without the leading colon:
///
/// ```
/// use sqlx_mysql_shim::{Parameters, Value};
///
/// let params = Parameters::new().bind(":id", 5).bind("name", "Alice");
/// assert_eq!(params.get_named("id"), Some(&Value::Int(5)));
/// assert_eq!(params.get_named("name"), Some(&Value::Text("Alice".into())));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: HashMap<ParamKey, Value>,
    next_position: usize,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn bind(mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder form of [`push`](Self::push).
    pub fn bind_positional(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    /// Sets the value for `key`, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) {
        let key = key.into();
        if let ParamKey::Positional(index) = key {
            self.next_position = self.next_position.max(index.saturating_add(1));
        }
        self.values.insert(key, value.into());
    }

    /// Appends a value for the next positional placeholder.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.insert(ParamKey::Positional(self.next_position), value);
    }

    pub fn get(&self, key: &ParamKey) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.values.get(&ParamKey::named(name))
    }

    pub fn get_positional(&self, index: usize) -> Option<&Value> {
        self.values.get(&ParamKey::Positional(index))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<ParamKey>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys_strip_one_colon() {
        assert_eq!(ParamKey::from(":id"), ParamKey::Named("id".to_string()));
        assert_eq!(ParamKey::from("id"), ParamKey::Named("id".to_string()));
        assert_eq!(ParamKey::from("::id"), ParamKey::Named(":id".to_string()));
    }

    #[test]
    fn test_positional_push_follows_explicit_indexes() {
        let mut params = Parameters::new();
        params.insert(2usize, "c");
        params.push("d");
        params.insert(0usize, "a");

        assert_eq!(params.get_positional(0), Some(&Value::from("a")));
        assert_eq!(params.get_positional(1), None);
        assert_eq!(params.get_positional(3), Some(&Value::from("d")));
    }

    #[test]
    fn test_last_positional_index_does_not_overflow() {
        let mut params = Parameters::new();
        params.insert(usize::MAX, "last");
        assert_eq!(params.get_positional(usize::MAX), Some(&Value::from("last")));

        // The cursor stays at the last index, so a push replaces that value.
        params.push("replaced");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get_positional(usize::MAX), Some(&Value::from("replaced")));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(7u8), Value::UInt(7));
        assert_eq!(Value::from(-7i32), Value::Int(-7));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
        assert_eq!(Value::from(&b"\x00\x01"[..]), Value::Bytes(vec![0, 1]));
    }

    #[test]
    fn test_collect_from_pairs() {
        let params: Parameters = vec![(":a", 1), (":b", 2)].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get_named("b"), Some(&Value::Int(2)));
    }
}
