//! Query parameters.
//!
//! [`QueryParams`] is an ordered multi-map of query keys to values. Keys keep
//! the position where they first appeared and values keep the order they were
//! added in, so encoding is deterministic:
//!
//! ```rust
//! use httpreq::QueryParams;
//!
//! let mut params = QueryParams::new();
//! params.add("tag", "a").add("page", 2).add("tag", "b&c").add("raw", None::<&str>);
//! assert_eq!(params.encode(), "tag=a&tag=b%26c&page=2&raw");
//! ```

use std::borrow::Cow;
use std::fmt;

/// A single query value: text, or absent for a bare key without `=`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    /// Encodes as `key` with no `=`.
    Absent,
    /// Encodes as `key=value`.
    Text(String),
}

impl QueryValue {
    /// Uses the message of an error as the value.
    #[must_use]
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        Self::Text(error.to_string())
    }

    /// Converts a JSON value into query values.
    ///
    /// Scalars become one value, `null` becomes [`QueryValue::Absent`], and an
    /// array of scalars becomes one value per element.
    ///
    /// # Errors
    ///
    /// Returns the kind of the offending value (`"object"` or `"nested array"`)
    /// when it has no textual form.
    pub fn from_json(value: &serde_json::Value) -> Result<Vec<Self>, &'static str> {
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::Array(_) => Err("nested array"),
                    other => Self::from_json_scalar(other),
                })
                .collect(),
            other => Self::from_json_scalar(other).map(|v| vec![v]),
        }
    }

    fn from_json_scalar(value: &serde_json::Value) -> Result<Self, &'static str> {
        match value {
            serde_json::Value::Null => Ok(Self::Absent),
            serde_json::Value::Bool(b) => Ok(Self::Text(b.to_string())),
            serde_json::Value::Number(n) => Ok(Self::Text(n.to_string())),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(_) => Err("array"),
            serde_json::Value::Object(_) => Err("object"),
        }
    }

    /// Returns the text, or `None` when absent.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl<T: Into<Self>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

macro_rules! query_value_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for QueryValue {
                fn from(value: $t) -> Self {
                    Self::Text(value.to_string())
                }
            }
        )*
    };
}

query_value_from_display!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// An ordered multi-map of query keys to values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<QueryValue>)>,
}

impl QueryParams {
    /// Creates an empty parameter store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string, decoding keys and values.
    ///
    /// `+` is read as a space. Undecodable escapes are kept as written.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut params = Self::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((key, value)) => params.add(unescape(key), unescape(value).into_owned()),
                None => params.add(unescape(pair), QueryValue::Absent),
            };
        }
        params
    }

    /// Replaces all values of `key` with `value`.
    ///
    /// The key keeps its position if it was already present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => *values = vec![value],
            None => self.entries.push((key, vec![value])),
        }
        self
    }

    /// Adds a value for `key`, keeping any existing ones.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
        self
    }

    /// Removes every value of `key`.
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.entries.retain(|(k, _)| k != key);
        self
    }

    /// Returns the first value of `key`.
    ///
    /// A bare key without `=` yields `Some(None)`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, values)| values.first())
            .map(QueryValue::as_str)
    }

    /// Returns all values of `key` in the order they were added.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[QueryValue] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` if `key` has at least one value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Iterates over the keys in order of first appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Percent-encodes all pairs as `k1=v1&k1=v2&k2=v3`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut pairs = Vec::new();
        for (key, values) in &self.entries {
            for value in values {
                pairs.push(encode_pair(key, value));
            }
        }
        pairs.join("&")
    }
}

/// Percent-encodes one `key=value` pair, or a bare key for an absent value.
#[must_use]
pub fn encode_pair(key: &str, value: &QueryValue) -> String {
    match value {
        QueryValue::Absent => urlencoding::encode(key).into_owned(),
        QueryValue::Text(text) => {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(text))
        }
    }
}

fn unescape(component: &str) -> Cow<'_, str> {
    if !component.contains(['+', '%']) {
        return Cow::Borrowed(component);
    }
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Owned(spaced),
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.add(key, value);
        }
        params
    }
}
