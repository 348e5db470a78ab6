//! Request descriptor: normalized query parameters and cache keys.
//!
//! A request is a path plus a set of query parameters. Values are
//! normalized on insert (booleans lowercased, everything stringified,
//! `None` dropped) so that two semantically identical requests produce
//! the same [`cache_key`].

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

/// A single query parameter value before stringification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Bool(true) => f.write_str("true"),
            ParamValue::Bool(false) => f.write_str("false"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Str(s.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(n: $t) -> Self {
                ParamValue::Int(i64::from(n))
            }
        })*
    };
}

int_param!(i8, i16, i32, i64, u8, u16, u32);

/// Normalized query parameters, ordered by name.
///
/// Inserting the same name twice keeps the later value.
///
/// ```rust
/// # use inatproxy::RequestParams;
/// let mut params = RequestParams::new();
/// params.insert("verifiable", true);
/// params.insert("per_page", 30u32);
/// params.insert_opt("q", None::<&str>);
/// assert_eq!(params.get("verifiable"), Some("true"));
/// assert_eq!(params.get("per_page"), Some("30"));
/// assert!(params.get("q").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: BTreeMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, stringifying the value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into().to_string());
    }

    /// Insert a parameter only when a value is present.
    pub fn insert_opt<V: Into<ParamValue>>(&mut self, name: impl Into<String>, value: Option<V>) {
        if let Some(v) = value {
            self.insert(name, v);
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate parameters sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters as `(name, value)` pairs for a query string.
    pub fn as_pairs(&self) -> Vec<(&str, &str)> {
        self.iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RequestParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Join a base URL and a resource path with exactly one `/` between them.
pub fn resolve_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Canonical cache key: the absolute URL plus params sorted by name.
///
/// Identical for identical requests regardless of insertion order.
/// No type normalization happens here beyond what [`RequestParams`]
/// already did, so `30` and `"30"` only collide because both stringify
/// to the same text.
///
/// Names and values are form-urlencoded, so a value containing `&` or `=`
/// cannot impersonate extra parameters.
pub fn cache_key(url: &str, params: &RequestParams) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    format!("{url}?{query}")
}
