//! Parameter forwarding policy for client-supplied query strings.
//!
//! Only allow-listed names reach the fetcher, and page-size parameters are
//! clamped, so arbitrary client input can neither widen the upstream query
//! surface nor request oversized pages. Stateless.

use std::collections::BTreeSet;

use crate::types::RequestParams;

/// Largest `per_page` forwarded upstream.
pub const MAX_PER_PAGE: u32 = 100;

/// `per_page` used when the client sends none or an unusable value.
pub const DEFAULT_PER_PAGE: u32 = 30;

/// Names forwarded for `/observations` searches.
const OBSERVATION_PARAMS: &[&str] = &[
    "page",
    "per_page",
    "taxon_id",
    "place_id",
    "user_id",
    "project_id",
    "order_by",
    "order",
    "q",
    "d1",
    "d2",
    "verifiable",
    "quality_grade",
];

/// Names whose values are booleans and get lowercased.
const BOOLEAN_PARAMS: &[&str] = &["verifiable"];

/// Allow-list plus page-size clamp.
///
/// ```rust
/// # use inatproxy::forward::ForwardPolicy;
/// let params = ForwardPolicy::observations().sanitize([
///     ("per_page", "150"),
///     ("verifiable", "True"),
///     ("api_key", "leak"),
/// ]);
/// assert_eq!(params.get("per_page"), Some("100"));
/// assert_eq!(params.get("verifiable"), Some("true"));
/// assert!(params.get("api_key").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ForwardPolicy {
    allowed: BTreeSet<String>,
    max_per_page: u32,
    default_per_page: u32,
}

impl ForwardPolicy {
    /// Policy with an explicit allow-list and the default page limits.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            max_per_page: MAX_PER_PAGE,
            default_per_page: DEFAULT_PER_PAGE,
        }
    }

    /// The allow-list for observation searches.
    pub fn observations() -> Self {
        Self::new(OBSERVATION_PARAMS.iter().copied())
    }

    /// Additionally forward `name`.
    pub fn allow_extra(mut self, name: impl Into<String>) -> Self {
        self.allowed.insert(name.into());
        self
    }

    /// Override the page-size ceiling.
    pub fn max_per_page(mut self, n: u32) -> Self {
        self.max_per_page = n;
        self
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    /// Filter raw query pairs down to the forwardable set.
    ///
    /// Later duplicates override earlier ones. `per_page` is always
    /// present in the result.
    pub fn sanitize<I, K, V>(&self, pairs: I) -> RequestParams
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = RequestParams::new();
        for (name, value) in pairs {
            let (name, value) = (name.as_ref(), value.as_ref());
            if !self.is_allowed(name) {
                continue;
            }
            if BOOLEAN_PARAMS.contains(&name) {
                params.insert(name, normalize_bool(value));
            } else {
                params.insert(name, value);
            }
        }
        let per_page = self.per_page(params.get("per_page"));
        params.insert("per_page", per_page);
        params
    }

    /// Clamp a raw `per_page` value.
    ///
    /// Missing, non-numeric or non-positive values fall back to the default;
    /// large values are cut to the ceiling.
    pub fn per_page(&self, raw: Option<&str>) -> u32 {
        match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) if n >= 1 => n.min(i64::from(self.max_per_page)) as u32,
            _ => self.default_per_page,
        }
    }
}

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self::observations()
    }
}

fn normalize_bool(value: &str) -> String {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        value.to_ascii_lowercase()
    } else {
        value.to_string()
    }
}
