//! Request-side types.

pub mod params;

pub use params::{ParamValue, RequestParams, cache_key, resolve_url};
