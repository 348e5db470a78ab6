//! inatproxy - caching, retrying, concurrency-bounded iNaturalist proxy
//!
//! The core is [`Fetcher`]: given a resource path and query parameters it
//! returns the upstream JSON document, answering repeated reads from a TTL
//! cache, bounding in-flight upstream calls, and retrying rate limits,
//! server errors and transport failures with exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use inatproxy::{Fetcher, RequestParams};
//! use inatproxy::forward::ForwardPolicy;
//!
//! #[tokio::main]
//! async fn main() -> inatproxy::Result<()> {
//!     let fetcher = Fetcher::builder().max_concurrent(4).build()?;
//!
//!     let params = ForwardPolicy::observations().sanitize([
//!         ("taxon_id", "47126"),
//!         ("per_page", "5"),
//!     ]);
//!     let page = fetcher.fetch("observations", &params).await?;
//!     println!("{}", page["total_results"]);
//!
//!     let taxon = fetcher.fetch("taxa/47126", &RequestParams::new()).await?;
//!     println!("{}", taxon["results"][0]["name"]);
//!     Ok(())
//! }
//! ```
//!
//! The `server` feature (on by default) adds the axum HTTP surface and the
//! `inatd` daemon.

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod forward;
pub mod gate;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;
pub mod upstream;
mod version;

pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};

// Re-export main types at crate root
pub use cache::{CacheConfig, ResponseCache};
pub use error::{ProxyError, Result};
pub use fetcher::{Fetcher, FetcherBuilder};
pub use gate::ConcurrencyGate;
pub use types::{ParamValue, RequestParams};
pub use upstream::{AttemptOutcome, HttpTransport, RetryConfig, Transport};
