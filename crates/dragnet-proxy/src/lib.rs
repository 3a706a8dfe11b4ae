mod pool;

pub use pool::ProxyPool;

use thiserror::Error;

/// Bucket keys reserved for proxies with no country information.
pub const WILDCARD_COUNTRIES: [&str; 2] = ["", "*"];

/// The narrow interface the execution engine consumes. Implementations
/// must be safe to call from concurrently running task workers.
pub trait ProxyProvider: Send + Sync {
    /// Returns an arbitrary usable proxy url, optionally constrained by
    /// country. `None` when no candidate remains.
    fn get_one_proxy(&self, country: Option<&str>) -> Option<String>;

    /// Temporarily excludes a proxy from selection.
    fn mark_bad(&self, proxy: &str);
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected provider payload: {0}")]
    Payload(String),
}
