//! Host-environment collaborators: network fetch, media-query evaluation,
//! and script execution. The renderer only ever talks to these traits; the
//! embedder decides what actually backs them.

#[cfg(feature = "fetch")]
mod http;

#[cfg(feature = "fetch")]
pub use http::{HttpConfig, HttpFetcher};

use crate::script::ScriptError;
use futures::future::BoxFuture;
use std::sync::Arc;
use url::Url;

/// Fetches text over the network. Methods return boxed futures so the trait
/// stays object-safe.
pub trait Fetch: Send + Sync {
    fn fetch_text<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, FetchError>>;
}

/// Evaluates a `media` attribute against the current environment.
pub trait MediaMatcher: Send + Sync {
    fn matches(&self, query: &str) -> bool;
}

/// Executes replayed scripts on behalf of the embedder. Inserting an inline
/// script triggers `run_inline` synchronously; external scripts are awaited
/// through `load_external` until their load or error signal.
pub trait ScriptHost: Send + Sync {
    fn run_inline(&self, code: &str) -> Result<(), ScriptError>;

    fn load_external<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), ScriptError>>;
}

/// Treats every media query as matching, the degradation the resolver uses
/// when no real evaluator is available.
pub struct MatchAllMedia;

impl MediaMatcher for MatchAllMedia {
    fn matches(&self, _query: &str) -> bool {
        true
    }
}

/// Script host that executes nothing. The default for hosts that only care
/// about markup and fonts.
pub struct InertScriptHost;

impl ScriptHost for InertScriptHost {
    fn run_inline(&self, _code: &str) -> Result<(), ScriptError> {
        Ok(())
    }

    fn load_external<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<(), ScriptError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Fetcher that fails every request. The default until the embedder supplies
/// a real one (or enables the `fetch` feature's [`HttpFetcher`]).
pub struct OfflineFetcher;

impl Fetch for OfflineFetcher {
    fn fetch_text<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move { Err(FetchError::Network(format!("no fetcher configured for {url}"))) })
    }
}

/// The collaborators a render call runs against, plus the host's own base
/// URL (the fallback when a document declares no `<base>`).
#[derive(Clone)]
pub struct Environment {
    pub fetcher: Arc<dyn Fetch>,
    pub media: Arc<dyn MediaMatcher>,
    pub scripts: Arc<dyn ScriptHost>,
    pub base_url: Url,
}

impl Environment {
    /// Environment with inert collaborators: offline fetch, match-all media,
    /// no-op scripts.
    pub fn new(base_url: Url) -> Self {
        Self {
            fetcher: Arc::new(OfflineFetcher),
            media: Arc::new(MatchAllMedia),
            scripts: Arc::new(InertScriptHost),
            base_url,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaMatcher>) -> Self {
        self.media = media;
        self
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptHost>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Swap in a reqwest-backed fetcher with default configuration.
    #[cfg(feature = "fetch")]
    pub fn with_http_fetcher(self) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new()?;
        Ok(self.with_fetcher(Arc::new(fetcher)))
    }
}

#[derive(Debug)]
pub enum FetchError {
    InvalidUrl(String),
    Network(String),
    HttpError(u16),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            FetchError::Network(e) => write!(f, "Network error: {}", e),
            FetchError::HttpError(code) => write!(f, "HTTP error: {}", code),
        }
    }
}

impl std::error::Error for FetchError {}
