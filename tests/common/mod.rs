#![allow(dead_code)]

use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use umbra::{Environment, Fetch, FetchError, ScriptError, ScriptHost};
use url::Url;

pub const BASE: &str = "https://example.com/page/";

pub fn env(base: &str) -> Environment {
    Environment::new(Url::parse(base).expect("valid base url"))
}

/// In-memory stylesheet server that counts fetches per URL.
pub struct FakeFetcher {
    sheets: HashMap<String, String>,
    counts: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            sheets: entries
                .iter()
                .map(|(u, body)| (u.to_string(), body.to_string()))
                .collect(),
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn count(&self, url: &str) -> usize {
        *self.counts.lock().unwrap().get(url).unwrap_or(&0)
    }
}

impl Fetch for FakeFetcher {
    fn fetch_text<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            *self
                .counts
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_insert(0) += 1;
            self.sheets
                .get(url.as_str())
                .cloned()
                .ok_or(FetchError::HttpError(404))
        })
    }
}

/// Script host that records executions in order. Inline code is logged as
/// `inline:<code>`, external loads as `load:<absolute url>`. Entries listed
/// in `failing` (by code or by url) fail instead; entries in `delays` (by
/// url, milliseconds) sleep before completing.
pub struct RecordingHost {
    pub log: Arc<Mutex<Vec<String>>>,
    pub delays: HashMap<String, u64>,
    pub failing: HashSet<String>,
}

impl RecordingHost {
    pub fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let host = Arc::new(Self {
            log: log.clone(),
            delays: HashMap::new(),
            failing: HashSet::new(),
        });
        (host, log)
    }

    pub fn with_delays(delays: &[(&str, u64)]) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let host = Arc::new(Self {
            log: log.clone(),
            delays: delays.iter().map(|(u, ms)| (u.to_string(), *ms)).collect(),
            failing: HashSet::new(),
        });
        (host, log)
    }

    pub fn with_failing(failing: &[&str]) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let host = Arc::new(Self {
            log: log.clone(),
            delays: HashMap::new(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
        });
        (host, log)
    }
}

impl ScriptHost for RecordingHost {
    fn run_inline(&self, code: &str) -> Result<(), ScriptError> {
        if self.failing.contains(code) {
            return Err(ScriptError::Execution(format!("throw in {code}")));
        }
        self.log.lock().unwrap().push(format!("inline:{code}"));
        Ok(())
    }

    fn load_external<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), ScriptError>> {
        Box::pin(async move {
            if let Some(ms) = self.delays.get(url) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.failing.contains(url) {
                return Err(ScriptError::Load(format!("failed to load {url}")));
            }
            self.log.lock().unwrap().push(format!("load:{url}"));
            Ok(())
        })
    }
}
