//! Stylesheet and asset fetching (made by FontLab https://www.fontlab.com/)
//!
//! The font API decides which binary format to serve from the declared browser, so one
//! logical request becomes one stylesheet fetch per [`ClientIdentity`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::family::FamilyQuery;
use crate::model::ClientIdentity;

pub const DEFAULT_API_BASE: &str = "https://fonts.googleapis.com";
pub const STYLESHEET_ACCEPT: &str = "text/css,*/*;q=0.1";

/// Anything able to GET a URL with extra headers and hand back the body.
///
/// Implementations must be `Send + Sync`; fetches run on the rayon pool.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>>;
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>> {
        (**self).fetch(url, headers)
    }
}

/// Blocking HTTP fetcher with short, fixed timeouts and no retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    connect_timeout: Duration,
    timeout: Duration,
    max_size: usize,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Total time budget for one request, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            timeout: Duration::from_secs(3),
            max_size: 10 * 1024 * 1024,
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(self.connect_timeout))
            .timeout_global(Some(self.timeout))
            .build()
            .into();

        let mut request = agent.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let mut response = request.call().with_context(|| format!("GET {url}"))?;
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_size as u64)
            .read_to_vec()
            .with_context(|| format!("reading body of {url}"))?;
        Ok(body)
    }
}

/// Result of one client's stylesheet request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum FetchOutcome {
    Fetched(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFetch {
    pub identity: ClientIdentity,
    pub outcome: FetchOutcome,
}

impl ClientFetch {
    pub fn css(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Fetched(css) => Some(css),
            FetchOutcome::Failed(_) => None,
        }
    }
}

/// `<api_base>/css?family=<token>&subset=latin-ext`
pub fn stylesheet_url(api_base: &str, query: &FamilyQuery) -> String {
    format!(
        "{}/css?family={}&subset=latin-ext",
        api_base.trim_end_matches('/'),
        query.url_token()
    )
}

/// Request the stylesheet once per client identity.
///
/// Requests run in parallel; the result is always in [`ClientIdentity::ALL`] order.
/// An empty query performs no request at all.
pub fn fetch_all(fetcher: &dyn Fetcher, api_base: &str, query: &FamilyQuery) -> Vec<ClientFetch> {
    if query.is_empty() {
        return Vec::new();
    }

    let url = stylesheet_url(api_base, query);
    ClientIdentity::ALL
        .par_iter()
        .map(|&identity| ClientFetch {
            identity,
            outcome: fetch_one(fetcher, &url, identity),
        })
        .collect()
}

fn fetch_one(fetcher: &dyn Fetcher, url: &str, identity: ClientIdentity) -> FetchOutcome {
    let mut headers = vec![("Accept", STYLESHEET_ACCEPT)];
    let agent = identity.user_agent();
    if !agent.is_empty() {
        headers.push(("User-Agent", agent));
    }

    debug!("fetching {url} as {identity} client");
    match fetcher.fetch(url, &headers) {
        Ok(body) => FetchOutcome::Fetched(String::from_utf8_lossy(&body).into_owned()),
        Err(err) => {
            warn!("stylesheet request for {identity} client failed: {err:#}");
            FetchOutcome::Failed(format!("{err:#}"))
        }
    }
}
