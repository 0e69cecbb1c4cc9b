//! End-to-end install pipeline (made by FontLab https://www.fontlab.com/)

use std::collections::BTreeMap;
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::cache::{AssetCache, AssetOutcome, Sanitizer, DEFAULT_CACHE_DIR, DEFAULT_PUBLIC_PREFIX};
use crate::emit::{render, EmitOptions};
use crate::family::FamilyQuery;
use crate::fetch::{fetch_all, ClientFetch, Fetcher, HttpFetcher, DEFAULT_API_BASE};
use crate::model::{AggregatedFontFace, ClientIdentity, RawFontFace, Subset};
use crate::parse::{FontFaceParser, DEFAULT_ASSET_ORIGIN};

/// Settings for one installer; every field has a working default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallOptions {
    /// Font API root; `/css` is appended.
    pub api_base: String,
    /// Only asset URLs under this prefix are accepted from stylesheets.
    pub asset_origin: String,
    /// Where binaries are written.
    pub cache_dir: PathBuf,
    /// Prefix of the local URLs written into the CSS.
    pub public_prefix: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Worker threads for fetches and downloads; `None` uses rayon's global pool.
    pub jobs: Option<usize>,
    pub omit_empty_blocks: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            asset_origin: DEFAULT_ASSET_ORIGIN.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
            connect_timeout_secs: 3,
            timeout_secs: 3,
            jobs: None,
            omit_empty_blocks: false,
        }
    }
}

impl InstallOptions {
    /// Defaults overlaid with `FONTPULL_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = lookup("FONTPULL_API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = lookup("FONTPULL_ASSET_ORIGIN") {
            self.asset_origin = v;
        }
        if let Some(v) = lookup("FONTPULL_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FONTPULL_PUBLIC_PREFIX") {
            self.public_prefix = v;
        }
        self
    }

    /// HTTP fetcher configured with these timeouts.
    pub fn http_fetcher(&self) -> HttpFetcher {
        HttpFetcher::new()
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Everything one family install did, stage by stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub query: FamilyQuery,
    pub clients: Vec<ClientFetch>,
    pub faces: Vec<AggregatedFontFace>,
    pub assets: Vec<AssetOutcome>,
    pub css: String,
}

impl InstallReport {
    fn empty(query: FamilyQuery) -> Self {
        Self {
            query,
            clients: Vec::new(),
            faces: Vec::new(),
            assets: Vec::new(),
            css: String::new(),
        }
    }
}

pub struct FontInstaller {
    options: InstallOptions,
    parser: FontFaceParser,
    cache: AssetCache,
    fetcher: Arc<dyn Fetcher>,
    pool: Option<ThreadPool>,
}

impl FontInstaller {
    pub fn new(options: InstallOptions, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let parser = FontFaceParser::new(&options.asset_origin)?;
        let cache = AssetCache::new(options.cache_dir.clone(), options.public_prefix.clone());
        let pool = match options.jobs {
            Some(jobs) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build()
                    .context("building install thread pool")?,
            ),
            None => None,
        };

        Ok(Self {
            options,
            parser,
            cache,
            fetcher,
            pool,
        })
    }

    /// Installer talking to the real API over HTTP.
    pub fn with_http(options: InstallOptions) -> Result<Self> {
        let fetcher = Arc::new(options.http_fetcher());
        Self::new(options, fetcher)
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.cache = self.cache.with_sanitizer(sanitizer);
        self
    }

    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    /// Fetch, parse, merge, cache and render one family.
    ///
    /// Never fails: unreachable clients or assets only make the CSS leaner.
    pub fn install(&self, raw_family: &str) -> InstallReport {
        match &self.pool {
            Some(pool) => pool.install(|| self.run(raw_family)),
            None => self.run(raw_family),
        }
    }

    /// Install each distinct family once, in the given order.
    pub fn install_many<S: AsRef<str>>(&self, families: &[S]) -> Vec<InstallReport> {
        let mut seen = Vec::new();
        let mut reports = Vec::new();
        for raw in families {
            let query = FamilyQuery::normalize(raw.as_ref());
            if query.is_empty() || seen.contains(&query) {
                continue;
            }
            seen.push(query);
            reports.push(self.install(raw.as_ref()));
        }
        reports
    }

    fn run(&self, raw_family: &str) -> InstallReport {
        let query = FamilyQuery::normalize(raw_family);
        if query.is_empty() {
            return InstallReport::empty(query);
        }

        let clients = fetch_all(self.fetcher.as_ref(), &self.options.api_base, &query);
        let parsed: Vec<(ClientIdentity, BTreeMap<Subset, RawFontFace>)> = clients
            .iter()
            .filter_map(|client| client.css().map(|css| (client.identity, self.parser.parse(css))))
            .collect();

        let mut faces = aggregate(parsed.iter().map(|(identity, records)| (*identity, records)));
        let assets: Vec<AssetOutcome> = faces
            .iter_mut()
            .flat_map(|face| self.cache.resolve(face, self.fetcher.as_ref()))
            .collect();

        let css = render(
            &faces,
            &EmitOptions {
                omit_empty_blocks: self.options.omit_empty_blocks,
            },
        );

        info!(
            "{}: {}/{} clients answered, {} faces, {} assets",
            query.name(),
            clients.iter().filter(|c| c.css().is_some()).count(),
            clients.len(),
            faces.len(),
            assets.len()
        );

        InstallReport {
            query,
            clients,
            faces,
            assets,
            css,
        }
    }
}

/// Join the non-empty fragments of several reports with a newline.
pub fn combine_css(reports: &[InstallReport]) -> String {
    reports
        .iter()
        .map(|r| r.css.as_str())
        .filter(|css| !css.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append `css` to an existing stylesheet, surrounded by newlines.
///
/// Does nothing for an empty fragment; a missing file is an error.
pub fn append_fragment(path: &Path, css: &str) -> Result<()> {
    if css.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("opening stylesheet {}", path.display()))?;
    write!(file, "\n{css}\n").with_context(|| format!("appending to {}", path.display()))?;
    Ok(())
}
