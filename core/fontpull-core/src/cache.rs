//! Local cache of downloaded font binaries (made by FontLab https://www.fontlab.com/)

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::fetch::Fetcher;
use crate::model::{AggregatedFontFace, FontFormat, FontKey, Subset};

pub const DEFAULT_CACHE_DIR: &str = "custom/fonts";
pub const DEFAULT_PUBLIC_PREFIX: &str = "../../custom/fonts";

/// Turns arbitrary text into a single safe path component.
pub type Sanitizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Replace every run of characters outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(raw: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re =
        UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid sanitizer regex"));
    let cleaned = re.replace_all(raw, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

/// What happened to one (subset, format) asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AssetResult {
    Cached { path: PathBuf, public_url: String },
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOutcome {
    #[serde(flatten)]
    pub key: FontKey,
    pub subset: Subset,
    pub format: FontFormat,
    pub remote_url: String,
    pub result: AssetResult,
}

/// Downloads assets into `<root>/<family>/<family-style-weight-subset><ext>`.
pub struct AssetCache {
    root: PathBuf,
    public_prefix: String,
    sanitizer: Sanitizer,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("root", &self.root)
            .field("public_prefix", &self.public_prefix)
            .finish_non_exhaustive()
    }
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
            sanitizer: Arc::new(sanitize_filename),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    fn folder_name(&self, key: &FontKey) -> String {
        (self.sanitizer)(&key.family)
    }

    fn file_name(&self, key: &FontKey, subset: Subset, format: &FontFormat) -> String {
        let stem = format!(
            "{}-{}-{}-{}",
            key.family,
            key.style,
            key.weight,
            subset.file_component()
        );
        format!("{}{}", (self.sanitizer)(&stem), format.extension())
    }

    /// Filesystem location of the asset.
    pub fn local_path(&self, key: &FontKey, subset: Subset, format: &FontFormat) -> PathBuf {
        self.root
            .join(self.folder_name(key))
            .join(self.file_name(key, subset, format))
    }

    /// URL written into the stylesheet once the asset is cached.
    pub fn public_url(&self, key: &FontKey, subset: Subset, format: &FontFormat) -> String {
        format!(
            "{}/{}/{}",
            self.public_prefix.trim_end_matches('/'),
            self.folder_name(key),
            self.file_name(key, subset, format)
        )
    }

    /// Write `bytes` to the asset's path through a temp file and an atomic rename.
    pub fn store(
        &self,
        key: &FontKey,
        subset: Subset,
        format: &FontFormat,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.local_path(key, subset, format);
        let folder = path
            .parent()
            .ok_or_else(|| anyhow!("asset path has no parent: {}", path.display()))?;
        fs::create_dir_all(folder).with_context(|| format!("creating {}", folder.display()))?;

        let lock = self.lock_for(&path);
        let written = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            write_atomically(folder, &path, bytes)
        };
        self.release_lock(&path, lock);
        written?;

        if !path.is_file() {
            return Err(anyhow!("{} missing after write", path.display()));
        }
        Ok(path)
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Drop the path's entry once no other writer holds or waits on it.
    fn release_lock(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // clones are only handed out under `locks`, so map + ours means idle
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    fn download(
        &self,
        fetcher: &dyn Fetcher,
        key: &FontKey,
        subset: Subset,
        format: &FontFormat,
        url: &str,
    ) -> AssetResult {
        let stored = fetcher
            .fetch(url, &[])
            .and_then(|bytes| {
                if bytes.is_empty() {
                    Err(anyhow!("empty response from {url}"))
                } else {
                    Ok(bytes)
                }
            })
            .and_then(|bytes| self.store(key, subset, format, &bytes));

        match stored {
            Ok(path) => {
                debug!("cached {url} at {}", path.display());
                AssetResult::Cached {
                    path,
                    public_url: self.public_url(key, subset, format),
                }
            }
            Err(err) => {
                warn!("keeping remote {format} for {} ({subset:?}): {err:#}", key.family);
                AssetResult::Fallback {
                    reason: format!("{err:#}"),
                }
            }
        }
    }

    /// Download every known-format asset of `face` and point cached ones at local copies.
    ///
    /// Failures leave the remote URL in place; one failure never stops the others.
    pub fn resolve(
        &self,
        face: &mut AggregatedFontFace,
        fetcher: &dyn Fetcher,
    ) -> Vec<AssetOutcome> {
        let jobs: Vec<(Subset, FontFormat, String)> = face
            .subsets
            .iter()
            .flat_map(|(subset, sources)| {
                sources
                    .urls
                    .iter()
                    .filter(|(format, _)| format.is_known())
                    .map(move |(format, url)| (*subset, format.clone(), url.clone()))
            })
            .collect();

        let key = &face.key;
        let outcomes: Vec<AssetOutcome> = jobs
            .into_par_iter()
            .map(|(subset, format, remote_url)| {
                let result = self.download(fetcher, key, subset, &format, &remote_url);
                AssetOutcome {
                    key: key.clone(),
                    subset,
                    format,
                    remote_url,
                    result,
                }
            })
            .collect();

        for outcome in &outcomes {
            if let AssetResult::Cached { public_url, .. } = &outcome.result {
                if let Some(slot) = face
                    .subsets
                    .get_mut(&outcome.subset)
                    .and_then(|sources| sources.urls.get_mut(&outcome.format))
                {
                    *slot = public_url.clone();
                }
            }
        }

        outcomes
    }
}

fn write_atomically(folder: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(folder)
        .with_context(|| format!("creating temp file in {}", folder.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("persisting {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubsetSources;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    struct Canned;

    impl Fetcher for Canned {
        fn fetch(&self, url: &str, _headers: &[(&str, &str)]) -> Result<Vec<u8>> {
            if url.contains("broken") {
                Err(anyhow!("timed out"))
            } else if url.contains("empty") {
                Ok(Vec::new())
            } else {
                Ok(b"wOF2fake".to_vec())
            }
        }
    }

    fn key() -> FontKey {
        FontKey {
            family: "Open Sans".into(),
            style: "normal".into(),
            weight: "400".into(),
        }
    }

    fn face(urls: &[(FontFormat, &str)]) -> AggregatedFontFace {
        let mut face = AggregatedFontFace::new(key());
        face.subsets.insert(
            Subset::Latin,
            SubsetSources {
                unicode_range: None,
                urls: urls
                    .iter()
                    .map(|(f, u)| (f.clone(), u.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            },
        );
        face
    }

    #[test]
    fn sanitizes_spaces_and_separators() {
        assert_eq!(sanitize_filename("Open Sans"), "Open_Sans");
        assert_eq!(sanitize_filename("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_filename("Open Sans-normal-400-"), "Open_Sans-normal-400-");
        assert_eq!(sanitize_filename(""), "_");
    }

    #[test]
    fn paths_are_deterministic() {
        let cache = AssetCache::new("/srv/fonts", "../../custom/fonts/");
        assert_eq!(
            cache.local_path(&key(), Subset::LatinExt, &FontFormat::TrueType),
            PathBuf::from("/srv/fonts/Open_Sans/Open_Sans-normal-400-latin-ext.ttf")
        );
        assert_eq!(
            cache.public_url(&key(), Subset::Default, &FontFormat::Woff2),
            "../../custom/fonts/Open_Sans/Open_Sans-normal-400-.woff2"
        );
    }

    #[test]
    fn custom_sanitizer_is_used_for_folder_and_file() {
        let cache = AssetCache::new("/c", "p")
            .with_sanitizer(Arc::new(|s: &str| s.replace(' ', "-").to_lowercase()));
        assert_eq!(
            cache.local_path(&key(), Subset::Latin, &FontFormat::Woff),
            PathBuf::from("/c/open-sans/open-sans-normal-400-latin.woff")
        );
    }

    #[test]
    fn cached_assets_replace_remote_urls() {
        let tmp = tempdir().expect("tempdir");
        let cache = AssetCache::new(tmp.path(), "fonts");
        let mut face = face(&[(FontFormat::Woff2, "https://fonts.gstatic.com/ok.woff2")]);

        let outcomes = cache.resolve(&mut face, &Canned);

        assert_eq!(outcomes.len(), 1);
        let path = tmp.path().join("Open_Sans/Open_Sans-normal-400-latin.woff2");
        assert_eq!(fs::read(&path).expect("cached file"), b"wOF2fake");
        assert_eq!(
            face.subsets[&Subset::Latin].urls[&FontFormat::Woff2],
            "fonts/Open_Sans/Open_Sans-normal-400-latin.woff2"
        );
    }

    #[test]
    fn failures_keep_remote_url_and_write_nothing() {
        let tmp = tempdir().expect("tempdir");
        let cache = AssetCache::new(tmp.path(), "fonts");
        let mut face = face(&[
            (FontFormat::Woff, "https://fonts.gstatic.com/broken.woff"),
            (FontFormat::Eot, "https://fonts.gstatic.com/empty.eot"),
            (FontFormat::Woff2, "https://fonts.gstatic.com/ok.woff2"),
        ]);

        let outcomes = cache.resolve(&mut face, &Canned);

        let latin = &face.subsets[&Subset::Latin];
        assert_eq!(latin.urls[&FontFormat::Woff], "https://fonts.gstatic.com/broken.woff");
        assert_eq!(latin.urls[&FontFormat::Eot], "https://fonts.gstatic.com/empty.eot");
        assert!(latin.urls[&FontFormat::Woff2].starts_with("fonts/"));
        assert!(!tmp.path().join("Open_Sans/Open_Sans-normal-400-latin.woff").exists());
        assert!(!tmp.path().join("Open_Sans/Open_Sans-normal-400-latin.eot").exists());

        let fallbacks = outcomes
            .iter()
            .filter(|o| matches!(o.result, AssetResult::Fallback { .. }))
            .count();
        assert_eq!(fallbacks, 2);
    }

    #[test]
    fn unknown_formats_are_not_downloaded() {
        let tmp = tempdir().expect("tempdir");
        let cache = AssetCache::new(tmp.path(), "fonts");
        let mut face = face(&[(
            FontFormat::Other("svg".into()),
            "https://fonts.gstatic.com/a.svg",
        )]);

        assert!(cache.resolve(&mut face, &Canned).is_empty());
        assert!(!tmp.path().join("Open_Sans").exists());
    }

    #[test]
    fn blocked_family_folder_keeps_remote_url() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("Open_Sans"), b"not a directory").expect("blocker");
        let cache = AssetCache::new(tmp.path(), "fonts");
        let mut face = face(&[(FontFormat::Woff2, "https://fonts.gstatic.com/ok.woff2")]);

        let outcomes = cache.resolve(&mut face, &Canned);

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, AssetResult::Fallback { .. }));
        assert_eq!(
            face.subsets[&Subset::Latin].urls[&FontFormat::Woff2],
            "https://fonts.gstatic.com/ok.woff2"
        );
        assert!(tmp.path().join("Open_Sans").is_file());
        assert!(!tmp
            .path()
            .join("Open_Sans/Open_Sans-normal-400-latin.woff2")
            .exists());
    }

    #[test]
    fn concurrent_stores_leave_one_complete_file() {
        let tmp = tempdir().expect("tempdir");
        let cache = AssetCache::new(tmp.path(), "fonts");
        let payload = b"wOF2".repeat(4096);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    cache
                        .store(&key(), Subset::Latin, &FontFormat::Woff2, &payload)
                        .expect("store")
                });
            }
        });

        let folder = tmp.path().join("Open_Sans");
        let path = folder.join("Open_Sans-normal-400-latin.woff2");
        assert_eq!(fs::read(&path).expect("cached file"), payload);

        let names: Vec<String> = fs::read_dir(&folder)
            .expect("folder")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Open_Sans-normal-400-latin.woff2".to_string()]);
    }

    #[test]
    fn write_locks_are_released_after_use() {
        let tmp = tempdir().expect("tempdir");
        let cache = AssetCache::new(tmp.path(), "fonts");
        let mut face = face(&[
            (FontFormat::Woff2, "https://fonts.gstatic.com/ok.woff2"),
            (FontFormat::TrueType, "https://fonts.gstatic.com/ok.ttf"),
        ]);

        cache.resolve(&mut face, &Canned);
        cache
            .store(&key(), Subset::Default, &FontFormat::Woff, b"wOFF")
            .expect("store");

        assert!(cache.locks.lock().expect("locks").is_empty());
    }
}
