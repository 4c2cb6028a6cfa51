//! Format prober: derive the WebP twin of an asset and check whether it loads
//!
//! Only identities served from an allow-listed host are rewritten; anything
//! else passes through unchanged. Existence is established by actually loading
//! the candidate through a [`ResourceLoader`], bounded by an optional timeout.

use crate::{
    error::{LoadError, LoadResult},
    types::{RawImage, ResourceId},
};

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// Storage host that serves pre-built WebP twins
pub const DEFAULT_ASSET_HOST: &str = "updatedcardscript.standard.us-east-1.oortstorages.com";

/// Default bound on a single existence check
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can fetch and decode an image resource
pub trait ResourceLoader: Send + Sync {
    /// Load and decode the resource, blocking until it settles
    fn load(&self, id: &ResourceId) -> LoadResult<RawImage>;

    /// Get the implementation name
    fn name(&self) -> &str;
}

/// Host substrings eligible for suffix probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAllowList {
    hosts: Vec<String>,
}

impl Default for HostAllowList {
    fn default() -> Self {
        Self::single(DEFAULT_ASSET_HOST)
    }
}

impl HostAllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(host: impl Into<String>) -> Self {
        Self {
            hosts: vec![host.into()],
        }
    }

    /// An allow-list that permits nothing
    pub fn empty() -> Self {
        Self { hosts: Vec::new() }
    }

    pub fn permits(&self, id: &ResourceId) -> bool {
        self.hosts
            .iter()
            .any(|host| !host.is_empty() && id.as_str().contains(host.as_str()))
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

/// Derives WebP candidates and checks whether they exist
pub struct Prober {
    allow_list: HostAllowList,
    loader: Arc<dyn ResourceLoader>,
    timeout: Option<Duration>,
    probes: AtomicU64,
}

impl Prober {
    pub fn new(allow_list: HostAllowList, loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            allow_list,
            loader,
            timeout: Some(DEFAULT_PROBE_TIMEOUT),
            probes: AtomicU64::new(0),
        }
    }

    /// Set the bound on each load; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn allow_list(&self) -> &HostAllowList {
        &self.allow_list
    }

    /// Number of existence checks performed
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// WebP identity to try for `source`.
    ///
    /// Returns `source` unchanged when its host is not allow-listed or it has
    /// no `.jpg`/`.jpeg`/`.png` suffix.
    pub fn candidate(&self, source: &ResourceId) -> ResourceId {
        if !self.allow_list.permits(source) {
            return source.clone();
        }
        source.with_webp_suffix().unwrap_or_else(|| source.clone())
    }

    /// Whether `id` loads and decodes. Any load error or timeout counts as absent.
    pub fn exists(&self, id: &ResourceId) -> bool {
        self.fetch(id).is_some()
    }

    /// Decoded candidate if it loads, `None` otherwise
    pub fn fetch(&self, id: &ResourceId) -> Option<RawImage> {
        self.probes.fetch_add(1, Ordering::Relaxed);
        match self.load(id) {
            Ok(image) => Some(image),
            Err(e) if e.is_expected() => {
                log::debug!("No WebP twin at {}", id);
                None
            }
            Err(e) => {
                log::warn!("Probe for {} failed: {}", id, e);
                None
            }
        }
    }

    /// Load through the configured loader, honouring the timeout
    pub fn load(&self, id: &ResourceId) -> LoadResult<RawImage> {
        let Some(timeout) = self.timeout else {
            return self.loader.load(id);
        };

        let (tx, rx) = bounded(1);
        let loader = Arc::clone(&self.loader);
        let target = id.clone();
        thread::Builder::new()
            .name("webp-probe".to_string())
            .spawn(move || {
                // Receiver may have given up already
                let _ = tx.send(loader.load(&target));
            })
            .map_err(|_| LoadError::Disconnected(id.to_string()))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(LoadError::Timeout {
                id: id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(LoadError::Disconnected(id.to_string())),
        }
    }
}

/// Loads identities as filesystem paths or `file://` URLs
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve identities relative to `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Filesystem path an identity maps to
    pub fn resolve(&self, id: &ResourceId) -> PathBuf {
        let raw = id.as_str();
        let raw = raw.strip_prefix("file://").unwrap_or(raw);
        match &self.root {
            Some(root) => root.join(raw.trim_start_matches('/')),
            None => Path::new(raw).to_path_buf(),
        }
    }
}

impl ResourceLoader for FsLoader {
    fn load(&self, id: &ResourceId) -> LoadResult<RawImage> {
        let path = self.resolve(id);
        if !path.is_file() {
            return Err(LoadError::NotFound(id.to_string()));
        }
        image::open(&path).map(RawImage::from).map_err(|e| LoadError::Decode {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "FsLoader"
    }
}

/// In-memory asset host
#[derive(Debug, Default)]
pub struct MemoryLoader {
    assets: RwLock<HashMap<ResourceId, RawImage>>,
    requests: RwLock<HashMap<ResourceId, u64>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `image` at `id`
    pub fn insert(&self, id: impl Into<ResourceId>, image: RawImage) {
        self.assets.write().insert(id.into(), image);
    }

    pub fn remove(&self, id: &ResourceId) -> Option<RawImage> {
        self.assets.write().remove(id)
    }

    /// How many times `id` was requested
    pub fn request_count(&self, id: &ResourceId) -> u64 {
        self.requests.read().get(id).copied().unwrap_or(0)
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, id: &ResourceId) -> LoadResult<RawImage> {
        *self.requests.write().entry(id.clone()).or_insert(0) += 1;
        self.assets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(id.to_string()))
    }

    fn name(&self) -> &str {
        "MemoryLoader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StallingLoader(Duration);

    impl ResourceLoader for StallingLoader {
        fn load(&self, _id: &ResourceId) -> LoadResult<RawImage> {
            thread::sleep(self.0);
            Ok(RawImage::solid(1, 1, [0, 0, 0, 255]))
        }

        fn name(&self) -> &str {
            "StallingLoader"
        }
    }

    fn prober_with(loader: Arc<dyn ResourceLoader>) -> Prober {
        Prober::new(HostAllowList::single("assetshost.example"), loader)
    }

    #[test]
    fn test_candidate_on_allowed_host() {
        let prober = prober_with(Arc::new(MemoryLoader::new()));
        let source = ResourceId::new("https://assetshost.example/emeralds/raw.JPG");
        assert_eq!(
            prober.candidate(&source).as_str(),
            "https://assetshost.example/emeralds/raw.webp"
        );
    }

    #[test]
    fn test_candidate_passthrough_on_other_host() {
        let prober = prober_with(Arc::new(MemoryLoader::new()));
        let source = ResourceId::new("https://elsewhere.example/raw.jpg");
        assert_eq!(prober.candidate(&source), source);
    }

    #[test]
    fn test_empty_allow_list_permits_nothing() {
        let list = HostAllowList::new([""]);
        assert!(!list.permits(&ResourceId::new("https://a/b.jpg")));
        assert!(!HostAllowList::empty().permits(&ResourceId::new("https://a/b.jpg")));
    }

    #[test]
    fn test_exists_reflects_loader() {
        let loader = Arc::new(MemoryLoader::new());
        loader.insert("https://assetshost.example/a.webp", RawImage::solid(2, 2, [1, 1, 1, 255]));
        let prober = prober_with(loader.clone());

        assert!(prober.exists(&ResourceId::new("https://assetshost.example/a.webp")));
        assert!(!prober.exists(&ResourceId::new("https://assetshost.example/b.webp")));
        assert_eq!(prober.probe_count(), 2);
        assert_eq!(
            loader.request_count(&ResourceId::new("https://assetshost.example/b.webp")),
            1
        );
    }

    #[test]
    fn test_probe_times_out() {
        let prober = prober_with(Arc::new(StallingLoader(Duration::from_millis(500))))
            .with_timeout(Some(Duration::from_millis(20)));
        let id = ResourceId::new("https://assetshost.example/slow.webp");

        assert!(matches!(prober.load(&id), Err(LoadError::Timeout { timeout_ms: 20, .. })));
        assert!(!prober.exists(&id));
    }

    #[test]
    fn test_unbounded_probe_waits() {
        let prober = prober_with(Arc::new(StallingLoader(Duration::from_millis(30))))
            .with_timeout(None);
        assert!(prober.exists(&ResourceId::new("https://assetshost.example/slow.webp")));
    }

    #[test]
    fn test_fs_loader_resolution() {
        let loader = FsLoader::with_root("/srv/site");
        assert_eq!(
            loader.resolve(&ResourceId::new("file:///images/a.jpg")),
            PathBuf::from("/srv/site/images/a.jpg")
        );
        assert!(matches!(
            FsLoader::new().load(&ResourceId::new("/definitely/missing.webp")),
            Err(LoadError::NotFound(_))
        ));
    }
}
