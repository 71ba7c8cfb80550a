#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use modtrack::app::{EngineOptions, SyncEngine};
use modtrack::domain::{
    DetailedMod, Fingerprint, FingerprintRegistry, FingerprintScheme, InstalledMod, ModRegistry,
    ModSummary, ModVersion, RemoteMatch, SearchableRegistry, TargetPlatform, best_version,
};
use modtrack::infra::fingerprint::fingerprint;
use modtrack::infra::{ApiService, ConnectionLimiter, ManifestStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// In-memory registry serving canned mods and artifacts.
pub struct FakeRegistry {
    provider: &'static str,
    scheme: Option<FingerprintScheme>,
    searchable: bool,
    mods: Mutex<BTreeMap<String, (ModSummary, Vec<ModVersion>)>>,
    slugs: Mutex<BTreeMap<String, String>>,
    artifacts: Mutex<BTreeMap<String, Bytes>>,
    failing_downloads: Mutex<HashSet<String>>,
    unnamed: Mutex<HashSet<String>>,
    broken_info: Mutex<HashSet<String>>,
    pub downloads: AtomicUsize,
}

impl FakeRegistry {
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            scheme: None,
            searchable: false,
            mods: Mutex::new(BTreeMap::new()),
            slugs: Mutex::new(BTreeMap::new()),
            artifacts: Mutex::new(BTreeMap::new()),
            failing_downloads: Mutex::new(HashSet::new()),
            unnamed: Mutex::new(HashSet::new()),
            broken_info: Mutex::new(HashSet::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn with_fingerprints(mut self, scheme: FingerprintScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn with_search(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn with_mod(self, id: &str, name: &str, versions: Vec<ModVersion>) -> Self {
        self.mods
            .lock()
            .insert(id.to_string(), (summary(id, name), versions));
        self
    }

    pub fn with_slug(self, slug: &str, id: &str) -> Self {
        self.slugs.lock().insert(slug.to_string(), id.to_string());
        self
    }

    pub fn publish(&self, mod_id: &str, version: ModVersion) {
        if let Some((_, versions)) = self.mods.lock().get_mut(mod_id) {
            versions.push(version);
        }
    }

    pub fn set_artifact(&self, version_id: &str, content: impl Into<Bytes>) {
        self.artifacts
            .lock()
            .insert(version_id.to_string(), content.into());
    }

    pub fn fail_download(&self, version_id: &str) {
        self.failing_downloads.lock().insert(version_id.to_string());
    }

    /// Fingerprint matches for this mod come back without a name.
    pub fn hide_name(&self, mod_id: &str) {
        self.unnamed.lock().insert(mod_id.to_string());
    }

    /// `info` for this mod errors; version and detail lookups still work.
    pub fn fail_info(&self, mod_id: &str) {
        self.broken_info.lock().insert(mod_id.to_string());
    }

    pub fn artifact(&self, version_id: &str) -> Bytes {
        self.artifacts
            .lock()
            .get(version_id)
            .cloned()
            .unwrap_or_else(|| Bytes::from(format!("jar contents of {version_id}")))
    }

    fn canonical(&self, id_or_slug: &str) -> String {
        self.slugs
            .lock()
            .get(id_or_slug)
            .cloned()
            .unwrap_or_else(|| id_or_slug.to_string())
    }

    fn lookup(&self, id_or_slug: &str) -> anyhow::Result<(ModSummary, Vec<ModVersion>)> {
        let id = self.canonical(id_or_slug);
        self.mods
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Project not found: {id_or_slug}"))
    }
}

#[async_trait]
impl ModRegistry for FakeRegistry {
    fn provider_id(&self) -> &'static str {
        self.provider
    }

    async fn info(&self, mod_id: &str) -> anyhow::Result<ModSummary> {
        if self.broken_info.lock().contains(&self.canonical(mod_id)) {
            anyhow::bail!("Failed to parse project: unexpected end of input");
        }
        Ok(self.lookup(mod_id)?.0)
    }

    async fn detailed_info(&self, mod_id: &str) -> anyhow::Result<DetailedMod> {
        let (summary, versions) = self.lookup(mod_id)?;
        Ok(DetailedMod::new(summary, None, None, 0, versions))
    }

    async fn download(
        &self,
        summary: &ModSummary,
        version: &ModVersion,
        destination: &Path,
    ) -> anyhow::Result<InstalledMod> {
        tokio::task::yield_now().await;
        if self.failing_downloads.lock().contains(&version.id) {
            anyhow::bail!("Failed to download file: status 503 Service Unavailable");
        }
        tokio::fs::write(destination, self.artifact(&version.id)).await?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(InstalledMod::from_version(
            &summary.name,
            version,
            self.provider,
        ))
    }

    fn as_searchable(&self) -> Option<&dyn SearchableRegistry> {
        self.searchable.then_some(self as &dyn SearchableRegistry)
    }

    fn as_fingerprinting(&self) -> Option<&dyn FingerprintRegistry> {
        self.scheme.map(|_| self as &dyn FingerprintRegistry)
    }
}

impl SearchableRegistry for FakeRegistry {
    fn search<'a>(
        &'a self,
        query: &'a str,
        platform: &'a TargetPlatform,
    ) -> BoxStream<'a, anyhow::Result<ModSummary>> {
        let query = query.to_lowercase();
        let hits: Vec<_> = self
            .mods
            .lock()
            .values()
            .filter(|(summary, _)| summary.name.to_lowercase().contains(&query))
            .filter_map(|(summary, versions)| {
                let detailed = DetailedMod::new(summary.clone(), None, None, 0, versions.clone());
                best_version(&detailed, platform).map(|_| Ok(summary.clone()))
            })
            .collect();
        stream::iter(hits).boxed()
    }
}

#[async_trait]
impl FingerprintRegistry for FakeRegistry {
    fn scheme(&self) -> FingerprintScheme {
        self.scheme.unwrap_or(FingerprintScheme::Sha1)
    }

    async fn identify_by_fingerprint(
        &self,
        wanted: &Fingerprint,
    ) -> anyhow::Result<Vec<RemoteMatch>> {
        let scheme = self.scheme();
        let mods = self.mods.lock().clone();
        let unnamed = self.unnamed.lock().clone();

        Ok(mods
            .values()
            .flat_map(|(summary, versions)| versions.iter().map(move |v| (summary, v)))
            .filter(|(_, v)| fingerprint(scheme, &self.artifact(&v.id)) == *wanted)
            .map(|(summary, v)| RemoteMatch {
                mod_id: summary.id.clone(),
                mod_name: (!unnamed.contains(&summary.id)).then(|| summary.name.clone()),
                version_id: v.id.clone(),
                version_label: v.display_name.clone(),
                filename: v.filename.clone(),
                download_url: v.download_url.clone(),
            })
            .collect())
    }
}

pub fn summary(id: &str, name: &str) -> ModSummary {
    ModSummary {
        id: id.to_string(),
        name: name.to_string(),
        author: "someone".to_string(),
        website_url: format!("https://mods.example/{id}"),
        description: format!("{name} does things"),
        categories: BTreeSet::new(),
    }
}

pub fn version(
    mod_id: &str,
    id: &str,
    published: i64,
    loaders: &[&str],
    game_versions: &[&str],
) -> ModVersion {
    ModVersion {
        id: id.to_string(),
        mod_id: mod_id.to_string(),
        display_name: format!("{mod_id} {id}"),
        filename: format!("{mod_id}-{id}.jar"),
        download_url: format!("https://cdn.example/{mod_id}/{id}.jar"),
        published_at: Utc.timestamp_opt(published, 0).unwrap(),
        loaders: loaders.iter().map(|s| s.to_string()).collect(),
        game_versions: game_versions.iter().map(|s| s.to_string()).collect(),
    }
}

pub struct Harness {
    pub dir: TempDir,
    manifest_dir: PathBuf,
    pub registry: Arc<FakeRegistry>,
    pub engine: SyncEngine,
}

impl Harness {
    pub async fn new(registry: FakeRegistry) -> Self {
        Self::build(
            registry,
            TargetPlatform::new("1.20.1", "fabric"),
            EngineOptions::default(),
            0,
        )
        .await
    }

    pub async fn build(
        registry: FakeRegistry,
        platform: TargetPlatform,
        options: EngineOptions,
        max_concurrent_requests: usize,
    ) -> Self {
        Self::build_in(registry, "", platform, options, max_concurrent_requests).await
    }

    /// Manifest lives in `subdir` of the temp dir rather than at its root.
    pub async fn nested(registry: FakeRegistry, subdir: &str) -> Self {
        Self::build_in(
            registry,
            subdir,
            TargetPlatform::new("1.20.1", "fabric"),
            EngineOptions::default(),
            0,
        )
        .await
    }

    async fn build_in(
        registry: FakeRegistry,
        subdir: &str,
        platform: TargetPlatform,
        options: EngineOptions,
        max_concurrent_requests: usize,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let manifest_dir = dir.path().join(subdir);
        std::fs::create_dir_all(&manifest_dir).unwrap();
        let store = ManifestStore::init(manifest_dir.join(".mods.toml"), platform)
            .await
            .unwrap();

        let registry = Arc::new(registry);
        let api = ApiService::new(
            registry.clone(),
            ConnectionLimiter::new(max_concurrent_requests),
        );
        let engine = SyncEngine::new(api, Arc::new(store), options);
        Self {
            dir,
            manifest_dir,
            registry,
            engine,
        }
    }

    /// Path of `name` next to the manifest.
    pub fn file(&self, name: &str) -> PathBuf {
        self.manifest_dir.join(name)
    }

    /// `file(name)` as a command-line argument would carry it.
    pub fn arg(&self, name: &str) -> String {
        self.file(name).to_string_lossy().into_owned()
    }

    pub fn store(&self) -> &ManifestStore {
        self.engine.store()
    }
}

/// Mod `X` from the documented scenario: a fabric v2 and a forge v1.
pub fn scenario_registry() -> FakeRegistry {
    FakeRegistry::new("modrinth").with_mod(
        "X",
        "Mod X",
        vec![
            version("X", "v2", 2, &["fabric"], &["1.20.1"]),
            version("X", "v1", 1, &["forge"], &["1.20.1"]),
        ],
    )
}
