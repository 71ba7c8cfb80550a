use crate::app::batch::{BatchOutcome, BatchReport, run_batch};
use crate::app::fingerprint_matcher::{FingerprintMatcher, guess_name};
use crate::domain::{
    DetailedMod, InstalledMod, ModRegistry, ModSummary, ModVersion, SyncError, SyncResult,
    TargetPlatform, best_version, matching_versions,
};
use crate::infra::{ApiService, ManifestStore, Settings};
use futures::stream::BoxStream;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// `upgrade` reports `NoCompatibleVersion` instead of skipping the mod.
    pub fail_upgrade_without_compatible_version: bool,
}

impl From<&Settings> for EngineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            fail_upgrade_without_compatible_version: settings
                .fail_upgrade_without_compatible_version,
        }
    }
}

/// Drives add/remove/upgrade/discover against one registry and one manifest.
///
/// Registry calls of concurrent operations overlap freely; every manifest
/// change goes through the store's lock.
pub struct SyncEngine {
    api: ApiService,
    store: Arc<ManifestStore>,
    options: EngineOptions,
}

impl SyncEngine {
    pub fn new(api: ApiService, store: Arc<ManifestStore>, options: EngineOptions) -> Self {
        Self {
            api,
            store,
            options,
        }
    }

    pub fn registry(&self) -> &dyn ModRegistry {
        self.api.registry.as_ref()
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn platform(&self) -> TargetPlatform {
        self.store.platform()
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        self.store.save().await
    }

    pub async fn info(&self, mod_id: &str) -> SyncResult<ModSummary> {
        self.registry()
            .info(mod_id)
            .await
            .map_err(|e| SyncError::NotFound {
                id: mod_id.to_string(),
                reason: format!("{e:#}"),
            })
    }

    pub async fn detailed_info(&self, mod_id: &str) -> SyncResult<DetailedMod> {
        self.registry()
            .detailed_info(mod_id)
            .await
            .map_err(|e| SyncError::NotFound {
                id: mod_id.to_string(),
                reason: format!("{e:#}"),
            })
    }

    pub fn search<'a>(
        &'a self,
        query: &'a str,
        platform: &'a TargetPlatform,
    ) -> SyncResult<BoxStream<'a, anyhow::Result<ModSummary>>> {
        let searchable =
            self.registry()
                .as_searchable()
                .ok_or_else(|| SyncError::UnsupportedCapability {
                    provider: self.registry().provider_id().to_string(),
                    capability: "search",
                })?;
        Ok(searchable.search(query, platform))
    }

    /// Compatible versions newest first, or every version with `all`.
    pub async fn versions(&self, mod_id: &str, all: bool) -> SyncResult<Vec<ModVersion>> {
        let detailed = self.detailed_info(mod_id).await?;
        if all {
            return Ok(detailed.versions().to_vec());
        }
        let platform = self.platform();
        Ok(matching_versions(&detailed, &platform)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn add(&self, mod_id: &str) -> SyncResult<InstalledMod> {
        if self.store.is_mod_installed(mod_id) {
            return Err(SyncError::AlreadyInstalled {
                id: mod_id.to_string(),
            });
        }

        let detailed = self.detailed_info(mod_id).await?;
        // the registry may have resolved a slug to the canonical id
        if self.store.is_mod_installed(detailed.id()) {
            return Err(SyncError::AlreadyInstalled {
                id: detailed.id().to_string(),
            });
        }

        let platform = self.platform();
        let version = best_version(&detailed, &platform)
            .cloned()
            .ok_or_else(|| no_compatible_version(mod_id, &platform))?;

        let installed = self.download(&detailed.summary, &version).await?;
        self.store.insert_new(installed.clone())?;
        log::info!(
            "Installed {} ({}) {}",
            installed.name,
            installed.id,
            installed.installed_version_label
        );
        Ok(installed)
    }

    pub async fn remove(&self, mod_id: &str) -> SyncResult<InstalledMod> {
        let id = self.resolve_installed_id(mod_id).await?;
        let removed = self.store.delete_mod(&id).await?;
        log::info!("Removed {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// `None` when the newest compatible version is the one installed.
    pub async fn find_upgrade(&self, installed: &InstalledMod) -> SyncResult<Option<ModVersion>> {
        Ok(self
            .probe_upgrade(installed)
            .await?
            .map(|(_, version)| version))
    }

    /// Returns the new entry, or `None` when pinned or already current.
    pub async fn upgrade(&self, mod_id: &str) -> SyncResult<Option<InstalledMod>> {
        let id = self.resolve_installed_id(mod_id).await?;
        let installed = self
            .store
            .get(&id)
            .ok_or_else(|| SyncError::NotInstalled { id: id.clone() })?;

        if installed.pinned {
            log::debug!("{} ({}) is pinned, not upgrading", installed.name, installed.id);
            return Ok(None);
        }

        let (summary, version) = match self.probe_upgrade(&installed).await {
            Ok(Some(found)) => found,
            Ok(None) => return Ok(None),
            Err(e @ SyncError::NoCompatibleVersion { .. })
                if !self.options.fail_upgrade_without_compatible_version =>
            {
                log::warn!("Skipping upgrade: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let upgraded = self.download(&summary, &version).await?;
        // the previous artifact stays on disk, only `remove` deletes files
        self.store.replace(&id, upgraded.clone())?;
        log::info!(
            "Upgraded {} ({}) {} -> {}",
            upgraded.name,
            upgraded.id,
            installed.installed_version_label,
            upgraded.installed_version_label
        );
        Ok(Some(upgraded))
    }

    /// Installs a specific compatible version, replacing any installed one.
    pub async fn install(&self, mod_id: &str, version_id: &str) -> SyncResult<InstalledMod> {
        let detailed = self.detailed_info(mod_id).await?;
        let platform = self.platform();
        let version = matching_versions(&detailed, &platform)
            .into_iter()
            .find(|v| v.id == version_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownVersion {
                id: mod_id.to_string(),
                version: version_id.to_string(),
                game_version: platform.game_version.clone(),
                loader: platform.loader.clone(),
            })?;

        let previous = self.store.get(detailed.id());
        let mut installed = self.download(&detailed.summary, &version).await?;

        if let Some(previous) = previous {
            installed.pinned = previous.pinned;
            if previous.installed_file_path == installed.installed_file_path {
                self.store.remove_entry(&previous.id);
            } else {
                self.store.delete_mod(&previous.id).await?;
            }
        }
        self.store.insert_new(installed.clone())?;
        Ok(installed)
    }

    /// Identifies a local file and records it without downloading anything.
    ///
    /// `file` is read relative to the working directory and stored relative
    /// to the manifest directory when it lives below it. Callers filter out
    /// files the manifest already tracks; see [`SyncEngine::discover_all`].
    pub async fn discover(&self, file: &str) -> SyncResult<InstalledMod> {
        let matcher = FingerprintMatcher::for_registry(self.registry())?;
        let unidentifiable = |reason: String| SyncError::UnidentifiableFile {
            path: file.to_string(),
            reason,
        };

        let content = tokio::fs::read(file)
            .await
            .map_err(|e| unidentifiable(e.to_string()))?;
        let found = matcher
            .identify(&content)
            .await
            .map_err(|e| unidentifiable(format!("{e:#}")))?
            .ok_or_else(|| unidentifiable("no exact match".to_string()))?;

        let installed = InstalledMod {
            name: found
                .mod_name
                .unwrap_or_else(|| guess_name(&found.filename)),
            id: found.mod_id,
            version_id: found.version_id,
            installed_version_label: found.version_label,
            installed_file_path: self.store.manifest_path_for(Path::new(file)),
            source_url: found.download_url,
            provider_id: self.registry().provider_id().to_string(),
            pinned: false,
        };
        self.store.insert_new(installed.clone())?;
        log::info!("Discovered {} ({}) in {file}", installed.name, installed.id);
        Ok(installed)
    }

    pub async fn add_all(
        &self,
        mod_ids: Vec<String>,
        on_outcome: impl FnMut(&BatchOutcome<InstalledMod>),
    ) -> BatchReport<InstalledMod> {
        run_batch(
            mod_ids,
            &self.api.limiter,
            |id| async move { self.add(&id).await },
            on_outcome,
        )
        .await
    }

    pub async fn remove_all(
        &self,
        mod_ids: Vec<String>,
        on_outcome: impl FnMut(&BatchOutcome<InstalledMod>),
    ) -> BatchReport<InstalledMod> {
        run_batch(
            dedup(mod_ids),
            &self.api.limiter,
            |id| async move { self.remove(&id).await },
            on_outcome,
        )
        .await
    }

    /// Upgrades `mod_ids`, or every mod from the active registry when empty.
    pub async fn upgrade_all(
        &self,
        mod_ids: Vec<String>,
        on_outcome: impl FnMut(&BatchOutcome<Option<InstalledMod>>),
    ) -> BatchReport<Option<InstalledMod>> {
        let mod_ids = if mod_ids.is_empty() {
            self.installed_from_registry()
                .into_iter()
                .map(|m| m.id)
                .collect()
        } else {
            mod_ids
        };

        run_batch(
            dedup(mod_ids),
            &self.api.limiter,
            |id| async move { self.upgrade(&id).await },
            on_outcome,
        )
        .await
    }

    /// Probes every mod from the active registry for a newer version.
    pub async fn outdated(
        &self,
        on_outcome: impl FnMut(&BatchOutcome<(InstalledMod, Option<ModVersion>)>),
    ) -> BatchReport<(InstalledMod, Option<ModVersion>)> {
        let ids = self
            .installed_from_registry()
            .into_iter()
            .map(|m| m.id)
            .collect();

        run_batch(
            ids,
            &self.api.limiter,
            |id| async move {
                let installed = self
                    .store
                    .get(&id)
                    .ok_or_else(|| SyncError::NotInstalled { id: id.clone() })?;
                let upgrade = self.find_upgrade(&installed).await?;
                Ok::<_, SyncError>((installed, upgrade))
            },
            on_outcome,
        )
        .await
    }

    /// Discovers `files`, skipping the ones the manifest already tracks.
    /// Returns the report and the skipped files.
    pub async fn discover_all(
        &self,
        files: Vec<String>,
        on_outcome: impl FnMut(&BatchOutcome<InstalledMod>),
    ) -> SyncResult<(BatchReport<InstalledMod>, Vec<String>)> {
        FingerprintMatcher::for_registry(self.registry())?;

        let (known, unknown): (Vec<String>, Vec<String>) = files
            .into_iter()
            .partition(|file| {
                self.store
                    .is_file_known(&self.store.manifest_path_for(Path::new(file)))
            });
        for file in &known {
            log::debug!("{file} is already tracked, skipping");
        }

        let report = run_batch(
            unknown,
            &self.api.limiter,
            |file| async move { self.discover(&file).await },
            on_outcome,
        )
        .await;
        Ok((report, known))
    }

    fn installed_from_registry(&self) -> Vec<InstalledMod> {
        let manifest = self.store.snapshot();
        manifest
            .mods_from_provider(self.registry().provider_id())
            .cloned()
            .collect()
    }

    /// Maps a user supplied id or slug to the manifest key.
    async fn resolve_installed_id(&self, mod_id: &str) -> SyncResult<String> {
        if self.store.is_mod_installed(mod_id) {
            return Ok(mod_id.to_string());
        }
        match self.registry().info(mod_id).await {
            Ok(info) if self.store.is_mod_installed(&info.id) => Ok(info.id),
            _ => Err(SyncError::NotInstalled {
                id: mod_id.to_string(),
            }),
        }
    }

    async fn probe_upgrade(
        &self,
        installed: &InstalledMod,
    ) -> SyncResult<Option<(ModSummary, ModVersion)>> {
        let detailed = self.detailed_info(&installed.id).await?;
        let platform = self.platform();
        let best = best_version(&detailed, &platform)
            .ok_or_else(|| no_compatible_version(&installed.id, &platform))?;

        if best.id == installed.version_id {
            Ok(None)
        } else {
            Ok(Some((detailed.summary.clone(), best.clone())))
        }
    }

    async fn download(
        &self,
        summary: &ModSummary,
        version: &ModVersion,
    ) -> SyncResult<InstalledMod> {
        let destination = self.store.mods_dir().join(&version.filename);
        self.registry()
            .download(summary, version, &destination)
            .await
            .map_err(|source| SyncError::DownloadFailed {
                id: summary.id.clone(),
                version: version.display_name.clone(),
                source,
            })
    }
}

fn no_compatible_version(mod_id: &str, platform: &TargetPlatform) -> SyncError {
    SyncError::NoCompatibleVersion {
        id: mod_id.to_string(),
        game_version: platform.game_version.clone(),
        loader: platform.loader.clone(),
    }
}

/// Drops repeated ids, keeping first occurrences in order.
fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
