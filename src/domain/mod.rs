use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod error;
pub mod mod_src;
pub mod resolver;

pub use error::{SyncError, SyncResult};
pub use mod_src::{FingerprintRegistry, ModRegistry, SearchableRegistry};
pub use resolver::{best_version, matching_versions};

/// Game version and loader every resolution is relative to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPlatform {
    pub game_version: String,
    pub loader: String,
}

impl TargetPlatform {
    pub fn new(game_version: impl Into<String>, loader: impl Into<String>) -> Self {
        Self {
            game_version: game_version.into(),
            loader: loader.into(),
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.game_version, self.loader)
    }
}

/// Read-only projection of a mod as a registry describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModSummary {
    pub id: String,
    pub name: String,
    pub author: String,
    pub website_url: String,
    pub description: String,
    pub categories: BTreeSet<String>,
}

/// One downloadable artifact of a mod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModVersion {
    pub id: String,
    pub mod_id: String,
    pub display_name: String,
    pub filename: String,
    pub download_url: String,
    pub published_at: DateTime<Utc>,
    pub loaders: BTreeSet<String>,
    pub game_versions: BTreeSet<String>,
}

impl ModVersion {
    pub fn supports(&self, platform: &TargetPlatform) -> bool {
        self.game_versions.contains(&platform.game_version)
            && self.loaders.contains(&platform.loader)
    }
}

#[derive(Clone, Debug)]
pub struct DetailedMod {
    pub summary: ModSummary,
    pub issues_url: Option<String>,
    pub source_url: Option<String>,
    pub download_count: u64,
    versions: Vec<ModVersion>,
}

impl DetailedMod {
    /// Versions are kept newest first. The sort is stable, so artifacts
    /// published at the same instant keep the order the registry gave them.
    pub fn new(
        summary: ModSummary,
        issues_url: Option<String>,
        source_url: Option<String>,
        download_count: u64,
        mut versions: Vec<ModVersion>,
    ) -> Self {
        versions.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Self {
            summary,
            issues_url,
            source_url,
            download_count,
            versions,
        }
    }

    pub fn id(&self) -> &str {
        &self.summary.id
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn versions(&self) -> &[ModVersion] {
        &self.versions
    }

    pub fn loaders(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .flat_map(|v| v.loaders.iter().cloned())
            .collect()
    }

    pub fn game_versions(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .flat_map(|v| v.game_versions.iter().cloned())
            .collect()
    }
}

/// The persisted record of one installed mod.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    pub id: String,
    pub name: String,
    pub version_id: String,
    #[serde(rename = "installed_version")]
    pub installed_version_label: String,
    #[serde(rename = "installed_file")]
    pub installed_file_path: String,
    pub source_url: String,
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub pinned: bool,
}

fn default_provider_id() -> String {
    "modrinth".to_string()
}

impl InstalledMod {
    pub fn from_version(mod_name: &str, version: &ModVersion, provider_id: &str) -> Self {
        Self {
            id: version.mod_id.clone(),
            name: mod_name.to_string(),
            version_id: version.id.clone(),
            installed_version_label: version.display_name.clone(),
            installed_file_path: version.filename.clone(),
            source_url: version.download_url.clone(),
            provider_id: provider_id.to_string(),
            pinned: false,
        }
    }
}

/// Target platform plus every installed mod, keyed by mod id.
///
/// Two entries never point at the same file; callers keep it that way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub platform: TargetPlatform,
    pub mods: BTreeMap<String, InstalledMod>,
}

impl Manifest {
    pub fn new(platform: TargetPlatform) -> Self {
        Self {
            platform,
            mods: BTreeMap::new(),
        }
    }

    pub fn is_mod_installed(&self, mod_id: &str) -> bool {
        self.mods.contains_key(mod_id)
    }

    pub fn is_file_known(&self, file: &str) -> bool {
        self.mods.values().any(|m| m.installed_file_path == file)
    }

    pub fn get(&self, mod_id: &str) -> Option<&InstalledMod> {
        self.mods.get(mod_id)
    }

    pub fn mods_from_provider<'a>(
        &'a self,
        provider_id: &'a str,
    ) -> impl Iterator<Item = &'a InstalledMod> + 'a {
        self.mods.values().filter(move |m| m.provider_id == provider_id)
    }
}

/// What a registry reports back for a fingerprint lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteMatch {
    pub mod_id: String,
    pub mod_name: Option<String>,
    pub version_id: String,
    pub version_label: String,
    pub filename: String,
    pub download_url: String,
}

/// The two fingerprint flavours registries index files by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerprintScheme {
    /// Lowercase hex SHA-1 of the raw bytes.
    Sha1,
    /// Seed-1 murmur2 over the bytes with whitespace removed.
    Murmur2,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Sha1(String),
    Murmur2(u32),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Sha1(hash) => write!(f, "sha1:{hash}"),
            Fingerprint::Murmur2(hash) => write!(f, "murmur2:{hash}"),
        }
    }
}
