use crate::domain::{InstalledMod, Manifest, SyncError, SyncResult, TargetPlatform};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const DISABLED_SUFFIX: &str = ".disabled";

/// On-disk layout of the manifest.
#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    version: String,
    loader: String,
    #[serde(default)]
    mods: Vec<InstalledMod>,
}

impl From<&Manifest> for ManifestFile {
    fn from(manifest: &Manifest) -> Self {
        Self {
            version: manifest.platform.game_version.clone(),
            loader: manifest.platform.loader.clone(),
            mods: manifest.mods.values().cloned().collect(),
        }
    }
}

impl From<ManifestFile> for Manifest {
    fn from(file: ManifestFile) -> Self {
        let mut manifest = Manifest::new(TargetPlatform::new(file.version, file.loader));
        for m in file.mods {
            manifest.mods.insert(m.id.clone(), m);
        }
        manifest
    }
}

/// Owns the manifest file and the in-memory copy operations mutate.
///
/// Every mutation takes the lock without awaiting while holding it, so
/// concurrently running operations never race on the mod map.
pub struct ManifestStore {
    path: PathBuf,
    mods_dir: PathBuf,
    manifest: Mutex<Manifest>,
}

impl ManifestStore {
    fn new(path: PathBuf, manifest: Manifest) -> Self {
        let mods_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            path,
            mods_dir,
            manifest: Mutex::new(manifest),
        }
    }

    /// Creates and saves an empty manifest; refuses to touch an existing file.
    pub async fn init(path: impl Into<PathBuf>, platform: TargetPlatform) -> Result<Self> {
        let path = path.into();
        if tokio::fs::try_exists(&path).await? {
            anyhow::bail!("Manifest file {} does already exist.", path.display());
        }
        let store = Self::new(path, Manifest::new(platform));
        store.save().await?;
        log::info!(
            "Initialized manifest {} for {}",
            store.path.display(),
            store.platform()
        );
        Ok(store)
    }

    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let file: ManifestFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
        let manifest = Manifest::from(file);
        log::debug!(
            "Loaded manifest {} with {} mods",
            path.display(),
            manifest.mods.len()
        );
        Ok(Self::new(path, manifest))
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = {
            let manifest = self.manifest.lock();
            toml::to_string_pretty(&ManifestFile::from(&*manifest))?
        };

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        tokio::fs::write(&temp_path, toml_str)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory downloads land in and relative mod paths resolve against.
    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    /// Manifest form of a path given relative to the working directory:
    /// relative to `mods_dir` when the file lives below it, absolute otherwise.
    pub fn manifest_path_for(&self, given: &Path) -> String {
        if given.is_relative()
            && let Ok(rest) = strip_cur_dir(given).strip_prefix(strip_cur_dir(&self.mods_dir))
        {
            return rest.to_string_lossy().into_owned();
        }

        let absolute = std::path::absolute(given).unwrap_or_else(|_| given.to_path_buf());
        if let Ok(mods_dir) = std::path::absolute(&self.mods_dir)
            && let Ok(rest) = absolute.strip_prefix(&mods_dir)
        {
            return rest.to_string_lossy().into_owned();
        }
        absolute.to_string_lossy().into_owned()
    }

    pub fn resolve_path(&self, installed_file: &str) -> PathBuf {
        let path = Path::new(installed_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.mods_dir.join(path)
        }
    }

    pub fn platform(&self) -> TargetPlatform {
        self.manifest.lock().platform.clone()
    }

    pub fn snapshot(&self) -> Manifest {
        self.manifest.lock().clone()
    }

    pub fn get(&self, mod_id: &str) -> Option<InstalledMod> {
        self.manifest.lock().get(mod_id).cloned()
    }

    pub fn is_mod_installed(&self, mod_id: &str) -> bool {
        self.manifest.lock().is_mod_installed(mod_id)
    }

    pub fn is_file_known(&self, file: &str) -> bool {
        self.manifest.lock().is_file_known(file)
    }

    pub fn insert_new(&self, installed: InstalledMod) -> SyncResult<()> {
        let mut manifest = self.manifest.lock();
        if manifest.is_mod_installed(&installed.id) {
            return Err(SyncError::AlreadyInstalled { id: installed.id });
        }
        manifest.mods.insert(installed.id.clone(), installed);
        Ok(())
    }

    /// Swaps the entry for `old_id` with `installed` under a single lock.
    pub fn replace(&self, old_id: &str, installed: InstalledMod) -> SyncResult<InstalledMod> {
        let mut manifest = self.manifest.lock();
        let old = manifest
            .mods
            .remove(old_id)
            .ok_or_else(|| SyncError::NotInstalled {
                id: old_id.to_string(),
            })?;
        manifest.mods.insert(installed.id.clone(), installed);
        Ok(old)
    }

    pub fn remove_entry(&self, mod_id: &str) -> Option<InstalledMod> {
        self.manifest.lock().mods.remove(mod_id)
    }

    pub fn set_pinned(&self, mod_id: &str, pinned: bool) -> SyncResult<()> {
        let mut manifest = self.manifest.lock();
        let entry = manifest
            .mods
            .get_mut(mod_id)
            .ok_or_else(|| SyncError::NotInstalled {
                id: mod_id.to_string(),
            })?;
        entry.pinned = pinned;
        Ok(())
    }

    /// Deletes the mod's file (enabled or disabled) and drops its entry.
    /// A file that is already gone is not an error.
    pub async fn delete_mod(&self, mod_id: &str) -> SyncResult<InstalledMod> {
        let installed = self.get(mod_id).ok_or_else(|| SyncError::NotInstalled {
            id: mod_id.to_string(),
        })?;

        let file = self.resolve_path(&installed.installed_file_path);
        remove_file_if_present(&file).await;
        remove_file_if_present(&disabled_path(&file)).await;

        self.remove_entry(mod_id);
        Ok(installed)
    }

    pub async fn disable(&self, mod_id: &str) -> SyncResult<()> {
        let installed = self.get(mod_id).ok_or_else(|| SyncError::NotInstalled {
            id: mod_id.to_string(),
        })?;
        let file = self.resolve_path(&installed.installed_file_path);
        rename_if_present(&file, &disabled_path(&file)).await?;
        Ok(())
    }

    pub async fn enable(&self, mod_id: &str) -> SyncResult<()> {
        let installed = self.get(mod_id).ok_or_else(|| SyncError::NotInstalled {
            id: mod_id.to_string(),
        })?;
        let file = self.resolve_path(&installed.installed_file_path);
        rename_if_present(&disabled_path(&file), &file).await?;
        Ok(())
    }
}

fn strip_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

pub fn disabled_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(DISABLED_SUFFIX);
    PathBuf::from(name)
}

async fn remove_file_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::info!("Deleted mod file: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to delete mod file {}: {}", path.display(), e),
    }
}

async fn rename_if_present(from: &Path, to: &Path) -> Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => {
            log::info!("Renamed {} -> {}", from.display(), to.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("Nothing to rename at {}", from.display());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to rename {}", from.display())),
    }
}
