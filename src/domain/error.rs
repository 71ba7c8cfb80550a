use thiserror::Error;

/// Everything a single engine operation can fail with.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Couldn't find a mod with id '{id}': {reason}")]
    NotFound { id: String, reason: String },

    #[error("The mod with id '{id}' is already installed.")]
    AlreadyInstalled { id: String },

    #[error("The mod with id '{id}' is not installed.")]
    NotInstalled { id: String },

    #[error("Couldn't find any version of the mod with id '{id}' matching {game_version} ({loader})")]
    NoCompatibleVersion {
        id: String,
        game_version: String,
        loader: String,
    },

    #[error("The mod with id '{id}' has no version '{version}' for {game_version} ({loader})")]
    UnknownVersion {
        id: String,
        version: String,
        game_version: String,
        loader: String,
    },

    #[error("Couldn't download version {version} of the mod with id '{id}'")]
    DownloadFailed {
        id: String,
        version: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Couldn't identify the mod in the file '{path}': {reason}")]
    UnidentifiableFile { path: String, reason: String },

    #[error("The selected provider ({provider}) does not support {capability}.")]
    UnsupportedCapability {
        provider: String,
        capability: &'static str,
    },

    #[error("Failed to update the manifest: {0}")]
    Manifest(#[from] anyhow::Error),
}

impl SyncError {
    /// The mod id or file path the failure is about, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            SyncError::NotFound { id, .. }
            | SyncError::AlreadyInstalled { id }
            | SyncError::NotInstalled { id }
            | SyncError::NoCompatibleVersion { id, .. }
            | SyncError::UnknownVersion { id, .. }
            | SyncError::DownloadFailed { id, .. } => Some(id),
            SyncError::UnidentifiableFile { path, .. } => Some(path),
            SyncError::UnsupportedCapability { .. } | SyncError::Manifest(_) => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
