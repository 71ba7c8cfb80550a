mod api_service;
pub mod fingerprint;
mod manifest_store;
mod settings;

pub use api_service::{ApiService, ConnectionLimiter, PROVIDERS};
pub use manifest_store::{DISABLED_SUFFIX, ManifestStore, disabled_path};
pub use settings::{DEFAULT_USER_AGENT, Settings, SettingsManager};
