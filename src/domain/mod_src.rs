use super::{
    DetailedMod, Fingerprint, FingerprintScheme, InstalledMod, ModSummary, ModVersion,
    RemoteMatch, TargetPlatform,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// The capabilities every remote mod registry provides.
#[async_trait]
pub trait ModRegistry: Send + Sync {
    /// Value stored in `InstalledMod::provider_id` for mods from this registry.
    fn provider_id(&self) -> &'static str;

    async fn info(&self, mod_id: &str) -> anyhow::Result<ModSummary>;

    async fn detailed_info(&self, mod_id: &str) -> anyhow::Result<DetailedMod>;

    /// Writes the artifact to `destination` and describes the result.
    async fn download(
        &self,
        summary: &ModSummary,
        version: &ModVersion,
        destination: &Path,
    ) -> anyhow::Result<InstalledMod>;

    fn as_searchable(&self) -> Option<&dyn SearchableRegistry> {
        None
    }

    fn as_fingerprinting(&self) -> Option<&dyn FingerprintRegistry> {
        None
    }
}

pub trait SearchableRegistry: Send + Sync {
    /// Lazily pages through results matching `query` on `platform`.
    fn search<'a>(
        &'a self,
        query: &'a str,
        platform: &'a TargetPlatform,
    ) -> BoxStream<'a, anyhow::Result<ModSummary>>;
}

#[async_trait]
pub trait FingerprintRegistry: Send + Sync {
    fn scheme(&self) -> FingerprintScheme;

    /// Exact matches for `fingerprint`; an empty list means unknown.
    async fn identify_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> anyhow::Result<Vec<RemoteMatch>>;
}
