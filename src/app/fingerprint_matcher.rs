use crate::domain::{FingerprintRegistry, ModRegistry, RemoteMatch, SyncError, SyncResult};
use crate::infra::fingerprint::fingerprint;

/// Identifies local files through a registry's fingerprint index.
pub struct FingerprintMatcher<'a> {
    registry: &'a dyn ModRegistry,
    index: &'a dyn FingerprintRegistry,
}

impl<'a> FingerprintMatcher<'a> {
    pub fn for_registry(registry: &'a dyn ModRegistry) -> SyncResult<Self> {
        let index = registry
            .as_fingerprinting()
            .ok_or_else(|| SyncError::UnsupportedCapability {
                provider: registry.provider_id().to_string(),
                capability: "discover",
            })?;
        Ok(Self { registry, index })
    }

    /// First exact match for `content`, with `mod_name` always filled in.
    pub async fn identify(&self, content: &[u8]) -> anyhow::Result<Option<RemoteMatch>> {
        let fingerprint = fingerprint(self.index.scheme(), content);
        log::debug!("Looking up {fingerprint} on {}", self.registry.provider_id());

        let matches = self.index.identify_by_fingerprint(&fingerprint).await?;
        let Some(mut found) = matches.into_iter().next() else {
            return Ok(None);
        };

        if found.mod_name.is_none() {
            let name = match self.registry.info(&found.mod_id).await {
                Ok(info) if !info.name.is_empty() => info.name,
                Ok(_) => guess_name(&found.filename),
                Err(e) => {
                    log::debug!("No name for {} ({e}), guessing from file", found.mod_id);
                    guess_name(&found.filename)
                }
            };
            found.mod_name = Some(name);
        }
        Ok(Some(found))
    }
}

/// `sodium-fabric-0.5.3.jar` -> `sodium`, `fabric_api.jar` -> `fabric`.
pub fn guess_name(filename: &str) -> String {
    let head = filename.split('-').next().unwrap_or(filename);
    head.split('_').next().unwrap_or(head).to_string()
}
