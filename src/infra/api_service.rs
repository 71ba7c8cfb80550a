use crate::adapters::{CurseForgeRegistry, ModrinthRegistry};
use crate::domain::ModRegistry;
use crate::infra::Settings;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const PROVIDERS: [&str; 2] = ["modrinth", "curseforge"];

/// The active registry together with the limiter batch work goes through.
#[derive(Clone)]
pub struct ApiService {
    pub registry: Arc<dyn ModRegistry>,
    pub limiter: ConnectionLimiter,
}

impl ApiService {
    pub fn new(registry: Arc<dyn ModRegistry>, limiter: ConnectionLimiter) -> Self {
        Self { registry, limiter }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let registry: Arc<dyn ModRegistry> = match settings.provider.to_lowercase().as_str() {
            "modrinth" | "mr" => Arc::new(ModrinthRegistry::new(
                settings.user_agent.clone(),
                settings.modrinth_token.clone(),
            )),
            "curseforge" | "cf" => Arc::new(CurseForgeRegistry::new(
                settings.user_agent.clone(),
                settings.curseforge_api_key.clone(),
            )),
            other => anyhow::bail!(
                "Unsupported provider selected: {other} (expected one of {})",
                PROVIDERS.join(", ")
            ),
        };
        log::debug!("Using provider {}", registry.provider_id());

        Ok(Self::new(
            registry,
            ConnectionLimiter::new(settings.max_concurrent_requests),
        ))
    }
}

/// Caps how many batch items run at once; zero means no cap.
#[derive(Clone)]
pub struct ConnectionLimiter {
    semaphore: Option<Arc<Semaphore>>,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Self {
        Self {
            semaphore: (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections))),
        }
    }

    pub fn unbounded() -> Self {
        Self { semaphore: None }
    }

    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        }
    }
}
