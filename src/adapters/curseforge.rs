use crate::adapters::download_file;
use crate::domain::{
    DetailedMod, Fingerprint, FingerprintRegistry, FingerprintScheme, InstalledMod, ModRegistry,
    ModSummary, ModVersion, RemoteMatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

const API_URL: &str = "https://api.curseforge.com/v1";
const FILES_PAGE_SIZE: usize = 50;

/// Loader tags CurseForge mixes into a file's game version list.
const LOADER_TAGS: [&str; 4] = ["fabric", "forge", "neoforge", "quilt"];

#[derive(Deserialize)]
struct CfResponse<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfMod {
    id: u64,
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    download_count: f64,
    #[serde(default)]
    authors: Vec<CfNamed>,
    #[serde(default)]
    categories: Vec<CfNamed>,
    #[serde(default)]
    links: CfLinks,
}

#[derive(Deserialize)]
struct CfNamed {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CfLinks {
    website_url: Option<String>,
    issues_url: Option<String>,
    source_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfFile {
    id: u64,
    mod_id: u64,
    display_name: String,
    file_name: String,
    file_date: DateTime<Utc>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    game_versions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfPagination {
    index: usize,
    result_count: usize,
    total_count: usize,
}

#[derive(Deserialize)]
struct CfFilesPage {
    data: Vec<CfFile>,
    pagination: CfPagination,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfFingerprintMatches {
    #[serde(default)]
    exact_matches: Vec<CfFingerprintMatch>,
}

#[derive(Deserialize)]
struct CfFingerprintMatch {
    id: u64,
    file: CfFile,
}

/// Splits loader tags from real game versions. Files predating loader tags
/// were all Forge builds.
fn split_game_versions(tags: Vec<String>) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut loaders = BTreeSet::new();
    let mut game_versions = BTreeSet::new();

    for tag in tags {
        let lowered = tag.to_lowercase();
        if LOADER_TAGS.contains(&lowered.as_str()) {
            loaders.insert(lowered);
        } else {
            game_versions.insert(tag);
        }
    }

    if loaders.is_empty() {
        loaders.insert("forge".to_string());
    }
    (loaders, game_versions)
}

/// Files with third party downloads disabled come without a URL.
fn cdn_url(file_id: u64, file_name: &str) -> String {
    format!(
        "https://edge.forgecdn.net/files/{}/{}/{}",
        file_id / 1000,
        file_id % 1000,
        urlencoding::encode(file_name)
    )
}

impl CfFile {
    fn download_url(&self) -> String {
        self.download_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| cdn_url(self.id, &self.file_name))
    }

    fn into_domain(self) -> ModVersion {
        let download_url = self.download_url();
        let (loaders, game_versions) = split_game_versions(self.game_versions);
        ModVersion {
            id: self.id.to_string(),
            mod_id: self.mod_id.to_string(),
            display_name: self.display_name,
            filename: self.file_name,
            download_url,
            published_at: self.file_date,
            loaders,
            game_versions,
        }
    }
}

impl CfPagination {
    /// Index of the page after this one, which carried `fetched` files.
    fn next_index(&self, fetched: usize) -> Option<usize> {
        let next = self.index + self.result_count;
        (fetched > 0 && next < self.total_count).then_some(next)
    }
}

impl CfFingerprintMatch {
    /// Fingerprint matches carry no mod name.
    fn into_remote(self) -> RemoteMatch {
        let download_url = self.file.download_url();
        RemoteMatch {
            mod_id: self.id.to_string(),
            mod_name: None,
            version_id: self.file.id.to_string(),
            version_label: self.file.display_name,
            filename: self.file.file_name,
            download_url,
        }
    }
}

impl CfMod {
    fn summary(&self) -> ModSummary {
        ModSummary {
            id: self.id.to_string(),
            name: self.name.clone(),
            author: self
                .authors
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            website_url: self.links.website_url.clone().unwrap_or_default(),
            description: self.summary.clone(),
            categories: self.categories.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

#[derive(Clone)]
pub struct CurseForgeRegistry {
    user_agent: String,
    api_key: Option<String>,
    client: Client,
}

impl CurseForgeRegistry {
    pub fn new(user_agent: String, api_key: Option<String>) -> Self {
        Self {
            user_agent,
            api_key,
            client: Client::new(),
        }
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json");
        match &self.api_key {
            Some(key) => request.header("x-api-key", key.clone()),
            None => request,
        }
    }

    async fn fetch_mod(&self, mod_id: &str) -> anyhow::Result<CfMod> {
        let url = format!("{API_URL}/mods/{}", urlencoding::encode(mod_id));
        let response = self.with_headers(self.client.get(&url)).send().await?;

        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
        ) {
            anyhow::bail!("CurseForge has no mod '{mod_id}'");
        }

        let body: CfResponse<CfMod> = response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse mod: {e}"))?;
        Ok(body.data)
    }

    async fn fetch_files(&self, mod_id: u64) -> anyhow::Result<Vec<ModVersion>> {
        let url = format!("{API_URL}/mods/{mod_id}/files");
        let mut versions = Vec::new();
        let mut index = 0usize;

        loop {
            let full_url = reqwest::Url::parse_with_params(
                &url,
                &[
                    ("index", index.to_string()),
                    ("pageSize", FILES_PAGE_SIZE.to_string()),
                ],
            )?;
            let page: CfFilesPage = self
                .with_headers(self.client.get(full_url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to parse files: {e}"))?;

            let next = page.pagination.next_index(page.data.len());
            versions.extend(page.data.into_iter().map(CfFile::into_domain));

            match next {
                Some(next) => index = next,
                None => break,
            }
        }

        Ok(versions)
    }
}

#[async_trait]
impl ModRegistry for CurseForgeRegistry {
    fn provider_id(&self) -> &'static str {
        "curseforge"
    }

    async fn info(&self, mod_id: &str) -> anyhow::Result<ModSummary> {
        Ok(self.fetch_mod(mod_id).await?.summary())
    }

    async fn detailed_info(&self, mod_id: &str) -> anyhow::Result<DetailedMod> {
        let hit = self.fetch_mod(mod_id).await?;
        let versions = self.fetch_files(hit.id).await?;

        Ok(DetailedMod::new(
            hit.summary(),
            hit.links.issues_url.clone(),
            hit.links.source_url.clone(),
            hit.download_count.max(0.0) as u64,
            versions,
        ))
    }

    async fn download(
        &self,
        summary: &ModSummary,
        version: &ModVersion,
        destination: &Path,
    ) -> anyhow::Result<InstalledMod> {
        download_file(
            &self.client,
            &self.user_agent,
            &version.download_url,
            destination,
        )
        .await?;
        Ok(InstalledMod::from_version(
            &summary.name,
            version,
            self.provider_id(),
        ))
    }

    fn as_fingerprinting(&self) -> Option<&dyn FingerprintRegistry> {
        Some(self)
    }
}

#[async_trait]
impl FingerprintRegistry for CurseForgeRegistry {
    fn scheme(&self) -> FingerprintScheme {
        FingerprintScheme::Murmur2
    }

    async fn identify_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> anyhow::Result<Vec<RemoteMatch>> {
        let Fingerprint::Murmur2(hash) = fingerprint else {
            anyhow::bail!("CurseForge only indexes files by murmur2, got {fingerprint}");
        };

        let body: CfResponse<CfFingerprintMatches> = self
            .with_headers(self.client.post(format!("{API_URL}/fingerprints")))
            .json(&serde_json::json!({ "fingerprints": [hash] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .data
            .exact_matches
            .into_iter()
            .map(CfFingerprintMatch::into_remote)
            .collect())
    }
}
