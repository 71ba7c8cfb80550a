use crate::adapters::download_file;
use crate::domain::{
    DetailedMod, Fingerprint, FingerprintRegistry, FingerprintScheme, InstalledMod, ModRegistry,
    ModSummary, ModVersion, RemoteMatch, SearchableRegistry, TargetPlatform,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::path::Path;

const API_URL: &str = "https://api.modrinth.com/v2";
const SEARCH_PAGE_SIZE: usize = 20;

#[derive(Deserialize)]
struct ModrinthProject {
    id: String,
    #[serde(default)]
    slug: Option<String>,
    title: String,
    description: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    issues_url: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
}

#[derive(Deserialize)]
struct ModrinthTeamMember {
    user: ModrinthUser,
}

#[derive(Deserialize)]
struct ModrinthUser {
    username: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ModrinthVersion {
    id: String,
    project_id: String,
    version_number: String,
    date_published: DateTime<Utc>,
    #[serde(default)]
    loaders: Vec<String>,
    #[serde(default)]
    game_versions: Vec<String>,
    files: Vec<ModrinthVersionFile>,
}

#[derive(Deserialize)]
struct ModrinthVersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Deserialize)]
struct ModrinthSearchResult {
    hits: Vec<ModrinthSearchedProject>,
    #[serde(default)]
    total_hits: usize,
}

#[derive(Deserialize)]
struct ModrinthSearchedProject {
    project_id: String,
    #[serde(default)]
    slug: Option<String>,
    title: String,
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    categories: Vec<String>,
}

impl ModrinthVersion {
    /// `None` for versions that ship no file at all.
    fn into_domain(self) -> Option<ModVersion> {
        let index = self.files.iter().position(|f| f.primary).unwrap_or(0);
        let file = self.files.into_iter().nth(index)?;

        Some(ModVersion {
            id: self.id,
            mod_id: self.project_id,
            display_name: self.version_number,
            filename: file.filename,
            download_url: file.url,
            published_at: self.date_published,
            loaders: self.loaders.into_iter().collect(),
            game_versions: self.game_versions.into_iter().collect(),
        })
    }
}

fn project_link(id: &str, slug: Option<&str>) -> String {
    format!("https://modrinth.com/mod/{}", slug.unwrap_or(id))
}

/// Offset of the page after one that started at `offset` and returned
/// `hits` results; `None` once the results are exhausted.
fn next_search_offset(offset: usize, hits: usize, total_hits: usize) -> Option<usize> {
    let next = offset + hits;
    (hits > 0 && next < total_hits).then_some(next)
}

#[derive(Clone)]
pub struct ModrinthRegistry {
    user_agent: String,
    token: Option<String>,
    client: Client,
}

impl ModrinthRegistry {
    pub fn new(user_agent: String, token: Option<String>) -> Self {
        Self {
            user_agent,
            token,
            client: Client::new(),
        }
    }

    fn get(&self, url: impl reqwest::IntoUrl) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent.clone());
        match &self.token {
            Some(token) => request.header("Authorization", token.clone()),
            None => request,
        }
    }

    async fn fetch_project(&self, id_or_slug: &str) -> anyhow::Result<ModrinthProject> {
        let url = format!("{API_URL}/project/{}", urlencoding::encode(id_or_slug));
        let response = self.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Modrinth has no project '{id_or_slug}'");
        }

        let project: ModrinthProject = response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse project: {e}"))?;
        Ok(project)
    }

    /// Comma separated team names; an unreachable team endpoint yields "".
    async fn fetch_authors(&self, project_id: &str) -> String {
        let url = format!("{API_URL}/project/{project_id}/members");
        let members = match self.get(&url).send().await {
            Ok(resp) => resp.json::<Vec<ModrinthTeamMember>>().await,
            Err(e) => Err(e),
        };

        match members {
            Ok(members) => members
                .into_iter()
                .map(|m| m.user.name.filter(|n| !n.is_empty()).unwrap_or(m.user.username))
                .collect::<Vec<_>>()
                .join(", "),
            Err(e) => {
                log::debug!("Could not load team of {project_id}: {e}");
                String::new()
            }
        }
    }

    async fn fetch_versions(&self, project_id: &str) -> anyhow::Result<Vec<ModVersion>> {
        let url = format!("{API_URL}/project/{project_id}/version");
        let versions: Vec<ModrinthVersion> = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse versions: {e}"))?;

        Ok(versions
            .into_iter()
            .filter_map(ModrinthVersion::into_domain)
            .collect())
    }

    async fn summary_of(&self, project: &ModrinthProject) -> ModSummary {
        ModSummary {
            id: project.id.clone(),
            name: project.title.clone(),
            author: self.fetch_authors(&project.id).await,
            website_url: project_link(&project.id, project.slug.as_deref()),
            description: project.description.clone(),
            categories: project.categories.iter().cloned().collect(),
        }
    }

    async fn search_page(
        &self,
        query: &str,
        platform: &TargetPlatform,
        offset: usize,
    ) -> anyhow::Result<ModrinthSearchResult> {
        let facets = vec![
            vec![format!("versions:{}", platform.game_version)],
            vec![format!("categories:{}", platform.loader)],
            vec!["project_type:mod".to_string()],
        ];
        let facets_json = serde_json::to_string(&facets)?;

        let full_url = reqwest::Url::parse_with_params(
            &format!("{API_URL}/search"),
            &[
                ("query", query.to_string()),
                ("facets", facets_json),
                ("offset", offset.to_string()),
                ("limit", SEARCH_PAGE_SIZE.to_string()),
            ],
        )?;

        let page: ModrinthSearchResult = self
            .get(full_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }
}

#[async_trait]
impl ModRegistry for ModrinthRegistry {
    fn provider_id(&self) -> &'static str {
        "modrinth"
    }

    async fn info(&self, mod_id: &str) -> anyhow::Result<ModSummary> {
        let project = self.fetch_project(mod_id).await?;
        Ok(self.summary_of(&project).await)
    }

    async fn detailed_info(&self, mod_id: &str) -> anyhow::Result<DetailedMod> {
        let project = self.fetch_project(mod_id).await?;
        let (summary, versions) = tokio::join!(
            self.summary_of(&project),
            self.fetch_versions(&project.id)
        );

        Ok(DetailedMod::new(
            summary,
            project.issues_url,
            project.source_url,
            project.downloads,
            versions?,
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

    fn as_searchable(&self) -> Option<&dyn SearchableRegistry> {
        Some(self)
    }

    fn as_fingerprinting(&self) -> Option<&dyn FingerprintRegistry> {
        Some(self)
    }
}

impl SearchableRegistry for ModrinthRegistry {
    fn search<'a>(
        &'a self,
        query: &'a str,
        platform: &'a TargetPlatform,
    ) -> BoxStream<'a, anyhow::Result<ModSummary>> {
        stream::try_unfold(Some(0usize), move |offset| async move {
            let Some(offset) = offset else {
                return Ok::<_, anyhow::Error>(None);
            };
            let page = self.search_page(query, platform, offset).await?;

            let next = next_search_offset(offset, page.hits.len(), page.total_hits);

            let hits: Vec<anyhow::Result<ModSummary>> = page
                .hits
                .into_iter()
                .map(|hit| {
                    Ok(ModSummary {
                        website_url: project_link(&hit.project_id, hit.slug.as_deref()),
                        id: hit.project_id,
                        name: hit.title,
                        author: hit.author,
                        description: hit.description,
                        categories: hit.categories.into_iter().collect(),
                    })
                })
                .collect();

            Ok(Some((stream::iter(hits), next)))
        })
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl FingerprintRegistry for ModrinthRegistry {
    fn scheme(&self) -> FingerprintScheme {
        FingerprintScheme::Sha1
    }

    async fn identify_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> anyhow::Result<Vec<RemoteMatch>> {
        let Fingerprint::Sha1(sha1) = fingerprint else {
            anyhow::bail!("Modrinth only indexes files by sha1, got {fingerprint}");
        };

        let url = format!("{API_URL}/version_file/{sha1}?algorithm=sha1");
        let response = self.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let version: ModrinthVersion = response.error_for_status()?.json().await?;
        let Some(version) = version.into_domain() else {
            return Ok(Vec::new());
        };

        Ok(vec![RemoteMatch {
            mod_id: version.mod_id,
            mod_name: None,
            version_id: version.id,
            version_label: version.display_name,
            filename: version.filename,
            download_url: version.download_url,
        }])
    }
}
