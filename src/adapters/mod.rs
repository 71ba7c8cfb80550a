pub mod curseforge;
pub mod modrinth;

pub use curseforge::CurseForgeRegistry;
pub use modrinth::ModrinthRegistry;

use anyhow::Context;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Streams `url` into `destination`.
///
/// Bytes go to `<destination>.part` first and are renamed once complete, so
/// a failed transfer never leaves a truncated artifact behind.
pub(crate) async fn download_file(
    client: &Client,
    user_agent: &str,
    url: &str,
    destination: &Path,
) -> anyhow::Result<()> {
    let response = client
        .get(url)
        .header("User-Agent", user_agent)
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download file: status {}", response.status());
    }

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut part_path = destination.as_os_str().to_os_string();
    part_path.push(".part");
    let part_path = std::path::PathBuf::from(part_path);

    let result: anyhow::Result<()> = async {
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .with_context(|| format!("Failed to create output file: {}", part_path.display()))?;
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk: Bytes = item?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(e);
    }

    tokio::fs::rename(&part_path, destination).await?;
    log::info!("Downloaded {url} -> {}", destination.display());
    Ok(())
}
