mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use futures::StreamExt;
use modtrack::app::{BatchOutcome, BatchReport, EngineOptions, SyncEngine};
use modtrack::domain::{Manifest, SyncError, TargetPlatform};
use modtrack::infra::{ApiService, ManifestStore, Settings, SettingsManager};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let settings = load_settings(&cli).await?;
    run(cli, settings).await
}

/// File, then environment, then flags.
async fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match SettingsManager::new() {
        Ok(manager) if manager.settings_exist() => manager.load_settings().await?,
        Ok(manager) => {
            let defaults = Settings::default();
            if let Err(e) = manager.save_settings(&defaults).await {
                log::warn!("Could not write {}: {e}", manager.settings_path().display());
            }
            defaults
        }
        Err(e) => {
            log::warn!("{e}, using default settings");
            Settings::default()
        }
    }
    .apply_env();

    if let Some(provider) = &cli.provider {
        settings.provider = provider.clone();
    }
    if let Some(token) = &cli.modrinth_token {
        settings.modrinth_token = Some(token.clone());
    }
    if let Some(key) = &cli.curseforge_api_key {
        settings.curseforge_api_key = Some(key.clone());
    }
    if let Some(jobs) = cli.jobs {
        settings.max_concurrent_requests = jobs;
    }
    Ok(settings)
}

async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let manifest_path = cli.config_file;

    match cli.command {
        Commands::Init {
            game_version,
            loader,
            force,
        } => cmd_init(&manifest_path, TargetPlatform::new(game_version, loader), force).await,
        Commands::List => {
            let store = ManifestStore::load(&manifest_path).await?;
            print_manifest(&store.snapshot());
            Ok(())
        }
        Commands::Enable { mod_ids } => toggle(&manifest_path, mod_ids, Toggle::Enable).await,
        Commands::Disable { mod_ids } => toggle(&manifest_path, mod_ids, Toggle::Disable).await,
        Commands::Pin { mod_ids } => toggle(&manifest_path, mod_ids, Toggle::Pin).await,
        Commands::Unpin { mod_ids } => toggle(&manifest_path, mod_ids, Toggle::Unpin).await,
        Commands::Search { query, limit } => {
            cmd_search(&open_engine(&manifest_path, &settings).await?, &query, limit).await
        }
        Commands::Info { mod_id } => {
            cmd_info(&open_engine(&manifest_path, &settings).await?, &mod_id).await
        }
        Commands::Add { mod_ids } => {
            cmd_add(&open_engine(&manifest_path, &settings).await?, mod_ids).await
        }
        Commands::Remove { mod_ids, all } => {
            cmd_remove(&open_engine(&manifest_path, &settings).await?, mod_ids, all).await
        }
        Commands::Upgrade { mod_ids } => {
            cmd_upgrade(&open_engine(&manifest_path, &settings).await?, mod_ids).await
        }
        Commands::Outdated => cmd_outdated(&open_engine(&manifest_path, &settings).await?).await,
        Commands::Discover { files } => {
            cmd_discover(&open_engine(&manifest_path, &settings).await?, files).await
        }
        Commands::Versions { mod_id, all } => {
            cmd_versions(&open_engine(&manifest_path, &settings).await?, &mod_id, all).await
        }
        Commands::Install { mod_id, version_id } => {
            let engine = open_engine(&manifest_path, &settings).await?;
            cmd_install(&engine, &mod_id, &version_id).await
        }
    }
}

/// Loads the manifest and connects it to the configured registry.
async fn open_engine(manifest_path: &Path, settings: &Settings) -> anyhow::Result<SyncEngine> {
    let store = Arc::new(ManifestStore::load(manifest_path).await?);
    Ok(SyncEngine::new(
        ApiService::from_settings(settings)?,
        store,
        EngineOptions::from(settings),
    ))
}

async fn cmd_init(manifest_path: &Path, platform: TargetPlatform, force: bool) -> anyhow::Result<()> {
    if force && tokio::fs::try_exists(manifest_path).await? {
        tokio::fs::remove_file(manifest_path).await?;
    }
    let store = ManifestStore::init(manifest_path, platform).await?;
    println!(
        "Created {} for {}",
        store.path().display(),
        store.platform()
    );
    Ok(())
}

async fn cmd_search(engine: &SyncEngine, query: &str, limit: usize) -> anyhow::Result<()> {
    let platform = engine.platform();
    let mut results = engine.search(query, &platform)?.take(limit);
    let mut found = 0;
    while let Some(result) = results.next().await {
        let summary = result?;
        found += 1;
        println!("{} ({}) by {}", summary.name, summary.id, summary.author);
        if !summary.description.is_empty() {
            println!("    {}", summary.description);
        }
    }
    if found == 0 {
        println!("No mods found for '{query}' on {platform}");
    }
    Ok(())
}

async fn cmd_info(engine: &SyncEngine, mod_id: &str) -> anyhow::Result<()> {
    let detailed = engine.detailed_info(mod_id).await?;
    let summary = &detailed.summary;
    println!("{} ({})", summary.name, summary.id);
    println!("Author:        {}", summary.author);
    println!("Website:       {}", summary.website_url);
    if let Some(url) = &detailed.source_url {
        println!("Source:        {url}");
    }
    if let Some(url) = &detailed.issues_url {
        println!("Issues:        {url}");
    }
    println!("Downloads:     {}", detailed.download_count);
    println!("Loaders:       {}", join(detailed.loaders()));
    println!("Game versions: {}", join(detailed.game_versions()));
    if !summary.categories.is_empty() {
        println!("Categories:    {}", join(summary.categories.iter()));
    }
    if !summary.description.is_empty() {
        println!();
        println!("{}", summary.description);
    }
    Ok(())
}

async fn cmd_add(engine: &SyncEngine, mod_ids: Vec<String>) -> anyhow::Result<()> {
    let report = engine
        .add_all(mod_ids, |outcome| {
            print_outcome(outcome, |_, m| {
                format!("Added {} {}", m.name, m.installed_version_label)
            })
        })
        .await;
    engine.save().await?;
    finish(&report)
}

async fn cmd_remove(engine: &SyncEngine, mod_ids: Vec<String>, all: bool) -> anyhow::Result<()> {
    let mod_ids = if all {
        engine.store().snapshot().mods.into_keys().collect()
    } else {
        mod_ids
    };
    let report = engine
        .remove_all(mod_ids, |outcome| {
            print_outcome(outcome, |_, m| format!("Removed {}", m.name))
        })
        .await;
    engine.save().await?;
    finish(&report)
}

async fn cmd_upgrade(engine: &SyncEngine, mod_ids: Vec<String>) -> anyhow::Result<()> {
    let report = engine
        .upgrade_all(mod_ids, |outcome| {
            print_outcome(outcome, |item, upgraded| match upgraded {
                Some(m) => format!("Upgraded {} to {}", m.name, m.installed_version_label),
                None => format!("{item} is up to date"),
            })
        })
        .await;
    engine.save().await?;
    finish(&report)
}

async fn cmd_outdated(engine: &SyncEngine) -> anyhow::Result<()> {
    let report = engine
        .outdated(|outcome| {
            print_outcome(outcome, |_, (installed, upgrade)| match upgrade {
                Some(v) => format!(
                    "{}: {} -> {}{}",
                    installed.name,
                    installed.installed_version_label,
                    v.display_name,
                    if installed.pinned { " (pinned)" } else { "" }
                ),
                None => format!("{}: up to date", installed.name),
            })
        })
        .await;
    finish(&report)
}

async fn cmd_discover(engine: &SyncEngine, files: Vec<String>) -> anyhow::Result<()> {
    let (report, skipped) = engine
        .discover_all(files, |outcome| {
            print_outcome(outcome, |file, m| {
                format!("{file} is {} {}", m.name, m.installed_version_label)
            })
        })
        .await?;
    for file in &skipped {
        println!("{file} is already tracked");
    }
    engine.save().await?;
    finish(&report)
}

async fn cmd_versions(engine: &SyncEngine, mod_id: &str, all: bool) -> anyhow::Result<()> {
    let versions = engine.versions(mod_id, all).await?;
    if versions.is_empty() {
        println!("No versions of {mod_id} for {}", engine.platform());
    }
    for v in versions {
        println!(
            "{}  {}  {}  [{}] [{}]",
            v.id,
            v.display_name,
            v.published_at.format("%Y-%m-%d"),
            join(v.loaders.iter()),
            join(v.game_versions.iter())
        );
    }
    Ok(())
}

async fn cmd_install(engine: &SyncEngine, mod_id: &str, version_id: &str) -> anyhow::Result<()> {
    let installed = engine.install(mod_id, version_id).await?;
    engine.save().await?;
    println!(
        "Installed {} {}",
        installed.name, installed.installed_version_label
    );
    Ok(())
}

#[derive(Clone, Copy)]
enum Toggle {
    Enable,
    Disable,
    Pin,
    Unpin,
}

/// Manifest-only operations; no registry is contacted.
async fn toggle(manifest_path: &Path, mod_ids: Vec<String>, action: Toggle) -> anyhow::Result<()> {
    let store = ManifestStore::load(manifest_path).await?;
    let mut failed = 0;

    for id in &mod_ids {
        let result = match action {
            Toggle::Enable => store.enable(id).await,
            Toggle::Disable => store.disable(id).await,
            Toggle::Pin => store.set_pinned(id, true),
            Toggle::Unpin => store.set_pinned(id, false),
        };
        match result {
            Ok(()) => {
                let verb = match action {
                    Toggle::Enable => "Enabled",
                    Toggle::Disable => "Disabled",
                    Toggle::Pin => "Pinned",
                    Toggle::Unpin => "Unpinned",
                };
                println!("{verb} {id}");
            }
            Err(e) => {
                failed += 1;
                eprintln!("{id}: {}", describe_error(&e));
            }
        }
    }

    store.save().await?;
    if failed > 0 {
        anyhow::bail!("{failed} of {} mods failed", mod_ids.len());
    }
    Ok(())
}

fn print_manifest(manifest: &Manifest) {
    println!("Mods for {}:", manifest.platform);
    if manifest.mods.is_empty() {
        println!("  (none)");
    }
    for m in manifest.mods.values() {
        println!(
            "  {} ({}) {}  {}{}",
            m.name,
            m.id,
            m.installed_version_label,
            m.provider_id,
            if m.pinned { "  pinned" } else { "" }
        );
    }
}

fn print_outcome<T>(outcome: &BatchOutcome<T>, describe: impl Fn(&str, &T) -> String) {
    match &outcome.result {
        Ok(value) => println!("{}", describe(&outcome.item, value)),
        Err(e) => eprintln!("{}: {}", outcome.item, describe_error(e)),
    }
}

fn describe_error(e: &SyncError) -> String {
    match e {
        SyncError::DownloadFailed { source, .. } => format!("{e}: {source:#}"),
        _ => e.to_string(),
    }
}

fn finish<T>(report: &BatchReport<T>) -> anyhow::Result<()> {
    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} items failed", report.len());
    }
    Ok(())
}

fn join<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
