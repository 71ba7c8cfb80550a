use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keeps the mods of a game instance in sync with Modrinth or CurseForge
#[derive(Parser, Debug)]
#[command(name = "modtrack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Manifest file; downloads land next to it
    #[arg(short, long, global = true, default_value = ".mods.toml")]
    pub config_file: PathBuf,

    /// Registry to talk to (modrinth, curseforge)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    #[arg(long, global = true, env = "MODRINTH_TOKEN", hide_env_values = true)]
    pub modrinth_token: Option<String>,

    #[arg(long, global = true, env = "CURSEFORGE_API_KEY", hide_env_values = true)]
    pub curseforge_api_key: Option<String>,

    /// Maximum batch items in flight, 0 for no limit
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create an empty manifest for a game version and loader
    ///
    /// Examples:
    ///   modtrack init 1.20.1 fabric
    ///   modtrack init 1.19.2 forge --force
    Init {
        game_version: String,
        loader: String,

        /// Overwrite an existing manifest
        #[arg(short, long)]
        force: bool,
    },

    /// Search the registry for mods compatible with the manifest
    Search {
        query: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show details about a mod
    Info { mod_id: String },

    /// Install the newest compatible version of each mod
    Add {
        #[arg(required = true)]
        mod_ids: Vec<String>,
    },

    /// Uninstall mods and delete their files
    Remove {
        #[arg(required_unless_present = "all")]
        mod_ids: Vec<String>,

        /// Remove every installed mod
        #[arg(long, conflicts_with = "mod_ids")]
        all: bool,
    },

    /// Upgrade mods, or every mod from the active registry when none given
    Upgrade { mod_ids: Vec<String> },

    /// List installed mods
    List,

    /// Show which installed mods have a newer compatible version
    Outdated,

    /// Identify existing mod files and add them to the manifest
    Discover {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// List compatible versions of a mod
    Versions {
        mod_id: String,

        /// Include versions for other game versions and loaders
        #[arg(short, long)]
        all: bool,
    },

    /// Install a specific version of a mod
    Install { mod_id: String, version_id: String },

    /// Re-enable disabled mods
    Enable {
        #[arg(required = true)]
        mod_ids: Vec<String>,
    },

    /// Disable mods without uninstalling them
    Disable {
        #[arg(required = true)]
        mod_ids: Vec<String>,
    },

    /// Exclude mods from upgrades
    Pin {
        #[arg(required = true)]
        mod_ids: Vec<String>,
    },

    /// Allow upgrades again
    Unpin {
        #[arg(required = true)]
        mod_ids: Vec<String>,
    },
}
