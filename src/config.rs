//! Configuration for the `pmtiles-streamer` binary.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks and defaults for everything optional.
//!
//! # Example
//!
//! ```ignore
//! use pmtiles_streamer::config::{Cli, Command};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Command::Info(info) => println!("inspecting {}", info.archive),
//!     _ => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `PMTILES_USER_AGENT` - User-Agent for HTTP range requests
//! - `PMTILES_TIMEOUT` - Per-request timeout in seconds (default: 30)
//! - `PMTILES_DIRECTORY_CACHE` - Directories cached per archive (default: 100)
//! - `PMTILES_HEADER_PREFIX` - Bytes read with the header (default: 16384)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::archive::{SessionOptions, DEFAULT_HEADER_PREFIX_LENGTH, MAX_DIRECTORY_CACHE_ENTRIES};
use crate::format::{HEADER_LENGTH, MAX_ZOOM};
use crate::io::{LoaderOptions, DEFAULT_USER_AGENT};
use crate::source::PMTILES_SCHEME;

// =============================================================================
// Default Values
// =============================================================================

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// PMTiles Streamer - read tiles and TileJSON out of a single archive.
///
/// Archives are addressed by http(s) URL or local path and read with
/// byte-range requests; nothing is downloaded in full.
#[derive(Parser, Debug, Clone)]
#[command(name = "pmtiles-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the archive header.
    Info(InfoConfig),

    /// Print the TileJSON document of the archive.
    Metadata(MetadataConfig),

    /// Fetch one tile.
    Tile(TileConfig),
}

impl Command {
    /// Options shared by every subcommand.
    pub fn config(&self) -> &Config {
        match self {
            Command::Info(c) => &c.config,
            Command::Metadata(c) => &c.config,
            Command::Tile(c) => &c.config,
        }
    }
}

/// Loader, cache and logging options shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// User-Agent sent with HTTP range requests.
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "PMTILES_USER_AGENT")]
    pub user_agent: String,

    /// Timeout for a single range request, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "PMTILES_TIMEOUT")]
    pub timeout: u64,

    /// Maximum number of directories cached per archive.
    #[arg(long, default_value_t = MAX_DIRECTORY_CACHE_ENTRIES, env = "PMTILES_DIRECTORY_CACHE")]
    pub directory_cache: usize,

    /// Bytes fetched from the start of the archive to read the header.
    #[arg(long, default_value_t = DEFAULT_HEADER_PREFIX_LENGTH, env = "PMTILES_HEADER_PREFIX")]
    pub header_prefix: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_agent.trim().is_empty() {
            return Err(
                "User agent must not be empty. Set --user-agent or PMTILES_USER_AGENT".to_string(),
            );
        }
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }
        if self.directory_cache == 0 {
            return Err("directory_cache must be greater than 0".to_string());
        }
        if self.header_prefix < HEADER_LENGTH as u64 {
            return Err(format!(
                "header_prefix must be at least {} bytes",
                HEADER_LENGTH
            ));
        }
        Ok(())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions::default()
            .with_user_agent(self.user_agent.clone())
            .with_timeout(Duration::from_secs(self.timeout))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            directory_cache_capacity: self.directory_cache,
            header_prefix_length: self.header_prefix,
            ..SessionOptions::default()
        }
    }
}

/// Arguments of `info`.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Archive URL or path, with or without the pmtiles:// prefix.
    pub archive: String,

    #[command(flatten)]
    pub config: Config,
}

/// Arguments of `metadata`.
#[derive(Args, Debug, Clone)]
pub struct MetadataConfig {
    /// Archive URL or path, with or without the pmtiles:// prefix.
    pub archive: String,

    /// Pretty-print the document.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    #[command(flatten)]
    pub config: Config,
}

/// Arguments of `tile`.
#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// Archive URL or path, with or without the pmtiles:// prefix.
    pub archive: String,

    /// Zoom level.
    pub z: u8,

    /// Column.
    pub x: u32,

    /// Row (XYZ scheme, origin top-left).
    pub y: u32,

    /// Write the tile here instead of standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub config: Config,
}

impl TileConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.config.validate()?;
        if self.z > MAX_ZOOM {
            return Err(format!("zoom must be at most {}", MAX_ZOOM));
        }
        let n = 1u64 << self.z;
        if u64::from(self.x) >= n || u64::from(self.y) >= n {
            return Err(format!(
                "tile {}/{}/{} is outside the zoom level grid",
                self.z, self.x, self.y
            ));
        }
        Ok(())
    }
}

/// Turn a CLI archive argument into a `pmtiles://` request URL.
pub fn archive_request_url(archive: &str) -> String {
    if archive.starts_with(PMTILES_SCHEME) {
        archive.to_string()
    } else {
        format!("{}{}", PMTILES_SCHEME, archive)
    }
}

// =============================================================================
// Tests
// =============================================================================
