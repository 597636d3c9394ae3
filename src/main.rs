//! PMTiles Streamer - inspect and read PMTiles archives from the command line.
//!
//! Every subcommand reads the archive through byte-range requests, the same
//! way the library serves tiles to map clients.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::task::LocalSet;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmtiles_streamer::{
    archive::{ArchiveSession, RequestContext, RequestId},
    config::{archive_request_url, Cli, Command, InfoConfig, MetadataConfig, TileConfig},
    format::Header,
    io::DefaultLoader,
    source::archive_url,
    ArchiveFileSource,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = cli.command.config();
    init_logging(config.verbose);
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Info(config) => run_info(config).await,
        Command::Metadata(config) => run_metadata(config).await,
        Command::Tile(config) => run_tile(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so tile bytes and documents on stdout stay clean.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pmtiles_streamer=debug"
    } else {
        "pmtiles_streamer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_source(config: &pmtiles_streamer::config::Config) -> Option<ArchiveFileSource> {
    match ArchiveFileSource::with_options(config.session_options(), config.loader_options()) {
        Ok(source) => Some(source),
        Err(e) => {
            error!("Failed to start archive file source: {}", e);
            None
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    let url = archive_request_url(&config.archive);
    let address = match archive_url(&url) {
        Some(address) => address,
        None => {
            error!("No archive given in '{}'", config.archive);
            return ExitCode::FAILURE;
        }
    };

    let loader = match DefaultLoader::new(&config.config.loader_options()) {
        Ok(loader) => loader,
        Err(e) => {
            error!("Failed to create loader: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // A single session driven directly; no worker thread needed for one header
    let session = ArchiveSession::new(address, config.config.session_options());
    let ctx = RequestContext {
        id: RequestId::new(0),
        loader: Arc::new(loader),
    };

    match LocalSet::new().run_until(session.ensure_header(&ctx)).await {
        Ok(header) => {
            print_header(&url, &header);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_header(url: &str, header: &Header) {
    println!("PMTiles Archive");
    println!("═══════════════");
    println!();
    println!("  URL:                  {}", url);
    println!(
        "  Tile type:            {} ({})",
        header.tile_type.format(),
        header.tile_type.media_type()
    );
    println!("  Tile compression:     {}", header.tile_compression.as_str());
    println!("  Internal compression: {}", header.internal_compression.as_str());
    println!("  Zoom range:           {}-{}", header.min_zoom, header.max_zoom);
    println!(
        "  Bounds:               {}, {}, {}, {}",
        header.bounds.min_lon, header.bounds.min_lat, header.bounds.max_lon, header.bounds.max_lat
    );
    println!(
        "  Center:               {}, {} @ z{}",
        header.center.lon, header.center.lat, header.center.zoom
    );
    println!("  Clustered:            {}", header.clustered);
    println!();
    println!("  Addressed tiles:      {}", header.addressed_tiles_count);
    println!("  Tile entries:         {}", header.tile_entries_count);
    println!("  Tile contents:        {}", header.tile_contents_count);
    println!();
    println!(
        "  Root directory:       {} bytes at {}",
        header.root_directory_length, header.root_directory_offset
    );
    println!(
        "  Metadata:             {} bytes at {}",
        header.metadata_length, header.metadata_offset
    );
    println!(
        "  Leaf directories:     {} bytes at {}",
        header.leaf_directories_length, header.leaf_directories_offset
    );
    println!(
        "  Tile data:            {} bytes at {}",
        header.tile_data_length, header.tile_data_offset
    );
}

// =============================================================================
// Metadata Command
// =============================================================================

async fn run_metadata(config: MetadataConfig) -> ExitCode {
    let Some(source) = open_source(&config.config) else {
        return ExitCode::FAILURE;
    };

    let url = archive_request_url(&config.archive);
    let response = match source.request_metadata(&url).await {
        Ok(response) => response,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let document = response
        .data
        .map(|data| String::from_utf8_lossy(&data).into_owned())
        .unwrap_or_default();

    let output = if config.pretty {
        match serde_json::from_str::<serde_json::Value>(&document)
            .and_then(|value| serde_json::to_string_pretty(&value))
        {
            Ok(pretty) => pretty,
            Err(e) => {
                error!("Failed to format metadata: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        document
    };

    println!("{}", output);
    ExitCode::SUCCESS
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(config: TileConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    let Some(source) = open_source(&config.config) else {
        return ExitCode::FAILURE;
    };

    let url = archive_request_url(&config.archive);
    let response = match source.request_tile(&url, config.z, config.x, config.y).await {
        Ok(response) => response,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(data) = response.data else {
        info!("Tile {}/{}/{} is not in the archive", config.z, config.x, config.y);
        return ExitCode::SUCCESS;
    };
    debug!(
        bytes = data.len(),
        content_type = response.content_type.unwrap_or("unknown"),
        "tile fetched"
    );

    let written = match config.output {
        Some(ref path) => tokio::fs::write(path, &data).await,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data).and_then(|_| stdout.flush())
        }
    };

    match written {
        Ok(()) => {
            if let Some(ref path) = config.output {
                info!("Wrote {} bytes to {}", data.len(), path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to write tile: {}", e);
            ExitCode::FAILURE
        }
    }
}
