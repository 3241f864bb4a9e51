//! # fetch2md CLI
//!
//! ## Usage
//!
//! ```bash
//! fetch2md [--config ./fetch2md.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch2md serve` | Start the HTTP server |
//! | `fetch2md convert <url>` | Convert one URL and print the Markdown |
//! | `fetch2md check-config` | Validate configuration and print effective values |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use fetch2md::config::{self, Config};
use fetch2md::pipeline::ConversionService;
use fetch2md::server;

/// fetch2md: download a document by URL and convert it to Markdown.
#[derive(Parser)]
#[command(name = "fetch2md", version, about)]
struct Cli {
    /// Path to a TOML configuration file. All settings have defaults, and
    /// `FETCH2MD_*` environment variables override the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves `POST /convert` and `GET /health` on `[server].bind`.
    Serve,

    /// Convert a single URL and write the result to stdout.
    ///
    /// Runs the same download → convert → cleanup pipeline as the server.
    Convert {
        /// http(s) URL of the document.
        url: String,

        /// Print the JSON response body (`mime_type` + `markdown`) instead of
        /// the bare Markdown.
        #[arg(long)]
        json: bool,
    },

    /// Load and validate the configuration, then print the effective values.
    CheckConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Convert { url, json } => {
            return run_convert(&cfg, &url, json).await;
        }
        Commands::CheckConfig => {
            print_config(&cfg);
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_convert(cfg: &Config, url: &str, json: bool) -> anyhow::Result<ExitCode> {
    let service = ConversionService::new(cfg.download.clone())?;
    match service.convert_url(url).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.markdown);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error ({}): {}", e.status_code(), e.detail());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_config(cfg: &Config) {
    let dl = &cfg.download;
    println!("server.bind                  = {}", cfg.server.bind);
    println!("download.max_file_size_bytes = {}", dl.max_file_size_bytes);
    println!("download.chunk_size_bytes    = {}", dl.chunk_size_bytes);
    println!("download.timeout_secs        = {}", dl.timeout_secs);
    println!("download.temp_dir            = {}", dl.temp_dir.display());
    println!("download.temp_prefix         = {}", dl.temp_prefix);
    println!(
        "download.allowed_extensions  = {}{}",
        dl.allowed_extensions.join(", "),
        if dl.enforce_allowed_extensions {
            ""
        } else {
            " (not enforced)"
        }
    );
    println!("Configuration OK.");
}
