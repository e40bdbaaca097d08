// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! DadABase Web Server
//!
//! Serves the joke pages, the editor and the JSON API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use dadabase::config::AppConfig;
use dadabase::llm::LlmClient;
use dadabase::repository::open_repository;
use dadabase::web::AppState;
use dadabase::Result;

#[derive(Parser, Debug)]
#[command(name = "dadabase-web")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "DadABase Web Server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database (overrides config)
    #[arg(long)]
    database: Option<String>,

    /// Serve jokes from this JSON file instead of a database
    #[arg(long, conflicts_with = "database")]
    json_file: Option<String>,

    /// Run without AI description and image generation
    #[arg(long)]
    no_ai: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Open browser automatically
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug,tower_http=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("DadABase Web v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let mut config = AppConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(path) = args.database {
        config.database.path = path;
    }
    if let Some(path) = args.json_file {
        config.database.path = String::new();
        config.database.json_path = path;
    }

    let repo = open_repository(&config)?;
    let mut state = AppState::new(repo, config.clone());

    if args.no_ai {
        warn!("AI generation disabled");
    } else {
        let client = Arc::new(LlmClient::new(&config.ai_engine)?);
        info!(
            "AI engine: {} model={} image_model={} key={}",
            client.base_url(),
            config.ai_engine.model,
            config.ai_engine.image_model,
            config.ai_engine.masked_api_key()
        );
        state = state
            .with_text_generator(client.clone())
            .with_image_generator(client);
    }

    let addr = format!("{}:{}", config.web.host, config.web.port);
    info!("Starting web server at http://{}", addr);

    // Open browser if requested
    if args.open {
        let url = format!("http://{}", addr);
        if let Err(e) = open_browser(&url) {
            error!("Failed to open browser: {}", e);
        }
    }

    dadabase::web::start_server(state).await
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd").args(["/c", "start", url]).spawn()?;
    }
    Ok(())
}
