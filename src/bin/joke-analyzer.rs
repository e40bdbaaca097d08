// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Joke Analyzer
//!
//! Writes AI scene descriptions and categories for jokes that lack them.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use dadabase::ai::GenerationOptions;
use dadabase::analyzer::{BatchAnalyzer, BatchSummary};
use dadabase::config::AppConfig;
use dadabase::llm::LlmClient;
use dadabase::repository::open_repository;

#[derive(Parser, Debug)]
#[command(name = "joke-analyzer")]
#[command(version)]
#[command(about = "Generate image descriptions and categories for dad jokes")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// SQLite database (overrides config)
    #[arg(long)]
    database: Option<String>,

    /// Maximum jokes to process (0 = no limit; overrides config)
    #[arg(short = 'n', long)]
    max_batch_size: Option<usize>,

    /// Skip the AI engine health check on startup
    #[arg(long)]
    skip_health_check: bool,

    /// Only list the jokes that would be processed
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Joke Analyzer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    if let Some(path) = args.database {
        config.database.path = path;
    }
    if let Some(max) = args.max_batch_size {
        config.analyzer.max_batch_size = max;
    }

    let repo = open_repository(&config).context("Failed to connect to the joke database")?;
    info!("Joke store: {}", repo.backend_name());

    let client = LlmClient::new(&config.ai_engine)?;
    let analyzer = BatchAnalyzer::new(repo.as_ref(), &client, &config.analyzer).with_options(GenerationOptions {
        system_prompt: None,
        max_tokens: Some(config.ai_engine.max_tokens),
        temperature: Some(config.ai_engine.temperature),
    });

    if args.dry_run {
        let jokes = analyzer.select_jokes()?;
        println!("{} joke(s) would be processed:", jokes.len());
        for joke in jokes {
            println!("  {:>5}  {}", joke.joke_id, joke.joke_txt);
        }
        return Ok(());
    }

    if args.skip_health_check {
        warn!("Skipping AI engine health check");
    } else {
        info!("Checking AI engine at {} (key {})", client.base_url(), config.ai_engine.masked_api_key());
        client
            .health_check()
            .await
            .context("AI engine is not reachable")?;
        if !client.model_available().await.unwrap_or(false) {
            warn!("Model '{}' not listed by the engine", client.model());
        }
    }

    let summary = analyzer.run().await?;
    print_summary(&summary);

    if summary.errors > 0 {
        anyhow::bail!("Batch stopped after {} error(s)", summary.errors);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("Processing Summary");
    println!("{:-<40}", "");
    println!("  Total jokes:     {}", summary.total);
    println!("  Updated:         {}", summary.updated);
    println!("  Skipped:         {}", summary.skipped);
    println!("  Errors:          {}", summary.errors);
    if summary.aborted {
        println!("  Not attempted:   {}", summary.not_attempted());
    }
    println!("  Elapsed:         {:.2}s", summary.elapsed.as_secs_f64());
    if summary.updated > 0 {
        let average = summary.elapsed.as_secs_f64() / summary.updated as f64;
        println!("  Avg per joke:    {:.2}s", average);
    }
    if let Some(usage) = summary.usage {
        println!("  Prompt tokens:   {}", usage.prompt_tokens);
        println!("  Output tokens:   {}", usage.completion_tokens);
        println!("  Total tokens:    {}", usage.prompt_tokens + usage.completion_tokens);
    }
}
