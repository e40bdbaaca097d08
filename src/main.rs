// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! DadABase console: tell, search, edit and export dad jokes from the terminal.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use dadabase::config::{mask_secret, AppConfig};
use dadabase::export::export_file_name;
use dadabase::llm::LlmClient;
use dadabase::models::{ActiveInd, Joke, JsonJokeList};
use dadabase::repository::{import_jokes, open_repository, JokeRepository};
use dadabase::Result;

/// Audit name for rows written from the console
const CONSOLE_USER: &str = "CONSOLE";

/// DadABase CLI - dad jokes on demand
#[derive(Parser, Debug)]
#[command(name = "dadabase")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Dad joke catalog: random jokes, search, export and import", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// SQLite database (overrides config)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Read jokes from this JSON file instead of a database
    #[arg(long, global = true, conflicts_with = "database")]
    json_file: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Tell a random joke
    Random,

    /// Show one joke by id
    Show { id: i64 },

    /// Search jokes by text and/or category
    Search {
        /// Text to look for
        #[arg(short, long, default_value = "")]
        text: String,

        /// Comma-separated categories, or "All"
        #[arg(short = 'g', long, default_value = "")]
        category: String,
    },

    /// List the active categories
    Categories,

    /// Show jokes in one category
    Category {
        name: String,

        /// Maximum number to show
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// List every joke
    List {
        /// List inactive jokes instead
        #[arg(long)]
        inactive: bool,
    },

    /// Add a joke
    Add {
        text: String,

        /// Category names (repeatable)
        #[arg(short = 'g', long = "category", required = true)]
        categories: Vec<String>,

        #[arg(short, long)]
        attribution: Option<String>,
    },

    /// Write the SQL export script
    Export {
        /// Output file (default: timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import jokes from a JSON joke file
    Import { file: PathBuf },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine and joke store status
    Status,
}

#[derive(Subcommand, Debug, PartialEq)]
enum ConfigCommands {
    /// Show current configuration (secrets masked)
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }
    if let Some(path) = cli.json_file {
        config.database.path = String::new();
        config.database.json_path = path;
    }

    match cli.command.unwrap_or(Commands::Random) {
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Status => run_status(config).await,
        command => {
            let repo = open_repository(&config)?;
            run_joke_command(repo.as_ref(), command)
        }
    }
}

fn run_joke_command(repo: &dyn JokeRepository, command: Commands) -> Result<()> {
    match command {
        Commands::Random => {
            println!("{}", repo.get_random_joke());
        }
        Commands::Show { id } => {
            print_joke(&repo.get_one(id));
        }
        Commands::Search { text, category } => {
            let jokes = repo.search_jokes(&text, &category)?;
            println!("Found {} joke(s):", jokes.len());
            for joke in &jokes {
                print_joke(joke);
            }
        }
        Commands::Categories => {
            println!("Categories:");
            for name in repo.get_joke_categories()? {
                println!("  {}", name);
            }
        }
        Commands::Category { name, limit } => {
            let jokes = repo.search_jokes("", &name)?;
            println!("Jokes in {} ({} total):", name, jokes.len());
            for joke in jokes.iter().take(limit) {
                print_joke(joke);
            }
        }
        Commands::List { inactive } => {
            let active = if inactive { ActiveInd::Inactive } else { ActiveInd::Active };
            let jokes = repo.list_all(active)?;
            for joke in &jokes {
                println!("{:>5}  {}  [{}]", joke.joke_id, joke.joke_txt, joke.categories);
            }
            println!("{} joke(s)", jokes.len());
        }
        Commands::Add { text, categories, attribution } => {
            let mut joke = Joke::new(text);
            if let Some(attribution) = attribution {
                joke = joke.with_attribution(attribution);
            }
            if joke.joke_txt.trim().is_empty() {
                return Err(dadabase::DadabaseError::Validation("Joke text is required".to_string()));
            }
            let id = repo.add_joke(&joke, CONSOLE_USER);
            if id < 0 {
                return Err(dadabase::DadabaseError::Storage("Joke was not added".to_string()));
            }
            let mut ids = Vec::new();
            for name in categories.iter().flat_map(|c| dadabase::models::split_categories(c)) {
                ids.push(repo.add_category(&name, CONSOLE_USER)?.joke_category_id);
            }
            if !repo.update_joke_categories(id, &ids, CONSOLE_USER) {
                println!("Joke {} added, but failed to update categories.", id);
            } else {
                println!("Added joke {}", id);
            }
        }
        Commands::Export { output } => {
            let script = repo.export_to_sql(CONSOLE_USER)?;
            let output = output.unwrap_or_else(|| PathBuf::from(export_file_name(chrono::Utc::now())));
            std::fs::write(&output, script)?;
            println!("Exported to {:?}", output);
        }
        Commands::Import { file } => {
            let list = JsonJokeList::load(&file)?;
            let added = import_jokes(repo, &list, CONSOLE_USER)?;
            println!("Imported {} of {} jokes from {:?}", added, list.jokes.len(), file);
        }
        Commands::Config { .. } | Commands::Status => {}
    }
    Ok(())
}

fn print_joke(joke: &Joke) {
    println!();
    if !joke.is_sentinel() {
        println!("#{} [{}]", joke.joke_id, joke.categories);
    }
    println!("{}", joke);
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let mut shown = config;
            shown.ai_engine.api_key = shown.ai_engine.api_key.as_deref().map(mask_secret);
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            if config.uses_json_backend() {
                println!("  Jokes: JSON file {}", config.database.json_path);
            } else {
                println!("  Database: {}", config.database.path);
            }
            println!("  AI engine: {} ({})", config.ai_engine.url, config.ai_engine.model);
            println!("  API key: {}", config.ai_engine.masked_api_key());
            println!("  Web: {}:{}", config.web.host, config.web.port);
        }
    }

    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    println!("DadABase v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    let client = LlmClient::new(&config.ai_engine)?;
    match client.health_check().await {
        Ok(()) => println!("AI engine: Running at {}", client.base_url()),
        Err(e) => println!("AI engine: Error - {}", e),
    }
    match client.list_models().await {
        Ok(models) => {
            println!("\nAvailable models:");
            for m in &models {
                let marker = if m == client.model() { "→" } else { " " };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    match open_repository(&config) {
        Ok(repo) => {
            let active = repo.list_all(ActiveInd::Active)?;
            let undescribed = active.iter().filter(|j| !j.has_image_txt()).count();
            println!("\nJoke store ({}):", repo.backend_name());
            println!("  Active jokes: {}", active.len());
            println!("  Without image description: {}", undescribed);
            println!("  Categories: {}", repo.get_joke_categories()?.len());
        }
        Err(e) => println!("\nJoke store: Error - {}", e),
    }
    info!("Status check complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use dadabase::repository::SqlJokeRepository;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_and_category() {
        let cli = Cli::try_parse_from(["dadabase", "search", "-t", "cow", "-g", "Animals"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Search {
                text: "cow".to_string(),
                category: "Animals".to_string()
            })
        );

        let cli = Cli::try_parse_from(["dadabase", "category", "Puns"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Category {
                name: "Puns".to_string(),
                limit: 5
            })
        );
    }

    #[test]
    fn test_add_requires_category() {
        assert!(Cli::try_parse_from(["dadabase", "add", "A joke"]).is_err());
        let cli = Cli::try_parse_from(["dadabase", "add", "A joke", "-g", "Puns", "-g", "Food"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Add { ref categories, .. }) if categories.len() == 2));
    }

    #[test]
    fn test_backend_flags_conflict() {
        assert!(Cli::try_parse_from(["dadabase", "--database", "a.db", "--json-file", "b.json", "random"]).is_err());
    }

    #[test]
    fn test_add_command_links_categories() {
        let repo = SqlJokeRepository::in_memory().unwrap();
        run_joke_command(
            &repo,
            Commands::Add {
                text: "Console joke".to_string(),
                categories: vec!["Puns, Food".to_string()],
                attribution: Some("Me".to_string()),
            },
        )
        .unwrap();
        let joke = repo.get_one(1);
        assert_eq!(joke.categories, "Food, Puns");
        assert_eq!(joke.create_user_name, CONSOLE_USER);
    }

    #[test]
    fn test_add_command_rejects_blank_text() {
        let repo = SqlJokeRepository::in_memory().unwrap();
        let err = run_joke_command(
            &repo,
            Commands::Add {
                text: "  ".to_string(),
                categories: vec!["Puns".to_string()],
                attribution: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, dadabase::DadabaseError::Validation(_)));
        assert!(repo.get_joke_categories().unwrap().is_empty());
    }

    #[test]
    fn test_export_command_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.sql");
        let repo = SqlJokeRepository::in_memory().unwrap();
        repo.add_joke(&Joke::new("Exported"), "TEST");
        run_joke_command(&repo, Commands::Export { output: Some(output.clone()) }).unwrap();
        assert!(std::fs::read_to_string(output).unwrap().contains("N'Exported'"));
    }
}
