//! sitesearch CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use sitesearch::{
    commands::{
        cmd_index, cmd_index_page, cmd_init, cmd_search, cmd_statistics, print_index_summary,
        print_indexing_response, print_search_response, print_statistics, InitOptions,
        SearchOptions, Services,
    },
    config::{Config, SiteConfig},
    error::{Error, Result},
    mcp::McpServer,
    progress::LogWriterFactory,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sitesearch")]
#[command(version, about = "Site crawler and full-text search engine with MCP server support", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a configuration file and the index database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,

        /// Site to index, as URL or URL=Name (repeatable)
        #[arg(long = "site")]
        sites: Vec<String>,
    },

    /// Crawl and index every configured site (Ctrl-C stops)
    Index,

    /// Re-index a single page
    IndexPage {
        /// Absolute URL of the page
        url: String,
    },

    /// Search the index
    Search {
        /// The search query
        query: String,

        /// Search only this configured site
        #[arg(long)]
        site: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<i64>,

        /// Number of results to skip
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        offset: i64,
    },

    /// Show index statistics
    Stats,

    /// Start MCP server on stdio
    Serve,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Stdout carries JSON-RPC while serving
    if matches!(cli.command, Commands::Serve) {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(LogWriterFactory))
            .with(filter)
            .init();
    }

    match cli.command {
        Commands::Init { force, sites } => {
            let base_dir = base_dir_for(cli.config.as_deref());
            let sites = sites.iter().map(|s| parse_site_arg(s)).collect();
            let summary = cmd_init(InitOptions {
                base_dir,
                force,
                sites,
            })
            .await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("✓ sitesearch initialized successfully");
                println!("  Config:   {}", summary.config_path);
                println!("  Database: {}", summary.db_path);
                println!("\nNext steps:");
                println!("  1. Edit the [[sites]] entries in the config file");
                println!("  2. Index them: sitesearch index");
                println!("  3. Search: sitesearch search \"your words\"");
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sitesearch", &mut std::io::stdout());
        }

        command => {
            let config = load_config(cli.config.as_deref())?;
            let services = Services::open(config).await?;
            run_with_services(command, &services, cli.json).await?;
        }
    }

    Ok(())
}

async fn run_with_services(command: Commands, services: &Services, json: bool) -> Result<()> {
    match command {
        Commands::Index => {
            let summary = cmd_index(services, !json).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_index_summary(&summary);
            }
        }

        Commands::IndexPage { url } => {
            let response = cmd_index_page(services, &url, true).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_indexing_response(&response);
            }
        }

        Commands::Search {
            query,
            site,
            limit,
            offset,
        } => {
            let options = SearchOptions {
                site,
                limit,
                offset,
            };
            let response = cmd_search(services, &query, options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_search_response(&query, &response);
            }
        }

        Commands::Stats => {
            let statistics = cmd_statistics(services).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statistics)?);
            } else {
                print_statistics(&statistics);
            }
        }

        Commands::Serve => {
            McpServer::new(services.clone())
                .run()
                .await
                .map_err(|e| Error::McpProtocol(e.to_string()))?;
        }

        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Base directory from `--config`: a `.toml` file's parent or the directory itself
fn base_dir_for(path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir),
        Some(path) => path.to_path_buf(),
        None => Config::default_base_dir(),
    }
}

/// `URL` or `URL=Name`; the host names unnamed sites
fn parse_site_arg(arg: &str) -> SiteConfig {
    match arg.split_once('=') {
        Some((url, name)) => SiteConfig::new(url, name.trim()),
        None => {
            let name = url::Url::parse(arg)
                .ok()
                .and_then(|u| u.host_str().map(ToString::to_string))
                .unwrap_or_else(|| arg.to_string());
            SiteConfig::new(arg, name)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => path.to_path_buf(),
        Some(path) => path.join("config.toml"),
        None => Config::default_config_path(),
    };

    if !config_path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}. Run 'sitesearch init' first.",
            config_path.display()
        )));
    }

    Config::load(&config_path)
}
