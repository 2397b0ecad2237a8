use clap::{Parser, Subcommand};
use qagen::Result;
use qagen::commands::{build, clear, generate, query, script, show_status};
use qagen::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qagen")]
#[command(about = "Document knowledge base with semantic retrieval and QA test case generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding server, chunking, and generation settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the knowledge base from documents, replacing existing contents
    Build {
        /// Files or directories to ingest (.txt, .md, .json, .html)
        paths: Vec<PathBuf>,
    },
    /// Retrieve the most relevant chunks for a query
    Query {
        /// Natural-language query
        query: String,
        /// Number of results to return
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Generate grounded QA test cases for a query
    Generate {
        /// Natural-language query describing the feature under test
        query: String,
        /// Number of context chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Generate a Selenium script for a test case
    Script {
        /// Path to a test case JSON file
        test_case: PathBuf,
        /// HTML file of the page under test
        #[arg(long)]
        html: Option<PathBuf>,
        /// Write the script here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Remove every chunk from the knowledge base
    Clear,
    /// Show knowledge base and configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build { paths } => {
            build(&paths).await?;
        }
        Commands::Query { query: text, top_k } => {
            query(&text, top_k).await?;
        }
        Commands::Generate { query: text, top_k } => {
            generate(&text, top_k).await?;
        }
        Commands::Script {
            test_case,
            html,
            output,
        } => {
            script(&test_case, html.as_deref(), output.as_deref()).await?;
        }
        Commands::Clear => {
            clear().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
