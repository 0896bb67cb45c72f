use clap::{Parser, Subcommand};
use std::path::PathBuf;

use localkb::Result;
use localkb::commands::{build, extend, search, show_config};
use localkb::config::UserConfig;

#[derive(Parser)]
#[command(name = "localkb")]
#[command(about = "Build a local, similarity-searchable knowledge base from your notes")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file; command-line flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vector store from a folder of documents
    Build {
        /// Folder to index (overrides the config file)
        folder: Option<PathBuf>,
        /// Chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Embedding provider: "openai" or "ollama"
        #[arg(long)]
        model: Option<String>,
        /// Store filename under the cache directory
        #[arg(long)]
        store_file: Option<PathBuf>,
    },
    /// Add a folder of documents to an existing store
    Extend {
        /// Folder to index (overrides the config file)
        folder: Option<PathBuf>,
        /// Embedding provider: "openai" or "ollama"
        #[arg(long)]
        model: Option<String>,
        /// Store filename under the cache directory
        #[arg(long)]
        store_file: Option<PathBuf>,
    },
    /// Query the persisted store for the nearest chunks
    Search {
        query: String,
        /// Number of hits to return
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show the resolved configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => UserConfig::load(path)?,
        None => UserConfig::default(),
    };

    match cli.command {
        Commands::Build {
            folder,
            chunk_size,
            model,
            store_file,
        } => {
            if let Some(folder) = folder {
                config.folder = folder;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if let Some(model) = model {
                config.model_type = model.parse()?;
            }
            if let Some(store_file) = store_file {
                config.store_file = store_file;
            }
            build(&config)?;
        }
        Commands::Extend {
            folder,
            model,
            store_file,
        } => {
            if let Some(folder) = folder {
                config.folder = folder;
            }
            if let Some(model) = model {
                config.model_type = model.parse()?;
            }
            if let Some(store_file) = store_file {
                config.store_file = store_file;
            }
            extend(&config)?;
        }
        Commands::Search { query, limit } => {
            search(&config, &query, limit)?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}
