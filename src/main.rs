use clap::Parser;
use clap::Subcommand;

use boardrag::api::serve_api;
use boardrag::config::AppConfig;
use boardrag::corpus::GameCorpus;
use boardrag::corpus::RecommendationCorpus;
use boardrag::Result;

#[derive(Parser)]
#[command(name = "boardrag")]
#[command(about = "Board-game RAG backend for recommendations and rule Q&A")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the games known to the corpora
    Games,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    boardrag::logging::init_logging_with_config(Some(&config))?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve_api(&config, host, port).await
        }
        Commands::Games => {
            let dimension = config.embedding_dimension();
            let games = GameCorpus::load(&config.data, dimension)?;
            let recommendations = RecommendationCorpus::load(&config.data, dimension)?;

            let names = if recommendations.names.is_empty() {
                games.names()
            } else {
                recommendations.names.clone()
            };

            println!("Known games ({}):", names.len());
            for name in names {
                println!("  {name}");
            }
            Ok(())
        }
    }
}
