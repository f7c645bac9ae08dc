use std::path::PathBuf;

use clap::{Parser, Subcommand};
use livetrack_cli::cli::{run_fetch, run_listen, run_serve, CliConfig};

#[derive(Parser)]
#[command(name = "livetrack")]
#[command(about = "Live tracking sync engine")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Path to JSON config file (default: ~/.livetrack/config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracker and serve its view over HTTP
    Serve {
        /// Address to bind, overrides bindAddr from the config file
        #[arg(long, short)]
        bind: Option<String>,
    },

    /// Fetch once and print the filtered view
    Fetch,

    /// Print push change notifications as they arrive
    Listen,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    livetrack_core::tracing_setup::init_tracing_with_service("livetrack-cli");

    let mut config = match CliConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { bind } => {
            if bind.is_some() {
                config.bind_addr = bind;
            }
            run_serve(config).await
        }
        Commands::Fetch => run_fetch(config, cli.pretty).await,
        Commands::Listen => run_listen(config, cli.pretty).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
