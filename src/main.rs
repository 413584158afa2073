//! httpwrapper command-line interface
//!
//! # Usage
//!
//! ```bash
//! httpwrapper serve --port 8080 --host 0.0.0.0
//! httpwrapper serve --config /etc/httpwrapper/config.toml --verbose
//! httpwrapper --version
//! ```

use clap::{Parser, Subcommand};

use httpwrapper::cli::{ServeArgs, run_serve_mode};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "httpwrapper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Configuration file path
        #[arg(long)]
        config: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            config,
            verbose,
        } => {
            let args = ServeArgs {
                port,
                host,
                config,
                verbose,
            };
            run_serve_mode(args).await
        }
    }
}
