mod cli;
mod responder_client;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::presenter::TerminalPresenter;
use crate::cli::chat::ChatContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input to send to the chat
    #[arg(short, long)]
    input: Option<String>,

    /// Base URL of the answering service (overrides RESPONDER_BASE_URL)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat {
        /// Input to send to the chat
        #[arg(short, long)]
        input: Option<String>,

        /// Base URL of the answering service (overrides RESPONDER_BASE_URL)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let (input, endpoint, verbose) = match cli.command {
        Some(Commands::Chat {
            input,
            endpoint,
            verbose,
        }) => (
            input.or(cli.input),
            endpoint.or(cli.endpoint),
            verbose || cli.verbose,
        ),
        None => (cli.input, cli.endpoint, cli.verbose),
    };

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting Sources Chat CLI");

    let presenter = TerminalPresenter::new(Box::new(io::stdout()));
    let mut chat_context = ChatContext::new(Box::new(presenter), input, true, endpoint);
    chat_context.run().await
}
