// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! crimp - shared visit-pass bot for a climbing-gym community.
//!
//! One binary, three process roles: `serve` (the chat-facing bot),
//! `worker` (tasks-queue consumer), and `notifier` (results-queue
//! consumer). All three share one SQLite database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod local;
mod notifier;
mod serve;
mod shutdown;
mod status;
mod worker;

use clap::{Parser, Subcommand};

/// crimp - shared visit-pass bot.
#[derive(Parser, Debug)]
#[command(name = "crimp", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the chat-facing bot process.
    Serve,
    /// Start the tasks-queue worker process.
    Worker,
    /// Start the results-queue notifier process.
    Notifier,
    /// Show database and queue statistics.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match crimp_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            crimp_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    let outcome = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Worker) => worker::run_worker(config).await,
        Some(Commands::Notifier) => notifier::run_notifier(config).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        None => {
            println!("crimp: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crimp={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
