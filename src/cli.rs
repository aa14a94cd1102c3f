//! Command-line interface for gridplay.

use clap::{Parser, Subcommand};

use crate::service::DEFAULT_STARTING_CREDITS;

/// Gridplay - credit-gated tic-tac-toe web backend
#[derive(Parser, Debug)]
#[command(name = "gridplay")]
#[command(about = "Credit-gated tic-tac-toe web backend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Path to the database file (created if it doesn't exist)
        #[arg(long, default_value = "gridplay.db")]
        db_path: String,

        /// Credit balance granted to newly registered users
        #[arg(long, default_value_t = DEFAULT_STARTING_CREDITS)]
        starting_credits: i32,
    },
}
