//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// feedaemon - WhatsApp fee-ledger pipeline
#[derive(Parser)]
#[command(
    name = "fd",
    about = "WhatsApp-driven school fee ledger: classify, confirm, commit",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Use the in-memory ledger instead of the configured backend
    #[arg(long, global = true)]
    pub memory: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run one message through the full pipeline, printing replies
    Simulate {
        /// Sender identity the message arrives from
        #[arg(long, default_value = "cli")]
        from: String,

        /// The message text
        #[arg(value_name = "MESSAGE", required = true)]
        message: Vec<String>,
    },

    /// Send fee reminders
    Remind {
        /// "all" or a student id (e.g. STU001)
        target: String,
    },

    /// Rebuild a student's fee aggregate from their installments
    Recompute {
        /// Student id (e.g. STU001)
        stud_id: String,
    },

    /// Show a student's fee account
    Status {
        /// Student id (e.g. STU001)
        stud_id: String,
    },
}
