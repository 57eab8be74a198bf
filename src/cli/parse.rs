//! CLI parse: clap types for concord. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Concord CLI - inspect and reconcile replicated room state
#[derive(Parser)]
#[command(name = "concord")]
#[command(about = "Deterministic replicated-state synchronization for mutually untrusted peers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create room parameters and the initial state, and commit it to the store
    Init {
        /// Owner signing key seed, 64 hex characters
        #[arg(long)]
        seed: String,
        /// Room name
        #[arg(long)]
        name: String,
        /// Member registry instance id (hex)
        #[arg(long)]
        registry: Option<String>,
        /// Per-message size limit in bytes
        #[arg(long)]
        max_message_bytes: Option<u32>,
        /// Directory receiving parameters.bin and state.bin
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Add a member, signed by an inviter
    Invite {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        state: PathBuf,
        /// Inviter signing key seed (hex)
        #[arg(long)]
        seed: String,
        /// Public key of the new member (hex)
        #[arg(long)]
        member: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Append a message, signed by its author
    Post {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        state: PathBuf,
        /// Author signing key seed (hex)
        #[arg(long)]
        seed: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print a state as JSON
    Inspect {
        #[arg(long)]
        state: PathBuf,
    },
    /// Validate a state
    Validate {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        state: PathBuf,
        /// Related state, as <instance-hex>=<file>; repeatable
        #[arg(long = "related")]
        related: Vec<String>,
    },
    /// Write the summary of a state
    Summarize {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the delta a holder of `summary` is missing
    Delta {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        summary: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Apply a delta to a state
    Apply {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        delta: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Also commit the result to the instance in the store
        #[arg(long)]
        commit: bool,
    },
    /// Merge two states
    Merge {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        a: PathBuf,
        #[arg(long)]
        b: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// List instances in the store
    List,
}
