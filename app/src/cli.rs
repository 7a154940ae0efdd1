//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kashi::constants::report::DEFAULT_MIN_COVERAGE;
use kashi_core::Network;

#[derive(Parser, Debug)]
#[command(name = "kashi-monitor")]
#[command(version, about = "Kashi lending pair monitor")]
pub struct Cli {
    /// Network to work on (ether, kovan, polygon)
    pub network: Network,

    /// Directory of the permanent cache (defaults to $KASHI_CACHE_DIR or ./cache)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a deposit across pairs from a JSON state snapshot
    Optimize {
        /// AllocationRequest JSON file
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// List borrowers by collateral coverage from a JSON state snapshot
    Borrowers {
        /// BorrowersSnapshot JSON file
        #[arg(long)]
        snapshot: PathBuf,

        /// Hide borrowers below this coverage (percent)
        #[arg(long, default_value_t = DEFAULT_MIN_COVERAGE)]
        min_coverage: f64,
    },

    /// Query event logs through the explorer API
    Logs {
        /// Contract that emitted the logs
        #[arg(long)]
        address: String,

        /// Event signature hash
        #[arg(long)]
        topic0: Option<String>,

        /// Address expected as the first indexed parameter
        #[arg(long)]
        address1: Option<String>,

        /// Only logs of this transaction (cached permanently)
        #[arg(long, requires = "block")]
        tx_hash: Option<String>,

        /// Block of --tx-hash
        #[arg(long, requires = "tx_hash")]
        block: Option<u64>,
    },

    /// List Kashi pairs deployed on the network
    Pairs,

    /// Show supported networks
    Networks,
}
