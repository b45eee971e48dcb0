use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A command line tool to analyze phylogenetic terraces
#[derive(Parser, Debug)]
pub struct Args {
    #[command(subcommand)]
    /// The command to execute
    pub command: Commands,
}

/// The available commands in the `terraces` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a terrace analysis on a data matrix and a newick tree
    Analyze {
        /// Presence/absence matrix file
        data: PathBuf,

        /// Newick file with the supertree
        tree: PathBuf,

        /// Count the trees on the terrace (default when nothing is requested)
        #[arg(short, long)]
        count: bool,

        /// Write every tree on the terrace as a newick line
        #[arg(short, long)]
        enumerate: bool,

        /// Enumerate through the compressed tree DAG
        #[arg(long)]
        compress: bool,

        /// Only check whether the tree sits on a terrace
        #[arg(short, long)]
        detect: bool,

        /// File to write enumerated trees to (stdout if absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print summary statistics about a data matrix
    Stats {
        /// Presence/absence matrix file
        data: PathBuf,
    },
}
