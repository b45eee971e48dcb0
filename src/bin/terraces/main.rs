#![warn(missing_docs)]
//! The `terraces` binary answers terrace questions from the command line:
//! how many trees share the per-partition subtrees of the input, what they
//! are, and whether there is more than one.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;

use terraces::{terrace_analysis, OutputModes, PresenceMatrix, TerraceError};

/// contains the struct representing the command line arguments
/// parsed by [`clap`] and used to execute this binary
pub mod cli;

fn main() {
    if let Err(error) = run(cli::Args::parse()) {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}

fn run(args: cli::Args) -> Result<(), TerraceError> {
    match args.command {
        cli::Commands::Analyze {
            data,
            tree,
            count,
            enumerate,
            compress,
            detect,
            output,
        } => {
            let matrix = PresenceMatrix::from_file(&data)?;
            let newick = std::fs::read_to_string(&tree)?;

            let mut modes = OutputModes {
                count,
                enumerate,
                enumerate_compressed: compress,
                detect,
            };
            if modes.is_empty() {
                modes.count = true;
            }

            let report = match open_output(&output, modes)? {
                Some(mut out) => {
                    let report =
                        terrace_analysis(&matrix, newick.trim(), modes, Some(&mut out))?;
                    out.flush()?;
                    report
                }
                None => terrace_analysis(&matrix, newick.trim(), modes, None)?,
            };

            if modes.detect {
                let verdict = if report.is_terrace == Some(true) {
                    "on a terrace"
                } else {
                    "not on a terrace"
                };
                println!("{verdict}");
            }
            if modes.count || modes.any_enumeration() {
                println!("{}", report.terrace_size);
            }
        }
        cli::Commands::Stats { data } => {
            let matrix = PresenceMatrix::from_file(&data)?;
            print_stats(&matrix);
        }
    }

    Ok(())
}

fn open_output(
    path: &Option<PathBuf>,
    modes: OutputModes,
) -> Result<Option<Box<dyn Write>>, TerraceError> {
    if !modes.any_enumeration() {
        return Ok(None);
    }
    let out: Box<dyn Write> = match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    Ok(Some(out))
}

fn print_stats(matrix: &PresenceMatrix) {
    println!("species\tpartitions\troot_candidate");
    let root = matrix
        .full_data_row()
        .map(|row| matrix.species_name(row).to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}\t{}\t{}",
        matrix.n_species(),
        matrix.n_partitions(),
        root
    );

    println!("partition\tspecies_with_data");
    for partition in 0..matrix.n_partitions() {
        println!(
            "{}\t{}",
            partition,
            matrix.partition_mask(partition).count_ones(..)
        );
    }
}
