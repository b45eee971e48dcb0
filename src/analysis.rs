//! The terrace analysis entry point.
//!
//! [`terrace_analysis`] validates the inputs, extracts the constraints and
//! runs the requested scan modes. All failures surface as a
//! [`TerraceError`]; the recursive engine itself only ever sees
//! pre-validated inputs.

use std::collections::HashSet;
use std::io;

use num_bigint::BigUint;
use num_traits::Zero;
use thiserror::Error;

use crate::combiners::{CountTrees, DetectTerrace, EnumerateCompressed, EnumerateTrees};
use crate::constraint::{extract_constraints, ConstraintError};
use crate::forest::Forest;
use crate::labels::LabelMap;
use crate::leafset::LeafSet;
use crate::matrix::{MatrixError, PresenceMatrix};
use crate::newick::NewickWriter;
use crate::scan::scan_terrace;
use crate::supertree::{NewickParseError, Supertree};

/// Which questions the analysis answers.
///
/// Any combination may be requested; exactly the requested behaviours run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputModes {
    /// Compute the terrace size
    pub count: bool,
    /// Write every tree on the terrace as a Newick line
    pub enumerate: bool,
    /// Write every tree by expanding the compressed tree DAG
    pub enumerate_compressed: bool,
    /// Only decide whether the terrace holds more than one tree
    pub detect: bool,
}

impl OutputModes {
    /// True if any mode writing Newick lines is requested
    pub fn any_enumeration(&self) -> bool {
        self.enumerate || self.enumerate_compressed
    }

    /// True if no mode at all is requested
    pub fn is_empty(&self) -> bool {
        !(self.count || self.enumerate || self.enumerate_compressed || self.detect)
    }
}

/// The outcome of one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Size of the terrace. Holds the exact count when counting was
    /// requested, otherwise the number of enumerated trees, otherwise `2`
    /// or `0` from detection, otherwise `0`.
    pub terrace_size: BigUint,
    /// Number of Newick lines written, if an enumeration mode ran
    pub trees_written: Option<u64>,
    /// Whether the input sits on a terrace of more than one tree, if
    /// detection ran
    pub is_terrace: Option<bool>,
}

/// Errors that can occur during a terrace analysis.
///
/// Every variant maps to a distinct process exit code via
/// [`TerraceError::exit_code`].
#[derive(Error, Debug)]
pub enum TerraceError {
    /// The newick string could not be parsed
    #[error("Could not parse the newick tree.")]
    NewickParse(#[from] NewickParseError),
    /// The tree and the matrix disagree on how many species there are
    #[error("The tree has {tree} leaves but the matrix has {matrix} species.")]
    SpeciesCountMismatch {
        /// Number of leaves in the tree
        tree: usize,
        /// Number of species rows in the matrix
        matrix: usize,
    },
    /// A matrix entry is neither 0 nor 1
    #[error("Matrix entry for species {species} in partition {partition} is {value}, not 0 or 1.")]
    MatrixNotBinary {
        /// Name of the offending species
        species: String,
        /// Offending partition column
        partition: usize,
        /// The non-binary value found
        value: u8,
    },
    /// Fewer than four species
    #[error("An analysis needs at least 4 species, got {0}.")]
    TooFewSpecies(usize),
    /// Fewer than two partitions
    #[error("An analysis needs at least 2 partitions, got {0}.")]
    TooFewPartitions(usize),
    /// No species has data in every partition, so the tree cannot be rooted
    #[error("No species has data in every partition; the tree cannot be rooted.")]
    NoFullDataSpecies,
    /// A species has data in no partition at all
    #[error("Species {0} has no data in any partition.")]
    SpeciesWithoutData(String),
    /// Enumeration was requested without an output stream
    #[error("Enumeration requested but no output stream given.")]
    NoOutputStream,
    /// The supertree is not a binary tree
    #[error("The tree is not binary.")]
    TreeNotBinary,
    /// A species appears in the tree or the matrix but not in both
    #[error("Species {0} does not appear in both the tree and the matrix.")]
    SpeciesMismatch(String),
    /// A tree leaf carries no name
    #[error("The tree contains an unnamed leaf.")]
    UnnamedLeaf,
    /// The matrix could not be read
    #[error("Could not read the data matrix.")]
    Matrix(#[from] MatrixError),
    /// Writing enumerated trees failed
    #[error("Error writing enumerated trees")]
    IoError(#[from] io::Error),
}

impl TerraceError {
    /// Distinct process exit code for each failure kind; success is 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            TerraceError::NewickParse(_) => 1,
            TerraceError::SpeciesCountMismatch { .. } => 2,
            TerraceError::MatrixNotBinary { .. } => 3,
            TerraceError::TooFewSpecies(_) => 4,
            TerraceError::TooFewPartitions(_) => 5,
            TerraceError::NoFullDataSpecies => 6,
            TerraceError::SpeciesWithoutData(_) => 7,
            TerraceError::NoOutputStream => 8,
            TerraceError::TreeNotBinary => 9,
            TerraceError::SpeciesMismatch(_) | TerraceError::UnnamedLeaf => 10,
            TerraceError::Matrix(_) => 3,
            TerraceError::IoError(_) => 11,
        }
    }
}

impl From<ConstraintError> for TerraceError {
    fn from(err: ConstraintError) -> Self {
        match err {
            ConstraintError::UnknownSpecies(name) => TerraceError::SpeciesMismatch(name),
            ConstraintError::UnnamedLeaf => TerraceError::UnnamedLeaf,
            ConstraintError::DegenerateTree => TerraceError::TreeNotBinary,
        }
    }
}

/// Run a terrace analysis.
///
/// `matrix` is the presence/absence matrix, `newick` the supertree over the
/// matrix species, `modes` selects what to compute, and `output` receives
/// one Newick line per tree when an enumeration mode is requested.
///
/// The first species with data in every partition roots the tree; it is
/// excluded from the combinatorics and re-attached to every output line,
/// so enumerated trees print as unrooted trifurcations over all species.
///
/// # Example
/// ```
/// use terraces::{terrace_analysis, OutputModes, PresenceMatrix};
///
/// let matrix = PresenceMatrix::from_rows(
///     vec!["s1".into(), "s2".into(), "s3".into(), "s4".into(), "s5".into()],
///     &[vec![1, 0], vec![1, 0], vec![1, 1], vec![0, 1], vec![0, 1]],
/// )
/// .unwrap();
///
/// let modes = OutputModes { count: true, ..OutputModes::default() };
/// let report = terrace_analysis(&matrix, "((s1,s2),s3,(s4,s5));", modes, None).unwrap();
///
/// assert_eq!(report.terrace_size.to_string(), "15");
/// ```
pub fn terrace_analysis(
    matrix: &PresenceMatrix,
    newick: &str,
    modes: OutputModes,
    mut output: Option<&mut dyn io::Write>,
) -> Result<AnalysisReport, TerraceError> {
    if matrix.n_species() < 4 {
        return Err(TerraceError::TooFewSpecies(matrix.n_species()));
    }
    if matrix.n_partitions() < 2 {
        return Err(TerraceError::TooFewPartitions(matrix.n_partitions()));
    }
    if let Some((species, partition, value)) = matrix.first_non_binary() {
        return Err(TerraceError::MatrixNotBinary {
            species: matrix.species_name(species).to_string(),
            partition,
            value,
        });
    }
    if let Some(species) = matrix.empty_data_row() {
        return Err(TerraceError::SpeciesWithoutData(
            matrix.species_name(species).to_string(),
        ));
    }
    if modes.any_enumeration() && output.is_none() {
        return Err(TerraceError::NoOutputStream);
    }

    let tree = Supertree::from_newick(newick)?.contracted();
    if !tree.is_binary() {
        return Err(TerraceError::TreeNotBinary);
    }
    check_species_sets(&tree, matrix)?;

    let root = matrix
        .full_data_row()
        .ok_or(TerraceError::NoFullDataSpecies)?;
    let labels = LabelMap::from_matrix(matrix, root);
    let constraints = extract_constraints(&tree, matrix, &labels)?;
    let leaves = LeafSet::full_without_root(labels.len(), root);

    let mut report = AnalysisReport {
        terrace_size: BigUint::zero(),
        trees_written: None,
        is_terrace: None,
    };

    if modes.count {
        report.terrace_size = scan_terrace(&mut CountTrees, &leaves, &constraints, false);
    }

    if modes.any_enumeration() {
        let out = output.as_deref_mut().ok_or(TerraceError::NoOutputStream)?;
        let mut written = 0;

        if modes.enumerate {
            let mut forest = Forest::new();
            let trees = scan_terrace(
                &mut EnumerateTrees::new(&mut forest),
                &leaves,
                &constraints,
                false,
            );
            let writer = NewickWriter::with_outgroup(&forest, &labels, root);
            for tree in trees {
                written += writer.write_all(tree, &mut *out)?;
            }
        }

        if modes.enumerate_compressed {
            let mut forest = Forest::new();
            let dag = scan_terrace(
                &mut EnumerateCompressed::new(&mut forest),
                &leaves,
                &constraints,
                false,
            );
            let writer = NewickWriter::with_outgroup(&forest, &labels, root);
            written += writer.write_all(dag, &mut *out)?;
        }

        report.trees_written = Some(written);
        if !modes.count {
            // Both enumeration modes write the same trees; report one pass.
            let passes = modes.enumerate as u64 + modes.enumerate_compressed as u64;
            report.terrace_size = BigUint::from(written / passes.max(1));
        }
    }

    if modes.detect {
        let on_terrace = scan_terrace(&mut DetectTerrace, &leaves, &constraints, false);
        report.is_terrace = Some(on_terrace);
        if !modes.count && !modes.any_enumeration() {
            report.terrace_size = BigUint::from(if on_terrace { 2u32 } else { 0u32 });
        }
    }

    Ok(report)
}

fn check_species_sets(tree: &Supertree, matrix: &PresenceMatrix) -> Result<(), TerraceError> {
    if tree.n_leaves() != matrix.n_species() {
        return Err(TerraceError::SpeciesCountMismatch {
            tree: tree.n_leaves(),
            matrix: matrix.n_species(),
        });
    }

    let known: HashSet<&str> = matrix.species().collect();
    let mut seen = HashSet::new();
    for leaf in tree.leaves() {
        let name = tree.name(leaf).ok_or(TerraceError::UnnamedLeaf)?;
        if !known.contains(name) || !seen.insert(name) {
            return Err(TerraceError::SpeciesMismatch(name.to_string()));
        }
    }
    for species in matrix.species() {
        if !seen.contains(species) {
            return Err(TerraceError::SpeciesMismatch(species.to_string()));
        }
    }

    Ok(())
}
