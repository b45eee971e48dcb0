#![warn(missing_docs)]
//! Answer questions about phylogenetic terraces.
//!
//! Given a supertree over a set of species and a per-partition
//! presence/absence matrix, the *terrace* of that input is the set of all
//! binary trees inducing the same per-partition subtrees. This crate
//! extracts the rooted triple constraints that characterize the terrace and
//! can count its trees, enumerate them as Newick lines (plainly or through
//! a compressed tree DAG), or just detect whether the terrace holds more
//! than one tree.
//!
//! The high-level entry point is [`terrace_analysis`]; the building blocks
//! (constraint extraction, the leaf-set partitioner and the generic
//! [`scan::scan_terrace`] recursion) are public for callers that need finer
//! control.
//!
//! # Example
//! ```
//! use terraces::{terrace_analysis, OutputModes, PresenceMatrix};
//!
//! let matrix = PresenceMatrix::from_rows(
//!     vec!["s1".into(), "s2".into(), "s3".into(), "s4".into(), "s5".into()],
//!     &[vec![1, 0], vec![1, 0], vec![1, 1], vec![0, 1], vec![0, 1]],
//! )
//! .unwrap();
//!
//! let modes = OutputModes { count: true, enumerate: true, ..OutputModes::default() };
//! let mut trees = Vec::new();
//! let report =
//!     terrace_analysis(&matrix, "((s1,s2),s3,(s4,s5));", modes, Some(&mut trees)).unwrap();
//!
//! assert_eq!(report.terrace_size.to_string(), "15");
//! assert_eq!(String::from_utf8(trees).unwrap().lines().count(), 15);
//! ```

pub mod analysis;
pub mod combiners;
pub mod constraint;
pub mod forest;
pub mod labels;
pub mod leafset;
pub mod matrix;
pub mod newick;
pub mod scan;
pub mod supertree;

pub use analysis::{terrace_analysis, AnalysisReport, OutputModes, TerraceError};
pub use matrix::PresenceMatrix;

/// A type that represents dense species identifiers. Ids are assigned from
/// the matrix row order and stay stable for one analysis.
pub type LeafId = usize;
