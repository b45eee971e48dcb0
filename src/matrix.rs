//! The per-partition presence/absence matrix.
//!
//! A [`PresenceMatrix`] records, for every species and every partition,
//! whether that species carries data in that partition. Rows are species,
//! columns are partitions, entries are `0` or `1`.

use std::{fmt::Display, fs, path::Path};

use fixedbitset::FixedBitSet;
use thiserror::Error;

/// Errors that can occur when building or parsing a [`PresenceMatrix`].
#[derive(Error, Debug)]
pub enum MatrixError {
    /// The matrix file contains no data
    #[error("Matrix file is empty.")]
    EmptyFile,
    /// The first line should contain the species and partition counts
    #[error("Expected a 'species partitions' header, got {0:?}.")]
    BadHeader(String),
    /// A matrix row does not have one entry per partition plus a species name
    #[error("Row {0} does not match the declared number of partitions.")]
    BadRow(usize),
    /// A matrix entry is not a number
    #[error("Matrix entry {0:?} is not a number.")]
    BadEntry(String),
    /// The number of rows does not match the declared species count
    #[error("Expected {expected} species rows, found {found}.")]
    WrongRowCount {
        /// Species count declared in the header
        expected: usize,
        /// Number of rows actually present
        found: usize,
    },
    /// The same species name appears on two rows
    #[error("Species {0} appears more than once.")]
    DuplicateSpecies(String),
    /// The number of species names does not match the number of data rows
    #[error("Got {names} species names for {rows} data rows.")]
    NameCountMismatch {
        /// Number of species names supplied
        names: usize,
        /// Number of data rows supplied
        rows: usize,
    },
    /// There was a [`std::io::Error`] when reading a matrix file
    #[error("Error reading matrix file")]
    IoError(#[from] std::io::Error),
}

/// A presence/absence matrix over species and partitions.
///
/// Entries are stored row-major, one byte per cell. The container itself
/// accepts any byte value; [`PresenceMatrix::first_non_binary`] lets callers
/// reject matrices with entries other than `0` and `1` before analysis.
///
/// # Example
/// ```
/// use terraces::matrix::PresenceMatrix;
///
/// let matrix = PresenceMatrix::from_rows(
///     vec!["s1".to_string(), "s2".to_string()],
///     &[vec![1, 0], vec![0, 1]],
/// )
/// .unwrap();
///
/// assert_eq!(matrix.n_species(), 2);
/// assert_eq!(matrix.n_partitions(), 2);
/// assert_eq!(matrix.get(0, 0), 1);
/// assert_eq!(matrix.get(1, 0), 0);
/// ```
#[derive(Debug, Clone)]
pub struct PresenceMatrix {
    species: Vec<String>,
    n_partitions: usize,
    cells: Vec<u8>,
}

impl PresenceMatrix {
    /// Create an all-zero matrix for the given species and partition count
    pub fn new(species: Vec<String>, n_partitions: usize) -> Result<Self, MatrixError> {
        check_unique(&species)?;
        let cells = vec![0; species.len() * n_partitions];
        Ok(Self {
            species,
            n_partitions,
            cells,
        })
    }

    /// Create a matrix from one data row per species
    pub fn from_rows(species: Vec<String>, rows: &[Vec<u8>]) -> Result<Self, MatrixError> {
        if species.len() != rows.len() {
            return Err(MatrixError::NameCountMismatch {
                names: species.len(),
                rows: rows.len(),
            });
        }
        check_unique(&species)?;

        let n_partitions = rows.first().map(|row| row.len()).unwrap_or_default();
        let mut cells = Vec::with_capacity(species.len() * n_partitions);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_partitions {
                return Err(MatrixError::BadRow(i + 1));
            }
            cells.extend_from_slice(row);
        }

        Ok(Self {
            species,
            n_partitions,
            cells,
        })
    }

    /// Number of species (matrix rows)
    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    /// Number of partitions (matrix columns)
    pub fn n_partitions(&self) -> usize {
        self.n_partitions
    }

    /// Name of the species on a given row.
    /// Panics if `species` is out of range.
    pub fn species_name(&self, species: usize) -> &str {
        &self.species[species]
    }

    /// Iterate over the species names in row order
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(String::as_str)
    }

    /// Read a matrix entry.
    /// Panics if `species` or `partition` is out of range.
    pub fn get(&self, species: usize, partition: usize) -> u8 {
        self.cells[species * self.n_partitions + partition]
    }

    /// Write a matrix entry.
    /// Panics if `species` or `partition` is out of range.
    pub fn set(&mut self, species: usize, partition: usize, value: u8) {
        self.cells[species * self.n_partitions + partition] = value;
    }

    /// Returns the first cell whose value is neither `0` nor `1`, as
    /// `(species, partition, value)`, scanning row by row.
    pub fn first_non_binary(&self) -> Option<(usize, usize, u8)> {
        for species in 0..self.n_species() {
            for partition in 0..self.n_partitions {
                let value = self.get(species, partition);
                if value > 1 {
                    return Some((species, partition, value));
                }
            }
        }
        None
    }

    /// Returns the first species with data in every partition, if any.
    /// This species is used to root the supertree.
    pub fn full_data_row(&self) -> Option<usize> {
        (0..self.n_species())
            .find(|&species| (0..self.n_partitions).all(|p| self.get(species, p) != 0))
    }

    /// Returns the first species with data in no partition at all, if any
    pub fn empty_data_row(&self) -> Option<usize> {
        (0..self.n_species())
            .find(|&species| (0..self.n_partitions).all(|p| self.get(species, p) == 0))
    }

    /// The set of species with data in a given partition, as a bit set
    /// indexed by species row.
    pub fn partition_mask(&self, partition: usize) -> FixedBitSet {
        let mut mask = FixedBitSet::with_capacity(self.n_species());
        for species in 0..self.n_species() {
            if self.get(species, partition) != 0 {
                mask.insert(species);
            }
        }
        mask
    }

    /// Parse a matrix from its text representation.
    ///
    /// The first non-empty line holds the species and partition counts, then
    /// each species row holds one `0`/`1` entry per partition followed by the
    /// species name:
    ///
    /// ```text
    /// 5 2
    /// 1 0 s1
    /// 1 0 s2
    /// 1 1 s3
    /// 0 1 s4
    /// 0 1 s5
    /// ```
    pub fn from_data(data: &str) -> Result<Self, MatrixError> {
        let mut lines = data.lines().filter(|line| !line.trim().is_empty());

        let header = lines.next().ok_or(MatrixError::EmptyFile)?;
        let counts: Vec<_> = header.split_whitespace().collect();
        let (n_species, n_partitions) = match counts.as_slice() {
            [species, partitions] => (
                species
                    .parse::<usize>()
                    .map_err(|_| MatrixError::BadHeader(header.to_string()))?,
                partitions
                    .parse::<usize>()
                    .map_err(|_| MatrixError::BadHeader(header.to_string()))?,
            ),
            _ => return Err(MatrixError::BadHeader(header.to_string())),
        };

        let mut species = Vec::with_capacity(n_species);
        let mut rows = Vec::with_capacity(n_species);
        for (i, line) in lines.enumerate() {
            let fields: Vec<_> = line.split_whitespace().collect();
            if fields.len() != n_partitions + 1 {
                return Err(MatrixError::BadRow(i + 1));
            }
            let entries: Result<Vec<u8>, _> = fields[..n_partitions]
                .iter()
                .map(|f| {
                    f.parse::<u8>()
                        .map_err(|_| MatrixError::BadEntry(f.to_string()))
                })
                .collect();
            rows.push(entries?);
            species.push(fields[n_partitions].to_string());
        }

        if species.len() != n_species {
            return Err(MatrixError::WrongRowCount {
                expected: n_species,
                found: species.len(),
            });
        }

        Self::from_rows(species, &rows)
    }

    /// Read a matrix from a data file
    pub fn from_file(path: &Path) -> Result<Self, MatrixError> {
        let data = fs::read_to_string(path)?;
        Self::from_data(&data)
    }

    /// Render the matrix in the text format read by [`PresenceMatrix::from_data`]
    pub fn to_data(&self) -> String {
        let mut output = format!("{} {}\n", self.n_species(), self.n_partitions);
        for species in 0..self.n_species() {
            for partition in 0..self.n_partitions {
                output += &format!("{} ", self.get(species, partition));
            }
            output += &self.species[species];
            output += "\n";
        }
        output
    }
}

impl Display for PresenceMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_data())
    }
}

fn check_unique(species: &[String]) -> Result<(), MatrixError> {
    let mut seen = std::collections::HashSet::new();
    for name in species {
        if !seen.insert(name.as_str()) {
            return Err(MatrixError::DuplicateSpecies(name.clone()));
        }
    }
    Ok(())
}
