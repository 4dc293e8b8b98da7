use std::{fs::File, io::{BufRead, BufReader}, path::Path};

use anyhow::Result;
use located_error::LocatedError;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

mod error;
pub use error::ProfileError;

/// Column header naming the optional clonal complex column of a profile table.
const CLONAL_COMPLEX_HEADER: &str = "clonal_complex";

/// A known combination of alleles, labeled with its sequence type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub st: String,
    /// External allele identifiers, one per locus, in header order.
    pub alleles: Vec<String>,
    /// Empty when the scheme does not group its sequence types.
    pub clonal_complex: String,
}

/// A sequence-type profile table: `ST <locus..> [clonal_complex]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTable {
    /// Locus names, in column order.
    pub loci: Vec<String>,
    pub rows: Vec<ProfileRow>,
}

/// Result of a profile lookup. Unknown genotypes resolve to `ST=0, CC=""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceType {
    pub st: String,
    pub clonal_complex: String,
}

impl Default for SequenceType {
    fn default() -> Self {
        Self { st: String::from("0"), clonal_complex: String::new() }
    }
}

impl ProfileTable {
    /// Parse a tab-separated profile table.
    ///
    /// The first column is the sequence type, the next columns are allele
    /// identifiers (one per locus), and a trailing `clonal_complex` column is
    /// optional. Extra trailing columns are ignored.
    ///
    /// # Errors
    /// - `ProfileError::Empty` / `MissingLoci` on a header-less or locus-less table.
    /// - `ProfileError::ShortRow` whenever a row carries fewer fields than the header.
    pub fn from_tsv(path: &Path) -> Result<Self> {
        use ProfileError::{Empty, MissingLoci, OpenFile, ReadLine, ShortRow};
        let loc_msg = || format!("While parsing profile table {}", path.display());

        let file = File::open(path).map_err(OpenFile).with_loc(loc_msg)?;
        let mut lines = BufReader::new(file).lines().enumerate();

        let (_, header) = lines.next().ok_or(Empty).with_loc(loc_msg)?;
        let header = header.map_err(ReadLine).with_loc(loc_msg)?;
        let mut columns: Vec<&str> = header.split('\t').collect();

        let has_clonal_complex = columns
            .last()
            .is_some_and(|name| name.eq_ignore_ascii_case(CLONAL_COMPLEX_HEADER));
        if has_clonal_complex {
            columns.pop();
        }
        if columns.len() < 2 {
            return Err(MissingLoci).with_loc(loc_msg);
        }
        let loci: Vec<String> = columns[1..].iter().map(ToString::to_string).collect();
        let expected = 1 + loci.len() + usize::from(has_clonal_complex);

        let mut rows = Vec::new();
        for (line_idx, line) in lines {
            let line = line.map_err(ReadLine).with_loc(loc_msg)?;
            if line.trim().is_empty() {
                continue
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < expected {
                return Err(ShortRow { line: line_idx + 1, expected, found: fields.len() })
                    .with_loc(loc_msg);
            }
            rows.push(ProfileRow {
                st: fields[0].to_string(),
                alleles: fields[1..=loci.len()].iter().map(ToString::to_string).collect(),
                clonal_complex: if has_clonal_complex {
                    fields[loci.len() + 1].to_string()
                } else {
                    String::new()
                },
            });
        }
        debug!("Parsed profile table: {} loci | {} sequence types", loci.len(), rows.len());
        Ok(Self { loci, rows })
    }

    /// Look a called genotype up within the table.
    ///
    /// Linear scan; the first row whose allele columns match the genotype
    /// exactly (as strings) wins. Unknown genotypes resolve to the default
    /// `SequenceType` (`ST=0`, empty clonal complex).
    pub fn sequence_type(&self, genotype: &[String]) -> SequenceType {
        for row in &self.rows {
            if row.alleles == genotype {
                trace!("Genotype matched sequence type {}", row.st);
                return SequenceType {
                    st: row.st.clone(),
                    clonal_complex: row.clonal_complex.clone(),
                };
            }
        }
        SequenceType::default()
    }
}
