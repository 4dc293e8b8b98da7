use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use anyhow::Result;
use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};
use located_error::LocatedError;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::profile::ProfileTable;

mod error;
pub use error::DatabaseError;

/// Canonical-kmer index: each known kmer maps to the ordered postings
/// describing which loci and alleles it evidences.
pub type KmerIndex = AHashMap<Vec<u8>, Vec<Posting>>;

/// One unit of evidence attached to an indexed kmer.
/// - locus   : index of the locus within [`KmerDb::loci`].
/// - weight  : signed vote weight. Negative weights let a kmer vote *against*
///             the listed alleles relative to the locus.
/// - alleles : 1-based internal indices of the alleles carrying this kmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub locus   : u16,
    pub weight  : i32,
    pub alleles : Vec<u16>,
}

/// Static description of one typed locus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocusInfo {
    /// Human readable locus name, e.g. "adk".
    pub name: String,
    /// External allele identifiers; `allele_ids[i-1]` names internal index `i`.
    pub allele_ids: Vec<String>,
    /// FASTA file carrying the allele sequences of this locus, relative to the
    /// scheme directory. The i-th record is the allele with internal index i.
    pub fasta: Option<PathBuf>,
}

impl LocusInfo {
    pub fn n_alleles(&self) -> usize {
        self.allele_ids.len()
    }

    /// External identifier of a 1-based internal allele index.
    pub fn external_id(&self, allele: u16) -> Option<&str> {
        self.allele_ids.get(usize::from(allele).checked_sub(1)?).map(String::as_str)
    }
}

/// The decoded, in-memory form of a precompiled typing database.
#[derive(Debug, Serialize, Deserialize)]
pub struct KmerDb {
    /// Kmer length the index was built with.
    pub k: usize,
    pub loci: Vec<LocusInfo>,
    pub index: KmerIndex,
    /// Optional sequence-type profile table of the scheme.
    pub profile: Option<ProfileTable>,
}

impl KmerDb {
    /// Decode a database from its on-disk form (gzip compressed bincode).
    ///
    /// # Errors
    /// - `DatabaseError::OpenFile` / `Decode` on unreadable or corrupt input.
    /// - Any validation failure described in [`KmerDb::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        use DatabaseError::{Decode, OpenFile};
        info!("Loading kmer database {}...", path.display());
        let file = File::open(path).map_err(OpenFile)
            .with_loc(|| format!("While opening database {}", path.display()))?;
        let gz = MultiGzDecoder::new(BufReader::new(file));
        let db: Self = bincode::deserialize_from(gz).map_err(Decode)
            .with_loc(|| format!("While decoding database {}", path.display()))?;
        db.validate().with_loc(|| format!("While validating database {}", path.display()))?;
        debug!(
            "Database ready: k={} | {} loci | {} indexed kmers | profile: {}",
            db.k, db.loci.len(), db.index.len(),
            if db.profile.is_some() { "yes" } else { "no" }
        );
        Ok(db)
    }

    /// Encode the database to its on-disk form (gzip compressed bincode).
    pub fn save(&self, path: &Path) -> Result<()> {
        use DatabaseError::{CreateFile, Encode, Flush};
        let loc_msg = || format!("While encoding database {}", path.display());
        let file = File::create(path).map_err(CreateFile)
            .with_loc(|| format!("While creating database {}", path.display()))?;
        let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
        bincode::serialize_into(&mut gz, self).map_err(Encode).with_loc(loc_msg)?;
        gz.finish().map_err(Flush).with_loc(loc_msg)?;
        Ok(())
    }

    /// Ensure every required section is present and internally consistent.
    ///
    /// # Errors
    /// One of the [`DatabaseError`] variants describing the first offending
    /// section.
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.k == 0 {
            return Err(DatabaseError::InvalidKmerLength(self.k));
        }
        if self.loci.is_empty() {
            return Err(DatabaseError::MissingLoci);
        }
        if self.index.is_empty() {
            return Err(DatabaseError::EmptyIndex);
        }
        for locus in &self.loci {
            if locus.allele_ids.is_empty() {
                return Err(DatabaseError::MissingAlleles { name: locus.name.clone() });
            }
        }
        for postings in self.index.values() {
            for posting in postings {
                if usize::from(posting.locus) >= self.loci.len() {
                    return Err(DatabaseError::InvalidPosting {
                        locus: posting.locus,
                        n_loci: self.loci.len(),
                    });
                }
            }
        }
        if let Some(profile) = &self.profile {
            if profile.loci.len() != self.loci.len() {
                return Err(DatabaseError::ProfileShape {
                    expected: self.loci.len(),
                    found: profile.loci.len(),
                });
            }
        }
        Ok(())
    }

    pub fn locus_names(&self) -> impl Iterator<Item = &str> {
        self.loci.iter().map(|locus| locus.name.as_str())
    }
}
