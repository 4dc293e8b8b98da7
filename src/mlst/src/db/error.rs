use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database declares an invalid kmer length of {0}. Kmer lengths must be strictly positive")]
    InvalidKmerLength(usize),

    #[error("Database does not declare any locus")]
    MissingLoci,

    #[error("Database kmer index is empty")]
    EmptyIndex,

    #[error("Locus '{name}' does not declare any allele")]
    MissingAlleles{name: String},

    #[error("A kmer posting references locus index {locus}, but the database only declares {n_loci} loci")]
    InvalidPosting{locus: u16, n_loci: usize},

    #[error("Profile table declares {found} loci while the database declares {expected}")]
    ProfileShape{expected: usize, found: usize},

    #[error("Failed to open database file")]
    OpenFile(#[source] std::io::Error),

    #[error("Failed to create database file")]
    CreateFile(#[source] std::io::Error),

    #[error("Failed to flush database file")]
    Flush(#[source] std::io::Error),

    #[error("Failed to decode database contents")]
    Decode(#[source] bincode::Error),

    #[error("Failed to encode database contents")]
    Encode(#[source] bincode::Error),
}
