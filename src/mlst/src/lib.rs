pub mod kmer;

pub mod mutation;
pub use mutation::Mutation;

pub mod db;
pub use db::{DatabaseError, KmerDb, KmerIndex, LocusInfo, Posting};

pub mod profile;
pub use profile::{ProfileRow, ProfileTable, SequenceType};
