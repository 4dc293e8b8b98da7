use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallerError {
    #[error("Locus '{locus}' provides no sequence for allele index {allele}. The allele FASTA and the database disagree")]
    MissingAlleleSequence{locus: String, allele: u16},

    #[error("Locus '{locus}' declares no external identifier for allele index {allele}")]
    MissingAlleleId{locus: String, allele: u16},
}
