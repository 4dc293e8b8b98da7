use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlleleError {
    #[error("Locus '{0}' does not declare an allele FASTA file")]
    MissingFasta(String),

    #[error("Failed to open allele FASTA")]
    OpenFasta(#[source] needletail::errors::ParseError),

    #[error("Failed to parse allele FASTA record")]
    ParseFasta(#[source] needletail::errors::ParseError),
}
