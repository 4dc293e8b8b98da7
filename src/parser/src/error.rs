use thiserror::Error;
use crate::FileEntity;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Invalid value for --{arg}. [{err}]")]
    ParseArg{arg: String, err: String},

    #[error("{0} {1} does not exist")]
    MissingFileEntity(FileEntity, String),

    #[error("{1} is not a {0}")]
    InvalidFileEntity(FileEntity, String),

    #[error("--threads must be strictly positive")]
    InvalidThreadCount,

    #[error("--kmer-thr must be strictly positive")]
    InvalidKmerThreshold,

    #[error("Failed to serialize command line arguments")]
    SerializeArgs(#[source] serde_yaml::Error),

    #[error("Failed to deserialize command line arguments")]
    DeserializeArgs(#[source] serde_yaml::Error),
}
