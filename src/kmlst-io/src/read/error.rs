use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("No forward sequencing file was provided")]
    MissingForward,

    #[error("Mismatched input: {forward} forward file(s) against {reverse} reverse file(s)")]
    MismatchedPairs{forward: usize, reverse: usize},

    #[error("Cannot derive a sample name from '{0}'")]
    UnderivableSampleName(String),

    #[error("Failed to open sequencing reads")]
    OpenSequences(#[source] needletail::errors::ParseError),
}
