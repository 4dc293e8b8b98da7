use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to open profile table")]
    OpenFile(#[source] std::io::Error),

    #[error("Failed to read profile table")]
    ReadLine(#[source] std::io::Error),

    #[error("Profile table is empty")]
    Empty,

    #[error("Profile table header declares no locus column")]
    MissingLoci,

    #[error("Profile row {line} carries {found} fields while the header declares {expected}")]
    ShortRow{line: usize, expected: usize, found: usize},
}
