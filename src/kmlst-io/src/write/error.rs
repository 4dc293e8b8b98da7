use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Failed to write output")]
    IOError(#[from] std::io::Error),
}
