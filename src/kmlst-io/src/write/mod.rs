use std::{fs::File, io::{BufWriter, Write}, path::Path};

use anyhow::Result;
use located_error::LocatedError;

mod error;
pub use error::WriterError;

/// THE field separator used for every tabular result stream.
pub const WRITER_SEPARATOR: &str = "\t";

/// A generic tabular result writer.
/// - source: Boxed `BufWriter` (can either handle file-writing, or stdout).
pub struct TableWriter<'a> {
    source: BufWriter<Box<dyn Write + 'a>>,
}

impl<'a> TableWriter<'a> {
    /// Instantiate a new `TableWriter`, linked to a file, or to stdout when no
    /// path is provided.
    ///
    /// # Errors
    /// if `path` is either an invalid file, or the user does not have the
    /// proper UNIX permissions to write at this location.
    pub fn new(path: Option<impl AsRef<Path>>) -> Result<TableWriter<'a>> {
        use WriterError::IOError;
        Ok(TableWriter { source: match path {
            Some(path) => {
                let file = File::create(path).map_err(IOError).loc("While creating file")?;
                BufWriter::new(Box::new(file))
            },
            None => {
                BufWriter::new(Box::new(std::io::stdout()))
            }
        }})
    }

    /// Write one row: fields joined with [`WRITER_SEPARATOR`], one trailing newline.
    ///
    /// # Errors
    /// If the row fails to get written within the file.
    pub fn write_row<T, I>(&mut self, fields: T) -> Result<()>
    where   T: IntoIterator<Item = I>,
            I: std::fmt::Display,
    {
        use WriterError::IOError;
        let row = fields.into_iter()
            .map(|field| field.to_string())
            .collect::<Vec<String>>()
            .join(WRITER_SEPARATOR);
        writeln!(self.source, "{row}").map_err(IOError)
            .loc("While writing row into file")
    }

    /// Write the contents of a generic iterator within a file/stdout.
    /// one Iteration step = one line.
    ///
    /// # Errors
    /// - If any of the Items within `iter` fails to get written within the file.
    pub fn write_iter<T, I>(&mut self, iter: T) -> Result<()>
    where   T: IntoIterator<Item = I>,
            I: std::fmt::Display,
    {
        use WriterError::IOError;
        for line in iter {
            writeln!(self.source, "{line}").map_err(IOError)
                .loc("While writing contents into file")?;
        }
        self.flush()
    }

    /// Flush buffered contents down to the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.source.flush()
            .map_err(WriterError::IOError)
            .loc("While flushing buffer contents of TableWriter")
    }
}

/// A minimal FASTA writer for special-case allele sequences.
pub struct FastaWriter<'a> {
    source: BufWriter<Box<dyn Write + 'a>>,
}

impl<'a> FastaWriter<'a> {
    /// See [`TableWriter::new`]: file when a path is provided, stdout otherwise.
    pub fn new(path: Option<impl AsRef<Path>>) -> Result<FastaWriter<'a>> {
        use WriterError::IOError;
        Ok(FastaWriter { source: match path {
            Some(path) => {
                let file = File::create(path).map_err(IOError).loc("While creating file")?;
                BufWriter::new(Box::new(file))
            },
            None => BufWriter::new(Box::new(std::io::stdout())),
        }})
    }

    /// Write one record: `>header` line followed by the raw sequence.
    pub fn write_record(&mut self, header: &str, sequence: &[u8]) -> Result<()> {
        use WriterError::IOError;
        let loc_msg = "While writing FASTA record";
        writeln!(self.source, ">{header}").map_err(IOError).loc(loc_msg)?;
        self.source.write_all(sequence).map_err(IOError).loc(loc_msg)?;
        writeln!(self.source).map_err(IOError).loc(loc_msg)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.source.flush()
            .map_err(WriterError::IOError)
            .loc("While flushing buffer contents of FastaWriter")
    }
}
