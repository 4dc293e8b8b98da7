use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use anyhow::Result;
use located_error::LocatedError;
use log::{debug, warn};
use needletail::{parse_fastx_file, parser::FastxReader, Sequence};

mod error;
pub use error::ReadError;

pub mod alleles;
pub use alleles::AlleleStore;

/// File extensions stripped (repeatedly) while deriving a sample name.
const STRIP_EXTENSIONS: [&str; 5] = ["gz", "fastq", "fq", "fasta", "fa"];

/// Mate suffixes stripped once after extension removal.
const STRIP_SUFFIXES: [&str; 4] = ["_R1", "_R2", "_1", "_2"];

/// One sequencing sample: a derived name and the read files backing it
/// (forward, plus the optional reverse mate).
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    files: Vec<PathBuf>,
}

impl Sample {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Stream every read sequence of this sample, across all of its files.
    pub fn sequences(&self) -> ReadSequences {
        ReadSequences::new(self.files.clone())
    }
}

/// Pair forward and reverse read files into samples, by position.
///
/// Reverse files are optional, but when provided their count must match the
/// forward count. Note that actual read pairing is irrelevant here: mates are
/// only grouped so that both files feed the same count table.
///
/// # Errors
/// - `ReadError::MissingForward` when no forward file is given.
/// - `ReadError::MismatchedPairs` when the forward/reverse counts differ.
/// - `ReadError::UnderivableSampleName` when a file name yields no sample name.
pub fn pair_samples(forward: &[PathBuf], reverse: &[PathBuf]) -> Result<Vec<Sample>> {
    use ReadError::{MismatchedPairs, MissingForward};
    let loc_msg = "While pairing input sequencing files into samples";

    if forward.is_empty() {
        return Err(MissingForward).loc(loc_msg)
    }
    if !reverse.is_empty() && reverse.len() != forward.len() {
        return Err(MismatchedPairs { forward: forward.len(), reverse: reverse.len() })
            .loc(loc_msg)
    }

    forward.iter().enumerate()
        .map(|(idx, fwd)| {
            let name = sample_name(fwd).loc(loc_msg)?;
            let mut files = vec![fwd.clone()];
            if let Some(rev) = reverse.get(idx) {
                files.push(rev.clone());
            }
            debug!("Sample '{name}': {files:?}");
            Ok(Sample { name, files })
        })
        .collect()
}

/// Derive a sample name from a read file path.
///
/// Strips the usual fastq extensions (possibly doubled, e.g. `.fastq.gz`),
/// then one trailing mate suffix (`_1`, `_2`, `_R1`, `_R2`).
pub fn sample_name(path: &Path) -> Result<String, ReadError> {
    let underivable = || ReadError::UnderivableSampleName(path.display().to_string());
    let mut stem = path.file_name()
        .and_then(OsStr::to_str)
        .map(ToString::to_string)
        .ok_or_else(underivable)?;

    loop {
        match stem.rsplit_once('.') {
            Some((head, ext)) if STRIP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
                stem = head.to_string();
            }
            _ => break,
        }
    }
    for suffix in STRIP_SUFFIXES {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            stem = stripped.to_string();
            break
        }
    }

    if stem.is_empty() { Err(underivable()) } else { Ok(stem) }
}

/// Lazy iterator over the read sequences of one sample.
///
/// Sequences are normalized to uppercase ACGTN on the fly. Malformed records
/// are reported as warnings and yielded as empty reads: content never aborts a
/// run, only unreadable files do.
pub struct ReadSequences {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<Box<dyn FastxReader>>,
}

impl ReadSequences {
    fn new(files: Vec<PathBuf>) -> Self {
        Self { files: files.into_iter(), current: None }
    }
}

impl Iterator for ReadSequences {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        use ReadError::OpenSequences;
        loop {
            if let Some(reader) = self.current.as_mut() {
                match reader.next() {
                    Some(Ok(record)) => return Some(Ok(record.normalize(false).into_owned())),
                    Some(Err(e)) => {
                        warn!("Malformed sequence record ({e}). Treating as an empty read.");
                        return Some(Ok(Vec::new()))
                    }
                    None => self.current = None,
                }
            } else {
                let path = self.files.next()?;
                debug!("Streaming reads from {}", path.display());
                match parse_fastx_file(&path) {
                    Ok(reader) => self.current = Some(reader),
                    Err(e) => return Some(
                        Err(OpenSequences(e))
                            .with_loc(|| format!("While opening {}", path.display()))
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pathbufs(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn sample_names() {
        let cases = [
            ("reads/ERR026529_1.fastq.gz", "ERR026529"),
            ("reads/ERR026529_2.fastq.gz", "ERR026529"),
            ("isolate_R1.fq",              "isolate"),
            ("plain.fastq",                "plain"),
            ("noext",                      "noext"),
        ];
        for (path, want) in cases {
            assert_eq!(sample_name(Path::new(path)).unwrap(), want);
        }
    }

    #[test]
    fn underivable_sample_name() {
        assert!(sample_name(Path::new("_1.fastq.gz")).is_err());
    }

    #[test]
    fn pairing_single_end() -> Result<()> {
        let samples = pair_samples(&pathbufs(&["a_1.fq", "b_1.fq"]), &[])?;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name, "a");
        assert_eq!(samples[0].files().len(), 1);
        Ok(())
    }

    #[test]
    fn pairing_paired_end() -> Result<()> {
        let samples = pair_samples(
            &pathbufs(&["a_1.fq", "b_1.fq"]),
            &pathbufs(&["a_2.fq", "b_2.fq"]),
        )?;
        assert_eq!(samples[1].name, "b");
        assert_eq!(samples[1].files().len(), 2);
        Ok(())
    }

    #[test]
    fn pairing_rejects_mismatched_counts() {
        let result = pair_samples(&pathbufs(&["a_1.fq", "b_1.fq"]), &pathbufs(&["a_2.fq"]));
        assert!(result.is_err());
    }

    #[test]
    fn pairing_rejects_empty_forward() {
        assert!(pair_samples(&[], &[]).is_err());
    }

    #[test]
    fn stream_reads_across_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fwd = dir.path().join("toy_1.fastq");
        let rev = dir.path().join("toy_2.fastq");
        let mut file = std::fs::File::create(&fwd)?;
        write!(file, "@r1\nacgtacgt\n+\nIIIIIIII\n")?;
        let mut file = std::fs::File::create(&rev)?;
        write!(file, "@r1\nTTGGCCAA\n+\nIIIIIIII\n")?;

        let sample = &pair_samples(&[fwd], &[rev])?[0];
        let reads: Vec<Vec<u8>> = sample.sequences().collect::<Result<_>>()?;
        // lowercase input comes out normalized
        assert_eq!(reads, vec![b"ACGTACGT".to_vec(), b"TTGGCCAA".to_vec()]);
        Ok(())
    }
}
