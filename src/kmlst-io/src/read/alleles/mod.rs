use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use ahash::AHashMap;
use anyhow::Result;
use located_error::LocatedError;
use log::debug;
use mlst::LocusInfo;
use needletail::{parse_fastx_file, Sequence};

mod error;
pub use error::AlleleError;

/// Lazily loaded allele sequences, one FASTA file per locus.
///
/// Sequences are only read from disk the first time a locus is requested, so
/// loci that resolve without sequence evidence (e.g. absent loci) never touch
/// their FASTA at all. Loaded loci are cached and shared across samples.
#[derive(Debug)]
pub struct AlleleStore {
    base_dir: PathBuf,
    cache: Mutex<AHashMap<String, Arc<Vec<Vec<u8>>>>>,
}

impl AlleleStore {
    /// `base_dir` is the directory allele FASTA paths are resolved against,
    /// typically the directory holding the database.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            cache: Mutex::new(AHashMap::new()),
        }
    }

    /// All allele sequences of a locus, ordered by internal index: the i-th
    /// record of the FASTA is the allele with internal index i (1-based).
    ///
    /// # Errors
    /// - `AlleleError::MissingFasta` when the locus declares no FASTA file.
    /// - `AlleleError::OpenFasta` / `ParseFasta` on unreadable content.
    pub fn locus_sequences(&self, locus: &LocusInfo) -> Result<Arc<Vec<Vec<u8>>>> {
        if let Some(cached) = self.lock_cache().get(&locus.name) {
            return Ok(Arc::clone(cached))
        }

        let sequences = Arc::new(self.load_locus(locus)?);
        self.lock_cache().insert(locus.name.clone(), Arc::clone(&sequences));
        Ok(sequences)
    }

    fn load_locus(&self, locus: &LocusInfo) -> Result<Vec<Vec<u8>>> {
        use AlleleError::{MissingFasta, OpenFasta, ParseFasta};
        let loc_msg = || format!("While loading allele sequences of locus '{}'", locus.name);

        let fasta = locus.fasta.as_ref()
            .ok_or_else(|| MissingFasta(locus.name.clone()))
            .with_loc(loc_msg)?;
        let path = self.base_dir.join(fasta);
        debug!("Loading allele sequences of locus '{}' from {}", locus.name, path.display());

        let mut reader = parse_fastx_file(&path).map_err(OpenFasta).with_loc(loc_msg)?;
        let mut sequences = Vec::with_capacity(locus.n_alleles());
        while let Some(record) = reader.next() {
            let record = record.map_err(ParseFasta).with_loc(loc_msg)?;
            sequences.push(record.normalize(false).into_owned());
        }
        Ok(sequences)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, AHashMap<String, Arc<Vec<Vec<u8>>>>> {
        self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mock_locus(fasta: Option<&str>) -> LocusInfo {
        LocusInfo {
            name: "adk".to_string(),
            allele_ids: vec!["1".to_string(), "2".to_string()],
            fasta: fasta.map(PathBuf::from),
        }
    }

    #[test]
    fn loads_records_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut file = std::fs::File::create(dir.path().join("adk.fa"))?;
        write!(file, ">adk_1\nACGTACGT\n>adk_2\nacgtacga\n")?;

        let store = AlleleStore::new(dir.path());
        let seqs = store.locus_sequences(&mock_locus(Some("adk.fa")))?;
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0], b"ACGTACGT".to_vec());
        assert_eq!(seqs[1], b"ACGTACGA".to_vec()); // normalized to uppercase
        Ok(())
    }

    #[test]
    fn caches_loaded_loci() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("adk.fa");
        let mut file = std::fs::File::create(&path)?;
        write!(file, ">adk_1\nACGTACGT\n")?;

        let store = AlleleStore::new(dir.path());
        let first = store.locus_sequences(&mock_locus(Some("adk.fa")))?;
        // Deleting the backing file must not matter anymore.
        std::fs::remove_file(&path)?;
        let second = store.locus_sequences(&mock_locus(Some("adk.fa")))?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn missing_fasta_is_an_error() {
        let store = AlleleStore::new("/nonexistent");
        assert!(store.locus_sequences(&mock_locus(None)).is_err());
    }
}
