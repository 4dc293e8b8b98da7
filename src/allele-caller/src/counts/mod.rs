use ahash::AHashMap;
use anyhow::Result;
use mlst::{kmer, KmerIndex};

/// Counting policy of the kmer counter.
#[derive(Clone, Copy)]
pub enum CountMode<'a> {
    /// Only count kmers already keyed within the provided index. This is the
    /// operational mode: everything the caller needs votes or coverage for is
    /// indexed, and dropping the rest keeps the table small.
    Restricted(&'a KmerIndex),
    /// Count every canonical kmer encountered (diagnostic).
    Unrestricted,
}

/// A canonical-kmer count table, accumulated from the reads of one sample.
#[derive(Debug, Clone)]
pub struct KmerCounts {
    k: usize,
    counts: AHashMap<Vec<u8>, u32>,
}

impl KmerCounts {
    pub fn new(k: usize) -> Self {
        Self { k, counts: AHashMap::new() }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of distinct canonical kmers counted so far.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Slide a width-k window over one read and accumulate canonical kmers.
    ///
    /// Windows carrying any non-ACGT base are skipped. Reads shorter than k
    /// contribute nothing. Never fails on content.
    pub fn add_read(&mut self, seq: &[u8], mode: &CountMode) {
        if seq.len() < self.k {
            return
        }
        for window in seq.windows(self.k) {
            if !kmer::is_valid_kmer(window) {
                continue
            }
            let canon = kmer::canonical(window);
            match mode {
                CountMode::Restricted(index) => {
                    if let Some(count) = self.counts.get_mut(canon.as_ref()) {
                        *count += 1;
                    } else if index.contains_key(canon.as_ref()) {
                        self.counts.insert(canon.into_owned(), 1);
                    }
                }
                CountMode::Unrestricted => {
                    *self.counts.entry(canon.into_owned()).or_insert(0) += 1;
                }
            }
        }
    }

    /// Depth of an arbitrary (not necessarily canonical) kmer.
    pub fn depth(&self, window: &[u8]) -> u32 {
        self.counts.get(kmer::canonical(window).as_ref()).copied().unwrap_or(0)
    }

    /// Raw count of an already-canonical kmer.
    pub fn get(&self, canonical: &[u8]) -> u32 {
        self.counts.get(canonical).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, u32)> {
        self.counts.iter().map(|(kmer, count)| (kmer, *count))
    }
}

/// Accumulate the counts of a whole sample from a fallible read stream.
///
/// # Errors
/// Only I/O errors bubbled up by the read iterator itself: content never
/// aborts the count.
pub fn count_sample<I>(k: usize, reads: I, mode: &CountMode) -> Result<KmerCounts>
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
{
    let mut counts = KmerCounts::new(k);
    for read in reads {
        counts.add_read(&read?, mode);
    }
    Ok(counts)
}
