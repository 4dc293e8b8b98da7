use crate::counts::KmerCounts;

/// Depth reported for sequences yielding no kmer window at all. Callers must
/// guard against it before comparing depths against a threshold.
pub const DEPTH_SENTINEL: u32 = u32::MAX;

/// A maximal run of uncovered kmer positions: 1-based, inclusive on both ends,
/// expressed within the kmer stream of the analyzed sequence (positions
/// `1..=L-k+1`).
pub type Gap = (usize, usize);

/// Coverage profile of one candidate sequence against a count table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqCoverage {
    /// Minimum kmer depth over every scanned position ([`DEPTH_SENTINEL`] when
    /// nothing got scanned).
    pub min_depth: u32,
    pub covered: usize,
    pub uncovered: usize,
    /// Merged uncovered intervals, in scan order.
    pub gaps: Vec<Gap>,
}

impl SeqCoverage {
    /// Number of scanned kmer positions.
    pub fn total(&self) -> usize {
        self.covered + self.uncovered
    }

    /// Covered fraction, in [0, 1]. Zero for sequences without any window.
    pub fn fraction(&self) -> f64 {
        if self.total() == 0 {
            return 0.0
        }
        self.covered as f64 / self.total() as f64
    }

    /// Whether every scanned position reached the depth threshold.
    pub fn is_fully_covered(&self, kmer_thr: u32) -> bool {
        self.uncovered == 0
            && self.min_depth != DEPTH_SENTINEL
            && self.min_depth >= kmer_thr
    }
}

/// Analyze the full kmer stream of `seq`. See [`analyze_from`].
pub fn analyze(seq: &[u8], counts: &KmerCounts, kmer_thr: u32) -> SeqCoverage {
    analyze_from(seq, counts, kmer_thr, 1)
}

/// Walk the kmer stream of `seq` against the count table, starting at the
/// 1-based kmer position `skip`.
///
/// Every position with depth >= `kmer_thr` counts as covered; others open (or
/// extend) a gap. A trailing gap is closed at the last kmer position. Gaps
/// separated by less than one kmer width are then merged: a lone matching
/// window inside a mutated stretch would otherwise split one underlying event
/// into two gaps, as a single substitution taints exactly k adjacent windows.
pub fn analyze_from(seq: &[u8], counts: &KmerCounts, kmer_thr: u32, skip: usize) -> SeqCoverage {
    let k = counts.k();
    let mut coverage = SeqCoverage {
        min_depth: DEPTH_SENTINEL,
        covered: 0,
        uncovered: 0,
        gaps: Vec::new(),
    };
    if seq.len() < k {
        return coverage
    }

    let n_positions = seq.len() - k + 1;
    let mut open_gap: Option<usize> = None;
    for pos0 in skip.saturating_sub(1)..n_positions {
        let depth = counts.depth(&seq[pos0..pos0 + k]);
        coverage.min_depth = coverage.min_depth.min(depth);
        if depth >= kmer_thr {
            coverage.covered += 1;
            if let Some(start) = open_gap.take() {
                coverage.gaps.push((start, pos0)); // ends on the previous position
            }
        } else {
            coverage.uncovered += 1;
            if open_gap.is_none() {
                open_gap = Some(pos0 + 1);
            }
        }
    }
    if let Some(start) = open_gap {
        coverage.gaps.push((start, n_positions));
    }

    merge_gaps(&mut coverage.gaps, k);
    coverage
}

/// Merge consecutive gaps `(s1, e1)`, `(s2, e2)` whenever `s1 + k >= s2`.
fn merge_gaps(gaps: &mut Vec<Gap>, k: usize) {
    if gaps.len() < 2 {
        return
    }
    let mut merged: Vec<Gap> = Vec::with_capacity(gaps.len());
    for &(start, end) in gaps.iter() {
        match merged.last_mut() {
            Some(previous) if previous.0 + k >= start => previous.1 = end,
            _ => merged.push((start, end)),
        }
    }
    *gaps = merged;
}
