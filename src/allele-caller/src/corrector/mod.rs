use itertools::Itertools;
use mlst::Mutation;

use crate::counts::KmerCounts;
use crate::coverage::{self, Gap};
use crate::gapcover;

/// A template allele edited until (ideally) every kmer window is supported.
/// - template         : external identifier of the template allele. Filled in
///                      by the caller once the winning template is known.
/// - uncorrected_gaps : gaps the search could not cover within the budget.
///                      Empty means the sequence is fully supported.
#[derive(Debug, Clone)]
pub struct NovelAllele {
    pub template: String,
    pub sequence: Vec<u8>,
    pub n_mutations: usize,
    pub mutations: Vec<Mutation>,
    /// Maximum over the per-gap minimum depths of the accepted corrections.
    pub depth: u32,
    pub uncorrected_gaps: Vec<Gap>,
}

impl NovelAllele {
    pub fn is_complete(&self) -> bool {
        self.uncorrected_gaps.is_empty()
    }

    /// Human readable, semicolon-joined mutation listing.
    pub fn describe_mutations(&self) -> String {
        self.mutations.iter().join("; ")
    }
}

/// Correct every gap of a template allele in turn.
///
/// # Behavior
/// Gaps are re-detected left to right on the evolving sequence (a
/// skip-restricted coverage pass), excised together with their flanking
/// context, handed to the gap coverer, and spliced back on success. Events are
/// rebased from fragment to template coordinates. On failure the gap is
/// recorded as uncorrected and the scan resumes past it.
pub fn correct_template(
    template: &[u8],
    counts: &KmerCounts,
    kmer_thr: u32,
    max_mutations: usize,
) -> NovelAllele {
    let k = counts.k();
    let mut corrected = template.to_vec();
    let mut skip = 1usize;
    let mut mutations = Vec::new();
    let mut n_mutations = 0;
    let mut depth = 0u32;
    let mut uncorrected_gaps = Vec::new();

    loop {
        let cov = coverage::analyze_from(&corrected, counts, kmer_thr, skip);
        let Some(&(start, end)) = cov.gaps.first() else { break };

        // Fragment: the gapped windows plus flanking context, in base coordinates.
        let adj_start = start.saturating_sub(1).max(1);
        let adj_end = (end + k).min(corrected.len());
        let fragment = &corrected[adj_start - 1..adj_end];

        match gapcover::cover_gap(fragment, counts, kmer_thr, max_mutations) {
            Some(cover) => {
                let mut spliced = corrected[..adj_start - 1].to_vec();
                spliced.extend_from_slice(&cover.sequence);
                spliced.extend_from_slice(&corrected[adj_end..]);
                corrected = spliced;

                for mut mutation in cover.mutations {
                    mutation.rebase(adj_start - 1);
                    mutations.push(mutation);
                }
                n_mutations += cover.n_mutations;
                depth = depth.max(cover.depth);
                skip = (adj_start + cover.sequence.len()).saturating_sub(k).max(skip + 1);
            }
            None => {
                uncorrected_gaps.push((start, end));
                skip = end + 1;
            }
        }
    }

    NovelAllele {
        template: String::new(), // owned by the caller
        sequence: corrected,
        n_mutations,
        mutations,
        depth,
        uncorrected_gaps,
    }
}
