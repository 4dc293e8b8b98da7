use std::cmp::Reverse;

use mlst::{KmerIndex, LocusInfo};

use crate::counts::KmerCounts;

/// Per-locus and per-allele vote totals of one sample.
/// - votes      : `votes[locus][allele - 1]`, signed. A negative total means the
///                counted kmers mostly voted *against* the allele.
/// - loci_votes : `loci_votes[locus]`, the unsigned evidence mass of the locus.
#[derive(Debug, Clone)]
pub struct VoteTable {
    votes: Vec<Vec<i64>>,
    loci_votes: Vec<u64>,
}

/// Join a count table against the kmer index.
///
/// For every counted kmer and every posting `(locus, weight, alleles)` at this
/// kmer: `v = weight * count` is added to each listed allele of the locus, and
/// `|v|` to the locus total. Purely additive, hence insensitive to the
/// iteration order of the count table.
pub fn tally(counts: &KmerCounts, index: &KmerIndex, loci: &[LocusInfo]) -> VoteTable {
    let mut votes: Vec<Vec<i64>> = loci.iter().map(|locus| vec![0; locus.n_alleles()]).collect();
    let mut loci_votes = vec![0u64; loci.len()];

    for (kmer, count) in counts.iter() {
        let Some(postings) = index.get(kmer) else { continue };
        for posting in postings {
            let locus = usize::from(posting.locus);
            let vote = i64::from(posting.weight) * i64::from(count);
            loci_votes[locus] += vote.unsigned_abs();
            for allele in &posting.alleles {
                let slot = usize::from(*allele).checked_sub(1)
                    .and_then(|idx| votes[locus].get_mut(idx));
                if let Some(slot) = slot {
                    *slot += vote;
                }
            }
        }
    }
    VoteTable { votes, loci_votes }
}

impl VoteTable {
    pub fn n_loci(&self) -> usize {
        self.loci_votes.len()
    }

    /// Unsigned evidence mass of a locus. Zero means not a single indexed kmer
    /// of this locus was seen in the reads.
    pub fn locus_votes(&self, locus: usize) -> u64 {
        self.loci_votes[locus]
    }

    /// Signed vote total of one allele (1-based internal index).
    pub fn allele_votes(&self, locus: usize, allele: u16) -> i64 {
        usize::from(allele).checked_sub(1)
            .and_then(|idx| self.votes[locus].get(idx))
            .copied()
            .unwrap_or(0)
    }

    /// Alleles of a locus ranked by vote total, descending. The sort is stable
    /// so that ties keep their internal-index order.
    pub fn ranked(&self, locus: usize) -> Vec<(u16, i64)> {
        let mut ranked: Vec<(u16, i64)> = self.votes[locus].iter().enumerate()
            .map(|(idx, votes)| (idx as u16 + 1, *votes))
            .collect();
        ranked.sort_by_key(|(_, votes)| Reverse(*votes));
        ranked
    }

    /// The top vote total of a locus, along with every allele sharing it.
    pub fn top_tied(&self, locus: usize) -> (i64, Vec<u16>) {
        let ranked = self.ranked(locus);
        let Some(&(_, top)) = ranked.first() else { return (0, Vec::new()) };
        let tied = ranked.iter()
            .take_while(|(_, votes)| *votes == top)
            .map(|(allele, _)| *allele)
            .collect();
        (top, tied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counts::CountMode;
    use mlst::Posting;

    fn mock_loci(n_alleles: &[usize]) -> Vec<LocusInfo> {
        n_alleles.iter().enumerate()
            .map(|(idx, n)| LocusInfo {
                name: format!("locus{idx}"),
                allele_ids: (1..=*n).map(|id| id.to_string()).collect(),
                fasta: None,
            })
            .collect()
    }

    fn mock_index() -> KmerIndex {
        let mut index = KmerIndex::default();
        // ACGTA evidences alleles 1 and 2 of locus 0.
        index.insert(b"ACGTA".to_vec(), vec![Posting { locus: 0, weight: 1, alleles: vec![1, 2] }]);
        // CCCCA evidences allele 2 of locus 0, and votes against allele 1 of locus 1.
        index.insert(b"CCCCA".to_vec(), vec![
            Posting { locus: 0, weight: 1, alleles: vec![2] },
            Posting { locus: 1, weight: -2, alleles: vec![1] },
        ]);
        index
    }

    fn mock_counts(reads: &[&[u8]]) -> KmerCounts {
        let index = mock_index();
        let mut counts = KmerCounts::new(5);
        for read in reads {
            counts.add_read(read, &CountMode::Restricted(&index));
        }
        counts
    }

    #[test]
    fn positive_and_negative_votes() {
        // 3 x ACGTA, 2 x CCCCA
        let counts = mock_counts(&[b"ACGTA", b"ACGTA", b"ACGTA", b"CCCCA", b"CCCCA"]);
        let table = tally(&counts, &mock_index(), &mock_loci(&[2, 1]));

        assert_eq!(table.allele_votes(0, 1), 3);
        assert_eq!(table.allele_votes(0, 2), 5);
        assert_eq!(table.locus_votes(0), 5);

        // locus 1 only received negative evidence: -2 * 2 = -4, |v| = 4.
        assert_eq!(table.allele_votes(1, 1), -4);
        assert_eq!(table.locus_votes(1), 4);
    }

    #[test]
    fn locus_votes_bound_allele_votes() {
        let counts = mock_counts(&[b"ACGTA", b"CCCCA", b"CCCCA", b"CCCCA"]);
        let table = tally(&counts, &mock_index(), &mock_loci(&[2, 1]));
        for locus in 0..table.n_loci() {
            for (allele, votes) in table.ranked(locus) {
                assert!(table.locus_votes(locus) >= votes.unsigned_abs(),
                    "allele {allele} of locus {locus} outweighs its locus");
            }
        }
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let counts = mock_counts(&[b"ACGTA", b"ACGTA"]);
        let table = tally(&counts, &mock_index(), &mock_loci(&[2, 1]));
        // Both alleles of locus 0 got 2 votes; internal order breaks the tie.
        assert_eq!(table.ranked(0), vec![(1, 2), (2, 2)]);

        let (top, tied) = table.top_tied(0);
        assert_eq!(top, 2);
        assert_eq!(tied, vec![1, 2]);
    }

    #[test]
    fn unseen_locus_has_zero_votes() {
        let counts = mock_counts(&[b"ACGTA"]);
        let table = tally(&counts, &mock_index(), &mock_loci(&[2, 1]));
        assert_eq!(table.locus_votes(1), 0);
    }
}
