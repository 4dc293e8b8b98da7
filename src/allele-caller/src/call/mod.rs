use std::cmp::Reverse;
use std::sync::Arc;

use anyhow::Result;
use located_error::LocatedError;
use log::warn;
use mlst::LocusInfo;

use crate::corrector::{self, NovelAllele};
use crate::counts::KmerCounts;
use crate::coverage::{self, SeqCoverage, DEPTH_SENTINEL};
use crate::error::CallerError;
use crate::votes::VoteTable;

/// How many top-voted alleles are examined as candidates per locus.
pub const MAX_CANDIDATE_ALLELES: usize = 10;

/// How many per-allele vote entries the vote-details stream carries per locus.
pub const MAX_VOTE_DETAILS: usize = 20;

/// Coverage profile of one candidate allele.
#[derive(Debug, Clone)]
pub struct AlleleCoverage {
    /// 1-based internal allele index.
    pub allele: u16,
    pub votes: i64,
    pub coverage: SeqCoverage,
}

/// A sequence attached to a call for downstream inspection (special-cases
/// FASTA stream).
#[derive(Debug, Clone)]
pub struct CheckCandidate {
    pub label: String,
    pub sequence: Vec<u8>,
    pub description: String,
}

/// The resolved outcome of one locus. Labels and flags derive from the
/// variant instead of being loose string conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// No indexed kmer of this locus was seen at all.
    Absent,
    /// Exactly one allele is fully covered.
    Single { allele: String },
    /// Several alleles are fully covered.
    Multiple { best: String },
    /// A corrected template covers every window: a novel allele.
    Novel,
    /// The best template keeps uncorrectable gaps.
    Partial { template: String },
    /// Even the best candidate is too far from being covered.
    Uncovered,
}

impl CallOutcome {
    pub fn label(&self) -> &str {
        match self {
            Self::Absent | Self::Uncovered => "0",
            Self::Novel                    => "N",
            Self::Single { allele }        => allele,
            Self::Multiple { best }        => best,
            Self::Partial { template }     => template,
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Self::Absent | Self::Single { .. } | Self::Novel => "",
            Self::Multiple { .. } => "+",
            Self::Partial { .. }  => "-",
            Self::Uncovered       => "?",
        }
    }
}

/// The full call of one locus for one sample.
#[derive(Debug, Clone)]
pub struct AlleleCall {
    pub locus: String,
    pub outcome: CallOutcome,
    /// Covered fraction of the reported candidate, in [0, 1].
    pub coverage: f64,
    pub depth: u32,
    /// Human readable description, carried to the coverage report.
    pub report: String,
    pub novel: Option<NovelAllele>,
    /// Sequences worth inspecting downstream (multiple / novel / partial calls).
    pub to_check: Vec<CheckCandidate>,
}

impl AlleleCall {
    pub fn label(&self) -> &str {
        self.outcome.label()
    }

    pub fn flag(&self) -> &'static str {
        self.outcome.flag()
    }

    /// The allele cell written within the calls table, e.g. `12`, `N`, `0?`.
    pub fn cell(&self) -> String {
        format!("{}{}", self.label(), self.flag())
    }

    fn absent(locus: &LocusInfo) -> Self {
        Self {
            locus: locus.name.clone(),
            outcome: CallOutcome::Absent,
            coverage: 0.0,
            depth: 0,
            report: String::from("Not present, no kmers found."),
            novel: None,
            to_check: Vec::new(),
        }
    }
}

/// The vote-only call of one locus: highest voted allele, regardless of
/// coverage, plus its tie set. Diagnostic output, independent of the calls.
#[derive(Debug, Clone)]
pub struct VoteCall {
    pub locus: String,
    pub allele: String,
    pub votes: i64,
    pub ties: Vec<String>,
}

/// Resolve one locus into an [`AlleleCall`].
///
/// Allele sequences are fetched through `load_sequences` only once the locus
/// shows any evidence, so absent loci never touch their FASTA.
pub fn call_locus<F>(
    locus: &LocusInfo,
    locus_idx: usize,
    votes: &VoteTable,
    load_sequences: F,
    counts: &KmerCounts,
    kmer_thr: u32,
    max_mutations: usize,
) -> Result<AlleleCall>
where
    F: FnOnce() -> Result<Arc<Vec<Vec<u8>>>>,
{
    let k = counts.k();

    // ----------------------------- 1. No evidence at all: absent.
    if votes.locus_votes(locus_idx) == 0 {
        return Ok(AlleleCall::absent(locus))
    }

    // ----------------------------- 2. Rank alleles by vote, analyze the top candidates.
    let sequences = load_sequences()
        .with_loc(|| format!("While resolving locus '{}'", locus.name))?;
    let ranked = votes.ranked(locus_idx);
    let top = ranked.len().min(MAX_CANDIDATE_ALLELES);

    let mut candidates: Vec<AlleleCoverage> = Vec::with_capacity(top);
    for &(allele, allele_votes) in &ranked[..top] {
        let sequence = allele_sequence(locus, &sequences, allele)?;
        let cov = coverage::analyze(sequence, counts, kmer_thr);
        if cov.total() == 0 {
            warn!("Allele {} of locus '{}' is shorter than k={k}; dropping candidate",
                external_id(locus, allele)?, locus.name);
            continue
        }
        candidates.push(AlleleCoverage { allele, votes: allele_votes, coverage: cov });
    }
    if candidates.is_empty() {
        return Ok(AlleleCall::absent(locus))
    }

    // ----------------------------- 3. Fully covered candidates win immediately.
    let covered: Vec<&AlleleCoverage> = candidates.iter()
        .filter(|candidate| candidate.coverage.is_fully_covered(kmer_thr))
        .collect();

    if covered.len() == 1 {
        let winner = covered[0];
        let id = external_id(locus, winner.allele)?;
        let mut report = format!(
            "Allele {id} fully covered (min depth {}, votes {})",
            winner.coverage.min_depth, winner.votes
        );
        if winner.votes < 0 {
            report.push_str(". WARNING: allele votes are negative");
        }
        return Ok(AlleleCall {
            locus: locus.name.clone(),
            outcome: CallOutcome::Single { allele: id },
            coverage: 1.0,
            depth: winner.coverage.min_depth,
            report,
            novel: None,
            to_check: Vec::new(),
        })
    }

    if covered.len() > 1 {
        return multiple_call(locus, &covered, &sequences)
    }

    // ----------------------------- 4. Nothing fully covered: examine the closest candidate.
    let mut by_uncovered = candidates.clone();
    by_uncovered.sort_by_key(|candidate| candidate.coverage.uncovered);
    let best = &by_uncovered[0];
    let best_id = external_id(locus, best.allele)?;
    let best_sequence = allele_sequence(locus, &sequences, best.allele)?;

    if best.coverage.uncovered > k * max_mutations {
        return Ok(AlleleCall {
            locus: locus.name.clone(),
            outcome: CallOutcome::Uncovered,
            coverage: best.coverage.fraction(),
            depth: depth_or_zero(best.coverage.min_depth),
            report: format!(
                "Not present; best covered is below threshold ({} uncovered kmers on allele {best_id})",
                best.coverage.uncovered
            ),
            novel: None,
            to_check: vec![CheckCandidate {
                label: best_id,
                sequence: best_sequence.clone(),
                description: format!("best candidate, coverage {:.4}", best.coverage.fraction()),
            }],
        })
    }

    // ----------------------------- 5. Try reconstructing a novel allele from the
    // templates with the fewest gaps.
    let mut by_gaps = candidates.clone();
    by_gaps.sort_by_key(|candidate| (candidate.coverage.gaps.len(), Reverse(candidate.votes)));
    let fewest_gaps = by_gaps[0].coverage.gaps.len();

    let mut reconstructions: Vec<(AlleleCoverage, NovelAllele)> = Vec::new();
    for candidate in by_gaps.into_iter().take_while(|c| c.coverage.gaps.len() == fewest_gaps) {
        let template = allele_sequence(locus, &sequences, candidate.allele)?;
        let mut novel = corrector::correct_template(template, counts, kmer_thr, max_mutations);
        novel.template = external_id(locus, candidate.allele)?;
        reconstructions.push((candidate, novel));
    }

    // ----------------------------- 6. Select the best reconstruction.
    reconstructions.sort_by_key(|(candidate, novel)| {
        (novel.uncorrected_gaps.len(), novel.n_mutations, Reverse(candidate.votes))
    });
    let (template_cov, novel) = reconstructions.swap_remove(0);
    let template_id = novel.template.clone();
    let template_seq = allele_sequence(locus, &sequences, template_cov.allele)?;

    if novel.is_complete() {
        let mutations = novel.describe_mutations();
        Ok(AlleleCall {
            locus: locus.name.clone(),
            outcome: CallOutcome::Novel,
            coverage: 1.0,
            depth: novel.depth,
            report: format!(
                "Novel allele; template {template_id} edited with {} mutation(s): {mutations}",
                novel.n_mutations
            ),
            to_check: vec![
                CheckCandidate {
                    label: template_id.clone(),
                    sequence: template_seq.clone(),
                    description: String::from("closest template of the novel allele"),
                },
                CheckCandidate {
                    label: String::from("N"),
                    sequence: novel.sequence.clone(),
                    description: format!("novel allele from template {template_id}: {mutations}"),
                },
            ],
            novel: Some(novel),
        })
    } else {
        Ok(AlleleCall {
            locus: locus.name.clone(),
            outcome: CallOutcome::Partial { template: template_id.clone() },
            coverage: round4(template_cov.coverage.fraction()),
            depth: depth_or_zero(template_cov.coverage.min_depth),
            report: format!(
                "Partial coverage; template {template_id} keeps {} uncorrected gap(s)",
                novel.uncorrected_gaps.len()
            ),
            novel: None,
            to_check: vec![CheckCandidate {
                label: template_id,
                sequence: template_seq.clone(),
                description: format!("partially covered template, coverage {:.4}",
                    template_cov.coverage.fraction()),
            }],
        })
    }
}

fn multiple_call(
    locus: &LocusInfo,
    covered: &[&AlleleCoverage],
    sequences: &Arc<Vec<Vec<u8>>>,
) -> Result<AlleleCall> {
    // `covered` preserves the vote-descending candidate order.
    let best = covered[0];
    let listing = covered.iter()
        .map(|candidate| {
            Ok(format!("{} (depth {}, votes {})",
                external_id(locus, candidate.allele)?,
                candidate.coverage.min_depth,
                candidate.votes))
        })
        .collect::<Result<Vec<String>>>()?
        .join(", ");

    let mut to_check = Vec::with_capacity(covered.len());
    for candidate in covered {
        to_check.push(CheckCandidate {
            label: external_id(locus, candidate.allele)?,
            sequence: allele_sequence(locus, sequences, candidate.allele)?.clone(),
            description: format!("fully covered allele, depth {}, votes {}",
                candidate.coverage.min_depth, candidate.votes),
        });
    }

    Ok(AlleleCall {
        locus: locus.name.clone(),
        outcome: CallOutcome::Multiple { best: external_id(locus, best.allele)? },
        coverage: 1.0,
        depth: best.coverage.min_depth,
        report: format!("Multiple fully covered alleles: {listing}"),
        novel: None,
        to_check,
    })
}

/// The vote-only diagnostic path: per locus, the top-voted allele and its tie
/// set, regardless of coverage.
pub fn vote_calls(votes: &VoteTable, loci: &[LocusInfo]) -> Result<Vec<VoteCall>> {
    loci.iter().enumerate()
        .map(|(locus_idx, locus)| {
            // A locus without any evidence gets no vote call rather than an
            // all-allele tie at zero.
            if votes.locus_votes(locus_idx) == 0 {
                return Ok(VoteCall {
                    locus: locus.name.clone(),
                    allele: String::from("0"),
                    votes: 0,
                    ties: Vec::new(),
                })
            }
            let (top, tied) = votes.top_tied(locus_idx);
            let ties = tied.iter()
                .map(|allele| external_id(locus, *allele))
                .collect::<Result<Vec<String>>>()?;
            let allele = ties.first().cloned().unwrap_or_else(|| String::from("0"));
            Ok(VoteCall { locus: locus.name.clone(), allele, votes: top, ties })
        })
        .collect()
}

fn external_id(locus: &LocusInfo, allele: u16) -> Result<String> {
    Ok(locus.external_id(allele)
        .ok_or_else(|| CallerError::MissingAlleleId { locus: locus.name.clone(), allele })?
        .to_string())
}

fn allele_sequence<'a>(
    locus: &LocusInfo,
    sequences: &'a Arc<Vec<Vec<u8>>>,
    allele: u16,
) -> Result<&'a Vec<u8>> {
    Ok(usize::from(allele).checked_sub(1)
        .and_then(|idx| sequences.get(idx))
        .ok_or_else(|| CallerError::MissingAlleleSequence { locus: locus.name.clone(), allele })?)
}

fn depth_or_zero(depth: u32) -> u32 {
    if depth == DEPTH_SENTINEL { 0 } else { depth }
}

fn round4(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counts::CountMode;
    use crate::votes;
    use mlst::{kmer, KmerIndex, Mutation, Posting};
    use pretty_assertions::assert_eq;

    const K: usize = 5;
    const KMER_THR: u32 = 2;
    const MAX_MUTATIONS: usize = 2;

    /// Build loci metadata and a weight-1 kmer index from allele sequences.
    fn scheme(loci_alleles: &[&[&[u8]]]) -> (Vec<LocusInfo>, KmerIndex) {
        let mut loci = Vec::new();
        let mut index = KmerIndex::default();
        for (locus_idx, alleles) in loci_alleles.iter().enumerate() {
            loci.push(LocusInfo {
                name: format!("locus{locus_idx}"),
                allele_ids: (1..=alleles.len()).map(|id| id.to_string()).collect(),
                fasta: None,
            });
            for (allele_idx, sequence) in alleles.iter().enumerate() {
                for window in sequence.windows(K) {
                    let canon = kmer::canonical(window).into_owned();
                    let postings = index.entry(canon).or_insert_with(Vec::new);
                    match postings.iter_mut().find(|p| usize::from(p.locus) == locus_idx) {
                        Some(posting) => {
                            if !posting.alleles.contains(&(allele_idx as u16 + 1)) {
                                posting.alleles.push(allele_idx as u16 + 1);
                            }
                        }
                        None => postings.push(Posting {
                            locus: locus_idx as u16,
                            weight: 1,
                            alleles: vec![allele_idx as u16 + 1],
                        }),
                    }
                }
            }
        }
        (loci, index)
    }

    fn count_reads(reads: &[&[u8]], copies: usize) -> KmerCounts {
        let mut counts = KmerCounts::new(K);
        for _ in 0..copies {
            for read in reads {
                counts.add_read(read, &CountMode::Unrestricted);
            }
        }
        counts
    }

    fn run_call(
        loci_alleles: &[&[&[u8]]],
        reads: &[&[u8]],
        copies: usize,
    ) -> AlleleCall {
        let (loci, index) = scheme(loci_alleles);
        let counts = count_reads(reads, copies);
        let table = votes::tally(&counts, &index, &loci);
        let sequences: Arc<Vec<Vec<u8>>> =
            Arc::new(loci_alleles[0].iter().map(|seq| seq.to_vec()).collect());
        call_locus(&loci[0], 0, &table, || Ok(sequences), &counts, KMER_THR, MAX_MUTATIONS)
            .expect("call failed")
    }

    const TEMPLATE: &[u8] = b"ACGGTCTTAGCAATGGCCTA";

    #[test]
    fn absent_locus() {
        let call = run_call(&[&[TEMPLATE]], &[b"TTTTTTTTTT"], 10);
        assert_eq!(call.outcome, CallOutcome::Absent);
        assert_eq!(call.cell(), "0");
        assert_eq!(call.coverage, 0.0);
        assert_eq!(call.depth, 0);
        assert_eq!(call.report, "Not present, no kmers found.");
    }

    #[test]
    fn single_covered_allele() {
        let call = run_call(&[&[TEMPLATE]], &[TEMPLATE], 10);
        assert_eq!(call.outcome, CallOutcome::Single { allele: "1".to_string() });
        assert_eq!(call.cell(), "1");
        assert_eq!(call.coverage, 1.0);
        assert_eq!(call.depth, 10);
        assert!(call.to_check.is_empty());
    }

    #[test]
    fn multiple_covered_alleles() {
        let variant: &[u8] = b"ACGGTCTTAGCAATGGCCTG"; // last base differs
        let call = run_call(&[&[TEMPLATE, variant]], &[TEMPLATE, variant], 5);

        assert_eq!(call.flag(), "+");
        assert!(matches!(call.outcome, CallOutcome::Multiple { .. }));
        assert_eq!(call.coverage, 1.0);
        let labels: Vec<&str> = call.to_check.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2"]);
        assert!(call.report.starts_with("Multiple fully covered alleles"));
    }

    #[test]
    fn novel_allele_single_substitution() {
        // Reads tile the template with base 10 mutated G -> C.
        let truth: &[u8] = b"ACGGTCTTACCAATGGCCTA";
        let call = run_call(&[&[TEMPLATE]], &[truth], 5);

        assert_eq!(call.outcome, CallOutcome::Novel);
        assert_eq!(call.cell(), "N");
        let novel = call.novel.as_ref().expect("expected a novel allele");
        assert_eq!(novel.template, "1");
        assert_eq!(novel.sequence, truth.to_vec());
        assert_eq!(novel.mutations,
            vec![Mutation::Substitution { pos: 10, from: b'G', to: b'C' }]);
        assert!(novel.uncorrected_gaps.is_empty());

        // Both the template and the reconstruction are up for inspection.
        let labels: Vec<&str> = call.to_check.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "N"]);
    }

    #[test]
    fn uncovered_when_too_far_from_any_template() {
        let allele: &[u8] = b"ACGGTCTTAGCAATGGCCTAGGTTCACAGGACTTAGGCAT"; // 40 bp
        // Only the very first window ever shows up in the reads.
        let call = run_call(&[&[allele]], &[b"ACGGT"], 10);

        assert_eq!(call.outcome, CallOutcome::Uncovered);
        assert_eq!(call.cell(), "0?");
        assert!(call.coverage < 1.0);
        assert_eq!(call.to_check.len(), 1);
        assert!(call.report.contains("best covered is below threshold"));
    }

    #[test]
    fn partial_when_a_gap_cannot_be_covered() {
        // Reads only support the flanks of the template.
        let call = run_call(&[&[TEMPLATE]], &[b"ACGGTCTTA", b"AATGGCCTA"], 5);

        assert_eq!(call.outcome, CallOutcome::Partial { template: "1".to_string() });
        assert_eq!(call.cell(), "1-");
        assert!(call.coverage < 1.0);
        assert_eq!(call.coverage, round4(10.0 / 16.0));
        assert_eq!(call.to_check.len(), 1);
    }

    #[test]
    fn negative_votes_annotate_a_single_call() {
        let (loci, mut index) = scheme(&[&[TEMPLATE]]);
        // A heavily negative posting triggered by an unrelated kmer.
        index.insert(
            kmer::canonical(b"TTTTT").into_owned(),
            vec![Posting { locus: 0, weight: -1000, alleles: vec![1] }],
        );

        let counts = count_reads(&[TEMPLATE, b"TTTTT"], 10);
        let table = votes::tally(&counts, &index, &loci);
        let sequences = Arc::new(vec![TEMPLATE.to_vec()]);
        let call = call_locus(&loci[0], 0, &table, || Ok(sequences), &counts, KMER_THR, MAX_MUTATIONS)
            .expect("call failed");

        assert!(matches!(call.outcome, CallOutcome::Single { .. }));
        assert!(call.report.contains("WARNING"));
    }

    #[test]
    fn vote_only_path_reports_ties() {
        let variant: &[u8] = b"ACGGTCTTAGCAATGGCCTG";
        let (loci, index) = scheme(&[&[TEMPLATE, variant]]);
        // Reads carry both alleles evenly: every shared kmer votes for both.
        let counts = count_reads(&[TEMPLATE, variant], 5);
        let table = votes::tally(&counts, &index, &loci);

        let calls = vote_calls(&table, &loci).expect("vote calls failed");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].allele, "1");
        assert_eq!(calls[0].ties, vec!["1", "2"]);
        assert!(calls[0].votes > 0);
    }

    #[test]
    fn cells_cover_every_flag() {
        let outcomes = [
            (CallOutcome::Absent, "0"),
            (CallOutcome::Single { allele: "12".to_string() }, "12"),
            (CallOutcome::Multiple { best: "3".to_string() }, "3+"),
            (CallOutcome::Novel, "N"),
            (CallOutcome::Partial { template: "7".to_string() }, "7-"),
            (CallOutcome::Uncovered, "0?"),
        ];
        for (outcome, expected) in outcomes {
            let call = AlleleCall {
                locus: "locus0".to_string(),
                outcome,
                coverage: 0.0,
                depth: 0,
                report: String::new(),
                novel: None,
                to_check: Vec::new(),
            };
            assert_eq!(call.cell(), expected);
        }
    }
}
