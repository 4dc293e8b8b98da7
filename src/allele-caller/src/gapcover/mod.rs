use std::collections::VecDeque;

use ahash::AHashSet;
use mlst::kmer::BASES;
use mlst::Mutation;

use crate::counts::KmerCounts;
use crate::coverage;

/// Depth threshold used by the gap-cover search when no caller-provided value
/// applies. The calling pipeline always propagates its own `--kmer-thr`.
pub const DEFAULT_GAP_DEPTH_THRESHOLD: u32 = 8;

/// Maximum deletion length the search will propose in one step.
const MAX_DELETION_LEN: usize = 3;

/// A successful correction of one gap fragment.
#[derive(Debug, Clone)]
pub struct GapCover {
    pub n_mutations: usize,
    /// The edited fragment, every window of which reached the depth threshold.
    pub sequence: Vec<u8>,
    /// Events in discovery order, positioned within the fragment.
    pub mutations: Vec<Mutation>,
    /// Minimum depth over the edited fragment.
    pub depth: u32,
}

/// One entry of the search worklist.
#[derive(Debug, Clone)]
struct SearchState {
    n_mut: usize,
    seq: Vec<u8>,
    mutations: Vec<Mutation>,
    /// 0-based kmer position the scan of this state resumes from.
    start: usize,
}

/// Search for a minimal set of edits turning an uncovered fragment into a
/// fully supported one.
///
/// # Behavior
/// Breadth-first over a FIFO worklist. Each dequeued state scans its kmer
/// stream for coverage transitions:
/// - uncovered -> covered: the base left of the first covered window is edited
///   (substitution / insertion / deletion of up to [`MAX_DELETION_LEN`] bases);
/// - covered -> uncovered: symmetric, on the last base of the first uncovered
///   window.
/// Only the first base whose one-shifted window is supported spawns
/// successors; the state then yields. A state completing its scan without
/// proposing anything is accepted iff the full fragment re-analyzes with
/// `min_depth >= kmer_thr`.
///
/// Accepted solutions are deduplicated on their full nucleotide sequence
/// (distinct edit paths may converge), and each one tightens the shared
/// mutation budget, so the minimum-mutation solution wins with FIFO discovery
/// order breaking ties.
pub fn cover_gap(
    fragment: &[u8],
    counts: &KmerCounts,
    kmer_thr: u32,
    max_mutations: usize,
) -> Option<GapCover> {
    let k = counts.k();
    if fragment.len() < k {
        return None
    }

    let mut budget = max_mutations;
    let mut best: Option<GapCover> = None;
    let mut solutions: AHashSet<Vec<u8>> = AHashSet::new();

    let mut worklist = VecDeque::new();
    worklist.push_back(SearchState {
        n_mut: 0,
        seq: fragment.to_vec(),
        mutations: Vec::new(),
        start: 0,
    });

    while let Some(state) = worklist.pop_front() {
        if state.n_mut > budget || state.seq.len() < k {
            continue
        }
        let n_positions = state.seq.len() - k + 1;

        let mut proposed = false;
        let mut prev_covered: Option<bool> = None;
        for pos in state.start.min(n_positions)..n_positions {
            let covered = counts.depth(&state.seq[pos..pos + k]) >= kmer_thr;
            if let Some(prev) = prev_covered {
                if covered && !prev && pos > state.start + 1 {
                    proposed = extend_left(&state, pos, counts, kmer_thr, &mut worklist);
                } else if !covered && prev {
                    proposed = extend_right(&state, pos, counts, kmer_thr, &mut worklist);
                }
                if proposed {
                    break
                }
            }
            prev_covered = Some(covered);
        }

        if !proposed {
            let cov = coverage::analyze(&state.seq, counts, kmer_thr);
            if cov.is_fully_covered(kmer_thr)
                && solutions.insert(state.seq.clone())
                && best.as_ref().map_or(true, |b| state.n_mut < b.n_mutations)
            {
                budget = state.n_mut; // branch-and-bound: tightens every later dequeue
                best = Some(GapCover {
                    n_mutations: state.n_mut,
                    sequence: state.seq,
                    mutations: state.mutations,
                    depth: cov.min_depth,
                });
            }
        }
    }
    best
}

/// Spawn the successors of an uncovered -> covered transition at kmer
/// position `pos`: edit the base left of the covered window (0-based index
/// `pos - 1`), testing each candidate base against the one-left-shifted window
/// `base + window[..k-1]`.
fn extend_left(
    state: &SearchState,
    pos: usize,
    counts: &KmerCounts,
    kmer_thr: u32,
    worklist: &mut VecDeque<SearchState>,
) -> bool {
    let k = counts.k();
    let seq = &state.seq;
    let target = pos - 1;
    let resume = pos.saturating_sub(k);

    let mut shifted = Vec::with_capacity(k);
    for &base in &BASES {
        shifted.clear();
        shifted.push(base);
        shifted.extend_from_slice(&seq[pos..pos + k - 1]);
        if counts.depth(&shifted) < kmer_thr {
            continue
        }

        // Substitution of the offending base.
        let mut edited = seq.clone();
        edited[target] = base;
        enqueue(worklist, state, edited,
            Mutation::Substitution { pos: target + 1, from: seq[target], to: base }, resume);

        // Insertion right of the offending base.
        let mut edited = seq.clone();
        edited.insert(pos, base);
        enqueue(worklist, state, edited,
            Mutation::Insertion { pos: pos + 1, base }, resume);

        // Deletion: a matching base 1 to 3 positions upstream lets us excise
        // the run in-between.
        for i in 0..MAX_DELETION_LEN {
            let Some(upstream) = target.checked_sub(1 + i) else { break };
            if seq[upstream] == base {
                let mut edited = seq.clone();
                edited.drain(target - i..=target);
                enqueue(worklist, state, edited,
                    Mutation::Deletion { pos: target - i + 1, len: i + 1 }, resume);
                break
            }
        }
        return true // first supported base only; later states continue
    }
    false
}

/// Spawn the successors of a covered -> uncovered transition at kmer position
/// `pos`: edit the last base of the uncovered window (0-based index
/// `pos + k - 1`), testing each candidate against `window[1..] + base`.
fn extend_right(
    state: &SearchState,
    pos: usize,
    counts: &KmerCounts,
    kmer_thr: u32,
    worklist: &mut VecDeque<SearchState>,
) -> bool {
    let k = counts.k();
    let seq = &state.seq;
    let target = pos + k - 1;
    let resume = pos.saturating_sub(k);

    let mut shifted = Vec::with_capacity(k);
    for &base in &BASES {
        shifted.clear();
        shifted.extend_from_slice(&seq[pos..pos + k - 1]);
        shifted.push(base);
        if counts.depth(&shifted) < kmer_thr {
            continue
        }

        // Substitution of the offending base.
        let mut edited = seq.clone();
        edited[target] = base;
        enqueue(worklist, state, edited,
            Mutation::Substitution { pos: target + 1, from: seq[target], to: base }, resume);

        // Insertion left of the offending base.
        let mut edited = seq.clone();
        edited.insert(target, base);
        enqueue(worklist, state, edited,
            Mutation::Insertion { pos: target + 1, base }, resume);

        // Deletion: a matching base 1 to 3 positions downstream.
        for i in 0..MAX_DELETION_LEN {
            let Some(downstream) = seq.get(target + 1 + i) else { break };
            if *downstream == base {
                let mut edited = seq.clone();
                edited.drain(target..=target + i);
                enqueue(worklist, state, edited,
                    Mutation::Deletion { pos: target + 1, len: i + 1 }, resume);
                break
            }
        }
        return true // first supported base only; later states continue
    }
    false
}

fn enqueue(
    worklist: &mut VecDeque<SearchState>,
    parent: &SearchState,
    seq: Vec<u8>,
    mutation: Mutation,
    resume: usize,
) {
    let n_mut = parent.n_mut + mutation.cost();
    let mut mutations = parent.mutations.clone();
    mutations.push(mutation);
    worklist.push_back(SearchState { n_mut, seq, mutations, start: resume });
}
