use std::borrow::Cow;

/// The four bases a k-mer may carry. Anything else disqualifies the window.
pub const BASES: [u8; 4] = *b"ACGT";

/// Check whether a byte is a strict, uppercase nucleotide.
#[inline]
pub fn is_valid_base(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}

/// Check whether every base of a window is a strict nucleotide.
#[inline]
pub fn is_valid_kmer(kmer: &[u8]) -> bool {
    kmer.iter().all(|base| is_valid_base(*base))
}

/// Watson-Crick complement of a single base. Invalid bases are returned unchanged.
#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        other => other
    }
}

/// Compute the reverse complement of a sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|base| complement(*base)).collect()
}

/// Return the canonical form of a k-mer, i.e. the lexicographic minimum of the
/// k-mer and its reverse complement.
///
/// # Behavior
/// Borrows the input whenever the forward strand already is the canonical one,
/// and only allocates when the reverse complement wins the comparison.
pub fn canonical(kmer: &[u8]) -> Cow<'_, [u8]> {
    let revcomp = reverse_complement(kmer);
    if kmer <= revcomp.as_slice() {
        Cow::Borrowed(kmer)
    } else {
        Cow::Owned(revcomp)
    }
}
