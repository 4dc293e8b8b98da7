use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A single edit applied to a template allele while reconstructing a novel one.
/// - `Substitution` : one base replaced in place.
/// - `Insertion`    : one base inserted before the recorded position.
/// - `Deletion`     : a run of one to three bases removed.
///
/// Positions are 1-based and expressed within the sequence as it was when the
/// event got recorded. Callers splicing fragments back into a larger template
/// are expected to [`rebase`](Mutation::rebase) the events afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    Substitution { pos: usize, from: u8, to: u8 },
    Insertion    { pos: usize, base: u8 },
    Deletion     { pos: usize, len: usize },
}

impl Mutation {
    /// Number of mutations this event counts for. A deletion of `n` bases
    /// weighs `n`, matching the search budget of the gap coverer.
    pub fn cost(&self) -> usize {
        match self {
            Self::Substitution { .. } | Self::Insertion { .. } => 1,
            Self::Deletion { len, .. } => *len,
        }
    }

    /// Shift the recorded position by `offset` bases to the right.
    ///
    /// Used when an event recorded within an excised fragment is reported
    /// against the full-length corrected sequence.
    pub fn rebase(&mut self, offset: usize) {
        match self {
            Self::Substitution { pos, .. }
            | Self::Insertion { pos, .. }
            | Self::Deletion { pos, .. } => *pos += offset,
        }
    }

    /// 1-based position of the event.
    pub fn pos(&self) -> usize {
        match self {
            Self::Substitution { pos, .. }
            | Self::Insertion { pos, .. }
            | Self::Deletion { pos, .. } => *pos,
        }
    }
}

impl Display for Mutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substitution { pos, from, to } => {
                write!(f, "S{pos} {}->{}", *from as char, *to as char)
            }
            Self::Insertion { pos, base } => write!(f, "I{pos} +{}", *base as char),
            Self::Deletion { pos, len }   => write!(f, "D{pos} -{len}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs() {
        assert_eq!(Mutation::Substitution { pos: 3, from: b'A', to: b'G' }.cost(), 1);
        assert_eq!(Mutation::Insertion { pos: 3, base: b'T' }.cost(), 1);
        for len in 1..=3 {
            assert_eq!(Mutation::Deletion { pos: 3, len }.cost(), len);
        }
    }

    #[test]
    fn rebase_shifts_positions() {
        let mut mutation = Mutation::Substitution { pos: 6, from: b'C', to: b'G' };
        mutation.rebase(4);
        assert_eq!(mutation.pos(), 10);

        let mut mutation = Mutation::Deletion { pos: 1, len: 2 };
        mutation.rebase(11);
        assert_eq!(mutation.pos(), 12);
    }

    #[test]
    fn display() {
        let sub = Mutation::Substitution { pos: 10, from: b'G', to: b'C' };
        assert_eq!(format!("{sub}"), "S10 G->C");

        let ins = Mutation::Insertion { pos: 4, base: b'A' };
        assert_eq!(format!("{ins}"), "I4 +A");

        let del = Mutation::Deletion { pos: 7, len: 3 };
        assert_eq!(format!("{del}"), "D7 -3");
    }
}
