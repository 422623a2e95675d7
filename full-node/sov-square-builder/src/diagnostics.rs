use std::fmt;

use crate::malleate::MalleationError;
use crate::parser::ParseError;

/// Why a transaction was left out of the square
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectionReason {
    #[error("failed to parse: {0}")]
    Parse(ParseError),
    #[error("failed to malleate: {0}")]
    Malleation(MalleationError),
    /// Removed to make room for higher priority content
    #[error("pruned to fit a square of size {square_size}")]
    Pruned { square_size: usize },
}

/// A transaction that didn't make it into the square.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// Position of the transaction in the input
    pub index: usize,
    /// sha256 of the raw transaction
    pub tx_hash: [u8; 32],
    pub reason: RejectionReason,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx #{} (0x{}) {}",
            self.index,
            hex::encode(self.tx_hash),
            self.reason
        )
    }
}

/// Everything that was dropped while building a square, in the order it happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub rejected: Vec<Rejected>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn pruned(&self) -> impl Iterator<Item = &Rejected> {
        self.rejected
            .iter()
            .filter(|rejected| matches!(rejected.reason, RejectionReason::Pruned { .. }))
    }

    /// Whether the transaction at `index` of the input was dropped
    pub fn contains(&self, index: usize) -> bool {
        self.rejected.iter().any(|rejected| rejected.index == index)
    }
}
