//! Picks the smallest square that can hold a set of parsed transactions.
//!
//! Share usage is computed exactly for every candidate size: transactions in the compact
//! region at the length they will have once malleated for that size, one evidence slot
//! (or more, if the evidence needs it), and every message rounded up to whole shares.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::SquareConfig;
use crate::parser::ParsedTx;
use crate::split::compact_shares_needed;
use crate::utils::delimited_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub square_size: usize,
    /// Shares used by the content at `square_size`
    pub shares_used: usize,
    /// Shares that don't fit even in the largest square. Zero when the content fits.
    pub overflow: usize,
}

/// Compact shares used by the transactions once malleated for `square_size`
pub fn compact_shares_used(txs: &[ParsedTx], square_size: usize, config: &SquareConfig) -> usize {
    let bytes: usize = txs.iter().map(|tx| tx.compact_len(square_size)).sum();
    compact_shares_needed(bytes, config)
}

/// Shares reserved for evidence.
///
/// Any block with content keeps at least one evidence share, even if it has no evidence.
/// An empty block reserves nothing.
pub fn evidence_shares(evidence: &[Bytes], has_txs: bool, config: &SquareConfig) -> usize {
    if evidence.is_empty() && !has_txs {
        return 0;
    }
    let bytes: usize = evidence.iter().map(|item| delimited_len(item.len())).sum();
    compact_shares_needed(bytes, config).max(1)
}

/// Sparse shares used by every message carried by `txs`
pub fn message_shares_used(txs: &[ParsedTx]) -> usize {
    txs.iter().map(ParsedTx::message_shares).sum()
}

/// Every share the content occupies in a square of `square_size`, excluding tail padding
pub fn shares_used(
    txs: &[ParsedTx],
    evidence: &[Bytes],
    square_size: usize,
    config: &SquareConfig,
) -> usize {
    compact_shares_used(txs, square_size, config)
        + evidence_shares(evidence, !txs.is_empty(), config)
        + message_shares_used(txs)
}

/// Returns the smallest allowed square size that holds all of the content.
///
/// If nothing fits, the largest size is returned along with the number of shares
/// that would have to be removed.
pub fn estimate_square_size(
    txs: &[ParsedTx],
    evidence: &[Bytes],
    config: &SquareConfig,
) -> Estimate {
    for square_size in config.square_sizes() {
        let shares_used = shares_used(txs, evidence, square_size, config);
        if shares_used <= square_size * square_size {
            return Estimate {
                square_size,
                shares_used,
                overflow: 0,
            };
        }
    }
    let square_size = config.max_square_size;
    let shares_used = shares_used(txs, evidence, square_size, config);
    Estimate {
        square_size,
        shares_used,
        overflow: shares_used.saturating_sub(config.max_shares()),
    }
}
