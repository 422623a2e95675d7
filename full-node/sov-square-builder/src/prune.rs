use std::cmp::Reverse;

use bytes::Bytes;
use tracing::{info, warn};

use crate::builder::ConstructionError;
use crate::config::SquareConfig;
use crate::estimate::evidence_shares;
use crate::parser::ParsedTx;
use crate::split::compact_shares_needed;

/// Output of [`prune`]
#[derive(Debug, Clone, Default)]
pub struct Pruned {
    /// Transactions that still fit, in input order
    pub kept: Vec<ParsedTx>,
    /// Transactions removed to make room, in the order they were removed
    pub removed: Vec<ParsedTx>,
}

/// Removes the lowest priority transactions until the rest fits in a square of `square_size`.
///
/// Transactions that don't fit in the square even on their own, next to the evidence, go
/// first. After that, among transactions of equal priority, the one that arrived last goes
/// first. Removing a blob-carrying transaction also frees the shares of its message.
/// Evidence is never removed: if it doesn't fit on its own, or if no transaction of a
/// non-empty block fits, the square can't be built at all.
pub fn prune(
    txs: Vec<ParsedTx>,
    evidence: &[Bytes],
    square_size: usize,
    config: &SquareConfig,
) -> Result<Pruned, ConstructionError> {
    let capacity = square_size * square_size;
    let mut compact_bytes: usize = txs.iter().map(|tx| tx.compact_len(square_size)).sum();
    let mut message_shares: usize = txs.iter().map(ParsedTx::message_shares).sum();
    let mut remaining = txs.len();
    let usage = |compact_bytes: usize, message_shares: usize, remaining: usize| {
        compact_shares_needed(compact_bytes, config)
            + evidence_shares(evidence, remaining > 0, config)
            + message_shares
    };
    let alone = |tx: &ParsedTx| usage(tx.compact_len(square_size), tx.message_shares(), 1);

    let mut removal_order: Vec<usize> = (0..txs.len()).collect();
    removal_order.sort_by_key(|&position| {
        let tx = &txs[position];
        (alone(tx) <= capacity, tx.priority, Reverse(tx.index))
    });

    let mut removed_positions = Vec::new();
    let mut removals = removal_order.into_iter();
    while usage(compact_bytes, message_shares, remaining) > capacity {
        let Some(position) = removals.next() else {
            let required = usage(compact_bytes, message_shares, remaining);
            warn!(required, capacity, "Evidence alone doesn't fit in the square");
            return Err(ConstructionError::CapacityOverflow { required, capacity });
        };
        let tx = &txs[position];
        compact_bytes -= tx.compact_len(square_size);
        message_shares -= tx.message_shares();
        remaining -= 1;
        removed_positions.push(position);
    }

    if remaining == 0 && !txs.is_empty() {
        let required = txs.iter().map(alone).min().unwrap_or_default();
        warn!(required, capacity, "No transaction fits in the square");
        return Err(ConstructionError::CapacityOverflow { required, capacity });
    }

    let mut slots: Vec<Option<ParsedTx>> = txs.into_iter().map(Some).collect();
    let removed: Vec<ParsedTx> = removed_positions
        .iter()
        .filter_map(|&position| slots[position].take())
        .collect();
    let kept: Vec<ParsedTx> = slots.into_iter().flatten().collect();

    if !removed.is_empty() {
        info!(
            removed = removed.len(),
            kept = kept.len(),
            square_size,
            "Pruned transactions to fit the square"
        );
    }
    Ok(Pruned { kept, removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::shares_used;

    fn plain_tx(index: usize, priority: u64, len: usize) -> ParsedTx {
        ParsedTx {
            index,
            raw: Bytes::from(vec![index as u8; len]),
            priority,
            blob: None,
        }
    }

    fn small_config() -> SquareConfig {
        SquareConfig {
            max_square_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn removes_lowest_priority_then_latest_arrival() {
        let config = small_config();
        // Only three of these fit next to the evidence slot
        let txs = vec![
            plain_tx(0, 5, 109),
            plain_tx(1, 1, 109),
            plain_tx(2, 5, 109),
            plain_tx(3, 5, 109),
            plain_tx(4, 3, 109),
        ];
        assert!(shares_used(&txs, &[], 2, &config) > 4);

        let Pruned { kept, removed } = prune(txs, &[], 2, &config).unwrap();
        let kept: Vec<usize> = kept.iter().map(|tx| tx.index).collect();
        let removed: Vec<usize> = removed.iter().map(|tx| tx.index).collect();
        assert_eq!(removed, vec![1, 4]);
        assert_eq!(kept, vec![0, 2, 3]);
    }

    #[test]
    fn ties_remove_later_arrivals_first() {
        let config = small_config();
        let txs: Vec<ParsedTx> = (0..6).map(|i| plain_tx(i, 1, 109)).collect();
        let Pruned { kept, removed } = prune(txs, &[], 2, &config).unwrap();
        assert_eq!(kept.iter().map(|tx| tx.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(removed.iter().map(|tx| tx.index).collect::<Vec<_>>(), vec![5, 4, 3]);
    }

    #[test]
    fn nothing_to_remove_when_content_fits() {
        let config = small_config();
        let txs = vec![plain_tx(0, 1, 10)];
        let pruned = prune(txs.clone(), &[], 2, &config).unwrap();
        assert_eq!(pruned.kept, txs);
        assert!(pruned.removed.is_empty());
    }

    #[test]
    fn transactions_that_never_fit_go_before_priority_order() {
        let config = small_config();
        // Two compact shares of evidence leave no room for the three shares of the first tx
        let evidence = vec![Bytes::from(vec![7u8; 200])];
        let txs = vec![plain_tx(0, 10, 300), plain_tx(1, 1, 10)];
        let Pruned { kept, removed } = prune(txs, &evidence, 2, &config).unwrap();
        assert_eq!(kept.iter().map(|tx| tx.index).collect::<Vec<_>>(), vec![1]);
        assert_eq!(removed.iter().map(|tx| tx.index).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn fails_when_a_single_transaction_cannot_fit() {
        let config = small_config();
        let txs = vec![plain_tx(0, 1, 500)];
        assert_eq!(
            prune(txs, &[], 2, &config).unwrap_err(),
            ConstructionError::CapacityOverflow {
                required: 6,
                capacity: 4
            }
        );
    }

    #[test]
    fn fails_when_evidence_alone_does_not_fit() {
        let config = small_config();
        let evidence = vec![Bytes::from(vec![0u8; 600])];
        assert_eq!(
            prune(vec![plain_tx(0, 1, 10)], &evidence, 2, &config).unwrap_err(),
            ConstructionError::CapacityOverflow {
                required: 6,
                capacity: 4
            }
        );
    }
}
