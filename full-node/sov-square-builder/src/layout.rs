use bytes::Bytes;

use crate::builder::ConstructionError;
use crate::config::SquareConfig;
use crate::malleate::PlacedMessage;
use crate::namespace::{EVIDENCE_NAMESPACE, TAIL_PADDING_NAMESPACE, TX_NAMESPACE};
use crate::shares::Share;
use crate::split::{padding_share, split_message, CompactShareSplitter};

/// Lays out the final square, row by row.
///
/// Transactions come first, then evidence (or a single padding share standing in for it),
/// then every message at the share index it was assigned during malleation. The rest of
/// the square is filled with tail padding.
pub fn assemble(
    square_size: usize,
    txs: &[Bytes],
    messages: &[PlacedMessage],
    evidence: &[Bytes],
    config: &SquareConfig,
) -> Result<Vec<Share>, ConstructionError> {
    let capacity = square_size * square_size;
    let mut shares = Vec::with_capacity(capacity);

    let mut tx_splitter = CompactShareSplitter::new(TX_NAMESPACE, config);
    for tx in txs {
        tx_splitter.write(tx);
    }
    shares.extend(tx_splitter.export());

    let mut evidence_splitter = CompactShareSplitter::new(EVIDENCE_NAMESPACE, config);
    for item in evidence {
        evidence_splitter.write(item);
    }
    if evidence.is_empty() {
        if !txs.is_empty() || !messages.is_empty() {
            shares.push(padding_share(EVIDENCE_NAMESPACE, config));
        }
    } else {
        shares.extend(evidence_splitter.export());
    }

    let mut last_namespace = None;
    for message in messages {
        if last_namespace > Some(message.namespace) || shares.len() != message.share_index {
            return Err(ConstructionError::LayoutMismatch {
                tx_index: message.tx_index,
                expected: message.share_index,
                actual: shares.len(),
            });
        }
        last_namespace = Some(message.namespace);
        let message_shares = split_message(message.namespace, &message.data, config);
        if message_shares.len() != message.share_count {
            return Err(ConstructionError::LayoutMismatch {
                tx_index: message.tx_index,
                expected: message.share_index + message.share_count,
                actual: message.share_index + message_shares.len(),
            });
        }
        shares.extend(message_shares);
    }

    if shares.len() > capacity {
        return Err(ConstructionError::CapacityOverflow {
            required: shares.len(),
            capacity,
        });
    }
    shares.resize(capacity, padding_share(TAIL_PADDING_NAMESPACE, config));
    Ok(shares)
}
