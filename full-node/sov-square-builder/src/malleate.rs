//! Detaches messages from the transactions that pay for them.
//!
//! Each blob-carrying transaction is rewritten for a specific square size: its wire message is
//! replaced by a [`MsgPayForData`] carrying the commitment for that size, and the message is
//! placed in the sparse region of the square. Commitments computed for one size are
//! meaningless at another, so all of this must be redone whenever the size changes.

use borsh::{BorshDeserialize, BorshSerialize};
use bytes::Bytes;
use prost::Message;
use prost_types::Any;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SquareConfig;
use crate::diagnostics::{Rejected, RejectionReason};
use crate::estimate::evidence_shares;
use crate::namespace::NamespaceId;
use crate::parser::{BlobReference, ParsedTx};
use crate::pfd::{MalleatedTx, MsgPayForData, ShareCommitAndSignature, Tx, PAY_FOR_DATA_TYPE_URL};
use crate::share_commit::{message_commitment, CommitmentError};
use crate::split::compact_shares_needed;
use crate::utils::delimited_len;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalleationError {
    #[error("No commitment was declared for square size {square_size}")]
    MissingCommitment { square_size: usize },
    #[error("Declared commitment for square size {square_size} doesn't match the message")]
    CommitmentMismatch { square_size: usize },
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
    #[error("Share index {0} doesn't fit in the wire format")]
    ShareIndexOverflow(usize),
}

/// A message detached from its transaction, with its position in the square.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct PlacedMessage {
    pub namespace: NamespaceId,
    pub data: Bytes,
    /// Index of the first share of the message, counting from the top-left of the square
    pub share_index: usize,
    pub share_count: usize,
    pub commitment: [u8; 32],
    /// Position of the paying transaction in the input
    pub tx_index: usize,
}

impl PlacedMessage {
    /// The range of shares occupied by the message
    pub fn share_range(&self) -> std::ops::Range<usize> {
        self.share_index..self.share_index + self.share_count
    }
}

/// Output of [`malleate_txs`]
#[derive(Debug, Clone, Default)]
pub struct Malleated {
    /// Transactions as they go into the square, in input order
    pub txs: Vec<Bytes>,
    /// Messages sorted by namespace, then by input order
    pub messages: Vec<PlacedMessage>,
    pub rejected: Vec<Rejected>,
}

/// Rebuilds the transaction behind `blob` with its wire message swapped for a
/// [`MsgPayForData`] committing to the message at a single square size.
pub(crate) fn pay_for_data_tx(blob: &BlobReference, commitment: &ShareCommitAndSignature) -> Tx {
    let pay_for_data = MsgPayForData {
        signer: blob.signer.clone(),
        message_namespace_id: Bytes::copy_from_slice(blob.namespace.as_bytes()),
        message_size: blob.message.len() as u64,
        message_share_commitment: commitment.share_commitment.clone(),
    };
    let mut tx = blob.tx.clone();
    if let Some(body) = tx.body.as_mut() {
        body.messages[blob.wire_msg_index] = Any {
            type_url: PAY_FOR_DATA_TYPE_URL.to_string(),
            value: pay_for_data.encode_to_vec(),
        };
    }
    tx.signatures = vec![commitment.signature.to_vec()];
    tx
}

/// Checks the declared commitment for `square_size` and returns the rewritten transaction
/// along with the commitment.
fn malleate_blob(
    blob: &BlobReference,
    square_size: usize,
    config: &SquareConfig,
) -> Result<(Bytes, [u8; 32]), MalleationError> {
    let declared = blob
        .commitment_for(square_size)
        .ok_or(MalleationError::MissingCommitment { square_size })?;
    let commitment = message_commitment(blob.namespace, &blob.message, square_size, config)?;
    if declared.share_commitment.as_ref() != commitment.as_slice() {
        return Err(MalleationError::CommitmentMismatch { square_size });
    }
    let tx = pay_for_data_tx(blob, declared).encode_to_vec();
    Ok((tx.into(), commitment))
}

/// Malleates every blob-carrying transaction for a square of `square_size` and places
/// the detached messages.
///
/// Messages start right after the compact region (transactions, then evidence) and are
/// laid out by namespace. Transactions that can't be malleated are reported in
/// [`Malleated::rejected`]; the placement of the remaining ones is only final once
/// nothing is rejected.
pub fn malleate_txs(
    txs: &[ParsedTx],
    evidence: &[Bytes],
    square_size: usize,
    config: &SquareConfig,
) -> Malleated {
    let mut malleated = Malleated::default();
    // (position in `txs`, inner tx, commitment)
    let mut blobs = Vec::new();
    let mut compact_bytes = 0;

    for (position, tx) in txs.iter().enumerate() {
        let Some(blob) = &tx.blob else {
            compact_bytes += delimited_len(tx.raw.len());
            continue;
        };
        match malleate_blob(blob, square_size, config) {
            Ok((inner, commitment)) => {
                compact_bytes += delimited_len(MalleatedTx::encoded_len_for(inner.len()));
                blobs.push((position, inner, commitment));
            }
            Err(err) => {
                debug!(
                    index = tx.index,
                    square_size,
                    error = %err,
                    "Failed to malleate transaction"
                );
                malleated.rejected.push(Rejected {
                    index: tx.index,
                    tx_hash: tx.hash(),
                    reason: RejectionReason::Malleation(err),
                });
            }
        }
    }

    let has_txs = txs.len() > malleated.rejected.len();
    let mut next_share = compact_shares_needed(compact_bytes, config)
        + evidence_shares(evidence, has_txs, config);

    // Sorting is stable, so messages in the same namespace keep their input order
    blobs.sort_by_key(|(position, _, _)| blob_of(&txs[*position]).map(|blob| blob.namespace));

    let mut share_indexes = vec![None; txs.len()];
    for (position, _, commitment) in &blobs {
        let tx = &txs[*position];
        let Some(blob) = blob_of(tx) else {
            continue;
        };
        share_indexes[*position] = Some(next_share);
        malleated.messages.push(PlacedMessage {
            namespace: blob.namespace,
            data: blob.message.clone(),
            share_index: next_share,
            share_count: blob.share_count,
            commitment: *commitment,
            tx_index: tx.index,
        });
        next_share += blob.share_count;
    }

    let mut inner_txs: Vec<Option<Bytes>> = vec![None; txs.len()];
    for (position, inner, _) in blobs {
        inner_txs[position] = Some(inner);
    }

    for (position, tx) in txs.iter().enumerate() {
        match (tx.blob.is_some(), inner_txs[position].take(), share_indexes[position]) {
            (false, _, _) => malleated.txs.push(tx.raw.clone()),
            (true, Some(inner), Some(share_index)) => {
                let share_index = match u32::try_from(share_index) {
                    Ok(share_index) => share_index,
                    Err(_) => {
                        malleated.rejected.push(Rejected {
                            index: tx.index,
                            tx_hash: tx.hash(),
                            reason: RejectionReason::Malleation(
                                MalleationError::ShareIndexOverflow(share_index),
                            ),
                        });
                        continue;
                    }
                };
                let wrapped = MalleatedTx {
                    original_tx_hash: Bytes::copy_from_slice(&tx.hash()),
                    tx: inner,
                    share_index,
                };
                malleated.txs.push(wrapped.encode_to_vec().into());
            }
            // Rejected above
            (true, _, _) => {}
        }
    }
    malleated
}

fn blob_of(tx: &ParsedTx) -> Option<&BlobReference> {
    tx.blob.as_ref()
}
