use bytes::Bytes;
use prost::Message;
use tracing::debug;

use crate::config::SquareConfig;
use crate::diagnostics::{Rejected, RejectionReason};
use crate::malleate::pay_for_data_tx;
use crate::namespace::{InvalidNamespaceLength, NamespaceId};
use crate::pfd::{
    MalleatedTx, MsgWirePayForData, ShareCommitAndSignature, Tx, WIRE_PAY_FOR_DATA_TYPE_URL,
};
use crate::split::{compact_shares_needed, sparse_shares_needed};
use crate::utils::{delimited_len, sha256};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid protobuf encoding: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Transaction has no body")]
    MissingBody,
    #[error("Transaction body carries no messages")]
    NoMessages,
    #[error("Transaction carries {0} wire messages, at most one is allowed")]
    MultipleWireMessages(usize),
    #[error(transparent)]
    InvalidNamespace(#[from] InvalidNamespaceLength),
    #[error("Namespace {0} is reserved")]
    ReservedNamespace(NamespaceId),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Declared message size {declared} doesn't match the actual size {actual}")]
    MessageSizeMismatch { declared: u64, actual: usize },
    #[error("Message carries no share commitments")]
    NoCommitments,
    #[error("Message needs {shares} shares but at most {max} fit in the largest square")]
    MessageTooLarge { shares: usize, max: usize },
    #[error("Transaction needs {shares} shares but at most {max} fit in the largest square")]
    TxTooLarge { shares: usize, max: usize },
}

/// A message embedded in a blob-carrying transaction, before malleation.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobReference {
    pub namespace: NamespaceId,
    pub message: Bytes,
    /// Number of sparse shares the message occupies
    pub share_count: usize,
    pub signer: String,
    pub commitments: Vec<ShareCommitAndSignature>,
    /// The decoded transaction, and the position of the wire message inside its body
    pub(crate) tx: Tx,
    pub(crate) wire_msg_index: usize,
    /// Length-delimited size of the malleated transaction for each declared square size
    malleated_lens: Vec<(u64, usize)>,
}

impl BlobReference {
    /// The commitment the submitter declared for `square_size`, if any
    pub fn commitment_for(&self, square_size: usize) -> Option<&ShareCommitAndSignature> {
        self.commitments
            .iter()
            .find(|commitment| commitment.k == square_size as u64)
    }

    /// The number of bytes the malleated transaction occupies in the compact region of a square
    /// of `square_size`. If no commitment was declared for that size the transaction can't be
    /// malleated, and the largest declared variant is reported instead.
    pub fn malleated_len(&self, square_size: usize) -> usize {
        self.malleated_lens
            .iter()
            .find(|(k, _)| *k == square_size as u64)
            .or_else(|| self.malleated_lens.iter().max_by_key(|(_, len)| *len))
            .map(|(_, len)| *len)
            .unwrap_or_default()
    }
}

/// A transaction accepted by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTx {
    /// Position of the transaction in the priority-ordered input
    pub index: usize,
    pub raw: Bytes,
    /// Fee per unit of gas
    pub priority: u64,
    pub blob: Option<BlobReference>,
}

impl ParsedTx {
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn hash(&self) -> [u8; 32] {
        sha256(&self.raw)
    }

    /// Bytes this transaction contributes to the compact region of a square of `square_size`,
    /// including its length delimiter
    pub fn compact_len(&self, square_size: usize) -> usize {
        match &self.blob {
            Some(blob) => blob.malleated_len(square_size),
            None => delimited_len(self.raw.len()),
        }
    }

    /// Sparse shares used by this transaction's message
    pub fn message_shares(&self) -> usize {
        self.blob.as_ref().map_or(0, |blob| blob.share_count)
    }
}

/// Output of [`parse_txs`]
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    pub txs: Vec<ParsedTx>,
    pub rejected: Vec<Rejected>,
}

/// Decodes a priority-ordered batch of raw transactions.
///
/// Transactions that fail to decode are dropped and reported in [`Parsed::rejected`];
/// the rest keep their relative order.
pub fn parse_txs<T: Into<Bytes>>(
    raw_txs: impl IntoIterator<Item = T>,
    config: &SquareConfig,
) -> Parsed {
    let mut parsed = Parsed::default();
    for (index, raw) in raw_txs.into_iter().enumerate() {
        let raw = raw.into();
        match parse_tx(index, raw.clone(), config) {
            Ok(tx) => parsed.txs.push(tx),
            Err(err) => {
                debug!(index, error = %err, "Dropping transaction that failed to parse");
                parsed.rejected.push(Rejected {
                    index,
                    tx_hash: sha256(&raw),
                    reason: RejectionReason::Parse(err),
                });
            }
        }
    }
    parsed
}

/// Decodes a single transaction
pub fn parse_tx(index: usize, raw: Bytes, config: &SquareConfig) -> Result<ParsedTx, ParseError> {
    let tx = Tx::decode(raw.clone())?;
    let body = tx.body.as_ref().ok_or(ParseError::MissingBody)?;
    if body.messages.is_empty() {
        return Err(ParseError::NoMessages);
    }
    let priority = tx
        .auth_info
        .as_ref()
        .and_then(|auth| auth.fee.as_ref())
        .and_then(|fee| fee.amount.checked_div(fee.gas_limit))
        .unwrap_or_default();

    let wire_msgs: Vec<usize> = body
        .messages
        .iter()
        .enumerate()
        .filter(|(_, msg)| msg.type_url == WIRE_PAY_FOR_DATA_TYPE_URL)
        .map(|(idx, _)| idx)
        .collect();

    let blob = match wire_msgs.as_slice() {
        [] => {
            let shares = compact_shares_needed(delimited_len(raw.len()), config);
            // Any block with transactions also holds an evidence share
            let max = config.max_shares() - 1;
            if shares > max {
                return Err(ParseError::TxTooLarge { shares, max });
            }
            None
        }
        [wire_msg_index] => {
            let wire = MsgWirePayForData::decode(body.messages[*wire_msg_index].value.as_slice())?;
            Some(blob_reference(tx.clone(), *wire_msg_index, wire, config)?)
        }
        many => return Err(ParseError::MultipleWireMessages(many.len())),
    };

    Ok(ParsedTx {
        index,
        raw,
        priority,
        blob,
    })
}

fn blob_reference(
    tx: Tx,
    wire_msg_index: usize,
    wire: MsgWirePayForData,
    config: &SquareConfig,
) -> Result<BlobReference, ParseError> {
    let namespace = NamespaceId::try_from(wire.message_namespace_id.as_ref())?;
    if !namespace.is_valid_message_namespace() {
        return Err(ParseError::ReservedNamespace(namespace));
    }
    if wire.message.is_empty() {
        return Err(ParseError::EmptyMessage);
    }
    if wire.message_size != wire.message.len() as u64 {
        return Err(ParseError::MessageSizeMismatch {
            declared: wire.message_size,
            actual: wire.message.len(),
        });
    }
    if wire.message_share_commitment.is_empty() {
        return Err(ParseError::NoCommitments);
    }
    let share_count = sparse_shares_needed(wire.message.len(), config);

    let mut blob = BlobReference {
        namespace,
        message: wire.message,
        share_count,
        signer: wire.signer,
        commitments: wire.message_share_commitment,
        tx,
        wire_msg_index,
        malleated_lens: Vec::new(),
    };
    blob.malleated_lens = blob
        .commitments
        .iter()
        .map(|commitment| {
            let inner_len = pay_for_data_tx(&blob, commitment).encoded_len();
            (
                commitment.k,
                delimited_len(MalleatedTx::encoded_len_for(inner_len)),
            )
        })
        .collect();

    // The message shares the square with its paying transaction and the evidence share
    let tx_shares = blob
        .malleated_lens
        .iter()
        .map(|(_, len)| compact_shares_needed(*len, config))
        .min()
        .unwrap_or_default();
    let max = config.max_shares().saturating_sub(tx_shares + 1);
    if share_count > max {
        return Err(ParseError::MessageTooLarge {
            shares: share_count,
            max,
        });
    }
    Ok(blob)
}
