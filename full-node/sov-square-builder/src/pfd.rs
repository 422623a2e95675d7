//! Protobuf messages for transactions that pay for data (blobs) to be included in the square.

use prost::Message;

/// Type URL of [`MsgWirePayForData`] inside a transaction body
pub const WIRE_PAY_FOR_DATA_TYPE_URL: &str = "/payment.MsgWirePayForData";
/// Type URL of [`MsgPayForData`] inside a transaction body
pub const PAY_FOR_DATA_TYPE_URL: &str = "/payment.MsgPayForData";

/// Tx is the standard type used for broadcasting transactions.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tx {
    /// body is the processable content of the transaction
    #[prost(message, optional, tag = "1")]
    pub body: ::core::option::Option<TxBody>,
    #[prost(message, optional, tag = "2")]
    pub auth_info: ::core::option::Option<AuthInfo>,
    /// signatures is a list of signatures that matches the length and order of
    /// AuthInfo's signer_infos.
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// TxBody is the body of a transaction that all signers sign over.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: ::prost::alloc::vec::Vec<::prost_types::Any>,
    #[prost(string, tag = "2")]
    pub memo: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthInfo {
    #[prost(message, optional, tag = "1")]
    pub fee: ::core::option::Option<Fee>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fee {
    #[prost(uint64, tag = "1")]
    pub amount: u64,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
}

/// MsgWirePayForData is the message submitted by users. It carries the message itself along
/// with a commitment (and a signature over the matching MsgPayForData) for every square size
/// the message might end up in.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgWirePayForData {
    #[prost(string, tag = "1")]
    pub signer: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub message_namespace_id: ::prost::bytes::Bytes,
    #[prost(uint64, tag = "3")]
    pub message_size: u64,
    #[prost(bytes = "bytes", tag = "4")]
    pub message: ::prost::bytes::Bytes,
    #[prost(message, repeated, tag = "5")]
    pub message_share_commitment: ::prost::alloc::vec::Vec<ShareCommitAndSignature>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShareCommitAndSignature {
    /// The square size this commitment was computed for
    #[prost(uint64, tag = "1")]
    pub k: u64,
    #[prost(bytes = "bytes", tag = "2")]
    pub share_commitment: ::prost::bytes::Bytes,
    #[prost(bytes = "bytes", tag = "3")]
    pub signature: ::prost::bytes::Bytes,
}

/// MsgPayForData is what ends up on chain once the message has been detached from its
/// transaction.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgPayForData {
    #[prost(string, tag = "1")]
    pub signer: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub message_namespace_id: ::prost::bytes::Bytes,
    #[prost(uint64, tag = "3")]
    pub message_size: u64,
    #[prost(bytes = "bytes", tag = "4")]
    pub message_share_commitment: ::prost::bytes::Bytes,
}

/// MalleatedTx wraps a transaction that was rewritten by the block producer, linking it to
/// the transaction the user submitted and to the first share of its message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MalleatedTx {
    #[prost(bytes = "bytes", tag = "1")]
    pub original_tx_hash: ::prost::bytes::Bytes,
    #[prost(bytes = "bytes", tag = "2")]
    pub tx: ::prost::bytes::Bytes,
    /// Fixed width, so that the length of the wrapper doesn't depend on where the message lands.
    #[prost(fixed32, tag = "3")]
    pub share_index: u32,
}

impl MalleatedTx {
    /// The encoded length of a wrapper around an inner tx of `tx_len` bytes.
    /// Share indexes are never zero: the first share of the square always holds a transaction.
    pub fn encoded_len_for(tx_len: usize) -> usize {
        MalleatedTx {
            original_tx_hash: vec![0u8; 32].into(),
            tx: vec![0u8; tx_len].into(),
            share_index: 1,
        }
        .encoded_len()
    }
}
