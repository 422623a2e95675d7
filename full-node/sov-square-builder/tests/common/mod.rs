#![allow(dead_code)]

use std::sync::Once;

use bytes::Bytes;
use prost::Message;
use prost_types::Any;
use sov_square_builder::pfd::{
    AuthInfo, Fee, MsgWirePayForData, ShareCommitAndSignature, Tx, TxBody,
    WIRE_PAY_FOR_DATA_TYPE_URL,
};
use sov_square_builder::share_commit::commitments_for_all_sizes;
use sov_square_builder::{NamespaceId, SquareConfig};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::WARN.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .try_init();
    });
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

fn signed_tx(messages: Vec<Any>, memo: String, fee: u64) -> Vec<u8> {
    Tx {
        body: Some(TxBody { messages, memo }),
        auth_info: Some(AuthInfo {
            fee: Some(Fee {
                amount: fee,
                gas_limit: 1_000,
            }),
        }),
        signatures: vec![vec![0xab; 64]],
    }
    .encode_to_vec()
}

fn send_msg(nonce: usize) -> Any {
    let send = MsgSend {
        from_address: format!("celestia1{:0>38}", nonce),
        to_address: "celestia1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq".to_string(),
        amount: vec![Coin {
            denom: "utia".to_string(),
            amount: "1000".to_string(),
        }],
    };
    Any {
        type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
        value: send.encode_to_vec(),
    }
}

/// A plain transfer, a little over 200 bytes once encoded
pub fn send_tx(nonce: usize, fee: u64) -> Vec<u8> {
    signed_tx(vec![send_msg(nonce)], String::new(), fee)
}

/// A plain transaction of exactly `len` bytes, padded through its memo
pub fn tx_of_len(len: usize) -> Vec<u8> {
    let base = signed_tx(vec![send_msg(0)], String::new(), 1_000).len();
    for memo_len in len.saturating_sub(base + 8)..=len.saturating_sub(base) {
        let tx = signed_tx(vec![send_msg(0)], "m".repeat(memo_len), 1_000);
        if tx.len() == len {
            return tx;
        }
    }
    panic!("no memo length yields a transaction of {len} bytes");
}

pub fn namespace(id: u16) -> NamespaceId {
    let [hi, lo] = id.to_be_bytes();
    NamespaceId([1, 0, 0, 0, 0, 0, hi, lo])
}

/// A blob-carrying transaction, with commitments for every square size the message fits in
pub fn blob_tx(namespace: NamespaceId, message: &[u8], fee: u64, config: &SquareConfig) -> Vec<u8> {
    let commitments = commitments_for_all_sizes(namespace, message, config)
        .into_iter()
        .map(|(square_size, commitment)| (square_size as u64, commitment))
        .collect();
    blob_tx_with_commitments(namespace, message, fee, commitments)
}

pub fn blob_tx_with_commitments(
    namespace: NamespaceId,
    message: &[u8],
    fee: u64,
    commitments: Vec<(u64, [u8; 32])>,
) -> Vec<u8> {
    let wire = MsgWirePayForData {
        signer: "celestia1blobsubmitter".to_string(),
        message_namespace_id: Bytes::copy_from_slice(namespace.as_bytes()),
        message_size: message.len() as u64,
        message: Bytes::copy_from_slice(message),
        message_share_commitment: commitments
            .into_iter()
            .map(|(k, commitment)| ShareCommitAndSignature {
                k,
                share_commitment: Bytes::copy_from_slice(&commitment),
                signature: Bytes::from(vec![k as u8; 64]),
            })
            .collect(),
    };
    signed_tx(
        vec![Any {
            type_url: WIRE_PAY_FOR_DATA_TYPE_URL.to_string(),
            value: wire.encode_to_vec(),
        }],
        String::new(),
        fee,
    )
}
