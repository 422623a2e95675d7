//! Writing data into shares.
//!
//! Compact shares pack length-delimited units (transactions, evidence) back to back, while
//! sparse shares hold exactly one message each. Both layouts are the inverse of the readers
//! in [`crate::shares`].

use bytes::{BufMut, BytesMut};
use prost::encoding::encode_varint;

use crate::config::SquareConfig;
use crate::namespace::NamespaceId;
use crate::shares::{info_byte, Share, RESERVED_LEN};

/// The number of compact shares needed to hold a sequence of `sequence_len` delimited bytes
pub fn compact_shares_needed(sequence_len: usize, config: &SquareConfig) -> usize {
    shares_needed(
        sequence_len,
        config.compact_start_capacity(),
        config.compact_continuation_capacity(),
    )
}

/// The number of sparse shares needed to hold a message of `message_len` bytes.
/// Even an empty message occupies the share that announces it.
pub fn sparse_shares_needed(message_len: usize, config: &SquareConfig) -> usize {
    shares_needed(
        message_len,
        config.sparse_start_capacity(),
        config.sparse_continuation_capacity(),
    )
    .max(1)
}

fn shares_needed(len: usize, first_capacity: usize, continuation_capacity: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if len <= first_capacity {
        return 1;
    }
    1 + (len - first_capacity).div_ceil(continuation_capacity)
}

/// Accumulates units for a single reserved namespace and splits them into compact shares.
#[derive(Debug, Clone)]
pub struct CompactShareSplitter {
    namespace: NamespaceId,
    config: SquareConfig,
    sequence: Vec<u8>,
    unit_starts: Vec<usize>,
}

impl CompactShareSplitter {
    pub fn new(namespace: NamespaceId, config: &SquareConfig) -> Self {
        Self {
            namespace,
            config: *config,
            sequence: Vec::new(),
            unit_starts: Vec::new(),
        }
    }

    /// Appends a unit, prefixed with its varint length
    pub fn write(&mut self, unit: &[u8]) {
        self.unit_starts.push(self.sequence.len());
        encode_varint(unit.len() as u64, &mut self.sequence);
        self.sequence.extend_from_slice(unit);
    }

    pub fn sequence_len(&self) -> usize {
        self.sequence.len()
    }

    /// The number of shares [`Self::export`] will produce
    pub fn count(&self) -> usize {
        compact_shares_needed(self.sequence.len(), &self.config)
    }

    pub fn export(self) -> Vec<Share> {
        let mut shares = Vec::with_capacity(self.count());
        let mut cursor = 0;
        let mut next_unit = 0;
        while cursor < self.sequence.len() {
            let is_start = shares.is_empty();
            let capacity = if is_start {
                self.config.compact_start_capacity()
            } else {
                self.config.compact_continuation_capacity()
            };
            let end = (cursor + capacity).min(self.sequence.len());

            let mut share = BytesMut::with_capacity(self.config.share_size);
            share.put_slice(self.namespace.as_bytes());
            share.put_u8(info_byte(is_start));
            if is_start {
                share.put_u32(self.sequence.len() as u32);
            }
            let data_offset = share.len() + RESERVED_LEN;

            // The reserved bytes point at the first unit that begins in this share
            while next_unit < self.unit_starts.len() && self.unit_starts[next_unit] < cursor {
                next_unit += 1;
            }
            let first_unit = match self.unit_starts.get(next_unit) {
                Some(&start) if start < end => (data_offset + start - cursor) as u32,
                _ => 0,
            };
            share.put_u32(first_unit);
            share.put_slice(&self.sequence[cursor..end]);
            share.resize(self.config.share_size, 0);

            let share = share.freeze();
            shares.push(if is_start {
                Share::Start(share)
            } else {
                Share::Continuation(share)
            });
            cursor = end;
        }
        shares
    }
}

/// Splits a message into the sparse shares that carry it
pub fn split_message(namespace: NamespaceId, data: &[u8], config: &SquareConfig) -> Vec<Share> {
    let mut shares = Vec::with_capacity(sparse_shares_needed(data.len(), config));
    let mut cursor = 0;
    loop {
        let is_start = shares.is_empty();
        let capacity = if is_start {
            config.sparse_start_capacity()
        } else {
            config.sparse_continuation_capacity()
        };
        let end = (cursor + capacity).min(data.len());

        let mut share = BytesMut::with_capacity(config.share_size);
        share.put_slice(namespace.as_bytes());
        share.put_u8(info_byte(is_start));
        if is_start {
            share.put_u32(data.len() as u32);
        }
        share.put_slice(&data[cursor..end]);
        share.resize(config.share_size, 0);

        let share = share.freeze();
        shares.push(if is_start {
            Share::Start(share)
        } else {
            Share::Continuation(share)
        });
        cursor = end;
        if cursor >= data.len() {
            return shares;
        }
    }
}

/// A share announcing an empty sequence in `namespace`
pub fn padding_share(namespace: NamespaceId, config: &SquareConfig) -> Share {
    let mut share = BytesMut::with_capacity(config.share_size);
    share.put_slice(namespace.as_bytes());
    share.put_u8(info_byte(true));
    share.put_u32(0);
    share.resize(config.share_size, 0);
    Share::Start(share.freeze())
}
