use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// The length of a namespace identifier, in bytes
pub const NAMESPACE_ID_LEN: usize = 8;

/// Transactions, both plain and malleated, live in this namespace.
pub const TX_NAMESPACE: NamespaceId = NamespaceId([0, 0, 0, 0, 0, 0, 0, 1]);
/// Evidence and other consensus metadata.
pub const EVIDENCE_NAMESPACE: NamespaceId = NamespaceId([0, 0, 0, 0, 0, 0, 0, 3]);
/// The highest reserved namespace. Messages must use a namespace above it.
pub const RESERVED_PADDING_NAMESPACE: NamespaceId = NamespaceId([0, 0, 0, 0, 0, 0, 0, 0xff]);
/// Padding shares at the end of the square.
pub const TAIL_PADDING_NAMESPACE: NamespaceId =
    NamespaceId([0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]);
/// Used by the erasure coding layer for parity shares. Never appears in the original square.
pub const PARITY_SHARES_NAMESPACE: NamespaceId = NamespaceId([0xff; NAMESPACE_ID_LEN]);

/// A fixed-width tag used to retrieve the data of a single application from the square.
///
/// Namespaces are ordered bytewise, which is the order in which they must appear in the square.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct NamespaceId(pub [u8; NAMESPACE_ID_LEN]);

impl NamespaceId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Reserved namespaces hold compact shares and can't be used by messages
    pub fn is_reserved(&self) -> bool {
        *self <= RESERVED_PADDING_NAMESPACE
    }

    /// Returns true if a message may be published under this namespace
    pub fn is_valid_message_namespace(&self) -> bool {
        *self > RESERVED_PADDING_NAMESPACE && *self < TAIL_PADDING_NAMESPACE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid namespace length. Expected {NAMESPACE_ID_LEN} bytes, got {0}")]
pub struct InvalidNamespaceLength(pub usize);

impl TryFrom<&[u8]> for NamespaceId {
    type Error = InvalidNamespaceLength;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; NAMESPACE_ID_LEN] = value
            .try_into()
            .map_err(|_| InvalidNamespaceLength(value.len()))?;
        Ok(Self(bytes))
    }
}

impl From<NamespaceId> for nmt_rs::NamespaceId<NAMESPACE_ID_LEN> {
    fn from(namespace: NamespaceId) -> Self {
        nmt_rs::NamespaceId(namespace.0)
    }
}

impl AsRef<[u8]> for NamespaceId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamespaceId(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_namespaces_sort_before_messages() {
        assert!(TX_NAMESPACE < EVIDENCE_NAMESPACE);
        assert!(EVIDENCE_NAMESPACE.is_reserved());
        assert!(RESERVED_PADDING_NAMESPACE.is_reserved());
        assert!(!RESERVED_PADDING_NAMESPACE.is_valid_message_namespace());

        let message_ns = NamespaceId([0, 0, 0, 0, 0, 0, 1, 0]);
        assert!(!message_ns.is_reserved());
        assert!(message_ns.is_valid_message_namespace());

        assert!(!TAIL_PADDING_NAMESPACE.is_valid_message_namespace());
        assert!(!PARITY_SHARES_NAMESPACE.is_valid_message_namespace());
    }

    #[test]
    fn namespace_from_slice() {
        let ns = NamespaceId::try_from(&b"sov-test"[..]).unwrap();
        assert_eq!(ns.to_string(), "736f762d74657374");
        assert_eq!(
            NamespaceId::try_from(&b"short"[..]),
            Err(InvalidNamespaceLength(5))
        );
    }
}
