use borsh::{BorshDeserialize, BorshSerialize};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::namespace::{
    NamespaceId, EVIDENCE_NAMESPACE, NAMESPACE_ID_LEN, TAIL_PADDING_NAMESPACE, TX_NAMESPACE,
};
use crate::utils::read_varint;

/// Compact shares carry 4 reserved bytes pointing at the first unit that begins in them
pub const RESERVED_LEN: usize = 4;
/// Version and sequence-start flag
pub const INFO_LEN: usize = 1;
/// Start shares announce the byte length of their sequence in a big-endian u32
pub const SEQUENCE_LEN_BYTES: usize = 4;
/// The only share format version this crate reads or writes
pub const SHARE_VERSION: u8 = 0;

const INFO_OFFSET: usize = NAMESPACE_ID_LEN;
const SEQUENCE_START_FLAG: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    #[error("Share does not begin a sequence")]
    NotAStartShare,
    #[error("Unsupported share version {0}")]
    UnsupportedVersion(u8),
    #[error("Share of {0} bytes is too short to hold its header")]
    TooShort(usize),
    #[error("Invalid share encoding: {0}")]
    InvalidEncoding(&'static str),
}

pub(crate) fn info_byte(is_sequence_start: bool) -> u8 {
    (SHARE_VERSION << 1) | u8::from(is_sequence_start)
}

/// One fixed-size cell of the square.
///
/// The variant records whether the share opens a sequence, which decides whether its
/// header carries a sequence length.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum Share {
    Continuation(Bytes),
    Start(Bytes),
}

impl Serialize for Share {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.as_serialized())
    }
}

impl<'de> Deserialize<'de> for Share {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <Bytes as Deserialize>::deserialize(deserializer)?;
        Share::new(raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        self.as_serialized()
    }
}

impl Share {
    /// Wraps raw share bytes after checking the header is readable.
    pub fn new(raw: Bytes) -> Result<Self, ShareError> {
        let Some(&info) = raw.get(INFO_OFFSET) else {
            return Err(ShareError::TooShort(raw.len()));
        };
        let version = info >> 1;
        if version != SHARE_VERSION {
            return Err(ShareError::UnsupportedVersion(version));
        }
        let share = if info & SEQUENCE_START_FLAG == SEQUENCE_START_FLAG {
            Share::Start(raw)
        } else {
            Share::Continuation(raw)
        };
        if share.as_serialized().len() <= share.header_len() {
            return Err(ShareError::TooShort(share.as_serialized().len()));
        }
        Ok(share)
    }

    fn raw(&self) -> &Bytes {
        match self {
            Share::Start(raw) | Share::Continuation(raw) => raw,
        }
    }

    pub fn as_serialized(&self) -> &[u8] {
        self.raw().as_ref()
    }

    pub fn namespace(&self) -> NamespaceId {
        let mut id = [0u8; NAMESPACE_ID_LEN];
        id.copy_from_slice(&self.as_serialized()[..NAMESPACE_ID_LEN]);
        NamespaceId(id)
    }

    pub fn is_sequence_start(&self) -> bool {
        matches!(self, Share::Start(_))
    }

    /// Shares in reserved namespaces use the compact layout
    fn is_compact(&self) -> bool {
        self.namespace().is_reserved()
    }

    /// Bytes before the payload: namespace, info byte, then the optional sequence length
    /// and reserved bytes.
    fn header_len(&self) -> usize {
        let sequence_len = if self.is_sequence_start() { SEQUENCE_LEN_BYTES } else { 0 };
        let reserved = if self.is_compact() { RESERVED_LEN } else { 0 };
        NAMESPACE_ID_LEN + INFO_LEN + sequence_len + reserved
    }

    fn read_u32_at(&self, offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.as_serialized()[offset..offset + 4]);
        u32::from_be_bytes(word)
    }

    pub fn sequence_length(&self) -> Result<u64, ShareError> {
        if !self.is_sequence_start() {
            return Err(ShareError::NotAStartShare);
        }
        Ok(self.read_u32_at(INFO_OFFSET + INFO_LEN) as u64)
    }

    /// Padding shares open an empty sequence
    pub fn is_padding(&self) -> bool {
        self.sequence_length() == Ok(0)
    }

    /// The payload of this share, zero padding included
    pub fn data_ref(&self) -> &[u8] {
        &self.as_serialized()[self.header_len()..]
    }

    /// Offset into the payload of the first unit that begins in this compact share.
    ///
    /// The reserved bytes hold that position measured from the start of the share, with 0
    /// meaning no unit begins here.
    pub fn offset_of_first_unit(&self) -> Option<usize> {
        if !self.is_compact() {
            return None;
        }
        let header = self.header_len();
        match self.read_u32_at(header - RESERVED_LEN) as usize {
            0 => None,
            absolute => absolute.checked_sub(header),
        }
    }

    /// Walks the unit delimiters of a compact share and reports whether one begins at `idx`.
    pub fn is_valid_unit_start(&self, idx: usize) -> bool {
        let Some(mut cursor) = self.offset_of_first_unit() else {
            return false;
        };
        let data = self.data_ref();
        while cursor < data.len() && cursor <= idx {
            if cursor == idx {
                return true;
            }
            match read_varint(&data[cursor..]) {
                Ok((len, delim)) if len > 0 => cursor += delim + len as usize,
                _ => return false,
            }
        }
        false
    }
}

/// A contiguous run of shares sharing one namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum NamespaceGroup {
    /// Reserved namespace: one sequence of length-delimited units
    Compact(Vec<Share>),
    /// Message namespace: one sequence per message, each opened by a start share
    Sparse(Vec<Share>),
}

impl NamespaceGroup {
    /// Classifies by the namespace of the first share. Panics on an empty vector.
    pub fn from_shares_unchecked(shares: Vec<Share>) -> Self {
        if shares[0].is_compact() {
            NamespaceGroup::Compact(shares)
        } else {
            NamespaceGroup::Sparse(shares)
        }
    }

    /// Splits a square into one group per namespace run, in square order.
    pub fn group_square(shares: &[Share]) -> Vec<NamespaceGroup> {
        let mut groups = Vec::new();
        let mut rest = shares;
        while let Some(first) = rest.first() {
            let namespace = first.namespace();
            let len = rest.iter().take_while(|share| share.namespace() == namespace).count();
            let (run, tail) = rest.split_at(len);
            groups.push(Self::from_shares_unchecked(run.to_vec()));
            rest = tail;
        }
        groups
    }

    pub fn shares(&self) -> &[Share] {
        match self {
            NamespaceGroup::Compact(shares) | NamespaceGroup::Sparse(shares) => shares,
        }
    }

    pub fn namespace(&self) -> Option<NamespaceId> {
        self.shares().first().map(Share::namespace)
    }

    /// The sequences in this group. A compact group is a single sequence.
    pub fn blobs(&self) -> Vec<&[Share]> {
        match self {
            NamespaceGroup::Compact(shares) if shares.is_empty() => vec![],
            NamespaceGroup::Compact(shares) => vec![shares.as_slice()],
            NamespaceGroup::Sparse(shares) => {
                let mut sequences = Vec::new();
                let mut rest = shares.as_slice();
                while !rest.is_empty() {
                    let len = 1 + rest[1..]
                        .iter()
                        .take_while(|share| !share.is_sequence_start())
                        .count();
                    let (sequence, tail) = rest.split_at(len);
                    sequences.push(sequence);
                    rest = tail;
                }
                sequences
            }
        }
    }

    /// Decodes the length-delimited units stored in a compact group.
    pub fn compact_units(&self) -> Result<Vec<Bytes>, ShareError> {
        let NamespaceGroup::Compact(shares) = self else {
            return Err(ShareError::InvalidEncoding("expected a compact group"));
        };
        if shares.is_empty() {
            return Ok(vec![]);
        }
        let mut payload = read_sequence(shares)?;
        let mut units = Vec::new();
        while payload.has_remaining() {
            let (len, _) = read_varint(&mut payload)
                .map_err(|_| ShareError::InvalidEncoding("invalid unit length"))?;
            let len = len as usize;
            if len > payload.remaining() {
                return Err(ShareError::InvalidEncoding("unit overruns its sequence"));
            }
            units.push(payload.split_to(len));
        }
        Ok(units)
    }

    /// Decodes every message stored in a sparse group, skipping padding.
    pub fn sparse_messages(&self) -> Result<Vec<Bytes>, ShareError> {
        if let NamespaceGroup::Compact(_) = self {
            return Err(ShareError::InvalidEncoding("expected a sparse group"));
        }
        self.blobs()
            .into_iter()
            .filter(|sequence| !sequence[0].is_padding())
            .map(read_sequence)
            .collect()
    }
}

/// Joins the payloads of a sequence's shares and cuts off the zero padding.
///
/// The first share must open the sequence, and the shares must hold at least as many
/// payload bytes as it announces.
pub fn read_sequence(shares: &[Share]) -> Result<Bytes, ShareError> {
    let first = shares.first().ok_or(ShareError::InvalidEncoding("empty sequence"))?;
    let announced = first.sequence_length()? as usize;
    let mut payload = BytesMut::with_capacity(announced);
    for share in shares {
        let wanted = announced - payload.len();
        if wanted == 0 {
            break;
        }
        let data = share.data_ref();
        payload.extend_from_slice(&data[..wanted.min(data.len())]);
    }
    if payload.len() < announced {
        return Err(ShareError::InvalidEncoding(
            "sequence length exceeds the data in its shares",
        ));
    }
    Ok(payload.freeze())
}

/// Reads a square back into its transactions, evidence and messages.
///
/// Tail padding is skipped. Reserved namespaces other than transactions and evidence
/// are rejected.
pub fn parse_square(shares: &[Share]) -> Result<ParsedSquare, ShareError> {
    let mut parsed = ParsedSquare::default();
    for group in NamespaceGroup::group_square(shares) {
        let Some(namespace) = group.namespace() else {
            continue;
        };
        match namespace {
            TX_NAMESPACE => parsed.txs.extend(group.compact_units()?),
            EVIDENCE_NAMESPACE => parsed.evidence.extend(group.compact_units()?),
            TAIL_PADDING_NAMESPACE => {}
            ns if ns.is_reserved() => {
                return Err(ShareError::InvalidEncoding("unknown reserved namespace"))
            }
            ns => parsed.messages.extend(
                group
                    .sparse_messages()?
                    .into_iter()
                    .map(|message| (ns, message)),
            ),
        }
    }
    Ok(parsed)
}

/// The contents of a square, as recovered by [`parse_square`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSquare {
    pub txs: Vec<Bytes>,
    pub evidence: Vec<Bytes>,
    pub messages: Vec<(NamespaceId, Bytes)>,
}
