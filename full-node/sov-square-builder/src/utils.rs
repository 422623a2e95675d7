use bytes::Buf;
use prost::encoding::{decode_varint, encoded_len_varint};
use prost::DecodeError;
use sha2::{Digest, Sha256};

/// Read a varint. Returns the value (as a u64) and the number of bytes read
pub fn read_varint(mut bytes: impl Buf) -> Result<(u64, usize), DecodeError> {
    let original_len = bytes.remaining();
    let varint = decode_varint(&mut bytes)?;
    Ok((varint, original_len - bytes.remaining()))
}

/// The number of bytes needed to length-prefix a unit of `len` bytes
pub fn delim_len(len: usize) -> usize {
    encoded_len_varint(len as u64)
}

/// The length of a unit once it has been length-prefixed
pub fn delimited_len(len: usize) -> usize {
    len + delim_len(len)
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_lengths() {
        assert_eq!(delim_len(0), 1);
        assert_eq!(delim_len(127), 1);
        assert_eq!(delim_len(128), 2);
        assert_eq!(delim_len(16_383), 2);
        assert_eq!(delim_len(16_384), 3);
        assert_eq!(delimited_len(200), 202);
    }

    #[test]
    fn read_varint_reports_consumed_bytes() {
        let mut buf = Vec::new();
        prost::encoding::encode_varint(300, &mut buf);
        buf.extend_from_slice(&[1, 2, 3]);
        assert_eq!(read_varint(&buf[..]).unwrap(), (300, 2));
        assert!(read_varint(&[0xff, 0xff][..]).is_err());
    }
}
