use nmt_rs::simple_merkle::db::MemDb;
use nmt_rs::{NamespaceMerkleHasher, NamespaceMerkleTree, NamespacedSha2Hasher};
use tendermint::crypto::default::Sha256;
use tendermint::merkle::simple_hash_from_byte_vectors;

use crate::config::SquareConfig;
use crate::namespace::{NamespaceId, NAMESPACE_ID_LEN};
use crate::shares::Share;
use crate::split::split_message;

/// A node of a namespaced merkle tree over this crate's namespaces
pub type NamespacedHash = nmt_rs::NamespacedHash<NAMESPACE_ID_LEN>;

/// The namespaced merkle tree used for message commitments and row roots
pub type SquareNmt = NamespaceMerkleTree<
    MemDb<NamespacedHash>,
    NamespacedSha2Hasher<NAMESPACE_ID_LEN>,
    NAMESPACE_ID_LEN,
>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitmentError {
    #[error("Message of {shares} shares can't be committed to in a square of size {square_size}")]
    MessageTooLarge { shares: usize, square_size: usize },
    #[error("Namespaced merkle tree rejected a leaf: {0}")]
    OutOfOrder(&'static str),
}

/// Namespaced merkle root over `shares`, which must be in namespace order.
///
/// Parity shares don't widen the namespace range of the root.
pub fn nmt_root<'a>(
    shares: impl IntoIterator<Item = &'a Share>,
) -> Result<NamespacedHash, CommitmentError> {
    let mut tree = SquareNmt::with_hasher(NamespacedSha2Hasher::with_ignore_max_ns(true));
    for share in shares {
        tree.push_leaf(share.as_serialized(), share.namespace().into())
            .map_err(CommitmentError::OutOfOrder)?;
    }
    Ok(tree.root())
}

/// Tendermint simple merkle hash over serialized namespaced roots
pub fn hash_roots(roots: &[NamespacedHash]) -> [u8; 32] {
    let leaves: Vec<Vec<u8>> = roots.iter().map(|root| root.iter().collect()).collect();
    simple_hash_from_byte_vectors::<Sha256>(&leaves)
}

/// Commits to the shares of a single message, as they would be laid out in a square of
/// `square_size`.
///
/// The shares are cut into subtrees no wider than a row of the square, each subtree is
/// committed to with a namespaced merkle tree, and the subtree roots are hashed together.
pub fn create_commitment(
    square_size: usize,
    shares: &[Share],
) -> Result<[u8; 32], CommitmentError> {
    if shares.len() > (square_size * square_size).saturating_sub(1) {
        return Err(CommitmentError::MessageTooLarge {
            shares: shares.len(),
            square_size,
        });
    }

    let mut roots = Vec::new();
    let mut rest = shares;
    for width in subtree_widths(shares.len(), square_size) {
        let (subtree, tail) = rest.split_at(width);
        roots.push(nmt_root(subtree)?);
        rest = tail;
    }
    Ok(hash_roots(&roots))
}

/// Splits `message` into shares and commits to them for a square of `square_size`
pub fn message_commitment(
    namespace: NamespaceId,
    message: &[u8],
    square_size: usize,
    config: &SquareConfig,
) -> Result<[u8; 32], CommitmentError> {
    create_commitment(square_size, &split_message(namespace, message, config))
}

/// Commitments to `message` for every square size allowed by `config` that can hold it.
///
/// This is what a submitter attaches to a blob-carrying transaction, since it can't know
/// in advance which square size the block producer will pick.
pub fn commitments_for_all_sizes(
    namespace: NamespaceId,
    message: &[u8],
    config: &SquareConfig,
) -> Vec<(usize, [u8; 32])> {
    let shares = split_message(namespace, message, config);
    config
        .square_sizes()
        .filter_map(|square_size| {
            create_commitment(square_size, &shares)
                .ok()
                .map(|commitment| (square_size, commitment))
        })
        .collect()
}

/// Widths of the subtrees covering `count` leaves: full rows of `square_size` first, then
/// descending powers of two for the remainder.
fn subtree_widths(mut count: usize, square_size: usize) -> Vec<usize> {
    let mut widths = Vec::new();
    while count > 0 {
        let width = if count >= square_size {
            square_size
        } else {
            largest_power_of_two_in(count)
        };
        widths.push(width);
        count -= width;
    }
    widths
}

/// `num` must be non-zero
fn largest_power_of_two_in(num: usize) -> usize {
    1 << (usize::BITS - 1 - num.leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::PARITY_SHARES_NAMESPACE;
    use crate::split::padding_share;

    fn ns() -> NamespaceId {
        NamespaceId(*b"sov-test")
    }

    #[test]
    fn subtrees_fill_rows_then_shrink() {
        assert_eq!(subtree_widths(11, 4), vec![4, 4, 2, 1]);
        assert_eq!(subtree_widths(7, 8), vec![4, 2, 1]);
        assert_eq!(subtree_widths(16, 8), vec![8, 8]);
        assert_eq!(subtree_widths(0, 8), Vec::<usize>::new());
        assert_eq!(largest_power_of_two_in(1), 1);
        assert_eq!(largest_power_of_two_in(7), 4);
        assert_eq!(largest_power_of_two_in(8), 8);
    }

    #[test]
    fn commitment_depends_on_square_size() {
        let config = SquareConfig::default();
        // 17 shares: split differently by rows of 4, 8 and 16
        let message = vec![42u8; 2000];
        let at_8 = message_commitment(ns(), &message, 8, &config).unwrap();
        let at_16 = message_commitment(ns(), &message, 16, &config).unwrap();
        assert_ne!(at_8, at_16);
        assert_eq!(at_8, message_commitment(ns(), &message, 8, &config).unwrap());
    }

    #[test]
    fn commitment_depends_on_namespace_and_data() {
        let config = SquareConfig::default();
        let base = message_commitment(ns(), b"data", 4, &config).unwrap();
        let other_ns = NamespaceId(*b"sov-tes2");
        assert_ne!(base, message_commitment(other_ns, b"data", 4, &config).unwrap());
        assert_ne!(base, message_commitment(ns(), b"date", 4, &config).unwrap());
    }

    #[test]
    fn message_too_large_for_square() {
        let config = SquareConfig::default();
        // 4 shares don't fit next to anything else in a 2x2 square
        let message = vec![1u8; 400];
        assert_eq!(
            message_commitment(ns(), &message, 2, &config),
            Err(CommitmentError::MessageTooLarge {
                shares: 4,
                square_size: 2
            })
        );
        assert!(message_commitment(ns(), &message, 4, &config).is_ok());
    }

    #[test]
    fn all_sizes_skip_squares_that_are_too_small() {
        let config = SquareConfig::default();
        let commitments = commitments_for_all_sizes(ns(), &[1u8; 2000], &config);
        let sizes: Vec<usize> = commitments.iter().map(|(k, _)| *k).collect();
        assert_eq!(sizes, vec![8, 16, 32, 64, 128]);
        for (size, commitment) in commitments {
            assert_eq!(
                commitment,
                message_commitment(ns(), &[1u8; 2000], size, &config).unwrap()
            );
        }
    }

    #[test]
    fn nmt_root_tracks_namespace_range() {
        let config = SquareConfig::default();
        let low = NamespaceId([0, 0, 0, 0, 0, 0, 1, 0]);
        let high = NamespaceId([0, 0, 0, 0, 0, 0, 2, 0]);
        let mut shares = split_message(low, &[1u8; 200], &config);
        shares.extend(split_message(high, b"third", &config));

        let root = nmt_root(&shares).unwrap();
        assert_eq!(root.min_namespace(), nmt_rs::NamespaceId::from(low));
        assert_eq!(root.max_namespace(), nmt_rs::NamespaceId::from(high));
        assert_eq!(root, nmt_root(&shares).unwrap());

        shares.reverse();
        assert!(matches!(
            nmt_root(&shares),
            Err(CommitmentError::OutOfOrder(_))
        ));
    }

    #[test]
    fn parity_shares_do_not_extend_range() {
        let config = SquareConfig::default();
        let mut shares = split_message(ns(), b"data", &config);
        shares.push(padding_share(PARITY_SHARES_NAMESPACE, &config));
        assert_eq!(
            nmt_root(&shares).unwrap().max_namespace(),
            nmt_rs::NamespaceId::from(ns())
        );
    }

    #[test]
    fn hashed_roots_depend_on_order() {
        let config = SquareConfig::default();
        let first = nmt_root(&split_message(ns(), b"first", &config)).unwrap();
        let second = nmt_root(&split_message(ns(), b"second", &config)).unwrap();
        let forward = hash_roots(&[first.clone(), second.clone()]);
        assert_ne!(forward, hash_roots(&[second, first.clone()]));
        assert_ne!(forward, hash_roots(&[first]));
    }
}
