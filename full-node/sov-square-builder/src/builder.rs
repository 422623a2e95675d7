use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SquareConfig};
use crate::diagnostics::{Diagnostics, Rejected, RejectionReason};
use crate::estimate::estimate_square_size;
use crate::layout::assemble;
use crate::malleate::{malleate_txs, PlacedMessage};
use crate::parser::{parse_txs, ParsedTx};
use crate::prune::{prune, Pruned};
use crate::share_commit::{hash_roots, nmt_root, CommitmentError, NamespacedHash};
use crate::shares::Share;

/// Errors that prevent a square from being built at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Content needs {required} shares but the square only holds {capacity}")]
    CapacityOverflow { required: usize, capacity: usize },
    #[error("Message of tx #{tx_index} was expected at share {expected} but landed at {actual}")]
    LayoutMismatch {
        tx_index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Square size didn't settle after {iterations} iterations")]
    FixedPointNotReached { iterations: usize },
}

/// A fully laid out block square.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSquare {
    pub square_size: usize,
    /// Exactly `square_size * square_size` shares, row by row
    pub shares: Vec<Share>,
    /// Transactions as included in the block, plain ones unchanged and blob-carrying ones
    /// malleated
    pub txs: Vec<Bytes>,
    pub messages: Vec<PlacedMessage>,
    /// Input positions of the transactions in `txs`
    pub included: Vec<usize>,
    pub diagnostics: Diagnostics,
}

impl BlockSquare {
    pub fn rows(&self) -> impl Iterator<Item = &[Share]> {
        self.shares.chunks(self.square_size)
    }

    /// Namespaced merkle roots of every row of the square
    pub fn row_roots(&self) -> Result<Vec<NamespacedHash>, CommitmentError> {
        self.rows().map(nmt_root).collect()
    }

    /// Commits to the whole square through its row roots. Two nodes that built the same
    /// square get the same root.
    pub fn data_root(&self) -> Result<[u8; 32], CommitmentError> {
        Ok(hash_roots(&self.row_roots()?))
    }
}

/// Builds block squares out of priority-ordered transactions.
///
/// The square size and the malleated transactions depend on each other, so the builder
/// iterates: estimate a size, malleate for it, and start over whenever content has to be
/// dropped. Every round that doesn't finish removes at least one transaction, so the loop is
/// bounded by the number of transactions.
#[derive(Debug, Clone)]
pub struct SquareBuilder {
    config: SquareConfig,
}

impl SquareBuilder {
    pub fn new(config: SquareConfig) -> Result<Self, ConstructionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SquareConfig {
        &self.config
    }

    /// Builds the square for `raw_txs`, highest priority first, and the block's evidence.
    pub fn build<T: Into<Bytes>>(
        &self,
        raw_txs: impl IntoIterator<Item = T>,
        evidence: &[Bytes],
    ) -> Result<BlockSquare, ConstructionError> {
        let parsed = parse_txs(raw_txs, &self.config);
        let mut diagnostics = Diagnostics {
            rejected: parsed.rejected,
        };
        let mut content = parsed.txs;
        let max_iterations = content.len() + 1;

        for iteration in 0..max_iterations {
            let estimate = estimate_square_size(&content, evidence, &self.config);
            debug!(
                iteration,
                square_size = estimate.square_size,
                shares_used = estimate.shares_used,
                overflow = estimate.overflow,
                "Estimated square size"
            );

            if estimate.overflow > 0 {
                let Pruned { kept, removed } =
                    prune(content, evidence, estimate.square_size, &self.config)?;
                diagnostics
                    .rejected
                    .extend(removed.iter().map(|tx| Rejected {
                        index: tx.index,
                        tx_hash: tx.hash(),
                        reason: RejectionReason::Pruned {
                            square_size: estimate.square_size,
                        },
                    }));
                content = kept;
                continue;
            }

            let malleated = malleate_txs(&content, evidence, estimate.square_size, &self.config);
            if !malleated.rejected.is_empty() {
                content.retain(|tx| {
                    !malleated
                        .rejected
                        .iter()
                        .any(|rejected| rejected.index == tx.index)
                });
                diagnostics.rejected.extend(malleated.rejected);
                continue;
            }

            let shares = assemble(
                estimate.square_size,
                &malleated.txs,
                &malleated.messages,
                evidence,
                &self.config,
            )?;
            info!(
                square_size = estimate.square_size,
                txs = malleated.txs.len(),
                messages = malleated.messages.len(),
                dropped = diagnostics.rejected.len(),
                "Built block square"
            );
            return Ok(BlockSquare {
                square_size: estimate.square_size,
                shares,
                txs: malleated.txs,
                messages: malleated.messages,
                included: content.iter().map(|tx: &ParsedTx| tx.index).collect(),
                diagnostics,
            });
        }

        warn!(iterations = max_iterations, "Square construction didn't converge");
        Err(ConstructionError::FixedPointNotReached {
            iterations: max_iterations,
        })
    }
}
