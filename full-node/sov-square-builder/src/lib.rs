#![doc = include_str!("../README.md")]

pub mod builder;
pub mod config;
mod diagnostics;
pub mod estimate;
pub mod layout;
pub mod malleate;
pub mod namespace;
pub mod parser;
pub mod pfd;
pub mod prune;
pub mod share_commit;
pub mod shares;
pub mod split;
mod utils;

pub use builder::{BlockSquare, ConstructionError, SquareBuilder};
pub use config::{ConfigError, SquareConfig};
pub use diagnostics::{Diagnostics, Rejected, RejectionReason};
pub use malleate::{MalleationError, PlacedMessage};
pub use namespace::NamespaceId;
pub use parser::{ParseError, ParsedTx};
pub use shares::{parse_square, ParsedSquare, Share};
