//! Anchoring of calendar rollups into external blockchains

mod chain;
mod config;
mod confirmation;
mod coordinator;

pub use chain::AnchorChain;
pub use config::{AnchorConfig, ChainAnchorConfig};
pub use confirmation::ChainConfirmation;
pub use coordinator::{AnchoringCoordinator, RollupOutcome};
