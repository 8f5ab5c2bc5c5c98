//! Calendar ledger
//!
//! An append-only, hash-linked, signed ledger of blocks. The state machine
//! by block type is: one `genesis`, then repeating `cal` blocks interleaved
//! with `nist` blocks, periodic `btc-anchor`/`eth-anchor` rollups, and
//! externally triggered `btc-confirm`/`eth-confirm` blocks.

pub mod block;
pub mod chain;
pub mod signer;

pub use block::{Block, BlockHeader, BlockType, BLOCK_VERSION, ZERO_HASH_HEX};
pub use chain::CalendarChain;
pub use signer::BlockSigner;
