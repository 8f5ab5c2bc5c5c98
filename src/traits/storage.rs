//! Block storage trait definition

use crate::calendar::{Block, BlockType};
use crate::error::ServerResult;

/// Persistent storage for calendar blocks
///
/// Keyed by height. Implementations must reject an append whose height is
/// not exactly one above the current tip, whose `prev_hash` does not match the
/// tip's hash, or whose `hash`/`prev_hash` collides with an existing block;
/// this is the last-resort guard behind the distributed lock.
///
/// Reads never wait on in-flight writes.
pub trait BlockStore: Send + Sync {
    /// Highest block, or `None` for an empty ledger
    fn latest(&self) -> ServerResult<Option<Block>>;

    /// Block at an exact height
    fn by_height(&self, height: u64) -> ServerResult<Option<Block>>;

    /// Blocks with `from <= height <= to`, ordered by height
    fn range(&self, from: u64, to: u64) -> ServerResult<Vec<Block>>;

    /// Highest block of the given type
    fn latest_of_type(&self, block_type: BlockType) -> ServerResult<Option<Block>>;

    /// Blocks of the given type with height strictly greater than `height`, ordered by height
    fn of_type_after(&self, block_type: BlockType, height: Option<u64>)
        -> ServerResult<Vec<Block>>;

    /// Number of blocks stored
    fn count(&self) -> ServerResult<u64>;

    /// Persist a new tip block
    ///
    /// # Errors
    /// * `ServerError::ChainIntegrity` - height, hash or link conflict
    fn append(&self, block: &Block) -> ServerResult<()>;
}
