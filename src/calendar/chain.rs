//! Hash-chained, signed calendar ledger

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;

use super::block::{Block, BlockHeader, BlockType, BLOCK_VERSION, ZERO_HASH_HEX};
use super::signer::BlockSigner;
use crate::error::{ServerError, ServerResult};
use crate::traits::BlockStore;

/// Append-only calendar ledger
///
/// Writes are not internally locked: callers serialize them through
/// `LockScheduler::write_ledger`. Every write re-reads the tip immediately
/// before linking to it, and the store rejects any write that lost a race.
///
/// All methods are synchronous SQLite work; async callers go through
/// [`blocking`](Self::blocking).
pub struct CalendarChain {
    store: Arc<dyn BlockStore>,
    signer: BlockSigner,
    stack_id: String,
}

impl CalendarChain {
    pub fn new(store: Arc<dyn BlockStore>, signer: BlockSigner, stack_id: impl Into<String>) -> Self {
        Self {
            store,
            signer,
            stack_id: stack_id.into(),
        }
    }

    /// Run ledger work on the blocking thread pool
    pub async fn blocking<T, F>(self: &Arc<Self>, work: F) -> ServerResult<T>
    where
        F: FnOnce(&CalendarChain) -> ServerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let chain = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(&chain))
            .await
            .map_err(|e| ServerError::Internal(format!("spawn_blocking failed: {}", e)))?
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    /// Write the genesis block if the ledger is empty
    ///
    /// Returns the existing genesis block when one is already present, so any
    /// replica may call this at startup.
    pub fn write_genesis(&self) -> ServerResult<Block> {
        if let Some(existing) = self.store.by_height(0)? {
            if existing.block_type != BlockType::Genesis {
                return Err(ServerError::ChainIntegrity(format!(
                    "block 0 has type {}, expected genesis",
                    existing.block_type
                )));
            }
            return Ok(existing);
        }

        let block = self.seal(0, BlockType::Genesis, "0", ZERO_HASH_HEX, ZERO_HASH_HEX)?;
        self.store.append(&block)?;

        tracing::info!(stack_id = %self.stack_id, hash = %block.hash, "Genesis block written");
        Ok(block)
    }

    /// Append a block linking to the current tip
    ///
    /// # Errors
    /// * `ServerError::ChainIntegrity` - no genesis yet, genesis type requested,
    ///   or the store rejected the link (an unguarded concurrent writer)
    /// * `ServerError::Computation` - signing failed
    pub fn write_block(
        &self,
        block_type: BlockType,
        data_id: &str,
        data_val: &str,
    ) -> ServerResult<Block> {
        if block_type == BlockType::Genesis {
            return Err(ServerError::ChainIntegrity(
                "genesis can only be written at height 0".into(),
            ));
        }

        // Re-read the tip right before linking; never cache it across writes
        let latest = self.store.latest()?.ok_or_else(|| {
            ServerError::ChainIntegrity(format!(
                "cannot write {} block: no genesis block exists",
                block_type
            ))
        })?;

        let block = self.seal(
            latest.height + 1,
            block_type,
            data_id,
            data_val,
            &latest.hash,
        )?;

        if let Err(e) = self.store.append(&block) {
            tracing::error!(
                height = block.height,
                block_type = %block_type,
                error = %e,
                "Block write rejected by store"
            );
            return Err(e);
        }

        tracing::info!(
            height = block.height,
            block_type = %block_type,
            data_id = %block.data_id,
            "Block written"
        );
        Ok(block)
    }

    fn seal(
        &self,
        height: u64,
        block_type: BlockType,
        data_id: &str,
        data_val: &str,
        prev_hash: &str,
    ) -> ServerResult<Block> {
        let time = chrono::Utc::now().timestamp_millis();
        let header = BlockHeader {
            height,
            time,
            version: BLOCK_VERSION,
            stack_id: &self.stack_id,
            block_type,
            data_id,
            data_val,
            prev_hash,
        };
        let hash = header.compute_hash()?;
        let sig = self.signer.sign_hash(&hash)?;

        Ok(Block {
            height,
            time,
            version: BLOCK_VERSION,
            stack_id: self.stack_id.clone(),
            block_type,
            data_id: data_id.to_string(),
            data_val: data_val.to_string(),
            prev_hash: prev_hash.to_string(),
            hash,
            sig,
        })
    }

    pub fn latest(&self) -> ServerResult<Option<Block>> {
        self.store.latest()
    }

    pub fn by_height(&self, height: u64) -> ServerResult<Option<Block>> {
        self.store.by_height(height)
    }

    pub fn range(&self, from: u64, to: u64) -> ServerResult<Vec<Block>> {
        self.store.range(from, to)
    }

    pub fn latest_of_type(&self, block_type: BlockType) -> ServerResult<Option<Block>> {
        self.store.latest_of_type(block_type)
    }

    /// `cal` blocks above `height` (all of them when `None`), ordered by height
    pub fn cal_blocks_after(&self, height: Option<u64>) -> ServerResult<Vec<Block>> {
        self.store.of_type_after(BlockType::Cal, height)
    }

    /// Audit blocks `from..=to`: hashes, links and signatures
    ///
    /// Returns the number of blocks verified.
    pub fn verify_chain(&self, from: u64, to: u64) -> ServerResult<u64> {
        let key = self.verifying_key();
        let blocks = self.store.range(from, to)?;

        let mut prev: Option<Block> = match from {
            0 => None,
            h => self.store.by_height(h - 1)?,
        };

        for block in &blocks {
            block.verify_hash()?;
            block.verify_signature(&key)?;

            match &prev {
                None => {
                    if block.height != 0
                        || block.block_type != BlockType::Genesis
                        || block.prev_hash != ZERO_HASH_HEX
                    {
                        return Err(ServerError::ChainIntegrity(format!(
                            "block {} is not a valid genesis block",
                            block.height
                        )));
                    }
                }
                Some(p) => {
                    if block.height != p.height + 1 || block.prev_hash != p.hash {
                        return Err(ServerError::ChainIntegrity(format!(
                            "block {} does not link to block {}",
                            block.height, p.height
                        )));
                    }
                }
            }
            prev = Some(block.clone());
        }

        Ok(blocks.len() as u64)
    }
}
