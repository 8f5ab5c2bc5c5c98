// File: src/storage/sqlite/blocks.rs

use super::convert::{row_to_block, BLOCK_COLUMNS};
use super::store::SqliteBlockStore;
use crate::calendar::{Block, BlockType, ZERO_HASH_HEX};
use crate::error::{ServerError, ServerResult};
use crate::traits::BlockStore;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

impl BlockStore for SqliteBlockStore {
    fn latest(&self) -> ServerResult<Option<Block>> {
        let conn = self.read_conn()?;
        let block = conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY height DESC LIMIT 1"),
                [],
                row_to_block,
            )
            .optional()?;
        Ok(block)
    }

    fn by_height(&self, height: u64) -> ServerResult<Option<Block>> {
        let conn = self.read_conn()?;
        let block = conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE height = ?1"),
                params![height as i64],
                row_to_block,
            )
            .optional()?;
        Ok(block)
    }

    fn range(&self, from: u64, to: u64) -> ServerResult<Vec<Block>> {
        if from > to {
            return Ok(vec![]);
        }
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE height >= ?1 AND height <= ?2 ORDER BY height"
        ))?;
        let rows = stmt.query_map(params![from as i64, to.min(i64::MAX as u64) as i64], row_to_block)?;
        rows.map(|r| r.map_err(ServerError::from)).collect()
    }

    fn latest_of_type(&self, block_type: BlockType) -> ServerResult<Option<Block>> {
        let conn = self.read_conn()?;
        let block = conn
            .query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks WHERE block_type = ?1 ORDER BY height DESC LIMIT 1"
                ),
                params![block_type.as_str()],
                row_to_block,
            )
            .optional()?;
        Ok(block)
    }

    fn of_type_after(&self, block_type: BlockType, height: Option<u64>) -> ServerResult<Vec<Block>> {
        // -1 selects every block when no lower bound is given
        let lower = height.map(|h| h as i64).unwrap_or(-1);
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE block_type = ?1 AND height > ?2 ORDER BY height"
        ))?;
        let rows = stmt.query_map(params![block_type.as_str(), lower], row_to_block)?;
        rows.map(|r| r.map_err(ServerError::from)).collect()
    }

    fn count(&self) -> ServerResult<u64> {
        let conn = self.read_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn append(&self, block: &Block) -> ServerResult<()> {
        let mut conn = self.write_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let tip: Option<(i64, String)> = tx
            .query_row(
                "SELECT height, hash FROM blocks ORDER BY height DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match tip {
            None => {
                if block.height != 0 || block.prev_hash != ZERO_HASH_HEX {
                    return Err(ServerError::ChainIntegrity(format!(
                        "ledger is empty, refusing block at height {}",
                        block.height
                    )));
                }
            }
            Some((tip_height, tip_hash)) => {
                if block.height as i64 != tip_height + 1 {
                    return Err(ServerError::ChainIntegrity(format!(
                        "height {} does not follow tip {}",
                        block.height, tip_height
                    )));
                }
                if block.prev_hash != tip_hash {
                    return Err(ServerError::ChainIntegrity(format!(
                        "prev_hash of block {} does not match tip hash",
                        block.height
                    )));
                }
            }
        }

        tx.execute(
            "INSERT INTO blocks (height, time, version, stack_id, block_type, data_id, data_val, prev_hash, hash, sig)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                block.height as i64,
                block.time,
                block.version,
                block.stack_id,
                block.block_type.as_str(),
                block.data_id,
                block.data_val,
                block.prev_hash,
                block.hash,
                block.sig,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}
