// File: src/storage/sqlite/convert.rs

use crate::calendar::{Block, BlockType};
use rusqlite::Row;

/// Column list matching `row_to_block`
pub(crate) const BLOCK_COLUMNS: &str =
    "height, time, version, stack_id, block_type, data_id, data_val, prev_hash, hash, sig";

/// Convert a `blocks` row to a `Block`
pub(crate) fn row_to_block(row: &Row) -> rusqlite::Result<Block> {
    let height: i64 = row.get(0)?;
    let type_str: String = row.get(4)?;
    let block_type: BlockType = type_str.parse().map_err(|e: crate::error::ServerError| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Block {
        height: height as u64,
        time: row.get(1)?,
        version: row.get(2)?,
        stack_id: row.get(3)?,
        block_type,
        data_id: row.get(5)?,
        data_val: row.get(6)?,
        prev_hash: row.get(7)?,
        hash: row.get(8)?,
        sig: row.get(9)?,
    })
}
