// File: src/aggregation/leaf.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};
use crate::merkle::HashOp;

/// Length of a client leaf hash in bytes
pub const LEAF_HASH_LEN: usize = 32;

/// One client-submitted hash and its correlation id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub hash_id: Uuid,
    /// Hex encoded, `LEAF_HASH_LEN` bytes
    pub hash: String,
}

impl Leaf {
    pub fn new(hash_id: Uuid, hash: [u8; LEAF_HASH_LEN]) -> Self {
        Self {
            hash_id,
            hash: hex::encode(hash),
        }
    }

    /// Decoded hash bytes
    ///
    /// # Errors
    /// * `ServerError::InvalidHash` - not hex, or not `LEAF_HASH_LEN` bytes
    pub fn hash_bytes(&self) -> ServerResult<[u8; LEAF_HASH_LEN]> {
        let bytes = hex::decode(&self.hash)?;
        bytes.try_into().map_err(|b: Vec<u8>| {
            ServerError::InvalidHash(format!(
                "leaf {} hash is {} bytes, expected {}",
                self.hash_id,
                b.len(),
                LEAF_HASH_LEN
            ))
        })
    }

    /// Literal binding the correlation id into the tree node
    pub fn node_prefix(&self) -> String {
        format!("hash_id:{}", self.hash_id)
    }

    /// Tree node `SHA-256("hash_id:<uuid>" ‖ hash)`
    pub fn node(&self) -> ServerResult<[u8; 32]> {
        let hash = self.hash_bytes()?;
        Ok(HashOp::Sha256.combine(self.node_prefix().as_bytes(), &hash))
    }
}
