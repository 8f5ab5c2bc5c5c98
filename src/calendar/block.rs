//! Calendar block record and hash derivation

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::signer::verify_hash_signature;
use crate::error::{ServerError, ServerResult};

/// All-zero sentinel used as genesis `prev_hash` and `data_val`
pub const ZERO_HASH_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Current block format version
pub const BLOCK_VERSION: u32 = 1;

/// Block type
///
/// Wire and storage form is the kebab-case tag (`"btc-anchor"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    #[serde(rename = "genesis")]
    Genesis,
    #[serde(rename = "cal")]
    Cal,
    #[serde(rename = "nist")]
    Nist,
    #[serde(rename = "btc-anchor")]
    BtcAnchor,
    #[serde(rename = "btc-confirm")]
    BtcConfirm,
    #[serde(rename = "eth-anchor")]
    EthAnchor,
    #[serde(rename = "eth-confirm")]
    EthConfirm,
}

impl BlockType {
    pub const ALL: [BlockType; 7] = [
        BlockType::Genesis,
        BlockType::Cal,
        BlockType::Nist,
        BlockType::BtcAnchor,
        BlockType::BtcConfirm,
        BlockType::EthAnchor,
        BlockType::EthConfirm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Genesis => "genesis",
            BlockType::Cal => "cal",
            BlockType::Nist => "nist",
            BlockType::BtcAnchor => "btc-anchor",
            BlockType::BtcConfirm => "btc-confirm",
            BlockType::EthAnchor => "eth-anchor",
            BlockType::EthConfirm => "eth-confirm",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BlockType {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ServerError::Validation(format!("unknown block type: {}", s)))
    }
}

/// One entry of the calendar ledger
///
/// Immutable once written. `hash` is a pure function of the other fields
/// except `sig`, and `sig` is a detached signature over `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    /// Milliseconds since Unix epoch
    pub time: i64,
    pub version: u32,
    pub stack_id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub data_id: String,
    pub data_val: String,
    pub prev_hash: String,
    pub hash: String,
    pub sig: String,
}

/// Fields needed to derive a block hash
#[derive(Debug, Clone)]
pub struct BlockHeader<'a> {
    pub height: u64,
    pub time: i64,
    pub version: u32,
    pub stack_id: &'a str,
    pub block_type: BlockType,
    pub data_id: &'a str,
    pub data_val: &'a str,
    pub prev_hash: &'a str,
}

impl BlockHeader<'_> {
    /// UTF-8 prefix `height:time:version:stack_id:type:data_id`
    pub fn prefix(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.height, self.time, self.version, self.stack_id, self.block_type, self.data_id
        )
    }

    /// `SHA-256(prefix ‖ decode(data_val) ‖ hexDecode(prev_hash))`, hex encoded
    pub fn compute_hash(&self) -> ServerResult<String> {
        let prev = hex::decode(self.prev_hash).map_err(|e| {
            ServerError::ChainIntegrity(format!("prev_hash is not hex at height {}: {}", self.height, e))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(self.prefix().as_bytes());
        hasher.update(decode_data_val(self.data_val));
        hasher.update(&prev);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Bytes of a `data_val` as they enter the block hash
///
/// Hex values (Merkle roots) are decoded; anything else, such as a NIST
/// `timestamp:seed` value, is taken as UTF-8.
pub fn decode_data_val(data_val: &str) -> Vec<u8> {
    match hex::decode(data_val) {
        Ok(bytes) if !data_val.is_empty() => bytes,
        _ => data_val.as_bytes().to_vec(),
    }
}

impl Block {
    pub fn header(&self) -> BlockHeader<'_> {
        BlockHeader {
            height: self.height,
            time: self.time,
            version: self.version,
            stack_id: &self.stack_id,
            block_type: self.block_type,
            data_id: &self.data_id,
            data_val: &self.data_val,
            prev_hash: &self.prev_hash,
        }
    }

    /// Hash prefix string for this block
    pub fn hash_prefix(&self) -> String {
        self.header().prefix()
    }

    /// Re-derive the hash from the other fields
    pub fn compute_hash(&self) -> ServerResult<String> {
        self.header().compute_hash()
    }

    /// Check the stored hash against the re-derived one
    pub fn verify_hash(&self) -> ServerResult<()> {
        let computed = self.compute_hash()?;
        if computed != self.hash {
            return Err(ServerError::ChainIntegrity(format!(
                "block {} hash mismatch: stored {}, computed {}",
                self.height, self.hash, computed
            )));
        }
        Ok(())
    }

    /// Check `sig` against the given verifying key
    pub fn verify_signature(&self, key: &VerifyingKey) -> ServerResult<()> {
        verify_hash_signature(key, &self.hash, &self.sig).map_err(|e| {
            ServerError::ChainIntegrity(format!("block {} signature invalid: {}", self.height, e))
        })
    }

    /// Raw bytes of `data_val` as they entered the hash
    pub fn data_val_bytes(&self) -> Vec<u8> {
        decode_data_val(&self.data_val)
    }

    /// Raw bytes of the block hash
    pub fn hash_bytes(&self) -> ServerResult<Vec<u8>> {
        Ok(hex::decode(&self.hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::signer::BlockSigner;

    fn header<'a>(data_val: &'a str, prev_hash: &'a str) -> BlockHeader<'a> {
        BlockHeader {
            height: 1,
            time: 1_700_000_000_000,
            version: BLOCK_VERSION,
            stack_id: "stack-a",
            block_type: BlockType::Cal,
            data_id: "0",
            data_val,
            prev_hash,
        }
    }

    #[test]
    fn test_block_type_round_trip_names() {
        for t in BlockType::ALL {
            assert_eq!(t.as_str().parse::<BlockType>().unwrap(), t);
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t));
        }
        assert!("btc".parse::<BlockType>().is_err());
    }

    #[test]
    fn test_prefix_format() {
        let h = header(ZERO_HASH_HEX, ZERO_HASH_HEX);
        assert_eq!(h.prefix(), "1:1700000000000:1:stack-a:cal:0");
    }

    #[test]
    fn test_hash_matches_manual_derivation() {
        let root = "ab".repeat(32);
        let h = header(&root, ZERO_HASH_HEX);

        let mut buf = h.prefix().into_bytes();
        buf.extend(hex::decode(&root).unwrap());
        buf.extend([0u8; 32]);
        let expected = hex::encode(Sha256::digest(&buf));

        assert_eq!(h.compute_hash().unwrap(), expected);
    }

    #[test]
    fn test_non_hex_data_val_hashed_as_utf8() {
        assert_eq!(decode_data_val("1700000000:abcd"), b"1700000000:abcd".to_vec());
        assert_eq!(decode_data_val("abcd"), vec![0xab, 0xcd]);
        assert_eq!(decode_data_val(""), Vec::<u8>::new());
    }

    #[test]
    fn test_bad_prev_hash_is_integrity_error() {
        let h = header(ZERO_HASH_HEX, "xyz");
        assert!(matches!(
            h.compute_hash(),
            Err(ServerError::ChainIntegrity(_))
        ));
    }

    #[test]
    fn test_verify_hash_and_signature() {
        let signer = BlockSigner::from_bytes(&[3u8; 32]);
        let h = header(ZERO_HASH_HEX, ZERO_HASH_HEX);
        let hash = h.compute_hash().unwrap();
        let mut block = Block {
            height: h.height,
            time: h.time,
            version: h.version,
            stack_id: h.stack_id.to_string(),
            block_type: h.block_type,
            data_id: h.data_id.to_string(),
            data_val: h.data_val.to_string(),
            prev_hash: h.prev_hash.to_string(),
            sig: signer.sign_hash(&hash).unwrap(),
            hash,
        };

        block.verify_hash().unwrap();
        block.verify_signature(&signer.verifying_key()).unwrap();

        block.data_id = "1".into();
        assert!(block.verify_hash().is_err());
    }
}
