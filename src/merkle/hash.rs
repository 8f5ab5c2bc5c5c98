//! Hash operations shared by trees and proof paths

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash operation applied when combining operands
///
/// Wire names match the proof op format: `"sha-256"` and `"sha-256-x2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashOp {
    /// Single SHA-256
    #[serde(rename = "sha-256")]
    Sha256,

    /// SHA-256 applied twice (Bitcoin-style)
    #[serde(rename = "sha-256-x2")]
    Sha256x2,
}

impl HashOp {
    /// Wire name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            HashOp::Sha256 => "sha-256",
            HashOp::Sha256x2 => "sha-256-x2",
        }
    }

    /// Hash a single buffer
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        let once: [u8; 32] = Sha256::digest(data).into();
        match self {
            HashOp::Sha256 => once,
            HashOp::Sha256x2 => Sha256::digest(once).into(),
        }
    }

    /// Hash the concatenation `left ‖ right`
    pub fn combine(&self, left: &[u8], right: &[u8]) -> [u8; 32] {
        let mut buf = Vec::with_capacity(left.len() + right.len());
        buf.extend_from_slice(left);
        buf.extend_from_slice(right);
        self.digest(&buf)
    }
}

impl std::fmt::Display for HashOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
