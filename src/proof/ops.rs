//! Proof operation wire format

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::merkle::HashOp;

/// Where a proof path ends and how to verify it externally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorDescriptor {
    /// Anchor kind: `"cal"`, `"btc"` or `"eth"`
    #[serde(rename = "type")]
    pub anchor_type: String,

    /// Identifier within the anchor kind (block height, chain height)
    pub anchor_id: String,

    /// URIs whose content should equal the running value
    pub uris: Vec<String>,
}

/// A single proof operation
///
/// Serializes as exactly one of `{"l": <hex>}`, `{"r": <hex>}`,
/// `{"op": <name>}` or `{"anchors": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofOp {
    /// Prepend a literal to the running value
    #[serde(rename = "l")]
    Left(String),

    /// Append a literal to the running value
    #[serde(rename = "r")]
    Right(String),

    /// Hash the running value
    #[serde(rename = "op")]
    Op(HashOp),

    /// Terminal anchor marker
    #[serde(rename = "anchors")]
    Anchors(Vec<AnchorDescriptor>),
}

impl ProofOp {
    /// Literal operand on the left
    pub fn left(bytes: impl AsRef<[u8]>) -> Self {
        ProofOp::Left(hex::encode(bytes))
    }

    /// Literal operand on the right
    pub fn right(bytes: impl AsRef<[u8]>) -> Self {
        ProofOp::Right(hex::encode(bytes))
    }
}

/// Ordered proof operations for one tier (or several, once concatenated)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofSegment {
    ops: Vec<ProofOp>,
}

impl ProofSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<ProofOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[ProofOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<ProofOp> {
        self.ops
    }

    pub fn push(&mut self, op: ProofOp) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, other: ProofSegment) {
        self.ops.extend(other.ops);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Anchor descriptors carried by this segment, in order
    pub fn anchors(&self) -> impl Iterator<Item = &AnchorDescriptor> {
        self.ops.iter().flat_map(|op| match op {
            ProofOp::Anchors(a) => a.as_slice(),
            _ => &[] as &[AnchorDescriptor],
        })
    }

    /// Run the ops over `start` and return the final running value
    ///
    /// Literals concatenate onto the running value, hash ops replace it with
    /// its digest, and anchor markers leave it unchanged.
    pub fn evaluate(&self, start: &[u8]) -> ServerResult<Vec<u8>> {
        let mut running = start.to_vec();
        for op in &self.ops {
            match op {
                ProofOp::Left(lit) => {
                    let mut next = decode_literal(lit)?;
                    next.extend_from_slice(&running);
                    running = next;
                }
                ProofOp::Right(lit) => running.extend(decode_literal(lit)?),
                ProofOp::Op(hash_op) => running = hash_op.digest(&running).to_vec(),
                ProofOp::Anchors(_) => {}
            }
        }
        Ok(running)
    }
}

impl From<Vec<ProofOp>> for ProofSegment {
    fn from(ops: Vec<ProofOp>) -> Self {
        Self::from_ops(ops)
    }
}

fn decode_literal(lit: &str) -> ServerResult<Vec<u8>> {
    hex::decode(lit).map_err(|e| ServerError::InvalidHash(format!("proof literal '{}': {}", lit, e)))
}
