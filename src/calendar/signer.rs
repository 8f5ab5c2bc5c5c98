//! Block signing

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{ServerError, ServerResult};

/// Block signer wrapper
///
/// Wraps an Ed25519 signing key. Signatures are rendered as
/// `<key_id>:<base64 signature>` where `key_id` is the first 4 bytes of
/// SHA-256 of the verifying key, hex encoded.
#[derive(Clone)]
pub struct BlockSigner {
    signing_key: SigningKey,
    key_id: String,
}

impl BlockSigner {
    /// Create a new block signer from Ed25519 signing key
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        let key_id = compute_key_id(&signing_key.verifying_key());
        Self {
            signing_key,
            key_id,
        }
    }

    /// Create signer from raw 32-byte seed
    #[must_use]
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(seed))
    }

    /// Create signer from file containing Ed25519 seed
    ///
    /// # Errors
    /// Returns error if file cannot be read or seed is not 32 bytes
    pub fn from_file(path: &str) -> Result<Self, std::io::Error> {
        let seed_bytes = std::fs::read(path)?;
        if seed_bytes.len() != 32 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("signing key must be 32 bytes, got {}", seed_bytes.len()),
            ));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&seed_bytes);
        Ok(Self::from_bytes(&seed))
    }

    /// Generate a fresh random key (standalone runs without a key file)
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Short key identifier embedded in every signature
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Key that verifies this signer's signatures
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a hex-encoded block hash
    pub fn sign_hash(&self, hash_hex: &str) -> ServerResult<String> {
        let hash = hex::decode(hash_hex)
            .map_err(|e| ServerError::Computation(format!("cannot sign malformed hash: {}", e)))?;
        let signature = self.signing_key.sign(&hash);
        Ok(format!(
            "{}:{}",
            self.key_id,
            base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
        ))
    }
}

impl std::fmt::Debug for BlockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Key identifier for a verifying key
pub fn compute_key_id(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..4])
}

/// Verify a `<key_id>:<base64>` signature over a hex-encoded hash
pub fn verify_hash_signature(key: &VerifyingKey, hash_hex: &str, sig: &str) -> ServerResult<()> {
    let (key_id, encoded) = sig
        .split_once(':')
        .ok_or_else(|| ServerError::Validation("signature missing key id".into()))?;

    if key_id != compute_key_id(key) {
        return Err(ServerError::Validation(format!(
            "signature key id {} does not match verifying key",
            key_id
        )));
    }

    let raw = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let signature = Signature::from_slice(&raw)
        .map_err(|e| ServerError::Validation(format!("malformed signature: {}", e)))?;
    let hash = hex::decode(hash_hex)?;

    key.verify(&hash, &signature)
        .map_err(|_| ServerError::Validation("signature does not verify".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_sign_and_verify() {
        let signer = BlockSigner::from_bytes(&[7u8; 32]);
        let sig = signer.sign_hash(HASH).unwrap();

        assert!(sig.starts_with(&format!("{}:", signer.key_id())));
        verify_hash_signature(&signer.verifying_key(), HASH, &sig).unwrap();
    }

    #[test]
    fn test_signature_is_deterministic() {
        let signer = BlockSigner::from_bytes(&[7u8; 32]);
        assert_eq!(signer.sign_hash(HASH).unwrap(), signer.sign_hash(HASH).unwrap());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signer = BlockSigner::from_bytes(&[7u8; 32]);
        let other = BlockSigner::from_bytes(&[8u8; 32]);
        let sig = signer.sign_hash(HASH).unwrap();

        assert!(verify_hash_signature(&other.verifying_key(), HASH, &sig).is_err());
    }

    #[test]
    fn test_tampered_hash_rejected() {
        let signer = BlockSigner::from_bytes(&[7u8; 32]);
        let sig = signer.sign_hash(HASH).unwrap();
        let tampered = HASH.replace("ba78", "0000");

        assert!(verify_hash_signature(&signer.verifying_key(), &tampered, &sig).is_err());
    }

    #[test]
    fn test_sign_malformed_hash_is_computation_error() {
        let signer = BlockSigner::from_bytes(&[7u8; 32]);
        assert!(matches!(
            signer.sign_hash("not-hex"),
            Err(ServerError::Computation(_))
        ));
    }

    #[test]
    fn test_from_file_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        std::fs::write(&path, [1u8; 16]).unwrap();

        assert!(BlockSigner::from_file(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_from_file_reads_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        std::fs::write(&path, [7u8; 32]).unwrap();

        let signer = BlockSigner::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(signer.key_id(), BlockSigner::from_bytes(&[7u8; 32]).key_id());
    }
}
