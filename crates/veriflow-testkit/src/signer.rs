//! Deterministic signer for tests
//!
//! Produces a stable fake signature from the key material and message, so
//! tests can assert on exact values without real key generation. Accepts
//! every declared scheme, unlike the production signers.

use sha2::{Digest, Sha256};
use veriflow_core::{
    AccessorKey, AccessorSigner, ChallengeSignature, SigningScheme, VeriflowResult,
};

/// Signer returning `hex(sha256(key material || '|' || message))`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAccessorSigner;

impl AccessorSigner for MockAccessorSigner {
    fn sign(
        &self,
        _scheme: &SigningScheme,
        key: &AccessorKey,
        message: &[u8],
    ) -> VeriflowResult<ChallengeSignature> {
        let mut hasher = Sha256::new();
        hasher.update(key.material().as_bytes());
        hasher.update(b"|");
        hasher.update(message);
        Ok(ChallengeSignature(hex::encode(hasher.finalize())))
    }
}

/// The signature [`MockAccessorSigner`] produces for this key and message.
pub fn mock_signature(key: &AccessorKey, message: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.material().as_bytes());
    hasher.update(b"|");
    hasher.update(message);
    hex::encode(hasher.finalize())
}
