//! Signing seam for accessor challenges
//!
//! The platform declares the full signing scheme inside each challenge
//! payload (hash method, key type, signature method, padding). The
//! implementation must honor those fields, not assume them, so the scheme
//! travels as data into an injected [`AccessorSigner`]. The workspace ships
//! an Ed25519 signer on the stack this repo already carries; other key
//! types plug in behind the same trait.

use crate::errors::{VeriflowError, VeriflowResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hash method declared by a signing challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashMethod {
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,
}

/// Key type declared by a signing challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA keypair.
    #[serde(rename = "RSA")]
    Rsa,
    /// Ed25519 keypair.
    #[serde(rename = "Ed25519")]
    Ed25519,
}

/// Signature method declared by a signing challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignMethod {
    /// RSA signature over a SHA-256 digest.
    #[serde(rename = "RSA-SHA256")]
    RsaSha256,
    /// Pure Ed25519.
    #[serde(rename = "Ed25519")]
    Ed25519,
}

/// The signing scheme a challenge asks for, carried verbatim from the
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningScheme {
    /// Hash method to apply to the message.
    pub hash_method: HashMethod,
    /// Key type of the stored accessor key.
    pub key_type: KeyType,
    /// Signature method to produce.
    pub sign_method: SignMethod,
    /// Padding scheme, where the signature method uses one
    /// (e.g. `"PKCS#1v1.5"` for RSA).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

/// Private accessor key material, stored opaquely and wiped on drop.
///
/// The registry never interprets this; only the injected signer does. For
/// the built-in Ed25519 signer the content is the base64-encoded 32-byte
/// seed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccessorKey(String);

impl AccessorKey {
    /// Wrap raw key material.
    pub fn new(material: impl Into<String>) -> Self {
        Self(material.into())
    }

    /// The raw key material, for signer implementations.
    pub fn material(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        write!(f, "AccessorKey(..)")
    }
}

/// A produced challenge signature, base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSignature(pub String);

impl ChallengeSignature {
    /// Encode raw signature bytes as the wire representation.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BASE64.encode(bytes))
    }

    /// The base64 signature string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pure signing function consumed by the ingress when answering a
/// challenge.
///
/// Implementations must honor every field of `scheme` and fail with
/// [`VeriflowError::Signing`] for schemes they cannot produce, rather than
/// silently substituting another one.
pub trait AccessorSigner: Send + Sync {
    /// Sign `message` with `key` under the declared `scheme`.
    fn sign(
        &self,
        scheme: &SigningScheme,
        key: &AccessorKey,
        message: &[u8],
    ) -> VeriflowResult<ChallengeSignature>;
}

/// Ed25519 signer over base64-seed accessor keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519AccessorSigner;

impl AccessorSigner for Ed25519AccessorSigner {
    fn sign(
        &self,
        scheme: &SigningScheme,
        key: &AccessorKey,
        message: &[u8],
    ) -> VeriflowResult<ChallengeSignature> {
        if scheme.key_type != KeyType::Ed25519 || scheme.sign_method != SignMethod::Ed25519 {
            return Err(VeriflowError::signing(format!(
                "unsupported scheme for Ed25519 signer: key_type={:?} sign_method={:?}",
                scheme.key_type, scheme.sign_method
            )));
        }
        if scheme.padding.is_some() {
            return Err(VeriflowError::signing("Ed25519 does not use padding"));
        }

        let seed = BASE64
            .decode(key.material())
            .map_err(|e| VeriflowError::signing(format!("accessor key is not base64: {e}")))?;
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| VeriflowError::signing("accessor key is not a 32-byte Ed25519 seed"))?;

        let signing_key = SigningKey::from_bytes(&seed);
        let signature = signing_key.sign(message);
        Ok(ChallengeSignature::from_bytes(&signature.to_bytes()))
    }
}
