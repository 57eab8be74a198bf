//! Signing and verification of component entries.
//!
//! Every entry is signed over `domain || bincode(payload)`. The domain tag keeps
//! a signature for one entry kind from being replayed as another.

use crate::error::CodecError;
use crate::types::{Hash, MemberId};
use blake3::Hasher;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Raw ed25519 signature bytes. Ordered byte-lexicographically, which is the
/// tie-break rule for equal-version conflicts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureBytes(pub [u8; 64]);

impl SignatureBytes {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Short content-derived tag used in summaries.
    pub fn fingerprint(&self) -> u64 {
        let hash = blake3::hash(&self.0);
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({})", hex::encode(&self.0[..6]))
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
        if buf.len() != 64 {
            return Err(serde::de::Error::custom("expected 64 signature bytes"));
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&buf);
        Ok(SignatureBytes(arr))
    }
}

/// Domain separation tags
pub mod domain {
    pub const CONFIGURATION: &[u8] = b"concord:configuration:";
    pub const MEMBER: &[u8] = b"concord:member:";
    pub const BAN: &[u8] = b"concord:ban:";
    pub const MEMBER_INFO: &[u8] = b"concord:member-info:";
    pub const MESSAGE: &[u8] = b"concord:message:";
}

/// Derive a signing key from a 32-byte seed.
pub fn signing_key_from_seed(seed: [u8; 32]) -> SigningKey {
    SigningKey::from_bytes(&seed)
}

/// Member identity for a signing key.
pub fn member_id(key: &SigningKey) -> MemberId {
    MemberId(key.verifying_key().to_bytes())
}

fn signing_bytes<T: Serialize>(domain: &[u8], payload: &T) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(payload).map_err(|e| CodecError::Encode {
        what: "signed payload",
        reason: e.to_string(),
    })?;
    let mut bytes = Vec::with_capacity(domain.len() + body.len());
    bytes.extend_from_slice(domain);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Sign a payload under a domain tag.
pub fn sign<T: Serialize>(
    key: &SigningKey,
    domain: &[u8],
    payload: &T,
) -> Result<SignatureBytes, CodecError> {
    let bytes = signing_bytes(domain, payload)?;
    Ok(SignatureBytes(key.sign(&bytes).to_bytes()))
}

/// Verify a payload signature. A malformed key or payload is a failed
/// verification, never a panic.
pub fn verify<T: Serialize>(
    signer: &MemberId,
    domain: &[u8],
    payload: &T,
    signature: &SignatureBytes,
) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(signer.as_bytes()) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let bytes = match signing_bytes(domain, payload) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(signature.as_bytes());
    verifying_key.verify(&bytes, &signature).is_ok()
}

/// Compute the identity hash of a logic definition
pub fn compute_code_hash(code: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"code:");
    hasher.update(code);
    *hasher.finalize().as_bytes()
}

/// Compute a generic hash of arbitrary data
pub fn compute_hash(data: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
