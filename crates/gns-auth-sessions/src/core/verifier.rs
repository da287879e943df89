//! Pairing signatures
//!
//! The approver proves possession of its identity key by signing the
//! canonical JSON of `{action, challenge, publicKey, sessionId}`. The
//! public key inside the payload is always lowercase hex.

use gns_crypto_core::{canonicalize, CryptoError};
use serde_json::json;

/// Action named in a pairing signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingAction {
    Approve,
    Reject,
}

impl PairingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairingAction::Approve => "approve",
            PairingAction::Reject => "reject",
        }
    }
}

/// Exact bytes the approver signs.
pub fn pairing_signing_payload(
    action: PairingAction,
    session_id: &str,
    challenge: &str,
    public_key: &str,
) -> String {
    canonicalize(&json!({
        "action": action.as_str(),
        "challenge": challenge,
        "publicKey": public_key.trim().to_lowercase(),
        "sessionId": session_id,
    }))
}

/// Signature verification collaborator of the engine.
pub trait SignatureVerifier: Send + Sync {
    /// Syntactic check of a public key.
    fn is_valid_public_key(&self, public_key: &str) -> bool;

    /// `Ok(false)` on a well-formed signature that does not match,
    /// `Err` when the key or signature cannot be decoded.
    fn verify(
        &self,
        public_key: &str,
        message: &[u8],
        signature: &str,
    ) -> Result<bool, CryptoError>;
}

/// Ed25519 verification backed by `gns-crypto-core`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn is_valid_public_key(&self, public_key: &str) -> bool {
        let key = public_key.trim();
        key.len() == 64 && gns_crypto_core::is_valid_public_key(key)
    }

    fn verify(
        &self,
        public_key: &str,
        message: &[u8],
        signature: &str,
    ) -> Result<bool, CryptoError> {
        gns_crypto_core::verify_signature(public_key.trim(), message, signature)
    }
}
