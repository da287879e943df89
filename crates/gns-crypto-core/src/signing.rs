//! Ed25519 identity keys and signature verification.
//!
//! Keys and signatures travel as lowercase hex (the GNS wire format). Mobile
//! clients built on platform crypto APIs sometimes emit base64 signatures, so
//! [`decode_signature`] accepts either encoding.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::CryptoError;
use crate::Result;

/// Size of Ed25519 public key in bytes
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;
/// Size of Ed25519 secret key in bytes
pub const ED25519_SECRET_KEY_SIZE: usize = 32;
/// Size of Ed25519 signature in bytes
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Secure wrapper for secret key bytes that zeroizes on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes([u8; ED25519_SECRET_KEY_SIZE]);

impl SecretKeyBytes {
    /// Create from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let mut bytes = hex::decode(hex_str.trim())?;
        if bytes.len() != ED25519_SECRET_KEY_SIZE {
            let got = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::InvalidKeyLength {
                expected: ED25519_SECRET_KEY_SIZE,
                got,
            });
        }
        let mut arr = [0u8; ED25519_SECRET_KEY_SIZE];
        arr.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(arr))
    }

    /// Convert to hex string (use sparingly - copies key material)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// An Ed25519 identity keypair.
///
/// Identity = public key. The approver side of browser pairing holds one of
/// these and signs the canonical pairing payload with it.
#[derive(Clone)]
pub struct GnsIdentity {
    signing_key: SigningKey,
}

impl GnsIdentity {
    /// Generate a fresh identity from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Load an identity from its 32-byte secret seed (hex).
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let secret = SecretKeyBytes::from_hex(secret_hex)?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret.0),
        })
    }

    /// The secret seed as hex.
    pub fn secret_key(&self) -> SecretKeyBytes {
        SecretKeyBytes(self.signing_key.to_bytes())
    }

    /// Public key as lowercase hex (64 chars).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign raw bytes, returning the signature as hex (128 chars).
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a UTF-8 string (e.g. a canonical JSON payload).
    pub fn sign_string(&self, message: &str) -> String {
        self.sign(message.as_bytes())
    }
}

impl std::fmt::Debug for GnsIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GnsIdentity")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parse a hex-encoded Ed25519 public key.
///
/// Fails on wrong length, non-hex input, or a byte string that is not a
/// valid curve point.
pub fn parse_public_key(public_key_hex: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(public_key_hex.trim())?;
    let arr: [u8; ED25519_PUBLIC_KEY_SIZE] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: ED25519_PUBLIC_KEY_SIZE,
                got: bytes.len(),
            })?;
    Ok(VerifyingKey::from_bytes(&arr)?)
}

/// Whether `public_key_hex` is a syntactically valid Ed25519 public key.
pub fn is_valid_public_key(public_key_hex: &str) -> bool {
    parse_public_key(public_key_hex).is_ok()
}

/// Decode a signature given as hex (128 chars) or standard base64.
pub fn decode_signature(signature: &str) -> Result<Signature> {
    let signature = signature.trim();
    let bytes = if signature.len() == ED25519_SIGNATURE_SIZE * 2
        && signature.bytes().all(|b| b.is_ascii_hexdigit())
    {
        hex::decode(signature)?
    } else {
        STANDARD
            .decode(signature)
            .map_err(|e| CryptoError::InvalidSignatureEncoding(e.to_string()))?
    };

    let arr: [u8; ED25519_SIGNATURE_SIZE] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength {
                expected: ED25519_SIGNATURE_SIZE,
                got: bytes.len(),
            })?;
    Ok(Signature::from_bytes(&arr))
}

/// Verify an Ed25519 signature.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify, and
/// an error when the key or signature cannot be decoded at all.
pub fn verify_signature(public_key_hex: &str, message: &[u8], signature: &str) -> Result<bool> {
    let verifying_key = parse_public_key(public_key_hex)?;
    let signature = decode_signature(signature)?;
    Ok(verifying_key.verify(message, &signature).is_ok())
}
