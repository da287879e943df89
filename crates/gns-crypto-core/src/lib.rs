//! # GNS Crypto Core
//!
//! Cryptographic primitives shared by every GNS service and client.
//!
//! - **Ed25519** identity keys and signature verification ([`signing`])
//! - **Canonical JSON**, the signature pre-image format ([`canonical`])
//! - **CSPRNG tokens** for session identifiers and challenges ([`random`])
//!
//! ```rust
//! use gns_crypto_core::{canonicalize, verify_signature, GnsIdentity};
//! use serde_json::json;
//!
//! let identity = GnsIdentity::generate();
//! let payload = canonicalize(&json!({"action": "approve", "sessionId": "s1"}));
//! let signature = identity.sign_string(&payload);
//!
//! assert!(verify_signature(&identity.public_key_hex(), payload.as_bytes(), &signature).unwrap());
//! ```

pub mod canonical;
pub mod errors;
pub mod random;
pub mod signing;

pub use canonical::{canonicalize, canonicalize_serializable};
pub use errors::CryptoError;
pub use random::{random_hex, random_token_128, random_token_256};
pub use signing::{
    decode_signature, is_valid_public_key, parse_public_key, verify_signature, GnsIdentity,
    SecretKeyBytes, ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE,
};

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
