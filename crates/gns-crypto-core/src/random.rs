//! Random token generation from the OS CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

/// Fill `len` bytes from the OS RNG and return them as lowercase hex.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Random 128-bit token (32 hex chars).
pub fn random_token_128() -> String {
    random_hex(16)
}

/// Random 256-bit token (64 hex chars).
pub fn random_token_256() -> String {
    random_hex(32)
}
