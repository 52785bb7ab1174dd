use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;
use sha2::{Digest, Sha256};

/// Prefix of every API key secret handed out by this service.
pub const API_KEY_PREFIX: &str = "qz_";

/// Generates a cryptographically secure API key with 256 bits of entropy.
///
/// The key is formatted as `qz_{base64url_encoded_random_bytes}` where the
/// random bytes are 32 bytes (256 bits) of cryptographically secure random data.
pub fn generate_api_key() -> String {
    let mut key_bytes = [0u8; 32];
    rng().fill(&mut key_bytes);

    format!("{API_KEY_PREFIX}{}", general_purpose::URL_SAFE_NO_PAD.encode(key_bytes))
}

/// Generates an opaque session token of the same strength as an API key, without a prefix.
pub fn generate_session_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Hash an API key secret for storage and lookup. Only the hash is ever persisted.
pub fn hash_api_key(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
