use std::fmt::Write;

use rand::Rng;
use sha2::{Digest, Sha256};

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

/// Fresh 256-bit API token, hex encoded. Shown to the user once; only its
/// hash is stored.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    to_hex(&bytes)
}

pub fn hash_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

/// Extract the token from an `Authorization` header value. Accepts the
/// `Token <t>` and `Bearer <t>` schemes.
pub fn token_from_header(value: &str) -> Option<&str> {
    let token = value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}
