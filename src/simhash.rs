//! Token-based simhash fingerprinting.
//!
//! A 64-bit locality-sensitive fingerprint: similar texts yield
//! fingerprints with small Hamming distance. Identical text always yields
//! an identical fingerprint; an empty token set yields 0.

use sha2::{Digest, Sha256};

const HASH_BITS: usize = 64;

/// Split text into lowercase alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Fold a token's SHA-256 digest into a 64-bit hash.
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

/// Compute the 64-bit simhash of the text's token set.
///
/// For each token, every bit position of its hash increments (bit set) or
/// decrements (bit clear) a signed counter; the fingerprint bit is 1
/// wherever its counter ends ≥ 0.
pub fn simhash(text: &str) -> u64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0;
    }

    let mut counters = [0i64; HASH_BITS];
    for token in &tokens {
        let hash = token_hash(token);
        for (i, counter) in counters.iter_mut().enumerate() {
            if hash & (1u64 << i) != 0 {
                *counter += 1;
            } else {
                *counter -= 1;
            }
        }
    }

    let mut fingerprint = 0u64;
    for (i, counter) in counters.iter().enumerate() {
        if *counter >= 0 {
            fingerprint |= 1u64 << i;
        }
    }
    fingerprint
}

/// Hamming distance between two fingerprints.
pub fn distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
