// src/utils/signature.rs

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{CadastralRecord, ListingRecord};
use crate::utils::config::ResolverConfig;

/// Hashes a serializable value. Serialization failures hash the error text
/// instead, so a signature is always produced.
fn hash_json<T: Serialize>(hasher: &mut Sha256, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => hasher.update(&bytes),
        Err(e) => hasher.update(e.to_string().as_bytes()),
    }
}

/// Fingerprint of a run's inputs: both record tables plus the configuration.
/// Two runs with the same signature must produce identical outputs.
pub fn run_signature(
    listings: &[ListingRecord],
    cadastre: &[CadastralRecord],
    config: &ResolverConfig,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"listings");
    for listing in listings {
        hash_json(&mut hasher, listing);
    }
    hasher.update(b"cadastre");
    for record in cadastre {
        hash_json(&mut hasher, record);
    }
    hasher.update(b"config");
    let mut config = config.clone();
    // worker count changes scheduling, never results
    config.workers = 1;
    hash_json(&mut hasher, &config);
    hex::encode(hasher.finalize())
}
