// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Construction of the commit-reveal material submitted on-chain once a
//! worker has produced its result artifacts.

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("invalid hex digest: {0}")]
    InvalidHash(String),
}

/// Commit-reveal material for one task's result.
///
/// `result` is the concatenation of each artifact's digest, in the order
/// the worker reported them. `nonce` is kept privately until disclosure;
/// `commitment` is what gets submitted on-chain up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub result: Vec<u8>,
    pub nonce: [u8; 32],
    /// Lowercase-hex, `0x`-prefixed `SHA256(result || nonce)`.
    pub commitment: String,
}

/// Hashes `result || nonce` into the hex digest submitted on-chain.
fn commit(result: &[u8], nonce: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(result);
    hasher.update(nonce);
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Builds fresh commit-reveal material from a worker's per-artifact
/// digests. Each entry in `hashes` is a hex string, optionally
/// `0x`-prefixed.
pub fn make_result_commitments(hashes: &[String]) -> Result<Commitment, CommitmentError> {
    let mut result = Vec::new();
    for hash in hashes {
        let stripped = hash.strip_prefix("0x").unwrap_or(hash);
        let bytes =
            hex::decode(stripped).map_err(|_| CommitmentError::InvalidHash(hash.clone()))?;
        result.extend_from_slice(&bytes);
    }

    let mut nonce = [0u8; 32];
    rand::rng().fill_bytes(&mut nonce);
    let commitment = commit(&result, &nonce);

    Ok(Commitment {
        result,
        nonce,
        commitment,
    })
}

#[cfg(test)]
#[path = "commitment_tests.rs"]
mod tests;
