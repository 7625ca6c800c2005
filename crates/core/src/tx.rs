// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction hash and contract method types used by the chain-call
//! coordinator (see `taskd-runtime::coordinator`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 32-byte transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(#[serde(with = "hex_bytes32")] pub [u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

/// Parse error for [`TxHash::from_str`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid transaction hash: {0}")]
pub struct TxHashParseError(String);

impl FromStr for TxHash {
    type Err = TxHashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| TxHashParseError(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TxHashParseError(format!("expected 32 bytes, got {}", stripped.len() / 2)))?;
        Ok(TxHash(arr))
    }
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        format!("0x{}", hex::encode(bytes)).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(stripped).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Contract methods the chain-call coordinator can be in the middle of.
///
/// Closed enum instead of a free-form method-name string: the coordinator
/// only ever dispatches on this fixed set, so the illegal "unknown waiting
/// method" state cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractMethod {
    SubmitTaskResultCommitment,
    DiscloseTaskResult,
    ReportResultsUploaded,
    ReportTaskError,
}

impl fmt::Display for ContractMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractMethod::SubmitTaskResultCommitment => "submitTaskResultCommitment",
            ContractMethod::DiscloseTaskResult => "discloseTaskResult",
            ContractMethod::ReportResultsUploaded => "reportResultsUploaded",
            ContractMethod::ReportTaskError => "reportTaskError",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
#[path = "tx_tests.rs"]
mod tests;
