//! Transaction model: canonical JSON serialization, SHA-256 hashing, and
//! ML-DSA-87 signing/verification over the serialized bytes.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::crypto::{self, KeyPair};
use crate::error::{Result, ShadowyError};

/// Upper bound on any single satoshi-denominated total, matching the
/// monetary cap (`MAX_SUPPLY * SATS_PER_COIN`).
pub const MAX_SATOSHIS: u64 = crate::emission::MAX_SUPPLY * crate::emission::SATS_PER_COIN;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxInput {
    pub previous_tx_hash: String,
    pub output_index: u32,
    pub script_sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOutput {
    pub address: String,
    pub value: u64,
    pub script_pub_key: String,
}

/// Field order here is the wire order: it is serialized verbatim via
/// `serde_json::to_vec`, which preserves struct declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub not_until: DateTime<Utc>,
    pub nonce: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// `version=1`, `timestamp=not_until=now`, a random non-zero nonce below
    /// `2^63` (the bound `NonceValidator` enforces), and empty input/output
    /// lists.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut nonce = 0u64;
        while nonce == 0 {
            nonce = rand::thread_rng().next_u64() & (u64::MAX >> 1);
        }
        Self {
            version: 1,
            timestamp: now,
            not_until: now,
            nonce,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn add_input(&mut self, previous_tx_hash: String, output_index: u32, script_sig: String) {
        self.inputs.push(TxInput {
            previous_tx_hash,
            output_index,
            script_sig,
        });
    }

    pub fn add_output(&mut self, address: String, value: u64, script_pub_key: String) {
        self.outputs.push(TxOutput {
            address,
            value,
            script_pub_key,
        });
    }

    pub fn set_not_until(&mut self, not_until: DateTime<Utc>) {
        self.not_until = not_until;
    }

    /// Canonical serialized bytes (fixed field order, RFC 3339 timestamps).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ShadowyError::Format(e.to_string()))
    }

    /// SHA-256 over the canonical serialization.
    pub fn hash(&self) -> Result<String> {
        let bytes = self.canonical_bytes()?;
        Ok(hex::encode(Sha256::digest(bytes)))
    }

    /// Structural validity: non-zero version, no zero-value outputs, no
    /// duplicate `(address, value, script_pub_key)` outputs, and totals
    /// within the monetary cap.
    pub fn is_valid(&self) -> Result<()> {
        if self.version == 0 {
            return Err(ShadowyError::Input("version must be non-zero".to_string()));
        }

        let mut seen = HashSet::new();
        let mut total: u64 = 0;
        for (i, out) in self.outputs.iter().enumerate() {
            if out.value == 0 {
                return Err(ShadowyError::Input(format!(
                    "output {i} has zero value"
                )));
            }
            let key = (out.address.clone(), out.value, out.script_pub_key.clone());
            if !seen.insert(key) {
                return Err(ShadowyError::Input(format!(
                    "output {i} duplicates an earlier output"
                )));
            }
            total = total.checked_add(out.value).ok_or_else(|| {
                ShadowyError::Input("output total overflows u64".to_string())
            })?;
        }

        if total > MAX_SATOSHIS {
            return Err(ShadowyError::Input(format!(
                "output total {total} exceeds the monetary cap {MAX_SATOSHIS}"
            )));
        }

        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction plus its ML-DSA-87 signature over the canonical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The canonical serialized transaction bytes, carried verbatim.
    pub transaction: Vec<u8>,
    pub signer_key: String,
    pub algorithm: String,
    pub signature: String,
    pub tx_hash: String,
}

pub const ALGORITHM: &str = "ML-DSA-87";

impl SignedTransaction {
    /// Serializes `tx` canonically, signs it, and assembles the envelope.
    pub fn sign(tx: &Transaction, keypair: &KeyPair) -> Result<Self> {
        let bytes = tx.canonical_bytes()?;
        let tx_hash = hex::encode(Sha256::digest(&bytes));
        let signature = crypto::sign(&keypair.private_key, &bytes)?;

        Ok(Self {
            transaction: bytes,
            signer_key: hex::encode(&keypair.public_key),
            algorithm: ALGORITHM.to_string(),
            signature: hex::encode(signature),
            tx_hash,
        })
    }

    /// Decodes `signer_key`/`signature`, re-hashes the embedded bytes,
    /// requires the hash to match, then verifies the signature. Returns the
    /// parsed inner transaction on success.
    pub fn verify(&self) -> Result<Transaction> {
        let tx: Transaction = serde_json::from_slice(&self.transaction)
            .map_err(|e| ShadowyError::Format(format!("parse error: {e}")))?;

        let recomputed = hex::encode(Sha256::digest(&self.transaction));
        if recomputed != self.tx_hash {
            return Err(ShadowyError::Signature(format!(
                "hash mismatch: expected {}, got {recomputed}",
                self.tx_hash
            )));
        }

        let public_key = hex::decode(&self.signer_key)
            .map_err(|e| ShadowyError::Format(format!("parse error: bad signer_key: {e}")))?;
        let signature = hex::decode(&self.signature)
            .map_err(|e| ShadowyError::Format(format!("parse error: bad signature: {e}")))?;

        if !crypto::verify(&public_key, &self.transaction, &signature) {
            return Err(ShadowyError::Signature("bad signature".to_string()));
        }

        Ok(tx)
    }
}

/// `now - 24h <= timestamp <= now + 10m` and `not_until <= now`.
pub fn within_temporal_bounds(
    tx: &Transaction,
    now: DateTime<Utc>,
    max_future_skew: Duration,
    max_past_skew: Duration,
) -> Result<()> {
    if tx.not_until > now {
        return Err(ShadowyError::Validation {
            validator_name: "TemporalValidator".to_string(),
            cause: format!("transaction not valid until {}", tx.not_until),
        });
    }
    if tx.timestamp > now + max_future_skew {
        return Err(ShadowyError::Validation {
            validator_name: "TemporalValidator".to_string(),
            cause: format!("timestamp {} is too far in the future", tx.timestamp),
        });
    }
    if tx.timestamp < now - max_past_skew {
        return Err(ShadowyError::Validation {
            validator_name: "TemporalValidator".to_string(),
            cause: format!("timestamp {} is too far in the past", tx.timestamp),
        });
    }
    Ok(())
}
