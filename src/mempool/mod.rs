//! The ordered validator chain guarding mempool admission of signed
//! transactions. Cheap structural checks run before expensive ones; a
//! structural parse failure short-circuits the rest of the chain.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::config::ValidatorConfig;
use crate::crypto::{self, Address};
use crate::error::{Result, ShadowyError};
use crate::transaction::{self, SignedTransaction, ALGORITHM};

/// Capability shared by every stage in the pipeline.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;
    fn validate(&self, tx: &SignedTransaction) -> Result<()>;
}

fn fail(name: &str, cause: impl Into<String>) -> Result<()> {
    Err(ShadowyError::Validation {
        validator_name: name.to_string(),
        cause: cause.into(),
    })
}

/// Non-empty envelope fields, a parseable inner transaction, and a passing
/// `Transaction::is_valid`.
pub struct BasicTransactionValidator;

impl Validator for BasicTransactionValidator {
    fn name(&self) -> &str {
        "BasicTransactionValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        if tx.tx_hash.is_empty() {
            return fail(self.name(), "empty tx_hash");
        }
        if tx.algorithm != ALGORITHM {
            return fail(self.name(), format!("unsupported algorithm {}", tx.algorithm));
        }
        if tx.signature.is_empty() {
            return fail(self.name(), "empty signature");
        }
        if tx.signer_key.is_empty() {
            return fail(self.name(), "empty signer_key");
        }

        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;

        inner
            .is_valid()
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: e.to_string(),
            })
    }
}

/// Signature-shape check: exact hex length and charset. Full cryptographic
/// verification is deferred to an enabling flag (spec open question).
pub struct SignatureValidator;

const SIGNATURE_HEX_LEN: usize = 2 * crypto::SIGNATURE_SIZE;

impl Validator for SignatureValidator {
    fn name(&self) -> &str {
        "SignatureValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        if tx.signature.len() != SIGNATURE_HEX_LEN {
            return fail(
                self.name(),
                format!(
                    "incorrect length: expected {SIGNATURE_HEX_LEN}, got {}",
                    tx.signature.len()
                ),
            );
        }
        if !tx.signature.chars().all(|c| c.is_ascii_hexdigit()) {
            return fail(self.name(), "signature contains non-hex characters");
        }
        Ok(())
    }
}

/// `not_until <= now`; `timestamp` within the configured skew.
pub struct TemporalValidator {
    pub max_future_skew: Duration,
    pub max_past_skew: Duration,
}

impl Validator for TemporalValidator {
    fn name(&self) -> &str {
        "TemporalValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;
        transaction::within_temporal_bounds(
            &inner,
            Utc::now(),
            self.max_future_skew,
            self.max_past_skew,
        )
    }
}

/// Every output clears `min_fee`; the total clears `min_fee + len(outputs)`.
pub struct FeeValidator {
    pub min_fee: u64,
}

impl Validator for FeeValidator {
    fn name(&self) -> &str {
        "FeeValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;

        let mut total: u64 = 0;
        for (i, out) in inner.outputs.iter().enumerate() {
            if out.value == 0 {
                return fail(self.name(), format!("output {i} has zero value"));
            }
            if out.value < self.min_fee {
                return fail(
                    self.name(),
                    format!("output {i} value {} below min_fee {}", out.value, self.min_fee),
                );
            }
            total = total.saturating_add(out.value);
        }

        let required = self
            .min_fee
            .saturating_add(inner.outputs.len() as u64);
        if total < required {
            return fail(
                self.name(),
                format!("total {total} below required minimum {required}"),
            );
        }
        Ok(())
    }
}

/// Serialized envelope size, and input/output counts, within configured caps.
pub struct SizeValidator {
    pub max_tx_size: usize,
    pub max_io_count: usize,
}

impl Validator for SizeValidator {
    fn name(&self) -> &str {
        "SizeValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        let serialized = serde_json::to_vec(tx)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("serialize error: {e}"),
            })?;
        if serialized.len() > self.max_tx_size {
            return fail(
                self.name(),
                format!(
                    "serialized size {} exceeds max {}",
                    serialized.len(),
                    self.max_tx_size
                ),
            );
        }

        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;
        if inner.inputs.len() > self.max_io_count {
            return fail(self.name(), format!("too many inputs: {}", inner.inputs.len()));
        }
        if inner.outputs.len() > self.max_io_count {
            return fail(self.name(), format!("too many outputs: {}", inner.outputs.len()));
        }
        Ok(())
    }
}

/// Within a transaction, `(previous_tx_hash, output_index)` pairs must be
/// pairwise distinct.
pub struct DoubleSpendValidator;

impl Validator for DoubleSpendValidator {
    fn name(&self) -> &str {
        "DoubleSpendValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;

        let mut seen = HashSet::new();
        for input in &inner.inputs {
            let key = (input.previous_tx_hash.clone(), input.output_index);
            if !seen.insert(key) {
                return fail(
                    self.name(),
                    format!(
                        "duplicate input {}:{}",
                        input.previous_tx_hash, input.output_index
                    ),
                );
            }
        }
        Ok(())
    }
}

/// `'S'` + 50 hex chars, length 51, parsing as a 25-byte payload.
pub fn is_valid_address(s: &str) -> bool {
    if s.len() != 51 || !s.starts_with('S') {
        return false;
    }
    let hex_part = &s[1..];
    hex_part.len() == 50 && hex::decode(hex_part).map(|b| b.len() == 25).unwrap_or(false)
}

/// Every output address passes `is_valid_address`.
pub struct AddressValidator;

impl Validator for AddressValidator {
    fn name(&self) -> &str {
        "AddressValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;

        for (i, out) in inner.outputs.iter().enumerate() {
            if !is_valid_address(&out.address) {
                return fail(self.name(), format!("output {i} has an invalid address"));
            }
        }
        Ok(())
    }
}

/// `nonce != 0` and `nonce < 2^63`, with per-address replay tracking guarded
/// by a read/write lock: reads on the hot path take the read lock, inserts
/// take the write lock.
pub struct NonceValidator {
    seen_nonces: RwLock<HashMap<Address, HashSet<u64>>>,
}

impl Default for NonceValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceValidator {
    pub fn new() -> Self {
        Self {
            seen_nonces: RwLock::new(HashMap::new()),
        }
    }

    fn signer_address(tx: &SignedTransaction) -> Result<Address> {
        let pubkey = hex::decode(&tx.signer_key)
            .map_err(|e| ShadowyError::Validation {
                validator_name: "NonceValidator".to_string(),
                cause: format!("bad signer_key hex: {e}"),
            })?;
        Ok(crypto::address_of(&pubkey))
    }
}

impl Validator for NonceValidator {
    fn name(&self) -> &str {
        "NonceValidator"
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        let inner: transaction::Transaction = serde_json::from_slice(&tx.transaction)
            .map_err(|e| ShadowyError::Validation {
                validator_name: self.name().to_string(),
                cause: format!("unparseable inner transaction: {e}"),
            })?;

        if inner.nonce == 0 {
            return fail(self.name(), "nonce must be non-zero");
        }
        if inner.nonce >= 1u64 << 63 {
            return fail(self.name(), format!("nonce {} exceeds 2^63", inner.nonce));
        }

        let address = Self::signer_address(tx)?;

        {
            let seen = self.seen_nonces.read();
            if seen.get(&address).is_some_and(|s| s.contains(&inner.nonce)) {
                return fail(self.name(), format!("nonce {} already used", inner.nonce));
            }
        }
        {
            let mut seen = self.seen_nonces.write();
            seen.entry(address).or_default().insert(inner.nonce);
        }
        Ok(())
    }
}

/// Runs its children in order, reporting the first failing child's name and
/// cause.
pub struct CompositeValidator {
    pub name: String,
    children: Vec<Box<dyn Validator>>,
}

impl CompositeValidator {
    pub fn new(name: impl Into<String>, children: Vec<Box<dyn Validator>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// The default mempool-admission chain, per the fixed ordering in the
    /// design doc: structural checks first, expensive ones last.
    pub fn default_pipeline(config: &ValidatorConfig) -> Self {
        Self::new(
            "MempoolAdmission",
            vec![
                Box::new(BasicTransactionValidator),
                Box::new(SignatureValidator),
                Box::new(TemporalValidator {
                    max_future_skew: Duration::seconds(config.max_future_skew_secs),
                    max_past_skew: Duration::seconds(config.max_past_skew_secs),
                }),
                Box::new(FeeValidator {
                    min_fee: config.min_fee,
                }),
                Box::new(SizeValidator {
                    max_tx_size: config.max_tx_size,
                    max_io_count: config.max_io_count,
                }),
                Box::new(DoubleSpendValidator),
                Box::new(AddressValidator),
                Box::new(NonceValidator::new()),
            ],
        )
    }
}

impl Validator for CompositeValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, tx: &SignedTransaction) -> Result<()> {
        for child in &self.children {
            child.validate(tx)?;
        }
        Ok(())
    }
}

/// Present for symmetry with the design doc's timestamp vocabulary; unused
/// by validators above, which take `Utc::now()` directly.
#[allow(dead_code)]
fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::transaction::Transaction;

    fn valid_address() -> String {
        format!("S{}", "ab".repeat(25))
    }

    fn signed(tx: Transaction) -> SignedTransaction {
        let kp = KeyPair::generate().unwrap();
        SignedTransaction::sign(&tx, &kp).unwrap()
    }

    #[test]
    fn basic_validator_accepts_well_formed_transaction() {
        let mut tx = Transaction::new();
        tx.add_output(valid_address(), 10, String::new());
        let signed = signed(tx);
        assert!(BasicTransactionValidator.validate(&signed).is_ok());
    }

    #[test]
    fn signature_validator_rejects_short_signature() {
        let mut tx = Transaction::new();
        tx.add_output(valid_address(), 10, String::new());
        let mut signed = signed(tx);
        signed.signature.pop();
        let err = SignatureValidator.validate(&signed).unwrap_err();
        assert!(err.to_string().contains("incorrect length"));
        assert!(err.to_string().contains("9254"));
    }

    #[test]
    fn temporal_validator_rejects_future_not_until() {
        let mut tx = Transaction::new();
        tx.set_not_until(Utc::now() + Duration::minutes(10));
        tx.add_output(valid_address(), 10, String::new());
        let signed = signed(tx);
        let validator = TemporalValidator {
            max_future_skew: Duration::seconds(600),
            max_past_skew: Duration::seconds(86_400),
        };
        let err = validator.validate(&signed).unwrap_err();
        assert!(matches!(err, ShadowyError::Validation { validator_name, .. } if validator_name == "TemporalValidator"));
    }

    #[test]
    fn fee_validator_rejects_output_below_min_fee() {
        let mut tx = Transaction::new();
        tx.add_output(valid_address(), 1, String::new());
        let signed = signed(tx);
        let validator = FeeValidator { min_fee: 1_000 };
        assert!(validator.validate(&signed).is_err());
    }

    #[test]
    fn double_spend_validator_rejects_duplicate_inputs() {
        let mut tx = Transaction::new();
        tx.add_input("aa".repeat(32), 0, String::new());
        tx.add_input("aa".repeat(32), 0, String::new());
        tx.add_output(valid_address(), 10, String::new());
        let signed = signed(tx);
        assert!(DoubleSpendValidator.validate(&signed).is_err());
    }

    #[test]
    fn address_validator_rejects_bad_address() {
        let mut tx = Transaction::new();
        tx.add_output("not-an-address".to_string(), 10, String::new());
        let signed = signed(tx);
        assert!(AddressValidator.validate(&signed).is_err());
    }

    #[test]
    fn is_valid_address_boundary_cases() {
        assert!(is_valid_address(&valid_address()));
        assert!(!is_valid_address("Sabc"));
        assert!(!is_valid_address(&format!("X{}", "ab".repeat(25))));
    }

    #[test]
    fn nonce_validator_rejects_replay() {
        let validator = NonceValidator::new();
        let mut tx = Transaction::new();
        tx.nonce = 7;
        tx.add_output(valid_address(), 10, String::new());
        let kp = KeyPair::generate().unwrap();
        let signed1 = SignedTransaction::sign(&tx, &kp).unwrap();
        assert!(validator.validate(&signed1).is_ok());

        let mut tx2 = Transaction::new();
        tx2.nonce = 7;
        tx2.add_output(valid_address(), 20, String::new());
        let signed2 = SignedTransaction::sign(&tx2, &kp).unwrap();
        assert!(validator.validate(&signed2).is_err());
    }

    #[test]
    fn nonce_validator_rejects_zero_and_overflow() {
        let validator = NonceValidator::new();
        let mut tx = Transaction::new();
        tx.nonce = 0;
        tx.add_output(valid_address(), 10, String::new());
        let signed = signed(tx);
        assert!(validator.validate(&signed).is_err());
    }

    #[test]
    fn composite_pipeline_reports_first_failure() {
        let config = ValidatorConfig::default();
        let pipeline = CompositeValidator::default_pipeline(&config);

        let mut tx = Transaction::new();
        tx.set_not_until(Utc::now() + Duration::minutes(10));
        tx.add_output(valid_address(), 10_000, String::new());
        let signed = signed(tx);

        let err = pipeline.validate(&signed).unwrap_err();
        assert!(matches!(err, ShadowyError::Validation { validator_name, .. } if validator_name == "TemporalValidator"));
    }

    #[test]
    fn composite_pipeline_accepts_well_formed_transaction() {
        let config = ValidatorConfig::default();
        let pipeline = CompositeValidator::default_pipeline(&config);

        let mut tx = Transaction::new();
        tx.nonce = 7;
        tx.add_output(valid_address(), 10_000, String::new());
        let signed = signed(tx);

        assert!(pipeline.validate(&signed).is_ok());
    }
}
