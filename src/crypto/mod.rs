//! ML-DSA-87 key material, Keccak/SHAKE address & identifier derivation, and
//! the Hamming-distance search primitives the proof engine builds on.

use fips204::ml_dsa_87;
use fips204::traits::{KeyGen, SerDes, Signer, Verifier};
use rand::RngCore;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Keccak256, Shake128};
use zeroize::Zeroizing;

use crate::error::{Result, ShadowyError};

/// ML-DSA-87 public key size, bytes.
pub const PUBLIC_KEY_SIZE: usize = 2592;
/// ML-DSA-87 private (expanded) key size, bytes.
pub const PRIVATE_KEY_SIZE: usize = 4896;
/// ML-DSA-87 signature size, bytes.
pub const SIGNATURE_SIZE: usize = 4627;

/// Size of an identifier: truncated SHAKE-128 digest of a public key.
pub const IDENTIFIER_SIZE: usize = 16;
/// Size of an address: trailing bytes of Keccak-256(public key).
pub const ADDRESS_SIZE: usize = 20;

pub type Address = [u8; ADDRESS_SIZE];
pub type Identifier = [u8; IDENTIFIER_SIZE];

/// A generated or reconstructed ML-DSA-87 key pair, plus its derived
/// identifier/address. The private key is the only field wiped on drop.
#[derive(Clone)]
pub struct KeyPair {
    pub private_key: Zeroizing<Vec<u8>>,
    pub public_key: Vec<u8>,
    pub address: Address,
    pub identifier: Identifier,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .field("address", &hex::encode(self.address))
            .field("identifier", &hex::encode(self.identifier))
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generates a fresh key pair using the system RNG.
    pub fn generate() -> Result<Self> {
        let (pk, sk) =
            ml_dsa_87::KeyGen::try_keygen().map_err(|e| ShadowyError::Crypto(e.to_string()))?;

        // Exercise the RNG once more so a broken/exhausted source surfaces as
        // a dedicated crypto error rather than a silent key with low entropy.
        let mut probe = [0u8; 32];
        rand::thread_rng().try_fill_bytes(&mut probe).map_err(|e| {
            ShadowyError::Crypto(format!("rng exhausted during keypair generation: {e}"))
        })?;

        let public_key = pk.into_bytes().to_vec();
        let private_key = Zeroizing::new(sk.into_bytes().to_vec());
        let address = address_of(&public_key);
        let identifier = identifier_of(&public_key);

        Ok(Self {
            private_key,
            public_key,
            address,
            identifier,
        })
    }

    /// Reconstructs a `KeyPair` from a private-key blob read off a plot file.
    /// Re-derives the public key through the ML-DSA-87 API — never a
    /// pointer-cast reinterpretation of the raw bytes.
    pub fn from_private_key_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(ShadowyError::Crypto(format!(
                "private key must be {PRIVATE_KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let sk_arr: [u8; PRIVATE_KEY_SIZE] = bytes
            .try_into()
            .expect("length checked above");
        let sk = ml_dsa_87::PrivateKey::try_from_bytes(sk_arr)
            .map_err(|e| ShadowyError::Crypto(e.to_string()))?;
        let public_key = sk
            .get_public_key()
            .map_err(|e| ShadowyError::Crypto(e.to_string()))?
            .into_bytes()
            .to_vec();

        let address = address_of(&public_key);
        let identifier = identifier_of(&public_key);

        Ok(Self {
            private_key: Zeroizing::new(bytes.to_vec()),
            public_key,
            address,
            identifier,
        })
    }
}

/// Deterministic ML-DSA-87 "hedged" signature with an empty context string.
pub fn sign(private_key: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
    if private_key.len() != PRIVATE_KEY_SIZE {
        return Err(ShadowyError::Crypto(format!(
            "private key must be {PRIVATE_KEY_SIZE} bytes, got {}",
            private_key.len()
        )));
    }
    let sk_arr: [u8; PRIVATE_KEY_SIZE] = private_key
        .try_into()
        .expect("length checked above");
    let sk = ml_dsa_87::PrivateKey::try_from_bytes(sk_arr)
        .map_err(|e| ShadowyError::Crypto(e.to_string()))?;
    let sig = sk
        .try_sign(message, &[])
        .map_err(|e| ShadowyError::Crypto(e.to_string()))?;
    Ok(sig)
}

/// Strict-length verification: any length mismatch returns `false` without
/// calling into the signature primitive.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    if public_key.len() != PUBLIC_KEY_SIZE || signature.len() != SIGNATURE_SIZE {
        return false;
    }
    let pk_arr: [u8; PUBLIC_KEY_SIZE] = match public_key.try_into() {
        Ok(a) => a,
        Err(_) => return false,
    };
    let sig_arr: [u8; SIGNATURE_SIZE] = match signature.try_into() {
        Ok(a) => a,
        Err(_) => return false,
    };
    let pk = match ml_dsa_87::PublicKey::try_from_bytes(pk_arr) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    pk.verify(message, &sig_arr, &[])
}

/// `Keccak256(public_key)[12..32]` — the last 20 bytes of the Keccak digest.
pub fn address_of(public_key: &[u8]) -> Address {
    let digest = Keccak256::digest(public_key);
    let mut out = [0u8; ADDRESS_SIZE];
    out.copy_from_slice(&digest[12..32]);
    out
}

/// `SHAKE128(public_key)` truncated to the first 16 bytes.
pub fn identifier_of(public_key: &[u8]) -> Identifier {
    let mut hasher = Shake128::default();
    hasher.update(public_key);
    let mut reader = hasher.finalize_xof();
    let mut out = [0u8; IDENTIFIER_SIZE];
    reader.read(&mut out);
    out
}

/// Bitwise XOR popcount between two 16-byte identifiers.
pub fn hamming(a: &Identifier, b: &Identifier) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum()
}

/// Index of the first entry in `haystack` with minimal Hamming distance to
/// `target`. Stable on ties (lowest index wins). `cancel` is polled once per
/// iteration so very large plots can be scanned cooperatively.
pub fn nearest_index(
    target: &Identifier,
    haystack: &[Identifier],
    cancel: Option<&dyn Fn() -> bool>,
) -> Result<usize> {
    let mut best_index = None;
    let mut best_distance = u32::MAX;

    for (i, candidate) in haystack.iter().enumerate() {
        if let Some(cancel) = cancel {
            if cancel() {
                return Err(ShadowyError::Cancelled);
            }
        }
        let distance = hamming(target, candidate);
        if distance < best_distance {
            best_distance = distance;
            best_index = Some(i);
        }
    }

    best_index.ok_or_else(|| ShadowyError::Input("empty haystack".to_string()))
}
