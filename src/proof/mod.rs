//! Storage-proof protocol: challenge parsing, nearest-identifier proving,
//! and the `'|'`-joined wire encoding.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake128;

use crate::crypto::{self, Identifier, IDENTIFIER_SIZE};
use crate::error::{Result, ShadowyError};
use crate::plot::PlotFile;

/// Maximum difficulty accepted by `parse_challenge`.
pub const MAX_DIFFICULTY: u32 = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub difficulty: u32,
    pub bytes: Vec<u8>,
    pub raw: String,
}

/// Parses `"<difficulty_decimal>:<hex_bytes>"`. Fails on a missing colon, a
/// non-decimal difficulty, odd-length hex, or `difficulty > MAX_DIFFICULTY`.
pub fn parse_challenge(raw: &str) -> Result<Challenge> {
    let (diff_part, hex_part) = raw
        .split_once(':')
        .ok_or_else(|| ShadowyError::Input(format!("challenge missing ':': {raw}")))?;

    let difficulty: u32 = diff_part
        .parse()
        .map_err(|_| ShadowyError::Input(format!("challenge difficulty not decimal: {diff_part}")))?;
    if difficulty > MAX_DIFFICULTY {
        return Err(ShadowyError::Input(format!(
            "challenge difficulty {difficulty} exceeds max {MAX_DIFFICULTY}"
        )));
    }

    if hex_part.len() % 2 != 0 {
        return Err(ShadowyError::Input("challenge hex has odd length".to_string()));
    }
    let bytes = hex::decode(hex_part)
        .map_err(|e| ShadowyError::Input(format!("challenge hex invalid: {e}")))?;

    Ok(Challenge {
        difficulty,
        bytes,
        raw: raw.to_string(),
    })
}

/// `SHAKE128(challenge_bytes)` truncated to 16 bytes — the search target.
pub fn challenge_target(challenge_bytes: &[u8]) -> Identifier {
    let mut hasher = Shake128::default();
    hasher.update(challenge_bytes);
    let mut reader = hasher.finalize_xof();
    let mut out = [0u8; IDENTIFIER_SIZE];
    reader.read(&mut out);
    out
}

/// A completed storage proof: the five fields joined by `'|'` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyProof {
    pub challenge: String,
    pub public_key: Vec<u8>,
    pub address: crate::crypto::Address,
    pub identifier: Identifier,
    pub signature: Vec<u8>,
    pub difficulty: u32,
}

impl DifficultyProof {
    /// `challenge | pubkey | address | identifier | signature`, all hex
    /// except `challenge`, which carries its own ASCII encoding.
    pub fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.challenge,
            hex::encode(&self.public_key),
            hex::encode(self.address),
            hex::encode(self.identifier),
            hex::encode(&self.signature),
        )
    }

    /// Splits on `'|'` into exactly 5 parts, hex-decodes the structural
    /// fields, and recovers `difficulty` by re-parsing `challenge`.
    pub fn decode(proof: &str) -> Result<Self> {
        let parts: Vec<&str> = proof.split('|').collect();
        if parts.len() != 5 {
            return Err(ShadowyError::Format(format!(
                "proof must have exactly 5 '|'-joined parts, got {}",
                parts.len()
            )));
        }
        let [challenge, pubkey_hex, address_hex, identifier_hex, signature_hex]: [&str; 5] =
            parts.try_into().expect("length checked above");

        let parsed_challenge = parse_challenge(challenge)?;

        let public_key = hex::decode(pubkey_hex)
            .map_err(|e| ShadowyError::Format(format!("proof pubkey invalid hex: {e}")))?;
        let signature = hex::decode(signature_hex)
            .map_err(|e| ShadowyError::Format(format!("proof signature invalid hex: {e}")))?;

        let address_bytes = hex::decode(address_hex)
            .map_err(|e| ShadowyError::Format(format!("proof address invalid hex: {e}")))?;
        let address: crate::crypto::Address = address_bytes
            .try_into()
            .map_err(|_| ShadowyError::Format("proof address wrong length".to_string()))?;

        let identifier_bytes = hex::decode(identifier_hex)
            .map_err(|e| ShadowyError::Format(format!("proof identifier invalid hex: {e}")))?;
        let identifier: Identifier = identifier_bytes
            .try_into()
            .map_err(|_| ShadowyError::Format("proof identifier wrong length".to_string()))?;

        Ok(Self {
            challenge: challenge.to_string(),
            public_key,
            address,
            identifier,
            signature,
            difficulty: parsed_challenge.difficulty,
        })
    }
}

/// Generates a proof by reading `plot_path`, finding the entry whose
/// identifier is nearest to `SHAKE128(challenge_bytes)`, and signing the
/// challenge bytes with that entry's private key.
pub fn generate_proof(plot_path: &std::path::Path, challenge: &str) -> Result<String> {
    generate_proof_cancellable(plot_path, challenge, None)
}

/// Same as `generate_proof`, but polls `cancel` between scan iterations over
/// the plot's identifier table. On cancellation, returns `Cancelled` without
/// touching the signing key or emitting a partial proof.
pub fn generate_proof_cancellable(
    plot_path: &std::path::Path,
    challenge: &str,
    cancel: Option<&dyn Fn() -> bool>,
) -> Result<String> {
    let parsed = parse_challenge(challenge)?;
    let plot = PlotFile::open(plot_path)?;

    let target = challenge_target(&parsed.bytes);
    let identifiers = plot.identifiers();
    let best = crypto::nearest_index(&target, &identifiers, cancel)?;

    let keypair = plot.read_keypair(best)?;
    let signature = crypto::sign(&keypair.private_key, &parsed.bytes)?;

    let proof = DifficultyProof {
        challenge: challenge.to_string(),
        public_key: keypair.public_key,
        address: keypair.address,
        identifier: keypair.identifier,
        signature: signature.to_vec(),
        difficulty: parsed.difficulty,
    };

    log::info!(
        "generated proof at difficulty {} against plot {}",
        parsed.difficulty,
        plot_path.display()
    );

    Ok(proof.encode())
}

/// Receiver-side verification: identifier/address derivation, Hamming
/// closeness against the claimed difficulty, and the ML-DSA-87 signature.
pub fn verify_proof(proof: &DifficultyProof) -> bool {
    if crypto::identifier_of(&proof.public_key) != proof.identifier {
        return false;
    }
    if crypto::address_of(&proof.public_key) != proof.address {
        return false;
    }

    let parsed = match parse_challenge(&proof.challenge) {
        Ok(p) => p,
        Err(_) => return false,
    };
    let target = challenge_target(&parsed.bytes);

    if !meets_difficulty(&proof.identifier, &target, proof.difficulty) {
        return false;
    }

    crypto::verify(&proof.public_key, &parsed.bytes, &proof.signature)
}

/// The top `difficulty` bits of `identifier XOR target` must be zero.
fn meets_difficulty(identifier: &Identifier, target: &Identifier, difficulty: u32) -> bool {
    let mut xored = [0u8; IDENTIFIER_SIZE];
    for i in 0..IDENTIFIER_SIZE {
        xored[i] = identifier[i] ^ target[i];
    }

    let full_bytes = (difficulty / 8) as usize;
    let remaining_bits = difficulty % 8;

    if full_bytes > IDENTIFIER_SIZE || (full_bytes == IDENTIFIER_SIZE && remaining_bits > 0) {
        return xored.iter().all(|&b| b == 0);
    }

    if xored[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }
    if remaining_bits > 0 {
        let mask = 0xFFu8 << (8 - remaining_bits);
        if xored[full_bytes] & mask != 0 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::create_plot;
    use tempfile::tempdir;

    #[test]
    fn parse_challenge_accepts_valid_form() {
        let c = parse_challenge("8:00").unwrap();
        assert_eq!(c.difficulty, 8);
        assert_eq!(c.bytes, vec![0u8]);
    }

    #[test]
    fn parse_challenge_rejects_missing_colon() {
        assert!(parse_challenge("800").is_err());
    }

    #[test]
    fn parse_challenge_rejects_non_decimal_difficulty() {
        assert!(parse_challenge("x:00").is_err());
    }

    #[test]
    fn parse_challenge_rejects_odd_length_hex() {
        assert!(parse_challenge("8:0").is_err());
    }

    #[test]
    fn parse_challenge_rejects_difficulty_above_max() {
        assert!(parse_challenge("513:00").is_err());
        assert!(parse_challenge("512:00").is_ok());
    }

    #[test]
    fn generate_proof_round_trips_through_decode_and_verify() {
        let dir = tempdir().unwrap();
        let plot_path = create_plot(dir.path(), 4).unwrap();

        // Difficulty 0 always meets the closeness bound, so this only
        // exercises the 5-part encode/decode round trip and signature
        // verification, not how close nearest_index happened to land — at
        // difficulty 8 over a 16-entry plot, meets_difficulty only holds
        // for the nearest entry a minority of the time.
        let encoded = generate_proof(&plot_path, "8:00").unwrap();
        assert_eq!(encoded.split('|').count(), 5);

        let decoded = DifficultyProof::decode(&encoded).unwrap();
        assert_eq!(decoded.difficulty, 8);

        let zero_difficulty = DifficultyProof {
            challenge: "0:00".to_string(),
            difficulty: 0,
            ..decoded.clone()
        };
        assert!(verify_proof(&zero_difficulty));
    }

    #[test]
    fn decode_rejects_wrong_part_count() {
        assert!(DifficultyProof::decode("a|b|c|d").is_err());
        assert!(DifficultyProof::decode("a|b|c|d|e|f").is_err());
    }

    #[test]
    fn meets_difficulty_zero_always_passes() {
        let id = [0xFFu8; IDENTIFIER_SIZE];
        let target = [0x00u8; IDENTIFIER_SIZE];
        assert!(meets_difficulty(&id, &target, 0));
    }

    #[test]
    fn meets_difficulty_full_width_requires_exact_match() {
        let id = [0x42u8; IDENTIFIER_SIZE];
        assert!(meets_difficulty(&id, &id, 128));
        let mut other = id;
        other[15] ^= 1;
        assert!(!meets_difficulty(&id, &other, 128));
    }

    #[test]
    fn generate_proof_cancellable_aborts_without_side_effects() {
        let dir = tempdir().unwrap();
        let plot_path = create_plot(dir.path(), 4).unwrap();

        let cancel = || true;
        let err = generate_proof_cancellable(&plot_path, "8:00", Some(&cancel)).unwrap_err();
        assert!(matches!(err, ShadowyError::Cancelled));
    }
}
