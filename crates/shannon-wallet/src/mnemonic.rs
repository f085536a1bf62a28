//! BIP-39 mnemonic generation and seed recovery.

use bip39::{Language, Mnemonic};
use zeroize::Zeroize;

use crate::error::WalletError;
use crate::keys::Seed;

/// Generate a fresh English mnemonic of `word_count` words (12, 15, 18, 21 or 24).
pub fn generate_mnemonic(word_count: usize) -> Result<String, WalletError> {
    use rand::RngCore;
    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return Err(WalletError::InvalidMnemonic(format!(
            "unsupported word count {word_count}"
        )));
    }
    let mut entropy = vec![0u8; word_count / 3 * 4];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let result = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map(|m| m.to_string())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    result
}

/// Parse a BIP-39 mnemonic phrase and stretch it into a 64-byte seed.
///
/// Normalizes whitespace and converts to lowercase before parsing.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Seed, WalletError> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let m = Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let mut bytes = m.to_seed(passphrase);
    let seed = Seed::from_bytes(&bytes);
    bytes.zeroize();
    Ok(seed?)
}
