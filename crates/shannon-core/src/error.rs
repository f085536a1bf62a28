//! Error types for the Shannon wallet engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: expected {expected}, got {got}")] InvalidLength { expected: usize, got: usize },
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("invalid payload length: {0}")] InvalidPayloadLength(usize),
    #[error("unknown address format: {0:#04x}")] UnknownFormat(u8),
    #[error("unknown short address code hash index: {0:#04x}")] UnknownCodeHashIndex(u8),
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("unknown script hash type: {0}")] UnknownHashType(u8),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
    #[error("invalid hrp")] InvalidHrp,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key")] InvalidPrivateKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("key tweak out of range")] Tweak,
    #[error("signing failed: {0}")] Signing(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDerivationError {
    #[error("hardened derivation requires a private key")] MissingPrivateKey,
    #[error("invalid derivation path: {0}")] InvalidPath(String),
    #[error("seed does not produce a valid master key")] InvalidSeed,
    #[error("seed length {0} outside 16..=64 bytes")] InvalidSeedLength(usize),
    #[error("child index {0} out of range")] InvalidIndex(u32),
    #[error("derivation depth exceeds 255")] DepthOverflow,
    #[error(transparent)] Crypto(#[from] CryptoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    #[error("unsupported algorithm: {0}")] UnsupportedAlgorithm(String),
    #[error("unsupported keystore version: {0}")] UnsupportedVersion(String),
    #[error("mac mismatch")] MacMismatch,
    #[error("missing kdf parameter: {0}")] MissingKdfParam(&'static str),
    #[error("invalid kdf parameters: {0}")] InvalidKdfParams(String),
    #[error("plaintext length {0} is not block aligned")] UnalignedPlaintext(usize),
    #[error("malformed keystore: {0}")] Malformed(String),
    #[error(transparent)] Encoding(#[from] EncodingError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("witness count {witnesses} does not match input count {inputs}")] InvalidWitnessCount { inputs: usize, witnesses: usize },
    #[error("input lock count {locks} does not match input count {inputs}")] InputLockCountMismatch { inputs: usize, locks: usize },
    #[error("witness {index} cannot carry a signature")] InvalidWitness { index: usize },
    #[error("outputs data count {outputs_data} does not match output count {outputs}")] OutputsDataMismatch { outputs: usize, outputs_data: usize },
    #[error("insufficient balance: need {required}")] InsufficientBalance { required: u64 },
    #[error("amount {amount} below minimum cell capacity {minimum}")] AmountBelowMinimum { amount: u64, minimum: u64 },
    #[error("private key does not match sender address")] KeyAddressMismatch,
    #[error("sender address does not use the default lock")] UnsupportedSenderLock,
    #[error("capacity overflow")] CapacityOverflow,
}

/// Failures reported by a chain-query collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("transport: {0}")] Transport(String),
    #[error("rpc error {code}: {message}")] Rpc { code: i64, message: String },
    #[error("timeout")] Timeout,
}

impl ChainError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transport(_) | ChainError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_witness_count() {
        let e = TransactionError::InvalidWitnessCount { inputs: 2, witnesses: 0 };
        assert_eq!(e.to_string(), "witness count 0 does not match input count 2");
    }

    #[test]
    fn display_unknown_format() {
        assert_eq!(EncodingError::UnknownFormat(3).to_string(), "unknown address format: 0x03");
    }

    #[test]
    fn crypto_error_lifts_into_key_derivation() {
        let e: KeyDerivationError = CryptoError::Tweak.into();
        assert_eq!(e, KeyDerivationError::Crypto(CryptoError::Tweak));
    }

    #[test]
    fn transient_chain_errors() {
        assert!(ChainError::Timeout.is_transient());
        assert!(ChainError::Transport("reset".into()).is_transient());
        assert!(!ChainError::Rpc { code: -3, message: "bad".into() }.is_transient());
    }
}
