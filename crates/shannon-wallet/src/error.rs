//! Wallet error types.

use shannon_core::error::{
    ChainError, CryptoError, EncodingError, KeyDerivationError, KeystoreError, TransactionError,
};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Address or hex decoding failure.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// secp256k1 failure from shannon-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// HD derivation failure.
    #[error(transparent)]
    KeyDerivation(#[from] KeyDerivationError),

    /// Keystore decode, KDF or MAC failure.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    /// Transaction assembly or signing failure.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Chain-query collaborator failure, after retries where applicable.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The caller cancelled an in-flight operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration could not be loaded or is invalid.
    #[error("config: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// A blocking task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::IoError(e.to_string())
    }
}
