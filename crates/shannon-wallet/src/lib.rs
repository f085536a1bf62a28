//! # shannon-wallet: HD wallet engine for cell-model chains.
//!
//! Derives secp256k1 keys from BIP-39 mnemonics, selects live cells,
//! assembles and signs transfers, and reads and writes Web3 v3 keystores.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`keys`]: seeds, BIP-32 derivation paths and the receiving keychain
//! - [`mnemonic`]: BIP-39 generation and seed recovery
//! - [`keystore`]: scrypt/PBKDF2 + AES keystore files
//! - [`coin_selection`]: paged, cancellable live-cell selection
//! - [`builder`]: unsigned transfer assembly
//! - [`signer`]: lock-group signing messages and witnesses
//! - [`payment`]: one-shot address-to-address transfer
//! - [`wallet`]: high-level wallet composition
//! - [`config`]: layered file/environment configuration
//! - [`logging`]: tracing subscriber setup

pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod logging;
pub mod mnemonic;
pub mod payment;
pub mod signer;
pub mod wallet;

// Re-exports for convenient access
pub use builder::TransactionBuilder;
pub use coin_selection::{Balance, CoinSelection, CoinSelector, RetryPolicy};
pub use config::WalletConfig;
pub use error::WalletError;
pub use keys::{DerivationPath, ExtendedKey, KeyChain, Seed};
pub use keystore::{Cipher, Kdf, Keystore};
pub use logging::{init_logging, LogFormat};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed};
pub use payment::Payment;
pub use signer::{sign_transaction, signing_messages};
pub use wallet::Wallet;
