//! Wallet composition: HD keychain, configuration and chain access.
//!
//! The [`Wallet`] struct ties together mnemonic recovery, address
//! derivation, coin selection, signing and keystore export. Chain access is
//! passed in per call as a [`ChainQuery`]; the wallet keeps no cell cache.

use tokio_util::sync::CancellationToken;
use tracing::info;

use shannon_core::address::{Address, Network};
use shannon_core::crypto::CryptoContext;
use shannon_core::traits::ChainQuery;
use shannon_core::types::Hash256;

use crate::coin_selection::{Balance, CoinSelector};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::keys::{KeyChain, Seed};
use crate::keystore::Keystore;
use crate::mnemonic::{generate_mnemonic, mnemonic_to_seed};
use crate::payment::Payment;

/// Word count for freshly created wallets.
pub const DEFAULT_WORD_COUNT: usize = 12;

/// HD wallet over the default secp256k1 lock.
///
/// Every key operation runs against the borrowed [`CryptoContext`].
pub struct Wallet<'c> {
    ctx: &'c CryptoContext,
    keychain: KeyChain,
    config: WalletConfig,
}

impl<'c> Wallet<'c> {
    /// Create a wallet from a fresh mnemonic, returned alongside it.
    pub fn create(ctx: &'c CryptoContext, config: WalletConfig) -> Result<(Self, String), WalletError> {
        let phrase = generate_mnemonic(DEFAULT_WORD_COUNT)?;
        let wallet = Self::from_mnemonic(ctx, &phrase, "", config)?;
        Ok((wallet, phrase))
    }

    /// Recover a wallet from a BIP39 phrase.
    pub fn from_mnemonic(
        ctx: &'c CryptoContext,
        phrase: &str,
        passphrase: &str,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        let seed = mnemonic_to_seed(phrase, passphrase)?;
        Self::from_seed(ctx, &seed, config)
    }

    pub fn from_seed(ctx: &'c CryptoContext, seed: &Seed, config: WalletConfig) -> Result<Self, WalletError> {
        let keychain = KeyChain::from_seed(ctx, seed, config.network)?;
        Ok(Self { ctx, keychain, config })
    }

    pub fn context(&self) -> &'c CryptoContext {
        self.ctx
    }

    pub fn network(&self) -> Network {
        self.keychain.network()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Access the keychain (for signing operations).
    pub fn keychain(&self) -> &KeyChain {
        &self.keychain
    }

    /// Receiving address at `index`.
    pub fn address(&mut self, index: u32) -> Result<Address, WalletError> {
        Ok(self.keychain.address_at(self.ctx, index)?)
    }

    /// Derive the next receiving address.
    pub fn next_address(&mut self) -> Result<Address, WalletError> {
        Ok(self.keychain.next_address(self.ctx)?)
    }

    /// Spendable capacity of the address at `index`.
    pub async fn balance(
        &mut self,
        chain: &dyn ChainQuery,
        index: u32,
        cancel: &CancellationToken,
    ) -> Result<Balance, WalletError> {
        let address = self.address(index)?;
        self.selector()
            .balance(chain, &address.lock_script(), cancel)
            .await
    }

    /// Pay `amount` shannons from the address at `index` to `to`.
    pub async fn send(
        &mut self,
        chain: &dyn ChainQuery,
        index: u32,
        to: &str,
        amount: u64,
        cancel: &CancellationToken,
    ) -> Result<Hash256, WalletError> {
        let ctx = self.ctx;
        let from = self.address(index)?;
        let payment = Payment::new(&from.to_string(), to, amount, self.config.fee, &self.config)?;
        let key = self.keychain.private_key(ctx, index)?;
        let tx = payment.sign(ctx, chain, &key, cancel).await?;
        let hash = payment.send(chain, &tx).await?;
        info!(index, tx_hash = %hash, "wallet transfer sent");
        Ok(hash)
    }

    /// Encrypt the private key at `index` with the configured KDF and cipher.
    pub async fn export_keystore(&self, index: u32, password: &[u8]) -> Result<Keystore, WalletError> {
        let key = self.keychain.private_key(self.ctx, index)?;
        Keystore::encrypt_blocking(&key, password, self.config.keystore.kdf, self.config.keystore.cipher)
            .await
    }

    fn selector(&self) -> CoinSelector {
        CoinSelector::new(self.config.page_limit, self.config.retry)
    }
}

impl std::fmt::Debug for Wallet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.keychain.network())
            .field("addresses", &self.keychain.next_index())
            .field("fee", &self.config.fee)
            .finish()
    }
}
