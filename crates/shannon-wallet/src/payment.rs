//! One-shot transfer between two addresses.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shannon_core::address::Address;
use shannon_core::constants::MIN_CELL_CAPACITY;
use shannon_core::crypto::{CryptoContext, PrivateKey};
use shannon_core::error::TransactionError;
use shannon_core::traits::ChainQuery;
use shannon_core::types::{CellDep, Hash256, Transaction, UnsignedTransaction};

use crate::builder::TransactionBuilder;
use crate::coin_selection::CoinSelector;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::signer::sign_transaction;

/// A transfer of `amount` shannons from one address to another.
#[derive(Clone, Debug)]
pub struct Payment {
    sender: Address,
    recipient: Address,
    amount: u64,
    fee: u64,
    selector: CoinSelector,
    builder: TransactionBuilder,
}

impl Payment {
    /// Validate both addresses and the amount.
    ///
    /// Only senders locked by the default secp256k1 script can be spent; the
    /// recipient may use any lock.
    pub fn new(
        from: &str,
        to: &str,
        amount: u64,
        fee: u64,
        config: &WalletConfig,
    ) -> Result<Self, WalletError> {
        let sender = Address::decode(from)?;
        let recipient = Address::decode(to)?;
        if !sender.is_default_lock() {
            return Err(TransactionError::UnsupportedSenderLock.into());
        }
        if amount < MIN_CELL_CAPACITY {
            return Err(TransactionError::AmountBelowMinimum {
                amount,
                minimum: MIN_CELL_CAPACITY,
            }
            .into());
        }
        Ok(Self {
            builder: TransactionBuilder::for_network(sender.network()),
            selector: CoinSelector::new(config.page_limit, config.retry),
            sender,
            recipient,
            amount,
            fee,
        })
    }

    /// Use `cell_dep` instead of the network's default lock dep group.
    pub fn with_cell_dep(mut self, cell_dep: CellDep) -> Self {
        self.builder = TransactionBuilder::new(cell_dep);
        self
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    /// Select the sender's cells and assemble the unsigned transfer.
    pub async fn build(
        &self,
        chain: &dyn ChainQuery,
        cancel: &CancellationToken,
    ) -> Result<UnsignedTransaction, WalletError> {
        let sender_lock = self.sender.lock_script();
        let selection = self
            .selector
            .select(chain, &sender_lock, self.amount, self.fee, cancel)
            .await?;
        let tx = self.builder.build(
            selection.as_ref(),
            &sender_lock,
            &self.recipient.lock_script(),
            self.amount,
            self.fee,
        )?;
        Ok(tx)
    }

    /// Build and sign with `key`, which must own the sender address.
    pub async fn sign(
        &self,
        ctx: &CryptoContext,
        chain: &dyn ChainQuery,
        key: &PrivateKey,
        cancel: &CancellationToken,
    ) -> Result<Transaction, WalletError> {
        if ctx.public_key(key)?.blake160() != self.sender.args() {
            return Err(TransactionError::KeyAddressMismatch.into());
        }
        let unsigned = self.build(chain, cancel).await?;
        sign_transaction(ctx, unsigned, key)
    }

    /// Submit a signed transaction, returning the hash reported by the node.
    pub async fn send(&self, chain: &dyn ChainQuery, tx: &Transaction) -> Result<Hash256, WalletError> {
        let local = tx.hash();
        let remote = chain.send_transaction(tx).await?;
        if remote != local {
            warn!(%local, %remote, "node reported a different transaction hash");
        }
        info!(tx_hash = %remote, amount = self.amount, to = %self.recipient, "submitted transfer");
        Ok(remote)
    }
}
