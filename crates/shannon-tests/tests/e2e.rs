//! End-to-end tests: mnemonic recovery through signed, submitted transfers.
//!
//! Each test recovers a wallet from a fixed phrase, funds it on an
//! in-memory chain and drives the public API the way an embedding
//! application would.

use tokio_util::sync::CancellationToken;

use shannon_core::address::Address;
use shannon_core::constants::{MIN_CELL_CAPACITY, SHANNONS_PER_CKB, SIGNATURE_SIZE};
use shannon_core::crypto::{CryptoContext, PublicKey};
use shannon_core::error::{ChainError, TransactionError};
use shannon_core::types::{Cell, CellOutput, Hash256, OutPoint, Transaction, UnsignedTransaction, Witness};
use shannon_tests::helpers::*;
use shannon_wallet::{signing_messages, Balance, Payment, Wallet, WalletError};

const CKB: u64 = SHANNONS_PER_CKB;

fn wallet() -> Wallet<'static> {
    Wallet::from_mnemonic(CryptoContext::shared(), PHRASE, "", testnet_config()).unwrap()
}

/// Recover the key that signed the first lock group of `tx`.
fn signer_of(tx: &Transaction, sender: &Address) -> PublicKey {
    let ctx = CryptoContext::shared();
    let witnesses: Vec<Witness> = (0..tx.raw.inputs.len())
        .map(|i| if i == 0 { Witness::empty_lock() } else { Witness::Data(tx.witnesses[i].clone()) })
        .collect();
    let locks = vec![sender.lock_script(); tx.raw.inputs.len()];
    let unsigned = UnsignedTransaction::new(tx.raw.clone(), witnesses, locks);
    let message = signing_messages(&unsigned).unwrap()[0].message;

    let mut signature = [0u8; SIGNATURE_SIZE];
    signature.copy_from_slice(&tx.witnesses[0][20..20 + SIGNATURE_SIZE]);
    ctx.recover(&message, &signature).unwrap()
}

#[tokio::test]
async fn e2e_send_and_verify_signer() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    let recipient = wallet.address(1).unwrap();
    chain.fund(&sender.lock_script(), &[1_000 * CKB]);

    let hash = wallet
        .send(&chain, 0, &recipient.to_string(), 250 * CKB, &CancellationToken::new())
        .await
        .unwrap();

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 1);
    let tx = &submitted[0];
    assert_eq!(tx.hash(), hash);

    let ctx = wallet.context();
    let expected = ctx.public_key(&wallet.keychain().private_key(ctx, 0).unwrap()).unwrap();
    assert_eq!(signer_of(tx, &sender), expected);
    assert_eq!(expected.blake160(), sender.args());
}

#[tokio::test]
async fn e2e_balances_follow_transfers() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    let recipient = wallet.address(1).unwrap();
    chain.fund(&sender.lock_script(), &[300 * CKB, 300 * CKB]);
    let fee = wallet.config().fee;
    let cancel = CancellationToken::new();

    wallet.send(&chain, 0, &recipient.to_string(), 100 * CKB, &cancel).await.unwrap();

    let sender_balance = wallet.balance(&chain, 0, &cancel).await.unwrap();
    let recipient_balance = wallet.balance(&chain, 1, &cancel).await.unwrap();
    assert_eq!(sender_balance.capacity, 500 * CKB - fee);
    assert_eq!(recipient_balance, Balance { capacity: 100 * CKB, cells: 1 });

    // Capacity is conserved apart from the fee.
    let total = chain.capacity_of(&sender.lock_script()) + chain.capacity_of(&recipient.lock_script());
    assert_eq!(total, 600 * CKB - fee);
}

#[tokio::test]
async fn e2e_chained_transfers_spend_change() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    let recipient = wallet.address(1).unwrap().to_string();
    chain.fund(&sender.lock_script(), &[1_000 * CKB]);
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        wallet.send(&chain, 0, &recipient, 100 * CKB, &cancel).await.unwrap();
    }

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 3);
    // Each transfer spends the change cell created by the previous one.
    for pair in submitted.windows(2) {
        assert_eq!(pair[1].raw.inputs[0].previous_output, OutPoint::new(pair[0].hash(), 1));
    }
    let fee = wallet.config().fee;
    assert_eq!(chain.capacity_of(&sender.lock_script()), 700 * CKB - 3 * fee);
}

#[tokio::test]
async fn e2e_selection_spans_pages() {
    let mut config = testnet_config();
    config.page_limit = 2;
    let mut wallet = Wallet::from_mnemonic(CryptoContext::shared(), PHRASE, "", config).unwrap();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[70 * CKB; 5]);

    let to = wallet.address(1).unwrap().to_string();
    wallet.send(&chain, 0, &to, 200 * CKB, &CancellationToken::new()).await.unwrap();

    let submitted = chain.submitted();
    let tx = &submitted[0];
    // 210 CKB would leave unspendable change; the fourth cell fixes that.
    assert_eq!(tx.raw.inputs.len(), 4);
    assert_eq!(tx.witnesses.len(), 4);
    assert_eq!(tx.witnesses[0].len(), 85);
    assert!(tx.witnesses[1..].iter().all(Vec::is_empty));
    assert_eq!(chain.get_cells_calls(), 2);
}

#[tokio::test]
async fn e2e_newest_cells_are_spent_first() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[500 * CKB, 500 * CKB]);
    let newest = chain.live_cells(&sender.lock_script())[1].out_point.clone();

    let to = wallet.address(1).unwrap().to_string();
    wallet.send(&chain, 0, &to, 100 * CKB, &CancellationToken::new()).await.unwrap();
    assert_eq!(chain.submitted()[0].raw.inputs[0].previous_output, newest);
}

#[tokio::test]
async fn e2e_indexer_cursor_ends_on_empty_page() {
    let mut wallet = wallet();
    let chain = MockChain::with_sticky_cursor();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[80 * CKB]);

    let to = wallet.address(1).unwrap().to_string();
    let err = wallet
        .send(&chain, 0, &to, 100 * CKB, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::Transaction(TransactionError::InsufficientBalance {
            required: 100 * CKB + wallet.config().fee
        })
    );
    assert_eq!(chain.get_cells_calls(), 2);
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn e2e_cells_with_data_are_never_spent() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.insert(Cell {
        out_point: OutPoint::new(Hash256([0xDA; 32]), 0),
        output: CellOutput::new(10_000 * CKB, sender.lock_script()),
        data: b"udt".to_vec(),
        block_number: 99,
    });
    chain.fund(&sender.lock_script(), &[200 * CKB]);

    let to = wallet.address(1).unwrap().to_string();
    wallet.send(&chain, 0, &to, 100 * CKB, &CancellationToken::new()).await.unwrap();
    let submitted = chain.submitted();
    let tx = &submitted[0];
    assert_eq!(tx.raw.inputs.len(), 1);
    assert_ne!(tx.raw.inputs[0].previous_output.tx_hash, Hash256([0xDA; 32]));
}

#[tokio::test]
async fn e2e_transient_failures_recover() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[500 * CKB]);
    chain.fail_next(vec![ChainError::Timeout, ChainError::Transport("reset".into())]);

    let to = wallet.address(1).unwrap().to_string();
    wallet.send(&chain, 0, &to, 100 * CKB, &CancellationToken::new()).await.unwrap();
    assert_eq!(chain.get_cells_calls(), 3);
    assert_eq!(chain.submitted().len(), 1);
}

#[tokio::test]
async fn e2e_persistent_failure_surfaces() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[500 * CKB]);
    chain.fail_next(vec![ChainError::Timeout; 3]);

    let to = wallet.address(1).unwrap().to_string();
    let err = wallet
        .send(&chain, 0, &to, 100 * CKB, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::Chain(ChainError::Timeout));
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn e2e_cancelled_send_submits_nothing() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[500 * CKB]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let to = wallet.address(1).unwrap().to_string();
    let err = wallet.send(&chain, 0, &to, 100 * CKB, &cancel).await.unwrap_err();
    assert_eq!(err, WalletError::Cancelled);
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn e2e_double_spend_rejected_by_chain() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[500 * CKB]);
    let ctx = wallet.context();
    let key = wallet.keychain().private_key(ctx, 0).unwrap();
    let to = wallet.address(1).unwrap().to_string();

    let payment = Payment::new(&sender.to_string(), &to, 100 * CKB, 1_000, wallet.config()).unwrap();
    let tx = payment.sign(ctx, &chain, &key, &CancellationToken::new()).await.unwrap();
    payment.send(&chain, &tx).await.unwrap();

    let err = payment.send(&chain, &tx).await.unwrap_err();
    assert!(matches!(err, WalletError::Chain(ChainError::Rpc { code: -301, .. })));
}

#[tokio::test]
async fn e2e_payment_from_imported_keystore() {
    let mut wallet = wallet();
    let chain = MockChain::new();
    let sender = wallet.address(0).unwrap();
    chain.fund(&sender.lock_script(), &[500 * CKB]);

    let json = wallet.export_keystore(0, b"correct horse").await.unwrap().to_json().unwrap();
    let key = shannon_wallet::Keystore::from_json(&json)
        .unwrap()
        .decrypt_blocking(b"correct horse")
        .await
        .unwrap();

    let to = wallet.address(1).unwrap().to_string();
    let payment = Payment::new(&sender.to_string(), &to, MIN_CELL_CAPACITY, 1_000, wallet.config()).unwrap();
    let tx = payment
        .sign(wallet.context(), &chain, &key, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(signer_of(&tx, &sender).blake160(), sender.args());
}

#[tokio::test]
async fn e2e_mainnet_wallet_uses_mainnet_addresses() {
    let config = shannon_wallet::WalletConfig::default();
    let mut wallet = Wallet::from_mnemonic(CryptoContext::shared(), PHRASE, "", config).unwrap();
    let address = wallet.address(0).unwrap();
    assert_eq!(address.to_string(), "ckb1qyqpjmmvrusl0klsm7q52wdcgqzelt96lsjqvr9fh0");
    assert_eq!(
        hex::encode(address.args()),
        "196f6c1f21f7dbf0df814539b840059facbafc24"
    );
}
