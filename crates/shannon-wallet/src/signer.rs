//! Sighash-all signing for the default secp256k1/blake160 lock.
//!
//! Inputs are grouped by lock script. For every group the first witness
//! carries the signature in its `lock` field; the message covers the
//! transaction hash, that witness with a zeroed 65-byte lock, and every
//! other witness of the group:
//!
//! ```text
//! message = hash(tx_hash || len(w0) || w0 || len(w1) || w1 || ...)
//! ```
//!
//! Lengths are little-endian `u64`.

use std::collections::HashMap;
use tracing::info;

use shannon_core::constants::SIGNATURE_SIZE;
use shannon_core::crypto::{CryptoContext, PrivateKey};
use shannon_core::error::TransactionError;
use shannon_core::hash::new_blake2b;
use shannon_core::molecule::Pack;
use shannon_core::types::{Hash256, Script, Transaction, UnsignedTransaction, Witness, WitnessArgs};

use crate::error::WalletError;

/// Digest to sign for one lock group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMessage {
    pub lock: Script,
    /// Input indices in the group; the first holds the signature.
    pub indices: Vec<usize>,
    /// Leading witness with the zeroed signature placeholder.
    pub placeholder: WitnessArgs,
    pub message: [u8; 32],
}

/// Compute the signing message of every lock group, in first-input order.
pub fn signing_messages(tx: &UnsignedTransaction) -> Result<Vec<GroupMessage>, TransactionError> {
    let inputs = tx.raw.inputs.len();
    if tx.witnesses.len() != inputs {
        return Err(TransactionError::InvalidWitnessCount {
            inputs,
            witnesses: tx.witnesses.len(),
        });
    }
    if tx.input_locks.len() != inputs {
        return Err(TransactionError::InputLockCountMismatch {
            inputs,
            locks: tx.input_locks.len(),
        });
    }

    let tx_hash = tx.raw.hash();
    lock_groups(&tx.input_locks)
        .into_iter()
        .map(|(lock, indices)| -> Result<GroupMessage, TransactionError> {
            let leader = indices[0];
            let placeholder = with_zeroed_lock(&tx.witnesses[leader], leader)?;
            let message = group_message(&tx_hash, &placeholder, &indices[1..], &tx.witnesses);
            Ok(GroupMessage { lock: lock.clone(), indices, placeholder, message })
        })
        .collect()
}

/// Sign every lock group with `key` and assemble the final transaction.
///
/// The key is only borrowed for the duration of the call.
pub fn sign_transaction(
    ctx: &CryptoContext,
    tx: UnsignedTransaction,
    key: &PrivateKey,
) -> Result<Transaction, WalletError> {
    let groups = signing_messages(&tx)?;
    let mut witnesses: Vec<Vec<u8>> = tx.witnesses.iter().map(Witness::to_bytes).collect();

    for group in groups {
        let signature = ctx.sign_recoverable(key, &group.message)?;
        let mut args = group.placeholder;
        args.lock = Some(signature.to_vec());
        witnesses[group.indices[0]] = args.pack();
    }

    let signed = Transaction::new(tx.raw, witnesses);
    info!(tx_hash = %signed.hash(), inputs = signed.raw.inputs.len(), "signed transaction");
    Ok(signed)
}

/// Input indices grouped by lock script, groups in order of first appearance.
fn lock_groups(locks: &[Script]) -> Vec<(&Script, Vec<usize>)> {
    let mut groups: Vec<(&Script, Vec<usize>)> = Vec::new();
    let mut position: HashMap<&Script, usize> = HashMap::new();
    for (index, lock) in locks.iter().enumerate() {
        match position.get(lock) {
            Some(&g) => groups[g].1.push(index),
            None => {
                position.insert(lock, groups.len());
                groups.push((lock, vec![index]));
            }
        }
    }
    groups
}

/// The group leader's witness with a zero-filled signature slot.
fn with_zeroed_lock(witness: &Witness, index: usize) -> Result<WitnessArgs, TransactionError> {
    let mut args = match witness {
        Witness::Args(args) => args.clone(),
        Witness::Data(data) if data.is_empty() => WitnessArgs::default(),
        Witness::Data(_) => return Err(TransactionError::InvalidWitness { index }),
    };
    args.lock = Some(vec![0u8; SIGNATURE_SIZE]);
    Ok(args)
}

fn group_message(
    tx_hash: &Hash256,
    placeholder: &WitnessArgs,
    others: &[usize],
    witnesses: &[Witness],
) -> [u8; 32] {
    let mut hasher = new_blake2b();
    hasher.update(tx_hash.as_bytes());
    let leader = placeholder.pack();
    hasher.update(&(leader.len() as u64).to_le_bytes());
    hasher.update(&leader);
    for &index in others {
        let bytes = witnesses[index].to_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    let mut message = [0u8; 32];
    hasher.finalize(&mut message);
    message
}
