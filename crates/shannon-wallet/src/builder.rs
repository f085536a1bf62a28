//! Unsigned transfer assembly.
//!
//! Turns a [`CoinSelection`] into an [`UnsignedTransaction`]: one cell dep
//! for the default lock, the payment output, an optional change output and
//! one placeholder witness per input. Signing happens in [`crate::signer`].

use shannon_core::address::Network;
use shannon_core::constants::secp256k1_dep_group;
use shannon_core::error::TransactionError;
use shannon_core::types::{
    CellDep, CellInput, CellOutput, RawTransaction, Script, UnsignedTransaction, Witness,
};

use crate::coin_selection::CoinSelection;

/// Builds plain capacity transfers from selected cells.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    cell_dep: CellDep,
}

impl TransactionBuilder {
    /// Builder using the default lock's dep group on `network`.
    pub fn for_network(network: Network) -> Self {
        Self::new(secp256k1_dep_group(network))
    }

    /// Builder with an explicit lock script cell dep, e.g. for a dev chain.
    pub fn new(cell_dep: CellDep) -> Self {
        Self { cell_dep }
    }

    /// Assemble the transfer of `amount` from `sender` to `recipient`.
    ///
    /// `None` selections map to `InsufficientBalance` for `amount + fee`.
    pub fn build(
        &self,
        selection: Option<&CoinSelection>,
        sender: &Script,
        recipient: &Script,
        amount: u64,
        fee: u64,
    ) -> Result<UnsignedTransaction, TransactionError> {
        let required = amount
            .checked_add(fee)
            .ok_or(TransactionError::CapacityOverflow)?;
        let selection = match selection {
            Some(selection) if !selection.cells.is_empty() => selection,
            _ => return Err(TransactionError::InsufficientBalance { required }),
        };
        let expected_total = required
            .checked_add(selection.change)
            .ok_or(TransactionError::CapacityOverflow)?;
        if selection.total_capacity != expected_total {
            return Err(TransactionError::InsufficientBalance { required });
        }

        let inputs: Vec<CellInput> = selection
            .cells
            .iter()
            .map(|cell| CellInput::new(cell.out_point.clone(), 0))
            .collect();

        let mut outputs = vec![CellOutput::new(amount, recipient.clone())];
        if selection.change > 0 {
            outputs.push(CellOutput::new(selection.change, sender.clone()));
        }
        let outputs_data = vec![Vec::new(); outputs.len()];

        let witnesses: Vec<Witness> = (0..inputs.len())
            .map(|i| if i == 0 { Witness::empty_lock() } else { Witness::Data(Vec::new()) })
            .collect();
        let input_locks = vec![sender.clone(); inputs.len()];

        let raw = RawTransaction::new(
            0,
            vec![self.cell_dep.clone()],
            Vec::new(),
            inputs,
            outputs,
            outputs_data,
        )?;
        Ok(UnsignedTransaction::new(raw, witnesses, input_locks))
    }
}
