//! Live-cell coin selection.
//!
//! Pages through the sender's live cells newest-first and accumulates
//! capacity until the target is covered **and** the leftover is either zero
//! or large enough to fund a change cell. A leftover strictly between zero
//! and [`MIN_CELL_CAPACITY`] would produce an unspendable change output, so
//! collection continues past it.
//!
//! Cells carrying a type script or data are never spent by a plain transfer.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shannon_core::constants::MIN_CELL_CAPACITY;
use shannon_core::error::TransactionError;
use shannon_core::traits::{CellsPage, CellsRequest, ChainQuery, Cursor, Order, SearchKey};
use shannon_core::types::{Cell, Script};

use crate::error::WalletError;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Bounded exponential backoff for transient chain-query failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff_ms: 200, max_backoff_ms: 2_000 }
    }
}

impl RetryPolicy {
    /// Fail on the first error.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Cells chosen to fund a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected cells in collection order.
    pub cells: Vec<Cell>,
    /// Sum of the selected cells' capacity.
    pub total_capacity: u64,
    /// `total_capacity - amount - fee`; zero or at least the minimum cell capacity.
    pub change: u64,
}

/// Spendable capacity behind one lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    /// Total capacity in shannons.
    pub capacity: u64,
    /// Number of plain capacity cells.
    pub cells: usize,
}

/// Leftover after covering `target`, if collection may stop at `collected`.
pub fn acceptable_change(collected: u64, target: u64) -> Option<u64> {
    let leftover = collected.checked_sub(target)?;
    (leftover == 0 || leftover >= MIN_CELL_CAPACITY).then_some(leftover)
}

/// Sequential, cancellable coin selector over a [`ChainQuery`].
#[derive(Clone, Debug)]
pub struct CoinSelector {
    page_limit: u32,
    retry: RetryPolicy,
}

impl Default for CoinSelector {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, RetryPolicy::default())
    }
}

impl CoinSelector {
    pub fn new(page_limit: u32, retry: RetryPolicy) -> Self {
        Self { page_limit: page_limit.max(1), retry }
    }

    /// Collect cells locked by `lock` worth `amount + fee`.
    ///
    /// Returns `Ok(None)` when the live cells run out first. Cancelling
    /// `cancel` abandons the walk between or during page fetches.
    pub async fn select(
        &self,
        chain: &dyn ChainQuery,
        lock: &Script,
        amount: u64,
        fee: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<CoinSelection>, WalletError> {
        let target = amount
            .checked_add(fee)
            .ok_or(TransactionError::CapacityOverflow)?;
        let mut cells = Vec::new();
        let mut collected = 0u64;
        let mut cursor: Option<Cursor> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(WalletError::Cancelled);
            }
            let request = CellsRequest {
                search_key: SearchKey::lock(lock.clone()),
                order: Order::Desc,
                limit: self.page_limit,
                after: cursor.take(),
            };
            let page = self.fetch_page(chain, &request, cancel).await?;
            debug!(cells = page.objects.len(), "fetched live cell page");
            let exhausted = page.objects.is_empty() || page.last_cursor.is_terminal();

            for cell in page.objects {
                if !cell.is_plain_capacity() {
                    debug!(out_point = %cell.out_point, "skipping cell with type script or data");
                    continue;
                }
                collected = collected
                    .checked_add(cell.output.capacity)
                    .ok_or(TransactionError::CapacityOverflow)?;
                cells.push(cell);
                if let Some(change) = acceptable_change(collected, target) {
                    info!(inputs = cells.len(), collected, change, "selected cells");
                    return Ok(Some(CoinSelection { cells, total_capacity: collected, change }));
                }
            }

            if exhausted {
                info!(collected, required = target, "live cells exhausted before target");
                return Ok(None);
            }
            cursor = Some(page.last_cursor);
        }
    }

    /// Sum every plain capacity cell locked by `lock`.
    pub async fn balance(
        &self,
        chain: &dyn ChainQuery,
        lock: &Script,
        cancel: &CancellationToken,
    ) -> Result<Balance, WalletError> {
        let mut balance = Balance::default();
        let mut cursor: Option<Cursor> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(WalletError::Cancelled);
            }
            let request = CellsRequest {
                search_key: SearchKey::lock(lock.clone()),
                order: Order::Desc,
                limit: self.page_limit,
                after: cursor.take(),
            };
            let page = self.fetch_page(chain, &request, cancel).await?;
            let exhausted = page.objects.is_empty() || page.last_cursor.is_terminal();
            for cell in page.objects.iter().filter(|c| c.is_plain_capacity()) {
                balance.capacity = balance
                    .capacity
                    .checked_add(cell.output.capacity)
                    .ok_or(TransactionError::CapacityOverflow)?;
                balance.cells += 1;
            }
            if exhausted {
                return Ok(balance);
            }
            cursor = Some(page.last_cursor);
        }
    }

    async fn fetch_page(
        &self,
        chain: &dyn ChainQuery,
        request: &CellsRequest,
        cancel: &CancellationToken,
    ) -> Result<CellsPage, WalletError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WalletError::Cancelled),
                result = chain.get_cells(request) => result,
            };
            match result {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "get_cells failed: {e}; retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(WalletError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
