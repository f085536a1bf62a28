//! Shared test helpers for E2E and integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use shannon_core::address::Network;
use shannon_core::error::ChainError;
use shannon_core::traits::{CellsPage, CellsRequest, ChainQuery, Cursor, Order};
use shannon_core::types::{Cell, CellOutput, Hash256, OutPoint, Script, Transaction};
use shannon_wallet::config::WalletConfig;
use shannon_wallet::keystore::Kdf;
use shannon_wallet::RetryPolicy;

/// BIP-39 test phrase with a well-known first receiving address.
pub const PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                          abandon abandon abandon abandon abandon about";

/// Testnet config with fast retries and light scrypt.
pub fn testnet_config() -> WalletConfig {
    let mut config = WalletConfig {
        network: Network::Testnet,
        retry: RetryPolicy { max_attempts: 3, initial_backoff_ms: 1, max_backoff_ms: 4 },
        ..WalletConfig::default()
    };
    config.keystore.kdf = Kdf::Scrypt { n: 1024, r: 8, p: 1 };
    config
}

/// In-memory chain holding a live cell set.
///
/// Pages are ordered by block number (ties by insertion). Submitted
/// transactions consume their inputs and create their outputs in a new block.
pub struct MockChain {
    state: Mutex<State>,
    /// Indexer-style cursors: never empty, the end is signalled by an empty page.
    sticky_cursor: bool,
}

#[derive(Default)]
struct State {
    cells: Vec<Cell>,
    height: u64,
    failures: VecDeque<ChainError>,
    submitted: Vec<Transaction>,
    get_cells_calls: usize,
}

impl MockChain {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()), sticky_cursor: false }
    }

    /// Chain whose cursors never become empty.
    pub fn with_sticky_cursor() -> Self {
        Self { sticky_cursor: true, ..Self::new() }
    }

    /// Add one plain cell per capacity, each in its own block.
    pub fn fund(&self, lock: &Script, capacities: &[u64]) {
        let mut state = self.state.lock();
        for &capacity in capacities {
            state.height += 1;
            let n = state.height;
            let mut tx_hash = [0u8; 32];
            tx_hash[..8].copy_from_slice(&n.to_be_bytes());
            state.cells.push(Cell {
                out_point: OutPoint::new(Hash256(tx_hash), 0),
                output: CellOutput::new(capacity, lock.clone()),
                data: Vec::new(),
                block_number: n,
            });
        }
    }

    /// Add an arbitrary cell.
    pub fn insert(&self, cell: Cell) {
        self.state.lock().cells.push(cell);
    }

    /// Fail the next `get_cells` calls with `errors`, in order.
    pub fn fail_next(&self, errors: Vec<ChainError>) {
        self.state.lock().failures.extend(errors);
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.state.lock().submitted.clone()
    }

    pub fn get_cells_calls(&self) -> usize {
        self.state.lock().get_cells_calls
    }

    pub fn live_cells(&self, lock: &Script) -> Vec<Cell> {
        self.state
            .lock()
            .cells
            .iter()
            .filter(|c| &c.output.lock == lock)
            .cloned()
            .collect()
    }

    /// Sum of all live capacity under `lock`.
    pub fn capacity_of(&self, lock: &Script) -> u64 {
        self.live_cells(lock).iter().map(|c| c.output.capacity).sum()
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_cursor(offset: usize) -> Cursor {
    Cursor((offset as u64).to_be_bytes().to_vec())
}

fn decode_cursor(cursor: &Cursor) -> usize {
    let mut bytes = [0u8; 8];
    let len = cursor.0.len().min(8);
    bytes[8 - len..].copy_from_slice(&cursor.0[..len]);
    u64::from_be_bytes(bytes) as usize
}

#[async_trait]
impl ChainQuery for MockChain {
    async fn get_cells(&self, request: &CellsRequest) -> Result<CellsPage, ChainError> {
        let mut state = self.state.lock();
        state.get_cells_calls += 1;
        if let Some(e) = state.failures.pop_front() {
            return Err(e);
        }

        let mut matching: Vec<Cell> = state
            .cells
            .iter()
            .filter(|c| c.output.lock == request.search_key.script)
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.block_number);
        if request.order == Order::Desc {
            matching.reverse();
        }

        let offset = request.after.as_ref().map(decode_cursor).unwrap_or(0);
        let end = offset.saturating_add(request.limit as usize).min(matching.len());
        let objects = matching.get(offset..end).map(<[Cell]>::to_vec).unwrap_or_default();
        let last_cursor = if self.sticky_cursor || end < matching.len() {
            encode_cursor(end.max(offset))
        } else {
            Cursor::default()
        };
        Ok(CellsPage { objects, last_cursor })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
        let mut state = self.state.lock();
        for input in &tx.raw.inputs {
            if !state.cells.iter().any(|c| c.out_point == input.previous_output) {
                return Err(ChainError::Rpc {
                    code: -301,
                    message: format!("dead cell {}", input.previous_output),
                });
            }
        }
        state
            .cells
            .retain(|c| !tx.raw.inputs.iter().any(|i| i.previous_output == c.out_point));

        let tx_hash = tx.hash();
        state.height += 1;
        let height = state.height;
        for (index, output) in tx.raw.outputs.iter().enumerate() {
            state.cells.push(Cell {
                out_point: OutPoint::new(tx_hash, index as u32),
                output: output.clone(),
                data: tx.raw.outputs_data.get(index).cloned().unwrap_or_default(),
                block_number: height,
            });
        }
        state.submitted.push(tx.clone());
        Ok(tx_hash)
    }
}

/// Live-cell source that never runs out.
///
/// Every page is full, each cell carries the next capacity from a repeating
/// pattern, and the cursor always points at another page.
pub struct EndlessChain {
    lock: Script,
    capacities: Vec<u64>,
    state: Mutex<EndlessState>,
}

#[derive(Default)]
struct EndlessState {
    served: usize,
    calls: usize,
    /// Running capacity total after each page.
    totals: Vec<u64>,
}

impl EndlessChain {
    /// `capacities` must be non-empty; it is cycled forever.
    pub fn new(lock: Script, capacities: Vec<u64>) -> Self {
        Self { lock, capacities, state: Mutex::new(EndlessState::default()) }
    }

    pub fn get_cells_calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn page_totals(&self) -> Vec<u64> {
        self.state.lock().totals.clone()
    }
}

#[async_trait]
impl ChainQuery for EndlessChain {
    async fn get_cells(&self, request: &CellsRequest) -> Result<CellsPage, ChainError> {
        let mut state = self.state.lock();
        state.calls += 1;
        let mut total = state.totals.last().copied().unwrap_or(0);
        let mut objects = Vec::with_capacity(request.limit as usize);
        for _ in 0..request.limit.max(1) {
            let n = state.served;
            state.served += 1;
            let capacity = self.capacities[n % self.capacities.len()];
            total += capacity;
            let mut tx_hash = [0xEE; 32];
            tx_hash[..8].copy_from_slice(&(n as u64).to_be_bytes());
            objects.push(Cell {
                out_point: OutPoint::new(Hash256(tx_hash), 0),
                output: CellOutput::new(capacity, self.lock.clone()),
                data: Vec::new(),
                block_number: u64::MAX - n as u64,
            });
        }
        state.totals.push(total);
        Ok(CellsPage { objects, last_cursor: encode_cursor(state.served) })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
        Ok(tx.hash())
    }
}
