//! Trait interfaces between the wallet engine and the outside world.
//!
//! - [`ChainQuery`]: live-cell listing and transaction submission, backed by
//!   a node's indexer RPC in production and by in-memory mocks in tests.
//!
//! The request and response types mirror the indexer's `get_cells` schema so a
//! transport only has to move them over the wire.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ChainError;
use crate::serde_hex;
use crate::types::{Cell, Hash256, Script, Transaction};

/// Which script of a cell the search key matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    #[default]
    Lock,
    Type,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchKey {
    pub script: Script,
    pub script_type: ScriptType,
}

impl SearchKey {
    /// Cells guarded by `lock`.
    pub fn lock(script: Script) -> Self {
        Self { script, script_type: ScriptType::Lock }
    }
}

/// Opaque pagination token. The empty cursor (`"0x"`) marks the last page.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Cursor(pub Vec<u8>);

impl Cursor {
    pub fn is_terminal(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_hex::bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_hex::bytes::deserialize(deserializer).map(Cursor)
    }
}

/// One `get_cells` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellsRequest {
    pub search_key: SearchKey,
    pub order: Order,
    #[serde(with = "serde_hex::hex_u32")]
    pub limit: u32,
    /// Cursor returned by the previous page; `None` for the first page.
    pub after: Option<Cursor>,
}

/// One page of live cells.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellsPage {
    pub objects: Vec<Cell>,
    pub last_cursor: Cursor,
}

/// Chain access the wallet engine needs.
///
/// Implementations must be safe to share across tasks; the wallet never
/// holds a borrow across pages.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// List one page of live cells matching the request.
    async fn get_cells(&self, request: &CellsRequest) -> Result<CellsPage, ChainError>;

    /// Submit a signed transaction, returning its hash as computed by the node.
    async fn send_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError>;
}
