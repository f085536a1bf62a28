//! Core data model: scripts, cells, witnesses and transactions.
//!
//! All capacities are in shannons (1 CKB = 10^8 shannons). JSON forms follow
//! the node's RPC schema: integers and byte strings are `0x`-prefixed hex.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{EncodingError, TransactionError};
use crate::hash::ckb_hash;
use crate::molecule::Pack;
use crate::serde_hex;

/// A 32-byte hash value: code hashes, transaction hashes, script hashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Copy a hash out of a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| EncodingError::InvalidLength {
            expected: 32,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a hex string, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        Self::from_slice(&serde_hex::decode(s)?)
    }

    /// Parse a 64-digit lowercase hex literal at compile time.
    pub const fn from_static_hex(s: &str) -> Self {
        const fn nibble(c: u8) -> u8 {
            match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                _ => panic!("invalid hex digit"),
            }
        }
        let b = s.as_bytes();
        assert!(b.len() == 64, "expected 64 hex digits");
        let mut out = [0u8; 32];
        let mut i = 0;
        while i < 32 {
            out[i] = (nibble(b[2 * i]) << 4) | nibble(b[2 * i + 1]);
            i += 1;
        }
        Self(out)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Hash256 {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// How a script's `code_hash` is matched against cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptHashType {
    #[default]
    Data,
    Type,
    Data1,
}

impl ScriptHashType {
    /// Single-byte wire encoding.
    pub fn as_byte(self) -> u8 {
        match self {
            ScriptHashType::Data => 0,
            ScriptHashType::Type => 1,
            ScriptHashType::Data1 => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, EncodingError> {
        match byte {
            0 => Ok(ScriptHashType::Data),
            1 => Ok(ScriptHashType::Type),
            2 => Ok(ScriptHashType::Data1),
            other => Err(EncodingError::UnknownHashType(other)),
        }
    }
}

/// A lock or type script reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Script {
    pub code_hash: Hash256,
    pub hash_type: ScriptHashType,
    #[serde(with = "serde_hex::bytes")]
    pub args: Vec<u8>,
}

impl Script {
    pub fn new(code_hash: Hash256, hash_type: ScriptHashType, args: Vec<u8>) -> Self {
        Self { code_hash, hash_type, args }
    }

    /// Hash of the canonical encoding.
    pub fn hash(&self) -> Hash256 {
        ckb_hash(&self.pack())
    }
}

/// Reference to an output of a previous transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: Hash256,
    #[serde(with = "serde_hex::hex_u32")]
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_hash: Hash256, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

/// A transaction input spending a previous output.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellInput {
    pub previous_output: OutPoint,
    /// Relative or absolute lock time; 0 when unused.
    #[serde(with = "serde_hex::hex_u64")]
    pub since: u64,
}

impl CellInput {
    pub fn new(previous_output: OutPoint, since: u64) -> Self {
        Self { previous_output, since }
    }
}

/// A cell created by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellOutput {
    /// Capacity in shannons.
    #[serde(with = "serde_hex::hex_u64")]
    pub capacity: u64,
    pub lock: Script,
    #[serde(rename = "type")]
    pub type_: Option<Script>,
}

impl CellOutput {
    pub fn new(capacity: u64, lock: Script) -> Self {
        Self { capacity, lock, type_: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepType {
    #[default]
    Code,
    DepGroup,
}

impl DepType {
    pub fn as_byte(self) -> u8 {
        match self {
            DepType::Code => 0,
            DepType::DepGroup => 1,
        }
    }
}

/// A cell dependency: code or a group of code cells referenced by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellDep {
    pub out_point: OutPoint,
    pub dep_type: DepType,
}

impl CellDep {
    pub fn new(out_point: OutPoint, dep_type: DepType) -> Self {
        Self { out_point, dep_type }
    }
}

/// Structured witness carrying per-group unlocking data.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct WitnessArgs {
    pub lock: Option<Vec<u8>>,
    pub input_type: Option<Vec<u8>>,
    pub output_type: Option<Vec<u8>>,
}

/// A witness before serialization: structured args or opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Witness {
    Args(WitnessArgs),
    Data(Vec<u8>),
}

impl Witness {
    /// Placeholder for the first input of a lock group.
    pub fn empty_lock() -> Self {
        Witness::Args(WitnessArgs::default())
    }

    /// Serialized form: packed `WitnessArgs` or the raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Witness::Args(args) => args.pack(),
            Witness::Data(data) => data.clone(),
        }
    }
}

/// The signed-over part of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(with = "serde_hex::hex_u32")]
    pub version: u32,
    pub cell_deps: Vec<CellDep>,
    pub header_deps: Vec<Hash256>,
    pub inputs: Vec<CellInput>,
    pub outputs: Vec<CellOutput>,
    #[serde(with = "serde_hex::bytes_vec")]
    pub outputs_data: Vec<Vec<u8>>,
}

impl RawTransaction {
    /// Assemble a raw transaction, checking that every output has a data entry.
    pub fn new(
        version: u32,
        cell_deps: Vec<CellDep>,
        header_deps: Vec<Hash256>,
        inputs: Vec<CellInput>,
        outputs: Vec<CellOutput>,
        outputs_data: Vec<Vec<u8>>,
    ) -> Result<Self, TransactionError> {
        if outputs.len() != outputs_data.len() {
            return Err(TransactionError::OutputsDataMismatch {
                outputs: outputs.len(),
                outputs_data: outputs_data.len(),
            });
        }
        Ok(Self { version, cell_deps, header_deps, inputs, outputs, outputs_data })
    }

    /// Transaction hash: hash of the packed raw transaction.
    pub fn hash(&self) -> Hash256 {
        ckb_hash(&self.pack())
    }

    /// Sum of output capacities.
    pub fn outputs_capacity(&self) -> Result<u64, TransactionError> {
        self.outputs.iter().try_fold(0u64, |acc, o| {
            acc.checked_add(o.capacity).ok_or(TransactionError::CapacityOverflow)
        })
    }
}

/// A transaction with placeholder witnesses, awaiting signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub raw: RawTransaction,
    pub witnesses: Vec<Witness>,
    /// Lock script of the cell spent by each input, in input order.
    pub input_locks: Vec<Script>,
}

impl UnsignedTransaction {
    pub fn new(raw: RawTransaction, witnesses: Vec<Witness>, input_locks: Vec<Script>) -> Self {
        Self { raw, witnesses, input_locks }
    }
}

/// A fully signed transaction ready for submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(flatten)]
    pub raw: RawTransaction,
    #[serde(with = "serde_hex::bytes_vec")]
    pub witnesses: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn new(raw: RawTransaction, witnesses: Vec<Vec<u8>>) -> Self {
        Self { raw, witnesses }
    }

    /// Transaction hash. Witnesses are not committed to.
    pub fn hash(&self) -> Hash256 {
        self.raw.hash()
    }
}

/// A live cell as reported by a chain query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub out_point: OutPoint,
    pub output: CellOutput,
    #[serde(rename = "output_data", with = "serde_hex::bytes")]
    pub data: Vec<u8>,
    #[serde(with = "serde_hex::hex_u64")]
    pub block_number: u64,
}

impl Cell {
    /// A cell that holds only capacity: no type script and no data.
    pub fn is_plain_capacity(&self) -> bool {
        self.output.type_.is_none() && self.data.is_empty()
    }
}
