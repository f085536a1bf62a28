//! Protocol constants. All capacities in shannons (1 CKB = 10^8 shannons).

use crate::address::Network;
use crate::types::{CellDep, DepType, Hash256, OutPoint, Script, ScriptHashType};

pub const SHANNONS_PER_CKB: u64 = 100_000_000;

/// Smallest capacity a cell guarded by the default lock can hold.
pub const MIN_CELL_CAPACITY: u64 = 61 * SHANNONS_PER_CKB;

/// Flat fee used when the caller does not specify one.
pub const DEFAULT_FEE: u64 = 1_000;

/// Recoverable secp256k1 signature: r || s || recovery id.
pub const SIGNATURE_SIZE: usize = 65;

pub const BLAKE160_LEN: usize = 20;

pub const CKB_HASH_PERSONALIZATION: &[u8; 16] = b"ckb-default-hash";

/// BIP-44 coin type registered for CKB.
pub const CKB_COIN_TYPE: u32 = 309;

/// Type hash of the secp256k1/blake160 sighash-all lock.
pub const SECP256K1_BLAKE160_SIGHASH_ALL_TYPE_HASH: Hash256 =
    Hash256::from_static_hex("9bd7e06f3ecf4be0f2fcd2188b23f1b9fcc88e5d4b65a8637b17723bbda3cce8");

const MAINNET_SECP256K1_DEP_GROUP_TX: Hash256 =
    Hash256::from_static_hex("71a7ba8fc96349fea0ed3a5c47992e3b4084b031a42264a018e0072e8172e46c");

const TESTNET_SECP256K1_DEP_GROUP_TX: Hash256 =
    Hash256::from_static_hex("f8de3bb47d055cdf460d93a2a6e1b05f7432f9777c8c474abf4eec1d4aee5d37");

/// Cell dep bundling the default lock's code and the secp256k1 data cell.
pub fn secp256k1_dep_group(network: Network) -> CellDep {
    let tx_hash = match network {
        Network::Mainnet => MAINNET_SECP256K1_DEP_GROUP_TX,
        Network::Testnet => TESTNET_SECP256K1_DEP_GROUP_TX,
    };
    CellDep::new(OutPoint::new(tx_hash, 0), DepType::DepGroup)
}

/// Default lock guarding cells owned by `args` (a blake160 public key hash).
pub fn default_lock(args: [u8; BLAKE160_LEN]) -> Script {
    Script::new(
        SECP256K1_BLAKE160_SIGHASH_ALL_TYPE_HASH,
        ScriptHashType::Type,
        args.to_vec(),
    )
}
