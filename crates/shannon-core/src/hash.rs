//! BLAKE2b-256 personalized with `ckb-default-hash`.
//!
//! Every protocol hash goes through here: script hashes, transaction hashes,
//! signing messages and the blake160 public key digest used in lock args.

use blake2b_ref::{Blake2b, Blake2bBuilder};

use crate::constants::{BLAKE160_LEN, CKB_HASH_PERSONALIZATION};
use crate::types::Hash256;

/// Incremental hasher with the protocol personalization.
pub fn new_blake2b() -> Blake2b {
    Blake2bBuilder::new(32)
        .personal(CKB_HASH_PERSONALIZATION)
        .build()
}

pub fn ckb_hash(data: &[u8]) -> Hash256 {
    let mut hasher = new_blake2b();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    Hash256(out)
}

/// First 20 bytes of [`ckb_hash`].
pub fn blake160(data: &[u8]) -> [u8; BLAKE160_LEN] {
    let mut out = [0u8; BLAKE160_LEN];
    out.copy_from_slice(&ckb_hash(data).0[..BLAKE160_LEN]);
    out
}
