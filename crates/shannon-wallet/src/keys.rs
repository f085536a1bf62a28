//! Seed management and hierarchical deterministic key derivation.
//!
//! Master keys come from `HMAC-SHA512("Bitcoin seed", seed)`; children are
//! derived with the standard secp256k1 tweak-add scheme, so any BIP-32
//! wallet reproduces the same keys. [`KeyChain`] walks the BIP-44 receiving
//! chain for coin type 309 (`m/44'/309'/0'/0/i`).

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use shannon_core::address::{Address, Network};
use shannon_core::constants::{BLAKE160_LEN, CKB_COIN_TYPE};
use shannon_core::crypto::{CryptoContext, PrivateKey, PublicKey};
use shannon_core::error::KeyDerivationError;

type HmacSha512 = Hmac<Sha512>;

/// Key for the master-key HMAC.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// Bit set on the serialized index of a hardened child.
pub const HARDENED_BIT: u32 = 0x8000_0000;

pub const MIN_SEED_LEN: usize = 16;
pub const MAX_SEED_LEN: usize = 64;

/// Seed bytes for master-key generation, 16 to 64 bytes long.
///
/// Secret material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: Vec<u8>,
}

impl Seed {
    /// Generate a random 32-byte seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyDerivationError> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            return Err(KeyDerivationError::InvalidSeedLength(bytes.len()));
        }
        Ok(Self { bytes: bytes.to_vec() })
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes.clone() }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One step of a derivation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChildNumber {
    index: u32,
    hardened: bool,
}

impl ChildNumber {
    pub fn normal(index: u32) -> Result<Self, KeyDerivationError> {
        Self::new(index, false)
    }

    pub fn hardened(index: u32) -> Result<Self, KeyDerivationError> {
        Self::new(index, true)
    }

    fn new(index: u32, hardened: bool) -> Result<Self, KeyDerivationError> {
        if index >= HARDENED_BIT {
            return Err(KeyDerivationError::InvalidIndex(index));
        }
        Ok(Self { index, hardened })
    }

    /// Index without the hardened bit.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// Serialized form fed into the child HMAC.
    pub fn to_u32(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED_BIT
        } else {
            self.index
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A parsed derivation path such as `m/44'/309'/0'/0/0`.
///
/// `"m"`, `"/"` and `""` all denote the empty path. Hardened steps may be
/// marked with `'`, `h` or `H`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// `m/44'/309'/0'/0/index`.
    pub fn ckb_receiving(index: u32) -> Result<Self, KeyDerivationError> {
        let mut path = Self::ckb_account_chain()?;
        path.0.push(ChildNumber::normal(index)?);
        Ok(path)
    }

    /// `m/44'/309'/0'/0`, the parent of every receiving key.
    pub fn ckb_account_chain() -> Result<Self, KeyDerivationError> {
        Ok(Self(vec![
            ChildNumber::hardened(44)?,
            ChildNumber::hardened(CKB_COIN_TYPE)?,
            ChildNumber::hardened(0)?,
            ChildNumber::normal(0)?,
        ]))
    }

    pub fn steps(&self) -> &[ChildNumber] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for DerivationPath {
    type Err = KeyDerivationError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let rest = path.strip_prefix('m').unwrap_or(path);
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::default());
        }
        rest.split('/')
            .map(|segment| parse_segment(segment, path))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

fn parse_segment(segment: &str, path: &str) -> Result<ChildNumber, KeyDerivationError> {
    let invalid = || KeyDerivationError::InvalidPath(path.to_string());
    let (digits, hardened) = match segment.strip_suffix(['\'', 'h', 'H']) {
        Some(digits) => (digits, true),
        None => (segment, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let index: u32 = digits.parse().map_err(|_| invalid())?;
    ChildNumber::new(index, hardened).map_err(|_| invalid())
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

/// A node of the derivation tree: key material plus chain code.
///
/// A neutered key has no private half and can only derive normal children.
#[derive(Clone)]
pub struct ExtendedKey {
    private_key: Option<PrivateKey>,
    public_key: PublicKey,
    chain_code: [u8; 32],
    depth: u8,
    child_number: Option<ChildNumber>,
    parent_fingerprint: u32,
    fingerprint: u32,
}

impl ExtendedKey {
    /// Master key for a seed.
    pub fn from_seed(ctx: &CryptoContext, seed: &Seed) -> Result<Self, KeyDerivationError> {
        let mut digest = hmac_sha512(MASTER_HMAC_KEY, &[seed.as_bytes()])?;
        let result = PrivateKey::from_slice(&digest[..32])
            .map_err(|_| KeyDerivationError::InvalidSeed)
            .and_then(|key| {
                let mut chain_code = [0u8; 32];
                chain_code.copy_from_slice(&digest[32..]);
                Self::from_parts(ctx, Some(key), None, chain_code, 0, None, 0)
            });
        digest.zeroize();
        result
    }

    fn from_parts(
        ctx: &CryptoContext,
        private_key: Option<PrivateKey>,
        public_key: Option<PublicKey>,
        chain_code: [u8; 32],
        depth: u8,
        child_number: Option<ChildNumber>,
        parent_fingerprint: u32,
    ) -> Result<Self, KeyDerivationError> {
        let public_key = match (public_key, &private_key) {
            (Some(pk), _) => pk,
            (None, Some(sk)) => ctx.public_key(sk)?,
            (None, None) => return Err(KeyDerivationError::MissingPrivateKey),
        };
        Ok(Self {
            fingerprint: fingerprint(&public_key),
            private_key,
            public_key,
            chain_code,
            depth,
            child_number,
            parent_fingerprint,
        })
    }

    /// Derive the child at `index`, hardened or not.
    pub fn derive_child(
        &self,
        ctx: &CryptoContext,
        index: u32,
        hardened: bool,
    ) -> Result<Self, KeyDerivationError> {
        let child = ChildNumber::new(index, hardened)?;
        self.derive(ctx, child)
    }

    fn derive(&self, ctx: &CryptoContext, child: ChildNumber) -> Result<Self, KeyDerivationError> {
        let depth = self.depth.checked_add(1).ok_or(KeyDerivationError::DepthOverflow)?;
        let index_bytes = child.to_u32().to_be_bytes();
        let mut digest = if child.is_hardened() {
            let key = self
                .private_key
                .as_ref()
                .ok_or(KeyDerivationError::MissingPrivateKey)?;
            hmac_sha512(&self.chain_code, &[&[0u8], key.as_bytes(), &index_bytes])?
        } else {
            hmac_sha512(&self.chain_code, &[self.public_key.as_bytes(), &index_bytes])?
        };

        let mut tweak = [0u8; 32];
        tweak.copy_from_slice(&digest[..32]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        digest.zeroize();

        let keys = match &self.private_key {
            Some(key) => key.tweak_add(&tweak).map(|sk| (Some(sk), None)),
            None => ctx
                .tweak_add_public(&self.public_key, &tweak)
                .map(|pk| (None, Some(pk))),
        };
        tweak.zeroize();
        let (private_key, public_key) = keys?;

        Self::from_parts(
            ctx,
            private_key,
            public_key,
            chain_code,
            depth,
            Some(child),
            self.fingerprint,
        )
    }

    /// Walk a textual derivation path from this key.
    pub fn derive_path(&self, ctx: &CryptoContext, path: &str) -> Result<Self, KeyDerivationError> {
        let path: DerivationPath = path.parse()?;
        self.derive_steps(ctx, &path)
    }

    pub fn derive_steps(
        &self,
        ctx: &CryptoContext,
        path: &DerivationPath,
    ) -> Result<Self, KeyDerivationError> {
        let mut key = self.clone();
        for step in path.steps() {
            key = key.derive(ctx, *step)?;
        }
        Ok(key)
    }

    /// Public-only copy of this key.
    pub fn neuter(&self) -> Self {
        let mut key = self.clone();
        key.private_key = None;
        key
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The step that produced this key; `None` for a master key.
    pub fn child_number(&self) -> Option<ChildNumber> {
        self.child_number
    }

    pub fn parent_fingerprint(&self) -> u32 {
        self.parent_fingerprint
    }

    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }
}

impl Drop for ExtendedKey {
    fn drop(&mut self) {
        self.chain_code.zeroize();
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("public_key", &self.public_key)
            .field("has_private_key", &self.private_key.is_some())
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("fingerprint", &format_args!("{:08x}", self.fingerprint))
            .finish_non_exhaustive()
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 64], KeyDerivationError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| KeyDerivationError::InvalidSeed)?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// First four bytes of RIPEMD160(SHA256(pubkey)), big-endian.
fn fingerprint(public_key: &PublicKey) -> u32 {
    let sha = Sha256::digest(public_key.as_bytes());
    let id = Ripemd160::digest(sha);
    u32::from_be_bytes([id[0], id[1], id[2], id[3]])
}

/// BIP-44 receiving chain for CKB (`m/44'/309'/0'/0/i`).
///
/// Only public data is cached: lock args map back to their index, and the
/// private key for an index is re-derived whenever it is requested.
pub struct KeyChain {
    chain: ExtendedKey,
    network: Network,
    next_index: u32,
    /// Reverse lookup: lock args -> derivation index.
    args_to_index: HashMap<[u8; BLAKE160_LEN], u32>,
}

impl KeyChain {
    pub fn from_seed(
        ctx: &CryptoContext,
        seed: &Seed,
        network: Network,
    ) -> Result<Self, KeyDerivationError> {
        let master = ExtendedKey::from_seed(ctx, seed)?;
        let chain = master.derive_steps(ctx, &DerivationPath::ckb_account_chain()?)?;
        Ok(Self { chain, network, next_index: 0, args_to_index: HashMap::new() })
    }

    /// Public key at `index`, remembering its lock args.
    pub fn public_key(
        &mut self,
        ctx: &CryptoContext,
        index: u32,
    ) -> Result<PublicKey, KeyDerivationError> {
        let child = self.chain.neuter().derive_child(ctx, index, false)?;
        let public_key = *child.public_key();
        self.args_to_index.insert(public_key.blake160(), index);
        Ok(public_key)
    }

    /// Default-lock address at `index`.
    pub fn address_at(
        &mut self,
        ctx: &CryptoContext,
        index: u32,
    ) -> Result<Address, KeyDerivationError> {
        let public_key = self.public_key(ctx, index)?;
        Ok(Address::from_public_key(&public_key, self.network))
    }

    /// Derive the next address, advancing the internal index.
    pub fn next_address(&mut self, ctx: &CryptoContext) -> Result<Address, KeyDerivationError> {
        let index = self.next_index;
        let address = self.address_at(ctx, index)?;
        self.next_index = index.saturating_add(1);
        Ok(address)
    }

    /// Re-derive the private key at `index`.
    pub fn private_key(
        &self,
        ctx: &CryptoContext,
        index: u32,
    ) -> Result<PrivateKey, KeyDerivationError> {
        let child = self.chain.derive_child(ctx, index, false)?;
        child
            .private_key()
            .cloned()
            .ok_or(KeyDerivationError::MissingPrivateKey)
    }

    /// Private key owning `args`, if that index has been derived before.
    pub fn private_key_for_args(
        &self,
        ctx: &CryptoContext,
        args: &[u8; BLAKE160_LEN],
    ) -> Option<Result<PrivateKey, KeyDerivationError>> {
        self.index_of(args).map(|index| self.private_key(ctx, index))
    }

    pub fn index_of(&self, args: &[u8; BLAKE160_LEN]) -> Option<u32> {
        self.args_to_index.get(args).copied()
    }

    /// Derive all addresses below `n` and continue from there.
    pub fn restore_to_index(&mut self, ctx: &CryptoContext, n: u32) -> Result<(), KeyDerivationError> {
        for i in 0..n {
            self.public_key(ctx, i)?;
        }
        self.next_index = n;
        Ok(())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The next derivation index that will be used.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("network", &self.network)
            .field("next_index", &self.next_index)
            .field("known_args", &self.args_to_index.len())
            .finish()
    }
}
