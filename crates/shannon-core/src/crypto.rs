//! secp256k1 keys and recoverable signatures.
//!
//! [`CryptoContext`] owns the precomputed curve tables. It is immutable once
//! built and is passed by reference to every operation that needs it; use
//! [`CryptoContext::shared`] for a lazily-initialized process-wide instance
//! or build a dedicated one with [`CryptoContext::new`].
//!
//! Signatures are 65 bytes: the 64-byte compact `r || s` followed by the
//! recovery id, which is the layout the default lock script verifies.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, Scalar, Secp256k1, SecretKey};
use std::fmt;
use std::sync::OnceLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{BLAKE160_LEN, SIGNATURE_SIZE};
use crate::error::CryptoError;
use crate::hash::blake160;
use crate::serde_hex;

static SHARED_CONTEXT: OnceLock<CryptoContext> = OnceLock::new();

/// Signing and verification context.
pub struct CryptoContext {
    secp: Secp256k1<All>,
}

impl CryptoContext {
    pub fn new() -> Self {
        Self { secp: Secp256k1::new() }
    }

    /// Process-wide context, built on first use.
    pub fn shared() -> &'static CryptoContext {
        SHARED_CONTEXT.get_or_init(CryptoContext::new)
    }

    /// Compressed public key for a private key.
    pub fn public_key(&self, key: &PrivateKey) -> Result<PublicKey, CryptoError> {
        let mut sk = key.to_secret_key()?;
        let pk = secp256k1::PublicKey::from_secret_key(&self.secp, &sk);
        sk.non_secure_erase();
        Ok(PublicKey(pk.serialize()))
    }

    /// Sign a 32-byte digest, producing `r || s || recid`.
    pub fn sign_recoverable(
        &self,
        key: &PrivateKey,
        digest: &[u8; 32],
    ) -> Result<[u8; SIGNATURE_SIZE], CryptoError> {
        let mut sk = key.to_secret_key()?;
        let message = Message::from_digest(*digest);
        let signature = self.secp.sign_ecdsa_recoverable(&message, &sk);
        sk.non_secure_erase();

        let (recovery_id, compact) = signature.serialize_compact();
        let recid = u8::try_from(recovery_id.to_i32())
            .map_err(|_| CryptoError::Signing("recovery id out of range".into()))?;
        let mut out = [0u8; SIGNATURE_SIZE];
        out[..64].copy_from_slice(&compact);
        out[64] = recid;
        Ok(out)
    }

    /// Recover the signer's public key from a 65-byte recoverable signature.
    pub fn recover(
        &self,
        digest: &[u8; 32],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> Result<PublicKey, CryptoError> {
        let recovery_id = RecoveryId::from_i32(i32::from(signature[64]))
            .map_err(|_| CryptoError::InvalidSignature)?;
        let sig = RecoverableSignature::from_compact(&signature[..64], recovery_id)
            .map_err(|_| CryptoError::InvalidSignature)?;
        let message = Message::from_digest(*digest);
        let pk = self
            .secp
            .recover_ecdsa(&message, &sig)
            .map_err(|_| CryptoError::InvalidSignature)?;
        Ok(PublicKey(pk.serialize()))
    }

    /// Point addition `P + tweak*G`, used for public child derivation.
    pub fn tweak_add_public(
        &self,
        key: &PublicKey,
        tweak: &[u8; 32],
    ) -> Result<PublicKey, CryptoError> {
        let pk = secp256k1::PublicKey::from_slice(&key.0)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let scalar = Scalar::from_be_bytes(*tweak).map_err(|_| CryptoError::Tweak)?;
        let tweaked = pk
            .add_exp_tweak(&self.secp, &scalar)
            .map_err(|_| CryptoError::Tweak)?;
        Ok(PublicKey(tweaked.serialize()))
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext").finish_non_exhaustive()
    }
}

/// A 32-byte secp256k1 secret scalar.
///
/// Zeroized on drop. Deliberately neither `Serialize` nor `Display`; the
/// `Debug` output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; 32],
}

impl PrivateKey {
    /// Validate and wrap secret bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut sk = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let key = Self { bytes: sk.secret_bytes() };
        sk.non_secure_erase();
        Ok(key)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = serde_hex::decode(s).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    /// Generate a random key from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        loop {
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            if let Ok(key) = Self::from_slice(&bytes) {
                bytes.zeroize();
                return key;
            }
        }
    }

    /// Raw secret bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// `(self + tweak) mod n`, used for private child derivation.
    pub fn tweak_add(&self, tweak: &[u8; 32]) -> Result<PrivateKey, CryptoError> {
        let sk = self.to_secret_key()?;
        let scalar = Scalar::from_be_bytes(*tweak).map_err(|_| CryptoError::Tweak)?;
        let mut child = sk.add_tweak(&scalar).map_err(|_| CryptoError::Tweak)?;
        let key = Self { bytes: child.secret_bytes() };
        child.non_secure_erase();
        Ok(key)
    }

    fn to_secret_key(&self) -> Result<SecretKey, CryptoError> {
        SecretKey::from_slice(&self.bytes).map_err(|_| CryptoError::InvalidPrivateKey)
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A compressed (33-byte) secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    /// Parse a compressed or uncompressed encoding; stored compressed.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let pk = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(pk.serialize()))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Lock args for the default lock: blake160 of the compressed key.
    pub fn blake160(&self) -> [u8; BLAKE160_LEN] {
        blake160(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
