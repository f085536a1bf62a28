//! Version 3 JSON keystore for a single private key.
//!
//! # Format
//! ```text
//! dk      = scrypt(password, salt, n, r, p, dklen) | pbkdf2(password, salt, c, prf, dklen)
//! ct      = AES-128-CTR | AES-128-CBC (no padding) with key dk[0..16] and the stored iv
//! mac     = keccak256(dk[dklen-16..] || ct)
//! ```
//!
//! Files written by other v3 implementations load as long as they use one of
//! the supported kdf, prf and cipher names. Only the MAC authenticates the
//! password; decryption never runs on a MAC mismatch.

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ctr::cipher::StreamCipher;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::path::Path;
use tiny_keccak::{Hasher, Keccak};
use tracing::{debug, info};
use zeroize::Zeroizing;

use shannon_core::crypto::PrivateKey;
use shannon_core::error::{EncodingError, KeystoreError};

use crate::error::WalletError;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const KEYSTORE_VERSION: u32 = 3;

/// Accepted value of the optional `crypto.version` field.
const CRYPTO_VERSION: &str = "1";

const KEY_TYPE: &str = "private-key";

const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const DKLEN: usize = 32;
/// Longest derived key any supported kdf produces.
const MAX_DKLEN: usize = 64;
/// Upper bound on scrypt's `128 * r * n` working set.
const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
const MAX_SCRYPT_P: u32 = 16;
const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;
const AES_BLOCK: usize = 16;

/// Symmetric cipher protecting the key bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cipher {
    #[default]
    #[serde(rename = "aes-128-ctr")]
    Aes128Ctr,
    #[serde(rename = "aes-128-cbc")]
    Aes128Cbc,
}

impl Cipher {
    pub fn name(&self) -> &'static str {
        match self {
            Cipher::Aes128Ctr => "aes-128-ctr",
            Cipher::Aes128Cbc => "aes-128-cbc",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, KeystoreError> {
        match name {
            "aes-128-ctr" => Ok(Cipher::Aes128Ctr),
            "aes-128-cbc" => Ok(Cipher::Aes128Cbc),
            other => Err(KeystoreError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        match self {
            Cipher::Aes128Ctr => {
                let mut buf = plaintext.to_vec();
                Aes128Ctr::new_from_slices(key, iv)
                    .map_err(|e| KeystoreError::Malformed(e.to_string()))?
                    .apply_keystream(&mut buf);
                Ok(buf)
            }
            Cipher::Aes128Cbc => {
                if plaintext.len() % AES_BLOCK != 0 {
                    return Err(KeystoreError::UnalignedPlaintext(plaintext.len()));
                }
                Ok(Aes128CbcEnc::new_from_slices(key, iv)
                    .map_err(|e| KeystoreError::Malformed(e.to_string()))?
                    .encrypt_padded_vec_mut::<NoPadding>(plaintext))
            }
        }
    }

    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        match self {
            Cipher::Aes128Ctr => {
                let mut buf = Zeroizing::new(ciphertext.to_vec());
                Aes128Ctr::new_from_slices(key, iv)
                    .map_err(|e| KeystoreError::Malformed(e.to_string()))?
                    .apply_keystream(&mut buf);
                Ok(buf)
            }
            Cipher::Aes128Cbc => {
                if ciphertext.len() % AES_BLOCK != 0 {
                    return Err(KeystoreError::UnalignedPlaintext(ciphertext.len()));
                }
                Aes128CbcDec::new_from_slices(key, iv)
                    .map_err(|e| KeystoreError::Malformed(e.to_string()))?
                    .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
                    .map(Zeroizing::new)
                    .map_err(|e| KeystoreError::Malformed(e.to_string()))
            }
        }
    }
}

/// HMAC flavour for PBKDF2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Prf {
    #[default]
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "hmac-sha384")]
    HmacSha384,
    #[serde(rename = "hmac-sha512")]
    HmacSha512,
}

impl Prf {
    pub fn name(&self) -> &'static str {
        match self {
            Prf::HmacSha256 => "hmac-sha256",
            Prf::HmacSha384 => "hmac-sha384",
            Prf::HmacSha512 => "hmac-sha512",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, KeystoreError> {
        match name {
            "hmac-sha256" => Ok(Prf::HmacSha256),
            "hmac-sha384" => Ok(Prf::HmacSha384),
            "hmac-sha512" => Ok(Prf::HmacSha512),
            other => Err(KeystoreError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Password stretching function and its cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kdf", rename_all = "lowercase")]
pub enum Kdf {
    Scrypt { n: u64, r: u32, p: u32 },
    Pbkdf2 { c: u32, prf: Prf },
}

impl Default for Kdf {
    fn default() -> Self {
        Kdf::Scrypt { n: 262_144, r: 8, p: 1 }
    }
}

impl Kdf {
    pub fn name(&self) -> &'static str {
        match self {
            Kdf::Scrypt { .. } => "scrypt",
            Kdf::Pbkdf2 { .. } => "pbkdf2",
        }
    }

    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        dklen: usize,
    ) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        if !(DKLEN..=MAX_DKLEN).contains(&dklen) {
            return Err(KeystoreError::InvalidKdfParams(format!(
                "dklen {dklen} outside {DKLEN}..={MAX_DKLEN}"
            )));
        }
        self.check_cost()?;
        let mut dk = Zeroizing::new(vec![0u8; dklen]);
        match *self {
            Kdf::Scrypt { n, r, p } => {
                let log_n = u8::try_from(n.trailing_zeros())
                    .map_err(|e| KeystoreError::InvalidKdfParams(e.to_string()))?;
                let params = scrypt::Params::new(log_n, r, p, dklen)
                    .map_err(|e| KeystoreError::InvalidKdfParams(e.to_string()))?;
                scrypt::scrypt(password, salt, &params, &mut dk)
                    .map_err(|e| KeystoreError::InvalidKdfParams(e.to_string()))?;
            }
            Kdf::Pbkdf2 { c, prf } => match prf {
                Prf::HmacSha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, c, &mut dk),
                Prf::HmacSha384 => pbkdf2::pbkdf2_hmac::<Sha384>(password, salt, c, &mut dk),
                Prf::HmacSha512 => pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, c, &mut dk),
            },
        }
        Ok(dk)
    }

    /// Bound the work factors before any memory is reserved.
    fn check_cost(&self) -> Result<(), KeystoreError> {
        match *self {
            Kdf::Scrypt { n, r, p } => {
                if n < 2 || !n.is_power_of_two() {
                    return Err(KeystoreError::InvalidKdfParams(format!(
                        "scrypt n {n} is not a power of two"
                    )));
                }
                if r == 0 || p == 0 || p > MAX_SCRYPT_P {
                    return Err(KeystoreError::InvalidKdfParams(format!(
                        "scrypt r {r} p {p} out of range"
                    )));
                }
                let memory = n.checked_mul(128 * u64::from(r)).filter(|m| *m <= MAX_SCRYPT_MEMORY);
                if memory.is_none() {
                    return Err(KeystoreError::InvalidKdfParams(format!(
                        "scrypt n {n} r {r} needs more than {MAX_SCRYPT_MEMORY} bytes"
                    )));
                }
            }
            Kdf::Pbkdf2 { c, .. } => {
                if c == 0 || c > MAX_PBKDF2_ROUNDS {
                    return Err(KeystoreError::InvalidKdfParams(format!(
                        "pbkdf2 c {c} outside 1..={MAX_PBKDF2_ROUNDS}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A v3 keystore document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystore {
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub version: u32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub ciphertext: String,
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

/// Union of scrypt and pbkdf2 parameters, as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub salt: String,
    pub dklen: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prf: Option<String>,
}

impl KdfParams {
    fn new(kdf: &Kdf, salt: &[u8]) -> Self {
        let mut params = Self {
            salt: hex::encode(salt),
            dklen: DKLEN,
            n: None,
            r: None,
            p: None,
            c: None,
            prf: None,
        };
        match *kdf {
            Kdf::Scrypt { n, r, p } => {
                params.n = Some(n);
                params.r = Some(r);
                params.p = Some(p);
            }
            Kdf::Pbkdf2 { c, prf } => {
                params.c = Some(c);
                params.prf = Some(prf.name().to_string());
            }
        }
        params
    }

    fn to_kdf(&self, name: &str) -> Result<Kdf, KeystoreError> {
        match name {
            "scrypt" => Ok(Kdf::Scrypt {
                n: self.n.ok_or(KeystoreError::MissingKdfParam("n"))?,
                r: self.r.ok_or(KeystoreError::MissingKdfParam("r"))?,
                p: self.p.ok_or(KeystoreError::MissingKdfParam("p"))?,
            }),
            "pbkdf2" => {
                let prf = self.prf.as_deref().ok_or(KeystoreError::MissingKdfParam("prf"))?;
                Ok(Kdf::Pbkdf2 {
                    c: self.c.ok_or(KeystoreError::MissingKdfParam("c"))?,
                    prf: Prf::from_name(prf)?,
                })
            }
            other => Err(KeystoreError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl Keystore {
    /// Encrypt `key` under `password` with fresh random salt, iv and id.
    pub fn encrypt(
        key: &PrivateKey,
        password: &[u8],
        kdf: Kdf,
        cipher: Cipher,
    ) -> Result<Self, KeystoreError> {
        use rand::RngCore;
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut iv);
        let id = uuid::Uuid::new_v4().to_string();
        let keystore = Self::encrypt_with(key.as_bytes(), password, kdf, cipher, &salt, &iv, id)?;
        info!(kdf = kdf.name(), cipher = cipher.name(), "encrypted keystore");
        Ok(keystore)
    }

    fn encrypt_with(
        plaintext: &[u8],
        password: &[u8],
        kdf: Kdf,
        cipher: Cipher,
        salt: &[u8],
        iv: &[u8],
        id: String,
    ) -> Result<Self, KeystoreError> {
        let dk = kdf.derive(password, salt, DKLEN)?;
        let ciphertext = cipher.encrypt(&dk[..16], iv, plaintext)?;
        let mac = keccak_mac(&dk[DKLEN - 16..], &ciphertext);
        Ok(Self {
            crypto: CryptoSection {
                ciphertext: hex::encode(&ciphertext),
                cipher: cipher.name().to_string(),
                cipherparams: CipherParams { iv: hex::encode(iv) },
                kdf: kdf.name().to_string(),
                kdfparams: KdfParams::new(&kdf, salt),
                mac: hex::encode(mac),
                version: None,
            },
            id: Some(id),
            version: KEYSTORE_VERSION,
            key_type: Some(KEY_TYPE.to_string()),
        })
    }

    /// Check the MAC under `password` and recover the private key.
    pub fn decrypt(&self, password: &[u8]) -> Result<PrivateKey, KeystoreError> {
        self.check_version()?;
        let crypto = &self.crypto;
        let kdf = crypto.kdfparams.to_kdf(&crypto.kdf)?;
        let cipher = Cipher::from_name(&crypto.cipher)?;
        let salt = decode_hex(&crypto.kdfparams.salt)?;
        let iv = decode_hex(&crypto.cipherparams.iv)?;
        let ciphertext = decode_hex(&crypto.ciphertext)?;
        let mac = decode_hex(&crypto.mac)?;

        let dklen = crypto.kdfparams.dklen;
        let dk = kdf.derive(password, &salt, dklen)?;
        let expected = keccak_mac(&dk[dklen - 16..], &ciphertext);
        if !constant_time_eq(&expected, &mac) {
            debug!(id = ?self.id, "keystore mac mismatch");
            return Err(KeystoreError::MacMismatch);
        }

        let plaintext = cipher.decrypt(&dk[..16], &iv, &ciphertext)?;
        let key = PrivateKey::from_slice(&plaintext)
            .map_err(|_| KeystoreError::Malformed("decrypted bytes are not a private key".into()))?;
        info!(id = ?self.id, "decrypted keystore");
        Ok(key)
    }

    fn check_version(&self) -> Result<(), KeystoreError> {
        if self.version != KEYSTORE_VERSION {
            return Err(KeystoreError::UnsupportedVersion(self.version.to_string()));
        }
        match self.crypto.version.as_deref() {
            None | Some(CRYPTO_VERSION) => Ok(()),
            Some(other) => Err(KeystoreError::UnsupportedVersion(other.to_string())),
        }
    }

    /// Parse and version-check a keystore document.
    pub fn from_json(json: &str) -> Result<Self, KeystoreError> {
        let keystore: Self =
            serde_json::from_str(json).map_err(|e| KeystoreError::Malformed(e.to_string()))?;
        keystore.check_version()?;
        Ok(keystore)
    }

    pub fn to_json(&self) -> Result<String, KeystoreError> {
        serde_json::to_string_pretty(self).map_err(|e| KeystoreError::Malformed(e.to_string()))
    }

    /// Write the document to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// [`Keystore::encrypt`] on the blocking thread pool.
    pub async fn encrypt_blocking(
        key: &PrivateKey,
        password: &[u8],
        kdf: Kdf,
        cipher: Cipher,
    ) -> Result<Self, WalletError> {
        let key = key.clone();
        let password = Zeroizing::new(password.to_vec());
        let keystore =
            tokio::task::spawn_blocking(move || Self::encrypt(&key, &password, kdf, cipher))
                .await
                .map_err(|e| WalletError::Task(e.to_string()))??;
        Ok(keystore)
    }

    /// [`Keystore::decrypt`] on the blocking thread pool.
    pub async fn decrypt_blocking(&self, password: &[u8]) -> Result<PrivateKey, WalletError> {
        let keystore = self.clone();
        let password = Zeroizing::new(password.to_vec());
        let key = tokio::task::spawn_blocking(move || keystore.decrypt(&password))
            .await
            .map_err(|e| WalletError::Task(e.to_string()))??;
        Ok(key)
    }
}

impl fmt::Display for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "keystore {} ({}, {})",
            self.id.as_deref().unwrap_or("-"),
            self.crypto.kdf,
            self.crypto.cipher
        )
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, KeystoreError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| KeystoreError::Encoding(EncodingError::InvalidHex(e.to_string())))
}

fn keccak_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Constant-time comparison of two byte slices.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
