//! Address encoding for CKB.
//!
//! Addresses are Bech32 ([BIP-173]) or Bech32m ([BIP-350]) strings with
//! human-readable prefixes:
//! - Mainnet: `ckb1...`
//! - Testnet: `ckt1...`
//!
//! Two payload layouts are in use:
//! - short: `0x01 || 0x00 || args(20)`, Bech32 checksum, always the default lock
//! - full: `0x00 || code_hash(32) || hash_type(1) || args(20)`, Bech32m checksum
//!
//! The deprecated full formats `0x02` and `0x04` are accepted on decode.
//! There is no 90-character limit: full addresses are longer than that.
//!
//! [BIP-173]: https://github.com/bitcoin/bips/blob/master/bip-0173.mediawiki
//! [BIP-350]: https://github.com/bitcoin/bips/blob/master/bip-0350.mediawiki

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{BLAKE160_LEN, SECP256K1_BLAKE160_SIGHASH_ALL_TYPE_HASH, default_lock};
use crate::crypto::PublicKey;
use crate::error::EncodingError;
use crate::types::{Hash256, Script, ScriptHashType};

/// Bech32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const CHECKSUM_LEN: usize = 6;

pub const SHORT_PAYLOAD_LEN: usize = 2 + BLAKE160_LEN;
pub const FULL_PAYLOAD_LEN: usize = 1 + 32 + 1 + BLAKE160_LEN;

const FORMAT_FULL: u8 = 0x00;
const FORMAT_SHORT: u8 = 0x01;
const FORMAT_FULL_DATA: u8 = 0x02;
const FORMAT_FULL_TYPE: u8 = 0x04;

/// Short-format code hash index of the secp256k1/blake160 lock.
const CODE_HASH_INDEX_SECP256K1_BLAKE160: u8 = 0x00;

/// Network identifier determining the address prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet (HRP: "ckb").
    #[default]
    Mainnet,
    /// Testnet (HRP: "ckt").
    Testnet,
}

impl Network {
    /// Human-readable prefix for this network.
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "ckb",
            Network::Testnet => "ckt",
        }
    }

    /// Look up network from a human-readable prefix.
    pub fn from_hrp(hrp: &str) -> Result<Self, EncodingError> {
        match hrp {
            "ckb" => Ok(Network::Mainnet),
            "ckt" => Ok(Network::Testnet),
            _ => Err(EncodingError::UnknownNetwork(hrp.to_string())),
        }
    }
}

/// Checksum flavour. Both share the polymod and differ in the final constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Bech32,
    Bech32m,
}

impl Variant {
    const fn constant(self) -> u32 {
        match self {
            Variant::Bech32 => 1,
            Variant::Bech32m => 0x2bc830a3,
        }
    }
}

/// Result of the format-agnostic decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedAddress {
    pub network: Network,
    pub payload: Vec<u8>,
    pub variant: Variant,
}

/// Encode a raw payload with the network's prefix and the given checksum.
pub fn encode(network: Network, payload: &[u8], variant: Variant) -> String {
    let hrp = network.hrp();
    let data = bytes_to_base32(payload);
    let checksum = create_checksum(hrp, &data, variant);

    let mut result = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LEN);
    result.push_str(hrp);
    result.push('1');
    for &d in data.iter().chain(checksum.iter()) {
        result.push(CHARSET[d as usize] as char);
    }
    result
}

/// Decode an address string into network, payload and checksum variant.
///
/// Validates checksum (either variant), then payload length, then prefix.
pub fn decode(s: &str) -> Result<DecodedAddress, EncodingError> {
    // Reject mixed case (Bech32 spec: all alpha chars must be same case)
    let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(EncodingError::MixedCase);
    }

    let s_lower = s.to_ascii_lowercase();
    let sep_pos = s_lower.rfind('1').ok_or(EncodingError::MissingSeparator)?;
    if sep_pos == 0 {
        return Err(EncodingError::InvalidHrp);
    }

    let hrp = &s_lower[..sep_pos];
    let data_part = &s_lower[sep_pos + 1..];
    if data_part.len() < CHECKSUM_LEN {
        return Err(EncodingError::InvalidChecksum);
    }

    let mut data = Vec::with_capacity(data_part.len());
    for c in data_part.chars() {
        let pos = CHARSET
            .iter()
            .position(|&ch| ch as char == c)
            .ok_or(EncodingError::InvalidCharacter(c))?;
        data.push(pos as u8);
    }

    let variant = verify_checksum(hrp, &data).ok_or(EncodingError::InvalidChecksum)?;

    let payload = base32_to_bytes(&data[..data.len() - CHECKSUM_LEN])
        .ok_or(EncodingError::InvalidPadding)?;
    if payload.len() != SHORT_PAYLOAD_LEN && payload.len() != FULL_PAYLOAD_LEN {
        return Err(EncodingError::InvalidPayloadLength(payload.len()));
    }

    let network = Network::from_hrp(hrp)?;
    Ok(DecodedAddress { network, payload, variant })
}

/// The 20-byte lock args carried at the end of any short or full payload.
pub fn public_key_hash(address: &str) -> Result<[u8; BLAKE160_LEN], EncodingError> {
    let decoded = decode(address)?;
    let mut out = [0u8; BLAKE160_LEN];
    out.copy_from_slice(&decoded.payload[decoded.payload.len() - BLAKE160_LEN..]);
    Ok(out)
}

/// What a typed address points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddressPayload {
    /// Default lock identified by a blake160 public key hash.
    Short { args: [u8; BLAKE160_LEN] },
    /// Arbitrary lock with 20-byte args.
    Full {
        code_hash: Hash256,
        hash_type: ScriptHashType,
        args: [u8; BLAKE160_LEN],
    },
}

/// A typed CKB address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    payload: AddressPayload,
}

impl Address {
    /// Short address for a default-lock public key hash.
    pub fn from_public_key_hash(args: [u8; BLAKE160_LEN], network: Network) -> Self {
        Self { network, payload: AddressPayload::Short { args } }
    }

    /// Short address for a public key.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_public_key_hash(public_key.blake160(), network)
    }

    /// Full address for any lock with 20-byte args.
    pub fn full(
        network: Network,
        code_hash: Hash256,
        hash_type: ScriptHashType,
        args: [u8; BLAKE160_LEN],
    ) -> Self {
        Self { network, payload: AddressPayload::Full { code_hash, hash_type, args } }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn payload(&self) -> &AddressPayload {
        &self.payload
    }

    /// Lock args carried by the address.
    pub fn args(&self) -> [u8; BLAKE160_LEN] {
        match &self.payload {
            AddressPayload::Short { args } | AddressPayload::Full { args, .. } => *args,
        }
    }

    /// Lock script guarding cells sent to this address.
    pub fn lock_script(&self) -> Script {
        match &self.payload {
            AddressPayload::Short { args } => default_lock(*args),
            AddressPayload::Full { code_hash, hash_type, args } => {
                Script::new(*code_hash, *hash_type, args.to_vec())
            }
        }
    }

    /// Whether cells at this address are unlocked by the default lock.
    pub fn is_default_lock(&self) -> bool {
        match &self.payload {
            AddressPayload::Short { .. } => true,
            AddressPayload::Full { code_hash, hash_type, .. } => {
                *code_hash == SECP256K1_BLAKE160_SIGHASH_ALL_TYPE_HASH
                    && *hash_type == ScriptHashType::Type
            }
        }
    }

    /// Serialize the payload and checksum it with the variant its format uses.
    pub fn encode(&self) -> String {
        match &self.payload {
            AddressPayload::Short { args } => {
                let mut payload = Vec::with_capacity(SHORT_PAYLOAD_LEN);
                payload.push(FORMAT_SHORT);
                payload.push(CODE_HASH_INDEX_SECP256K1_BLAKE160);
                payload.extend_from_slice(args);
                encode(self.network, &payload, Variant::Bech32)
            }
            AddressPayload::Full { code_hash, hash_type, args } => {
                let mut payload = Vec::with_capacity(FULL_PAYLOAD_LEN);
                payload.push(FORMAT_FULL);
                payload.extend_from_slice(code_hash.as_bytes());
                payload.push(hash_type.as_byte());
                payload.extend_from_slice(args);
                encode(self.network, &payload, Variant::Bech32m)
            }
        }
    }

    /// Decode and interpret the format byte.
    pub fn decode(s: &str) -> Result<Self, EncodingError> {
        let DecodedAddress { network, payload, .. } = decode(s)?;
        let mut args = [0u8; BLAKE160_LEN];
        args.copy_from_slice(&payload[payload.len() - BLAKE160_LEN..]);

        let payload = match (payload[0], payload.len()) {
            (FORMAT_SHORT, SHORT_PAYLOAD_LEN) => {
                if payload[1] != CODE_HASH_INDEX_SECP256K1_BLAKE160 {
                    return Err(EncodingError::UnknownCodeHashIndex(payload[1]));
                }
                AddressPayload::Short { args }
            }
            (FORMAT_FULL | FORMAT_FULL_DATA | FORMAT_FULL_TYPE, FULL_PAYLOAD_LEN) => {
                AddressPayload::Full {
                    code_hash: Hash256::from_slice(&payload[1..33])?,
                    hash_type: ScriptHashType::from_byte(payload[33])?,
                    args,
                }
            }
            (FORMAT_SHORT | FORMAT_FULL | FORMAT_FULL_DATA | FORMAT_FULL_TYPE, len) => {
                return Err(EncodingError::InvalidPayloadLength(len));
            }
            (other, _) => return Err(EncodingError::UnknownFormat(other)),
        };
        Ok(Self { network, payload })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

// --- Bech32 internals ---

/// Compute the Bech32 polymod over a sequence of 5-bit values.
fn polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (v as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }
    chk
}

/// Expand the HRP for checksum computation.
fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut ret = Vec::with_capacity(hrp.len() * 2 + 1);
    for c in hrp.bytes() {
        ret.push(c >> 5);
    }
    ret.push(0);
    for c in hrp.bytes() {
        ret.push(c & 31);
    }
    ret
}

fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; CHECKSUM_LEN]);
    let polymod = polymod(&values) ^ variant.constant();
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, v) in out.iter_mut().enumerate() {
        *v = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    out
}

/// Which variant, if any, the checksum of `data` (including checksum) matches.
fn verify_checksum(hrp: &str, data: &[u8]) -> Option<Variant> {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    let residue = polymod(&values);
    [Variant::Bech32, Variant::Bech32m]
        .into_iter()
        .find(|v| v.constant() == residue)
}

/// Regroup 8-bit bytes into padded 5-bit groups.
fn bytes_to_base32(data: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::with_capacity((data.len() * 8).div_ceil(5));
    for &byte in data {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            ret.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        ret.push(((acc << (5 - bits)) & 31) as u8);
    }
    ret
}

/// Regroup 5-bit groups into bytes; `None` on non-zero or oversized padding.
fn base32_to_bytes(data: &[u8]) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::with_capacity(data.len() * 5 / 8);
    for &value in data {
        acc = ((acc << 5) | value as u32) & 0xfff;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            ret.push(((acc >> bits) & 0xff) as u8);
        }
    }
    if bits >= 5 || ((acc << (8 - bits)) & 0xff) != 0 {
        return None;
    }
    Some(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE_ARGS: [u8; 20] = [
        0xb3, 0x9b, 0xbc, 0x0b, 0x36, 0x73, 0xc7, 0xd3, 0x64, 0x50, 0xbc, 0x14, 0xcf, 0xcd,
        0xad, 0x2d, 0x55, 0x9c, 0x6c, 0x64,
    ];
    const SHORT_MAINNET: &str = "ckb1qyqt8xaupvm8837nv3gtc9x0ekkj64vud3jqfwyw5v";
    const FULL_MAINNET: &str = "ckb1qzda0cr08m85hc8jlnfp3zer7xulejywt49kt2rr0vthywaa50xwsqdnnw7qkdnnclfkg59uzn8umtfd2kwxceqxwquc4";

    // --- Network ---

    #[test]
    fn network_hrps() {
        assert_eq!(Network::Mainnet.hrp(), "ckb");
        assert_eq!(Network::Testnet.hrp(), "ckt");
        assert_eq!(Network::from_hrp("ckt").unwrap(), Network::Testnet);
    }

    #[test]
    fn network_from_hrp_unknown() {
        assert_eq!(
            Network::from_hrp("bc").unwrap_err(),
            EncodingError::UnknownNetwork("bc".into())
        );
    }

    // --- Known vectors ---

    #[test]
    fn short_address_vector() {
        let addr = Address::from_public_key_hash(SAMPLE_ARGS, Network::Mainnet);
        assert_eq!(addr.encode(), SHORT_MAINNET);
        let decoded = decode(SHORT_MAINNET).unwrap();
        assert_eq!(decoded.variant, Variant::Bech32);
        assert_eq!(decoded.payload.len(), SHORT_PAYLOAD_LEN);
    }

    #[test]
    fn full_address_vector() {
        let addr = Address::decode(FULL_MAINNET).unwrap();
        assert_eq!(
            addr.payload(),
            &AddressPayload::Full {
                code_hash: SECP256K1_BLAKE160_SIGHASH_ALL_TYPE_HASH,
                hash_type: ScriptHashType::Type,
                args: SAMPLE_ARGS,
            }
        );
        assert_eq!(decode(FULL_MAINNET).unwrap().variant, Variant::Bech32m);
        assert_eq!(addr.encode(), FULL_MAINNET);
    }

    #[test]
    fn short_and_full_share_lock_script() {
        let short = Address::decode(SHORT_MAINNET).unwrap();
        let full = Address::decode(FULL_MAINNET).unwrap();
        assert_eq!(short.lock_script(), full.lock_script());
        assert!(short.is_default_lock());
        assert!(full.is_default_lock());
    }

    #[test]
    fn public_key_hash_is_trailing_args() {
        assert_eq!(public_key_hash(SHORT_MAINNET).unwrap(), SAMPLE_ARGS);
        assert_eq!(public_key_hash(FULL_MAINNET).unwrap(), SAMPLE_ARGS);
    }

    // --- Decoding failures ---

    #[test]
    fn decode_invalid_checksum() {
        let mut encoded = SHORT_MAINNET.to_string();
        let last = encoded.pop().unwrap();
        encoded.push(if last == 'q' { 'p' } else { 'q' });
        assert_eq!(decode(&encoded).unwrap_err(), EncodingError::InvalidChecksum);
    }

    #[test]
    fn decode_unknown_network() {
        // valid checksum under a foreign prefix
        let data = bytes_to_base32(&[1, 0].repeat(11));
        let checksum = create_checksum("xyz", &data, Variant::Bech32);
        let mut s = String::from("xyz1");
        for &d in data.iter().chain(checksum.iter()) {
            s.push(CHARSET[d as usize] as char);
        }
        assert_eq!(decode(&s).unwrap_err(), EncodingError::UnknownNetwork("xyz".into()));
    }

    #[test]
    fn decode_wrong_payload_length() {
        let encoded = encode(Network::Testnet, &[0u8; 30], Variant::Bech32m);
        assert_eq!(decode(&encoded).unwrap_err(), EncodingError::InvalidPayloadLength(30));
    }

    #[test]
    fn decode_mixed_case_fails() {
        let mixed = format!("CKB{}", &SHORT_MAINNET[3..]);
        assert_eq!(decode(&mixed).unwrap_err(), EncodingError::MixedCase);
    }

    #[test]
    fn decode_uppercase_valid() {
        let decoded = decode(&SHORT_MAINNET.to_ascii_uppercase()).unwrap();
        assert_eq!(decoded.network, Network::Mainnet);
    }

    #[test]
    fn decode_invalid_character() {
        let bad = format!("{}b{}", &SHORT_MAINNET[..5], &SHORT_MAINNET[6..]);
        assert_eq!(decode(&bad).unwrap_err(), EncodingError::InvalidCharacter('b'));
    }

    #[test]
    fn decode_missing_separator() {
        assert_eq!(decode("ckbnoseparator").unwrap_err(), EncodingError::MissingSeparator);
    }

    #[test]
    fn decode_empty_hrp() {
        assert_eq!(decode("1qqqqqqqqqq").unwrap_err(), EncodingError::InvalidHrp);
    }

    #[test]
    fn typed_decode_rejects_unknown_format() {
        let mut payload = vec![0x03];
        payload.extend_from_slice(&[0u8; 21]);
        let encoded = encode(Network::Mainnet, &payload, Variant::Bech32);
        assert_eq!(Address::decode(&encoded).unwrap_err(), EncodingError::UnknownFormat(0x03));
    }

    #[test]
    fn typed_decode_rejects_foreign_code_hash_index() {
        let mut payload = vec![FORMAT_SHORT, 0x01];
        payload.extend_from_slice(&SAMPLE_ARGS);
        let encoded = encode(Network::Mainnet, &payload, Variant::Bech32);
        assert_eq!(
            Address::decode(&encoded).unwrap_err(),
            EncodingError::UnknownCodeHashIndex(0x01)
        );
    }

    #[test]
    fn typed_decode_accepts_deprecated_full_formats() {
        for format in [FORMAT_FULL_DATA, FORMAT_FULL_TYPE] {
            let mut payload = vec![format];
            payload.extend_from_slice(&[0x22; 32]);
            payload.push(ScriptHashType::Data1.as_byte());
            payload.extend_from_slice(&SAMPLE_ARGS);
            let encoded = encode(Network::Testnet, &payload, Variant::Bech32);
            let addr = Address::decode(&encoded).unwrap();
            assert_eq!(addr.args(), SAMPLE_ARGS);
            assert_eq!(addr.lock_script().hash_type, ScriptHashType::Data1);
        }
    }

    // --- Serde / Display ---

    #[test]
    fn display_and_from_str() {
        let addr: Address = SHORT_MAINNET.parse().unwrap();
        assert_eq!(addr.to_string(), SHORT_MAINNET);
    }

    #[test]
    fn serde_json_roundtrip() {
        let addr = Address::from_public_key_hash(SAMPLE_ARGS, Network::Testnet);
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with("\"ckt1"));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    // --- Bech32 internals ---

    #[test]
    fn checksum_is_variant_specific() {
        let data = bytes_to_base32(&[0u8; 22]);
        let mut full = data.clone();
        full.extend_from_slice(&create_checksum("ckb", &data, Variant::Bech32m));
        assert_eq!(verify_checksum("ckb", &full), Some(Variant::Bech32m));
        assert_eq!(verify_checksum("ckt", &full), None);
    }

    #[test]
    fn base32_rejects_nonzero_padding() {
        let mut data = bytes_to_base32(&[0xFF]);
        assert_eq!(base32_to_bytes(&data), Some(vec![0xFF]));
        let last = data.len() - 1;
        data[last] |= 1;
        assert_eq!(base32_to_bytes(&data), None);
    }

    proptest! {
        #[test]
        fn raw_roundtrip_short(payload in proptest::collection::vec(any::<u8>(), SHORT_PAYLOAD_LEN),
                               testnet in any::<bool>(), bech32m in any::<bool>()) {
            let network = if testnet { Network::Testnet } else { Network::Mainnet };
            let variant = if bech32m { Variant::Bech32m } else { Variant::Bech32 };
            let decoded = decode(&encode(network, &payload, variant)).unwrap();
            prop_assert_eq!(decoded, DecodedAddress { network, payload, variant });
        }

        #[test]
        fn raw_roundtrip_full(payload in proptest::collection::vec(any::<u8>(), FULL_PAYLOAD_LEN),
                              testnet in any::<bool>(), bech32m in any::<bool>()) {
            let network = if testnet { Network::Testnet } else { Network::Mainnet };
            let variant = if bech32m { Variant::Bech32m } else { Variant::Bech32 };
            let decoded = decode(&encode(network, &payload, variant)).unwrap();
            prop_assert_eq!(decoded, DecodedAddress { network, payload, variant });
        }

        #[test]
        fn typed_short_roundtrip(args in any::<[u8; 20]>()) {
            let addr = Address::from_public_key_hash(args, Network::Mainnet);
            prop_assert_eq!(Address::decode(&addr.encode()).unwrap(), addr);
        }
    }
}
