//! # Contract ABI Encoding
//!
//! Minimal Solidity ABI support for the credential registry contract: call
//! data for functions taking `string` and `address` arguments, and decoding
//! of return tuples made of `string`, `bool` and `address` values.
//!
//! ## Layout
//!
//! ```text
//! selector (4 bytes) ‖ head (32 bytes per argument) ‖ tail (dynamic data)
//! ```
//!
//! Static arguments sit in the head, left-padded to 32 bytes. A dynamic
//! argument's head word holds the byte offset (from the start of the head)
//! of its tail entry: a length word followed by the data, right-padded to a
//! multiple of 32 bytes.

use certichain_core::LedgerAddress;
use sha3::{Digest, Keccak256};

use crate::error::ClientError;

const WORD: usize = 32;

/// First four bytes of Keccak-256 over the canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// A call argument.
#[derive(Debug, Clone, Copy)]
pub enum Token<'a> {
    String(&'a str),
    Address(&'a LedgerAddress),
}

/// Encode a function call as `0x`-prefixed hex call data.
pub fn encode_call(signature: &str, args: &[Token<'_>]) -> String {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for arg in args {
        match arg {
            Token::Address(addr) => {
                head.extend_from_slice(&[0u8; 12]);
                head.extend_from_slice(&addr.to_bytes());
            }
            Token::String(s) => {
                head.extend_from_slice(&uint_word(head_len + tail.len()));
                tail.extend_from_slice(&uint_word(s.len()));
                tail.extend_from_slice(s.as_bytes());
                let pad = (WORD - s.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(pad));
            }
        }
    }

    let mut out = String::with_capacity(2 + 8 + 2 * (head.len() + tail.len()));
    out.push_str("0x");
    out.push_str(&hex::encode(selector(signature)));
    out.push_str(&hex::encode(head));
    out.push_str(&hex::encode(tail));
    out
}

fn uint_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

/// Reader over ABI-encoded return data.
#[derive(Debug)]
pub struct Decoder {
    data: Vec<u8>,
}

impl Decoder {
    /// Decode the hex string returned by `eth_call`.
    pub fn from_hex(raw: &str) -> Result<Self, ClientError> {
        let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
        let data = hex::decode(trimmed)
            .map_err(|e| ClientError::Abi(format!("return data is not hex: {e}")))?;
        Ok(Self { data })
    }

    /// True for empty return data (`0x`), which a node returns when the
    /// target has no code.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn word_at(&self, offset: usize) -> Result<&[u8], ClientError> {
        self.data
            .get(offset..offset + WORD)
            .ok_or_else(|| ClientError::Abi(format!("word at byte {offset} out of range")))
    }

    fn usize_at(&self, offset: usize) -> Result<usize, ClientError> {
        let word = self.word_at(offset)?;
        if word[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(ClientError::Abi(format!("integer at byte {offset} overflows")));
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&word[WORD - 8..]);
        usize::try_from(u64::from_be_bytes(be))
            .map_err(|_| ClientError::Abi(format!("integer at byte {offset} overflows")))
    }

    /// The `bool` in head slot `index`.
    pub fn bool(&self, index: usize) -> Result<bool, ClientError> {
        match self.usize_at(index * WORD)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ClientError::Abi(format!("invalid bool value {other}"))),
        }
    }

    /// The `address` in head slot `index`.
    pub fn address(&self, index: usize) -> Result<LedgerAddress, ClientError> {
        let word = self.word_at(index * WORD)?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(LedgerAddress::from_bytes(bytes))
    }

    /// The `string` whose offset sits in head slot `index`.
    pub fn string(&self, index: usize) -> Result<String, ClientError> {
        let offset = self.usize_at(index * WORD)?;
        let len = self.usize_at(offset)?;
        let start = offset + WORD;
        let bytes = self
            .data
            .get(start..start + len)
            .ok_or_else(|| ClientError::Abi(format!("string at byte {offset} out of range")))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ClientError::Abi(format!("string is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_erc20_transfer() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn encodes_single_string_argument() {
        let data = encode_call("revokeCertificate(string)", &[Token::String("CERT-1")]);
        let expected_selector = hex::encode(selector("revokeCertificate(string)"));
        let body = &data[10..];
        assert!(data.starts_with(&format!("0x{expected_selector}")));
        // offset word, length word, one padded data word
        assert_eq!(body.len(), 3 * 64);
        assert!(body[..64].ends_with("20"));
        assert!(body[64..128].ends_with("06"));
        assert!(body[128..].starts_with(&hex::encode("CERT-1")));
    }

    #[test]
    fn second_string_offset_skips_first_tail() {
        let long = "x".repeat(40);
        let data = encode_call("f(string,string)", &[Token::String(&long), Token::String("y")]);
        let body = &data[10..];
        // head is 0x40 bytes; first tail is len word + 64 padded bytes = 0x60
        assert!(body[..64].ends_with("40"));
        assert!(body[64..128].ends_with("a0"));
    }

    #[test]
    fn decodes_string_bool_address_tuple() {
        let addr = LedgerAddress::parse("0x00000000000000000000000000000000000000aa").unwrap();
        // Reuse the call encoder for the (string,address) part and patch in a bool.
        let encoded = encode_call("t(string,address)", &[Token::String("0xabc"), Token::Address(&addr)]);
        let mut bytes = hex::decode(&encoded[10..]).unwrap();
        // Insert a bool word at slot 1, shifting address to slot 2 and bumping the offset.
        let bool_word = uint_word(1);
        bytes.splice(32..32, bool_word.iter().copied());
        bytes[..32].copy_from_slice(&uint_word(96));

        let decoder = Decoder::from_hex(&format!("0x{}", hex::encode(&bytes))).unwrap();
        assert_eq!(decoder.string(0).unwrap(), "0xabc");
        assert!(decoder.bool(1).unwrap());
        assert_eq!(decoder.address(2).unwrap(), addr);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let decoder = Decoder::from_hex("0x").unwrap();
        assert!(decoder.is_empty());
        assert!(decoder.bool(0).is_err());
        assert!(decoder.string(0).is_err());
    }
}
