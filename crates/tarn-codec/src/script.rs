//! Standard output-script recognition.
//!
//! Two templates are recognized:
//!
//! - pay-to-pubkey-hash: exactly 25 bytes,
//!   `OP_DUP OP_HASH160 0x14 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG`;
//! - pay-to-pubkey: exactly 67 bytes, a 65-byte key push followed by
//!   `OP_CHECKSIG`.
//!
//! Only the pay-to-pubkey-hash template carries an extractable 20-byte
//! recipient address; pay-to-pubkey embeds a raw key and
//! [`recipient_address`] returns `None` for it.

use serde::{Deserialize, Serialize};
use std::fmt;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xA9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xAC;

/// Byte length of a pay-to-pubkey-hash script.
pub const P2PKH_LEN: usize = 25;

/// Byte length of a pay-to-pubkey script (push-65 + key + OP_CHECKSIG).
pub const P2PK_LEN: usize = 67;

/// A 20-byte address hash as embedded in pay-to-pubkey-hash scripts.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct AddressHash(pub [u8; 20]);

impl AddressHash {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for AddressHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 20]> for AddressHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AddressHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Classification of an output locking script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptClass {
    PayToPubkeyHash,
    PayToPubkey,
    NonStandard,
}

/// Classify a locking script against the standard templates.
pub fn classify(script: &[u8]) -> ScriptClass {
    if script.len() == P2PKH_LEN
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        return ScriptClass::PayToPubkeyHash;
    }
    if script.len() == P2PK_LEN && script[P2PK_LEN - 1] == OP_CHECKSIG {
        return ScriptClass::PayToPubkey;
    }
    ScriptClass::NonStandard
}

/// Extract the 20-byte recipient address, if the script carries one.
pub fn recipient_address(script: &[u8]) -> Option<AddressHash> {
    match classify(script) {
        ScriptClass::PayToPubkeyHash => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&script[3..23]);
            Some(AddressHash(addr))
        }
        ScriptClass::PayToPubkey | ScriptClass::NonStandard => None,
    }
}

/// Build a pay-to-pubkey-hash script for `addr`.
pub fn p2pkh_script(addr: &AddressHash) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2PKH_LEN);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(0x14);
    script.extend_from_slice(addr.as_bytes());
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> AddressHash {
        AddressHash([seed; 20])
    }

    #[test]
    fn p2pkh_classified_and_extracted() {
        let script = p2pkh_script(&addr(0x42));
        assert_eq!(script.len(), P2PKH_LEN);
        assert_eq!(classify(&script), ScriptClass::PayToPubkeyHash);
        assert_eq!(recipient_address(&script), Some(addr(0x42)));
    }

    #[test]
    fn p2pk_classified_without_address() {
        let mut script = vec![0x41]; // push 65
        script.extend_from_slice(&[0x04; 65]);
        script.push(OP_CHECKSIG);
        assert_eq!(script.len(), P2PK_LEN);
        assert_eq!(classify(&script), ScriptClass::PayToPubkey);
        assert_eq!(recipient_address(&script), None);
    }

    #[test]
    fn empty_script_non_standard() {
        assert_eq!(classify(&[]), ScriptClass::NonStandard);
        assert_eq!(recipient_address(&[]), None);
    }

    #[test]
    fn wrong_length_non_standard() {
        // Correct opcodes but 24 bytes.
        let mut script = p2pkh_script(&addr(1));
        script.remove(10);
        assert_eq!(classify(&script), ScriptClass::NonStandard);
    }

    #[test]
    fn wrong_tail_non_standard() {
        let mut script = p2pkh_script(&addr(1));
        script[24] = 0x00;
        assert_eq!(classify(&script), ScriptClass::NonStandard);
    }

    #[test]
    fn sixty_seven_bytes_without_checksig_non_standard() {
        let script = vec![0x00; P2PK_LEN];
        assert_eq!(classify(&script), ScriptClass::NonStandard);
    }

    #[test]
    fn address_hash_display() {
        let a = addr(0xAB);
        let s = format!("{a}");
        assert_eq!(s.len(), 40);
        assert!(s.starts_with("abab"));
    }
}
