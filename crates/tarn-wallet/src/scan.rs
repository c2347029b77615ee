//! Owned-address registry and the two-pass transaction scan.
//!
//! The scan works in two passes over every indexed transaction. The output
//! pass finds outputs whose locking script embeds one of the registered
//! 20-byte addresses and records them as owned (or non-standard, when the
//! script carries no extractable address). The input pass then finds inputs
//! whose unlock script embeds one of the registered 64-byte public keys and
//! marks the spent outputs. The output pass completes before the input
//! pass begins, so spend bookkeeping always finds its output already
//! recorded.
//!
//! The balance is the sum of unspent owned output values; spends subtract
//! by removal, never by a separate balance adjustment.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, warn};

use tarn_chain::ChainIndex;
use tarn_codec::script::AddressHash;
use tarn_codec::types::{Hash256, OutPoint};

/// A 64-byte public key, matched against input unlock scripts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; 64]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "…)")
    }
}

/// An owned output discovered by the scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedTxOut {
    /// The outpoint naming this output; look the backing transaction up in
    /// the chain index on demand.
    pub outpoint: OutPoint,
    pub value: u64,
    pub pk_script: Vec<u8>,
    /// Cached recipient address, when the script carries one.
    pub recipient: Option<AddressHash>,
    pub is_spent: bool,
}

/// An owned spend discovered by the input pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedTxIn {
    /// The outpoint being spent.
    pub outpoint: OutPoint,
    /// Hash of the spending transaction.
    pub spending_tx: Hash256,
    /// Index of the spending input within that transaction.
    pub input_index: u32,
}

/// Owned-address registry and scan results.
///
/// Registering an address resets the accumulated scan state: the owned
/// sets are rebuilt from scratch on the next scan. Re-running the scan
/// with an unchanged registry is idempotent.
#[derive(Debug, Default)]
pub struct Wallet {
    accounts: BTreeMap<AddressHash, PublicKey>,
    my_tx_outs: BTreeMap<OutPoint, OwnedTxOut>,
    my_unspent_tx_outs: BTreeSet<OutPoint>,
    my_tx_outs_non_standard: BTreeMap<OutPoint, OwnedTxOut>,
    my_tx_ins: BTreeMap<OutPoint, OwnedTxIn>,
    balance: u64,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owned address with its public key.
    ///
    /// Clears any previous scan results; call
    /// [`flag_my_transactions`](Self::flag_my_transactions) afterwards.
    pub fn add_account(&mut self, addr: AddressHash, pubkey: PublicKey) {
        self.accounts.insert(addr, pubkey);
        self.my_tx_outs.clear();
        self.my_unspent_tx_outs.clear();
        self.my_tx_outs_non_standard.clear();
        self.my_tx_ins.clear();
        self.balance = 0;
        debug!(%addr, accounts = self.accounts.len(), "account registered, scan state reset");
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Scan every indexed transaction for owned outputs and spends.
    pub fn flag_my_transactions(&mut self, index: &ChainIndex) {
        if self.accounts.is_empty() {
            return;
        }
        self.scan_outputs(index);
        self.scan_inputs(index);
        info!(
            owned = self.my_tx_outs.len(),
            unspent = self.my_unspent_tx_outs.len(),
            non_standard = self.my_tx_outs_non_standard.len(),
            spends = self.my_tx_ins.len(),
            balance = self.balance,
            "wallet scan complete"
        );
    }

    /// Output pass: record outputs whose script embeds an owned address.
    fn scan_outputs(&mut self, index: &ChainIndex) {
        for itx in index.transactions() {
            for addr in self.accounts.keys() {
                for (i, out) in itx.tx.outputs.iter().enumerate() {
                    if !contains_subslice(&out.pk_script, addr.as_bytes()) {
                        continue;
                    }
                    let op = itx.outpoint(i as u32);
                    if self.my_tx_outs.contains_key(&op)
                        || self.my_tx_outs_non_standard.contains_key(&op)
                    {
                        continue; // recorded by an earlier scan
                    }
                    match out.recipient_address() {
                        Some(recipient) => {
                            self.my_tx_outs.insert(
                                op,
                                OwnedTxOut {
                                    outpoint: op,
                                    value: out.value,
                                    pk_script: out.pk_script.clone(),
                                    recipient: Some(recipient),
                                    is_spent: false,
                                },
                            );
                            self.my_unspent_tx_outs.insert(op);
                            self.balance += out.value;
                        }
                        None => {
                            warn!(outpoint = %op, "non-standard script pays an owned address");
                            self.my_tx_outs_non_standard.insert(
                                op,
                                OwnedTxOut {
                                    outpoint: op,
                                    value: out.value,
                                    pk_script: out.pk_script.clone(),
                                    recipient: None,
                                    is_spent: false,
                                },
                            );
                        }
                    }
                }
            }
        }
    }

    /// Input pass: mark outputs spent by inputs carrying an owned key.
    fn scan_inputs(&mut self, index: &ChainIndex) {
        for itx in index.transactions() {
            for pubkey in self.accounts.values() {
                for (i, input) in itx.tx.inputs.iter().enumerate() {
                    if !contains_subslice(&input.script, pubkey.as_bytes()) {
                        continue;
                    }
                    let op = input.outpoint;
                    let Some(owned) = self.my_tx_outs.get_mut(&op) else {
                        // The spend is ours but the funding output never
                        // was; nothing to mark.
                        debug!(outpoint = %op, "owned spend of an unrecorded output");
                        continue;
                    };
                    if !owned.is_spent {
                        owned.is_spent = true;
                        self.my_unspent_tx_outs.remove(&op);
                        self.balance -= owned.value;
                    }
                    self.my_tx_ins.insert(
                        op,
                        OwnedTxIn {
                            outpoint: op,
                            spending_tx: itx.this_hash(),
                            input_index: i as u32,
                        },
                    );
                }
            }
        }
    }

    /// Sum of unspent owned output values.
    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Every owned output, spent or not, keyed by outpoint.
    pub fn my_tx_outs(&self) -> &BTreeMap<OutPoint, OwnedTxOut> {
        &self.my_tx_outs
    }

    /// Outpoints of owned outputs not yet spent.
    pub fn my_unspent_tx_outs(&self) -> &BTreeSet<OutPoint> {
        &self.my_unspent_tx_outs
    }

    /// Outputs paying an owned address through a script with no
    /// extractable standard address.
    pub fn my_tx_outs_non_standard(&self) -> &BTreeMap<OutPoint, OwnedTxOut> {
        &self.my_tx_outs_non_standard
    }

    /// Owned spends, keyed by the outpoint they consume.
    pub fn my_tx_ins(&self) -> &BTreeMap<OutPoint, OwnedTxIn> {
        &self.my_tx_ins
    }
}

/// Whether `haystack` contains `needle` as a contiguous subslice.
fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return needle.is_empty();
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
