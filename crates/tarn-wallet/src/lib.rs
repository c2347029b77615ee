//! # tarn-wallet
//! Wallet-side view over an indexed chain: register owned addresses, scan
//! every indexed transaction, and maintain the owned, unspent, spent, and
//! non-standard output sets plus the resulting balance.

pub mod scan;

pub use scan::{OwnedTxIn, OwnedTxOut, PublicKey, Wallet};
