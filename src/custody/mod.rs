//! Wallet Custody
//!
//! Custodial wallet storage with owner-scoped key derivation. Ownership is
//! never declared by an index; it is proven by successfully decrypting the
//! wallet's mnemonic under a key derived from the candidate owner address.

pub mod crypto;
pub mod store;

pub use crypto::{CryptoError, KeyDeriver, DEFAULT_KDF_ITERATIONS};
pub use store::{CreatedWallet, CustodyError, WalletStore};
