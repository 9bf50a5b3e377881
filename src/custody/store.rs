//! Wallet Custody Store
//!
//! One JSON file per custodial wallet. The decrypted mnemonic never leaves
//! this module except inside a `SigningContext` or as the one-time return
//! value of `create_wallet`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::crypto::{self, CryptoError, KeyDeriver, OwnerKey};
use crate::domain::persistence::{delete_file, read_json, write_json_atomic};
use crate::domain::{
    fs_safe_name, normalize_mnemonic, validate_address, Network, PersistError, WalletInputError,
    WalletRecord, WalletSummary,
};
use crate::ports::{ChainError, ChainPort, SigningContext};

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error(transparent)]
    InvalidInput(#[from] WalletInputError),
    #[error("Wallet not found: {0}")]
    NotFound(String),
    #[error("Wallet already exists: {0}")]
    AlreadyExists(String),
    #[error("Wallet {0} could not be decrypted")]
    Decryption(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("Key derivation task failed: {0}")]
    Task(String),
}

/// Returned once from `create_wallet`; the mnemonic is not retrievable again
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedWallet {
    pub address: String,
    pub mnemonic: String,
}

/// File-backed custodial wallet store
#[derive(Clone)]
pub struct WalletStore {
    dir: PathBuf,
    network: Network,
    deriver: KeyDeriver,
    chain: Arc<dyn ChainPort>,
}

impl WalletStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        network: Network,
        deriver: KeyDeriver,
        chain: Arc<dyn ChainPort>,
    ) -> Self {
        Self {
            dir: dir.into(),
            network,
            deriver,
            chain,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn wallet_path(&self, address: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fs_safe_name(address)))
    }

    /// Generate a fresh wallet owned by `owner_address`
    pub async fn create_wallet(&self, owner_address: &str) -> Result<CreatedWallet, CustodyError> {
        validate_address(owner_address)?;

        let mnemonic = self.chain.generate_mnemonic().await?;
        let mnemonic = normalize_mnemonic(&mnemonic)?;
        let address = self.store_mnemonic(&mnemonic, owner_address).await?;

        tracing::info!("Created custodial wallet {} for owner {}", address, owner_address);
        Ok(CreatedWallet { address, mnemonic })
    }

    /// Import an existing mnemonic for `owner_address`
    pub async fn add_wallet(&self, mnemonic: &str, owner_address: &str) -> Result<String, CustodyError> {
        validate_address(owner_address)?;
        let mnemonic = normalize_mnemonic(mnemonic)?;
        let address = self.store_mnemonic(&mnemonic, owner_address).await?;

        tracing::info!("Imported custodial wallet {} for owner {}", address, owner_address);
        Ok(address)
    }

    async fn store_mnemonic(&self, mnemonic: &str, owner_address: &str) -> Result<String, CustodyError> {
        let address = self.chain.derive_address(mnemonic, self.network).await?;
        let path = self.wallet_path(&address);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(CustodyError::AlreadyExists(address));
        }

        let key = self.derive_key(owner_address).await?;
        let encrypted_mnemonic = crypto::encrypt(&key, mnemonic)?;

        let record = WalletRecord {
            address: address.clone(),
            network: self.network,
            encrypted_mnemonic,
            owner_address: owner_address.to_string(),
            created_at: Utc::now(),
        };
        write_json_atomic(&path, &record).await?;
        Ok(address)
    }

    /// True iff the wallet's ciphertext opens under `owner_address`'s key.
    /// A missing or unreadable wallet is `false`.
    pub async fn verify_wallet_ownership(&self, wallet_address: &str, owner_address: &str) -> bool {
        let record = match self.read_record(wallet_address).await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Ownership check could not read wallet {}: {}", wallet_address, e);
                return false;
            }
        };

        match self.derive_key(owner_address).await {
            Ok(key) => crypto::decrypt(&key, &record.encrypted_mnemonic).is_ok(),
            Err(e) => {
                tracing::warn!("Ownership check key derivation failed: {}", e);
                false
            }
        }
    }

    /// Every wallet whose ciphertext opens under `owner_address`'s key.
    /// One decryption attempt per stored wallet.
    pub async fn get_wallets_by_owner(&self, owner_address: &str) -> Result<Vec<WalletSummary>, CustodyError> {
        let records = self.read_all().await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let key = self.derive_key(owner_address).await?;
        let mut wallets: Vec<WalletSummary> = records
            .iter()
            .filter(|r| crypto::decrypt(&key, &r.encrypted_mnemonic).is_ok())
            .map(WalletSummary::from)
            .collect();
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.address.cmp(&b.address)));
        Ok(wallets)
    }

    /// Decrypt with the record's own stored owner. For callers that already
    /// authenticated the owner.
    pub async fn load_wallet(&self, address: &str) -> Result<SigningContext, CustodyError> {
        let record = self
            .read_record(address)
            .await?
            .ok_or_else(|| CustodyError::NotFound(address.to_string()))?;

        let key = self.derive_key(&record.owner_address).await?;
        let mnemonic = crypto::decrypt(&key, &record.encrypted_mnemonic)
            .map_err(|_| CustodyError::Decryption(address.to_string()))?;

        Ok(SigningContext::new(record.address, record.network, mnemonic))
    }

    /// Irreversibly remove a wallet file
    pub async fn delete_wallet(&self, address: &str) -> Result<(), CustodyError> {
        if self.read_record(address).await?.is_none() || !delete_file(&self.wallet_path(address)).await? {
            return Err(CustodyError::NotFound(address.to_string()));
        }
        tracing::warn!("Deleted custodial wallet {}", address);
        Ok(())
    }

    pub async fn wallet_exists(&self, address: &str) -> bool {
        matches!(self.read_record(address).await, Ok(Some(_)))
    }

    /// The record stored for exactly `address`. Distinct addresses can share
    /// a file stem, so the stored address must match.
    async fn read_record(&self, address: &str) -> Result<Option<WalletRecord>, CustodyError> {
        let record: Option<WalletRecord> = read_json(&self.wallet_path(address)).await?;
        Ok(record.filter(|r| {
            let exact = r.address == address;
            if !exact {
                tracing::warn!("Wallet lookup for {} matched the file of {}", address, r.address);
            }
            exact
        }))
    }

    async fn read_all(&self) -> Result<Vec<WalletRecord>, CustodyError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistError::ReadError(e.to_string()).into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistError::ReadError(e.to_string()))?
        {
            let path = entry.path();
            if !is_wallet_file(&path) {
                continue;
            }
            match read_json::<WalletRecord>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable wallet file {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }

    async fn derive_key(&self, owner_address: &str) -> Result<OwnerKey, CustodyError> {
        let deriver = self.deriver.clone();
        let owner = owner_address.to_string();
        tokio::task::spawn_blocking(move || deriver.derive(&owner))
            .await
            .map_err(|e| CustodyError::Task(e.to_string()))
    }
}

fn is_wallet_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{mock_address, MockChain};
    use tempfile::tempdir;

    fn owner(tag: char) -> String {
        format!("addr_test1q{}", tag.to_string().repeat(58))
    }

    fn store(dir: &Path) -> WalletStore {
        WalletStore::new(
            dir,
            Network::Preprod,
            KeyDeriver::new("unit-test-secret", 10).unwrap(),
            Arc::new(MockChain::new()),
        )
    }

    fn mnemonic(word: &str) -> String {
        vec![word; 12].join(" ")
    }

    #[tokio::test]
    async fn test_create_wallet_returns_mnemonic_once() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let x = owner('x');

        let created = store.create_wallet(&x).await.unwrap();
        assert_eq!(created.address, mock_address(&created.mnemonic, Network::Preprod));

        let raw = std::fs::read_to_string(store.wallet_path(&created.address)).unwrap();
        assert!(!raw.contains(&created.mnemonic));
        let record: WalletRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.owner_address, x);
        assert_eq!(record.encrypted_mnemonic.split(':').count(), 3);
    }

    #[tokio::test]
    async fn test_verify_ownership() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let (x, y) = (owner('x'), owner('y'));

        let created = store.create_wallet(&x).await.unwrap();
        assert!(store.verify_wallet_ownership(&created.address, &x).await);
        assert!(!store.verify_wallet_ownership(&created.address, &y).await);
    }

    #[tokio::test]
    async fn test_verify_missing_wallet_is_false() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(!store.verify_wallet_ownership("addr_test1qmissing", &owner('x')).await);
    }

    #[tokio::test]
    async fn test_add_wallet_validates_mnemonic() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let result = store.add_wallet("too few words", &owner('x')).await;
        assert!(matches!(
            result,
            Err(CustodyError::InvalidInput(WalletInputError::MnemonicWordCount(3)))
        ));
        assert!(store.get_wallets_by_owner(&owner('x')).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_wallet_rejects_bad_owner() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let result = store.add_wallet(&mnemonic("abandon"), "not-an-address").await;
        assert!(matches!(
            result,
            Err(CustodyError::InvalidInput(WalletInputError::InvalidAddress(_)))
        ));
    }

    #[tokio::test]
    async fn test_add_wallet_twice_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_wallet(&mnemonic("abandon"), &owner('x')).await.unwrap();
        let again = store.add_wallet(&mnemonic("abandon"), &owner('y')).await;
        assert!(matches!(again, Err(CustodyError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_wallets_by_owner_intermixed() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let (x, y, z) = (owner('x'), owner('y'), owner('z'));

        let mut expected_x = Vec::new();
        let mut expected_y = Vec::new();
        for (i, word) in ["abandon", "ability", "able", "about", "above"].iter().enumerate() {
            let address = if i % 2 == 0 {
                let a = store.add_wallet(&mnemonic(word), &x).await.unwrap();
                expected_x.push(a.clone());
                a
            } else {
                let a = store.add_wallet(&mnemonic(word), &y).await.unwrap();
                expected_y.push(a.clone());
                a
            };
            assert!(store.wallet_exists(&address).await);
        }

        let mut got_x: Vec<String> = store.get_wallets_by_owner(&x).await.unwrap().into_iter().map(|w| w.address).collect();
        let mut got_y: Vec<String> = store.get_wallets_by_owner(&y).await.unwrap().into_iter().map(|w| w.address).collect();
        got_x.sort();
        got_y.sort();
        expected_x.sort();
        expected_y.sort();

        assert_eq!(got_x, expected_x);
        assert_eq!(got_y, expected_y);
        assert!(store.get_wallets_by_owner(&z).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_wallet_recovers_signing_context() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let address = store.add_wallet(&mnemonic("absorb"), &owner('x')).await.unwrap();

        let ctx = store.load_wallet(&address).await.unwrap();
        assert_eq!(ctx.address, address);
        assert_eq!(ctx.mnemonic(), mnemonic("absorb"));
        assert_eq!(ctx.network, Network::Preprod);
    }

    #[tokio::test]
    async fn test_load_wallet_tampered_owner_fails() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let address = store.add_wallet(&mnemonic("absorb"), &owner('x')).await.unwrap();

        // Rewriting the declared owner does not transfer ownership
        let path = store.wallet_path(&address);
        let mut record: WalletRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        record.owner_address = owner('y');
        std::fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

        assert!(matches!(store.load_wallet(&address).await, Err(CustodyError::Decryption(_))));
        assert!(!store.verify_wallet_ownership(&address, &owner('y')).await);
        assert!(store.verify_wallet_ownership(&address, &owner('x')).await);
    }

    #[tokio::test]
    async fn test_alias_address_does_not_open_wallet() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let x = owner('x');
        let address = store.add_wallet(&mnemonic("absorb"), &x).await.unwrap();

        // Same file stem, different address
        let alias = address.replacen('_', ".", 1);
        assert_ne!(alias, address);
        assert_eq!(store.wallet_path(&alias), store.wallet_path(&address));

        assert!(!store.verify_wallet_ownership(&alias, &x).await);
        assert!(matches!(store.load_wallet(&alias).await, Err(CustodyError::NotFound(_))));
        assert!(!store.wallet_exists(&alias).await);
        assert!(matches!(store.delete_wallet(&alias).await, Err(CustodyError::NotFound(_))));
        assert!(store.verify_wallet_ownership(&address, &x).await);
    }

    #[tokio::test]
    async fn test_load_missing_wallet() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(store.load_wallet("addr_test1qnone").await, Err(CustodyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_wallet() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let address = store.add_wallet(&mnemonic("abstract"), &owner('x')).await.unwrap();

        store.delete_wallet(&address).await.unwrap();
        assert!(!store.wallet_exists(&address).await);
        assert!(!store.verify_wallet_ownership(&address, &owner('x')).await);
        assert!(matches!(store.delete_wallet(&address).await, Err(CustodyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_skipped_in_listing() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let address = store.add_wallet(&mnemonic("able"), &owner('x')).await.unwrap();
        std::fs::write(dir.path().join("garbage.json"), "{ not json").unwrap();

        let wallets = store.get_wallets_by_owner(&owner('x')).await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].address, address);
    }
}
