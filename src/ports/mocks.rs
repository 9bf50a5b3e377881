//! Recording mocks of the external ports, used by unit and integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::execution::{ChainError, ChainPort};
use super::market_data::{DexPort, OracleError};
use super::models::{Pool, SigningContext, SwapTransaction, TransferRequest};
use super::notify::{EngineEvent, Notifier};
use crate::domain::{Network, Utxo, LOVELACE};

/// Token-side reserve used by `MockDex::with_price`
const MOCK_TOKEN_RESERVE: u128 = 1_000_000_000_000_000;

/// Mock DEX with settable prices. Swaps are simulated at the spot ratio so
/// the price a test sets is exactly the price the oracle derives.
#[derive(Debug, Default)]
pub struct MockDex {
    pools: Arc<Mutex<HashMap<String, Pool>>>,
    decimals: Arc<Mutex<HashMap<String, u8>>>,
    unavailable: Arc<Mutex<HashSet<String>>>,
    pool_calls: Arc<AtomicU64>,
    decimals_calls: Arc<AtomicU64>,
}

impl MockDex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a lovelace/`base` pool at `price` ADA per token
    pub fn with_price(self, pool_id: &str, base: &str, price: f64) -> Self {
        self.set_price(pool_id, base, price);
        self
    }

    /// Builder method to set decimals of a unit (default 6)
    pub fn with_decimals(self, unit: &str, decimals: u8) -> Self {
        self.decimals.lock().unwrap().insert(unit.to_string(), decimals);
        self
    }

    pub fn set_price(&self, pool_id: &str, base: &str, price: f64) {
        let decimals = self.decimals.lock().unwrap().get(base).copied().unwrap_or(6);
        // lovelace per base unit, scaled so both sides normalize to `price`
        let scale = 10f64.powi(6 - decimals as i32);
        let reserve_ada = (price * scale * MOCK_TOKEN_RESERVE as f64).round() as u128;
        self.pools.lock().unwrap().insert(
            pool_id.to_string(),
            Pool {
                pool_id: pool_id.to_string(),
                asset_a: LOVELACE.to_string(),
                asset_b: base.to_string(),
                reserve_a: reserve_ada,
                reserve_b: MOCK_TOKEN_RESERVE,
            },
        );
        self.unavailable.lock().unwrap().remove(pool_id);
    }

    /// Make every lookup of `pool_id` fail until the next `set_price`
    pub fn set_unavailable(&self, pool_id: &str) {
        self.unavailable.lock().unwrap().insert(pool_id.to_string());
    }

    pub fn pool_calls(&self) -> u64 {
        self.pool_calls.load(Ordering::SeqCst)
    }

    pub fn decimals_calls(&self) -> u64 {
        self.decimals_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DexPort for MockDex {
    async fn get_pool_by_id(&self, pool_id: &str) -> Result<Pool, OracleError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.lock().unwrap().contains(pool_id) {
            return Err(OracleError::PriceUnavailable(pool_id.to_string()));
        }
        self.pools
            .lock()
            .unwrap()
            .get(pool_id)
            .cloned()
            .ok_or_else(|| OracleError::PoolNotFound(pool_id.to_string()))
    }

    async fn token_decimals(&self, unit: &str) -> Result<u8, OracleError> {
        self.decimals_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.decimals.lock().unwrap().get(unit).copied().unwrap_or(6))
    }

    fn simulate_swap(&self, amount_in: u128, reserve_in: u128, reserve_out: u128) -> u128 {
        if reserve_in == 0 {
            return 0;
        }
        amount_in * reserve_out / reserve_in
    }
}

const MOCK_WORDS: [&str; 8] = [
    "abandon", "ability", "able", "about", "above", "absent", "absorb", "abstract",
];

const BECH32_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Deterministic address for a mnemonic, shaped like a real bech32 address
pub fn mock_address(mnemonic: &str, network: Network) -> String {
    let first = Sha256::digest(mnemonic.as_bytes());
    let second = Sha256::digest(first);
    let body: String = first
        .iter()
        .chain(second.iter())
        .take(58)
        .map(|b| BECH32_CHARSET[(*b % 32) as usize] as char)
        .collect();
    format!("{}q{}", network.address_prefix(), body)
}

/// Mock chain library: deterministic keys, recorded submissions
#[derive(Debug, Default)]
pub struct MockChain {
    mnemonic_counter: Arc<AtomicU64>,
    tx_counter: Arc<AtomicU64>,
    utxos: Arc<Mutex<HashMap<String, Vec<Utxo>>>>,
    swaps: Arc<Mutex<Vec<(String, SwapTransaction)>>>,
    transfers: Arc<Mutex<Vec<(String, TransferRequest)>>>,
    swap_failure: Arc<Mutex<Option<ChainError>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to place UTXOs at an address
    pub fn with_utxos(self, address: &str, utxos: Vec<Utxo>) -> Self {
        self.utxos.lock().unwrap().insert(address.to_string(), utxos);
        self
    }

    /// Make every following swap submission fail with `error`
    pub fn fail_swaps(&self, error: ChainError) {
        *self.swap_failure.lock().unwrap() = Some(error);
    }

    /// Recorded swaps as (signer address, swap)
    pub fn swaps(&self) -> Vec<(String, SwapTransaction)> {
        self.swaps.lock().unwrap().clone()
    }

    /// Recorded transfers as (signer address, transfer)
    pub fn transfers(&self) -> Vec<(String, TransferRequest)> {
        self.transfers.lock().unwrap().clone()
    }

    fn next_tx_hash(&self) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        hex::encode(Sha256::digest(format!("mock-tx-{}", n).as_bytes()))
    }
}

#[async_trait]
impl ChainPort for MockChain {
    async fn generate_mnemonic(&self) -> Result<String, ChainError> {
        let n = self.mnemonic_counter.fetch_add(1, Ordering::SeqCst) as usize;
        let words: Vec<&str> = (0..24).map(|i| MOCK_WORDS[(n + i * (n + 1)) % MOCK_WORDS.len()]).collect();
        // Counter suffix word keeps consecutive mnemonics distinct
        let mut phrase = words[..23].join(" ");
        phrase.push(' ');
        phrase.push_str(&"z".repeat(n % 40 + 1));
        Ok(phrase)
    }

    async fn derive_address(&self, mnemonic: &str, network: Network) -> Result<String, ChainError> {
        Ok(mock_address(mnemonic, network))
    }

    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, ChainError> {
        Ok(self.utxos.lock().unwrap().get(address).cloned().unwrap_or_default())
    }

    async fn submit_swap(
        &self,
        signer: &SigningContext,
        swap: &SwapTransaction,
    ) -> Result<String, ChainError> {
        if let Some(err) = self.swap_failure.lock().unwrap().clone() {
            return Err(err);
        }
        if signer.address != mock_address(signer.mnemonic(), signer.network) {
            return Err(ChainError::SigningError("mnemonic does not match address".to_string()));
        }
        self.swaps.lock().unwrap().push((signer.address.clone(), swap.clone()));
        Ok(self.next_tx_hash())
    }

    async fn submit_transfer(
        &self,
        signer: &SigningContext,
        transfer: &TransferRequest,
    ) -> Result<String, ChainError> {
        self.transfers.lock().unwrap().push((signer.address.clone(), transfer.clone()));
        Ok(self.next_tx_hash())
    }
}

/// Notifier that keeps every event
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
