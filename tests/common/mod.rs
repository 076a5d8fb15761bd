//! Shared utilities for integration tests: an in-memory ledger.

#![allow(dead_code)]

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, Log, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use poll_relay::blockchain::client::LedgerClient;
use poll_relay::blockchain::types::{
    BlockInfo, BroadcastError, CallError, CallRequest, LedgerError, LedgerResult, ReceiptInfo,
    SubmissionConfig,
};
use poll_relay::blockchain::wallet::Wallet;

pub const CHAIN_ID: u64 = 31337;

// Anvil's first two accounts.
pub const CONTROLLER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const SECOND_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn controller() -> Wallet {
    Wallet::from_private_key(CONTROLLER_KEY, CHAIN_ID).unwrap()
}

pub fn second_wallet() -> Wallet {
    Wallet::from_private_key(SECOND_KEY, CHAIN_ID).unwrap()
}

/// Submission policy with short delays so tests run fast.
pub fn fast_policy() -> SubmissionConfig {
    SubmissionConfig {
        receipt_poll_interval_ms: 10,
        confirmation_timeout_secs: 1,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        ..SubmissionConfig::default()
    }
}

/// First four bytes of keccak256 of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// What the mock does with the next broadcast.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reject with the given error.
    Reject(BroadcastError),
    /// Another transaction takes the sender's nonce first, then reject with
    /// a nonce conflict.
    NonceTaken,
    /// Accept the payload into the pool but answer with the given error, as
    /// a failover node does after the primary took the payload and timed out.
    AcceptThenReport(BroadcastError),
}

/// One observed broadcast, decoded from its raw payload.
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub hash: TxHash,
    pub sender: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub nonce: u64,
    pub tip: u128,
    pub max_fee: u128,
    pub accepted: bool,
}

struct State {
    base_fee: u128,
    block_number: u64,
    timestamp: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, ReceiptInfo>,
    broadcasts: Vec<BroadcastRecord>,
    scripts: VecDeque<Script>,
    preflight_revert: Option<String>,
    responses: HashMap<[u8; 4], Bytes>,
    query_revert: HashMap<[u8; 4], String>,
    next_logs: Vec<Log>,
    mine: bool,
    revert_on_chain: bool,
    receipts_down: bool,
}

/// An in-memory ledger that mines accepted transactions immediately.
pub struct MockLedger {
    state: Mutex<State>,
    requests: AtomicUsize,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                base_fee: 1_000_000_000,
                block_number: 1,
                timestamp: 1_700_000_000,
                balances: HashMap::new(),
                nonces: HashMap::new(),
                receipts: HashMap::new(),
                broadcasts: Vec::new(),
                scripts: VecDeque::new(),
                preflight_revert: None,
                responses: HashMap::new(),
                query_revert: HashMap::new(),
                next_logs: Vec::new(),
                mine: true,
                revert_on_chain: false,
                receipts_down: false,
            }),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    pub fn set_base_fee(&self, base_fee: u128) {
        self.state.lock().unwrap().base_fee = base_fee;
    }

    pub fn script(&self, script: Script) {
        self.state.lock().unwrap().scripts.push_back(script);
    }

    /// Make every simulation and gas estimate revert with `reason`.
    pub fn revert_preflight(&self, reason: &str) {
        self.state.lock().unwrap().preflight_revert = Some(reason.to_string());
    }

    /// Accept broadcasts but never mine them.
    pub fn stop_mining(&self) {
        self.state.lock().unwrap().mine = false;
    }

    /// Mine transactions with failure status.
    pub fn revert_on_chain(&self) {
        self.state.lock().unwrap().revert_on_chain = true;
    }

    /// Make every receipt lookup fail as timed out.
    pub fn fail_receipts(&self) {
        self.state.lock().unwrap().receipts_down = true;
    }

    /// Return `data` for read calls to the function with `signature`.
    pub fn respond(&self, signature: &str, data: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(selector(signature), data.into());
    }

    /// Make read calls to `signature` revert.
    pub fn revert_query(&self, signature: &str, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .query_revert
            .insert(selector(signature), reason.to_string());
    }

    /// Logs attached to the next mined receipt.
    pub fn emit_logs(&self, logs: Vec<Log>) {
        self.state.lock().unwrap().next_logs = logs;
    }

    pub fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn broadcast_count(&self) -> usize {
        self.state.lock().unwrap().broadcasts.len()
    }

    /// Successful receipts observed so far.
    pub fn successful_receipts(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .receipts
            .values()
            .filter(|r| r.success)
            .count()
    }

    /// Every call made through `LedgerClient`.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        self.touch();
        Ok(CHAIN_ID)
    }

    async fn balance(&self, address: Address) -> LedgerResult<U256> {
        self.touch();
        // Let other tasks run between a balance read and what follows it.
        tokio::task::yield_now().await;
        Ok(self.balance_of(address))
    }

    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.touch();
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&address)
            .copied()
            .unwrap_or(0))
    }

    async fn latest_block(&self) -> LedgerResult<BlockInfo> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(BlockInfo {
            number: state.block_number,
            timestamp: state.timestamp,
            base_fee: state.base_fee,
        })
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, CallError> {
        self.touch();
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.preflight_revert {
            return Err(CallError::Reverted(reason.clone()));
        }
        Ok(if call.input.is_empty() { 21_000 } else { 120_000 })
    }

    async fn simulate(&self, call: &CallRequest) -> Result<Bytes, CallError> {
        self.touch();
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.preflight_revert {
            return Err(CallError::Reverted(reason.clone()));
        }
        if call.input.len() < 4 {
            return Ok(Bytes::new());
        }
        let key = [call.input[0], call.input[1], call.input[2], call.input[3]];
        if let Some(reason) = state.query_revert.get(&key) {
            return Err(CallError::Reverted(reason.clone()));
        }
        Ok(state.responses.get(&key).cloned().unwrap_or_default())
    }

    async fn broadcast(&self, raw: Bytes) -> Result<TxHash, BroadcastError> {
        self.touch();
        let envelope = TxEnvelope::decode_2718_exact(&raw)
            .map_err(|e| BroadcastError::Other(format!("undecodable payload: {}", e)))?;
        let sender = envelope
            .recover_signer()
            .map_err(|e| BroadcastError::Other(format!("bad signature: {}", e)))?;
        let hash = *envelope.tx_hash();

        let mut state = self.state.lock().unwrap();
        let mut record = BroadcastRecord {
            hash,
            sender,
            to: envelope.to(),
            value: envelope.value(),
            nonce: envelope.nonce(),
            tip: envelope.max_priority_fee_per_gas().unwrap_or_default(),
            max_fee: envelope.max_fee_per_gas(),
            accepted: false,
        };

        let mut reported = None;
        match state.scripts.pop_front() {
            Some(Script::Reject(err)) => {
                state.broadcasts.push(record);
                return Err(err);
            }
            Some(Script::NonceTaken) => {
                state.broadcasts.push(record);
                *state.nonces.entry(sender).or_insert(0) += 1;
                return Err(BroadcastError::NonceConflict("nonce too low".to_string()));
            }
            Some(Script::AcceptThenReport(err)) => reported = Some(err),
            None => {}
        }

        let expected = state.nonces.get(&sender).copied().unwrap_or(0);
        if record.nonce < expected {
            state.broadcasts.push(record);
            return Err(BroadcastError::NonceConflict("nonce too low".to_string()));
        }

        record.accepted = true;
        state.broadcasts.push(record.clone());
        state.nonces.insert(sender, record.nonce + 1);

        if state.mine {
            let success = !state.revert_on_chain;
            if success {
                let from = state.balances.entry(sender).or_default();
                *from = from.saturating_sub(record.value);
                if let Some(to) = record.to {
                    *state.balances.entry(to).or_default() += record.value;
                }
            }
            state.block_number += 1;
            state.timestamp += 12;
            let receipt = ReceiptInfo {
                tx_hash: hash,
                block_number: state.block_number,
                success,
                gas_used: 100_000,
                logs: std::mem::take(&mut state.next_logs),
            };
            state.receipts.insert(hash, receipt);
        }

        match reported {
            Some(err) => Err(err),
            None => Ok(hash),
        }
    }

    async fn receipt(&self, tx_hash: TxHash) -> LedgerResult<Option<ReceiptInfo>> {
        self.touch();
        let state = self.state.lock().unwrap();
        if state.receipts_down {
            return Err(LedgerError::Timeout(30));
        }
        Ok(state.receipts.get(&tx_hash).cloned())
    }

    async fn transaction_known(&self, tx_hash: TxHash) -> LedgerResult<bool> {
        self.touch();
        Ok(self
            .state
            .lock()
            .unwrap()
            .broadcasts
            .iter()
            .any(|b| b.accepted && b.hash == tx_hash))
    }
}

/// A ledger whose every call fails as unreachable.
pub struct DeadLedger;

#[async_trait]
impl LedgerClient for DeadLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        Err(down())
    }

    async fn balance(&self, _address: Address) -> LedgerResult<U256> {
        Err(down())
    }

    async fn pending_nonce(&self, _address: Address) -> LedgerResult<u64> {
        Err(down())
    }

    async fn latest_block(&self) -> LedgerResult<BlockInfo> {
        Err(down())
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> Result<u64, CallError> {
        Err(down().into())
    }

    async fn simulate(&self, _call: &CallRequest) -> Result<Bytes, CallError> {
        Err(down().into())
    }

    async fn broadcast(&self, _raw: Bytes) -> Result<TxHash, BroadcastError> {
        Err(down().into())
    }

    async fn receipt(&self, _tx_hash: TxHash) -> LedgerResult<Option<ReceiptInfo>> {
        Err(down())
    }
}

fn down() -> LedgerError {
    LedgerError::Connection("all RPC endpoints unreachable".to_string())
}
