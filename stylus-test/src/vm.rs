// Copyright 2025-2026, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Defines a test VM environment for running Stylus programs without a chain.
//! Implements the [`EvmApi`] a running program reaches chain state through, and the
//! [`StateDb`] programs are fetched from.
//!
//! ```ignore
//! let vm = TestVM::new();
//! vm.set_code(address, processed.code);
//!
//! let api = Box::new(vm.clone());
//! let (outcome, gas_used) = programs.call_program(&vm, address, &calldata, &mut gas, vm.evm_data(false), api, &runtime)?;
//! assert_eq!(vm.get_storage(key), value);
//! ```

use alloy_primitives::{keccak256, Address, B256, U256};
use parking_lot::Mutex;
use std::sync::Arc;

pub use stylus_core::*;
use stylus_core::evm::{
    BLOCKHASH_GAS, COLD_ACCOUNT_GAS, COLD_SLOAD_GAS, CREATE_GAS, ECRECOVER_GAS, LOG_DATA_GAS,
    LOG_GAS, LOG_TOPIC_GAS, SSTORE_RESET_GAS, SSTORE_SET_GAS,
};

use crate::{
    constants::DEFAULT_CALL_GAS,
    state::{EmittedLog, VMState},
};

/// An in-memory chain state for running Stylus programs in tests.
///
/// Clones share the same state, so a test can hand one clone to the bridge as the program's
/// [`EvmApi`] and inspect the effects through another.
///
/// # Examples
/// ```
/// use stylus_test::TestVM;
/// use alloy_primitives::{Address, U256};
///
/// let vm = TestVM::new();
///
/// // Configure transaction state.
/// vm.set_block_number(100);
/// vm.set_sender(Address::from([1u8; 20]));
/// vm.set_value(U256::from(1000));
///
/// // Mock contract calls.
/// let contract = Address::from([2u8; 20]);
/// let data = vec![0x01, 0x02, 0x03];
/// vm.mock_call(contract, data.clone(), U256::from(1000), Ok(vec![0x04]));
///
/// // Get emitted logs after execution
/// let logs = vm.get_emitted_logs();
/// ```
#[derive(Clone)]
pub struct TestVM {
    state: Arc<Mutex<VMState>>,
}

impl Default for TestVM {
    fn default() -> Self {
        Self::new()
    }
}

impl From<VMState> for TestVM {
    fn from(state: VMState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

impl TestVM {
    /// Creates a new TestVM instance.
    pub fn new() -> Self {
        Self::from(VMState::default())
    }

    /// Returns a cloned snapshot of the internal test VM state for inspection.
    pub fn snapshot(&self) -> VMState {
        self.state.lock().clone()
    }

    /// Captures the environment a program call sees.
    ///
    /// # Examples
    /// ```
    /// # use stylus_test::TestVM;
    /// let vm = TestVM::new();
    /// vm.set_block_number(15_000_000);
    ///
    /// let data = vm.evm_data(true);
    /// assert!(data.read_only);
    /// assert_eq!(data.block_number, 15_000_000);
    /// ```
    pub fn evm_data(&self, read_only: bool) -> EvmData {
        let state = self.state.lock();
        EvmData {
            read_only,
            origin: state.tx_origin.unwrap_or(state.msg_sender),
            gas_price: state.tx_gas_price,
            coinbase: state.coinbase,
            block_gas_limit: state.block_gas_limit,
            block_number: state.block_number,
            block_timestamp: state.block_timestamp,
            block_difficulty: state.block_difficulty,
            block_basefee: state.block_basefee,
            block_random: state.block_random,
            chain_id: state.chain_id,
            contract_address: state.contract_address,
            msg_sender: state.msg_sender,
            msg_value: state.msg_value,
        }
    }

    /// Sets the current block number.
    pub fn set_block_number(&self, block_number: u64) {
        self.state.lock().block_number = block_number;
    }

    /// Sets the current block timestamp.
    pub fn set_block_timestamp(&self, timestamp: u64) {
        self.state.lock().block_timestamp = timestamp;
    }

    /// Sets the hash of a past block.
    pub fn set_block_hash(&self, number: u64, hash: B256) {
        self.state.lock().block_hashes.insert(number, hash);
    }

    /// Sets the transaction origin address.
    pub fn set_tx_origin(&self, origin: Address) {
        self.state.lock().tx_origin = Some(origin);
    }

    /// Sets the balance for an address.
    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().balances.insert(address, balance);
    }

    /// Sets the address of the program being run.
    pub fn set_contract_address(&self, address: Address) {
        self.state.lock().contract_address = address;
    }

    /// Sets the code deployed at an address.
    pub fn set_code(&self, address: Address, code: Vec<u8>) {
        self.state.lock().code_storage.insert(address, code);
    }

    /// Sets the transaction sender.
    pub fn set_sender(&self, sender: Address) {
        self.state.lock().msg_sender = sender;
    }

    /// Sets the transaction value.
    pub fn set_value(&self, value: U256) {
        self.state.lock().msg_value = value;
    }

    /// Sets the chain id.
    pub fn set_chain_id(&self, id: u64) {
        self.state.lock().chain_id = id;
    }

    /// Sets the block basefee.
    pub fn set_basefee(&self, basefee: U256) {
        self.state.lock().block_basefee = basefee;
    }

    /// Sets the block difficulty and, after the merge, the beacon randomness.
    pub fn set_difficulty(&self, difficulty: U256, random: Option<B256>) {
        let mut state = self.state.lock();
        state.block_difficulty = difficulty;
        state.block_random = random;
    }

    /// Gets a storage value by key.
    pub fn get_storage(&self, key: B256) -> B256 {
        self.state
            .lock()
            .storage
            .get(&key)
            .copied()
            .unwrap_or_default()
    }

    /// Sets a storage value.
    pub fn set_storage(&self, key: B256, value: B256) {
        self.state.lock().storage.insert(key, value);
    }

    /// Clears all storage.
    pub fn clear_storage(&self) {
        self.state.lock().storage.clear();
    }

    /// Mocks a contract call.
    ///
    /// # Examples
    /// ```
    /// # use stylus_test::TestVM;
    /// # use alloy_primitives::{Address, U256};
    /// let vm = TestVM::new();
    /// let contract = Address::from([1u8; 20]);
    /// let data = vec![0x01, 0x02, 0x03];
    ///
    /// // Mock successful call
    /// vm.mock_call(contract, data.clone(), U256::from(1), Ok(vec![0x04]));
    ///
    /// // Mock reverted call
    /// vm.mock_call(contract, data, U256::ZERO, Err(vec![0xff]));
    /// ```
    pub fn mock_call(
        &self,
        to: Address,
        data: Vec<u8>,
        value: U256,
        return_data: Result<Vec<u8>, Vec<u8>>,
    ) {
        self.state
            .lock()
            .call_returns
            .insert((to, data, value), return_data);
    }

    /// Mocks a delegate call.
    pub fn mock_delegate_call(
        &self,
        to: Address,
        data: Vec<u8>,
        return_data: Result<Vec<u8>, Vec<u8>>,
    ) {
        self.state
            .lock()
            .delegate_call_returns
            .insert((to, data), return_data);
    }

    /// Mocks a static call.
    pub fn mock_static_call(
        &self,
        to: Address,
        data: Vec<u8>,
        return_data: Result<Vec<u8>, Vec<u8>>,
    ) {
        self.state
            .lock()
            .static_call_returns
            .insert((to, data), return_data);
    }

    /// Mocks contract deployment. Unmocked deployments succeed at the address the EVM
    /// would derive.
    ///
    /// # Examples
    /// ```
    /// # use stylus_test::TestVM;
    /// # use alloy_primitives::{Address, B256};
    /// let vm = TestVM::new();
    /// let code = vec![0x60, 0x80, 0x60, 0x40];
    /// let salt = Some(B256::with_last_byte(1));
    /// let deployed_address = Address::from([2u8; 20]);
    ///
    /// vm.mock_deploy(code, salt, Ok(deployed_address));
    /// ```
    pub fn mock_deploy(&self, code: Vec<u8>, salt: Option<B256>, result: Result<Address, Vec<u8>>) {
        self.state
            .lock()
            .deploy_returns
            .insert((code, salt), result);
    }

    /// Gets all emitted logs.
    pub fn get_emitted_logs(&self) -> Vec<EmittedLog> {
        self.state.lock().emitted_logs.clone()
    }

    /// Clears all mocks and logs.
    pub fn clear_mocks(&self) {
        let mut state = self.state.lock();
        state.call_returns.clear();
        state.delegate_call_returns.clear();
        state.static_call_returns.clear();
        state.deploy_returns.clear();
        state.emitted_logs.clear();
        state.return_data.clear();
    }

    fn finish_call(&self, result: Option<Result<Vec<u8>, Vec<u8>>>, gas: u64) -> CallResult {
        let (status, data) = match result.unwrap_or(Ok(vec![])) {
            Ok(data) => (UserOutcomeKind::Success, data),
            Err(data) => (UserOutcomeKind::Revert, data),
        };
        let return_data_len = data.len() as u32;
        self.state.lock().return_data = data;
        CallResult {
            return_data_len,
            cost: DEFAULT_CALL_GAS.min(gas),
            status,
        }
    }

    fn deploy(&self, code: Vec<u8>, endowment: U256, salt: Option<B256>) -> CreateResult {
        let mut state = self.state.lock();
        let mocked = state.deploy_returns.get(&(code.clone(), salt)).cloned();
        let address = mocked.unwrap_or_else(|| {
            Ok(match salt {
                Some(salt) => state.contract_address.create2_from_code(salt.0, &code),
                None => state.contract_address.create(state.nonce),
            })
        });
        state.nonce += 1;

        let return_data = match &address {
            Ok(address) => {
                *state.balances.entry(*address).or_default() += endowment;
                state.code_storage.insert(*address, code);
                vec![]
            }
            Err(revert) => revert.clone(),
        };
        let return_data_len = return_data.len() as u32;
        state.return_data = return_data;
        CreateResult {
            address,
            return_data_len,
            cost: CREATE_GAS,
        }
    }
}

impl StateDb for TestVM {
    fn get_code(&self, address: Address) -> Option<Vec<u8>> {
        self.state.lock().code_storage.get(&address).cloned()
    }
}

impl EvmApi for TestVM {
    fn get_bytes32(&mut self, key: B256) -> (B256, u64) {
        (self.get_storage(key), COLD_SLOAD_GAS)
    }

    fn set_bytes32(&mut self, key: B256, value: B256) -> Result<u64, ApiError> {
        let mut state = self.state.lock();
        let prior = state.storage.insert(key, value).unwrap_or_default();
        if prior.is_zero() {
            Ok(SSTORE_SET_GAS)
        } else {
            Ok(SSTORE_RESET_GAS)
        }
    }

    fn contract_call(
        &mut self,
        contract: Address,
        calldata: &[u8],
        gas: u64,
        value: U256,
    ) -> CallResult {
        let key = (contract, calldata.to_vec(), value);
        let result = self.state.lock().call_returns.get(&key).cloned();
        self.finish_call(result, gas)
    }

    fn delegate_call(&mut self, contract: Address, calldata: &[u8], gas: u64) -> CallResult {
        let key = (contract, calldata.to_vec());
        let result = self.state.lock().delegate_call_returns.get(&key).cloned();
        self.finish_call(result, gas)
    }

    fn static_call(&mut self, contract: Address, calldata: &[u8], gas: u64) -> CallResult {
        let key = (contract, calldata.to_vec());
        let result = self.state.lock().static_call_returns.get(&key).cloned();
        self.finish_call(result, gas)
    }

    fn create1(&mut self, code: Vec<u8>, endowment: U256, _gas: u64) -> CreateResult {
        self.deploy(code, endowment, None)
    }

    fn create2(&mut self, code: Vec<u8>, endowment: U256, salt: B256, _gas: u64) -> CreateResult {
        self.deploy(code, endowment, Some(salt))
    }

    fn get_return_data(&mut self) -> Vec<u8> {
        self.state.lock().return_data.clone()
    }

    fn emit_log(&mut self, data: Vec<u8>, topics: u32) -> Result<u64, ApiError> {
        let split = topics as usize * 32;
        if data.len() < split {
            return Err(ApiError::BadTopicData {
                len: data.len(),
                topics,
            });
        }
        let cost = LOG_GAS + LOG_TOPIC_GAS * topics as u64 + LOG_DATA_GAS * (data.len() - split) as u64;

        let (topics_data, body) = data.split_at(split);
        let topics = topics_data.chunks(32).map(B256::from_slice).collect();
        self.state.lock().emitted_logs.push(EmittedLog {
            topics,
            data: body.to_vec(),
        });
        Ok(cost)
    }

    fn address_balance(&mut self, address: Address) -> (U256, u64) {
        let balance = self
            .state
            .lock()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default();
        (balance, COLD_ACCOUNT_GAS)
    }

    fn address_code_hash(&mut self, address: Address) -> (B256, u64) {
        let hash = match self.state.lock().code_storage.get(&address) {
            Some(code) => keccak256(code),
            None => B256::ZERO,
        };
        (hash, COLD_ACCOUNT_GAS)
    }

    fn block_hash(&mut self, number: U256) -> (B256, u64) {
        let state = self.state.lock();
        let hash = u64::try_from(number)
            .ok()
            .and_then(|number| state.block_hashes.get(&number).copied())
            .unwrap_or_default();
        (hash, BLOCKHASH_GAS)
    }

    fn ecrecover(&mut self, data: &[u8]) -> (Address, u64) {
        let signer = stylus_core::crypto::ecrecover(data).unwrap_or_default();
        (signer, ECRECOVER_GAS)
    }
}
