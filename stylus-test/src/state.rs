// Copyright 2025-2026, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! This module defines the internal state of the Stylus test VM.

use alloy_primitives::{Address, B256, U256};
use std::collections::HashMap;

use crate::constants::{
    DEFAULT_BASEFEE, DEFAULT_BLOCK_GAS_LIMIT, DEFAULT_CHAIN_ID, DEFAULT_CONTRACT_ADDRESS,
    DEFAULT_SENDER,
};

/// Type aliases for the return values of mocked calls and deployments.
type CallReturn = Result<Vec<u8>, Vec<u8>>;
type DeploymentReturn = Result<Address, Vec<u8>>;
type MockCallWithAddress = (Address, Vec<u8>);
type MockCallWithValue = (Address, Vec<u8>, U256);
type DeploymentWithSalt = (Vec<u8>, Option<B256>);

/// A log emitted through the [`crate::TestVM`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedLog {
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// Defines the internal state of the Stylus test VM.
/// Internally, it tracks information such as mocked calls and their return values,
/// balances and code of addresses, and the storage of the program being run.
#[derive(Debug, Clone)]
pub struct VMState {
    pub storage: HashMap<B256, B256>,
    pub msg_sender: Address,
    pub chain_id: u64,
    pub contract_address: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_hashes: HashMap<u64, B256>,
    pub tx_origin: Option<Address>, // Defaults to msg sender if None.
    pub balances: HashMap<Address, U256>,
    pub code_storage: HashMap<Address, Vec<u8>>,
    pub msg_value: U256,
    pub block_gas_limit: u64,
    pub coinbase: Address,
    pub block_basefee: U256,
    pub block_difficulty: U256,
    pub block_random: Option<B256>,
    pub tx_gas_price: U256,
    pub nonce: u64,
    pub call_returns: HashMap<MockCallWithValue, CallReturn>,
    pub delegate_call_returns: HashMap<MockCallWithAddress, CallReturn>,
    pub static_call_returns: HashMap<MockCallWithAddress, CallReturn>,
    pub deploy_returns: HashMap<DeploymentWithSalt, DeploymentReturn>,
    pub return_data: Vec<u8>,
    pub emitted_logs: Vec<EmittedLog>,
}

impl Default for VMState {
    fn default() -> Self {
        Self {
            storage: HashMap::new(),
            msg_sender: DEFAULT_SENDER,
            chain_id: DEFAULT_CHAIN_ID,
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            block_number: 0,
            block_timestamp: 0,
            block_hashes: HashMap::new(),
            balances: HashMap::new(),
            code_storage: HashMap::new(),
            msg_value: U256::ZERO,
            block_basefee: U256::from(DEFAULT_BASEFEE),
            block_difficulty: U256::ZERO,
            block_random: None,
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            coinbase: DEFAULT_SENDER,
            tx_origin: None,
            tx_gas_price: U256::from(1),
            nonce: 0,
            call_returns: HashMap::new(),
            delegate_call_returns: HashMap::new(),
            static_call_returns: HashMap::new(),
            deploy_returns: HashMap::new(),
            return_data: Vec::new(),
            emitted_logs: Vec::new(),
        }
    }
}
