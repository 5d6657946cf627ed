// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The chain-state surface a running program reaches through its host.
//!
//! The host implements [`EvmApi`] once per program call. The bridge owns that value for the
//! lifetime of the call and dispatches every host call of the program to it. Each method reports
//! the EVM gas the operation cost, which the runtime then charges to the program.

use alloy_primitives::{Address, B256, U256};

use crate::{error::ApiError, outcome::UserOutcomeKind};

/// Result of a call into another contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallResult {
    /// Length of the data the callee returned, now readable via [`EvmApi::get_return_data`].
    pub return_data_len: u32,
    /// Gas consumed by the call, including anything forwarded to the callee.
    pub cost: u64,
    /// Either [`UserOutcomeKind::Success`] or [`UserOutcomeKind::Revert`].
    pub status: UserOutcomeKind,
}

/// Result of deploying a contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateResult {
    /// The new contract's address, or the revert data of its constructor.
    pub address: Result<Address, Vec<u8>>,
    pub return_data_len: u32,
    pub cost: u64,
}

/// Chain state, as seen by a running program.
pub trait EvmApi: Send {
    /// Reads a storage word of the current contract.
    fn get_bytes32(&mut self, key: B256) -> (B256, u64);

    /// Writes a storage word of the current contract.
    fn set_bytes32(&mut self, key: B256, value: B256) -> Result<u64, ApiError>;

    /// Calls `contract` with `calldata`, forwarding at most `gas` and transferring `value`.
    fn contract_call(
        &mut self,
        contract: Address,
        calldata: &[u8],
        gas: u64,
        value: U256,
    ) -> CallResult;

    /// Runs `contract`'s code in the context of the current contract.
    fn delegate_call(&mut self, contract: Address, calldata: &[u8], gas: u64) -> CallResult;

    /// Calls `contract` without allowing it to mutate state.
    fn static_call(&mut self, contract: Address, calldata: &[u8], gas: u64) -> CallResult;

    /// Deploys a contract at the address derived from the sender and its nonce.
    fn create1(&mut self, code: Vec<u8>, endowment: U256, gas: u64) -> CreateResult;

    /// Deploys a contract at the address derived from `salt` and the init code.
    fn create2(&mut self, code: Vec<u8>, endowment: U256, salt: B256, gas: u64) -> CreateResult;

    /// The data returned by the most recent call or create.
    fn get_return_data(&mut self) -> Vec<u8>;

    /// Emits a log whose first `topics` words of `data` are its topics.
    fn emit_log(&mut self, data: Vec<u8>, topics: u32) -> Result<u64, ApiError>;

    fn address_balance(&mut self, address: Address) -> (U256, u64);

    fn address_code_hash(&mut self, address: Address) -> (B256, u64);

    fn block_hash(&mut self, number: U256) -> (B256, u64);

    /// Recovers the signer of a message, as the ecrecover precompile does.
    /// Malformed input recovers the zero address.
    fn ecrecover(&mut self, data: &[u8]) -> (Address, u64);
}

/// Read access to deployed code, used to fetch programs.
pub trait StateDb {
    /// The code deployed at `address`, if any.
    fn get_code(&self, address: Address) -> Option<Vec<u8>>;
}
