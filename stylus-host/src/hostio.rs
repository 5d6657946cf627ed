// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Host calls, addressed by handle.
//!
//! Each function resolves its [`ApiId`] and forwards to the registered [`stylus_core::EvmApi`].
//! The outer [`BridgeError`] is fatal to the transaction. The inner [`ApiError`] is reported back
//! to the program, which decides what to do with it.
//!
//! Entries registered as read-only reject every state mutation before it reaches the api.

use alloy_primitives::{Address, B256, U256};
use stylus_core::{evm::MAX_LOG_TOPICS, ApiError, BridgeError, CallResult, CreateResult};

use crate::registry::{ApiId, HostApiEntry, HostApiRegistry};

/// Result of a host call that the api itself may refuse.
pub type HostResult<T> = Result<Result<T, ApiError>, BridgeError>;

fn writable(entry: &HostApiEntry) -> Result<(), ApiError> {
    if entry.read_only {
        return Err(ApiError::WriteProtection);
    }
    Ok(())
}

pub fn get_bytes32(apis: &HostApiRegistry, id: ApiId, key: B256) -> Result<(B256, u64), BridgeError> {
    apis.with_entry(id, |entry| entry.api.get_bytes32(key))
}

pub fn set_bytes32(apis: &HostApiRegistry, id: ApiId, key: B256, value: B256) -> HostResult<u64> {
    apis.with_entry(id, |entry| {
        writable(entry)?;
        entry.api.set_bytes32(key, value)
    })
}

/// Calls another contract. Transferring value is a mutation.
pub fn contract_call(
    apis: &HostApiRegistry,
    id: ApiId,
    contract: Address,
    calldata: &[u8],
    gas: u64,
    value: U256,
) -> HostResult<CallResult> {
    apis.with_entry(id, |entry| {
        if !value.is_zero() {
            writable(entry)?;
        }
        let result = entry.api.contract_call(contract, calldata, gas, value);
        entry.return_data_len = result.return_data_len;
        Ok::<_, ApiError>(result)
    })
}

pub fn delegate_call(
    apis: &HostApiRegistry,
    id: ApiId,
    contract: Address,
    calldata: &[u8],
    gas: u64,
) -> Result<CallResult, BridgeError> {
    apis.with_entry(id, |entry| {
        let result = entry.api.delegate_call(contract, calldata, gas);
        entry.return_data_len = result.return_data_len;
        result
    })
}

pub fn static_call(
    apis: &HostApiRegistry,
    id: ApiId,
    contract: Address,
    calldata: &[u8],
    gas: u64,
) -> Result<CallResult, BridgeError> {
    apis.with_entry(id, |entry| {
        let result = entry.api.static_call(contract, calldata, gas);
        entry.return_data_len = result.return_data_len;
        result
    })
}

pub fn create1(
    apis: &HostApiRegistry,
    id: ApiId,
    code: Vec<u8>,
    endowment: U256,
    gas: u64,
) -> HostResult<CreateResult> {
    apis.with_entry(id, |entry| {
        writable(entry)?;
        let result = entry.api.create1(code, endowment, gas);
        entry.return_data_len = result.return_data_len;
        Ok::<_, ApiError>(result)
    })
}

pub fn create2(
    apis: &HostApiRegistry,
    id: ApiId,
    code: Vec<u8>,
    endowment: U256,
    salt: B256,
    gas: u64,
) -> HostResult<CreateResult> {
    apis.with_entry(id, |entry| {
        writable(entry)?;
        let result = entry.api.create2(code, endowment, salt, gas);
        entry.return_data_len = result.return_data_len;
        Ok::<_, ApiError>(result)
    })
}

pub fn get_return_data(apis: &HostApiRegistry, id: ApiId) -> Result<Vec<u8>, BridgeError> {
    apis.with_entry(id, |entry| entry.api.get_return_data())
}

pub fn return_data_len(apis: &HostApiRegistry, id: ApiId) -> Result<u32, BridgeError> {
    apis.with_entry(id, |entry| entry.return_data_len)
}

/// Emits a log whose first `topics` words of `data` are its topics, returning the log's cost.
pub fn emit_log(apis: &HostApiRegistry, id: ApiId, data: Vec<u8>, topics: u32) -> HostResult<u64> {
    apis.with_entry(id, |entry| {
        writable(entry)?;
        if topics > MAX_LOG_TOPICS {
            return Err(ApiError::TooManyTopics(topics));
        }
        if data.len() < 32 * topics as usize {
            return Err(ApiError::BadTopicData {
                len: data.len(),
                topics,
            });
        }
        entry.api.emit_log(data, topics)
    })
}

pub fn address_balance(
    apis: &HostApiRegistry,
    id: ApiId,
    address: Address,
) -> Result<(U256, u64), BridgeError> {
    apis.with_entry(id, |entry| entry.api.address_balance(address))
}

pub fn address_code_hash(
    apis: &HostApiRegistry,
    id: ApiId,
    address: Address,
) -> Result<(B256, u64), BridgeError> {
    apis.with_entry(id, |entry| entry.api.address_code_hash(address))
}

pub fn block_hash(apis: &HostApiRegistry, id: ApiId, number: U256) -> Result<(B256, u64), BridgeError> {
    apis.with_entry(id, |entry| entry.api.block_hash(number))
}

pub fn ecrecover(apis: &HostApiRegistry, id: ApiId, data: &[u8]) -> Result<(Address, u64), BridgeError> {
    apis.with_entry(id, |entry| entry.api.ecrecover(data))
}
