// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The EVM environment a program runs in, and the gas schedule of its host calls.

use alloy_primitives::{Address, B256, U256};

/// Gas that must remain for a storage write to be attempted, as in EIP-2200.
pub const SSTORE_SENTRY_GAS: u64 = 2300;

/// Cost of reading a cold storage slot, as in EIP-2929.
pub const COLD_SLOAD_GAS: u64 = 2100;

/// Cost of writing a fresh storage slot.
pub const SSTORE_SET_GAS: u64 = 20_000;

/// Cost of overwriting a storage slot.
pub const SSTORE_RESET_GAS: u64 = 5_000;

/// Cost of touching a cold account.
pub const COLD_ACCOUNT_GAS: u64 = 2600;

/// Base cost of deploying a contract.
pub const CREATE_GAS: u64 = 32_000;

/// Cost of the BLOCKHASH opcode.
pub const BLOCKHASH_GAS: u64 = 20;

/// Cost of the ecrecover precompile.
pub const ECRECOVER_GAS: u64 = 3000;

/// Base cost of a log.
pub const LOG_GAS: u64 = 375;

/// Cost of each log topic.
pub const LOG_TOPIC_GAS: u64 = 375;

/// Cost of each byte of log data.
pub const LOG_DATA_GAS: u64 = 8;

/// Cost of copying each word of data in or out of a program.
pub const COPY_WORD_GAS: u64 = 3;

/// Gas of the simple environment opcodes, such as BASEFEE and COINBASE.
pub const GAS_QUICK_STEP: u64 = 2;

/// Max number of topics in a log.
pub const MAX_LOG_TOPICS: u32 = 4;

/// Snapshot of the EVM environment at the start of a program call.
///
/// Captured once by the caller. A program never observes changes made to the outer
/// environment after the call begins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvmData {
    /// Whether the call may mutate state, i.e. runs inside a static call.
    pub read_only: bool,
    pub origin: Address,
    pub gas_price: U256,
    pub coinbase: Address,
    pub block_gas_limit: u64,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_difficulty: U256,
    pub block_basefee: U256,
    /// The beacon randomness, absent before the merge.
    pub block_random: Option<B256>,
    pub chain_id: u64,
    pub contract_address: Address,
    pub msg_sender: Address,
    pub msg_value: U256,
}
