// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The `vm_hooks` a program imports.
//!
//! Every hook pays the hostio fee on entry, then whatever the collaborator reports the operation
//! cost. Pointers are offsets into the program's memory.

use alloy_primitives::{Address, U256};
use stylus_core::evm::{GAS_QUICK_STEP, SSTORE_SENTRY_GAS};
use stylus_host::hostio;

use super::env::{Escape, MaybeEscape, WasmEnv, WasmEnvMut};

pub(crate) fn read_args(mut env: WasmEnvMut, ptr: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    let len = env.args.len() as u64;
    env.pay_for_evm_copy(len)?;
    env.write_slice(ptr, &env.args)?;
    Ok(())
}

pub(crate) fn write_result(mut env: WasmEnvMut, ptr: u32, len: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(len.into())?;
    env.outs = env.read_slice(ptr, len)?;
    Ok(())
}

pub(crate) fn storage_load_bytes32(mut env: WasmEnvMut, key: u32, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    let key = env.read_bytes32(key)?;
    let (value, cost) = hostio::get_bytes32(&env.apis, env.api, key)?;
    env.write_bytes32(dest, value)?;
    env.buy_gas(cost)
}

pub(crate) fn storage_store_bytes32(mut env: WasmEnvMut, key: u32, value: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.require_gas(SSTORE_SENTRY_GAS)?;

    let key = env.read_bytes32(key)?;
    let value = env.read_bytes32(value)?;
    let cost = hostio::set_bytes32(&env.apis, env.api, key, value)??;
    env.buy_gas(cost)
}

pub(crate) fn account_balance(mut env: WasmEnvMut, address: u32, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    let address = env.read_bytes20(address)?;
    let (balance, cost) = hostio::address_balance(&env.apis, env.api, address)?;
    env.write_slice(dest, &balance.to_be_bytes::<32>())?;
    env.buy_gas(cost)
}

pub(crate) fn account_codehash(mut env: WasmEnvMut, address: u32, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    let address = env.read_bytes20(address)?;
    let (hash, cost) = hostio::address_code_hash(&env.apis, env.api, address)?;
    env.write_bytes32(dest, hash)?;
    env.buy_gas(cost)
}

pub(crate) fn block_hash(mut env: WasmEnvMut, number: u32, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    let number = U256::from_be_bytes(env.read_fixed::<32>(number)?);
    let (hash, cost) = hostio::block_hash(&env.apis, env.api, number)?;
    env.write_bytes32(dest, hash)?;
    env.buy_gas(cost)
}

pub(crate) fn call_contract(
    mut env: WasmEnvMut,
    contract: u32,
    calldata: u32,
    calldata_len: u32,
    value: u32,
    ink: u64,
    return_data_len: u32,
) -> Result<u8, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(calldata_len.into())?;
    // forward no more than what is left
    let gas = env.context.ink_to_gas(ink.min(env.ink_left));

    let contract = env.read_bytes20(contract)?;
    let input = env.read_slice(calldata, calldata_len)?;
    let value = U256::from_be_bytes(env.read_fixed::<32>(value)?);

    let result = hostio::contract_call(&env.apis, env.api, contract, &input, gas, value)??;
    env.write_u32(return_data_len, result.return_data_len)?;
    env.buy_gas(result.cost)?;
    Ok(result.status.into())
}

pub(crate) fn delegate_call_contract(
    mut env: WasmEnvMut,
    contract: u32,
    calldata: u32,
    calldata_len: u32,
    ink: u64,
    return_data_len: u32,
) -> Result<u8, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(calldata_len.into())?;
    let gas = env.context.ink_to_gas(ink.min(env.ink_left));

    let contract = env.read_bytes20(contract)?;
    let input = env.read_slice(calldata, calldata_len)?;

    let result = hostio::delegate_call(&env.apis, env.api, contract, &input, gas)?;
    env.write_u32(return_data_len, result.return_data_len)?;
    env.buy_gas(result.cost)?;
    Ok(result.status.into())
}

pub(crate) fn static_call_contract(
    mut env: WasmEnvMut,
    contract: u32,
    calldata: u32,
    calldata_len: u32,
    ink: u64,
    return_data_len: u32,
) -> Result<u8, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(calldata_len.into())?;
    let gas = env.context.ink_to_gas(ink.min(env.ink_left));

    let contract = env.read_bytes20(contract)?;
    let input = env.read_slice(calldata, calldata_len)?;

    let result = hostio::static_call(&env.apis, env.api, contract, &input, gas)?;
    env.write_u32(return_data_len, result.return_data_len)?;
    env.buy_gas(result.cost)?;
    Ok(result.status.into())
}

pub(crate) fn create1(
    mut env: WasmEnvMut,
    code: u32,
    code_len: u32,
    endowment: u32,
    contract: u32,
    revert_data_len: u32,
) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(code_len.into())?;

    let code = env.read_slice(code, code_len)?;
    let endowment = U256::from_be_bytes(env.read_fixed::<32>(endowment)?);
    let gas = env.gas_left();

    let result = hostio::create1(&env.apis, env.api, code, endowment, gas)??;
    env.write_u32(revert_data_len, result.return_data_len)?;
    env.buy_gas(result.cost)?;
    env.write_bytes20(contract, result.address.unwrap_or(Address::ZERO))?;
    Ok(())
}

pub(crate) fn create2(
    mut env: WasmEnvMut,
    code: u32,
    code_len: u32,
    endowment: u32,
    salt: u32,
    contract: u32,
    revert_data_len: u32,
) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(code_len.into())?;

    let code = env.read_slice(code, code_len)?;
    let endowment = U256::from_be_bytes(env.read_fixed::<32>(endowment)?);
    let salt = env.read_bytes32(salt)?;
    let gas = env.gas_left();

    let result = hostio::create2(&env.apis, env.api, code, endowment, salt, gas)??;
    env.write_u32(revert_data_len, result.return_data_len)?;
    env.buy_gas(result.cost)?;
    env.write_bytes20(contract, result.address.unwrap_or(Address::ZERO))?;
    Ok(())
}

/// Copies up to `size` bytes of the last return data, starting at `offset`.
pub(crate) fn read_return_data(
    mut env: WasmEnvMut,
    dest: u32,
    offset: u32,
    size: u32,
) -> Result<u32, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(size.into())?;

    let data = hostio::get_return_data(&env.apis, env.api)?;
    let start = data.len().min(offset as usize);
    let end = data.len().min(start.saturating_add(size as usize));
    let slice = &data[start..end];
    env.write_slice(dest, slice)?;
    Ok(slice.len() as u32)
}

pub(crate) fn return_data_size(mut env: WasmEnvMut) -> Result<u32, Escape> {
    let env = WasmEnv::start(&mut env)?;
    Ok(hostio::return_data_len(&env.apis, env.api)?)
}

pub(crate) fn emit_log(mut env: WasmEnvMut, data: u32, len: u32, topics: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    let data = env.read_slice(data, len)?;
    let cost = hostio::emit_log(&env.apis, env.api, data, topics)??;
    env.buy_gas(cost)
}

pub(crate) fn ecrecover(mut env: WasmEnvMut, data: u32, len: u32, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_evm_copy(len.into())?;
    let data = env.read_slice(data, len)?;
    let (address, cost) = hostio::ecrecover(&env.apis, env.api, &data)?;
    env.buy_gas(cost)?;
    env.write_bytes20(dest, address)?;
    Ok(())
}

pub(crate) fn evm_gas_left(mut env: WasmEnvMut) -> Result<u64, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    Ok(env.gas_left())
}

pub(crate) fn evm_ink_left(mut env: WasmEnvMut) -> Result<u64, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    Ok(env.ink_left)
}

pub(crate) fn block_basefee(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let basefee = env.evm_data.block_basefee;
    env.write_slice(dest, &basefee.to_be_bytes::<32>())?;
    Ok(())
}

pub(crate) fn block_chainid(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let chain_id = U256::from(env.evm_data.chain_id);
    env.write_slice(dest, &chain_id.to_be_bytes::<32>())?;
    Ok(())
}

pub(crate) fn block_difficulty(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let difficulty = env.evm_data.block_difficulty;
    env.write_slice(dest, &difficulty.to_be_bytes::<32>())?;
    Ok(())
}

/// Writes the beacon randomness, or zero before the merge.
pub(crate) fn block_random(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let random = env.evm_data.block_random.unwrap_or_default();
    env.write_bytes32(dest, random)?;
    Ok(())
}

pub(crate) fn block_coinbase(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let coinbase = env.evm_data.coinbase;
    env.write_bytes20(dest, coinbase)?;
    Ok(())
}

pub(crate) fn block_gas_limit(mut env: WasmEnvMut) -> Result<u64, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    Ok(env.evm_data.block_gas_limit)
}

pub(crate) fn block_number(mut env: WasmEnvMut) -> Result<u64, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    Ok(env.evm_data.block_number)
}

pub(crate) fn block_timestamp(mut env: WasmEnvMut) -> Result<u64, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    Ok(env.evm_data.block_timestamp)
}

pub(crate) fn contract_address(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let address = env.evm_data.contract_address;
    env.write_bytes20(dest, address)?;
    Ok(())
}

pub(crate) fn msg_sender(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let sender = env.evm_data.msg_sender;
    env.write_bytes20(dest, sender)?;
    Ok(())
}

pub(crate) fn msg_value(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let value = env.evm_data.msg_value;
    env.write_slice(dest, &value.to_be_bytes::<32>())?;
    Ok(())
}

pub(crate) fn tx_gas_price(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let price = env.evm_data.gas_price;
    env.write_slice(dest, &price.to_be_bytes::<32>())?;
    Ok(())
}

pub(crate) fn tx_ink_price(mut env: WasmEnvMut) -> Result<u32, Escape> {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    Ok(env.context.ink_price)
}

pub(crate) fn tx_origin(mut env: WasmEnvMut, dest: u32) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.buy_gas(GAS_QUICK_STEP)?;
    let origin = env.evm_data.origin;
    env.write_bytes20(dest, origin)?;
    Ok(())
}

/// Pays for the pages a following `memory.grow` opens.
pub(crate) fn pay_for_memory_grow(mut env: WasmEnvMut, pages: u16) -> MaybeEscape {
    let mut env = WasmEnv::start(&mut env)?;
    env.pay_for_memory(pages)
}

pub(crate) fn console_log_txt(mut env: WasmEnvMut, ptr: u32, len: u32) -> MaybeEscape {
    let env = WasmEnv::start_free(&mut env)?;
    let text = env.read_slice(ptr, len)?;
    log::info!("program {}: {}", env.evm_data.contract_address, String::from_utf8_lossy(&text));
    Ok(())
}
