// Copyright 2025-2026, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

use std::collections::HashMap;

use alloy_primitives::{Address, B256, U256};

use crate::{state::VMState, TestVM};

/// Builds a [`TestVM`] with a preset environment.
///
/// ```
/// # use stylus_test::TestVMBuilder;
/// # use alloy_primitives::{Address, U256};
/// let vm = TestVMBuilder::new()
///     .sender(Address::repeat_byte(1))
///     .value(U256::from(10))
///     .block_number(42)
///     .build();
/// assert_eq!(vm.evm_data(false).block_number, 42);
/// ```
#[derive(Default)]
pub struct TestVMBuilder {
    sender: Option<Address>,
    value: Option<U256>,
    contract_address: Option<Address>,
    storage: Option<HashMap<B256, B256>>,
    code: HashMap<Address, Vec<u8>>,
    block_num: Option<u64>,
}

impl TestVMBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }
    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }
    pub fn contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }
    pub fn storage(mut self, storage: HashMap<B256, B256>) -> Self {
        self.storage = Some(storage);
        self
    }
    pub fn code(mut self, address: Address, code: Vec<u8>) -> Self {
        self.code.insert(address, code);
        self
    }
    pub fn block_number(mut self, number: u64) -> Self {
        self.block_num = Some(number);
        self
    }
    pub fn build(self) -> TestVM {
        let mut state = VMState::default();
        if let Some(sender) = self.sender {
            state.msg_sender = sender;
        }
        if let Some(address) = self.contract_address {
            state.contract_address = address;
        }
        state.msg_value = self.value.unwrap_or_default();
        state.storage = self.storage.unwrap_or_default();
        state.code_storage = self.code;
        state.block_number = self.block_num.unwrap_or_default();
        TestVM::from(state)
    }
}
