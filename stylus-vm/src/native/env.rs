// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Per-call state shared between wasmer and the host functions.

use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use alloy_primitives::{Address, B256};
use stylus_core::{evm::COPY_WORD_GAS, ApiError, BridgeError, EvmData};
use stylus_host::{ApiId, HostApiRegistry};
use wasmer::{FunctionEnvMut, Instance, Memory, MemoryAccessError, MemoryView, StoreMut};
use wasmer_middlewares::metering::{get_remaining_points, set_remaining_points, MeteringPoints};

use crate::{context::CallContext, runtime::CallRequest};

pub type WasmEnvMut<'a> = FunctionEnvMut<'a, WasmEnv>;

/// Ways a host function may unwind the program.
#[derive(Debug, thiserror::Error)]
pub enum Escape {
    #[error("failed to access memory: {0}")]
    Memory(#[from] MemoryAccessError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("logic error: {0}")]
    Logical(String),
    #[error("out of ink")]
    OutOfInk,
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type MaybeEscape = Result<(), Escape>;

pub struct WasmEnv {
    /// Calldata of the call.
    pub args: Vec<u8>,
    /// The program's result, set by `write_result`.
    pub outs: Vec<u8>,
    pub memory: Option<Memory>,
    pub instance: Option<Instance>,
    /// Ink left as of the last host call. The meter is authoritative while the program runs.
    pub ink_left: u64,
    pub context: CallContext,
    pub evm_data: EvmData,
    pub apis: Arc<HostApiRegistry>,
    pub api: ApiId,
    pub open_pages: u16,
    pub ever_pages: u16,
}

impl WasmEnv {
    pub fn new(request: &CallRequest<'_>, ink: u64) -> Self {
        Self {
            args: request.calldata.to_vec(),
            outs: vec![],
            memory: None,
            instance: None,
            ink_left: ink,
            context: *request.context,
            evm_data: request.evm_data.clone(),
            apis: request.apis.clone(),
            api: request.api,
            open_pages: 0,
            ever_pages: 0,
        }
    }

    /// Enters a host function, charging the hostio entry fee.
    pub fn start<'a>(env: &'a mut WasmEnvMut<'_>) -> Result<HostioInfo<'a>, Escape> {
        let mut info = Self::start_free(env)?;
        let ink = info.context.hostio_ink;
        info.buy_ink(ink)?;
        Ok(info)
    }

    /// Enters a host function without charging for it.
    ///
    /// Takes over the ink left on the meter and bills any memory the program grew without paying.
    /// The ink is handed back to the meter when the returned info drops.
    pub fn start_free<'a>(env: &'a mut WasmEnvMut<'_>) -> Result<HostioInfo<'a>, Escape> {
        let (env, mut store) = env.data_and_store_mut();
        let (Some(memory), Some(instance)) = (env.memory.clone(), env.instance.clone()) else {
            return Err(Escape::Internal("program is not bound".into()));
        };
        env.ink_left = match get_remaining_points(&mut store, &instance) {
            MeteringPoints::Remaining(ink) => ink,
            MeteringPoints::Exhausted => 0,
        };
        let pages = memory.view(&store).size().0;
        let mut info = HostioInfo {
            env,
            memory,
            instance,
            store,
        };
        info.settle_memory(u16::try_from(pages).unwrap_or(u16::MAX))?;
        Ok(info)
    }

    pub fn buy_ink(&mut self, ink: u64) -> MaybeEscape {
        if self.ink_left < ink {
            self.ink_left = 0;
            return Err(Escape::OutOfInk);
        }
        self.ink_left -= ink;
        Ok(())
    }

    pub fn buy_gas(&mut self, gas: u64) -> MaybeEscape {
        let ink = self.context.gas_to_ink(gas);
        self.buy_ink(ink)
    }

    /// Checks that at least `gas` is left without spending it.
    pub fn require_gas(&mut self, gas: u64) -> MaybeEscape {
        if self.ink_left < self.context.gas_to_ink(gas) {
            return Err(Escape::OutOfInk);
        }
        Ok(())
    }

    pub fn gas_left(&self) -> u64 {
        self.context.ink_to_gas(self.ink_left)
    }

    /// Charges for copying `bytes` across the boundary, one price per started word.
    pub fn pay_for_evm_copy(&mut self, bytes: u64) -> MaybeEscape {
        let words = bytes.div_ceil(32);
        self.buy_gas(words.saturating_mul(COPY_WORD_GAS))
    }

    /// Charges for opening `pages` more pages of memory.
    pub fn pay_for_memory(&mut self, pages: u16) -> MaybeEscape {
        let limit = self.context.page_limit;
        if u32::from(self.open_pages) + u32::from(pages) > u32::from(limit) {
            return Err(Escape::Logical(format!("memory exceeds the limit of {limit} pages")));
        }
        let gas = self
            .context
            .memory_gas(pages, self.open_pages, self.ever_pages);
        self.buy_gas(gas)?;
        self.open_pages = self.open_pages.saturating_add(pages);
        self.ever_pages = self.ever_pages.max(self.open_pages);
        Ok(())
    }

    /// Charges for a memory of `pages` pages, of which only the open pages are paid for.
    pub fn settle_memory(&mut self, pages: u16) -> MaybeEscape {
        match pages.saturating_sub(self.open_pages) {
            0 => Ok(()),
            unpaid => self.pay_for_memory(unpaid),
        }
    }
}

/// A host function's view of the env and the program's memory.
pub struct HostioInfo<'a> {
    pub env: &'a mut WasmEnv,
    pub memory: Memory,
    pub instance: Instance,
    pub store: StoreMut<'a>,
}

impl HostioInfo<'_> {
    fn view(&self) -> MemoryView<'_> {
        self.memory.view(&self.store)
    }

    pub fn read_slice(&self, ptr: u32, len: u32) -> Result<Vec<u8>, MemoryAccessError> {
        let mut data = vec![0; len as usize];
        self.view().read(ptr.into(), &mut data)?;
        Ok(data)
    }

    pub fn read_fixed<const N: usize>(&self, ptr: u32) -> Result<[u8; N], MemoryAccessError> {
        let mut data = [0; N];
        self.view().read(ptr.into(), &mut data)?;
        Ok(data)
    }

    pub fn read_bytes20(&self, ptr: u32) -> Result<Address, MemoryAccessError> {
        self.read_fixed(ptr).map(Address::from)
    }

    pub fn read_bytes32(&self, ptr: u32) -> Result<B256, MemoryAccessError> {
        self.read_fixed(ptr).map(B256::from)
    }

    pub fn write_slice(&self, ptr: u32, src: &[u8]) -> Result<(), MemoryAccessError> {
        self.view().write(ptr.into(), src)
    }

    pub fn write_u32(&self, ptr: u32, value: u32) -> Result<(), MemoryAccessError> {
        self.write_slice(ptr, &value.to_le_bytes())
    }

    pub fn write_bytes20(&self, ptr: u32, value: Address) -> Result<(), MemoryAccessError> {
        self.write_slice(ptr, value.as_slice())
    }

    pub fn write_bytes32(&self, ptr: u32, value: B256) -> Result<(), MemoryAccessError> {
        self.write_slice(ptr, value.as_slice())
    }
}

impl Drop for HostioInfo<'_> {
    fn drop(&mut self) {
        set_remaining_points(&mut self.store, &self.instance, self.env.ink_left);
    }
}

impl Deref for HostioInfo<'_> {
    type Target = WasmEnv;

    fn deref(&self) -> &Self::Target {
        self.env
    }
}

impl DerefMut for HostioInfo<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.env
    }
}
