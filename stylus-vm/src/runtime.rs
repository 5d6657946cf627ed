// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The boundary between the gateway and whatever actually runs Wasm.

use std::sync::Arc;

use stylus_core::{BridgeError, EvmData};
use stylus_host::{ApiId, HostApiRegistry};

use crate::context::CallContext;

/// Settings a program is compiled under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileConfig {
    pub version: u16,
    /// Max number of Wasm pages the program may declare.
    pub page_limit: u16,
}

/// Everything a runtime needs for one call. The runtime borrows all of it for the call's
/// duration and keeps nothing afterwards.
#[derive(Clone, Copy)]
pub struct CallRequest<'a> {
    pub wasm: &'a [u8],
    pub calldata: &'a [u8],
    pub context: &'a CallContext,
    pub evm_data: &'a EvmData,
    /// The table `api` is registered in.
    pub apis: &'a Arc<HostApiRegistry>,
    pub api: ApiId,
}

/// Compiles and runs Wasm programs.
///
/// Calls are synchronous: [`Runtime::call`] returns only once the program has finished.
pub trait Runtime: Send + Sync {
    /// Validates and compiles `wasm`.
    fn compile(&self, wasm: &[u8], config: &CompileConfig) -> eyre::Result<()>;

    /// Runs a program, returning its raw status tag and output.
    ///
    /// `gas` holds the budget on entry and what is left on return. Host calls reach chain state
    /// through `request.api`. Errors are reserved for faults of the bridge itself; everything the
    /// program does, including trapping, is reported through the status.
    fn call(&self, request: CallRequest<'_>, gas: &mut u64) -> Result<(u8, Vec<u8>), BridgeError>;
}
