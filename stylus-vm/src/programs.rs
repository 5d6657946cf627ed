// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The program directory and the gateway that runs its programs.
//!
//! Each program address maps to the Stylus version it was last compiled at. A program may only
//! run while that version equals the current one, so a version upgrade makes every program
//! uncallable until it is compiled again.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use stylus_core::{
    params::{MAX_WASM_SIZE, MIN_INIT_GAS_UNITS},
    BridgeError, EvmApi, EvmData, ParamsError, StateDb, Storage, StorageError, StylusParams,
    UserOutcome,
};
use stylus_host::{HostApiRegistry, HOST_APIS};
use stylus_tools::{
    compress::{self, DecompressError},
    wasm::{self, WasmError},
};

use crate::{
    context::CallContext,
    runtime::{CallRequest, CompileConfig, Runtime},
};

const VERSIONS_KEY: &[u8] = &[0];
const PARAMS_KEY: &[u8] = &[1];

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("program {address} is already compiled at version {version}")]
    AlreadyCurrent { address: Address, version: u16 },
    #[error("program {0} has not been compiled")]
    NotCompiled(Address),
    #[error("program {address} was compiled at version {program}, but stylus is at {current}")]
    OutOfDate {
        address: Address,
        program: u32,
        current: u16,
    },
    #[error("no code deployed at {0}")]
    MissingCode(Address),
    #[error("stylus version {0} cannot be upgraded")]
    VersionOverflow(u16),
    #[error(transparent)]
    Wasm(#[from] WasmError),
    #[error("failed to decompress program: {0}")]
    Decompress(#[from] DecompressError),
    #[error("failed to compile program: {0}")]
    Compile(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ProgramError {
    /// Whether the error must abort the enclosing transaction rather than just this call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Bridge(_) | Self::Storage(_) | Self::Params(ParamsError::Storage(_))
        )
    }
}

/// The directory of compiled programs.
pub struct Programs {
    versions: Storage,
    params: Storage,
    apis: Arc<HostApiRegistry>,
}

impl Programs {
    /// Writes the baseline params into a fresh directory space.
    pub fn initialize(storage: &Storage) -> Result<(), ParamsError> {
        StylusParams::initialize(&storage.open_sub_storage(PARAMS_KEY))
    }

    /// Opens the directory kept in `storage`, registering host apis in [`HOST_APIS`].
    pub fn open(storage: Storage) -> Self {
        Self::with_registry(storage, HOST_APIS.clone())
    }

    /// Opens the directory kept in `storage`, registering host apis in `apis`.
    pub fn with_registry(storage: Storage, apis: Arc<HostApiRegistry>) -> Self {
        Self {
            versions: storage.open_sub_storage(VERSIONS_KEY),
            params: storage.open_sub_storage(PARAMS_KEY),
            apis,
        }
    }

    /// The current params, bound to this directory so they can be saved back.
    pub fn params(&self) -> Result<StylusParams, StorageError> {
        StylusParams::load(&self.params)
    }

    /// Saves params previously obtained from [`Programs::params`].
    pub fn save_params(&self, params: &StylusParams) -> Result<(), ProgramError> {
        params.save()?;
        Ok(())
    }

    /// Bumps the Stylus version, returning the new one.
    pub fn upgrade_version(&self) -> Result<u16, ProgramError> {
        let mut params = self.params()?;
        let current = params.version;
        params.version = current
            .checked_add(1)
            .ok_or(ProgramError::VersionOverflow(current))?;
        self.save_params(&params)?;
        log::debug!("upgraded stylus from version {current} to {}", params.version);
        Ok(params.version)
    }

    pub fn current_version(&self) -> Result<u16, StorageError> {
        Ok(self.params()?.version)
    }

    /// The version `address` was last compiled at, or zero if never.
    pub fn program_version(&self, address: Address) -> Result<u32, StorageError> {
        self.versions.get_u32(program_key(address))
    }

    pub fn is_callable(&self, address: Address) -> Result<bool, StorageError> {
        let current = self.current_version()?;
        let program = self.program_version(address)?;
        Ok(program != 0 && program == u32::from(current))
    }

    /// Compiles the program at `address` for the current version, returning that version.
    pub fn compile_program(
        &self,
        state: &dyn StateDb,
        address: Address,
        runtime: &dyn Runtime,
    ) -> Result<u16, ProgramError> {
        let params = self.params()?;
        let version = params.version;
        if self.program_version(address)? >= u32::from(version) {
            return Err(ProgramError::AlreadyCurrent { address, version });
        }

        let wasm = fetch_wasm(state, address)?;
        let config = CompileConfig {
            version,
            page_limit: params.page_limit,
        };
        if let Err(err) = runtime.compile(&wasm, &config) {
            log::debug!("program {address} failed to compile: {err:#}");
            return Err(ProgramError::Compile(format!("{err:#}")));
        }

        self.versions
            .set_u32(program_key(address), version.into())?;
        log::debug!("compiled program {address} at version {version}");
        Ok(version)
    }

    /// Runs the program at `address`.
    ///
    /// `gas` holds the budget on entry and what is left on return. On success the outcome is
    /// returned along with the gas the call consumed. The handle `api` is registered under is
    /// released on every path out of this function.
    #[allow(clippy::too_many_arguments)]
    pub fn call_program(
        &self,
        state: &dyn StateDb,
        address: Address,
        calldata: &[u8],
        gas: &mut u64,
        evm_data: EvmData,
        api: Box<dyn EvmApi>,
        runtime: &dyn Runtime,
    ) -> Result<(UserOutcome, u64), ProgramError> {
        let params = self.params()?;
        let program = self.program_version(address)?;
        if program == 0 {
            return Err(ProgramError::NotCompiled(address));
        }
        if program != u32::from(params.version) {
            log::warn!(
                "rejected call to program {address} compiled at version {program} (current {})",
                params.version
            );
            return Err(ProgramError::OutOfDate {
                address,
                program,
                current: params.version,
            });
        }

        let wasm = fetch_wasm(state, address)?;
        let budget = *gas;

        let intrinsic = u64::from(params.min_init_gas) * MIN_INIT_GAS_UNITS;
        if budget < intrinsic {
            *gas = 0;
            return Ok((UserOutcome::OutOfGas, budget));
        }
        *gas = budget - intrinsic;

        let context = CallContext::new(&params);
        let guard = self.apis.register(api, evm_data.read_only);
        let request = CallRequest {
            wasm: &wasm,
            calldata,
            context: &context,
            evm_data: &evm_data,
            apis: &self.apis,
            api: guard.id(),
        };

        let left_before = *gas;
        let (status, output) = runtime.call(request, gas)?;
        drop(guard);

        let outcome = UserOutcome::decode(status, output)?;
        *gas = match outcome {
            UserOutcome::OutOfGas | UserOutcome::OutOfStack => 0,
            _ => (*gas).min(left_before),
        };
        log::debug!("program {address} finished with {outcome}");
        Ok((outcome, budget - *gas))
    }
}

fn program_key(address: Address) -> B256 {
    address.into_word()
}

fn fetch_wasm(state: &dyn StateDb, address: Address) -> Result<Vec<u8>, ProgramError> {
    let code = state
        .get_code(address)
        .ok_or(ProgramError::MissingCode(address))?;
    let body = wasm::strip_stylus_prefix(&code)?;
    Ok(compress::decompress(body, MAX_WASM_SIZE)?)
}
