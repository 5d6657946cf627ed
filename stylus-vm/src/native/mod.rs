// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! A [`Runtime`] backed by wasmer.
//!
//! Programs are metered per instruction, at their host calls and by their memory. Each hook
//! charges [`crate::context::HOSTIO_INK`] plus the gas the chain reports for the operation.
//! Memory past the free pages is bought at instantiation, through `pay_for_memory_grow`, or
//! when a host call or the program's exit finds pages that were grown without paying.

use std::collections::{HashMap, VecDeque};

use alloy_primitives::{keccak256, B256};
use eyre::{bail, ensure, eyre};
use parking_lot::Mutex;
use stylus_core::{BridgeError, UserOutcomeKind};
use wasmer::{
    imports, Engine, ExternType, Function, FunctionEnv, Imports, Instance, Module, RuntimeError,
    Store, Type, Value,
};
use wasmer_middlewares::metering::{get_remaining_points, set_remaining_points, MeteringPoints};
use wasmer_types::TrapCode;

use crate::runtime::{CallRequest, CompileConfig, Runtime};

use self::{
    env::{Escape, WasmEnv},
    middleware::{STACK_EXHAUSTED, STACK_LEFT},
};

mod env;
mod host;
pub mod middleware;

/// Namespace of the host functions.
pub const VM_HOOKS: &str = "vm_hooks";

/// The function every program exports: `user_entrypoint(args_len) -> status`.
pub const ENTRYPOINT: &str = "user_entrypoint";

const HOSTIOS: &[&str] = &[
    "read_args",
    "write_result",
    "storage_load_bytes32",
    "storage_store_bytes32",
    "account_balance",
    "account_codehash",
    "block_hash",
    "call_contract",
    "delegate_call_contract",
    "static_call_contract",
    "create1",
    "create2",
    "read_return_data",
    "return_data_size",
    "emit_log",
    "ecrecover",
    "evm_gas_left",
    "evm_ink_left",
    "block_basefee",
    "block_chainid",
    "block_difficulty",
    "block_random",
    "block_coinbase",
    "block_gas_limit",
    "block_number",
    "block_timestamp",
    "contract_address",
    "msg_sender",
    "msg_value",
    "tx_gas_price",
    "tx_ink_price",
    "tx_origin",
    "pay_for_memory_grow",
];

/// Code hash, version and page limit the module was compiled for.
type ModuleKey = (B256, u16, u16);

/// A module along with the engine that compiled it.
#[derive(Clone)]
struct Program {
    module: Module,
    engine: Engine,
}

/// Compiled modules, evicted oldest first.
struct ModuleCache {
    capacity: usize,
    modules: HashMap<ModuleKey, Program>,
    order: VecDeque<ModuleKey>,
}

impl ModuleCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            modules: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&self, key: &ModuleKey) -> Option<Program> {
        self.modules.get(key).cloned()
    }

    fn insert(&mut self, key: ModuleKey, program: Program) {
        if self.modules.contains_key(&key) {
            return;
        }
        while self.modules.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.modules.remove(&oldest);
        }
        self.order.push_back(key);
        self.modules.insert(key, program);
    }
}

pub struct NativeRuntime {
    cache: Mutex<ModuleCache>,
    debug: bool,
}

impl NativeRuntime {
    /// Creates a runtime caching up to `2^init_table_bits` compiled modules.
    ///
    /// In `debug` mode programs may also import `console::log_txt`.
    pub fn new(init_table_bits: u8, debug: bool) -> Self {
        let capacity = 1 << init_table_bits.min(16);
        Self {
            cache: Mutex::new(ModuleCache::new(capacity)),
            debug,
        }
    }

    /// Number of modules currently cached.
    pub fn cached_modules(&self) -> usize {
        self.cache.lock().modules.len()
    }

    fn program(&self, wasm: &[u8], config: &CompileConfig) -> eyre::Result<Program> {
        let key = (keccak256(wasm), config.version, config.page_limit);
        if let Some(program) = self.cache.lock().get(&key) {
            return Ok(program);
        }

        let store = middleware::instrumented_store(config);
        let module = Module::new(&store, wasm)?;
        self.validate(&module, config)?;
        log::debug!("compiled module {} for version {}", key.0, key.1);

        let program = Program {
            module,
            engine: store.engine().clone(),
        };
        self.cache.lock().insert(key, program.clone());
        Ok(program)
    }

    fn validate(&self, module: &Module, config: &CompileConfig) -> eyre::Result<()> {
        for import in module.imports() {
            let (namespace, name) = (import.module(), import.name());
            let known = match namespace {
                VM_HOOKS => HOSTIOS.contains(&name),
                "console" => self.debug && name == "log_txt",
                _ => false,
            };
            ensure!(known, "unknown import {namespace}::{name}");
            ensure!(
                matches!(import.ty(), ExternType::Function(_)),
                "import {namespace}::{name} is not a function"
            );
        }

        let mut memory = None;
        let mut entrypoint = None;
        for export in module.exports() {
            match (export.name(), export.ty()) {
                ("memory", ExternType::Memory(ty)) => memory = Some(ty.minimum.0),
                (ENTRYPOINT, ExternType::Function(ty)) => entrypoint = Some(ty.clone()),
                _ => {}
            }
        }

        let Some(pages) = memory else {
            bail!("missing memory export");
        };
        ensure!(
            pages <= u32::from(config.page_limit),
            "memory of {pages} pages exceeds the limit of {}",
            config.page_limit
        );

        let Some(ty) = entrypoint else {
            bail!("missing export {ENTRYPOINT}");
        };
        ensure!(
            ty.params() == [Type::I32] && ty.results() == [Type::I32],
            "{ENTRYPOINT} has the wrong signature {ty:?}"
        );
        Ok(())
    }

    fn imports(&self, store: &mut Store, env: &FunctionEnv<WasmEnv>) -> Imports {
        macro_rules! func {
            ($func:expr) => {
                Function::new_typed_with_env(&mut *store, env, $func)
            };
        }
        let mut imports = imports! {
            VM_HOOKS => {
                "read_args" => func!(host::read_args),
                "write_result" => func!(host::write_result),
                "storage_load_bytes32" => func!(host::storage_load_bytes32),
                "storage_store_bytes32" => func!(host::storage_store_bytes32),
                "account_balance" => func!(host::account_balance),
                "account_codehash" => func!(host::account_codehash),
                "block_hash" => func!(host::block_hash),
                "call_contract" => func!(host::call_contract),
                "delegate_call_contract" => func!(host::delegate_call_contract),
                "static_call_contract" => func!(host::static_call_contract),
                "create1" => func!(host::create1),
                "create2" => func!(host::create2),
                "read_return_data" => func!(host::read_return_data),
                "return_data_size" => func!(host::return_data_size),
                "emit_log" => func!(host::emit_log),
                "ecrecover" => func!(host::ecrecover),
                "evm_gas_left" => func!(host::evm_gas_left),
                "evm_ink_left" => func!(host::evm_ink_left),
                "block_basefee" => func!(host::block_basefee),
                "block_chainid" => func!(host::block_chainid),
                "block_difficulty" => func!(host::block_difficulty),
                "block_random" => func!(host::block_random),
                "block_coinbase" => func!(host::block_coinbase),
                "block_gas_limit" => func!(host::block_gas_limit),
                "block_number" => func!(host::block_number),
                "block_timestamp" => func!(host::block_timestamp),
                "contract_address" => func!(host::contract_address),
                "msg_sender" => func!(host::msg_sender),
                "msg_value" => func!(host::msg_value),
                "tx_gas_price" => func!(host::tx_gas_price),
                "tx_ink_price" => func!(host::tx_ink_price),
                "tx_origin" => func!(host::tx_origin),
                "pay_for_memory_grow" => func!(host::pay_for_memory_grow),
            },
        };
        if self.debug {
            imports.define("console", "log_txt", func!(host::console_log_txt));
        }
        imports
    }

    /// Binds the instance, seeds the meter and depth, buys the initial pages and runs the
    /// entrypoint.
    fn execute(
        store: &mut Store,
        instance: &Instance,
        env: &FunctionEnv<WasmEnv>,
    ) -> Result<u32, RuntimeError> {
        let internal = |err: &dyn std::fmt::Display| RuntimeError::new(err.to_string());
        let exports = &instance.exports;
        let memory = exports.get_memory("memory").map_err(|e| internal(&e))?.clone();
        let entrypoint = exports
            .get_typed_function::<u32, u32>(&*store, ENTRYPOINT)
            .map_err(|e| internal(&e))?;
        let depth = exports.get_global(STACK_LEFT).map_err(|e| internal(&e))?;
        let pages = memory.view(&*store).size().0;

        let max_depth = env.as_ref(&*store).context.max_depth;
        let max_depth = i32::try_from(max_depth).unwrap_or(i32::MAX);
        depth.set(store, Value::I32(max_depth))?;

        let state = env.as_mut(store);
        state.memory = Some(memory);
        state.instance = Some(instance.clone());
        let paid = state.settle_memory(u16::try_from(pages).unwrap_or(u16::MAX));
        let (ink, args_len) = (state.ink_left, state.args.len() as u32);

        set_remaining_points(store, instance, ink);
        paid.map_err(|escape| RuntimeError::user(Box::new(escape)))?;
        entrypoint.call(store, args_len)
    }

    /// Reads the meter, the depth flag and the memory size left in the instance once the
    /// program is done.
    fn finish(store: &mut Store, instance: &Instance) -> (MeteringPoints, bool, u16) {
        let meter = get_remaining_points(store, instance);
        let exports = &instance.exports;
        let overflowed = exports
            .get_global(STACK_EXHAUSTED)
            .is_ok_and(|flag| matches!(flag.get(&mut *store), Value::I32(1)));
        let pages = exports
            .get_memory("memory")
            .map_or(0, |memory| memory.view(&*store).size().0);
        (meter, overflowed, u16::try_from(pages).unwrap_or(u16::MAX))
    }
}

impl Runtime for NativeRuntime {
    fn compile(&self, wasm: &[u8], config: &CompileConfig) -> eyre::Result<()> {
        self.program(wasm, config).map(|_| ())
    }

    fn call(&self, request: CallRequest<'_>, gas: &mut u64) -> Result<(u8, Vec<u8>), BridgeError> {
        let context = request.context;
        let config = CompileConfig {
            version: context.version,
            page_limit: context.page_limit,
        };
        let program = match self.program(request.wasm, &config) {
            Ok(program) => program,
            Err(err) => return Ok(failure(format!("{err:#}"))),
        };

        let mut store = Store::new(program.engine);
        let env = FunctionEnv::new(&mut store, WasmEnv::new(&request, context.gas_to_ink(*gas)));
        let imports = self.imports(&mut store, &env);
        let instance = match Instance::new(&mut store, &program.module, &imports) {
            Ok(instance) => instance,
            Err(err) => {
                let err = eyre!(err).wrap_err("failed to instantiate program");
                return Ok(failure(format!("{err:#}")));
            }
        };

        let result = Self::execute(&mut store, &instance, &env);
        let (meter, overflowed, pages) = Self::finish(&mut store, &instance);
        let exhausted = matches!(meter, MeteringPoints::Exhausted);
        let state = env.as_mut(&mut store);
        state.ink_left = match meter {
            MeteringPoints::Remaining(ink) => ink,
            MeteringPoints::Exhausted => 0,
        };

        let (kind, output) = match result {
            Ok(status) => match state.settle_memory(pages) {
                Err(_) => (UserOutcomeKind::OutOfGas, vec![]),
                Ok(()) if status == 0 => (UserOutcomeKind::Success, state.outs.clone()),
                Ok(()) => (UserOutcomeKind::Revert, state.outs.clone()),
            },
            Err(trap) => match trap.downcast::<Escape>() {
                Ok(Escape::OutOfInk) => (UserOutcomeKind::OutOfGas, vec![]),
                Ok(Escape::Bridge(err)) => {
                    log::error!("bridge failed while running program: {err}");
                    return Err(err);
                }
                Ok(escape) => (UserOutcomeKind::Failure, escape.to_string().into_bytes()),
                Err(_) if exhausted => (UserOutcomeKind::OutOfGas, vec![]),
                Err(_) if overflowed => (UserOutcomeKind::OutOfStack, vec![]),
                Err(trap) => {
                    let message = trap.message();
                    match trap.to_trap() {
                        Some(TrapCode::StackOverflow) => (UserOutcomeKind::OutOfStack, vec![]),
                        _ => (UserOutcomeKind::Failure, message.into_bytes()),
                    }
                }
            },
        };
        *gas = context.ink_to_gas(state.ink_left);
        if matches!(kind, UserOutcomeKind::OutOfGas | UserOutcomeKind::OutOfStack) {
            *gas = 0;
        }
        Ok((kind.into(), output))
    }
}

fn failure(message: String) -> (u8, Vec<u8>) {
    log::debug!("program failed: {message}");
    (UserOutcomeKind::Failure.into(), message.into_bytes())
}
