// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Runs hand-written programs end to end: deployed as prefixed code, compiled, then called
//! through the gateway with a `TestVM` as chain state.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use pretty_assertions::assert_eq;
use stylus_core::{ExecutionError, Storage, UserOutcome};
use stylus_host::HostApiRegistry;
use stylus_test::TestVM;
use stylus_tools::wasm::process_wasm;
use stylus_vm::{NativeRuntime, ProgramError, Programs};

const PROGRAM: Address = Address::repeat_byte(0x42);

const ECHO: &str = r#"
    (module
        (import "vm_hooks" "read_args" (func $read_args (param i32)))
        (import "vm_hooks" "write_result" (func $write_result (param i32 i32)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param $len i32) (result i32)
            (call $read_args (i32.const 0))
            (call $write_result (i32.const 0) (local.get $len))
            i32.const 0))
"#;

/// Calldata is an op byte then a key and, for stores, a value.
const STORAGE: &str = r#"
    (module
        (import "vm_hooks" "read_args" (func $read_args (param i32)))
        (import "vm_hooks" "write_result" (func $write_result (param i32 i32)))
        (import "vm_hooks" "storage_load_bytes32" (func $load (param i32 i32)))
        (import "vm_hooks" "storage_store_bytes32" (func $store (param i32 i32)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param $len i32) (result i32)
            (call $read_args (i32.const 0))
            (if (i32.eqz (i32.load8_u (i32.const 0)))
                (then
                    (call $store (i32.const 1) (i32.const 33))
                    (return (i32.const 0))))
            (call $load (i32.const 1) (i32.const 128))
            (call $write_result (i32.const 128) (i32.const 32))
            i32.const 0))
"#;

/// Emits its calldata as a log with one topic.
const LOGGER: &str = r#"
    (module
        (import "vm_hooks" "read_args" (func $read_args (param i32)))
        (import "vm_hooks" "emit_log" (func $emit_log (param i32 i32 i32)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param $len i32) (result i32)
            (call $read_args (i32.const 0))
            (call $emit_log (i32.const 0) (local.get $len) (i32.const 1))
            i32.const 0))
"#;

const REVERT: &str = r#"
    (module
        (import "vm_hooks" "read_args" (func $read_args (param i32)))
        (import "vm_hooks" "write_result" (func $write_result (param i32 i32)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param $len i32) (result i32)
            (call $read_args (i32.const 0))
            (call $write_result (i32.const 0) (local.get $len))
            i32.const 1))
"#;

const SPIN: &str = r#"
    (module
        (import "vm_hooks" "evm_gas_left" (func $gas_left (result i64)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param i32) (result i32)
            (loop $spin
                (drop (call $gas_left))
                (br $spin))
            i32.const 0))
"#;

/// Spins without ever calling the host.
const LOOP: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param i32) (result i32)
            (loop $spin (br $spin))
            i32.const 0))
"#;

const RECURSE: &str = r#"
    (module
        (memory (export "memory") 1)
        (func $recurse (param i32) (result i32)
            (call $recurse (i32.add (local.get 0) (i32.const 1))))
        (func (export "user_entrypoint") (param i32) (result i32)
            (call $recurse (local.get 0))))
"#;

/// Nests as many calls as there are bytes of calldata.
const NEST: &str = r#"
    (module
        (memory (export "memory") 1)
        (func $nest (param i32)
            (if (local.get 0)
                (then (call $nest (i32.sub (local.get 0) (i32.const 1))))))
        (func (export "user_entrypoint") (param $len i32) (result i32)
            (call $nest (local.get $len))
            i32.const 0))
"#;

/// Grows memory by the first calldata byte, stores a word at the last byte it may address, then
/// reverts if the grow failed.
const GROW: &str = r#"
    (module
        (import "vm_hooks" "read_args" (func $read_args (param i32)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param $len i32) (result i32)
            (local $old i32)
            (call $read_args (i32.const 0))
            (local.set $old (memory.grow (i32.load8_u (i32.const 0))))
            (if (i32.eq (local.get $old) (i32.const -1))
                (then (return (i32.const 1))))
            (i32.store8
                (i32.sub (i32.mul (memory.size) (i32.const 65536)) (i32.const 1))
                (i32.const 7))
            i32.const 0))
"#;

/// Writes the chain id, difficulty and randomness words.
const BLOCK_INFO: &str = r#"
    (module
        (import "vm_hooks" "block_chainid" (func $chainid (param i32)))
        (import "vm_hooks" "block_difficulty" (func $difficulty (param i32)))
        (import "vm_hooks" "block_random" (func $random (param i32)))
        (import "vm_hooks" "write_result" (func $write_result (param i32 i32)))
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param i32) (result i32)
            (call $chainid (i32.const 0))
            (call $difficulty (i32.const 32))
            (call $random (i32.const 64))
            (call $write_result (i32.const 0) (i32.const 96))
            i32.const 0))
"#;

const TRAP: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "user_entrypoint") (param i32) (result i32)
            unreachable))
"#;

const BIG_MEMORY: &str = r#"
    (module
        (memory (export "memory") 5)
        (func (export "user_entrypoint") (param i32) (result i32)
            i32.const 0))
"#;

struct Chain {
    programs: Programs,
    apis: Arc<HostApiRegistry>,
    runtime: NativeRuntime,
    vm: TestVM,
}

impl Chain {
    fn new() -> Self {
        let storage = Storage::in_memory();
        Programs::initialize(&storage).unwrap();
        let apis = Arc::new(HostApiRegistry::new());
        Self {
            programs: Programs::with_registry(storage, apis.clone()),
            apis,
            runtime: NativeRuntime::new(4, false),
            vm: TestVM::new(),
        }
    }

    fn deploy(&self, wat: &str) -> Result<u16, ProgramError> {
        let processed = process_wasm(wat.as_bytes()).unwrap();
        self.vm.set_code(PROGRAM, processed.code);
        self.programs.compile_program(&self.vm, PROGRAM, &self.runtime)
    }

    fn set_max_depth(&self, depth: u32) {
        let mut params = self.programs.params().unwrap();
        params.max_stack_depth = depth;
        self.programs.save_params(&params).unwrap();
    }

    fn call(&self, calldata: &[u8], gas: &mut u64, read_only: bool) -> (UserOutcome, u64) {
        let result = self.programs.call_program(
            &self.vm,
            PROGRAM,
            calldata,
            gas,
            self.vm.evm_data(read_only),
            Box::new(self.vm.clone()),
            &self.runtime,
        );
        assert!(self.apis.is_empty());
        result.unwrap()
    }
}

fn storage_calldata(op: u8, key: B256, value: B256) -> Vec<u8> {
    let mut calldata = vec![op];
    calldata.extend_from_slice(key.as_slice());
    calldata.extend_from_slice(value.as_slice());
    calldata
}

#[test]
fn echo_returns_calldata() {
    let chain = Chain::new();
    assert_eq!(chain.deploy(ECHO).unwrap(), 1);

    let mut gas = 100_000;
    let (outcome, used) = chain.call(b"hello", &mut gas, false);
    assert_eq!(outcome, UserOutcome::Success(b"hello".to_vec()));

    // two hostios at 8400 ink each, each copying one word at 3 gas, plus under a gas of
    // instructions
    let hostio_gas = 2 * (8_400 + 3 * 10_000) / 10_000;
    assert!((hostio_gas + 1..=hostio_gas + 2).contains(&used), "{used}");
    assert_eq!(used, 100_000 - gas);
}

#[test]
fn storage_round_trip() {
    let chain = Chain::new();
    chain.deploy(STORAGE).unwrap();
    let key = B256::with_last_byte(7);
    let value = B256::repeat_byte(0x5a);

    let (outcome, _) = chain.call(&storage_calldata(0, key, value), &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));
    assert_eq!(chain.vm.get_storage(key), value);

    let (outcome, _) = chain.call(&storage_calldata(1, key, B256::ZERO), &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(value.to_vec()));
}

#[test]
fn read_only_store_fails() {
    let chain = Chain::new();
    chain.deploy(STORAGE).unwrap();
    let key = B256::with_last_byte(7);

    let calldata = storage_calldata(0, key, B256::repeat_byte(1));
    let (outcome, _) = chain.call(&calldata, &mut 1_000_000, true);
    assert_eq!(outcome, UserOutcome::Failure("write protection".into()));
    assert_eq!(chain.vm.get_storage(key), B256::ZERO);

    // reads remain available
    let (outcome, _) = chain.call(&storage_calldata(1, key, B256::ZERO), &mut 1_000_000, true);
    assert_eq!(outcome, UserOutcome::Success(B256::ZERO.to_vec()));
}

#[test]
fn logs_are_emitted() {
    let chain = Chain::new();
    chain.deploy(LOGGER).unwrap();
    let topic = B256::repeat_byte(0xee);
    let mut calldata = topic.to_vec();
    calldata.extend_from_slice(b"body");

    let (outcome, _) = chain.call(&calldata, &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));
    let logs = chain.vm.get_emitted_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].topics, vec![topic]);
    assert_eq!(logs[0].data, b"body".to_vec());

    let (outcome, _) = chain.call(b"short", &mut 1_000_000, false);
    assert_eq!(
        outcome,
        UserOutcome::Failure("log data of 5 bytes cannot hold 1 topics".into())
    );

    let (outcome, _) = chain.call(&calldata, &mut 1_000_000, true);
    assert_eq!(outcome, UserOutcome::Failure("write protection".into()));
    assert_eq!(chain.vm.get_emitted_logs().len(), 1);
}

#[test]
fn revert_keeps_output() {
    let chain = Chain::new();
    chain.deploy(REVERT).unwrap();

    let (outcome, _) = chain.call(b"denied", &mut 100_000, false);
    assert_eq!(outcome, UserOutcome::Revert(b"denied".to_vec()));
    assert_eq!(
        outcome.into_result(),
        Err(ExecutionError::Reverted(b"denied".to_vec()))
    );
}

#[test]
fn hostio_loop_runs_out_of_gas() {
    let chain = Chain::new();
    chain.deploy(SPIN).unwrap();

    let mut gas = 50_000;
    let (outcome, used) = chain.call(&[], &mut gas, false);
    assert_eq!(outcome, UserOutcome::OutOfGas);
    assert_eq!((gas, used), (0, 50_000));
}

#[test]
fn bare_loop_runs_out_of_gas() {
    let chain = Chain::new();
    chain.deploy(LOOP).unwrap();

    let mut gas = 20_000;
    let (outcome, used) = chain.call(&[], &mut gas, false);
    assert_eq!(outcome, UserOutcome::OutOfGas);
    assert_eq!((gas, used), (0, 20_000));
}

#[test]
fn deep_recursion_is_out_of_stack() {
    let chain = Chain::new();
    chain.deploy(RECURSE).unwrap();
    chain.set_max_depth(1_000);

    let mut gas = 100_000;
    let (outcome, used) = chain.call(&[], &mut gas, false);
    assert_eq!(outcome, UserOutcome::OutOfStack);
    assert_eq!((gas, used), (0, 100_000));
    assert_eq!(outcome.into_result(), Err(ExecutionError::Depth));
}

#[test]
fn call_depth_follows_params() {
    let chain = Chain::new();
    chain.deploy(NEST).unwrap();
    chain.set_max_depth(100);

    // the entrypoint's own call counts toward the depth
    let (outcome, _) = chain.call(&[0; 50], &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));
    let (outcome, _) = chain.call(&[0; 99], &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));

    let mut gas = 1_000_000;
    let (outcome, used) = chain.call(&[0; 100], &mut gas, false);
    assert_eq!(outcome, UserOutcome::OutOfStack);
    assert_eq!((gas, used), (0, 1_000_000));
}

#[test]
fn trap_is_a_failure() {
    let chain = Chain::new();
    chain.deploy(TRAP).unwrap();

    let (outcome, _) = chain.call(&[], &mut 100_000, false);
    match outcome {
        UserOutcome::Failure(message) => assert!(message.contains("unreachable"), "{message}"),
        other => panic!("unexpected outcome {other}"),
    }
}

#[test]
fn memory_is_priced() {
    let chain = Chain::new();
    chain.deploy(BIG_MEMORY).unwrap();

    // three pages past the free two: 3 * 1000 linear plus the ramp
    let memory_gas = 3_000 + 21_309;
    let mut gas = 100_000;
    let (outcome, used) = chain.call(&[], &mut gas, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));
    assert!((memory_gas..=memory_gas + 1).contains(&used), "{used}");

    let mut gas = memory_gas - 1;
    let (outcome, _) = chain.call(&[], &mut gas, false);
    assert_eq!(outcome, UserOutcome::OutOfGas);
}

#[test]
fn memory_growth_is_bounded_and_priced() {
    let chain = Chain::new();
    chain.deploy(GROW).unwrap();

    let (outcome, base) = chain.call(&[0], &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));

    // growing to 5 pages opens three past the free two
    let (outcome, used) = chain.call(&[4], &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Success(vec![]));
    assert!(used >= base + 3_000 + 21_309, "{used} vs {base}");

    let mut gas = 10_000;
    let (outcome, _) = chain.call(&[4], &mut gas, false);
    assert_eq!(outcome, UserOutcome::OutOfGas);
    assert_eq!(gas, 0);

    // the default limit is 128 pages
    let (outcome, used) = chain.call(&[200], &mut 1_000_000, false);
    assert_eq!(outcome, UserOutcome::Revert(vec![]));
    assert!(used < 3_000 + 21_309, "{used}");
}

#[test]
fn block_info_is_exposed() {
    let chain = Chain::new();
    chain.deploy(BLOCK_INFO).unwrap();
    chain.vm.set_chain_id(412_346);

    let mut expected = U256::from(412_346).to_be_bytes::<32>().to_vec();
    expected.extend([0u8; 64]);
    let (outcome, _) = chain.call(&[], &mut 100_000, false);
    assert_eq!(outcome, UserOutcome::Success(expected));

    let random = B256::repeat_byte(0x77);
    chain.vm.set_difficulty(U256::from(3), Some(random));
    let mut expected = U256::from(412_346).to_be_bytes::<32>().to_vec();
    expected.extend(U256::from(3).to_be_bytes::<32>());
    expected.extend_from_slice(random.as_slice());
    let (outcome, _) = chain.call(&[], &mut 100_000, false);
    assert_eq!(outcome, UserOutcome::Success(expected));
}

#[test]
fn invalid_program_does_not_compile() {
    let chain = Chain::new();
    let err = chain
        .deploy(r#"(module (func (export "user_entrypoint") (param i32) (result i32) i32.const 0))"#)
        .unwrap_err();
    assert!(matches!(&err, ProgramError::Compile(msg) if msg.contains("memory")), "{err}");
    assert!(!chain.programs.is_callable(PROGRAM).unwrap());
}

#[test]
fn upgrade_invalidates_compiled_programs() {
    let chain = Chain::new();
    chain.deploy(ECHO).unwrap();
    chain.programs.upgrade_version().unwrap();

    let err = chain
        .programs
        .call_program(
            &chain.vm,
            PROGRAM,
            b"hi",
            &mut 100_000,
            chain.vm.evm_data(false),
            Box::new(chain.vm.clone()),
            &chain.runtime,
        )
        .unwrap_err();
    assert!(matches!(err, ProgramError::OutOfDate { program: 1, current: 2, .. }));

    assert_eq!(
        chain
            .programs
            .compile_program(&chain.vm, PROGRAM, &chain.runtime)
            .unwrap(),
        2
    );
    let (outcome, _) = chain.call(b"hi", &mut 100_000, false);
    assert_eq!(outcome, UserOutcome::Success(b"hi".to_vec()));
}
