// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Instrumentation compiled into every program.
//!
//! Programs are metered per instruction with [`Metering`], may nest calls only as deep as the
//! governed stack depth allows, and cannot grow their memory past the page limit.

use std::sync::Arc;

use parking_lot::Mutex;
use wasmer::{
    sys::{
        CompilerConfig, FunctionMiddleware, MiddlewareError, MiddlewareReaderState,
        ModuleMiddleware,
    },
    wasmparser::{BlockType, Operator},
    LocalFunctionIndex, Store,
};
use wasmer_compiler_cranelift::Cranelift;
use wasmer_middlewares::Metering;
use wasmer_types::{
    ExportIndex, GlobalIndex, GlobalInit, GlobalType, ModuleInfo, Mutability, Pages, Type,
};

use crate::runtime::CompileConfig;

/// Exported global counting the nested calls a program may still make.
pub const STACK_LEFT: &str = "stylus_stack_left";

/// Exported global set to 1 once a program exceeds its call depth.
pub const STACK_EXHAUSTED: &str = "stylus_stack_exhausted";

/// Ink price of an instruction.
pub fn opcode_ink(op: &Operator) -> u64 {
    use Operator::*;

    match op {
        Unreachable | Nop | Block { .. } | Loop { .. } | Else | End => 1,
        Br { .. } | BrIf { .. } | If { .. } | Return => 765,
        BrTable { targets } => 2400 + 325 * targets.len() as u64,
        Call { .. } => 3800,
        CallIndirect { .. } => 13_610,
        // growth is priced as memory when it is observed
        MemoryGrow { .. } => 1,
        _ => 70,
    }
}

/// The store a program is compiled in, with all instrumentation installed.
///
/// Every middleware instance serves exactly one module, so each compilation needs its own.
pub fn instrumented_store(config: &CompileConfig) -> Store {
    let mut compiler = Cranelift::default();
    compiler.canonicalize_nans(true);

    // applied in order
    compiler.push_middleware(Arc::new(Metering::new(0, opcode_ink)));
    compiler.push_middleware(Arc::new(DepthChecker::default()));
    compiler.push_middleware(Arc::new(HeapBound::new(config.page_limit)));
    Store::new(compiler)
}

#[derive(Clone, Copy, Debug)]
struct DepthGlobals {
    left: GlobalIndex,
    exhausted: GlobalIndex,
}

/// Bounds the depth of nested calls, independent of the native stack.
///
/// Each call site checks a counter, decrements it for the callee and restores it when the callee
/// returns. The counter starts at zero and is seeded per call through [`STACK_LEFT`].
#[derive(Debug, Default)]
pub struct DepthChecker {
    globals: Mutex<Option<DepthGlobals>>,
}

impl ModuleMiddleware for DepthChecker {
    fn transform_module_info(&self, info: &mut ModuleInfo) -> Result<(), MiddlewareError> {
        let mut globals = self.globals.lock();
        if globals.is_some() {
            return Err(MiddlewareError::new(
                "depth checker",
                "already applied to another module",
            ));
        }
        *globals = Some(DepthGlobals {
            left: add_global(info, STACK_LEFT),
            exhausted: add_global(info, STACK_EXHAUSTED),
        });
        Ok(())
    }

    fn generate_function_middleware(
        &self,
        _: LocalFunctionIndex,
    ) -> Box<dyn FunctionMiddleware> {
        Box::new(FunctionDepthChecker {
            globals: *self.globals.lock(),
        })
    }
}

fn add_global(info: &mut ModuleInfo, name: &str) -> GlobalIndex {
    let index = info.globals.push(GlobalType::new(Type::I32, Mutability::Var));
    info.global_initializers.push(GlobalInit::I32Const(0));
    info.exports
        .insert(name.to_owned(), ExportIndex::Global(index));
    index
}

#[derive(Debug)]
struct FunctionDepthChecker {
    globals: Option<DepthGlobals>,
}

impl FunctionMiddleware for FunctionDepthChecker {
    fn feed<'a>(
        &mut self,
        operator: Operator<'a>,
        state: &mut MiddlewareReaderState<'a>,
    ) -> Result<(), MiddlewareError> {
        use Operator::*;

        if !matches!(operator, Call { .. } | CallIndirect { .. }) {
            state.push_operator(operator);
            return Ok(());
        }
        let Some(globals) = self.globals else {
            return Err(MiddlewareError::new(
                "depth checker",
                "module globals were never installed",
            ));
        };
        let left = globals.left.as_u32();
        let exhausted = globals.exhausted.as_u32();

        state.extend(&[
            // if left == 0, flag the overflow and trap
            GlobalGet { global_index: left },
            I32Eqz,
            If {
                blockty: BlockType::Empty,
            },
            I32Const { value: 1 },
            GlobalSet {
                global_index: exhausted,
            },
            Unreachable,
            End,
            // left -= 1
            GlobalGet { global_index: left },
            I32Const { value: 1 },
            I32Sub,
            GlobalSet { global_index: left },
        ]);
        state.push_operator(operator);
        state.extend(&[
            // left += 1
            GlobalGet { global_index: left },
            I32Const { value: 1 },
            I32Add,
            GlobalSet { global_index: left },
        ]);
        Ok(())
    }
}

/// Caps the maximum size of a program's memory at the page limit, so `memory.grow` past it fails.
#[derive(Debug)]
pub struct HeapBound {
    limit: Pages,
}

impl HeapBound {
    pub fn new(page_limit: u16) -> Self {
        Self {
            limit: Pages(page_limit.into()),
        }
    }
}

impl ModuleMiddleware for HeapBound {
    fn transform_module_info(&self, info: &mut ModuleInfo) -> Result<(), MiddlewareError> {
        for memory in info.memories.values_mut() {
            // oversized memories are left for validation to reject
            if memory.minimum <= self.limit {
                let max = memory.maximum.map_or(self.limit, |max| max.min(self.limit));
                memory.maximum = Some(max);
            }
        }
        Ok(())
    }

    fn generate_function_middleware(
        &self,
        _: LocalFunctionIndex,
    ) -> Box<dyn FunctionMiddleware> {
        Box::new(Unchanged)
    }
}

#[derive(Debug)]
struct Unchanged;

impl FunctionMiddleware for Unchanged {
    fn feed<'a>(
        &mut self,
        operator: Operator<'a>,
        state: &mut MiddlewareReaderState<'a>,
    ) -> Result<(), MiddlewareError> {
        state.push_operator(operator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wasmer::{imports, Instance, Module, Value};
    use wasmer_middlewares::metering::{
        get_remaining_points, set_remaining_points, MeteringPoints,
    };

    const CONFIG: CompileConfig = CompileConfig {
        version: 1,
        page_limit: 3,
    };

    fn instantiate(wat: &str) -> (Store, Instance) {
        let mut store = instrumented_store(&CONFIG);
        let module = Module::new(&store, wat::parse_str(wat).unwrap()).unwrap();
        let instance = Instance::new(&mut store, &module, &imports! {}).unwrap();
        (store, instance)
    }

    #[test]
    fn test_prices() {
        assert_eq!(opcode_ink(&Operator::Nop), 1);
        assert_eq!(opcode_ink(&Operator::I32Add), 70);
        assert_eq!(opcode_ink(&Operator::Call { function_index: 0 }), 3800);
    }

    #[test]
    fn test_metering_stops_loops() {
        let (mut store, instance) = instantiate(
            r#"(module (func (export "spin") (loop $l (br $l))))"#,
        );
        set_remaining_points(&mut store, &instance, 100_000);

        let spin = instance.exports.get_function("spin").unwrap();
        assert!(spin.call(&mut store, &[]).is_err());
        assert_eq!(
            get_remaining_points(&mut store, &instance),
            MeteringPoints::Exhausted
        );
    }

    #[test]
    fn test_depth_is_bounded() {
        let (mut store, instance) = instantiate(
            r#"(module
                (func $down (export "down") (param i32)
                    (if (local.get 0)
                        (then (call $down (i32.sub (local.get 0) (i32.const 1)))))))"#,
        );
        set_remaining_points(&mut store, &instance, u64::MAX);
        let exports = &instance.exports;
        let left = exports.get_global(STACK_LEFT).unwrap();
        left.set(&mut store, Value::I32(10)).unwrap();

        let down = exports.get_function("down").unwrap();
        down.call(&mut store, &[Value::I32(10)]).unwrap();
        assert!(matches!(left.get(&mut store), Value::I32(10)));

        assert!(down.call(&mut store, &[Value::I32(11)]).is_err());
        let exhausted = exports.get_global(STACK_EXHAUSTED).unwrap();
        assert!(matches!(exhausted.get(&mut store), Value::I32(1)));
    }

    #[test]
    fn test_memory_is_capped() {
        let (mut store, instance) = instantiate(
            r#"(module
                (memory (export "memory") 1)
                (func (export "grow") (param i32) (result i32)
                    (memory.grow (local.get 0))))"#,
        );
        set_remaining_points(&mut store, &instance, u64::MAX);

        let grow = instance.exports.get_function("grow").unwrap();
        let result = grow.call(&mut store, &[Value::I32(5)]).unwrap();
        assert!(matches!(result[0], Value::I32(-1)));
        let result = grow.call(&mut store, &[Value::I32(2)]).unwrap();
        assert!(matches!(result[0], Value::I32(1)));
    }
}
