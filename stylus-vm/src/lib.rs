// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Compiling and running Stylus programs.
//!
//! [`Programs`] keeps track of which programs are compiled for the current Stylus version and
//! runs them through a [`Runtime`], with the call's host api registered for the duration of the
//! call. [`NativeRuntime`] is a runtime backed by wasmer.

pub mod context;
pub mod native;
pub mod programs;
pub mod runtime;

pub use context::CallContext;
pub use native::NativeRuntime;
pub use programs::{ProgramError, Programs};
pub use runtime::{CallRequest, CompileConfig, Runtime};
