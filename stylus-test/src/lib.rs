// Copyright 2025-2026, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The Stylus testing suite.
//!
//! The stylus-test crate makes it easy to run Stylus programs end to end without a chain. Its
//! [`crate::TestVM`] is an in-memory chain state that implements both the
//! [`stylus_core::EvmApi`] a running program calls back into and the [`stylus_core::StateDb`]
//! programs are fetched from.
//!
//! [`crate::TestVM`] allows for mocking of calls and deployments, and records storage writes and
//! logs so tests can assert on what a program did.

pub mod builder;
pub mod constants;
pub mod state;
pub mod vm;
pub use builder::*;
pub use vm::*;
