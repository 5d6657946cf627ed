// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Definitions shared by the crates that run Stylus programs.
//!
//! This crate holds the governed [`params::StylusParams`] word and the [`storage::Storage`] it
//! lives in, the [`evm::EvmData`] snapshot handed to every call, the [`EvmApi`] a running program
//! reaches chain state through, and the [`outcome::UserOutcome`] a call ends with.

pub mod api;
pub mod crypto;
pub mod error;
pub mod evm;
pub mod outcome;
pub mod params;
pub mod storage;

pub use api::{CallResult, CreateResult, EvmApi, StateDb};
pub use error::{ApiError, BridgeError};
pub use evm::EvmData;
pub use outcome::{ExecutionError, UserOutcome, UserOutcomeKind};
pub use params::{ParamsError, StylusParams};
pub use storage::{Storage, StorageError};
