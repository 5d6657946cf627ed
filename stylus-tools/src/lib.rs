// Copyright 2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Tools for turning Wasm into deployable Stylus code and back.

pub mod compress;
pub mod wasm;

pub use compress::{compress, decompress, CompressError, DecompressError, Dictionary};
pub use wasm::{process_wasm, strip_stylus_prefix, ProcessedWasm, WasmError};
