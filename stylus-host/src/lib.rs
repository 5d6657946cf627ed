// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The bridge through which sandboxed Stylus programs reach chain state.
//!
//! Programs cannot hold references into the host. Instead, the host registers the call's
//! [`stylus_core::EvmApi`] in a [`HostApiRegistry`] and passes the program the resulting
//! [`ApiId`]. The runtime's host functions call the [`hostio`] functions with that id.

pub mod hostio;
pub mod registry;

pub use registry::{ApiGuard, ApiId, HostApiEntry, HostApiRegistry, HOST_APIS};
