// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

/// Faults of the bridge between a running program and its host.
///
/// These indicate a broken contract between the runtime and the host rather than anything the
/// program did, and abort the surrounding transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("runtime returned unknown status {0}")]
    UnknownStatus(u8),
    #[error("no host api registered for handle {0}")]
    UnknownHandle(u64),
}

/// Errors a host api reports back to the calling program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("write protection")]
    WriteProtection,
    #[error("log with {0} topics (max 4)")]
    TooManyTopics(u32),
    #[error("log data of {len} bytes cannot hold {topics} topics")]
    BadTopicData { len: usize, topics: u32 },
    #[error("{0}")]
    Failed(String),
}
