// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Results of running a program.
//!
//! A runtime reports how a program finished as a one-byte status tag plus an output buffer.
//! [`UserOutcome::decode`] turns that pair into a typed outcome, and
//! [`UserOutcome::into_result`] maps it onto the error kinds the chain understands.

use std::fmt;

use crate::error::BridgeError;

/// The status tag of an outcome, as it crosses the runtime boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UserOutcomeKind {
    Success = 0,
    Revert = 1,
    Failure = 2,
    OutOfGas = 3,
    OutOfStack = 4,
}

impl TryFrom<u8> for UserOutcomeKind {
    type Error = BridgeError;

    fn try_from(status: u8) -> Result<Self, Self::Error> {
        use UserOutcomeKind::*;
        Ok(match status {
            0 => Success,
            1 => Revert,
            2 => Failure,
            3 => OutOfGas,
            4 => OutOfStack,
            _ => return Err(BridgeError::UnknownStatus(status)),
        })
    }
}

impl From<UserOutcomeKind> for u8 {
    fn from(kind: UserOutcomeKind) -> Self {
        kind as u8
    }
}

/// How a program finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserOutcome {
    /// Normal termination with return data.
    Success(Vec<u8>),
    /// The program reverted with the given data.
    Revert(Vec<u8>),
    /// The program trapped or otherwise failed.
    Failure(String),
    OutOfGas,
    OutOfStack,
}

impl UserOutcome {
    /// Decodes a runtime status and its output.
    ///
    /// Unknown tags are a [`BridgeError`], never a program failure.
    pub fn decode(status: u8, data: Vec<u8>) -> Result<Self, BridgeError> {
        Ok(match UserOutcomeKind::try_from(status)? {
            UserOutcomeKind::Success => Self::Success(data),
            UserOutcomeKind::Revert => Self::Revert(data),
            UserOutcomeKind::Failure => Self::Failure(String::from_utf8_lossy(&data).into_owned()),
            UserOutcomeKind::OutOfGas => Self::OutOfGas,
            UserOutcomeKind::OutOfStack => Self::OutOfStack,
        })
    }

    pub fn kind(&self) -> UserOutcomeKind {
        match self {
            Self::Success(_) => UserOutcomeKind::Success,
            Self::Revert(_) => UserOutcomeKind::Revert,
            Self::Failure(_) => UserOutcomeKind::Failure,
            Self::OutOfGas => UserOutcomeKind::OutOfGas,
            Self::OutOfStack => UserOutcomeKind::OutOfStack,
        }
    }

    /// Splits the outcome back into its wire form.
    pub fn into_data(self) -> (UserOutcomeKind, Vec<u8>) {
        let kind = self.kind();
        let data = match self {
            Self::Success(data) | Self::Revert(data) => data,
            Self::Failure(msg) => msg.into_bytes(),
            Self::OutOfGas | Self::OutOfStack => vec![],
        };
        (kind, data)
    }

    /// Maps the outcome onto the chain's error kinds, yielding the return data on success.
    pub fn into_result(self) -> Result<Vec<u8>, ExecutionError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Revert(data) => Err(ExecutionError::Reverted(data)),
            Self::Failure(msg) => Err(ExecutionError::Failure(msg)),
            Self::OutOfGas => Err(ExecutionError::OutOfGas),
            Self::OutOfStack => Err(ExecutionError::Depth),
        }
    }
}

impl fmt::Display for UserOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(data) => write!(f, "success 0x{}", hex::encode(data)),
            Self::Revert(data) => write!(f, "revert 0x{}", hex::encode(data)),
            Self::Failure(msg) => write!(f, "failure: {msg}"),
            Self::OutOfGas => write!(f, "out of gas"),
            Self::OutOfStack => write!(f, "out of stack"),
        }
    }
}

/// The chain-facing failure of a program call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("execution reverted")]
    Reverted(Vec<u8>),
    #[error("execution failed: {0}")]
    Failure(String),
    #[error("out of gas")]
    OutOfGas,
    #[error("max call depth exceeded")]
    Depth,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_tags() {
        let data = b"hi".to_vec();
        assert_eq!(
            UserOutcome::decode(0, data.clone()),
            Ok(UserOutcome::Success(data.clone()))
        );
        assert_eq!(
            UserOutcome::decode(1, data.clone()),
            Ok(UserOutcome::Revert(data.clone()))
        );
        assert_eq!(
            UserOutcome::decode(2, data.clone()),
            Ok(UserOutcome::Failure("hi".into()))
        );
        assert_eq!(UserOutcome::decode(3, data.clone()), Ok(UserOutcome::OutOfGas));
        assert_eq!(UserOutcome::decode(4, data), Ok(UserOutcome::OutOfStack));
    }

    #[test]
    fn test_unknown_status() {
        assert_eq!(
            UserOutcome::decode(5, vec![]),
            Err(BridgeError::UnknownStatus(5))
        );
        assert_eq!(
            UserOutcomeKind::try_from(255),
            Err(BridgeError::UnknownStatus(255))
        );
    }

    #[test]
    fn test_failure_message_is_lossy() {
        let outcome = UserOutcome::decode(2, vec![b'o', b'k', 0xff]).unwrap();
        assert_eq!(outcome, UserOutcome::Failure("ok\u{fffd}".into()));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(UserOutcome::Success(vec![1]).into_result(), Ok(vec![1]));
        assert_eq!(
            UserOutcome::Revert(vec![2]).into_result(),
            Err(ExecutionError::Reverted(vec![2]))
        );
        assert_eq!(
            UserOutcome::OutOfGas.into_result(),
            Err(ExecutionError::OutOfGas)
        );
        assert_eq!(
            UserOutcome::OutOfStack.into_result(),
            Err(ExecutionError::Depth)
        );
    }

    #[test]
    fn test_into_data() {
        let (kind, data) = UserOutcome::Failure("trap".into()).into_data();
        assert_eq!(kind, UserOutcomeKind::Failure);
        assert_eq!(data, b"trap");
        assert_eq!(u8::from(UserOutcomeKind::OutOfStack), 4);
    }
}
