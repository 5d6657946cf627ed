// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

use alloy_primitives::{Address, Signature, B256, U256};

/// Recovers the signer of a packed `hash ‖ v ‖ r ‖ s` buffer, as the ecrecover precompile does.
///
/// Short input is right-padded with zeros. Returns [`None`] for invalid signatures.
pub fn ecrecover(input: &[u8]) -> Option<Address> {
    let mut buf = [0; 128];
    let len = input.len().min(buf.len());
    buf[..len].copy_from_slice(&input[..len]);

    if buf[32..63].iter().any(|b| *b != 0) {
        return None;
    }
    let y_parity = match buf[63] {
        27 => false,
        28 => true,
        _ => return None,
    };
    let hash = B256::from_slice(&buf[..32]);
    let r = U256::from_be_slice(&buf[64..96]);
    let s = U256::from_be_slice(&buf[96..128]);

    Signature::new(r, s, y_parity)
        .recover_address_from_prehash(&hash)
        .ok()
}
