// Copyright 2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Framing of Wasm bytecode as on-chain Stylus code.

use alloy_primitives::{keccak256, B256};

use crate::compress::{self, CompressError, Dictionary, LEVEL_WELL};

/// EOF prefix used in Stylus compressed WASMs on-chain, when compressed without a dictionary.
pub const STYLUS_PREFIX: [u8; 4] = [0xEF, 0xF0, 0x00, 0x00];

/// Compresses and prefixes a Wasm module, or the text form of one.
pub fn process_wasm(wasm_or_wat: &[u8]) -> Result<ProcessedWasm, WasmError> {
    let wasm = wasmer::wat2wasm(wasm_or_wat)?.to_vec();
    let compressed = compress::compress(&wasm, LEVEL_WELL, Dictionary::Empty)?;

    let mut code = Vec::with_capacity(STYLUS_PREFIX.len() + compressed.len());
    code.extend_from_slice(&STYLUS_PREFIX);
    code.extend(compressed);
    log::debug!(
        "processed {} bytes of wasm into {} bytes of code",
        wasm.len(),
        code.len()
    );
    Ok(ProcessedWasm { wasm, code })
}

/// Returns the compressed body of deployed Stylus code.
pub fn strip_stylus_prefix(code: &[u8]) -> Result<&[u8], WasmError> {
    match code.strip_prefix(&STYLUS_PREFIX) {
        Some(body) => Ok(body),
        None => {
            let len = code.len().min(STYLUS_PREFIX.len());
            Err(WasmError::BadPrefix(hex::encode(&code[..len])))
        }
    }
}

#[derive(Debug)]
pub struct ProcessedWasm {
    pub wasm: Vec<u8>,
    pub code: Vec<u8>,
}

impl ProcessedWasm {
    pub fn codehash(&self) -> B256 {
        keccak256(&self.code)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WasmError {
    #[error("error converting Wat to Wasm: {0}")]
    Wat2Wasm(#[from] wat::Error),
    #[error("failed to compress Wasm bytes: {0}")]
    Compress(#[from] CompressError),
    #[error("code is not a stylus program (prefix 0x{0})")]
    BadPrefix(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::decompress;
    use pretty_assertions::assert_eq;

    const WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "user_entrypoint") (param i32) (result i32)
                i32.const 0))
    "#;

    #[test]
    fn test_process_wat() {
        let processed = process_wasm(WAT.as_bytes()).unwrap();
        assert_eq!(processed.wasm[..4], *b"\0asm");
        assert_eq!(processed.code[..4], STYLUS_PREFIX);
        assert_eq!(processed.codehash(), keccak256(&processed.code));

        let body = strip_stylus_prefix(&processed.code).unwrap();
        assert_eq!(decompress(body, 128 * 1024).unwrap(), processed.wasm);
    }

    #[test]
    fn test_binary_passes_through() {
        let wasm = wat::parse_str(WAT).unwrap();
        assert_eq!(process_wasm(&wasm).unwrap().wasm, wasm);
    }

    #[test]
    fn test_bad_prefix() {
        let err = strip_stylus_prefix(&[0xEF, 0xF0, 0x00, 0x01, 0xaa]).unwrap_err();
        assert!(matches!(err, WasmError::BadPrefix(prefix) if prefix == "eff00001"));
        assert!(strip_stylus_prefix(&[0xEF]).is_err());
    }

    #[test]
    fn test_invalid_wat() {
        assert!(matches!(
            process_wasm(b"(module (func"),
            Err(WasmError::Wat2Wasm(_))
        ));
    }
}
