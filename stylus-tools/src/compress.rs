// Copyright 2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Brotli compression of program code.
//!
//! Programs are stored compressed, so decompression happens on every fetch. Untrusted input is
//! decompressed against an explicit bound and never expands past it.

use std::io::{self, Read};

use brotli2::read::{BrotliDecoder, BrotliEncoder};

/// Fastest brotli compression level.
pub const LEVEL_FAST: u32 = 0;

/// Best brotli compression level, used for deployments.
pub const LEVEL_WELL: u32 = 11;

/// Dictionaries a stream may have been compressed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dictionary {
    Empty,
    /// Reserved for a dictionary trained on Stylus programs.
    StylusProgram,
}

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("unsupported brotli dictionary {0:?}")]
    UnsupportedDictionary(Dictionary),
    #[error("failed to compress: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("decompressed data exceeds {max} bytes")]
    TooLarge { max: usize },
    #[error("failed to decompress: {0}")]
    Io(#[from] io::Error),
}

/// Compresses `input` at the given brotli `level`.
pub fn compress(input: &[u8], level: u32, dictionary: Dictionary) -> Result<Vec<u8>, CompressError> {
    if dictionary != Dictionary::Empty {
        return Err(CompressError::UnsupportedDictionary(dictionary));
    }
    let mut compressor = BrotliEncoder::new(input, level);
    let mut compressed = vec![];
    compressor.read_to_end(&mut compressed)?;
    Ok(compressed)
}

/// Decompresses a brotli stream, failing once it would expand past `max_size` bytes.
pub fn decompress(input: &[u8], max_size: usize) -> Result<Vec<u8>, DecompressError> {
    // one extra byte tells a stream of exactly max_size apart from a longer one
    let mut decoder = BrotliDecoder::new(input).take(max_size as u64 + 1);
    let mut output = Vec::with_capacity(max_size.min(input.len().saturating_mul(4)));
    decoder.read_to_end(&mut output)?;

    if output.len() > max_size {
        log::warn!("rejected brotli stream expanding past {max_size} bytes");
        return Err(DecompressError::TooLarge { max: max_size });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<u8> {
        (0..4096u32).flat_map(|i| (i % 251).to_le_bytes()).collect()
    }

    #[test]
    fn test_round_trip_at_both_levels() {
        let data = sample();
        for level in [LEVEL_FAST, LEVEL_WELL] {
            let compressed = compress(&data, level, Dictionary::Empty).unwrap();
            assert!(compressed.len() < data.len());
            assert_eq!(decompress(&compressed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn test_bound_is_enforced() {
        let data = sample();
        let compressed = compress(&data, LEVEL_WELL, Dictionary::Empty).unwrap();

        let err = decompress(&compressed, data.len() - 1).unwrap_err();
        assert!(matches!(err, DecompressError::TooLarge { max } if max == data.len() - 1));
    }

    #[test]
    fn test_empty_input() {
        let compressed = compress(&[], LEVEL_FAST, Dictionary::Empty).unwrap();
        assert_eq!(decompress(&compressed, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_garbage_fails() {
        let err = decompress(&[0x11; 16], 1024).unwrap_err();
        assert!(matches!(err, DecompressError::Io(_)));
    }

    #[test]
    fn test_program_dictionary_is_rejected() {
        let err = compress(b"wasm", LEVEL_WELL, Dictionary::StylusProgram).unwrap_err();
        assert!(matches!(
            err,
            CompressError::UnsupportedDictionary(Dictionary::StylusProgram)
        ));
    }
}
