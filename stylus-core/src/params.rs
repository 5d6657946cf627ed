// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The governed Stylus parameters.
//!
//! All of the parameters are packed into a single storage word so that reading them costs one
//! warm access. The packing is a wire format: each field occupies a fixed number of big-endian
//! bytes, in the order given by [`PARAMS_LAYOUT`], and the word is right-padded with zeros.
//! Future upgrades must append fields rather than reorder them.
//!
//! Only a governance-authorized path should call [`StylusParams::save`]. Everyone else treats a
//! loaded value as an immutable snapshot.

use alloy_primitives::B256;

use crate::storage::{Storage, StorageError, WARM_STORAGE_READ_GAS};

/// Max decompressed size of a program, in bytes.
pub const MAX_WASM_SIZE: usize = 128 * 1024;

/// Gas charged per unit of `min_init_gas` before a program starts.
pub const MIN_INIT_GAS_UNITS: u64 = 128;

/// Baseline values written by [`StylusParams::initialize`].
pub const INITIAL_VERSION: u16 = 1;
pub const INITIAL_INK_PRICE: u32 = 10_000;
pub const INITIAL_MAX_STACK_DEPTH: u32 = 4 * 65_536;
pub const INITIAL_FREE_PAGES: u16 = 2;
pub const INITIAL_PAGE_GAS: u16 = 1_000;
pub const INITIAL_PAGE_RAMP: u64 = 620_674_314;
pub const INITIAL_PAGE_LIMIT: u16 = 128;
pub const INITIAL_MIN_INIT_GAS: u16 = 0;
pub const INITIAL_EXPIRY_DAYS: u16 = 365;
pub const INITIAL_KEEPALIVE_DAYS: u16 = 31;
pub const INITIAL_INIT_TABLE_BITS: u8 = 7;
pub const INITIAL_TRIE_TABLE_BITS: u8 = 11;

/// Byte width of each packed field, in packing order.
pub const PARAMS_LAYOUT: [(&str, usize); 12] = [
    ("version", 2),
    ("ink_price", 3),
    ("max_stack_depth", 4),
    ("free_pages", 2),
    ("page_gas", 2),
    ("page_ramp", 8),
    ("page_limit", 2),
    ("min_init_gas", 2),
    ("expiry_days", 2),
    ("keepalive_days", 2),
    ("init_table_bits", 1),
    ("trie_table_bits", 1),
];

/// Number of meaningful bytes in the packed word.
pub const PACKED_LEN: usize = {
    let mut len = 0;
    let mut i = 0;
    while i < PARAMS_LAYOUT.len() {
        len += PARAMS_LAYOUT[i].1;
        i += 1;
    }
    len
};

const _: () = assert!(PACKED_LEN <= 32);

/// Configuration errors: misuse of an unbound value or a field that doesn't fit its width.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("tried to save stylus params that aren't bound to storage")]
    InvalidStore,
    #[error("{field} = {value} does not fit in {width} bytes")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The Stylus configuration, one storage word.
#[derive(Clone, Debug)]
pub struct StylusParams {
    backing: Option<Storage>,
    /// Runtime generation. Must only change during upgrades.
    pub version: u16,
    /// Ink per unit of EVM gas. 24 bits.
    pub ink_price: u32,
    pub max_stack_depth: u32,
    pub free_pages: u16,
    pub page_gas: u16,
    pub page_ramp: u64,
    pub page_limit: u16,
    pub min_init_gas: u16,
    pub expiry_days: u16,
    pub keepalive_days: u16,
    pub init_table_bits: u8,
    pub trie_table_bits: u8,
}

impl PartialEq for StylusParams {
    fn eq(&self, other: &Self) -> bool {
        self.encode_fields() == other.encode_fields()
    }
}

impl Eq for StylusParams {}

impl Default for StylusParams {
    /// The baseline parameters, not bound to any storage.
    fn default() -> Self {
        Self {
            backing: None,
            version: INITIAL_VERSION,
            ink_price: INITIAL_INK_PRICE,
            max_stack_depth: INITIAL_MAX_STACK_DEPTH,
            free_pages: INITIAL_FREE_PAGES,
            page_gas: INITIAL_PAGE_GAS,
            page_ramp: INITIAL_PAGE_RAMP,
            page_limit: INITIAL_PAGE_LIMIT,
            min_init_gas: INITIAL_MIN_INIT_GAS,
            expiry_days: INITIAL_EXPIRY_DAYS,
            keepalive_days: INITIAL_KEEPALIVE_DAYS,
            init_table_bits: INITIAL_INIT_TABLE_BITS,
            trie_table_bits: INITIAL_TRIE_TABLE_BITS,
        }
    }
}

impl StylusParams {
    /// Reads the params from `storage`.
    ///
    /// The read is assumed warm due to the frequency of access, so only
    /// [`WARM_STORAGE_READ_GAS`] is burned. The returned value stays bound to `storage`.
    pub fn load(storage: &Storage) -> Result<Self, StorageError> {
        storage.burner().burn(WARM_STORAGE_READ_GAS)?;
        let word = storage.get_free(B256::ZERO)?;

        let mut params = Self::decode(word);
        params.backing = Some(storage.clone());
        Ok(params)
    }

    /// Writes the params back to the storage they were loaded from.
    pub fn save(&self) -> Result<(), ParamsError> {
        let Some(storage) = &self.backing else {
            log::error!("tried to save invalid stylus params");
            return Err(ParamsError::InvalidStore);
        };
        let word = self.encode()?;
        storage.set(B256::ZERO, word)?;
        log::debug!("saved stylus params v{}: 0x{}", self.version, hex::encode(word));
        Ok(())
    }

    /// Writes the baseline params into `storage`, overwriting whatever was there.
    pub fn initialize(storage: &Storage) -> Result<(), ParamsError> {
        let params = Self {
            backing: Some(storage.clone()),
            ..Self::default()
        };
        params.save()
    }

    /// Whether the params can be saved.
    pub fn is_bound(&self) -> bool {
        self.backing.is_some()
    }

    /// Packs the params into a storage word.
    pub fn encode(&self) -> Result<B256, ParamsError> {
        let fields = self.encode_fields();
        let mut word = B256::ZERO;
        let mut offset = 0;
        for ((field, width), value) in PARAMS_LAYOUT.into_iter().zip(fields) {
            if width < 8 && value >> (8 * width) != 0 {
                return Err(ParamsError::FieldOverflow {
                    field,
                    value,
                    width,
                });
            }
            word[offset..offset + width].copy_from_slice(&value.to_be_bytes()[8 - width..]);
            offset += width;
        }
        Ok(word)
    }

    /// Unpacks a storage word. Every word decodes, since the fields are fixed-width.
    pub fn decode(word: B256) -> Self {
        let mut offset = 0;
        let mut take = |width: usize| {
            let mut bytes = [0; 8];
            bytes[8 - width..].copy_from_slice(&word[offset..offset + width]);
            offset += width;
            u64::from_be_bytes(bytes)
        };
        let mut fields = [0; PARAMS_LAYOUT.len()];
        for (value, (_, width)) in fields.iter_mut().zip(PARAMS_LAYOUT) {
            *value = take(width);
        }

        // widths come from the layout, so the narrowing casts below are lossless
        let [version, ink_price, max_stack_depth, free_pages, page_gas, page_ramp, page_limit, min_init_gas, expiry_days, keepalive_days, init_table_bits, trie_table_bits] =
            fields;
        Self {
            backing: None,
            version: version as u16,
            ink_price: ink_price as u32,
            max_stack_depth: max_stack_depth as u32,
            free_pages: free_pages as u16,
            page_gas: page_gas as u16,
            page_ramp,
            page_limit: page_limit as u16,
            min_init_gas: min_init_gas as u16,
            expiry_days: expiry_days as u16,
            keepalive_days: keepalive_days as u16,
            init_table_bits: init_table_bits as u8,
            trie_table_bits: trie_table_bits as u8,
        }
    }

    fn encode_fields(&self) -> [u64; PARAMS_LAYOUT.len()] {
        [
            self.version.into(),
            self.ink_price.into(),
            self.max_stack_depth.into(),
            self.free_pages.into(),
            self.page_gas.into(),
            self.page_ramp,
            self.page_limit.into(),
            self.min_init_gas.into(),
            self.expiry_days.into(),
            self.keepalive_days.into(),
            self.init_table_bits.into(),
            self.trie_table_bits.into(),
        ]
    }
}
