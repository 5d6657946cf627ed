// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Word-addressed storage for governed chain state.
//!
//! A [`Storage`] is a keyed view into a [`StorageBacking`]. Sub-storages derive their key by
//! hashing the parent key with an identifier, and the slots of a storage are addressed by hashing
//! the storage key with the slot offset. Charged accesses burn gas through the storage's
//! [`Burner`], which lets the surrounding transaction account for the work.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use alloy_primitives::{keccak256, B256};
use parking_lot::RwLock;

/// Gas charged for a regular storage read.
pub const STORAGE_READ_COST: u64 = 800;

/// Gas charged for a storage write.
pub const STORAGE_WRITE_COST: u64 = 20_000;

/// Gas charged for reads that are assumed warm, as in EIP-2929.
pub const WARM_STORAGE_READ_GAS: u64 = 100;

/// Failures of the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage backing failure: {0}")]
    Backing(String),
    #[error("out of gas burning {amount} for storage access ({burned} of {limit} burned)")]
    OutOfGas { amount: u64, burned: u64, limit: u64 },
}

/// A flat key/value store of 32-byte words.
///
/// Missing keys read as [`B256::ZERO`]. Implementations use interior mutability so that one
/// backing can be shared by every [`Storage`] view derived from it.
pub trait StorageBacking: Send + Sync {
    /// Reads the word at `key`.
    fn load(&self, key: B256) -> Result<B256, StorageError>;

    /// Writes the word at `key`.
    fn store(&self, key: B256, value: B256) -> Result<(), StorageError>;
}

/// An in-memory [`StorageBacking`].
#[derive(Debug, Default)]
pub struct MemoryBacking {
    words: RwLock<HashMap<B256, B256>>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-zero words held.
    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBacking for MemoryBacking {
    fn load(&self, key: B256) -> Result<B256, StorageError> {
        Ok(self.words.read().get(&key).copied().unwrap_or_default())
    }

    fn store(&self, key: B256, value: B256) -> Result<(), StorageError> {
        let mut words = self.words.write();
        if value.is_zero() {
            words.remove(&key);
        } else {
            words.insert(key, value);
        }
        Ok(())
    }
}

/// Charges gas for storage work.
pub trait Burner: Send + Sync {
    /// Burns `amount` gas, failing when the burner's budget would be exceeded.
    fn burn(&self, amount: u64) -> Result<(), StorageError>;

    /// Total gas burned so far.
    fn burned(&self) -> u64;
}

/// A [`Burner`] with an optional gas limit.
#[derive(Debug, Default)]
pub struct SystemBurner {
    burned: AtomicU64,
    limit: Option<u64>,
}

impl SystemBurner {
    /// Creates a burner that never runs out of gas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a burner that fails once more than `limit` gas would be burned.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            burned: AtomicU64::new(0),
            limit: Some(limit),
        }
    }
}

impl Burner for SystemBurner {
    fn burn(&self, amount: u64) -> Result<(), StorageError> {
        let limit = self.limit.unwrap_or(u64::MAX);
        self.burned
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |burned| {
                burned.checked_add(amount).filter(|next| *next <= limit)
            })
            .map(|_| ())
            .map_err(|burned| StorageError::OutOfGas {
                amount,
                burned,
                limit,
            })
    }

    fn burned(&self) -> u64 {
        self.burned.load(Ordering::SeqCst)
    }
}

/// A keyed view into a [`StorageBacking`].
#[derive(Clone)]
pub struct Storage {
    backing: Arc<dyn StorageBacking>,
    burner: Arc<dyn Burner>,
    key: B256,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("key", &self.key)
            .field("burned", &self.burner.burned())
            .finish()
    }
}

impl Storage {
    /// Opens the root storage of `backing`.
    pub fn new(backing: Arc<dyn StorageBacking>, burner: Arc<dyn Burner>) -> Self {
        Self {
            backing,
            burner,
            key: B256::ZERO,
        }
    }

    /// Opens a root storage over a fresh [`MemoryBacking`] with an unlimited burner.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBacking::new()), Arc::new(SystemBurner::new()))
    }

    pub fn key(&self) -> B256 {
        self.key
    }

    pub fn burner(&self) -> &dyn Burner {
        self.burner.as_ref()
    }

    /// Opens the child storage named `id`, sharing this storage's backing and burner.
    pub fn open_sub_storage(&self, id: &[u8]) -> Self {
        Self {
            backing: self.backing.clone(),
            burner: self.burner.clone(),
            key: keccak256([self.key.as_slice(), id].concat()),
        }
    }

    /// The backing key of the slot at `offset`.
    pub fn slot(&self, offset: B256) -> B256 {
        keccak256([self.key.as_slice(), offset.as_slice()].concat())
    }

    /// Reads the slot at `offset`, burning [`STORAGE_READ_COST`].
    pub fn get(&self, offset: B256) -> Result<B256, StorageError> {
        self.burner.burn(STORAGE_READ_COST)?;
        self.get_free(offset)
    }

    /// Reads the slot at `offset` without charging for it.
    /// Callers must have paid for the read some other way.
    pub fn get_free(&self, offset: B256) -> Result<B256, StorageError> {
        self.backing.load(self.slot(offset))
    }

    /// Writes the slot at `offset`, burning [`STORAGE_WRITE_COST`].
    pub fn set(&self, offset: B256, value: B256) -> Result<(), StorageError> {
        self.burner.burn(STORAGE_WRITE_COST)?;
        self.backing.store(self.slot(offset), value)
    }

    pub fn get_by_u64(&self, offset: u64) -> Result<B256, StorageError> {
        self.get(u64_to_word(offset))
    }

    pub fn set_by_u64(&self, offset: u64, value: B256) -> Result<(), StorageError> {
        self.set(u64_to_word(offset), value)
    }

    /// Reads a `u32` held in the low bytes of the slot at `offset`.
    pub fn get_u32(&self, offset: B256) -> Result<u32, StorageError> {
        let word = self.get(offset)?;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&word[28..]);
        Ok(u32::from_be_bytes(bytes))
    }

    /// Writes a `u32` into the low bytes of the slot at `offset`.
    pub fn set_u32(&self, offset: B256, value: u32) -> Result<(), StorageError> {
        self.set(offset, B256::left_padding_from(&value.to_be_bytes()))
    }
}

/// Left-pads `value` into a storage word.
pub fn u64_to_word(value: u64) -> B256 {
    B256::left_padding_from(&value.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_storages_are_disjoint() {
        let root = Storage::in_memory();
        let left = root.open_sub_storage(&[0]);
        let right = root.open_sub_storage(&[1]);
        assert_ne!(left.key(), right.key());

        let offset = u64_to_word(7);
        left.set(offset, B256::repeat_byte(0xaa)).unwrap();
        assert_eq!(left.get(offset).unwrap(), B256::repeat_byte(0xaa));
        assert_eq!(right.get(offset).unwrap(), B256::ZERO);
        assert_eq!(root.get(offset).unwrap(), B256::ZERO);
    }

    #[test]
    fn test_u32_words() {
        let storage = Storage::in_memory();
        let key = B256::repeat_byte(3);
        assert_eq!(storage.get_u32(key).unwrap(), 0);

        storage.set_u32(key, 0xdead_beef).unwrap();
        assert_eq!(storage.get_u32(key).unwrap(), 0xdead_beef);
        assert_eq!(storage.get_free(key).unwrap()[28..], 0xdead_beef_u32.to_be_bytes());
    }

    #[test]
    fn test_burning() {
        let storage = Storage::in_memory();
        storage.get_by_u64(0).unwrap();
        storage.get_free(B256::ZERO).unwrap();
        storage.set_by_u64(0, B256::repeat_byte(1)).unwrap();
        assert_eq!(
            storage.burner().burned(),
            STORAGE_READ_COST + STORAGE_WRITE_COST
        );
    }

    #[test]
    fn test_burner_limit() {
        let burner = SystemBurner::with_limit(1_000);
        burner.burn(800).unwrap();
        let err = burner.burn(800).unwrap_err();
        assert_eq!(
            err,
            StorageError::OutOfGas {
                amount: 800,
                burned: 800,
                limit: 1_000
            }
        );
        assert_eq!(burner.burned(), 800);
    }

    #[test]
    fn test_zero_words_are_pruned() {
        let backing = MemoryBacking::new();
        backing.store(B256::repeat_byte(1), B256::repeat_byte(2)).unwrap();
        assert_eq!(backing.len(), 1);
        backing.store(B256::repeat_byte(1), B256::ZERO).unwrap();
        assert!(backing.is_empty());
    }
}
