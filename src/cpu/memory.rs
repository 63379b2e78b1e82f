//! SIC/XE memory subsystem.
//!
//! Memory is byte-addressable; the native operand unit is the 3-byte
//! big-endian word. The byte address is the canonical convention
//! throughout the crate: the word index of an address is `addr / 3`,
//! and word-level indirect accesses must satisfy `addr % 3 == 0`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default memory size: 32 KiB, the standard SIC address space.
pub const DEFAULT_MEMORY_SIZE: usize = 32_768;

/// Smallest memory a machine may be built with.
pub const MIN_MEMORY_SIZE: usize = 1_024;

/// Number of bytes in a SIC/XE word.
pub const WORD_SIZE: usize = 3;

/// SIC/XE main memory: a flat, zero-initialized byte buffer.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a memory of the default 32 KiB size, all bytes zeroed.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_MEMORY_SIZE)
    }

    /// Create a memory of a custom size.
    ///
    /// # Panics
    /// Panics if `size` is below [`MIN_MEMORY_SIZE`].
    pub fn with_size(size: usize) -> Self {
        assert!(
            size >= MIN_MEMORY_SIZE,
            "memory size {} below minimum {}",
            size,
            MIN_MEMORY_SIZE
        );
        Self {
            bytes: vec![0; size],
        }
    }

    /// Total number of addressable bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the memory holds no bytes (never the case after construction).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a single byte.
    pub fn read_byte(&self, addr: u32) -> Result<u8, MemoryError> {
        self.check_range(addr, 1)?;
        Ok(self.bytes[addr as usize])
    }

    /// Write a single byte.
    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        self.check_range(addr, 1)?;
        self.bytes[addr as usize] = value;
        Ok(())
    }

    /// Read a 3-byte big-endian word starting at `addr`.
    pub fn read_word(&self, addr: u32) -> Result<[u8; WORD_SIZE], MemoryError> {
        self.check_range(addr, WORD_SIZE)?;
        let i = addr as usize;
        Ok([self.bytes[i], self.bytes[i + 1], self.bytes[i + 2]])
    }

    /// Write a 3-byte big-endian word starting at `addr`.
    pub fn write_word(&mut self, addr: u32, word: [u8; WORD_SIZE]) -> Result<(), MemoryError> {
        self.check_range(addr, WORD_SIZE)?;
        let i = addr as usize;
        self.bytes[i..i + WORD_SIZE].copy_from_slice(&word);
        Ok(())
    }

    /// Read a word as a 24-bit integer.
    pub fn read_word_value(&self, addr: u32) -> Result<u32, MemoryError> {
        let [hi, mid, lo] = self.read_word(addr)?;
        Ok(u32::from(hi) << 16 | u32::from(mid) << 8 | u32::from(lo))
    }

    /// Write the low 24 bits of `value` as a big-endian word.
    pub fn write_word_value(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        let word = [(value >> 16) as u8, (value >> 8) as u8, value as u8];
        self.write_word(addr, word)
    }

    /// Read a 4-byte big-endian field (format-4 literal helper).
    pub fn read_extended(&self, addr: u32) -> Result<u32, MemoryError> {
        self.check_range(addr, 4)?;
        let i = addr as usize;
        Ok(u32::from_be_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ]))
    }

    /// Write a 4-byte big-endian field (format-4 literal helper).
    pub fn write_extended(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.check_range(addr, 4)?;
        let i = addr as usize;
        self.bytes[i..i + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Read two consecutive words as a 48-bit big-endian integer.
    ///
    /// Used by the float-family instructions, which treat the F register
    /// as a masked 48-bit integer.
    pub fn read_double_word(&self, addr: u32) -> Result<u64, MemoryError> {
        self.check_range(addr, 2 * WORD_SIZE)?;
        let mut value = 0u64;
        for offset in 0..2 * WORD_SIZE {
            value = value << 8 | u64::from(self.bytes[addr as usize + offset]);
        }
        Ok(value)
    }

    /// Write the low 48 bits of `value` as two consecutive words.
    pub fn write_double_word(&mut self, addr: u32, value: u64) -> Result<(), MemoryError> {
        self.check_range(addr, 2 * WORD_SIZE)?;
        for offset in 0..2 * WORD_SIZE {
            let shift = 8 * (2 * WORD_SIZE - 1 - offset);
            self.bytes[addr as usize + offset] = (value >> shift) as u8;
        }
        Ok(())
    }

    /// Validate that `addr` sits on a word boundary.
    ///
    /// Indirect addressing dereferences through a word; a non-aligned
    /// pointer is a fatal error, never rounded.
    pub fn check_word_aligned(&self, addr: u32) -> Result<(), MemoryError> {
        if addr as usize % WORD_SIZE != 0 {
            return Err(MemoryError::Misaligned { addr });
        }
        Ok(())
    }

    /// Copy a loader-produced flat image into memory at `start`.
    pub fn load_program(&mut self, start: u32, image: &[u8]) -> Result<(), MemoryError> {
        let start = start as usize;
        if start >= self.bytes.len() || image.len() > self.bytes.len() - start {
            return Err(MemoryError::ProgramTooLarge {
                size: image.len(),
                available: self.bytes.len().saturating_sub(start),
            });
        }
        self.bytes[start..start + image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Zero every byte.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    /// Dump a memory range (for debugging/display).
    pub fn dump(&self, start: u32, count: usize) -> Vec<(u32, u8)> {
        let start = start as usize;
        let end = start.saturating_add(count).min(self.bytes.len());
        (start..end).map(|i| (i as u32, self.bytes[i])).collect()
    }

    fn check_range(&self, addr: u32, width: usize) -> Result<(), MemoryError> {
        let addr = addr as usize;
        if addr >= self.bytes.len() || width > self.bytes.len() - addr {
            return Err(MemoryError::OutOfBounds {
                addr: addr as u32,
                len: self.bytes.len(),
            });
        }
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Memory")
            .field("len", &self.bytes.len())
            .field("non_zero_bytes", &non_zero)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access outside the addressable range.
    #[error("memory address {addr:#08X} out of bounds (size {len:#X})")]
    OutOfBounds { addr: u32, len: usize },

    /// Word-level indirect access on a non-word-aligned address.
    #[error("address {addr:#08X} is not 3-byte word aligned")]
    Misaligned { addr: u32 },

    /// Program image does not fit at the requested start address.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
