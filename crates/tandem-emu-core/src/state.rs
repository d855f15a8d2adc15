//! Save states.
//!
//! Every stateful component implements [`Serializable`] with a single
//! `serialize` routine that runs in both directions. While saving, each field
//! is appended to the buffer; while loading, the same calls overwrite the
//! fields from the buffer in the same order. Keeping one routine per component
//! means the two directions cannot drift apart.
//!
//! ## Format
//!
//! - 4 bytes: magic `"TSS1"`
//! - 4 bytes: format version (u32 little-endian)
//! - remaining: component fields, little-endian, in serialization order
//!
//! ROM contents are not part of a state; the same cartridge must be loaded
//! before restoring.

use crate::error::StateError;

pub const STATE_MAGIC: &[u8; 4] = b"TSS1";

/// Increment on any change to the field order.
pub const STATE_VERSION: u32 = 1;

const HEADER_SIZE: usize = 4 + 4;

pub trait Serializable {
    fn serialize(&mut self, s: &mut Serializer);
}

/// Fixed-width integers that can be stored in a state.
pub trait Integer: Copy {
    const SIZE: usize;

    fn append(self, out: &mut Vec<u8>);

    fn parse(bytes: &[u8]) -> Self;
}

macro_rules! integer {
    ($($ty:ty),*) => {$(
        impl Integer for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn append(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn parse(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    )*};
}

integer!(u8, u16, u32, u64, u128, i16, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Save,
    Load,
}

#[derive(Debug)]
pub struct Serializer {
    mode: Mode,
    data: Vec<u8>,
    offset: usize,
    truncated: bool,
}

impl Serializer {
    /// Start a new state with the header already written.
    pub fn saving() -> Self {
        let mut data = Vec::with_capacity(0x4000);
        data.extend_from_slice(STATE_MAGIC);
        STATE_VERSION.append(&mut data);
        Self {
            mode: Mode::Save,
            data,
            offset: 0,
            truncated: false,
        }
    }

    /// Check the header of `data` and position the reader after it.
    pub fn loading(data: &[u8]) -> Result<Self, StateError> {
        if data.len() < HEADER_SIZE || &data[..4] != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = u32::parse(&data[4..HEADER_SIZE]);
        if version != STATE_VERSION {
            return Err(StateError::Version { found: version });
        }
        Ok(Self {
            mode: Mode::Load,
            data: data.to_vec(),
            offset: HEADER_SIZE,
            truncated: false,
        })
    }

    pub fn is_loading(&self) -> bool {
        self.mode == Mode::Load
    }

    fn take(&mut self, len: usize) -> Option<&[u8]> {
        if self.truncated || self.offset + len > self.data.len() {
            self.truncated = true;
            return None;
        }
        let start = self.offset;
        self.offset += len;
        Some(&self.data[start..start + len])
    }

    pub fn integer<T: Integer>(&mut self, value: &mut T) {
        match self.mode {
            Mode::Save => value.append(&mut self.data),
            Mode::Load => {
                if let Some(bytes) = self.take(T::SIZE) {
                    *value = T::parse(bytes);
                }
            }
        }
    }

    pub fn boolean(&mut self, value: &mut bool) {
        let mut byte = *value as u8;
        self.integer(&mut byte);
        *value = byte != 0;
    }

    /// A fixed-length block; the length itself is not stored.
    pub fn bytes(&mut self, value: &mut [u8]) {
        match self.mode {
            Mode::Save => self.data.extend_from_slice(value),
            Mode::Load => {
                if let Some(bytes) = self.take(value.len()) {
                    value.copy_from_slice(bytes);
                }
            }
        }
    }

    /// Finish a save and return the encoded state.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Finish a load. Fails if the buffer ran out or has bytes left over.
    pub fn finish(self) -> Result<(), StateError> {
        if self.truncated {
            return Err(StateError::Truncated);
        }
        if self.offset != self.data.len() {
            return Err(StateError::TrailingData {
                remaining: self.data.len() - self.offset,
            });
        }
        Ok(())
    }
}
