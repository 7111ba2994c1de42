//! Script-visible global memory.
//!
//! The store is a flat little-endian byte region. Callers pick the access
//! width with a [`VarType`] tag on every read and write; the store never
//! remembers how a slot was last written, so a mismatched tag simply
//! reinterprets the bytes underneath.

use relic_save::VariableSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use relic_formats::VarType;

pub const DEFAULT_STORE_SIZE: usize = 4096;
pub const DEFAULT_STRING_CAPACITY: usize = 32;

/// Value moved in or out of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Int(u32),
    Str(String),
}

impl VarValue {
    /// Integer view; strings are parsed the way C `atoi` does.
    pub fn as_u32(&self) -> u32 {
        match self {
            VarValue::Int(value) => *value,
            VarValue::Str(text) => atoi(text) as u32,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            VarValue::Int(value) => value.to_string(),
            VarValue::Str(text) => text,
        }
    }
}

impl From<u32> for VarValue {
    fn from(value: u32) -> Self {
        VarValue::Int(value)
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::Str(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
    #[error("variable access at {index} ({width} bytes) exceeds store of {size} bytes")]
    OutOfRange {
        index: usize,
        width: usize,
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableStore {
    data: Vec<u8>,
    string_capacity: usize,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_SIZE, DEFAULT_STRING_CAPACITY)
    }
}

impl VariableStore {
    /// Allocates a zeroed store. String slots always hold at least the
    /// terminator, so the capacity is clamped to one byte or more.
    pub fn new(size: usize, string_capacity: usize) -> Self {
        Self {
            data: vec![0; size],
            string_capacity: string_capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn string_capacity(&self) -> usize {
        self.string_capacity
    }

    pub fn read(&self, index: usize, ty: VarType) -> Result<VarValue, VarError> {
        match ty {
            VarType::Int8 => self.read_u8(index).map(|v| VarValue::Int(u32::from(v))),
            VarType::Int16 => self.read_u16(index).map(|v| VarValue::Int(u32::from(v))),
            VarType::Int32 => self.read_u32(index).map(VarValue::Int),
            VarType::Str => self.read_str(index).map(VarValue::Str),
        }
    }

    pub fn write(&mut self, index: usize, ty: VarType, value: &VarValue) -> Result<(), VarError> {
        match (ty, value) {
            (VarType::Str, VarValue::Str(text)) => self.write_str(index, text),
            (VarType::Str, VarValue::Int(number)) => self.write_str(index, &number.to_string()),
            (VarType::Int8, value) => self.write_u8(index, value.as_u32() as u8),
            (VarType::Int16, value) => self.write_u16(index, value.as_u32() as u16),
            (VarType::Int32, value) => self.write_u32(index, value.as_u32()),
        }
    }

    pub fn read_u8(&self, index: usize) -> Result<u8, VarError> {
        let bytes = self.span(index, 1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&self, index: usize) -> Result<u16, VarError> {
        let bytes = self.span(index, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&self, index: usize) -> Result<u32, VarError> {
        let bytes = self.span(index, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_u8(&mut self, index: usize, value: u8) -> Result<(), VarError> {
        self.span_mut(index, 1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, index: usize, value: u16) -> Result<(), VarError> {
        self.span_mut(index, 2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, index: usize, value: u32) -> Result<(), VarError> {
        self.span_mut(index, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Reads up to the first NUL or the slot capacity, whichever comes first.
    pub fn read_str(&self, index: usize) -> Result<String, VarError> {
        let slot = self.span(index, self.string_capacity)?;
        let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
        Ok(String::from_utf8_lossy(&slot[..end]).into_owned())
    }

    /// Copies at most `capacity - 1` bytes and always terminates the slot.
    pub fn write_str(&mut self, index: usize, text: &str) -> Result<(), VarError> {
        let capacity = self.string_capacity;
        let slot = self.span_mut(index, capacity)?;
        let bytes = text.as_bytes();
        let copied = bytes.len().min(capacity - 1);
        slot[..copied].copy_from_slice(&bytes[..copied]);
        slot[copied] = 0;
        Ok(())
    }

    /// Numbered 32-bit engine variable `n`, stored at byte `n * 4`.
    pub fn read_var(&self, number: u16) -> Result<u32, VarError> {
        self.read_u32(usize::from(number) * 4)
    }

    pub fn write_var(&mut self, number: u16, value: u32) -> Result<(), VarError> {
        self.write_u32(usize::from(number) * 4, value)
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        VariableSnapshot {
            string_capacity: self.string_capacity as u32,
            data: self.data.clone(),
        }
    }

    /// Replaces the whole store, including its size, with a saved image.
    pub fn restore(&mut self, snapshot: &VariableSnapshot) {
        self.data = snapshot.data.clone();
        self.string_capacity = (snapshot.string_capacity as usize).max(1);
    }

    fn span(&self, index: usize, width: usize) -> Result<&[u8], VarError> {
        let end = self.checked_end(index, width)?;
        Ok(&self.data[index..end])
    }

    fn span_mut(&mut self, index: usize, width: usize) -> Result<&mut [u8], VarError> {
        let end = self.checked_end(index, width)?;
        Ok(&mut self.data[index..end])
    }

    fn checked_end(&self, index: usize, width: usize) -> Result<usize, VarError> {
        index
            .checked_add(width)
            .filter(|end| *end <= self.data.len())
            .ok_or(VarError::OutOfRange {
                index,
                width,
                size: self.data.len(),
            })
    }
}

/// C `atoi`: optional leading whitespace and sign, then digits; anything
/// unparsable yields 0 and overflow saturates.
pub fn atoi(text: &str) -> i32 {
    let trimmed = text.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\x0B');
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let mut value: i64 = 0;
    for digit in digits.bytes().take_while(|b| b.is_ascii_digit()) {
        value = (value * 10 + i64::from(digit - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let signed = if negative { -value } else { value };
    signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_writes_wrap_to_their_width() {
        let mut store = VariableStore::new(64, 8);
        store.write(0, VarType::Int8, &VarValue::Int(300)).unwrap();
        store.write(4, VarType::Int16, &VarValue::Int(70_000)).unwrap();
        store
            .write(8, VarType::Int32, &VarValue::Int(0xDEAD_BEEF))
            .unwrap();

        assert_eq!(store.read(0, VarType::Int8).unwrap(), VarValue::Int(300 % 256));
        assert_eq!(
            store.read(4, VarType::Int16).unwrap(),
            VarValue::Int(70_000 % 65_536)
        );
        assert_eq!(
            store.read(8, VarType::Int32).unwrap(),
            VarValue::Int(0xDEAD_BEEF)
        );
    }

    #[test]
    fn mismatched_tags_reinterpret_bytes() {
        let mut store = VariableStore::new(16, 8);
        store.write_u16(0, 0x1234).unwrap();
        assert_eq!(store.read(0, VarType::Int8).unwrap(), VarValue::Int(0x34));
        assert_eq!(store.read(1, VarType::Int8).unwrap(), VarValue::Int(0x12));
        assert_eq!(store.read(0, VarType::Int32).unwrap(), VarValue::Int(0x1234));
    }

    #[test]
    fn strings_truncate_and_terminate() {
        let mut store = VariableStore::new(32, 6);
        store.write(0, VarType::Str, &"overlong".into()).unwrap();
        assert_eq!(store.read_str(0).unwrap(), "overl");
        assert_eq!(store.read_u8(5).unwrap(), 0);

        store.write(0, VarType::Str, &"ab".into()).unwrap();
        assert_eq!(store.read_str(0).unwrap(), "ab");
    }

    #[test]
    fn values_convert_across_kinds() {
        let mut store = VariableStore::new(32, 8);
        store.write(0, VarType::Int16, &" -12abc".into()).unwrap();
        assert_eq!(store.read_u16(0).unwrap(), (-12i16) as u16);

        store.write(8, VarType::Str, &VarValue::Int(451)).unwrap();
        assert_eq!(store.read_str(8).unwrap(), "451");
    }

    #[test]
    fn out_of_range_access_is_rejected_without_writing() {
        let mut store = VariableStore::new(8, 4);
        let err = store.write_u32(6, 1).unwrap_err();
        assert_eq!(
            err,
            VarError::OutOfRange {
                index: 6,
                width: 4,
                size: 8
            }
        );
        assert_eq!(store.read_u16(6).unwrap(), 0);
        assert!(store.read_str(5).is_err());
        assert!(store.read_u8(usize::MAX).is_err());
    }

    #[test]
    fn numbered_variables_use_four_byte_slots() {
        let mut store = VariableStore::default();
        store.write_var(17, 99).unwrap();
        assert_eq!(store.read_u32(68).unwrap(), 99);
        assert_eq!(store.read_var(17).unwrap(), 99);
    }

    #[test]
    fn snapshot_restore_replaces_contents() {
        let mut store = VariableStore::new(16, 4);
        store.write_u8(3, 7).unwrap();
        let snapshot = store.snapshot();

        let mut other = VariableStore::new(4, 2);
        other.restore(&snapshot);
        assert_eq!(other, store);
    }

    #[test]
    fn atoi_matches_c_behaviour() {
        assert_eq!(atoi("42"), 42);
        assert_eq!(atoi("  +7x"), 7);
        assert_eq!(atoi("-3"), -3);
        assert_eq!(atoi("abc"), 0);
        assert_eq!(atoi(""), 0);
        assert_eq!(atoi("99999999999"), i32::MAX);
        assert_eq!(atoi("-99999999999"), i32::MIN);
        assert_eq!(atoi(" \t\x0B\r\n12"), 12);
        assert_eq!(atoi("\u{00A0}12"), 0);
        assert_eq!(atoi("\u{3000}-4"), 0);
    }
}
