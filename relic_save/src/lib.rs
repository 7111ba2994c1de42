//! Save-state framing shared by the Relic engine and its tools.
//!
//! A save file is a sequence of sections. Every section is a fixed-size
//! header followed by a MessagePack payload, so readers can skip sections
//! they do not understand and writers stay byte-compatible across crates.

use std::convert::TryFrom;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

/// Bytes that prefix every section ("RLIC").
pub const HEADER_MAGIC: [u8; 4] = *b"RLIC";

/// Save format revision written by this crate.
pub const SAVE_VERSION: u16 = 0x0001;

/// Length of the binary section header in bytes.
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4;

/// Section kinds understood by save format v1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Hash)]
#[repr(u16)]
pub enum SectionKind {
    SaveHeader = 0x0001,
    VariableStore = 0x0002,
    PuzzleStates = 0x0003,
}

/// Envelope describing the upcoming payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub version: u16,
    pub kind: SectionKind,
    pub length: u32,
}

impl SectionHeader {
    /// Encode the header as big-endian bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&HEADER_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_be_bytes());
        out[6..8].copy_from_slice(&(self.kind as u16).to_be_bytes());
        out[8..12].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    /// Decode a header from raw bytes.
    pub fn decode(input: &[u8]) -> Result<Self, SaveError> {
        if input.len() < HEADER_LEN {
            return Err(SaveError::TruncatedHeader);
        }
        if input[..4] != HEADER_MAGIC {
            return Err(SaveError::BadMagic);
        }
        let mut rest = &input[4..HEADER_LEN];
        let version = rest.get_u16();
        let kind_raw = rest.get_u16();
        let kind =
            SectionKind::try_from(kind_raw).map_err(|_| SaveError::UnknownSection(kind_raw))?;
        let length = rest.get_u32();
        Ok(Self {
            version,
            kind,
            length,
        })
    }
}

impl TryFrom<u16> for SectionKind {
    type Error = ();

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::SaveHeader),
            0x0002 => Ok(Self::VariableStore),
            0x0003 => Ok(Self::PuzzleStates),
            _ => Err(()),
        }
    }
}

/// Leading section of every save file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub target: String,
    pub slot: u16,
    pub description: String,
    pub producer: String,
    #[serde(default)]
    pub build: Option<String>,
}

impl SaveHeader {
    pub fn new(
        target: impl Into<String>,
        slot: u16,
        description: impl Into<String>,
        build: Option<String>,
    ) -> Self {
        Self {
            target: target.into(),
            slot,
            description: description.into(),
            producer: "relic_engine".to_string(),
            build,
        }
    }
}

/// Raw script-variable memory captured at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub string_capacity: u32,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// Error conditions returned by the framing helpers.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("header smaller than {HEADER_LEN} bytes")]
    TruncatedHeader,
    #[error("header magic mismatch")]
    BadMagic,
    #[error("section kind {0:#06x} is unknown")]
    UnknownSection(u16),
    #[error("unsupported save version {0:#06x}")]
    UnsupportedVersion(u16),
    #[error("payload length mismatch: header declared {expected} bytes but found {actual}")]
    LengthMismatch { expected: u32, actual: usize },
    #[error("save is missing the {0:?} section")]
    MissingSection(SectionKind),
    #[error("payload decode error: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),
    #[error("payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),
}

/// Wraps a payload with framing suitable for a save file.
pub fn encode_section<T>(kind: SectionKind, payload: &T) -> Result<Vec<u8>, SaveError>
where
    T: Serialize,
{
    let payload_bytes = rmp_serde::to_vec_named(payload)?;
    let header = SectionHeader {
        version: SAVE_VERSION,
        kind,
        length: u32::try_from(payload_bytes.len()).map_err(|_| SaveError::LengthMismatch {
            expected: u32::MAX,
            actual: payload_bytes.len(),
        })?,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload_bytes.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Decode a payload straight into the requested type.
pub fn decode_payload<T>(payload: &[u8]) -> Result<T, SaveError>
where
    T: for<'de> Deserialize<'de>,
{
    let value = rmp_serde::from_slice(payload)?;
    Ok(value)
}

/// Accumulates framed sections into one save buffer.
#[derive(Debug, Default)]
pub struct SaveWriter {
    buffer: Vec<u8>,
}

impl SaveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section<T: Serialize>(&mut self, kind: SectionKind, payload: &T) -> Result<(), SaveError> {
        let bytes = encode_section(kind, payload)?;
        self.buffer.extend_from_slice(&bytes);
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Splits a save buffer into its framed sections.
pub fn split_sections(mut bytes: &[u8]) -> Result<Vec<(SectionHeader, &[u8])>, SaveError> {
    let mut sections = Vec::new();
    while !bytes.is_empty() {
        let header = SectionHeader::decode(bytes)?;
        if header.version != SAVE_VERSION {
            return Err(SaveError::UnsupportedVersion(header.version));
        }
        let body = &bytes[HEADER_LEN..];
        let length = header.length as usize;
        if body.len() < length {
            return Err(SaveError::LengthMismatch {
                expected: header.length,
                actual: body.len(),
            });
        }
        let (payload, rest) = body.split_at(length);
        sections.push((header, payload));
        bytes = rest;
    }
    Ok(sections)
}

/// Decode the first section of the requested kind.
pub fn find_section<T>(bytes: &[u8], kind: SectionKind) -> Result<T, SaveError>
where
    T: for<'de> Deserialize<'de>,
{
    let sections = split_sections(bytes)?;
    let (_, payload) = sections
        .into_iter()
        .find(|(header, _)| header.kind == kind)
        .ok_or(SaveError::MissingSection(kind))?;
    decode_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_rejects_foreign_magic() {
        let mut bytes = SectionHeader {
            version: SAVE_VERSION,
            kind: SectionKind::SaveHeader,
            length: 0,
        }
        .encode();
        bytes[0] = b'X';
        assert!(matches!(
            SectionHeader::decode(&bytes),
            Err(SaveError::BadMagic)
        ));
    }

    #[test]
    fn unknown_section_kind_is_reported() {
        let mut bytes = SectionHeader {
            version: SAVE_VERSION,
            kind: SectionKind::SaveHeader,
            length: 0,
        }
        .encode();
        bytes[6..8].copy_from_slice(&0x00ffu16.to_be_bytes());
        assert!(matches!(
            SectionHeader::decode(&bytes),
            Err(SaveError::UnknownSection(0x00ff))
        ));
    }

    #[test]
    fn writer_sections_are_found_by_kind() {
        let mut writer = SaveWriter::new();
        writer
            .section(
                SectionKind::SaveHeader,
                &SaveHeader::new("fortress", 3, "before the elevator", None),
            )
            .unwrap();
        writer
            .section(
                SectionKind::VariableStore,
                &VariableSnapshot {
                    string_capacity: 16,
                    data: vec![1, 2, 3, 4],
                },
            )
            .unwrap();
        let bytes = writer.finish();

        let header: SaveHeader = find_section(&bytes, SectionKind::SaveHeader).unwrap();
        assert_eq!(header.slot, 3);
        assert_eq!(header.description, "before the elevator");

        let vars: VariableSnapshot = find_section(&bytes, SectionKind::VariableStore).unwrap();
        assert_eq!(vars.data, vec![1, 2, 3, 4]);

        let missing = find_section::<VariableSnapshot>(&bytes, SectionKind::PuzzleStates);
        assert!(matches!(
            missing,
            Err(SaveError::MissingSection(SectionKind::PuzzleStates))
        ));
    }

    #[test]
    fn truncated_payload_is_a_length_mismatch() {
        let mut bytes = encode_section(SectionKind::PuzzleStates, &vec![7u16, 8, 9]).unwrap();
        bytes.pop();
        assert!(matches!(
            split_sections(&bytes),
            Err(SaveError::LengthMismatch { .. })
        ));
    }
}
