//! The binary artifact format.
//!
//! All integers are little-endian.
//!
//! ```text
//! offset 0   header (40 bytes)
//!            magic "NCDF" | version u32 | entry count u32
//!            record table offset u32 | index offset u32 | index slots u32
//!            payload offset u32 | total length u32 | checksum u64
//! offset 40  record table: entry count x 24-byte records
//!            kind tag | name offset | attrs offset | attrs length
//!            attr count | reserved (0)            (all u32)
//!            name index: index slots x u32 (record position + 1, 0 = empty)
//!            payload: names and attribute blocks
//! ```
//!
//! The checksum is XXH3-64 over every byte after the header. The name index
//! is an open-addressing table keyed by XXH3-64 of the entry name with linear
//! probing.

use ncd_common::ContentHash;

use crate::error::FormatError;

/// Magic bytes at the start of every artifact.
pub const MAGIC: [u8; 4] = *b"NCDF";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the header in bytes.
pub const HEADER_LEN: usize = 40;

/// Size of one record table entry in bytes.
pub const RECORD_LEN: usize = 24;

/// Size of one name index slot in bytes.
pub const SLOT_LEN: usize = 4;

/// Attribute value tag: `i64`.
pub const VALUE_INT: u8 = 1;
/// Attribute value tag: `f64` bits.
pub const VALUE_FLOAT: u8 = 2;
/// Attribute value tag: `u8` 0 or 1.
pub const VALUE_BOOL: u8 = 3;
/// Attribute value tag: `u32` length + UTF-8.
pub const VALUE_STR: u8 = 4;
/// Attribute value tag: `u32` absolute offset of the target's record.
pub const VALUE_REF: u8 = 5;

/// The decoded artifact header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u32,
    /// Number of records.
    pub entry_count: u32,
    /// Offset of the record table.
    pub record_table_offset: u32,
    /// Offset of the name index.
    pub index_offset: u32,
    /// Number of name index slots.
    pub index_slots: u32,
    /// Offset of the payload section.
    pub payload_offset: u32,
    /// Length of the whole artifact.
    pub total_len: u32,
    /// XXH3-64 of every byte after the header.
    pub checksum: u64,
}

impl Header {
    /// Serializes the header.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        let fields = [
            self.version,
            self.entry_count,
            self.record_table_offset,
            self.index_offset,
            self.index_slots,
            self.payload_offset,
            self.total_len,
        ];
        for (i, field) in fields.iter().enumerate() {
            let at = 4 + i * 4;
            out[at..at + 4].copy_from_slice(&field.to_le_bytes());
        }
        out[32..40].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    /// Parses the header at the start of `bytes`, checking magic and version.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::Truncated { len: bytes.len() });
        }
        let mut cursor = Cursor::new(bytes, 0);
        let magic: [u8; 4] = [
            cursor.read_u8()?,
            cursor.read_u8()?,
            cursor.read_u8()?,
            cursor.read_u8()?,
        ];
        if magic != MAGIC {
            return Err(FormatError::BadMagic(magic));
        }
        let version = cursor.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            entry_count: cursor.read_u32()?,
            record_table_offset: cursor.read_u32()?,
            index_offset: cursor.read_u32()?,
            index_slots: cursor.read_u32()?,
            payload_offset: cursor.read_u32()?,
            total_len: cursor.read_u32()?,
            checksum: cursor.read_u64()?,
        })
    }
}

/// Number of name index slots for `entry_count` entries: `ceil(count / lf)`,
/// at least 1. Saturates at `u64::MAX`; callers bound the result.
pub fn index_slot_count(entry_count: usize, load_factor: f64) -> u64 {
    let slots = (entry_count as f64 / load_factor).ceil() as u64;
    slots.max(entry_count as u64).max(1)
}

/// Home slot of `name` in an index of `slots` slots.
pub fn home_slot(name: &str, slots: usize) -> usize {
    (ContentHash::xxh3_64(name.as_bytes()) % slots as u64) as usize
}

/// Checksum of an artifact body.
pub fn body_checksum(bytes: &[u8]) -> u64 {
    ContentHash::xxh3_64(bytes.get(HEADER_LEN..).unwrap_or_default())
}

/// Bounds-checked little-endian reader over artifact bytes.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(FormatError::Malformed {
                offset: self.pos,
                reason: format!("{n} bytes needed past end of data"),
            }),
        }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, FormatError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, FormatError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn read_str(&mut self) -> Result<&'a str, FormatError> {
        let start = self.pos;
        let len = self.read_u32()? as usize;
        let raw = self.take(len)?;
        std::str::from_utf8(raw).map_err(|e| FormatError::Malformed {
            offset: start,
            reason: format!("invalid UTF-8: {e}"),
        })
    }
}
