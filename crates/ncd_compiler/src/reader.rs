//! Validating reader for compiled artifacts.

use std::fmt;

use crate::error::FormatError;
use crate::format::{
    body_checksum, home_slot, Cursor, Header, HEADER_LEN, RECORD_LEN, SLOT_LEN, VALUE_BOOL,
    VALUE_FLOAT, VALUE_INT, VALUE_REF, VALUE_STR,
};

/// A record table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Position in the record table (layout order).
    pub position: usize,
    /// Absolute offset of the record itself.
    pub offset: u32,
    /// Kind tag.
    pub tag: u32,
    /// Offset of the length-prefixed name.
    pub name_offset: u32,
    /// Offset of the attribute block.
    pub attrs_offset: u32,
    /// Length of the attribute block.
    pub attrs_len: u32,
    /// Number of attributes.
    pub attr_count: u32,
}

/// A decoded attribute value. References carry the target's record offset
/// and its name.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// Reference.
    Ref {
        /// Absolute offset of the target record.
        offset: u32,
        /// Name of the target entry.
        target: String,
    },
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Int(i) => write!(f, "{i}"),
            DecodedValue::Float(x) => write!(f, "{x:?}"),
            DecodedValue::Bool(b) => write!(f, "{b}"),
            DecodedValue::Str(s) => write!(f, "{s:?}"),
            DecodedValue::Ref { offset, target } => write!(f, "@{target} (record at {offset})"),
        }
    }
}

/// A fully decoded entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    /// The record this entry was decoded from.
    pub record: Record,
    /// Entry name.
    pub name: String,
    /// Attributes in stored (name-sorted) order.
    pub attributes: Vec<(String, DecodedValue)>,
}

impl DecodedEntry {
    /// Finds an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&DecodedValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Read access to artifact bytes that passed validation.
///
/// [`ArtifactReader::new`] checks magic, version, declared length, checksum
/// and section layout. Individual records are decoded lazily.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactReader<'a> {
    bytes: &'a [u8],
    header: Header,
}

impl<'a> ArtifactReader<'a> {
    /// Validates `bytes` as an artifact.
    pub fn new(bytes: &'a [u8]) -> Result<Self, FormatError> {
        let header = Header::decode(bytes)?;
        if header.total_len as usize != bytes.len() {
            return Err(FormatError::LengthMismatch {
                declared: header.total_len,
                actual: bytes.len(),
            });
        }
        let actual = body_checksum(bytes);
        if actual != header.checksum {
            return Err(FormatError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let count = header.entry_count as u64;
        let index_offset = HEADER_LEN as u64 + count * RECORD_LEN as u64;
        let payload_offset = index_offset + header.index_slots as u64 * SLOT_LEN as u64;
        let malformed = |reason: &str| FormatError::Malformed {
            offset: 0,
            reason: reason.to_string(),
        };
        if header.record_table_offset as usize != HEADER_LEN {
            return Err(malformed("record table does not follow the header"));
        }
        if header.index_offset as u64 != index_offset {
            return Err(malformed("name index does not follow the record table"));
        }
        if header.index_slots == 0 || (header.index_slots as u64) < count {
            return Err(malformed("name index has too few slots"));
        }
        if header.payload_offset as u64 != payload_offset || payload_offset > bytes.len() as u64 {
            return Err(malformed("payload does not follow the name index"));
        }
        Ok(Self { bytes, header })
    }

    /// The decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.header.entry_count as usize
    }

    /// Returns `true` if the artifact has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The record at `position` in layout order.
    pub fn record(&self, position: usize) -> Option<Record> {
        if position >= self.len() {
            return None;
        }
        let offset = HEADER_LEN + position * RECORD_LEN;
        let mut cursor = Cursor::new(self.bytes, offset);
        let mut field = || cursor.read_u32().ok();
        Some(Record {
            position,
            offset: offset as u32,
            tag: field()?,
            name_offset: field()?,
            attrs_offset: field()?,
            attrs_len: field()?,
            attr_count: field()?,
        })
    }

    /// All records in layout order.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.len()).filter_map(|position| self.record(position))
    }

    /// The record starting at absolute byte `offset`.
    pub fn record_at_offset(&self, offset: u32) -> Option<Record> {
        let relative = (offset as usize).checked_sub(HEADER_LEN)?;
        if relative % RECORD_LEN != 0 {
            return None;
        }
        self.record(relative / RECORD_LEN)
    }

    /// The name of `record`.
    pub fn name(&self, record: &Record) -> Result<&'a str, FormatError> {
        Cursor::new(self.bytes, record.name_offset as usize).read_str()
    }

    /// Decodes the entry at `position`.
    pub fn entry(&self, position: usize) -> Result<DecodedEntry, FormatError> {
        let record = self.record(position).ok_or_else(|| FormatError::Malformed {
            offset: HEADER_LEN + position * RECORD_LEN,
            reason: format!("no record at position {position}"),
        })?;
        let name = self.name(&record)?.to_string();

        let start = record.attrs_offset as usize;
        let end = start + record.attrs_len as usize;
        if end > self.bytes.len() {
            return Err(FormatError::Malformed {
                offset: start,
                reason: format!("attribute block of '{name}' runs past the end"),
            });
        }
        let block = &self.bytes[..end];
        let mut cursor = Cursor::new(block, start);
        let mut attributes = Vec::with_capacity(record.attr_count as usize);
        for _ in 0..record.attr_count {
            let attr_name = cursor.read_str()?.to_string();
            let tag_at = cursor.position();
            let value = match cursor.read_u8()? {
                VALUE_INT => DecodedValue::Int(cursor.read_u64()? as i64),
                VALUE_FLOAT => DecodedValue::Float(f64::from_bits(cursor.read_u64()?)),
                VALUE_BOOL => DecodedValue::Bool(cursor.read_u8()? != 0),
                VALUE_STR => DecodedValue::Str(cursor.read_str()?.to_string()),
                VALUE_REF => {
                    let offset = cursor.read_u32()?;
                    let target = self.record_at_offset(offset).ok_or_else(|| {
                        FormatError::Malformed {
                            offset: tag_at + 1,
                            reason: format!("reference to {offset} is not a record"),
                        }
                    })?;
                    DecodedValue::Ref {
                        offset,
                        target: self.name(&target)?.to_string(),
                    }
                }
                other => {
                    return Err(FormatError::Malformed {
                        offset: tag_at,
                        reason: format!("unknown value tag {other}"),
                    })
                }
            };
            attributes.push((attr_name, value));
        }
        if cursor.position() != end {
            return Err(FormatError::Malformed {
                offset: cursor.position(),
                reason: format!("attribute block of '{name}' has trailing bytes"),
            });
        }

        Ok(DecodedEntry {
            record,
            name,
            attributes,
        })
    }

    /// Decodes every entry in layout order.
    pub fn entries(&self) -> Result<Vec<DecodedEntry>, FormatError> {
        (0..self.len()).map(|position| self.entry(position)).collect()
    }

    /// Finds the entry named `name` through the name index.
    pub fn lookup(&self, name: &str) -> Result<Option<DecodedEntry>, FormatError> {
        let slots = self.header.index_slots as usize;
        let index_offset = self.header.index_offset as usize;
        let mut slot = home_slot(name, slots);
        for _ in 0..slots {
            let at = index_offset + slot * SLOT_LEN;
            let value = Cursor::new(self.bytes, at).read_u32()?;
            if value == 0 {
                return Ok(None);
            }
            let position = value as usize - 1;
            let record = self.record(position).ok_or_else(|| FormatError::Malformed {
                offset: at,
                reason: format!("index slot points at missing record {position}"),
            })?;
            if self.name(&record)? == name {
                return self.entry(position).map(Some);
            }
            slot = (slot + 1) % slots;
        }
        Ok(None)
    }
}
