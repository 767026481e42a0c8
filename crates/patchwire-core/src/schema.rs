//! Declarative slot tables.
//!
//! A [`Schema`] is the ordered list of slots making up one message payload.
//! Each slot consumes a fixed number of payload bytes, so slot order and byte
//! offsets are fixed at construction.
//!
//! # Example
//!
//! ```
//! use patchwire_core::{ByteOrder, PackedField, Schema, Transform};
//!
//! let schema = Schema::builder()
//!     .simple("a")
//!     .packed([
//!         PackedField::new("b", 3),
//!         PackedField::new("c", 1),
//!         PackedField::new("d", 3),
//!     ])
//!     .two_byte("e", ByteOrder::MsbFirst, Transform::Offset(8192))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.byte_len(), 4);
//! ```

use crate::error::{Error, Result};
use std::collections::HashSet;

/// Order of the two data bytes of a multi-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

impl ByteOrder {
    /// Arrange `[msb, lsb]` in wire order.
    #[inline]
    pub fn arrange(self, [msb, lsb]: [u8; 2]) -> [u8; 2] {
        match self {
            ByteOrder::MsbFirst => [msb, lsb],
            ByteOrder::LsbFirst => [lsb, msb],
        }
    }

    /// Read two wire bytes back as `[msb, lsb]`.
    #[inline]
    pub fn read(self, a: u8, b: u8) -> [u8; 2] {
        match self {
            ByteOrder::MsbFirst => [a, b],
            ByteOrder::LsbFirst => [b, a],
        }
    }
}

/// Raw ↔ logical value mapping of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Identity,
    /// Centered range: `logical = raw - bias`.
    Offset(i32),
    /// `raw = offset + step * logical`.
    Scale { offset: i32, step: i32 },
    /// Signed value in `bits`-wide two's complement.
    TwosComplement { bits: u8 },
    /// Device code remapped through the named lookup table.
    Table(String),
}

impl Transform {
    pub fn table(key: impl Into<String>) -> Self {
        Transform::Table(key.into())
    }

    /// Raw → logical. Table lookups are resolved by the transcoder.
    pub fn decode(&self, raw: i32) -> i32 {
        match self {
            Transform::Identity | Transform::Table(_) => raw,
            Transform::Offset(bias) => raw - bias,
            Transform::Scale { offset, step } => (raw - offset).div_euclid(*step),
            Transform::TwosComplement { bits } => {
                let half = 1i32 << (bits - 1);
                if raw >= half {
                    raw - (half << 1)
                } else {
                    raw
                }
            }
        }
    }

    /// Logical → raw. Table lookups are resolved by the transcoder.
    pub fn encode(&self, logical: i32) -> i32 {
        match self {
            Transform::Identity | Transform::Table(_) => logical,
            Transform::Offset(bias) => logical + bias,
            Transform::Scale { offset, step } => offset + step * logical,
            Transform::TwosComplement { bits } => {
                if logical < 0 {
                    logical + (1i32 << bits)
                } else {
                    logical
                }
            }
        }
    }

    /// Logical range reachable from raw values `0..=raw_max`. For a table this
    /// is the slot's capacity; the real bound is the table's length, see
    /// [`ParameterSetBuilder::table_len`](crate::ParameterSetBuilder::table_len).
    pub fn natural_range(&self, raw_max: i32) -> (i32, i32) {
        match self {
            Transform::Identity | Transform::Table(_) => (0, raw_max),
            Transform::Offset(bias) => (-bias, raw_max - bias),
            Transform::Scale { offset, step } => (0, (raw_max - offset).div_euclid(*step)),
            Transform::TwosComplement { bits } => {
                let half = 1i32 << (bits - 1);
                (-half, half - 1)
            }
        }
    }
}

/// One sub-field of a packed byte; `name: None` is padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedField {
    pub name: Option<String>,
    pub width: u8,
}

impl PackedField {
    pub fn new(name: impl Into<String>, width: u8) -> Self {
        Self {
            name: Some(name.into()),
            width,
        }
    }

    pub fn pad(width: u8) -> Self {
        Self { name: None, width }
    }
}

/// One slot of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaEntry {
    /// One unused byte, written as zero.
    Reserved,
    /// One byte, one parameter.
    Simple { name: String, transform: Transform },
    /// Two bytes, one parameter, `low_bits` data bits per byte.
    TwoByte {
        name: String,
        order: ByteOrder,
        low_bits: u8,
        transform: Transform,
    },
    /// One byte holding several fields, MSB first.
    Packed(Vec<PackedField>),
    /// `len` characters of `width` bytes each.
    Text {
        key: String,
        len: usize,
        width: u8,
        order: ByteOrder,
    },
}

impl SchemaEntry {
    /// Payload bytes consumed by this slot.
    pub fn width(&self) -> usize {
        match self {
            SchemaEntry::Reserved | SchemaEntry::Simple { .. } | SchemaEntry::Packed(_) => 1,
            SchemaEntry::TwoByte { .. } => 2,
            SchemaEntry::Text { len, width, .. } => len * *width as usize,
        }
    }

    /// Whether this slot carries `name` (a parameter, sub-field or text key).
    pub fn carries(&self, name: &str) -> bool {
        match self {
            SchemaEntry::Reserved => false,
            SchemaEntry::Simple { name: n, .. } | SchemaEntry::TwoByte { name: n, .. } => {
                n == name
            }
            SchemaEntry::Packed(fields) => fields.iter().any(|f| f.name.as_deref() == Some(name)),
            SchemaEntry::Text { key, .. } => key == name,
        }
    }

    /// Table key of a table-mapped slot.
    pub fn table_key(&self) -> Option<&str> {
        match self {
            SchemaEntry::Simple {
                transform: Transform::Table(key),
                ..
            }
            | SchemaEntry::TwoByte {
                transform: Transform::Table(key),
                ..
            } => Some(key),
            _ => None,
        }
    }

    /// Parameter names and text key carried by this slot.
    pub fn names(&self) -> Vec<&str> {
        match self {
            SchemaEntry::Reserved => Vec::new(),
            SchemaEntry::Simple { name, .. } | SchemaEntry::TwoByte { name, .. } => {
                vec![name.as_str()]
            }
            SchemaEntry::Packed(fields) => fields.iter().filter_map(|f| f.name.as_deref()).collect(),
            SchemaEntry::Text { key, .. } => vec![key.as_str()],
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidSchema(msg));
        match self {
            SchemaEntry::TwoByte {
                name,
                low_bits,
                transform,
                ..
            } => {
                if !(1..=7).contains(low_bits) {
                    return invalid(format!("'{name}': low_bits must be 1..=7"));
                }
                check_transform(name, transform, low_bits * 2)
            }
            SchemaEntry::Simple { name, transform } => check_transform(name, transform, 7),
            SchemaEntry::Packed(fields) => {
                let total: u32 = fields.iter().map(|f| f.width as u32).sum();
                if fields.is_empty() || total > 7 || fields.iter().any(|f| f.width == 0) {
                    return invalid(format!("packed byte widths {total} do not fit 7 bits"));
                }
                Ok(())
            }
            SchemaEntry::Text { key, width, .. } => {
                if !(1..=2).contains(width) {
                    return invalid(format!("text '{key}': width must be 1 or 2"));
                }
                Ok(())
            }
            SchemaEntry::Reserved => Ok(()),
        }
    }
}

fn check_transform(name: &str, transform: &Transform, data_bits: u8) -> Result<()> {
    match transform {
        Transform::Scale { step, .. } if *step <= 0 => Err(Error::InvalidSchema(format!(
            "'{name}': scale step must be positive"
        ))),
        Transform::TwosComplement { bits } if *bits < 2 || *bits > data_bits => Err(
            Error::InvalidSchema(format!("'{name}': {bits}-bit value does not fit the slot")),
        ),
        _ => Ok(()),
    }
}

/// Raw capacity of a slot holding `data_bits` bits.
#[inline]
pub(crate) fn raw_max(data_bits: u8) -> i32 {
    (1i32 << data_bits) - 1
}

/// Ordered slot table for one message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
    offsets: Vec<usize>,
    byte_len: usize,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Validate entries and compute byte offsets.
    pub fn new(entries: Vec<SchemaEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut offsets = Vec::with_capacity(entries.len());
        let mut offset = 0;
        for entry in &entries {
            entry.validate()?;
            for name in entry.names() {
                if !seen.insert(name) {
                    return Err(Error::InvalidSchema(format!("'{name}' appears twice")));
                }
            }
            offsets.push(offset);
            offset += entry.width();
        }
        Ok(Self {
            entries,
            offsets,
            byte_len: offset,
        })
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Payload length this schema describes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Byte offset of the slot at `index`.
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Slot covering payload byte `offset`, with the slot's start offset.
    pub fn slot_at(&self, offset: usize) -> Option<(&SchemaEntry, usize)> {
        if offset >= self.byte_len {
            return None;
        }
        let i = self.offsets.partition_point(|&o| o <= offset) - 1;
        Some((&self.entries[i], self.offsets[i]))
    }

    /// Slot carrying `name`, with its start offset.
    pub fn find(&self, name: &str) -> Option<(&SchemaEntry, usize)> {
        self.entries
            .iter()
            .zip(self.offsets.iter())
            .find(|(e, _)| e.carries(name))
            .map(|(e, &o)| (e, o))
    }

    /// Every parameter name with the logical range its slot can carry.
    pub fn natural_ranges(&self) -> Vec<(String, i32, i32)> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                SchemaEntry::Simple { name, transform } => {
                    let (min, max) = transform.natural_range(raw_max(7));
                    out.push((name.clone(), min, max));
                }
                SchemaEntry::TwoByte {
                    name,
                    low_bits,
                    transform,
                    ..
                } => {
                    let (min, max) = transform.natural_range(raw_max(low_bits * 2));
                    out.push((name.clone(), min, max));
                }
                SchemaEntry::Packed(fields) => {
                    for f in fields {
                        if let Some(name) = &f.name {
                            out.push((name.clone(), 0, raw_max(f.width)));
                        }
                    }
                }
                SchemaEntry::Reserved | SchemaEntry::Text { .. } => {}
            }
        }
        out
    }

    /// Text keys with their character counts.
    pub fn text_fields(&self) -> Vec<(String, usize)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                SchemaEntry::Text { key, len, .. } => Some((key.clone(), *len)),
                _ => None,
            })
            .collect()
    }

    /// Names of every parameter and text key, in slot order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().flat_map(|e| e.names())
    }
}

/// Fluent builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entries: Vec<SchemaEntry>,
}

impl SchemaBuilder {
    /// `count` unused bytes.
    pub fn reserved(mut self, count: usize) -> Self {
        self.entries
            .extend(std::iter::repeat(SchemaEntry::Reserved).take(count));
        self
    }

    pub fn simple(self, name: impl Into<String>) -> Self {
        self.mapped(name, Transform::Identity)
    }

    pub fn mapped(mut self, name: impl Into<String>, transform: Transform) -> Self {
        self.entries.push(SchemaEntry::Simple {
            name: name.into(),
            transform,
        });
        self
    }

    /// Two 7-bit bytes.
    pub fn two_byte(mut self, name: impl Into<String>, order: ByteOrder, transform: Transform) -> Self {
        self.entries.push(SchemaEntry::TwoByte {
            name: name.into(),
            order,
            low_bits: 7,
            transform,
        });
        self
    }

    /// Two bytes split as `MSB << 4 | LSB`.
    pub fn nibbles(mut self, name: impl Into<String>) -> Self {
        self.entries.push(SchemaEntry::TwoByte {
            name: name.into(),
            order: ByteOrder::MsbFirst,
            low_bits: 4,
            transform: Transform::Identity,
        });
        self
    }

    pub fn packed(mut self, fields: impl IntoIterator<Item = PackedField>) -> Self {
        self.entries
            .push(SchemaEntry::Packed(fields.into_iter().collect()));
        self
    }

    /// `len` single-byte characters.
    pub fn text(mut self, key: impl Into<String>, len: usize) -> Self {
        self.entries.push(SchemaEntry::Text {
            key: key.into(),
            len,
            width: 1,
            order: ByteOrder::MsbFirst,
        });
        self
    }

    /// `len` characters of two bytes each.
    pub fn wide_text(mut self, key: impl Into<String>, len: usize, order: ByteOrder) -> Self {
        self.entries.push(SchemaEntry::Text {
            key: key.into(),
            len,
            width: 2,
            order,
        });
        self
    }

    pub fn entry(mut self, entry: SchemaEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> Result<Schema> {
        Schema::new(self.entries)
    }
}
