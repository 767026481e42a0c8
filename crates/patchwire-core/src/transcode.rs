//! Schema-driven payload encode/decode.
//!
//! Decoding walks the schema in slot order and writes each slot into a staged
//! copy of the model; the caller's model is only replaced once the whole
//! payload decoded. Table-mapped slots are decoded after every other slot so a
//! [`TableResolver`] sees the mode parameters carried by the same payload, and
//! gets a chance to [`infer`](TableResolver::infer) modes from the raw codes.

use crate::bits::{join_value, pack_fields, split_value, unpack_fields};
use crate::error::{Error, Result, Warning};
use crate::parameter::{sanitize_char, ParameterModel, ParameterSet};
use crate::schema::{raw_max, ByteOrder, Schema, SchemaEntry, Transform};
use crate::table::TableResolver;
use std::sync::Arc;
use tracing::warn;

/// Encoder/decoder for one schema against a device's tables.
#[derive(Clone, Copy)]
pub struct Transcoder<'a> {
    schema: &'a Schema,
    tables: &'a dyn TableResolver,
}

impl<'a> Transcoder<'a> {
    pub fn new(schema: &'a Schema, tables: &'a dyn TableResolver) -> Self {
        Self { schema, tables }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Decode a payload into a fresh model built from `params`.
    pub fn decode(
        &self,
        params: Arc<ParameterSet>,
        payload: &[u8],
    ) -> Result<(ParameterModel, Vec<Warning>)> {
        let mut model = ParameterModel::new(params);
        let warnings = self.decode_into(payload, &mut model)?;
        Ok((model, warnings))
    }

    /// Decode a payload into `model`. On error `model` is left untouched.
    pub fn decode_into(&self, payload: &[u8], model: &mut ParameterModel) -> Result<Vec<Warning>> {
        let expected = self.schema.byte_len();
        if payload.len() != expected {
            return Err(Error::SchemaMismatch {
                expected,
                actual: payload.len(),
            });
        }

        let mut staged = model.clone();
        let mut warnings = Vec::new();
        let slots = || {
            self.schema
                .entries()
                .iter()
                .enumerate()
                .filter_map(|(i, e)| self.schema.offset_of(i).map(|o| (e, o)))
        };

        for (entry, offset) in slots().filter(|(e, _)| e.table_key().is_none()) {
            let bytes = &payload[offset..offset + entry.width()];
            self.decode_slot(entry, bytes, &mut staged, &mut warnings)?;
        }
        let codes: Vec<(&str, i32)> = slots()
            .filter_map(|(e, o)| Some((e.table_key()?, raw_code(e, &payload[o..o + e.width()])?)))
            .collect();
        if !codes.is_empty() {
            self.tables.infer(&codes, &mut staged);
        }
        for (entry, offset) in slots().filter(|(e, _)| e.table_key().is_some()) {
            let bytes = &payload[offset..offset + entry.width()];
            self.decode_slot(entry, bytes, &mut staged, &mut warnings)?;
        }

        *model = staged;
        Ok(warnings)
    }

    /// Decode the bytes of a single slot into `model`.
    pub fn decode_slot(
        &self,
        entry: &SchemaEntry,
        bytes: &[u8],
        model: &mut ParameterModel,
        warnings: &mut Vec<Warning>,
    ) -> Result<()> {
        if bytes.len() != entry.width() {
            return Err(Error::SchemaMismatch {
                expected: entry.width(),
                actual: bytes.len(),
            });
        }
        match entry {
            SchemaEntry::Reserved => {}
            SchemaEntry::Simple { name, transform } => {
                let raw = raw_code(entry, bytes).unwrap_or_default();
                let value = self.decode_value(name, transform, raw, model, warnings)?;
                model.set(name, value)?;
            }
            SchemaEntry::TwoByte {
                name,
                order,
                low_bits,
                transform,
            } => {
                let [msb, lsb] = order.read(bytes[0], bytes[1]);
                let raw = join_value(msb, lsb, *low_bits) as i32;
                let value = self.decode_value(name, transform, raw, model, warnings)?;
                model.set(name, value)?;
            }
            SchemaEntry::Packed(fields) => {
                let widths: Vec<u8> = fields.iter().map(|f| f.width).collect();
                let values = unpack_fields(bytes[0] & 0x7F, &widths);
                for (field, value) in fields.iter().zip(values) {
                    if let Some(name) = &field.name {
                        model.set(name, value as i32)?;
                    }
                }
            }
            SchemaEntry::Text {
                key, width, order, ..
            } => {
                model.set_text(key, &decode_text(bytes, *width, *order))?;
            }
        }
        Ok(())
    }

    /// Encode `model` into a payload of exactly `schema.byte_len()` bytes.
    pub fn encode(&self, model: &ParameterModel) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.schema.byte_len());
        for entry in self.schema.entries() {
            self.encode_slot_into(entry, model, &mut out)?;
        }
        debug_assert_eq!(out.len(), self.schema.byte_len());
        Ok(out)
    }

    /// Encode one slot.
    pub fn encode_slot(&self, entry: &SchemaEntry, model: &ParameterModel) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(entry.width());
        self.encode_slot_into(entry, model, &mut out)?;
        Ok(out)
    }

    fn encode_slot_into(
        &self,
        entry: &SchemaEntry,
        model: &ParameterModel,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        match entry {
            SchemaEntry::Reserved => out.push(0),
            SchemaEntry::Simple { name, transform } => {
                let raw = self.encode_value(name, transform, model)?;
                out.push(raw.clamp(0, raw_max(7)) as u8);
            }
            SchemaEntry::TwoByte {
                name,
                order,
                low_bits,
                transform,
            } => {
                let raw = self.encode_value(name, transform, model)?;
                let raw = raw.clamp(0, raw_max(low_bits * 2)) as u16;
                out.extend_from_slice(&order.arrange(split_value(raw, *low_bits)));
            }
            SchemaEntry::Packed(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                let mut widths = Vec::with_capacity(fields.len());
                for field in fields {
                    let value = match &field.name {
                        Some(name) => model.value(name)?.clamp(0, raw_max(field.width)),
                        None => 0,
                    };
                    values.push(value as u8);
                    widths.push(field.width);
                }
                out.push(pack_fields(&values, &widths));
            }
            SchemaEntry::Text {
                key,
                len,
                width,
                order,
            } => {
                let text = model
                    .text(key)
                    .ok_or_else(|| Error::UnknownParameter(key.clone()))?;
                let padded = text.chars().chain(std::iter::repeat(' ')).take(*len);
                for c in padded {
                    let code = sanitize_char(c) as u8;
                    if *width == 1 {
                        out.push(code);
                    } else {
                        out.extend_from_slice(&order.arrange(split_value(code as u16, 7)));
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_value(
        &self,
        name: &str,
        transform: &Transform,
        raw: i32,
        model: &ParameterModel,
        warnings: &mut Vec<Warning>,
    ) -> Result<i32> {
        let Transform::Table(key) = transform else {
            return Ok(transform.decode(raw));
        };
        let table = self
            .tables
            .resolve(key, model)
            .ok_or_else(|| Error::UnknownTable(key.clone()))?;
        match table.index_of(raw) {
            Some(index) => Ok(index as i32),
            None => {
                warn!("Unknown code {} for '{}' in table '{}', using index 0", raw, name, key);
                warnings.push(Warning::UnknownTableCode {
                    parameter: name.to_string(),
                    code: raw,
                });
                Ok(0)
            }
        }
    }

    fn encode_value(&self, name: &str, transform: &Transform, model: &ParameterModel) -> Result<i32> {
        let value = model.value(name)?;
        let Transform::Table(key) = transform else {
            return Ok(transform.encode(value));
        };
        let table = self
            .tables
            .resolve(key, model)
            .ok_or_else(|| Error::UnknownTable(key.clone()))?;
        let last = table.len().saturating_sub(1);
        let index = (value.max(0) as usize).min(last);
        table
            .code(index)
            .ok_or_else(|| Error::UnknownTable(key.clone()))
    }
}

/// Raw wire value of a one- or two-byte slot.
fn raw_code(entry: &SchemaEntry, bytes: &[u8]) -> Option<i32> {
    match (entry, bytes) {
        (SchemaEntry::Simple { .. }, [b]) => Some((b & 0x7F) as i32),
        (SchemaEntry::TwoByte { order, low_bits, .. }, [a, b]) => {
            let [msb, lsb] = order.read(*a, *b);
            Some(join_value(msb, lsb, *low_bits) as i32)
        }
        _ => None,
    }
}

/// Decode characters of `width` bytes each; anything non-printable becomes a space.
pub fn decode_text(bytes: &[u8], width: u8, order: ByteOrder) -> String {
    bytes
        .chunks(width.max(1) as usize)
        .map(|c| decode_char(c, order))
        .collect()
}

fn decode_char(bytes: &[u8], order: ByteOrder) -> char {
    let code = match *bytes {
        [a] => a as u32,
        [a, b] => {
            let [msb, lsb] = order.read(a, b);
            join_value(msb, lsb, 7) as u32
        }
        _ => b' ' as u32,
    };
    char::from_u32(code).map(sanitize_char).unwrap_or(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PackedField;
    use crate::table::{LookupTable, StaticTables};

    fn three_slot() -> Schema {
        Schema::builder()
            .simple("a")
            .packed([
                PackedField::new("b", 3),
                PackedField::new("c", 1),
                PackedField::new("d", 3),
            ])
            .two_byte("e", ByteOrder::MsbFirst, Transform::Offset(8192))
            .build()
            .unwrap()
    }

    fn params_for(schema: &Schema) -> Arc<ParameterSet> {
        Arc::new(ParameterSet::builder().schema(schema).build().unwrap())
    }

    #[test]
    fn test_three_slot_decode() {
        let schema = three_slot();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        let (model, warnings) = t
            .decode(params_for(&schema), &[5, 0b1011010, 0x10, 0x20])
            .unwrap();

        assert!(warnings.is_empty());
        assert_eq!(model.get("a"), Some(5));
        assert_eq!(model.get("b"), Some(0b101));
        assert_eq!(model.get("c"), Some(1));
        assert_eq!(model.get("d"), Some(0b010));
        assert_eq!(model.get("e"), Some((0x10 * 128 + 0x20) - 8192));
        assert_eq!(model.get("e"), Some(-6112));
    }

    #[test]
    fn test_three_slot_encode() {
        let schema = three_slot();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        let (model, _) = t
            .decode(params_for(&schema), &[5, 0b1011010, 0x10, 0x20])
            .unwrap();
        assert_eq!(t.encode(&model).unwrap(), vec![5, 0b1011010, 0x10, 0x20]);
    }

    #[test]
    fn test_length_mismatch_leaves_model() {
        let schema = three_slot();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        let mut model = ParameterModel::new(params_for(&schema));
        model.set("a", 42).unwrap();

        let err = t.decode_into(&[1, 2, 3], &mut model).unwrap_err();
        assert_eq!(
            err,
            Error::SchemaMismatch {
                expected: 4,
                actual: 3
            }
        );
        assert_eq!(model.get("a"), Some(42));
    }

    #[test]
    fn test_lsb_first_twos_complement() {
        let schema = Schema::builder()
            .two_byte("v", ByteOrder::LsbFirst, Transform::TwosComplement { bits: 14 })
            .build()
            .unwrap();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        // 16383 = -1, sent low byte first
        let (model, _) = t.decode(params_for(&schema), &[0x7F, 0x7F]).unwrap();
        assert_eq!(model.get("v"), Some(-1));

        let mut model = model;
        model.set("v", 200).unwrap();
        assert_eq!(t.encode(&model).unwrap(), vec![200 & 0x7F, 200 >> 7]);
    }

    #[test]
    fn test_nibble_split() {
        let schema = Schema::builder().nibbles("wave").build().unwrap();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        let (model, _) = t.decode(params_for(&schema), &[0x0F, 0x03]).unwrap();
        assert_eq!(model.get("wave"), Some(0xF3));
        assert_eq!(t.encode(&model).unwrap(), vec![0x0F, 0x03]);
    }

    #[test]
    fn test_table_unknown_code_falls_back() {
        let schema = Schema::builder()
            .mapped("dest", Transform::table("dest"))
            .build()
            .unwrap();
        let tables = StaticTables::new().with("dest", LookupTable::new([0, 1, 2, 28, 29]).unwrap());
        let t = Transcoder::new(&schema, &tables);
        let params = Arc::new(
            ParameterSet::builder()
                .schema(&schema)
                .range("dest", 0, 4)
                .build()
                .unwrap(),
        );

        let (model, warnings) = t.decode(params.clone(), &[28]).unwrap();
        assert_eq!(model.get("dest"), Some(3));
        assert!(warnings.is_empty());

        let (model, warnings) = t.decode(params, &[27]).unwrap();
        assert_eq!(model.get("dest"), Some(0));
        assert_eq!(
            warnings,
            vec![Warning::UnknownTableCode {
                parameter: "dest".into(),
                code: 27
            }]
        );
        assert_eq!(t.encode(&model).unwrap(), vec![0]);
    }

    struct ModeTables {
        banks: [LookupTable; 2],
    }

    impl TableResolver for ModeTables {
        fn resolve(&self, _key: &str, model: &ParameterModel) -> Option<&LookupTable> {
            self.banks.get(model.get("mode")? as usize)
        }

        fn infer(&self, codes: &[(&str, i32)], model: &mut ParameterModel) {
            let Some(&(_, code)) = codes.iter().find(|(_, c)| *c != 0) else {
                return;
            };
            if self.resolve("bank", model).is_some_and(|t| t.index_of(code).is_some()) {
                return;
            }
            if let Some(mode) = self.banks.iter().position(|t| t.index_of(code).is_some()) {
                let _ = model.set("mode", mode as i32);
            }
        }
    }

    fn mode_setup() -> (Schema, ModeTables, Arc<ParameterSet>) {
        let schema = Schema::builder()
            .two_byte("sound", ByteOrder::MsbFirst, Transform::table("bank"))
            .build()
            .unwrap();
        let tables = ModeTables {
            banks: [
                LookupTable::new([0, 10, 11]).unwrap(),
                LookupTable::new([0, 300, 301, 302]).unwrap(),
            ],
        };
        let params = Arc::new(
            ParameterSet::builder()
                .schema(&schema)
                .hidden("mode", 0, 1)
                .range("sound", 0, 3)
                .max_by("sound", "mode", [2, 3])
                .build()
                .unwrap(),
        );
        (schema, tables, params)
    }

    #[test]
    fn test_mode_inferred_from_codes() {
        let (schema, tables, params) = mode_setup();
        let t = Transcoder::new(&schema, &tables);

        // 302 = [0x02, 0x2E]; only the second bank knows it
        let (model, warnings) = t.decode(params.clone(), &[0x02, 0x2E]).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(model.get("mode"), Some(1));
        assert_eq!(model.get("sound"), Some(3));

        let (model, _) = t.decode(params, &[0x00, 0x0B]).unwrap();
        assert_eq!(model.get("mode"), Some(0));
        assert_eq!(model.get("sound"), Some(2));
    }

    #[test]
    fn test_mode_bounds_keep_encode_exact() {
        let (schema, tables, params) = mode_setup();
        let t = Transcoder::new(&schema, &tables);
        for mode in 0..=1 {
            for sound in 0..=3 {
                let mut model = ParameterModel::new(params.clone());
                model.set("mode", mode).unwrap();
                let stored = model.set("sound", sound).unwrap();
                assert!(stored <= [2, 3][mode as usize]);

                // "none" (code 0) carries no mode, so the receiver starts in the same one
                let mut back = ParameterModel::new(params.clone());
                back.set("mode", mode).unwrap();
                t.decode_into(&t.encode(&model).unwrap(), &mut back).unwrap();
                assert_eq!(back, model);
            }
        }
    }

    #[test]
    fn test_missing_table_is_error() {
        let schema = Schema::builder()
            .mapped("dest", Transform::table("nope"))
            .build()
            .unwrap();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        let result = t.decode(params_for(&schema), &[0]);
        assert_eq!(result.unwrap_err(), Error::UnknownTable("nope".into()));
    }

    #[test]
    fn test_text_slots() {
        let schema = Schema::builder()
            .text("name", 6)
            .wide_text("alt", 2, ByteOrder::LsbFirst)
            .build()
            .unwrap();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        let payload = [b'P', b'a', b'd', b' ', b' ', b' ', b'O', 0, b'K', 0];
        let (model, _) = t.decode(params_for(&schema), &payload).unwrap();
        assert_eq!(model.name(), Some("Pad"));
        assert_eq!(model.text("alt"), Some("OK"));
        assert_eq!(t.encode(&model).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_encode_clamps_raw() {
        let schema = Schema::builder()
            .mapped("octave", Transform::Scale { offset: 16, step: 12 })
            .build()
            .unwrap();
        let tables = StaticTables::new();
        let t = Transcoder::new(&schema, &tables);
        // declared wider than the byte can carry
        let params = Arc::new(
            ParameterSet::builder()
                .schema(&schema)
                .range("octave", 0, 20)
                .build()
                .unwrap(),
        );
        let mut model = ParameterModel::new(params);
        model.set("octave", 20).unwrap();
        assert_eq!(t.encode(&model).unwrap(), vec![127]);
        model.set("octave", 2).unwrap();
        assert_eq!(t.encode(&model).unwrap(), vec![40]);
    }
}
