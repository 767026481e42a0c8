//! Roland JV-80 / JV-880 single patches.
//!
//! A patch is five messages: the common block (name and effects) followed by
//! four tone blocks at consecutive addresses. Checksums are Roland's
//! negated sum over address and data, and five tone fields are split across
//! two bytes as `MSB << 4 | LSB`.

use patchwire_core::{ParameterSet, Schema, SchemaBuilder, PATCH_NAME};
use patchwire_sysex::prelude::*;
use patchwire_sysex::{BankSelect, Result};

pub const NAME: &str = "Roland JV-880";

/// Tones per patch.
pub const TONES: usize = 4;

/// Patch common parameters after the 12 name characters.
const COMMON_PARAMETERS: [&str; 22] = [
    "velocityswitch",
    "reverbtype",
    "reverblevel",
    "reverbtime",
    "reverbfeedback",
    "chorustype",
    "choruslevel",
    "chorusdepth",
    "chorusrate",
    "chorusfeedback",
    "chorusoutput",
    "analogfeel",
    "patchlevel",
    "patchpanning",
    "bendrangedown",
    "bendrangeup",
    "keyassign",
    "sololegato",
    "portamentoswitch",
    "portamentomode",
    "portamentotype",
    "portamentotime",
];

/// Tone parameters in wire order.
const TONE_PARAMETERS: [&str; 111] = [
    "wavegroup",
    "wavenumber",
    "toneswitch",
    "fxmswitch",
    "fxmdepth",
    "velocityrangelower",
    "velocityrangeupper",
    "volumeswitch",
    "hold1switch",
    "modulationdestination1",
    "modulationsense1",
    "modulationdestination2",
    "modulationsense2",
    "modulationdestination3",
    "modulationsense3",
    "modulationdestination4",
    "modulationsense4",
    "aftertouchdestination1",
    "aftertouchsense1",
    "aftertouchdestination2",
    "aftertouchsense2",
    "aftertouchdestination3",
    "aftertouchsense3",
    "aftertouchdestination4",
    "aftertouchsense4",
    "expressiondestination1",
    "expressionsense1",
    "expressiondestination2",
    "expressionsense2",
    "expressiondestination3",
    "expressionsense3",
    "expressiondestination4",
    "expressionsense4",
    "lfo1form",
    "lfo1offset",
    "lfo1synchro",
    "lfo1rate",
    "lfo1delay",
    "lfo1fadepolarity",
    "lfo1fadetime",
    "lfo1pitchdepth",
    "lfo1tvfdepth",
    "lfo1tvadepth",
    "lfo2form",
    "lfo2offset",
    "lfo2synchro",
    "lfo2rate",
    "lfo2delay",
    "lfo2fadepolarity",
    "lfo2fadetime",
    "lfo2pitchdepth",
    "lfo2tvfdepth",
    "lfo2tvadepth",
    "pitchcoarse",
    "pitchfine",
    "randompitchdepth",
    "pitchkeyfollow",
    "penvvelocitylevelsense",
    "penvvelocityontimesense",
    "penvvelocityofftimesense",
    "penvtimekeyfollow",
    "penvdepth",
    "penvtime1",
    "penvlevel1",
    "penvtime2",
    "penvlevel2",
    "penvtime3",
    "penvlevel3",
    "penvtime4",
    "penvlevel4",
    "filtermode",
    "cutofffrequency",
    "resonance",
    "resonancemode",
    "cutoffkeyfollow",
    "tvfenvvelocitycurve",
    "tvfenvvelocitylevelsense",
    "tvfenvvelocityontimesense",
    "tvfenvvelocityofftimesense",
    "tvfenvtimekeyfollow",
    "tvfenvdepth",
    "tvfenvtime1",
    "tvfenvlevel1",
    "tvfenvtime2",
    "tvfenvlevel2",
    "tvfenvtime3",
    "tvfenvlevel3",
    "tvfenvtime4",
    "tvfenvlevel4",
    "level",
    "levelkeyfollow",
    "pan",
    "panningkeyfollow",
    "tonedelaymode",
    "tonedelaytime",
    "tvaenvvelocitycurve",
    "tvaenvvelocitylevelsense",
    "tvaenvvelocityontimesense",
    "tvaenvvelocityofftimesense",
    "tvaenvtimekeyfollow",
    "tvaenvtime1",
    "tvaenvlevel1",
    "tvaenvtime2",
    "tvaenvlevel2",
    "tvaenvtime3",
    "tvaenvlevel3",
    "tvaenvtime4",
    "drylevel",
    "reverbsendlevel",
    "chorussendlevel",
    "outputselect",
];

/// Tone fields sent as two nibble-split bytes.
const NIBBLE_PARAMETERS: [&str; 5] = ["wavenumber", "lfo1delay", "lfo2delay", "pan", "tonedelaytime"];

const COMMON_RANGES: &[(&str, i32, i32)] = &[
    ("velocityswitch", 0, 1),
    ("reverbtype", 0, 7),
    ("chorustype", 0, 2),
    ("chorusoutput", 0, 1),
    ("bendrangedown", 16, 64),
    ("bendrangeup", 0, 12),
    ("keyassign", 0, 1),
    ("sololegato", 0, 1),
    ("portamentoswitch", 0, 1),
    ("portamentomode", 0, 1),
    ("portamentotype", 0, 1),
];

const TONE_RANGES: &[(&str, i32, i32)] = &[
    ("wavegroup", 0, 2),
    ("toneswitch", 0, 1),
    ("fxmswitch", 0, 1),
    ("fxmdepth", 0, 15),
    ("volumeswitch", 0, 1),
    ("hold1switch", 0, 1),
    ("lfo1form", 0, 5),
    ("lfo1offset", 0, 4),
    ("lfo1synchro", 0, 1),
    ("lfo1delay", 0, 128),
    ("lfo1fadepolarity", 0, 1),
    ("lfo1pitchdepth", 4, 124),
    ("lfo1tvfdepth", 1, 127),
    ("lfo1tvadepth", 1, 127),
    ("lfo2form", 0, 5),
    ("lfo2offset", 0, 4),
    ("lfo2synchro", 0, 1),
    ("lfo2delay", 0, 128),
    ("lfo2fadepolarity", 0, 1),
    ("lfo2pitchdepth", 4, 124),
    ("lfo2tvfdepth", 1, 127),
    ("lfo2tvadepth", 1, 127),
    ("pitchcoarse", 16, 112),
    ("pitchfine", 14, 114),
    ("randompitchdepth", 0, 15),
    ("pitchkeyfollow", 0, 15),
    ("penvvelocitylevelsense", 1, 127),
    ("penvvelocityontimesense", 0, 14),
    ("penvvelocityofftimesense", 0, 14),
    ("penvtimekeyfollow", 0, 14),
    ("penvdepth", 52, 76),
    ("penvlevel1", 1, 127),
    ("penvlevel2", 1, 127),
    ("penvlevel3", 1, 127),
    ("penvlevel4", 1, 127),
    ("filtermode", 0, 2),
    ("resonancemode", 0, 1),
    ("cutoffkeyfollow", 0, 15),
    ("tvfenvvelocitycurve", 0, 6),
    ("tvfenvvelocitylevelsense", 1, 127),
    ("tvfenvvelocityontimesense", 0, 14),
    ("tvfenvvelocityofftimesense", 0, 14),
    ("tvfenvtimekeyfollow", 0, 14),
    ("tvfenvdepth", 1, 127),
    ("levelkeyfollow", 0, 14),
    ("pan", 0, 128),
    ("panningkeyfollow", 0, 14),
    ("tonedelaymode", 0, 2),
    ("tonedelaytime", 0, 128),
    ("tvaenvvelocitycurve", 0, 6),
    ("tvaenvvelocitylevelsense", 1, 127),
    ("tvaenvvelocityontimesense", 0, 14),
    ("tvaenvvelocityofftimesense", 0, 14),
    ("tvaenvtimekeyfollow", 0, 14),
    ("outputselect", 0, 1),
];

/// Parameter name of `param` in tone `tone` (1-based).
pub fn tone_parameter(tone: usize, param: &str) -> String {
    format!("tone{tone}{param}")
}

fn common_schema() -> Result<Schema> {
    let schema = COMMON_PARAMETERS
        .iter()
        .fold(Schema::builder().text(PATCH_NAME, 12), |b, name| b.simple(*name))
        .build()?;
    Ok(schema)
}

fn tone_schema(tone: usize) -> Result<Schema> {
    let schema = TONE_PARAMETERS
        .iter()
        .fold(SchemaBuilder::default(), |b, param| {
            let name = tone_parameter(tone, param);
            if NIBBLE_PARAMETERS.contains(param) {
                b.nibbles(name)
            } else {
                b.simple(name)
            }
        })
        .build()?;
    Ok(schema)
}

fn parameters(common: &Schema, tones: &[Schema]) -> Result<ParameterSet> {
    let mut builder = tones
        .iter()
        .fold(ParameterSet::builder().schema(common), |b, s| b.schema(s));
    for &(name, min, max) in COMMON_RANGES {
        builder = builder.range(name, min, max);
    }
    for tone in 1..=TONES {
        for &(param, min, max) in TONE_RANGES {
            builder = builder.range(tone_parameter(tone, param), min, max);
        }
    }
    Ok(builder.build()?)
}

/// Profile for the JV-80 and JV-880.
pub fn profile() -> Result<DeviceProfile> {
    let common = common_schema()?;
    let tones = (1..=TONES).map(tone_schema).collect::<Result<Vec<_>>>()?;
    let parameters = parameters(&common, &tones)?;

    let mut builder = DeviceProfile::builder(NAME)
        .header(Header::new([
            HeaderByte::Fixed(0x41),
            HeaderByte::DeviceId,
            HeaderByte::Fixed(0x46),
            HeaderByte::Command,
        ]))
        .commands(0x12, 0x11, 0x12)
        // Ids 17..32 on the panel are 16..31 on the wire
        .device_ids(DeviceIdRange::new(17, 32, -1))
        .addressing(AddressScheme::new(
            Address::new(&[0x00, 0x08, 0x20, 0x00]),
            StoredAddress::Fields {
                template: Address::new(&[0x00, 0x00, 0x20, 0x00]),
                bank_at: 0,
                // Preset A and B cannot be written
                bank_codes: vec![Some(0x01), Some(0x02), None, None],
                number_at: 1,
                number_base: 0x40,
            },
        ))
        .block(common, &[0, 0, 0, 0]);
    for (i, tone) in tones.into_iter().enumerate() {
        builder = builder.block(tone, &[0, 0, 0x08 + i as u8, 0]);
    }

    builder
        .checksum(
            ChecksumSpec::new(
                ChecksumPolicy::new(ChecksumKind::SumNegate),
                ChecksumSpan::FromAddress,
            )
            .on(&[MessageKind::Dump, MessageKind::Request, MessageKind::Parameter]),
        )
        // Request size 00 00 0C 00 covers all five blocks
        .request_suffix(&[0x00, 0x00, 0x0C, 0x00])
        .parameter_addressing(ParamAddressing::BlockOffset)
        .parameters(parameters)
        .patch_change(
            PatchChangeMap::new()
                .bank(BankSelect::Controller { cc: 0, value: 80 }, 0)
                .bank(BankSelect::Controller { cc: 0, value: 80 }, 64)
                .bank(BankSelect::Controller { cc: 0, value: 81 }, 0)
                .bank(BankSelect::Controller { cc: 0, value: 81 }, 64),
        )
        .timing(
            TimingHints::new()
                .after_patch_change(700)
                .after_dump(300),
        )
        .locations(
            LocationSpace::new(64)
                .bank("Internal", true)
                .bank("Card", true)
                .bank("Preset A", false)
                .bank("Preset B", false)
                .numbering(1, 2, " "),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        let p = profile().unwrap();
        assert_eq!(p.block_count(), 5);
        assert_eq!(p.blocks()[0].schema.byte_len(), 34);
        for block in &p.blocks()[1..] {
            assert_eq!(block.schema.byte_len(), 116);
        }
        assert_eq!(p.dump_message_len(0), Some(45));
        assert_eq!(p.dump_message_len(1), Some(127));
        assert_eq!(p.dump_len(), 553);
    }

    #[test]
    fn test_tone_addresses() {
        let p = profile().unwrap();
        let deltas: Vec<&[u8]> = p.blocks().iter().map(|b| b.address_delta.as_bytes()).collect();
        assert_eq!(deltas[0], &[0, 0, 0, 0]);
        assert_eq!(deltas[1], &[0, 0, 0x08, 0]);
        assert_eq!(deltas[4], &[0, 0, 0x0B, 0]);
    }

    #[test]
    fn test_ranges() {
        let p = profile().unwrap();
        let params = p.parameters();
        let bend = params.spec("bendrangedown").unwrap();
        assert_eq!((bend.min, bend.max, bend.default), (16, 64, 16));
        let pan = params.spec("tone3pan").unwrap();
        assert_eq!((pan.min, pan.max), (0, 128));
        let wave = params.spec("tone1wavenumber").unwrap();
        assert_eq!((wave.min, wave.max), (0, 255));
        assert!(params.text(PATCH_NAME).is_some_and(|t| t.len == 12));
    }

    #[test]
    fn test_nibble_slot_offsets() {
        let p = profile().unwrap();
        let (block, _, offset) = p.find_slot("tone2pan").unwrap();
        assert_eq!(block, 2);
        // 88 single-byte slots and three nibble pairs come first
        assert_eq!(offset, 0x5E);
    }
}
