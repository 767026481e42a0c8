//! Waldorf Blofeld single sounds.
//!
//! One 383-byte block per sound. Dumps carry a plain 7-bit sum of the payload,
//! and the Blofeld accepts 0x7F in place of the real checksum. Single
//! parameters are addressed by their byte index in the sound.

use patchwire_core::{PackedField, ParameterSet, Schema, SchemaBuilder, Transform, PATCH_NAME};
use patchwire_sysex::prelude::*;
use patchwire_sysex::Result;

pub const NAME: &str = "Waldorf Blofeld";

/// Payload bytes of one sound.
pub const SOUND_LEN: usize = 383;

const BANKS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

fn oscillator(b: SchemaBuilder, osc: usize) -> SchemaBuilder {
    let p = |name: &str| format!("osc{osc}{name}");
    let b = b
        .mapped(p("octave"), Transform::Scale { offset: 16, step: 12 })
        .simple(p("semitone"))
        .simple(p("detune"))
        .simple(p("bendrange"))
        .simple(p("keytrack"))
        .simple(p("fmsource"))
        .simple(p("fmamount"))
        .simple(p("shape"))
        .simple(p("pulsewidth"))
        .simple(p("pwmsource"))
        .simple(p("pwmamount"));
    // osc 3 has no wavetable options
    let b = if osc == 3 {
        b.reserved(4)
    } else {
        b.reserved(2).simple(p("limitwt")).simple(p("samplebank"))
    };
    b.simple(p("brilliance"))
}

fn filter(b: SchemaBuilder, filter: usize) -> SchemaBuilder {
    let p = |name: &str| format!("filter{filter}{name}");
    b.simple(p("type"))
        .simple(p("cutoff"))
        .reserved(1)
        .simple(p("resonance"))
        .simple(p("drive"))
        .simple(p("drivecurve"))
        .reserved(3)
        .simple(p("keytrack"))
        .simple(p("envamount"))
        .simple(p("envvelocity"))
        .simple(p("modsource"))
        .simple(p("modamount"))
        .simple(p("fmsource"))
        .simple(p("fmamount"))
        .simple(p("pan"))
        .simple(p("pansource"))
        .simple(p("panamount"))
        .reserved(1)
}

fn effect(b: SchemaBuilder, effect: usize) -> SchemaBuilder {
    let b = b
        .simple(format!("effect{effect}type"))
        .simple(format!("effect{effect}mix"));
    (0..14).fold(b, |b, i| b.simple(format!("effect{effect}parameter{i}")))
}

fn lfo(b: SchemaBuilder, lfo: usize) -> SchemaBuilder {
    let p = |name: &str| format!("lfo{lfo}{name}");
    b.simple(p("shape"))
        .simple(p("speed"))
        .reserved(1)
        .simple(p("sync"))
        .simple(p("clocked"))
        .simple(p("startphase"))
        .simple(p("delay"))
        .simple(p("fade"))
        .reserved(2)
        .simple(p("keytrack"))
        .reserved(1)
}

fn envelope(b: SchemaBuilder, env: usize) -> SchemaBuilder {
    let p = |name: &str| format!("envelope{env}{name}");
    b.packed([
        PackedField::new(p("trigger"), 2),
        PackedField::pad(2),
        PackedField::new(p("mode"), 3),
    ])
    .reserved(2)
    .simple(p("attack"))
    .simple(p("attacklevel"))
    .simple(p("decay"))
    .simple(p("sustain"))
    .simple(p("decay2"))
    .simple(p("sustain2"))
    .simple(p("release"))
    .reserved(2)
}

fn arpeggiator(b: SchemaBuilder) -> SchemaBuilder {
    let b = b
        .reserved(2)
        .simple("arpeggiatormode")
        .simple("arpeggiatorpattern")
        .reserved(1)
        .simple("arpeggiatorclock")
        .simple("arpeggiatorlength")
        .simple("arpeggiatoroctave")
        .simple("arpeggiatordirection")
        .simple("arpeggiatorsortorder")
        .simple("arpeggiatorvelocitymode")
        .simple("arpeggiatortimingfactor")
        .reserved(1)
        .simple("arpeggiatorpatternreset")
        .simple("arpeggiatorpatternlength")
        .reserved(2)
        .simple("arpeggiatortempo");
    let b = (1..=16).fold(b, |b, step| {
        b.packed([
            PackedField::new(format!("arp{step:02}step"), 3),
            PackedField::new(format!("arp{step:02}glide"), 1),
            PackedField::new(format!("arp{step:02}accent"), 3),
        ])
    });
    (1..=16).fold(b, |b, step| {
        b.packed([
            PackedField::new(format!("arp{step:02}length"), 3),
            PackedField::pad(1),
            PackedField::new(format!("arp{step:02}timing"), 3),
        ])
    })
}

fn sound_schema() -> Result<Schema> {
    let b = Schema::builder().reserved(1);
    let b = (1..=3).fold(b, oscillator);
    let b = b
        .simple("osc2synctoosc3")
        .simple("oscpitchsource")
        .simple("oscpitchamount")
        .reserved(1)
        .simple("oscglide")
        .reserved(2)
        .simple("oscglidemode")
        .simple("oscgliderate")
        .packed([
            PackedField::new("unisono", 3),
            PackedField::pad(3),
            PackedField::new("oscallocation", 1),
        ])
        .simple("unisonodetune")
        .reserved(1);
    let b = (1..=3).fold(b, |b, osc| {
        b.simple(format!("osc{osc}level"))
            .simple(format!("osc{osc}balance"))
    });
    let b = b
        .simple("noiselevel")
        .simple("noisebalance")
        .simple("noisecolour")
        .reserved(1)
        .simple("ringmodlevel")
        .simple("ringmodbalance")
        .reserved(4);
    let b = (1..=2).fold(b, filter);
    let b = b
        .simple("filterrouting")
        .reserved(3)
        .simple("amplifiervolume")
        .simple("amplifiervelocity")
        .simple("amplifiermodsource")
        .simple("amplifiermodamount")
        .reserved(3);
    let b = (1..=2).fold(b, effect);
    let b = (1..=3).fold(b, lfo);
    let b = (1..=4).fold(b, envelope).reserved(1);
    let b = (1..=4).fold(b, |b, m| {
        b.simple(format!("modifier{m}sourcea"))
            .simple(format!("modifier{m}sourceb"))
            .simple(format!("modifier{m}operation"))
            .simple(format!("modifier{m}constant"))
    });
    let b = (1..=16).fold(b, |b, m| {
        b.simple(format!("modulation{m}source"))
            .simple(format!("modulation{m}destination"))
            .simple(format!("modulation{m}amount"))
    });
    let schema = arpeggiator(b)
        .reserved(4)
        .text(PATCH_NAME, 16)
        .simple("category")
        .reserved(3)
        .build()?;
    Ok(schema)
}

fn parameters(schema: &Schema) -> Result<ParameterSet> {
    let mut builder = ParameterSet::builder()
        .schema(schema)
        .range("unisono", 0, 5)
        .range("oscallocation", 0, 1)
        .range("oscglide", 0, 1)
        .range("osc2synctoosc3", 0, 1)
        .range("filterrouting", 0, 1)
        .range("arpeggiatorpatternreset", 0, 1)
        .range("arpeggiatorpattern", 0, 16)
        .range("arpeggiatorpatternlength", 0, 16)
        .range("arpeggiatorclock", 0, 42)
        .range("arpeggiatorlength", 0, 43)
        .range("arpeggiatoroctave", 0, 9);
    for osc in 1..=3 {
        builder = builder
            .range(format!("osc{osc}octave"), 0, 8)
            .range(format!("osc{osc}semitone"), 52, 76)
            .range(format!("osc{osc}bendrange"), 40, 88);
    }
    for osc in 1..=2 {
        builder = builder.range(format!("osc{osc}limitwt"), 0, 1);
    }
    for lfo in 1..=3 {
        builder = builder
            .range(format!("lfo{lfo}sync"), 0, 1)
            .range(format!("lfo{lfo}clocked"), 0, 1);
    }
    for env in 1..=4 {
        builder = builder
            .range(format!("envelope{env}trigger"), 0, 1)
            .range(format!("envelope{env}mode"), 0, 4);
    }
    // Centered controls rest at 64
    let centered = ["semitone", "detune", "bendrange", "pwmamount"];
    for osc in 1..=3 {
        for name in centered {
            builder = builder.default_value(&format!("osc{osc}{name}"), 64);
        }
    }
    Ok(builder.build()?)
}

/// Profile for the Blofeld (desktop and keyboard).
pub fn profile() -> Result<DeviceProfile> {
    let schema = sound_schema()?;
    let parameters = parameters(&schema)?;

    let locations = BANKS
        .iter()
        .fold(LocationSpace::new(128), |l, b| l.bank(*b, true))
        .numbering(1, 3, "");

    DeviceProfile::builder(NAME)
        .header(Header::new([
            HeaderByte::Fixed(0x3E),
            HeaderByte::Fixed(0x13),
            HeaderByte::DeviceId,
            HeaderByte::Command,
        ]))
        .commands(0x10, 0x00, 0x20)
        .device_ids(DeviceIdRange::new(0, 127, 0))
        .addressing(AddressScheme::new(
            Address::new(&[0x7F, 0x00]),
            StoredAddress::Fields {
                template: Address::new(&[0x00, 0x00]),
                bank_at: 0,
                bank_codes: (0..BANKS.len() as u8).map(Some).collect(),
                number_at: 1,
                number_base: 0,
            },
        )
        // sound dumps from the edit buffers carry bank bytes past the last bank
        .unmatched_as_working())
        .block(schema, &[0, 0])
        .checksum(
            ChecksumSpec::new(
                ChecksumPolicy::new(ChecksumKind::Sum).accept_7f(),
                ChecksumSpan::FromPayload,
            )
            .on(&[MessageKind::Dump]),
        )
        .request_suffix(&[0x00])
        .parameter_addressing(ParamAddressing::Index14 {
            // location 00 is the edit buffer
            prefix: vec![0x00],
            order: ByteOrder::MsbFirst,
            stride: 1,
        })
        .parameters(parameters)
        .patch_change(PatchChangeMap::controller_per_bank(32, BANKS.len() as u8))
        .timing(TimingHints::new().after_patch_change(200))
        .locations(locations)
        .build()
}
