//! E-mu Planet Phatt family presets (Planet Phatt, Orbit, Carnaval, Vintage Keys).
//!
//! Every value travels as two 7-bit bytes, LSB first, with negative values in
//! 14-bit two's complement. The family members share one layout and differ
//! in the device codes of their instruments, so the instrument table is picked
//! from the hidden [`SYNTH_TYPE`] parameter. Incoming presets switch that
//! parameter when their instrument codes belong to another member.

use patchwire_core::{LookupTable, ParameterModel, ParameterSet, Schema, TableResolver, PATCH_NAME};
use patchwire_sysex::prelude::*;
use patchwire_sysex::Result;
use std::ops::RangeInclusive;
use tracing::debug;

pub const NAME: &str = "E-mu Planet Phatt";

/// Hidden parameter selecting the family member; see [`SynthType`].
pub const SYNTH_TYPE: &str = "synthtype";

/// Table key of the layer instrument slots.
pub const INSTRUMENT_TABLE: &str = "instrument";

/// Table key of the realtime modulation destinations.
pub const REALTIME_DEST_TABLE: &str = "realtimedest";

/// Family members, as stored in [`SYNTH_TYPE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthType {
    PlanetPhatt = 0,
    OrbitV1 = 1,
    OrbitV2 = 2,
    Carnaval = 3,
    VintageKeys = 4,
    VintageKeysPlus = 5,
}

impl SynthType {
    pub const ALL: [SynthType; 6] = [
        SynthType::PlanetPhatt,
        SynthType::OrbitV1,
        SynthType::OrbitV2,
        SynthType::Carnaval,
        SynthType::VintageKeys,
        SynthType::VintageKeysPlus,
    ];

    pub fn from_value(value: i32) -> Option<Self> {
        Self::ALL.get(usize::try_from(value).ok()?).copied()
    }

    /// Whether a preset reported as `reported` may come from this member.
    /// Orbit V1 and Vintage Keys Plus presets are reported as their siblings.
    pub fn accepts(self, reported: SynthType) -> bool {
        self == reported
            || (self == SynthType::VintageKeysPlus && reported == SynthType::VintageKeys)
            || (self == SynthType::OrbitV1 && reported == SynthType::OrbitV2)
    }

    pub fn name(self) -> &'static str {
        match self {
            SynthType::PlanetPhatt => "Planet Phatt",
            SynthType::OrbitV1 => "Orbit V1 (9090)",
            SynthType::OrbitV2 => "Orbit V2 (9095)",
            SynthType::Carnaval => "Carnaval",
            SynthType::VintageKeys => "Vintage Keys",
            SynthType::VintageKeysPlus => "Vintage Keys Plus",
        }
    }
}

const PLANET_PHATT_INSTRUMENTS: &[RangeInclusive<i32>] = &[
    0..=0,
    3329..=3424,
    3694..=3694,
    3425..=3456,
    3798..=3798,
    3695..=3695,
    3457..=3470,
    3496..=3547,
    3471..=3495,
    3548..=3570,
    3585..=3647,
    3761..=3761,
    3648..=3675,
    3700..=3756,
    3676..=3676,
    3757..=3758,
    3677..=3677,
    3759..=3760,
    3692..=3692,
    3762..=3778,
    3678..=3679,
    3779..=3782,
    3680..=3681,
    3786..=3786,
    3783..=3785,
    3682..=3682,
    3787..=3797,
    3799..=3818,
    3683..=3684,
    3819..=3820,
    3685..=3685,
    3821..=3823,
    3686..=3691,
    3693..=3693,
    3696..=3697,
    3699..=3699,
    3698..=3698,
];
const ORBIT_INSTRUMENTS: &[RangeInclusive<i32>] = &[0..=0, 2817..=3052, 3073..=3220];
const CARNAVAL_INSTRUMENTS: &[RangeInclusive<i32>] = &[0..=0, 3841..=4063, 4097..=4170];
const VINTAGE_KEYS_INSTRUMENTS: &[RangeInclusive<i32>] = &[0..=0, 1537..=1785];
const VINTAGE_KEYS_PLUS_INSTRUMENTS: &[RangeInclusive<i32>] = &[0..=0, 1537..=1785, 2049..=2233];

const REALTIME_DESTINATIONS: &[RangeInclusive<i32>] = &[0..=24, 28..=30, 34..=36, 40..=42];

/// Sound-set base codes the units also send for "no instrument".
fn none_codes(synth: SynthType) -> &'static [i32] {
    match synth {
        SynthType::PlanetPhatt => &[3328, 3584],
        SynthType::OrbitV1 | SynthType::OrbitV2 => &[2816, 3072],
        SynthType::Carnaval => &[3840, 4096],
        SynthType::VintageKeys | SynthType::VintageKeysPlus => &[1536],
    }
}

/// Instrument tables per family member plus the shared destination table.
#[derive(Debug, Clone)]
pub struct PhattTables {
    instruments: Vec<LookupTable>,
    realtime_dest: LookupTable,
}

impl PhattTables {
    pub fn new() -> Result<Self> {
        let instruments = SynthType::ALL
            .iter()
            .map(|&synth| {
                let runs = match synth {
                    SynthType::PlanetPhatt => PLANET_PHATT_INSTRUMENTS,
                    SynthType::OrbitV1 | SynthType::OrbitV2 => ORBIT_INSTRUMENTS,
                    SynthType::Carnaval => CARNAVAL_INSTRUMENTS,
                    SynthType::VintageKeys => VINTAGE_KEYS_INSTRUMENTS,
                    SynthType::VintageKeysPlus => VINTAGE_KEYS_PLUS_INSTRUMENTS,
                };
                let aliases: Vec<(i32, usize)> =
                    none_codes(synth).iter().map(|&code| (code, 0)).collect();
                LookupTable::from_runs(runs)?.with_aliases(&aliases)
            })
            .collect::<patchwire_core::Result<Vec<_>>>()?;
        Ok(Self {
            instruments,
            realtime_dest: LookupTable::from_runs(REALTIME_DESTINATIONS)?,
        })
    }

    pub fn instruments(&self, synth: SynthType) -> &LookupTable {
        &self.instruments[synth as usize]
    }

    /// Family member an instrument code belongs to. Code 0 ("none") says
    /// nothing; Orbit codes report V2 and shared Vintage Keys codes report
    /// the smaller set.
    pub fn synth_for_code(&self, code: i32) -> Option<SynthType> {
        if code == 0 {
            return None;
        }
        [
            SynthType::PlanetPhatt,
            SynthType::OrbitV2,
            SynthType::Carnaval,
            SynthType::VintageKeys,
            SynthType::VintageKeysPlus,
        ]
        .into_iter()
        .find(|&synth| self.instruments(synth).index_of(code).is_some())
    }

    /// Highest instrument index of each member, in [`SYNTH_TYPE`] order.
    fn instrument_maxima(&self) -> Vec<i32> {
        self.instruments
            .iter()
            .map(|t| t.len().saturating_sub(1) as i32)
            .collect()
    }
}

impl TableResolver for PhattTables {
    fn resolve(&self, key: &str, model: &ParameterModel) -> Option<&LookupTable> {
        match key {
            INSTRUMENT_TABLE => {
                let synth = model
                    .get(SYNTH_TYPE)
                    .and_then(SynthType::from_value)
                    .unwrap_or(SynthType::PlanetPhatt);
                Some(self.instruments(synth))
            }
            REALTIME_DEST_TABLE => Some(&self.realtime_dest),
            _ => None,
        }
    }

    fn infer(&self, codes: &[(&str, i32)], model: &mut ParameterModel) {
        let instruments = codes.iter().filter(|(key, _)| *key == INSTRUMENT_TABLE);
        for reported in instruments.filter_map(|&(_, code)| self.synth_for_code(code)) {
            let current = model
                .get(SYNTH_TYPE)
                .and_then(SynthType::from_value)
                .unwrap_or(SynthType::PlanetPhatt);
            if !current.accepts(reported) {
                debug!("Switching {} to {}", current.name(), reported.name());
                let _ = model.set(SYNTH_TYPE, reported as i32);
            }
        }
    }
}

/// Preset parameters after the name, in wire order.
fn parameter_names() -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(124);
    let mut push = |name: String| names.push(name);

    for i in 1..=3 {
        push(format!("presetlink{i}"));
    }
    push("rangelowkey".into());
    for i in 1..=3 {
        push(format!("presetlinklowkey{i}"));
    }
    push("rangehighkey".into());
    for i in 1..=3 {
        push(format!("presetlinkhighkey{i}"));
    }
    for layer in 1..=2 {
        for field in [
            "instrument",
            "soundstartoffset",
            "tuningcoarse",
            "tuningfine",
            "volume",
            "pan",
            "delay",
            "lowkey",
            "highkey",
            "altvolumeattack",
            "altvolumehold",
            "altvolumedecay",
            "altvolumesustain",
            "altvolumerelease",
            "altvolumeenvelopeon",
            "solomode",
            "chorus",
            "reversesound",
        ] {
            push(format!("layer{layer}{field}"));
        }
    }
    for field in [
        "crossfademode",
        "crossfadedirection",
        "crossfadebalance",
        "crossfadeamount",
        "switchpoint",
    ] {
        push(field.into());
    }
    for lfo in 1..=2 {
        for field in ["shape", "rate", "delay", "variation", "amount"] {
            push(format!("lfo{lfo}{field}"));
        }
    }
    for stage in ["delay", "attack", "hold", "decay", "sustain", "release", "amount"] {
        push(format!("auxenvelope{stage}"));
    }
    for field in ["keyvelsource", "keyveldest", "keyvelamount"] {
        for i in 1..=6 {
            push(format!("{field}{i}"));
        }
    }
    for field in ["realtimesource", "realtimedest"] {
        for i in 1..=8 {
            push(format!("{field}{i}"));
        }
    }
    for i in 1..=3 {
        push(format!("footswitchdest{i}"));
    }
    for i in 1..=4 {
        push(format!("controlleramount{i}"));
    }
    for field in [
        "pressureamount",
        "pitchbendrange",
        "velocitycurve",
        "keyboardcenter",
        "submix",
        "keyboardtuning",
        "layer1portamentorate",
        "layer2portamentorate",
        "layer1filtertype",
        "layer1filterfc",
        "layer1filterq",
        "layer2filtertype",
        "layer2filterfc",
        "layer2filterq",
    ] {
        push(field.into());
    }
    names
}

/// Logical range of a preset parameter.
fn range_of(name: &str) -> (i32, i32) {
    let field = ["layer1", "layer2", "lfo1", "lfo2"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
        .trim_end_matches(|c: char| c.is_ascii_digit());
    match field {
        "presetlink" => (-1, 639),
        "tuningcoarse" => (-36, 36),
        "tuningfine" => (-64, 64),
        "pan" => (-7, 7),
        "altvolumeattack" | "altvolumehold" | "altvolumedecay" | "altvolumesustain"
        | "altvolumerelease" | "auxenvelopeattack" | "auxenvelopehold" | "auxenvelopedecay"
        | "auxenvelopesustain" | "auxenveloperelease" => (0, 99),
        "altvolumeenvelopeon" | "reversesound" | "crossfadedirection" | "keyvelsource" => (0, 1),
        "solomode" | "crossfademode" | "submix" => (0, 2),
        "chorus" | "filterq" => (0, 15),
        "crossfadeamount" | "filterfc" => (0, 255),
        "shape" => (0, 8),
        "amount" | "auxenvelopeamount" | "keyvelamount" | "controlleramount" | "pressureamount" => {
            (-128, 127)
        }
        "keyveldest" => (0, 42),
        "realtimesource" => (0, 11),
        "footswitchdest" => (0, 10),
        "pitchbendrange" => (0, 13),
        "velocitycurve" | "keyboardtuning" => (0, 5),
        "filtertype" => (0, 17),
        _ => (0, 127),
    }
}

fn transform_of(name: &str) -> Transform {
    if name.ends_with("instrument") {
        Transform::table(INSTRUMENT_TABLE)
    } else if name.starts_with("realtimedest") {
        Transform::table(REALTIME_DEST_TABLE)
    } else {
        Transform::TwosComplement { bits: 14 }
    }
}

fn preset_schema(names: &[String]) -> Result<Schema> {
    let schema = names
        .iter()
        .fold(
            Schema::builder().wide_text(PATCH_NAME, 12, ByteOrder::LsbFirst),
            |b, name| b.two_byte(name.as_str(), ByteOrder::LsbFirst, transform_of(name)),
        )
        .build()?;
    Ok(schema)
}

/// Profile shared by the whole family; set [`SYNTH_TYPE`] on the model to
/// pick the instrument set.
pub fn profile() -> Result<DeviceProfile> {
    let names = parameter_names();
    let schema = preset_schema(&names)?;
    let tables = PhattTables::new()?;
    let maxima = tables.instrument_maxima();
    let largest = maxima.iter().copied().max().unwrap_or(0) as usize + 1;
    let parameters = names
        .iter()
        .fold(ParameterSet::builder().schema(&schema), |b, name| {
            let (min, max) = range_of(name);
            b.range(name.as_str(), min, max)
        })
        .table_len(REALTIME_DEST_TABLE, tables.realtime_dest.len())
        .table_len(INSTRUMENT_TABLE, largest)
        .hidden(SYNTH_TYPE, 0, SynthType::ALL.len() as i32 - 1)
        .max_by("layer1instrument", SYNTH_TYPE, maxima.iter().copied())
        .max_by("layer2instrument", SYNTH_TYPE, maxima.iter().copied())
        .build()?;

    DeviceProfile::builder(NAME)
        .header(Header::new([
            HeaderByte::Fixed(0x18),
            HeaderByte::Fixed(0x0A),
            HeaderByte::DeviceId,
            HeaderByte::Command,
        ]))
        .commands(0x01, 0x00, 0x03)
        .device_ids(DeviceIdRange::new(0, 15, 0))
        .addressing(AddressScheme::new(
            // The top preset of RAM bank 0 doubles as the edit target
            Address::new(&[127, 0]),
            StoredAddress::Index14 {
                order: ByteOrder::LsbFirst,
                patches_per_bank: 128,
            },
        ))
        .block(schema, &[0, 0])
        .checksum(
            ChecksumSpec::new(ChecksumPolicy::new(ChecksumKind::Sum), ChecksumSpan::FromPayload)
                .on(&[MessageKind::Dump]),
        )
        .parameter_addressing(ParamAddressing::Index14 {
            prefix: Vec::new(),
            order: ByteOrder::LsbFirst,
            stride: 2,
        })
        .parameters(parameters)
        .tables(tables)
        .patch_change(PatchChangeMap::program_only(5))
        .timing(TimingHints::new().between_messages(400))
        .locations(
            LocationSpace::new(128)
                .bank("0 RAM", true)
                .bank("1 RAM", true)
                .bank("2 ROM", false)
                .bank("3 ROM", false)
                .bank("4 ROM", false)
                .numbering(0, 3, "-"),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let p = profile().unwrap();
        assert_eq!(parameter_names().len(), 124);
        assert_eq!(p.blocks()[0].schema.byte_len(), 24 + 124 * 2);
        assert_eq!(p.dump_message_len(0), Some(281));
        assert_eq!(p.request_len(), 8);
        assert_eq!(p.parameter_len(), 10..=10);
    }

    #[test]
    fn test_table_sizes() {
        let tables = PhattTables::new().unwrap();
        assert_eq!(tables.instruments(SynthType::PlanetPhatt).len(), 482);
        assert_eq!(tables.instruments(SynthType::OrbitV2).len(), 385);
        assert_eq!(tables.instruments(SynthType::Carnaval).len(), 298);
        assert_eq!(tables.instruments(SynthType::VintageKeysPlus).len(), 435);
        assert_eq!(tables.realtime_dest.len(), 34);
    }

    #[test]
    fn test_resolver_follows_synth_type() {
        let p = profile().unwrap();
        let mut model = p.new_model();
        let table = |m: &ParameterModel| p.tables().resolve(INSTRUMENT_TABLE, m).map(|t| t.code(1));

        assert_eq!(table(&model), Some(Some(3329)));
        model.set(SYNTH_TYPE, SynthType::Carnaval as i32).unwrap();
        assert_eq!(table(&model), Some(Some(3841)));
        model.set(SYNTH_TYPE, SynthType::VintageKeys as i32).unwrap();
        assert_eq!(table(&model), Some(Some(1537)));
    }

    #[test]
    fn test_none_aliases_decode_silently() {
        let tables = PhattTables::new().unwrap();
        let carnaval = tables.instruments(SynthType::Carnaval);
        assert_eq!(carnaval.index_of(3840), Some(0));
        assert_eq!(carnaval.index_of(4096), Some(0));
        assert_eq!(carnaval.code(0), Some(0));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(range_of("layer2tuningcoarse"), (-36, 36));
        assert_eq!(range_of("lfo1amount"), (-128, 127));
        assert_eq!(range_of("presetlink3"), (-1, 639));
        assert_eq!(range_of("presetlinklowkey3"), (0, 127));
    }

    #[test]
    fn test_table_mapped_bounds() {
        let p = profile().unwrap();
        let params = p.parameters();
        assert_eq!(params.spec("realtimedest8").map(|s| (s.min, s.max)), Some((0, 33)));
        assert_eq!(params.spec("layer1instrument").map(|s| (s.min, s.max)), Some((0, 481)));
        assert_eq!(params.selector_of("layer2instrument"), Some(SYNTH_TYPE));

        let mut model = p.new_model();
        for synth in SynthType::ALL {
            model.set(SYNTH_TYPE, synth as i32).unwrap();
            let last = p.tables().resolve(INSTRUMENT_TABLE, &model).unwrap().len() as i32 - 1;
            assert_eq!(model.bounds("layer1instrument"), Some((0, last)));
        }
    }

    #[test]
    fn test_synth_type_follows_bounds() {
        let p = profile().unwrap();
        let mut model = p.new_model();
        model.set("layer1instrument", 400).unwrap();
        model.set(SYNTH_TYPE, SynthType::VintageKeys as i32).unwrap();
        assert_eq!(model.get("layer1instrument"), Some(249));
        assert_eq!(model.set("layer2instrument", 400).unwrap(), 249);
    }

    #[test]
    fn test_synth_for_code() {
        let tables = PhattTables::new().unwrap();
        assert_eq!(tables.synth_for_code(0), None);
        assert_eq!(tables.synth_for_code(3329), Some(SynthType::PlanetPhatt));
        assert_eq!(tables.synth_for_code(3584), Some(SynthType::PlanetPhatt));
        assert_eq!(tables.synth_for_code(2816), Some(SynthType::OrbitV2));
        assert_eq!(tables.synth_for_code(3100), Some(SynthType::OrbitV2));
        assert_eq!(tables.synth_for_code(3845), Some(SynthType::Carnaval));
        assert_eq!(tables.synth_for_code(1536), Some(SynthType::VintageKeys));
        assert_eq!(tables.synth_for_code(1600), Some(SynthType::VintageKeys));
        assert_eq!(tables.synth_for_code(2100), Some(SynthType::VintageKeysPlus));
        assert_eq!(tables.synth_for_code(5000), None);

        assert!(SynthType::OrbitV1.accepts(SynthType::OrbitV2));
        assert!(SynthType::VintageKeysPlus.accepts(SynthType::VintageKeys));
        assert!(!SynthType::VintageKeys.accepts(SynthType::VintageKeysPlus));
        assert!(!SynthType::PlanetPhatt.accepts(SynthType::Carnaval));
    }

    #[test]
    fn test_infer_switches_synth_type() {
        let p = profile().unwrap();
        let tables = PhattTables::new().unwrap();
        let mut model = p.new_model();

        tables.infer(&[(INSTRUMENT_TABLE, 3845), (INSTRUMENT_TABLE, 0)], &mut model);
        assert_eq!(model.get(SYNTH_TYPE), Some(SynthType::Carnaval as i32));

        model.set(SYNTH_TYPE, SynthType::VintageKeysPlus as i32).unwrap();
        tables.infer(&[(INSTRUMENT_TABLE, 1600)], &mut model);
        assert_eq!(model.get(SYNTH_TYPE), Some(SynthType::VintageKeysPlus as i32));

        tables.infer(&[(REALTIME_DEST_TABLE, 3329), (INSTRUMENT_TABLE, 0)], &mut model);
        assert_eq!(model.get(SYNTH_TYPE), Some(SynthType::VintageKeysPlus as i32));
    }
}
