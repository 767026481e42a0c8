//! Librarian integration tests
//!
//! Loads `.syx` streams holding dumps from several built-in devices and
//! checks sessions against the device profiles.
//!
//! Run with:
//! ```bash
//! cargo test --test librarian_integration
//! ```

use patchwire::devices::{emu_planet_phatt, roland_jv880, waldorf_blofeld, SynthType};
use patchwire::prelude::*;
use patchwire_sysex::Error as SysexError;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn librarian() -> Librarian {
    Librarian::builder()
        .with_builtin_devices()
        .unwrap()
        .build()
        .unwrap()
}

fn jv_patch(session: &DeviceSession<'_>, name: &str, reverb: i32) -> ParameterModel {
    let mut model = session.new_model();
    model.set_text(PATCH_NAME, name).unwrap();
    model.set("reverbtype", reverb).unwrap();
    model
}

fn dump(session: &DeviceSession<'_>, model: &ParameterModel, target: WriteTarget) -> Vec<Vec<u8>> {
    session.builder().dump(model, target).unwrap()
}

// ----------------------------------------------------------------------------
// Loading streams
// ----------------------------------------------------------------------------

/// Dumps from different devices in one file come back as separate patches
#[test]
fn test_load_mixed_bank_file() {
    init_logging();
    let lib = librarian();
    let jv = lib.session(roland_jv880::NAME).unwrap();
    let blofeld = lib.session(waldorf_blofeld::NAME).unwrap();

    let first = jv_patch(&jv, "Pad", 2);
    let second = jv_patch(&jv, "Bass", 5);
    let mut sound = blofeld.new_model();
    sound.set_text(PATCH_NAME, "Glass Bells").unwrap();
    sound.set("osc1octave", 6).unwrap();

    let mut file = Vec::new();
    file.extend(dump(&jv, &first, WriteTarget::Stored(PatchLocation::new(0, 0))).concat());
    file.extend([0x00, 0x12, 0x34]);
    file.extend(dump(&blofeld, &sound, WriteTarget::Stored(PatchLocation::new(2, 5))).concat());
    file.extend(dump(&jv, &second, WriteTarget::Stored(PatchLocation::new(0, 1))).concat());

    let loaded: Vec<LoadedPatch> = lib.load(&file).into_iter().map(|p| p.unwrap()).collect();
    assert_eq!(loaded.len(), 3);

    assert_eq!(loaded[0].device, roland_jv880::NAME);
    assert_eq!(loaded[0].location, Some(PatchLocation::new(0, 0)));
    assert_eq!(loaded[0].model, first);

    assert_eq!(loaded[1].device, waldorf_blofeld::NAME);
    assert_eq!(loaded[1].location, Some(PatchLocation::new(2, 5)));
    assert_eq!(loaded[1].model.name(), Some("Glass Bells"));
    assert_eq!(loaded[1].model.get("osc1octave"), Some(6));

    assert_eq!(loaded[2].model.text(PATCH_NAME), Some("Bass"));
    assert_eq!(loaded[2].location, Some(PatchLocation::new(0, 1)));

    let names: Vec<String> = loaded
        .iter()
        .map(|p| {
            let profile = lib.profile(&p.device).unwrap();
            profile.locations().name(p.location.unwrap()).unwrap()
        })
        .collect();
    insta::assert_snapshot!(names.join(", "), @"Internal 01, C006, Internal 02");
}

/// Requests and parameter updates in a stream are not patches
#[test]
fn test_load_skips_requests_and_updates() {
    let lib = librarian();
    let jv = lib.session(roland_jv880::NAME).unwrap();
    let model = jv_patch(&jv, "Keys", 1);

    let mut file = jv
        .builder()
        .dump_request(WriteTarget::WorkingMemory)
        .unwrap();
    file.extend(jv.builder().parameter_update(&model, "reverbtype").unwrap().concat());

    assert!(lib.load(&file).is_empty());
}

/// A dump cut short at the end of the file is reported after the complete ones
#[test]
fn test_load_reports_truncated_sequence() {
    let lib = librarian();
    let jv = lib.session(roland_jv880::NAME).unwrap();
    let blofeld = lib.session(waldorf_blofeld::NAME).unwrap();

    let blocks = dump(&jv, &jv_patch(&jv, "Lost", 0), WriteTarget::WorkingMemory);
    let mut file = blocks[..3].concat();
    file.extend(dump(&blofeld, &blofeld.new_model(), WriteTarget::WorkingMemory).concat());

    let results = lib.load(&file);
    assert_eq!(results.len(), 2);
    let sound = results[0].as_ref().unwrap();
    assert_eq!(sound.device, waldorf_blofeld::NAME);
    assert_eq!(sound.location, None);
    assert!(matches!(
        results[1],
        Err(Error::Sysex(SysexError::BlockSequence { block: 3, .. }))
    ));
}

/// A new dump arriving mid-sequence ends the old one and still decodes
#[test]
fn test_load_restarts_after_interrupted_sequence() {
    let lib = librarian();
    let jv = lib.session(roland_jv880::NAME).unwrap();
    let broken = dump(&jv, &jv_patch(&jv, "Broken", 0), WriteTarget::WorkingMemory);
    let whole = jv_patch(&jv, "Whole", 6);

    let mut file = broken[..2].concat();
    file.extend(dump(&jv, &whole, WriteTarget::WorkingMemory).concat());

    let results = lib.load(&file);
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(Error::Sysex(_))));
    assert_eq!(results[1].as_ref().unwrap().model, whole);
}

/// A registered template selects the Planet Phatt family member
#[test]
fn test_load_phatt_with_template() {
    let profile = emu_planet_phatt::profile().unwrap();
    let mut template = profile.new_model();
    template
        .set(emu_planet_phatt::SYNTH_TYPE, SynthType::VintageKeys as i32)
        .unwrap();

    let lib = Librarian::builder()
        .device(profile)
        .template(emu_planet_phatt::NAME, template)
        .build()
        .unwrap();
    let session = lib.session(emu_planet_phatt::NAME).unwrap();
    let mut preset = session.new_model();
    preset.set("layer1instrument", 12).unwrap();
    preset.set("layer2instrument", 200).unwrap();

    let msgs = dump(&session, &preset, WriteTarget::Stored(PatchLocation::new(1, 7)));
    let loaded = lib.load(&msgs.concat()).remove(0).unwrap();
    assert_eq!(loaded.model, preset);
    assert_eq!(loaded.location, Some(PatchLocation::new(1, 7)));
    assert!(loaded.warnings.is_empty());
}

/// Without a template the family member is taken from the instrument codes
#[test]
fn test_load_phatt_family_member_without_template() {
    let lib = librarian();
    let session = lib.session(emu_planet_phatt::NAME).unwrap();
    let mut preset = session.new_model();
    preset
        .set(emu_planet_phatt::SYNTH_TYPE, SynthType::Carnaval as i32)
        .unwrap();
    preset.set("layer1instrument", 5).unwrap();
    preset.set_text(PATCH_NAME, "Samba").unwrap();

    let msgs = dump(&session, &preset, WriteTarget::Stored(PatchLocation::new(0, 2)));
    let loaded = lib.load(&msgs.concat()).remove(0).unwrap();
    assert!(loaded.warnings.is_empty());
    assert_eq!(
        loaded.model.get(emu_planet_phatt::SYNTH_TYPE),
        Some(SynthType::Carnaval as i32)
    );
    assert_eq!(loaded.model.get("layer1instrument"), Some(5));
    assert_eq!(loaded.model, preset);
}

// ----------------------------------------------------------------------------
// Sessions
// ----------------------------------------------------------------------------

/// Settings registered on the librarian shape outgoing messages
#[test]
fn test_session_uses_registered_settings() {
    let lib = Librarian::builder()
        .with_builtin_devices()
        .unwrap()
        .settings(waldorf_blofeld::NAME, DeviceSettings::new().device_id(9).channel(4))
        .build()
        .unwrap();
    let session = lib.session(waldorf_blofeld::NAME).unwrap();

    let request = session
        .builder()
        .dump_request(WriteTarget::Stored(PatchLocation::new(0, 3)))
        .unwrap();
    assert_eq!(request, vec![0xF0, 0x3E, 0x13, 0x09, 0x00, 0x00, 0x03, 0x00, 0xF7]);

    let change = session.builder().patch_change(PatchLocation::new(7, 127)).unwrap();
    assert_eq!(change, vec![vec![0xB4, 0x20, 0x07], vec![0xC4, 0x7F]]);
}

/// Incoming parameter updates land on the session's model
#[test]
fn test_session_applies_parameter_update() {
    let lib = librarian();
    let session = lib.session(roland_jv880::NAME).unwrap();

    let mut sent = session.new_model();
    sent.set("tone3pan", 100).unwrap();
    let msg = session.builder().parameter_update(&sent, "tone3pan").unwrap().remove(0);

    let mut local = session.new_model();
    let update = session.apply_update(&msg, &mut local).unwrap();
    assert_eq!(update.changed, vec!["tone3pan".to_string()]);
    assert_eq!(local.get("tone3pan"), Some(100));
}

/// A session receives a multi-block dump one message at a time
#[test]
fn test_session_receive_blocks() {
    let lib = librarian();
    let mut session = lib.session(roland_jv880::NAME).unwrap();
    let model = jv_patch(&session, "Choir", 3);
    let msgs = dump(&session, &model, WriteTarget::Stored(PatchLocation::new(1, 63)));

    let (last, rest) = msgs.split_last().unwrap();
    for msg in rest {
        assert_eq!(session.receive(msg).unwrap(), None);
    }
    let patch = session.receive(last).unwrap().unwrap();
    assert_eq!(patch.model, model);
    assert_eq!(patch.location, Some(PatchLocation::new(1, 63)));
    assert_eq!(session.assembler().state(), patchwire_sysex::AssemblyState::AwaitingBlock(0));
}

/// Every built-in device is registered and recognizes its own requests
#[test]
fn test_builtin_devices_registered() {
    let lib = librarian();
    let names: Vec<&str> = lib.devices().collect();
    assert_eq!(
        names,
        vec![roland_jv880::NAME, waldorf_blofeld::NAME, emu_planet_phatt::NAME]
    );
    for name in names {
        let request = lib
            .session(name)
            .unwrap()
            .builder()
            .dump_request(WriteTarget::WorkingMemory)
            .unwrap();
        assert_eq!(lib.recognize(&request), Some((name, MessageKind::Request)));
    }
}
