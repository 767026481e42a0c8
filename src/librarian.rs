//! Librarian: routes incoming sysex across registered devices.

use crate::{Error, Result};
use patchwire_core::{ParameterModel, Warning};
use patchwire_sysex::{
    apply_parameter_update, split_messages, AssemblyState, ChunkAssembler, DeviceProfile,
    DeviceSettings, MessageBuilder, MessageKind, ParameterUpdate, PatchLocation, Progress,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// A device the librarian knows how to talk to.
#[derive(Debug, Clone)]
struct Registered {
    profile: Arc<DeviceProfile>,
    settings: DeviceSettings,
    template: Option<ParameterModel>,
}

impl Registered {
    fn assembler(&self) -> ChunkAssembler {
        let asm = ChunkAssembler::with_settings(self.profile.clone(), &self.settings);
        match &self.template {
            Some(model) => asm.with_template(model.clone()),
            None => asm,
        }
    }
}

/// A patch recovered from a stream by [`Librarian::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPatch {
    /// Name of the device profile that decoded it.
    pub device: String,
    /// Stored location the dump was addressed to; `None` for working memory.
    pub location: Option<PatchLocation>,
    pub model: ParameterModel,
    pub warnings: Vec<Warning>,
}

/// Holds device profiles and their settings, and turns `.syx` data into patches.
///
/// # Example
///
/// ```ignore
/// use patchwire::prelude::*;
///
/// let librarian = Librarian::builder()
///     .with_builtin_devices()?
///     .build()?;
///
/// for patch in librarian.load(&std::fs::read("bank.syx")?) {
///     let patch = patch?;
///     println!("{}: {:?}", patch.device, patch.model.name());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Librarian {
    devices: Vec<Registered>,
}

impl Librarian {
    pub fn builder() -> LibrarianBuilder {
        LibrarianBuilder::default()
    }

    /// Names of the registered devices, in registration order.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.profile.name())
    }

    pub fn profile(&self, device: &str) -> Option<&Arc<DeviceProfile>> {
        self.find(device).map(|d| &d.profile)
    }

    pub fn settings(&self, device: &str) -> Option<&DeviceSettings> {
        self.find(device).map(|d| &d.settings)
    }

    /// Device and kind of `msg`, checked against each device in registration order.
    pub fn recognize(&self, msg: &[u8]) -> Option<(&str, MessageKind)> {
        self.devices
            .iter()
            .find_map(|d| d.profile.recognize(msg).map(|kind| (d.profile.name(), kind)))
    }

    /// Open a session for sending to and receiving from `device`.
    pub fn session(&self, device: &str) -> Result<DeviceSession<'_>> {
        let registered = self
            .find(device)
            .ok_or_else(|| Error::UnknownDevice(device.to_string()))?;
        Ok(DeviceSession {
            builder: MessageBuilder::new(&registered.profile, &registered.settings)?,
            assembler: registered.assembler(),
            registered,
        })
    }

    /// Recover every complete patch in a `.syx` stream.
    ///
    /// Dumps from different devices may be interleaved. Messages no device
    /// recognizes, requests and parameter updates are skipped. A dump sequence
    /// that breaks off, or is still open at the end of the stream, is reported
    /// as an error in place of its patch.
    pub fn load(&self, bytes: &[u8]) -> Vec<Result<LoadedPatch>> {
        let mut assemblers: Vec<Option<ChunkAssembler>> =
            self.devices.iter().map(|_| None).collect();
        let mut results = Vec::new();

        for msg in split_messages(bytes) {
            let Some((index, registered)) = self
                .devices
                .iter()
                .enumerate()
                .find(|(_, d)| d.profile.recognize(msg) == Some(MessageKind::Dump))
            else {
                trace!("Skipping {} byte message: not a known dump", msg.len());
                continue;
            };
            let asm = assemblers[index].get_or_insert_with(|| registered.assembler());
            let mid_sequence = matches!(asm.state(), AssemblyState::AwaitingBlock(n) if n > 0);

            let mut outcome = asm.feed(msg);
            if let Err(e) = &outcome {
                results.push(Err(e.clone().into()));
                asm.reset();
                if mid_sequence {
                    debug!(
                        "{}: sequence broken off, retrying message as a new dump",
                        registered.profile.name()
                    );
                    outcome = asm.feed(msg);
                    if let Err(e) = &outcome {
                        results.push(Err(e.clone().into()));
                        asm.reset();
                    }
                }
            }

            if let Ok(Progress::Complete) = outcome {
                if let Some(done) = assemblers[index].take() {
                    results.push(Self::loaded(registered, done));
                }
            }
        }

        for (registered, asm) in self.devices.iter().zip(assemblers) {
            if let Some(asm) = asm {
                if asm.state() != AssemblyState::AwaitingBlock(0) {
                    results.push(Self::loaded(registered, asm));
                }
            }
        }
        debug!("Loaded {} patch result(s) from {} bytes", results.len(), bytes.len());
        results
    }

    fn loaded(registered: &Registered, asm: ChunkAssembler) -> Result<LoadedPatch> {
        let patch = asm.finish()?;
        Ok(LoadedPatch {
            device: registered.profile.name().to_string(),
            location: patch.location,
            model: patch.model,
            warnings: patch.warnings,
        })
    }

    fn find(&self, device: &str) -> Option<&Registered> {
        self.devices.iter().find(|d| d.profile.name() == device)
    }
}

/// Outgoing builder and incoming assembler for one device.
pub struct DeviceSession<'a> {
    registered: &'a Registered,
    builder: MessageBuilder<'a>,
    assembler: ChunkAssembler,
}

impl<'a> DeviceSession<'a> {
    pub fn profile(&self) -> &'a Arc<DeviceProfile> {
        &self.registered.profile
    }

    pub fn settings(&self) -> &'a DeviceSettings {
        &self.registered.settings
    }

    /// Builder for dumps, requests, parameter updates and patch changes.
    pub fn builder(&self) -> &MessageBuilder<'a> {
        &self.builder
    }

    pub fn assembler(&mut self) -> &mut ChunkAssembler {
        &mut self.assembler
    }

    /// A model holding the device's defaults, or its template if one was registered.
    pub fn new_model(&self) -> ParameterModel {
        self.registered
            .template
            .clone()
            .unwrap_or_else(|| self.registered.profile.new_model())
    }

    /// Apply an incoming single-parameter message to `model`.
    pub fn apply_update(&self, msg: &[u8], model: &mut ParameterModel) -> Result<ParameterUpdate> {
        let profile = &self.registered.profile;
        Ok(apply_parameter_update(profile, &self.registered.settings, msg, model)?)
    }

    /// Feed one dump message; returns the patch once the last block arrives.
    pub fn receive(&mut self, msg: &[u8]) -> Result<Option<LoadedPatch>> {
        match self.assembler.feed(msg)? {
            Progress::Incomplete { .. } => Ok(None),
            Progress::Complete => {
                let done = std::mem::replace(&mut self.assembler, self.registered.assembler());
                Librarian::loaded(self.registered, done).map(Some)
            }
        }
    }
}

/// Builder for a [`Librarian`].
///
/// # Example
///
/// ```ignore
/// let librarian = Librarian::builder()
///     .device(jv880)
///     .settings("Roland JV-880", DeviceSettings::new().device_id(17))
///     .build()?;
/// ```
#[derive(Default)]
pub struct LibrarianBuilder {
    profiles: Vec<Arc<DeviceProfile>>,
    settings: Vec<(String, DeviceSettings)>,
    templates: Vec<(String, ParameterModel)>,
}

impl LibrarianBuilder {
    /// Register a device profile.
    pub fn device(mut self, profile: impl Into<Arc<DeviceProfile>>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    /// Settings for a registered device; defaults apply otherwise.
    pub fn settings(mut self, device: impl Into<String>, settings: DeviceSettings) -> Self {
        self.settings.push((device.into(), settings));
        self
    }

    /// Model incoming dumps for `device` start from, carrying values the
    /// device never sends (a table selector, for instance).
    pub fn template(mut self, device: impl Into<String>, model: ParameterModel) -> Self {
        self.templates.push((device.into(), model));
        self
    }

    /// Register every built-in device.
    #[cfg(feature = "devices")]
    pub fn with_builtin_devices(mut self) -> Result<Self> {
        self.profiles.extend(patchwire_devices::all_profiles()?);
        Ok(self)
    }

    pub fn build(self) -> Result<Librarian> {
        let mut devices: Vec<Registered> = Vec::with_capacity(self.profiles.len());
        for profile in self.profiles {
            if devices.iter().any(|d| d.profile.name() == profile.name()) {
                return Err(Error::DuplicateDevice(profile.name().to_string()));
            }
            devices.push(Registered {
                profile,
                settings: DeviceSettings::default(),
                template: None,
            });
        }

        let lookup = |devices: &mut Vec<Registered>, name: &str| -> Result<usize> {
            devices
                .iter()
                .position(|d| d.profile.name() == name)
                .ok_or_else(|| Error::UnknownDevice(name.to_string()))
        };
        for (name, settings) in self.settings {
            let i = lookup(&mut devices, &name)?;
            settings.validate(&devices[i].profile)?;
            devices[i].settings = settings;
        }
        for (name, model) in self.templates {
            let i = lookup(&mut devices, &name)?;
            devices[i].template = Some(model);
        }

        debug!("Librarian ready with {} device(s)", devices.len());
        Ok(Librarian { devices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchwire_core::{ByteOrder, ChecksumKind, ChecksumPolicy, Schema};
    use patchwire_sysex::{
        Address, AddressScheme, ChecksumSpan, ChecksumSpec, DeviceIdRange, Header, HeaderByte,
        LocationSpace, StoredAddress, WriteTarget,
    };

    fn tiny_profile(name: &str, manufacturer: u8) -> DeviceProfile {
        let schema = Schema::builder().simple("a").simple("b").build().unwrap();
        DeviceProfile::builder(name)
            .header(Header::new([
                HeaderByte::Fixed(manufacturer),
                HeaderByte::DeviceId,
                HeaderByte::Command,
            ]))
            .commands(0x10, 0x11, 0x12)
            .device_ids(DeviceIdRange::new(0, 15, 0))
            .addressing(AddressScheme::new(
                Address::new(&[0x7F, 0x00]),
                StoredAddress::Index14 {
                    order: ByteOrder::MsbFirst,
                    patches_per_bank: 8,
                },
            ))
            .block(schema, &[0x00, 0x00])
            .checksum(
                ChecksumSpec::new(ChecksumPolicy::new(ChecksumKind::Sum), ChecksumSpan::FromPayload)
                    .on(&[MessageKind::Dump]),
            )
            .locations(LocationSpace::new(8).bank("A", true))
            .build()
            .unwrap()
    }

    fn librarian() -> Librarian {
        Librarian::builder()
            .device(tiny_profile("One", 0x01))
            .device(tiny_profile("Two", 0x02))
            .build()
            .unwrap()
    }

    fn dump(lib: &Librarian, device: &str, a: i32) -> Vec<u8> {
        let session = lib.session(device).unwrap();
        let mut model = session.new_model();
        model.set("a", a).unwrap();
        session
            .builder()
            .dump(&model, WriteTarget::WorkingMemory)
            .unwrap()
            .concat()
    }

    #[test]
    fn test_recognize_routes_by_header() {
        let lib = librarian();
        let msg = dump(&lib, "Two", 5);
        assert_eq!(lib.recognize(&msg), Some(("Two", MessageKind::Dump)));
        assert_eq!(lib.recognize(&[0xF0, 0x7D, 0xF7]), None);
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let result = Librarian::builder()
            .device(tiny_profile("One", 0x01))
            .device(tiny_profile("One", 0x02))
            .build();
        assert_eq!(result.unwrap_err(), Error::DuplicateDevice("One".into()));
    }

    #[test]
    fn test_settings_for_unknown_device() {
        let result = Librarian::builder()
            .device(tiny_profile("One", 0x01))
            .settings("Nope", DeviceSettings::new())
            .build();
        assert_eq!(result.unwrap_err(), Error::UnknownDevice("Nope".into()));
    }

    #[test]
    fn test_settings_validated() {
        let result = Librarian::builder()
            .device(tiny_profile("One", 0x01))
            .settings("One", DeviceSettings::new().device_id(40))
            .build();
        assert!(matches!(result, Err(Error::Sysex(_))));
    }

    #[test]
    fn test_load_mixed_stream() {
        let lib = librarian();
        let mut stream = dump(&lib, "One", 3);
        stream.extend([0x00, 0x01]);
        stream.extend(dump(&lib, "Two", 9));

        let patches: Vec<LoadedPatch> = lib.load(&stream).into_iter().map(|p| p.unwrap()).collect();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].device, "One");
        assert_eq!(patches[0].model.get("a"), Some(3));
        assert_eq!(patches[1].device, "Two");
        assert_eq!(patches[1].model.get("a"), Some(9));
    }

    #[test]
    fn test_session_receive() {
        let lib = librarian();
        let msg = dump(&lib, "One", 7);
        let mut session = lib.session("One").unwrap();
        let patch = session.receive(&msg).unwrap().unwrap();
        assert_eq!(patch.model.get("a"), Some(7));
        assert_eq!(patch.location, None);
    }

    #[test]
    fn test_unknown_session() {
        assert!(matches!(
            librarian().session("Three"),
            Err(Error::UnknownDevice(_))
        ));
    }
}
