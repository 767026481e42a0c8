//! Outbound message construction.

use crate::address::{Address, PatchLocation, WriteTarget};
use crate::config::DeviceSettings;
use crate::error::{Error, Result};
use crate::frame::{SYSEX_END, SYSEX_START};
use crate::layout::{ChecksumSpan, MessageKind};
use crate::profile::{DeviceProfile, ParamAddressing};
use patchwire_core::bits::split_value;
use patchwire_core::ParameterModel;
use tracing::{debug, trace};

/// Builds dumps, parameter updates, dump requests and patch changes for one device.
///
/// The device id and channel are validated once, at construction.
#[derive(Debug, Clone)]
pub struct MessageBuilder<'a> {
    profile: &'a DeviceProfile,
    settings: DeviceSettings,
    device_id: u8,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(profile: &'a DeviceProfile, settings: &DeviceSettings) -> Result<Self> {
        settings.validate(profile)?;
        let device_id = profile
            .id_range()
            .wire(settings.resolved_device_id(profile))?;
        Ok(Self {
            profile,
            settings: *settings,
            device_id,
        })
    }

    pub fn profile(&self) -> &'a DeviceProfile {
        self.profile
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Wire device id byte.
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    fn frame(&self, kind: MessageKind, address: &[u8], payload: &[u8]) -> Vec<u8> {
        let header = self.profile.header();
        let mut out = Vec::with_capacity(header.len() + address.len() + payload.len() + 3);
        out.push(SYSEX_START);
        header.write(
            &mut out,
            self.device_id,
            self.profile.commands().code(kind),
        );
        let body_start = out.len();
        out.extend_from_slice(address);
        out.extend_from_slice(payload);

        if let Some(spec) = self.profile.checksum().filter(|c| c.applies_to(kind)) {
            let start = match spec.span {
                ChecksumSpan::FromAddress => body_start,
                ChecksumSpan::FromPayload => body_start + address.len(),
            };
            let sum = spec.policy.kind.compute(&out[start..]);
            out.push(sum);
        }
        out.push(SYSEX_END);
        out
    }

    /// Base address for writing to `target`.
    ///
    /// Locations the device cannot write to fall back to working memory.
    fn write_address(&self, target: WriteTarget) -> Result<Address> {
        let scheme = self.profile.addressing();
        if let WriteTarget::Stored(loc) = target {
            self.profile.locations().validate(loc)?;
            match scheme.stored_address(loc) {
                Some(addr) if self.profile.locations().is_writable(loc) => return Ok(addr),
                _ => debug!(
                    "{}: bank {} is read-only, writing to working memory",
                    self.profile.name(),
                    loc.bank
                ),
            }
        }
        Ok(scheme.working().clone())
    }

    /// Full patch dump, one message per block.
    pub fn dump(&self, model: &ParameterModel, target: WriteTarget) -> Result<Vec<Vec<u8>>> {
        let base = self.write_address(target)?;
        let mut messages = Vec::with_capacity(self.profile.block_count());
        for (i, block) in self.profile.blocks().iter().enumerate() {
            let payload = self
                .profile
                .transcoder(i)
                .ok_or_else(|| Error::InvalidConfig(format!("missing block {i}")))?
                .encode(model)?;
            let address = base.offset(block.address_delta.as_bytes());
            messages.push(self.frame(MessageKind::Dump, address.as_bytes(), &payload));
        }
        Ok(messages)
    }

    /// Full patch dump to the settings' default target.
    pub fn dump_to_default(&self, model: &ParameterModel) -> Result<Vec<Vec<u8>>> {
        self.dump(model, self.settings.write_target)
    }

    /// Messages sending the current value of `name` to working memory.
    ///
    /// Packed sub-fields resend the whole packed byte. Parameters that never
    /// travel on the wire produce no messages.
    pub fn parameter_update(&self, model: &ParameterModel, name: &str) -> Result<Vec<Vec<u8>>> {
        let Some((block, entry, offset)) = self.profile.find_slot(name) else {
            let params = self.profile.parameters();
            if params.contains(name) || params.text(name).is_some() {
                trace!("{}: '{}' has no wire slot", self.profile.name(), name);
                return Ok(Vec::new());
            }
            return Err(patchwire_core::Error::UnknownParameter(name.to_string()).into());
        };
        let bytes = self
            .profile
            .transcoder(block)
            .ok_or_else(|| Error::InvalidConfig(format!("missing block {block}")))?
            .encode_slot(entry, model)?;

        match self.profile.param_addressing() {
            ParamAddressing::BlockOffset => {
                let delta = &self.profile.blocks()[block].address_delta;
                let address = self
                    .profile
                    .addressing()
                    .working()
                    .offset(delta.as_bytes())
                    .add(offset as u64);
                Ok(vec![self.frame(MessageKind::Parameter, address.as_bytes(), &bytes)])
            }
            ParamAddressing::Index14 {
                prefix,
                order,
                stride,
            } => Ok(bytes
                .chunks(*stride)
                .enumerate()
                .map(|(k, value)| {
                    let index = (offset / stride + k) as u16;
                    let mut address = prefix.clone();
                    address.extend_from_slice(&order.arrange(split_value(index, 7)));
                    self.frame(MessageKind::Parameter, &address, value)
                })
                .collect()),
        }
    }

    /// Request for the patch at `target`.
    ///
    /// Banks without a stored address are requested from working memory.
    pub fn dump_request(&self, target: WriteTarget) -> Result<Vec<u8>> {
        let scheme = self.profile.addressing();
        let address = match target {
            WriteTarget::WorkingMemory => scheme.working().clone(),
            WriteTarget::Stored(loc) => {
                self.profile.locations().validate(loc)?;
                scheme.stored_address(loc).unwrap_or_else(|| {
                    debug!(
                        "{}: bank {} has no address, requesting working memory",
                        self.profile.name(),
                        loc.bank
                    );
                    scheme.working().clone()
                })
            }
        };
        Ok(self.frame(
            MessageKind::Request,
            address.as_bytes(),
            self.profile.request_suffix(),
        ))
    }

    /// Bank select and program change for `loc` on the configured channel.
    pub fn patch_change(&self, loc: PatchLocation) -> Result<Vec<Vec<u8>>> {
        self.profile.locations().validate(loc)?;
        self.profile
            .patch_change()
            .to_bytes(self.settings.channel, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::tests::two_block_profile;
    use patchwire_core::ChecksumKind;

    #[test]
    fn test_rejects_bad_device_id() {
        let profile = two_block_profile();
        let err = MessageBuilder::new(&profile, &DeviceSettings::new().device_id(5)).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidDeviceId {
                id: 5,
                min: 17,
                max: 32
            }
        );
    }

    #[test]
    fn test_request_layout() {
        let profile = two_block_profile();
        let builder = MessageBuilder::new(&profile, &DeviceSettings::new()).unwrap();
        let msg = builder.dump_request(WriteTarget::WorkingMemory).unwrap();
        let cs = ChecksumKind::SumNegate.compute(&[0x00, 0x08, 0x20, 0x00, 0x00, 0x00, 0x0C, 0x00]);
        assert_eq!(
            msg,
            vec![0xF0, 0x41, 0x10, 0x46, 0x11, 0x00, 0x08, 0x20, 0x00, 0x00, 0x00, 0x0C, 0x00, cs, 0xF7]
        );
        assert_eq!(profile.recognize(&msg), Some(MessageKind::Request));
    }

    #[test]
    fn test_dump_addresses_per_block() {
        let profile = two_block_profile();
        let builder = MessageBuilder::new(&profile, &DeviceSettings::new()).unwrap();
        let model = profile.new_model();

        let msgs = builder
            .dump(&model, WriteTarget::Stored(PatchLocation::new(0, 3)))
            .unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(&msgs[0][5..9], &[0x01, 0x43, 0x20, 0x00]);
        assert_eq!(&msgs[1][5..9], &[0x01, 0x43, 0x28, 0x00]);
        for (i, msg) in msgs.iter().enumerate() {
            assert_eq!(Some(msg.len()), profile.dump_message_len(i));
        }
    }

    #[test]
    fn test_read_only_bank_writes_working_memory() {
        let profile = two_block_profile();
        let builder = MessageBuilder::new(&profile, &DeviceSettings::new()).unwrap();
        let msgs = builder
            .dump(&profile.new_model(), WriteTarget::Stored(PatchLocation::new(1, 0)))
            .unwrap();
        assert_eq!(&msgs[0][5..9], &[0x00, 0x08, 0x20, 0x00]);
    }

    #[test]
    fn test_parameter_update_block_offset() {
        let profile = two_block_profile();
        let builder = MessageBuilder::new(&profile, &DeviceSettings::new()).unwrap();
        let mut model = profile.new_model();
        model.set("pan", -10).unwrap();

        let msgs = builder.parameter_update(&model, "pan").unwrap();
        // tone block at 00 08 28 00, pan after the two nibble bytes
        let cs = ChecksumKind::SumNegate.compute(&[0x00, 0x08, 0x28, 0x02, 54]);
        assert_eq!(
            msgs,
            vec![vec![0xF0, 0x41, 0x10, 0x46, 0x12, 0x00, 0x08, 0x28, 0x02, 54, cs, 0xF7]]
        );
    }

    #[test]
    fn test_parameter_update_packed_and_unknown() {
        let profile = two_block_profile();
        let builder = MessageBuilder::new(&profile, &DeviceSettings::new()).unwrap();
        let mut model = profile.new_model();
        model.set("mode", 5).unwrap();
        model.set("hold", 1).unwrap();

        let msgs = builder.parameter_update(&model, "hold").unwrap();
        assert_eq!(msgs[0][9], 0b101_1);
        assert!(matches!(
            builder.parameter_update(&model, "nope"),
            Err(Error::Core(patchwire_core::Error::UnknownParameter(_)))
        ));
    }
}
