//! Per-device user settings.

use crate::address::WriteTarget;
use crate::error::{Error, Result};
use crate::profile::DeviceProfile;
use patchwire_core::ChecksumPolicy;
use serde::{Deserialize, Serialize};

/// Override of the device's checksum strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChecksumMode {
    #[default]
    DeviceDefault,
    /// Reject messages with a bad checksum.
    Strict,
    /// Report bad checksums as warnings and keep decoding.
    Lenient,
}

impl ChecksumMode {
    pub fn apply(self, policy: ChecksumPolicy) -> ChecksumPolicy {
        match self {
            ChecksumMode::DeviceDefault => policy,
            ChecksumMode::Strict => policy.strict(true),
            ChecksumMode::Lenient => policy.strict(false),
        }
    }
}

/// Settings for talking to one physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Logical device id; `None` uses the lowest id the device accepts.
    pub device_id: Option<u8>,
    /// MIDI channel for patch changes (0-15).
    pub channel: u8,
    pub checksum: ChecksumMode,
    /// Default destination of outgoing dumps.
    pub write_target: WriteTarget,
}

impl DeviceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_id(mut self, id: u8) -> Self {
        self.device_id = Some(id);
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn checksum(mut self, mode: ChecksumMode) -> Self {
        self.checksum = mode;
        self
    }

    pub fn write_target(mut self, target: WriteTarget) -> Self {
        self.write_target = target;
        self
    }

    /// Logical device id to use with `profile`.
    pub fn resolved_device_id(&self, profile: &DeviceProfile) -> u8 {
        self.device_id.unwrap_or(profile.id_range().min)
    }

    pub fn validate(&self, profile: &DeviceProfile) -> Result<()> {
        profile.id_range().wire(self.resolved_device_id(profile))?;
        if self.channel > 15 {
            return Err(Error::InvalidConfig(format!(
                "channel {} out of range (0-15)",
                self.channel
            )));
        }
        if let WriteTarget::Stored(loc) = self.write_target {
            profile.locations().validate(loc)?;
        }
        Ok(())
    }
}
