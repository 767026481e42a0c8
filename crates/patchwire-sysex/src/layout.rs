//! Message header layout, command codes and checksum placement.

use crate::error::{Error, Result};
use crate::frame::SYSEX_START;
use patchwire_core::ChecksumPolicy;

/// One byte of the fixed message header following F0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderByte {
    Fixed(u8),
    /// Wire device id (logical id plus the device's id offset).
    DeviceId,
    /// Message command code.
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Full patch (or one block of it).
    Dump,
    /// Dump request.
    Request,
    /// Single-parameter update.
    Parameter,
}

/// Command codes per message kind. Devices may share one code between kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commands {
    pub dump: u8,
    pub request: u8,
    pub parameter: u8,
}

impl Commands {
    pub fn code(&self, kind: MessageKind) -> u8 {
        match kind {
            MessageKind::Dump => self.dump,
            MessageKind::Request => self.request,
            MessageKind::Parameter => self.parameter,
        }
    }
}

/// Header bytes between F0 and the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(Vec<HeaderByte>);

impl Header {
    pub fn new(bytes: impl IntoIterator<Item = HeaderByte>) -> Self {
        Self(bytes.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let count = |b: HeaderByte| self.0.iter().filter(|h| **h == b).count();
        if count(HeaderByte::DeviceId) != 1 {
            return Err(Error::InvalidConfig(
                "header needs exactly one device id byte".into(),
            ));
        }
        if count(HeaderByte::Command) != 1 {
            return Err(Error::InvalidConfig(
                "header needs exactly one command byte".into(),
            ));
        }
        Ok(())
    }

    pub fn write(&self, out: &mut Vec<u8>, device_id: u8, command: u8) {
        out.extend(self.0.iter().map(|h| match h {
            HeaderByte::Fixed(b) => *b,
            HeaderByte::DeviceId => device_id & 0x7F,
            HeaderByte::Command => command,
        }));
    }

    /// Whether `msg` (starting at F0) carries this header with `command`.
    /// The device id byte is not compared.
    pub fn matches(&self, msg: &[u8], command: u8) -> bool {
        if msg.len() < self.len() + 1 || msg[0] != SYSEX_START {
            return false;
        }
        self.0.iter().zip(&msg[1..]).all(|(h, &b)| match h {
            HeaderByte::Fixed(f) => *f == b,
            HeaderByte::DeviceId => true,
            HeaderByte::Command => command == b,
        })
    }

    fn position(&self, byte: HeaderByte) -> Option<usize> {
        self.0.iter().position(|h| *h == byte).map(|p| p + 1)
    }

    /// Wire device id carried by `msg`.
    pub fn device_id(&self, msg: &[u8]) -> Option<u8> {
        msg.get(self.position(HeaderByte::DeviceId)?).copied()
    }

    pub fn command(&self, msg: &[u8]) -> Option<u8> {
        msg.get(self.position(HeaderByte::Command)?).copied()
    }
}

/// Where the checksummed range starts; it always ends at the last byte before the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumSpan {
    FromAddress,
    FromPayload,
}

/// Checksum policy, span and the message kinds that carry a checksum byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumSpec {
    pub policy: ChecksumPolicy,
    pub span: ChecksumSpan,
    kinds: Vec<MessageKind>,
}

impl ChecksumSpec {
    pub fn new(policy: ChecksumPolicy, span: ChecksumSpan) -> Self {
        Self {
            policy,
            span,
            kinds: Vec::new(),
        }
    }

    pub fn on(mut self, kinds: &[MessageKind]) -> Self {
        self.kinds.extend_from_slice(kinds);
        self
    }

    pub fn applies_to(&self, kind: MessageKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Valid logical device ids and how they map to the wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdRange {
    pub min: u8,
    pub max: u8,
    /// Added to the logical id to form the wire byte.
    pub offset: i8,
}

impl DeviceIdRange {
    pub fn new(min: u8, max: u8, offset: i8) -> Self {
        Self { min, max, offset }
    }

    pub fn contains(&self, id: u8) -> bool {
        (self.min..=self.max).contains(&id)
    }

    /// Wire byte for a logical id; ids outside the range (or whose wire byte
    /// leaves 0..=127) are rejected.
    pub fn wire(&self, id: u8) -> Result<u8> {
        let wire = id as i16 + self.offset as i16;
        if !self.contains(id) || !(0..=127).contains(&wire) {
            return Err(Error::InvalidDeviceId {
                id,
                min: self.min,
                max: self.max,
            });
        }
        Ok(wire as u8)
    }

    /// Logical id for a wire byte.
    pub fn logical(&self, wire: u8) -> u8 {
        (wire as i16 - self.offset as i16).clamp(0, 127) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roland_header() -> Header {
        Header::new([
            HeaderByte::Fixed(0x41),
            HeaderByte::DeviceId,
            HeaderByte::Fixed(0x46),
            HeaderByte::Command,
        ])
    }

    #[test]
    fn test_header_write_and_match() {
        let header = roland_header();
        let mut out = vec![SYSEX_START];
        header.write(&mut out, 0x10, 0x12);
        assert_eq!(out, vec![0xF0, 0x41, 0x10, 0x46, 0x12]);

        assert!(header.matches(&out, 0x12));
        assert!(!header.matches(&out, 0x11));
        // id byte is ignored
        assert!(header.matches(&[0xF0, 0x41, 0x1F, 0x46, 0x12], 0x12));
        assert_eq!(header.device_id(&out), Some(0x10));
        assert_eq!(header.command(&out), Some(0x12));
    }

    #[test]
    fn test_header_validation() {
        assert!(roland_header().validate().is_ok());
        assert!(Header::new([HeaderByte::Fixed(0x41), HeaderByte::Command])
            .validate()
            .is_err());
    }

    #[test]
    fn test_device_id_offset() {
        let ids = DeviceIdRange::new(17, 32, -1);
        assert_eq!(ids.wire(17).unwrap(), 16);
        assert_eq!(ids.logical(16), 17);
        assert_eq!(
            ids.wire(16).unwrap_err(),
            Error::InvalidDeviceId {
                id: 16,
                min: 17,
                max: 32
            }
        );
        assert!(DeviceIdRange::new(0, 127, 0).wire(128).is_err());
    }
}
