//! Sysex layer for hardware synth patches.
//!
//! Sits on top of `patchwire-core` and turns payloads into complete device
//! messages and back.
//!
//! # Primary API
//!
//! - [`DeviceProfile`]: Everything one device model needs (header, addressing, blocks, checksum)
//! - [`MessageBuilder`]: Dumps, dump requests, single-parameter updates and patch changes
//! - [`ChunkAssembler`]: Incoming multi-block dumps, one block at a time
//! - [`apply_parameter_update`]: Incoming single-parameter messages
//! - [`DeviceSettings`]: Per-connection device id, channel, checksum strictness and write target
//!
//! Profiles for real devices live in `patchwire-devices`.

pub mod address;
pub mod assembler;
pub mod config;
pub mod error;
pub mod frame;
pub mod layout;
pub mod message;
pub mod patch_change;
pub mod profile;
pub mod timing;
pub mod update;

pub use address::{
    Address, AddressScheme, Bank, LocationSpace, PatchLocation, StoredAddress, WriteTarget,
};
pub use assembler::{AssembledPatch, AssemblyState, ChunkAssembler, Progress};
pub use config::{ChecksumMode, DeviceSettings};
pub use error::{Error, Result};
pub use frame::{is_framed, split_messages, SYSEX_END, SYSEX_START};
pub use layout::{
    ChecksumSpan, ChecksumSpec, Commands, DeviceIdRange, Header, HeaderByte, MessageKind,
};
pub use message::MessageBuilder;
pub use patch_change::{BankRoute, BankSelect, PatchChangeMap};
pub use profile::{BlockSpec, DeviceProfile, DeviceProfileBuilder, MessageParts, ParamAddressing};
pub use timing::TimingHints;
pub use update::{apply_parameter_update, ParameterUpdate};

pub mod prelude {
    pub use crate::{
        Address, AddressScheme, ChecksumMode, ChecksumSpan, ChecksumSpec, ChunkAssembler,
        DeviceIdRange, DeviceProfile, DeviceSettings, Header, HeaderByte, LocationSpace,
        MessageBuilder, MessageKind, ParamAddressing, PatchChangeMap, PatchLocation, Progress,
        StoredAddress, TimingHints, WriteTarget,
    };
    pub use patchwire_core::prelude::*;
}
