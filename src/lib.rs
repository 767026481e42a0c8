//! # Patchwire - Synthesizer Patch Codec
//!
//! Reads and writes hardware synth patches over MIDI system exclusive.
//!
//! ## Architecture
//!
//! Patchwire is an umbrella crate that coordinates:
//! - **patchwire-core** - Parameter model, byte schemas, lookup tables, value transcoding, checksums
//! - **patchwire-sysex** - Framing, addressing, device profiles, message building, dump assembly
//! - **patchwire-devices** - Built-in device profiles (Roland JV-880, Waldorf Blofeld, E-mu Planet Phatt family)
//!
//! The [`Librarian`] sits on top: it routes incoming messages to the right
//! device, splits `.syx` files and collects complete patches.
//!
//! ## Quick Start
//!
//! ```ignore
//! use patchwire::prelude::*;
//!
//! let librarian = Librarian::builder()
//!     .with_builtin_devices()?
//!     .settings("Roland JV-880", DeviceSettings::new().device_id(17))
//!     .build()?;
//!
//! // Edit a patch and send it to the card bank
//! let session = librarian.session("Roland JV-880")?;
//! let mut patch = session.new_model();
//! patch.set_text("name", "Warm Strings")?;
//! patch.set("reverbtype", 4)?;
//! let messages = session
//!     .builder()
//!     .dump(&patch, WriteTarget::Stored(PatchLocation::new(1, 0)))?;
//!
//! // Read patches back from a file
//! for loaded in librarian.load(&std::fs::read("bank.syx")?) {
//!     let loaded = loaded?;
//!     println!("{} {:?}: {:?}", loaded.device, loaded.location, loaded.model.name());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Built-in devices
//! - `devices` - Roland JV-880, Waldorf Blofeld and E-mu Planet Phatt family profiles

mod error;
mod librarian;

pub use error::{Error, Result};
pub use librarian::{DeviceSession, Librarian, LibrarianBuilder, LoadedPatch};

// Core types
pub use patchwire_core::{
    ByteOrder, ChecksumError, ChecksumKind, ChecksumPolicy, LookupTable, PackedField,
    ParameterModel, ParameterSet, ParameterSpec, PatchSnapshot, Schema, StaticTables,
    TableResolver, Transcoder, Transform, Warning, PATCH_NAME,
};

// Sysex layer
pub use patchwire_sysex::{
    split_messages, Address, AddressScheme, AssembledPatch, ChecksumMode, ChecksumSpan,
    ChecksumSpec, ChunkAssembler, DeviceIdRange, DeviceProfile, DeviceProfileBuilder,
    DeviceSettings, Header, HeaderByte, LocationSpace, MessageBuilder, MessageKind,
    ParamAddressing, ParameterUpdate, PatchChangeMap, PatchLocation, Progress, StoredAddress,
    TimingHints, WriteTarget,
};

/// Built-in device profiles
#[cfg(feature = "devices")]
pub mod devices {
    pub use patchwire_devices::*;
}

pub mod prelude {
    pub use crate::{DeviceSession, Error, Librarian, LoadedPatch, Result};

    pub use patchwire_core::{
        ByteOrder, ChecksumKind, ChecksumPolicy, LookupTable, PackedField, ParameterModel,
        ParameterSet, Schema, TableResolver, Transform, Warning, PATCH_NAME,
    };

    pub use patchwire_sysex::{
        ChecksumMode, ChecksumSpan, ChecksumSpec, ChunkAssembler, DeviceIdRange, DeviceProfile,
        DeviceSettings, Header, HeaderByte, LocationSpace, MessageBuilder, MessageKind,
        ParamAddressing, PatchChangeMap, PatchLocation, Progress, TimingHints, WriteTarget,
    };

    #[cfg(feature = "devices")]
    pub use patchwire_devices::{all_profiles, PhattTables, SynthType};
}
