//! Parameter model and schema-driven payload codec for hardware synth patches.
//!
//! # Primary API
//!
//! - [`Schema`] / [`SchemaBuilder`]: Ordered slot table of one message payload
//! - [`ParameterSet`] / [`ParameterModel`]: Declared parameters and one patch's values
//! - [`Transcoder`]: Payload bytes ↔ model
//! - [`ChecksumPolicy`]: Checksum computation and verification
//! - [`LookupTable`] / [`TableResolver`]: Device code remapping
//!
//! # Example
//!
//! ```
//! use patchwire_core::prelude::*;
//! use std::sync::Arc;
//!
//! let schema = Schema::builder()
//!     .simple("a")
//!     .packed([
//!         PackedField::new("b", 3),
//!         PackedField::new("c", 1),
//!         PackedField::new("d", 3),
//!     ])
//!     .two_byte("e", ByteOrder::MsbFirst, Transform::Offset(8192))
//!     .build()?;
//! let params = Arc::new(ParameterSet::builder().schema(&schema).build()?);
//! let tables = StaticTables::new();
//!
//! let codec = Transcoder::new(&schema, &tables);
//! let (model, _warnings) = codec.decode(params, &[5, 0b1011010, 0x10, 0x20])?;
//! assert_eq!(model.get("e"), Some(-6112));
//! assert_eq!(codec.encode(&model)?, vec![5, 0b1011010, 0x10, 0x20]);
//! # Ok::<(), patchwire_core::Error>(())
//! ```

pub mod bits;
pub mod checksum;
pub mod error;
pub mod parameter;
pub mod schema;
pub mod table;
pub mod transcode;

pub use checksum::{ChecksumError, ChecksumKind, ChecksumPolicy};
pub use error::{Error, Result, Warning};
pub use parameter::{
    ParameterModel, ParameterSet, ParameterSetBuilder, ParameterSpec, ParameterStatus,
    PatchSnapshot, TextSpec, PATCH_NAME,
};
pub use schema::{ByteOrder, PackedField, Schema, SchemaBuilder, SchemaEntry, Transform};
pub use table::{LookupTable, StaticTables, TableResolver};
pub use transcode::{decode_text, Transcoder};

pub mod prelude {
    pub use crate::{
        ByteOrder, ChecksumKind, ChecksumPolicy, Error, LookupTable, PackedField, ParameterModel,
        ParameterSet, PatchSnapshot, Result, Schema, StaticTables, TableResolver, Transcoder,
        Transform, Warning,
    };
}
