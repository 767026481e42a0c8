//! Device profiles.
//!
//! A [`DeviceProfile`] is the complete, immutable description of one synth
//! model: header layout, command codes, addressing, payload schemas per block,
//! checksum rule, parameter declarations, lookup tables, patch-change routing,
//! timing hints and the patch location space. Profiles are data; the message
//! builder, assembler and update parser are generic over them.

use crate::address::{Address, AddressScheme, LocationSpace};
use crate::config::DeviceSettings;
use crate::error::{Error, Result};
use crate::frame::is_framed;
use crate::layout::{
    ChecksumSpan, ChecksumSpec, Commands, DeviceIdRange, Header, MessageKind,
};
use crate::patch_change::PatchChangeMap;
use crate::timing::TimingHints;
use patchwire_core::{
    ByteOrder, ChecksumPolicy, ParameterModel, ParameterSet, Schema, SchemaEntry, StaticTables,
    TableResolver, Transcoder, Warning,
};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::warn;

/// One message of a (possibly multi-message) patch dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub schema: Schema,
    /// Added to the patch base address to address this block.
    pub address_delta: Address,
}

impl BlockSpec {
    pub fn new(schema: Schema, address_delta: Address) -> Self {
        Self {
            schema,
            address_delta,
        }
    }
}

/// How single-parameter updates are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamAddressing {
    /// Block address plus the slot's byte offset; the payload is the whole slot.
    BlockOffset,
    /// `prefix`, then `byte offset / stride` as two 7-bit bytes, then `stride` value bytes.
    Index14 {
        prefix: Vec<u8>,
        order: ByteOrder,
        stride: usize,
    },
}

/// A recognized message cut into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageParts<'a> {
    pub kind: MessageKind,
    /// Wire device id byte.
    pub device_id: u8,
    /// Address bytes, or the prefix and parameter index of an indexed update.
    pub address: &'a [u8],
    pub payload: &'a [u8],
    pub checksum: Option<u8>,
    covered: &'a [u8],
}

impl MessageParts<'_> {
    /// Check the checksum byte, if the message carries one.
    ///
    /// A mismatch is an error under a strict policy and a warning otherwise.
    pub fn verify(&self, policy: &ChecksumPolicy) -> Result<Option<Warning>> {
        let Some(found) = self.checksum else {
            return Ok(None);
        };
        match policy.verify(self.covered, found) {
            Ok(()) => Ok(None),
            Err(e) if policy.strict => Err(e.into()),
            Err(e) => {
                warn!("{}, keeping data", e);
                Ok(Some(Warning::Checksum(e)))
            }
        }
    }
}

pub struct DeviceProfile {
    name: String,
    header: Header,
    commands: Commands,
    id_range: DeviceIdRange,
    addressing: AddressScheme,
    blocks: Vec<BlockSpec>,
    checksum: Option<ChecksumSpec>,
    request_suffix: Vec<u8>,
    param_addressing: ParamAddressing,
    parameters: Arc<ParameterSet>,
    tables: Arc<dyn TableResolver>,
    patch_change: PatchChangeMap,
    timing: TimingHints,
    locations: LocationSpace,
}

impl fmt::Debug for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceProfile")
            .field("name", &self.name)
            .field("blocks", &self.blocks.len())
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

impl DeviceProfile {
    pub fn builder(name: impl Into<String>) -> DeviceProfileBuilder {
        DeviceProfileBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn id_range(&self) -> &DeviceIdRange {
        &self.id_range
    }

    pub fn addressing(&self) -> &AddressScheme {
        &self.addressing
    }

    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn checksum(&self) -> Option<&ChecksumSpec> {
        self.checksum.as_ref()
    }

    /// Checksum policy with the settings' strictness override applied.
    pub fn checksum_policy(&self, settings: &DeviceSettings) -> Option<ChecksumPolicy> {
        self.checksum
            .as_ref()
            .map(|c| settings.checksum.apply(c.policy))
    }

    pub fn request_suffix(&self) -> &[u8] {
        &self.request_suffix
    }

    pub fn param_addressing(&self) -> &ParamAddressing {
        &self.param_addressing
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.parameters
    }

    pub fn tables(&self) -> &dyn TableResolver {
        self.tables.as_ref()
    }

    pub fn patch_change(&self) -> &PatchChangeMap {
        &self.patch_change
    }

    pub fn timing(&self) -> &TimingHints {
        &self.timing
    }

    pub fn locations(&self) -> &LocationSpace {
        &self.locations
    }

    /// A model holding every parameter's default.
    pub fn new_model(&self) -> ParameterModel {
        ParameterModel::new(self.parameters.clone())
    }

    /// Payload codec for block `block`.
    pub fn transcoder(&self, block: usize) -> Option<Transcoder<'_>> {
        self.blocks
            .get(block)
            .map(|b| Transcoder::new(&b.schema, self.tables.as_ref()))
    }

    /// Block, slot and byte offset carrying `name`.
    pub fn find_slot(&self, name: &str) -> Option<(usize, &SchemaEntry, usize)> {
        self.blocks
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.schema.find(name).map(|(e, o)| (i, e, o)))
    }

    fn has_checksum(&self, kind: MessageKind) -> bool {
        self.checksum.as_ref().is_some_and(|c| c.applies_to(kind))
    }

    /// F0, header, checksum byte (if any) and F7.
    fn overhead(&self, kind: MessageKind) -> usize {
        2 + self.header.len() + usize::from(self.has_checksum(kind))
    }

    fn param_address_len(&self) -> usize {
        match &self.param_addressing {
            ParamAddressing::BlockOffset => self.addressing.width(),
            ParamAddressing::Index14 { prefix, .. } => prefix.len() + 2,
        }
    }

    /// Total length of the dump message for block `block`.
    pub fn dump_message_len(&self, block: usize) -> Option<usize> {
        self.blocks.get(block).map(|b| {
            self.overhead(MessageKind::Dump) + self.addressing.width() + b.schema.byte_len()
        })
    }

    /// Length of all dump messages back to back.
    pub fn dump_len(&self) -> usize {
        (0..self.blocks.len())
            .filter_map(|i| self.dump_message_len(i))
            .sum()
    }

    pub fn request_len(&self) -> usize {
        self.overhead(MessageKind::Request) + self.addressing.width() + self.request_suffix.len()
    }

    /// Accepted lengths of a single-parameter update.
    pub fn parameter_len(&self) -> RangeInclusive<usize> {
        let base = self.overhead(MessageKind::Parameter) + self.param_address_len();
        match &self.param_addressing {
            ParamAddressing::BlockOffset => {
                let widest = self
                    .blocks
                    .iter()
                    .flat_map(|b| b.schema.entries())
                    .map(SchemaEntry::width)
                    .max()
                    .unwrap_or(1);
                base + 1..=base + widest
            }
            ParamAddressing::Index14 { stride, .. } => base + stride..=base + stride,
        }
    }

    /// Identify a message by header, command and length. The device id byte
    /// is ignored.
    pub fn recognize(&self, msg: &[u8]) -> Option<MessageKind> {
        if !is_framed(msg) {
            return None;
        }
        if self.header.matches(msg, self.commands.dump)
            && (0..self.blocks.len()).any(|i| self.dump_message_len(i) == Some(msg.len()))
        {
            return Some(MessageKind::Dump);
        }
        if self.header.matches(msg, self.commands.request) && msg.len() == self.request_len() {
            return Some(MessageKind::Request);
        }
        if self.header.matches(msg, self.commands.parameter)
            && self.parameter_len().contains(&msg.len())
        {
            return Some(MessageKind::Parameter);
        }
        None
    }

    /// Recognize and cut a message into address, payload and checksum.
    pub fn parse<'a>(&self, msg: &'a [u8]) -> Result<MessageParts<'a>> {
        let kind = self.recognize(msg).ok_or_else(|| {
            Error::UnrecognizedMessage(format!(
                "{} bytes not recognized by {}",
                msg.len(),
                self.name
            ))
        })?;
        let device_id = self.header.device_id(msg).unwrap_or_default();
        let has_checksum = self.has_checksum(kind);
        let body_end = msg.len() - 1 - usize::from(has_checksum);
        let body = &msg[1 + self.header.len()..body_end];
        let address_len = match kind {
            MessageKind::Parameter => self.param_address_len(),
            MessageKind::Dump | MessageKind::Request => self.addressing.width(),
        };
        let (address, payload) = body.split_at(address_len);
        let covered = match self.checksum.as_ref().map(|c| c.span) {
            Some(ChecksumSpan::FromPayload) => payload,
            _ => body,
        };
        Ok(MessageParts {
            kind,
            device_id,
            address,
            payload,
            checksum: has_checksum.then(|| msg[body_end]),
            covered,
        })
    }
}

/// Fluent builder for [`DeviceProfile`]; `build()` validates the whole profile.
pub struct DeviceProfileBuilder {
    name: String,
    header: Option<Header>,
    commands: Option<Commands>,
    id_range: DeviceIdRange,
    addressing: Option<AddressScheme>,
    blocks: Vec<BlockSpec>,
    checksum: Option<ChecksumSpec>,
    request_suffix: Vec<u8>,
    param_addressing: ParamAddressing,
    parameters: Option<ParameterSet>,
    tables: Arc<dyn TableResolver>,
    patch_change: PatchChangeMap,
    timing: TimingHints,
    locations: Option<LocationSpace>,
}

impl DeviceProfileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: None,
            commands: None,
            id_range: DeviceIdRange::new(0, 127, 0),
            addressing: None,
            blocks: Vec::new(),
            checksum: None,
            request_suffix: Vec::new(),
            param_addressing: ParamAddressing::BlockOffset,
            parameters: None,
            tables: Arc::new(StaticTables::new()),
            patch_change: PatchChangeMap::new(),
            timing: TimingHints::default(),
            locations: None,
        }
    }

    pub fn header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }

    pub fn commands(mut self, dump: u8, request: u8, parameter: u8) -> Self {
        self.commands = Some(Commands {
            dump,
            request,
            parameter,
        });
        self
    }

    pub fn device_ids(mut self, range: DeviceIdRange) -> Self {
        self.id_range = range;
        self
    }

    pub fn addressing(mut self, scheme: AddressScheme) -> Self {
        self.addressing = Some(scheme);
        self
    }

    /// Append a dump block.
    pub fn block(mut self, schema: Schema, address_delta: &[u8]) -> Self {
        self.blocks
            .push(BlockSpec::new(schema, Address::new(address_delta)));
        self
    }

    pub fn checksum(mut self, spec: ChecksumSpec) -> Self {
        self.checksum = Some(spec);
        self
    }

    /// Bytes following the address of a dump request.
    pub fn request_suffix(mut self, suffix: &[u8]) -> Self {
        self.request_suffix = suffix.to_vec();
        self
    }

    pub fn parameter_addressing(mut self, addressing: ParamAddressing) -> Self {
        self.param_addressing = addressing;
        self
    }

    /// Parameter declarations. Defaults to the natural ranges of the block schemas.
    pub fn parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn tables(mut self, tables: impl TableResolver + 'static) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    pub fn patch_change(mut self, map: PatchChangeMap) -> Self {
        self.patch_change = map;
        self
    }

    pub fn timing(mut self, timing: TimingHints) -> Self {
        self.timing = timing;
        self
    }

    pub fn locations(mut self, locations: LocationSpace) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn build(self) -> Result<DeviceProfile> {
        let invalid = |msg: String| Error::InvalidConfig(format!("{}: {msg}", self.name));

        let header = self.header.clone().ok_or_else(|| invalid("missing header".into()))?;
        header.validate()?;
        let commands = self
            .commands
            .ok_or_else(|| invalid("missing command codes".into()))?;
        let addressing = self
            .addressing
            .clone()
            .ok_or_else(|| invalid("missing address scheme".into()))?;
        addressing.validate()?;
        if self.id_range.min > self.id_range.max || self.id_range.max > 127 {
            return Err(invalid(format!(
                "device id range {}..={} outside 0..=127",
                self.id_range.min, self.id_range.max
            )));
        }
        if self.blocks.is_empty() {
            return Err(invalid("at least one dump block is required".into()));
        }
        if let Some(block) = self
            .blocks
            .iter()
            .position(|b| b.address_delta.len() != addressing.width())
        {
            return Err(invalid(format!(
                "block {block} address delta width differs from the address width"
            )));
        }

        let parameters = match self.parameters.clone() {
            Some(p) => p,
            None => self
                .blocks
                .iter()
                .fold(ParameterSet::builder(), |b, block| b.schema(&block.schema))
                .build()?,
        };
        for block in &self.blocks {
            if let Some(name) = block
                .schema
                .names()
                .find(|n| !parameters.contains(n) && parameters.text(n).is_none())
            {
                return Err(invalid(format!("schema slot '{name}' is not declared")));
            }
        }

        if let ParamAddressing::Index14 { stride, .. } = &self.param_addressing {
            if *stride == 0 || self.blocks.len() != 1 {
                return Err(invalid(
                    "indexed parameter updates need a positive stride and a single block".into(),
                ));
            }
            let schema = &self.blocks[0].schema;
            let misaligned = schema
                .entries()
                .iter()
                .enumerate()
                .any(|(i, e)| {
                    e.width() % stride != 0
                        || schema.offset_of(i).is_some_and(|o| o % stride != 0)
                });
            if misaligned {
                return Err(invalid(format!("slots are not aligned to stride {stride}")));
            }
        }

        let locations = self
            .locations
            .clone()
            .ok_or_else(|| invalid("missing location space".into()))?;
        if locations.banks().is_empty() || locations.patches_per_bank() == 0 {
            return Err(invalid("location space is empty".into()));
        }

        Ok(DeviceProfile {
            name: self.name,
            header,
            commands,
            id_range: self.id_range,
            addressing,
            blocks: self.blocks,
            checksum: self.checksum,
            request_suffix: self.request_suffix,
            param_addressing: self.param_addressing,
            parameters: Arc::new(parameters),
            tables: self.tables,
            patch_change: self.patch_change,
            timing: self.timing,
            locations,
        })
    }
}
