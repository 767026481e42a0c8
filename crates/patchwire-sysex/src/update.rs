//! Incoming single-parameter updates.

use crate::address::Address;
use crate::config::DeviceSettings;
use crate::error::{Error, Result};
use crate::layout::MessageKind;
use crate::profile::{DeviceProfile, ParamAddressing};
use patchwire_core::bits::join_value;
use patchwire_core::{decode_text, ParameterModel, SchemaEntry, Warning};

/// Result of applying one update message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterUpdate {
    /// Parameters and text keys whose value changed.
    pub changed: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Decode one parameter update into `model`, touching only the addressed slot.
///
/// Updates addressing part of a text field replace just those characters.
pub fn apply_parameter_update(
    profile: &DeviceProfile,
    settings: &DeviceSettings,
    msg: &[u8],
    model: &mut ParameterModel,
) -> Result<ParameterUpdate> {
    let parts = profile.parse(msg)?;
    if parts.kind != MessageKind::Parameter {
        return Err(Error::UnrecognizedMessage(format!(
            "expected a parameter update, got {:?}",
            parts.kind
        )));
    }
    let mut warnings = Vec::new();
    if let Some(policy) = profile.checksum_policy(settings) {
        warnings.extend(parts.verify(&policy)?);
    }

    let (block, offset) = locate(profile, parts.address)?;
    let schema = &profile.blocks()[block].schema;
    let unrecognized = || {
        Error::UnrecognizedMessage(format!(
            "{} byte(s) at offset {} of block {} do not match a slot",
            parts.payload.len(),
            offset,
            block
        ))
    };
    let (entry, slot_offset) = schema.slot_at(offset).ok_or_else(unrecognized)?;
    let transcoder = profile.transcoder(block).ok_or_else(unrecognized)?;
    let before = model.clone();

    if offset == slot_offset && parts.payload.len() == entry.width() {
        transcoder.decode_slot(entry, parts.payload, model, &mut warnings)?;
    } else if let SchemaEntry::Text {
        key,
        len,
        width,
        order,
    } = entry
    {
        let w = *width as usize;
        let rel = offset - slot_offset;
        if rel % w != 0 || parts.payload.len() % w != 0 || rel + parts.payload.len() > entry.width()
        {
            return Err(unrecognized());
        }
        let mut chars: Vec<char> = model
            .text(key)
            .unwrap_or_default()
            .chars()
            .chain(std::iter::repeat(' '))
            .take(*len)
            .collect();
        for (i, c) in decode_text(parts.payload, *width, *order).chars().enumerate() {
            chars[rel / w + i] = c;
        }
        model.set_text(key, &chars.into_iter().collect::<String>())?;
    } else {
        return Err(unrecognized());
    }

    let changed = entry
        .names()
        .into_iter()
        .filter(|n| before.get(n) != model.get(n) || before.text(n) != model.text(n))
        .map(str::to_string)
        .collect();
    Ok(ParameterUpdate { changed, warnings })
}

/// Block and payload byte offset addressed by an update.
fn locate(profile: &DeviceProfile, address: &[u8]) -> Result<(usize, usize)> {
    let not_found = || {
        Error::UnrecognizedMessage(format!(
            "address {} is outside {}'s parameter space",
            Address::new(address),
            profile.name()
        ))
    };
    match profile.param_addressing() {
        ParamAddressing::BlockOffset => {
            let address = Address::new(address);
            let working = profile.addressing().working();
            profile
                .blocks()
                .iter()
                .enumerate()
                .filter_map(|(i, b)| {
                    let start = working.offset(b.address_delta.as_bytes());
                    let d = address.distance_from(&start)? as usize;
                    (d < b.schema.byte_len()).then_some((i, d))
                })
                .min_by_key(|(_, d)| *d)
                .ok_or_else(not_found)
        }
        ParamAddressing::Index14 {
            prefix,
            order,
            stride,
        } => {
            let (head, index) = address.split_at(prefix.len());
            if head != prefix.as_slice() || index.len() != 2 {
                return Err(not_found());
            }
            let [msb, lsb] = order.read(index[0], index[1]);
            let offset = join_value(msb, lsb, 7) as usize * stride;
            if offset >= profile.blocks()[0].schema.byte_len() {
                return Err(not_found());
            }
            Ok((0, offset))
        }
    }
}
