//! Multi-block dump assembly.
//!
//! A [`ChunkAssembler`] owns one in-flight dump: it checks each incoming
//! message against the block it expects next (length, command, address) and
//! decodes accepted blocks into its own model. Any mismatch fails the whole
//! sequence and discards what was accumulated; start over with
//! [`reset`](ChunkAssembler::reset) or a new assembler.

use crate::address::{Address, PatchLocation, WriteTarget};
use crate::config::DeviceSettings;
use crate::error::{Error, Result};
use crate::layout::MessageKind;
use crate::profile::DeviceProfile;
use patchwire_core::{ChecksumPolicy, ParameterModel, Warning};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    AwaitingBlock(usize),
    Complete,
    Failed,
}

/// Outcome of one accepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Incomplete { next_block: usize },
    Complete,
}

/// A fully received patch.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPatch {
    pub model: ParameterModel,
    /// Stored location the dump came from; `None` for working memory.
    pub location: Option<PatchLocation>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
pub struct ChunkAssembler {
    profile: Arc<DeviceProfile>,
    policy: Option<ChecksumPolicy>,
    state: AssemblyState,
    template: ParameterModel,
    model: ParameterModel,
    base: Option<Address>,
    warnings: Vec<Warning>,
}

impl ChunkAssembler {
    /// Assembler using the device's default checksum policy.
    pub fn new(profile: Arc<DeviceProfile>) -> Self {
        Self::with_settings(profile, &DeviceSettings::default())
    }

    pub fn with_settings(profile: Arc<DeviceProfile>, settings: &DeviceSettings) -> Self {
        let policy = profile.checksum_policy(settings);
        let template = profile.new_model();
        Self {
            profile,
            policy,
            state: AssemblyState::AwaitingBlock(0),
            model: template.clone(),
            template,
            base: None,
            warnings: Vec::new(),
        }
    }

    /// Start every sequence from `model` instead of the defaults.
    ///
    /// Values the dump does not carry (hidden parameters such as an
    /// instrument family selector) are taken from here.
    pub fn with_template(mut self, model: ParameterModel) -> Self {
        self.model = model.clone();
        self.template = model;
        self
    }

    pub fn profile(&self) -> &Arc<DeviceProfile> {
        &self.profile
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn block_count(&self) -> usize {
        self.profile.block_count()
    }

    /// Start over from block 0 with a fresh model.
    pub fn reset(&mut self) {
        self.state = AssemblyState::AwaitingBlock(0);
        self.model = self.template.clone();
        self.base = None;
        self.warnings.clear();
    }

    fn fail(&mut self, block: usize, reason: String) -> Error {
        debug!("{}: dump failed at block {}: {}", self.profile.name(), block, reason);
        self.state = AssemblyState::Failed;
        self.model = self.template.clone();
        self.base = None;
        self.warnings.clear();
        Error::BlockSequence { block, reason }
    }

    /// Feed the next dump message.
    pub fn feed(&mut self, msg: &[u8]) -> Result<Progress> {
        let block = match self.state {
            AssemblyState::AwaitingBlock(i) => i,
            AssemblyState::Complete => {
                return Err(Error::BlockSequence {
                    block: self.block_count(),
                    reason: "dump already complete".into(),
                })
            }
            AssemblyState::Failed => {
                return Err(Error::BlockSequence {
                    block: 0,
                    reason: "dump failed; reset before feeding again".into(),
                })
            }
        };

        let expected_len = self.profile.dump_message_len(block).unwrap_or_default();
        if self.profile.recognize(msg) != Some(MessageKind::Dump) || msg.len() != expected_len {
            return Err(self.fail(
                block,
                format!(
                    "expected a {expected_len}-byte dump message, got {} bytes",
                    msg.len()
                ),
            ));
        }
        let parts = match self.profile.parse(msg) {
            Ok(parts) => parts,
            Err(e) => return Err(self.fail(block, e.to_string())),
        };

        if let Some(policy) = self.policy {
            match parts.verify(&policy) {
                Ok(warning) => self.warnings.extend(warning),
                Err(e) => {
                    self.fail(block, e.to_string());
                    return Err(e);
                }
            }
        }

        let address = Address::new(parts.address);
        let delta = &self.profile.blocks()[block].address_delta;
        match &self.base {
            None => match address.checked_sub(delta.as_bytes()) {
                Some(base) if self.profile.addressing().target_of(&base).is_some() => {
                    self.base = Some(base)
                }
                _ => {
                    return Err(self.fail(
                        block,
                        format!("address {address} does not belong to a patch"),
                    ))
                }
            },
            Some(base) => {
                let expected = base.offset(delta.as_bytes());
                if address != expected {
                    return Err(self.fail(
                        block,
                        format!("expected address {expected}, got {address}"),
                    ));
                }
            }
        }

        let decoded = self
            .profile
            .transcoder(block)
            .ok_or_else(|| Error::InvalidConfig(format!("missing block {block}")))
            .and_then(|t| Ok(t.decode_into(parts.payload, &mut self.model)?));
        match decoded {
            Ok(warnings) => self.warnings.extend(warnings),
            Err(e) => return Err(self.fail(block, e.to_string())),
        }

        debug!(
            "{}: accepted block {}/{}",
            self.profile.name(),
            block + 1,
            self.block_count()
        );
        if block + 1 == self.block_count() {
            self.state = AssemblyState::Complete;
            Ok(Progress::Complete)
        } else {
            self.state = AssemblyState::AwaitingBlock(block + 1);
            Ok(Progress::Incomplete {
                next_block: block + 1,
            })
        }
    }

    /// Feed every remaining block from one buffer holding them back to back.
    pub fn feed_contiguous(&mut self, buf: &[u8]) -> Result<Progress> {
        let first = match self.state {
            AssemblyState::AwaitingBlock(i) => i,
            _ => return self.feed(buf),
        };
        let lengths: Vec<usize> = (first..self.block_count())
            .filter_map(|i| self.profile.dump_message_len(i))
            .collect();
        let total: usize = lengths.iter().sum();
        if buf.len() != total {
            return Err(self.fail(
                first,
                format!("contiguous dump of {} bytes, expected {total}", buf.len()),
            ));
        }

        let mut pos = 0;
        let mut progress = Progress::Incomplete { next_block: first };
        for len in lengths {
            progress = self.feed(&buf[pos..pos + len])?;
            pos += len;
        }
        Ok(progress)
    }

    /// Take the completed patch.
    pub fn finish(self) -> Result<AssembledPatch> {
        if self.state != AssemblyState::Complete {
            let block = match self.state {
                AssemblyState::AwaitingBlock(i) => i,
                _ => 0,
            };
            return Err(Error::BlockSequence {
                block,
                reason: "dump is not complete".into(),
            });
        }
        let location = self
            .base
            .as_ref()
            .and_then(|b| self.profile.addressing().target_of(b))
            .and_then(|t| match t {
                WriteTarget::Stored(loc) => Some(loc),
                WriteTarget::WorkingMemory => None,
            });
        Ok(AssembledPatch {
            model: self.model,
            location,
            warnings: self.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChecksumMode;
    use crate::message::MessageBuilder;
    use crate::profile::tests::two_block_profile;

    fn sample_dump(target: WriteTarget) -> (Arc<DeviceProfile>, ParameterModel, Vec<Vec<u8>>) {
        let profile = Arc::new(two_block_profile());
        let mut model = profile.new_model();
        model.set_text("name", "Bell").unwrap();
        model.set("level", 100).unwrap();
        model.set("mode", 6).unwrap();
        model.set("wave", 200).unwrap();
        model.set("pan", -30).unwrap();
        let msgs = MessageBuilder::new(&profile, &DeviceSettings::new())
            .unwrap()
            .dump(&model, target)
            .unwrap();
        (profile, model, msgs)
    }

    #[test]
    fn test_blocks_in_order() {
        let (profile, model, msgs) = sample_dump(WriteTarget::Stored(PatchLocation::new(0, 9)));
        let mut asm = ChunkAssembler::new(profile);

        assert_eq!(asm.feed(&msgs[0]).unwrap(), Progress::Incomplete { next_block: 1 });
        assert_eq!(asm.state(), AssemblyState::AwaitingBlock(1));
        assert_eq!(asm.feed(&msgs[1]).unwrap(), Progress::Complete);

        let patch = asm.finish().unwrap();
        assert_eq!(patch.model, model);
        assert_eq!(patch.location, Some(PatchLocation::new(0, 9)));
        assert!(patch.warnings.is_empty());
    }

    #[test]
    fn test_contiguous_matches_sequential() {
        let (profile, _, msgs) = sample_dump(WriteTarget::WorkingMemory);

        let mut seq = ChunkAssembler::new(profile.clone());
        for msg in &msgs {
            seq.feed(msg).unwrap();
        }
        let mut whole = ChunkAssembler::new(profile);
        assert_eq!(whole.feed_contiguous(&msgs.concat()).unwrap(), Progress::Complete);

        let a = seq.finish().unwrap();
        let b = whole.finish().unwrap();
        assert_eq!(a, b);
        assert_eq!(b.location, None);
    }

    #[test]
    fn test_wrong_order_fails_and_discards() {
        let (profile, _, msgs) = sample_dump(WriteTarget::WorkingMemory);
        let mut asm = ChunkAssembler::new(profile.clone());

        asm.feed(&msgs[0]).unwrap();
        // block 0 again where block 1 is expected
        let err = asm.feed(&msgs[0]).unwrap_err();
        assert!(matches!(err, Error::BlockSequence { block: 1, .. }));
        assert_eq!(asm.state(), AssemblyState::Failed);
        assert!(asm.feed(&msgs[1]).is_err());

        asm.reset();
        asm.feed(&msgs[1]).unwrap_err();
        asm.reset();
        assert_eq!(asm.model, profile.new_model());
    }

    #[test]
    fn test_mismatched_address_fails() {
        let (profile, _, first) = sample_dump(WriteTarget::Stored(PatchLocation::new(0, 1)));
        let (_, _, second) = sample_dump(WriteTarget::Stored(PatchLocation::new(0, 2)));
        let mut asm = ChunkAssembler::new(profile);

        asm.feed(&first[0]).unwrap();
        let err = asm.feed(&second[1]).unwrap_err();
        assert!(matches!(err, Error::BlockSequence { block: 1, ref reason } if reason.contains("address")));
    }

    #[test]
    fn test_checksum_policy() {
        let (profile, _, mut msgs) = sample_dump(WriteTarget::WorkingMemory);
        let n = msgs[1].len();
        msgs[1][n - 2] ^= 0x01;

        let mut lenient = ChunkAssembler::new(profile.clone());
        lenient.feed(&msgs[0]).unwrap();
        lenient.feed(&msgs[1]).unwrap();
        assert_eq!(lenient.finish().unwrap().warnings.len(), 1);

        let strict = DeviceSettings::new().checksum(ChecksumMode::Strict);
        let mut asm = ChunkAssembler::with_settings(profile, &strict);
        asm.feed(&msgs[0]).unwrap();
        assert!(matches!(asm.feed(&msgs[1]), Err(Error::Core(_))));
        assert_eq!(asm.state(), AssemblyState::Failed);
    }

    #[test]
    fn test_finish_incomplete() {
        let (profile, _, msgs) = sample_dump(WriteTarget::WorkingMemory);
        let mut asm = ChunkAssembler::new(profile);
        asm.feed(&msgs[0]).unwrap();
        assert!(asm.finish().is_err());
    }
}
