//! Bank/program selection as channel-voice messages.

use crate::address::PatchLocation;
use crate::error::{Error, Result};
use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};

/// How a bank is selected before the program change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankSelect {
    None,
    /// One control change with a fixed value.
    Controller { cc: u8, value: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankRoute {
    pub select: BankSelect,
    /// Added to the patch number to form the program number.
    pub program_offset: u8,
}

/// Bank → (bank select, program offset) table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchChangeMap {
    banks: Vec<BankRoute>,
}

impl PatchChangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bank(mut self, select: BankSelect, program_offset: u8) -> Self {
        self.banks.push(BankRoute {
            select,
            program_offset,
        });
        self
    }

    /// `cc = bank index` for every bank, program = number.
    pub fn controller_per_bank(cc: u8, banks: u8) -> Self {
        (0..banks).fold(Self::new(), |map, b| {
            map.bank(BankSelect::Controller { cc, value: b }, 0)
        })
    }

    /// Program change only; the bank is chosen some other way.
    pub fn program_only(banks: u8) -> Self {
        (0..banks).fold(Self::new(), |map, _| map.bank(BankSelect::None, 0))
    }

    pub fn route(&self, bank: u8) -> Option<&BankRoute> {
        self.banks.get(bank as usize)
    }

    /// Messages selecting `loc` on `channel` (0..=15).
    pub fn messages(&self, channel: u8, loc: PatchLocation) -> Result<Vec<MidiMsg>> {
        if channel > 15 {
            return Err(Error::InvalidConfig(format!(
                "MIDI channel {channel} out of range (0-15)"
            )));
        }
        let route = self.route(loc.bank).ok_or_else(|| {
            Error::InvalidLocation(format!("no patch change route for bank {}", loc.bank))
        })?;
        let program = loc.number as u16 + route.program_offset as u16;
        if program > 127 {
            return Err(Error::InvalidLocation(format!(
                "program {program} for bank {} number {} exceeds 127",
                loc.bank, loc.number
            )));
        }

        let channel = Channel::from_u8(channel);
        let mut out = Vec::with_capacity(2);
        if let BankSelect::Controller { cc, value } = route.select {
            out.push(MidiMsg::ChannelVoice {
                channel,
                msg: ChannelVoiceMsg::ControlChange {
                    control: ControlChange::CC { control: cc, value },
                },
            });
        }
        out.push(MidiMsg::ChannelVoice {
            channel,
            msg: ChannelVoiceMsg::ProgramChange {
                program: program as u8,
            },
        });
        Ok(out)
    }

    /// Raw bytes of [`messages`](Self::messages), one entry per message.
    pub fn to_bytes(&self, channel: u8, loc: PatchLocation) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .messages(channel, loc)?
            .iter()
            .map(MidiMsg::to_midi)
            .collect())
    }
}
