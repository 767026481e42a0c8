//! Device memory addresses and patch locations.

use crate::error::{Error, Result};
use patchwire_core::bits::{join_value, split_value};
use patchwire_core::ByteOrder;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Address bytes as sent on the wire, 7 bits per byte, most significant first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address(SmallVec<[u8; 4]>);

impl Address {
    pub fn new(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    /// `len` base-128 digits of `value`; higher digits are dropped.
    pub fn from_value(mut value: u64, len: usize) -> Self {
        let mut bytes: SmallVec<[u8; 4]> = SmallVec::from_elem(0, len);
        for b in bytes.iter_mut().rev() {
            *b = (value & 0x7F) as u8;
            value >>= 7;
        }
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Base-128 value of the address.
    pub fn value(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &b| (acc << 7) | (b & 0x7F) as u64)
    }

    /// Base-128 sum with carry; carry out of the top byte is dropped.
    pub fn offset(&self, delta: &[u8]) -> Address {
        self.add(Address::new(delta).value())
    }

    pub fn add(&self, n: u64) -> Address {
        Address::from_value(self.value().wrapping_add(n), self.len())
    }

    /// Base-128 difference, `None` when `delta` is larger.
    pub fn checked_sub(&self, delta: &[u8]) -> Option<Address> {
        let v = self.value().checked_sub(Address::new(delta).value())?;
        Some(Address::from_value(v, self.len()))
    }

    /// Distance from `base` up to `self`, when `self` is not below it.
    pub fn distance_from(&self, base: &Address) -> Option<u64> {
        if self.len() != base.len() {
            return None;
        }
        self.value().checked_sub(base.value())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// A stored patch slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PatchLocation {
    pub bank: u8,
    pub number: u8,
}

impl PatchLocation {
    pub fn new(bank: u8, number: u8) -> Self {
        Self { bank, number }
    }
}

/// Where a dump is written or a request is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteTarget {
    /// The device's edit buffer.
    #[default]
    WorkingMemory,
    Stored(PatchLocation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub name: String,
    pub writable: bool,
}

/// Banks and patch numbers a device exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSpace {
    banks: Vec<Bank>,
    patches_per_bank: u8,
    number_base: u8,
    digits: usize,
    separator: String,
}

impl LocationSpace {
    pub fn new(patches_per_bank: u8) -> Self {
        Self {
            banks: Vec::new(),
            patches_per_bank,
            number_base: 0,
            digits: 3,
            separator: String::new(),
        }
    }

    pub fn bank(mut self, name: impl Into<String>, writable: bool) -> Self {
        self.banks.push(Bank {
            name: name.into(),
            writable,
        });
        self
    }

    /// How patch numbers are displayed: first number, zero-padded width and
    /// the text between bank name and number.
    pub fn numbering(mut self, number_base: u8, digits: usize, separator: impl Into<String>) -> Self {
        self.number_base = number_base;
        self.digits = digits;
        self.separator = separator.into();
        self
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn patches_per_bank(&self) -> u8 {
        self.patches_per_bank
    }

    pub fn contains(&self, loc: PatchLocation) -> bool {
        (loc.bank as usize) < self.banks.len() && loc.number < self.patches_per_bank
    }

    pub fn validate(&self, loc: PatchLocation) -> Result<()> {
        if self.contains(loc) {
            Ok(())
        } else {
            Err(Error::InvalidLocation(format!(
                "bank {} number {} outside {} banks of {}",
                loc.bank,
                loc.number,
                self.banks.len(),
                self.patches_per_bank
            )))
        }
    }

    pub fn is_writable(&self, loc: PatchLocation) -> bool {
        self.contains(loc) && self.banks[loc.bank as usize].writable
    }

    /// The following location, wrapping number then bank.
    pub fn next(&self, loc: PatchLocation) -> PatchLocation {
        let bank_count = self.banks.len().max(1) as u16;
        let number = loc.number as u16 + 1;
        if number >= self.patches_per_bank as u16 {
            PatchLocation::new(((loc.bank as u16 + 1) % bank_count) as u8, 0)
        } else {
            PatchLocation::new(loc.bank, number as u8)
        }
    }

    /// Display name, e.g. `Internal 01` or `A001`.
    pub fn name(&self, loc: PatchLocation) -> Option<String> {
        if !self.contains(loc) {
            return None;
        }
        let bank = &self.banks[loc.bank as usize];
        let number = loc.number as u16 + self.number_base as u16;
        Some(format!(
            "{}{}{:0width$}",
            bank.name,
            self.separator,
            number,
            width = self.digits
        ))
    }

    /// Every location, bank by bank.
    pub fn iter(&self) -> impl Iterator<Item = PatchLocation> + '_ {
        (0..self.banks.len() as u8)
            .flat_map(move |b| (0..self.patches_per_bank).map(move |n| PatchLocation::new(b, n)))
    }
}

/// How a stored location maps to address bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredAddress {
    /// A template with the bank code and `number_base + number` written at
    /// fixed positions. Banks without a code cannot be addressed.
    Fields {
        template: Address,
        bank_at: usize,
        bank_codes: Vec<Option<u8>>,
        number_at: usize,
        number_base: u8,
    },
    /// `bank * patches_per_bank + number` as two 7-bit bytes.
    Index14 {
        order: ByteOrder,
        patches_per_bank: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressScheme {
    working: Address,
    stored: StoredAddress,
    unmatched_working: bool,
}

impl AddressScheme {
    pub fn new(working: Address, stored: StoredAddress) -> Self {
        Self {
            working,
            stored,
            unmatched_working: false,
        }
    }

    /// Read any full-width address that names no stored location as working
    /// memory. For devices that stamp edit-buffer dumps with arbitrary bytes.
    pub fn unmatched_as_working(mut self) -> Self {
        self.unmatched_working = true;
        self
    }

    pub fn working(&self) -> &Address {
        &self.working
    }

    pub fn stored(&self) -> &StoredAddress {
        &self.stored
    }

    /// Address width in bytes.
    pub fn width(&self) -> usize {
        self.working.len()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        match &self.stored {
            StoredAddress::Fields {
                template,
                bank_at,
                number_at,
                ..
            } => {
                if template.len() != self.width() {
                    return invalid("stored address template width differs from working address");
                }
                if *bank_at >= self.width() || *number_at >= self.width() || bank_at == number_at {
                    return invalid("bank and number positions must be distinct address bytes");
                }
                Ok(())
            }
            StoredAddress::Index14 { .. } if self.width() != 2 => {
                invalid("14-bit patch index needs a two-byte address")
            }
            StoredAddress::Index14 {
                patches_per_bank, ..
            } if *patches_per_bank == 0 => invalid("patches_per_bank must be positive"),
            StoredAddress::Index14 { .. } => Ok(()),
        }
    }

    /// Address of a stored location, `None` when its bank has no address.
    pub fn stored_address(&self, loc: PatchLocation) -> Option<Address> {
        match &self.stored {
            StoredAddress::Fields {
                template,
                bank_at,
                bank_codes,
                number_at,
                number_base,
            } => {
                let code = (*bank_codes.get(loc.bank as usize)?)?;
                let mut bytes = template.0.clone();
                bytes[*bank_at] = code;
                bytes[*number_at] = number_base.wrapping_add(loc.number) & 0x7F;
                Some(Address(bytes))
            }
            StoredAddress::Index14 {
                order,
                patches_per_bank,
            } => {
                let index = loc.bank as u16 * patches_per_bank + loc.number as u16;
                Some(Address::new(&order.arrange(split_value(index, 7))))
            }
        }
    }

    pub fn address_of(&self, target: WriteTarget) -> Option<Address> {
        match target {
            WriteTarget::WorkingMemory => Some(self.working.clone()),
            WriteTarget::Stored(loc) => self.stored_address(loc),
        }
    }

    /// Decode an address back into a target; `None` for foreign addresses.
    pub fn target_of(&self, addr: &Address) -> Option<WriteTarget> {
        if *addr == self.working {
            return Some(WriteTarget::WorkingMemory);
        }
        if addr.len() != self.width() {
            return None;
        }
        self.stored_target(addr)
            .or_else(|| self.unmatched_working.then_some(WriteTarget::WorkingMemory))
    }

    fn stored_target(&self, addr: &Address) -> Option<WriteTarget> {
        match &self.stored {
            StoredAddress::Fields {
                template,
                bank_at,
                bank_codes,
                number_at,
                number_base,
            } => {
                let fixed_match = addr
                    .as_bytes()
                    .iter()
                    .zip(template.as_bytes())
                    .enumerate()
                    .all(|(i, (a, t))| i == *bank_at || i == *number_at || a == t);
                if !fixed_match {
                    return None;
                }
                let bytes = addr.as_bytes();
                let bank = bank_codes
                    .iter()
                    .position(|c| *c == Some(bytes[*bank_at]))?;
                let number = bytes[*number_at].checked_sub(*number_base)?;
                Some(WriteTarget::Stored(PatchLocation::new(bank as u8, number)))
            }
            StoredAddress::Index14 {
                order,
                patches_per_bank,
            } => {
                let bytes = addr.as_bytes();
                let [msb, lsb] = order.read(bytes[0], bytes[1]);
                let index = join_value(msb, lsb, 7);
                Some(WriteTarget::Stored(PatchLocation::new(
                    (index / patches_per_bank) as u8,
                    (index % patches_per_bank) as u8,
                )))
            }
        }
    }
}
