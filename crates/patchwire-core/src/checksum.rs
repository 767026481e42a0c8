//! Device checksum strategies.
//!
//! Both families sum the covered bytes with 8-bit wraparound and keep the low
//! 7 bits. Roland-style devices then negate the result mod 128; others send it
//! unchanged.

use thiserror::Error;

/// Checksum arithmetic used by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// `(128 - (sum & 0x7F)) & 0x7F`.
    SumNegate,
    /// `sum & 0x7F`.
    Sum,
}

impl ChecksumKind {
    pub fn compute(self, bytes: &[u8]) -> u8 {
        let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) & 0x7F;
        match self {
            ChecksumKind::SumNegate => (0x80 - sum) & 0x7F,
            ChecksumKind::Sum => sum,
        }
    }

    /// Checksum over `bytes[start..end]`, or `None` when the range is out of bounds.
    pub fn compute_range(self, bytes: &[u8], start: usize, end: usize) -> Option<u8> {
        bytes.get(start..end).map(|b| self.compute(b))
    }
}

/// Received checksum does not match the computed one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Checksum mismatch: expected {expected:#04X}, found {found:#04X}")]
pub struct ChecksumError {
    pub expected: u8,
    pub found: u8,
}

/// How a device validates checksums on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumPolicy {
    pub kind: ChecksumKind,
    /// Accept `0x7F` whatever the computed value.
    pub accept_7f: bool,
    /// Reject the message on mismatch instead of reporting a warning.
    pub strict: bool,
}

impl ChecksumPolicy {
    pub fn new(kind: ChecksumKind) -> Self {
        Self {
            kind,
            accept_7f: false,
            strict: false,
        }
    }

    pub fn accept_7f(mut self) -> Self {
        self.accept_7f = true;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Recompute over `covered` and compare with `found`.
    pub fn verify(&self, covered: &[u8], found: u8) -> Result<(), ChecksumError> {
        let expected = self.kind.compute(covered);
        if found == expected || (self.accept_7f && found == 0x7F) {
            Ok(())
        } else {
            Err(ChecksumError { expected, found })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sum_negate() {
        assert_eq!(ChecksumKind::SumNegate.compute(&[1, 2, 3, 4]), 118);
        // sum of exactly 128 wraps to 0
        assert_eq!(ChecksumKind::SumNegate.compute(&[100, 28]), 0);
        assert_eq!(ChecksumKind::SumNegate.compute(&[]), 0);
    }

    #[test]
    fn test_roland_dt1_reference() {
        // GS DT1 to address 40 41 22, data 01
        let covered = [0x40, 0x41, 0x22, 0x01];
        assert_eq!(ChecksumKind::SumNegate.compute(&covered), 0x5C);
    }

    #[test]
    fn test_sum_passthrough() {
        assert_eq!(ChecksumKind::Sum.compute(&[1, 2, 3, 4]), 10);
        assert_eq!(ChecksumKind::Sum.compute(&[0x7F, 0x7F, 0x02]), 0x00);
    }

    #[test]
    fn test_compensating_changes_cancel() {
        let a = [10, 20, 30];
        let b = [15, 15, 30];
        assert_eq!(ChecksumKind::SumNegate.compute(&a), ChecksumKind::SumNegate.compute(&b));
        // wraps past 128
        let c = [0x7F, 0x7F, 0x7F];
        let d = [0x7E, 0x00, 0x7F];
        assert_eq!(ChecksumKind::Sum.compute(&c), 0x7D);
        assert_eq!(ChecksumKind::Sum.compute(&d), 0x7D);
    }

    #[test]
    fn test_compute_range() {
        let msg = [0xF0, 1, 2, 3, 4, 0xF7];
        assert_eq!(ChecksumKind::SumNegate.compute_range(&msg, 1, 5), Some(118));
        assert_eq!(ChecksumKind::SumNegate.compute_range(&msg, 4, 9), None);
    }

    #[test]
    fn test_accept_7f() {
        let lenient = ChecksumPolicy::new(ChecksumKind::Sum).accept_7f();
        assert!(lenient.verify(&[1, 2, 3], 0x7F).is_ok());
        assert!(lenient.verify(&[1, 2, 3], 6).is_ok());
        assert_eq!(
            lenient.verify(&[1, 2, 3], 5),
            Err(ChecksumError {
                expected: 6,
                found: 5
            })
        );

        let plain = ChecksumPolicy::new(ChecksumKind::Sum);
        assert!(plain.verify(&[1, 2, 3], 0x7F).is_err());
    }

    proptest! {
        #[test]
        fn prop_deterministic(bytes in proptest::collection::vec(0u8..0x80, 0..256)) {
            let a = ChecksumKind::SumNegate.compute(&bytes);
            prop_assert_eq!(a, ChecksumKind::SumNegate.compute(&bytes));
            prop_assert!(a < 0x80);
        }

        #[test]
        fn prop_single_byte_change_detected(
            bytes in proptest::collection::vec(0u8..0x80, 1..128),
            idx in any::<proptest::sample::Index>(),
            delta in 1u8..0x80,
        ) {
            let i = idx.index(bytes.len());
            let mut mutated = bytes.clone();
            mutated[i] = (mutated[i] + delta) & 0x7F;
            prop_assert_ne!(
                ChecksumKind::SumNegate.compute(&bytes),
                ChecksumKind::SumNegate.compute(&mutated)
            );
            prop_assert_ne!(ChecksumKind::Sum.compute(&bytes), ChecksumKind::Sum.compute(&mutated));
        }

        #[test]
        fn prop_negate_complements_sum(bytes in proptest::collection::vec(0u8..0x80, 0..64)) {
            let s = ChecksumKind::Sum.compute(&bytes);
            let n = ChecksumKind::SumNegate.compute(&bytes);
            prop_assert_eq!((s as u16 + n as u16) % 128, 0);
        }
    }
}
