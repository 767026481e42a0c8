//! Lookup tables between UI-facing indices and device codes.

use crate::error::{Error, Result};
use crate::parameter::ParameterModel;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Forward map index → device code with its precomputed inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    forward: Vec<i32>,
    inverse: HashMap<i32, usize>,
}

impl LookupTable {
    /// Build from device codes listed in index order. Duplicate codes are rejected.
    pub fn new(codes: impl IntoIterator<Item = i32>) -> Result<Self> {
        let forward: Vec<i32> = codes.into_iter().collect();
        let mut inverse = HashMap::with_capacity(forward.len());
        for (i, &code) in forward.iter().enumerate() {
            if inverse.insert(code, i).is_some() {
                return Err(Error::InvalidSchema(format!(
                    "duplicate device code {code} in lookup table"
                )));
            }
        }
        Ok(Self { forward, inverse })
    }

    /// Build from runs of consecutive codes, e.g. `[0..=0, 3841..=4063, 4097..=4170]`.
    pub fn from_runs(runs: &[RangeInclusive<i32>]) -> Result<Self> {
        Self::new(runs.iter().flat_map(|r| r.clone()))
    }

    /// Extra codes that decode to `index` without appearing in the forward map.
    pub fn with_aliases(mut self, aliases: &[(i32, usize)]) -> Result<Self> {
        for &(code, index) in aliases {
            if index >= self.forward.len() {
                return Err(Error::InvalidSchema(format!(
                    "alias {code} points past the table end ({index})"
                )));
            }
            self.inverse.entry(code).or_insert(index);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Device code for a logical index.
    #[inline]
    pub fn code(&self, index: usize) -> Option<i32> {
        self.forward.get(index).copied()
    }

    /// Logical index for a device code.
    #[inline]
    pub fn index_of(&self, code: i32) -> Option<usize> {
        self.inverse.get(&code).copied()
    }

    pub fn codes(&self) -> &[i32] {
        &self.forward
    }
}

/// Chooses the lookup table for a table-mapped slot.
///
/// Devices whose tables depend on a mode held elsewhere in the model (for
/// example an instrument family) implement this to pick per call.
pub trait TableResolver: Send + Sync {
    fn resolve(&self, key: &str, model: &ParameterModel) -> Option<&LookupTable>;

    /// Adjust mode parameters from the raw codes of an incoming payload before
    /// its table slots are decoded. `codes` holds `(table key, raw code)` per
    /// table-mapped slot, in slot order.
    fn infer(&self, _codes: &[(&str, i32)], _model: &mut ParameterModel) {}
}

/// Tables selected by key alone.
#[derive(Debug, Clone, Default)]
pub struct StaticTables {
    tables: HashMap<String, LookupTable>,
}

impl StaticTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, table: LookupTable) -> Self {
        self.tables.insert(key.into(), table);
        self
    }

    pub fn get(&self, key: &str) -> Option<&LookupTable> {
        self.tables.get(key)
    }
}

impl TableResolver for StaticTables {
    fn resolve(&self, key: &str, _model: &ParameterModel) -> Option<&LookupTable> {
        self.tables.get(key)
    }
}
