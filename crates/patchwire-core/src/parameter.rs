//! Parameter declarations and the in-memory patch model.
//!
//! A [`ParameterSet`] is the immutable, shared declaration of every parameter a
//! device exposes (name, bounds, status) plus its text fields. A
//! [`ParameterModel`] holds one patch's values against that declaration.
//!
//! # Example
//!
//! ```
//! use patchwire_core::{ParameterModel, ParameterSet};
//! use std::sync::Arc;
//!
//! let params = Arc::new(
//!     ParameterSet::builder()
//!         .range("cutoff", 0, 127)
//!         .range("detune", -64, 63)
//!         .text("name", 16)
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut model = ParameterModel::new(params);
//! assert_eq!(model.set("detune", 100).unwrap(), 63); // clamped, never stored raw
//! model.set_text("name", "Init Sound").unwrap();
//! ```

use crate::error::{Error, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Key of the patch-name text field used by the built-in devices.
pub const PATCH_NAME: &str = "name";

/// How a parameter is treated outside the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParameterStatus {
    /// Editable and visible.
    #[default]
    Normal,
    /// Carried by the codec but not meant to be edited (e.g. by randomization).
    Immutable,
    /// Device-mode state that never appears on the wire but steers table selection.
    Hidden,
}

/// Declaration of one integer parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub status: ParameterStatus,
}

impl ParameterSpec {
    /// Clamp a value into `[min, max]`.
    #[inline]
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Declaration of one fixed-length text field (patch name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpec {
    pub key: String,
    pub len: usize,
}

/// Upper bound of one parameter that follows the value of another.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DependentMax {
    selector: usize,
    maxima: Vec<i32>,
}

impl DependentMax {
    /// `maxima[v]` while the selector holds `v`; the last entry covers the rest.
    fn max_for(&self, selector_value: i32) -> i32 {
        let last = self.maxima.len().saturating_sub(1);
        let i = (selector_value.max(0) as usize).min(last);
        self.maxima.get(i).copied().unwrap_or(i32::MAX)
    }
}

/// Immutable declaration of a device's parameters, in wire order.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    specs: Vec<ParameterSpec>,
    index: HashMap<String, usize>,
    texts: Vec<TextSpec>,
    limits: HashMap<usize, DependentMax>,
    dependents: HashMap<usize, Vec<usize>>,
}

impl ParameterSet {
    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.index_of(name).map(|i| &self.specs[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }

    pub fn text(&self, key: &str) -> Option<&TextSpec> {
        self.texts.iter().find(|t| t.key == key)
    }

    pub fn texts(&self) -> &[TextSpec] {
        &self.texts
    }

    /// Name of the parameter whose value narrows `name`'s upper bound.
    pub fn selector_of(&self, name: &str) -> Option<&str> {
        let limit = self.limits.get(&self.index_of(name)?)?;
        Some(self.specs[limit.selector].name.as_str())
    }

    fn is_selector(&self, index: usize) -> bool {
        self.dependents.contains_key(&index)
    }
}

/// Builder for [`ParameterSet`].
///
/// Parameters named by a schema are declared with the natural range of their
/// slot; explicit [`range`](Self::range) calls override that range. A
/// table-mapped slot only knows its raw capacity, so its parameter should be
/// bounded with [`table_len`](Self::table_len) or [`max_by`](Self::max_by).
#[derive(Debug, Default)]
pub struct ParameterSetBuilder {
    specs: Vec<ParameterSpec>,
    index: HashMap<String, usize>,
    texts: Vec<TextSpec>,
    table_keys: Vec<(String, String)>,
    limits: Vec<(String, String, Vec<i32>)>,
}

impl ParameterSetBuilder {
    /// Declare every parameter and text field a schema references.
    pub fn schema(mut self, schema: &Schema) -> Self {
        for (name, min, max) in schema.natural_ranges() {
            if !self.index.contains_key(&name) {
                self.push(name, min, max, ParameterStatus::Normal);
            }
        }
        for (key, len) in schema.text_fields() {
            if !self.texts.iter().any(|t| t.key == key) {
                self.texts.push(TextSpec { key, len });
            }
        }
        for entry in schema.entries() {
            if let (Some(key), Some(name)) = (entry.table_key(), entry.names().first()) {
                self.table_keys.push((name.to_string(), key.to_string()));
            }
        }
        self
    }

    /// Bound every parameter the schema maps through table `key` to the
    /// indices of a table with `len` entries.
    pub fn table_len(mut self, key: &str, len: usize) -> Self {
        let max = i32::try_from(len.saturating_sub(1)).unwrap_or(i32::MAX);
        for (name, k) in &self.table_keys {
            if k != key {
                continue;
            }
            if let Some(&i) = self.index.get(name) {
                self.specs[i].min = 0;
                self.specs[i].max = max;
            }
        }
        self
    }

    /// Narrow the upper bound of `name` by the current value of `selector`:
    /// `maxima[v]` applies while `selector` holds `v`, the last entry above that.
    /// Changing `selector` re-clamps `name`.
    pub fn max_by(
        mut self,
        name: impl Into<String>,
        selector: impl Into<String>,
        maxima: impl IntoIterator<Item = i32>,
    ) -> Self {
        self.limits
            .push((name.into(), selector.into(), maxima.into_iter().collect()));
        self
    }

    /// Declare a parameter, or override the range of one already declared.
    pub fn range(mut self, name: impl Into<String>, min: i32, max: i32) -> Self {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => {
                self.specs[i].min = min;
                self.specs[i].max = max;
            }
            None => self.push(name, min, max, ParameterStatus::Normal),
        }
        self
    }

    /// Declare a parameter that never travels on the wire.
    pub fn hidden(self, name: impl Into<String>, min: i32, max: i32) -> Self {
        self.with_status(name, min, max, ParameterStatus::Hidden)
    }

    pub fn immutable(self, name: impl Into<String>, min: i32, max: i32) -> Self {
        self.with_status(name, min, max, ParameterStatus::Immutable)
    }

    /// Override the default value (clamped at build).
    pub fn default_value(mut self, name: &str, value: i32) -> Self {
        if let Some(&i) = self.index.get(name) {
            self.specs[i].default = value;
        }
        self
    }

    pub fn text(mut self, key: impl Into<String>, len: usize) -> Self {
        let key = key.into();
        match self.texts.iter_mut().find(|t| t.key == key) {
            Some(t) => t.len = len,
            None => self.texts.push(TextSpec { key, len }),
        }
        self
    }

    pub fn build(self) -> Result<ParameterSet> {
        let mut specs = self.specs;
        for spec in specs.iter_mut() {
            if spec.min > spec.max {
                return Err(Error::InvalidRange {
                    name: spec.name.clone(),
                    min: spec.min,
                    max: spec.max,
                });
            }
            spec.default = spec.clamp(spec.default);
        }

        let mut limits = HashMap::new();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for (name, selector, maxima) in self.limits {
            let i = *self
                .index
                .get(&name)
                .ok_or_else(|| Error::UnknownParameter(name.clone()))?;
            let s = *self
                .index
                .get(&selector)
                .ok_or_else(|| Error::UnknownParameter(selector.clone()))?;
            if i == s || maxima.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "bad dependent bound for '{name}' on '{selector}'"
                )));
            }
            limits.insert(i, DependentMax { selector: s, maxima });
            dependents.entry(s).or_default().push(i);
        }

        Ok(ParameterSet {
            specs,
            index: self.index,
            texts: self.texts,
            limits,
            dependents,
        })
    }

    fn with_status(
        mut self,
        name: impl Into<String>,
        min: i32,
        max: i32,
        status: ParameterStatus,
    ) -> Self {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => {
                let spec = &mut self.specs[i];
                spec.min = min;
                spec.max = max;
                spec.status = status;
            }
            None => self.push(name, min, max, status),
        }
        self
    }

    fn push(&mut self, name: String, min: i32, max: i32, status: ParameterStatus) {
        self.index.insert(name.clone(), self.specs.len());
        self.specs.push(ParameterSpec {
            name,
            min,
            max,
            default: 0,
            status,
        });
    }
}

/// One patch: a value per declared parameter plus its text fields.
///
/// Every stored value is within its declared bounds; writes are clamped. A
/// parameter bounded by a selector is re-clamped whenever the selector changes.
#[derive(Debug, Clone)]
pub struct ParameterModel {
    params: Arc<ParameterSet>,
    values: Vec<i32>,
    texts: BTreeMap<String, String>,
}

impl ParameterModel {
    /// Create a model holding every parameter's default value.
    pub fn new(params: Arc<ParameterSet>) -> Self {
        let values = params.specs.iter().map(|s| s.default).collect();
        let texts = params
            .texts
            .iter()
            .map(|t| (t.key.clone(), String::new()))
            .collect();
        let mut model = Self {
            params,
            values,
            texts,
        };
        model.clamp_dependents();
        model
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.params.index_of(name).map(|i| self.values[i])
    }

    /// Like [`get`](Self::get) but an undeclared name is an error.
    pub fn value(&self, name: &str) -> Result<i32> {
        self.get(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    /// Current bounds of `name`, narrowed by its selector if it has one.
    pub fn bounds(&self, name: &str) -> Option<(i32, i32)> {
        self.params.index_of(name).map(|i| self.bounds_at(i))
    }

    /// Store a value, clamped to the current bounds. Returns the stored value.
    pub fn set(&mut self, name: &str, value: i32) -> Result<i32> {
        let i = self
            .params
            .index_of(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
        Ok(self.set_at(i, value))
    }

    pub(crate) fn set_at(&mut self, index: usize, value: i32) -> i32 {
        let (min, max) = self.bounds_at(index);
        let clamped = value.clamp(min, max);
        self.values[index] = clamped;
        if self.params.is_selector(index) {
            let params = Arc::clone(&self.params);
            for &dependent in params.dependents.get(&index).into_iter().flatten() {
                self.clamp_at(dependent);
            }
        }
        clamped
    }

    fn bounds_at(&self, index: usize) -> (i32, i32) {
        let spec = &self.params.specs[index];
        match self.params.limits.get(&index) {
            Some(limit) => {
                let max = limit.max_for(self.values[limit.selector]);
                (spec.min, max.clamp(spec.min, spec.max))
            }
            None => (spec.min, spec.max),
        }
    }

    fn clamp_at(&mut self, index: usize) {
        let (min, max) = self.bounds_at(index);
        self.values[index] = self.values[index].clamp(min, max);
    }

    fn clamp_dependents(&mut self) {
        let params = Arc::clone(&self.params);
        for &index in params.limits.keys() {
            self.clamp_at(index);
        }
    }

    #[inline]
    pub(crate) fn get_at(&self, index: usize) -> i32 {
        self.values[index]
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.texts.get(key).map(String::as_str)
    }

    /// Patch name, when the device declares one.
    pub fn name(&self) -> Option<&str> {
        self.text(PATCH_NAME)
    }

    /// Store a text field: non-printable characters become spaces, the text is
    /// cut to the declared length and trailing spaces are dropped.
    pub fn set_text(&mut self, key: &str, text: &str) -> Result<()> {
        let len = self
            .params
            .text(key)
            .map(|t| t.len)
            .ok_or_else(|| Error::UnknownParameter(key.to_string()))?;
        let cleaned: String = text.chars().take(len).map(sanitize_char).collect();
        self.texts
            .insert(key.to_string(), cleaned.trim_end().to_string());
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.params
            .specs
            .iter()
            .zip(self.values.iter())
            .map(|(s, v)| (s.name.as_str(), *v))
    }

    /// Reset every value and text to its default.
    pub fn reset(&mut self) {
        for (value, spec) in self.values.iter_mut().zip(self.params.specs.iter()) {
            *value = spec.default;
        }
        for text in self.texts.values_mut() {
            text.clear();
        }
        self.clamp_dependents();
    }

    pub fn snapshot(&self) -> PatchSnapshot {
        PatchSnapshot {
            values: self.iter().map(|(n, v)| (n.to_string(), v)).collect(),
            texts: self.texts.clone(),
        }
    }

    /// Load values from a snapshot. Unknown names are an error; values are clamped.
    pub fn restore(&mut self, snapshot: &PatchSnapshot) -> Result<()> {
        for name in snapshot.values.keys().chain(snapshot.texts.keys()) {
            if !self.params.contains(name) && self.params.text(name).is_none() {
                return Err(Error::UnknownParameter(name.clone()));
            }
        }
        // Selectors first, so bounds they narrow are in place.
        let (selectors, rest): (Vec<_>, Vec<_>) = snapshot.values.iter().partition(|(name, _)| {
            self.params
                .index_of(name)
                .is_some_and(|i| self.params.is_selector(i))
        });
        for (name, value) in selectors.into_iter().chain(rest) {
            self.set(name, *value)?;
        }
        for (key, text) in &snapshot.texts {
            self.set_text(key, text)?;
        }
        Ok(())
    }
}

impl PartialEq for ParameterModel {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
            && self.texts == other.texts
            && self
                .params
                .specs
                .iter()
                .zip(other.params.specs.iter())
                .all(|(a, b)| a.name == b.name)
    }
}

/// Plain, serializable view of a [`ParameterModel`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchSnapshot {
    pub values: BTreeMap<String, i32>,
    pub texts: BTreeMap<String, String>,
}

/// Printable ASCII survives; everything else becomes a space.
#[inline]
pub(crate) fn sanitize_char(c: char) -> char {
    if (' '..='~').contains(&c) {
        c
    } else {
        ' '
    }
}
