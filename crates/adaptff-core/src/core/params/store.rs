use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("No parameters for key '{primary}' (nor its reversal '{fallback}')")]
pub struct MissingParameters {
    pub primary: String,
    pub fallback: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Parameter key '{key}' holds {found} values but its term expects {expected}")]
pub struct ParameterCount {
    pub key: String,
    pub expected: usize,
    pub found: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamStoreError {
    #[error("Duplicate parameter key: {0}")]
    DuplicateKey(String),
    #[error("Parameter key '{0}' declares no parameters")]
    EmptyKey(String),
    #[error("Expected {expected} parameter values, got {found}")]
    ValueCount { expected: usize, found: usize },
}

/// Location of one key's parameters inside the flat value array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlice {
    pub offset: usize,
    pub count: usize,
}

impl KeySlice {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.count
    }
}

#[derive(Debug, PartialEq)]
struct KeyIndex {
    keys: Vec<String>,
    slices: Vec<KeySlice>,
    lookup: HashMap<String, usize>,
    total: usize,
}

/// Shared handle to a store's key layout.
///
/// Stores cloned from one another report the same layout, which is what offset
/// caches compare against to decide whether resolved offsets are still usable.
#[derive(Debug, Clone)]
pub struct KeyLayout(Arc<KeyIndex>);

impl KeyLayout {
    pub fn same_as(&self, other: &KeyLayout) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Flat parameter vector addressed through string keys such as `amberlj:C`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    method: String,
    fitness: f64,
    values: Vec<f64>,
    index: Arc<KeyIndex>,
}

impl ParameterStore {
    /// Lays out the keys back to back in the given order with all values zeroed.
    pub fn new<K, I>(method: impl Into<String>, keys: I) -> Result<Self, ParamStoreError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, usize)>,
    {
        let mut index = KeyIndex {
            keys: Vec::new(),
            slices: Vec::new(),
            lookup: HashMap::new(),
            total: 0,
        };
        for (key, count) in keys {
            let key = key.into();
            if count == 0 {
                return Err(ParamStoreError::EmptyKey(key));
            }
            if index.lookup.contains_key(&key) {
                return Err(ParamStoreError::DuplicateKey(key));
            }
            index.lookup.insert(key.clone(), index.keys.len());
            index.slices.push(KeySlice {
                offset: index.total,
                count,
            });
            index.keys.push(key);
            index.total += count;
        }

        Ok(Self {
            method: method.into(),
            fitness: f64::INFINITY,
            values: vec![0.0; index.total],
            index: Arc::new(index),
        })
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Result<Self, ParamStoreError> {
        if values.len() != self.values.len() {
            return Err(ParamStoreError::ValueCount {
                expected: self.values.len(),
                found: values.len(),
            });
        }
        self.values = values;
        Ok(self)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn number_of_keys(&self) -> usize {
        self.index.keys.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys.iter().map(String::as_str)
    }

    pub fn layout(&self) -> KeyLayout {
        KeyLayout(Arc::clone(&self.index))
    }

    /// Exact, case-sensitive lookup.
    pub fn slice(&self, key: &str) -> Option<KeySlice> {
        self.index
            .lookup
            .get(key)
            .map(|&position| self.index.slices[position])
    }

    pub fn offset_of(&self, key: &str) -> Option<usize> {
        self.slice(key).map(|slice| slice.offset)
    }

    /// Tries `primary`, then `fallback`.
    pub fn resolve(&self, primary: &str, fallback: &str) -> Result<usize, MissingParameters> {
        self.offset_of(primary)
            .or_else(|| self.offset_of(fallback))
            .ok_or_else(|| MissingParameters {
                primary: primary.to_string(),
                fallback: fallback.to_string(),
            })
    }

    /// Fails on the first key carrying `prefix` that does not hold exactly `expected` values.
    pub fn check_counts(&self, prefix: &str, expected: usize) -> Result<(), ParameterCount> {
        match self
            .index
            .keys
            .iter()
            .zip(&self.index.slices)
            .find(|(key, slice)| key.starts_with(prefix) && slice.count != expected)
        {
            Some((key, slice)) => Err(ParameterCount {
                key: key.clone(),
                expected,
                found: slice.count,
            }),
            None => Ok(()),
        }
    }

    /// First candidate key present in the store.
    pub fn resolve_first<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Option<usize> {
        candidates
            .into_iter()
            .find_map(|candidate| self.offset_of(candidate))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn values_for(&self, key: &str) -> Option<&[f64]> {
        self.slice(key).map(|slice| &self.values[slice.range()])
    }

    pub fn set(&mut self, position: usize, value: f64) {
        self.values[position] = value;
    }

    /// Key owning the value at `position`.
    pub fn key_at(&self, position: usize) -> Option<&str> {
        if position >= self.index.total {
            return None;
        }
        let slot = self
            .index
            .slices
            .partition_point(|slice| slice.offset <= position);
        self.index.keys.get(slot.checked_sub(1)?).map(String::as_str)
    }

    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.keys().filter(move |key| key.starts_with(prefix))
    }

    /// Value range spanned by the first contiguous run of keys carrying `prefix`.
    pub fn range_for_prefix(&self, prefix: &str) -> Option<Range<usize>> {
        let first = self
            .index
            .keys
            .iter()
            .position(|key| key.starts_with(prefix))?;
        let run = self.index.keys[first..]
            .iter()
            .take_while(|key| key.starts_with(prefix))
            .count();
        let start = self.index.slices[first].offset;
        let last = self.index.slices[first + run - 1];
        Some(start..last.offset + last.count)
    }
}
