use super::store::ParameterStore;

/// Lower/upper limits for every position of a [`ParameterStore`].
///
/// Positions no term claims stay unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl ParameterBounds {
    pub fn unbounded(len: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; len],
            upper: vec![f64::INFINITY; len],
        }
    }

    pub fn for_store(store: &ParameterStore) -> Self {
        Self::unbounded(store.len())
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn set(&mut self, position: usize, lower: f64, upper: f64) {
        self.lower[position] = lower;
        self.upper[position] = upper;
    }

    /// Applies `pattern` to every key starting with `prefix`, cycling through the
    /// pattern for each parameter of the key.
    pub fn apply_per_key(&mut self, store: &ParameterStore, prefix: &str, pattern: &[(f64, f64)]) {
        if pattern.is_empty() {
            return;
        }
        for key in store.keys_with_prefix(prefix) {
            let Some(slice) = store.slice(key) else {
                continue;
            };
            for (n, position) in slice.range().enumerate() {
                let (lower, upper) = pattern[n % pattern.len()];
                self.set(position, lower, upper);
            }
        }
    }

    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    pub fn clamp(&self, values: &mut [f64]) {
        for (v, (&lo, &hi)) in values.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.clamp(lo, hi);
        }
    }
}
