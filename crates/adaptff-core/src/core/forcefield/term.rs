use super::error::TermError;
use super::gradient::GradientAccumulator;
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use std::fmt;

/// Which per-atom string a term builds its parameter keys from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelSource {
    #[default]
    AtomTypes,
    SpecialIds,
}

impl LabelSource {
    /// Fails when special identifiers are requested but the topology has none.
    pub fn check(&self, topology: &Topology, term: &'static str) -> Result<(), TermError> {
        match self {
            Self::SpecialIds if !topology.has_special_ids() => {
                Err(TermError::MissingSpecialIds { term })
            }
            _ => Ok(()),
        }
    }

    pub fn label<'a>(&self, topology: &'a Topology, atom: usize) -> &'a str {
        match self {
            Self::AtomTypes => topology.label(atom),
            Self::SpecialIds => topology
                .special_id(atom)
                .unwrap_or_else(|| topology.label(atom)),
        }
    }

    /// Concatenated labels of `atoms` in the given order.
    pub fn joined(&self, topology: &Topology, atoms: &[usize]) -> String {
        atoms.iter().map(|&a| self.label(topology, a)).collect()
    }

    /// Concatenated labels of `atoms` in reverse order.
    pub fn joined_reversed(&self, topology: &Topology, atoms: &[usize]) -> String {
        atoms.iter().rev().map(|&a| self.label(topology, a)).collect()
    }
}

/// One functional form of the force field evaluated over a [`Topology`] with
/// parameters taken from a [`ParameterStore`].
///
/// Implementations may keep an offset cache between calls, hence `&mut self`.
/// A term instance must not be shared between threads evaluating at the same time;
/// use [`InteractionTerm::cold_copy`] to obtain an independent instance.
pub trait InteractionTerm: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Key prefixes owned by this term.
    fn prefixes(&self) -> &'static [&'static str];

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError>;

    /// Adds the energy and the Cartesian gradient of this term to `acc`.
    fn cartesian_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        acc: &mut GradientAccumulator,
    ) -> Result<(), TermError>;

    /// Adds dE/dp for the parameters this term owns into `gradient` and returns the energy.
    fn parameter_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        gradient: &mut [f64],
    ) -> Result<f64, TermError>;

    /// `(key, parameter count)` pairs needed to evaluate `topologies`, in first-use order.
    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError>;

    fn bounds(&self, params: &ParameterStore, bounds: &mut ParameterBounds);

    /// Same configuration with an empty cache.
    fn cold_copy(&self) -> Box<dyn InteractionTerm>;

    fn reset_cache(&mut self);
}

/// Appends `key` unless it is already present.
pub(crate) fn push_unique(keys: &mut Vec<(String, usize)>, key: String, count: usize) {
    if !keys.iter().any(|(existing, _)| *existing == key) {
        keys.push((key, count));
    }
}

/// Appends `key` unless it or its reversal is already present.
pub(crate) fn push_unique_symmetric(
    keys: &mut Vec<(String, usize)>,
    key: String,
    reversed: String,
    count: usize,
) {
    if !keys
        .iter()
        .any(|(existing, _)| *existing == key || *existing == reversed)
    {
        keys.push((key, count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::TopologyBuilder;
    use nalgebra::Point3;

    fn water(with_ids: bool) -> Topology {
        let builder = TopologyBuilder::new()
            .atom("O", 8, Point3::origin())
            .atom("H", 1, Point3::new(1.8, 0.0, 0.0))
            .atom("H", 1, Point3::new(-0.5, 1.7, 0.0))
            .bond(0, 1)
            .bond(0, 2);
        let builder = if with_ids {
            builder.special_ids(vec!["Ow".into(), "Hw1".into(), "Hw2".into()])
        } else {
            builder
        };
        builder.build().unwrap()
    }

    #[test]
    fn atom_type_labels_join_in_both_orders() {
        let topology = water(false);
        let source = LabelSource::AtomTypes;
        assert_eq!(source.joined(&topology, &[1, 0, 2]), "HOH");
        assert_eq!(source.joined_reversed(&topology, &[0, 1]), "HO");
    }

    #[test]
    fn special_id_labels_replace_atom_types() {
        let topology = water(true);
        let source = LabelSource::SpecialIds;
        assert!(source.check(&topology, "test").is_ok());
        assert_eq!(source.joined(&topology, &[0, 2]), "OwHw2");
    }

    #[test]
    fn special_ids_are_required_when_selected() {
        let topology = water(false);
        assert_eq!(
            LabelSource::SpecialIds.check(&topology, "amberlj"),
            Err(TermError::MissingSpecialIds { term: "amberlj" })
        );
        assert!(LabelSource::AtomTypes.check(&topology, "amberlj").is_ok());
    }

    #[test]
    fn push_unique_symmetric_skips_reversed_duplicates() {
        let mut keys = Vec::new();
        push_unique_symmetric(&mut keys, "b:AB".into(), "b:BA".into(), 2);
        push_unique_symmetric(&mut keys, "b:BA".into(), "b:AB".into(), 2);
        push_unique(&mut keys, "b:AB".into(), 2);
        push_unique(&mut keys, "b:AA".into(), 2);
        assert_eq!(keys, vec![("b:AB".to_string(), 2), ("b:AA".to_string(), 2)]);
    }
}
