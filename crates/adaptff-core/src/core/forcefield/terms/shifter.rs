use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::term::{InteractionTerm, push_unique};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use tracing::warn;

pub const PREFIX: &str = "totalenergyshifter:";
const NAME: &str = "totalenergyshifter";
const BOUNDS: [(f64, f64); 1] = [(-100.0, 0.0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShifterOptions {
    pub caching: bool,
}

impl Default for ShifterOptions {
    fn default() -> Self {
        Self { caching: true }
    }
}

#[derive(Debug)]
struct Plan {
    offsets: Vec<usize>,
}

/// Constant per-atom energy offset. Geometry independent.
#[derive(Debug)]
pub struct ShifterTerm {
    options: ShifterOptions,
    cache: OffsetCache<Plan>,
}

impl ShifterTerm {
    pub fn new(options: ShifterOptions) -> Self {
        Self {
            options,
            cache: OffsetCache::new(options.caching),
        }
    }

    fn run<R>(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        eval: impl FnOnce(&Plan) -> R,
    ) -> Result<R, TermError> {
        self.cache.with_plan(
            topology,
            params,
            || -> Result<Plan, TermError> {
                params.check_counts(PREFIX, 1)?;
                Ok(build_plan(topology, params))
            },
            eval,
        )
    }
}

fn build_plan(topology: &Topology, params: &ParameterStore) -> Plan {
    let offsets = (0..topology.num_atoms())
        .filter_map(|atom| {
            let key = format!("{PREFIX}{}", topology.label(atom));
            let offset = params.offset_of(&key);
            if offset.is_none() {
                warn!(atom, key = %key, "Skipping energy shift without parameters");
            }
            offset
        })
        .collect();
    Plan { offsets }
}

impl InteractionTerm for ShifterTerm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &[PREFIX]
    }

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError> {
        let values = params.values();
        self.run(topology, params, |plan| {
            plan.offsets.iter().map(|&offset| values[offset]).sum::<f64>()
        })
    }

    fn cartesian_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        acc: &mut GradientAccumulator,
    ) -> Result<(), TermError> {
        let energy = self.energy(topology, params)?;
        acc.add_energy(energy);
        Ok(())
    }

    fn parameter_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        gradient: &mut [f64],
    ) -> Result<f64, TermError> {
        let values = params.values();
        self.run(topology, params, |plan| {
            let mut energy = 0.0;
            for &offset in &plan.offsets {
                gradient[offset] += 1.0;
                energy += values[offset];
            }
            energy
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let mut keys = Vec::new();
        for topology in topologies {
            for label in topology.labels() {
                push_unique(&mut keys, format!("{PREFIX}{label}"), 1);
            }
        }
        Ok(keys)
    }

    fn bounds(&self, params: &ParameterStore, bounds: &mut ParameterBounds) {
        bounds.apply_per_key(params, PREFIX, &BOUNDS);
    }

    fn cold_copy(&self) -> Box<dyn InteractionTerm> {
        Box::new(Self {
            options: self.options,
            cache: self.cache.cold_copy(),
        })
    }

    fn reset_cache(&mut self) {
        self.cache.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::TopologyBuilder;
    use nalgebra::Point3;

    fn water() -> Topology {
        TopologyBuilder::new()
            .atom("O", 8, Point3::origin())
            .atom("H", 1, Point3::new(1.8, 0.0, 0.0))
            .atom("H", 1, Point3::new(-0.5, 1.7, 0.0))
            .build()
            .unwrap()
    }

    fn store() -> ParameterStore {
        ParameterStore::new(
            "amberff",
            [("totalenergyshifter:O", 1), ("totalenergyshifter:H", 1)],
        )
        .unwrap()
        .with_values(vec![-75.0, -0.5])
        .unwrap()
    }

    #[test]
    fn energy_adds_one_shift_per_atom() {
        let mut term = ShifterTerm::new(ShifterOptions::default());
        assert_eq!(term.energy(&water(), &store()).unwrap(), -76.0);
    }

    #[test]
    fn parameter_gradient_counts_atoms_per_label() {
        let mut term = ShifterTerm::new(ShifterOptions::default());
        let mut gradient = vec![0.0; 2];
        let energy = term
            .parameter_gradient(&water(), &store(), &mut gradient)
            .unwrap();
        assert_eq!(energy, -76.0);
        assert_eq!(gradient, vec![1.0, 2.0]);
    }

    #[test]
    fn cartesian_gradient_is_zero() {
        let mut term = ShifterTerm::new(ShifterOptions::default());
        let mut acc = GradientAccumulator::new(3);
        term.cartesian_gradient(&water(), &store(), &mut acc).unwrap();
        assert_eq!(acc.total_energy(), -76.0);
        assert!(acc.gradient().iter().all(|g| g.norm() == 0.0));
    }

    #[test]
    fn missing_label_is_skipped() {
        let params = ParameterStore::new("amberff", [("totalenergyshifter:H", 1)])
            .unwrap()
            .with_values(vec![-0.5])
            .unwrap();
        let mut term = ShifterTerm::new(ShifterOptions { caching: false });
        assert_eq!(term.energy(&water(), &params).unwrap(), -1.0);
    }

    #[test]
    fn wrong_value_count_fails_the_evaluation() {
        let params = ParameterStore::new(
            "amberff",
            [("totalenergyshifter:O", 1), ("totalenergyshifter:H", 2)],
        )
        .unwrap();
        let mut term = ShifterTerm::new(ShifterOptions::default());
        assert!(matches!(
            term.energy(&water(), &params),
            Err(TermError::ParameterCount(ref err)) if err.key == "totalenergyshifter:H"
        ));
    }

    #[test]
    fn required_keys_follow_first_appearance() {
        let term = ShifterTerm::new(ShifterOptions::default());
        let keys = term.required_keys(&[water()]).unwrap();
        assert_eq!(
            keys,
            vec![
                ("totalenergyshifter:O".to_string(), 1),
                ("totalenergyshifter:H".to_string(), 1),
            ]
        );
    }

    #[test]
    fn bounds_allow_only_negative_shifts() {
        let term = ShifterTerm::new(ShifterOptions::default());
        let params = store();
        let mut bounds = ParameterBounds::for_store(&params);
        term.bounds(&params, &mut bounds);
        assert_eq!(bounds.lower(), &[-100.0, -100.0]);
        assert_eq!(bounds.upper(), &[0.0, 0.0]);
    }
}
