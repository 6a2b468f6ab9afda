use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::potentials;
use crate::core::forcefield::sentinel::{BOND_STRETCH_PENALTY, fold_energy, fold_gradient};
use crate::core::forcefield::term::{InteractionTerm, LabelSource, push_unique_symmetric};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use tracing::warn;

pub const PREFIX: &str = "adaptiveharmonicterm:";
const NAME: &str = "adaptiveharmonicterm";
const PARAMS_PER_KEY: usize = 2;
const BOUNDS: [(f64, f64); 2] = [(0.0, 0.5), (1.0, 8.0)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondOptions {
    /// Elongation `r - r0` at and beyond which a bond contributes the stretch penalty.
    pub stretch_cutoff: f64,
    pub labels: LabelSource,
    pub caching: bool,
}

impl Default for BondOptions {
    fn default() -> Self {
        Self {
            stretch_cutoff: 20.0,
            labels: LabelSource::AtomTypes,
            caching: true,
        }
    }
}

#[derive(Debug)]
struct Plan {
    bonds: Vec<(usize, usize, usize)>,
}

enum Stretch {
    Harmonic { delta: f64, k: f64 },
    Penalty,
}

/// Harmonic bond stretching `0.5 k (r - r0)^2` over the bonds of the topology.
#[derive(Debug)]
pub struct BondTerm {
    options: BondOptions,
    cache: OffsetCache<Plan>,
}

impl BondTerm {
    pub fn new(options: BondOptions) -> Self {
        Self {
            options,
            cache: OffsetCache::new(options.caching),
        }
    }

    fn run<R>(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        eval: impl FnOnce(&Plan, &BondOptions) -> R,
    ) -> Result<R, TermError> {
        self.options.labels.check(topology, NAME)?;
        let Self { options, cache } = self;
        cache.with_plan(
            topology,
            params,
            || -> Result<Plan, TermError> {
                params.check_counts(PREFIX, PARAMS_PER_KEY)?;
                Ok(build_plan(options.labels, topology, params))
            },
            |plan| eval(plan, options),
        )
    }
}

fn build_plan(labels: LabelSource, topology: &Topology, params: &ParameterStore) -> Plan {
    let bonds = topology
        .bonds()
        .iter()
        .filter_map(|bond| {
            let pair = [bond.first, bond.second];
            let primary = format!("{PREFIX}{}", labels.joined(topology, &pair));
            let fallback = format!("{PREFIX}{}", labels.joined_reversed(topology, &pair));
            match params.resolve(&primary, &fallback) {
                Ok(offset) => Some((bond.first, bond.second, offset)),
                Err(missing) => {
                    warn!(atoms = ?pair, error = %missing, "Skipping bond without parameters");
                    None
                }
            }
        })
        .collect();
    Plan { bonds }
}

fn visit(
    plan: &Plan,
    options: &BondOptions,
    topology: &Topology,
    values: &[f64],
    mut sink: impl FnMut(usize, usize, usize, Stretch),
) {
    for &(i, j, offset) in &plan.bonds {
        let delta = topology.distance(i, j) - values[offset + 1];
        let stretch = if delta >= options.stretch_cutoff {
            Stretch::Penalty
        } else {
            Stretch::Harmonic {
                delta,
                k: values[offset],
            }
        };
        sink(i, j, offset, stretch);
    }
}

impl InteractionTerm for BondTerm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &[PREFIX]
    }

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError> {
        let values = params.values();
        self.run(topology, params, |plan, options| {
            let mut energy = 0.0;
            visit(plan, options, topology, values, |_, _, _, stretch| {
                energy += match stretch {
                    Stretch::Harmonic { delta, k } => potentials::harmonic(delta, 0.0, k).0,
                    Stretch::Penalty => BOND_STRETCH_PENALTY,
                };
            });
            fold_energy(energy)
        })
    }

    fn cartesian_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        acc: &mut GradientAccumulator,
    ) -> Result<(), TermError> {
        let values = params.values();
        self.run(topology, params, |plan, options| {
            let mut energy = 0.0;
            visit(plan, options, topology, values, |i, j, _, stretch| match stretch {
                Stretch::Harmonic { delta, k } => {
                    let (e, d_dist) = potentials::harmonic(delta, 0.0, k);
                    energy += e;
                    let scale = fold_gradient(d_dist / topology.distance(i, j));
                    acc.add_pair(i, j, topology.displacement(i, j) * scale);
                }
                Stretch::Penalty => energy += BOND_STRETCH_PENALTY,
            });
            acc.add_energy(fold_energy(energy));
        })
    }

    fn parameter_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        gradient: &mut [f64],
    ) -> Result<f64, TermError> {
        let values = params.values();
        self.run(topology, params, |plan, options| {
            let mut energy = 0.0;
            visit(plan, options, topology, values, |_, _, offset, stretch| match stretch {
                Stretch::Harmonic { delta, k } => {
                    energy += 0.5 * k * delta * delta;
                    gradient[offset] += 0.5 * delta * delta;
                    gradient[offset + 1] -= k * delta;
                }
                Stretch::Penalty => energy += BOND_STRETCH_PENALTY,
            });
            fold_energy(energy)
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let labels = self.options.labels;
        let mut keys = Vec::new();
        for topology in topologies {
            labels.check(topology, NAME)?;
            for bond in topology.bonds() {
                let pair = [bond.first, bond.second];
                push_unique_symmetric(
                    &mut keys,
                    format!("{PREFIX}{}", labels.joined(topology, &pair)),
                    format!("{PREFIX}{}", labels.joined_reversed(topology, &pair)),
                    PARAMS_PER_KEY,
                );
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
