use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::potentials;
use crate::core::forcefield::term::{InteractionTerm, LabelSource, push_unique_symmetric};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use crate::core::utils::geometry::{self, BondAngle};
use std::f64::consts::PI;
use tracing::warn;

pub const PREFIX: &str = "amberangle:";
const NAME: &str = "amberangle";
const PARAMS_PER_KEY: usize = 2;
const BOUNDS: [(f64, f64); 2] = [(0.0, 0.1), (0.0, PI)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleOptions {
    pub labels: LabelSource,
    pub caching: bool,
}

impl Default for AngleOptions {
    fn default() -> Self {
        Self {
            labels: LabelSource::AtomTypes,
            caching: true,
        }
    }
}

#[derive(Debug)]
struct Plan {
    triples: Vec<([usize; 3], usize)>,
}

/// Harmonic bond-angle bending `0.5 k (theta - theta0)^2` over the 1-3 triples.
#[derive(Debug)]
pub struct AngleTerm {
    options: AngleOptions,
    cache: OffsetCache<Plan>,
}

impl AngleTerm {
    pub fn new(options: AngleOptions) -> Self {
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
        self.options.labels.check(topology, NAME)?;
        let Self { options, cache } = self;
        cache.with_plan(
            topology,
            params,
            || -> Result<Plan, TermError> {
                params.check_counts(PREFIX, PARAMS_PER_KEY)?;
                Ok(build_plan(options.labels, topology, params))
            },
            eval,
        )
    }
}

fn build_plan(labels: LabelSource, topology: &Topology, params: &ParameterStore) -> Plan {
    let triples = topology
        .contributions_13()
        .iter()
        .filter_map(|triple| {
            let primary = format!("{PREFIX}{}", labels.joined(topology, triple));
            let fallback = format!("{PREFIX}{}", labels.joined_reversed(topology, triple));
            match params.resolve(&primary, &fallback) {
                Ok(offset) => Some((*triple, offset)),
                Err(missing) => {
                    warn!(atoms = ?triple, error = %missing, "Skipping angle without parameters");
                    None
                }
            }
        })
        .collect();
    Plan { triples }
}

fn visit(plan: &Plan, topology: &Topology, mut sink: impl FnMut(&[usize; 3], &BondAngle, usize)) {
    let positions = topology.positions();
    for (triple, offset) in &plan.triples {
        let [a, vertex, c] = *triple;
        match geometry::bond_angle(&positions[a], &positions[vertex], &positions[c]) {
            Ok(angle) => sink(triple, &angle, *offset),
            Err(err) => warn!(atoms = ?triple, error = %err, "Skipping undefined angle"),
        }
    }
}

impl InteractionTerm for AngleTerm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &[PREFIX]
    }

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError> {
        let values = params.values();
        self.run(topology, params, |plan| {
            let mut energy = 0.0;
            visit(plan, topology, |_, angle, offset| {
                energy += potentials::harmonic(angle.theta, values[offset + 1], values[offset]).0;
            });
            energy
        })
    }

    fn cartesian_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        acc: &mut GradientAccumulator,
    ) -> Result<(), TermError> {
        let values = params.values();
        self.run(topology, params, |plan| {
            visit(plan, topology, |triple, angle, offset| {
                let (energy, d_theta) =
                    potentials::harmonic(angle.theta, values[offset + 1], values[offset]);
                acc.add_energy(energy);
                for (&atom, derivative) in triple.iter().zip(&angle.derivatives) {
                    acc.add(atom, derivative * d_theta);
                }
            });
        })
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
            visit(plan, topology, |_, angle, offset| {
                let k = values[offset];
                let delta = angle.theta - values[offset + 1];
                energy += 0.5 * k * delta * delta;
                gradient[offset] += 0.5 * delta * delta;
                gradient[offset + 1] -= k * delta;
            });
            energy
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let labels = self.options.labels;
        let mut keys = Vec::new();
        for topology in topologies {
            labels.check(topology, NAME)?;
            for triple in topology.contributions_13() {
                push_unique_symmetric(
                    &mut keys,
                    format!("{PREFIX}{}", labels.joined(topology, triple)),
                    format!("{PREFIX}{}", labels.joined_reversed(topology, triple)),
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
