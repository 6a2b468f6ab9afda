use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::potentials;
use crate::core::forcefield::term::{InteractionTerm, LabelSource, push_unique_symmetric};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use crate::core::utils::geometry::{self, Dihedral};
use std::f64::consts::PI;
use tracing::{debug, warn};

pub const PREFIX: &str = "amberdihedral:";
const NAME: &str = "amberdihedral";
const PARAMS_PER_KEY: usize = 6;
const BOUNDS: [(f64, f64); 3] = [(-0.1, 0.1), (0.0, 5.0), (-PI, PI)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DihedralOptions {
    pub labels: LabelSource,
    pub caching: bool,
}

impl Default for DihedralOptions {
    fn default() -> Self {
        Self {
            labels: LabelSource::AtomTypes,
            caching: true,
        }
    }
}

#[derive(Debug)]
struct Plan {
    quadruples: Vec<([usize; 4], usize)>,
}

/// Double-cosine proper torsion over every 1-4 quadruple of the topology.
///
/// Quadruples without parameters or with an undefined angle are skipped.
#[derive(Debug)]
pub struct DihedralTerm {
    options: DihedralOptions,
    cache: OffsetCache<Plan>,
}

impl DihedralTerm {
    pub fn new(options: DihedralOptions) -> Self {
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
    let quadruples = topology
        .contributions_14()
        .iter()
        .filter_map(|quad| {
            let primary = format!("{PREFIX}{}", labels.joined(topology, quad));
            let fallback = format!("{PREFIX}{}", labels.joined_reversed(topology, quad));
            match params.resolve(&primary, &fallback) {
                Ok(offset) => Some((*quad, offset)),
                Err(missing) => {
                    warn!(atoms = ?quad, error = %missing, "Skipping dihedral without parameters");
                    None
                }
            }
        })
        .collect();
    Plan { quadruples }
}

fn visit(
    plan: &Plan,
    topology: &Topology,
    mut sink: impl FnMut(&[usize; 4], &Dihedral, usize),
) {
    let positions = topology.positions();
    for (quad, offset) in &plan.quadruples {
        let [a, b, c, d] = *quad;
        match geometry::dihedral(&positions[a], &positions[b], &positions[c], &positions[d]) {
            Ok(torsion) => {
                if torsion.degenerate {
                    debug!(atoms = ?quad, "Near-linear dihedral; using edge-case prefactor");
                }
                sink(quad, &torsion, *offset);
            }
            Err(err) => warn!(atoms = ?quad, error = %err, "Skipping degenerate dihedral"),
        }
    }
}

impl InteractionTerm for DihedralTerm {
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
            visit(plan, topology, |_, torsion, offset| {
                energy += potentials::double_cosine(
                    torsion.phi,
                    &values[offset..offset + PARAMS_PER_KEY],
                )
                .0;
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
            visit(plan, topology, |quad, torsion, offset| {
                let (energy, d_phi) = potentials::double_cosine(
                    torsion.phi,
                    &values[offset..offset + PARAMS_PER_KEY],
                );
                acc.add_energy(energy);
                for (&atom, derivative) in quad.iter().zip(&torsion.derivatives) {
                    acc.add(atom, derivative * d_phi);
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
            visit(plan, topology, |_, torsion, offset| {
                let slice = &values[offset..offset + PARAMS_PER_KEY];
                energy += potentials::double_cosine(torsion.phi, slice).0;
                let partials = potentials::double_cosine_parameter_derivatives(torsion.phi, slice);
                for (slot, d) in gradient[offset..offset + PARAMS_PER_KEY]
                    .iter_mut()
                    .zip(partials)
                {
                    *slot += d;
                }
            });
            energy
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let labels = self.options.labels;
        let mut keys = Vec::new();
        for topology in topologies {
            labels.check(topology, NAME)?;
            for quad in topology.contributions_14() {
                push_unique_symmetric(
                    &mut keys,
                    format!("{PREFIX}{}", labels.joined(topology, quad)),
                    format!("{PREFIX}{}", labels.joined_reversed(topology, quad)),
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
