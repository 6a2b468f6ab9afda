use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::numerical::{self, Stencil};
use crate::core::forcefield::potentials;
use crate::core::forcefield::sentinel::{NON_CONVERGED_ENERGY, NON_CONVERGED_GRADIENT};
use crate::core::forcefield::term::{InteractionTerm, push_unique_symmetric};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use nalgebra::Vector3;
use tracing::warn;

pub const PREFIX: &str = "adaptiveswg2b:";
const NAME: &str = "adaptiveswg2b";
const PARAMS_PER_KEY: usize = 4;
const BOUNDS: [(f64, f64); PARAMS_PER_KEY] =
    [(0.0, 20.0), (0.0, 1000.0), (0.0, 1000.0), (0.0, 20.0)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwgTwoBodyOptions {
    /// Pairs at or below this multiple of the covalent radius sum get the sentinel energy.
    pub blow_fac_close: f64,
    pub caching: bool,
    pub stencil: Stencil,
}

impl Default for SwgTwoBodyOptions {
    fn default() -> Self {
        Self {
            blow_fac_close: 0.2,
            caching: true,
            stencil: Stencil::Central,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PairPlan {
    i: usize,
    j: usize,
    offset: Option<usize>,
}

#[derive(Debug)]
struct Plan {
    pairs: Vec<PairPlan>,
}

enum Visit {
    Pair { energy: f64, d_dist: f64 },
    CloseContact,
    Missing,
}

/// Stillinger-Weber-Gong pair term `a (b / r^4 - 1) exp(alpha / (r - r0))` inside `r0`.
///
/// Parameters are fitted through a finite-difference gradient.
#[derive(Debug)]
pub struct SwgTwoBodyTerm {
    options: SwgTwoBodyOptions,
    cache: OffsetCache<Plan>,
}

impl SwgTwoBodyTerm {
    pub fn new(options: SwgTwoBodyOptions) -> Self {
        Self {
            options,
            cache: OffsetCache::new(options.caching),
        }
    }

    fn run<R>(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        eval: impl FnOnce(&Plan, &SwgTwoBodyOptions) -> R,
    ) -> Result<R, TermError> {
        let Self { options, cache } = self;
        cache.with_plan(
            topology,
            params,
            || -> Result<Plan, TermError> {
                params.check_counts(PREFIX, PARAMS_PER_KEY)?;
                Ok(build_plan(topology, params))
            },
            |plan| eval(plan, options),
        )
    }
}

fn pair_keys(topology: &Topology, i: usize, j: usize) -> (String, String) {
    (
        format!("{PREFIX}{}{}", topology.label(i), topology.label(j)),
        format!("{PREFIX}{}{}", topology.label(j), topology.label(i)),
    )
}

fn build_plan(topology: &Topology, params: &ParameterStore) -> Plan {
    let n = topology.num_atoms();
    let mut pairs = Vec::new();
    for i in (0..n).filter(|&i| !topology.is_dummy(i)) {
        for j in (i + 1..n).filter(|&j| !topology.is_dummy(j)) {
            let (primary, fallback) = pair_keys(topology, i, j);
            let offset = match params.resolve(&primary, &fallback) {
                Ok(offset) => Some(offset),
                Err(missing) => {
                    warn!(i, j, error = %missing, "No two-body parameters for pair");
                    None
                }
            };
            pairs.push(PairPlan { i, j, offset });
        }
    }
    Plan { pairs }
}

fn visit(
    plan: &Plan,
    options: &SwgTwoBodyOptions,
    topology: &Topology,
    values: &[f64],
    mut sink: impl FnMut(&PairPlan, Visit),
) {
    for pair in &plan.pairs {
        let dist = topology.distance(pair.i, pair.j);
        let close = options.blow_fac_close
            * (topology.covalent_radius(pair.i) + topology.covalent_radius(pair.j));
        if dist <= close {
            sink(pair, Visit::CloseContact);
            continue;
        }
        let Some(offset) = pair.offset else {
            sink(pair, Visit::Missing);
            continue;
        };
        let p = &values[offset..offset + PARAMS_PER_KEY];
        if dist >= p[0] {
            continue;
        }
        let (energy, d_dist) = potentials::swg_two_body(dist, p[0], p[1], p[2], p[3]);
        sink(pair, Visit::Pair { energy, d_dist });
    }
}

fn clamp_total(energy: f64) -> f64 {
    if energy >= NON_CONVERGED_ENERGY || energy.is_nan() {
        NON_CONVERGED_ENERGY
    } else {
        energy
    }
}

impl InteractionTerm for SwgTwoBodyTerm {
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
            visit(plan, options, topology, values, |_, visit| {
                energy += match visit {
                    Visit::Pair { energy, .. } => energy,
                    Visit::CloseContact | Visit::Missing => NON_CONVERGED_ENERGY,
                };
            });
            clamp_total(energy)
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
            visit(plan, options, topology, values, |pair, visit| match visit {
                Visit::Pair { energy: e, d_dist } => {
                    energy += e;
                    let scale = d_dist / topology.distance(pair.i, pair.j);
                    acc.add_pair(pair.i, pair.j, topology.displacement(pair.i, pair.j) * scale);
                }
                Visit::CloseContact => {
                    energy += NON_CONVERGED_ENERGY;
                    acc.add_pair(pair.i, pair.j, Vector3::repeat(NON_CONVERGED_GRADIENT));
                }
                Visit::Missing => {
                    energy += NON_CONVERGED_ENERGY;
                    acc.add_uniform(pair.i, NON_CONVERGED_GRADIENT);
                    acc.add_uniform(pair.j, NON_CONVERGED_GRADIENT);
                }
            });
            acc.add_energy(clamp_total(energy));
        })
    }

    fn parameter_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        gradient: &mut [f64],
    ) -> Result<f64, TermError> {
        let Some(range) = params.range_for_prefix(PREFIX) else {
            return self.energy(topology, params);
        };
        let stencil = self.options.stencil;
        numerical::parameter_gradient(params, range, stencil, gradient, |shifted| {
            self.energy(topology, shifted)
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let mut keys = Vec::new();
        for topology in topologies {
            let n = topology.num_atoms();
            for i in (0..n).filter(|&i| !topology.is_dummy(i)) {
                for j in (i + 1..n).filter(|&j| !topology.is_dummy(j)) {
                    let (key, reversed) = pair_keys(topology, i, j);
                    push_unique_symmetric(&mut keys, key, reversed, PARAMS_PER_KEY);
                }
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
