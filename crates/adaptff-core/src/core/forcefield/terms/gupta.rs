use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::exp::ExpFlavor;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::sentinel::{NON_CONVERGED_ENERGY, NON_CONVERGED_GRADIENT};
use crate::core::forcefield::term::{InteractionTerm, push_unique};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use itertools::Itertools;
use tracing::warn;

pub const PREFIX: &str = "adaptivegupta:";
const NAME: &str = "adaptivegupta";
const PARAMS_PER_KEY: usize = 5;
const BOUNDS: [(f64, f64); PARAMS_PER_KEY] = [
    (-2.0, 2.0),
    (-20.0, 20.0),
    (0.0, 20.0),
    (-2.0, 2.0),
    (-20.0, 20.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuptaOptions {
    /// Pairs farther apart than this multiple of the covalent radius sum are skipped.
    pub blow_dist: f64,
    pub caching: bool,
    pub exp: ExpFlavor,
}

impl Default for GuptaOptions {
    fn default() -> Self {
        Self {
            blow_dist: 2.0,
            caching: true,
            exp: ExpFlavor::Standard,
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

/// Energy of one pair with its distance and parameter derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuptaPair {
    pub repulsive: f64,
    pub attractive: f64,
    pub d_dist: f64,
    /// dE/d[A, p, r0, chi, q]
    pub d_params: [f64; PARAMS_PER_KEY],
}

impl GuptaPair {
    pub fn energy(&self) -> f64 {
        self.repulsive - self.attractive
    }
}

/// `A exp(-p (r/r0 - 1)) - sqrt(chi^2 exp(-2 q (r/r0 - 1)))` for `params = [A, p, r0, chi, q]`.
pub fn gupta_pair(dist: f64, params: &[f64], exp: ExpFlavor) -> GuptaPair {
    let (a, p, r0, chi, q) = (params[0], params[1], params[2], params[3], params[4]);
    let x = dist / r0 - 1.0;
    let e1 = exp.exp(-p * x);
    let e2 = exp.exp(-2.0 * q * x);
    let repulsive = a * e1;
    let chi_sq = chi * chi;
    let attractive = (chi_sq * e2).sqrt();

    let (d_att_dist, d_att_r0, d_att_chi, d_att_q) = if attractive > 0.0 {
        (
            -chi_sq * q * e2 / (r0 * attractive),
            chi_sq * q * dist * e2 / (r0 * r0 * attractive),
            chi * e2 / attractive,
            -chi_sq * x * e2 / attractive,
        )
    } else {
        (0.0, 0.0, 0.0, 0.0)
    };

    GuptaPair {
        repulsive,
        attractive,
        d_dist: -a * p * e1 / r0 - d_att_dist,
        d_params: [
            e1,
            -a * x * e1,
            a * p * dist * e1 / (r0 * r0) - d_att_r0,
            -d_att_chi,
            -d_att_q,
        ],
    }
}

/// Gupta (second-moment tight-binding) pair potential with configurable exponential.
///
/// With a rigid environment only pairs with at least one atom outside the last
/// molecule block are evaluated.
#[derive(Debug)]
pub struct GuptaTerm {
    options: GuptaOptions,
    cache: OffsetCache<Plan>,
}

impl GuptaTerm {
    pub fn new(options: GuptaOptions) -> Self {
        Self {
            options,
            cache: OffsetCache::new(options.caching),
        }
    }

    pub fn options(&self) -> &GuptaOptions {
        &self.options
    }

    fn run<R>(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        eval: impl FnOnce(&Plan, &GuptaOptions) -> R,
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
    for i in 0..topology.flexible_atom_count() {
        for j in (i + 1)..n {
            let (primary, fallback) = pair_keys(topology, i, j);
            let offset = match params.resolve(&primary, &fallback) {
                Ok(offset) => Some(offset),
                Err(missing) => {
                    warn!(i, j, error = %missing, "Adding non-converged sentinel for Gupta pair");
                    None
                }
            };
            pairs.push(PairPlan { i, j, offset });
        }
    }
    Plan { pairs }
}

enum Visit {
    Pair(GuptaPair, usize),
    Missing,
}

fn visit(
    plan: &Plan,
    options: &GuptaOptions,
    topology: &Topology,
    values: &[f64],
    mut sink: impl FnMut(&PairPlan, Visit),
) {
    for pair in &plan.pairs {
        let dist = topology.distance(pair.i, pair.j);
        let radii = topology.covalent_radius(pair.i) + topology.covalent_radius(pair.j);
        if dist > options.blow_dist * radii {
            continue;
        }
        match pair.offset {
            Some(offset) => {
                let values = &values[offset..offset + PARAMS_PER_KEY];
                sink(pair, Visit::Pair(gupta_pair(dist, values, options.exp), offset));
            }
            None => sink(pair, Visit::Missing),
        }
    }
}

impl InteractionTerm for GuptaTerm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &[PREFIX]
    }

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError> {
        self.run(topology, params, |plan, options| {
            let mut energy = 0.0;
            visit(plan, options, topology, params.values(), |_, visit| {
                energy += match visit {
                    Visit::Pair(pair, _) => pair.energy(),
                    Visit::Missing => NON_CONVERGED_ENERGY,
                }
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
        self.run(topology, params, |plan, options| {
            visit(plan, options, topology, params.values(), |p, visit| match visit {
                Visit::Pair(pair, _) => {
                    acc.add_energy(pair.energy());
                    let dist = topology.distance(p.i, p.j);
                    acc.add_pair(p.i, p.j, topology.displacement(p.i, p.j) * (pair.d_dist / dist));
                }
                Visit::Missing => {
                    acc.add_energy(NON_CONVERGED_ENERGY);
                    acc.add_uniform(p.i, NON_CONVERGED_GRADIENT);
                    acc.add_uniform(p.j, NON_CONVERGED_GRADIENT);
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
        self.run(topology, params, |plan, options| {
            let mut energy = 0.0;
            visit(plan, options, topology, params.values(), |_, visit| match visit {
                Visit::Pair(pair, offset) => {
                    energy += pair.energy();
                    for (slot, d) in gradient[offset..offset + PARAMS_PER_KEY]
                        .iter_mut()
                        .zip(pair.d_params)
                    {
                        *slot += d;
                    }
                }
                Visit::Missing => energy += NON_CONVERGED_ENERGY,
            });
            energy
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let labels: Vec<&str> = topologies
            .iter()
            .flat_map(|t| t.labels().iter().map(String::as_str))
            .unique()
            .collect();
        let mut keys = Vec::new();
        for pair in labels.iter().combinations_with_replacement(2) {
            push_unique(&mut keys, format!("{PREFIX}{}{}", pair[0], pair[1]), PARAMS_PER_KEY);
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
