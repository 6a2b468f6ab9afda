use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::numerical::{self, Stencil};
use crate::core::forcefield::potentials;
use crate::core::forcefield::sentinel::NON_CONVERGED_ENERGY;
use crate::core::forcefield::term::InteractionTerm;
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::{MissingParameters, ParameterStore};
use itertools::Itertools;

/// Per-pair cutoff `[r0, gamma]`.
pub const PAIR_PREFIX: &str = "adaptiveswg3b2b:";
/// Per-triple angular strength `[c0, c1, lambda]`.
pub const TRIPLE_PREFIX: &str = "adaptiveswg3b:";
const NAME: &str = "adaptiveswg3b";
const PAIR_PARAMS: usize = 2;
const TRIPLE_PARAMS: usize = 3;
const PAIR_BOUNDS: [(f64, f64); PAIR_PARAMS] = [(0.0, 20.0), (0.0, 20.0)];
const TRIPLE_BOUNDS: [(f64, f64); TRIPLE_PARAMS] = [(-10.0, 10.0), (-10.0, 10.0), (0.0, 1000.0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwgThreeBodyOptions {
    pub caching: bool,
    pub stencil: Stencil,
}

impl Default for SwgThreeBodyOptions {
    fn default() -> Self {
        Self {
            caching: true,
            stencil: Stencil::Central,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TriplePlan {
    /// `[i, j, k]` with `i < j < k`.
    atoms: [usize; 3],
    /// Pair offsets for `ij`, `ik` and `jk`.
    pairs: [usize; 3],
    triple: usize,
}

#[derive(Debug)]
struct Plan {
    triples: Vec<TriplePlan>,
}

/// Energy of one triple with its derivatives along `r_ij`, `r_ik` and `r_jk`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TripleContribution {
    energy: f64,
    d_dist: [f64; 3],
}

/// Stillinger-Weber-Gong three-body angular term.
///
/// Every parameterised pair and triple must be present in the store: a missing key
/// fails the evaluation instead of silently dropping the triple.
#[derive(Debug)]
pub struct SwgThreeBodyTerm {
    options: SwgThreeBodyOptions,
    cache: OffsetCache<Plan>,
}

impl SwgThreeBodyTerm {
    pub fn new(options: SwgThreeBodyOptions) -> Self {
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
        self.cache
            .with_plan(topology, params, || build_plan(topology, params), eval)
    }
}

fn pair_offset(
    topology: &Topology,
    params: &ParameterStore,
    a: usize,
    b: usize,
) -> Result<usize, MissingParameters> {
    params.resolve(
        &format!("{PAIR_PREFIX}{}{}", topology.label(a), topology.label(b)),
        &format!("{PAIR_PREFIX}{}{}", topology.label(b), topology.label(a)),
    )
}

fn triple_offset(
    topology: &Topology,
    params: &ParameterStore,
    atoms: [usize; 3],
) -> Result<usize, MissingParameters> {
    let candidates: Vec<String> = atoms
        .iter()
        .permutations(3)
        .map(|order| {
            let labels: String = order.iter().map(|&&atom| topology.label(atom)).collect();
            format!("{TRIPLE_PREFIX}{labels}")
        })
        .collect();
    params
        .resolve_first(candidates.iter().map(String::as_str))
        .ok_or_else(|| MissingParameters {
            primary: candidates[0].clone(),
            fallback: candidates[candidates.len() - 1].clone(),
        })
}

fn build_plan(topology: &Topology, params: &ParameterStore) -> Result<Plan, TermError> {
    params.check_counts(PAIR_PREFIX, PAIR_PARAMS)?;
    params.check_counts(TRIPLE_PREFIX, TRIPLE_PARAMS)?;
    let n = topology.num_atoms();
    let mut triples = Vec::new();
    for k in (0..n).filter(|&k| !topology.is_dummy(k)) {
        for j in (0..k).filter(|&j| !topology.is_dummy(j)) {
            let jk = pair_offset(topology, params, j, k)?;
            for i in (0..j).filter(|&i| !topology.is_dummy(i)) {
                triples.push(TriplePlan {
                    atoms: [i, j, k],
                    pairs: [
                        pair_offset(topology, params, i, j)?,
                        pair_offset(topology, params, i, k)?,
                        jk,
                    ],
                    triple: triple_offset(topology, params, [i, j, k])?,
                });
            }
        }
    }
    Ok(Plan { triples })
}

fn evaluate(
    triple: &TriplePlan,
    topology: &Topology,
    values: &[f64],
) -> Option<TripleContribution> {
    let [i, j, k] = triple.atoms;
    let dists = [
        topology.distance(i, j),
        topology.distance(i, k),
        topology.distance(j, k),
    ];

    let mut factors = [(0.0, 0.0); 3];
    for ((factor, &dist), &offset) in factors.iter_mut().zip(&dists).zip(&triple.pairs) {
        let (r0, gamma) = (values[offset], values[offset + 1]);
        if dist > r0 {
            return None;
        }
        *factor = potentials::swg_cutoff_factor(dist, r0, gamma);
    }
    let [(f_ij, df_ij), (f_ik, df_ik), (f_jk, df_jk)] = factors;
    let [r_ij, r_ik, r_jk] = dists;

    let c = &values[triple.triple..triple.triple + TRIPLE_PARAMS];
    let (c0, c1, lambda) = (c[0], c[1], c[2]);

    // Cosines at i, j and k; derivative order follows the argument order.
    let (cos_i, dc_i) = potentials::law_of_cosines(r_ij, r_ik, r_jk);
    let (cos_j, dc_j) = potentials::law_of_cosines(r_ij, r_jk, r_ik);
    let (cos_k, dc_k) = potentials::law_of_cosines(r_ik, r_jk, r_ij);
    let (g_i, dg_i) = potentials::swg_angular(cos_i, c0, c1);
    let (g_j, dg_j) = potentials::swg_angular(cos_j, c0, c1);
    let (g_k, dg_k) = potentials::swg_angular(cos_k, c0, c1);

    let w_i = f_ij * f_ik;
    let w_j = f_ij * f_jk;
    let w_k = f_ik * f_jk;
    let energy = lambda * (w_i * g_i + w_j * g_j + w_k * g_k);

    let d_ij = df_ij * f_ik * g_i
        + w_i * dg_i * dc_i[0]
        + df_ij * f_jk * g_j
        + w_j * dg_j * dc_j[0]
        + w_k * dg_k * dc_k[2];
    let d_ik = f_ij * df_ik * g_i
        + w_i * dg_i * dc_i[1]
        + w_j * dg_j * dc_j[2]
        + df_ik * f_jk * g_k
        + w_k * dg_k * dc_k[0];
    let d_jk = w_i * dg_i * dc_i[2]
        + f_ij * df_jk * g_j
        + w_j * dg_j * dc_j[1]
        + f_ik * df_jk * g_k
        + w_k * dg_k * dc_k[1];

    Some(TripleContribution {
        energy,
        d_dist: [lambda * d_ij, lambda * d_ik, lambda * d_jk],
    })
}

fn clamp_total(energy: f64) -> f64 {
    if energy >= NON_CONVERGED_ENERGY || energy.is_nan() {
        NON_CONVERGED_ENERGY
    } else {
        energy
    }
}

impl InteractionTerm for SwgThreeBodyTerm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &[PAIR_PREFIX, TRIPLE_PREFIX]
    }

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError> {
        let values = params.values();
        self.run(topology, params, |plan| {
            let energy = plan
                .triples
                .iter()
                .filter_map(|triple| evaluate(triple, topology, values))
                .map(|contribution| contribution.energy)
                .sum::<f64>();
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
        self.run(topology, params, |plan| {
            let mut energy = 0.0;
            for triple in &plan.triples {
                let Some(contribution) = evaluate(triple, topology, values) else {
                    continue;
                };
                energy += contribution.energy;
                let [i, j, k] = triple.atoms;
                for ((a, b), d_dist) in [(i, j), (i, k), (j, k)].into_iter().zip(contribution.d_dist)
                {
                    let scale = d_dist / topology.distance(a, b);
                    acc.add_pair(a, b, topology.displacement(a, b) * scale);
                }
            }
            acc.add_energy(clamp_total(energy));
        })
    }

    fn parameter_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        gradient: &mut [f64],
    ) -> Result<f64, TermError> {
        let stencil = self.options.stencil;
        let mut energy = self.energy(topology, params)?;
        for prefix in [PAIR_PREFIX, TRIPLE_PREFIX] {
            if let Some(range) = params.range_for_prefix(prefix) {
                energy = numerical::parameter_gradient(params, range, stencil, gradient, |shifted| {
                    self.energy(topology, shifted)
                })?;
            }
        }
        Ok(energy)
    }

    /// Every pair of distinct or equal labels first, then every unordered triple.
    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let labels: Vec<&str> = topologies
            .iter()
            .flat_map(|topology| {
                (0..topology.num_atoms())
                    .filter(|&atom| !topology.is_dummy(atom))
                    .map(|atom| topology.label(atom))
            })
            .unique()
            .collect();

        let pairs = labels
            .iter()
            .combinations_with_replacement(2)
            .map(|pair| (format!("{PAIR_PREFIX}{}{}", pair[0], pair[1]), PAIR_PARAMS));
        let triples = labels.iter().combinations_with_replacement(3).map(|triple| {
            (
                format!("{TRIPLE_PREFIX}{}{}{}", triple[0], triple[1], triple[2]),
                TRIPLE_PARAMS,
            )
        });
        Ok(pairs.chain(triples).collect())
    }

    fn bounds(&self, params: &ParameterStore, bounds: &mut ParameterBounds) {
        bounds.apply_per_key(params, PAIR_PREFIX, &PAIR_BOUNDS);
        bounds.apply_per_key(params, TRIPLE_PREFIX, &TRIPLE_BOUNDS);
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
