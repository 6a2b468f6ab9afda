use crate::core::forcefield::cache::OffsetCache;
use crate::core::forcefield::error::TermError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::potentials;
use crate::core::forcefield::sentinel::{
    CLOSE_CONTACT_ENERGY, NON_CONVERGED_ENERGY, NON_CONVERGED_GRADIENT,
};
use crate::core::forcefield::term::{InteractionTerm, LabelSource, push_unique};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use tracing::warn;

pub const PREFIX: &str = "amberlj:";
const NAME: &str = "amberlj";
const PARAMS_PER_KEY: usize = 2;
const BOUNDS: [(f64, f64); PARAMS_PER_KEY] = [(-0.01, 0.01), (0.0, 15.0)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJonesOptions {
    /// Dispersion is skipped beyond this multiple of the covalent radius sum.
    pub blow_dist: f64,
    /// Pairs closer than this multiple of the radius sum receive the close-contact penalty.
    pub blow_close: f64,
    pub scale_14: f64,
    pub scale_14_electrostatic: f64,
    pub labels: LabelSource,
    pub caching: bool,
}

impl Default for LennardJonesOptions {
    fn default() -> Self {
        Self {
            blow_dist: 20.0,
            blow_close: 0.8,
            scale_14: 0.5,
            scale_14_electrostatic: 1.0 / 1.2,
            labels: LabelSource::AtomTypes,
            caching: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PairPlan {
    i: usize,
    j: usize,
    scale: f64,
    scale_electrostatic: f64,
}

#[derive(Debug)]
struct Plan {
    offsets: Vec<Option<usize>>,
    pairs: Vec<PairPlan>,
}

#[derive(Debug, Clone, Copy)]
enum Dispersion {
    Skipped,
    CloseContact,
    Sentinel { slots: [Option<usize>; 4] },
    Direct { offset: usize, d_eps: f64, d_sigma: f64 },
    Mixed { offsets: [usize; 2], d_eps: [f64; 2], d_sigma: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Contribution {
    i: usize,
    j: usize,
    energy: f64,
    d_dist: f64,
    dispersion: Dispersion,
}

/// Lennard-Jones 12-6 dispersion with Lorentz-Berthelot mixing plus Coulomb
/// electrostatics over all non-bonded, non-1-3 pairs.
#[derive(Debug)]
pub struct LennardJonesTerm {
    options: LennardJonesOptions,
    cache: OffsetCache<Plan>,
}

impl LennardJonesTerm {
    pub fn new(options: LennardJonesOptions) -> Self {
        Self {
            options,
            cache: OffsetCache::new(options.caching),
        }
    }

    pub fn options(&self) -> &LennardJonesOptions {
        &self.options
    }

    fn run<R>(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        eval: impl FnOnce(&Plan, &LennardJonesOptions) -> R,
    ) -> Result<R, TermError> {
        self.options.labels.check(topology, NAME)?;
        let Self { options, cache } = self;
        cache.with_plan(
            topology,
            params,
            || -> Result<Plan, TermError> {
                params.check_counts(PREFIX, PARAMS_PER_KEY)?;
                Ok(build_plan(options, topology, params))
            },
            |plan| eval(plan, options),
        )
    }
}

fn build_plan(options: &LennardJonesOptions, topology: &Topology, params: &ParameterStore) -> Plan {
    let n = topology.num_atoms();
    let offsets = (0..n)
        .map(|atom| {
            let key = format!("{PREFIX}{}", options.labels.label(topology, atom));
            let offset = params.offset_of(&key);
            if offset.is_none() {
                warn!(key = %key, atom, "No Lennard-Jones parameters; adding non-converged sentinel for its pairs");
            }
            offset
        })
        .collect();

    let mut pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if topology.is_bonded(i, j) || topology.is_13(i, j) {
                continue;
            }
            let (scale, scale_electrostatic) = if topology.is_14(i, j) {
                (options.scale_14, options.scale_14_electrostatic)
            } else {
                (1.0, 1.0)
            };
            pairs.push(PairPlan {
                i,
                j,
                scale,
                scale_electrostatic,
            });
        }
    }
    Plan { offsets, pairs }
}

fn visit(
    plan: &Plan,
    options: &LennardJonesOptions,
    topology: &Topology,
    values: &[f64],
    mut sink: impl FnMut(Contribution),
) {
    for pair in &plan.pairs {
        let (i, j) = (pair.i, pair.j);
        let dist = topology.distance(i, j);
        let (energy, d_dist) = potentials::coulomb(
            dist,
            topology.charge(i),
            topology.charge(j),
            pair.scale_electrostatic,
        );
        let mut contribution = Contribution {
            i,
            j,
            energy,
            d_dist,
            dispersion: Dispersion::Skipped,
        };

        let radii = topology.covalent_radius(i) + topology.covalent_radius(j);
        if dist > options.blow_dist * radii {
            sink(contribution);
            continue;
        }
        if dist < options.blow_close * radii {
            contribution.energy += CLOSE_CONTACT_ENERGY;
            contribution.dispersion = Dispersion::CloseContact;
            sink(contribution);
            continue;
        }

        contribution.dispersion = match (plan.offsets[i], plan.offsets[j]) {
            (Some(oi), Some(oj)) if values[oi] < 0.0 || values[oj] < 0.0 => {
                contribution.energy += NON_CONVERGED_ENERGY;
                Dispersion::Sentinel {
                    slots: [
                        (values[oi] < 0.0).then_some(oi),
                        (values[oj] < 0.0 && oj != oi).then_some(oj),
                        None,
                        None,
                    ],
                }
            }
            (Some(oi), Some(oj)) if oi == oj => {
                let (eps, sigma) = (values[oi], values[oi + 1]);
                let (e, d) = potentials::lennard_jones_12_6(dist, sigma, eps);
                let (d_eps, d_sigma) =
                    potentials::lennard_jones_12_6_parameter_derivatives(dist, sigma, eps);
                contribution.energy += pair.scale * e;
                contribution.d_dist += pair.scale * d;
                Dispersion::Direct {
                    offset: oi,
                    d_eps: pair.scale * d_eps,
                    d_sigma: pair.scale * d_sigma,
                }
            }
            (Some(oi), Some(oj)) => {
                let (eps_i, sigma_i, eps_j, sigma_j) =
                    (values[oi], values[oi + 1], values[oj], values[oj + 1]);
                let (eps, sigma) = potentials::lorentz_berthelot(eps_i, sigma_i, eps_j, sigma_j);
                let (e, d) = potentials::lennard_jones_12_6(dist, sigma, eps);
                let (d_eps, d_sigma) =
                    potentials::lennard_jones_12_6_parameter_derivatives(dist, sigma, eps);
                contribution.energy += pair.scale * e;
                contribution.d_dist += pair.scale * d;
                let d_mix = |other: f64| {
                    if eps == 0.0 {
                        0.0
                    } else {
                        pair.scale * d_eps * other / (2.0 * eps)
                    }
                };
                Dispersion::Mixed {
                    offsets: [oi, oj],
                    d_eps: [d_mix(eps_j), d_mix(eps_i)],
                    d_sigma: 0.5 * pair.scale * d_sigma,
                }
            }
            (oi, oj) => {
                contribution.energy += NON_CONVERGED_ENERGY;
                Dispersion::Sentinel {
                    slots: [oi, oi.map(|o| o + 1), oj, oj.map(|o| o + 1)],
                }
            }
        };
        sink(contribution);
    }
}

impl InteractionTerm for LennardJonesTerm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &[PREFIX]
    }

    fn energy(&mut self, topology: &Topology, params: &ParameterStore) -> Result<f64, TermError> {
        self.run(topology, params, |plan, options| {
            let mut energy = 0.0;
            visit(plan, options, topology, params.values(), |c| {
                energy += c.energy
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
            visit(plan, options, topology, params.values(), |c| {
                acc.add_energy(c.energy);
                let dist = topology.distance(c.i, c.j);
                acc.add_pair(c.i, c.j, topology.displacement(c.i, c.j) * (c.d_dist / dist));
                if let Dispersion::Sentinel { .. } = c.dispersion {
                    acc.add_uniform(c.i, NON_CONVERGED_GRADIENT);
                    acc.add_uniform(c.j, NON_CONVERGED_GRADIENT);
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
            visit(plan, options, topology, params.values(), |c| {
                energy += c.energy;
                match c.dispersion {
                    Dispersion::Skipped | Dispersion::CloseContact => {}
                    Dispersion::Sentinel { slots } => {
                        for slot in slots.into_iter().flatten() {
                            gradient[slot] += NON_CONVERGED_GRADIENT;
                        }
                    }
                    Dispersion::Direct {
                        offset,
                        d_eps,
                        d_sigma,
                    } => {
                        gradient[offset] += d_eps;
                        gradient[offset + 1] += d_sigma;
                    }
                    Dispersion::Mixed {
                        offsets,
                        d_eps,
                        d_sigma,
                    } => {
                        for (offset, d_eps) in offsets.into_iter().zip(d_eps) {
                            gradient[offset] += d_eps;
                            gradient[offset + 1] += d_sigma;
                        }
                    }
                }
            });
            energy
        })
    }

    fn required_keys(&self, topologies: &[Topology]) -> Result<Vec<(String, usize)>, TermError> {
        let mut keys = Vec::new();
        for topology in topologies {
            self.options.labels.check(topology, NAME)?;
            for atom in 0..topology.num_atoms() {
                let key = format!("{PREFIX}{}", self.options.labels.label(topology, atom));
                push_unique(&mut keys, key, PARAMS_PER_KEY);
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
    use crate::core::forcefield::terms::testing::{
        assert_cartesian_gradient_matches, assert_parameter_gradient_matches,
    };
    use crate::core::models::topology::{AtomRecord, TopologyBuilder};
    use nalgebra::Point3;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn carbon_hydrogen_store(eps_c: f64, sigma_c: f64, eps_h: f64, sigma_h: f64) -> ParameterStore {
        ParameterStore::new("amberff", [("amberlj:C", 2), ("amberlj:H", 2)])
            .unwrap()
            .with_values(vec![eps_c, sigma_c, eps_h, sigma_h])
            .unwrap()
    }

    fn pair(a: (&str, u8), b: (&str, u8), dist: f64) -> Topology {
        TopologyBuilder::new()
            .atom(a.0, a.1, Point3::origin())
            .atom(b.0, b.1, Point3::new(dist, 0.0, 0.0))
            .build()
            .unwrap()
    }

    fn cluster() -> Topology {
        TopologyBuilder::new()
            .add_atom(AtomRecord::new("C", 6, Point3::new(0.0, 0.0, 0.0)).with_charge(0.3))
            .add_atom(AtomRecord::new("C", 6, Point3::new(4.1, 0.6, -0.2)).with_charge(-0.2))
            .add_atom(AtomRecord::new("H", 1, Point3::new(1.2, 3.9, 0.7)).with_charge(0.1))
            .add_atom(AtomRecord::new("H", 1, Point3::new(-2.8, 1.1, 2.9)).with_charge(-0.2))
            .add_atom(AtomRecord::new("C", 6, Point3::new(2.2, -3.4, 2.5)))
            .build()
            .unwrap()
    }

    #[test]
    fn bonded_and_13_pairs_contribute_nothing() {
        let topology = TopologyBuilder::new()
            .atom("C", 6, Point3::new(0.0, 0.0, 0.0))
            .atom("C", 6, Point3::new(2.9, 0.0, 0.0))
            .atom("C", 6, Point3::new(5.8, 0.0, 0.0))
            .bond(0, 1)
            .bond(1, 2)
            .build()
            .unwrap();
        let params = carbon_hydrogen_store(0.002, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert_eq!(term.energy(&topology, &params).unwrap(), 0.0);
    }

    #[test]
    fn same_type_pair_at_sigma_returns_negative_well_depth() {
        let topology = pair(("C", 6), ("C", 6), 7.0);
        let params = carbon_hydrogen_store(0.002, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert!(f64_approx_equal(term.energy(&topology, &params).unwrap(), -0.002));
    }

    #[test]
    fn mixed_pair_uses_lorentz_berthelot_combination() {
        let topology = pair(("C", 6), ("H", 1), 6.0);
        let params = carbon_hydrogen_store(0.004, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert!(f64_approx_equal(term.energy(&topology, &params).unwrap(), -0.002));
    }

    #[test]
    fn swapping_pair_order_leaves_energy_unchanged() {
        let params = carbon_hydrogen_store(0.004, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        let forward = term.energy(&pair(("C", 6), ("H", 1), 5.3), &params).unwrap();
        term.reset_cache();
        let backward = term.energy(&pair(("H", 1), ("C", 6), 5.3), &params).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn one_four_pairs_are_scaled() {
        let chain = TopologyBuilder::new()
            .atom("C", 6, Point3::new(0.0, 0.0, 0.0))
            .atom("H", 1, Point3::new(4.0, 0.0, 0.0))
            .atom("H", 1, Point3::new(4.0, 4.0, 0.0))
            .atom("C", 6, Point3::new(8.0, 4.0, 0.0))
            .bond(0, 1)
            .bond(1, 2)
            .bond(2, 3)
            .build()
            .unwrap();
        assert!(chain.is_14(0, 3));
        let params = carbon_hydrogen_store(0.002, 7.0, 0.0, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        let scaled = term.energy(&chain, &params).unwrap();
        let dist = chain.distance(0, 3);
        let (unscaled, _) = potentials::lennard_jones_12_6(dist, 7.0, 0.002);
        assert!(f64_approx_equal(scaled, 0.5 * unscaled));
    }

    #[test]
    fn coulomb_is_added_beyond_dispersion_cutoff() {
        let topology = TopologyBuilder::new()
            .add_atom(AtomRecord::new("C", 6, Point3::origin()).with_charge(0.5))
            .add_atom(AtomRecord::new("C", 6, Point3::new(10.0, 0.0, 0.0)).with_charge(-0.4))
            .build()
            .unwrap();
        let params = carbon_hydrogen_store(0.002, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions {
            blow_dist: 1.0,
            ..LennardJonesOptions::default()
        });
        assert!(f64_approx_equal(term.energy(&topology, &params).unwrap(), -0.02));
    }

    #[test]
    fn crossing_the_cutoff_drops_only_the_dispersion() {
        let charged_pair = |dist: f64| {
            TopologyBuilder::new()
                .add_atom(AtomRecord::new("C", 6, Point3::origin()).with_charge(0.5))
                .add_atom(AtomRecord::new("C", 6, Point3::new(dist, 0.0, 0.0)).with_charge(-0.4))
                .build()
                .unwrap()
        };
        let params = carbon_hydrogen_store(0.002, 7.0, 0.001, 5.0);
        let options = LennardJonesOptions {
            blow_dist: 2.0,
            caching: false,
            ..LennardJonesOptions::default()
        };
        let reference = charged_pair(1.0);
        let cutoff =
            options.blow_dist * (reference.covalent_radius(0) + reference.covalent_radius(1));
        let delta = 1e-7;
        let (near, far) = (charged_pair(cutoff - delta), charged_pair(cutoff + delta));
        let mut term = LennardJonesTerm::new(options);

        let inside = term.energy(&near, &params).unwrap();
        let outside = term.energy(&far, &params).unwrap();
        let (coulomb_in, _) = potentials::coulomb(near.distance(0, 1), 0.5, -0.4, 1.0);
        let (coulomb_out, _) = potentials::coulomb(far.distance(0, 1), 0.5, -0.4, 1.0);
        let (dispersion, _) = potentials::lennard_jones_12_6(near.distance(0, 1), 7.0, 0.002);

        assert!(f64_approx_equal(inside, coulomb_in + dispersion));
        assert_eq!(outside, coulomb_out);
        assert!((coulomb_in - coulomb_out).abs() < 1e-8);
        let (dispersion_at_cutoff, _) = potentials::lennard_jones_12_6(cutoff, 7.0, 0.002);
        assert!((inside - outside - dispersion_at_cutoff).abs() < 1e-8);
    }

    #[test]
    fn wrong_value_count_fails_the_evaluation() {
        let params = ParameterStore::new("amberff", [("amberlj:C", 2), ("amberlj:H", 1)]).unwrap();
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert!(matches!(
            term.energy(&pair(("C", 6), ("H", 1), 6.0), &params),
            Err(TermError::ParameterCount(ref err)) if err.key == "amberlj:H" && err.found == 1
        ));
    }

    #[test]
    fn close_contact_adds_fixed_penalty() {
        let topology = pair(("C", 6), ("C", 6), 1.0);
        let params = carbon_hydrogen_store(0.002, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert_eq!(term.energy(&topology, &params).unwrap(), CLOSE_CONTACT_ENERGY);

        let mut acc = GradientAccumulator::new(2);
        term.cartesian_gradient(&topology, &params, &mut acc).unwrap();
        assert_eq!(acc.atom(0).norm(), 0.0);
    }

    #[test]
    fn missing_parameters_inject_sentinels() {
        let topology = pair(("C", 6), ("N", 7), 6.0);
        let params = carbon_hydrogen_store(0.002, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert_eq!(term.energy(&topology, &params).unwrap(), NON_CONVERGED_ENERGY);

        let mut gradient = vec![0.0; params.len()];
        term.parameter_gradient(&topology, &params, &mut gradient)
            .unwrap();
        assert_eq!(
            gradient,
            vec![NON_CONVERGED_GRADIENT, NON_CONVERGED_GRADIENT, 0.0, 0.0]
        );

        let mut acc = GradientAccumulator::new(2);
        term.cartesian_gradient(&topology, &params, &mut acc).unwrap();
        assert_eq!(acc.total_energy(), NON_CONVERGED_ENERGY);
        assert!(acc.atom(1).iter().all(|&c| c == NON_CONVERGED_GRADIENT));
    }

    #[test]
    fn negative_well_depth_injects_sentinel() {
        let topology = pair(("C", 6), ("H", 1), 6.0);
        let params = carbon_hydrogen_store(0.002, 7.0, -0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert_eq!(term.energy(&topology, &params).unwrap(), NON_CONVERGED_ENERGY);

        let mut gradient = vec![0.0; params.len()];
        term.parameter_gradient(&topology, &params, &mut gradient)
            .unwrap();
        assert_eq!(gradient, vec![0.0, 0.0, NON_CONVERGED_GRADIENT, 0.0]);
    }

    #[test]
    fn cartesian_gradient_matches_numerical_gradient() {
        let params = carbon_hydrogen_store(0.004, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert_cartesian_gradient_matches(&mut term, &cluster(), &params, 1e-6);
    }

    #[test]
    fn parameter_gradient_matches_numerical_gradient() {
        let params = carbon_hydrogen_store(0.004, 7.0, 0.001, 5.0);
        let mut term = LennardJonesTerm::new(LennardJonesOptions::default());
        assert_parameter_gradient_matches(&mut term, &cluster(), &params, 1e-6);
    }

    #[test]
    fn cached_and_uncached_evaluations_are_identical() {
        let params = carbon_hydrogen_store(0.004, 7.0, 0.001, 5.0);
        let topology = cluster();
        let mut cached = LennardJonesTerm::new(LennardJonesOptions::default());
        let mut uncached = LennardJonesTerm::new(LennardJonesOptions {
            caching: false,
            ..LennardJonesOptions::default()
        });
        for _ in 0..2 {
            assert_eq!(
                cached.energy(&topology, &params).unwrap().to_bits(),
                uncached.energy(&topology, &params).unwrap().to_bits()
            );
            let mut a = GradientAccumulator::new(topology.num_atoms());
            let mut b = GradientAccumulator::new(topology.num_atoms());
            cached.cartesian_gradient(&topology, &params, &mut a).unwrap();
            uncached.cartesian_gradient(&topology, &params, &mut b).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn required_keys_lists_each_label_once() {
        let term = LennardJonesTerm::new(LennardJonesOptions::default());
        let keys = term
            .required_keys(&[cluster(), pair(("N", 7), ("C", 6), 3.0)])
            .unwrap();
        assert_eq!(
            keys,
            vec![
                ("amberlj:C".to_string(), 2),
                ("amberlj:H".to_string(), 2),
                ("amberlj:N".to_string(), 2)
            ]
        );
    }

    #[test]
    fn special_ids_select_parameter_keys() {
        let topology = TopologyBuilder::new()
            .atom("C", 6, Point3::origin())
            .atom("C", 6, Point3::new(7.0, 0.0, 0.0))
            .special_ids(vec!["Ca".into(), "Ca".into()])
            .build()
            .unwrap();
        let params = ParameterStore::new("amberff", [("amberlj:Ca", 2)])
            .unwrap()
            .with_values(vec![0.003, 7.0])
            .unwrap();
        let mut term = LennardJonesTerm::new(LennardJonesOptions {
            labels: LabelSource::SpecialIds,
            ..LennardJonesOptions::default()
        });
        assert!(f64_approx_equal(term.energy(&topology, &params).unwrap(), -0.003));
    }

    #[test]
    fn bounds_cover_well_depth_and_radius() {
        let params = carbon_hydrogen_store(0.0, 0.0, 0.0, 0.0);
        let term = LennardJonesTerm::new(LennardJonesOptions::default());
        let mut bounds = ParameterBounds::for_store(&params);
        term.bounds(&params, &mut bounds);
        assert_eq!(bounds.lower(), &[-0.01, 0.0, -0.01, 0.0]);
        assert_eq!(bounds.upper(), &[0.01, 15.0, 0.01, 15.0]);
    }
}
