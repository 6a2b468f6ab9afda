use super::config::{AmberConfig, MethodConfig, SwgConfig};
use super::error::EngineError;
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::forcefield::sentinel::{fold_energy, fold_gradient};
use crate::core::forcefield::term::{InteractionTerm, push_unique};
use crate::core::forcefield::terms::angle::{AngleOptions, AngleTerm};
use crate::core::forcefield::terms::bond::{BondOptions, BondTerm};
use crate::core::forcefield::terms::dihedral::{DihedralOptions, DihedralTerm};
use crate::core::forcefield::terms::gupta::GuptaTerm;
use crate::core::forcefield::terms::lennard_jones::LennardJonesTerm;
use crate::core::forcefield::terms::shifter::{ShifterOptions, ShifterTerm};
use crate::core::forcefield::terms::swg_three_body::{SwgThreeBodyOptions, SwgThreeBodyTerm};
use crate::core::forcefield::terms::swg_two_body::{SwgTwoBodyOptions, SwgTwoBodyTerm};
use crate::core::models::topology::Topology;
use crate::core::params::bounds::ParameterBounds;
use crate::core::params::store::ParameterStore;
use tracing::{debug, instrument};

/// A complete adaptive force field: the terms selected by a [`MethodConfig`],
/// evaluated together against one parameter store.
///
/// Each term keeps its own offset cache, so a `ForceField` is tied to one
/// topology layout at a time. Use [`ForceField::cold_copy`] to hand an
/// independent instance to another thread.
#[derive(Debug)]
pub struct ForceField {
    config: MethodConfig,
    terms: Vec<Box<dyn InteractionTerm>>,
}

fn amber_terms(config: &AmberConfig) -> Vec<Box<dyn InteractionTerm>> {
    let mut terms: Vec<Box<dyn InteractionTerm>> = vec![
        Box::new(BondTerm::new(BondOptions {
            labels: config.labels,
            caching: config.caching,
            ..BondOptions::default()
        })),
        Box::new(AngleTerm::new(AngleOptions {
            labels: config.labels,
            caching: config.caching,
        })),
        Box::new(DihedralTerm::new(DihedralOptions {
            labels: config.labels,
            caching: config.caching,
        })),
        Box::new(LennardJonesTerm::new(config.lennard_jones)),
    ];
    if config.total_shift {
        terms.push(Box::new(ShifterTerm::new(ShifterOptions {
            caching: config.caching,
        })));
    }
    terms
}

fn swg_terms(config: &SwgConfig) -> Vec<Box<dyn InteractionTerm>> {
    vec![
        Box::new(SwgTwoBodyTerm::new(SwgTwoBodyOptions {
            blow_fac_close: config.blow_fac_close,
            caching: config.caching,
            ..SwgTwoBodyOptions::default()
        })),
        Box::new(SwgThreeBodyTerm::new(SwgThreeBodyOptions {
            caching: config.caching,
            ..SwgThreeBodyOptions::default()
        })),
    ]
}

impl ForceField {
    pub fn from_config(config: MethodConfig) -> Self {
        let terms = match &config {
            MethodConfig::Amber(amber) => amber_terms(amber),
            MethodConfig::Gupta(options) => {
                vec![Box::new(GuptaTerm::new(*options)) as Box<dyn InteractionTerm>]
            }
            MethodConfig::Swg(swg) => swg_terms(swg),
        };
        debug!(
            method = %config,
            terms = ?terms.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "Assembled force field"
        );
        Self { config, terms }
    }

    /// Parses a method string such as `adaptivegupta:2.0,true,0`.
    pub fn from_method(method: &str) -> Result<Self, EngineError> {
        Ok(Self::from_config(method.parse()?))
    }

    pub fn config(&self) -> &MethodConfig {
        &self.config
    }

    /// Canonical method string, used to tag parameter stores.
    pub fn method(&self) -> String {
        self.config.to_string()
    }

    pub fn term_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.terms.iter().map(|t| t.name())
    }

    /// Total energy; NaN or infinite totals are reported as the non-converged sentinel.
    #[instrument(skip_all, name = "forcefield_energy")]
    pub fn energy(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
    ) -> Result<f64, EngineError> {
        let mut total = 0.0;
        for term in &mut self.terms {
            total += term.energy(topology, params)?;
        }
        Ok(fold_energy(total))
    }

    /// Energy and Cartesian gradient with non-finite entries replaced by the sentinels.
    #[instrument(skip_all, name = "forcefield_gradient")]
    pub fn gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
    ) -> Result<GradientAccumulator, EngineError> {
        let mut acc = GradientAccumulator::new(topology.num_atoms());
        for term in &mut self.terms {
            term.cartesian_gradient(topology, params, &mut acc)?;
        }
        acc.sanitize();
        Ok(acc)
    }

    /// Overwrites `gradient` with dE/dp for every parameter of the store and returns E.
    #[instrument(skip_all, name = "forcefield_parameter_gradient")]
    pub fn parameter_gradient(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        gradient: &mut [f64],
    ) -> Result<f64, EngineError> {
        if gradient.len() != params.len() {
            return Err(EngineError::GradientLength {
                expected: params.len(),
                found: gradient.len(),
            });
        }
        gradient.fill(0.0);
        let mut total = 0.0;
        for term in &mut self.terms {
            total += term.parameter_gradient(topology, params, gradient)?;
        }
        for component in gradient.iter_mut() {
            *component = fold_gradient(*component);
        }
        Ok(fold_energy(total))
    }

    /// Zero-valued store holding every key the terms need for `topologies`,
    /// tagged with this force field's method string.
    #[instrument(skip_all, name = "forcefield_parameter_stub")]
    pub fn parameter_stub(&self, topologies: &[Topology]) -> Result<ParameterStore, EngineError> {
        let mut keys = Vec::new();
        for term in &self.terms {
            for (key, count) in term.required_keys(topologies)? {
                push_unique(&mut keys, key, count);
            }
        }
        debug!(keys = keys.len(), "Collected parameter stub keys");
        Ok(ParameterStore::new(self.method(), keys)?)
    }

    /// Search bounds for `params`; positions no term owns stay unbounded.
    pub fn bounds(&self, params: &ParameterStore) -> ParameterBounds {
        let mut bounds = ParameterBounds::for_store(params);
        for term in &self.terms {
            term.bounds(params, &mut bounds);
        }
        bounds
    }

    /// Same configuration with every offset cache empty.
    pub fn cold_copy(&self) -> Self {
        Self {
            config: self.config,
            terms: self.terms.iter().map(|t| t.cold_copy()).collect(),
        }
    }

    pub fn reset_caches(&mut self) {
        for term in &mut self.terms {
            term.reset_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::numerical;
    use crate::core::forcefield::sentinel::{NON_CONVERGED_ENERGY, NON_CONVERGED_GRADIENT};
    use crate::core::forcefield::terms::gupta::GuptaOptions;
    use crate::core::models::topology::{AtomRecord, TopologyBuilder};
    use nalgebra::Point3;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn gupta_store() -> ParameterStore {
        ParameterStore::new(
            "adaptivegupta:2,true,0",
            [
                ("adaptivegupta:AuAu", 5),
                ("adaptivegupta:AuAg", 5),
                ("adaptivegupta:AgAg", 5),
            ],
        )
        .unwrap()
        .with_values(vec![
            0.21, 10.2, 5.45, 1.79, 4.04, //
            0.16, 10.5, 5.5, 1.5, 3.6, //
            0.10, 10.9, 5.46, 1.19, 3.18,
        ])
        .unwrap()
    }

    fn alloy_cluster() -> Topology {
        TopologyBuilder::new()
            .atom("Au", 79, Point3::new(0.0, 0.0, 0.0))
            .atom("Ag", 47, Point3::new(5.3, 0.4, 0.2))
            .atom("Au", 79, Point3::new(2.4, 4.9, -0.6))
            .atom("Ag", 47, Point3::new(1.9, 1.7, 5.2))
            .build()
            .unwrap()
    }

    fn ethane_like() -> Topology {
        TopologyBuilder::new()
            .add_atom(AtomRecord::new("H", 1, Point3::new(-1.9, 1.8, 0.1)).with_charge(0.1))
            .add_atom(AtomRecord::new("C", 6, Point3::new(0.0, 0.0, 0.0)).with_charge(-0.2))
            .add_atom(AtomRecord::new("C", 6, Point3::new(2.9, 0.0, 0.0)).with_charge(-0.2))
            .add_atom(AtomRecord::new("H", 1, Point3::new(4.6, 1.3, 1.4)).with_charge(0.1))
            .add_atom(AtomRecord::new("O", 8, Point3::new(2.7, -2.6, -0.9)))
            .bond(0, 1)
            .bond(1, 2)
            .bond(2, 3)
            .bond(2, 4)
            .build()
            .unwrap()
    }

    #[test]
    fn method_strings_select_the_matching_terms() {
        let amber = ForceField::from_method("amberff").unwrap();
        assert_eq!(
            amber.term_names().collect::<Vec<_>>(),
            vec!["adaptiveharmonicterm", "amberangle", "amberdihedral", "amberlj"]
        );
        let shifted = ForceField::from_method("amberff:totalshift").unwrap();
        assert_eq!(shifted.term_names().last(), Some("totalenergyshifter"));
        let gupta = ForceField::from_method("adaptivegupta:2.0,true").unwrap();
        assert_eq!(gupta.term_names().collect::<Vec<_>>(), vec!["adaptivegupta"]);
        let swg = ForceField::from_method("adaptiveSWGFF").unwrap();
        assert_eq!(
            swg.term_names().collect::<Vec<_>>(),
            vec!["adaptiveswg2b", "adaptiveswg3b"]
        );
    }

    #[test]
    fn unknown_method_is_a_configuration_error() {
        assert!(matches!(
            ForceField::from_method("adaptivemorse"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn gupta_force_field_matches_its_single_term() {
        let topology = alloy_cluster();
        let params = gupta_store();
        let mut forcefield = ForceField::from_method("adaptivegupta:2.0,true").unwrap();
        let mut term = GuptaTerm::new(GuptaOptions::default());
        let expected = term.energy(&topology, &params).unwrap();
        let energy = forcefield.energy(&topology, &params).unwrap();
        assert!(f64_approx_equal(energy, expected));
        assert!(energy < 0.0);
    }

    #[test]
    fn gradient_energy_matches_energy_and_numerical_gradient() {
        let topology = alloy_cluster();
        let params = gupta_store();
        let mut forcefield = ForceField::from_method("adaptivegupta:2.0,true").unwrap();
        let acc = forcefield.gradient(&topology, &params).unwrap();
        let energy = forcefield.energy(&topology, &params).unwrap();
        assert!(f64_approx_equal(acc.total_energy(), energy));

        let mut shadow = forcefield.cold_copy();
        let numerical = numerical::cartesian_gradient(&topology, 1e-5, |t| {
            shadow.reset_caches();
            shadow.energy(t, &params)
        })
        .unwrap();
        for atom in 0..topology.num_atoms() {
            assert!((acc.atom(atom) - numerical.atom(atom)).norm() < 1e-6);
        }
    }

    #[test]
    fn parameter_gradient_overwrites_the_buffer() {
        let topology = alloy_cluster();
        let params = gupta_store();
        let mut forcefield = ForceField::from_method("adaptivegupta:2.0,true").unwrap();
        let mut first = vec![0.0; params.len()];
        let energy = forcefield
            .parameter_gradient(&topology, &params, &mut first)
            .unwrap();
        let mut second = vec![42.0; params.len()];
        forcefield
            .parameter_gradient(&topology, &params, &mut second)
            .unwrap();
        assert_eq!(first, second);
        assert!(f64_approx_equal(
            energy,
            forcefield.energy(&topology, &params).unwrap()
        ));
    }

    #[test]
    fn parameter_gradient_rejects_wrong_buffer_length() {
        let params = gupta_store();
        let mut forcefield = ForceField::from_method("adaptivegupta:2.0,true").unwrap();
        let mut gradient = vec![0.0; 3];
        assert!(matches!(
            forcefield.parameter_gradient(&alloy_cluster(), &params, &mut gradient),
            Err(EngineError::GradientLength {
                expected: 15,
                found: 3
            })
        ));
    }

    #[test]
    fn non_finite_total_is_folded_into_sentinels() {
        let topology = TopologyBuilder::new()
            .atom("C", 6, Point3::origin())
            .atom("C", 6, Point3::new(7.0, 0.0, 0.0))
            .build()
            .unwrap();
        let params = ParameterStore::new("amberff", [("amberlj:C", 2)])
            .unwrap()
            .with_values(vec![f64::NAN, 7.0])
            .unwrap();
        let mut forcefield = ForceField::from_method("amberff").unwrap();
        assert_eq!(
            forcefield.energy(&topology, &params).unwrap(),
            NON_CONVERGED_ENERGY
        );
        let acc = forcefield.gradient(&topology, &params).unwrap();
        assert_eq!(acc.total_energy(), NON_CONVERGED_ENERGY);
        assert_eq!(acc.atom(0).x, NON_CONVERGED_GRADIENT);
    }

    #[test]
    fn parameter_stub_merges_term_keys_without_duplicates() {
        let topology = ethane_like();
        let forcefield = ForceField::from_method("amberff:totalshift").unwrap();
        let stub = forcefield.parameter_stub(&[topology.clone(), topology.clone()]).unwrap();
        assert_eq!(stub.method(), "amberff:totalshift");
        assert!(stub.values().iter().all(|&v| v == 0.0));

        let mut expected = Vec::new();
        for term in &forcefield.terms {
            for (key, count) in term.required_keys(&[topology.clone()]).unwrap() {
                push_unique(&mut expected, key, count);
            }
        }
        let keys: Vec<_> = stub.keys().map(str::to_string).collect();
        let expected_keys: Vec<_> = expected.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, expected_keys);
        assert_eq!(
            stub.len(),
            expected.iter().map(|(_, count)| count).sum::<usize>()
        );
        assert!(keys.iter().any(|k| k.starts_with("adaptiveharmonicterm:")));
        assert!(keys.iter().any(|k| k.starts_with("amberangle:")));
        assert!(keys.iter().any(|k| k.starts_with("amberdihedral:")));
        assert!(keys.contains(&"amberlj:O".to_string()));
        assert!(keys.contains(&"totalenergyshifter:H".to_string()));
    }

    #[test]
    fn bounds_cover_every_owned_parameter() {
        let forcefield = ForceField::from_method("adaptivegupta:2.0,true").unwrap();
        let params = gupta_store();
        let bounds = forcefield.bounds(&params);
        assert_eq!(bounds.len(), 15);
        assert_eq!(&bounds.lower()[..5], &[-2.0, -20.0, 0.0, -2.0, -20.0]);
        assert_eq!(&bounds.upper()[..5], &[2.0, 20.0, 20.0, 2.0, 20.0]);
        assert!(bounds.contains(params.values()));
    }

    #[test]
    fn cold_copy_evaluates_like_the_original() {
        let topology = ethane_like();
        let forcefield = ForceField::from_method("amberff").unwrap();
        let mut params = forcefield.parameter_stub(&[topology.clone()]).unwrap();
        for position in 0..params.len() {
            params.set(position, 0.01 * (position + 1) as f64);
        }
        let mut original = forcefield;
        let warm = original.energy(&topology, &params).unwrap();
        let mut copy = original.cold_copy();
        assert!(f64_approx_equal(copy.energy(&topology, &params).unwrap(), warm));
        original.reset_caches();
        assert!(f64_approx_equal(original.energy(&topology, &params).unwrap(), warm));
    }
}
