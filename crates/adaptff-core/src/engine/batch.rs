use super::error::EngineError;
use super::forcefield::ForceField;
use super::progress::{Progress, ProgressReporter};
use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::models::topology::Topology;
use crate::core::params::store::ParameterStore;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct NamedTopology {
    pub name: String,
    pub topology: Topology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Evaluation {
    #[default]
    Energy,
    Gradient,
}

#[derive(Debug, Clone)]
pub struct GeometryResult {
    pub name: String,
    pub energy: f64,
    /// Present for [`Evaluation::Gradient`].
    pub gradient: Option<GradientAccumulator>,
}

/// A set of reference geometries, each bound to its own [`ForceField`] instance.
///
/// The instances are cold copies of one prototype, so offset caches warm up per
/// geometry and stay valid across repeated evaluations with new parameter values.
#[derive(Debug)]
pub struct Batch {
    geometries: Vec<NamedTopology>,
    forcefields: Vec<ForceField>,
}

impl Batch {
    pub fn new(prototype: &ForceField, geometries: Vec<NamedTopology>) -> Self {
        let forcefields = geometries.iter().map(|_| prototype.cold_copy()).collect();
        Self {
            geometries,
            forcefields,
        }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn geometries(&self) -> &[NamedTopology] {
        &self.geometries
    }

    pub fn topologies(&self) -> Vec<Topology> {
        self.geometries.iter().map(|g| g.topology.clone()).collect()
    }

    /// Evaluates every geometry against `params`, in input order.
    ///
    /// With the `parallel` feature the geometries are spread over the rayon pool.
    #[instrument(skip_all, name = "batch_evaluation")]
    pub fn evaluate(
        &mut self,
        params: &ParameterStore,
        evaluation: Evaluation,
        reporter: &ProgressReporter,
    ) -> Result<Vec<GeometryResult>, EngineError> {
        info!(
            geometries = self.geometries.len(),
            method = params.method(),
            ?evaluation,
            "Evaluating batch"
        );
        reporter.report(Progress::BatchStart {
            geometries: self.geometries.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = self.geometries.iter().zip(self.forcefields.iter_mut());

        #[cfg(feature = "parallel")]
        let iterator = self
            .geometries
            .par_iter()
            .zip(self.forcefields.par_iter_mut());

        let results = iterator
            .map(|(geometry, forcefield)| {
                let result = evaluate_one(forcefield, geometry, params, evaluation)?;
                reporter.report(Progress::GeometryFinished {
                    energy: result.energy,
                });
                Ok(result)
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        reporter.report(Progress::BatchFinish);
        Ok(results)
    }

    pub fn reset_caches(&mut self) {
        for forcefield in &mut self.forcefields {
            forcefield.reset_caches();
        }
    }
}

fn evaluate_one(
    forcefield: &mut ForceField,
    geometry: &NamedTopology,
    params: &ParameterStore,
    evaluation: Evaluation,
) -> Result<GeometryResult, EngineError> {
    let wrap = |e: EngineError| EngineError::Geometry {
        name: geometry.name.clone(),
        source: Box::new(e),
    };
    let (energy, gradient) = match evaluation {
        Evaluation::Energy => (
            forcefield
                .energy(&geometry.topology, params)
                .map_err(wrap)?,
            None,
        ),
        Evaluation::Gradient => {
            let acc = forcefield
                .gradient(&geometry.topology, params)
                .map_err(wrap)?;
            (acc.total_energy(), Some(acc))
        }
    };
    Ok(GeometryResult {
        name: geometry.name.clone(),
        energy,
        gradient,
    })
}
