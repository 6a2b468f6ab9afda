//! Finite-difference derivatives used as validation references and as the
//! parameter-gradient path of terms without an analytic one.

use super::gradient::GradientAccumulator;
use crate::core::models::topology::Topology;
use crate::core::params::store::ParameterStore;
use std::ops::Range;

/// Finite-difference stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stencil {
    /// `(E(p + h) - E(p)) / h`
    Forward,
    /// `(E(p + h) - E(p - h)) / 2h`
    #[default]
    Central,
}

/// Step for a parameter of value `value`: relative to the value, absolute for zero.
#[inline]
pub fn parameter_step(value: f64) -> f64 {
    let root_eps = f64::EPSILON.sqrt();
    let h = 1000.0 * root_eps * value;
    if h == 0.0 { root_eps } else { h }
}

/// Adds dE/dp into `gradient` for every position in `range` and returns E at `params`.
///
/// `energy` is evaluated on a private copy of the store; `params` is never modified.
pub fn parameter_gradient<E>(
    params: &ParameterStore,
    range: Range<usize>,
    stencil: Stencil,
    gradient: &mut [f64],
    mut energy: impl FnMut(&ParameterStore) -> Result<f64, E>,
) -> Result<f64, E> {
    let reference = energy(params)?;
    let mut shifted = params.clone();
    for position in range {
        let original = params.values()[position];
        let h = parameter_step(original);

        shifted.set(position, original + h);
        let forward = energy(&shifted)?;
        gradient[position] += match stencil {
            Stencil::Forward => (forward - reference) / h,
            Stencil::Central => {
                shifted.set(position, original - h);
                let backward = energy(&shifted)?;
                (forward - backward) / (2.0 * h)
            }
        };
        shifted.set(position, original);
    }
    Ok(reference)
}

/// Central-difference Cartesian gradient of `energy` with a fixed displacement `step`.
pub fn cartesian_gradient<E>(
    topology: &Topology,
    step: f64,
    mut energy: impl FnMut(&Topology) -> Result<f64, E>,
) -> Result<GradientAccumulator, E> {
    let mut acc = GradientAccumulator::new(topology.num_atoms());
    acc.add_energy(energy(topology)?);
    let mut displaced = topology.clone();
    for atom in 0..topology.num_atoms() {
        let mut component = nalgebra::Vector3::zeros();
        for axis in 0..3 {
            displaced.displace(atom, axis, step);
            let forward = energy(&displaced)?;
            displaced.displace(atom, axis, -2.0 * step);
            let backward = energy(&displaced)?;
            displaced.displace(atom, axis, step);
            component[axis] = (forward - backward) / (2.0 * step);
        }
        acc.add(atom, component);
    }
    Ok(acc)
}
