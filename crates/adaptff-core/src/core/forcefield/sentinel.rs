//! Fixed magnitudes injected in place of interactions that cannot be evaluated.
//!
//! Callers compare against these exact values to recognise unparameterised or
//! degenerate contributions, so they are part of the public contract.

pub use crate::core::utils::geometry::{DIHEDRAL_EDGE_CASE, DIHEDRAL_LARGE_PREFACTOR};

/// Energy reported for an interaction whose parameters or geometry are unusable.
pub const NON_CONVERGED_ENERGY: f64 = 1.0e5;

/// Gradient component reported alongside [`NON_CONVERGED_ENERGY`].
pub const NON_CONVERGED_GRADIENT: f64 = 1.0e5;

/// Penalty for a two-body pair closer than the close-contact cutoff.
pub const CLOSE_CONTACT_ENERGY: f64 = 10.0;

/// Penalty for a bond stretched past its cutoff.
pub const BOND_STRETCH_PENALTY: f64 = 100.0;

/// Replaces NaN or infinite energies with [`NON_CONVERGED_ENERGY`].
#[inline]
pub fn fold_energy(energy: f64) -> f64 {
    if energy.is_finite() {
        energy
    } else {
        NON_CONVERGED_ENERGY
    }
}

/// Replaces NaN or infinite gradient components with [`NON_CONVERGED_GRADIENT`].
#[inline]
pub fn fold_gradient(component: f64) -> f64 {
    if component.is_finite() {
        component
    } else {
        NON_CONVERGED_GRADIENT
    }
}
