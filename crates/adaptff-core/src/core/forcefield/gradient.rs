use super::sentinel::{fold_energy, fold_gradient};
use nalgebra::Vector3;
use std::ops::AddAssign;

/// Per-atom Cartesian energy gradient plus the total energy of the same pass.
///
/// Writes are additive; call [`GradientAccumulator::zero`] before reusing a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientAccumulator {
    gradient: Vec<Vector3<f64>>,
    total_energy: f64,
}

impl GradientAccumulator {
    pub fn new(num_atoms: usize) -> Self {
        Self {
            gradient: vec![Vector3::zeros(); num_atoms],
            total_energy: 0.0,
        }
    }

    pub fn zero(&mut self) {
        self.gradient.fill(Vector3::zeros());
        self.total_energy = 0.0;
    }

    pub fn num_atoms(&self) -> usize {
        self.gradient.len()
    }

    pub fn total_energy(&self) -> f64 {
        self.total_energy
    }

    #[inline]
    pub fn add_energy(&mut self, energy: f64) {
        self.total_energy += energy;
    }

    #[inline]
    pub fn add(&mut self, atom: usize, value: Vector3<f64>) {
        self.gradient[atom] += value;
    }

    #[inline]
    pub fn subtract(&mut self, atom: usize, value: Vector3<f64>) {
        self.gradient[atom] -= value;
    }

    /// Adds `value` to atom `i` and subtracts it from atom `j`.
    #[inline]
    pub fn add_pair(&mut self, i: usize, j: usize, value: Vector3<f64>) {
        self.gradient[i] += value;
        self.gradient[j] -= value;
    }

    /// Adds the same value to every Cartesian component of `atom`.
    #[inline]
    pub fn add_uniform(&mut self, atom: usize, value: f64) {
        self.gradient[atom] += Vector3::repeat(value);
    }

    pub fn atom(&self, atom: usize) -> Vector3<f64> {
        self.gradient[atom]
    }

    pub fn gradient(&self) -> &[Vector3<f64>] {
        &self.gradient
    }

    /// Gradient split into x, y and z rows.
    pub fn per_axis(&self) -> [Vec<f64>; 3] {
        std::array::from_fn(|axis| self.gradient.iter().map(|g| g[axis]).collect())
    }

    pub fn is_finite(&self) -> bool {
        self.total_energy.is_finite() && self.gradient.iter().all(|g| g.iter().all(|c| c.is_finite()))
    }

    /// Replaces non-finite entries with the non-converged sentinels.
    pub fn sanitize(&mut self) {
        self.total_energy = fold_energy(self.total_energy);
        for g in &mut self.gradient {
            g.apply(|c| *c = fold_gradient(*c));
        }
    }
}

impl AddAssign<&GradientAccumulator> for GradientAccumulator {
    fn add_assign(&mut self, rhs: &GradientAccumulator) {
        for (lhs, rhs) in self.gradient.iter_mut().zip(&rhs.gradient) {
            *lhs += rhs;
        }
        self.total_energy += rhs.total_energy;
    }
}
