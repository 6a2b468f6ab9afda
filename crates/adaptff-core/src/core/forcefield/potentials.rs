/// Lennard-Jones 12-6 energy in the `r_min` form and its derivative with respect to `dist`.
#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> (f64, f64) {
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    let energy = well_depth * (rho12 - 2.0 * rho6);
    let d_dist = well_depth * 12.0 * (rho6 - rho12) / dist;
    (energy, d_dist)
}

/// Partial derivatives of the 12-6 energy with respect to well depth and `r_min`.
#[inline]
pub fn lennard_jones_12_6_parameter_derivatives(dist: f64, r_min: f64, well_depth: f64) -> (f64, f64) {
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    let d_well_depth = rho12 - 2.0 * rho6;
    let d_r_min = well_depth * 12.0 * (rho12 - rho6) / r_min;
    (d_well_depth, d_r_min)
}

/// Lorentz-Berthelot combination of two per-type (well depth, radius) pairs.
#[inline]
pub fn lorentz_berthelot(eps_a: f64, sigma_a: f64, eps_b: f64, sigma_b: f64) -> (f64, f64) {
    ((eps_a * eps_b).sqrt(), 0.5 * (sigma_a + sigma_b))
}

/// Point-charge interaction in atomic units and its distance derivative.
#[inline]
pub fn coulomb(dist: f64, q1: f64, q2: f64, scale: f64) -> (f64, f64) {
    let energy = scale * q1 * q2 / dist;
    (energy, -energy / dist)
}

/// `0.5 * k * (x - x0)^2` and its derivative with respect to `x`.
#[inline]
pub fn harmonic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let delta = x - x0;
    (0.5 * k * delta * delta, k * delta)
}

/// Two-component cosine torsion `0.5 * sum k (1 + cos(n phi - d))` and its `phi` derivative.
///
/// `params` holds `[k1, n1, d1, k2, n2, d2]`.
#[inline]
pub fn double_cosine(phi: f64, params: &[f64]) -> (f64, f64) {
    let mut energy = 0.0;
    let mut d_phi = 0.0;
    for component in params.chunks_exact(3) {
        let (k, n, d) = (component[0], component[1], component[2]);
        let arg = n * phi - d;
        energy += 0.5 * k * (1.0 + arg.cos());
        d_phi -= 0.5 * k * n * arg.sin();
    }
    (energy, d_phi)
}

/// Partial derivatives of [`double_cosine`] with respect to each of its six parameters.
#[inline]
pub fn double_cosine_parameter_derivatives(phi: f64, params: &[f64]) -> [f64; 6] {
    let mut out = [0.0; 6];
    for (component, slots) in params.chunks_exact(3).zip(out.chunks_exact_mut(3)) {
        let (k, n, d) = (component[0], component[1], component[2]);
        let arg = n * phi - d;
        let (sin, cos) = arg.sin_cos();
        slots[0] = 0.5 * (1.0 + cos);
        slots[1] = -0.5 * phi * k * sin;
        slots[2] = 0.5 * k * sin;
    }
    out
}

/// Stillinger-Weber-Gong two-body energy `a (b / r^4 - 1) exp(alpha / (r - r0))` and
/// its distance derivative; zero at and beyond `r0`.
#[inline]
pub fn swg_two_body(dist: f64, r0: f64, a: f64, b: f64, alpha: f64) -> (f64, f64) {
    if dist >= r0 {
        return (0.0, 0.0);
    }
    let diff = dist - r0;
    let radial = b / dist.powi(4) - 1.0;
    let damping = (alpha / diff).exp();
    let energy = a * radial * damping;
    let d_dist = -a * damping * (4.0 * b / dist.powi(5) + alpha * radial / (diff * diff));
    (energy, d_dist)
}

/// Three-body cutoff factor `exp(gamma / (r - r0))` and its distance derivative.
#[inline]
pub fn swg_cutoff_factor(dist: f64, r0: f64, gamma: f64) -> (f64, f64) {
    let diff = dist - r0;
    let value = (gamma / diff).exp();
    (value, -value * gamma / (diff * diff))
}

/// Cosine of the angle between sides `a` and `b` of a triangle with opposite side `c`,
/// with its partial derivatives with respect to `a`, `b` and `c`.
#[inline]
pub fn law_of_cosines(a: f64, b: f64, c: f64) -> (f64, [f64; 3]) {
    let cos = (a * a + b * b - c * c) / (2.0 * a * b);
    let d_a = (a * a - b * b + c * c) / (2.0 * a * a * b);
    let d_b = (b * b - a * a + c * c) / (2.0 * a * b * b);
    let d_c = -c / (a * b);
    (cos, [d_a, d_b, d_c])
}

/// Angular factor `(c + 1/3)^2 ((c + c0)^2 + c1)` of the three-body term and its derivative in `c`.
#[inline]
pub fn swg_angular(cos: f64, c0: f64, c1: f64) -> (f64, f64) {
    let shifted = cos + 1.0 / 3.0;
    let inner = cos + c0;
    let tail = inner * inner + c1;
    (
        shifted * shifted * tail,
        2.0 * shifted * tail + 2.0 * shifted * shifted * inner,
    )
}
