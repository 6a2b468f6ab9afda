use nalgebra::{Point3, Vector3};
use thiserror::Error;

/// Squared half-plane normal length below which a dihedral is treated as degenerate.
pub const DIHEDRAL_EDGE_CASE: f64 = 1.0e-4;

/// Inverse-square prefactor substituted for a degenerate half-plane normal.
pub const DIHEDRAL_LARGE_PREFACTOR: f64 = 1.0e5;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateGeometry {
    #[error("Coincident atoms leave the angle undefined")]
    CoincidentAtoms,
    #[error("Angle evaluated to NaN")]
    NotANumber,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondAngle {
    pub theta: f64,
    /// dθ/dr for the outer atom, the vertex and the other outer atom.
    pub derivatives: [Vector3<f64>; 3],
}

/// Bond angle at `vertex` together with its Cartesian derivatives.
///
/// A straight angle has no well-defined derivative direction; its derivatives are zero.
pub fn bond_angle(
    outer_a: &Point3<f64>,
    vertex: &Point3<f64>,
    outer_b: &Point3<f64>,
) -> Result<BondAngle, DegenerateGeometry> {
    let u = outer_a - vertex;
    let v = outer_b - vertex;
    let u_norm = u.norm();
    let v_norm = v.norm();
    if u_norm == 0.0 || v_norm == 0.0 {
        return Err(DegenerateGeometry::CoincidentAtoms);
    }

    let cos_theta = (u.dot(&v) / (u_norm * v_norm)).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    if theta.is_nan() {
        return Err(DegenerateGeometry::NotANumber);
    }

    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    if sin_theta < 1.0e-12 {
        return Ok(BondAngle {
            theta,
            derivatives: [Vector3::zeros(); 3],
        });
    }

    let d_a = -(v / (u_norm * v_norm) - u * (cos_theta / (u_norm * u_norm))) / sin_theta;
    let d_b = -(u / (u_norm * v_norm) - v * (cos_theta / (v_norm * v_norm))) / sin_theta;

    Ok(BondAngle {
        theta,
        derivatives: [d_a, -(d_a + d_b), d_b],
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dihedral {
    /// Signed torsion angle in (-π, π]; zero when `degenerate` is set.
    pub phi: f64,
    /// dφ/dr for the four atoms in chain order.
    pub derivatives: [Vector3<f64>; 4],
    pub degenerate: bool,
}

/// Signed dihedral angle of the chain `i-j-k-l` with its Cartesian derivatives.
///
/// The angle is positive when the J→K axis points against the cross product of the
/// two half-plane normals. Near-collinear triples fall back to a zero angle and a
/// clamped derivative prefactor.
pub fn dihedral(
    i: &Point3<f64>,
    j: &Point3<f64>,
    k: &Point3<f64>,
    l: &Point3<f64>,
) -> Result<Dihedral, DegenerateGeometry> {
    let f = i - j;
    let g = j - k;
    let h = l - k;
    let a = f.cross(&g);
    let b = h.cross(&g);

    let a_sq = a.norm_squared();
    let b_sq = b.norm_squared();
    let g_norm = g.norm();
    if g_norm == 0.0 {
        return Err(DegenerateGeometry::CoincidentAtoms);
    }

    let degenerate = a_sq < DIHEDRAL_EDGE_CASE || b_sq < DIHEDRAL_EDGE_CASE;
    let phi = if degenerate {
        0.0
    } else {
        let cos_phi = (a.dot(&b) / (a_sq * b_sq).sqrt()).clamp(-1.0, 1.0);
        let magnitude = cos_phi.acos();
        if g.dot(&a.cross(&b)) < 0.0 {
            magnitude
        } else {
            -magnitude
        }
    };
    if phi.is_nan() {
        return Err(DegenerateGeometry::NotANumber);
    }

    let inv_a_sq = if a_sq < DIHEDRAL_EDGE_CASE {
        DIHEDRAL_LARGE_PREFACTOR
    } else {
        1.0 / a_sq
    };
    let inv_b_sq = if b_sq < DIHEDRAL_EDGE_CASE {
        DIHEDRAL_LARGE_PREFACTOR
    } else {
        1.0 / b_sq
    };

    let fg = f.dot(&g) / g_norm;
    let hg = h.dot(&g) / g_norm;
    let d_i = a * (-g_norm * inv_a_sq);
    let d_l = b * (g_norm * inv_b_sq);
    let d_j = a * ((g_norm + fg) * inv_a_sq) - b * (hg * inv_b_sq);
    let d_k = b * (-g_norm * inv_b_sq) - a * (fg * inv_a_sq) + b * (hg * inv_b_sq);

    Ok(Dihedral {
        phi,
        derivatives: [d_i, d_j, d_k, d_l],
        degenerate,
    })
}
