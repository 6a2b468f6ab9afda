use phf::{Map, phf_map};

/// Covalent radius (bohr) used for any atomic number without a tabulated value.
pub const DEFAULT_COVALENT_RADIUS: f64 = 5.0;

/// Label reserved for dummy atoms.
pub const DUMMY_LABEL: &str = "XX";

static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "XX" => 0,
    "H" => 1, "He" => 2,
    "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8, "F" => 9, "Ne" => 10,
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16, "Cl" => 17, "Ar" => 18,
    "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22, "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26,
    "Co" => 27, "Ni" => 28, "Cu" => 29, "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34,
    "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43, "Ru" => 44,
    "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50, "Sb" => 51, "Te" => 52,
    "I" => 53, "Xe" => 54,
    "Cs" => 55, "Ba" => 56, "La" => 57, "Ce" => 58, "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62,
    "Eu" => 63, "Gd" => 64, "Tb" => 65, "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70,
    "Lu" => 71, "Hf" => 72, "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78,
    "Au" => 79, "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85, "Rn" => 86,
};

// Indexed by atomic number, in bohr. Dummies are sized like hydrogen.
const COVALENT_RADII: [f64; 87] = [
    0.47, // XX
    0.47, 0.53, // H, He
    2.42, 1.81, 1.59, 1.32, 1.23, 1.13, 1.08, 1.10, // Li - Ne
    3.15, 2.67, 2.29, 2.08, 2.02, 1.89, 1.89, 1.85, // Na - Ar
    3.19, 3.29, 3.21, 3.02, 2.36, 2.63, 2.83, 2.68, 2.61, 2.34, 2.55, 2.31, 2.31, 2.31, 2.25, 2.28,
    2.28, 2.19, // K - Kr
    4.16, 3.68, 3.59, 3.31, 3.10, 2.91, 2.78, 2.76, 2.68, 2.63, 2.74, 2.72, 2.68, 2.63, 2.61, 2.61,
    2.63, 2.65, // Rb - Xe
    4.61, 4.06, 3.91, 3.86, 3.84, 3.80, 3.76, 3.74, 3.74, 3.71, 3.67, 3.63, 3.63, 3.57, 3.59, 3.53,
    3.53, 3.31, 3.21, 2.55, 2.85, 2.72, 2.66, 2.57, 2.57, 2.49, 3.21, 2.76, 2.80, 2.65, 2.83,
    2.83, // Cs - Rn
];

/// Resolves an element symbol (case-insensitive on all but the first letter) to its atomic number.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    let trimmed = symbol.trim();
    if let Some(&number) = ATOMIC_NUMBERS.get(trimmed) {
        return Some(number);
    }
    let mut chars = trimmed.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let normalized: String = std::iter::once(first)
        .chain(chars.map(|c| c.to_ascii_lowercase()))
        .collect();
    ATOMIC_NUMBERS.get(normalized.as_str()).copied()
}

#[inline]
pub fn covalent_radius(atomic_number: u8) -> f64 {
    COVALENT_RADII
        .get(atomic_number as usize)
        .copied()
        .unwrap_or(DEFAULT_COVALENT_RADIUS)
}

#[inline]
pub fn is_dummy_label(label: &str) -> bool {
    label.trim().eq_ignore_ascii_case(DUMMY_LABEL)
}
