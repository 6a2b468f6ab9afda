use crate::core::utils::elements;
use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Bond ({0}, {1}) references an atom outside of the {2}-atom topology")]
    BondOutOfRange(usize, usize, usize),
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Expected {expected} special identifiers, got {found}")]
    SpecialIdCount { expected: usize, found: usize },
    #[error("Molecule sizes sum to {found} atoms but the topology holds {expected}")]
    MoleculeSizeMismatch { expected: usize, found: usize },
    #[error("Expected {expected} positions, got {found}")]
    PositionCount { expected: usize, found: usize },
}

/// An undirected bond, stored with the lower index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bond {
    pub first: usize,
    pub second: usize,
}

impl Bond {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            first: a.min(b),
            second: a.max(b),
        }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.first == atom || self.second == atom
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub label: String,
    pub atomic_number: u8,
    pub position: Point3<f64>,
    pub charge: f64,
    pub spin: i16,
}

impl AtomRecord {
    pub fn new(label: impl Into<String>, atomic_number: u8, position: Point3<f64>) -> Self {
        Self {
            label: label.into(),
            atomic_number,
            position,
            charge: 0.0,
            spin: 0,
        }
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_spin(mut self, spin: i16) -> Self {
        self.spin = spin;
        self
    }
}

/// Geometry and connectivity of one structure, in bohr.
///
/// Distances and displacement vectors are precomputed densely; `displacement(i, j)`
/// is `r_i - r_j`. The 1-3 and 1-4 relationships are derived from the bond graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    labels: Vec<String>,
    atomic_numbers: Vec<u8>,
    charges: Vec<f64>,
    spins: Vec<i16>,
    positions: Vec<Point3<f64>>,
    distances: Vec<f64>,
    displacements: Vec<Vector3<f64>>,
    bonds: Vec<Bond>,
    bonded: Vec<bool>,
    related_13: Vec<bool>,
    related_14: Vec<bool>,
    contributions_13: Vec<[usize; 3]>,
    contributions_14: Vec<[usize; 4]>,
    special_ids: Option<Vec<String>>,
    atoms_per_molecule: Vec<usize>,
    rigid_environment: bool,
}

impl Topology {
    #[inline]
    pub fn num_atoms(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        i * self.num_atoms() + j
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[self.index(i, j)]
    }

    #[inline]
    pub fn displacement(&self, i: usize, j: usize) -> Vector3<f64> {
        self.displacements[self.index(i, j)]
    }

    #[inline]
    pub fn is_bonded(&self, i: usize, j: usize) -> bool {
        self.bonded[self.index(i, j)]
    }

    #[inline]
    pub fn is_13(&self, i: usize, j: usize) -> bool {
        self.related_13[self.index(i, j)]
    }

    #[inline]
    pub fn is_14(&self, i: usize, j: usize) -> bool {
        self.related_14[self.index(i, j)]
    }

    pub fn label(&self, i: usize) -> &str {
        &self.labels[i]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn atomic_number(&self, i: usize) -> u8 {
        self.atomic_numbers[i]
    }

    pub fn charge(&self, i: usize) -> f64 {
        self.charges[i]
    }

    pub fn spin(&self, i: usize) -> i16 {
        self.spins[i]
    }

    pub fn covalent_radius(&self, i: usize) -> f64 {
        elements::covalent_radius(self.atomic_numbers[i])
    }

    /// Dummy atoms carry atomic number zero or the reserved `XX` label.
    pub fn is_dummy(&self, i: usize) -> bool {
        self.atomic_numbers[i] == 0 || elements::is_dummy_label(&self.labels[i])
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn contributions_13(&self) -> &[[usize; 3]] {
        &self.contributions_13
    }

    pub fn contributions_14(&self) -> &[[usize; 4]] {
        &self.contributions_14
    }

    pub fn special_id(&self, i: usize) -> Option<&str> {
        self.special_ids.as_ref().map(|ids| ids[i].as_str())
    }

    pub fn has_special_ids(&self) -> bool {
        self.special_ids.is_some()
    }

    pub fn atoms_per_molecule(&self) -> &[usize] {
        &self.atoms_per_molecule
    }

    pub fn has_rigid_environment(&self) -> bool {
        self.rigid_environment
    }

    /// Number of leading atoms outside the rigid environment (all atoms without one).
    pub fn flexible_atom_count(&self) -> usize {
        if !self.rigid_environment || self.atoms_per_molecule.len() < 2 {
            return self.num_atoms();
        }
        let rigid_block = self.atoms_per_molecule.len() - 1;
        self.atoms_per_molecule[..rigid_block].iter().sum()
    }

    /// Replaces every position, keeping labels and connectivity.
    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) -> Result<(), TopologyError> {
        if positions.len() != self.num_atoms() {
            return Err(TopologyError::PositionCount {
                expected: self.num_atoms(),
                found: positions.len(),
            });
        }
        self.positions = positions;
        self.refresh_geometry();
        Ok(())
    }

    /// Shifts one Cartesian coordinate of one atom.
    pub fn displace(&mut self, atom: usize, axis: usize, delta: f64) {
        self.positions[atom][axis] += delta;
        self.refresh_geometry();
    }

    fn refresh_geometry(&mut self) {
        let n = self.num_atoms();
        self.distances.resize(n * n, 0.0);
        self.displacements.resize(n * n, Vector3::zeros());
        for i in 0..n {
            for j in 0..n {
                let diff = self.positions[i] - self.positions[j];
                self.displacements[i * n + j] = diff;
                self.distances[i * n + j] = diff.norm();
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TopologyBuilder {
    atoms: Vec<AtomRecord>,
    bonds: BTreeSet<Bond>,
    special_ids: Option<Vec<String>>,
    atoms_per_molecule: Option<Vec<usize>>,
    rigid_environment: bool,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(
        mut self,
        label: impl Into<String>,
        atomic_number: u8,
        position: Point3<f64>,
    ) -> Self {
        self.atoms.push(AtomRecord::new(label, atomic_number, position));
        self
    }

    pub fn add_atom(mut self, atom: AtomRecord) -> Self {
        self.atoms.push(atom);
        self
    }

    pub fn bond(mut self, a: usize, b: usize) -> Self {
        self.bonds.insert(Bond { first: a, second: b });
        self
    }

    pub fn special_ids(mut self, ids: Vec<String>) -> Self {
        self.special_ids = Some(ids);
        self
    }

    pub fn molecules(mut self, atoms_per_molecule: Vec<usize>) -> Self {
        self.atoms_per_molecule = Some(atoms_per_molecule);
        self
    }

    pub fn rigid_environment(mut self, rigid: bool) -> Self {
        self.rigid_environment = rigid;
        self
    }

    pub fn build(self) -> Result<Topology, TopologyError> {
        let n = self.atoms.len();

        let mut bonds = Vec::with_capacity(self.bonds.len());
        for bond in &self.bonds {
            if bond.first == bond.second {
                return Err(TopologyError::SelfBond(bond.first));
            }
            if bond.first >= n || bond.second >= n {
                return Err(TopologyError::BondOutOfRange(bond.first, bond.second, n));
            }
            bonds.push(Bond::new(bond.first, bond.second));
        }
        bonds.sort();
        bonds.dedup();

        if let Some(ids) = &self.special_ids {
            if ids.len() != n {
                return Err(TopologyError::SpecialIdCount {
                    expected: n,
                    found: ids.len(),
                });
            }
        }

        let atoms_per_molecule = match self.atoms_per_molecule {
            Some(sizes) => {
                let total: usize = sizes.iter().sum();
                if total != n {
                    return Err(TopologyError::MoleculeSizeMismatch {
                        expected: n,
                        found: total,
                    });
                }
                sizes
            }
            None => vec![n],
        };

        let mut neighbors = vec![BTreeSet::new(); n];
        let mut bonded = vec![false; n * n];
        for bond in &bonds {
            neighbors[bond.first].insert(bond.second);
            neighbors[bond.second].insert(bond.first);
            bonded[bond.first * n + bond.second] = true;
            bonded[bond.second * n + bond.first] = true;
        }

        let mut related_13 = vec![false; n * n];
        let mut contributions_13 = Vec::new();
        for (center, around) in neighbors.iter().enumerate() {
            for &a in around {
                for &c in around.range(a + 1..) {
                    contributions_13.push([a, center, c]);
                    related_13[a * n + c] = true;
                    related_13[c * n + a] = true;
                }
            }
        }

        let mut related_14 = vec![false; n * n];
        let mut contributions_14 = Vec::new();
        for bond in &bonds {
            let (b, c) = (bond.first, bond.second);
            for &a in neighbors[b].iter().filter(|&&a| a != c) {
                for &d in neighbors[c].iter().filter(|&&d| d != b && d != a) {
                    contributions_14.push([a, b, c, d]);
                    related_14[a * n + d] = true;
                    related_14[d * n + a] = true;
                }
            }
        }

        let mut labels = Vec::with_capacity(n);
        let mut atomic_numbers = Vec::with_capacity(n);
        let mut charges = Vec::with_capacity(n);
        let mut spins = Vec::with_capacity(n);
        let mut positions = Vec::with_capacity(n);
        for atom in self.atoms {
            labels.push(atom.label);
            atomic_numbers.push(atom.atomic_number);
            charges.push(atom.charge);
            spins.push(atom.spin);
            positions.push(atom.position);
        }

        let mut topology = Topology {
            labels,
            atomic_numbers,
            charges,
            spins,
            positions,
            distances: Vec::new(),
            displacements: Vec::new(),
            bonds,
            bonded,
            related_13,
            related_14,
            contributions_13,
            contributions_14,
            special_ids: self.special_ids,
            atoms_per_molecule,
            rigid_environment: self.rigid_environment,
        };
        topology.refresh_geometry();
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn butane_like_chain() -> Topology {
        TopologyBuilder::new()
            .atom("C", 6, Point3::new(0.0, 0.0, 0.0))
            .atom("C", 6, Point3::new(2.9, 0.0, 0.0))
            .atom("C", 6, Point3::new(3.9, 2.7, 0.0))
            .atom("C", 6, Point3::new(6.8, 2.7, 0.5))
            .bond(0, 1)
            .bond(1, 2)
            .bond(2, 3)
            .build()
            .unwrap()
    }

    #[test]
    fn bond_new_orders_atoms_ascending() {
        let bond = Bond::new(5, 2);
        assert_eq!(bond.first, 2);
        assert_eq!(bond.second, 5);
        assert!(bond.contains(5));
        assert!(!bond.contains(3));
    }

    #[test]
    fn distances_are_symmetric_and_displacements_antisymmetric() {
        let topology = butane_like_chain();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(topology.distance(i, j), topology.distance(j, i));
                assert_eq!(topology.displacement(i, j), -topology.displacement(j, i));
            }
        }
        assert!((topology.distance(0, 1) - 2.9).abs() < TOLERANCE);
        assert_eq!(topology.displacement(1, 0), Vector3::new(2.9, 0.0, 0.0));
    }

    #[test]
    fn relationships_are_derived_from_bond_graph() {
        let topology = butane_like_chain();
        assert!(topology.is_bonded(0, 1) && topology.is_bonded(1, 0));
        assert!(!topology.is_bonded(0, 2));
        assert!(topology.is_13(0, 2) && topology.is_13(2, 0));
        assert!(topology.is_13(1, 3));
        assert!(!topology.is_13(0, 3));
        assert!(topology.is_14(0, 3) && topology.is_14(3, 0));
        assert!(!topology.is_14(0, 2));
    }

    #[test]
    fn contribution_lists_hold_each_chain_once() {
        let topology = butane_like_chain();
        assert_eq!(topology.contributions_13(), &[[0, 1, 2], [1, 2, 3]]);
        assert_eq!(topology.contributions_14(), &[[0, 1, 2, 3]]);
    }

    #[test]
    fn three_membered_ring_has_no_14_contributions() {
        let topology = TopologyBuilder::new()
            .atom("C", 6, Point3::new(0.0, 0.0, 0.0))
            .atom("C", 6, Point3::new(2.8, 0.0, 0.0))
            .atom("C", 6, Point3::new(1.4, 2.4, 0.0))
            .bond(0, 1)
            .bond(1, 2)
            .bond(2, 0)
            .build()
            .unwrap();
        assert_eq!(topology.contributions_13().len(), 3);
        assert!(topology.contributions_14().is_empty());
    }

    #[test]
    fn build_rejects_self_bonds() {
        let result = TopologyBuilder::new()
            .atom("H", 1, Point3::origin())
            .bond(0, 0)
            .build();
        assert_eq!(result, Err(TopologyError::SelfBond(0)));
    }

    #[test]
    fn build_rejects_bonds_to_missing_atoms() {
        let result = TopologyBuilder::new()
            .atom("H", 1, Point3::origin())
            .bond(0, 3)
            .build();
        assert_eq!(result, Err(TopologyError::BondOutOfRange(0, 3, 1)));
    }

    #[test]
    fn build_rejects_wrong_number_of_special_ids() {
        let result = TopologyBuilder::new()
            .atom("H", 1, Point3::origin())
            .special_ids(vec!["a".into(), "b".into()])
            .build();
        assert_eq!(
            result,
            Err(TopologyError::SpecialIdCount {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn build_rejects_inconsistent_molecule_sizes() {
        let result = TopologyBuilder::new()
            .atom("H", 1, Point3::origin())
            .atom("H", 1, Point3::new(1.4, 0.0, 0.0))
            .molecules(vec![1, 2])
            .build();
        assert!(matches!(
            result,
            Err(TopologyError::MoleculeSizeMismatch { .. })
        ));
    }

    #[test]
    fn flexible_atom_count_excludes_trailing_rigid_block() {
        let mut builder = TopologyBuilder::new();
        for i in 0..5 {
            builder = builder.atom("Au", 79, Point3::new(5.0 * i as f64, 0.0, 0.0));
        }
        let rigid = builder
            .molecules(vec![1, 1, 3])
            .rigid_environment(true)
            .build()
            .unwrap();
        assert_eq!(rigid.flexible_atom_count(), 2);
        assert!(rigid.has_rigid_environment());
    }

    #[test]
    fn flexible_atom_count_without_rigid_flag_covers_all_atoms() {
        let topology = butane_like_chain();
        assert_eq!(topology.flexible_atom_count(), 4);
        assert_eq!(topology.atoms_per_molecule(), &[4]);
    }

    #[test]
    fn set_positions_refreshes_distances() {
        let mut topology = butane_like_chain();
        let mut positions = topology.positions().to_vec();
        positions[1] = Point3::new(3.0, 0.0, 0.0);
        topology.set_positions(positions).unwrap();
        assert!((topology.distance(0, 1) - 3.0).abs() < TOLERANCE);
        assert!(topology.is_bonded(0, 1));
    }

    #[test]
    fn set_positions_rejects_wrong_length() {
        let mut topology = butane_like_chain();
        let result = topology.set_positions(vec![Point3::origin()]);
        assert_eq!(
            result,
            Err(TopologyError::PositionCount {
                expected: 4,
                found: 1
            })
        );
    }

    #[test]
    fn displace_moves_single_coordinate() {
        let mut topology = butane_like_chain();
        topology.displace(0, 0, -0.1);
        assert!((topology.distance(0, 1) - 3.0).abs() < TOLERANCE);
        assert!((topology.positions()[0].x + 0.1).abs() < TOLERANCE);
    }

    #[test]
    fn dummy_atoms_are_detected_by_number_or_label() {
        let topology = TopologyBuilder::new()
            .atom("XX", 1, Point3::origin())
            .atom("Q", 0, Point3::new(1.0, 0.0, 0.0))
            .atom("Si", 14, Point3::new(2.0, 0.0, 0.0))
            .build()
            .unwrap();
        assert!(topology.is_dummy(0));
        assert!(topology.is_dummy(1));
        assert!(!topology.is_dummy(2));
    }

    #[test]
    fn atom_records_carry_charge_and_spin() {
        let topology = TopologyBuilder::new()
            .add_atom(
                AtomRecord::new("O", 8, Point3::origin())
                    .with_charge(-0.8)
                    .with_spin(1),
            )
            .special_ids(vec!["OW".into()])
            .build()
            .unwrap();
        assert_eq!(topology.charge(0), -0.8);
        assert_eq!(topology.spin(0), 1);
        assert_eq!(topology.special_id(0), Some("OW"));
        assert!((topology.covalent_radius(0) - 1.13).abs() < TOLERANCE);
    }
}
