use crate::core::models::topology::{AtomRecord, Topology, TopologyBuilder, TopologyError};
use crate::core::utils::elements;
use nalgebra::Point3;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const ANGSTROM_TO_BOHR: f64 = 1.889725989;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Angstrom,
    Bohr,
}

impl LengthUnit {
    pub fn to_bohr(self) -> f64 {
        match self {
            Self::Angstrom => ANGSTROM_TO_BOHR,
            Self::Bohr => 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AtomEntry {
    /// Atom type used to build parameter keys.
    pub label: String,
    /// Element symbol; defaults to the label.
    pub element: Option<String>,
    pub position: [f64; 3],
    #[serde(default)]
    pub charge: f64,
    #[serde(default)]
    pub spin: i16,
    /// Special identifier, if the structure labels atoms by id.
    pub id: Option<String>,
}

/// On-disk description of one structure.
///
/// ```toml
/// units = "angstrom"
/// bonds = [[0, 1], [0, 2]]
///
/// [[atoms]]
/// label = "O"
/// position = [0.0, 0.0, 0.0]
/// charge = -0.8
///
/// [[atoms]]
/// label = "H"
/// position = [0.96, 0.0, 0.0]
/// charge = 0.4
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeometryFile {
    #[serde(default)]
    pub units: LengthUnit,
    #[serde(default)]
    pub bonds: Vec<[usize; 2]>,
    /// Atoms per molecule, in file order.
    pub molecules: Option<Vec<usize>>,
    #[serde(default)]
    pub rigid_environment: bool,
    pub atoms: Vec<AtomEntry>,
}

#[derive(Debug, Error)]
pub enum GeometryLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown element '{element}' for atom {atom}")]
    UnknownElement { atom: usize, element: String },
    #[error("Either every atom or no atom may carry a special identifier ({found} of {expected} do)")]
    PartialSpecialIds { expected: usize, found: usize },
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
}

impl GeometryFile {
    pub fn load(path: &Path) -> Result<Self, GeometryLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| GeometryLoadError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| GeometryLoadError::Toml {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Converts to a [`Topology`] with positions in bohr.
    pub fn to_topology(&self) -> Result<Topology, GeometryLoadError> {
        let scale = self.units.to_bohr();
        let mut builder = TopologyBuilder::new();
        for (index, entry) in self.atoms.iter().enumerate() {
            let element = entry.element.as_deref().unwrap_or(&entry.label);
            let atomic_number = elements::atomic_number(element).ok_or_else(|| {
                GeometryLoadError::UnknownElement {
                    atom: index,
                    element: element.to_string(),
                }
            })?;
            let position = Point3::from(entry.position) * scale;
            builder = builder.add_atom(
                AtomRecord::new(entry.label.clone(), atomic_number, position)
                    .with_charge(entry.charge)
                    .with_spin(entry.spin),
            );
        }
        for &[a, b] in &self.bonds {
            builder = builder.bond(a, b);
        }

        let ids: Vec<String> = self.atoms.iter().filter_map(|a| a.id.clone()).collect();
        if !ids.is_empty() {
            if ids.len() != self.atoms.len() {
                return Err(GeometryLoadError::PartialSpecialIds {
                    expected: self.atoms.len(),
                    found: ids.len(),
                });
            }
            builder = builder.special_ids(ids);
        }
        if let Some(molecules) = &self.molecules {
            builder = builder.molecules(molecules.clone());
        }
        Ok(builder.rigid_environment(self.rigid_environment).build()?)
    }
}

/// Reads a geometry file and builds its topology.
pub fn load_topology(path: &Path) -> Result<Topology, GeometryLoadError> {
    GeometryFile::load(path)?.to_topology()
}
