use crate::core::forcefield::gradient::GradientAccumulator;
use crate::core::models::topology::Topology;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV writing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Gradient holds {gradient} atoms but the topology holds {topology}")]
    AtomCount { gradient: usize, topology: usize },
}

#[derive(Debug, Serialize, PartialEq)]
struct GradientRow<'a> {
    geometry: &'a str,
    atom: usize,
    label: &'a str,
    gx: f64,
    gy: f64,
    gz: f64,
}

#[derive(Debug, Serialize, PartialEq)]
struct EnergyRow<'a> {
    geometry: &'a str,
    energy: f64,
}

/// One evaluated structure.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatedGeometry<'a> {
    pub name: &'a str,
    pub topology: &'a Topology,
    pub gradient: &'a GradientAccumulator,
}

/// Writes one `geometry,atom,label,gx,gy,gz` row per atom of every geometry.
pub fn write_gradients<W: Write>(
    writer: W,
    geometries: &[EvaluatedGeometry<'_>],
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    for geometry in geometries {
        for (atom, g) in geometry.gradient.gradient().iter().enumerate() {
            csv.serialize(GradientRow {
                geometry: geometry.name,
                atom,
                label: geometry.topology.label(atom),
                gx: g.x,
                gy: g.y,
                gz: g.z,
            })?;
        }
    }
    csv.flush()?;
    Ok(())
}

/// Writes one `geometry,energy` row per `(name, energy)` pair.
pub fn write_energies<'a, W: Write>(
    writer: W,
    energies: impl IntoIterator<Item = (&'a str, f64)>,
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    for (geometry, energy) in energies {
        csv.serialize(EnergyRow { geometry, energy })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_energies_to_path<'a>(
    path: &Path,
    energies: impl IntoIterator<Item = (&'a str, f64)>,
) -> Result<(), ReportError> {
    let to_report = |e: csv::Error| ReportError::Csv {
        path: path.display().to_string(),
        source: e,
    };
    let file = std::fs::File::create(path).map_err(|e| to_report(e.into()))?;
    write_energies(std::io::BufWriter::new(file), energies).map_err(to_report)
}

pub fn write_gradients_to_path(
    path: &Path,
    geometries: &[EvaluatedGeometry<'_>],
) -> Result<(), ReportError> {
    for geometry in geometries {
        if geometry.gradient.num_atoms() != geometry.topology.num_atoms() {
            return Err(ReportError::AtomCount {
                gradient: geometry.gradient.num_atoms(),
                topology: geometry.topology.num_atoms(),
            });
        }
    }
    let to_report = |e: csv::Error| ReportError::Csv {
        path: path.display().to_string(),
        source: e,
    };
    let file = std::fs::File::create(path).map_err(|e| to_report(e.into()))?;
    write_gradients(std::io::BufWriter::new(file), geometries).map_err(to_report)
}
