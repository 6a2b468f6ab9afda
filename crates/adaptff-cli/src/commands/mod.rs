pub mod bounds;
pub mod energy;
pub mod stub;

use crate::error::Result;
use adaptff::core::io::geometry::load_topology;
use adaptff::engine::batch::NamedTopology;
use adaptff::engine::error::EngineError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Geometry name used in reports: the file stem, or the full path when there is none.
fn geometry_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn load_geometries(paths: &[PathBuf]) -> Result<Vec<NamedTopology>> {
    paths
        .iter()
        .map(|path| -> Result<NamedTopology> {
            info!("Loading geometry from {:?}", path);
            let topology = load_topology(path).map_err(EngineError::from)?;
            Ok(NamedTopology {
                name: geometry_name(path),
                topology,
            })
        })
        .collect()
}
