use thiserror::Error;

use super::config::ConfigError;
use crate::core::forcefield::error::TermError;
use crate::core::io::geometry::GeometryLoadError;
use crate::core::io::report::ReportError;
use crate::core::params::file::ParamFileError;
use crate::core::params::store::ParamStoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Term evaluation failed: {source}")]
    Term {
        #[from]
        source: TermError,
    },

    #[error("Geometry '{name}' failed: {source}")]
    Geometry {
        name: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error(transparent)]
    GeometryLoad(#[from] GeometryLoadError),

    #[error(transparent)]
    ParamFile(#[from] ParamFileError),

    #[error("Invalid parameter store: {0}")]
    ParamStore(#[from] ParamStoreError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Gradient buffer holds {found} values but the parameter store holds {expected}")]
    GradientLength { expected: usize, found: usize },
}
