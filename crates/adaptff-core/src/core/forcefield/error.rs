use crate::core::params::store::{MissingParameters, ParameterCount};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TermError {
    #[error(transparent)]
    MissingParameters(#[from] MissingParameters),
    #[error(transparent)]
    ParameterCount(#[from] ParameterCount),
    #[error("Term '{term}' labels atoms by special identifiers but the topology carries none")]
    MissingSpecialIds { term: &'static str },
}
