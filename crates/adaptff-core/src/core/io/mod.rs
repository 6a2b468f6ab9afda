//! File formats read and written around force-field evaluations.
//!
//! Geometries come in as TOML documents and are turned into
//! [`Topology`](crate::core::models::topology::Topology) values in bohr; per-atom
//! gradients and total energies go out as CSV tables.

pub mod geometry;
pub mod report;
