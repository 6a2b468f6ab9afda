//! # Core Module
//!
//! The building blocks the force fields are assembled from.
//!
//! ## Architecture
//!
//! - **Structural Input** ([`models`]) - Topologies with distance tables and bonded relationships
//! - **Parameters** ([`params`]) - The flat parameter store, its bounds and its file format
//! - **Interaction Terms** ([`forcefield`]) - Potentials, terms, gradients and caches
//! - **File I/O** ([`io`]) - Geometry input and gradient reports
//! - **Utilities** ([`utils`]) - Element tables and geometric primitives

pub mod forcefield;
pub mod io;
pub mod models;
pub mod params;
pub mod utils;
