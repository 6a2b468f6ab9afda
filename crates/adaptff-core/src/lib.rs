//! # adaptff Core Library
//!
//! Refittable interatomic potentials: every functional form reports its energy,
//! its gradient with respect to atomic positions, and its gradient with respect to
//! its own parameters, so an external optimizer can fit the parameters against
//! reference data.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers with a clear separation of concerns.
//!
//! - **[`core`]: The Foundation.** Topologies, the string-keyed parameter store,
//!   the pure potential kernels, the individual interaction terms with their offset
//!   caches, and file I/O.
//!
//! - **[`engine`]: The Composition Layer.** Parses method strings, assembles the
//!   terms of a complete force field, and evaluates it over many reference
//!   geometries, in parallel when the `parallel` feature is enabled.

pub mod core;
pub mod engine;
