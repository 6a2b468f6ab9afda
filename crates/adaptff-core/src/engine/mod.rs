//! # Engine Module
//!
//! Assembles the interaction terms into complete adaptive force fields and
//! evaluates them over sets of reference geometries.
//!
//! ## Overview
//!
//! A force field is chosen by a method string (`amberff`, `adaptivegupta:...`,
//! `adaptiveSWGFF`) that parses into a [`config::MethodConfig`] before any
//! evaluation starts. [`forcefield::ForceField`] owns the matching terms and
//! exposes the energy, Cartesian gradient, parameter gradient, parameter stub
//! and bounds of the whole method. [`batch::Batch`] binds one force field
//! instance to each reference geometry so offset caches are never shared between
//! geometries or threads.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Method strings and term option builders
//! - **Composition** ([`forcefield`]) - The per-method set of terms
//! - **Batch Evaluation** ([`batch`]) - Many geometries, optionally on the rayon pool
//! - **Progress Monitoring** ([`progress`]) - Callbacks for front-ends
//! - **Error Handling** ([`error`]) - Setup and evaluation failures

pub mod batch;
pub mod config;
pub mod error;
pub mod forcefield;
pub mod progress;
