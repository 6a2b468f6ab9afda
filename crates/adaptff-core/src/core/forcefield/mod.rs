//! # Force Field Module
//!
//! Interaction terms of the adaptive force fields together with the shared machinery
//! they are built from.
//!
//! ## Overview
//!
//! Every functional form implements [`term::InteractionTerm`]: energy, Cartesian
//! gradient, parameter gradient, the parameter keys it needs for a set of reference
//! topologies, and the search bounds of the parameters it owns. Parameters are looked
//! up by string key in a [`ParameterStore`](crate::core::params::store::ParameterStore);
//! each term resolves its keys once into an [`cache::OffsetCache`] and reuses the
//! offsets on later evaluations.
//!
//! ## Key Components
//!
//! - [`terms`] - The concrete functional forms
//! - [`potentials`] - Closed-form energy kernels with their derivatives
//! - [`gradient`] - Per-atom gradient accumulation
//! - [`numerical`] - Finite-difference references for both gradients
//! - [`sentinel`] - Fixed energies reported for unusable interactions
//! - [`exp`] - Exponential approximations for the Gupta term

pub mod cache;
pub mod error;
pub mod exp;
pub mod gradient;
pub mod numerical;
pub mod potentials;
pub mod sentinel;
pub mod term;
pub mod terms;
