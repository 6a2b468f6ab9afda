//! # Parameters Module
//!
//! Flat, string-keyed parameter storage shared by every interaction term.
//!
//! ## Overview
//!
//! A [`store::ParameterStore`] lays out the parameters of each key (for example
//! `amberlj:C` or `adaptivegupta:AuAg`) back to back in one `f64` array. Terms resolve
//! the offset of the keys they need and read the values at that offset, which keeps
//! the optimizer-facing vector contiguous. [`bounds::ParameterBounds`] carries the
//! matching box constraints and [`file`] reads and writes the tagged text format.

pub mod bounds;
pub mod file;
pub mod store;
