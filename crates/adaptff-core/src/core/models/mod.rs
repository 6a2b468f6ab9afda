//! # Models Module
//!
//! Structural input shared by every interaction term.
//!
//! ## Key Components
//!
//! - [`topology`] - Atom identities, dense distance/displacement tables and the
//!   bonded, 1-3 and 1-4 relationships derived from a bond graph
//!
//! A [`topology::Topology`] is built once per geometry through
//! [`topology::TopologyBuilder`] and is only read by the force-field terms. Callers
//! driving a structure optimization may move atoms with
//! [`topology::Topology::set_positions`]; the atom ordering, and therefore any
//! warm offset cache, stays valid.

pub mod topology;
