//! # The Element Compiler
//!
//! This crate plumbs together the Element compiler crates and provides the
//! `elementc` command-line interface.
//! You SHOULD NOT depend on this crate. Instead, depend on the crates that
//! this crate depends on: [`element_frontend`], [`element_ir`],
//! [`element_opt`].
pub mod cmdline;
pub mod driver;
