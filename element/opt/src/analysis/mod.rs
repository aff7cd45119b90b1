//! Analyses over the expression graph.
//!
//! The analyses answer queries that passes need while rewriting a graph.
mod state_dependency;

pub use state_dependency::StateDependency;
