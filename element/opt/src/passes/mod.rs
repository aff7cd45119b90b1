//! Passes for the Element optimizer
mod constant_folding;

pub use constant_folding::ConstantFolding;
