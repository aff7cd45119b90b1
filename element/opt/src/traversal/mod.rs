//! Helpers shared by graph passes.

/// Trait that describes named things, such as optimization passes.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}
