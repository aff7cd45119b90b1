//! Optimizations over the Element expression graph.
//!
//! The only pass is [passes::ConstantFolding], which folds constant
//! sub-expressions, applies algebraic identities and removes group state
//! that is never read back. It works on handles into an
//! [element_ir::ExprPool], so optimized nodes are added to the same pool as
//! the graph they came from.
//!
//! ```rust
//! use element_ir::{BinaryOp, ExprPool};
//! use element_opt::passes::ConstantFolding;
//! use element_utils::ElementResult;
//! fn main() -> ElementResult<()> {
//!     let mut pool = ExprPool::new();
//!     let x = pool.input(0);
//!     let zero = pool.constant(0.0);
//!     let sum = pool.binary(BinaryOp::Add, zero, x);
//!     let mut folding = ConstantFolding::default();
//!     assert_eq!(folding.optimize(&mut pool, sum)?, x);
//!     Ok(())
//! }
//! ```
pub mod analysis;
pub mod passes;
pub mod traversal;
