//! Frontend parsing and AST representation.
//!
//! Defines the frontend AST and the parser.
//! The frontend representation is transformed into the semantic representation
//! when the sources are loaded into an `element_ir::CompilationContext`.
pub mod ast;
pub mod parser;

mod workspace;

pub use ast::{Body, DeclKind, Declaration, Expression, PortDef, SourceFile};
pub use workspace::{ParseFailure, PRELUDE, PRELUDE_NAME, Workspace};
