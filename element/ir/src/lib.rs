//! The semantic core of the Element compiler.
//!
//! Declarations loaded from the frontend AST are resolved lazily into
//! [Value]s through a [CompilationContext]. Numeric values are nodes of an
//! expression graph stored in an [ExprPool], which the optimizer in
//! `element-opt` rewrites.
mod call;
mod context;
mod declaration;
mod diagnostics;
mod env;
mod expression;
mod from_ast;
mod group;
pub mod intrinsics;
mod pool;
mod printer;
mod resolve;
mod structs;
mod validate;
mod value;

pub mod reserved_names;

pub use context::{CompilationContext, CompilationInput, CompiledFunction, LogCallback};
pub use declaration::{DeclBody, DeclRef, Declaration, Port, Scope, ScopeId};
pub use diagnostics::{
    Activity, CatalogEntry, CompilerMessage, MessageCatalog, MessageCode, MessageLevel,
    Trace, TraceSite,
};
pub use env::Env;
pub use expression::{clamp_selector, BinaryOp, Expr, ExprRef, Number, UnaryOp};
pub use group::{Group, GroupRef};
pub use intrinsics::IntrinsicStruct;
pub use pool::ExprPool;
pub use printer::Printer;
pub use value::{FunctionValue, StructInstance, TypeIdentity, Value};
