//! Shared utilities for the Element compiler.
mod errors;
mod id;
mod out_file;
mod position;

pub use errors::{ElementResult, Error};
pub use id::{GetName, Id};
pub use out_file::OutputFile;
pub use position::{Span, WithPos};
