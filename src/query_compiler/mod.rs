//! Read path: compile a type graph into one multi-join SELECT and decode its rows.

pub mod compiler;
pub mod errors;
pub mod materializer;

pub use compiler::{compile, CompiledQuery, ROOT_ALIAS};
pub use errors::{CompileError, MaterializeError};
pub use materializer::materialize;
