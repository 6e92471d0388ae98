// tmc — Tree Mapping Compiler
//
// Library root. Phases in pipeline order: scan → parser → field → node →
// registry → emit, driven by `driver::compile`. `runtime` evaluates the
// compiled registry directly.

pub mod ast;
pub mod diag;
pub mod driver;
pub mod emit;
pub mod expr;
pub mod field;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod scan;

pub use driver::{compile, CompileError, CompileOptions, CompileOutput};
