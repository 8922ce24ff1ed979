//! cotlinc-sem - Semantic analysis for the Cotlin language.
//!
//! Resolves names against an ordered symbol table, type-checks every
//! expression against the closed built-in set, and precomputes the two
//! metrics the code generator needs to size the stack frame exactly once:
//! the maximum evaluation-stack depth and the maximum `Repeat` nesting.

mod analysis;
mod symtab;
mod types;

pub use analysis::{analyze, expr_depth, Analysis};
pub use symtab::{SymTab, Symbol};
pub use types::{Builtin, Ty, BUILTINS};

use thiserror::Error;

/// Errors raised during semantic analysis. All are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum SemError {
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("duplicate variable `{0}`")]
    DuplicateVariable(String),

    #[error("bad unary operand")]
    BadUnary,

    #[error("bad binary operands")]
    BadBinary,

    #[error("lambda returns non-int")]
    LambdaBody,

    #[error("unknown call `{0}`")]
    UnknownCall(String),

    #[error("bad call, expected {0}")]
    BadCall(&'static str),

    #[error("print expects int or string")]
    PrintArg,

    #[error("bad let")]
    BadLet,

    #[error("bad expression statement")]
    BadExprStmt,

    #[error("type mismatch in assignment to `{0}`")]
    TypeMismatch(String),

    #[error("bad if condition")]
    BadIfCond,

    #[error("bad repeat count")]
    BadRepeatCount,
}
