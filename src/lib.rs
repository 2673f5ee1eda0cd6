//! A bytecode back-end for a small functional, pattern-matching language:
//! lowers an externally-parsed AST into fixed-width register-machine
//! bytecode images, and reads those images back.

pub mod ast;
pub mod bytecode;
pub mod emit;
pub mod image;
pub mod instruction;
pub mod symtab;
mod util;
pub mod value;

pub use emit::{generate, Error, Image};
