//! Parser for the component markup

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::parse;
