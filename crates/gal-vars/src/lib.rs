pub mod ast;
pub mod builtins;
pub mod env;
pub mod lexer;
pub mod ops;
pub mod parser;
mod rng;

pub use builtins::Builtins;
pub use env::VarsFrame;
