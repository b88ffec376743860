pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;

mod engine;

pub use engine::Engine;
pub use interpreter::{new_interpreter, run, Environment, Object};
pub use lexer::{tokenize, Lexer};
pub use parser::Parser;
