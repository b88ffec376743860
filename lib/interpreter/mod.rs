mod builtins;
mod environment;
mod evaluator;
mod object;

use std::{cell::RefCell, rc::Rc};

use anyhow::{bail, Result};
use tracing::debug;

pub use environment::Environment;
pub use evaluator::Evaluator;
pub use object::{BuiltinFunction, Object};

use crate::{Engine, Lexer, Parser};

/// Parses and evaluates `input` against `env`, which keeps every top-level
/// binding for the next call. Parse errors stop evaluation entirely; a
/// runtime error becomes the `Object::Error` result.
pub fn run(input: &str, env: &Rc<RefCell<Environment>>) -> (Object, Vec<String>) {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);

    let program = match parser.parse_program() {
        Ok(program) => program,
        Err(errors) => {
            debug!(count = errors.len(), "program rejected by parser");
            return (Object::Null, errors.iter().map(|e| e.to_string()).collect());
        }
    };

    debug!(statements = program.statements.len(), "evaluating program");

    let mut evaluator = Evaluator::with_environment(env.clone());
    match evaluator.eval(&program) {
        Ok(value) => (value, Vec::new()),
        Err(err) => {
            let message = err.to_string();
            debug!(error = %message, "runtime error");
            (Object::Error(message.clone()), vec![message])
        }
    }
}

pub fn new_interpreter() -> Box<dyn Engine> {
    Box::new(EngineImpl {
        env: Environment::new(),
    })
}

struct EngineImpl {
    env: Rc<RefCell<Environment>>,
}

impl Engine for EngineImpl {
    fn run(&mut self, input: &str) -> Result<String> {
        let (result, errors) = run(input, &self.env);

        if !errors.is_empty() {
            bail!(errors.join("\n"));
        }

        Ok(result.to_string())
    }
}
