use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::{anyhow, bail, Result};
use tracing::trace;

use super::{builtins::Builtins, environment::Environment, object::Object};
use crate::{
    ast::{Expression, Program, Statement},
    token::Token,
};

const TRUE: Object = Object::Boolean(true);
const FALSE: Object = Object::Boolean(false);
const NULL: Object = Object::Null;

/// Anything that stops normal evaluation: a `return` travelling to its call
/// boundary, or a runtime error travelling to the top level.
enum Unwind {
    Return(Object),
    Error(anyhow::Error),
}

impl From<anyhow::Error> for Unwind {
    fn from(err: anyhow::Error) -> Self {
        Unwind::Error(err)
    }
}

type Flow<T> = std::result::Result<T, Unwind>;

/// Walks the AST against a chain of environments.
pub struct Evaluator {
    env: Rc<RefCell<Environment>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_environment(Environment::new())
    }

    pub fn with_environment(env: Rc<RefCell<Environment>>) -> Self {
        Self { env }
    }

    /// A top-level `return` ends the program with its value.
    pub fn eval(&mut self, program: &Program) -> Result<Object> {
        match self.eval_statements(&program.statements) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(err)) => Err(err),
        }
    }

    // The previous environment is restored even when `f` unwinds.
    fn in_environment<T>(
        &mut self,
        env: Rc<RefCell<Environment>>,
        f: impl FnOnce(&mut Self) -> Flow<T>,
    ) -> Flow<T> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = previous;
        result
    }

    fn eval_statement(&mut self, statement: &Statement) -> Flow<Object> {
        match statement {
            Statement::Expression(expression) => self.eval_expression(expression),
            Statement::Block(statements) => self.eval_block_statement(statements),
            Statement::Return(expression) => {
                let value = self.eval_expression(expression)?;
                Err(Unwind::Return(value))
            }
            Statement::Let { name, value } => {
                let value = self.eval_expression(value)?;
                self.env.borrow_mut().set(name, value);
                Ok(NULL)
            }
            Statement::For {
                init,
                condition,
                post,
                body,
            } => self.eval_for_statement(init, condition, post, body),
        }
    }

    fn eval_block_statement(&mut self, statements: &[Statement]) -> Flow<Object> {
        let env = Environment::new_enclosed_environment(self.env.clone());
        self.in_environment(env, |evaluator| evaluator.eval_statements(statements))
    }

    fn eval_statements(&mut self, statements: &[Statement]) -> Flow<Object> {
        let mut result = NULL;
        for statement in statements {
            result = self.eval_statement(statement)?;
        }
        Ok(result)
    }

    fn eval_for_statement(
        &mut self,
        init: &Statement,
        condition: &Expression,
        post: &Statement,
        body: &Statement,
    ) -> Flow<Object> {
        let loop_env = Environment::new_enclosed_environment(self.env.clone());
        self.in_environment(loop_env, |evaluator| {
            evaluator.eval_statement(init)?;
            let mut iterations: u64 = 0;
            while evaluator.eval_expression(condition)?.is_truthy() {
                iterations += 1;
                trace!(iterations, "for-loop iteration");
                evaluator.eval_statement(body)?;
                evaluator.eval_statement(post)?;
            }
            Ok(NULL)
        })
    }

    fn eval_expression(&mut self, expression: &Expression) -> Flow<Object> {
        match expression {
            Expression::IntegerLiteral(value) => Ok(Object::Integer(*value)),
            Expression::FloatLiteral(value) => Ok(Object::Float(*value)),
            Expression::StringLiteral(value) => Ok(Object::String(value.clone())),
            Expression::BooleanLiteral(value) => Ok(self.native_bool_to_boolean_object(*value)),
            Expression::Prefix { operator, right } => {
                let right = self.eval_expression(right)?;
                Ok(self.eval_prefix_expression(operator, right)?)
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                Ok(self.eval_infix_expression(left, operator, right)?)
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.eval_if_expression(condition, consequence, alternative.as_deref()),
            Expression::Identifier(name) => Ok(self.eval_identifier_expression(name)?),
            Expression::FunctionLiteral { parameters, body } => Ok(Object::Function {
                parameters: parameters.clone(),
                body: Rc::clone(body),
                env: self.env.clone(),
            }),
            Expression::Call {
                function,
                arguments,
            } => self.eval_call_expression(function, arguments),
            Expression::ArrayLiteral(elements) => self.eval_array_literal(elements),
            Expression::HashLiteral(pairs) => self.eval_hash_literal(pairs),
            Expression::Index { left, index } => {
                let left = self.eval_expression(left)?;
                let index = self.eval_expression(index)?;
                Ok(self.eval_index_expression(left, index)?)
            }
            Expression::Assign { name, value } => {
                let value = self.eval_expression(value)?;
                self.env.borrow_mut().assign(name, value.clone())?;
                Ok(value)
            }
        }
    }

    fn eval_hash_literal(&mut self, pairs: &[(Expression, Expression)]) -> Flow<Object> {
        let mut hash = HashMap::new();
        for (key, value) in pairs {
            let key = hash_key(self.eval_expression(key)?)?;
            let value = self.eval_expression(value)?;
            hash.insert(key, value);
        }
        Ok(Object::Hash(hash))
    }

    fn eval_array_literal(&mut self, elements: &[Expression]) -> Flow<Object> {
        let elements = elements
            .iter()
            .map(|e| self.eval_expression(e))
            .collect::<Flow<Vec<Object>>>()?;
        Ok(Object::Array(elements))
    }

    fn eval_index_expression(&mut self, left: Object, index: Object) -> Result<Object> {
        match (left, index) {
            (Object::Array(elements), Object::Integer(index)) => Ok(usize::try_from(index)
                .ok()
                .and_then(|index| elements.get(index))
                .cloned()
                .unwrap_or(NULL)),
            (Object::Array(_), index) => {
                bail!("array index must be INTEGER, got {}", index.type_name())
            }
            (Object::Hash(hash), index) => {
                let index = hash_key(index)?;
                Ok(hash.get(&index).cloned().unwrap_or(NULL))
            }
            (left, _) => Err(anyhow!("index operator not supported: {}", left.type_name())),
        }
    }

    fn eval_call_expression(
        &mut self,
        function: &Expression,
        arguments: &[Expression],
    ) -> Flow<Object> {
        let function = self.eval_expression(function)?;
        let args = arguments
            .iter()
            .map(|arg| self.eval_expression(arg))
            .collect::<Flow<Vec<Object>>>()?;
        Ok(self.apply_function(function, args)?)
    }

    // A `return` inside the body stops here and becomes the call's value.
    fn apply_function(&mut self, function: Object, args: Vec<Object>) -> Result<Object> {
        match function {
            Object::Function {
                parameters,
                body,
                env,
            } => {
                if parameters.len() != args.len() {
                    bail!(
                        "wrong number of arguments: want={}, got={}",
                        parameters.len(),
                        args.len()
                    )
                }
                trace!(parameters = ?parameters, "calling function");
                let call_env = Environment::new_enclosed_environment(env);
                {
                    let mut scope = call_env.borrow_mut();
                    for (param, arg) in parameters.iter().zip(args) {
                        scope.set(param, arg);
                    }
                }
                let result = self.in_environment(call_env, |evaluator| match body.as_ref() {
                    Statement::Block(statements) => evaluator.eval_statements(statements),
                    statement => evaluator.eval_statement(statement),
                });
                match result {
                    Ok(value) | Err(Unwind::Return(value)) => Ok(value),
                    Err(Unwind::Error(err)) => Err(err),
                }
            }
            Object::BuiltInFunction { name, function } => {
                trace!(builtin = name, "calling builtin");
                function(args)
            }
            other => bail!("not a function: {}", other.type_name()),
        }
    }
    fn eval_prefix_expression(&mut self, operator: &Token, right: Object) -> Result<Object> {
        match operator {
            Token::Bang => Ok(self.native_bool_to_boolean_object(!right.is_truthy())),
            Token::Minus => self.eval_minus_prefix_operator_expression(right),
            _ => bail!("unknown operator: {}{}", operator, right.type_name()),
        }
    }

    fn eval_minus_prefix_operator_expression(&mut self, right: Object) -> Result<Object> {
        match right {
            Object::Integer(value) => value
                .checked_neg()
                .map(Object::Integer)
                .ok_or_else(|| anyhow!("integer overflow: -{}", value)),
            Object::Float(value) => Ok(Object::Float(-value)),
            _ => Err(anyhow!("unknown operator: -{}", right.type_name())),
        }
    }

    fn eval_infix_expression(
        &mut self,
        left: Object,
        operator: &Token,
        right: Object,
    ) -> Result<Object> {
        match (left, right) {
            (Object::Integer(left), Object::Integer(right)) => {
                self.eval_integer_infix_expression(left, operator, right)
            }
            (Object::Integer(left), Object::Float(right)) => {
                self.eval_float_infix_expression(left as f64, operator, right)
            }
            (Object::Float(left), Object::Integer(right)) => {
                self.eval_float_infix_expression(left, operator, right as f64)
            }
            (Object::Float(left), Object::Float(right)) => {
                self.eval_float_infix_expression(left, operator, right)
            }
            (Object::Boolean(left), Object::Boolean(right)) => {
                self.eval_boolean_infix_expression(left, operator, right)
            }
            (Object::String(left), Object::String(right)) => {
                self.eval_string_infix_expression(left, operator, right)
            }
            (Object::Null, Object::Null) => match operator {
                Token::Eq => Ok(TRUE),
                Token::NotEq => Ok(FALSE),
                _ => Err(anyhow!("unknown operator: NULL {} NULL", operator)),
            },
            (left, right) if left.type_name() == right.type_name() => Err(anyhow!(
                "unknown operator: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
            (left, right) => Err(anyhow!(
                "type mismatch: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        }
    }

    fn eval_integer_infix_expression(
        &mut self,
        left: i64,
        operator: &Token,
        right: i64,
    ) -> Result<Object> {
        let value = match operator {
            Token::Plus => left.checked_add(right),
            Token::Minus => left.checked_sub(right),
            Token::Asterisk => left.checked_mul(right),
            Token::Slash => {
                if right == 0 {
                    bail!("division by zero: {} / {}", left, right);
                }
                left.checked_div(right)
            }
            Token::Percent => {
                if right == 0 {
                    bail!("modulo by zero: {} % {}", left, right);
                }
                left.checked_rem(right)
            }
            Token::Ampersand => Some(left & right),
            Token::Pipe => Some(left | right),
            Token::Lt => return Ok(self.native_bool_to_boolean_object(left < right)),
            Token::LtEq => return Ok(self.native_bool_to_boolean_object(left <= right)),
            Token::Gt => return Ok(self.native_bool_to_boolean_object(left > right)),
            Token::GtEq => return Ok(self.native_bool_to_boolean_object(left >= right)),
            Token::Eq => return Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => return Ok(self.native_bool_to_boolean_object(left != right)),
            _ => bail!("unknown operator: INTEGER {} INTEGER", operator),
        };
        value
            .map(Object::Integer)
            .ok_or_else(|| anyhow!("integer overflow: {} {} {}", left, operator, right))
    }

    fn eval_float_infix_expression(
        &mut self,
        left: f64,
        operator: &Token,
        right: f64,
    ) -> Result<Object> {
        match operator {
            Token::Plus => Ok(Object::Float(left + right)),
            Token::Minus => Ok(Object::Float(left - right)),
            Token::Asterisk => Ok(Object::Float(left * right)),
            Token::Slash if right == 0.0 => bail!("division by zero: {:?} / {:?}", left, right),
            Token::Slash => Ok(Object::Float(left / right)),
            Token::Percent if right == 0.0 => bail!("modulo by zero: {:?} % {:?}", left, right),
            Token::Percent => Ok(Object::Float(left % right)),
            Token::Lt => Ok(self.native_bool_to_boolean_object(left < right)),
            Token::LtEq => Ok(self.native_bool_to_boolean_object(left <= right)),
            Token::Gt => Ok(self.native_bool_to_boolean_object(left > right)),
            Token::GtEq => Ok(self.native_bool_to_boolean_object(left >= right)),
            Token::Eq => Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => Ok(self.native_bool_to_boolean_object(left != right)),
            _ => Err(anyhow!("unknown operator: FLOAT {} FLOAT", operator)),
        }
    }

    fn eval_boolean_infix_expression(
        &mut self,
        left: bool,
        operator: &Token,
        right: bool,
    ) -> Result<Object> {
        match operator {
            Token::Eq => Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => Ok(self.native_bool_to_boolean_object(left != right)),
            Token::And => Ok(self.native_bool_to_boolean_object(left && right)),
            Token::Or => Ok(self.native_bool_to_boolean_object(left || right)),
            _ => Err(anyhow!("unknown operator: BOOLEAN {} BOOLEAN", operator)),
        }
    }

    fn eval_string_infix_expression(
        &mut self,
        left: String,
        operator: &Token,
        right: String,
    ) -> Result<Object> {
        match operator {
            Token::Plus => Ok(Object::String(left + &right)),
            Token::Eq => Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => Ok(self.native_bool_to_boolean_object(left != right)),
            _ => Err(anyhow!("unknown operator: STRING {} STRING", operator)),
        }
    }

    fn native_bool_to_boolean_object(&self, input: bool) -> Object {
        if input {
            TRUE
        } else {
            FALSE
        }
    }

    fn eval_if_expression(
        &mut self,
        condition: &Expression,
        consequence: &Statement,
        alternative: Option<&Statement>,
    ) -> Flow<Object> {
        let condition = self.eval_expression(condition)?;
        if condition.is_truthy() {
            self.eval_statement(consequence)
        } else if let Some(alternative) = alternative {
            self.eval_statement(alternative)
        } else {
            Ok(NULL)
        }
    }

    fn eval_identifier_expression(&mut self, name: &str) -> Result<Object> {
        if let Some(value) = self.env.borrow().get(name) {
            return Ok(value);
        }
        Builtins::lookup(name).ok_or_else(|| anyhow!("identifier not found: {}", name))
    }
}

fn hash_key(key: Object) -> Result<Object> {
    if !key.hashable() {
        bail!("unusable as hash key: {}", key.type_name())
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    #[test]
    fn test_fibonacci() {
        let input = r#"
        let fibonacci = fn(x) {
            if (x == 0) {
                0
            } else {
                if (x == 1) {
                    1
                } else {
                    fibonacci(x - 1) + fibonacci(x - 2);
                }
            }
        };
        fibonacci(10);
        "#;
        let evaluated = test_eval(input).unwrap();
        assert_eq!(evaluated, Object::Integer(55));
    }

    #[test]
    fn test_eval_integer_expression() {
        let tests = vec![
            ("5", 5),
            ("-10", -10),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("-50 + 100 + -50", 0),
            ("5 + 2 * 10", 25),
            ("20 + 2 * -10", 0),
            ("50 / 2 * 2 + 10", 60),
            ("2 * (5 + 10)", 30),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
            ("7 / 2", 3),
            ("-7 / 2", -3),
            ("7 % 3", 1),
            ("-7 % 3", -1),
            ("7 % -3", 1),
            ("6 & 3", 2),
            ("6 | 3", 7),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, Object::Integer(expected), "{input}");
        }
    }

    #[test]
    fn test_division_matches_truncation() {
        let operands = [-9i64, -4, -1, 1, 3, 7, 10];
        for a in operands {
            for b in operands {
                let quotient = test_eval(&format!("{a} / {b}")).unwrap();
                let remainder = test_eval(&format!("{a} % {b}")).unwrap();
                assert_eq!(quotient, Object::Integer(a / b));
                assert_eq!(remainder, Object::Integer(a % b));
            }
        }
    }

    #[test]
    fn test_eval_float_expression() {
        let tests = vec![
            ("1.5", 1.5),
            ("-2.5", -2.5),
            ("1.5 + 1.5", 3.0),
            ("1 + 0.5", 1.5),
            ("0.5 * 4", 2.0),
            ("7.0 / 2", 3.5),
            ("7.5 % 2", 1.5),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, Object::Float(expected), "{input}");
        }
    }

    #[test]
    fn test_eval_boolean_expression() {
        let tests = vec![
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 <= 1", true),
            ("2 >= 3", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("1 == 1.0", true),
            ("1.5 > 1", true),
            ("true == true", true),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 > 2) == false", true),
            (r#""a" == "a""#, true),
            (r#""a" != "b""#, true),
            ("true && false", false),
            ("true && true", true),
            ("false || true", true),
            ("false || false", false),
            ("1 < 2 && 2 < 3", true),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, Object::Boolean(expected), "{input}");
        }
    }

    #[test]
    fn test_null_equality() {
        let tests = vec![
            ("if (false) { 1 } == if (false) { 2 }", true),
            ("first([]) != first([])", false),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, Object::Boolean(expected), "{input}");
        }
    }

    #[test]
    fn test_bang_operator() {
        let tests = vec![
            ("!true", false),
            ("!false", true),
            ("!5", false),
            ("!0", false),
            ("!!true", true),
            ("!!5", true),
            ("!first([])", true),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, Object::Boolean(expected), "{input}");
        }
    }

    #[test]
    fn test_if_else_expressions() {
        let tests = vec![
            ("if (true) { 10 }", Object::Integer(10)),
            ("if (false) { 10 }", Object::Null),
            ("if (1) { 10 }", Object::Integer(10)),
            ("if (0) { 10 } else { 20 }", Object::Integer(10)),
            ("if (1 > 2) { 10 }", Object::Null),
            ("if (1 > 2) { 10 } else { 20 }", Object::Integer(20)),
            ("if (1 < 2) { 10 } else { 20 }", Object::Integer(10)),
            ("let x = if (true) { 1 } else { 2 }; x * 3", Object::Integer(3)),
            ("if (true) { }", Object::Null),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }
    }

    #[test]
    fn test_return_statements() {
        let tests = vec![
            ("return 10;", Object::Integer(10)),
            ("return 10; 9;", Object::Integer(10)),
            ("return 2 * 5; 9;", Object::Integer(10)),
            ("9; return 2 * 5; 9;", Object::Integer(10)),
            (
                r#"
                if (10 > 1) {
                    if (10 > 1) {
                        return 10;
                    }
                    return 1;
                }
                "#,
                Object::Integer(10),
            ),
            (r#"9; return if(true) { 10 };"#, Object::Integer(10)),
            (
                r#"
                let f = fn() {
                    for (let i = 0; i < 10; i = i + 1) {
                        if (i == 3) { return i; }
                    }
                    return -1;
                };
                f();
                "#,
                Object::Integer(3),
            ),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected);
        }
    }

    #[test]
    fn test_return_unwinds_through_expressions() {
        let tests = vec![
            (
                "let f = fn() { let a = [if (true) { return 1 } else { 0 }]; 99 }; f()",
                1,
            ),
            (
                "let g = fn(x) { x }; let f = fn() { g(if (true) { return 2 } else { 0 }); 99 }; f()",
                2,
            ),
            ("fn() { 1 + if (true) { return 3 } else { 0 } }()", 3),
            ("fn() { -if (true) { return 4 } else { 0 } }()", 4),
            (
                r#"fn() { {"a": if (true) { return 5 } else { 0 }}; 99 }()"#,
                5,
            ),
            (
                "fn() { let h = {if (true) { return 6 } else { 0 }: 1}; 99 }()",
                6,
            ),
            ("fn() { [1, 2][if (true) { return 7 } else { 0 }]; 99 }()", 7),
            (
                "fn() { let x = 0; x = if (true) { return 8 } else { 0 }; 99 }()",
                8,
            ),
            (
                "fn() { if (if (true) { return 9 } else { false }) { 1 } else { 2 }; 99 }()",
                9,
            ),
            (
                "fn() { for (let i = 0; if (true) { return 10 } else { false }; i = i + 1) { } 99 }()",
                10,
            ),
            ("fn() { { { return 11; } } 99 }()", 11),
            (
                "let f = fn() { let g = fn() { return 1; 50 }; g() + 11 }; f()",
                12,
            ),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, Object::Integer(expected), "{input}");
        }
    }

    #[test]
    fn test_error_handling() {
        let tests = vec![
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            ("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN"),
            (
                "if (10 > 1) { true + false; }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            ("foobar", "identifier not found: foobar"),
            (r#""Hello" - "World""#, "unknown operator: STRING - STRING"),
            (r#""a" < "b""#, "unknown operator: STRING < STRING"),
            (r#"1 == "1""#, "type mismatch: INTEGER == STRING"),
            ("1 && true", "type mismatch: INTEGER && BOOLEAN"),
            ("1 || 0", "unknown operator: INTEGER || INTEGER"),
            ("[1] + [2]", "unknown operator: ARRAY + ARRAY"),
            ("5 / 0", "division by zero: 5 / 0"),
            ("5 % 0", "modulo by zero: 5 % 0"),
            ("1.5 / 0", "division by zero: 1.5 / 0.0"),
            ("9223372036854775807 + 1", "integer overflow: 9223372036854775807 + 1"),
            (r#"len(1)"#, "argument to `len` not supported, got INTEGER"),
            (
                r#"len("one", "two")"#,
                "wrong number of arguments for len: want=1, got=2",
            ),
            (
                r#"{fn(x) { x }: "Monkey"};"#,
                "unusable as hash key: FUNCTION",
            ),
            (
                r#"{"name": "Monkey"}[fn(x) { x }];"#,
                "unusable as hash key: FUNCTION",
            ),
            (r#"[1, 2]["0"]"#, "array index must be INTEGER, got STRING"),
            ("5[0]", "index operator not supported: INTEGER"),
            ("let f = fn(a, b) { a }; f(1)", "wrong number of arguments: want=2, got=1"),
            ("5(1)", "not a function: INTEGER"),
            ("x = 1", "cannot assign to undeclared identifier: x"),
            (
                "let f = fn() { undefined + 1 }; let y = 2; f(); y",
                "identifier not found: undefined",
            ),
            (
                "for (let i = 0; i < 3; i = i + 1) { if (i == 1) { i + true } }",
                "type mismatch: INTEGER + BOOLEAN",
            ),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input);
            match evaluated {
                Ok(value) => panic!("no error returned for {}, got {}", input, value),
                Err(error) => assert_eq!(error.to_string(), expected),
            }
        }
    }

    #[test]
    fn test_let_statements() {
        let tests = vec![
            ("let a = 5; a;", Object::Integer(5)),
            ("let a = 5 * 5; a;", Object::Integer(25)),
            ("let a = 5; let b = a; b;", Object::Integer(5)),
            (
                "let a = 5; let b = a; let c = a + b + 5; c;",
                Object::Integer(15),
            ),
            ("a := 5; a + 1", Object::Integer(6)),
            ("let a = 1; a = a + 1; a", Object::Integer(2)),
            ("let a = 1; a = 7", Object::Integer(7)),
            ("let a = 1; let b = 1; a = b = 3; a + b", Object::Integer(6)),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }
    }

    #[test]
    fn test_block_scoping() {
        let tests = vec![
            ("let x = 1; if (true) { let x = 2; } x", Object::Integer(1)),
            ("let x = 1; if (true) { x = 2; } x", Object::Integer(2)),
            ("let x = 1; if (true) { let x = 2; x } else { 0 }", Object::Integer(2)),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }

        let err = test_eval("if (true) { let y = 2; } y").unwrap_err();
        assert_eq!(err.to_string(), "identifier not found: y");
    }

    #[test]
    fn test_function_values_share_body() {
        let evaluated = test_eval("let make = fn() { fn(x) { x } }; [make(), make()]").unwrap();
        match evaluated {
            Object::Array(functions) => match (&functions[0], &functions[1]) {
                (Object::Function { body: a, .. }, Object::Function { body: b, .. }) => {
                    assert!(Rc::ptr_eq(a, b));
                }
                other => panic!("expected two functions, got {:?}", other),
            },
            other => panic!("expected array, got {}", other),
        }
    }

    #[test]
    fn test_standalone_blocks() {
        let tests = vec![
            ("let x = 1; { let x = 2; x; } x", Object::Integer(1)),
            ("let x = 1; { x = 2; } x", Object::Integer(2)),
            ("{ let y = 5; y * 2 }", Object::Integer(10)),
            ("let x = 1; { x }", Object::Integer(1)),
            ("{ }", Object::Hash(HashMap::new())),
            ("{ { 3 } }", Object::Integer(3)),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }

        let err = test_eval("{ let z = 1; } z").unwrap_err();
        assert_eq!(err.to_string(), "identifier not found: z");
    }

    #[test]
    fn test_function_objects() {
        let evaluated = test_eval("fn(x) { x + 2; };").unwrap();
        let expected = Object::Function {
            parameters: vec!["x".to_string()],
            body: Rc::new(Statement::Block(vec![Statement::Expression(
                Expression::Infix {
                    left: Box::new(Expression::Identifier("x".to_string())),
                    operator: Token::Plus,
                    right: Box::new(Expression::IntegerLiteral(2)),
                },
            )])),
            env: Environment::new(),
        };
        assert_eq!(evaluated, expected);
        assert_eq!(evaluated.to_string(), "fn(x) { (x + 2) }");
    }

    #[test]
    fn test_function_application() {
        let tests = vec![
            (
                "let identity = fn(x) { x; }; identity(5);",
                Object::Integer(5),
            ),
            (
                "let identity = fn(x) { return x; }; identity(5);",
                Object::Integer(5),
            ),
            (
                "let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));",
                Object::Integer(20),
            ),
            ("fn(x) { x; }(5)", Object::Integer(5)),
            ("fn() { }()", Object::Null),
            (
                "let i = 5; let inc = fn(i) { i + 1; }; inc(i); i;",
                Object::Integer(5),
            ),
            (
                "let double_add = fn (x) { fn (y) { x + y; }; }; double_add(5)(5);",
                Object::Integer(10),
            ),
            (
                "let add = fn (fun) { fun() + fun(); } let fun = fn () { 5; }; add(fun);",
                Object::Integer(10),
            ),
            (
                "let apply = fn(f, x) { f(x) }; apply(len, \"four\")",
                Object::Integer(4),
            ),
            (
                "let concat = fn (x) { fn (y) { x + y; }; }; concat(\"Hello \")(\"World!\");",
                Object::String("Hello World!".to_string()),
            ),
            (
                "let len = fn(x) { 42 }; len(\"abc\")",
                Object::Integer(42),
            ),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }
    }

    #[test]
    fn test_closures_share_environment() {
        let input = r#"
        let counter = fn() {
            let n = 0;
            return fn() { n = n + 1; return n; };
        }();
        let first = counter();
        let second = counter();
        [first, second];
        "#;
        let evaluated = test_eval(input).unwrap();
        assert_eq!(
            evaluated,
            Object::Array(vec![Object::Integer(1), Object::Integer(2)])
        );

        let input = r#"
        let x = 1;
        let get = fn() { x };
        x = 10;
        get();
        "#;
        assert_eq!(test_eval(input).unwrap(), Object::Integer(10));
    }

    #[test]
    fn test_for_loops() {
        let tests = vec![
            (
                "let sum = 0; for (let i = 0; i < 5; i = i + 1) { sum = sum + i; } sum",
                Object::Integer(10),
            ),
            (
                "let sum = 0; for (i := 1; i <= 3; i = i + 1) { sum = sum * 10 + i } sum",
                Object::Integer(123),
            ),
            ("for (let i = 0; false; i = i + 1) { 1 }", Object::Null),
            (
                "let ran = false; for (let i = 0; i > 0; i = i + 1) { ran = true; } ran",
                Object::Boolean(false),
            ),
            ("for (let i = 0; i < 3; i = i + 1) { i }", Object::Null),
            (
                "let arr = []; for (let i = 0; i < 3; i = i + 1) { let sq = i * i; arr = push(arr, sq); } arr",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Integer(4),
                ]),
            ),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }

        let err = test_eval("for (let i = 0; i < 1; i = i + 1) { } i").unwrap_err();
        assert_eq!(err.to_string(), "identifier not found: i");
    }

    #[test]
    fn test_string_concatenation() {
        let evaluated = test_eval(r#""Hello" + " " + "World!""#).unwrap();
        assert_eq!(evaluated, Object::String("Hello World!".to_string()));
    }

    #[test]
    fn test_array_literals() {
        let evaluated = test_eval("[1 + 2, 3 * 4, \"x\", 1.5]").unwrap();
        assert_eq!(
            evaluated,
            Object::Array(vec![
                Object::Integer(3),
                Object::Integer(12),
                Object::String("x".to_string()),
                Object::Float(1.5),
            ])
        );
    }

    #[test]
    fn test_array_index_expressions() {
        let tests = vec![
            ("[1, 2, 3][0]", Object::Integer(1)),
            ("[1, 2, 3][2]", Object::Integer(3)),
            ("let i = 0; [1][i];", Object::Integer(1)),
            ("[1, 2, 3][1 + 1];", Object::Integer(3)),
            (
                "let myArray = [1, 2, 3]; let i = myArray[0]; myArray[i]",
                Object::Integer(2),
            ),
            ("[1, 2, 3][3]", Object::Null),
            ("[1, 2, 3][-1]", Object::Null),
            ("[][0]", Object::Null),
        ];

        for (input, expected) in tests {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }
    }

    #[test]
    fn test_hash_literals() {
        let evaluated = test_eval(
            r#"{"one": 5 + 5, "thr" + "ee": 6 / 2, 4: 4, true: 5, false: 6 }"#,
        )
        .unwrap();
        let expected = Object::Hash(
            vec![
                (Object::String("one".to_string()), Object::Integer(10)),
                (Object::String("three".to_string()), Object::Integer(3)),
                (Object::Integer(4), Object::Integer(4)),
                (Object::Boolean(true), Object::Integer(5)),
                (Object::Boolean(false), Object::Integer(6)),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(evaluated, expected);
    }

    #[test]
    fn test_hash_indexing() {
        let cases = vec![
            (r#"{"foo": 5}["foo"]"#, Object::Integer(5)),
            (r#"{"foo": 5}["bar"]"#, Object::Null),
            (r#"let key = "foo"; {"foo": 5}[key]"#, Object::Integer(5)),
            (r#"{}["foo"]"#, Object::Null),
            (r#"{5: 5}[5]"#, Object::Integer(5)),
            (r#"{true: 5}[true]"#, Object::Integer(5)),
            (r#"{"1": 5}[1]"#, Object::Null),
        ];
        for (input, expected) in cases {
            let evaluated = test_eval(input).unwrap();
            assert_eq!(evaluated, expected, "{input}");
        }
    }

    #[test]
    fn test_builtin_functions() {
        let tests = vec![
            (r#"len("")"#, Object::Integer(0)),
            (r#"len("hello world")"#, Object::Integer(11)),
            (r#"len([1, 2, 3])"#, Object::Integer(3)),
            (r#"min(3, 9)"#, Object::Integer(3)),
            (r#"max(3, 9)"#, Object::Integer(9)),
            (r#"first([1, 2, 3])"#, Object::Integer(1)),
            (r#"last([1, 2, 3])"#, Object::Integer(3)),
            (r#"rest([])"#, Object::Null),
            (r#"push([], 1)"#, Object::Array(vec![Object::Integer(1)])),
            (r#"includes("nutlang", "lang")"#, Object::Boolean(true)),
            (r#"trim("  x  ", " ")"#, Object::String("x".to_string())),
            (r#"len(split("a,b,c", ","))"#, Object::Integer(3)),
            (r#"puts("hi")"#, Object::Null),
        ];
        for (case, expected) in tests {
            let evaluated = test_eval(case).unwrap();
            assert_eq!(evaluated, expected, "{case}");
        }
    }

    #[test]
    fn test_builtins_do_not_alias() {
        let input = "let a = [1, 2]; let b = push(a, 3); let c = pop(a); [a, b, c]";
        let evaluated = test_eval(input).unwrap();
        assert_eq!(
            evaluated,
            Object::Array(vec![
                Object::Array(vec![Object::Integer(1), Object::Integer(2)]),
                Object::Array(vec![
                    Object::Integer(1),
                    Object::Integer(2),
                    Object::Integer(3),
                ]),
                Object::Array(vec![Object::Integer(1)]),
            ])
        );
    }

    fn test_eval(input: &str) -> Result<Object> {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);
        let program = parser.parse_program().unwrap();
        let mut evaluator = Evaluator::new();
        evaluator.eval(&program)
    }
}
