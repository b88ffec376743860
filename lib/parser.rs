use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use tracing::debug;

use crate::{
    ast::{Expression, Program, Statement},
    lexer::Lexer,
    token::Token,
};

#[derive(Debug, Clone, PartialOrd, PartialEq, Eq, Ord)]
enum Precedence {
    Lowest,
    Assign,
    Logical,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

impl Precedence {
    fn from_token(token: Token) -> Self {
        match token {
            Token::Assign => Precedence::Assign,
            Token::And | Token::Or => Precedence::Logical,
            Token::Eq | Token::NotEq => Precedence::Equals,
            Token::Lt | Token::LtEq | Token::Gt | Token::GtEq => Precedence::LessGreater,
            Token::Plus | Token::Minus | Token::Ampersand | Token::Pipe => Precedence::Sum,
            Token::Asterisk | Token::Slash | Token::Percent => Precedence::Product,
            Token::Lparen => Precedence::Call,
            Token::Lbracket => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }
}

pub struct Parser {
    lexer: Lexer,
    cur_token: Option<Token>,
    peek_token: Option<Token>,
    // Unclosed `{` up to and including `cur_token`.
    depth: usize,
    errors: Vec<anyhow::Error>,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let mut parser = Self {
            cur_token: lexer.next_token(),
            peek_token: lexer.next_token(),
            lexer,
            depth: 0,
            errors: Vec::new(),
        };
        parser.track_depth();
        parser
    }

    /// Parses the whole input. Every broken statement is reported; a program
    /// with any error is never handed back.
    pub fn parse_program(&mut self) -> std::result::Result<Program, Vec<anyhow::Error>> {
        let mut statements: Vec<Statement> = Vec::new();
        while let Some(token) = self.cur_token() {
            let depth = self.depth - usize::from(token.variant_eq(Token::Lbrace));
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(err) => {
                    debug!(error = %err, "parse error");
                    self.errors.push(err);
                    self.skip_statement(depth);
                }
            }
            self.next_token();
        }

        if self.errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn cur_token(&mut self) -> Option<Token> {
        self.cur_token.clone()
    }

    fn peek_token(&mut self) -> Option<Token> {
        self.peek_token.clone()
    }

    fn next_token(&mut self) -> &mut Self {
        self.cur_token = self.peek_token();
        self.peek_token = self.lexer.next_token();
        self.track_depth();
        self
    }

    fn track_depth(&mut self) {
        match self.cur_token {
            Some(Token::Lbrace) => self.depth += 1,
            Some(Token::Rbrace) => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
    }

    /// Moves to the `;` or `}` that ends the broken statement, ignoring any
    /// that belong to blocks nested deeper than `depth`.
    fn skip_statement(&mut self, depth: usize) {
        while let Some(token) = self.cur_token() {
            match token {
                Token::Semicolon if self.depth <= depth => return,
                Token::Rbrace if self.depth <= depth => {
                    self.skip_optional_semicolon();
                    return;
                }
                _ => {
                    self.next_token();
                }
            }
        }
    }

    fn peek_is(&mut self, token: Token) -> bool {
        self.peek_token()
            .is_some_and(|peek| peek.variant_eq(token))
    }

    fn peek_precedence(&mut self) -> Precedence {
        self.peek_token()
            .map_or(Precedence::Lowest, Precedence::from_token)
    }

    fn cur_precedence(&mut self) -> Result<Precedence> {
        Ok(Precedence::from_token(
            self.cur_token().ok_or(anyhow!("unexpected end of input"))?,
        ))
    }

    fn expect_peek(&mut self, exp_token: Token) -> Result<()> {
        match self.peek_token() {
            Some(peek_token) if peek_token.variant_eq(exp_token.clone()) => {
                self.next_token();
                Ok(())
            }
            Some(peek_token) => {
                bail!("expected next token to be {exp_token}, found {peek_token}")
            }
            None => bail!("expected next token to be {exp_token}, found end of input"),
        }
    }

    fn skip_optional_semicolon(&mut self) {
        if self.peek_is(Token::Semicolon) {
            self.next_token();
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.cur_token().ok_or(anyhow!("unexpected end of input"))? {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            Token::For => self.parse_for_statement(),
            Token::Lbrace => self.parse_brace_statement(),
            Token::Ident(name) if self.peek_is(Token::Bind) => self.parse_bind_statement(name),
            _ => self.parse_expression_statement(),
        }
    }

    // A statement-level `{` opens a block unless its first expression is
    // followed by `:`, which makes it a hash literal. `{}` is an empty hash.
    fn parse_brace_statement(&mut self) -> Result<Statement> {
        if self.peek_is(Token::Rbrace) {
            return self.parse_expression_statement();
        }

        self.next_token();

        let starts_statement = match self.cur_token() {
            Some(Token::Let | Token::Return | Token::For | Token::Lbrace) => true,
            Some(Token::Ident(_)) => self.peek_is(Token::Bind),
            _ => false,
        };
        if starts_statement {
            let block = self.parse_block_rest(Vec::new())?;
            self.skip_optional_semicolon();
            return Ok(block);
        }

        let first = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(Token::Colon) {
            let pair = self.parse_hash_pair(first)?;
            let hash = self.parse_hash_pairs(vec![pair])?;
            let expression = self.parse_infix_expressions(hash, Precedence::Lowest)?;
            self.skip_optional_semicolon();
            return Ok(Statement::Expression(expression));
        }

        self.skip_optional_semicolon();
        self.next_token();
        let block = self.parse_block_rest(vec![Statement::Expression(first)])?;
        self.skip_optional_semicolon();
        Ok(block)
    }

    fn parse_let_statement(&mut self) -> Result<Statement> {
        let name = match self
            .next_token()
            .cur_token()
            .ok_or(anyhow!("expected identifier, found end of input"))?
        {
            Token::Ident(value) => value,
            token => bail!("expected identifier, found {token}"),
        };

        self.expect_peek(Token::Assign)?;

        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        self.skip_optional_semicolon();

        Ok(Statement::Let { name, value })
    }

    fn parse_bind_statement(&mut self, name: String) -> Result<Statement> {
        self.next_token();
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        self.skip_optional_semicolon();

        Ok(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        self.skip_optional_semicolon();

        Ok(Statement::Return(value))
    }

    fn parse_for_statement(&mut self) -> Result<Statement> {
        self.expect_peek(Token::Lparen)?;
        self.next_token();

        let init = self.parse_statement()?;

        match self.cur_token() {
            Some(Token::Semicolon) => {}
            Some(token) => bail!("expected ; after for-loop initializer, found {token}"),
            None => bail!("expected ; after for-loop initializer, found end of input"),
        }

        self.next_token();

        let condition = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(Token::Semicolon)?;
        self.next_token();

        let post = self.parse_statement()?;

        self.expect_peek(Token::Rparen)?;
        self.expect_peek(Token::Lbrace)?;

        let body = self.parse_block_statement()?;

        Ok(Statement::For {
            init: Box::new(init),
            condition,
            post: Box::new(post),
            body: Box::new(body),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;

        self.skip_optional_semicolon();

        Ok(Statement::Expression(expression))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression> {
        let cur_token = self.cur_token().ok_or(anyhow!("unexpected end of input"))?;

        let mut left_exp = match cur_token.clone() {
            Token::Ident(value) => Expression::Identifier(value),
            Token::Int(value) => self.parse_integer_literal(value)?,
            Token::Float(value) => self.parse_float_literal(value)?,
            Token::String(value) => Expression::StringLiteral(value),
            Token::True => Expression::BooleanLiteral(true),
            Token::False => Expression::BooleanLiteral(false),
            Token::Bang | Token::Minus => self.parse_prefix_expression(cur_token)?,
            Token::Lparen => self.parse_grouped_expression()?,
            Token::Lbracket => self.parse_array_literal()?,
            Token::Lbrace => self.parse_hash_literal()?,
            Token::If => self.parse_if_expression()?,
            Token::Function => self.parse_function_literal()?,
            Token::Illegal(value) => bail!("illegal token {value}"),
            token => bail!("no prefix parse function for {token}"),
        };

        self.parse_infix_expressions(left_exp, precedence)
    }

    fn parse_infix_expressions(
        &mut self,
        mut left_exp: Expression,
        precedence: Precedence,
    ) -> Result<Expression> {
        while self
            .peek_token()
            .is_some_and(|token| !token.variant_eq(Token::Semicolon))
            && precedence < self.peek_precedence()
        {
            match self.peek_token().ok_or(anyhow!("unexpected end of input"))? {
                Token::Plus
                | Token::Minus
                | Token::Asterisk
                | Token::Slash
                | Token::Percent
                | Token::Ampersand
                | Token::Pipe
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::LtEq
                | Token::Gt
                | Token::GtEq
                | Token::And
                | Token::Or => {
                    self.next_token();
                    left_exp = self.parse_infix_expression(left_exp)?;
                }
                Token::Assign => {
                    self.next_token();
                    left_exp = self.parse_assign_expression(left_exp)?;
                }
                Token::Lparen => {
                    self.next_token();
                    left_exp = self.parse_call_expression(left_exp)?;
                }
                Token::Lbracket => {
                    self.next_token();
                    left_exp = self.parse_index_expression(left_exp)?;
                }
                _ => return Ok(left_exp),
            };
        }

        Ok(left_exp)
    }

    fn parse_prefix_expression(&mut self, token: Token) -> Result<Expression> {
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Ok(Expression::Prefix {
            operator: token,
            right: Box::new(right),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Result<Expression> {
        let token = self.cur_token().ok_or(anyhow!("unexpected end of input"))?;
        let precedence = self.cur_precedence()?;
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Ok(Expression::Infix {
            left: Box::new(left),
            operator: token,
            right: Box::new(right),
        })
    }

    // Right-associative: the value is parsed from the lowest floor.
    fn parse_assign_expression(&mut self, target: Expression) -> Result<Expression> {
        let name = match target {
            Expression::Identifier(name) => name,
            other => bail!("invalid assignment target: {other}"),
        };
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Expression::Assign {
            name,
            value: Box::new(value),
        })
    }

    fn parse_integer_literal(&mut self, literal: String) -> Result<Expression> {
        let value = literal
            .parse::<i64>()
            .map_err(|err| anyhow!("could not parse {literal} as integer: {err}"))?;
        Ok(Expression::IntegerLiteral(value))
    }

    fn parse_float_literal(&mut self, literal: String) -> Result<Expression> {
        let value = literal
            .parse::<f64>()
            .map_err(|err| anyhow!("could not parse {literal} as float: {err}"))?;
        Ok(Expression::FloatLiteral(value))
    }

    fn parse_grouped_expression(&mut self) -> Result<Expression> {
        self.next_token();
        let exp = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(Token::Rparen)?;
        Ok(exp)
    }

    fn parse_if_expression(&mut self) -> Result<Expression> {
        self.expect_peek(Token::Lparen)?;

        self.next_token();

        let condition = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(Token::Rparen)?;

        self.expect_peek(Token::Lbrace)?;

        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_is(Token::Else) {
            self.next_token();
            self.expect_peek(Token::Lbrace)?;
            Some(Box::new(self.parse_block_statement()?))
        } else {
            None
        };

        Ok(Expression::If {
            condition: Box::new(condition),
            consequence: Box::new(consequence),
            alternative,
        })
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        let elements = self.parse_expression_list(Token::Rbracket)?;

        Ok(Expression::ArrayLiteral(elements))
    }

    fn parse_hash_literal(&mut self) -> Result<Expression> {
        self.parse_hash_pairs(Vec::new())
    }

    fn parse_hash_pairs(
        &mut self,
        mut pairs: Vec<(Expression, Expression)>,
    ) -> Result<Expression> {
        while self
            .peek_token()
            .is_some_and(|token| !token.variant_eq(Token::Rbrace))
        {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            pairs.push(self.parse_hash_pair(key)?);
        }

        self.expect_peek(Token::Rbrace)?;

        Ok(Expression::HashLiteral(pairs))
    }

    fn parse_hash_pair(&mut self, key: Expression) -> Result<(Expression, Expression)> {
        self.expect_peek(Token::Colon)?;
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        if !self.peek_is(Token::Rbrace) {
            self.expect_peek(Token::Comma)?;
        }
        Ok((key, value))
    }

    fn parse_function_literal(&mut self) -> Result<Expression> {
        self.expect_peek(Token::Lparen)?;

        let parameters = self.parse_function_parameters()?;

        self.expect_peek(Token::Lbrace)?;

        let body = self.parse_block_statement()?;

        Ok(Expression::FunctionLiteral {
            parameters,
            body: Rc::new(body),
        })
    }

    fn parse_function_parameters(&mut self) -> Result<Vec<String>> {
        let mut parameters: Vec<String> = Vec::new();

        if self.peek_is(Token::Rparen) {
            self.next_token();
            return Ok(parameters);
        }

        self.next_token();
        parameters.push(self.parse_parameter()?);

        while self.peek_is(Token::Comma) {
            self.next_token();
            self.next_token();
            parameters.push(self.parse_parameter()?);
        }

        self.expect_peek(Token::Rparen)?;

        Ok(parameters)
    }

    fn parse_parameter(&mut self) -> Result<String> {
        match self.cur_token() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => bail!("expected parameter name, found {token}"),
            None => bail!("expected parameter name, found end of input"),
        }
    }

    fn parse_expression_list(&mut self, end_token: Token) -> Result<Vec<Expression>> {
        let mut expressions: Vec<Expression> = Vec::new();

        if self.peek_is(end_token.clone()) {
            self.next_token();
            return Ok(expressions);
        }

        self.next_token();

        expressions.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(Token::Comma) {
            self.next_token();
            self.next_token();
            expressions.push(self.parse_expression(Precedence::Lowest)?);
        }

        self.expect_peek(end_token)?;

        Ok(expressions)
    }

    fn parse_block_statement(&mut self) -> Result<Statement> {
        self.next_token();
        self.parse_block_rest(Vec::new())
    }

    fn parse_block_rest(&mut self, mut statements: Vec<Statement>) -> Result<Statement> {
        while self
            .cur_token()
            .is_some_and(|token| !token.variant_eq(Token::Rbrace))
        {
            let statement = self.parse_statement()?;
            statements.push(statement);
            self.next_token();
        }

        if self.cur_token().is_none() {
            bail!("expected }}, found end of input");
        }

        Ok(Statement::Block(statements))
    }

    fn parse_call_expression(&mut self, function: Expression) -> Result<Expression> {
        let arguments = self.parse_expression_list(Token::Rparen)?;
        Ok(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Result<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(Token::Rbracket)?;
        Ok(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }
}
