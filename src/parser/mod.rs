//! Recursive descent parser for Yul blocks and objects.
//!
//! The parser stops at the first error. Whether a call is an instruction
//! or a function call is decided here, using the dialect.

use anyhow::Result;
use tracing::instrument;

use crate::{
    common::YulError,
    lexer::{Lexer, Token, TokenType},
    object::{Data, Object, ObjectNode},
    prelude::*,
    svm::{AsmFlavour, Dialect, Instruction},
};

pub struct YulParser<'d> {
    lexer: Lexer,
    current: Token,
    previous: Token,
    dialect: &'d dyn Dialect,
    depth: usize,
}

/// Deepest nesting of blocks and calls accepted. Every later pass recurses
/// along the same structure.
pub const MAX_NESTING_DEPTH: usize = 256;

macro_rules! parse_error {
    ($token:expr, $($arg:tt)+) => {
        YulError::Parse {
            message: format!("{} at '{}'", format!($($arg)+), $token.lexeme),
            line: $token.line,
        }
    };
}

impl<'d> YulParser<'d> {
    fn new(source: &str, dialect: &'d dyn Dialect) -> Result<Self> {
        let mut parser = Self {
            lexer: Lexer::new(source.to_string()),
            current: Token::default(),
            previous: Token::default(),
            dialect,
            depth: 0,
        };
        parser.advance()?;
        Ok(parser)
    }

    /// Parses a single block, e.g. `{ let x := 1 }`.
    #[instrument(level = "debug", skip_all)]
    pub fn parse(source: &str, dialect: &'d dyn Dialect) -> Result<Block> {
        let mut parser = Self::new(source, dialect)?;
        let block = parser.block()?;
        parser.consume(TokenType::EOF, "Expected end of input")?;
        Ok(block)
    }

    /// Parses an object, or a bare block which is wrapped into an object
    /// called `object`.
    #[instrument(level = "debug", skip_all)]
    pub fn parse_object(source: &str, dialect: &'d dyn Dialect) -> Result<Object> {
        let mut parser = Self::new(source, dialect)?;
        let object = if parser.check(TokenType::LeftBrace) {
            Object::from_code(parser.block()?)
        } else {
            parser.object()?
        };
        parser.consume(TokenType::EOF, "Expected end of input")?;
        Ok(object)
    }

    fn advance(&mut self) -> Result<()> {
        self.previous = std::mem::replace(&mut self.current, self.lexer.scan_token());
        if self.current.token_type == TokenType::Error {
            return Err(YulError::Parse {
                message: self.current.lexeme.clone(),
                line: self.current.line,
            }
            .into());
        }
        Ok(())
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current.token_type == token_type
    }

    fn match_token(&mut self, token_type: TokenType) -> Result<bool> {
        if !self.check(token_type) {
            return Ok(false);
        }
        self.advance()?;
        Ok(true)
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token> {
        if !self.check(token_type) {
            return Err(parse_error!(self.current, "{message}").into());
        }
        self.advance()?;
        Ok(self.previous.clone())
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.previous.line,
        }
    }

    fn object(&mut self) -> Result<Object> {
        self.consume(TokenType::Object, "Expected 'object' or '{'")?;
        let name = self.consume(TokenType::String, "Expected object name")?;
        self.consume(TokenType::LeftBrace, "Expected '{' after object name")?;
        self.consume(TokenType::Code, "Expected 'code'")?;
        let code = self.block()?;
        let mut sub_objects = Vec::new();
        while !self.match_token(TokenType::RightBrace)? {
            if self.check(TokenType::Object) {
                sub_objects.push(ObjectNode::Object(self.object()?));
            } else if self.match_token(TokenType::Data)? {
                sub_objects.push(ObjectNode::Data(self.data()?));
            } else {
                return Err(parse_error!(self.current, "Expected 'object', 'data' or '}}'").into());
            }
        }
        Ok(Object {
            name: name.string_contents().into(),
            code,
            sub_objects,
        })
    }

    fn data(&mut self) -> Result<Data> {
        let name = self.consume(TokenType::String, "Expected data name")?;
        let data = if self.match_token(TokenType::HexString)? {
            decode_hex(self.previous.string_contents())
                .ok_or_else(|| parse_error!(self.previous, "Invalid hex string"))?
        } else {
            let token = self.consume(TokenType::String, "Expected data literal")?;
            self.string_literal(&token).string_bytes()?
        };
        Ok(Data {
            name: name.string_contents().into(),
            data,
        })
    }

    fn enter_nested(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(parse_error!(self.current, "Nesting deeper than {MAX_NESTING_DEPTH}").into());
        }
        Ok(())
    }

    fn block(&mut self) -> Result<Block> {
        self.consume(TokenType::LeftBrace, "Expected '{'")?;
        self.enter_nested()?;
        let location = self.location();
        let mut statements = Vec::new();
        while !self.match_token(TokenType::RightBrace)? {
            if self.check(TokenType::EOF) {
                return Err(parse_error!(self.current, "Expected '}}'").into());
            }
            statements.push(self.statement()?);
        }
        self.depth -= 1;
        Ok(Block {
            location,
            statements,
        })
    }

    fn statement(&mut self) -> Result<Statement> {
        match self.current.token_type {
            TokenType::LeftBrace => Ok(Statement::Block(self.block()?)),
            TokenType::Function => self.function_definition(),
            TokenType::Let => self.variable_declaration(),
            TokenType::If => {
                self.advance()?;
                let location = self.location();
                let condition = self.expression()?;
                let body = self.block()?;
                Ok(Statement::If(If {
                    location,
                    condition,
                    body,
                }))
            }
            TokenType::Switch => self.switch(),
            TokenType::For => {
                self.advance()?;
                let location = self.location();
                let pre = self.block()?;
                let condition = self.expression()?;
                let post = self.block()?;
                let body = self.block()?;
                Ok(Statement::ForLoop(ForLoop {
                    location,
                    pre,
                    condition,
                    post,
                    body,
                }))
            }
            TokenType::Break => {
                self.advance()?;
                Ok(Statement::Break(Break {
                    location: self.location(),
                }))
            }
            TokenType::Continue => {
                self.advance()?;
                Ok(Statement::Continue(Continue {
                    location: self.location(),
                }))
            }
            TokenType::EqualColon => {
                self.require_loose("Stack assignment")?;
                self.advance()?;
                let location = self.location();
                let variable_name = self.identifier()?;
                Ok(Statement::StackAssignment(StackAssignment {
                    location,
                    variable_name,
                }))
            }
            TokenType::Identifier => self.identifier_statement(),
            _ => {
                let location = SourceLocation {
                    line: self.current.line,
                };
                let expression = self.expression()?;
                Ok(Statement::ExpressionStatement(ExpressionStatement {
                    location,
                    expression,
                }))
            }
        }
    }

    fn identifier_statement(&mut self) -> Result<Statement> {
        let first = self.identifier()?;
        let location = first.location;
        match self.current.token_type {
            TokenType::LeftParen => Ok(Statement::ExpressionStatement(ExpressionStatement {
                location,
                expression: self.call(first)?,
            })),
            TokenType::Comma | TokenType::ColonEqual => {
                let mut variable_names = vec![first];
                while self.match_token(TokenType::Comma)? {
                    variable_names.push(self.identifier()?);
                }
                self.consume(TokenType::ColonEqual, "Expected ':='")?;
                let value = self.expression()?;
                Ok(Statement::Assignment(Assignment {
                    location,
                    variable_names,
                    value,
                }))
            }
            TokenType::Colon => {
                self.require_loose("Label")?;
                self.advance()?;
                Ok(Statement::Label(Label {
                    location,
                    name: first.name,
                }))
            }
            _ => Ok(Statement::ExpressionStatement(ExpressionStatement {
                location,
                expression: Expression::Identifier(first),
            })),
        }
    }

    fn function_definition(&mut self) -> Result<Statement> {
        self.advance()?;
        let location = self.location();
        let name = self.identifier()?.name;
        self.consume(TokenType::LeftParen, "Expected '(' after function name")?;
        let parameters = if self.check(TokenType::RightParen) {
            Vec::new()
        } else {
            self.typed_name_list()?
        };
        self.consume(TokenType::RightParen, "Expected ')' after parameters")?;
        let return_variables = if self.match_token(TokenType::RightArrow)? {
            self.typed_name_list()?
        } else {
            Vec::new()
        };
        let body = self.block()?;
        Ok(Statement::FunctionDefinition(FunctionDefinition {
            location,
            name,
            parameters,
            return_variables,
            body,
        }))
    }

    fn variable_declaration(&mut self) -> Result<Statement> {
        self.advance()?;
        let location = self.location();
        let variables = self.typed_name_list()?;
        let value = if self.match_token(TokenType::ColonEqual)? {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Statement::VariableDeclaration(VariableDeclaration {
            location,
            variables,
            value,
        }))
    }

    fn switch(&mut self) -> Result<Statement> {
        self.advance()?;
        let location = self.location();
        let expression = self.expression()?;
        let mut cases = Vec::new();
        while self.match_token(TokenType::Case)? {
            let case_location = self.location();
            let value = match self.expression()? {
                Expression::Literal(literal) => literal,
                _ => return Err(parse_error!(self.previous, "Literal expected").into()),
            };
            cases.push(Case {
                location: case_location,
                value: Some(value),
                body: self.block()?,
            });
        }
        if self.match_token(TokenType::Default)? {
            cases.push(Case {
                location: self.location(),
                value: None,
                body: self.block()?,
            });
        }
        if cases.is_empty() {
            return Err(parse_error!(self.current, "Switch statement without any cases").into());
        }
        if self.check(TokenType::Case) || self.check(TokenType::Default) {
            return Err(parse_error!(self.current, "Case not allowed after default case").into());
        }
        Ok(Statement::Switch(Switch {
            location,
            expression,
            cases,
        }))
    }

    fn typed_name_list(&mut self) -> Result<TypedNameList> {
        let mut names = vec![self.typed_name()?];
        while self.match_token(TokenType::Comma)? {
            names.push(self.typed_name()?);
        }
        Ok(names)
    }

    fn typed_name(&mut self) -> Result<TypedName> {
        let identifier = self.identifier()?;
        Ok(TypedName {
            location: identifier.location,
            name: identifier.name,
            ty: self.optional_type()?,
        })
    }

    fn optional_type(&mut self) -> Result<Type> {
        if self.match_token(TokenType::Colon)? {
            Ok(self.identifier()?.name)
        } else {
            Ok(Type::default())
        }
    }

    fn identifier(&mut self) -> Result<Identifier> {
        let token = self.consume(TokenType::Identifier, "Expected identifier")?;
        Ok(Identifier {
            location: SourceLocation { line: token.line },
            name: token.lexeme.into(),
        })
    }

    fn expression(&mut self) -> Result<Expression> {
        match self.current.token_type {
            TokenType::Identifier => {
                let identifier = self.identifier()?;
                if self.check(TokenType::LeftParen) {
                    self.call(identifier)
                } else {
                    Ok(Expression::Identifier(identifier))
                }
            }
            TokenType::Number | TokenType::True | TokenType::False => {
                self.advance()?;
                let kind = match self.previous.token_type {
                    TokenType::Number => LiteralKind::Number,
                    _ => LiteralKind::Boolean,
                };
                let mut literal = Literal {
                    location: self.location(),
                    kind,
                    value: self.previous.lexeme.as_str().into(),
                    ty: Type::default(),
                };
                literal.ty = self.optional_type()?;
                Ok(Expression::Literal(literal))
            }
            TokenType::String => {
                self.advance()?;
                let token = self.previous.clone();
                let mut literal = self.string_literal(&token);
                if literal.string_bytes().map_or(true, |b| b.len() > 32) {
                    return Err(parse_error!(token, "String literal too long or malformed").into());
                }
                literal.ty = self.optional_type()?;
                Ok(Expression::Literal(literal))
            }
            _ => Err(parse_error!(self.current, "Literal or identifier expected").into()),
        }
    }

    fn string_literal(&self, token: &Token) -> Literal {
        Literal {
            location: SourceLocation { line: token.line },
            kind: LiteralKind::String,
            value: token.string_contents().into(),
            ty: Type::default(),
        }
    }

    fn call(&mut self, name: Identifier) -> Result<Expression> {
        self.consume(TokenType::LeftParen, "Expected '('")?;
        self.enter_nested()?;
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            arguments.push(self.expression()?);
            while self.match_token(TokenType::Comma)? {
                arguments.push(self.expression()?);
            }
        }
        self.consume(TokenType::RightParen, "Expected ')' after arguments")?;
        self.depth -= 1;

        if let Some(instruction) = self.dialect.functional_instruction(&name.name) {
            return Ok(Expression::FunctionalInstruction(FunctionalInstruction {
                location: name.location,
                instruction,
                arguments,
            }));
        }
        if self.dialect.as_svm().is_some()
            && self.dialect.builtin(&name.name).is_none()
            && name.name.parse::<Instruction>().is_ok()
        {
            return Err(YulError::Parse {
                message: format!(
                    "Instruction \"{}\" not allowed in this context",
                    name.name
                ),
                line: name.location.line,
            }
            .into());
        }
        Ok(Expression::FunctionCall(FunctionCall {
            location: name.location,
            function_name: name,
            arguments,
        }))
    }

    fn require_loose(&self, what: &str) -> Result<()> {
        if self.dialect.flavour() != AsmFlavour::Loose {
            return Err(parse_error!(self.current, "{what} only allowed in loose assembly").into());
        }
        Ok(())
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
