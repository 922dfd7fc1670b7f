//! The Yul abstract syntax tree.
//!
//! Every node is an owned value. Passes either rewrite a tree in place or
//! build a fresh one from a borrowed tree. Nodes carry a [`SourceLocation`]
//! which is ignored by [`syntactically_equal`].

mod printer;

use std::fmt::Display;

use alloy_primitives::U256;
use anyhow::{bail, Context, Result};

use crate::svm::Instruction;

use super::YulString;

pub type Type = YulString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SourceLocation {
    pub line: usize,
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}", self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    Boolean,
    String,
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub location: SourceLocation,
    pub kind: LiteralKind,
    /// Source text of the literal. String literals keep their escapes.
    pub value: YulString,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub location: SourceLocation,
    pub name: YulString,
}

#[derive(Debug, Clone)]
pub struct TypedName {
    pub location: SourceLocation,
    pub name: YulString,
    pub ty: Type,
}

pub type TypedNameList = Vec<TypedName>;

/// A call written with an instruction mnemonic, e.g. `add(x, 1)`.
#[derive(Debug, Clone)]
pub struct FunctionalInstruction {
    pub location: SourceLocation,
    pub instruction: Instruction,
    pub arguments: Vec<Expression>,
}

/// A call to a user-defined function or a non-instruction builtin.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub location: SourceLocation,
    pub function_name: Identifier,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub enum Expression {
    FunctionalInstruction(FunctionalInstruction),
    FunctionCall(FunctionCall),
    Identifier(Identifier),
    Literal(Literal),
}

#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    pub location: SourceLocation,
    pub expression: Expression,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub location: SourceLocation,
    pub variable_names: Vec<Identifier>,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub location: SourceLocation,
    pub variables: TypedNameList,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub location: SourceLocation,
    pub name: YulString,
    pub parameters: TypedNameList,
    pub return_variables: TypedNameList,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct If {
    pub location: SourceLocation,
    pub condition: Expression,
    pub body: Block,
}

/// A switch case. `value` is `None` for the default case.
#[derive(Debug, Clone)]
pub struct Case {
    pub location: SourceLocation,
    pub value: Option<Literal>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct Switch {
    pub location: SourceLocation,
    pub expression: Expression,
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone)]
pub struct ForLoop {
    pub location: SourceLocation,
    pub pre: Block,
    pub condition: Expression,
    pub post: Block,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct Break {
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct Continue {
    pub location: SourceLocation,
}

/// A jump target, only available in loose assembly.
#[derive(Debug, Clone)]
pub struct Label {
    pub location: SourceLocation,
    pub name: YulString,
}

/// `=: x`, pops the top of the stack into `x`. Loose assembly only.
#[derive(Debug, Clone)]
pub struct StackAssignment {
    pub location: SourceLocation,
    pub variable_name: Identifier,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub location: SourceLocation,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    ExpressionStatement(ExpressionStatement),
    Assignment(Assignment),
    VariableDeclaration(VariableDeclaration),
    FunctionDefinition(FunctionDefinition),
    If(If),
    Switch(Switch),
    ForLoop(ForLoop),
    Break(Break),
    Continue(Continue),
    Block(Block),
    Label(Label),
    StackAssignment(StackAssignment),
}

impl Expression {
    pub fn location(&self) -> SourceLocation {
        match self {
            Expression::FunctionalInstruction(i) => i.location,
            Expression::FunctionCall(c) => c.location,
            Expression::Identifier(i) => i.location,
            Expression::Literal(l) => l.location,
        }
    }

    pub fn identifier(location: SourceLocation, name: YulString) -> Self {
        Expression::Identifier(Identifier { location, name })
    }

    pub fn instruction(
        location: SourceLocation,
        instruction: Instruction,
        arguments: Vec<Expression>,
    ) -> Self {
        Expression::FunctionalInstruction(FunctionalInstruction {
            location,
            instruction,
            arguments,
        })
    }
}

impl Statement {
    pub fn location(&self) -> SourceLocation {
        match self {
            Statement::ExpressionStatement(s) => s.location,
            Statement::Assignment(s) => s.location,
            Statement::VariableDeclaration(s) => s.location,
            Statement::FunctionDefinition(s) => s.location,
            Statement::If(s) => s.location,
            Statement::Switch(s) => s.location,
            Statement::ForLoop(s) => s.location,
            Statement::Break(s) => s.location,
            Statement::Continue(s) => s.location,
            Statement::Block(s) => s.location,
            Statement::Label(s) => s.location,
            Statement::StackAssignment(s) => s.location,
        }
    }
}

impl Literal {
    /// A number literal, printed in decimal below 2^32 and in hex above.
    pub fn number(location: SourceLocation, value: U256) -> Self {
        let text = if value < U256::from(1u64 << 32) {
            value.to_string()
        } else {
            format!("{value:#x}")
        };
        Self {
            location,
            kind: LiteralKind::Number,
            value: text.into(),
            ty: Type::default(),
        }
    }

    pub fn zero(location: SourceLocation, ty: Type) -> Self {
        Self {
            ty,
            ..Self::number(location, U256::ZERO)
        }
    }

    /// The 256-bit word this literal pushes onto the stack.
    pub fn value(&self) -> Result<U256> {
        match self.kind {
            LiteralKind::Number => parse_number(&self.value),
            LiteralKind::Boolean => Ok(U256::from((self.value == "true") as u64)),
            LiteralKind::String => {
                let bytes = self.string_bytes()?;
                if bytes.len() > 32 {
                    bail!("String literal too long ({} > 32)", bytes.len());
                }
                let mut word = [0u8; 32];
                word[..bytes.len()].copy_from_slice(&bytes);
                Ok(U256::from_be_bytes(word))
            }
        }
    }

    /// The unescaped bytes of a string literal.
    pub fn string_bytes(&self) -> Result<Vec<u8>> {
        unescape(&self.value)
    }
}

pub fn parse_number(text: &str) -> Result<U256> {
    match text.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(text, 10),
    }
    .with_context(|| format!("Invalid number literal {text}"))
}

fn unescape(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'0') => out.push(0),
            Some(b'x') => {
                let digits: Vec<u8> = bytes.by_ref().take(2).collect();
                let digits = std::str::from_utf8(&digits)?;
                out.push(
                    u8::from_str_radix(digits, 16)
                        .with_context(|| format!("Invalid escape \\x{digits}"))?,
                );
            }
            Some(c @ (b'\\' | b'"' | b'\'')) => out.push(c),
            Some(c) => bail!("Invalid escape sequence \\{}", c as char),
            None => bail!("Unterminated escape sequence"),
        }
    }
    Ok(out)
}

/// Structural equality of two expressions ignoring source locations.
pub fn syntactically_equal(a: &Expression, b: &Expression) -> bool {
    match (a, b) {
        (Expression::Identifier(a), Expression::Identifier(b)) => a.name == b.name,
        (Expression::Literal(a), Expression::Literal(b)) => {
            if a.kind != b.kind || a.ty != b.ty {
                return false;
            }
            match (a.kind, a.value(), b.value()) {
                (LiteralKind::Number, Ok(x), Ok(y)) => x == y,
                _ => a.value == b.value,
            }
        }
        (Expression::FunctionalInstruction(a), Expression::FunctionalInstruction(b)) => {
            a.instruction == b.instruction && all_equal(&a.arguments, &b.arguments)
        }
        (Expression::FunctionCall(a), Expression::FunctionCall(b)) => {
            a.function_name.name == b.function_name.name && all_equal(&a.arguments, &b.arguments)
        }
        _ => false,
    }
}

fn all_equal(a: &[Expression], b: &[Expression]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| syntactically_equal(x, y))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn literal(kind: LiteralKind, value: &str) -> Literal {
        Literal {
            location: SourceLocation::default(),
            kind,
            value: value.into(),
            ty: Type::default(),
        }
    }

    #[test_case(LiteralKind::Number, "42", U256::from(42u64) ; "decimal")]
    #[test_case(LiteralKind::Number, "0xff", U256::from(255u64) ; "hex")]
    #[test_case(LiteralKind::Boolean, "true", U256::from(1u64) ; "true")]
    #[test_case(LiteralKind::Boolean, "false", U256::ZERO ; "false")]
    #[test_case(LiteralKind::String, "\\x01", U256::from(1u64) << 248 ; "escaped string")]
    fn literal_values(kind: LiteralKind, text: &str, expected: U256) {
        assert_eq!(literal(kind, text).value().unwrap(), expected);
    }

    #[test]
    fn long_string_is_rejected() {
        let text = "a".repeat(33);
        assert!(literal(LiteralKind::String, &text).value().is_err());
    }

    #[test]
    fn numbers_compare_by_value() {
        let a = Expression::Literal(literal(LiteralKind::Number, "0x10"));
        let b = Expression::Literal(literal(LiteralKind::Number, "16"));
        assert!(syntactically_equal(&a, &b));
    }

    #[test]
    fn large_numbers_print_as_hex() {
        assert_eq!(
            Literal::number(SourceLocation::default(), U256::MAX).value.as_str(),
            format!("{:#x}", U256::MAX)
        );
        assert_eq!(
            Literal::number(SourceLocation::default(), U256::from(7u64)).value.as_str(),
            "7"
        );
    }
}
