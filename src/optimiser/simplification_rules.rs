//! Algebraic rewrite rules over SVM instructions.
//!
//! A rule pairs a [`Pattern`] with the [`Action`] producing its
//! replacement. Letters name sub-expressions: an `Any` letter matches any
//! expression, a `Constant` letter only literals, and a letter used twice
//! must match syntactically equal expressions both times.

use std::collections::HashMap;

use alloy_primitives::U256;
use lazy_static::lazy_static;

use crate::{prelude::*, svm::Instruction};

#[derive(Debug, Clone)]
pub enum Pattern {
    Any(char),
    Constant(char),
    Number(U256),
    Op(Instruction, Vec<Pattern>),
}

#[derive(Debug, Clone)]
pub enum Action {
    Keep(char),
    Number(U256),
    /// Evaluates the matched instruction over its literal arguments.
    Fold,
    Op(Instruction, Vec<Action>),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Pattern,
    pub action: Action,
    /// Applying the rule drops a non-literal operand. Only safe when the
    /// matched expression is movable.
    pub removes_non_constants: bool,
}

pub type Bindings<'e> = HashMap<char, &'e Expression>;

impl Pattern {
    pub fn matches<'e>(&self, expression: &'e Expression, bindings: &mut Bindings<'e>) -> bool {
        match (self, expression) {
            (Pattern::Any(name), _) => bind(*name, expression, bindings),
            (Pattern::Constant(name), Expression::Literal(_)) => bind(*name, expression, bindings),
            (Pattern::Constant(_), _) => false,
            (Pattern::Number(expected), Expression::Literal(literal)) => {
                literal.value().is_ok_and(|value| value == *expected)
            }
            (Pattern::Number(_), _) => false,
            (Pattern::Op(instruction, arguments), Expression::FunctionalInstruction(i)) => {
                *instruction == i.instruction
                    && arguments.len() == i.arguments.len()
                    && arguments
                        .iter()
                        .zip(&i.arguments)
                        .all(|(pattern, argument)| pattern.matches(argument, bindings))
            }
            (Pattern::Op(..), _) => false,
        }
    }
}

fn bind<'e>(name: char, expression: &'e Expression, bindings: &mut Bindings<'e>) -> bool {
    match bindings.get(&name) {
        Some(bound) => syntactically_equal(bound, expression),
        None => {
            bindings.insert(name, expression);
            true
        }
    }
}

impl Action {
    /// Builds the replacement for `matched`. `None` if folding is not
    /// possible.
    pub fn apply(&self, matched: &Expression, bindings: &Bindings<'_>) -> Option<Expression> {
        let location = matched.location();
        match self {
            Action::Keep(name) => bindings.get(name).map(|e| (*e).clone()),
            Action::Number(value) => Some(Expression::Literal(Literal::number(location, *value))),
            Action::Fold => {
                let Expression::FunctionalInstruction(i) = matched else {
                    return None;
                };
                let arguments = i
                    .arguments
                    .iter()
                    .map(|argument| match argument {
                        Expression::Literal(literal) => literal.value().ok(),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                let value = i.instruction.evaluate(&arguments)?;
                Some(Expression::Literal(Literal::number(location, value)))
            }
            Action::Op(instruction, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|a| a.apply(matched, bindings))
                    .collect::<Option<Vec<_>>>()?;
                Some(Expression::instruction(location, *instruction, arguments))
            }
        }
    }
}

/// The first rule matching `expression`, with its bindings.
pub fn find_rule(expression: &Expression) -> Option<(&'static Rule, Bindings<'_>)> {
    let Expression::FunctionalInstruction(_) = expression else {
        return None;
    };
    RULES.iter().find_map(|rule| {
        let mut bindings = Bindings::new();
        rule.pattern
            .matches(expression, &mut bindings)
            .then_some((rule, bindings))
    })
}

const FOLDABLE: [Instruction; 25] = [
    Instruction::Add,
    Instruction::Mul,
    Instruction::Sub,
    Instruction::Div,
    Instruction::SDiv,
    Instruction::Mod,
    Instruction::SMod,
    Instruction::AddMod,
    Instruction::MulMod,
    Instruction::Exp,
    Instruction::SignExtend,
    Instruction::Lt,
    Instruction::Gt,
    Instruction::Slt,
    Instruction::Sgt,
    Instruction::Eq,
    Instruction::IsZero,
    Instruction::And,
    Instruction::Or,
    Instruction::Xor,
    Instruction::Not,
    Instruction::Byte,
    Instruction::Shl,
    Instruction::Shr,
    Instruction::Sar,
];

fn op(instruction: Instruction, arguments: Vec<Pattern>) -> Pattern {
    Pattern::Op(instruction, arguments)
}

fn x() -> Pattern {
    Pattern::Any('X')
}

fn num(value: u64) -> Pattern {
    Pattern::Number(U256::from(value))
}

fn rule(pattern: Pattern, action: Action, removes_non_constants: bool) -> Rule {
    Rule {
        pattern,
        action,
        removes_non_constants,
    }
}

fn build_rules() -> Vec<Rule> {
    use Instruction::*;

    let mut rules: Vec<Rule> = FOLDABLE
        .iter()
        .map(|&instruction| {
            let arguments = ['A', 'B', 'C']
                .into_iter()
                .take(instruction.args())
                .map(Pattern::Constant)
                .collect();
            rule(op(instruction, arguments), Action::Fold, false)
        })
        .collect();

    let keep = || Action::Keep('X');
    let zero = || Action::Number(U256::ZERO);
    let one = || Action::Number(U256::from(1u64));

    rules.extend([
        // Neutral operands.
        rule(op(Add, vec![x(), num(0)]), keep(), false),
        rule(op(Add, vec![num(0), x()]), keep(), false),
        rule(op(Sub, vec![x(), num(0)]), keep(), false),
        rule(op(Mul, vec![x(), num(1)]), keep(), false),
        rule(op(Mul, vec![num(1), x()]), keep(), false),
        rule(op(Div, vec![x(), num(1)]), keep(), false),
        rule(op(Or, vec![x(), num(0)]), keep(), false),
        rule(op(Or, vec![num(0), x()]), keep(), false),
        rule(op(Xor, vec![x(), num(0)]), keep(), false),
        rule(op(Xor, vec![num(0), x()]), keep(), false),
        rule(op(Shl, vec![num(0), x()]), keep(), false),
        rule(op(Shr, vec![num(0), x()]), keep(), false),
        rule(op(Exp, vec![x(), num(1)]), keep(), false),
        rule(op(And, vec![x(), Pattern::Number(U256::MAX)]), keep(), false),
        rule(op(And, vec![Pattern::Number(U256::MAX), x()]), keep(), false),
        // Absorbing operands.
        rule(op(Mul, vec![x(), num(0)]), zero(), true),
        rule(op(Mul, vec![num(0), x()]), zero(), true),
        rule(op(Div, vec![x(), num(0)]), zero(), true),
        rule(op(Div, vec![num(0), x()]), zero(), true),
        rule(op(Mod, vec![x(), num(0)]), zero(), true),
        rule(op(Mod, vec![x(), num(1)]), zero(), true),
        rule(op(And, vec![x(), num(0)]), zero(), true),
        rule(op(And, vec![num(0), x()]), zero(), true),
        rule(op(Exp, vec![x(), num(0)]), one(), true),
        // Same operand twice.
        rule(op(Sub, vec![x(), x()]), zero(), true),
        rule(op(Xor, vec![x(), x()]), zero(), true),
        rule(op(Lt, vec![x(), x()]), zero(), true),
        rule(op(Gt, vec![x(), x()]), zero(), true),
        rule(op(Slt, vec![x(), x()]), zero(), true),
        rule(op(Sgt, vec![x(), x()]), zero(), true),
        rule(op(Eq, vec![x(), x()]), one(), true),
        rule(op(And, vec![x(), x()]), keep(), true),
        rule(op(Or, vec![x(), x()]), keep(), true),
        // Double negation.
        rule(op(Not, vec![op(Not, vec![x()])]), keep(), false),
        rule(
            op(IsZero, vec![op(IsZero, vec![op(IsZero, vec![x()])])]),
            Action::Op(IsZero, vec![keep()]),
            false,
        ),
    ]);
    rules
}

lazy_static! {
    pub static ref RULES: Vec<Rule> = build_rules();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn expression(source: &str) -> Expression {
        let block = YulParser::parse(&format!("{{ pop({source}) }}"), &SvmDialect::strict_assembly()).unwrap();
        match block.statements.into_iter().next() {
            Some(Statement::ExpressionStatement(ExpressionStatement {
                expression: Expression::FunctionalInstruction(mut pop),
                ..
            })) => pop.arguments.remove(0),
            _ => panic!("unexpected parse"),
        }
    }

    fn rewrite(source: &str) -> Option<String> {
        let expression = expression(source);
        let (rule, bindings) = find_rule(&expression)?;
        rule.action
            .apply(&expression, &bindings)
            .map(|e| e.to_string())
    }

    #[test]
    fn folds_literal_arithmetic() {
        assert_eq!(rewrite("add(2, 3)").as_deref(), Some("5"));
        assert_eq!(rewrite("sub(0, 1)").as_deref(), Some(format!("{:#x}", U256::MAX).as_str()));
        assert_eq!(rewrite("lt(1, 2)").as_deref(), Some("1"));
        assert_eq!(rewrite("div(7, 0)").as_deref(), Some("0"));
    }

    #[test]
    fn repeated_letters_need_equal_operands() {
        assert_eq!(rewrite("sub(x, x)").as_deref(), Some("0"));
        assert_eq!(rewrite("sub(x, y)"), None);
    }

    #[test]
    fn nested_patterns() {
        assert_eq!(rewrite("not(not(y))").as_deref(), Some("y"));
        assert_eq!(rewrite("iszero(iszero(iszero(y)))").as_deref(), Some("iszero(y)"));
    }

    #[test]
    fn rules_that_drop_operands_are_marked() {
        let dropping = expression("mul(y, 0)");
        let (rule, _) = find_rule(&dropping).unwrap();
        assert!(rule.removes_non_constants);
        let keeping = expression("add(y, 0)");
        let (rule, _) = find_rule(&keeping).unwrap();
        assert!(!rule.removes_non_constants);
    }
}
