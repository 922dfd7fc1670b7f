use std::collections::BTreeSet;

use anyhow::Result;

use crate::{common::YulError, prelude::*, svm::Dialect};

use super::ast_walker::{walk_expression, AstWalker};

/// Decides whether an expression is movable and which variables it reads.
///
/// An expression is movable if evaluating it has no side effects and its
/// value only depends on the variables it reads. Such an expression can be
/// evaluated again later, or not at all, with the same result.
pub struct MovableChecker<'d> {
    dialect: &'d dyn Dialect,
    movable: bool,
    variables_read: BTreeSet<YulString>,
}

impl<'d> MovableChecker<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            movable: true,
            variables_read: BTreeSet::new(),
        }
    }

    pub fn of_expression(dialect: &'d dyn Dialect, expression: &Expression) -> Self {
        let mut checker = Self::new(dialect);
        checker.visit_expression(expression);
        checker
    }

    pub fn movable(&self) -> bool {
        self.movable
    }

    pub fn referenced_variables(&self) -> &BTreeSet<YulString> {
        &self.variables_read
    }

    /// Movability is only defined for expressions.
    pub fn check_statement(&mut self, statement: &Statement) -> Result<()> {
        Err(YulError::internal(statement.location(), "Movability for statement requested").into())
    }
}

impl AstWalker for MovableChecker<'_> {
    fn visit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Identifier(identifier) => {
                self.variables_read.insert(identifier.name.clone());
            }
            Expression::FunctionalInstruction(instruction) => {
                if !instruction.instruction.movable() {
                    self.movable = false;
                }
            }
            Expression::FunctionCall(call) => {
                match self.dialect.builtin(&call.function_name.name) {
                    Some(builtin) if builtin.movable => {}
                    _ => self.movable = false,
                }
            }
            Expression::Literal(_) => {}
        }
        walk_expression(self, expression);
    }
}

/// Whether evaluating `expression` may write memory or storage, or call
/// anything that could.
pub fn invalidates_state(dialect: &dyn Dialect, expression: &Expression) -> bool {
    struct StateWriteFinder<'d> {
        dialect: &'d dyn Dialect,
        found: bool,
    }

    impl AstWalker for StateWriteFinder<'_> {
        fn visit_expression(&mut self, expression: &Expression) {
            match expression {
                Expression::FunctionalInstruction(i) => {
                    let instruction = i.instruction;
                    self.found |= instruction.invalidates_memory() || instruction.invalidates_storage();
                }
                Expression::FunctionCall(call) => {
                    let builtin = self.dialect.builtin(&call.function_name.name);
                    self.found |= !builtin.is_some_and(|b| b.side_effect_free);
                }
                _ => {}
            }
            walk_expression(self, expression);
        }
    }

    let mut finder = StateWriteFinder {
        dialect,
        found: false,
    };
    finder.visit_expression(expression);
    finder.found
}
