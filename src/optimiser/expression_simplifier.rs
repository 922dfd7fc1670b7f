use anyhow::Result;
use tracing::{instrument, trace};

use crate::{prelude::*, svm::Dialect};

use super::{
    ast_walker::{walk_expression_mut, AstModifier},
    semantics::MovableChecker,
    simplification_rules::find_rule,
};

/// Applies the simplification rules bottom-up until none matches.
pub struct ExpressionSimplifier<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> ExpressionSimplifier<'d> {
    #[instrument(level = "debug", skip_all)]
    pub fn run(dialect: &'d dyn Dialect, ast: &mut Block) -> Result<()> {
        Self { dialect }.visit_block(ast);
        Ok(())
    }

    fn simplify(&self, expression: &Expression) -> Option<Expression> {
        let (rule, bindings) = find_rule(expression)?;
        if rule.removes_non_constants && !MovableChecker::of_expression(self.dialect, expression).movable() {
            return None;
        }
        rule.action.apply(expression, &bindings)
    }
}

impl AstModifier for ExpressionSimplifier<'_> {
    fn visit_expression(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression);
        while let Some(simplified) = self.simplify(expression) {
            trace!("{expression} -> {simplified}");
            *expression = simplified;
        }
    }
}
