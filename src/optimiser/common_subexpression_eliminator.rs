use anyhow::Result;
use tracing::{instrument, trace};

use crate::{prelude::*, svm::Dialect};

use super::data_flow_analyzer::{DataFlowAnalyzer, DataFlowHooks, DataFlowState};

/// Replaces an expression by a variable already holding the same value.
///
/// Literals are left alone since a variable read is never cheaper.
pub struct CommonSubexpressionEliminator;

impl CommonSubexpressionEliminator {
    #[instrument(level = "debug", skip_all)]
    pub fn run(dialect: &dyn Dialect, ast: &mut Block) -> Result<()> {
        DataFlowAnalyzer::run(dialect, ast, Self)?;
        Ok(())
    }
}

impl DataFlowHooks for CommonSubexpressionEliminator {
    fn leave_expression(&mut self, state: &DataFlowState, expression: &mut Expression) -> Result<()> {
        match expression {
            Expression::Literal(_) => {}
            Expression::Identifier(identifier) => {
                if let Some(Expression::Identifier(value)) = state.value(&identifier.name) {
                    trace!("{} -> {}", identifier.name, value.name);
                    identifier.name = value.name.clone();
                }
            }
            _ => {
                let holder = state
                    .values()
                    .find(|(_, value)| syntactically_equal(value, expression))
                    .map(|(name, _)| name.clone());
                if let Some(name) = holder {
                    trace!("{expression} -> {name}");
                    *expression = Expression::identifier(expression.location(), name);
                }
            }
        }
        Ok(())
    }
}
