use alloy_primitives::U256;
use anyhow::Result;
use tracing::instrument;

use crate::{prelude::*, svm::Instruction};

use super::ast_walker::{walk_statement_mut, AstModifier};

/// Turns `for { } c { } { body }` into
/// `for { } 1 { } { if iszero(c) { break } body }`.
///
/// Loops whose condition is already a literal are left alone.
#[derive(Debug, Default)]
pub struct ForLoopConditionIntoBody;

impl ForLoopConditionIntoBody {
    #[instrument(level = "debug", skip_all)]
    pub fn run(ast: &mut Block) -> Result<()> {
        Self.visit_block(ast);
        Ok(())
    }
}

impl AstModifier for ForLoopConditionIntoBody {
    fn visit_statement(&mut self, statement: &mut Statement) {
        walk_statement_mut(self, statement);
        let Statement::ForLoop(for_loop) = statement else {
            return;
        };
        if matches!(for_loop.condition, Expression::Literal(_)) {
            return;
        }
        let location = for_loop.condition.location();
        let condition = std::mem::replace(
            &mut for_loop.condition,
            Expression::Literal(Literal::number(location, U256::from(1u64))),
        );
        let guard = Statement::If(If {
            location,
            condition: Expression::instruction(location, Instruction::IsZero, vec![condition]),
            body: Block {
                location,
                statements: vec![Statement::Break(Break { location })],
            },
        });
        for_loop.body.statements.insert(0, guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn rewrite(source: &str) -> String {
        let mut block = YulParser::parse(source, &SvmDialect::strict_assembly()).unwrap();
        ForLoopConditionIntoBody::run(&mut block).unwrap();
        block.to_string()
    }

    #[test]
    fn condition_becomes_break_guard() {
        assert_eq!(
            rewrite("{ for { } lt(a, b) { } { mstore(1, 2) } }"),
            "{ for { } 1 { } { if iszero(lt(a, b)) { break } mstore(1, 2) } }"
        );
    }

    #[test]
    fn nested_loops_and_literal_conditions() {
        let once = rewrite("{ for { } 1 { } { for { } x { } { } } }");
        assert_eq!(once, "{ for { } 1 { } { for { } 1 { } { if iszero(x) { break } } } }");
        assert_eq!(rewrite(&once), once);
    }
}
