use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tracing::{debug, instrument, trace};

use crate::{prelude::*, svm::Dialect};

use super::{
    block_flattener::inline_or_keep,
    data_flow_analyzer::{DataFlowAnalyzer, DataFlowHooks, DataFlowState},
    name_collector::{Assignments, NameCollector, ReferencesCounter},
};

/// Removes control flow whose outcome is known.
///
/// An `if` with a constant condition is replaced by its body or dropped, a
/// `switch` on a constant by the selected case, and a `for` loop whose
/// condition is constant false by its initialisation. A condition is
/// constant if it is a literal or a variable known to hold one.
pub struct StructuralSimplifier {
    declarations: BTreeMap<YulString, usize>,
}

impl StructuralSimplifier {
    #[instrument(level = "debug", skip_all)]
    pub fn run(dialect: &dyn Dialect, ast: &mut Block) -> Result<()> {
        if dialect.as_svm().is_none() {
            debug!("Skipping structural simplification outside of SVM dialects");
            return Ok(());
        }
        let hooks = Self {
            declarations: NameCollector::count_declarations(ast),
        };
        DataFlowAnalyzer::run(dialect, ast, hooks)?;
        Ok(())
    }

    fn take_body(&self, body: &mut Block) -> Vec<Statement> {
        inline_or_keep(std::mem::take(body), &self.declarations)
    }
}

/// Whether the loop initialisation writes or declares a variable the
/// condition reads. The known values describe the state before `pre`.
fn changed_by_pre(pre: &Block, condition: &Expression) -> bool {
    if pre.statements.is_empty() {
        return false;
    }
    let written: BTreeSet<YulString> = Assignments::of_block(pre)
        .into_iter()
        .chain(NameCollector::collect(pre))
        .collect();
    ReferencesCounter::count_references_in_expression(condition)
        .keys()
        .any(|name| written.contains(name))
}

impl DataFlowHooks for StructuralSimplifier {
    fn replace_statement(
        &mut self,
        state: &DataFlowState,
        statement: &mut Statement,
    ) -> Result<Option<Vec<Statement>>> {
        let replacement = match statement {
            Statement::If(i) => match state.constant_value(&i.condition) {
                Some(value) if value.is_zero() => Some(Vec::new()),
                Some(_) => Some(self.take_body(&mut i.body)),
                None => None,
            },
            Statement::Switch(s) => match state.constant_value(&s.expression) {
                Some(value) => {
                    let selected = s
                        .cases
                        .iter()
                        .position(|case| {
                            case.value
                                .as_ref()
                                .is_some_and(|literal| literal.value().is_ok_and(|v| v == value))
                        })
                        .or_else(|| s.cases.iter().position(|case| case.value.is_none()));
                    Some(match selected {
                        Some(index) => self.take_body(&mut s.cases[index].body),
                        None => Vec::new(),
                    })
                }
                None => None,
            },
            Statement::ForLoop(l) if !changed_by_pre(&l.pre, &l.condition) => {
                match state.constant_value(&l.condition) {
                    Some(value) if value.is_zero() => Some(self.take_body(&mut l.pre)),
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some(statements) = &replacement {
            trace!("replaced {} statement(s) at {}", statements.len(), statement.location());
        }
        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        parser::YulParser,
        svm::{SvmDialect, YulDialect},
    };

    fn simplify(source: &str) -> String {
        let dialect = SvmDialect::strict_assembly();
        let mut block = YulParser::parse(source, &dialect).unwrap();
        StructuralSimplifier::run(&dialect, &mut block).unwrap();
        block.to_string()
    }

    #[test_case("{ if 1 { sstore(0, 1) } }", "{ sstore(0, 1) }" ; "true condition")]
    #[test_case("{ if 0 { sstore(0, 1) } }", "{ }" ; "false condition")]
    #[test_case(
        "{ if calldataload(0) { sstore(0, 1) } }",
        "{ if calldataload(0) { sstore(0, 1) } }" ;
        "unknown condition"
    )]
    #[test_case("{ let c := 0 if c { sstore(0, 1) } }", "{ let c := 0 }" ; "known variable")]
    #[test_case(
        "{ let c := 0 c := calldataload(0) if c { sstore(0, 1) } }",
        "{ let c := 0 c := calldataload(0) if c { sstore(0, 1) } }" ;
        "reassigned variable"
    )]
    #[test_case(
        "{ switch 2 case 1 { sstore(0, 1) } case 2 { sstore(0, 2) } default { sstore(0, 3) } }",
        "{ sstore(0, 2) }" ;
        "switch selects case"
    )]
    #[test_case(
        "{ switch 7 case 1 { sstore(0, 1) } default { sstore(0, 3) } }",
        "{ sstore(0, 3) }" ;
        "switch falls back to default"
    )]
    #[test_case("{ switch 7 case 1 { sstore(0, 1) } }", "{ }" ; "switch without match")]
    #[test_case(
        "{ for { let i := 1 } 0 { i := 2 } { sstore(0, i) } }",
        "{ let i := 1 }" ;
        "loop never entered"
    )]
    #[test_case(
        "{ let c := 0 for { sstore(1, 1) } c { } { sstore(0, 5) } }",
        "{ let c := 0 sstore(1, 1) }" ;
        "init leaves condition alone"
    )]
    #[test_case(
        "{ let c := 0 for { c := 1 } c { c := 0 } { sstore(0, 5) } }",
        "{ let c := 0 for { c := 1 } c { c := 0 } { sstore(0, 5) } }" ;
        "init assigns condition variable"
    )]
    #[test_case(
        "{ if 1 { if 1 { if 0 { sstore(0, 0) } sstore(1, 1) } } }",
        "{ sstore(1, 1) }" ;
        "nested"
    )]
    #[test_case(
        "{ if 1 { let a := 1 } let a := 2 }",
        "{ { let a := 1 } let a := 2 }" ;
        "body with clashing declaration"
    )]
    fn simplification(source: &str, expected: &str) {
        assert_eq!(simplify(source), expected);
    }

    #[test]
    fn simplifying_twice_changes_nothing() {
        let once = simplify("{ let x := 1 if x { for { } 0 { } { } switch x case 1 { sstore(x, 2) } } }");
        assert_eq!(once, "{ let x := 1 sstore(x, 2) }");
        assert_eq!(simplify(&once), once);
    }

    #[test]
    fn typed_dialect_is_left_alone() {
        let mut block = YulParser::parse("{ if true { } }", &YulDialect).unwrap();
        StructuralSimplifier::run(&YulDialect, &mut block).unwrap();
        assert_eq!(block.statements.len(), 1);
    }
}
