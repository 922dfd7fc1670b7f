use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{instrument, trace};

use crate::{parser::MAX_NESTING_DEPTH, prelude::*, svm::Dialect};

use super::{
    data_flow_analyzer::{DataFlowAnalyzer, DataFlowHooks, DataFlowState},
    metrics::{CodeCost, ExpressionDepth},
    name_collector::ReferencesCounter,
};

/// Replaces reads of a variable by the value it currently holds.
///
/// A value is copied if the variable is read at most once, if the value is
/// free to evaluate, or if it is cheap and read at most five times. Values
/// nested deeper than [`MAX_COPIED_DEPTH`] stay behind their variable, so
/// chains of substitutions cannot grow expressions without bound.
pub struct Rematerialiser {
    references: BTreeMap<YulString, usize>,
}

const MAX_CHEAP_COPIES: usize = 5;
const MAX_CHEAP_COST: usize = 2;
pub const MAX_COPIED_DEPTH: usize = MAX_NESTING_DEPTH / 4;

impl Rematerialiser {
    #[instrument(level = "debug", skip_all)]
    pub fn run(dialect: &dyn Dialect, ast: &mut Block) -> Result<()> {
        let hooks = Self {
            references: ReferencesCounter::count_references(ast),
        };
        DataFlowAnalyzer::run(dialect, ast, hooks)?;
        Ok(())
    }

    fn worth_copying(&self, name: &str, value: &Expression) -> bool {
        if ExpressionDepth::depth(value) >= MAX_COPIED_DEPTH {
            return false;
        }
        let references = self.references.get(name).copied().unwrap_or(0);
        if references <= 1 {
            return true;
        }
        let cost = CodeCost::code_cost(value);
        cost == 0 || (references <= MAX_CHEAP_COPIES && cost <= MAX_CHEAP_COST)
    }
}

impl DataFlowHooks for Rematerialiser {
    fn enter_expression(&mut self, state: &DataFlowState, expression: &mut Expression) -> Result<()> {
        let Expression::Identifier(identifier) = expression else {
            return Ok(());
        };
        let name = identifier.name.clone();
        let Some(value) = state.value(&name) else {
            return Ok(());
        };
        if !self.worth_copying(&name, value) {
            return Ok(());
        }
        trace!("rematerialising {name} as {value}");
        if let Some(count) = self.references.get_mut(&name) {
            *count = count.saturating_sub(1);
        }
        for (read, count) in ReferencesCounter::count_references_in_expression(value) {
            *self.references.entry(read).or_default() += count;
        }
        *expression = value.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn rematerialise(source: &str) -> String {
        let dialect = SvmDialect::strict_assembly();
        let mut block = YulParser::parse(source, &dialect).unwrap();
        Rematerialiser::run(&dialect, &mut block).unwrap();
        block.to_string()
    }

    #[test]
    fn reassigned_variable_is_not_replaced_by_stale_value() {
        assert_eq!(
            rematerialise("{ let x := 3 let y := x x := 4 let z := x }"),
            "{ let x := 3 let y := 3 x := 4 let z := 4 }"
        );
    }

    #[test_case(
        "{ let a := 1 let b := add(a, 2) sstore(b, b) }",
        "{ let a := 1 let b := add(1, 2) sstore(add(1, 2), add(1, 2)) }" ;
        "cheap value copied twice"
    )]
    #[test_case(
        "{ let a := mul(calldataload(0), 3) sstore(a, a) }",
        "{ let a := mul(calldataload(0), 3) sstore(a, a) }" ;
        "expensive value read twice"
    )]
    #[test_case(
        "{ let a := mul(calldataload(0), 3) sstore(0, a) }",
        "{ let a := mul(calldataload(0), 3) sstore(0, mul(calldataload(0), 3)) }" ;
        "single reference"
    )]
    #[test_case(
        "{ let a := sload(0) sstore(1, a) }",
        "{ let a := sload(0) sstore(1, a) }" ;
        "not movable"
    )]
    #[test_case(
        "{ let a := sload(0) let b := add(a, 1) a := 2 sstore(b, b) }",
        "{ let a := sload(0) let b := add(a, 1) a := 2 sstore(b, b) }" ;
        "dependent value forgotten on reassignment"
    )]
    fn rematerialisation(source: &str, expected: &str) {
        assert_eq!(rematerialise(source), expected);
    }

    #[test]
    fn chains_of_single_reads_stop_growing() {
        let chain: String = (1..=2 * MAX_COPIED_DEPTH)
            .map(|i| format!("let v{i} := add(v{}, 1) ", i - 1))
            .collect();
        let source = format!("{{ let v0 := calldataload(0) {chain} sstore(0, v{}) }}", 2 * MAX_COPIED_DEPTH);
        let dialect = SvmDialect::strict_assembly();
        let mut block = YulParser::parse(&source, &dialect).unwrap();
        Rematerialiser::run(&dialect, &mut block).unwrap();

        let mut deepest = 0;
        for statement in &block.statements {
            let expression = match statement {
                Statement::VariableDeclaration(d) => d.value.as_ref().unwrap(),
                Statement::ExpressionStatement(s) => &s.expression,
                _ => continue,
            };
            deepest = deepest.max(ExpressionDepth::depth(expression));
        }
        assert!(deepest <= MAX_COPIED_DEPTH + 1, "depth {deepest}");
        assert!(deepest >= MAX_COPIED_DEPTH - 1, "depth {deepest}");
    }

    #[test]
    fn values_do_not_cross_function_boundaries() {
        assert_eq!(
            rematerialise("{ let a := 7 function f() -> r { r := a } }"),
            "{ let a := 7 function f() -> r { r := a } }"
        );
    }
}
