//! Size and cost heuristics used to decide whether a rewrite pays off.

use crate::{prelude::*, svm::instruction::Tier};

use super::ast_walker::{walk_expression, walk_statement, AstWalker};

/// Number of AST nodes, statements and expressions alike. Function
/// definitions are skipped unless requested.
#[derive(Debug, Default)]
pub struct CodeSize {
    size: usize,
    include_functions: bool,
}

impl CodeSize {
    pub fn code_size(block: &Block) -> usize {
        let mut counter = Self::default();
        counter.visit_block(block);
        counter.size
    }

    pub fn code_size_including_functions(block: &Block) -> usize {
        let mut counter = Self {
            include_functions: true,
            ..Default::default()
        };
        counter.visit_block(block);
        counter.size
    }

    pub fn expression_size(expression: &Expression) -> usize {
        let mut counter = Self::default();
        counter.visit_expression(expression);
        counter.size
    }
}

impl AstWalker for CodeSize {
    fn visit_statement(&mut self, statement: &Statement) {
        if matches!(statement, Statement::FunctionDefinition(_)) && !self.include_functions {
            return;
        }
        self.size += 1;
        walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        self.size += 1;
        walk_expression(self, expression);
    }
}

/// Rough runtime cost of evaluating an expression.
///
/// Identifiers and literals are free. Cheap instructions cost two, those
/// priced below `VeryLow` cost nothing and expensive ones or calls to user
/// functions cost fifty.
#[derive(Debug, Default)]
pub struct CodeCost {
    cost: i64,
}

impl CodeCost {
    pub fn code_cost(expression: &Expression) -> usize {
        let mut counter = Self::default();
        counter.visit_expression(expression);
        counter.cost.max(0) as usize
    }
}

impl AstWalker for CodeCost {
    fn visit_statement(&mut self, statement: &Statement) {
        self.cost += 1;
        walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Identifier(_) | Expression::Literal(_) => {}
            Expression::FunctionCall(_) => self.cost += 50,
            Expression::FunctionalInstruction(i) => {
                let tier = i.instruction.info().tier;
                self.cost += if tier < Tier::VeryLow {
                    0
                } else if tier < Tier::High {
                    2
                } else {
                    50
                };
            }
        }
        walk_expression(self, expression);
    }
}

/// Longest chain of nested calls and instructions in an expression.
/// Identifiers and literals have depth zero.
#[derive(Debug, Default)]
pub struct ExpressionDepth {
    current: usize,
    max: usize,
}

impl ExpressionDepth {
    pub fn depth(expression: &Expression) -> usize {
        let mut counter = Self::default();
        counter.visit_expression(expression);
        counter.max
    }
}

impl AstWalker for ExpressionDepth {
    fn visit_expression(&mut self, expression: &Expression) {
        if matches!(expression, Expression::Identifier(_) | Expression::Literal(_)) {
            return;
        }
        self.current += 1;
        self.max = self.max.max(self.current);
        walk_expression(self, expression);
        self.current -= 1;
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn parse(source: &str) -> Block {
        YulParser::parse(source, &SvmDialect::strict_assembly()).unwrap()
    }

    fn value(source: &str) -> Expression {
        match parse(&format!("{{ let x := {source} }}")).statements.remove(0) {
            Statement::VariableDeclaration(d) => d.value.unwrap(),
            _ => panic!("expected declaration"),
        }
    }

    #[test_case("1", 0 ; "literal")]
    #[test_case("y", 0 ; "identifier")]
    #[test_case("caller()", 0 ; "base tier")]
    #[test_case("add(y, 1)", 2 ; "very low tier")]
    #[test_case("add(mul(y, 2), 1)", 4 ; "nested")]
    #[test_case("sload(0)", 50 ; "expensive")]
    #[test_case("f(1)", 50 ; "user call")]
    fn costs(source: &str, cost: usize) {
        assert_eq!(CodeCost::code_cost(&value(source)), cost);
    }

    #[test_case("1", 0 ; "literal")]
    #[test_case("add(y, 1)", 1 ; "flat")]
    #[test_case("add(mul(y, 2), not(not(1)))", 3 ; "deepest branch counts")]
    #[test_case("f(g(h()))", 3 ; "user calls")]
    fn depths(source: &str, depth: usize) {
        assert_eq!(ExpressionDepth::depth(&value(source)), depth);
    }

    #[test]
    fn sizes() {
        let block = parse("{ let x := add(1, 2) function f() { pop(1) } { } }");
        assert_eq!(CodeSize::code_size(&block), 5);
        assert_eq!(CodeSize::code_size_including_functions(&block), 9);
    }
}
