//! Small collectors over the AST: declared names, references and
//! assignment targets.

use std::collections::{BTreeMap, BTreeSet};

use crate::prelude::*;

use super::ast_walker::{walk_expression, walk_statement, AstWalker};

/// Counts declarations of every name: variables, functions, parameters
/// and return variables.
#[derive(Debug, Default)]
pub struct NameCollector {
    declarations: BTreeMap<YulString, usize>,
}

impl NameCollector {
    pub fn collect(block: &Block) -> BTreeSet<YulString> {
        Self::count_declarations(block).into_keys().collect()
    }

    pub fn count_declarations(block: &Block) -> BTreeMap<YulString, usize> {
        let mut collector = Self::default();
        collector.visit_block(block);
        collector.declarations
    }

    fn add(&mut self, name: &YulString) {
        *self.declarations.entry(name.clone()).or_default() += 1;
    }
}

impl AstWalker for NameCollector {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VariableDeclaration(d) => {
                for variable in &d.variables {
                    self.add(&variable.name);
                }
            }
            Statement::FunctionDefinition(f) => {
                self.add(&f.name);
                for variable in f.parameters.iter().chain(&f.return_variables) {
                    self.add(&variable.name);
                }
            }
            Statement::Label(l) => self.add(&l.name),
            _ => {}
        }
        walk_statement(self, statement);
    }
}

/// Counts how often each variable is read and each function is called.
#[derive(Debug, Default)]
pub struct ReferencesCounter {
    references: BTreeMap<YulString, usize>,
}

impl ReferencesCounter {
    pub fn count_references(block: &Block) -> BTreeMap<YulString, usize> {
        let mut counter = Self::default();
        counter.visit_block(block);
        counter.references
    }

    pub fn count_references_in_expression(expression: &Expression) -> BTreeMap<YulString, usize> {
        let mut counter = Self::default();
        counter.visit_expression(expression);
        counter.references
    }
}

impl AstWalker for ReferencesCounter {
    fn visit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Identifier(identifier) => {
                *self.references.entry(identifier.name.clone()).or_default() += 1;
            }
            Expression::FunctionCall(call) => {
                *self
                    .references
                    .entry(call.function_name.name.clone())
                    .or_default() += 1;
            }
            _ => {}
        }
        walk_expression(self, expression);
    }
}

/// Names of all variables assigned to, not counting declarations.
#[derive(Debug, Default)]
pub struct Assignments {
    names: BTreeSet<YulString>,
}

impl Assignments {
    pub fn of_block(block: &Block) -> BTreeSet<YulString> {
        let mut assignments = Self::default();
        assignments.visit_block(block);
        assignments.names
    }
}

impl AstWalker for Assignments {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assignment(a) => {
                self.names
                    .extend(a.variable_names.iter().map(|v| v.name.clone()));
            }
            Statement::StackAssignment(s) => {
                self.names.insert(s.variable_name.name.clone());
            }
            _ => {}
        }
        walk_statement(self, statement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn parse(source: &str) -> Block {
        YulParser::parse(source, &SvmDialect::strict_assembly()).unwrap()
    }

    #[test]
    fn collects_declarations() {
        let block = parse("{ let a, b := f(1) function f(x) -> y { let z } { let a } }");
        let names: Vec<_> = NameCollector::collect(&block)
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "f", "x", "y", "z"]);
        assert_eq!(NameCollector::count_declarations(&block)["a"], 2);
    }

    #[test]
    fn counts_references() {
        let block = parse("{ let a := 1 let b := add(a, a) pop(f(b)) function f(x) -> y { y := x } }");
        let references = ReferencesCounter::count_references(&block);
        assert_eq!(references["a"], 2);
        assert_eq!(references["b"], 1);
        assert_eq!(references["f"], 1);
        assert_eq!(references["x"], 1);
        assert!(!references.contains_key("y"));
    }

    #[test]
    fn collects_assignment_targets() {
        let block = parse("{ let a := 1 let b a := 2 for { } 1 { b := 3 } { } }");
        let names: Vec<_> = Assignments::of_block(&block)
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
