//! Forward data-flow over a block: which movable value each variable
//! currently holds.
//!
//! Passes that rewrite based on known values implement [`DataFlowHooks`]
//! and let [`DataFlowAnalyzer`] drive the traversal. The analyzer keeps the
//! state correct across assignments, branches, loops and function
//! boundaries so the hooks only ever see values that are still valid at
//! the node being visited.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::U256;
use anyhow::Result;
use tracing::trace;

use crate::{prelude::*, svm::Dialect};

use super::{
    name_collector::Assignments,
    semantics::{invalidates_state, MovableChecker},
};

/// Known values of variables at one point of the traversal.
#[derive(Debug, Clone, Default)]
pub struct DataFlowState {
    values: BTreeMap<YulString, Expression>,
    /// Variables read by the value of each key.
    references: BTreeMap<YulString, BTreeSet<YulString>>,
}

impl DataFlowState {
    pub fn value(&self, name: &str) -> Option<&Expression> {
        self.values.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&YulString, &Expression)> {
        self.values.iter()
    }

    /// The value of `expression` if it is a literal or a variable known to
    /// hold one.
    pub fn constant_value(&self, expression: &Expression) -> Option<U256> {
        match expression {
            Expression::Literal(literal) => literal.value().ok(),
            Expression::Identifier(identifier) => self
                .values
                .get(&identifier.name)
                .and_then(|value| self.constant_value(value)),
            _ => None,
        }
    }

    fn set(&mut self, name: YulString, value: Expression, references: BTreeSet<YulString>) {
        self.values.insert(name.clone(), value);
        self.references.insert(name, references);
    }

    /// Forgets `names` and every value that reads one of them.
    fn clear(&mut self, names: &BTreeSet<YulString>) {
        if names.is_empty() || self.values.is_empty() {
            return;
        }
        let stale: Vec<YulString> = self
            .references
            .iter()
            .filter(|(name, read)| names.contains(*name) || !read.is_disjoint(names))
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            self.values.remove(&name);
            self.references.remove(&name);
        }
    }

    fn clear_all(&mut self) {
        self.values.clear();
        self.references.clear();
    }
}

/// Override points for passes built on [`DataFlowAnalyzer`].
pub trait DataFlowHooks {
    /// Called before the children of `expression` are visited.
    fn enter_expression(&mut self, _state: &DataFlowState, _expression: &mut Expression) -> Result<()> {
        Ok(())
    }

    /// Called after the children of `expression` were visited.
    fn leave_expression(&mut self, _state: &DataFlowState, _expression: &mut Expression) -> Result<()> {
        Ok(())
    }

    /// Called before a statement is visited. Returning statements replaces
    /// it, and the replacement is visited next.
    fn replace_statement(
        &mut self,
        _state: &DataFlowState,
        _statement: &mut Statement,
    ) -> Result<Option<Vec<Statement>>> {
        Ok(None)
    }
}

pub struct DataFlowAnalyzer<'d, H> {
    dialect: &'d dyn Dialect,
    state: DataFlowState,
    /// Variables declared in each open block.
    variable_scopes: Vec<Vec<YulString>>,
    hooks: H,
}

impl<'d, H: DataFlowHooks> DataFlowAnalyzer<'d, H> {
    /// Traverses `block`, calling `hooks` along the way, and returns them.
    pub fn run(dialect: &'d dyn Dialect, block: &mut Block, hooks: H) -> Result<H> {
        let mut analyzer = Self {
            dialect,
            state: DataFlowState::default(),
            variable_scopes: Vec::new(),
            hooks,
        };
        analyzer.visit_block(block)?;
        Ok(analyzer.hooks)
    }

    fn visit_block(&mut self, block: &mut Block) -> Result<()> {
        self.variable_scopes.push(Vec::new());
        self.visit_statements(&mut block.statements)?;
        self.pop_scope();
        Ok(())
    }

    fn pop_scope(&mut self) {
        if let Some(names) = self.variable_scopes.pop() {
            self.state.clear(&names.into_iter().collect());
        }
    }

    fn declare(&mut self, names: impl IntoIterator<Item = YulString>) {
        if let Some(scope) = self.variable_scopes.last_mut() {
            scope.extend(names);
        }
    }

    fn visit_statements(&mut self, statements: &mut Vec<Statement>) -> Result<()> {
        let mut i = 0;
        while i < statements.len() {
            if let Some(replacement) = self.hooks.replace_statement(&self.state, &mut statements[i])? {
                statements.splice(i..=i, replacement);
                continue;
            }
            self.visit_statement(&mut statements[i])?;
            i += 1;
        }
        Ok(())
    }

    fn visit_statement(&mut self, statement: &mut Statement) -> Result<()> {
        match statement {
            Statement::ExpressionStatement(s) => self.visit_root_expression(&mut s.expression)?,
            Statement::Assignment(a) => {
                self.visit_root_expression(&mut a.value)?;
                let names = a.variable_names.iter().map(|v| v.name.clone()).collect();
                self.handle_assignment(names, Some(&a.value));
            }
            Statement::VariableDeclaration(d) => {
                if let Some(value) = &mut d.value {
                    self.visit_root_expression(value)?;
                }
                let names: BTreeSet<YulString> = d.variables.iter().map(|v| v.name.clone()).collect();
                self.declare(names.iter().cloned());
                match (&d.value, d.variables.as_slice()) {
                    (Some(value), _) => self.handle_assignment(names, Some(value)),
                    (None, [variable]) => {
                        let zero = Expression::Literal(Literal::zero(d.location, variable.ty.clone()));
                        self.handle_assignment(names, Some(&zero));
                    }
                    (None, _) => self.handle_assignment(names, None),
                }
            }
            Statement::FunctionDefinition(f) => {
                let outer_state = std::mem::take(&mut self.state);
                let outer_scopes = std::mem::take(&mut self.variable_scopes);
                self.variable_scopes.push(
                    f.parameters
                        .iter()
                        .chain(&f.return_variables)
                        .map(|v| v.name.clone())
                        .collect(),
                );
                let result = self.visit_block(&mut f.body);
                self.state = outer_state;
                self.variable_scopes = outer_scopes;
                result?;
            }
            Statement::If(i) => {
                self.visit_root_expression(&mut i.condition)?;
                self.visit_block(&mut i.body)?;
                self.state.clear(&Assignments::of_block(&i.body));
            }
            Statement::Switch(s) => {
                self.visit_root_expression(&mut s.expression)?;
                for case in &mut s.cases {
                    self.visit_block(&mut case.body)?;
                    self.state.clear(&Assignments::of_block(&case.body));
                }
            }
            Statement::ForLoop(l) => {
                self.variable_scopes.push(Vec::new());
                self.visit_statements(&mut l.pre.statements)?;

                let mut assigned = Assignments::of_block(&l.body);
                assigned.extend(Assignments::of_block(&l.post));
                self.state.clear(&assigned);

                self.visit_root_expression(&mut l.condition)?;
                self.visit_block(&mut l.body)?;
                self.state.clear(&assigned);
                self.visit_block(&mut l.post)?;
                self.state.clear(&assigned);
                self.pop_scope();
            }
            Statement::Block(b) => self.visit_block(b)?,
            Statement::Label(_) => self.state.clear_all(),
            Statement::StackAssignment(s) => {
                self.state.clear(&BTreeSet::from([s.variable_name.name.clone()]));
            }
            Statement::Break(_) | Statement::Continue(_) => {}
        }
        Ok(())
    }

    fn handle_assignment(&mut self, names: BTreeSet<YulString>, value: Option<&Expression>) {
        self.state.clear(&names);
        let (Some(value), Some(name)) = (value, names.first()) else {
            return;
        };
        if names.len() != 1 {
            return;
        }
        let checker = MovableChecker::of_expression(self.dialect, value);
        if checker.movable() && !checker.referenced_variables().contains(name) {
            trace!("{name} := {value}");
            self.state
                .set(name.clone(), value.clone(), checker.referenced_variables().clone());
        }
    }

    /// Visits the full expression of a statement.
    fn visit_root_expression(&mut self, expression: &mut Expression) -> Result<()> {
        self.visit_expression(expression)?;
        if invalidates_state(self.dialect, expression) {
            self.state.clear_all();
        }
        Ok(())
    }

    fn visit_expression(&mut self, expression: &mut Expression) -> Result<()> {
        self.hooks.enter_expression(&self.state, expression)?;
        match expression {
            Expression::FunctionalInstruction(i) => {
                for argument in i.arguments.iter_mut().rev() {
                    self.visit_expression(argument)?;
                }
            }
            Expression::FunctionCall(c) => {
                let literal_arguments = self
                    .dialect
                    .builtin(&c.function_name.name)
                    .is_some_and(|b| b.literal_arguments);
                if !literal_arguments {
                    for argument in c.arguments.iter_mut().rev() {
                        self.visit_expression(argument)?;
                    }
                }
            }
            Expression::Identifier(_) | Expression::Literal(_) => {}
        }
        self.hooks.leave_expression(&self.state, expression)
    }
}
