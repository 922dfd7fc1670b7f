//! Generic traversals over the AST.
//!
//! Implementors override the `visit_*` methods they care about and call the
//! matching `walk_*` function to continue into children. Call arguments are
//! visited right to left, which is their evaluation order. Loop bodies are
//! visited before the post block.

use crate::prelude::*;

pub trait AstWalker {
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        walk_expression(self, expression);
    }
}

pub fn walk_block<W: AstWalker + ?Sized>(walker: &mut W, block: &Block) {
    for statement in &block.statements {
        walker.visit_statement(statement);
    }
}

pub fn walk_statement<W: AstWalker + ?Sized>(walker: &mut W, statement: &Statement) {
    match statement {
        Statement::ExpressionStatement(s) => walker.visit_expression(&s.expression),
        Statement::Assignment(a) => walker.visit_expression(&a.value),
        Statement::VariableDeclaration(d) => {
            if let Some(value) = &d.value {
                walker.visit_expression(value);
            }
        }
        Statement::FunctionDefinition(f) => walker.visit_block(&f.body),
        Statement::If(i) => {
            walker.visit_expression(&i.condition);
            walker.visit_block(&i.body);
        }
        Statement::Switch(s) => {
            walker.visit_expression(&s.expression);
            for case in &s.cases {
                walker.visit_block(&case.body);
            }
        }
        Statement::ForLoop(l) => {
            walker.visit_block(&l.pre);
            walker.visit_expression(&l.condition);
            walker.visit_block(&l.body);
            walker.visit_block(&l.post);
        }
        Statement::Block(b) => walker.visit_block(b),
        Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Label(_)
        | Statement::StackAssignment(_) => {}
    }
}

pub fn walk_expression<W: AstWalker + ?Sized>(walker: &mut W, expression: &Expression) {
    match expression {
        Expression::FunctionalInstruction(i) => {
            for argument in i.arguments.iter().rev() {
                walker.visit_expression(argument);
            }
        }
        Expression::FunctionCall(c) => {
            for argument in c.arguments.iter().rev() {
                walker.visit_expression(argument);
            }
        }
        Expression::Identifier(_) | Expression::Literal(_) => {}
    }
}

pub trait AstModifier {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
    }

    fn visit_statement(&mut self, statement: &mut Statement) {
        walk_statement_mut(self, statement);
    }

    fn visit_expression(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression);
    }
}

pub fn walk_block_mut<M: AstModifier + ?Sized>(modifier: &mut M, block: &mut Block) {
    for statement in &mut block.statements {
        modifier.visit_statement(statement);
    }
}

pub fn walk_statement_mut<M: AstModifier + ?Sized>(modifier: &mut M, statement: &mut Statement) {
    match statement {
        Statement::ExpressionStatement(s) => modifier.visit_expression(&mut s.expression),
        Statement::Assignment(a) => modifier.visit_expression(&mut a.value),
        Statement::VariableDeclaration(d) => {
            if let Some(value) = &mut d.value {
                modifier.visit_expression(value);
            }
        }
        Statement::FunctionDefinition(f) => modifier.visit_block(&mut f.body),
        Statement::If(i) => {
            modifier.visit_expression(&mut i.condition);
            modifier.visit_block(&mut i.body);
        }
        Statement::Switch(s) => {
            modifier.visit_expression(&mut s.expression);
            for case in &mut s.cases {
                modifier.visit_block(&mut case.body);
            }
        }
        Statement::ForLoop(l) => {
            modifier.visit_block(&mut l.pre);
            modifier.visit_expression(&mut l.condition);
            modifier.visit_block(&mut l.body);
            modifier.visit_block(&mut l.post);
        }
        Statement::Block(b) => modifier.visit_block(b),
        Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Label(_)
        | Statement::StackAssignment(_) => {}
    }
}

pub fn walk_expression_mut<M: AstModifier + ?Sized>(modifier: &mut M, expression: &mut Expression) {
    match expression {
        Expression::FunctionalInstruction(i) => {
            for argument in i.arguments.iter_mut().rev() {
                modifier.visit_expression(argument);
            }
        }
        Expression::FunctionCall(c) => {
            for argument in c.arguments.iter_mut().rev() {
                modifier.visit_expression(argument);
            }
        }
        Expression::Identifier(_) | Expression::Literal(_) => {}
    }
}

/// Replaces statements of `statements` in place. `replace` returns `None`
/// to keep a statement or the statements to put in its place.
pub fn iterate_replacing(
    statements: &mut Vec<Statement>,
    mut replace: impl FnMut(&mut Statement) -> Option<Vec<Statement>>,
) {
    let mut i = 0;
    while i < statements.len() {
        match replace(&mut statements[i]) {
            Some(replacement) => {
                let n = replacement.len();
                statements.splice(i..=i, replacement);
                i += n;
            }
            None => i += 1,
        }
    }
}
