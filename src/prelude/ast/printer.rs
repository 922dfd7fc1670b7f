//! Canonical single-line rendering of the AST.
//!
//! Printing is used for test comparisons and for `--mode print`, so equal
//! trees must always print to equal text.

use std::fmt::{Display, Formatter, Result};

use super::*;

fn join<T: Display>(f: &mut Formatter<'_>, items: &[T], separator: &str) -> Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn typed(f: &mut Formatter<'_>, name: &YulString, ty: &Type) -> Result {
    if ty.is_empty() {
        write!(f, "{name}")
    } else {
        write!(f, "{name}:{ty}")
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.kind {
            LiteralKind::String => write!(f, "\"{}\"", self.value)?,
            _ => write!(f, "{}", self.value)?,
        }
        if !self.ty.is_empty() {
            write!(f, ":{}", self.ty)?;
        }
        Ok(())
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name)
    }
}

impl Display for TypedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        typed(f, &self.name, &self.ty)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Expression::FunctionalInstruction(i) => {
                write!(f, "{}(", i.instruction)?;
                join(f, &i.arguments, ", ")?;
                f.write_str(")")
            }
            Expression::FunctionCall(c) => {
                write!(f, "{}(", c.function_name)?;
                join(f, &c.arguments, ", ")?;
                f.write_str(")")
            }
            Expression::Identifier(i) => write!(f, "{i}"),
            Expression::Literal(l) => write!(f, "{l}"),
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.statements.is_empty() {
            return f.write_str("{ }");
        }
        f.write_str("{ ")?;
        join(f, &self.statements, " ")?;
        f.write_str(" }")
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Statement::ExpressionStatement(s) => write!(f, "{}", s.expression),
            Statement::Assignment(a) => {
                join(f, &a.variable_names, ", ")?;
                write!(f, " := {}", a.value)
            }
            Statement::VariableDeclaration(d) => {
                f.write_str("let ")?;
                join(f, &d.variables, ", ")?;
                match &d.value {
                    Some(value) => write!(f, " := {value}"),
                    None => Ok(()),
                }
            }
            Statement::FunctionDefinition(d) => {
                write!(f, "function {}(", d.name)?;
                join(f, &d.parameters, ", ")?;
                f.write_str(")")?;
                if !d.return_variables.is_empty() {
                    f.write_str(" -> ")?;
                    join(f, &d.return_variables, ", ")?;
                }
                write!(f, " {}", d.body)
            }
            Statement::If(i) => write!(f, "if {} {}", i.condition, i.body),
            Statement::Switch(s) => {
                write!(f, "switch {}", s.expression)?;
                for case in &s.cases {
                    match &case.value {
                        Some(value) => write!(f, " case {value} {}", case.body)?,
                        None => write!(f, " default {}", case.body)?,
                    }
                }
                Ok(())
            }
            Statement::ForLoop(l) => {
                write!(f, "for {} {} {} {}", l.pre, l.condition, l.post, l.body)
            }
            Statement::Break(_) => f.write_str("break"),
            Statement::Continue(_) => f.write_str("continue"),
            Statement::Block(b) => write!(f, "{b}"),
            Statement::Label(l) => write!(f, "{}:", l.name),
            Statement::StackAssignment(s) => write!(f, "=: {}", s.variable_name),
        }
    }
}
