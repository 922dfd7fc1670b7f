//! Name resolution and well-formedness checks.
//!
//! [`Analyzer::analyze`] builds an [`AnalysisInfo`] that maps every block
//! and function definition of a tree to its scope. The info borrows the
//! tree, so it can not outlive it or observe a mutation. Passes that change
//! the tree re-run the analyzer afterwards.

pub mod scope;

use std::{collections::HashMap, marker::PhantomData};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::{
    common::YulError,
    prelude::*,
    svm::{AsmFlavour, Dialect},
};

pub use scope::{DeclarationId, ScopeId, Scopes, Symbol};

pub struct AnalysisInfo<'a> {
    pub scopes: Scopes,
    block_scopes: HashMap<*const Block, ScopeId>,
    function_scopes: HashMap<*const FunctionDefinition, ScopeId>,
    _ast: PhantomData<&'a Block>,
}

impl<'a> AnalysisInfo<'a> {
    pub fn scope_of(&self, block: &Block) -> Result<ScopeId> {
        self.block_scopes
            .get(&(block as *const Block))
            .copied()
            .ok_or_else(|| YulError::internal(block.location, "Block was not analysed").into())
    }

    /// The scope holding a function's parameters and return variables.
    pub fn function_scope_of(&self, function: &FunctionDefinition) -> Result<ScopeId> {
        self.function_scopes
            .get(&(function as *const FunctionDefinition))
            .copied()
            .ok_or_else(|| {
                YulError::internal(function.location, "Function was not analysed").into()
            })
    }
}

pub struct Analyzer<'d, 'a> {
    dialect: &'d dyn Dialect,
    info: AnalysisInfo<'a>,
    scope: Option<ScopeId>,
    loop_depth: usize,
}

fn analysis_error(location: SourceLocation, message: String) -> anyhow::Error {
    YulError::analysis(location, message).into()
}

impl<'d, 'a> Analyzer<'d, 'a> {
    #[instrument(level = "debug", skip_all)]
    pub fn analyze(dialect: &'d dyn Dialect, ast: &'a Block) -> Result<AnalysisInfo<'a>> {
        let mut analyzer = Self {
            dialect,
            info: AnalysisInfo {
                scopes: Scopes::default(),
                block_scopes: HashMap::new(),
                function_scopes: HashMap::new(),
                _ast: PhantomData,
            },
            scope: None,
            loop_depth: 0,
        };
        analyzer.block(ast)?;
        debug!("analysis succeeded");
        Ok(analyzer.info)
    }

    fn current_scope(&self, location: SourceLocation) -> Result<ScopeId> {
        self.scope
            .ok_or_else(|| YulError::internal(location, "No active scope").into())
    }

    fn enter_block(&mut self, block: &'a Block) -> Result<Option<ScopeId>> {
        let outer = self.scope;
        let id = self.info.scopes.new_scope(outer, false);
        self.info.block_scopes.insert(block as *const Block, id);
        self.scope = Some(id);
        self.hoist(block)?;
        Ok(outer)
    }

    fn block(&mut self, block: &'a Block) -> Result<()> {
        let outer = self.enter_block(block)?;
        for statement in &block.statements {
            self.statement(statement)?;
        }
        self.scope = outer;
        Ok(())
    }

    /// Functions and labels are visible in their whole block.
    fn hoist(&mut self, block: &'a Block) -> Result<()> {
        for statement in &block.statements {
            match statement {
                Statement::FunctionDefinition(function) => {
                    let symbol = Symbol::Function {
                        arguments: function.parameters.iter().map(|p| p.ty.clone()).collect(),
                        returns: function
                            .return_variables
                            .iter()
                            .map(|r| r.ty.clone())
                            .collect(),
                    };
                    self.declare(function.location, &function.name, symbol)?;
                }
                Statement::Label(label) => {
                    self.declare(label.location, &label.name, Symbol::Label)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare(&mut self, location: SourceLocation, name: &YulString, symbol: Symbol) -> Result<()> {
        let scope = self.current_scope(location)?;
        if self.dialect.is_reserved(name) {
            return Err(analysis_error(
                location,
                format!("Cannot use builtin name \"{name}\" as identifier"),
            ));
        }
        if name.is_empty()
            || self.info.scopes.exists(scope, name)
            || !self.info.scopes.register(scope, name.clone(), symbol)
        {
            return Err(analysis_error(
                location,
                format!("Identifier \"{name}\" already declared"),
            ));
        }
        Ok(())
    }

    fn declare_variable(&mut self, variable: &TypedName) -> Result<()> {
        let symbol = Symbol::Variable {
            ty: variable.ty.clone(),
        };
        self.declare(variable.location, &variable.name, symbol)
    }

    fn statement(&mut self, statement: &'a Statement) -> Result<()> {
        match statement {
            Statement::ExpressionStatement(s) => {
                let deposit = self.expression(&s.expression)?;
                if deposit != 0 && self.dialect.flavour() != AsmFlavour::Loose {
                    return Err(analysis_error(
                        s.location,
                        format!("Top-level expressions are not supposed to return values (this expression returns {deposit} values). Use ``pop()`` or assign them."),
                    ));
                }
            }
            Statement::Assignment(a) => {
                self.expect_deposit(&a.value, a.variable_names.len())?;
                for variable in &a.variable_names {
                    self.expect_variable(variable)?;
                }
            }
            Statement::VariableDeclaration(d) => {
                if let Some(value) = &d.value {
                    self.expect_deposit(value, d.variables.len())?;
                }
                for variable in &d.variables {
                    self.declare_variable(variable)?;
                }
            }
            Statement::FunctionDefinition(f) => self.function_definition(f)?,
            Statement::If(i) => {
                self.expect_deposit(&i.condition, 1)?;
                self.block(&i.body)?;
            }
            Statement::Switch(s) => self.switch(s)?,
            Statement::ForLoop(l) => self.for_loop(l)?,
            Statement::Break(Break { location }) | Statement::Continue(Continue { location }) => {
                if self.loop_depth == 0 {
                    return Err(analysis_error(
                        *location,
                        "Keyword \"break\" or \"continue\" needs to be inside a for-loop body"
                            .to_string(),
                    ));
                }
            }
            Statement::Block(b) => self.block(b)?,
            Statement::Label(_) => {}
            Statement::StackAssignment(s) => self.expect_variable(&s.variable_name)?,
        }
        Ok(())
    }

    fn function_definition(&mut self, function: &'a FunctionDefinition) -> Result<()> {
        let outer = self.scope;
        let scope = self.info.scopes.new_scope(outer, true);
        self.info
            .function_scopes
            .insert(function as *const FunctionDefinition, scope);
        self.scope = Some(scope);
        for variable in function.parameters.iter().chain(&function.return_variables) {
            self.declare_variable(variable)?;
        }
        let loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.block(&function.body)?;
        self.loop_depth = loop_depth;
        self.scope = outer;
        Ok(())
    }

    fn switch(&mut self, switch: &'a Switch) -> Result<()> {
        self.expect_deposit(&switch.expression, 1)?;
        let mut seen = Vec::new();
        for case in &switch.cases {
            if let Some(value) = &case.value {
                self.literal(value)?;
                let value = value.value()?;
                if seen.contains(&value) {
                    return Err(analysis_error(case.location, "Duplicate case defined".to_string()));
                }
                seen.push(value);
            }
            self.block(&case.body)?;
        }
        Ok(())
    }

    fn for_loop(&mut self, for_loop: &'a ForLoop) -> Result<()> {
        let outer = self.enter_block(&for_loop.pre)?;
        for statement in &for_loop.pre.statements {
            self.statement(statement)?;
        }
        self.expect_deposit(&for_loop.condition, 1)?;

        self.loop_depth += 1;
        self.block(&for_loop.body)?;
        self.loop_depth -= 1;

        let loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.block(&for_loop.post)?;
        self.loop_depth = loop_depth;

        self.scope = outer;
        Ok(())
    }

    fn expect_variable(&self, identifier: &Identifier) -> Result<()> {
        let scope = self.current_scope(identifier.location)?;
        match self.info.scopes.lookup(scope, &identifier.name) {
            Some((_, Symbol::Variable { .. })) => Ok(()),
            Some(_) => Err(analysis_error(
                identifier.location,
                format!("Assignment requires variable, \"{}\" is not one", identifier.name),
            )),
            None => Err(analysis_error(
                identifier.location,
                format!("Variable not found or variable not lvalue: \"{}\"", identifier.name),
            )),
        }
    }

    fn expect_deposit(&mut self, expression: &'a Expression, expected: usize) -> Result<()> {
        let deposit = self.expression(expression)?;
        if deposit != expected {
            return Err(analysis_error(
                expression.location(),
                format!("Expected expression to return {expected} item(s) to the stack, but it returns {deposit}"),
            ));
        }
        Ok(())
    }

    fn literal(&self, literal: &Literal) -> Result<()> {
        literal
            .value()
            .map_err(|e| analysis_error(literal.location, e.to_string()))?;
        Ok(())
    }

    /// Returns the number of stack slots the expression produces.
    fn expression(&mut self, expression: &'a Expression) -> Result<usize> {
        match expression {
            Expression::Literal(literal) => {
                self.literal(literal)?;
                Ok(1)
            }
            Expression::Identifier(identifier) => {
                let scope = self.current_scope(identifier.location)?;
                match self.info.scopes.lookup(scope, &identifier.name) {
                    Some((_, Symbol::Variable { .. } | Symbol::Label)) => Ok(1),
                    Some((_, Symbol::Function { .. })) => Err(analysis_error(
                        identifier.location,
                        format!("Function \"{}\" used without being called", identifier.name),
                    )),
                    None => Err(analysis_error(
                        identifier.location,
                        format!("Identifier not found: \"{}\"", identifier.name),
                    )),
                }
            }
            Expression::FunctionalInstruction(instruction) => {
                let info = instruction.instruction.info();
                self.arguments(instruction.location, &instruction.arguments, info.args)?;
                Ok(info.returns)
            }
            Expression::FunctionCall(call) => self.function_call(call),
        }
    }

    fn arguments(
        &mut self,
        location: SourceLocation,
        arguments: &'a [Expression],
        expected: usize,
    ) -> Result<()> {
        if arguments.len() != expected {
            return Err(analysis_error(
                location,
                format!(
                    "Function expects {expected} arguments but got {}",
                    arguments.len()
                ),
            ));
        }
        for argument in arguments.iter().rev() {
            self.expect_deposit(argument, 1)?;
        }
        Ok(())
    }

    fn function_call(&mut self, call: &'a FunctionCall) -> Result<usize> {
        let name = &call.function_name.name;
        let dialect = self.dialect;
        if let Some(builtin) = dialect.builtin(name) {
            if builtin.literal_arguments {
                if call.arguments.len() != builtin.parameters.len() {
                    return Err(analysis_error(
                        call.location,
                        format!("Function expects {} arguments", builtin.parameters.len()),
                    ));
                }
                for argument in &call.arguments {
                    match argument {
                        Expression::Literal(literal) if literal.kind == LiteralKind::String => {}
                        _ => {
                            return Err(analysis_error(
                                argument.location(),
                                "Function expects direct literals as arguments".to_string(),
                            ))
                        }
                    }
                }
            } else {
                self.arguments(call.location, &call.arguments, builtin.parameters.len())?;
            }
            return Ok(builtin.returns.len());
        }

        let scope = self.current_scope(call.location)?;
        match self.info.scopes.lookup(scope, name) {
            Some((_, Symbol::Function { arguments, returns })) => {
                let (arguments, returns) = (arguments.len(), returns.len());
                self.arguments(call.location, &call.arguments, arguments)?;
                Ok(returns)
            }
            Some(_) => Err(analysis_error(
                call.location,
                format!("Attempt to call variable instead of function: \"{name}\""),
            )),
            None => Err(analysis_error(
                call.location,
                format!("Function not found: \"{name}\""),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn analyze(source: &str) -> Result<()> {
        let dialect = SvmDialect::strict_assembly_for_objects();
        let ast = YulParser::parse(source, &dialect)?;
        Analyzer::analyze(&dialect, &ast)?;
        Ok(())
    }

    #[test_case("{ let x := 1 { let y := x } }" ; "nested blocks")]
    #[test_case("{ f() function f() { g() } function g() { } }" ; "hoisted functions")]
    #[test_case("{ for { let i := 0 } lt(i, 3) { i := add(i, 1) } { if i { break } } }" ; "loop")]
    #[test_case("{ function f(a) -> b { b := a } let x := f(1) }" ; "call")]
    #[test_case("{ { let x := 1 } { let x := 2 } }" ; "sibling scopes")]
    #[test_case("{ pop(datasize(\"x\")) }" ; "literal builtin argument")]
    fn valid(source: &str) {
        analyze(source).unwrap();
    }

    #[test_case("{ let x := y }" ; "undeclared")]
    #[test_case("{ let x := x }" ; "own initializer")]
    #[test_case("{ let x := 1 { let x := 2 } }" ; "shadowing")]
    #[test_case("{ let x := 1 function f() { pop(x) } }" ; "outer variable in function")]
    #[test_case("{ break }" ; "break outside loop")]
    #[test_case("{ for { } 1 { } { function f() { break } } }" ; "break in nested function")]
    #[test_case("{ for { } 1 { break } { } }" ; "break in post")]
    #[test_case("{ add(1, 2) }" ; "unused value")]
    #[test_case("{ let x := add(1) }" ; "wrong arity")]
    #[test_case("{ let a, b := 1 }" ; "deposit mismatch")]
    #[test_case("{ function f() {} let x := f }" ; "function as value")]
    #[test_case("{ let add := 1 }" ; "builtin name")]
    #[test_case("{ switch 1 case 1 { } case 0x1 { } }" ; "duplicate case")]
    #[test_case("{ let s := \"x\" pop(datasize(s)) }" ; "non literal builtin argument")]
    #[test_case("{ x := 1 }" ; "assign undeclared")]
    fn invalid(source: &str) {
        let error = analyze(source).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<YulError>(),
            Some(YulError::Analysis { .. })
        ));
    }

    #[test]
    fn scopes_are_keyed_by_node() {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse("{ function f(a) { let b := a } { let c := 1 } }", &dialect)
            .unwrap();
        let info = Analyzer::analyze(&dialect, &ast).unwrap();
        let root = info.scope_of(&ast).unwrap();
        let Statement::FunctionDefinition(function) = &ast.statements[0] else {
            panic!("expected function");
        };
        let parameters = info.function_scope_of(function).unwrap();
        let body = info.scope_of(&function.body).unwrap();
        assert_eq!(info.scopes.get(body).super_scope, Some(parameters));
        assert_eq!(info.scopes.get(parameters).super_scope, Some(root));
        assert_eq!(info.scopes.number_of_variables(parameters), 1);
        assert_eq!(info.scopes.number_of_variables(body), 1);
        assert_eq!(info.scopes.number_of_variables(root), 0);
    }
}
