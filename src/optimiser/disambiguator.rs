//! Renames every declared identifier so that names are unique in the whole
//! tree. The result is a fresh copy; the input is only read.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use tracing::instrument;

use crate::{
    analysis::{AnalysisInfo, DeclarationId, ScopeId},
    common::YulError,
    yul_assert,
    prelude::*,
    svm::Dialect,
};

use super::name_dispenser::NameDispenser;

pub struct Disambiguator<'d, 'i, 'a> {
    dialect: &'d dyn Dialect,
    info: &'i AnalysisInfo<'a>,
    externally_used: &'i BTreeSet<YulString>,
    name_dispenser: NameDispenser<'d>,
    scopes: Vec<ScopeId>,
    translations: HashMap<DeclarationId, YulString>,
}

impl<'d, 'i, 'a> Disambiguator<'d, 'i, 'a> {
    /// Names in `externally_used` are never renamed and never handed out.
    #[instrument(level = "debug", skip_all)]
    pub fn run(
        dialect: &'d dyn Dialect,
        ast: &Block,
        info: &'i AnalysisInfo<'a>,
        externally_used: &'i BTreeSet<YulString>,
    ) -> Result<Block> {
        let mut disambiguator = Self {
            dialect,
            info,
            externally_used,
            name_dispenser: NameDispenser::new(dialect, externally_used.clone()),
            scopes: Vec::new(),
            translations: HashMap::new(),
        };
        disambiguator.translate_block(ast)
    }

    fn translate_identifier(&mut self, location: SourceLocation, name: &YulString) -> Result<YulString> {
        if self.dialect.builtin(name).is_some() || self.externally_used.contains(name) {
            return Ok(name.clone());
        }
        let declaration = self
            .scopes
            .last()
            .and_then(|scope| self.info.scopes.lookup(*scope, name))
            .map(|(declaration, _)| declaration);
        let Some(declaration) = declaration else {
            return Err(YulError::internal(location, format!("Unresolved identifier {name}")).into());
        };
        if let Some(translation) = self.translations.get(&declaration) {
            return Ok(translation.clone());
        }
        let translation = self.name_dispenser.new_name(name);
        self.translations.insert(declaration, translation.clone());
        Ok(translation)
    }

    fn leave_scope(&mut self, entered: ScopeId, location: SourceLocation) -> Result<()> {
        let left = self.scopes.pop();
        yul_assert!(
            left == Some(entered),
            location,
            "Left scope {:?} while inside {:?}",
            left,
            entered
        );
        Ok(())
    }

    fn translate_block(&mut self, block: &Block) -> Result<Block> {
        let scope = self.info.scope_of(block)?;
        self.scopes.push(scope);
        let statements = self.translate_statements(&block.statements)?;
        self.leave_scope(scope, block.location)?;
        Ok(Block {
            location: block.location,
            statements,
        })
    }

    fn translate_statements(&mut self, statements: &[Statement]) -> Result<Vec<Statement>> {
        statements
            .iter()
            .map(|statement| self.translate_statement(statement))
            .collect()
    }

    fn translate_typed_names(&mut self, names: &[TypedName]) -> Result<TypedNameList> {
        names
            .iter()
            .map(|typed| {
                Ok(TypedName {
                    location: typed.location,
                    name: self.translate_identifier(typed.location, &typed.name)?,
                    ty: typed.ty.clone(),
                })
            })
            .collect()
    }

    fn translate_name(&mut self, identifier: &Identifier) -> Result<Identifier> {
        Ok(Identifier {
            location: identifier.location,
            name: self.translate_identifier(identifier.location, &identifier.name)?,
        })
    }

    fn translate_statement(&mut self, statement: &Statement) -> Result<Statement> {
        Ok(match statement {
            Statement::ExpressionStatement(s) => Statement::ExpressionStatement(ExpressionStatement {
                location: s.location,
                expression: self.translate_expression(&s.expression)?,
            }),
            Statement::Assignment(a) => Statement::Assignment(Assignment {
                location: a.location,
                variable_names: a
                    .variable_names
                    .iter()
                    .map(|v| self.translate_name(v))
                    .collect::<Result<_>>()?,
                value: self.translate_expression(&a.value)?,
            }),
            Statement::VariableDeclaration(d) => Statement::VariableDeclaration(VariableDeclaration {
                location: d.location,
                variables: self.translate_typed_names(&d.variables)?,
                value: d
                    .value
                    .as_ref()
                    .map(|v| self.translate_expression(v))
                    .transpose()?,
            }),
            Statement::FunctionDefinition(f) => {
                let name = self.translate_identifier(f.location, &f.name)?;
                let scope = self.info.function_scope_of(f)?;
                self.scopes.push(scope);
                let parameters = self.translate_typed_names(&f.parameters)?;
                let return_variables = self.translate_typed_names(&f.return_variables)?;
                let body = self.translate_block(&f.body)?;
                self.leave_scope(scope, f.location)?;
                Statement::FunctionDefinition(FunctionDefinition {
                    location: f.location,
                    name,
                    parameters,
                    return_variables,
                    body,
                })
            }
            Statement::If(i) => Statement::If(If {
                location: i.location,
                condition: self.translate_expression(&i.condition)?,
                body: self.translate_block(&i.body)?,
            }),
            Statement::Switch(s) => Statement::Switch(Switch {
                location: s.location,
                expression: self.translate_expression(&s.expression)?,
                cases: s
                    .cases
                    .iter()
                    .map(|case| {
                        Ok(Case {
                            location: case.location,
                            value: case.value.clone(),
                            body: self.translate_block(&case.body)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            }),
            Statement::ForLoop(l) => {
                self.scopes.push(self.info.scope_of(&l.pre)?);
                let pre = Block {
                    location: l.pre.location,
                    statements: self.translate_statements(&l.pre.statements)?,
                };
                let condition = self.translate_expression(&l.condition)?;
                let post = self.translate_block(&l.post)?;
                let body = self.translate_block(&l.body)?;
                self.scopes.pop();
                Statement::ForLoop(ForLoop {
                    location: l.location,
                    pre,
                    condition,
                    post,
                    body,
                })
            }
            Statement::Break(b) => Statement::Break(b.clone()),
            Statement::Continue(c) => Statement::Continue(c.clone()),
            Statement::Block(b) => Statement::Block(self.translate_block(b)?),
            Statement::Label(l) => Statement::Label(Label {
                location: l.location,
                name: self.translate_identifier(l.location, &l.name)?,
            }),
            Statement::StackAssignment(s) => Statement::StackAssignment(StackAssignment {
                location: s.location,
                variable_name: self.translate_name(&s.variable_name)?,
            }),
        })
    }

    fn translate_expression(&mut self, expression: &Expression) -> Result<Expression> {
        Ok(match expression {
            Expression::Literal(literal) => Expression::Literal(literal.clone()),
            Expression::Identifier(identifier) => {
                Expression::Identifier(self.translate_name(identifier)?)
            }
            Expression::FunctionalInstruction(i) => {
                Expression::FunctionalInstruction(FunctionalInstruction {
                    location: i.location,
                    instruction: i.instruction,
                    arguments: self.translate_arguments(&i.arguments)?,
                })
            }
            Expression::FunctionCall(c) => Expression::FunctionCall(FunctionCall {
                location: c.location,
                function_name: self.translate_name(&c.function_name)?,
                arguments: self.translate_arguments(&c.arguments)?,
            }),
        })
    }

    /// Arguments are translated right to left so fresh names follow
    /// evaluation order.
    fn translate_arguments(&mut self, arguments: &[Expression]) -> Result<Vec<Expression>> {
        let mut translated = arguments
            .iter()
            .rev()
            .map(|argument| self.translate_expression(argument))
            .collect::<Result<Vec<_>>>()?;
        translated.reverse();
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::Analyzer,
        optimiser::name_collector::NameCollector,
        parser::YulParser,
        svm::SvmDialect,
    };

    fn disambiguate(source: &str) -> String {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse(source, &dialect).unwrap();
        let info = Analyzer::analyze(&dialect, &ast).unwrap();
        let result = Disambiguator::run(&dialect, &ast, &info, &BTreeSet::new()).unwrap();
        Analyzer::analyze(&dialect, &result).unwrap();
        result.to_string()
    }

    fn expect(source: &str, expected: &str) {
        let dialect = SvmDialect::strict_assembly();
        let expected = YulParser::parse(expected, &dialect).unwrap().to_string();
        assert_eq!(disambiguate(source), expected);
    }

    #[test]
    fn sibling_scopes_get_distinct_names() {
        expect(
            "{ { let a := 1 } { let a := 2 pop(a) } }",
            "{ { let a := 1 } { let a_1 := 2 pop(a_1) } }",
        );
    }

    #[test]
    fn functions_and_parameters() {
        expect(
            "{ { function f(a) -> b { b := a } } { function f(a) -> b { b := f(a) } } }",
            "{ { function f(a) -> b { b := a } } { function f_1(a_2) -> b_3 { b_3 := f_1(a_2) } } }",
        );
    }

    #[test]
    fn loops_and_switches() {
        expect(
            "{ for { let i := 0 } lt(i, 2) { i := add(i, 1) } { let x := i } for { let i := 0 } 0 { } { let x := i } switch 1 case 1 { let x := 2 } }",
            "{ for { let i := 0 } lt(i, 2) { i := add(i, 1) } { let x := i } for { let i_1 := 0 } 0 { } { let x_2 := i_1 } switch 1 case 1 { let x_3 := 2 } }",
        );
    }

    #[test]
    fn reserved_names_are_kept() {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse("{ { let a := 1 } { let a := 2 } }", &dialect).unwrap();
        let info = Analyzer::analyze(&dialect, &ast).unwrap();
        let reserved = ["a".into()].into_iter().collect();
        let result = Disambiguator::run(&dialect, &ast, &info, &reserved).unwrap();
        assert_eq!(result.to_string(), "{ { let a := 1 } { let a := 2 } }");
    }

    #[test]
    fn leaving_a_scope_out_of_order_is_an_internal_error() {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse("{ { let a := 1 } }", &dialect).unwrap();
        let info = Analyzer::analyze(&dialect, &ast).unwrap();
        let Statement::Block(inner) = &ast.statements[0] else {
            panic!("expected a nested block");
        };
        let outer = info.scope_of(&ast).unwrap();
        let inner = info.scope_of(inner).unwrap();
        let reserved = BTreeSet::new();
        let mut disambiguator = Disambiguator {
            dialect: &dialect,
            info: &info,
            externally_used: &reserved,
            name_dispenser: NameDispenser::new(&dialect, BTreeSet::new()),
            scopes: vec![outer, inner],
            translations: HashMap::new(),
        };
        let error = disambiguator.leave_scope(outer, ast.location).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<YulError>(),
            Some(YulError::Internal { .. })
        ));
        assert!(disambiguator.leave_scope(outer, ast.location).is_ok());
    }

    #[test]
    fn result_declares_every_name_once() {
        let dialect = SvmDialect::strict_assembly();
        let source = "{ { let x := 1 let y := x } { let x := 2 { let y := x } } function f(x) -> y { { let z := x } { let z := y } } }";
        let ast = YulParser::parse(source, &dialect).unwrap();
        let info = Analyzer::analyze(&dialect, &ast).unwrap();
        let result = Disambiguator::run(&dialect, &ast, &info, &BTreeSet::new()).unwrap();
        assert!(NameCollector::count_declarations(&result)
            .values()
            .all(|count| *count == 1));
    }
}
