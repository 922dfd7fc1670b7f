use anyhow::Result;
use tracing::instrument;

use crate::prelude::*;

use super::ast_walker::{iterate_replacing, walk_block_mut, AstModifier};

/// Gives every variable declaration an explicit zero initialiser, one
/// declaration per variable.
#[derive(Debug, Default)]
pub struct VarDeclInitializer;

impl VarDeclInitializer {
    #[instrument(level = "debug", skip_all)]
    pub fn run(ast: &mut Block) -> Result<()> {
        Self.visit_block(ast);
        Ok(())
    }
}

impl AstModifier for VarDeclInitializer {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
        iterate_replacing(&mut block.statements, |statement| {
            let Statement::VariableDeclaration(declaration) = statement else {
                return None;
            };
            if declaration.value.is_some() {
                return None;
            }
            if let [variable] = declaration.variables.as_slice() {
                let zero = Literal::zero(declaration.location, variable.ty.clone());
                declaration.value = Some(Expression::Literal(zero));
                return None;
            }
            let location = declaration.location;
            Some(
                std::mem::take(&mut declaration.variables)
                    .into_iter()
                    .map(|variable| {
                        let zero = Literal::zero(location, variable.ty.clone());
                        Statement::VariableDeclaration(VariableDeclaration {
                            location,
                            variables: vec![variable],
                            value: Some(Expression::Literal(zero)),
                        })
                    })
                    .collect(),
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    #[test]
    fn declarations_get_zero_values() {
        let mut block = YulParser::parse(
            "{ let a let b, c := f() let d, e function g() { let x } }",
            &SvmDialect::strict_assembly(),
        )
        .unwrap();
        VarDeclInitializer::run(&mut block).unwrap();
        insta::assert_snapshot!(
            block.to_string(),
            @"{ let a := 0 let b, c := f() let d := 0 let e := 0 function g() { let x := 0 } }"
        );
    }
}
