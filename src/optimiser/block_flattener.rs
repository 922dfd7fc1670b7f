use std::collections::BTreeMap;

use anyhow::Result;
use tracing::instrument;

use crate::prelude::*;

use super::{
    ast_walker::{iterate_replacing, walk_block_mut, AstModifier},
    name_collector::NameCollector,
};

/// Splices nested blocks into their parent block.
///
/// A block is only flattened if nothing it declares is declared anywhere
/// else, so moving the declarations one scope up can not clash.
pub struct BlockFlattener {
    declarations: BTreeMap<YulString, usize>,
}

impl BlockFlattener {
    #[instrument(level = "debug", skip_all)]
    pub fn run(ast: &mut Block) -> Result<()> {
        let mut flattener = Self {
            declarations: NameCollector::count_declarations(ast),
        };
        flattener.visit_block(ast);
        Ok(())
    }
}

impl AstModifier for BlockFlattener {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
        let declarations = &self.declarations;
        iterate_replacing(&mut block.statements, |statement| match statement {
            Statement::Block(inner) if can_inline(inner, declarations) => {
                Some(std::mem::take(&mut inner.statements))
            }
            _ => None,
        });
    }
}

/// Whether the top level declarations of `block` are unique in the whole
/// tree described by `declarations`.
pub fn can_inline(block: &Block, declarations: &BTreeMap<YulString, usize>) -> bool {
    let unique = |name: &YulString| declarations.get(name).copied().unwrap_or(0) <= 1;
    block.statements.iter().all(|statement| match statement {
        Statement::VariableDeclaration(d) => d.variables.iter().all(|v| unique(&v.name)),
        Statement::FunctionDefinition(f) => unique(&f.name),
        Statement::Label(l) => unique(&l.name),
        _ => true,
    })
}

/// The statements of `block` if they can live in the enclosing block, the
/// block itself otherwise.
pub fn inline_or_keep(block: Block, declarations: &BTreeMap<YulString, usize>) -> Vec<Statement> {
    if can_inline(&block, declarations) {
        block.statements
    } else {
        vec![Statement::Block(block)]
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn flatten(source: &str) -> String {
        let mut block = YulParser::parse(source, &SvmDialect::strict_assembly()).unwrap();
        BlockFlattener::run(&mut block).unwrap();
        block.to_string()
    }

    #[test_case("{ { } { { } } pop(1) }", "{ pop(1) }" ; "empty blocks")]
    #[test_case(
        "{ let a := 1 { let b := 2 { pop(add(a, b)) } } }",
        "{ let a := 1 let b := 2 pop(add(a, b)) }" ;
        "nested declarations"
    )]
    #[test_case(
        "{ { let a := 1 } { let a := 2 } }",
        "{ { let a := 1 } { let a := 2 } }" ;
        "clashing declarations stay"
    )]
    #[test_case(
        "{ if 1 { { pop(1) } } for { } 1 { } { { break } } }",
        "{ if 1 { pop(1) } for { } 1 { } { break } }" ;
        "bodies keep their block"
    )]
    #[test_case(
        "{ function f() { { let x := 1 } } }",
        "{ function f() { let x := 1 } }" ;
        "function bodies"
    )]
    fn flattening(source: &str, expected: &str) {
        assert_eq!(flatten(source), expected);
    }

    #[test]
    fn flattening_twice_changes_nothing() {
        let once = flatten("{ { let a := 1 { } } { let b := 1 { let b_1 := b } } }");
        assert_eq!(flatten(&once), once);
    }
}
