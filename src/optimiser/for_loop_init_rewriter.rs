use std::collections::BTreeMap;

use anyhow::Result;
use tracing::instrument;

use crate::prelude::*;

use super::{
    ast_walker::{iterate_replacing, walk_block_mut, AstModifier},
    block_flattener::inline_or_keep,
    name_collector::NameCollector,
};

/// Moves the initialisation part of every for loop in front of the loop.
///
/// `for { init } c { post } { body }` becomes `init for { } c { post } { body }`,
/// wrapped in a block if a declaration in `init` would clash with the
/// surrounding code.
pub struct ForLoopInitRewriter {
    declarations: BTreeMap<YulString, usize>,
}

impl ForLoopInitRewriter {
    #[instrument(level = "debug", skip_all)]
    pub fn run(ast: &mut Block) -> Result<()> {
        let mut rewriter = Self {
            declarations: NameCollector::count_declarations(ast),
        };
        rewriter.visit_block(ast);
        Ok(())
    }
}

impl AstModifier for ForLoopInitRewriter {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
        let declarations = &self.declarations;
        iterate_replacing(&mut block.statements, |statement| {
            let Statement::ForLoop(for_loop) = statement else {
                return None;
            };
            if for_loop.pre.statements.is_empty() {
                return None;
            }
            let location = for_loop.location;
            let mut statements = std::mem::take(&mut for_loop.pre.statements);
            statements.push(std::mem::replace(statement, Statement::Block(Block::default())));
            Some(inline_or_keep(Block { location, statements }, declarations))
        });
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    #[test_case(
        "{ for { let i := 0 } lt(i, 2) { i := add(i, 1) } { } }",
        "{ let i := 0 for { } lt(i, 2) { i := add(i, 1) } { } }" ;
        "single loop"
    )]
    #[test_case(
        "{ for { let i := 0 } 1 { } { for { let j := 0 } j { } { } } }",
        "{ let i := 0 for { } 1 { } { let j := 0 for { } j { } { } } }" ;
        "nested loops"
    )]
    #[test_case(
        "{ for { let i := 0 } i { } { } let i := 1 }",
        "{ { let i := 0 for { } i { } { } } let i := 1 }" ;
        "clashing declaration"
    )]
    fn rewriting(source: &str, expected: &str) {
        let mut block = YulParser::parse(source, &SvmDialect::strict_assembly()).unwrap();
        ForLoopInitRewriter::run(&mut block).unwrap();
        assert_eq!(block.to_string(), expected);
    }
}
