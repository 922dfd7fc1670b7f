use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, info, instrument};

use crate::{analysis::Analyzer, common::YulError, prelude::*, svm::Dialect};

use super::{
    BlockFlattener, CommonSubexpressionEliminator, Disambiguator, ExpressionSimplifier,
    ForLoopConditionIntoBody, ForLoopInitRewriter, Rematerialiser, StructuralSimplifier,
    VarDeclInitializer,
};

/// A single rewrite pass, named as on the command line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter, Display,
)]
pub enum Step {
    BlockFlattener,
    VarDeclInitializer,
    ForLoopInitRewriter,
    ForLoopConditionIntoBody,
    Rematerialiser,
    CommonSubexpressionEliminator,
    ExpressionSimplifier,
    StructuralSimplifier,
}

impl Step {
    pub fn run(self, dialect: &dyn Dialect, ast: &mut Block) -> Result<()> {
        match self {
            Step::BlockFlattener => BlockFlattener::run(ast),
            Step::VarDeclInitializer => VarDeclInitializer::run(ast),
            Step::ForLoopInitRewriter => ForLoopInitRewriter::run(ast),
            Step::ForLoopConditionIntoBody => ForLoopConditionIntoBody::run(ast),
            Step::Rematerialiser => Rematerialiser::run(dialect, ast),
            Step::CommonSubexpressionEliminator => CommonSubexpressionEliminator::run(dialect, ast),
            Step::ExpressionSimplifier => ExpressionSimplifier::run(dialect, ast),
            Step::StructuralSimplifier => StructuralSimplifier::run(dialect, ast),
        }
    }

    /// Parses a comma separated list of step names.
    pub fn parse_sequence(text: &str) -> Result<Vec<Step>> {
        text.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.parse().map_err(|_| anyhow!("Unknown optimiser step {name:?}")))
            .collect()
    }
}

pub struct OptimiserSuite;

impl OptimiserSuite {
    pub const DEFAULT_SEQUENCE: [Step; 15] = [
        Step::VarDeclInitializer,
        Step::BlockFlattener,
        Step::ForLoopInitRewriter,
        Step::BlockFlattener,
        Step::StructuralSimplifier,
        Step::BlockFlattener,
        Step::ExpressionSimplifier,
        Step::CommonSubexpressionEliminator,
        Step::Rematerialiser,
        Step::StructuralSimplifier,
        Step::BlockFlattener,
        Step::ExpressionSimplifier,
        Step::CommonSubexpressionEliminator,
        Step::StructuralSimplifier,
        Step::BlockFlattener,
    ];

    /// Disambiguates `ast` and runs `steps` over it in order.
    ///
    /// Names in `externally_used` keep their spelling. The result is
    /// analysed once more; failing that is an internal error.
    #[instrument(level = "info", skip_all, fields(steps = steps.len()))]
    pub fn run(
        dialect: &dyn Dialect,
        ast: &mut Block,
        externally_used: &BTreeSet<YulString>,
        steps: &[Step],
    ) -> Result<()> {
        let disambiguated = {
            let info = Analyzer::analyze(dialect, ast).context("Analysing optimiser input")?;
            Disambiguator::run(dialect, ast, &info, externally_used)?
        };
        *ast = disambiguated;

        for step in steps {
            debug!("Running {step}");
            step.run(dialect, ast).with_context(|| format!("Running {step}"))?;
        }

        if let Err(error) = Analyzer::analyze(dialect, ast) {
            return Err(YulError::internal(
                ast.location,
                format!("Optimised code does not analyse: {error:#}"),
            )
            .into());
        }
        info!("Optimised code has {} statements at top level", ast.statements.len());
        Ok(())
    }
}
