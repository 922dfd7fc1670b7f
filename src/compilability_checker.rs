//! Finds functions whose variables would be out of stack reach.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{info, instrument};

use crate::{
    analysis::Analyzer,
    prelude::*,
    svm::{BuiltinContext, CodeTransform, CodeTransformOptions, Dialect, NoOutputAssembly},
};

pub struct CompilabilityChecker;

impl CompilabilityChecker {
    /// Dry-runs code generation and returns, per function, how far the
    /// deepest unreachable slot is beyond reach. The top level is keyed by
    /// the empty name. An empty map means the code compiles.
    ///
    /// Dialects that do not target the SVM always compile.
    #[instrument(level = "debug", skip_all)]
    pub fn run(dialect: &dyn Dialect, ast: &Block) -> Result<BTreeMap<YulString, i32>> {
        let mut depths = BTreeMap::new();
        let Some(svm) = dialect.as_svm() else {
            return Ok(depths);
        };

        let dialect = svm.no_output();
        let info = Analyzer::analyze(&dialect, ast)?;
        let mut assembly = NoOutputAssembly::new();
        let errors = CodeTransform::run(
            &mut assembly,
            &info,
            ast,
            &dialect,
            &BuiltinContext::default(),
            CodeTransformOptions::default(),
        )?;

        for error in errors {
            let depth = depths.entry(error.function_name).or_insert(0);
            *depth = (*depth).max(error.depth);
        }
        if !depths.is_empty() {
            info!("{} function(s) exceed the stack", depths.len());
        }
        Ok(depths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::YulParser,
        svm::{SvmDialect, YulDialect},
    };

    fn deep_function(name: &str, variables: usize) -> String {
        let declarations: String = (1..=variables).map(|i| format!("let {name}{i} := {i} ")).collect();
        format!("function {name}() {{ {declarations} sstore({name}1, {name}{variables}) }}")
    }

    fn check(source: &str) -> BTreeMap<YulString, i32> {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse(source, &dialect).unwrap();
        CompilabilityChecker::run(&dialect, &ast).unwrap()
    }

    #[test]
    fn shallow_code_compiles() {
        assert!(check(&format!("{{ {} }}", deep_function("f", 10))).is_empty());
    }

    #[test]
    fn reports_the_deepest_overshoot_per_function() {
        let source = format!(
            "{{ {} {} {} }}",
            deep_function("f", 18),
            deep_function("g", 20),
            deep_function("h", 5)
        );
        let depths = check(&source);
        assert_eq!(depths.len(), 2);
        assert_eq!(depths.get("f"), Some(&3));
        assert_eq!(depths.get("g"), Some(&5));
    }

    #[test]
    fn object_builtins_are_only_counted() {
        let dialect = SvmDialect::strict_assembly_for_objects();
        let ast = YulParser::parse("{ datacopy(0, dataoffset(\"x\"), datasize(\"x\")) }", &dialect)
            .unwrap();
        assert!(CompilabilityChecker::run(&dialect, &ast).unwrap().is_empty());
    }

    #[test]
    fn typed_yul_always_compiles() {
        let source = format!("{{ {} }}", deep_function("f", 30));
        let ast = YulParser::parse(&source, &SvmDialect::strict_assembly()).unwrap();
        assert!(CompilabilityChecker::run(&YulDialect, &ast).unwrap().is_empty());
    }
}
