#![cfg(test)]

use std::collections::BTreeSet;

use anyhow::Result;
use strum::IntoEnumIterator;
use test_case::test_case;
use yulopt::{
    analysis::Analyzer,
    compilability_checker::CompilabilityChecker,
    interpreter::{Interpreter, InterpreterLimits, InterpreterResult},
    object::Object,
    optimiser::{NameDispenser, OptimiserSuite, Step},
    parser::YulParser,
    prelude::Block,
    svm::{CodeTransform, CodeTransformOptions, BuiltinContext, NoOutputAssembly, SvmDialect},
};

fn read(file: &str) -> Result<String> {
    Ok(std::fs::read_to_string(format!("tests/{file}"))?)
}

fn calldata_variants() -> Vec<Vec<u8>> {
    let word = |last: u8| {
        let mut word = vec![0u8; 32];
        word[31] = last;
        word
    };
    vec![Vec::new(), word(1), word(5), vec![0xff; 32]]
}

fn interpret(dialect: &SvmDialect, ast: &Block, calldata: &[u8]) -> InterpreterResult {
    Interpreter::run(dialect, ast, calldata, InterpreterLimits::default()).unwrap()
}

fn optimised(dialect: &SvmDialect, source: &str, steps: &[Step]) -> Result<Block> {
    let mut ast = YulParser::parse(source, dialect)?;
    OptimiserSuite::run(dialect, &mut ast, &BTreeSet::new(), steps)?;
    Ok(ast)
}

fn assert_same_behaviour(dialect: &SvmDialect, before: &Block, after: &Block, what: &str) {
    for calldata in calldata_variants() {
        assert_eq!(
            interpret(dialect, before, &calldata),
            interpret(dialect, after, &calldata),
            "{what} changed behaviour for calldata {calldata:02x?}\nafter: {after}"
        );
    }
}

const FIXTURES: [&str; 7] = [
    "arithmetic.yul",
    "loops.yul",
    "functions.yul",
    "constants.yul",
    "memory.yul",
    "scopes.yul",
    "loop_init.yul",
];

#[test_case("arithmetic.yul"; "arithmetic")]
#[test_case("loops.yul"; "loops")]
#[test_case("functions.yul"; "functions")]
#[test_case("constants.yul"; "constants")]
#[test_case("memory.yul"; "memory")]
#[test_case("scopes.yul"; "scopes")]
#[test_case("loop_init.yul"; "loop init")]
pub fn test_every_step_preserves_behaviour(file: &str) -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let source = read(file)?;
    let original = YulParser::parse(&source, &dialect)?;

    let disambiguated = optimised(&dialect, &source, &[])?;
    assert_same_behaviour(&dialect, &original, &disambiguated, "Disambiguator");

    for step in Step::iter() {
        let after = optimised(&dialect, &source, &[step])?;
        assert_same_behaviour(&dialect, &original, &after, step.into());
    }
    Ok(())
}

#[test_case("arithmetic.yul"; "arithmetic")]
#[test_case("loops.yul"; "loops")]
#[test_case("functions.yul"; "functions")]
#[test_case("constants.yul"; "constants")]
#[test_case("memory.yul"; "memory")]
#[test_case("scopes.yul"; "scopes")]
#[test_case("loop_init.yul"; "loop init")]
pub fn test_default_sequence_preserves_behaviour(file: &str) -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let source = read(file)?;
    let original = YulParser::parse(&source, &dialect)?;
    let after = optimised(&dialect, &source, &OptimiserSuite::DEFAULT_SEQUENCE)?;
    assert_same_behaviour(&dialect, &original, &after, "The default sequence");
    Ok(())
}

#[test_case(Step::BlockFlattener; "block flattener")]
#[test_case(Step::ForLoopConditionIntoBody; "for loop condition into body")]
#[test_case(Step::StructuralSimplifier; "structural simplifier")]
pub fn test_step_is_idempotent(step: Step) -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    for file in FIXTURES {
        let mut ast = optimised(&dialect, &read(file)?, &[step])?;
        let once = ast.to_string();
        step.run(&dialect, &mut ast)?;
        assert_eq!(ast.to_string(), once, "{step} is not idempotent on {file}");
    }
    Ok(())
}

#[test]
pub fn test_disambiguation_gives_every_declaration_its_own_name() -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let ast = optimised(&dialect, &read("scopes.yul")?, &[])?;
    let printed = ast.to_string();
    assert!(printed.contains("let x :="), "{printed}");
    assert!(printed.contains("let x_1 :="), "{printed}");
    // Analysis rejects duplicate declarations in one scope, so the names
    // must be distinct wherever they are visible.
    Analyzer::analyze(&dialect, &ast)?;
    Ok(())
}

#[test]
pub fn test_for_loop_condition_moves_into_body() -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let ast = optimised(
        &dialect,
        "{ let a := 1 let b := 2 for { } lt(a, b) { } { mstore(1, 2) } }",
        &[Step::ForLoopConditionIntoBody],
    )?;
    assert_eq!(
        ast.to_string(),
        "{ let a := 1 let b := 2 for { } 1 { } { if iszero(lt(a, b)) { break } mstore(1, 2) } }"
    );
    Ok(())
}

#[test]
pub fn test_reassigned_variable_is_not_rematerialised() -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let ast = optimised(
        &dialect,
        "{ let x := 3 let y := x x := 4 let z := x }",
        &[Step::Rematerialiser],
    )?;
    assert_eq!(ast.to_string(), "{ let x := 3 let y := 3 x := 4 let z := 4 }");
    Ok(())
}

#[test]
pub fn test_name_dispenser_skips_used_names() {
    let dialect = SvmDialect::strict_assembly();
    let mut dispenser =
        NameDispenser::new(&dialect, ["foo".into(), "foo_1".into()].into_iter().collect());
    assert_eq!(dispenser.new_name(&"foo".into()), "foo_2");
}

#[test_case("{ if 1 { sstore(0, 1) } }", "{ sstore(0, 1) }"; "statically true")]
#[test_case("{ if 0 { sstore(0, 1) } }", "{ }"; "statically false")]
#[test_case(
    "{ let c := 0 for { c := 1 } c { c := 0 } { sstore(0, 5) } }",
    "{ let c := 0 for { c := 1 } c { c := 0 } { sstore(0, 5) } }";
    "loop init sets the condition"
)]
pub fn test_structural_simplifier_scenarios(source: &str, expected: &str) -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let ast = optimised(&dialect, source, &[Step::StructuralSimplifier])?;
    assert_eq!(ast.to_string(), expected);
    Ok(())
}

#[test_case("arithmetic.yul"; "arithmetic")]
#[test_case("loops.yul"; "loops")]
#[test_case("functions.yul"; "functions")]
#[test_case("constants.yul"; "constants")]
#[test_case("memory.yul"; "memory")]
#[test_case("scopes.yul"; "scopes")]
#[test_case("loop_init.yul"; "loop init")]
pub fn test_code_generation_keeps_joins_balanced(file: &str) -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let source = read(file)?;
    for ast in [
        YulParser::parse(&source, &dialect)?,
        optimised(&dialect, &source, &OptimiserSuite::DEFAULT_SEQUENCE)?,
    ] {
        assert!(CompilabilityChecker::run(&dialect, &ast)?.is_empty());

        // Every join is checked during generation; a mismatch is an error.
        let info = Analyzer::analyze(&dialect, &ast)?;
        let mut assembly = NoOutputAssembly::new();
        let errors = CodeTransform::run(
            &mut assembly,
            &info,
            &ast,
            &dialect,
            &BuiltinContext::default(),
            CodeTransformOptions::default(),
        )?;
        assert!(errors.is_empty());

        let object = Object::from_code(ast.clone());
        assert!(!yulopt::assemble(&object, &dialect)?.is_empty());
    }
    Ok(())
}

#[test]
pub fn test_stack_too_deep_is_reported_not_raised() -> Result<()> {
    let dialect = SvmDialect::strict_assembly();
    let declarations: String = (1..=20).map(|i| format!("let v{i} := {i} ")).collect();
    let source = format!(
        "{{ function deep() {{ {declarations} sstore(v1, v20) }} function shallow(a) -> b {{ b := a }} }}"
    );
    let ast = YulParser::parse(&source, &dialect)?;
    let depths = CompilabilityChecker::run(&dialect, &ast)?;
    assert_eq!(depths.len(), 1);
    assert_eq!(depths.get("deep"), Some(&5));

    let object = Object::from_code(ast);
    assert!(yulopt::assemble(&object, &dialect).is_err());
    Ok(())
}

#[test]
pub fn test_objects_are_optimised_recursively() -> Result<()> {
    let dialect = SvmDialect::strict_assembly_for_objects();
    let mut object = yulopt::parse(
        r#"object "outer" {
            code { let s := datasize("inner") datacopy(0, dataoffset("inner"), s) return(0, s) }
            object "inner" { code { let x := add(1, 2) sstore(0, x) } }
        }"#,
        &dialect,
    )?;
    yulopt::optimize(&mut object, &dialect, &OptimiserSuite::DEFAULT_SEQUENCE)?;
    insta::assert_snapshot!(object.to_string(), @r###"object "outer" { code { let s := datasize("inner") datacopy(0, dataoffset("inner"), s) return(0, s) } object "inner" { code { let x := 3 sstore(0, 3) } } }"###);

    let bytecode = yulopt::assemble(&object, &dialect)?;
    assert!(bytecode.ends_with(&[0x55, 0x50]), "{bytecode:02x?}");
    Ok(())
}
