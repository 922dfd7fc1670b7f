use test_case::test_case;

use super::*;
use crate::{
    analysis::Analyzer,
    parser::YulParser,
    svm::{svm_assembly::disassemble, NoOutputAssembly, SvmAssembly, SvmDialect},
};

fn dry_run(source: &str) -> (i32, Vec<StackTooDeepError>) {
    let dialect = SvmDialect::strict_assembly();
    let ast = YulParser::parse(source, &dialect).unwrap();
    let info = Analyzer::analyze(&dialect, &ast).unwrap();
    let mut assembly = NoOutputAssembly::new();
    let errors = CodeTransform::run(
        &mut assembly,
        &info,
        &ast,
        &dialect,
        &BuiltinContext::default(),
        CodeTransformOptions::default(),
    )
    .unwrap();
    (assembly.stack_height(), errors)
}

fn bytecode(source: &str) -> String {
    let dialect = SvmDialect::strict_assembly();
    let ast = YulParser::parse(source, &dialect).unwrap();
    let info = Analyzer::analyze(&dialect, &ast).unwrap();
    let mut assembly = SvmAssembly::new();
    let errors = CodeTransform::run(
        &mut assembly,
        &info,
        &ast,
        &dialect,
        &BuiltinContext::default(),
        CodeTransformOptions::default(),
    )
    .unwrap();
    assert!(errors.is_empty());
    disassemble(&assembly.finalize().unwrap()).join("\n")
}

fn variables(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix}{i}")).collect()
}

#[test]
fn variables_are_copied_and_popped() {
    insta::assert_snapshot!(bytecode("{ let x := 1 sstore(0, x) }"), @r###"
    0000 push1 0x01
    0002 dup1
    0003 push1 0x00
    0005 sstore
    0006 pop
    "###);
}

#[test]
fn function_frames_are_reshuffled_on_return() {
    insta::assert_snapshot!(bytecode("{ function f(a) -> r { r := a } sstore(0, f(7)) }"), @r###"
    0000 push4 0x00000010
    0005 jump
    0006 jumpdest
    0007 push1 0x00
    0009 dup2
    000a swap1
    000b pop
    000c swap2
    000d swap1
    000e pop
    000f jump
    0010 jumpdest
    0011 push4 0x0000001e
    0016 push1 0x07
    0018 push4 0x00000006
    001d jump
    001e jumpdest
    001f push1 0x00
    0021 sstore
    "###);
}

#[test_case("{ let a, b := f() function f() -> x, y { x := 1 y := 2 } sstore(a, b) }"; "multiple returns")]
#[test_case("{ if calldataload(0) { let x := 1 sstore(x, x) } }"; "if")]
#[test_case("{ switch calldataload(0) case 0 { let x := 1 } case 1 { sstore(0, 1) } default { let y := 2 } }"; "switch with default")]
#[test_case("{ switch calldataload(0) case 0 { let x := 1 } }"; "switch without default")]
#[test_case(
    "{ for { let i := 0 } lt(i, 10) { i := add(i, 1) } { let x := i if eq(x, 5) { break } if eq(x, 3) { continue } sstore(x, i) } }";
    "loop with break and continue"
)]
#[test_case("{ function f(a, b) -> c { for {} 1 {} { let t := a if t { c := b leave_loop() } } function leave_loop() {} } pop(f(1, 2)) }"; "nested functions")]
#[test_case("{ let x { let y := x } x := calldataload(x) }"; "nested blocks")]
fn control_flow_joins_agree(source: &str) {
    let (height, errors) = dry_run(source);
    assert_eq!(height, 0);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn unreachable_variable_is_reported_in_its_function() {
    let names = variables("a", 18);
    let declarations: String = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("let {name} := {i} "))
        .collect();
    let source = format!("{{ function f() {{ {declarations} sstore(a1, a18) }} }}");
    let (height, errors) = dry_run(&source);
    assert_eq!(height, 0);
    assert_eq!(
        errors,
        vec![StackTooDeepError {
            function_name: "f".into(),
            variable: "a1".into(),
            depth: 3,
        }]
    );
}

#[test]
fn top_level_errors_have_no_function_name() {
    let names = variables("v", 17);
    let declarations: String = names.iter().map(|name| format!("let {name} := 1 ")).collect();
    let (_, errors) = dry_run(&format!("{{ {declarations} sstore(v1, 0) }}"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].function_name.is_empty());
    assert_eq!(errors[0].variable, "v1");
    assert_eq!(errors[0].depth, 2);
}

#[test]
fn wide_function_frames_are_reported() {
    let parameters = variables("p", 16).join(", ");
    let (height, errors) = dry_run(&format!("{{ function f({parameters}) -> r {{}} }}"));
    assert_eq!(height, 0);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].variable.is_empty());
    assert_eq!(errors[0].depth, 1);
    assert_eq!(errors[0].to_string(), "Stack too deep by 1 slot(s) in function f");
}

#[test]
fn wide_frames_stop_before_returning() {
    let dialect = SvmDialect::strict_assembly();
    let parameters = variables("p", 16).join(", ");
    let source = format!("{{ function f({parameters}) -> r {{}} }}");
    let ast = YulParser::parse(&source, &dialect).unwrap();
    let info = Analyzer::analyze(&dialect, &ast).unwrap();
    let mut assembly = SvmAssembly::new();
    let errors = CodeTransform::run(
        &mut assembly,
        &info,
        &ast,
        &dialect,
        &BuiltinContext::default(),
        CodeTransformOptions::default(),
    )
    .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(assembly.stack_height(), 0);

    let listing = disassemble(&assembly.finalize().unwrap());
    assert!(listing.iter().all(|line| !line.ends_with(" pop")), "{listing:?}");
    let invalid = listing
        .iter()
        .position(|line| line.ends_with(" invalid"))
        .unwrap();
    assert!(listing[invalid + 1].ends_with(" jump"), "{listing:?}");
}

#[test]
fn reachable_frames_are_fine() {
    let parameters = variables("p", 15).join(", ");
    let (_, errors) = dry_run(&format!("{{ function f({parameters}) -> r {{ r := p15 }} }}"));
    assert!(errors.is_empty());
}
