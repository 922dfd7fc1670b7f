//! Compiles an [`Object`] tree into nested assemblies.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use tracing::{debug, instrument};

use crate::{
    analysis::Analyzer,
    object::{Object, ObjectNode},
};

use super::{
    abstract_assembly::AbstractAssembly,
    code_transform::{BuiltinContext, CodeTransform, CodeTransformOptions},
    Dialect,
};

pub struct ObjectCompiler;

impl ObjectCompiler {
    /// Sub-objects are compiled first, depth first, so the object's own code
    /// can refer to them by name through `datasize` and `dataoffset`.
    #[instrument(level = "debug", skip_all, fields(object = %object.name))]
    pub fn compile<A: AbstractAssembly>(
        assembly: &mut A,
        object: &Object,
        dialect: &dyn Dialect,
        options: CodeTransformOptions,
    ) -> Result<()> {
        let mut context = BuiltinContext {
            current_object: Some(object.name.clone()),
            sub_ids: HashMap::new(),
        };

        for node in &object.sub_objects {
            match node {
                ObjectNode::Object(sub_object) => {
                    let (sub_assembly, id) = assembly.create_sub_assembly();
                    Self::compile(sub_assembly, sub_object, dialect, options)
                        .with_context(|| format!("While compiling object {}", sub_object.name))?;
                    debug!("Sub-object {} has id {id}", sub_object.name);
                    context.sub_ids.insert(sub_object.name.clone(), id);
                }
                ObjectNode::Data(data) => {
                    let id = assembly.append_data(&data.data);
                    debug!("Data {} has id {id}", data.name);
                    context.sub_ids.insert(data.name.clone(), id);
                }
            }
        }

        let info = Analyzer::analyze(dialect, &object.code)
            .with_context(|| format!("While analysing object {}", object.name))?;
        let errors =
            CodeTransform::run(assembly, &info, &object.code, dialect, &context, options)?;
        if let Some(error) = errors.into_iter().next() {
            bail!(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::YulParser,
        svm::{svm_assembly::disassemble, SvmAssembly, SvmDialect},
    };

    fn compile(source: &str) -> Result<Vec<u8>> {
        let dialect = SvmDialect::strict_assembly_for_objects();
        let object = YulParser::parse_object(source, &dialect)?;
        let mut assembly = SvmAssembly::new();
        ObjectCompiler::compile(&mut assembly, &object, &dialect, CodeTransformOptions::default())?;
        assembly.finalize()
    }

    #[test]
    fn sub_objects_are_referenced_by_name() {
        let code = compile(
            r#"object "a" {
                code { datacopy(0, dataoffset("b"), datasize("b")) }
                object "b" { code { stop() } }
            }"#,
        )
        .unwrap();
        insta::assert_snapshot!(disassemble(&code).join("\n"), @r###"
        0000 push4 0x00000001
        0005 push4 0x0000000d
        000a push1 0x00
        000c codecopy
        000d stop
        "###);
    }

    #[test]
    fn data_and_own_size() {
        let code = compile(
            r#"object "a" {
                code { sstore(dataoffset("a"), datasize("a")) sstore(0, datasize("d")) }
                data "d" hex"aabbcc"
            }"#,
        )
        .unwrap();
        assert_eq!(code.len(), 16 + 3);
        // datasize("a") covers the code and the data.
        assert_eq!(&code[0..5], &[0x63, 0, 0, 0, 19]);
        assert_eq!(&code[5..7], &[0x60, 0x00]);
        assert_eq!(&code[8..13], &[0x63, 0, 0, 0, 3]);
        assert_eq!(&code[16..], &[0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn unknown_objects_are_internal_errors() {
        let error = compile(r#"object "a" { code { pop(datasize("missing")) } }"#).unwrap_err();
        assert!(format!("{error:#}").contains("missing"));
    }

    #[test]
    fn stack_errors_fail_compilation() {
        let declarations: String = (1..=17).map(|i| format!("let v{i} := {i} ")).collect();
        let source = format!(r#"object "a" {{ code {{ {declarations} sstore(v1, 0) }} }}"#);
        let error = compile(&source).unwrap_err();
        assert!(error.to_string().contains("v1"), "{error}");
    }
}
