use alloy_primitives::U256;
use anyhow::{Context, Result};

use crate::{
    analysis::Symbol,
    common::YulError,
    prelude::*,
    svm::{abstract_assembly::AbstractAssembly, BuiltinCode, BuiltinFunction, Instruction},
};

use super::CodeTransform;

impl<'r, 'a, A: AbstractAssembly> CodeTransform<'r, 'a, A> {
    pub(super) fn visit_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Literal(literal) => self.visit_literal(literal),
            Expression::Identifier(identifier) => {
                let (declaration, symbol) = self.lookup(identifier.location, &identifier.name)?;
                match symbol {
                    Symbol::Variable { .. } => self.copy_variable(identifier.location, &identifier.name),
                    Symbol::Label => {
                        let label = self.label_id(declaration);
                        self.assembly.append_label_reference(label);
                        Ok(())
                    }
                    Symbol::Function { .. } => Err(YulError::internal(
                        identifier.location,
                        format!("Function {} used as a value", identifier.name),
                    )
                    .into()),
                }
            }
            Expression::FunctionalInstruction(instruction) => {
                self.visit_arguments(&instruction.arguments)?;
                self.assembly.set_source_location(instruction.location);
                self.assembly.append_instruction(instruction.instruction);
                Ok(())
            }
            Expression::FunctionCall(call) => self.function_call(call),
        }
    }

    pub(super) fn visit_literal(&mut self, literal: &Literal) -> Result<()> {
        let value = literal
            .value()
            .with_context(|| format!("Invalid literal at {}", literal.location))?;
        self.assembly.set_source_location(literal.location);
        self.assembly.append_constant(value);
        Ok(())
    }

    /// Arguments are evaluated right to left, so the first one ends up on
    /// top of the stack.
    fn visit_arguments(&mut self, arguments: &[Expression]) -> Result<()> {
        for argument in arguments.iter().rev() {
            self.visit_expression(argument)?;
        }
        Ok(())
    }

    fn function_call(&mut self, call: &FunctionCall) -> Result<()> {
        let dialect = self.dialect;
        if let Some(builtin) = dialect.builtin(&call.function_name.name) {
            return self.builtin_call(builtin, call);
        }

        let (declaration, symbol) = self.lookup(call.location, &call.function_name.name)?;
        let Symbol::Function { arguments, returns } = symbol else {
            return Err(YulError::internal(
                call.location,
                format!("{} is not a function", call.function_name.name),
            )
            .into());
        };
        let return_label = self.assembly.new_label_id();
        self.assembly.append_label_reference(return_label);
        self.visit_arguments(&call.arguments)?;
        let entry = self.function_entry_id(declaration);
        self.assembly.set_source_location(call.location);
        self.assembly
            .append_jump_to(entry, returns.len() as i32 - arguments.len() as i32 - 1);
        self.assembly.append_label(return_label);
        Ok(())
    }

    fn builtin_call(&mut self, builtin: &BuiltinFunction, call: &FunctionCall) -> Result<()> {
        match builtin.code {
            BuiltinCode::Instruction(instruction) => {
                self.visit_arguments(&call.arguments)?;
                self.assembly.append_instruction(instruction);
            }
            BuiltinCode::DataSize | BuiltinCode::DataOffset => {
                let name = object_name(call)?;
                let context = self.builtin_context;
                if context.current_object.as_ref() == Some(&name) {
                    match builtin.code {
                        BuiltinCode::DataSize => self.assembly.append_assembly_size(),
                        _ => self.assembly.append_constant(U256::ZERO),
                    }
                } else {
                    let Some(sub) = context.sub_ids.get(&name).copied() else {
                        return Err(YulError::internal(
                            call.location,
                            format!("Could not find assembly object <{name}>"),
                        )
                        .into());
                    };
                    match builtin.code {
                        BuiltinCode::DataSize => self.assembly.append_data_size(sub),
                        _ => self.assembly.append_data_offset(sub),
                    }
                }
            }
            BuiltinCode::DataCopy => {
                self.visit_arguments(&call.arguments)?;
                self.assembly.append_instruction(Instruction::CodeCopy);
            }
            BuiltinCode::StackEffectOnly => {
                if !builtin.literal_arguments {
                    self.visit_arguments(&call.arguments)?;
                    for _ in &call.arguments {
                        self.assembly.append_instruction(Instruction::Pop);
                    }
                }
                for _ in &builtin.returns {
                    self.assembly.append_constant(U256::ZERO);
                }
            }
        }
        Ok(())
    }
}

/// The object named by the single string argument of `datasize` and
/// `dataoffset`.
fn object_name(call: &FunctionCall) -> Result<YulString> {
    match call.arguments.as_slice() {
        [Expression::Literal(literal)] if literal.kind == LiteralKind::String => {
            let bytes = literal.string_bytes()?;
            Ok(String::from_utf8_lossy(&bytes).into_owned().into())
        }
        _ => Err(YulError::internal(
            call.location,
            format!("{} expects a single string literal", call.function_name.name),
        )
        .into()),
    }
}
