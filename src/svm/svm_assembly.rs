//! Bytecode-producing assembly.
//!
//! Label, size and offset references are written as `PUSH4` placeholders
//! and patched in [`SvmAssembly::finalize`]. Sub-assemblies and data blobs
//! follow the code in creation order.

use std::collections::HashMap;

use alloy_primitives::U256;
use anyhow::{bail, Context, Result};
use tracing::Level;

use crate::{
    common::YulError,
    dyn_event, dyn_span,
    prelude::SourceLocation,
};

use super::{
    abstract_assembly::{AbstractAssembly, LabelId, SubId},
    Instruction,
};

const REFERENCE_SIZE: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Reference {
    Label(LabelId),
    AssemblySize,
    SubOffset(SubId),
    SubSize(SubId),
}

#[derive(Debug, Clone, Copy)]
enum SubKind {
    Assembly(usize),
    Data(usize),
}

#[derive(Debug, Default)]
pub struct SvmAssembly {
    bytecode: Vec<u8>,
    stack_height: i32,
    next_label: LabelId,
    label_positions: HashMap<LabelId, usize>,
    duplicate_labels: Vec<LabelId>,
    named_labels: HashMap<String, LabelId>,
    references: Vec<(usize, Reference)>,
    sub_kinds: Vec<SubKind>,
    sub_assemblies: Vec<SvmAssembly>,
    data: Vec<Vec<u8>>,
    location: SourceLocation,
}

impl SvmAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    fn append_reference(&mut self, reference: Reference) {
        self.bytecode.push(Instruction::Push4.into());
        self.references.push((self.bytecode.len(), reference));
        self.bytecode.extend([0; REFERENCE_SIZE]);
        self.stack_height += 1;
    }

    /// Resolves all references and returns the final bytecode.
    pub fn finalize(&self) -> Result<Vec<u8>> {
        if let Some(label) = self.duplicate_labels.first() {
            bail!(YulError::internal(
                self.location,
                format!("Label {label} defined twice")
            ));
        }

        let subs = self
            .sub_kinds
            .iter()
            .map(|kind| match kind {
                SubKind::Assembly(i) => self.sub_assemblies[*i].finalize(),
                SubKind::Data(i) => Ok(self.data[*i].clone()),
            })
            .collect::<Result<Vec<_>>>()
            .context("While finalizing sub-assemblies")?;

        let mut offsets = Vec::with_capacity(subs.len());
        let mut end = self.bytecode.len();
        for sub in &subs {
            offsets.push(end);
            end += sub.len();
        }
        let total_size = end;

        let mut code = self.bytecode.clone();
        for (position, reference) in &self.references {
            let value = match reference {
                Reference::Label(label) => *self.label_positions.get(label).ok_or_else(|| {
                    YulError::internal(self.location, format!("Reference to undefined label {label}"))
                })?,
                Reference::AssemblySize => total_size,
                Reference::SubOffset(sub) => *offsets.get(*sub).ok_or_else(|| {
                    YulError::internal(self.location, format!("Unknown sub-assembly {sub}"))
                })?,
                Reference::SubSize(sub) => subs
                    .get(*sub)
                    .map(Vec::len)
                    .ok_or_else(|| {
                        YulError::internal(self.location, format!("Unknown sub-assembly {sub}"))
                    })?,
            };
            let value = u32::try_from(value).context("Assembly too large for 4-byte references")?;
            code[*position..*position + REFERENCE_SIZE].copy_from_slice(&value.to_be_bytes());
        }

        for sub in subs {
            code.extend(sub);
        }
        Ok(code)
    }
}

impl AbstractAssembly for SvmAssembly {
    fn set_source_location(&mut self, location: SourceLocation) {
        self.location = location;
    }

    fn stack_height(&self) -> i32 {
        self.stack_height
    }

    fn append_instruction(&mut self, instruction: Instruction) {
        let info = instruction.info();
        self.bytecode.push(instruction.into());
        self.stack_height += info.returns as i32 - info.args as i32;
    }

    fn append_constant(&mut self, constant: U256) {
        let size = constant.byte_len().max(1);
        self.bytecode.push(u8::from(Instruction::Push1) + size as u8 - 1);
        let bytes = constant.to_be_bytes::<32>();
        self.bytecode.extend_from_slice(&bytes[32 - size..]);
        self.stack_height += 1;
    }

    fn append_label(&mut self, label: LabelId) {
        if self
            .label_positions
            .insert(label, self.bytecode.len())
            .is_some()
        {
            self.duplicate_labels.push(label);
        }
        self.append_instruction(Instruction::JumpDest);
    }

    fn append_label_reference(&mut self, label: LabelId) {
        self.append_reference(Reference::Label(label));
    }

    fn new_label_id(&mut self) -> LabelId {
        self.next_label += 1;
        self.next_label
    }

    fn named_label(&mut self, name: &str) -> LabelId {
        if let Some(label) = self.named_labels.get(name) {
            return *label;
        }
        let label = self.new_label_id();
        self.named_labels.insert(name.to_string(), label);
        label
    }

    fn append_assembly_size(&mut self) {
        self.append_reference(Reference::AssemblySize);
    }

    fn create_sub_assembly(&mut self) -> (&mut Self, SubId) {
        let id = self.sub_kinds.len();
        let index = self.sub_assemblies.len();
        self.sub_kinds.push(SubKind::Assembly(index));
        self.sub_assemblies.push(SvmAssembly::new());
        (&mut self.sub_assemblies[index], id)
    }

    fn append_data_offset(&mut self, sub: SubId) {
        self.append_reference(Reference::SubOffset(sub));
    }

    fn append_data_size(&mut self, sub: SubId) {
        self.append_reference(Reference::SubSize(sub));
    }

    fn append_data(&mut self, data: &[u8]) -> SubId {
        let id = self.sub_kinds.len();
        self.sub_kinds.push(SubKind::Data(self.data.len()));
        self.data.push(data.to_vec());
        id
    }

    fn set_stack_height(&mut self, height: i32) {
        self.stack_height = height;
    }
}

/// Renders bytecode one instruction per line. Bytes that are not opcodes
/// (data appended after the code, for instance) print as `invalid`.
pub fn disassemble(bytecode: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut offset = 0;
    while offset < bytecode.len() {
        let byte = bytecode[offset];
        match Instruction::try_from(byte) {
            Ok(instruction) if instruction.is_push() => {
                let end = (offset + 1 + instruction.push_size()).min(bytecode.len());
                let immediate: String = bytecode[offset + 1..end]
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect();
                lines.push(format!("{offset:04x} {} 0x{immediate}", instruction.mnemonic()));
                offset = end;
            }
            Ok(instruction) => {
                lines.push(format!("{offset:04x} {}", instruction.mnemonic()));
                offset += 1;
            }
            Err(_) => {
                lines.push(format!("{offset:04x} invalid 0x{byte:02x}"));
                offset += 1;
            }
        }
    }
    lines
}

pub fn log_disassembly(name: &str, bytecode: &[u8], trace_level: Level) {
    let _guard = dyn_span!(trace_level, "disassemble", name = name).entered();
    for line in disassemble(bytecode) {
        dyn_event!(trace_level, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_use_the_smallest_push() {
        let mut assembly = SvmAssembly::new();
        assembly.append_constant(U256::ZERO);
        assembly.append_constant(U256::from(0x1234u64));
        let code = assembly.finalize().unwrap();
        assert_eq!(code, vec![0x60, 0x00, 0x61, 0x12, 0x34]);
        assert_eq!(assembly.stack_height(), 2);
    }

    #[test]
    fn labels_are_patched() {
        let mut assembly = SvmAssembly::new();
        let label = assembly.new_label_id();
        assembly.append_jump_to(label, 0);
        assembly.append_label(label);
        let code = assembly.finalize().unwrap();
        insta::assert_snapshot!(disassemble(&code).join("\n"), @r###"
        0000 push4 0x00000006
        0005 jump
        0006 jumpdest
        "###);
    }

    #[test]
    fn undefined_label_is_an_error() {
        let mut assembly = SvmAssembly::new();
        let label = assembly.new_label_id();
        assembly.append_label_reference(label);
        assert!(assembly.finalize().is_err());
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let mut assembly = SvmAssembly::new();
        let label = assembly.named_label("f");
        assert_eq!(assembly.named_label("f"), label);
        assembly.append_label(label);
        assembly.append_label(label);
        assert!(assembly.finalize().is_err());
    }

    #[test]
    fn subs_and_data_follow_the_code() {
        let mut assembly = SvmAssembly::new();
        let (sub, sub_id) = assembly.create_sub_assembly();
        sub.append_instruction(Instruction::Stop);
        let data_id = assembly.append_data(&[0xaa, 0xbb]);
        assembly.append_data_offset(data_id);
        assembly.append_data_size(sub_id);
        assembly.append_assembly_size();
        let code = assembly.finalize().unwrap();
        assert_eq!(code.len(), 15 + 1 + 2);
        assert_eq!(&code[0..5], &[0x63, 0, 0, 0, 16]);
        assert_eq!(&code[5..10], &[0x63, 0, 0, 0, 1]);
        assert_eq!(&code[10..15], &[0x63, 0, 0, 0, 18]);
        assert_eq!(&code[15..], &[0x00, 0xaa, 0xbb]);
    }
}
