use alloy_primitives::U256;

use crate::prelude::SourceLocation;

use super::{
    abstract_assembly::{AbstractAssembly, LabelId, SubId},
    Instruction,
};

/// An assembly that emits nothing and only tracks the stack height.
///
/// Code generation against this backend is a dry run: it reports the same
/// stack errors as a real run without producing bytecode.
#[derive(Debug, Default)]
pub struct NoOutputAssembly {
    stack_height: i32,
    next_label: LabelId,
    subs: Vec<NoOutputAssembly>,
    next_sub: SubId,
}

impl NoOutputAssembly {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AbstractAssembly for NoOutputAssembly {
    fn set_source_location(&mut self, _location: SourceLocation) {}

    fn stack_height(&self) -> i32 {
        self.stack_height
    }

    fn append_instruction(&mut self, instruction: Instruction) {
        let info = instruction.info();
        self.stack_height += info.returns as i32 - info.args as i32;
    }

    fn append_constant(&mut self, _constant: U256) {
        self.stack_height += 1;
    }

    fn append_label(&mut self, _label: LabelId) {}

    fn append_label_reference(&mut self, _label: LabelId) {
        self.stack_height += 1;
    }

    fn new_label_id(&mut self) -> LabelId {
        self.next_label += 1;
        self.next_label
    }

    fn named_label(&mut self, _name: &str) -> LabelId {
        self.new_label_id()
    }

    fn append_assembly_size(&mut self) {
        self.stack_height += 1;
    }

    fn create_sub_assembly(&mut self) -> (&mut Self, SubId) {
        let id = self.next_sub;
        self.next_sub += 1;
        let index = self.subs.len();
        self.subs.push(NoOutputAssembly::new());
        (&mut self.subs[index], id)
    }

    fn append_data_offset(&mut self, _sub: SubId) {
        self.stack_height += 1;
    }

    fn append_data_size(&mut self, _sub: SubId) {
        self.stack_height += 1;
    }

    fn append_data(&mut self, _data: &[u8]) -> SubId {
        let id = self.next_sub;
        self.next_sub += 1;
        id
    }

    fn set_stack_height(&mut self, height: i32) {
        self.stack_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_stack_effects() {
        let mut assembly = NoOutputAssembly::new();
        assembly.append_constant(U256::from(1u64));
        assembly.append_constant(U256::from(2u64));
        assembly.append_instruction(Instruction::Add);
        assert_eq!(assembly.stack_height(), 1);
        let label = assembly.new_label_id();
        assembly.append_jump_to(label, -1);
        assert_eq!(assembly.stack_height(), 0);
    }

    #[test]
    fn sub_ids_are_shared_with_data() {
        let mut assembly = NoOutputAssembly::new();
        let (_, first) = assembly.create_sub_assembly();
        let second = assembly.append_data(b"abc");
        assert_ne!(first, second);
    }
}
