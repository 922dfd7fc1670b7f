use alloy_primitives::U256;

use crate::prelude::SourceLocation;

use super::Instruction;

pub type LabelId = usize;
pub type SubId = usize;

/// The interface code generation writes through.
///
/// Implementations track the stack height after every emitted item so the
/// code generator can address variables relative to the top of the stack.
pub trait AbstractAssembly {
    fn set_source_location(&mut self, location: SourceLocation);

    /// Current stack height. May be negative while emitting function bodies.
    fn stack_height(&self) -> i32;

    fn append_instruction(&mut self, instruction: Instruction);

    fn append_constant(&mut self, constant: U256);

    /// Marks the current position as the target of `label`.
    fn append_label(&mut self, label: LabelId);

    /// Pushes the code position of `label`.
    fn append_label_reference(&mut self, label: LabelId);

    fn new_label_id(&mut self) -> LabelId;

    /// Returns the same label every time it is asked for `name`.
    fn named_label(&mut self, name: &str) -> LabelId;

    /// Emits `JUMP`, then adjusts the tracked height by `stack_diff_after`.
    fn append_jump(&mut self, stack_diff_after: i32) {
        self.append_instruction(Instruction::Jump);
        self.set_stack_height(self.stack_height() + stack_diff_after);
    }

    fn append_jump_to(&mut self, label: LabelId, stack_diff_after: i32) {
        self.append_label_reference(label);
        self.append_jump(stack_diff_after);
    }

    fn append_jump_to_if(&mut self, label: LabelId) {
        self.append_label_reference(label);
        self.append_instruction(Instruction::JumpI);
    }

    /// Pushes the size of the assembly being written, sub-assemblies and
    /// data included.
    fn append_assembly_size(&mut self);

    /// Starts a nested assembly that is appended after this one's code.
    fn create_sub_assembly(&mut self) -> (&mut Self, SubId)
    where
        Self: Sized;

    /// Pushes the offset of a sub-assembly or data blob within this assembly.
    fn append_data_offset(&mut self, sub: SubId);

    /// Pushes the size of a sub-assembly or data blob.
    fn append_data_size(&mut self, sub: SubId);

    /// Attaches a data blob, appended after the code like a sub-assembly.
    fn append_data(&mut self, data: &[u8]) -> SubId;

    /// Overrides the tracked stack height. Used after unconditional jumps.
    fn set_stack_height(&mut self, height: i32);
}
