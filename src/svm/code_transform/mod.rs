//! Lowering of analysed Yul code to an [`AbstractAssembly`].
//!
//! Variables live on the stack at a fixed height for as long as their
//! scope is open and are reached with `DUPn` and `SWAPn`. A function body
//! starts with the return label at height zero, the parameters above it in
//! reverse order and the return variables on top. Before returning, the
//! frame is reshuffled so that only the return values remain, first one
//! deepest.
//!
//! A variable out of `DUP`/`SWAP` reach is recorded as a
//! [`StackTooDeepError`] and code generation continues with an `INVALID`
//! in its place, so one run reports every offending function. A stack
//! height mismatch at a control flow join is an internal error.

mod expressions;
mod statements;

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::{
    analysis::{AnalysisInfo, DeclarationId, ScopeId, Symbol},
    common::{StackTooDeepError, YulError},
    prelude::*,
    svm::{
        abstract_assembly::{AbstractAssembly, LabelId, SubId},
        Dialect, Instruction,
    },
    yul_assert,
};

/// Deepest slot `DUPn` can copy.
const MAX_DUP_DEPTH: i32 = 16;
/// Deepest slot `SWAPn` followed by `POP` can overwrite.
const MAX_SWAP_DEPTH: i32 = 17;

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeTransformOptions {
    /// Derive function entry labels from function names, so they are
    /// shared between all code using the same assembly.
    pub use_named_labels_for_functions: bool,
}

/// What object builtins like `datasize` refer to.
#[derive(Debug, Clone, Default)]
pub struct BuiltinContext {
    /// Name of the object whose code is being generated.
    pub current_object: Option<YulString>,
    /// Sub-assemblies and data blobs by name.
    pub sub_ids: HashMap<YulString, SubId>,
}

#[derive(Debug, Clone, Copy)]
struct LoopContext {
    break_label: LabelId,
    continue_label: LabelId,
    /// Height at the start of the body, which break and continue restore.
    stack_height: i32,
}

pub struct CodeTransform<'r, 'a, A: AbstractAssembly> {
    assembly: &'r mut A,
    info: &'r AnalysisInfo<'a>,
    dialect: &'r dyn Dialect,
    builtin_context: &'r BuiltinContext,
    options: CodeTransformOptions,
    function_entry_ids: HashMap<DeclarationId, LabelId>,
    label_ids: HashMap<DeclarationId, LabelId>,
    variable_stack_heights: HashMap<DeclarationId, i32>,
    scope: Option<ScopeId>,
    loops: Vec<LoopContext>,
    function_name: YulString,
    stack_errors: Vec<StackTooDeepError>,
}

impl<'r, 'a, A: AbstractAssembly> CodeTransform<'r, 'a, A> {
    /// Generates code for `block` and returns the stack errors found on the
    /// way. The code is only usable if there are none.
    #[instrument(level = "debug", skip_all)]
    pub fn run(
        assembly: &'r mut A,
        info: &'r AnalysisInfo<'a>,
        block: &Block,
        dialect: &'r dyn Dialect,
        builtin_context: &'r BuiltinContext,
        options: CodeTransformOptions,
    ) -> Result<Vec<StackTooDeepError>> {
        let mut transform = Self {
            assembly,
            info,
            dialect,
            builtin_context,
            options,
            function_entry_ids: HashMap::new(),
            label_ids: HashMap::new(),
            variable_stack_heights: HashMap::new(),
            scope: None,
            loops: Vec::new(),
            function_name: YulString::default(),
            stack_errors: Vec::new(),
        };
        transform.visit_block(block)?;
        debug!("{} stack error(s)", transform.stack_errors.len());
        Ok(transform.stack_errors)
    }

    fn current_scope(&self, location: SourceLocation) -> Result<ScopeId> {
        self.scope
            .ok_or_else(|| YulError::internal(location, "Code generation outside of any scope").into())
    }

    fn lookup(&self, location: SourceLocation, name: &YulString) -> Result<(DeclarationId, &'r Symbol)> {
        let info = self.info;
        let scope = self.current_scope(location)?;
        info.scopes
            .lookup(scope, name)
            .ok_or_else(|| YulError::internal(location, format!("Identifier {name} not found")).into())
    }

    fn function_entry_id(&mut self, declaration: DeclarationId) -> LabelId {
        if let Some(label) = self.function_entry_ids.get(&declaration) {
            return *label;
        }
        let label = if self.options.use_named_labels_for_functions {
            self.assembly.named_label(&declaration.name)
        } else {
            self.assembly.new_label_id()
        };
        self.function_entry_ids.insert(declaration, label);
        label
    }

    fn label_id(&mut self, declaration: DeclarationId) -> LabelId {
        if let Some(label) = self.label_ids.get(&declaration) {
            return *label;
        }
        let label = self.assembly.new_label_id();
        self.label_ids.insert(declaration, label);
        label
    }

    /// Distance from the top of the stack to `variable`, one for the top
    /// slot. `None` if the variable is out of reach.
    fn variable_height_diff(
        &mut self,
        location: SourceLocation,
        variable: &YulString,
        for_swap: bool,
    ) -> Result<Option<i32>> {
        let (declaration, _) = self.lookup(location, variable)?;
        let Some(height) = self.variable_stack_heights.get(&declaration).copied() else {
            return Err(YulError::internal(
                location,
                format!("Variable {variable} has no stack slot"),
            )
            .into());
        };
        let diff = self.assembly.stack_height() - height;
        let (lowest, limit) = if for_swap {
            (2, MAX_SWAP_DEPTH)
        } else {
            (1, MAX_DUP_DEPTH)
        };
        yul_assert!(
            diff >= lowest,
            location,
            "Variable {variable} is not below the top of the stack (distance {diff})"
        );
        if diff > limit {
            self.stack_error(variable.clone(), diff - limit);
            return Ok(None);
        }
        Ok(Some(diff))
    }

    fn stack_error(&mut self, variable: YulString, depth: i32) {
        let error = StackTooDeepError {
            function_name: self.function_name.clone(),
            variable,
            depth,
        };
        debug!("{error}");
        self.stack_errors.push(error);
        self.assembly.append_instruction(Instruction::Invalid);
    }

    /// Pushes a copy of `variable`.
    fn copy_variable(&mut self, location: SourceLocation, variable: &YulString) -> Result<()> {
        match self.variable_height_diff(location, variable, false)? {
            Some(diff) => self.assembly.append_instruction(Instruction::dup(diff as usize)?),
            None => self.assembly.append_constant(alloy_primitives::U256::ZERO),
        }
        Ok(())
    }

    /// Pops the top of the stack into `variable`.
    fn assign_variable(&mut self, location: SourceLocation, variable: &YulString) -> Result<()> {
        if let Some(diff) = self.variable_height_diff(location, variable, true)? {
            self.assembly
                .append_instruction(Instruction::swap(diff as usize - 1)?);
        }
        self.assembly.append_instruction(Instruction::Pop);
        Ok(())
    }

    /// Pops until the stack has `target` items and returns how many were
    /// popped.
    fn pop_until(&mut self, target: i32) -> i32 {
        let popped = self.assembly.stack_height() - target;
        for _ in 0..popped {
            self.assembly.append_instruction(Instruction::Pop);
        }
        popped
    }

    fn check_stack_height(&self, location: SourceLocation, expected: i32, what: &str) -> Result<()> {
        let actual = self.assembly.stack_height();
        yul_assert!(
            actual == expected,
            location,
            "Stack height mismatch after {what}: expected {expected}, got {actual}"
        );
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        let outer = self.scope.replace(self.info.scope_of(block)?);
        let height_before = self.assembly.stack_height();
        self.visit_statements(&block.statements)?;
        self.finalize_block(block, height_before)?;
        self.scope = outer;
        Ok(())
    }

    /// Pops the variables of `block`'s scope.
    fn finalize_block(&mut self, block: &Block, height_before: i32) -> Result<()> {
        self.assembly.set_source_location(block.location);
        let scope = self.info.scope_of(block)?;
        for _ in 0..self.info.scopes.number_of_variables(scope) {
            self.assembly.append_instruction(Instruction::Pop);
        }
        if self.dialect.flavour() != crate::svm::AsmFlavour::Loose {
            self.check_stack_height(block.location, height_before, "block")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
