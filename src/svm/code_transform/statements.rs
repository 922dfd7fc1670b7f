use alloy_primitives::U256;
use anyhow::Result;

use crate::{
    analysis::DeclarationId,
    common::YulError,
    prelude::*,
    svm::{abstract_assembly::AbstractAssembly, AsmFlavour, Instruction},
    yul_assert,
};

use super::{CodeTransform, LoopContext, MAX_SWAP_DEPTH};

impl<'r, 'a, A: AbstractAssembly> CodeTransform<'r, 'a, A> {
    pub(super) fn visit_statements(&mut self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.visit_statement(statement)?;
        }
        Ok(())
    }

    fn visit_statement(&mut self, statement: &Statement) -> Result<()> {
        self.assembly.set_source_location(statement.location());
        match statement {
            Statement::ExpressionStatement(s) => {
                let height = self.assembly.stack_height();
                self.visit_expression(&s.expression)?;
                if self.dialect.flavour() != AsmFlavour::Loose {
                    self.check_stack_height(s.location, height, "expression statement")?;
                }
            }
            Statement::VariableDeclaration(d) => self.variable_declaration(d)?,
            Statement::Assignment(a) => {
                self.visit_expression(&a.value)?;
                for variable in a.variable_names.iter().rev() {
                    self.assign_variable(variable.location, &variable.name)?;
                }
            }
            Statement::StackAssignment(s) => {
                self.assign_variable(s.location, &s.variable_name.name)?;
            }
            Statement::Label(l) => {
                let (declaration, _) = self.lookup(l.location, &l.name)?;
                let label = self.label_id(declaration);
                self.assembly.append_label(label);
            }
            Statement::FunctionDefinition(f) => self.function_definition(f)?,
            Statement::If(i) => {
                let height = self.assembly.stack_height();
                self.visit_expression(&i.condition)?;
                self.assembly.append_instruction(Instruction::IsZero);
                let end = self.assembly.new_label_id();
                self.assembly.append_jump_to_if(end);
                self.visit_block(&i.body)?;
                self.assembly.append_label(end);
                self.check_stack_height(i.location, height, "if")?;
            }
            Statement::Switch(s) => self.switch(s)?,
            Statement::ForLoop(l) => self.for_loop(l)?,
            Statement::Break(Break { location }) => {
                let target = self.innermost_loop(*location)?;
                let popped = self.pop_until(target.stack_height);
                self.assembly.append_jump_to(target.break_label, popped);
            }
            Statement::Continue(Continue { location }) => {
                let target = self.innermost_loop(*location)?;
                let popped = self.pop_until(target.stack_height);
                self.assembly.append_jump_to(target.continue_label, popped);
            }
            Statement::Block(b) => self.visit_block(b)?,
        }
        Ok(())
    }

    fn innermost_loop(&self, location: SourceLocation) -> Result<LoopContext> {
        self.loops
            .last()
            .copied()
            .ok_or_else(|| YulError::internal(location, "Break or continue outside of a loop").into())
    }

    fn variable_declaration(&mut self, declaration: &VariableDeclaration) -> Result<()> {
        let height = self.assembly.stack_height();
        match &declaration.value {
            Some(value) => self.visit_expression(value)?,
            None => {
                for _ in &declaration.variables {
                    self.assembly.append_constant(U256::ZERO);
                }
            }
        }
        self.check_stack_height(
            declaration.location,
            height + declaration.variables.len() as i32,
            "variable declaration",
        )?;
        for (slot, variable) in declaration.variables.iter().enumerate() {
            let (id, _) = self.lookup(variable.location, &variable.name)?;
            self.variable_stack_heights.insert(id, height + slot as i32);
        }
        Ok(())
    }

    fn function_definition(&mut self, function: &FunctionDefinition) -> Result<()> {
        let location = function.location;
        let (declaration, _) = self.lookup(location, &function.name)?;
        let entry = self.function_entry_id(declaration);
        let function_scope = self.info.function_scope_of(function)?;

        // The return label sits at height zero.
        let mut height = 1;
        for parameter in function.parameters.iter().rev() {
            let id = DeclarationId {
                scope: function_scope,
                name: parameter.name.clone(),
            };
            self.variable_stack_heights.insert(id, height);
            height += 1;
        }

        let height_before = self.assembly.stack_height();
        let after_function = self.assembly.new_label_id();
        self.assembly.append_jump_to(after_function, height - height_before);
        self.assembly.append_label(entry);
        self.assembly.set_stack_height(height);

        for variable in &function.return_variables {
            let id = DeclarationId {
                scope: function_scope,
                name: variable.name.clone(),
            };
            self.variable_stack_heights.insert(id, height);
            height += 1;
            self.assembly.append_constant(U256::ZERO);
        }

        let outer_loops = std::mem::take(&mut self.loops);
        let outer_name = std::mem::replace(&mut self.function_name, function.name.clone());
        let body = self
            .visit_block(&function.body)
            .and_then(|_| self.check_stack_height(location, height, "function body"))
            .and_then(|_| {
                self.return_from_function(function.parameters.len(), function.return_variables.len())
            });
        self.loops = outer_loops;
        self.function_name = outer_name;
        body?;

        self.assembly.set_source_location(location);
        self.assembly
            .append_jump(height_before - function.return_variables.len() as i32);
        self.assembly.append_label(after_function);
        self.check_stack_height(location, height_before, "function definition")
    }

    /// Turns `label params... returns...` into `returns... label`.
    fn return_from_function(&mut self, parameters: usize, returns: usize) -> Result<()> {
        // Target position of each slot, -1 for slots to drop.
        let mut layout: Vec<i32> = Vec::with_capacity(1 + parameters + returns);
        layout.push(returns as i32);
        layout.extend(std::iter::repeat(-1).take(parameters));
        layout.extend(0..returns as i32);

        let frame = layout.len() as i32;
        yul_assert!(
            self.assembly.stack_height() == frame,
            SourceLocation::default(),
            "Function frame of {} slot(s) at stack height {}",
            frame,
            self.assembly.stack_height()
        );
        if frame > MAX_SWAP_DEPTH {
            // Execution stops at INVALID, only the height of `returns... label`
            // has to hold for the code after it.
            self.stack_error(YulString::default(), frame - MAX_SWAP_DEPTH);
            self.assembly.set_stack_height(1 + returns as i32);
            return Ok(());
        }

        while let Some(&top) = layout.last() {
            let last = layout.len() - 1;
            if top == last as i32 {
                break;
            }
            if top < 0 {
                self.assembly.append_instruction(Instruction::Pop);
                layout.pop();
            } else {
                self.assembly
                    .append_instruction(Instruction::swap(last - top as usize)?);
                layout.swap(top as usize, last);
            }
        }
        for (position, target) in layout.iter().enumerate() {
            yul_assert!(
                *target == position as i32,
                SourceLocation::default(),
                "Error reshuffling the stack"
            );
        }
        Ok(())
    }

    fn switch(&mut self, switch: &Switch) -> Result<()> {
        let height = self.assembly.stack_height();
        self.visit_expression(&switch.expression)?;
        let end = self.assembly.new_label_id();

        let mut bodies = Vec::new();
        for case in &switch.cases {
            match &case.value {
                Some(value) => {
                    self.visit_literal(value)?;
                    self.assembly.append_instruction(Instruction::Dup2);
                    self.assembly.append_instruction(Instruction::Eq);
                    let body = self.assembly.new_label_id();
                    self.assembly.append_jump_to_if(body);
                    bodies.push((body, &case.body));
                }
                None => self.visit_block(&case.body)?,
            }
        }
        self.assembly.append_jump_to(end, 0);

        let count = bodies.len();
        for (index, (label, body)) in bodies.into_iter().enumerate() {
            self.assembly.append_label(label);
            self.visit_block(body)?;
            if index + 1 != count {
                self.assembly.append_jump_to(end, 0);
            }
        }
        self.assembly.append_label(end);
        self.assembly.append_instruction(Instruction::Pop);
        self.check_stack_height(switch.location, height, "switch")
    }

    fn for_loop(&mut self, for_loop: &ForLoop) -> Result<()> {
        let outer = self.scope.replace(self.info.scope_of(&for_loop.pre)?);
        let height = self.assembly.stack_height();
        self.visit_statements(&for_loop.pre.statements)?;

        let start = self.assembly.new_label_id();
        let post = self.assembly.new_label_id();
        let end = self.assembly.new_label_id();

        self.assembly.set_source_location(for_loop.location);
        self.assembly.append_label(start);
        self.visit_expression(&for_loop.condition)?;
        self.assembly.append_instruction(Instruction::IsZero);
        self.assembly.append_jump_to_if(end);

        self.loops.push(LoopContext {
            break_label: end,
            continue_label: post,
            stack_height: self.assembly.stack_height(),
        });
        let body = self.visit_block(&for_loop.body);
        self.loops.pop();
        body?;

        self.assembly.append_label(post);
        self.visit_block(&for_loop.post)?;
        self.assembly.append_jump_to(start, 0);
        self.assembly.append_label(end);

        self.finalize_block(&for_loop.pre, height)?;
        self.scope = outer;
        Ok(())
    }
}
