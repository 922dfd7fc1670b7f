//! A reference interpreter over the AST.
//!
//! The interpreter runs strict or typed Yul directly, without code
//! generation. Its observable result (memory, storage, the trace of
//! environment interactions and how execution ended) is what optimiser
//! passes must preserve, so tests run a program before and after a pass
//! and compare the two results.
//!
//! The environment is deterministic: queries like `caller()` or `gas()`
//! return a hash of the instruction and its arguments, external calls
//! always succeed and copies from code or return data write zeros.

mod instructions;

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::U256;
use anyhow::{bail, Context, Result};
use tracing::{debug, instrument, trace};

use crate::{
    prelude::*,
    svm::{BuiltinCode, Dialect, Instruction},
};

/// Why execution stopped before running off the end of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Termination {
    Stop,
    Return,
    Revert,
    Invalid,
    SelfDestruct,
    StepLimit,
}

impl std::error::Error for Termination {}

#[derive(Debug, Clone, Copy)]
pub struct InterpreterLimits {
    /// Statements and loop iterations executed before giving up.
    pub max_steps: usize,
    /// Highest memory address that may be touched.
    pub max_memory: usize,
}

impl Default for InterpreterLimits {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_memory: 1 << 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpreterState {
    pub calldata: Vec<u8>,
    pub memory: Vec<u8>,
    /// Only non-zero slots are kept.
    pub storage: BTreeMap<U256, U256>,
    pub trace: Vec<String>,
    pub return_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterResult {
    pub state: InterpreterState,
    /// `None` if execution reached the end of the code.
    pub termination: Option<Termination>,
}

enum Flow {
    Normal,
    Break,
    Continue,
}

pub struct Interpreter<'a> {
    dialect: &'a dyn Dialect,
    limits: InterpreterLimits,
    state: InterpreterState,
    steps: usize,
    functions: Vec<HashMap<YulString, &'a FunctionDefinition>>,
    /// Scopes of the function currently executing, innermost last.
    variables: Vec<HashMap<YulString, U256>>,
}

impl<'a> Interpreter<'a> {
    #[instrument(level = "debug", skip_all)]
    pub fn run(
        dialect: &'a dyn Dialect,
        ast: &'a Block,
        calldata: &[u8],
        limits: InterpreterLimits,
    ) -> Result<InterpreterResult> {
        let mut interpreter = Self {
            dialect,
            limits,
            state: InterpreterState {
                calldata: calldata.to_vec(),
                ..Default::default()
            },
            steps: 0,
            functions: Vec::new(),
            variables: Vec::new(),
        };
        let termination = match interpreter.block(ast) {
            Ok(_) => None,
            Err(error) => Some(error.downcast::<Termination>()?),
        };
        debug!(
            "Finished after {} step(s): {termination:?}",
            interpreter.steps
        );
        Ok(InterpreterResult {
            state: interpreter.state,
            termination,
        })
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            bail!(Termination::StepLimit);
        }
        Ok(())
    }

    fn block(&mut self, block: &'a Block) -> Result<Flow> {
        self.enter_scope(block);
        let flow = self.statements(&block.statements);
        self.leave_scope();
        flow
    }

    fn enter_scope(&mut self, block: &'a Block) {
        let functions = block
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::FunctionDefinition(f) => Some((f.name.clone(), f)),
                _ => None,
            })
            .collect();
        self.functions.push(functions);
        self.variables.push(HashMap::new());
    }

    fn leave_scope(&mut self) {
        self.functions.pop();
        self.variables.pop();
    }

    fn statements(&mut self, statements: &'a [Statement]) -> Result<Flow> {
        for statement in statements {
            match self.statement(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&mut self, statement: &'a Statement) -> Result<Flow> {
        self.step()?;
        match statement {
            Statement::ExpressionStatement(s) => {
                let values = self.evaluate(&s.expression)?;
                if !values.is_empty() {
                    bail!("Expression statement at {} leaves values behind", s.location);
                }
            }
            Statement::VariableDeclaration(d) => {
                let values = match &d.value {
                    Some(value) => self.evaluate(value)?,
                    None => vec![U256::ZERO; d.variables.len()],
                };
                if values.len() != d.variables.len() {
                    bail!("Wrong number of values in declaration at {}", d.location);
                }
                for (variable, value) in d.variables.iter().zip(values) {
                    self.declare(variable.name.clone(), value);
                }
            }
            Statement::Assignment(a) => {
                let values = self.evaluate(&a.value)?;
                if values.len() != a.variable_names.len() {
                    bail!("Wrong number of values in assignment at {}", a.location);
                }
                for (variable, value) in a.variable_names.iter().zip(values) {
                    self.assign(&variable.name, value)?;
                }
            }
            Statement::If(i) => {
                if !self.evaluate_single(&i.condition)?.is_zero() {
                    return self.block(&i.body);
                }
            }
            Statement::Switch(s) => {
                let value = self.evaluate_single(&s.expression)?;
                for case in &s.cases {
                    let matches = match &case.value {
                        Some(literal) => literal.value()? == value,
                        None => true,
                    };
                    if matches {
                        return self.block(&case.body);
                    }
                }
            }
            Statement::ForLoop(l) => self.for_loop(l)?,
            Statement::Break(_) => return Ok(Flow::Break),
            Statement::Continue(_) => return Ok(Flow::Continue),
            Statement::Block(b) => return self.block(b),
            Statement::FunctionDefinition(_) => {}
            Statement::Label(_) | Statement::StackAssignment(_) => {
                bail!("Loose assembly at {} cannot be interpreted", statement.location())
            }
        }
        Ok(Flow::Normal)
    }

    fn for_loop(&mut self, for_loop: &'a ForLoop) -> Result<()> {
        self.enter_scope(&for_loop.pre);
        let result = self.run_loop(for_loop);
        self.leave_scope();
        result
    }

    fn run_loop(&mut self, for_loop: &'a ForLoop) -> Result<()> {
        self.statements(&for_loop.pre.statements)?;
        loop {
            self.step()?;
            if self.evaluate_single(&for_loop.condition)?.is_zero() {
                return Ok(());
            }
            if let Flow::Break = self.block(&for_loop.body)? {
                return Ok(());
            }
            self.block(&for_loop.post)?;
        }
    }

    fn declare(&mut self, name: YulString, value: U256) {
        if let Some(scope) = self.variables.last_mut() {
            scope.insert(name, value);
        }
    }

    fn assign(&mut self, name: &YulString, value: U256) -> Result<()> {
        match self
            .variables
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            Some(slot) => *slot = value,
            None => bail!("Assignment to unknown variable {name}"),
        }
        Ok(())
    }

    fn variable(&self, identifier: &Identifier) -> Result<U256> {
        self.variables
            .iter()
            .rev()
            .find_map(|scope| scope.get(&identifier.name))
            .copied()
            .with_context(|| {
                format!("Unknown variable {} at {}", identifier.name, identifier.location)
            })
    }

    fn function(&self, name: &YulString) -> Option<&'a FunctionDefinition> {
        self.functions
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
    }

    fn evaluate_single(&mut self, expression: &'a Expression) -> Result<U256> {
        match self.evaluate(expression)?.as_slice() {
            [value] => Ok(*value),
            values => bail!(
                "Expected a single value at {}, got {}",
                expression.location(),
                values.len()
            ),
        }
    }

    /// Evaluates arguments right to left and returns them in source order.
    fn evaluate_arguments(&mut self, arguments: &'a [Expression]) -> Result<Vec<U256>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments.iter().rev() {
            values.push(self.evaluate_single(argument)?);
        }
        values.reverse();
        Ok(values)
    }

    fn evaluate(&mut self, expression: &'a Expression) -> Result<Vec<U256>> {
        match expression {
            Expression::Literal(literal) => Ok(vec![literal.value()?]),
            Expression::Identifier(identifier) => Ok(vec![self.variable(identifier)?]),
            Expression::FunctionalInstruction(instruction) => {
                let arguments = self.evaluate_arguments(&instruction.arguments)?;
                self.instruction(instruction.instruction, &arguments)
            }
            Expression::FunctionCall(call) => self.function_call(call),
        }
    }

    fn instruction(
        &mut self,
        instruction: Instruction,
        arguments: &[U256],
    ) -> Result<Vec<U256>> {
        let limits = self.limits;
        let result = self.state.execute(instruction, arguments, limits)?;
        trace!("{instruction}{arguments:?} -> {result:?}");
        Ok(result.into_iter().collect())
    }

    fn function_call(&mut self, call: &'a FunctionCall) -> Result<Vec<U256>> {
        let dialect = self.dialect;
        if let Some(builtin) = dialect.builtin(&call.function_name.name) {
            return match builtin.code {
                BuiltinCode::Instruction(instruction) => {
                    let arguments = self.evaluate_arguments(&call.arguments)?;
                    self.instruction(instruction, &arguments)
                }
                BuiltinCode::DataSize | BuiltinCode::DataOffset => {
                    let name = match call.arguments.as_slice() {
                        [Expression::Literal(literal)] => literal.string_bytes()?,
                        _ => bail!("{} expects a literal at {}", builtin.name, call.location),
                    };
                    let seed = [builtin.name.as_bytes(), name.as_slice()].concat();
                    Ok(vec![instructions::hash_word(&seed)])
                }
                BuiltinCode::DataCopy => {
                    let arguments = self.evaluate_arguments(&call.arguments)?;
                    self.instruction(Instruction::CodeCopy, &arguments)
                }
                BuiltinCode::StackEffectOnly => Ok(vec![U256::ZERO; builtin.returns.len()]),
            };
        }

        let Some(function) = self.function(&call.function_name.name) else {
            bail!("Unknown function {} at {}", call.function_name.name, call.location);
        };
        let arguments = self.evaluate_arguments(&call.arguments)?;
        if arguments.len() != function.parameters.len() {
            bail!("Wrong number of arguments to {} at {}", function.name, call.location);
        }

        let mut frame: HashMap<YulString, U256> = function
            .parameters
            .iter()
            .map(|p| p.name.clone())
            .zip(arguments)
            .collect();
        for variable in &function.return_variables {
            frame.insert(variable.name.clone(), U256::ZERO);
        }
        let outer = std::mem::replace(&mut self.variables, vec![frame]);
        let body = self.block(&function.body);
        let frame = std::mem::replace(&mut self.variables, outer);
        body?;

        let Some(frame) = frame.into_iter().next() else {
            bail!("Lost the frame of {}", function.name);
        };
        function
            .return_variables
            .iter()
            .map(|variable| {
                frame
                    .get(&variable.name)
                    .copied()
                    .with_context(|| format!("Lost return variable {}", variable.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::YulParser, svm::SvmDialect};

    fn run(source: &str) -> InterpreterResult {
        run_with(source, &[])
    }

    fn run_with(source: &str, calldata: &[u8]) -> InterpreterResult {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse(source, &dialect).unwrap();
        Interpreter::run(&dialect, &ast, calldata, InterpreterLimits::default()).unwrap()
    }

    fn slot(result: &InterpreterResult, key: u64) -> U256 {
        result
            .state
            .storage
            .get(&U256::from(key))
            .copied()
            .unwrap_or_default()
    }

    #[test]
    fn arithmetic_and_storage() {
        let result = run("{ let x := add(2, 3) sstore(0, mul(x, x)) sstore(1, 0) }");
        assert_eq!(slot(&result, 0), U256::from(25));
        assert_eq!(result.state.storage.len(), 1);
        assert_eq!(result.termination, None);
    }

    #[test]
    fn functions_return_values() {
        let result = run(
            "{ function f(a, b) -> x, y { x := add(a, b) y := sub(a, b) } let p, q := f(7, 2) sstore(p, q) }",
        );
        assert_eq!(slot(&result, 9), U256::from(5));
    }

    #[test]
    fn loops_break_and_continue() {
        let result = run(
            "{ let s := 0 for { let i := 0 } 1 { i := add(i, 1) } { if eq(i, 10) { break } if eq(mod(i, 2), 1) { continue } s := add(s, i) } sstore(0, s) }",
        );
        assert_eq!(slot(&result, 0), U256::from(20));
    }

    #[test]
    fn switch_falls_back_to_default() {
        let source = "{ switch calldataload(0) case 0 { sstore(0, 10) } case 1 { sstore(0, 11) } default { sstore(0, 12) } }";
        assert_eq!(slot(&run(source), 0), U256::from(10));
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(slot(&run_with(source, &one), 0), U256::from(11));
        one[31] = 2;
        assert_eq!(slot(&run_with(source, &one), 0), U256::from(12));
    }

    #[test]
    fn return_ends_execution() {
        let result = run("{ mstore(0, 0x2a) return(31, 1) sstore(0, 1) }");
        assert_eq!(result.termination, Some(Termination::Return));
        assert_eq!(result.state.return_data, vec![0x2a]);
        assert!(result.state.storage.is_empty());
        assert_eq!(result.state.trace, vec!["RETURN(0x1f, 0x1)"]);
    }

    #[test]
    fn endless_loops_hit_the_step_limit() {
        let result = run("{ for {} 1 {} {} }");
        assert_eq!(result.termination, Some(Termination::StepLimit));
    }

    #[test]
    fn environment_is_deterministic() {
        let first = run("{ sstore(0, caller()) sstore(1, caller()) }");
        assert_eq!(slot(&first, 0), slot(&first, 1));
        assert_eq!(first, run("{ sstore(0, caller()) sstore(1, caller()) }"));
    }

    #[test]
    fn memory_limit_is_an_error() {
        let dialect = SvmDialect::strict_assembly();
        let ast = YulParser::parse("{ mstore(0x1000000000, 1) }", &dialect).unwrap();
        assert!(Interpreter::run(&dialect, &ast, &[], InterpreterLimits::default()).is_err());
    }
}
