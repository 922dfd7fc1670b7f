//! Dialects: which builtins exist and what the optimiser may assume about
//! them.
//!
//! A dialect value is created once per compilation and passed by reference
//! to every pass that needs it.

use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::prelude::{Type, YulString};

use super::Instruction;

/// How much of the language is accepted.
///
/// `Loose` allows labels, stack assignments and raw jumps. `Strict` is
/// plain untyped Yul over SVM instructions. `Yul` is typed Yul with no
/// builtins of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum AsmFlavour {
    Loose,
    Strict,
    Yul,
}

/// How a builtin is lowered to SVM code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCode {
    Instruction(Instruction),
    DataSize,
    DataOffset,
    DataCopy,
    /// Consumes the arguments and pushes zeros. Used by dry-run code
    /// generation, which only tracks stack heights.
    StackEffectOnly,
}

#[derive(Debug, Clone)]
pub struct BuiltinFunction {
    pub name: YulString,
    pub parameters: Vec<Type>,
    pub returns: Vec<Type>,
    pub movable: bool,
    pub side_effect_free: bool,
    pub side_effect_free_if_no_msize: bool,
    pub is_msize: bool,
    /// Arguments must be literals and are never evaluated.
    pub literal_arguments: bool,
    pub code: BuiltinCode,
}

impl BuiltinFunction {
    fn from_instruction(instruction: Instruction) -> Self {
        let info = instruction.info();
        Self {
            name: instruction.mnemonic().into(),
            parameters: vec![Type::default(); info.args],
            returns: vec![Type::default(); info.returns],
            movable: instruction.movable(),
            side_effect_free: instruction.side_effect_free(),
            side_effect_free_if_no_msize: instruction.side_effect_free_if_no_msize(),
            is_msize: instruction == Instruction::MSize,
            literal_arguments: false,
            code: BuiltinCode::Instruction(instruction),
        }
    }

    fn object_access(name: &str, args: usize, returns: usize, code: BuiltinCode) -> Self {
        let pure = code != BuiltinCode::DataCopy;
        Self {
            name: name.into(),
            parameters: vec![Type::default(); args],
            returns: vec![Type::default(); returns],
            movable: pure,
            side_effect_free: pure,
            side_effect_free_if_no_msize: pure,
            is_msize: false,
            literal_arguments: pure,
            code,
        }
    }

    pub fn instruction(&self) -> Option<Instruction> {
        match self.code {
            BuiltinCode::Instruction(i) => Some(i),
            _ => None,
        }
    }
}

/// The questions passes ask about the language they operate on.
pub trait Dialect {
    fn flavour(&self) -> AsmFlavour;

    fn builtin(&self, name: &str) -> Option<&BuiltinFunction>;

    /// Instruction usable with call syntax, e.g. `add(1, 2)`.
    fn functional_instruction(&self, _name: &str) -> Option<Instruction> {
        None
    }

    /// Names that user code may not declare.
    fn is_reserved(&self, name: &str) -> bool {
        self.builtin(name).is_some()
    }

    fn as_svm(&self) -> Option<&SvmDialect> {
        None
    }
}

/// Typed Yul without any builtins.
#[derive(Debug, Clone, Copy, Default)]
pub struct YulDialect;

impl Dialect for YulDialect {
    fn flavour(&self) -> AsmFlavour {
        AsmFlavour::Yul
    }

    fn builtin(&self, _name: &str) -> Option<&BuiltinFunction> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct SvmDialect {
    flavour: AsmFlavour,
    object_access: bool,
    functions: HashMap<YulString, BuiltinFunction>,
}

impl SvmDialect {
    pub fn new(flavour: AsmFlavour, object_access: bool) -> Self {
        let mut functions: HashMap<YulString, BuiltinFunction> = Instruction::iter()
            .filter(|i| !i.is_stack_manipulation())
            .map(BuiltinFunction::from_instruction)
            .map(|f| (f.name.clone(), f))
            .collect();
        if object_access {
            for builtin in [
                BuiltinFunction::object_access("datasize", 1, 1, BuiltinCode::DataSize),
                BuiltinFunction::object_access("dataoffset", 1, 1, BuiltinCode::DataOffset),
                BuiltinFunction::object_access("datacopy", 3, 0, BuiltinCode::DataCopy),
            ] {
                functions.insert(builtin.name.clone(), builtin);
            }
        }
        Self {
            flavour,
            object_access,
            functions,
        }
    }

    pub fn loose_assembly() -> Self {
        Self::new(AsmFlavour::Loose, false)
    }

    pub fn strict_assembly() -> Self {
        Self::new(AsmFlavour::Strict, false)
    }

    pub fn strict_assembly_for_objects() -> Self {
        Self::new(AsmFlavour::Strict, true)
    }

    pub fn provides_object_access(&self) -> bool {
        self.object_access
    }

    /// A copy of this dialect whose builtins only model their stack effect.
    pub fn no_output(&self) -> Self {
        let mut copy = self.clone();
        for function in copy.functions.values_mut() {
            function.code = BuiltinCode::StackEffectOnly;
        }
        copy
    }
}

impl Dialect for SvmDialect {
    fn flavour(&self) -> AsmFlavour {
        self.flavour
    }

    fn builtin(&self, name: &str) -> Option<&BuiltinFunction> {
        self.functions.get(name)
    }

    fn functional_instruction(&self, name: &str) -> Option<Instruction> {
        let instruction: Instruction = name.parse().ok()?;
        match self.flavour {
            AsmFlavour::Loose => (!instruction.is_push()).then_some(instruction),
            _ => self.builtin(name).and_then(BuiltinFunction::instruction),
        }
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.builtin(name).is_some() || name.parse::<Instruction>().is_ok()
    }

    fn as_svm(&self) -> Option<&SvmDialect> {
        Some(self)
    }
}
