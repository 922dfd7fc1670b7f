//! The SVM instruction set.
//!
//! Opcode numbering follows the familiar 256-bit word machine layout:
//! `PUSHn` is `0x5f + n`, `DUPn` is `0x7f + n` and `SWAPn` is `0x8f + n`.

use alloy_primitives::U256;
use anyhow::{Context, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum Instruction {
    Stop = 0x00,
    Add = 0x01,
    Mul = 0x02,
    Sub = 0x03,
    Div = 0x04,
    SDiv = 0x05,
    Mod = 0x06,
    SMod = 0x07,
    AddMod = 0x08,
    MulMod = 0x09,
    Exp = 0x0a,
    SignExtend = 0x0b,
    Lt = 0x10,
    Gt = 0x11,
    Slt = 0x12,
    Sgt = 0x13,
    Eq = 0x14,
    IsZero = 0x15,
    And = 0x16,
    Or = 0x17,
    Xor = 0x18,
    Not = 0x19,
    Byte = 0x1a,
    Shl = 0x1b,
    Shr = 0x1c,
    Sar = 0x1d,
    Keccak256 = 0x20,
    Address = 0x30,
    Balance = 0x31,
    Origin = 0x32,
    Caller = 0x33,
    CallValue = 0x34,
    CallDataLoad = 0x35,
    CallDataSize = 0x36,
    CallDataCopy = 0x37,
    CodeSize = 0x38,
    CodeCopy = 0x39,
    GasPrice = 0x3a,
    ExtCodeSize = 0x3b,
    ExtCodeCopy = 0x3c,
    ReturnDataSize = 0x3d,
    ReturnDataCopy = 0x3e,
    ExtCodeHash = 0x3f,
    BlockHash = 0x40,
    Coinbase = 0x41,
    Timestamp = 0x42,
    Number = 0x43,
    Difficulty = 0x44,
    GasLimit = 0x45,
    Pop = 0x50,
    MLoad = 0x51,
    MStore = 0x52,
    MStore8 = 0x53,
    SLoad = 0x54,
    SStore = 0x55,
    Jump = 0x56,
    JumpI = 0x57,
    Pc = 0x58,
    MSize = 0x59,
    Gas = 0x5a,
    JumpDest = 0x5b,
    Push1 = 0x60,
    Push2 = 0x61,
    Push3 = 0x62,
    Push4 = 0x63,
    Push5 = 0x64,
    Push6 = 0x65,
    Push7 = 0x66,
    Push8 = 0x67,
    Push9 = 0x68,
    Push10 = 0x69,
    Push11 = 0x6a,
    Push12 = 0x6b,
    Push13 = 0x6c,
    Push14 = 0x6d,
    Push15 = 0x6e,
    Push16 = 0x6f,
    Push17 = 0x70,
    Push18 = 0x71,
    Push19 = 0x72,
    Push20 = 0x73,
    Push21 = 0x74,
    Push22 = 0x75,
    Push23 = 0x76,
    Push24 = 0x77,
    Push25 = 0x78,
    Push26 = 0x79,
    Push27 = 0x7a,
    Push28 = 0x7b,
    Push29 = 0x7c,
    Push30 = 0x7d,
    Push31 = 0x7e,
    Push32 = 0x7f,
    Dup1 = 0x80,
    Dup2 = 0x81,
    Dup3 = 0x82,
    Dup4 = 0x83,
    Dup5 = 0x84,
    Dup6 = 0x85,
    Dup7 = 0x86,
    Dup8 = 0x87,
    Dup9 = 0x88,
    Dup10 = 0x89,
    Dup11 = 0x8a,
    Dup12 = 0x8b,
    Dup13 = 0x8c,
    Dup14 = 0x8d,
    Dup15 = 0x8e,
    Dup16 = 0x8f,
    Swap1 = 0x90,
    Swap2 = 0x91,
    Swap3 = 0x92,
    Swap4 = 0x93,
    Swap5 = 0x94,
    Swap6 = 0x95,
    Swap7 = 0x96,
    Swap8 = 0x97,
    Swap9 = 0x98,
    Swap10 = 0x99,
    Swap11 = 0x9a,
    Swap12 = 0x9b,
    Swap13 = 0x9c,
    Swap14 = 0x9d,
    Swap15 = 0x9e,
    Swap16 = 0x9f,
    Log0 = 0xa0,
    Log1 = 0xa1,
    Log2 = 0xa2,
    Log3 = 0xa3,
    Log4 = 0xa4,
    Create = 0xf0,
    Call = 0xf1,
    CallCode = 0xf2,
    Return = 0xf3,
    DelegateCall = 0xf4,
    Create2 = 0xf5,
    StaticCall = 0xfa,
    Revert = 0xfd,
    Invalid = 0xfe,
    SelfDestruct = 0xff,
}

/// Gas price class of an instruction. Only the ordering matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Zero,
    Base,
    VeryLow,
    Low,
    Mid,
    High,
    Ext,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionInfo {
    pub args: usize,
    pub returns: usize,
    pub side_effects: bool,
    pub tier: Tier,
}

impl InstructionInfo {
    const fn new(args: usize, returns: usize, side_effects: bool, tier: Tier) -> Self {
        Self {
            args,
            returns,
            side_effects,
            tier,
        }
    }
}

const SIGN_BIT: usize = 255;

impl Instruction {
    pub fn info(self) -> InstructionInfo {
        match self {
            Instruction::Stop => InstructionInfo::new(0, 0, true, Tier::Zero),
            Instruction::Add => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Mul => InstructionInfo::new(2, 1, false, Tier::Low),
            Instruction::Sub => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Div => InstructionInfo::new(2, 1, false, Tier::Low),
            Instruction::SDiv => InstructionInfo::new(2, 1, false, Tier::Low),
            Instruction::Mod => InstructionInfo::new(2, 1, false, Tier::Low),
            Instruction::SMod => InstructionInfo::new(2, 1, false, Tier::Low),
            Instruction::AddMod => InstructionInfo::new(3, 1, false, Tier::Mid),
            Instruction::MulMod => InstructionInfo::new(3, 1, false, Tier::Mid),
            Instruction::Exp => InstructionInfo::new(2, 1, false, Tier::Special),
            Instruction::SignExtend => InstructionInfo::new(2, 1, false, Tier::Low),
            Instruction::Lt => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Gt => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Slt => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Sgt => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Eq => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::IsZero => InstructionInfo::new(1, 1, false, Tier::VeryLow),
            Instruction::And => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Or => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Xor => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Not => InstructionInfo::new(1, 1, false, Tier::VeryLow),
            Instruction::Byte => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Shl => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Shr => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Sar => InstructionInfo::new(2, 1, false, Tier::VeryLow),
            Instruction::Keccak256 => InstructionInfo::new(2, 1, true, Tier::Special),
            Instruction::Address => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Balance => InstructionInfo::new(1, 1, false, Tier::Ext),
            Instruction::Origin => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Caller => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::CallValue => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::CallDataLoad => InstructionInfo::new(1, 1, false, Tier::VeryLow),
            Instruction::CallDataSize => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::CallDataCopy => InstructionInfo::new(3, 0, true, Tier::VeryLow),
            Instruction::CodeSize => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::CodeCopy => InstructionInfo::new(3, 0, true, Tier::VeryLow),
            Instruction::GasPrice => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::ExtCodeSize => InstructionInfo::new(1, 1, false, Tier::Ext),
            Instruction::ExtCodeCopy => InstructionInfo::new(4, 0, true, Tier::Ext),
            Instruction::ReturnDataSize => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::ReturnDataCopy => InstructionInfo::new(3, 0, true, Tier::VeryLow),
            Instruction::ExtCodeHash => InstructionInfo::new(1, 1, false, Tier::Ext),
            Instruction::BlockHash => InstructionInfo::new(1, 1, false, Tier::Ext),
            Instruction::Coinbase => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Timestamp => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Number => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Difficulty => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::GasLimit => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Pop => InstructionInfo::new(1, 0, false, Tier::Base),
            Instruction::MLoad => InstructionInfo::new(1, 1, true, Tier::VeryLow),
            Instruction::MStore => InstructionInfo::new(2, 0, true, Tier::VeryLow),
            Instruction::MStore8 => InstructionInfo::new(2, 0, true, Tier::VeryLow),
            Instruction::SLoad => InstructionInfo::new(1, 1, false, Tier::Special),
            Instruction::SStore => InstructionInfo::new(2, 0, true, Tier::Special),
            Instruction::Jump => InstructionInfo::new(1, 0, true, Tier::Mid),
            Instruction::JumpI => InstructionInfo::new(2, 0, true, Tier::High),
            Instruction::Pc => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::MSize => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::Gas => InstructionInfo::new(0, 1, false, Tier::Base),
            Instruction::JumpDest => InstructionInfo::new(0, 0, true, Tier::Special),
            Instruction::Push1 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push2 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push3 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push4 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push5 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push6 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push7 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push8 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push9 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push10 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push11 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push12 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push13 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push14 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push15 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push16 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push17 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push18 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push19 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push20 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push21 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push22 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push23 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push24 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push25 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push26 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push27 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push28 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push29 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push30 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push31 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Push32 => InstructionInfo::new(0, 1, false, Tier::VeryLow),
            Instruction::Dup1 => InstructionInfo::new(1, 2, false, Tier::VeryLow),
            Instruction::Dup2 => InstructionInfo::new(2, 3, false, Tier::VeryLow),
            Instruction::Dup3 => InstructionInfo::new(3, 4, false, Tier::VeryLow),
            Instruction::Dup4 => InstructionInfo::new(4, 5, false, Tier::VeryLow),
            Instruction::Dup5 => InstructionInfo::new(5, 6, false, Tier::VeryLow),
            Instruction::Dup6 => InstructionInfo::new(6, 7, false, Tier::VeryLow),
            Instruction::Dup7 => InstructionInfo::new(7, 8, false, Tier::VeryLow),
            Instruction::Dup8 => InstructionInfo::new(8, 9, false, Tier::VeryLow),
            Instruction::Dup9 => InstructionInfo::new(9, 10, false, Tier::VeryLow),
            Instruction::Dup10 => InstructionInfo::new(10, 11, false, Tier::VeryLow),
            Instruction::Dup11 => InstructionInfo::new(11, 12, false, Tier::VeryLow),
            Instruction::Dup12 => InstructionInfo::new(12, 13, false, Tier::VeryLow),
            Instruction::Dup13 => InstructionInfo::new(13, 14, false, Tier::VeryLow),
            Instruction::Dup14 => InstructionInfo::new(14, 15, false, Tier::VeryLow),
            Instruction::Dup15 => InstructionInfo::new(15, 16, false, Tier::VeryLow),
            Instruction::Dup16 => InstructionInfo::new(16, 17, false, Tier::VeryLow),
            Instruction::Swap1 => InstructionInfo::new(2, 2, false, Tier::VeryLow),
            Instruction::Swap2 => InstructionInfo::new(3, 3, false, Tier::VeryLow),
            Instruction::Swap3 => InstructionInfo::new(4, 4, false, Tier::VeryLow),
            Instruction::Swap4 => InstructionInfo::new(5, 5, false, Tier::VeryLow),
            Instruction::Swap5 => InstructionInfo::new(6, 6, false, Tier::VeryLow),
            Instruction::Swap6 => InstructionInfo::new(7, 7, false, Tier::VeryLow),
            Instruction::Swap7 => InstructionInfo::new(8, 8, false, Tier::VeryLow),
            Instruction::Swap8 => InstructionInfo::new(9, 9, false, Tier::VeryLow),
            Instruction::Swap9 => InstructionInfo::new(10, 10, false, Tier::VeryLow),
            Instruction::Swap10 => InstructionInfo::new(11, 11, false, Tier::VeryLow),
            Instruction::Swap11 => InstructionInfo::new(12, 12, false, Tier::VeryLow),
            Instruction::Swap12 => InstructionInfo::new(13, 13, false, Tier::VeryLow),
            Instruction::Swap13 => InstructionInfo::new(14, 14, false, Tier::VeryLow),
            Instruction::Swap14 => InstructionInfo::new(15, 15, false, Tier::VeryLow),
            Instruction::Swap15 => InstructionInfo::new(16, 16, false, Tier::VeryLow),
            Instruction::Swap16 => InstructionInfo::new(17, 17, false, Tier::VeryLow),
            Instruction::Log0 => InstructionInfo::new(2, 0, true, Tier::Special),
            Instruction::Log1 => InstructionInfo::new(3, 0, true, Tier::Special),
            Instruction::Log2 => InstructionInfo::new(4, 0, true, Tier::Special),
            Instruction::Log3 => InstructionInfo::new(5, 0, true, Tier::Special),
            Instruction::Log4 => InstructionInfo::new(6, 0, true, Tier::Special),
            Instruction::Create => InstructionInfo::new(3, 1, true, Tier::Special),
            Instruction::Call => InstructionInfo::new(7, 1, true, Tier::Special),
            Instruction::CallCode => InstructionInfo::new(7, 1, true, Tier::Special),
            Instruction::Return => InstructionInfo::new(2, 0, true, Tier::Zero),
            Instruction::DelegateCall => InstructionInfo::new(6, 1, true, Tier::Special),
            Instruction::Create2 => InstructionInfo::new(4, 1, true, Tier::Special),
            Instruction::StaticCall => InstructionInfo::new(6, 1, true, Tier::Special),
            Instruction::Revert => InstructionInfo::new(2, 0, true, Tier::Zero),
            Instruction::Invalid => InstructionInfo::new(0, 0, true, Tier::Zero),
            Instruction::SelfDestruct => InstructionInfo::new(1, 0, true, Tier::Special),
        }
    }

    pub fn args(self) -> usize {
        self.info().args
    }

    pub fn returns(self) -> usize {
        self.info().returns
    }

    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    pub fn push(bytes: usize) -> Result<Self> {
        Self::offset_by(0x5f, bytes, 32)
    }

    pub fn dup(depth: usize) -> Result<Self> {
        Self::offset_by(0x7f, depth, 16)
    }

    pub fn swap(depth: usize) -> Result<Self> {
        Self::offset_by(0x8f, depth, 16)
    }

    fn offset_by(base: u8, n: usize, max: usize) -> Result<Self> {
        anyhow::ensure!((1..=max).contains(&n), "Operand {n} out of range 1..={max}");
        Self::try_from(base + n as u8).context("Opcode table is missing an entry")
    }

    pub fn is_push(self) -> bool {
        (0x60..=0x7f).contains(&u8::from(self))
    }

    /// Number of immediate bytes following a `PUSHn` opcode.
    pub fn push_size(self) -> usize {
        if self.is_push() {
            (u8::from(self) - 0x5f) as usize
        } else {
            0
        }
    }

    pub fn is_dup(self) -> bool {
        (0x80..=0x8f).contains(&u8::from(self))
    }

    pub fn is_swap(self) -> bool {
        (0x90..=0x9f).contains(&u8::from(self))
    }

    /// Whether the result depends only on the arguments and on state that
    /// is constant for a whole execution, with no side effects. Such
    /// expressions may be evaluated any number of times at any point.
    pub fn movable(self) -> bool {
        if self.is_dup() || self.is_swap() || self.info().side_effects {
            return false;
        }
        !matches!(
            self,
            Instruction::Keccak256
                | Instruction::Balance
                | Instruction::ExtCodeSize
                | Instruction::ExtCodeHash
                | Instruction::ReturnDataSize
                | Instruction::SLoad
                | Instruction::Pc
                | Instruction::MSize
                | Instruction::Gas
        )
    }

    /// Whether the instruction can be removed when its result is unused.
    pub fn side_effect_free(self) -> bool {
        !self.info().side_effects && !matches!(self, Instruction::Pop)
    }

    /// As [`Self::side_effect_free`], provided nothing observes `msize`.
    pub fn side_effect_free_if_no_msize(self) -> bool {
        matches!(self, Instruction::Keccak256 | Instruction::MLoad) || self.side_effect_free()
    }

    pub fn invalidates_storage(self) -> bool {
        matches!(
            self,
            Instruction::SStore
                | Instruction::Call
                | Instruction::CallCode
                | Instruction::DelegateCall
                | Instruction::Create
                | Instruction::Create2
                | Instruction::SelfDestruct
        )
    }

    pub fn invalidates_memory(self) -> bool {
        matches!(
            self,
            Instruction::MStore
                | Instruction::MStore8
                | Instruction::CallDataCopy
                | Instruction::CodeCopy
                | Instruction::ExtCodeCopy
                | Instruction::ReturnDataCopy
                | Instruction::Call
                | Instruction::CallCode
                | Instruction::DelegateCall
                | Instruction::StaticCall
        )
    }

    pub fn terminates_control_flow(self) -> bool {
        matches!(
            self,
            Instruction::Return
                | Instruction::Revert
                | Instruction::Stop
                | Instruction::Invalid
                | Instruction::SelfDestruct
        )
    }

    /// Instructions that are not offered as functions in strict assembly.
    pub fn is_stack_manipulation(self) -> bool {
        self.is_push()
            || self.is_dup()
            || self.is_swap()
            || matches!(
                self,
                Instruction::Jump | Instruction::JumpI | Instruction::JumpDest
            )
    }

    /// Evaluates an instruction whose result is a pure function of its
    /// arguments. `args[0]` is the first argument. Returns `None` for
    /// instructions that read or write machine state.
    pub fn evaluate(self, args: &[U256]) -> Option<U256> {
        if args.len() != self.args() {
            return None;
        }
        let arg = |i: usize| args[i];
        Some(match self {
            Instruction::Add => arg(0).wrapping_add(arg(1)),
            Instruction::Mul => arg(0).wrapping_mul(arg(1)),
            Instruction::Sub => arg(0).wrapping_sub(arg(1)),
            Instruction::Div => arg(0).checked_div(arg(1)).unwrap_or(U256::ZERO),
            Instruction::SDiv => signed_div(arg(0), arg(1)),
            Instruction::Mod => arg(0).checked_rem(arg(1)).unwrap_or(U256::ZERO),
            Instruction::SMod => signed_mod(arg(0), arg(1)),
            Instruction::AddMod if arg(2).is_zero() => U256::ZERO,
            Instruction::AddMod => arg(0).add_mod(arg(1), arg(2)),
            Instruction::MulMod if arg(2).is_zero() => U256::ZERO,
            Instruction::MulMod => arg(0).mul_mod(arg(1), arg(2)),
            Instruction::Exp => arg(0).wrapping_pow(arg(1)),
            Instruction::SignExtend => sign_extend(arg(0), arg(1)),
            Instruction::Lt => bool_word(arg(0) < arg(1)),
            Instruction::Gt => bool_word(arg(0) > arg(1)),
            Instruction::Slt => bool_word(signed_lt(arg(0), arg(1))),
            Instruction::Sgt => bool_word(signed_lt(arg(1), arg(0))),
            Instruction::Eq => bool_word(arg(0) == arg(1)),
            Instruction::IsZero => bool_word(arg(0).is_zero()),
            Instruction::And => arg(0) & arg(1),
            Instruction::Or => arg(0) | arg(1),
            Instruction::Xor => arg(0) ^ arg(1),
            Instruction::Not => !arg(0),
            Instruction::Byte => byte(arg(0), arg(1)),
            Instruction::Shl => match shift_amount(arg(0)) {
                Some(shift) => arg(1) << shift,
                None => U256::ZERO,
            },
            Instruction::Shr => match shift_amount(arg(0)) {
                Some(shift) => arg(1) >> shift,
                None => U256::ZERO,
            },
            Instruction::Sar => arithmetic_shift_right(arg(0), arg(1)),
            _ => return None,
        })
    }
}

pub fn bool_word(value: bool) -> U256 {
    U256::from(value as u64)
}

fn is_negative(value: U256) -> bool {
    value.bit(SIGN_BIT)
}

fn magnitude(value: U256) -> U256 {
    if is_negative(value) {
        value.wrapping_neg()
    } else {
        value
    }
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    let quotient = magnitude(a) / magnitude(b);
    if is_negative(a) != is_negative(b) {
        quotient.wrapping_neg()
    } else {
        quotient
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    let remainder = magnitude(a) % magnitude(b);
    if is_negative(a) {
        remainder.wrapping_neg()
    } else {
        remainder
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    let flip = U256::from(1u64) << SIGN_BIT;
    (a ^ flip) < (b ^ flip)
}

fn sign_extend(byte_index: U256, value: U256) -> U256 {
    if byte_index >= U256::from(31u64) {
        return value;
    }
    let bit = byte_index.saturating_to::<usize>() * 8 + 7;
    let mask = (U256::from(1u64) << (bit + 1)).wrapping_sub(U256::from(1u64));
    if value.bit(bit) {
        value | !mask
    } else {
        value & mask
    }
}

fn byte(index: U256, value: U256) -> U256 {
    if index >= U256::from(32u64) {
        return U256::ZERO;
    }
    let shift = 8 * (31 - index.saturating_to::<usize>());
    (value >> shift) & U256::from(0xffu64)
}

fn shift_amount(shift: U256) -> Option<usize> {
    let shift = shift.saturating_to::<usize>();
    (shift < 256).then_some(shift)
}

fn arithmetic_shift_right(shift: U256, value: U256) -> U256 {
    match (shift_amount(shift), is_negative(value)) {
        (Some(shift), true) => !((!value) >> shift),
        (None, true) => U256::MAX,
        (Some(shift), false) => value >> shift,
        (None, false) => U256::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    fn word(value: i64) -> U256 {
        if value < 0 {
            U256::from(value.unsigned_abs()).wrapping_neg()
        } else {
            U256::from(value as u64)
        }
    }

    #[test_case("add", Instruction::Add ; "add")]
    #[test_case("keccak256", Instruction::Keccak256 ; "keccak")]
    #[test_case("calldataload", Instruction::CallDataLoad ; "calldataload")]
    #[test_case("mstore8", Instruction::MStore8 ; "mstore8")]
    #[test_case("swap16", Instruction::Swap16 ; "swap16")]
    fn mnemonics_round_trip(text: &str, instruction: Instruction) {
        assert_eq!(Instruction::from_str(text).unwrap(), instruction);
        assert_eq!(instruction.mnemonic(), text);
    }

    #[test]
    fn stack_operand_constructors() {
        assert_eq!(Instruction::push(1).unwrap(), Instruction::Push1);
        assert_eq!(Instruction::push(32).unwrap(), Instruction::Push32);
        assert_eq!(Instruction::dup(16).unwrap(), Instruction::Dup16);
        assert_eq!(Instruction::swap(1).unwrap(), Instruction::Swap1);
        assert!(Instruction::dup(17).is_err());
        assert!(Instruction::swap(0).is_err());
        assert_eq!(Instruction::Push4.push_size(), 4);
    }

    #[test]
    fn movability() {
        assert!(Instruction::Add.movable());
        assert!(Instruction::CallDataLoad.movable());
        assert!(!Instruction::MLoad.movable());
        assert!(!Instruction::SLoad.movable());
        assert!(!Instruction::Gas.movable());
        assert!(!Instruction::Dup1.movable());
        assert!(Instruction::MLoad.side_effect_free_if_no_msize());
        assert!(!Instruction::MStore.side_effect_free());
    }

    #[test_case(Instruction::SDiv, &[-7, 2], -3 ; "sdiv truncates toward zero")]
    #[test_case(Instruction::SMod, &[-7, 2], -1 ; "smod takes sign of dividend")]
    #[test_case(Instruction::Slt, &[-1, 0], 1 ; "slt negative")]
    #[test_case(Instruction::Sgt, &[-1, 0], 0 ; "sgt negative")]
    #[test_case(Instruction::Div, &[5, 0], 0 ; "div by zero")]
    #[test_case(Instruction::Sar, &[4, -32], -2 ; "sar keeps sign")]
    #[test_case(Instruction::SignExtend, &[0, 0xff], -1 ; "signextend byte")]
    #[test_case(Instruction::Byte, &[31, 0x1234], 0x34 ; "byte lowest")]
    #[test_case(Instruction::Shl, &[256, 1], 0 ; "shl overflow")]
    #[test_case(Instruction::Exp, &[2, 10], 1024 ; "exp")]
    fn pure_evaluation(instruction: Instruction, args: &[i64], expected: i64) {
        let args: Vec<U256> = args.iter().map(|a| word(*a)).collect();
        assert_eq!(instruction.evaluate(&args), Some(word(expected)));
    }

    #[test]
    fn stateful_instructions_do_not_evaluate() {
        assert_eq!(Instruction::SLoad.evaluate(&[U256::ZERO]), None);
        assert_eq!(Instruction::Add.evaluate(&[U256::ZERO]), None);
    }
}
