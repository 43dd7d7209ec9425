use std::fmt;

use crate::{errors, TugaError};

/// The instruction set of the Tuga virtual machine. The discriminant each
/// opcode encodes to on disk is fixed by `byte`, and the first fifteen
/// opcodes carry a single signed 32-bit operand.
///
/// Constant-pool indices, jump targets and allocation counts are always
/// non-negative, so those operands decode into `usize`; local variable
/// addresses are frame-relative and may be negative (parameters live below
/// the frame pointer), so `lload` and `lstore` keep the raw `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Iconst(i32),
    Dconst(usize),
    Sconst(usize),
    Jump(usize),
    Jumpf(usize),
    Galloc(usize),
    Gload(usize),
    Gstore(usize),
    Lalloc(usize),
    Lload(i32),
    Lstore(i32),
    Pop(usize),
    Call(usize),
    Retval(usize),
    Ret(usize),

    Iprint,
    Iuminus,
    Iadd,
    Isub,
    Imult,
    Idiv,
    Imod,
    Ieq,
    Ineq,
    Ilt,
    Ileq,
    Itod,
    Itos,

    Dprint,
    Duminus,
    Dadd,
    Dsub,
    Dmult,
    Ddiv,
    Deq,
    Dneq,
    Dlt,
    Dleq,
    Dtos,

    Sprint,
    Sconcat,
    Seq,
    Sneq,

    Tconst,
    Fconst,
    Bprint,
    Beq,
    Bneq,
    And,
    Or,
    Not,
    Btos,

    Halt,
}

impl OpCode {
    /// The byte this opcode serializes to.
    pub fn byte(&self) -> u8 {
        match self {
            OpCode::Iconst(..) => 0,
            OpCode::Dconst(..) => 1,
            OpCode::Sconst(..) => 2,
            OpCode::Jump(..) => 3,
            OpCode::Jumpf(..) => 4,
            OpCode::Galloc(..) => 5,
            OpCode::Gload(..) => 6,
            OpCode::Gstore(..) => 7,
            OpCode::Lalloc(..) => 8,
            OpCode::Lload(..) => 9,
            OpCode::Lstore(..) => 10,
            OpCode::Pop(..) => 11,
            OpCode::Call(..) => 12,
            OpCode::Retval(..) => 13,
            OpCode::Ret(..) => 14,
            OpCode::Iprint => 15,
            OpCode::Iuminus => 16,
            OpCode::Iadd => 17,
            OpCode::Isub => 18,
            OpCode::Imult => 19,
            OpCode::Idiv => 20,
            OpCode::Imod => 21,
            OpCode::Ieq => 22,
            OpCode::Ineq => 23,
            OpCode::Ilt => 24,
            OpCode::Ileq => 25,
            OpCode::Itod => 26,
            OpCode::Itos => 27,
            OpCode::Dprint => 28,
            OpCode::Duminus => 29,
            OpCode::Dadd => 30,
            OpCode::Dsub => 31,
            OpCode::Dmult => 32,
            OpCode::Ddiv => 33,
            OpCode::Deq => 34,
            OpCode::Dneq => 35,
            OpCode::Dlt => 36,
            OpCode::Dleq => 37,
            OpCode::Dtos => 38,
            OpCode::Sprint => 39,
            OpCode::Sconcat => 40,
            OpCode::Seq => 41,
            OpCode::Sneq => 42,
            OpCode::Tconst => 43,
            OpCode::Fconst => 44,
            OpCode::Bprint => 45,
            OpCode::Beq => 46,
            OpCode::Bneq => 47,
            OpCode::And => 48,
            OpCode::Or => 49,
            OpCode::Not => 50,
            OpCode::Btos => 51,
            OpCode::Halt => 52,
        }
    }

    /// Whether the opcode encoded as `byte` is followed by an int32 operand
    /// in the instruction stream.
    pub fn takes_operand(byte: u8) -> bool {
        byte <= OpCode::Ret(0).byte()
    }

    /// The operand carried by this opcode, if it has one.
    pub fn operand(&self) -> Option<i32> {
        match *self {
            OpCode::Iconst(arg) | OpCode::Lload(arg) | OpCode::Lstore(arg) => Some(arg),
            OpCode::Dconst(arg)
            | OpCode::Sconst(arg)
            | OpCode::Jump(arg)
            | OpCode::Jumpf(arg)
            | OpCode::Galloc(arg)
            | OpCode::Gload(arg)
            | OpCode::Gstore(arg)
            | OpCode::Lalloc(arg)
            | OpCode::Pop(arg)
            | OpCode::Call(arg)
            | OpCode::Retval(arg)
            | OpCode::Ret(arg) => Some(arg as i32),
            _ => None,
        }
    }

    /// Rebuilds an opcode from its serialized form. `arg` is ignored for
    /// opcodes without an operand.
    pub fn decode(byte: u8, arg: i32) -> Result<OpCode, TugaError> {
        let index = || {
            usize::try_from(arg).map_err(|_| {
                errors::bytecode(
                    format!("Opcode {} carries a negative operand ({}).", byte, arg),
                    "Make sure the bytecode file was produced by the Tuga compiler and has not been corrupted.",
                )
            })
        };

        Ok(match byte {
            0 => OpCode::Iconst(arg),
            1 => OpCode::Dconst(index()?),
            2 => OpCode::Sconst(index()?),
            3 => OpCode::Jump(index()?),
            4 => OpCode::Jumpf(index()?),
            5 => OpCode::Galloc(index()?),
            6 => OpCode::Gload(index()?),
            7 => OpCode::Gstore(index()?),
            8 => OpCode::Lalloc(index()?),
            9 => OpCode::Lload(arg),
            10 => OpCode::Lstore(arg),
            11 => OpCode::Pop(index()?),
            12 => OpCode::Call(index()?),
            13 => OpCode::Retval(index()?),
            14 => OpCode::Ret(index()?),
            15 => OpCode::Iprint,
            16 => OpCode::Iuminus,
            17 => OpCode::Iadd,
            18 => OpCode::Isub,
            19 => OpCode::Imult,
            20 => OpCode::Idiv,
            21 => OpCode::Imod,
            22 => OpCode::Ieq,
            23 => OpCode::Ineq,
            24 => OpCode::Ilt,
            25 => OpCode::Ileq,
            26 => OpCode::Itod,
            27 => OpCode::Itos,
            28 => OpCode::Dprint,
            29 => OpCode::Duminus,
            30 => OpCode::Dadd,
            31 => OpCode::Dsub,
            32 => OpCode::Dmult,
            33 => OpCode::Ddiv,
            34 => OpCode::Deq,
            35 => OpCode::Dneq,
            36 => OpCode::Dlt,
            37 => OpCode::Dleq,
            38 => OpCode::Dtos,
            39 => OpCode::Sprint,
            40 => OpCode::Sconcat,
            41 => OpCode::Seq,
            42 => OpCode::Sneq,
            43 => OpCode::Tconst,
            44 => OpCode::Fconst,
            45 => OpCode::Bprint,
            46 => OpCode::Beq,
            47 => OpCode::Bneq,
            48 => OpCode::And,
            49 => OpCode::Or,
            50 => OpCode::Not,
            51 => OpCode::Btos,
            52 => OpCode::Halt,
            _ => {
                return Err(errors::bytecode(
                    format!("Unknown opcode {} in the instruction stream.", byte),
                    "Make sure the bytecode file was produced by the Tuga compiler and has not been corrupted.",
                ))
            }
        })
    }

    fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::Iconst(..) => "iconst",
            OpCode::Dconst(..) => "dconst",
            OpCode::Sconst(..) => "sconst",
            OpCode::Jump(..) => "jump",
            OpCode::Jumpf(..) => "jumpf",
            OpCode::Galloc(..) => "galloc",
            OpCode::Gload(..) => "gload",
            OpCode::Gstore(..) => "gstore",
            OpCode::Lalloc(..) => "lalloc",
            OpCode::Lload(..) => "lload",
            OpCode::Lstore(..) => "lstore",
            OpCode::Pop(..) => "pop",
            OpCode::Call(..) => "call",
            OpCode::Retval(..) => "retval",
            OpCode::Ret(..) => "ret",
            OpCode::Iprint => "iprint",
            OpCode::Iuminus => "iuminus",
            OpCode::Iadd => "iadd",
            OpCode::Isub => "isub",
            OpCode::Imult => "imult",
            OpCode::Idiv => "idiv",
            OpCode::Imod => "imod",
            OpCode::Ieq => "ieq",
            OpCode::Ineq => "ineq",
            OpCode::Ilt => "ilt",
            OpCode::Ileq => "ileq",
            OpCode::Itod => "itod",
            OpCode::Itos => "itos",
            OpCode::Dprint => "dprint",
            OpCode::Duminus => "duminus",
            OpCode::Dadd => "dadd",
            OpCode::Dsub => "dsub",
            OpCode::Dmult => "dmult",
            OpCode::Ddiv => "ddiv",
            OpCode::Deq => "deq",
            OpCode::Dneq => "dneq",
            OpCode::Dlt => "dlt",
            OpCode::Dleq => "dleq",
            OpCode::Dtos => "dtos",
            OpCode::Sprint => "sprint",
            OpCode::Sconcat => "sconcat",
            OpCode::Seq => "seq",
            OpCode::Sneq => "sneq",
            OpCode::Tconst => "tconst",
            OpCode::Fconst => "fconst",
            OpCode::Bprint => "bprint",
            OpCode::Beq => "beq",
            OpCode::Bneq => "bneq",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Not => "not",
            OpCode::Btos => "btos",
            OpCode::Halt => "halt",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.operand() {
            Some(arg) => write!(f, "{} {}", self.mnemonic(), arg),
            None => write!(f, "{}", self.mnemonic()),
        }
    }
}
