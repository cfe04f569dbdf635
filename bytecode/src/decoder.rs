use core::fmt;

use crate::instruction::{Capture, Instruction};
use crate::op::Op;

/// Why a byte stream could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode(u8),
    /// The stream ended in the middle of the instruction starting at `offset`.
    Truncated { offset: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode(byte) => write!(f, "Unknown opcode {byte}"),
            Self::Truncated { offset } => {
                write!(f, "Truncated instruction at offset {offset}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Decoding is checked: bytes that do not form an instruction produce a
/// [`DecodeError`] instead of panicking, so bytecode from any front-end can
/// be fed to the interpreter.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    start: usize,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// A decoder positioned at byte offset `pos`.
    #[inline(always)]
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self {
            bytes,
            pos,
            start: pos,
        }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `None` at end-of-stream.
    #[inline(always)]
    pub fn decode_next(&mut self) -> Option<Result<Instruction, DecodeError>> {
        if self.is_at_end() {
            return None;
        }
        self.start = self.pos;
        Some(self.decode())
    }

    /// Read one capture descriptor following [`Instruction::Closure`].
    #[inline(always)]
    pub fn read_capture(&mut self) -> Result<Capture, DecodeError> {
        let is_local = self.read_u8()?;
        let index = self.read_u8()?;
        Ok(if is_local != 0 {
            Capture::Local(index)
        } else {
            Capture::Upvalue(index)
        })
    }

    #[inline(always)]
    fn decode(&mut self) -> Result<Instruction, DecodeError> {
        let byte = self.read_u8()?;
        let op = Op::from_u8(byte).ok_or(DecodeError::UnknownOpcode(byte))?;

        let instruction = match op {
            Op::Constant => Instruction::Constant {
                idx: self.read_u16()?,
            },
            Op::Nil => Instruction::Nil,
            Op::True => Instruction::True,
            Op::False => Instruction::False,
            Op::Pop => Instruction::Pop,
            Op::Dup => Instruction::Dup,

            Op::GetLocal => Instruction::GetLocal {
                slot: self.read_u8()?,
            },
            Op::SetLocal => Instruction::SetLocal {
                slot: self.read_u8()?,
            },
            Op::GetGlobal => Instruction::GetGlobal {
                name: self.read_u16()?,
            },
            Op::DefineGlobal => Instruction::DefineGlobal {
                name: self.read_u16()?,
            },
            Op::SetGlobal => Instruction::SetGlobal {
                name: self.read_u16()?,
            },
            Op::GetUpvalue => Instruction::GetUpvalue {
                index: self.read_u8()?,
            },
            Op::SetUpvalue => Instruction::SetUpvalue {
                index: self.read_u8()?,
            },

            Op::Equal => Instruction::Equal,
            Op::NotEqual => Instruction::NotEqual,
            Op::Greater => Instruction::Greater,
            Op::GreaterEqual => Instruction::GreaterEqual,
            Op::Less => Instruction::Less,
            Op::LessEqual => Instruction::LessEqual,

            Op::AddInt => Instruction::AddInt,
            Op::SubtractInt => Instruction::SubtractInt,
            Op::MultiplyInt => Instruction::MultiplyInt,
            Op::DivideInt => Instruction::DivideInt,
            Op::ModuloInt => Instruction::ModuloInt,
            Op::NegateInt => Instruction::NegateInt,
            Op::AddFloat => Instruction::AddFloat,
            Op::SubtractFloat => Instruction::SubtractFloat,
            Op::MultiplyFloat => Instruction::MultiplyFloat,
            Op::DivideFloat => Instruction::DivideFloat,
            Op::NegateFloat => Instruction::NegateFloat,
            Op::Add => Instruction::Add,
            Op::Subtract => Instruction::Subtract,
            Op::Multiply => Instruction::Multiply,
            Op::Divide => Instruction::Divide,
            Op::Modulo => Instruction::Modulo,
            Op::Negate => Instruction::Negate,
            Op::Not => Instruction::Not,
            Op::IntToFloat => Instruction::IntToFloat,
            Op::FloatToInt => Instruction::FloatToInt,

            Op::Jump => Instruction::Jump {
                offset: self.read_u16()?,
            },
            Op::JumpIfFalse => Instruction::JumpIfFalse {
                offset: self.read_u16()?,
            },
            Op::Loop => Instruction::Loop {
                offset: self.read_u16()?,
            },

            Op::Call => Instruction::Call {
                argc: self.read_u8()?,
            },
            Op::Closure => {
                let function = self.read_u16()?;
                let captures = self.read_u8()?;
                Instruction::Closure { function, captures }
            }
            Op::CloseUpvalue => Instruction::CloseUpvalue,
            Op::Return => Instruction::Return,
            Op::Print => Instruction::Print,

            Op::StructDef => {
                let fields = self.read_u8()?;
                let name = self.read_u16()?;
                Instruction::StructDef { fields, name }
            }
            Op::StructField => Instruction::StructField {
                name: self.read_u16()?,
            },
            Op::GetField => Instruction::GetField {
                name: self.read_u16()?,
            },
            Op::SetField => Instruction::SetField {
                name: self.read_u16()?,
            },

            Op::Array => Instruction::Array {
                count: self.read_u8()?,
            },
            Op::IndexGet => Instruction::IndexGet,
            Op::IndexSet => Instruction::IndexSet,

            Op::Method => Instruction::Method {
                name: self.read_u16()?,
            },
            Op::Invoke => {
                let name = self.read_u16()?;
                let argc = self.read_u8()?;
                Instruction::Invoke { name, argc }
            }
            Op::Import => Instruction::Import {
                path: self.read_u16()?,
            },

            Op::GetLocal0 => Instruction::GetLocal0,
            Op::GetLocal1 => Instruction::GetLocal1,
            Op::GetLocal2 => Instruction::GetLocal2,
            Op::GetLocal3 => Instruction::GetLocal3,
            Op::IncLocal => Instruction::IncLocal {
                slot: self.read_u8()?,
            },
            Op::AddLocalConst => {
                let slot = self.read_u8()?;
                let constant = self.read_u16()?;
                Instruction::AddLocalConst { slot, constant }
            }
            Op::LessLocalConst => {
                let slot = self.read_u8()?;
                let constant = self.read_u16()?;
                Instruction::LessLocalConst { slot, constant }
            }
            Op::IndexGetLocal => Instruction::IndexGetLocal {
                slot: self.read_u8()?,
            },
        };
        Ok(instruction)
    }

    // ── read helpers ───────────────────────────────────────────────

    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::Truncated { offset: self.start })?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline(always)]
    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
}

/// Iterates instructions, skipping the capture descriptors that follow a
/// closure. Decoding stops after the first error.
impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.decode_next()?;
        match result {
            Ok(Instruction::Closure { captures, .. }) => {
                for _ in 0..captures {
                    if let Err(err) = self.read_capture() {
                        self.pos = self.bytes.len();
                        return Some(Err(err));
                    }
                }
            }
            Err(_) => self.pos = self.bytes.len(),
            Ok(_) => {}
        }
        Some(result)
    }
}
