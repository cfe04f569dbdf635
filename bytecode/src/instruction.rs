use core::fmt;

/// How a closure obtains one of its upvalues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Capture a slot of the enclosing frame.
    Local(u8),
    /// Share an upvalue of the enclosing closure.
    Upvalue(u8),
}

impl Capture {
    pub(crate) fn encode(self) -> [u8; 2] {
        match self {
            Capture::Local(index) => [1, index],
            Capture::Upvalue(index) => [0, index],
        }
    }
}

/// A decoded instruction with its operands.
///
/// [`Instruction::Closure`] is followed in the byte stream by `captures`
/// capture descriptors, read with
/// [`BytecodeDecoder::read_capture`](crate::BytecodeDecoder::read_capture).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Constant { idx: u16 },
    Nil,
    True,
    False,
    Pop,
    Dup,
    GetLocal { slot: u8 },
    SetLocal { slot: u8 },
    GetGlobal { name: u16 },
    DefineGlobal { name: u16 },
    SetGlobal { name: u16 },
    GetUpvalue { index: u8 },
    SetUpvalue { index: u8 },
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    AddInt,
    SubtractInt,
    MultiplyInt,
    DivideInt,
    ModuloInt,
    NegateInt,
    AddFloat,
    SubtractFloat,
    MultiplyFloat,
    DivideFloat,
    NegateFloat,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,
    IntToFloat,
    FloatToInt,
    Jump { offset: u16 },
    JumpIfFalse { offset: u16 },
    Loop { offset: u16 },
    Call { argc: u8 },
    Closure { function: u16, captures: u8 },
    CloseUpvalue,
    Return,
    Print,
    StructDef { fields: u8, name: u16 },
    StructField { name: u16 },
    GetField { name: u16 },
    SetField { name: u16 },
    Array { count: u8 },
    IndexGet,
    IndexSet,
    Method { name: u16 },
    Invoke { name: u16, argc: u8 },
    Import { path: u16 },
    GetLocal0,
    GetLocal1,
    GetLocal2,
    GetLocal3,
    IncLocal { slot: u8 },
    AddLocalConst { slot: u8, constant: u16 },
    LessLocalConst { slot: u8, constant: u16 },
    IndexGetLocal { slot: u8 },
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(index) => write!(f, "local {index}"),
            Self::Upvalue(index) => write!(f, "upvalue {index}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { idx } => write!(f, "Constant #{idx}"),
            Self::GetLocal { slot } => write!(f, "GetLocal s{slot}"),
            Self::SetLocal { slot } => write!(f, "SetLocal s{slot}"),
            Self::GetGlobal { name } => write!(f, "GetGlobal #{name}"),
            Self::DefineGlobal { name } => write!(f, "DefineGlobal #{name}"),
            Self::SetGlobal { name } => write!(f, "SetGlobal #{name}"),
            Self::GetUpvalue { index } => write!(f, "GetUpvalue u{index}"),
            Self::SetUpvalue { index } => write!(f, "SetUpvalue u{index}"),
            Self::Jump { offset } => write!(f, "Jump +{offset}"),
            Self::JumpIfFalse { offset } => write!(f, "JumpIfFalse +{offset}"),
            Self::Loop { offset } => write!(f, "Loop -{offset}"),
            Self::Call { argc } => write!(f, "Call {argc}"),
            Self::Closure { function, captures } => {
                write!(f, "Closure #{function} ({captures} captures)")
            }
            Self::StructDef { fields, name } => write!(f, "StructDef #{name} {fields}"),
            Self::StructField { name } => write!(f, "StructField #{name}"),
            Self::GetField { name } => write!(f, "GetField #{name}"),
            Self::SetField { name } => write!(f, "SetField #{name}"),
            Self::Array { count } => write!(f, "Array {count}"),
            Self::Method { name } => write!(f, "Method #{name}"),
            Self::Invoke { name, argc } => write!(f, "Invoke #{name} {argc}"),
            Self::Import { path } => write!(f, "Import #{path}"),
            Self::IncLocal { slot } => write!(f, "IncLocal s{slot}"),
            Self::AddLocalConst { slot, constant } => {
                write!(f, "AddLocalConst s{slot}, #{constant}")
            }
            Self::LessLocalConst { slot, constant } => {
                write!(f, "LessLocalConst s{slot}, #{constant}")
            }
            Self::IndexGetLocal { slot } => write!(f, "IndexGetLocal s{slot}"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}
