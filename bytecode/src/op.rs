/// Bytecode opcodes.
///
/// Constant pool indices are always 16-bit. Stack slots, upvalue indices,
/// argument and element counts are 8-bit. Jump offsets are unsigned 16-bit
/// distances measured from the end of the jump instruction; the opcode
/// decides the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Push a constant pool entry.
    /// Operands: `idx:u16`
    Constant = 0x00,
    Nil,
    True,
    False,
    Pop,
    /// Push a copy of the top of the stack.
    Dup,

    /// Push the frame-local slot.
    /// Operands: `slot:u8`
    GetLocal,
    /// Store the top of the stack into a frame-local slot (value stays).
    /// Operands: `slot:u8`
    SetLocal,
    /// Operands: `name_idx:u16`
    GetGlobal,
    /// Bind a global to the popped value.
    /// Operands: `name_idx:u16`
    DefineGlobal,
    /// Assign an existing global (value stays). Faults when undefined.
    /// Operands: `name_idx:u16`
    SetGlobal,
    /// Operands: `index:u8`
    GetUpvalue,
    /// Operands: `index:u8`
    SetUpvalue,

    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    /// Int-only fast paths.
    AddInt,
    SubtractInt,
    MultiplyInt,
    DivideInt,
    ModuloInt,
    NegateInt,

    /// Float-only fast paths.
    AddFloat,
    SubtractFloat,
    MultiplyFloat,
    DivideFloat,
    NegateFloat,

    /// Generic arithmetic dispatching on the runtime operand kinds.
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,
    IntToFloat,
    FloatToInt,

    /// Operands: `offset:u16` (forward)
    Jump,
    /// Jump when the top of the stack is falsey. Does not pop.
    /// Operands: `offset:u16` (forward)
    JumpIfFalse,
    /// Operands: `offset:u16` (backward)
    Loop,

    /// Call the value below `argc` arguments.
    /// Operands: `argc:u8`
    Call,
    /// Create a closure from a function constant.
    /// Operands: `fn_idx:u16`, `captures:u8`, then `captures` pairs of
    /// `is_local:u8`, `index:u8`
    Closure,
    /// Close upvalues pointing at the top slot, then pop it.
    CloseUpvalue,
    Return,
    /// Pop and print a value followed by a newline.
    Print,

    /// Push a new struct type definition.
    /// Operands: `field_count:u8`, `name_idx:u16`
    StructDef,
    /// Append a field name to the definition on top of the stack.
    /// Operands: `name_idx:u16`
    StructField,
    /// Operands: `name_idx:u16`
    GetField,
    /// Operands: `name_idx:u16`
    SetField,

    /// Collect the top `count` values into a new array.
    /// Operands: `count:u8`
    Array,
    IndexGet,
    IndexSet,

    /// Attach the closure on top of the stack to the definition below it.
    /// Operands: `name_idx:u16`
    Method,
    /// Call a method by name without materialising a bound method.
    /// Operands: `name_idx:u16`, `argc:u8`
    Invoke,
    /// Compile and run a module in a new frame.
    /// Operands: `path_idx:u16`
    Import,

    GetLocal0,
    GetLocal1,
    GetLocal2,
    GetLocal3,
    /// Increment a numeric slot in place.
    /// Operands: `slot:u8`
    IncLocal,
    /// Push `slot + constant`.
    /// Operands: `slot:u8`, `const_idx:u16`
    AddLocalConst,
    /// Push `slot < constant`.
    /// Operands: `slot:u8`, `const_idx:u16`
    LessLocalConst,
    /// Pop an array and push the element at the index held in a slot.
    /// Operands: `slot:u8`
    IndexGetLocal,
}

/// Every opcode in discriminant order.
pub(crate) const ALL_OPS: &[Op] = &[
    Op::Constant,
    Op::Nil,
    Op::True,
    Op::False,
    Op::Pop,
    Op::Dup,
    Op::GetLocal,
    Op::SetLocal,
    Op::GetGlobal,
    Op::DefineGlobal,
    Op::SetGlobal,
    Op::GetUpvalue,
    Op::SetUpvalue,
    Op::Equal,
    Op::NotEqual,
    Op::Greater,
    Op::GreaterEqual,
    Op::Less,
    Op::LessEqual,
    Op::AddInt,
    Op::SubtractInt,
    Op::MultiplyInt,
    Op::DivideInt,
    Op::ModuloInt,
    Op::NegateInt,
    Op::AddFloat,
    Op::SubtractFloat,
    Op::MultiplyFloat,
    Op::DivideFloat,
    Op::NegateFloat,
    Op::Add,
    Op::Subtract,
    Op::Multiply,
    Op::Divide,
    Op::Modulo,
    Op::Negate,
    Op::Not,
    Op::IntToFloat,
    Op::FloatToInt,
    Op::Jump,
    Op::JumpIfFalse,
    Op::Loop,
    Op::Call,
    Op::Closure,
    Op::CloseUpvalue,
    Op::Return,
    Op::Print,
    Op::StructDef,
    Op::StructField,
    Op::GetField,
    Op::SetField,
    Op::Array,
    Op::IndexGet,
    Op::IndexSet,
    Op::Method,
    Op::Invoke,
    Op::Import,
    Op::GetLocal0,
    Op::GetLocal1,
    Op::GetLocal2,
    Op::GetLocal3,
    Op::IncLocal,
    Op::AddLocalConst,
    Op::LessLocalConst,
    Op::IndexGetLocal,
];

impl Op {
    #[inline(always)]
    pub fn from_u8(byte: u8) -> Option<Op> {
        ALL_OPS.get(byte as usize).copied()
    }

    /// Size of the fixed operand bytes following the opcode. For
    /// [`Op::Closure`] the capture pairs come on top of this.
    pub fn operand_size(self) -> usize {
        match self {
            Op::Constant
            | Op::GetGlobal
            | Op::DefineGlobal
            | Op::SetGlobal
            | Op::Jump
            | Op::JumpIfFalse
            | Op::Loop
            | Op::StructField
            | Op::GetField
            | Op::SetField
            | Op::Method
            | Op::Import => 2,
            Op::GetLocal
            | Op::SetLocal
            | Op::GetUpvalue
            | Op::SetUpvalue
            | Op::Call
            | Op::Array
            | Op::IncLocal
            | Op::IndexGetLocal => 1,
            Op::Closure | Op::StructDef | Op::Invoke | Op::AddLocalConst | Op::LessLocalConst => 3,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Op::from_u8(byte).ok_or(byte)
    }
}
