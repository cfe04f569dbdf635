use std::fmt;

use bytecode::{DecodeError, JumpOutOfRange};

use crate::ConstantPoolFull;

/// Why the dispatch loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    IntOperands,
    FloatOperands,
    NumberOperands,
    AddOperands,
    DivisionByZero,
    NumberOperand,
    IntOperand,
    FloatOperand,
    ExpectedInt,
    ExpectedFloat,
    Arity { expected: usize, got: usize },
    StackOverflow,
    NotCallable,
    NotAnArray,
    IndexNotInt,
    IndexOutOfBounds { index: i64, len: usize },
    NoFields,
    UndefinedProperty(String),
    UndefinedField(String),
    NoMethods,
    UndefinedMethod(String),
    UndefinedVariable(String),
    ModuleNotFound(String),
    ModuleCompile(String),
    UnknownOpcode(u8),
    /// Bytecode that decodes but cannot be executed, or does not decode.
    Malformed(&'static str),
    Truncated { offset: usize },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntOperands => f.write_str("Operands must be integers."),
            Self::FloatOperands => f.write_str("Operands must be floats."),
            Self::NumberOperands => f.write_str("Operands must be numbers."),
            Self::AddOperands => f.write_str("Operands must be two numbers or two strings."),
            Self::DivisionByZero => f.write_str("Division by zero."),
            Self::NumberOperand => f.write_str("Operand must be a number."),
            Self::IntOperand => f.write_str("Operand must be an integer."),
            Self::FloatOperand => f.write_str("Operand must be a float."),
            Self::ExpectedInt => f.write_str("Expected integer for conversion."),
            Self::ExpectedFloat => f.write_str("Expected float for conversion."),
            Self::Arity { expected, got } => {
                write!(f, "Expected {expected} arguments but got {got}.")
            }
            Self::StackOverflow => f.write_str("Stack overflow."),
            Self::NotCallable => f.write_str("Can only call functions."),
            Self::NotAnArray => f.write_str("Can only index arrays."),
            Self::IndexNotInt => f.write_str("Array index must be an integer."),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "Array index {index} out of bounds [0, {len}).")
            }
            Self::NoFields => f.write_str("Only struct instances have fields."),
            Self::UndefinedProperty(name) => write!(f, "Undefined property '{name}'."),
            Self::UndefinedField(name) => write!(f, "Undefined field '{name}'."),
            Self::NoMethods => f.write_str("Only struct instances have methods."),
            Self::UndefinedMethod(name) => write!(f, "Undefined method '{name}'."),
            Self::UndefinedVariable(name) => write!(f, "Undefined variable '{name}'."),
            Self::ModuleNotFound(path) => write!(f, "Could not open module '{path}'."),
            Self::ModuleCompile(path) => write!(f, "Error compiling module '{path}'."),
            Self::UnknownOpcode(byte) => write!(f, "Unknown opcode {byte}"),
            Self::Malformed(what) => write!(f, "Malformed bytecode: {what}."),
            Self::Truncated { offset } => {
                write!(f, "Malformed bytecode: truncated instruction at {offset}.")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<DecodeError> for RuntimeError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnknownOpcode(byte) => Self::UnknownOpcode(byte),
            DecodeError::Truncated { offset } => Self::Truncated { offset },
        }
    }
}

/// One line of a fault's stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub line: u32,
    /// `None` for top-level script code.
    pub function: Option<String>,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "[line {}] in {name}()", self.line),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// A runtime error together with the frames that were active, innermost
/// first.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFault {
    pub error: RuntimeError,
    pub trace: Vec<TraceFrame>,
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for frame in &self.trace {
            write!(f, "\n{frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<JumpOutOfRange> for CompileError {
    fn from(err: JumpOutOfRange) -> Self {
        Self::new(err.to_string())
    }
}

impl From<ConstantPoolFull> for CompileError {
    fn from(err: ConstantPoolFull) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpretError {
    Compile(CompileError),
    Runtime(RuntimeFault),
}

impl InterpretError {
    /// The runtime error, if this was a runtime fault.
    pub fn runtime(&self) -> Option<&RuntimeError> {
        match self {
            Self::Runtime(fault) => Some(&fault.error),
            Self::Compile(_) => None,
        }
    }
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(err) => err.fmt(f),
            Self::Runtime(fault) => fault.fmt(f),
        }
    }
}

impl std::error::Error for InterpretError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Compile(err) => Some(err),
            Self::Runtime(fault) => Some(fault),
        }
    }
}

impl From<CompileError> for InterpretError {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<RuntimeFault> for InterpretError {
    fn from(fault: RuntimeFault) -> Self {
        Self::Runtime(fault)
    }
}

/// Rejected [`VMCreateInfo`](crate::VMCreateInfo).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    Heap(&'static str),
    Stack(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heap(reason) => write!(f, "invalid heap settings: {reason}"),
            Self::Stack(reason) => write!(f, "invalid stack settings: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}
