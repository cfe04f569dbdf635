use core::fmt;

use crate::instruction::Capture;
use crate::line_table::{LineTable, LineTableBuilder};
use crate::op::Op;

/// A forward jump whose offset has not yet been resolved.
///
/// Created by [`BytecodeBuilder::jump`] and
/// [`BytecodeBuilder::jump_if_false`]. Resolve it with
/// [`BytecodeBuilder::bind`].
#[derive(Debug)]
#[must_use]
pub struct Label {
    /// Position of the u16 offset bytes in the buffer.
    offset_pos: usize,
    /// Position right after the jump instruction (base for relative offset).
    base: usize,
}

/// A jump distance that does not fit the 16-bit offset operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpOutOfRange {
    pub distance: usize,
}

impl fmt::Display for JumpOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jump distance {} exceeds {}", self.distance, u16::MAX)
    }
}

impl std::error::Error for JumpOutOfRange {}

/// Builds a bytecode byte sequence together with its line table.
///
/// Every instruction is tagged with the line set by the most recent
/// [`set_line`](Self::set_line).
pub struct BytecodeBuilder {
    buf: Vec<u8>,
    lines: LineTableBuilder,
    line: u32,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            lines: LineTableBuilder::new(),
            line: 1,
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn finish(self) -> (Vec<u8>, LineTable) {
        (self.buf, self.lines.finish())
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_op(&mut self, op: Op) {
        self.lines.add(self.buf.len() as u32, self.line);
        self.buf.push(op as u8);
    }

    /// Emit an opcode that takes no operands.
    pub fn emit(&mut self, op: Op) {
        debug_assert_eq!(op.operand_size(), 0, "{op:?} takes operands");
        self.emit_op(op);
    }

    /// Emit raw bytes, bypassing encoding. Only useful to produce malformed
    /// streams.
    pub fn emit_raw(&mut self, bytes: &[u8]) {
        self.lines.add(self.buf.len() as u32, self.line);
        self.buf.extend_from_slice(bytes);
    }

    // ── operand-carrying instructions ──────────────────────────────

    /// `Constant <idx:u16>`
    pub fn constant(&mut self, idx: u16) {
        self.emit_op(Op::Constant);
        self.emit_u16(idx);
    }

    /// `GetLocal <slot>`, using the dedicated opcodes for slots 0-3.
    pub fn get_local(&mut self, slot: u8) {
        match slot {
            0 => self.emit_op(Op::GetLocal0),
            1 => self.emit_op(Op::GetLocal1),
            2 => self.emit_op(Op::GetLocal2),
            3 => self.emit_op(Op::GetLocal3),
            _ => {
                self.emit_op(Op::GetLocal);
                self.emit_u8(slot);
            }
        }
    }

    /// `GetLocal <slot>` without the short forms.
    pub fn get_local_long(&mut self, slot: u8) {
        self.emit_op(Op::GetLocal);
        self.emit_u8(slot);
    }

    pub fn set_local(&mut self, slot: u8) {
        self.emit_op(Op::SetLocal);
        self.emit_u8(slot);
    }

    pub fn get_global(&mut self, name: u16) {
        self.emit_op(Op::GetGlobal);
        self.emit_u16(name);
    }

    pub fn define_global(&mut self, name: u16) {
        self.emit_op(Op::DefineGlobal);
        self.emit_u16(name);
    }

    pub fn set_global(&mut self, name: u16) {
        self.emit_op(Op::SetGlobal);
        self.emit_u16(name);
    }

    pub fn get_upvalue(&mut self, index: u8) {
        self.emit_op(Op::GetUpvalue);
        self.emit_u8(index);
    }

    pub fn set_upvalue(&mut self, index: u8) {
        self.emit_op(Op::SetUpvalue);
        self.emit_u8(index);
    }

    pub fn call(&mut self, argc: u8) {
        self.emit_op(Op::Call);
        self.emit_u8(argc);
    }

    /// `Closure <fn_idx:u16> <n:u8>` followed by `n` capture descriptors.
    pub fn closure(&mut self, function: u16, captures: &[Capture]) {
        debug_assert!(captures.len() <= u8::MAX as usize);
        self.emit_op(Op::Closure);
        self.emit_u16(function);
        self.emit_u8(captures.len() as u8);
        for capture in captures {
            self.buf.extend_from_slice(&capture.encode());
        }
    }

    pub fn struct_def(&mut self, fields: u8, name: u16) {
        self.emit_op(Op::StructDef);
        self.emit_u8(fields);
        self.emit_u16(name);
    }

    pub fn struct_field(&mut self, name: u16) {
        self.emit_op(Op::StructField);
        self.emit_u16(name);
    }

    pub fn get_field(&mut self, name: u16) {
        self.emit_op(Op::GetField);
        self.emit_u16(name);
    }

    pub fn set_field(&mut self, name: u16) {
        self.emit_op(Op::SetField);
        self.emit_u16(name);
    }

    pub fn array(&mut self, count: u8) {
        self.emit_op(Op::Array);
        self.emit_u8(count);
    }

    pub fn method(&mut self, name: u16) {
        self.emit_op(Op::Method);
        self.emit_u16(name);
    }

    pub fn invoke(&mut self, name: u16, argc: u8) {
        self.emit_op(Op::Invoke);
        self.emit_u16(name);
        self.emit_u8(argc);
    }

    pub fn import(&mut self, path: u16) {
        self.emit_op(Op::Import);
        self.emit_u16(path);
    }

    pub fn inc_local(&mut self, slot: u8) {
        self.emit_op(Op::IncLocal);
        self.emit_u8(slot);
    }

    pub fn add_local_const(&mut self, slot: u8, constant: u16) {
        self.emit_op(Op::AddLocalConst);
        self.emit_u8(slot);
        self.emit_u16(constant);
    }

    pub fn less_local_const(&mut self, slot: u8, constant: u16) {
        self.emit_op(Op::LessLocalConst);
        self.emit_u8(slot);
        self.emit_u16(constant);
    }

    pub fn index_get_local(&mut self, slot: u8) {
        self.emit_op(Op::IndexGetLocal);
        self.emit_u8(slot);
    }

    // ── control flow ───────────────────────────────────────────────

    /// Emit an unconditional forward jump. Returns a [`Label`] that must be
    /// resolved later with [`bind`](Self::bind).
    pub fn jump(&mut self) -> Label {
        self.emit_jump_placeholder(Op::Jump)
    }

    /// Emit a forward jump taken when the top of the stack is falsey.
    pub fn jump_if_false(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpIfFalse)
    }

    /// Bind a forward jump label to the current position.
    pub fn bind(&mut self, label: Label) -> Result<(), JumpOutOfRange> {
        let distance = self.buf.len() - label.base;
        let offset = u16::try_from(distance).map_err(|_| JumpOutOfRange { distance })?;
        self.buf[label.offset_pos..label.offset_pos + 2].copy_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    /// Emit a backward jump to `target` (a byte offset obtained from
    /// [`current_offset`](Self::current_offset)).
    pub fn loop_to(&mut self, target: usize) -> Result<(), JumpOutOfRange> {
        let base = self.buf.len() + 1 + 2;
        let distance = base - target;
        let offset = u16::try_from(distance).map_err(|_| JumpOutOfRange { distance })?;
        self.emit_op(Op::Loop);
        self.emit_u16(offset);
        Ok(())
    }

    fn emit_jump_placeholder(&mut self, op: Op) -> Label {
        self.emit_op(op);
        let offset_pos = self.buf.len();
        self.emit_u16(0); // placeholder
        let base = self.buf.len();
        Label { offset_pos, base }
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
