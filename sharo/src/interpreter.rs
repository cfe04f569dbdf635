//! The dispatch loop.
//!
//! Every instruction is decoded with bounds checks from the current frame's
//! code, so malformed bytecode faults instead of panicking. Multi-step
//! constructions keep their inputs on the operand stack until the result is
//! allocated.
use std::cmp::Ordering;
use std::mem;

use bytecode::{BytecodeDecoder, Capture, Instruction};
use log::{Level, debug, log_enabled, trace};

use crate::arithmetic::{self, BinaryOp};
use crate::format::format_value;
use crate::{
    Array, BoundMethod, CallFrame, Closure, Function, Instance, Mutator, NativeFn, ObjRef, Object,
    ObjectType, RuntimeError, StructDef, VM, Value,
};

/// Frame data the current instruction needs.
#[derive(Debug, Clone, Copy)]
struct Fetched {
    instruction: Instruction,
    offset: usize,
    base: usize,
    closure: ObjRef,
    function: ObjRef,
}

/// What a name resolves to on an instance.
enum Property {
    Field(usize, Value),
    Method(ObjRef),
    Missing,
}

impl VM {
    /// Run until the frame at depth `entry` returns.
    pub(crate) fn execute(&mut self, entry: usize) -> Result<Value, RuntimeError> {
        loop {
            let Fetched {
                instruction,
                offset,
                base,
                closure,
                function,
            } = self.fetch()?;

            if log_enabled!(Level::Trace) {
                self.trace_instruction(offset, &instruction);
            }

            match instruction {
                Instruction::Constant { idx } => {
                    let value = self.constant(function, idx)?;
                    self.push(value)?;
                }
                Instruction::Nil => self.push(Value::Nil)?,
                Instruction::True => self.push(Value::Bool(true))?,
                Instruction::False => self.push(Value::Bool(false))?,
                Instruction::Pop => {
                    self.pop()?;
                }
                Instruction::Dup => {
                    let top = self.peek(0)?;
                    self.push(top)?;
                }

                Instruction::GetLocal { slot } => self.get_local(base, slot)?,
                Instruction::GetLocal0 => self.get_local(base, 0)?,
                Instruction::GetLocal1 => self.get_local(base, 1)?,
                Instruction::GetLocal2 => self.get_local(base, 2)?,
                Instruction::GetLocal3 => self.get_local(base, 3)?,
                Instruction::SetLocal { slot } => {
                    let value = self.peek(0)?;
                    self.roots.stack.set(base + slot as usize, value)?;
                }

                Instruction::GetGlobal { name } => {
                    let name = self.constant_string(function, name)?;
                    match self.roots.globals.get(&name) {
                        Some(value) => {
                            let value = *value;
                            self.push(value)?;
                        }
                        None => {
                            return Err(RuntimeError::UndefinedVariable(self.string_text(name)));
                        }
                    }
                }
                Instruction::DefineGlobal { name } => {
                    let name = self.constant_string(function, name)?;
                    let value = self.peek(0)?;
                    self.roots.globals.insert(name, value);
                    self.pop()?;
                }
                Instruction::SetGlobal { name } => {
                    let name = self.constant_string(function, name)?;
                    let value = self.peek(0)?;
                    match self.roots.globals.get_mut(&name) {
                        Some(global) => *global = value,
                        None => {
                            return Err(RuntimeError::UndefinedVariable(self.string_text(name)));
                        }
                    }
                }
                Instruction::GetUpvalue { index } => {
                    let upvalue = self.closure_upvalue(closure, index)?;
                    let value = self.read_upvalue(upvalue)?;
                    self.push(value)?;
                }
                Instruction::SetUpvalue { index } => {
                    let upvalue = self.closure_upvalue(closure, index)?;
                    let value = self.peek(0)?;
                    self.write_upvalue(upvalue, value)?;
                }

                Instruction::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b))?;
                }
                Instruction::NotEqual => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a != b))?;
                }
                Instruction::Greater => self.compare(|o| o == Ordering::Greater)?,
                Instruction::GreaterEqual => self.compare(|o| o != Ordering::Less)?,
                Instruction::Less => self.compare(|o| o == Ordering::Less)?,
                Instruction::LessEqual => self.compare(|o| o != Ordering::Greater)?,

                Instruction::AddInt => self.binary(|a, b| arithmetic::int(BinaryOp::Add, a, b))?,
                Instruction::SubtractInt => {
                    self.binary(|a, b| arithmetic::int(BinaryOp::Subtract, a, b))?
                }
                Instruction::MultiplyInt => {
                    self.binary(|a, b| arithmetic::int(BinaryOp::Multiply, a, b))?
                }
                Instruction::DivideInt => {
                    self.binary(|a, b| arithmetic::int(BinaryOp::Divide, a, b))?
                }
                Instruction::ModuloInt => {
                    self.binary(|a, b| arithmetic::int(BinaryOp::Modulo, a, b))?
                }
                Instruction::NegateInt => self.unary(arithmetic::negate_int)?,
                Instruction::AddFloat => {
                    self.binary(|a, b| arithmetic::float(BinaryOp::Add, a, b))?
                }
                Instruction::SubtractFloat => {
                    self.binary(|a, b| arithmetic::float(BinaryOp::Subtract, a, b))?
                }
                Instruction::MultiplyFloat => {
                    self.binary(|a, b| arithmetic::float(BinaryOp::Multiply, a, b))?
                }
                Instruction::DivideFloat => {
                    self.binary(|a, b| arithmetic::float(BinaryOp::Divide, a, b))?
                }
                Instruction::NegateFloat => self.unary(arithmetic::negate_float)?,
                Instruction::Add => self.add()?,
                Instruction::Subtract => {
                    self.binary(|a, b| arithmetic::generic(BinaryOp::Subtract, a, b))?
                }
                Instruction::Multiply => {
                    self.binary(|a, b| arithmetic::generic(BinaryOp::Multiply, a, b))?
                }
                Instruction::Divide => {
                    self.binary(|a, b| arithmetic::generic(BinaryOp::Divide, a, b))?
                }
                Instruction::Modulo => {
                    self.binary(|a, b| arithmetic::generic(BinaryOp::Modulo, a, b))?
                }
                Instruction::Negate => self.unary(arithmetic::negate)?,
                Instruction::Not => self.unary(|v| Ok(Value::Bool(v.is_falsey())))?,
                Instruction::IntToFloat => self.unary(arithmetic::int_to_float)?,
                Instruction::FloatToInt => self.unary(arithmetic::float_to_int)?,

                Instruction::Jump { offset } => self.jump_forward(offset)?,
                Instruction::JumpIfFalse { offset } => {
                    if self.peek(0)?.is_falsey() {
                        self.jump_forward(offset)?;
                    }
                }
                Instruction::Loop { offset } => {
                    let frame = self.roots.frames.current_mut()?;
                    frame.ip = frame
                        .ip
                        .checked_sub(offset as usize)
                        .ok_or(RuntimeError::Malformed("loop before start of code"))?;
                }

                Instruction::Call { argc } => {
                    let callee = self.peek(argc as usize)?;
                    self.call_value(callee, argc as usize)?;
                }
                Instruction::Closure {
                    function: idx,
                    captures: _,
                } => self.make_closure(function, closure, base, idx)?,
                Instruction::CloseUpvalue => {
                    let top = self
                        .roots
                        .stack
                        .len()
                        .checked_sub(1)
                        .ok_or(RuntimeError::Malformed("stack underflow"))?;
                    self.close_upvalues(top)?;
                    self.pop()?;
                }
                Instruction::Return => {
                    let result = self.pop()?;
                    self.close_upvalues(base)?;
                    self.roots.frames.pop();
                    self.roots.stack.truncate(base);
                    if self.roots.frames.len() <= entry {
                        return Ok(result);
                    }
                    self.push(result)?;
                }
                Instruction::Print => {
                    let value = self.pop()?;
                    let text = format_value(&self.heap, value);
                    self.output.write_line(&text);
                }

                Instruction::StructDef { fields, name } => {
                    let name = self.constant_string(function, name)?;
                    let def = self.allocate(Object::StructDef(StructDef::new(name, fields)));
                    self.push(Value::Object(def))?;
                }
                Instruction::StructField { name } => {
                    let name = self.constant_string(function, name)?;
                    let def = self.struct_def_ref(self.peek(0)?)?;
                    self.heap.update(def, |object| {
                        if let Some(def) = object.as_struct_def_mut() {
                            def.add_field(name);
                        }
                    });
                }
                Instruction::GetField { name } => {
                    let receiver = self.peek(0)?;
                    let instance = self.instance_ref(receiver).ok_or(RuntimeError::NoFields)?;
                    let name = self.constant_string(function, name)?;
                    let value = match self.resolve(instance, name)? {
                        Property::Field(_, value) => value,
                        Property::Method(method) => {
                            Value::Object(self.allocate(Object::BoundMethod(BoundMethod {
                                receiver,
                                method,
                            })))
                        }
                        Property::Missing => {
                            return Err(RuntimeError::UndefinedProperty(self.string_text(name)));
                        }
                    };
                    self.pop()?;
                    self.push(value)?;
                }
                Instruction::SetField { name } => {
                    let value = self.peek(0)?;
                    let instance = self
                        .instance_ref(self.peek(1)?)
                        .ok_or(RuntimeError::NoFields)?;
                    let name = self.constant_string(function, name)?;
                    let Property::Field(slot, _) = self.resolve(instance, name)? else {
                        return Err(RuntimeError::UndefinedField(self.string_text(name)));
                    };
                    if let Some(instance) = self.heap.get_mut(instance).as_instance_mut() {
                        instance.set_field(slot, value);
                    }
                    self.roots.stack.drop_n(2)?;
                    self.push(value)?;
                }

                Instruction::Array { count } => {
                    let count = count as usize;
                    let elements = self.roots.stack.top(count)?.to_vec();
                    let array = self.allocate(Object::Array(Array::new(elements)));
                    self.roots.stack.drop_n(count)?;
                    self.push(Value::Object(array))?;
                }
                Instruction::IndexGet => {
                    let (array, index) = self.array_index(self.peek(1)?, self.peek(0)?)?;
                    let element = self.array_element(array, index)?;
                    self.roots.stack.drop_n(2)?;
                    self.push(element)?;
                }
                Instruction::IndexSet => {
                    let value = self.peek(0)?;
                    let (array, index) = self.array_index(self.peek(2)?, self.peek(1)?)?;
                    if let Some(array) = self.heap.get_mut(array).as_array_mut() {
                        array.elements[index] = value;
                    }
                    self.roots.stack.drop_n(3)?;
                    self.push(value)?;
                }

                Instruction::Method { name } => {
                    let name = self.constant_string(function, name)?;
                    let method = self.peek(0)?;
                    let method = match method {
                        Value::Object(object)
                            if matches!(self.heap.try_get(object), Some(Object::Closure(_))) =>
                        {
                            object
                        }
                        _ => return Err(RuntimeError::Malformed("method is not a closure")),
                    };
                    let def = self.struct_def_ref(self.peek(1)?)?;
                    self.heap.update(def, |object| {
                        if let Some(def) = object.as_struct_def_mut() {
                            def.define_method(name, method);
                        }
                    });
                    self.pop()?;
                }
                Instruction::Invoke { name, argc } => {
                    let argc = argc as usize;
                    let receiver = self.peek(argc)?;
                    let instance = self.instance_ref(receiver).ok_or(RuntimeError::NoMethods)?;
                    let name = self.constant_string(function, name)?;
                    match self.resolve(instance, name)? {
                        Property::Field(_, value) => {
                            let slot = self.roots.stack.len() - argc - 1;
                            self.roots.stack.set(slot, value)?;
                            self.call_value(value, argc)?;
                        }
                        Property::Method(method) => self.call_closure(method, argc)?,
                        Property::Missing => {
                            return Err(RuntimeError::UndefinedMethod(self.string_text(name)));
                        }
                    }
                }
                Instruction::Import { path } => {
                    let path = self.constant_string(function, path)?;
                    self.import(path)?;
                }

                Instruction::IncLocal { slot } => {
                    let slot = base + slot as usize;
                    let value = arithmetic::increment(self.roots.stack.get(slot)?)?;
                    self.roots.stack.set(slot, value)?;
                }
                Instruction::AddLocalConst { slot, constant } => {
                    let local = self.roots.stack.get(base + slot as usize)?;
                    let constant = self.constant(function, constant)?;
                    let sum = arithmetic::generic(BinaryOp::Add, local, constant)
                        .map_err(|_| RuntimeError::NumberOperands)?;
                    self.push(sum)?;
                }
                Instruction::LessLocalConst { slot, constant } => {
                    let local = self.roots.stack.get(base + slot as usize)?;
                    let constant = self.constant(function, constant)?;
                    let less = arithmetic::compare(local, constant)? == Some(Ordering::Less);
                    self.push(Value::Bool(less))?;
                }
                Instruction::IndexGetLocal { slot } => {
                    let array = self.pop()?;
                    let index = self.roots.stack.get(base + slot as usize)?;
                    let (array, index) = self.array_index(array, index)?;
                    let element = self.array_element(array, index)?;
                    self.push(element)?;
                }
            }
        }
    }

    // ── Fetch ─────────────────────────────────────────────────────────

    /// Decode the instruction at the current frame's ip and advance past it,
    /// including a closure's capture descriptors.
    #[inline]
    fn fetch(&mut self) -> Result<Fetched, RuntimeError> {
        let frame = self.roots.frames.current_mut()?;
        let offset = frame.ip;
        let mut decoder = BytecodeDecoder::at(&frame.code, offset);
        let decoded = decoder.decode_next();

        self.captures.clear();
        if let Some(Ok(Instruction::Closure { captures, .. })) = decoded {
            for _ in 0..captures {
                match decoder.read_capture() {
                    Ok(capture) => self.captures.push(capture),
                    Err(err) => {
                        frame.ip = decoder.offset();
                        return Err(err.into());
                    }
                }
            }
        }
        frame.ip = decoder.offset();

        let instruction = match decoded {
            Some(result) => result?,
            None => return Err(RuntimeError::Malformed("missing return")),
        };
        Ok(Fetched {
            instruction,
            offset,
            base: frame.base,
            closure: frame.closure,
            function: frame.function,
        })
    }

    fn trace_instruction(&self, offset: usize, instruction: &Instruction) {
        let stack: Vec<String> = self
            .roots
            .stack
            .as_slice()
            .iter()
            .map(|value| format_value(&self.heap, *value))
            .collect();
        trace!("{offset:04} {:<28} [{}]", instruction.to_string(), stack.join(", "));
    }

    // ── Stack helpers ─────────────────────────────────────────────────

    #[inline]
    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.roots.stack.push(value)
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.roots.stack.pop()
    }

    #[inline]
    pub(crate) fn peek(&self, distance: usize) -> Result<Value, RuntimeError> {
        self.roots.stack.peek(distance)
    }

    #[inline]
    fn get_local(&mut self, base: usize, slot: u8) -> Result<(), RuntimeError> {
        let value = self.roots.stack.get(base + slot as usize)?;
        self.push(value)
    }

    #[inline]
    fn binary(
        &mut self,
        op: impl FnOnce(Value, Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(op(a, b)?)
    }

    #[inline]
    fn unary(
        &mut self,
        op: impl FnOnce(Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        self.push(op(value)?)
    }

    #[inline]
    fn compare(&mut self, accept: impl FnOnce(Ordering) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = arithmetic::compare(a, b)?.is_some_and(accept);
        self.push(Value::Bool(result))
    }

    /// Generic `ADD`: concatenation when either side is a string.
    fn add(&mut self) -> Result<(), RuntimeError> {
        let b = self.peek(0)?;
        let a = self.peek(1)?;
        if !self.is_string(a) && !self.is_string(b) {
            return self.binary(|a, b| arithmetic::generic(BinaryOp::Add, a, b));
        }

        let mut bytes = self.text_bytes(a);
        bytes.extend_from_slice(&self.text_bytes(b));
        // operands are still on the stack
        let result = self.heap.intern_owned(bytes, &mut self.roots);
        self.roots.stack.drop_n(2)?;
        self.push(Value::Object(result))
    }

    fn jump_forward(&mut self, offset: u16) -> Result<(), RuntimeError> {
        self.roots.frames.current_mut()?.ip += offset as usize;
        Ok(())
    }

    // ── Heap helpers ──────────────────────────────────────────────────

    fn function(&self, function: ObjRef) -> Result<&Function, RuntimeError> {
        self.heap
            .try_get(function)
            .and_then(Object::as_function)
            .ok_or(RuntimeError::Malformed("expected a function"))
    }

    fn constant(&self, function: ObjRef, idx: u16) -> Result<Value, RuntimeError> {
        self.function(function)?
            .chunk
            .constant(idx)
            .ok_or(RuntimeError::Malformed("constant index out of range"))
    }

    fn constant_string(&self, function: ObjRef, idx: u16) -> Result<ObjRef, RuntimeError> {
        match self.constant(function, idx)? {
            Value::Object(object) if self.is_string(Value::Object(object)) => Ok(object),
            _ => Err(RuntimeError::Malformed("expected a string constant")),
        }
    }

    fn is_string(&self, value: Value) -> bool {
        match value {
            Value::Object(object) => matches!(self.heap.try_get(object), Some(Object::String(_))),
            _ => false,
        }
    }

    /// String contents, or the canonical text of anything else.
    fn text_bytes(&self, value: Value) -> Vec<u8> {
        match value
            .as_object()
            .and_then(|object| self.heap.try_get(object))
            .and_then(Object::as_string)
        {
            Some(string) => string.as_bytes().to_vec(),
            None => format_value(&self.heap, value).into_bytes(),
        }
    }

    pub(crate) fn string_text(&self, string: ObjRef) -> String {
        self.heap
            .try_get(string)
            .and_then(Object::as_string)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn closure_upvalue(&self, closure: ObjRef, index: u8) -> Result<ObjRef, RuntimeError> {
        self.heap
            .try_get(closure)
            .and_then(Object::as_closure)
            .and_then(|c| c.upvalues.get(index as usize).copied())
            .ok_or(RuntimeError::Malformed("upvalue index out of range"))
    }

    fn instance_ref(&self, value: Value) -> Option<ObjRef> {
        let object = value.as_object()?;
        match self.heap.try_get(object)? {
            Object::Struct(_) => Some(object),
            _ => None,
        }
    }

    fn struct_def_ref(&self, value: Value) -> Result<ObjRef, RuntimeError> {
        match value {
            Value::Object(object)
                if matches!(self.heap.try_get(object), Some(Object::StructDef(_))) =>
            {
                Ok(object)
            }
            _ => Err(RuntimeError::Malformed("expected a struct definition")),
        }
    }

    /// Fields shadow methods.
    fn resolve(&self, instance: ObjRef, name: ObjRef) -> Result<Property, RuntimeError> {
        let instance = self
            .heap
            .try_get(instance)
            .and_then(Object::as_instance)
            .ok_or(RuntimeError::NoFields)?;
        let def = self
            .heap
            .try_get(instance.def())
            .and_then(Object::as_struct_def)
            .ok_or(RuntimeError::Malformed("instance without definition"))?;

        if let Some(slot) = def.field_slot(name) {
            if let Some(value) = instance.field(slot) {
                return Ok(Property::Field(slot, value));
            }
        }
        Ok(match def.method(name) {
            Some(method) => Property::Method(method),
            None => Property::Missing,
        })
    }

    fn array_index(&self, array: Value, index: Value) -> Result<(ObjRef, usize), RuntimeError> {
        let Some((object, elements)) = array.as_object().and_then(|object| {
            let array = self.heap.try_get(object)?.as_array()?;
            Some((object, array))
        }) else {
            return Err(RuntimeError::NotAnArray);
        };
        let Value::Int(index) = index else {
            return Err(RuntimeError::IndexNotInt);
        };
        match elements.checked_index(index) {
            Some(position) => Ok((object, position)),
            None => Err(RuntimeError::IndexOutOfBounds {
                index,
                len: elements.len(),
            }),
        }
    }

    fn array_element(&self, array: ObjRef, index: usize) -> Result<Value, RuntimeError> {
        self.heap
            .try_get(array)
            .and_then(Object::as_array)
            .and_then(|a| a.elements.get(index).copied())
            .ok_or(RuntimeError::NotAnArray)
    }

    // ── Calls ─────────────────────────────────────────────────────────

    /// Call `callee`, which sits below `argc` arguments.
    pub(crate) fn call_value(&mut self, callee: Value, argc: usize) -> Result<(), RuntimeError> {
        let Value::Object(object) = callee else {
            return Err(RuntimeError::NotCallable);
        };
        let Some(kind) = self.heap.try_get(object).map(Object::object_type) else {
            return Err(RuntimeError::NotCallable);
        };

        match kind {
            ObjectType::Closure => self.call_closure(object, argc),
            ObjectType::Native => {
                let function = match self.heap.get(object).as_native() {
                    Some(native) => native.function().clone(),
                    None => return Err(RuntimeError::NotCallable),
                };
                self.call_native(function, argc)
            }
            ObjectType::StructDef => self.construct(object, argc),
            ObjectType::BoundMethod => {
                let Some(bound) = self.heap.get(object).as_bound_method().copied() else {
                    return Err(RuntimeError::NotCallable);
                };
                let slot = self.roots.stack.len() - argc - 1;
                self.roots.stack.set(slot, bound.receiver)?;
                self.call_closure(bound.method, argc)
            }
            _ => Err(RuntimeError::NotCallable),
        }
    }

    /// Push a frame for `closure`. Arity and depth are checked first.
    pub(crate) fn call_closure(&mut self, closure: ObjRef, argc: usize) -> Result<(), RuntimeError> {
        let function = self
            .heap
            .try_get(closure)
            .and_then(Object::as_closure)
            .map(|c| c.function)
            .ok_or(RuntimeError::NotCallable)?;
        let f = self.function(function)?;
        if argc != f.arity as usize {
            return Err(RuntimeError::Arity {
                expected: f.arity as usize,
                got: argc,
            });
        }
        if !self.roots.frames.has_room() {
            return Err(RuntimeError::StackOverflow);
        }
        let code = f.chunk.code().clone();
        let base = self
            .roots
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or(RuntimeError::Malformed("stack underflow"))?;

        self.roots.frames.push(CallFrame {
            closure,
            function,
            ip: 0,
            base,
            code,
        })
    }

    /// Natives see a copy of their arguments; the originals stay on the
    /// stack, and rooted, for the duration of the call.
    fn call_native(&mut self, function: NativeFn, argc: usize) -> Result<(), RuntimeError> {
        let mut args = mem::take(&mut self.native_args);
        args.clear();
        args.extend_from_slice(self.roots.stack.top(argc)?);

        let result = {
            let mut mutator = Mutator::new(&mut self.heap, &mut self.roots);
            function(&mut mutator, &args)
        };
        self.native_args = args;

        self.roots.stack.drop_n(argc + 1)?;
        self.push(result)
    }

    /// Calling a struct definition builds an instance from the arguments.
    fn construct(&mut self, def: ObjRef, argc: usize) -> Result<(), RuntimeError> {
        let expected = self
            .heap
            .try_get(def)
            .and_then(Object::as_struct_def)
            .map(StructDef::field_count)
            .ok_or(RuntimeError::NotCallable)?;
        if argc != expected {
            return Err(RuntimeError::Arity { expected, got: argc });
        }
        let fields = self.roots.stack.top(argc)?.to_vec().into_boxed_slice();
        let instance = self.allocate(Object::Struct(Instance::new(def, fields)));
        self.roots.stack.drop_n(argc + 1)?;
        self.push(Value::Object(instance))
    }

    fn make_closure(
        &mut self,
        enclosing_function: ObjRef,
        enclosing: ObjRef,
        base: usize,
        idx: u16,
    ) -> Result<(), RuntimeError> {
        let function = match self.constant(enclosing_function, idx)? {
            Value::Object(object)
                if matches!(self.heap.try_get(object), Some(Object::Function(_))) =>
            {
                object
            }
            _ => return Err(RuntimeError::Malformed("closure of a non-function constant")),
        };

        let captures = mem::take(&mut self.captures);
        let mut upvalues = Vec::with_capacity(captures.len());
        for capture in &captures {
            // fresh cells are rooted by the open chain, inherited ones by the
            // enclosing closure
            let upvalue = match *capture {
                Capture::Local(slot) => self.capture_upvalue(base + slot as usize),
                Capture::Upvalue(index) => self.closure_upvalue(enclosing, index),
            };
            match upvalue {
                Ok(upvalue) => upvalues.push(upvalue),
                Err(err) => {
                    self.captures = captures;
                    return Err(err);
                }
            }
        }
        self.captures = captures;

        let closure = self.allocate(Object::Closure(Closure {
            function,
            upvalues: upvalues.into_boxed_slice(),
        }));
        self.push(Value::Object(closure))
    }

    fn import(&mut self, path: ObjRef) -> Result<(), RuntimeError> {
        let path = self.string_text(path);
        debug!("import '{path}'");

        let Some(frontend) = self.frontend.as_mut() else {
            return Err(RuntimeError::ModuleNotFound(path));
        };
        let Some(source) = frontend.load_module(&path) else {
            return Err(RuntimeError::ModuleNotFound(path));
        };
        let compiled = {
            let mut mutator = Mutator::new(&mut self.heap, &mut self.roots);
            frontend.compile(&mut mutator, &source)
        };
        match compiled {
            Ok(module) => self.call_function(module),
            Err(err) => {
                debug!("module '{path}' failed to compile: {err}");
                Err(RuntimeError::ModuleCompile(path))
            }
        }
    }
}
