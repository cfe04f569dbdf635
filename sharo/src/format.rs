//! Canonical text of values, and a disassembler for function prototypes.
use std::fmt::Write;

use bytecode::{BytecodeDecoder, Instruction};

use crate::{Heap, ObjRef, Object, Value};

/// Text for `f`: shortest round-trip decimal, integral values without a
/// fraction, scientific notation outside `[1e-5, 1e16)`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude == 0.0 || (1e-5..1e16).contains(&magnitude) {
        format!("{f}")
    } else {
        format!("{f:e}")
    }
}

/// The text `PRINT` writes for `value`.
pub fn format_value(heap: &Heap, value: Value) -> String {
    let mut out = String::new();
    ValueWriter {
        heap,
        out: &mut out,
        active: Vec::new(),
    }
    .value(value);
    out
}

struct ValueWriter<'a> {
    heap: &'a Heap,
    out: &'a mut String,
    /// Containers currently being printed, to cut cycles.
    active: Vec<ObjRef>,
}

impl ValueWriter<'_> {
    fn value(&mut self, value: Value) {
        match value {
            Value::Bool(b) => self.out.push_str(if b { "true" } else { "false" }),
            Value::Nil => self.out.push_str("nil"),
            Value::Int(i) => {
                let _ = write!(self.out, "{i}");
            }
            Value::Float(f) => self.out.push_str(&format_float(f)),
            Value::RawPtr(p) => {
                let _ = write!(self.out, "<ptr {p:p}>");
            }
            Value::Object(object) => self.object(object),
        }
    }

    fn object(&mut self, object: ObjRef) {
        let heap = self.heap;
        let Some(obj) = heap.try_get(object) else {
            self.out.push_str("<freed>");
            return;
        };
        match obj {
            Object::String(s) => self.out.push_str(&s.to_string_lossy()),
            Object::Function(_) => self.function(object),
            Object::Closure(c) => self.function(c.function),
            Object::BoundMethod(b) => match heap.try_get(b.method) {
                Some(Object::Closure(c)) => self.function(c.function),
                _ => self.out.push_str("<fn>"),
            },
            Object::Native(_) => self.out.push_str("<native fn>"),
            Object::Upvalue(_) => self.out.push_str("<upvalue>"),
            Object::Array(array) => {
                if self.active.contains(&object) {
                    self.out.push_str("[...]");
                    return;
                }
                self.active.push(object);
                self.out.push('[');
                for (i, element) in array.elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.value(*element);
                }
                self.out.push(']');
                self.active.pop();
            }
            Object::StructDef(def) => {
                self.out.push_str("<type ");
                self.string(def.name());
                self.out.push('>');
            }
            Object::Struct(instance) => {
                let def = heap.try_get(instance.def()).and_then(Object::as_struct_def);
                if let Some(def) = def {
                    self.string(def.name());
                }
                if self.active.contains(&object) {
                    self.out.push_str("(...)");
                    return;
                }
                self.active.push(object);
                self.out.push('(');
                for (i, field) in instance.fields().iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match def.and_then(|def| def.field_names().get(i)) {
                        Some(name) => self.string(*name),
                        None => self.out.push('_'),
                    }
                    self.out.push_str(": ");
                    self.value(*field);
                }
                self.out.push(')');
                self.active.pop();
            }
        }
    }

    fn function(&mut self, function: ObjRef) {
        let heap = self.heap;
        match heap.try_get(function).and_then(Object::as_function) {
            Some(f) => match f.name {
                Some(name) => {
                    self.out.push_str("<fn ");
                    self.string(name);
                    self.out.push('>');
                }
                None => self.out.push_str("<script>"),
            },
            None => self.out.push_str("<fn>"),
        }
    }

    fn string(&mut self, string: ObjRef) {
        if let Some(s) = self.heap.try_get(string).and_then(Object::as_string) {
            self.out.push_str(&s.to_string_lossy());
        }
    }
}

/// Name of a function for listings and stack traces.
pub fn function_name(heap: &Heap, function: ObjRef) -> Option<String> {
    let name = heap.try_get(function)?.as_function()?.name?;
    Some(heap.try_get(name)?.as_string()?.to_string_lossy().into_owned())
}

/// Listing of `function` and, after it, every function in its constant
/// pool.
pub fn disassemble(heap: &Heap, function: ObjRef) -> String {
    let mut out = String::new();
    let mut pending = vec![function];
    let mut seen = Vec::new();
    while let Some(function) = pending.pop() {
        if seen.contains(&function) {
            continue;
        }
        seen.push(function);
        disassemble_one(heap, function, &mut out, &mut pending);
    }
    out
}

fn disassemble_one(heap: &Heap, function: ObjRef, out: &mut String, nested: &mut Vec<ObjRef>) {
    let Some(f) = heap.try_get(function).and_then(Object::as_function) else {
        return;
    };
    let title = function_name(heap, function).unwrap_or_else(|| "<script>".to_string());
    let _ = writeln!(out, "== {title} (arity {}, upvalues {}) ==", f.arity, f.upvalue_count);

    let chunk = &f.chunk;
    let constant = |idx: u16| match chunk.constant(idx) {
        Some(value) => format_value(heap, value),
        None => "<out of range>".to_string(),
    };

    let mut decoder = BytecodeDecoder::new(chunk.code());
    let mut last_line = None;
    loop {
        let offset = decoder.offset();
        let instruction = match decoder.decode_next() {
            None => break,
            Some(Ok(instruction)) => instruction,
            Some(Err(err)) => {
                let _ = writeln!(out, "{offset:04}      !! {err}");
                break;
            }
        };

        let line = chunk.line_for(offset);
        let _ = if line.is_some() && line == last_line {
            write!(out, "{offset:04}    | {instruction}")
        } else {
            write!(out, "{offset:04} {:4} {instruction}", line.unwrap_or(0))
        };
        last_line = line;

        match instruction {
            Instruction::Constant { idx } => {
                let _ = write!(out, "  ; {}", constant(idx));
            }
            Instruction::GetGlobal { name }
            | Instruction::DefineGlobal { name }
            | Instruction::SetGlobal { name }
            | Instruction::StructDef { name, .. }
            | Instruction::StructField { name }
            | Instruction::GetField { name }
            | Instruction::SetField { name }
            | Instruction::Method { name }
            | Instruction::Invoke { name, .. } => {
                let _ = write!(out, "  ; {}", constant(name));
            }
            Instruction::Import { path } => {
                let _ = write!(out, "  ; \"{}\"", constant(path));
            }
            Instruction::AddLocalConst { constant: idx, .. }
            | Instruction::LessLocalConst { constant: idx, .. } => {
                let _ = write!(out, "  ; {}", constant(idx));
            }
            Instruction::Jump { offset: distance } | Instruction::JumpIfFalse { offset: distance } => {
                let _ = write!(out, "  -> {:04}", decoder.offset() + distance as usize);
            }
            Instruction::Loop { offset: distance } => {
                let target = decoder.offset().saturating_sub(distance as usize);
                let _ = write!(out, "  -> {target:04}");
            }
            Instruction::Closure { function, captures } => {
                let _ = write!(out, "  ; {}", constant(function));
                for _ in 0..captures {
                    let capture_offset = decoder.offset();
                    match decoder.read_capture() {
                        Ok(capture) => {
                            let _ = write!(out, "\n{capture_offset:04}    |   {capture}");
                        }
                        Err(err) => {
                            let _ = write!(out, "\n{capture_offset:04}      !! {err}");
                            out.push('\n');
                            return;
                        }
                    }
                }
            }
            _ => {}
        }
        out.push('\n');
    }

    for value in chunk.constants() {
        if let Value::Object(object) = value {
            if matches!(heap.try_get(*object), Some(Object::Function(_))) {
                nested.push(*object);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Array, HeapSettings, Instance, NoRoots, StructDef};

    #[test]
    fn floats() {
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(1e20), "1e20");
        assert_eq!(format_float(1.5e-7), "1.5e-7");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn scalars() {
        let heap = Heap::new(HeapSettings::default()).unwrap();
        assert_eq!(format_value(&heap, Value::Int(-42)), "-42");
        assert_eq!(format_value(&heap, Value::Bool(true)), "true");
        assert_eq!(format_value(&heap, Value::Nil), "nil");
        assert!(format_value(&heap, Value::RawPtr(std::ptr::null_mut())).starts_with("<ptr 0x"));
    }

    #[test]
    fn containers() {
        let mut heap = Heap::new(HeapSettings::default()).unwrap();
        let hi = heap.intern(b"hi", &mut NoRoots);
        let array = heap.allocate(
            Object::Array(Array::new(vec![Value::Int(1), Value::Object(hi), Value::Float(2.5)])),
            &mut NoRoots,
        );
        assert_eq!(format_value(&heap, Value::Object(array)), "[1, hi, 2.5]");

        let name = heap.intern(b"Point", &mut NoRoots);
        let x = heap.intern(b"x", &mut NoRoots);
        let y = heap.intern(b"y", &mut NoRoots);
        let mut def = StructDef::new(name, 2);
        def.add_field(x);
        def.add_field(y);
        let def = heap.allocate(Object::StructDef(def), &mut NoRoots);
        let point = heap.allocate(
            Object::Struct(Instance::new(def, vec![Value::Int(1), Value::Int(2)].into())),
            &mut NoRoots,
        );
        assert_eq!(format_value(&heap, Value::Object(def)), "<type Point>");
        assert_eq!(format_value(&heap, Value::Object(point)), "Point(x: 1, y: 2)");
    }

    #[test]
    fn cycles_are_cut() {
        let mut heap = Heap::new(HeapSettings::default()).unwrap();
        let array = heap.allocate(Object::Array(Array::default()), &mut NoRoots);
        heap.update(array, |object| {
            if let Some(a) = object.as_array_mut() {
                a.elements.push(Value::Int(1));
                a.elements.push(Value::Object(array));
            }
        });
        assert_eq!(format_value(&heap, Value::Object(array)), "[1, [...]]");
    }
}
