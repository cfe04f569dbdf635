//! The core native library.
//!
//! Natives never fault: missing or ill-typed arguments produce `nil`.
use std::time::Instant;

use rand::Rng;

use crate::{Mutator, Object, VM, Value};

pub type PrimitiveFunction = fn(&mut Mutator<'_>, &[Value]) -> Value;

#[derive(Debug, Copy, Clone)]
pub struct Primitive {
    pub name: &'static str,
    pub function: PrimitiveFunction,
}

impl Primitive {
    pub const fn new(name: &'static str, function: PrimitiveFunction) -> Self {
        Self { name, function }
    }
}

pub const PRIMITIVES: &[Primitive] = &[
    Primitive::new("len", len),
    Primitive::new("push", push),
    Primitive::new("pop", pop),
    Primitive::new("chr", chr),
    Primitive::new("random", random),
    Primitive::new("randomFloat", random_float),
];

impl VM {
    /// Register `clock` and the [`PRIMITIVES`] as globals.
    pub fn define_core_natives(&mut self) {
        let start = Instant::now();
        self.define_native("clock", move |_, _| {
            Value::Float(start.elapsed().as_secs_f64())
        });
        for primitive in PRIMITIVES {
            self.define_native(primitive.name, primitive.function);
        }
    }
}

// ( value -- length )
pub fn len(m: &mut Mutator<'_>, args: &[Value]) -> Value {
    let Some(object) = args.first().and_then(Value::as_object) else {
        return Value::Int(0);
    };
    let length = match m.try_get(object) {
        Some(Object::Array(array)) => array.len(),
        Some(Object::String(string)) => string.len(),
        _ => 0,
    };
    Value::Int(length as i64)
}

// ( array value -- length )
pub fn push(m: &mut Mutator<'_>, args: &[Value]) -> Value {
    let [array, value, ..] = args else {
        return Value::Nil;
    };
    let Some(array) = array.as_object().filter(|a| m.array(Value::Object(*a)).is_some()) else {
        return Value::Nil;
    };
    let value = *value;
    m.update(array, |object| match object.as_array_mut() {
        Some(array) => {
            array.elements.push(value);
            Value::Int(array.len() as i64)
        }
        None => Value::Nil,
    })
}

// ( array -- last )
pub fn pop(m: &mut Mutator<'_>, args: &[Value]) -> Value {
    let Some(array) = args
        .first()
        .and_then(Value::as_object)
        .filter(|a| m.array(Value::Object(*a)).is_some())
    else {
        return Value::Nil;
    };
    m.update(array, |object| {
        object
            .as_array_mut()
            .and_then(|array| array.elements.pop())
            .unwrap_or(Value::Nil)
    })
}

// ( code -- string )
pub fn chr(m: &mut Mutator<'_>, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(code)) => Value::Object(m.intern([*code as u8])),
        _ => Value::Nil,
    }
}

// ( max -- int )
pub fn random(_: &mut Mutator<'_>, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(max)) if *max > 0 => Value::Int(rand::thread_rng().gen_range(0..*max)),
        Some(Value::Int(_)) => Value::Int(0),
        _ => Value::Nil,
    }
}

// ( -- float )
pub fn random_float(_: &mut Mutator<'_>, _: &[Value]) -> Value {
    Value::Float(rand::thread_rng().r#gen::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::tests::test_vm;
    use crate::Array;

    #[test]
    fn registered_as_globals() {
        let mut vm = test_vm();
        vm.define_core_natives();
        for name in ["clock", "len", "push", "pop", "chr", "random", "randomFloat"] {
            assert!(vm.global(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn array_natives() {
        let mut vm = test_vm();
        vm.mutate(|m| {
            let array = Value::Object(m.allocate(Object::Array(Array::default())));
            assert_eq!(push(m, &[array, Value::Int(1)]), Value::Int(1));
            assert_eq!(push(m, &[array, Value::Int(2)]), Value::Int(2));
            assert_eq!(len(m, &[array]), Value::Int(2));
            assert_eq!(pop(m, &[array]), Value::Int(2));
            assert_eq!(pop(m, &[array]), Value::Int(1));
            assert_eq!(pop(m, &[array]), Value::Nil);
            assert_eq!(len(m, &[array]), Value::Int(0));
        });
    }

    #[test]
    fn bad_arguments_give_nil() {
        let mut vm = test_vm();
        vm.mutate(|m| {
            assert_eq!(push(m, &[Value::Int(1), Value::Int(2)]), Value::Nil);
            assert_eq!(push(m, &[]), Value::Nil);
            assert_eq!(pop(m, &[Value::Bool(true)]), Value::Nil);
            assert_eq!(chr(m, &[Value::Float(65.0)]), Value::Nil);
            assert_eq!(random(m, &[]), Value::Nil);
            assert_eq!(len(m, &[Value::Int(3)]), Value::Int(0));
        });
    }

    #[test]
    fn strings() {
        let mut vm = test_vm();
        vm.mutate(|m| {
            let a = chr(m, &[Value::Int(65)]);
            assert_eq!(m.format(a), "A");
            assert_eq!(a, Value::Object(m.intern("A")));
            assert_eq!(len(m, &[a]), Value::Int(1));
        });
    }

    #[test]
    fn random_ranges() {
        let mut vm = test_vm();
        vm.mutate(|m| {
            for _ in 0..100 {
                let Value::Int(n) = random(m, &[Value::Int(10)]) else {
                    panic!("random returned a non-int");
                };
                assert!((0..10).contains(&n));
                let Value::Float(f) = random_float(m, &[]) else {
                    panic!("randomFloat returned a non-float");
                };
                assert!((0.0..1.0).contains(&f));
            }
            assert_eq!(random(m, &[Value::Int(0)]), Value::Int(0));
            assert_eq!(random(m, &[Value::Int(-5)]), Value::Int(0));
        });
    }
}
