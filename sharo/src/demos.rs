//! Built-in programs, assembled directly to bytecode.
//!
//! [`DemoFrontend`] compiles a program by name, so the CLI, the benches and
//! the tests can drive the VM through its normal entry points without a
//! parser.
use bytecode::{Capture, Op};

use crate::{CompileError, Frontend, FunctionBuilder, Mutator, ObjRef, Value};

pub type BuildFn = fn(&mut Mutator<'_>) -> Result<ObjRef, CompileError>;

#[derive(Debug, Clone, Copy)]
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    /// What the program prints when run with the core natives defined.
    pub expected_output: &'static str,
    pub build: BuildFn,
}

pub const DEMOS: &[Demo] = &[
    Demo {
        name: "fib",
        description: "recursive fibonacci of 20",
        expected_output: "6765\n",
        build: fib,
    },
    Demo {
        name: "counter",
        description: "two closures sharing one captured variable",
        expected_output: "1\n2\n2\n",
        build: counter,
    },
    Demo {
        name: "point",
        description: "struct fields, methods and printing",
        expected_output: "10\n30\nPoint(x: 10, y: 20)\n",
        build: point,
    },
    Demo {
        name: "arrays",
        description: "array literals, push, pop and an indexed loop",
        expected_output: "4\n4\n4\n[1, 2, 3]\n6\n",
        build: arrays,
    },
    Demo {
        name: "strings",
        description: "concatenation and string building",
        expected_output: "abc\nn = 42\n1.5 units\nABCDE\n",
        build: strings,
    },
    Demo {
        name: "gc",
        description: "allocates short-lived linked lists",
        expected_output: "200\n",
        build: gc_churn,
    },
    Demo {
        name: "import",
        description: "loads the math module and calls into it",
        expected_output: "49\n",
        build: import,
    },
];

/// Programs only reachable through `IMPORT`.
pub const MODULES: &[(&str, BuildFn)] = &[("math", math_module)];

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|demo| demo.name == name)
}

/// Compiles demo and module names instead of source text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoFrontend;

impl Frontend for DemoFrontend {
    fn compile(&mut self, m: &mut Mutator<'_>, source: &str) -> Result<ObjRef, CompileError> {
        let name = source.trim();
        let build = find(name).map(|demo| demo.build).or_else(|| {
            MODULES
                .iter()
                .find(|(module, _)| *module == name)
                .map(|(_, build)| *build)
        });
        match build {
            Some(build) => build(m),
            None => Err(CompileError::new(format!("unknown program '{name}'"))),
        }
    }

    fn load_module(&mut self, path: &str) -> Option<String> {
        MODULES
            .iter()
            .any(|(module, _)| *module == path)
            .then(|| path.to_string())
    }
}

// ── Programs ──────────────────────────────────────────────────────────

fn fib(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    fib_program(m, 20)
}

/// `fib(n)` computed recursively and printed.
pub fn fib_program(m: &mut Mutator<'_>, n: i64) -> Result<ObjRef, CompileError> {
    let mut f = FunctionBuilder::function(m, "fib", 1);
    let name = f.name_constant(m, "fib")?;
    let two = f.add_constant(Value::Int(2))?;
    f.set_line(1);
    f.less_local_const(1, two);
    let recurse = f.jump_if_false();
    f.emit(Op::Pop);
    f.set_line(2);
    f.get_local(1);
    f.emit(Op::Return);
    f.bind(recurse)?;
    f.emit(Op::Pop);
    f.set_line(3);
    f.get_global(name);
    f.get_local(1);
    f.emit_constant(Value::Int(1))?;
    f.emit(Op::SubtractInt);
    f.call(1);
    f.get_global(name);
    f.get_local(1);
    f.emit_constant(Value::Int(2))?;
    f.emit(Op::SubtractInt);
    f.call(1);
    f.emit(Op::AddInt);
    f.emit(Op::Return);
    let fib = f.finish(m);

    let mut s = FunctionBuilder::script();
    let name = s.name_constant(m, "fib")?;
    let function = s.add_constant(Value::Object(fib))?;
    s.set_line(5);
    s.closure(function, &[]);
    s.define_global(name);
    s.set_line(6);
    s.get_global(name);
    s.emit_constant(Value::Int(n))?;
    s.call(1);
    s.emit(Op::Print);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

fn counter(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    let mut inc = FunctionBuilder::function(m, "increment", 0).with_upvalues(1);
    inc.set_line(3);
    inc.get_upvalue(0);
    inc.emit_constant(Value::Int(1))?;
    inc.emit(Op::Add);
    inc.set_upvalue(0);
    inc.emit(Op::Return);
    let inc = inc.finish(m);

    let mut get = FunctionBuilder::function(m, "get", 0).with_upvalues(1);
    get.set_line(4);
    get.get_upvalue(0);
    get.emit(Op::Return);
    let get = get.finish(m);

    // [increment, get] over a shared `count`
    let mut make = FunctionBuilder::function(m, "makeCounter", 0);
    let inc = make.add_constant(Value::Object(inc))?;
    let get = make.add_constant(Value::Object(get))?;
    make.set_line(2);
    make.emit_constant(Value::Int(0))?;
    make.closure(inc, &[Capture::Local(1)]);
    make.closure(get, &[Capture::Local(1)]);
    make.set_line(5);
    make.array(2);
    make.emit(Op::Return);
    let make = make.finish(m);

    let mut s = FunctionBuilder::script();
    let make_name = s.name_constant(m, "makeCounter")?;
    let counter = s.name_constant(m, "counter")?;
    let make = s.add_constant(Value::Object(make))?;
    s.set_line(7);
    s.closure(make, &[]);
    s.define_global(make_name);
    s.set_line(8);
    s.get_global(make_name);
    s.call(0);
    s.define_global(counter);
    for (line, index) in [(9, 0), (10, 0), (11, 1)] {
        s.set_line(line);
        s.get_global(counter);
        s.emit_constant(Value::Int(index))?;
        s.emit(Op::IndexGet);
        s.call(0);
        s.emit(Op::Print);
    }
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

/// Defines `Point` with fields `x`, `y` and a method `sum`, as the global
/// `Point`. Leaves nothing on the stack.
fn define_point(m: &mut Mutator<'_>, s: &mut FunctionBuilder) -> Result<(), CompileError> {
    let mut sum = FunctionBuilder::function(m, "sum", 0);
    let x = sum.name_constant(m, "x")?;
    let y = sum.name_constant(m, "y")?;
    sum.set_line(2);
    sum.get_local(0);
    sum.get_field(x);
    sum.get_local(0);
    sum.get_field(y);
    sum.emit(Op::Add);
    sum.emit(Op::Return);
    let sum = sum.finish(m);

    let point = s.name_constant(m, "Point")?;
    let x = s.name_constant(m, "x")?;
    let y = s.name_constant(m, "y")?;
    let sum_name = s.name_constant(m, "sum")?;
    let sum = s.add_constant(Value::Object(sum))?;
    s.set_line(1);
    s.struct_def(2, point);
    s.struct_field(x);
    s.struct_field(y);
    s.closure(sum, &[]);
    s.method(sum_name);
    s.define_global(point);
    Ok(())
}

fn point(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    let mut s = FunctionBuilder::script();
    define_point(m, &mut s)?;
    let point = s.name_constant(m, "Point")?;
    let p = s.name_constant(m, "p")?;
    let x = s.name_constant(m, "x")?;
    let sum = s.name_constant(m, "sum")?;
    s.set_line(4);
    s.get_global(point);
    s.emit_constant(Value::Int(10))?;
    s.emit_constant(Value::Int(20))?;
    s.call(2);
    s.define_global(p);
    s.set_line(5);
    s.get_global(p);
    s.get_field(x);
    s.emit(Op::Print);
    s.set_line(6);
    s.get_global(p);
    s.invoke(sum, 0);
    s.emit(Op::Print);
    s.set_line(7);
    s.get_global(p);
    s.emit(Op::Print);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

fn arrays(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    let mut s = FunctionBuilder::script();
    let a = s.name_constant(m, "a")?;
    let push = s.name_constant(m, "push")?;
    let pop = s.name_constant(m, "pop")?;
    let len = s.name_constant(m, "len")?;
    let three = s.add_constant(Value::Int(3))?;

    s.set_line(1);
    for i in 1..=3 {
        s.emit_constant(Value::Int(i))?;
    }
    s.array(3);
    s.define_global(a);
    s.set_line(2);
    s.get_global(push);
    s.get_global(a);
    s.emit_constant(Value::Int(4))?;
    s.call(2);
    s.emit(Op::Print);
    s.set_line(3);
    s.get_global(len);
    s.get_global(a);
    s.call(1);
    s.emit(Op::Print);
    s.set_line(4);
    s.get_global(pop);
    s.get_global(a);
    s.call(1);
    s.emit(Op::Print);
    s.set_line(5);
    s.get_global(a);
    s.emit(Op::Print);

    // total = 0; for (i = 0; i < 3; i++) total = total + a[i];
    s.set_line(6);
    s.emit_constant(Value::Int(0))?;
    s.emit_constant(Value::Int(0))?;
    let start = s.current_offset();
    s.less_local_const(2, three);
    let exit = s.jump_if_false();
    s.emit(Op::Pop);
    s.set_line(7);
    s.get_local(1);
    s.get_global(a);
    s.index_get_local(2);
    s.emit(Op::Add);
    s.set_local(1);
    s.emit(Op::Pop);
    s.inc_local(2);
    s.loop_to(start)?;
    s.bind(exit)?;
    s.emit(Op::Pop);
    s.set_line(8);
    s.get_local(1);
    s.emit(Op::Print);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

fn strings(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    let mut s = FunctionBuilder::script();
    let ab = Value::Object(m.intern("ab"));
    let c = Value::Object(m.intern("c"));
    let label = Value::Object(m.intern("n = "));
    let units = Value::Object(m.intern(" units"));
    let empty = Value::Object(m.intern(""));
    let chr = s.name_constant(m, "chr")?;
    let five = s.add_constant(Value::Int(5))?;
    let letter_a = s.add_constant(Value::Int(65))?;

    s.set_line(1);
    s.emit_constant(ab)?;
    s.emit_constant(c)?;
    s.emit(Op::Add);
    s.emit(Op::Print);
    s.set_line(2);
    s.emit_constant(label)?;
    s.emit_constant(Value::Int(42))?;
    s.emit(Op::Add);
    s.emit(Op::Print);
    s.set_line(3);
    s.emit_constant(Value::Float(1.5))?;
    s.emit_constant(units)?;
    s.emit(Op::Add);
    s.emit(Op::Print);

    // text = ""; for (i = 0; i < 5; i++) text = text + chr(65 + i);
    s.set_line(4);
    s.emit_constant(empty)?;
    s.emit_constant(Value::Int(0))?;
    let start = s.current_offset();
    s.less_local_const(2, five);
    let exit = s.jump_if_false();
    s.emit(Op::Pop);
    s.set_line(5);
    s.get_local(1);
    s.get_global(chr);
    s.add_local_const(2, letter_a);
    s.call(1);
    s.emit(Op::Add);
    s.set_local(1);
    s.emit(Op::Pop);
    s.inc_local(2);
    s.loop_to(start)?;
    s.bind(exit)?;
    s.emit(Op::Pop);
    s.set_line(6);
    s.get_local(1);
    s.emit(Op::Print);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

fn gc_churn(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    gc_churn_program(m, 200, 50)
}

/// `rounds` times, builds a linked list of `length` nodes and drops it.
/// Prints the number of rounds.
pub fn gc_churn_program(
    m: &mut Mutator<'_>,
    rounds: i64,
    length: i64,
) -> Result<ObjRef, CompileError> {
    let mut s = FunctionBuilder::script();
    let node = s.name_constant(m, "Node")?;
    let value = s.name_constant(m, "value")?;
    let next = s.name_constant(m, "next")?;
    let rounds = s.add_constant(Value::Int(rounds))?;
    let length = s.add_constant(Value::Int(length))?;

    s.set_line(1);
    s.struct_def(2, node);
    s.struct_field(value);
    s.struct_field(next);
    s.define_global(node);

    // slot 1: round
    s.set_line(2);
    s.emit_constant(Value::Int(0))?;
    let outer = s.current_offset();
    s.less_local_const(1, rounds);
    let outer_exit = s.jump_if_false();
    s.emit(Op::Pop);

    // slot 2: list, slot 3: i
    s.set_line(3);
    s.emit(Op::Nil);
    s.emit_constant(Value::Int(0))?;
    let inner = s.current_offset();
    s.less_local_const(3, length);
    let inner_exit = s.jump_if_false();
    s.emit(Op::Pop);
    s.set_line(4);
    s.get_global(node);
    s.get_local(3);
    s.get_local(2);
    s.call(2);
    s.set_local(2);
    s.emit(Op::Pop);
    s.inc_local(3);
    s.loop_to(inner)?;
    s.bind(inner_exit)?;
    s.emit(Op::Pop);
    s.emit(Op::Pop);
    s.emit(Op::Pop);

    s.inc_local(1);
    s.loop_to(outer)?;
    s.bind(outer_exit)?;
    s.emit(Op::Pop);
    s.set_line(6);
    s.get_local(1);
    s.emit(Op::Print);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

fn import(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    let mut s = FunctionBuilder::script();
    let path = s.name_constant(m, "math")?;
    let square = s.name_constant(m, "square")?;
    s.set_line(1);
    s.import(path);
    s.emit(Op::Pop);
    s.set_line(2);
    s.get_global(square);
    s.emit_constant(Value::Int(7))?;
    s.call(1);
    s.emit(Op::Print);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}

fn math_module(m: &mut Mutator<'_>) -> Result<ObjRef, CompileError> {
    let mut square = FunctionBuilder::function(m, "square", 1);
    square.set_line(1);
    square.get_local(1);
    square.get_local(1);
    square.emit(Op::MultiplyInt);
    square.emit(Op::Return);
    let square = square.finish(m);

    let mut s = FunctionBuilder::script();
    let name = s.name_constant(m, "square")?;
    let square = s.add_constant(Value::Object(square))?;
    s.set_line(1);
    s.closure(square, &[]);
    s.define_global(name);
    s.emit(Op::Nil);
    s.emit(Op::Return);
    Ok(s.finish(m))
}
