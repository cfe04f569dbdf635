//! Run with:
//!   cargo bench --bench vm_benchmark

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sharo::demos::{self, DemoFrontend};
use sharo::{CompileError, HeapSettings, Mutator, ObjRef, Output, VM, VMCreateInfo, Value};

/// A VM printing into a buffer, so terminal output does not dominate.
fn bench_vm(heap: HeapSettings) -> VM {
    let (output, _) = Output::captured();
    let mut vm = VM::new(VMCreateInfo {
        heap,
        output,
        ..Default::default()
    })
    .expect("valid settings");
    vm.define_core_natives();
    vm.set_frontend(Box::new(DemoFrontend));
    vm
}

/// Builds the program once and keeps it alive as a global between runs.
fn prepared(
    vm: &mut VM,
    build: impl FnOnce(&mut Mutator<'_>) -> Result<ObjRef, CompileError>,
) -> ObjRef {
    vm.mutate(|m| {
        let function = build(m).expect("compile");
        let name = m.intern("__bench");
        m.define_global(name, Value::Object(function));
        function
    })
}

fn bench_fib(c: &mut Criterion) {
    let mut vm = bench_vm(HeapSettings::default());
    let function = prepared(&mut vm, |m| demos::fib_program(m, 20));

    c.bench_function("fib 20", |b| {
        b.iter(|| black_box(vm.run(function).expect("run")))
    });
}

fn bench_gc_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc churn");
    for (label, threshold) in [("64 KiB", 64 * 1024), ("1 MiB", 1024 * 1024)] {
        let mut vm = bench_vm(HeapSettings {
            initial_threshold: threshold,
            min_threshold: threshold,
            ..Default::default()
        });
        let function = prepared(&mut vm, |m| demos::gc_churn_program(m, 100, 100));

        group.bench_function(label, |b| {
            b.iter(|| black_box(vm.run(function).expect("run")))
        });
    }
    group.finish();
}

fn bench_demos(c: &mut Criterion) {
    for name in ["strings", "point", "arrays", "counter"] {
        let mut vm = bench_vm(HeapSettings::default());
        let demo = demos::find(name).expect("demo");
        let function = prepared(&mut vm, demo.build);
        c.bench_function(name, |b| {
            b.iter(|| black_box(vm.run(function).expect("run")))
        });
    }
}

criterion_group!(benches, bench_fib, bench_gc_churn, bench_demos);
criterion_main!(benches);
