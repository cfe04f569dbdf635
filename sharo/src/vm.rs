use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::Arc;

use ahash::RandomState;
use bytecode::Capture;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::format::{self, format_value};
use crate::{
    Array, CallStack, Closure, CompileError, ConfigError, Heap, HeapSettings, InterpretError,
    Native, NativeFn, ObjRef, Object, RootProvider, RuntimeError, RuntimeFault, Stack, TraceFrame,
    VMString, Value,
};

pub type Globals = HashMap<ObjRef, Value, RandomState>;

/// Where `PRINT` writes.
#[derive(Debug, Clone, Default)]
pub enum Output {
    #[default]
    Stdout,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl Output {
    /// A buffer sink plus a handle to read it back.
    pub fn captured() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (Output::Buffer(buffer.clone()), buffer)
    }

    pub fn write_line(&self, text: &str) {
        match self {
            Output::Stdout => {
                let mut out = io::stdout().lock();
                if let Err(err) = writeln!(out, "{text}") {
                    warn!("print failed: {err}");
                }
            }
            Output::Buffer(buffer) => {
                let mut buffer = buffer.lock();
                buffer.extend_from_slice(text.as_bytes());
                buffer.push(b'\n');
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct VMCreateInfo {
    pub heap: HeapSettings,
    /// Maximum call depth.
    pub max_frames: usize,
    /// Operand stack slots budgeted per frame.
    pub stack_slots_per_frame: usize,
    pub output: Output,
}

impl Default for VMCreateInfo {
    fn default() -> Self {
        Self {
            heap: HeapSettings::default(),
            max_frames: 64,
            stack_slots_per_frame: 256,
            output: Output::Stdout,
        }
    }
}

/// Turns source text into function prototypes. The VM only ever sees the
/// result.
pub trait Frontend {
    /// Compile `source` to a top-level function taking no arguments.
    /// Everything allocated through `mutator` stays rooted until the call
    /// returns.
    fn compile(&mut self, mutator: &mut Mutator<'_>, source: &str)
    -> Result<ObjRef, CompileError>;

    /// Source text for an `IMPORT` path, `None` if there is no such module.
    fn load_module(&mut self, _path: &str) -> Option<String> {
        None
    }
}

/// Everything the collector treats as live.
pub struct Roots {
    pub(crate) stack: Stack,
    pub(crate) frames: CallStack,
    /// Head of the open upvalue chain.
    pub(crate) open_upvalues: Option<ObjRef>,
    pub(crate) globals: Globals,
    /// Values protected by live [`Mutator`] scopes.
    pub(crate) temporaries: Vec<Value>,
}

impl Roots {
    fn new(stack_limit: usize, max_frames: usize) -> Self {
        Self {
            stack: Stack::new(stack_limit),
            frames: CallStack::new(max_frames),
            open_upvalues: None,
            globals: Globals::default(),
            temporaries: Vec::new(),
        }
    }

    /// Forget all execution state. Globals survive.
    pub(crate) fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
    }
}

impl RootProvider for Roots {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(Value)) {
        for value in self.stack.as_slice() {
            visitor(*value);
        }
        for frame in self.frames.iter() {
            visitor(Value::Object(frame.closure));
            visitor(Value::Object(frame.function));
        }
        if let Some(head) = self.open_upvalues {
            visitor(Value::Object(head));
        }
        for (name, value) in &self.globals {
            visitor(Value::Object(*name));
            visitor(*value);
        }
        for value in &self.temporaries {
            visitor(*value);
        }
    }
}

/// An allocation scope.
///
/// Every object allocated or interned through a `Mutator` stays rooted
/// until the `Mutator` is dropped, so hosts and natives can build object
/// graphs without pushing partial results anywhere.
pub struct Mutator<'a> {
    heap: &'a mut Heap,
    roots: &'a mut Roots,
    scope_base: usize,
}

impl<'a> Mutator<'a> {
    pub(crate) fn new(heap: &'a mut Heap, roots: &'a mut Roots) -> Self {
        let scope_base = roots.temporaries.len();
        Self {
            heap,
            roots,
            scope_base,
        }
    }

    pub fn heap(&self) -> &Heap {
        self.heap
    }

    pub fn allocate(&mut self, object: Object) -> ObjRef {
        let object = self.heap.allocate(object, &mut *self.roots);
        self.roots.temporaries.push(Value::Object(object));
        object
    }

    pub fn intern(&mut self, bytes: impl AsRef<[u8]>) -> ObjRef {
        let string = self.heap.intern(bytes.as_ref(), &mut *self.roots);
        self.roots.temporaries.push(Value::Object(string));
        string
    }

    pub fn intern_owned(&mut self, bytes: Vec<u8>) -> ObjRef {
        let string = self.heap.intern_owned(bytes, &mut *self.roots);
        self.roots.temporaries.push(Value::Object(string));
        string
    }

    /// Keep `value` alive for the rest of this scope.
    pub fn protect(&mut self, value: Value) {
        self.roots.temporaries.push(value);
    }

    #[inline]
    pub fn get(&self, object: ObjRef) -> &Object {
        self.heap.get(object)
    }

    #[inline]
    pub fn try_get(&self, object: ObjRef) -> Option<&Object> {
        self.heap.try_get(object)
    }

    /// See [`Heap::update`].
    pub fn update<R>(&mut self, object: ObjRef, f: impl FnOnce(&mut Object) -> R) -> R {
        self.heap.update(object, f)
    }

    pub fn string(&self, value: Value) -> Option<&VMString> {
        self.heap.try_get(value.as_object()?)?.as_string()
    }

    pub fn array(&self, value: Value) -> Option<&Array> {
        self.heap.try_get(value.as_object()?)?.as_array()
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        let name = self.heap.find_interned(name.as_bytes())?;
        self.roots.globals.get(&name).copied()
    }

    pub fn define_global(&mut self, name: ObjRef, value: Value) {
        self.roots.globals.insert(name, value);
    }

    pub fn format(&self, value: Value) -> String {
        format_value(self.heap, value)
    }

    pub fn collect_garbage(&mut self) {
        self.heap.collect(&mut *self.roots);
    }
}

impl Drop for Mutator<'_> {
    fn drop(&mut self) {
        self.roots.temporaries.truncate(self.scope_base);
    }
}

pub struct VM {
    pub(crate) heap: Heap,
    pub(crate) roots: Roots,
    pub(crate) frontend: Option<Box<dyn Frontend>>,
    pub(crate) output: Output,
    /// Scratch buffers reused across instructions.
    pub(crate) native_args: Vec<Value>,
    pub(crate) captures: Vec<Capture>,
}

impl VM {
    pub fn new(info: VMCreateInfo) -> Result<Self, ConfigError> {
        let heap = Heap::new(info.heap).map_err(ConfigError::Heap)?;
        if info.max_frames == 0 {
            return Err(ConfigError::Stack("max_frames must be > 0"));
        }
        if info.stack_slots_per_frame == 0 {
            return Err(ConfigError::Stack("stack_slots_per_frame must be > 0"));
        }
        let stack_limit = info
            .max_frames
            .checked_mul(info.stack_slots_per_frame)
            .ok_or(ConfigError::Stack("stack size overflows"))?;

        debug!(
            "vm created: {} frames, {} stack slots, gc threshold {}",
            info.max_frames, stack_limit, info.heap.initial_threshold
        );

        Ok(Self {
            heap,
            roots: Roots::new(stack_limit, info.max_frames),
            frontend: None,
            output: info.output,
            native_args: Vec::new(),
            captures: Vec::new(),
        })
    }

    pub fn set_frontend(&mut self, frontend: Box<dyn Frontend>) {
        self.frontend = Some(frontend);
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Operand stack depth. Zero whenever the VM is idle.
    pub fn stack_depth(&self) -> usize {
        self.roots.stack.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.roots.frames.len()
    }

    /// Run `f` with an allocation scope.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Mutator<'_>) -> R) -> R {
        let mut mutator = Mutator::new(&mut self.heap, &mut self.roots);
        f(&mut mutator)
    }

    pub fn collect_garbage(&mut self) {
        self.heap.collect(&mut self.roots);
    }

    pub fn format_value(&self, value: Value) -> String {
        format_value(&self.heap, value)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        let name = self.heap.find_interned(name.as_bytes())?;
        self.roots.globals.get(&name).copied()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.mutate(|m| {
            m.protect(value);
            let name = m.intern(name);
            m.define_global(name, value);
        });
    }

    /// Register a host function as the global `name`.
    pub fn define_native(
        &mut self,
        name: &str,
        function: impl Fn(&mut Mutator<'_>, &[Value]) -> Value + 'static,
    ) {
        let function: NativeFn = Rc::new(function);
        self.mutate(|m| {
            let global = m.intern(name);
            let native = m.allocate(Object::Native(Native::new(name, function)));
            m.define_global(global, Value::Object(native));
        });
    }

    /// Compile `source` with the installed [`Frontend`] and run it.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        let function = self.compile(source)?;
        self.run(function)
    }

    pub fn compile(&mut self, source: &str) -> Result<ObjRef, CompileError> {
        let Some(frontend) = self.frontend.as_mut() else {
            return Err(CompileError::new("no frontend installed"));
        };
        let mut mutator = Mutator::new(&mut self.heap, &mut self.roots);
        frontend.compile(&mut mutator, source)
    }

    /// Run a compiled top-level function until it returns. A fault leaves
    /// the VM idle with its globals intact.
    pub fn run(&mut self, function: ObjRef) -> Result<Value, InterpretError> {
        debug!("run {}", format_value(&self.heap, Value::Object(function)));
        let entry = self.roots.frames.len();
        let result = self
            .call_function(function)
            .and_then(|()| self.execute(entry));
        match result {
            Ok(value) => Ok(value),
            Err(error) => Err(InterpretError::Runtime(self.fault(error))),
        }
    }

    /// Wrap a function prototype in a closure and call it with no
    /// arguments.
    pub(crate) fn call_function(&mut self, function: ObjRef) -> Result<(), RuntimeError> {
        if !matches!(self.heap.try_get(function), Some(Object::Function(_))) {
            return Err(RuntimeError::NotCallable);
        }
        self.roots.stack.push(Value::Object(function))?;
        let closure = self.allocate(Object::Closure(Closure {
            function,
            upvalues: Box::new([]),
        }));
        let slot = self.roots.stack.len() - 1;
        self.roots.stack.set(slot, Value::Object(closure))?;
        self.call_closure(closure, 0)
    }

    /// Attach the active frames to `error` and reset execution state.
    fn fault(&mut self, error: RuntimeError) -> RuntimeFault {
        let trace = self
            .roots
            .frames
            .iter()
            .map(|frame| {
                let line = self
                    .heap
                    .try_get(frame.function)
                    .and_then(Object::as_function)
                    .and_then(|f| f.chunk.line_for(frame.ip.saturating_sub(1)))
                    .unwrap_or(0);
                TraceFrame {
                    line,
                    function: format::function_name(&self.heap, frame.function),
                }
            })
            .collect();
        debug!("runtime fault: {error}");
        self.roots.reset();
        RuntimeFault { error, trace }
    }

    #[inline]
    pub(crate) fn allocate(&mut self, object: Object) -> ObjRef {
        self.heap.allocate(object, &mut self.roots)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_vm() -> VM {
        VM::new(VMCreateInfo::default()).unwrap()
    }

    #[test]
    fn rejects_bad_settings() {
        let info = VMCreateInfo {
            max_frames: 0,
            ..Default::default()
        };
        assert!(matches!(VM::new(info), Err(ConfigError::Stack(_))));

        let info = VMCreateInfo {
            heap: HeapSettings {
                growth_factor: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(VM::new(info), Err(ConfigError::Heap(_))));
    }

    #[test]
    fn mutator_scope_protects_until_dropped() {
        let mut vm = test_vm();
        let array = vm.mutate(|m| {
            let array = m.allocate(Object::Array(Array::default()));
            m.collect_garbage();
            assert!(m.try_get(array).is_some());
            array
        });
        vm.collect_garbage();
        assert!(!vm.heap().is_live(array));
    }

    #[test]
    fn globals_are_roots() {
        let mut vm = test_vm();
        let array = vm.mutate(|m| m.allocate(Object::Array(Array::default())));
        vm.set_global("keep", Value::Object(array));
        vm.collect_garbage();
        assert!(vm.heap().is_live(array));
        assert_eq!(vm.global("keep"), Some(Value::Object(array)));
        assert_eq!(vm.global("missing"), None);
    }

    #[test]
    fn natives_are_globals() {
        let mut vm = test_vm();
        vm.define_native("answer", |_, _| Value::Int(42));
        let native = vm.global("answer").and_then(|v| v.as_object()).unwrap();
        assert_eq!(vm.format_value(Value::Object(native)), "<native fn>");
        assert_eq!(vm.heap().get(native).as_native().unwrap().name(), "answer");
    }

    #[test]
    fn interpret_without_frontend_is_compile_error() {
        let mut vm = test_vm();
        assert!(matches!(vm.interpret("1"), Err(InterpretError::Compile(_))));
    }

    #[test]
    fn captured_output() {
        let (output, buffer) = Output::captured();
        output.write_line("hello");
        output.write_line("world");
        assert_eq!(&*buffer.lock(), b"hello\nworld\n");
    }
}
