//! Arena heap with a non-moving mark-and-sweep collector.
//!
//! Objects live in a vector of slots addressed by [`ObjRef`]. A freed slot
//! bumps its generation and goes on a free list, so stale handles stop
//! resolving instead of aliasing the next occupant.
//!
//! Collection is only ever started from [`Heap::allocate`] (or explicitly via
//! [`Heap::collect`]); callers keep every value they still need reachable
//! from the [`RootProvider`] they pass in.
use std::mem;
use std::rc::Rc;

use log::{debug, trace};

use crate::{Header, InternedStrings, ObjRef, Object, ObjectType, VMString, Value, Visitable};

// ── Public API types ──────────────────────────────────────────────────

/// Consumers implement this to provide GC roots.
pub trait RootProvider {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(Value));
}

/// A root provider with no roots. Useful before a VM exists.
pub struct NoRoots;

impl RootProvider for NoRoots {
    fn visit_roots(&mut self, _visitor: &mut dyn FnMut(Value)) {}
}

// ── Heap settings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSettings {
    /// Allocated bytes before the first collection.
    pub initial_threshold: usize,
    /// The threshold never drops below this after a collection.
    pub min_threshold: usize,
    /// Next threshold = surviving bytes × factor.
    pub growth_factor: usize,
    /// Collect before every allocation.
    pub stress: bool,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            initial_threshold: 1024 * 1024, // 1 MB
            min_threshold: 1024 * 1024,
            growth_factor: 2,
            stress: false,
        }
    }
}

impl HeapSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.initial_threshold == 0 || self.min_threshold == 0 {
            return Err("thresholds must be > 0");
        }
        if self.growth_factor < 1 {
            return Err("growth_factor must be at least 1");
        }
        Ok(())
    }
}

// ── GC statistics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageCollectionStats {
    pub collections: u64,
    pub objects_freed: u64,
    pub bytes_freed: u64,
    /// Bytes that survived the most recent collection.
    pub last_live_bytes: usize,
}

// ── Heap ──────────────────────────────────────────────────────────────

struct HeapEntry {
    header: Header,
    object: Object,
}

struct Slot {
    generation: u32,
    entry: Option<HeapEntry>,
}

pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    strings: InternedStrings,
    bytes_allocated: usize,
    next_gc: usize,
    live_objects: usize,
    settings: HeapSettings,
    stats: GarbageCollectionStats,
    gray: Vec<ObjRef>,
}

impl Heap {
    pub fn new(settings: HeapSettings) -> Result<Self, &'static str> {
        settings.validate()?;
        Ok(Self {
            slots: Vec::new(),
            free: Vec::new(),
            strings: InternedStrings::new(),
            bytes_allocated: 0,
            next_gc: settings.initial_threshold,
            live_objects: 0,
            settings,
            stats: GarbageCollectionStats::default(),
            gray: Vec::new(),
        })
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    #[inline]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    #[inline]
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live_objects
    }

    pub fn stats(&self) -> &GarbageCollectionStats {
        &self.stats
    }

    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    // ── Allocation ────────────────────────────────────────────────────

    /// Move `object` onto the heap, collecting first if the threshold has
    /// been crossed. `object` itself is not yet reachable during that
    /// collection, so everything it references must be reachable from
    /// `roots`.
    pub fn allocate(&mut self, object: Object, roots: &mut dyn RootProvider) -> ObjRef {
        if self.settings.stress || self.bytes_allocated > self.next_gc {
            self.collect(roots);
        }
        self.insert(object)
    }

    fn insert(&mut self, object: Object) -> ObjRef {
        let size = object.allocation_size();
        let header = Header::new(object.object_type(), size);
        let entry = Some(HeapEntry { header, object });

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = entry;
                ObjRef::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry,
                });
                ObjRef::new(index, 0)
            }
        };

        self.bytes_allocated += size;
        self.live_objects += 1;
        handle
    }

    /// The canonical string for `bytes`, allocating it on first use.
    pub fn intern(&mut self, bytes: &[u8], roots: &mut dyn RootProvider) -> ObjRef {
        if let Some(existing) = self.strings.get(bytes) {
            return existing;
        }
        self.intern_new(Rc::from(bytes), roots)
    }

    /// Like [`intern`](Self::intern) but reuses an owned buffer.
    pub fn intern_owned(&mut self, bytes: Vec<u8>, roots: &mut dyn RootProvider) -> ObjRef {
        if let Some(existing) = self.strings.get(&bytes) {
            return existing;
        }
        self.intern_new(Rc::from(bytes), roots)
    }

    fn intern_new(&mut self, bytes: Rc<[u8]>, roots: &mut dyn RootProvider) -> ObjRef {
        let string = self.allocate(Object::String(VMString::new(bytes.clone())), roots);
        self.strings.insert(bytes, string);
        string
    }

    /// Look up an already interned string without allocating.
    pub fn find_interned(&self, bytes: &[u8]) -> Option<ObjRef> {
        self.strings.get(bytes)
    }

    // ── Access ────────────────────────────────────────────────────────

    #[inline]
    fn entry(&self, object: ObjRef) -> Option<&HeapEntry> {
        let slot = self.slots.get(object.index())?;
        if slot.generation != object.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    #[inline]
    fn entry_mut(&mut self, object: ObjRef) -> Option<&mut HeapEntry> {
        let slot = self.slots.get_mut(object.index())?;
        if slot.generation != object.generation() {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Whether `object` still refers to a live allocation.
    #[inline]
    pub fn is_live(&self, object: ObjRef) -> bool {
        self.entry(object).is_some()
    }

    #[inline]
    pub fn try_get(&self, object: ObjRef) -> Option<&Object> {
        self.entry(object).map(|entry| &entry.object)
    }

    /// # Panics
    ///
    /// When `object` has been swept. Reachable values never are, so this
    /// indicates a missing root.
    #[inline]
    pub fn get(&self, object: ObjRef) -> &Object {
        match self.entry(object) {
            Some(entry) => &entry.object,
            None => panic!("dangling object reference {object:?}"),
        }
    }

    /// # Panics
    ///
    /// When `object` has been swept, see [`get`](Self::get).
    #[inline]
    pub fn get_mut(&mut self, object: ObjRef) -> &mut Object {
        match self.entry_mut(object) {
            Some(entry) => &mut entry.object,
            None => panic!("dangling object reference {object:?}"),
        }
    }

    pub fn header(&self, object: ObjRef) -> Option<&Header> {
        self.entry(object).map(|entry| &entry.header)
    }

    /// Mutate an object in place and re-account its size, for objects that
    /// own growable buffers.
    pub fn update<R>(&mut self, object: ObjRef, f: impl FnOnce(&mut Object) -> R) -> R {
        let Some(entry) = self.entry_mut(object) else {
            panic!("dangling object reference {object:?}");
        };
        let result = f(&mut entry.object);
        let old_size = entry.header.size();
        let new_size = entry.object.allocation_size();
        entry.header.set_size(new_size);
        self.bytes_allocated = self.bytes_allocated - old_size + new_size;
        result
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjRef, &Object)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let entry = slot.entry.as_ref()?;
            Some((ObjRef::new(index as u32, slot.generation), &entry.object))
        })
    }

    pub fn count_of(&self, object_type: ObjectType) -> usize {
        self.objects()
            .filter(|(_, object)| object.object_type() == object_type)
            .count()
    }

    // ── Collection ────────────────────────────────────────────────────

    pub fn collect(&mut self, roots: &mut dyn RootProvider) {
        let before = self.bytes_allocated;
        debug!(
            "gc begin: {} bytes in {} objects (threshold {})",
            before, self.live_objects, self.next_gc
        );

        self.mark_roots(roots);
        self.trace_references();
        let (objects_freed, bytes_freed) = self.sweep();

        self.next_gc = self
            .bytes_allocated
            .saturating_mul(self.settings.growth_factor)
            .max(self.settings.min_threshold);

        self.stats.collections += 1;
        self.stats.objects_freed += objects_freed as u64;
        self.stats.bytes_freed += bytes_freed as u64;
        self.stats.last_live_bytes = self.bytes_allocated;

        debug!(
            "gc end: freed {} objects, {} -> {} bytes, next at {}",
            objects_freed, before, self.bytes_allocated, self.next_gc
        );
    }

    fn mark_roots(&mut self, roots: &mut dyn RootProvider) {
        let gray = &mut self.gray;
        roots.visit_roots(&mut |value| {
            if let Value::Object(object) = value {
                gray.push(object);
            }
        });
    }

    fn trace_references(&mut self) {
        let mut gray = mem::take(&mut self.gray);
        while let Some(object) = gray.pop() {
            let Some(entry) = self.entry_mut(object) else {
                debug_assert!(false, "root or edge to swept object {object:?}");
                continue;
            };
            if entry.header.is_marked() {
                continue;
            }
            entry.header.mark();
            entry.object.visit_edges(&mut |child: ObjRef| gray.push(child));
        }
        self.gray = gray;
    }

    fn sweep(&mut self) -> (usize, usize) {
        let mut objects_freed = 0;
        let mut bytes_freed = 0;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = &mut slot.entry else {
                continue;
            };
            if entry.header.is_marked() {
                entry.header.unmark();
                continue;
            }

            if let Object::String(string) = &entry.object {
                self.strings
                    .prune(string.as_bytes(), ObjRef::new(index as u32, slot.generation));
            }
            trace!("free #{index} {}", entry.header.object_type().name());

            objects_freed += 1;
            bytes_freed += entry.header.size();
            slot.entry = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }

        self.bytes_allocated -= bytes_freed;
        self.live_objects -= objects_freed;
        (objects_freed, bytes_freed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
