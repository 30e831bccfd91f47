//! The heap context.
//!
//! One `Heap` owns the object collector, the string intern table, the
//! allocator and every flag the collector and the property engine consult.
//! Handles are cheap to clone; all clones refer to the same heap.

use crate::config::HeapConfig;
use crate::error::{ErrorKind, JsError};
use crate::gc::{Collector, GcStats};
use crate::memory::{AllocatorRef, DefaultAllocator, MemBlock};
use crate::object::store::{self, PropPart, PropValue, StrPart};
use crate::object::{
    ArgumentsData, BoundFunction, ElementType, Environment, HObject, NativeFunction, ObjRef,
    ObjectClass, ProxyData, TypedArrayView, attrs,
};
use crate::prelude::*;
use crate::string_dict::{COMMON_STRINGS, StringDict};
use crate::thread::Thread;
use crate::value::{HBuffer, HSTRING_HEADER_SIZE, HString, Value};

// ============================================================================
// Mark-and-sweep flags
// ============================================================================

/// Flags of one mark-and-sweep pass.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct MsFlags(u8);

impl MsFlags {
    /// Last-resort pass from the allocator retry loop
    pub const EMERGENCY: MsFlags = MsFlags(1 << 0);
    pub const NO_STRINGTABLE_RESIZE: MsFlags = MsFlags(1 << 1);
    pub const NO_FINALIZERS: MsFlags = MsFlags(1 << 2);
    pub const NO_OBJECT_COMPACTION: MsFlags = MsFlags(1 << 3);

    pub const fn empty() -> Self {
        MsFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: MsFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: MsFlags) -> Self {
        MsFlags(self.0 | other.0)
    }
}

impl core::ops::BitOr for MsFlags {
    type Output = MsFlags;

    fn bitor(self, rhs: MsFlags) -> MsFlags {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for MsFlags {
    fn bitor_assign(&mut self, rhs: MsFlags) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for MsFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (MsFlags::EMERGENCY, "EMERGENCY"),
            (MsFlags::NO_STRINGTABLE_RESIZE, "NO_STRINGTABLE_RESIZE"),
            (MsFlags::NO_FINALIZERS, "NO_FINALIZERS"),
            (MsFlags::NO_OBJECT_COMPACTION, "NO_OBJECT_COMPACTION"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("MsFlags(empty)")
        } else {
            write!(f, "MsFlags({})", set.join(" | "))
        }
    }
}

// ============================================================================
// Heap
// ============================================================================

/// Built-in objects every heap starts with.
struct Builtins {
    object_prototype: ObjRef,
    array_prototype: ObjRef,
    function_prototype: ObjRef,
    error_prototype: ObjRef,
    /// Pre-built error returned on a double fault
    double_error: ObjRef,
}

struct HeapInner {
    /// All heap objects
    objects: Collector<HObject>,
    /// Intern table
    strings: Rc<RefCell<StringDict>>,
    allocator: AllocatorRef,
    config: HeapConfig,

    // ═══════════════════════════════════════════════════════════════
    // Collector state
    // ═══════════════════════════════════════════════════════════════
    /// Voluntary GC countdown; a pass runs when it drops below zero
    ms_trigger: Cell<i64>,
    /// OR'd into the flags of every pass (critical sections add to it)
    ms_base_flags: Cell<MsFlags>,
    /// Nonzero while finalizers must not run (or are running)
    pf_prevent_count: Cell<u32>,
    /// Completed passes
    ms_count: Cell<u64>,

    // ═══════════════════════════════════════════════════════════════
    // Error handling
    // ═══════════════════════════════════════════════════════════════
    /// Nesting depth of error object creation
    creating_error: Cell<u32>,

    symbol_serial: Cell<u32>,
    builtins: Builtins,
}

/// Handle to a heap.
#[derive(Clone)]
pub struct Heap {
    inner: Rc<HeapInner>,
}

/// Guard returned by [`Heap::start_critical`]: no finalizers and no object
/// compaction until it is dropped.
pub struct CriticalSection<'a> {
    heap: &'a Heap,
    saved_flags: MsFlags,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        let inner = &self.heap.inner;
        inner.ms_base_flags.set(self.saved_flags);
        inner
            .pf_prevent_count
            .set(inner.pf_prevent_count.get().saturating_sub(1));
    }
}

/// Object allocated before the heap handle exists (unaccounted).
fn bootstrap_object(objects: &Collector<HObject>, class: ObjectClass, proto: Option<&ObjRef>) -> ObjRef {
    objects.alloc(HObject::new(class, proto.cloned(), MemBlock::empty()))
}

fn bootstrap_string(strings: &Rc<RefCell<StringDict>>, text: &str) -> HString {
    let weak = Rc::downgrade(strings);
    let s = strings
        .borrow_mut()
        .get_or_insert(text, MemBlock::empty(), weak);
    strings.borrow_mut().pin(s.clone());
    s
}

impl Heap {
    /// Heap with default configuration and an allocator that never refuses.
    pub fn new() -> Self {
        let allocator: AllocatorRef = Rc::new(RefCell::new(DefaultAllocator::default()));
        Self::build(HeapConfig::default(), allocator)
    }

    pub fn with_config(config: HeapConfig, allocator: AllocatorRef) -> Self {
        Self::build(config, allocator)
    }

    fn build(config: HeapConfig, allocator: AllocatorRef) -> Self {
        let objects: Collector<HObject> = Collector::new();
        let strings = Rc::new(RefCell::new(StringDict::new()));
        for text in COMMON_STRINGS {
            bootstrap_string(&strings, text);
        }

        let object_prototype = bootstrap_object(&objects, ObjectClass::Object, None);
        let array_prototype = bootstrap_object(&objects, ObjectClass::Object, Some(&object_prototype));
        let function_prototype =
            bootstrap_object(&objects, ObjectClass::Object, Some(&object_prototype));
        let error_prototype = bootstrap_object(&objects, ObjectClass::Object, Some(&object_prototype));
        let double_error = bootstrap_object(&objects, ObjectClass::Error, Some(&error_prototype));
        {
            let message = bootstrap_string(&strings, "message");
            let text = bootstrap_string(&strings, "error in error handling");
            let mut o = double_error.borrow_mut();
            let part: &mut PropPart<HString> = &mut o.strprops;
            part.rebuild(1, 0);
            part.push_entry(message, PropValue::Data(Value::String(text)), attrs::WC);
        }

        let trigger = if config.voluntary_gc {
            i64::from(config.gc_trigger_add)
        } else {
            i64::MAX
        };
        log::debug!("heap: created (voluntary gc {})", config.voluntary_gc);
        Heap {
            inner: Rc::new(HeapInner {
                objects,
                strings,
                allocator,
                config,
                ms_trigger: Cell::new(trigger),
                ms_base_flags: Cell::new(MsFlags::empty()),
                pf_prevent_count: Cell::new(0),
                ms_count: Cell::new(0),
                creating_error: Cell::new(0),
                symbol_serial: Cell::new(0),
                builtins: Builtins {
                    object_prototype,
                    array_prototype,
                    function_prototype,
                    error_prototype,
                    double_error,
                },
            }),
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.inner.config
    }

    pub fn allocator(&self) -> &AllocatorRef {
        &self.inner.allocator
    }

    pub fn ptr_eq(a: &Heap, b: &Heap) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn object_prototype(&self) -> &ObjRef {
        &self.inner.builtins.object_prototype
    }

    pub fn array_prototype(&self) -> &ObjRef {
        &self.inner.builtins.array_prototype
    }

    pub fn function_prototype(&self) -> &ObjRef {
        &self.inner.builtins.function_prototype
    }

    pub fn error_prototype(&self) -> &ObjRef {
        &self.inner.builtins.error_prototype
    }

    /// The pre-built error object used on a double fault.
    pub fn double_error(&self) -> &ObjRef {
        &self.inner.builtins.double_error
    }

    // ═══════════════════════════════════════════════════════════════
    // Collector
    // ═══════════════════════════════════════════════════════════════

    pub fn gc_running(&self) -> bool {
        self.inner.objects.is_running()
    }

    pub fn gc_stats(&self) -> GcStats {
        self.inner.objects.stats()
    }

    /// Number of completed mark-and-sweep passes.
    pub fn ms_count(&self) -> u64 {
        self.inner.ms_count.get()
    }

    /// Current voluntary GC countdown.
    pub fn ms_trigger(&self) -> i64 {
        self.inner.ms_trigger.get()
    }

    pub fn ms_base_flags(&self) -> MsFlags {
        self.inner.ms_base_flags.get()
    }

    /// Number of interned strings.
    pub fn string_count(&self) -> usize {
        self.inner.strings.try_borrow().map(|d| d.len()).unwrap_or(0)
    }

    /// Enter a GC critical section: passes started inside it neither run
    /// finalizers nor compact objects.
    pub fn start_critical(&self) -> CriticalSection<'_> {
        let inner = &self.inner;
        let saved_flags = inner.ms_base_flags.get();
        inner
            .ms_base_flags
            .set(saved_flags | MsFlags::NO_OBJECT_COMPACTION);
        inner.pf_prevent_count.set(inner.pf_prevent_count.get() + 1);
        CriticalSection {
            heap: self,
            saved_flags,
        }
    }

    /// Count one allocation against the voluntary GC trigger.
    pub(crate) fn voluntary_gc_tick(&self) {
        if !self.inner.config.voluntary_gc {
            return;
        }
        let trigger = self.inner.ms_trigger.get() - 1;
        self.inner.ms_trigger.set(trigger);
        if trigger < 0 {
            log::debug!("gc: voluntary mark-and-sweep");
            self.mark_and_sweep(MsFlags::empty());
        }
    }

    /// Run one mark-and-sweep pass. Returns false when the pass was skipped
    /// because another one is running or collection is prevented.
    pub fn mark_and_sweep(&self, flags: MsFlags) -> bool {
        let inner = &self.inner;
        if !inner.objects.begin_collection() {
            log::debug!("gc: mark-and-sweep skipped (running or prevented)");
            inner
                .ms_trigger
                .set(i64::from(inner.config.gc_trigger_skip));
            return false;
        }
        let flags = flags | inner.ms_base_flags.get();
        log::debug!("gc: mark-and-sweep start, flags {:?}", flags);

        let stats = inner.objects.mark_and_sweep();

        let strings_live = match inner.strings.try_borrow_mut() {
            Ok(mut dict) => {
                let live = dict.sweep();
                if flags.contains(MsFlags::EMERGENCY)
                    && !flags.contains(MsFlags::NO_STRINGTABLE_RESIZE)
                {
                    dict.shrink();
                }
                live
            }
            Err(_) => 0,
        };

        if flags.contains(MsFlags::EMERGENCY) && !flags.contains(MsFlags::NO_OBJECT_COMPACTION) {
            self.compact_all();
        }

        inner.objects.end_collection();
        inner.ms_count.set(inner.ms_count.get() + 1);
        inner
            .ms_trigger
            .set(inner.config.next_trigger(stats.kept + strings_live));
        log::debug!(
            "gc: mark-and-sweep done: kept {}, freed {}, finalizable {}, strings {}",
            stats.kept,
            stats.freed,
            stats.finalizable,
            strings_live
        );

        if !flags.contains(MsFlags::NO_FINALIZERS) {
            self.process_finalizers();
        }
        true
    }

    /// Emergency compaction of every live object; failures are skipped.
    fn compact_all(&self) {
        let mut compacted = 0usize;
        for obj in self.inner.objects.live_objects() {
            match store::compact(self, &obj) {
                Ok(()) => compacted += 1,
                Err(err) => log::trace!("gc: compaction of object {} skipped: {}", obj.id(), err),
            }
        }
        log::debug!("gc: emergency compaction of {} objects", compacted);
    }

    /// Run finalizers of objects queued by reference counting or
    /// mark-and-sweep. No-op while finalizers are prevented.
    pub fn process_finalizers(&self) {
        let inner = &self.inner;
        if inner.pf_prevent_count.get() > 0 {
            return;
        }
        inner.pf_prevent_count.set(inner.pf_prevent_count.get() + 1);
        loop {
            let pending = inner.objects.take_finalize_list();
            if pending.is_empty() {
                break;
            }
            log::debug!("gc: running {} finalizers", pending.len());
            for obj in pending {
                self.run_finalizer(&obj, false);
            }
        }
        inner
            .pf_prevent_count
            .set(inner.pf_prevent_count.get().saturating_sub(1));
    }

    fn run_finalizer(&self, obj: &ObjRef, heap_destruct: bool) {
        let finalizer = match obj.try_borrow() {
            Some(o) => o.finalizer.clone(),
            None => return,
        };
        let Some(finalizer) = finalizer else {
            return;
        };
        let mut thread = Thread::new(self.clone());
        let args = [Value::Object(obj.clone()), Value::Boolean(heap_destruct)];
        if let Err(err) = thread.call(&Value::Object(finalizer), &Value::Undefined, &args) {
            log::warn!("gc: finalizer of object {} failed: {}", obj.id(), err);
        }
    }

    /// Tear the heap down: collect, then run every finalizer that has not run
    /// yet with `heap_destruct = true`.
    pub fn destroy(self) {
        self.mark_and_sweep(MsFlags::empty());
        let inner = &self.inner;
        inner.pf_prevent_count.set(inner.pf_prevent_count.get() + 1);
        // Finalizers may create more finalizable objects; bound the rounds.
        for _ in 0..8 {
            let mut pending = inner.objects.take_finalize_list();
            for obj in inner.objects.live_objects() {
                if !obj.is_finalized() && obj.try_borrow().is_some_and(|o| o.finalizer.is_some()) {
                    pending.push(obj);
                }
            }
            if pending.is_empty() {
                break;
            }
            for obj in &pending {
                let finalizer = obj.try_borrow_mut().and_then(|mut o| o.finalizer.take());
                if let Some(finalizer) = finalizer {
                    let mut thread = Thread::new(self.clone());
                    let args = [Value::Object(obj.clone()), Value::Boolean(true)];
                    if let Err(err) =
                        thread.call(&Value::Object(finalizer), &Value::Undefined, &args)
                    {
                        log::warn!("gc: finalizer of object {} failed: {}", obj.id(), err);
                    }
                }
            }
        }
        log::debug!("heap: destroyed after {} passes", inner.ms_count.get());
    }

    // ═══════════════════════════════════════════════════════════════
    // Error state
    // ═══════════════════════════════════════════════════════════════

    pub(crate) fn creating_error(&self) -> bool {
        self.inner.creating_error.get() > 0
    }

    pub(crate) fn enter_error_creation(&self) {
        self.inner
            .creating_error
            .set(self.inner.creating_error.get() + 1);
    }

    pub(crate) fn leave_error_creation(&self) {
        self.inner
            .creating_error
            .set(self.inner.creating_error.get().saturating_sub(1));
    }

    // ═══════════════════════════════════════════════════════════════
    // Strings and buffers
    // ═══════════════════════════════════════════════════════════════

    /// Intern `text`.
    pub fn intern(&self, text: &str) -> Result<HString, JsError> {
        if let Some(existing) = self
            .inner
            .strings
            .try_borrow()
            .ok()
            .and_then(|d| d.get(text))
        {
            return Ok(existing);
        }
        let block = self.mem_alloc_checked(text.len() + HSTRING_HEADER_SIZE)?;
        let weak = Rc::downgrade(&self.inner.strings);
        let mut dict = self
            .inner
            .strings
            .try_borrow_mut()
            .map_err(|_| JsError::internal_error("string table busy"))?;
        Ok(dict.get_or_insert(text, block, weak))
    }

    /// Create a new symbol; hidden symbols are skipped by key enumeration.
    pub fn new_symbol(&self, description: &str, hidden: bool) -> Result<HString, JsError> {
        let block = self.mem_alloc_checked(description.len() + HSTRING_HEADER_SIZE)?;
        let serial = self.inner.symbol_serial.get().wrapping_add(1);
        self.inner.symbol_serial.set(serial);
        Ok(HString::new_symbol(description, hidden, block, serial))
    }

    pub fn alloc_buffer(&self, bytes: Vec<u8>) -> Result<HBuffer, JsError> {
        let block = self.mem_alloc_checked(bytes.len())?;
        Ok(HBuffer::new(bytes, block))
    }

    // ═══════════════════════════════════════════════════════════════
    // Objects
    // ═══════════════════════════════════════════════════════════════

    /// Allocate an object of `class` with `prototype`.
    pub fn alloc_object(
        &self,
        class: ObjectClass,
        prototype: Option<ObjRef>,
    ) -> Result<ObjRef, JsError> {
        let header = self.mem_alloc_checked(mem::size_of::<HObject>())?;
        let is_array = matches!(class, ObjectClass::Array { .. });
        let obj = self
            .inner
            .objects
            .alloc(HObject::new(class, prototype, header));
        if is_array {
            obj.borrow_mut().set_array_items(true);
        }
        Ok(obj)
    }

    /// Plain object inheriting from the object prototype.
    pub fn new_object(&self) -> Result<ObjRef, JsError> {
        self.alloc_object(ObjectClass::Object, Some(self.object_prototype().clone()))
    }

    /// Dense array holding `values`.
    pub fn new_array(&self, values: &[Value]) -> Result<ObjRef, JsError> {
        let length = u32::try_from(values.len())
            .map_err(|_| JsError::range_error(crate::error::MSG_INVALID_ARRAY_LENGTH))?;
        let obj = self.alloc_object(
            ObjectClass::Array { length },
            Some(self.array_prototype().clone()),
        )?;
        if length > 0 {
            store::resize_items(self, &obj, length)?;
            let mut o = obj.borrow_mut();
            for (slot, v) in o.items.values.iter_mut().zip(values) {
                *slot = v.clone();
            }
        }
        Ok(obj)
    }

    /// Boxed primitive string.
    pub fn new_string_object(&self, value: HString) -> Result<ObjRef, JsError> {
        self.alloc_object(
            ObjectClass::StringObject(value),
            Some(self.object_prototype().clone()),
        )
    }

    /// Error object with a `message` property.
    pub fn new_error(&self, kind: ErrorKind, message: &str) -> Result<ObjRef, JsError> {
        let obj = self.alloc_object(ObjectClass::Error, Some(self.error_prototype().clone()))?;
        let key = self.intern("message")?;
        let text = self.intern(message)?;
        store::insert_prop::<StrPart>(self, &obj, key, PropValue::Data(Value::String(text)), attrs::WC)?;
        let key = self.intern("name")?;
        let name = self.intern(kind.name())?;
        store::insert_prop::<StrPart>(self, &obj, key, PropValue::Data(Value::String(name)), attrs::WC)?;
        Ok(obj)
    }

    /// Native function object. The closure must not capture this heap.
    pub fn new_native_function<F>(&self, name: &str, func: F) -> Result<ObjRef, JsError>
    where
        F: Fn(&mut Thread, &Value, &[Value]) -> Result<Value, JsError> + 'static,
    {
        let name = self.intern(name)?;
        self.alloc_object(
            ObjectClass::NativeFunction(NativeFunction {
                func: Rc::new(func),
                name: Some(name),
            }),
            Some(self.function_prototype().clone()),
        )
    }

    pub fn new_bound_function(
        &self,
        target: ObjRef,
        this: Value,
        args: Vec<Value>,
    ) -> Result<ObjRef, JsError> {
        self.alloc_object(
            ObjectClass::BoundFunction(BoundFunction { target, this, args }),
            Some(self.function_prototype().clone()),
        )
    }

    pub fn new_proxy(&self, target: ObjRef, handler: ObjRef) -> Result<ObjRef, JsError> {
        self.alloc_object(
            ObjectClass::Proxy(ProxyData {
                target: Some(target),
                handler: Some(handler),
            }),
            None,
        )
    }

    /// Revoke a proxy: every later operation on it throws.
    pub fn revoke_proxy(&self, proxy: &ObjRef) {
        let old = match proxy.try_borrow_mut() {
            Some(mut o) => match &mut o.class {
                ObjectClass::Proxy(data) => Some(mem::take(data)),
                _ => None,
            },
            None => None,
        };
        drop(old);
    }

    pub fn new_typed_array(
        &self,
        buffer: HBuffer,
        byte_offset: usize,
        length: u32,
        elem: ElementType,
    ) -> Result<ObjRef, JsError> {
        self.alloc_object(
            ObjectClass::TypedArray(TypedArrayView {
                buffer,
                byte_offset,
                length,
                elem,
            }),
            Some(self.object_prototype().clone()),
        )
    }

    /// Declarative environment record.
    pub fn new_environment(&self) -> Result<ObjRef, JsError> {
        self.alloc_object(ObjectClass::Environment(Environment::new()), None)
    }

    pub(crate) fn new_arguments(&self, data: ArgumentsData) -> Result<ObjRef, JsError> {
        self.alloc_object(
            ObjectClass::Arguments(data),
            Some(self.object_prototype().clone()),
        )
    }

    /// Set (or clear) the finalizer of `obj`.
    pub fn set_finalizer(&self, obj: &ObjRef, finalizer: Option<ObjRef>) {
        let old = obj
            .try_borrow_mut()
            .map(|mut o| mem::replace(&mut o.finalizer, finalizer));
        drop(old);
    }

    /// Compact one object.
    pub fn compact(&self, obj: &ObjRef) -> Result<(), JsError> {
        store::compact(self, obj)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("objects", &self.gc_stats())
            .field("strings", &self.string_count())
            .field("ms_count", &self.ms_count())
            .finish()
    }
}
