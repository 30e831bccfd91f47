//! Reference counting + mark-and-sweep garbage collection.
//!
//! Every `Gc<T>` handle counts toward its box's reference count. When the count
//! reaches zero the box is queued on the refzero list and released right away
//! (iteratively, so freeing a long chain never recurses). Mark-and-sweep reclaims
//! what reference counting cannot: cycles. Roots are found without a root set:
//! a box whose reference count exceeds the number of references held by other
//! boxes is referenced from outside the heap graph (value stacks, native code).
//!
//! Boxes whose payload reports a pending finalizer are never released directly;
//! they are rescued onto the finalize list with one extra reference and the owner
//! runs the finalizer later, outside of any borrow.

use crate::prelude::*;

// ============================================================================
// ChunkBitmask - 256-bit bitmask for marking objects within a chunk
// ============================================================================

/// 256-bit bitmask for marking objects within a chunk.
/// Each bit corresponds to an index in the chunk (0-255).
#[derive(Clone, Copy, Default)]
struct ChunkBitmask {
    /// 4 × u64 = 256 bits
    bits: [u64; 4],
}

impl ChunkBitmask {
    /// Set a bit at the given index (0-255)
    #[inline]
    fn set(&mut self, index: usize) {
        debug_assert!(index < CHUNK_CAPACITY);
        let word = (index >> 6) & 3;
        let bit = index & 63;
        // Safety: word is masked to 0..4
        unsafe {
            *self.bits.get_unchecked_mut(word) |= 1 << bit;
        }
    }

    /// Check if a bit is set at the given index (0-255)
    #[inline]
    fn get(&self, index: usize) -> bool {
        debug_assert!(index < CHUNK_CAPACITY);
        let word = (index >> 6) & 3;
        let bit = index & 63;
        // Safety: word is masked to 0..4
        unsafe { (*self.bits.get_unchecked(word) & (1 << bit)) != 0 }
    }

    #[inline]
    fn clear(&mut self) {
        self.bits = [0; 4];
    }

    /// Iterate over unmarked indices (bits that are 0) up to `len`
    #[inline]
    fn iter_unmarked(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        UnmarkedIter {
            bitmask: self,
            len,
            current_word: 0,
            current_bits: !self.bits.first().copied().unwrap_or(u64::MAX),
            base_index: 0,
        }
    }
}

/// Iterator over unmarked (zero) bits in a ChunkBitmask
struct UnmarkedIter<'a> {
    bitmask: &'a ChunkBitmask,
    len: usize,
    current_word: usize,
    current_bits: u64, // Inverted bits (1 = unmarked)
    base_index: usize,
}

impl Iterator for UnmarkedIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current_bits != 0 {
                let bit_pos = self.current_bits.trailing_zeros() as usize;
                let index = self.base_index + bit_pos;
                self.current_bits &= self.current_bits - 1;
                if index < self.len {
                    return Some(index);
                }
            }

            self.current_word += 1;
            if self.current_word >= 4 {
                return None;
            }
            self.base_index = self.current_word << 6;
            if self.base_index >= self.len {
                return None;
            }
            self.current_bits = !self
                .bitmask
                .bits
                .get(self.current_word)
                .copied()
                .unwrap_or(u64::MAX);
        }
    }
}

// ============================================================================
// Gc - counted handle to a GC-managed object
// ============================================================================

/// A counted handle to a GC-managed object.
///
/// Works like `Rc<T>`: cloning increments the reference count, dropping
/// decrements it, and the object is released when the count reaches zero.
/// Unlike `Rc<T>`, cycles are reclaimed by [`Collector::mark_and_sweep`].
///
/// A `Gc` must not be dereferenced after its collector has been dropped.
pub struct Gc<T: Traceable> {
    /// Box index, stable for the lifetime of the object
    id: usize,

    ptr: NonNull<GcBox<T>>,

    /// Weak reference to the space so that drops after teardown are no-ops
    space: Weak<Space<T>>,
}

impl<T: Traceable> PartialEq for Gc<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: Traceable> Eq for Gc<T> {}

impl<T: Traceable> Hash for Gc<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Traceable> Gc<T> {
    /// Wrap a box pointer, taking a new reference.
    fn from_ptr(ptr: NonNull<GcBox<T>>, space: Weak<Space<T>>) -> Self {
        // Safety: callers only pass pointers into live chunks
        let gc_box = unsafe { ptr.as_ref() };
        gc_box.ref_count.set(gc_box.ref_count.get() + 1);
        Self {
            id: gc_box.index,
            ptr,
            space,
        }
    }

    fn gc_box(&self) -> &GcBox<T> {
        // Safety: the box lives as long as the space, see type docs
        unsafe { self.ptr.as_ref() }
    }

    /// Borrow the inner data immutably
    pub fn borrow(&self) -> Ref<'_, T> {
        self.gc_box().data.borrow()
    }

    /// Borrow the inner data mutably
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.gc_box().data.borrow_mut()
    }

    pub fn try_borrow(&self) -> Option<Ref<'_, T>> {
        self.gc_box().data.try_borrow().ok()
    }

    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, T>> {
        self.gc_box().data.try_borrow_mut().ok()
    }

    /// Get the object's unique ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Check if two Gc pointers point to the same object
    pub fn ptr_eq(a: &Gc<T>, b: &Gc<T>) -> bool {
        a.ptr == b.ptr
    }

    /// Current reference count (all `Gc` handles, internal and external).
    pub fn ref_count(&self) -> usize {
        if self.space.strong_count() == 0 {
            return 0;
        }
        self.gc_box().ref_count.get()
    }

    /// Whether the object's finalizer has already been scheduled or run.
    pub fn is_finalized(&self) -> bool {
        self.space.strong_count() > 0 && self.gc_box().has_flag(FLAG_FINALIZED)
    }

    /// Create a copy of this Gc without incrementing ref_count, for tracing.
    pub fn copy_ref(&self) -> GcPtr<T> {
        GcPtr { ptr: self.ptr }
    }
}

impl<T: Traceable> Clone for Gc<T> {
    fn clone(&self) -> Self {
        if self.space.strong_count() > 0 {
            let gc_box = self.gc_box();
            if !gc_box.has_flag(FLAG_POOLED) {
                gc_box.ref_count.set(gc_box.ref_count.get() + 1);
            }
        }
        Self {
            id: self.id,
            ptr: self.ptr,
            space: self.space.clone(),
        }
    }
}

impl<T: Traceable> Drop for Gc<T> {
    fn drop(&mut self) {
        // The space owns the box memory: once it is gone the pointer dangles.
        let Some(space) = self.space.upgrade() else {
            return;
        };
        space.decref(self.ptr);
    }
}

impl<T: Traceable> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gc").field("id", &self.id).finish()
    }
}

// ============================================================================
// GcPtr - a Copy pointer without Drop (for tracing)
// ============================================================================

/// A raw pointer to a GC-managed object. Copy and no Drop.
/// Used during tracing to avoid affecting ref_counts.
pub struct GcPtr<T: Traceable> {
    ptr: NonNull<GcBox<T>>,
}

impl<T: Traceable> Copy for GcPtr<T> {}

impl<T: Traceable> Clone for GcPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Traceable> GcPtr<T> {
    fn index(&self) -> usize {
        // Safety: traced pointers come from live Gc handles
        unsafe { self.ptr.as_ref().index }
    }
}

// ============================================================================
// Traceable trait - for discovering object references
// ============================================================================

/// Trait for types that can be traced by the garbage collector.
pub trait Traceable: Sized + Default {
    /// Visit every `Gc<Self>` held by this object, once per handle.
    ///
    /// Each handle must be reported exactly as many times as it is stored:
    /// the collector compares these counts with reference counts to find roots.
    fn trace<F: FnMut(GcPtr<Self>)>(&self, visitor: F);

    /// Whether the object still has a finalizer that should run before release.
    fn has_finalizer(&self) -> bool {
        false
    }
}

// ============================================================================
// GcBox - the internal storage for GC-managed objects
// ============================================================================

const FLAG_POOLED: u8 = 1 << 0;
const FLAG_FINALIZABLE: u8 = 1 << 1;
const FLAG_FINALIZED: u8 = 1 << 2;

/// Internal storage for a GC-managed object.
struct GcBox<T: Traceable> {
    /// Index in chunks (chunk_idx * CHUNK_CAPACITY + index_in_chunk).
    index: usize,

    data: RefCell<T>,

    ref_count: Cell<usize>,

    flags: Cell<u8>,
}

impl<T: Traceable> GcBox<T> {
    fn new(index: usize, data: T) -> Self {
        Self {
            index,
            data: RefCell::new(data),
            ref_count: Cell::new(0),
            flags: Cell::new(0),
        }
    }

    #[inline]
    fn has_flag(&self, flag: u8) -> bool {
        self.flags.get() & flag != 0
    }

    #[inline]
    fn set_flag(&self, flag: u8) {
        self.flags.set(self.flags.get() | flag);
    }

    #[inline]
    fn clear_flag(&self, flag: u8) {
        self.flags.set(self.flags.get() & !flag);
    }

    fn pending_finalizer(&self) -> bool {
        !self.has_flag(FLAG_FINALIZED)
            && self
                .data
                .try_borrow()
                .map(|d| d.has_finalizer())
                .unwrap_or(false)
    }
}

// ============================================================================
// Space - the internal memory arena
// ============================================================================

/// Chunk capacity: objects per chunk (matches ChunkBitmask size)
const CHUNK_CAPACITY: usize = 256;

/// Outcome of one mark-and-sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Objects still alive after the pass (including rescued ones)
    pub kept: usize,
    /// Objects released by the pass
    pub freed: usize,
    /// Objects moved to the finalize list by the pass
    pub finalizable: usize,
}

/// Internal memory arena. Every field has its own cell so that a drop
/// cascading out of one operation can re-enter another safely.
struct Space<T: Traceable> {
    /// Chunks of boxes. Inner vecs never reallocate, ensuring stable pointers.
    chunks: RefCell<Vec<Vec<GcBox<T>>>>,

    free_list: RefCell<Vec<NonNull<GcBox<T>>>>,

    marked_chunks: RefCell<Vec<ChunkBitmask>>,

    /// Persistent mark stack, reused between passes
    mark_stack: RefCell<Vec<NonNull<GcBox<T>>>>,

    /// Boxes whose count reached zero, waiting to be released
    refzero_list: RefCell<Vec<NonNull<GcBox<T>>>>,

    /// Set while the outermost decref drains the refzero list
    refzero_running: Cell<bool>,

    /// Rescued objects waiting for their finalizer
    finalize_list: RefCell<Vec<Gc<T>>>,

    ms_running: Cell<bool>,

    /// Nonzero while mark-and-sweep must not start (including while running)
    ms_prevent_count: Cell<u32>,

    live: Cell<usize>,

    self_weak: Weak<Space<T>>,
}

impl<T: Traceable> Space<T> {
    fn alloc(&self, data: T) -> Gc<T> {
        let reused = self.free_list.borrow_mut().pop();
        let ptr = match reused {
            Some(ptr) => {
                // Safety: the free list only holds pointers into our chunks
                let gc_box = unsafe { ptr.as_ref() };
                match gc_box.data.try_borrow_mut() {
                    Ok(mut slot) => *slot = data,
                    Err(_) => {
                        log::warn!("gc: pooled box {} is borrowed, skipping", gc_box.index);
                        return self.alloc_fresh(data);
                    }
                }
                gc_box.flags.set(0);
                gc_box.ref_count.set(0);
                ptr
            }
            None => return self.alloc_fresh(data),
        };
        self.live.set(self.live.get() + 1);
        Gc::from_ptr(ptr, self.self_weak.clone())
    }

    fn alloc_fresh(&self, data: T) -> Gc<T> {
        let ptr = {
            let mut chunks = self.chunks.borrow_mut();
            let need_new_chunk = chunks
                .last()
                .is_none_or(|chunk| chunk.len() >= CHUNK_CAPACITY);
            if need_new_chunk {
                chunks.push(Vec::with_capacity(CHUNK_CAPACITY));
                self.marked_chunks
                    .borrow_mut()
                    .push(ChunkBitmask::default());
            }
            let chunk_idx = chunks.len().saturating_sub(1);
            let chunk = match chunks.last_mut() {
                Some(c) => c,
                None => {
                    #[allow(clippy::panic)]
                    {
                        panic!("GC internal error: no chunk after creation")
                    }
                }
            };
            let index = chunk_idx * CHUNK_CAPACITY + chunk.len();
            // Capacity was reserved up front, so the push never moves the chunk.
            chunk.push(GcBox::new(index, data));
            match chunk.last() {
                Some(b) => NonNull::from(b),
                None => {
                    #[allow(clippy::panic)]
                    {
                        panic!("GC internal error: chunk empty after push")
                    }
                }
            }
        };
        self.live.set(self.live.get() + 1);
        Gc::from_ptr(ptr, self.self_weak.clone())
    }

    fn decref(&self, ptr: NonNull<GcBox<T>>) {
        // Safety: ptr came from a live Gc handle and the space is alive
        let gc_box = unsafe { ptr.as_ref() };
        if gc_box.has_flag(FLAG_POOLED) {
            return;
        }
        let count = gc_box.ref_count.get().saturating_sub(1);
        gc_box.ref_count.set(count);
        if count == 0 {
            self.refzero(ptr);
        }
    }

    /// Queue a zero-count box and, if no outer call is draining, drain the queue.
    fn refzero(&self, ptr: NonNull<GcBox<T>>) {
        self.refzero_list.borrow_mut().push(ptr);
        if self.refzero_running.get() {
            return;
        }
        self.refzero_running.set(true);
        loop {
            let next = self.refzero_list.borrow_mut().pop();
            let Some(ptr) = next else {
                break;
            };
            // Safety: queued pointers are boxes in our chunks
            let gc_box = unsafe { ptr.as_ref() };
            if gc_box.has_flag(FLAG_POOLED) || gc_box.ref_count.get() > 0 {
                continue;
            }
            if gc_box.pending_finalizer() {
                gc_box.set_flag(FLAG_FINALIZED);
                log::trace!("gc: rescue box {} for finalization", gc_box.index);
                let rescued = Gc::from_ptr(ptr, self.self_weak.clone());
                self.finalize_list.borrow_mut().push(rescued);
                continue;
            }
            self.release(ptr);
        }
        self.refzero_running.set(false);
    }

    /// Release one box: pool it first, then drop its payload outside any borrow.
    fn release(&self, ptr: NonNull<GcBox<T>>) {
        // Safety: ptr points into our chunks
        let gc_box = unsafe { ptr.as_ref() };
        let old = match gc_box.data.try_borrow_mut() {
            Ok(mut data) => mem::take(&mut *data),
            Err(_) => return,
        };
        gc_box.flags.set(FLAG_POOLED);
        self.free_list.borrow_mut().push(ptr);
        self.live.set(self.live.get().saturating_sub(1));
        drop(old);
    }

    /// Mark everything reachable from the stack contents.
    fn mark_from(
        &self,
        stack: &mut Vec<NonNull<GcBox<T>>>,
        marked: &mut [ChunkBitmask],
    ) -> usize {
        let mut count = 0;
        while let Some(ptr) = stack.pop() {
            // Safety: only pointers of live boxes are pushed
            let gc_box = unsafe { ptr.as_ref() };
            let chunk_idx = gc_box.index / CHUNK_CAPACITY;
            let index_in_chunk = gc_box.index % CHUNK_CAPACITY;
            let Some(bitmask) = marked.get_mut(chunk_idx) else {
                continue;
            };
            if bitmask.get(index_in_chunk) {
                continue;
            }
            bitmask.set(index_in_chunk);
            count += 1;

            // A payload that is borrowed right now cannot be traced; its
            // children are then not counted as internal references either,
            // so they were roots already.
            if let Ok(data) = gc_box.data.try_borrow() {
                data.trace(|child: GcPtr<T>| {
                    // Safety: children are held by live handles
                    let child_box = unsafe { child.ptr.as_ref() };
                    if !child_box.has_flag(FLAG_POOLED) {
                        stack.push(child.ptr);
                    }
                });
            }
        }
        count
    }

    fn mark_and_sweep(&self) -> CollectStats {
        let mut stats = CollectStats::default();
        let mut stack = mem::take(&mut *self.mark_stack.borrow_mut());
        stack.clear();
        let mut garbage: Vec<T> = Vec::new();

        {
            let chunks = self.chunks.borrow();
            let mut marked = self.marked_chunks.borrow_mut();
            for bitmask in marked.iter_mut() {
                bitmask.clear();
            }

            // Count references held by heap objects themselves.
            let mut internal = vec![0usize; chunks.len() * CHUNK_CAPACITY];
            for chunk in chunks.iter() {
                for gc_box in chunk.iter() {
                    if gc_box.has_flag(FLAG_POOLED) {
                        continue;
                    }
                    match gc_box.data.try_borrow() {
                        Ok(data) => data.trace(|child| {
                            if let Some(n) = internal.get_mut(child.index()) {
                                *n += 1;
                            }
                        }),
                        Err(_) => stack.push(NonNull::from(gc_box)),
                    }
                }
            }

            // Roots: anything referenced from outside the object graph.
            for chunk in chunks.iter() {
                for gc_box in chunk.iter() {
                    if gc_box.has_flag(FLAG_POOLED) {
                        continue;
                    }
                    let inner = internal.get(gc_box.index).copied().unwrap_or(0);
                    if gc_box.ref_count.get() > inner {
                        stack.push(NonNull::from(gc_box));
                    }
                }
            }
            stats.kept = self.mark_from(&mut stack, &mut marked);

            // Unreachable objects with a pending finalizer are kept alive,
            // together with everything they reference, until it has run.
            for (chunk, bitmask) in chunks.iter().zip(marked.iter()) {
                for index_in_chunk in bitmask.iter_unmarked(chunk.len()) {
                    if let Some(gc_box) = chunk.get(index_in_chunk) {
                        if !gc_box.has_flag(FLAG_POOLED) && gc_box.pending_finalizer() {
                            gc_box.set_flag(FLAG_FINALIZABLE);
                            stack.push(NonNull::from(gc_box));
                        }
                    }
                }
            }
            stats.kept += self.mark_from(&mut stack, &mut marked);

            // Sweep.
            let mut free_list = self.free_list.borrow_mut();
            let mut rescued = Vec::new();
            for (chunk, bitmask) in chunks.iter().zip(marked.iter()) {
                for gc_box in chunk.iter() {
                    if gc_box.has_flag(FLAG_FINALIZABLE) {
                        gc_box.clear_flag(FLAG_FINALIZABLE);
                        gc_box.set_flag(FLAG_FINALIZED);
                        rescued.push(NonNull::from(gc_box));
                    }
                }
                for index_in_chunk in bitmask.iter_unmarked(chunk.len()) {
                    let Some(gc_box) = chunk.get(index_in_chunk) else {
                        continue;
                    };
                    if gc_box.has_flag(FLAG_POOLED) {
                        continue;
                    }
                    if let Ok(mut data) = gc_box.data.try_borrow_mut() {
                        garbage.push(mem::take(&mut *data));
                        gc_box.flags.set(FLAG_POOLED);
                        free_list.push(NonNull::from(gc_box));
                        stats.freed += 1;
                    }
                }
            }
            drop(free_list);

            stats.finalizable = rescued.len();
            let mut finalize_list = self.finalize_list.borrow_mut();
            for ptr in rescued {
                finalize_list.push(Gc::from_ptr(ptr, self.self_weak.clone()));
            }
        }

        self.live
            .set(self.live.get().saturating_sub(stats.freed));
        *self.mark_stack.borrow_mut() = stack;

        // Payloads of swept boxes reference only swept boxes or live ones;
        // dropping them now only adjusts counts of survivors.
        drop(garbage);
        stats
    }
}

impl<T: Traceable> Drop for Space<T> {
    fn drop(&mut self) {
        // Remaining Gc handles see the space gone (Weak fails to upgrade),
        // so payload drops below never touch the boxes again.
        for chunk in self.chunks.get_mut().iter() {
            for gc_box in chunk.iter() {
                gc_box.set_flag(FLAG_POOLED);
            }
        }
    }
}

// ============================================================================
// Collector - the public wrapper
// ============================================================================

/// Snapshot of collector occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub total_objects: usize,
    pub pooled_objects: usize,
    pub live_objects: usize,
    pub pending_finalizers: usize,
}

/// Owner of a GC space; cheap to clone.
pub struct Collector<T: Traceable> {
    inner: Rc<Space<T>>,
}

impl<T: Traceable> Collector<T> {
    pub fn new() -> Self {
        let inner = Rc::new_cyclic(|weak| Space {
            chunks: RefCell::new(Vec::new()),
            free_list: RefCell::new(Vec::new()),
            marked_chunks: RefCell::new(Vec::new()),
            mark_stack: RefCell::new(Vec::new()),
            refzero_list: RefCell::new(Vec::new()),
            refzero_running: Cell::new(false),
            finalize_list: RefCell::new(Vec::new()),
            ms_running: Cell::new(false),
            ms_prevent_count: Cell::new(0),
            live: Cell::new(0),
            self_weak: weak.clone(),
        });
        Self { inner }
    }

    /// Allocate a new object, returning the first handle to it.
    pub fn alloc(&self, data: T) -> Gc<T> {
        self.inner.alloc(data)
    }

    pub fn stats(&self) -> GcStats {
        let total_objects: usize = self.inner.chunks.borrow().iter().map(|c| c.len()).sum();
        let pooled_objects = self.inner.free_list.borrow().len();
        GcStats {
            total_objects,
            pooled_objects,
            live_objects: self.inner.live.get(),
            pending_finalizers: self.inner.finalize_list.borrow().len(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.ms_running.get()
    }

    /// Enter a collection. Returns false (and does nothing) when a pass is
    /// already running or collection is currently prevented.
    pub fn begin_collection(&self) -> bool {
        if self.inner.ms_prevent_count.get() != 0 {
            return false;
        }
        self.inner.ms_prevent_count.set(1);
        self.inner.ms_running.set(true);
        true
    }

    pub fn end_collection(&self) {
        self.inner.ms_running.set(false);
        self.inner
            .ms_prevent_count
            .set(self.inner.ms_prevent_count.get().saturating_sub(1));
    }

    /// Mark and sweep. Must be called between `begin_collection` and `end_collection`.
    pub fn mark_and_sweep(&self) -> CollectStats {
        self.inner.mark_and_sweep()
    }

    /// Begin/mark/sweep/end in one call; `None` when a pass is already active.
    pub fn collect(&self) -> Option<CollectStats> {
        if !self.begin_collection() {
            return None;
        }
        let stats = self.mark_and_sweep();
        self.end_collection();
        Some(stats)
    }

    /// Prevent mark-and-sweep until the matching `allow_collection`.
    pub fn prevent_collection(&self) {
        self.inner
            .ms_prevent_count
            .set(self.inner.ms_prevent_count.get() + 1);
    }

    pub fn allow_collection(&self) {
        self.inner
            .ms_prevent_count
            .set(self.inner.ms_prevent_count.get().saturating_sub(1));
    }

    /// Take the objects waiting for their finalizer.
    pub fn take_finalize_list(&self) -> Vec<Gc<T>> {
        mem::take(&mut *self.inner.finalize_list.borrow_mut())
    }

    /// Handles to every live object, in allocation slot order.
    pub fn live_objects(&self) -> Vec<Gc<T>> {
        let mut ptrs = Vec::new();
        for chunk in self.inner.chunks.borrow().iter() {
            for gc_box in chunk.iter() {
                if !gc_box.has_flag(FLAG_POOLED) {
                    ptrs.push(NonNull::from(gc_box));
                }
            }
        }
        ptrs.into_iter()
            .map(|ptr| Gc::from_ptr(ptr, Rc::downgrade(&self.inner)))
            .collect()
    }
}

impl<T: Traceable> Default for Collector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Traceable> Clone for Collector<T> {
    fn clone(&self) -> Self {
        Collector {
            inner: self.inner.clone(),
        }
    }
}
