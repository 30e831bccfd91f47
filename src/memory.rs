//! Heap allocator front-end.
//!
//! Every byte the heap charges for (object headers, property parts, array
//! items, strings, buffers) goes through [`Heap::mem_alloc`] or one of the
//! realloc variants. The pluggable [`Allocator`] decides whether a request
//! can be satisfied; on refusal the front-end runs mark-and-sweep and retries,
//! switching to emergency mode for the last attempts.

use crate::error::{JsError, MSG_ALLOC_FAILED};
use crate::heap::{Heap, MsFlags};
use crate::prelude::*;

/// Memory provider for one heap.
///
/// `alloc`/`realloc` return false when the request cannot be satisfied right
/// now. `free` must accept any size previously granted. Zero-sized requests
/// never reach the allocator.
pub trait Allocator {
    fn alloc(&mut self, size: usize) -> bool;
    fn realloc(&mut self, old_size: usize, new_size: usize) -> bool;
    fn free(&mut self, size: usize);

    /// Bytes currently granted.
    fn in_use(&self) -> usize;
}

/// Allocator that never refuses, tracking usage only.
#[derive(Debug, Default)]
pub struct DefaultAllocator {
    in_use: usize,
}

impl Allocator for DefaultAllocator {
    fn alloc(&mut self, size: usize) -> bool {
        self.in_use += size;
        true
    }

    fn realloc(&mut self, old_size: usize, new_size: usize) -> bool {
        self.in_use = self.in_use.saturating_sub(old_size) + new_size;
        true
    }

    fn free(&mut self, size: usize) {
        self.in_use = self.in_use.saturating_sub(size);
    }

    fn in_use(&self) -> usize {
        self.in_use
    }
}

/// Allocator with a fixed budget; requests beyond it are refused.
#[derive(Debug)]
pub struct LimitAllocator {
    limit: usize,
    in_use: usize,
    refusals: usize,
}

impl LimitAllocator {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: 0,
            refusals: 0,
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of requests refused so far.
    pub fn refusals(&self) -> usize {
        self.refusals
    }
}

impl Allocator for LimitAllocator {
    fn alloc(&mut self, size: usize) -> bool {
        if self.in_use.saturating_add(size) > self.limit {
            self.refusals += 1;
            return false;
        }
        self.in_use += size;
        true
    }

    fn realloc(&mut self, old_size: usize, new_size: usize) -> bool {
        let base = self.in_use.saturating_sub(old_size);
        // Shrinking always succeeds.
        if new_size > old_size && base.saturating_add(new_size) > self.limit {
            self.refusals += 1;
            return false;
        }
        self.in_use = base + new_size;
        true
    }

    fn free(&mut self, size: usize) {
        self.in_use = self.in_use.saturating_sub(size);
    }

    fn in_use(&self) -> usize {
        self.in_use
    }
}

/// Shared handle to a heap's allocator.
pub type AllocatorRef = Rc<RefCell<dyn Allocator>>;

/// A granted block of accounted memory; returns its size to the allocator on drop.
pub struct MemBlock {
    size: usize,
    owner: Option<Weak<RefCell<dyn Allocator>>>,
}

impl MemBlock {
    /// A zero-sized block (nothing to return).
    pub fn empty() -> Self {
        Self {
            size: 0,
            owner: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Record a successful realloc of this block to `new_size`.
    pub(crate) fn commit_resize(&mut self, allocator: &AllocatorRef, new_size: usize) {
        self.size = new_size;
        if self.owner.is_none() && new_size > 0 {
            self.owner = Some(Rc::downgrade(allocator));
        }
    }
}

impl Default for MemBlock {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for MemBlock {
    fn drop(&mut self) {
        if self.size == 0 {
            return;
        }
        if let Some(allocator) = self.owner.as_ref().and_then(Weak::upgrade) {
            if let Ok(mut allocator) = allocator.try_borrow_mut() {
                allocator.free(self.size);
            }
        }
    }
}

impl fmt::Debug for MemBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemBlock({})", self.size)
    }
}

impl Heap {
    fn try_alloc_raw(&self, size: usize) -> bool {
        self.allocator()
            .try_borrow_mut()
            .map(|mut a| a.alloc(size))
            .unwrap_or(false)
    }

    fn try_realloc_raw(&self, old_size: usize, new_size: usize) -> bool {
        self.allocator()
            .try_borrow_mut()
            .map(|mut a| a.realloc(old_size, new_size))
            .unwrap_or(false)
    }

    fn block_of(&self, size: usize) -> MemBlock {
        MemBlock {
            size,
            owner: Some(Rc::downgrade(self.allocator())),
        }
    }

    /// Run the retry loop around `attempt`: mark-and-sweep between tries,
    /// emergency mode for the final passes, never from inside a pass.
    fn retry_with_gc(&self, size: usize, mut attempt: impl FnMut() -> bool) -> bool {
        if self.gc_running() {
            log::trace!("alloc: {} bytes refused during mark-and-sweep", size);
            return false;
        }
        let config = self.config();
        for i in 0..config.alloc_retry_limit {
            let mut flags = MsFlags::empty();
            if i + 1 >= config.emergency_limit {
                flags |= MsFlags::EMERGENCY;
            }
            log::debug!(
                "alloc: {} bytes refused, mark-and-sweep attempt {} (flags {:?})",
                size,
                i + 1,
                flags
            );
            self.mark_and_sweep(flags);
            if attempt() {
                return true;
            }
        }
        log::warn!(
            "alloc: {} bytes refused after {} mark-and-sweep attempts",
            size,
            config.alloc_retry_limit
        );
        false
    }

    /// Allocate `size` accounted bytes. `None` after the GC retries are exhausted.
    pub fn mem_alloc(&self, size: usize) -> Option<MemBlock> {
        self.voluntary_gc_tick();
        if size == 0 {
            return Some(MemBlock::empty());
        }
        if self.try_alloc_raw(size) {
            return Some(self.block_of(size));
        }
        if self.retry_with_gc(size, || self.try_alloc_raw(size)) {
            Some(self.block_of(size))
        } else {
            None
        }
    }

    pub fn mem_alloc_checked(&self, size: usize) -> Result<MemBlock, JsError> {
        self.mem_alloc(size)
            .ok_or_else(|| JsError::alloc_error(MSG_ALLOC_FAILED))
    }

    /// Resize a block the caller owns directly.
    pub fn mem_realloc(&self, block: &mut MemBlock, new_size: usize) -> bool {
        let old_size = block.size;
        if self.mem_realloc_indirect(&|| old_size, new_size) {
            block.commit_resize(self.allocator(), new_size);
            true
        } else {
            false
        }
    }

    /// Resize a block owned by something GC can reach.
    ///
    /// A pass inside the retry loop may run finalizers or compaction that resize
    /// the very block being resized, so `current_size` is asked again before
    /// every attempt. On success the caller must `commit_resize` the block to
    /// `new_size` before anything else can run.
    pub fn mem_realloc_indirect(&self, current_size: &dyn Fn() -> usize, new_size: usize) -> bool {
        self.voluntary_gc_tick();
        let old_size = current_size();
        if old_size == new_size {
            return true;
        }
        if self.try_realloc_raw(old_size, new_size) {
            return true;
        }
        self.retry_with_gc(new_size, || self.try_realloc_raw(current_size(), new_size))
    }

    pub fn mem_realloc_indirect_checked(
        &self,
        current_size: &dyn Fn() -> usize,
        new_size: usize,
    ) -> Result<(), JsError> {
        if self.mem_realloc_indirect(current_size, new_size) {
            Ok(())
        } else {
            Err(JsError::alloc_error(MSG_ALLOC_FAILED))
        }
    }

    /// Bytes currently granted by the allocator.
    pub fn mem_in_use(&self) -> usize {
        self.allocator()
            .try_borrow()
            .map(|a| a.in_use())
            .unwrap_or(0)
    }
}
