//! Property store: capacity management of the three property parts.
//!
//! Each part keeps keys, values and attribute bytes in parallel vectors of
//! identical length (the capacity). Slots below `next` are live or dead
//! (deleted, key cleared); slots from `next` on are free. An optional
//! open-addressing hash maps key hashes to slot numbers; it is sized from the
//! capacity so that it always holds more slots than `next` and probing ends.
//!
//! Everything here that resizes may allocate, so it may run a mark-and-sweep
//! pass: callers must hold no borrow of the object across these functions.

use crate::error::{JsError, MSG_ALLOC_FAILED};
use crate::heap::Heap;
use crate::object::{HObject, ObjRef, attrs};
use crate::prelude::*;
use crate::value::{HString, Value};

/// Value of a property slot.
#[derive(Debug, Clone)]
pub enum PropValue {
    Data(Value),
    Accessor {
        get: Option<ObjRef>,
        set: Option<ObjRef>,
    },
}

impl Default for PropValue {
    fn default() -> Self {
        PropValue::Data(Value::Undefined)
    }
}

impl PropValue {
    pub fn is_accessor(&self) -> bool {
        matches!(self, PropValue::Accessor { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            PropValue::Data(v) => Some(v),
            PropValue::Accessor { .. } => None,
        }
    }
}

/// One slot of the hash index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSlot {
    Unused,
    Deleted,
    Entry(u32),
}

/// Keys a property part can hold.
pub trait SlotKey: Clone + fmt::Debug {
    fn slot_hash(&self) -> u32;
    fn same_key(&self, other: &Self) -> bool;
}

impl SlotKey for HString {
    fn slot_hash(&self) -> u32 {
        self.hash()
    }

    fn same_key(&self, other: &Self) -> bool {
        // Interned strings are unique per content and symbols compare by identity.
        HString::ptr_eq(self, other)
    }
}

impl SlotKey for u32 {
    fn slot_hash(&self) -> u32 {
        let h = self.wrapping_mul(0x9e37_79b1);
        h ^ (h >> 15)
    }

    fn same_key(&self, other: &Self) -> bool {
        self == other
    }
}

/// Hash index size for a part of `capacity` slots: none below `limit`,
/// otherwise the smallest power of two above the capacity, doubled.
pub fn hash_size_for(capacity: u32, limit: u32) -> u32 {
    if capacity < limit {
        return 0;
    }
    let size = (u64::from(capacity) + 1).next_power_of_two() * 2;
    u32::try_from(size).unwrap_or(0x8000_0000)
}

/// Minimum growth step for a part holding `used` entries.
pub(crate) fn grow_step(used: u32) -> u32 {
    (used.saturating_add(16)) / 8
}

/// One property part (entries part or index-properties part).
pub struct PropPart<K> {
    keys: Vec<Option<K>>,
    values: Vec<PropValue>,
    attrs: Vec<u8>,
    next: u32,
    hash: Vec<HashSlot>,
    pub(crate) block: crate::memory::MemBlock,
}

impl<K> Default for PropPart<K> {
    fn default() -> Self {
        PropPart {
            keys: Vec::new(),
            values: Vec::new(),
            attrs: Vec::new(),
            next: 0,
            hash: Vec::new(),
            block: crate::memory::MemBlock::empty(),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for PropPart<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropPart")
            .field("capacity", &self.keys.len())
            .field("next", &self.next)
            .field("hash_size", &self.hash.len())
            .finish()
    }
}

fn slot(i: u32) -> usize {
    usize::try_from(i).unwrap_or(usize::MAX)
}

impl<K: SlotKey> PropPart<K> {
    /// Bytes charged for a part of `capacity` slots and `hash_size` hash slots.
    pub fn alloc_size(capacity: u32, hash_size: u32) -> usize {
        let per_slot = mem::size_of::<Option<K>>() + mem::size_of::<PropValue>() + 1;
        slot(capacity).saturating_mul(per_slot)
            + slot(hash_size).saturating_mul(mem::size_of::<HashSlot>())
    }

    pub fn capacity(&self) -> u32 {
        u32::try_from(self.keys.len()).unwrap_or(u32::MAX)
    }

    /// Slots in use, live or dead.
    pub fn next(&self) -> u32 {
        self.next
    }

    pub fn hash_size(&self) -> u32 {
        u32::try_from(self.hash.len()).unwrap_or(u32::MAX)
    }

    pub fn has_room(&self) -> bool {
        self.next < self.capacity()
    }

    pub fn live_count(&self) -> u32 {
        let live = self
            .keys
            .iter()
            .take(slot(self.next))
            .filter(|k| k.is_some())
            .count();
        u32::try_from(live).unwrap_or(u32::MAX)
    }

    pub fn key_at(&self, i: u32) -> Option<&K> {
        self.keys.get(slot(i)).and_then(Option::as_ref)
    }

    pub fn value_at(&self, i: u32) -> Option<&PropValue> {
        self.key_at(i)?;
        self.values.get(slot(i))
    }

    pub fn value_at_mut(&mut self, i: u32) -> Option<&mut PropValue> {
        self.key_at(i)?;
        self.values.get_mut(slot(i))
    }

    pub fn attrs_at(&self, i: u32) -> u8 {
        self.attrs.get(slot(i)).copied().unwrap_or(0)
    }

    pub fn set_attrs(&mut self, i: u32, flags: u8) {
        if let Some(a) = self.attrs.get_mut(slot(i)) {
            *a = flags;
        }
    }

    /// Live entries in slot (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &K, &PropValue, u8)> + '_ {
        self.keys
            .iter()
            .zip(self.values.iter())
            .zip(self.attrs.iter())
            .take(slot(self.next))
            .enumerate()
            .filter_map(|(i, ((k, v), a))| {
                let k = k.as_ref()?;
                Some((u32::try_from(i).ok()?, k, v, *a))
            })
    }

    /// Live values, for tracing.
    pub fn values(&self) -> impl Iterator<Item = &PropValue> + '_ {
        self.iter().map(|(_, _, v, _)| v)
    }

    /// Probe sequence of `hash` over a table of `size` slots (power of two).
    fn probe(hash: u32, size: usize) -> impl Iterator<Item = usize> {
        let mask = size.wrapping_sub(1);
        let start = slot(hash) & mask;
        let step = (slot(hash >> 16) | 1) & mask;
        (0..size).scan(start, move |i, _| {
            let cur = *i;
            *i = (*i + step) & mask;
            Some(cur)
        })
    }

    /// Find the slot holding `key`.
    pub fn find(&self, key: &K) -> Option<u32> {
        if self.hash.is_empty() {
            return self
                .keys
                .iter()
                .take(slot(self.next))
                .position(|k| k.as_ref().is_some_and(|k| k.same_key(key)))
                .and_then(|i| u32::try_from(i).ok());
        }
        for h in Self::probe(key.slot_hash(), self.hash.len()) {
            match self.hash.get(h).copied().unwrap_or(HashSlot::Unused) {
                HashSlot::Unused => return None,
                HashSlot::Deleted => continue,
                HashSlot::Entry(i) => {
                    if self.key_at(i).is_some_and(|k| k.same_key(key)) {
                        return Some(i);
                    }
                }
            }
        }
        None
    }

    fn hash_insert(&mut self, key_hash: u32, i: u32) {
        let size = self.hash.len();
        if size == 0 {
            return;
        }
        for h in Self::probe(key_hash, size) {
            if let Some(s) = self.hash.get_mut(h) {
                if matches!(*s, HashSlot::Unused | HashSlot::Deleted) {
                    *s = HashSlot::Entry(i);
                    return;
                }
            }
        }
        log::warn!("store: hash index full, entry {} not indexed", i);
    }

    /// Append an entry at `next`. The caller makes sure there is room.
    pub(crate) fn push_entry(&mut self, key: K, value: PropValue, flags: u8) -> Option<u32> {
        if !self.has_room() {
            return None;
        }
        let i = self.next;
        let key_hash = key.slot_hash();
        *self.keys.get_mut(slot(i))? = Some(key);
        *self.values.get_mut(slot(i))? = value;
        *self.attrs.get_mut(slot(i))? = flags;
        self.next += 1;
        self.hash_insert(key_hash, i);
        Some(i)
    }

    /// Delete the entry in slot `i`, returning its value. The slot stays dead
    /// (tombstoned in the hash) until the next resize.
    pub(crate) fn delete_at(&mut self, i: u32) -> Option<PropValue> {
        let key = self.keys.get_mut(slot(i))?.take()?;
        if !self.hash.is_empty() {
            for h in Self::probe(key.slot_hash(), self.hash.len()) {
                match self.hash.get(h).copied() {
                    Some(HashSlot::Entry(e)) if e == i => {
                        if let Some(s) = self.hash.get_mut(h) {
                            *s = HashSlot::Deleted;
                        }
                        break;
                    }
                    Some(HashSlot::Unused) | None => break,
                    _ => {}
                }
            }
        }
        self.set_attrs(i, 0);
        let old = self.values.get_mut(slot(i)).map(mem::take);
        drop(key);
        old
    }

    /// Re-lay the part out with `capacity` slots, dropping dead slots and
    /// rebuilding the hash with `hash_size` slots. Live order is kept.
    pub(crate) fn rebuild(&mut self, capacity: u32, hash_size: u32) {
        let cap = slot(capacity);
        let mut keys: Vec<Option<K>> = Vec::with_capacity(cap);
        let mut values: Vec<PropValue> = Vec::with_capacity(cap);
        let mut attrs: Vec<u8> = Vec::with_capacity(cap);
        let old_keys = mem::take(&mut self.keys);
        let old_values = mem::take(&mut self.values);
        let old_attrs = mem::take(&mut self.attrs);
        for ((k, v), a) in old_keys
            .into_iter()
            .zip(old_values)
            .zip(old_attrs)
            .take(slot(self.next))
        {
            if k.is_some() {
                keys.push(k);
                values.push(v);
                attrs.push(a);
            }
        }
        let live = keys.len();
        let cap = cap.max(live);
        keys.resize_with(cap, || None);
        values.resize_with(cap, PropValue::default);
        attrs.resize(cap, 0);
        self.keys = keys;
        self.values = values;
        self.attrs = attrs;
        self.next = u32::try_from(live).unwrap_or(u32::MAX);

        self.hash = vec![HashSlot::Unused; slot(hash_size)];
        if !self.hash.is_empty() {
            for i in 0..self.next {
                if let Some(h) = self.key_at(i).map(SlotKey::slot_hash) {
                    self.hash_insert(h, i);
                }
            }
        }
    }
}

// ============================================================================
// Resizing
// ============================================================================

/// Selects one of the two keyed parts of an object.
pub(crate) trait PartSelector {
    type Key: SlotKey;
    const NAME: &'static str;
    fn part(obj: &HObject) -> &PropPart<Self::Key>;
    fn part_mut(obj: &mut HObject) -> &mut PropPart<Self::Key>;
}

/// The entries part (string and symbol keys).
pub(crate) struct StrPart;

/// The index-properties part (sparse array-index keys).
pub(crate) struct IdxPart;

impl PartSelector for StrPart {
    type Key = HString;
    const NAME: &'static str = "entries";

    fn part(obj: &HObject) -> &PropPart<HString> {
        &obj.strprops
    }

    fn part_mut(obj: &mut HObject) -> &mut PropPart<HString> {
        &mut obj.strprops
    }
}

impl PartSelector for IdxPart {
    type Key = u32;
    const NAME: &'static str = "idxprops";

    fn part(obj: &HObject) -> &PropPart<u32> {
        &obj.idxprops
    }

    fn part_mut(obj: &mut HObject) -> &mut PropPart<u32> {
        &mut obj.idxprops
    }
}

fn busy() -> JsError {
    JsError::internal_error("object is borrowed during resize")
}

/// Reallocate one part to `new_capacity` slots (never below its live count).
pub(crate) fn realloc_part<S: PartSelector>(
    heap: &Heap,
    obj: &ObjRef,
    new_capacity: u32,
) -> Result<(), JsError> {
    let live = S::part(&*obj.try_borrow().ok_or_else(busy)?).live_count();
    let capacity = new_capacity.max(live);
    if capacity > heap.config().max_properties {
        return Err(JsError::alloc_error(MSG_ALLOC_FAILED));
    }
    let hash_size = hash_size_for(capacity, heap.config().hash_prop_limit);
    let bytes = PropPart::<S::Key>::alloc_size(capacity, hash_size);

    // No finalizers and no compaction while the part is in flux.
    let _critical = heap.start_critical();
    let current = || {
        obj.try_borrow()
            .map(|o| S::part(&o).block.size())
            .unwrap_or(0)
    };
    heap.mem_realloc_indirect_checked(&current, bytes)?;

    let mut o = obj.try_borrow_mut().ok_or_else(busy)?;
    let part = S::part_mut(&mut o);
    log::trace!(
        "store: resize {} of object {}: capacity {} -> {}, hash {} -> {}",
        S::NAME,
        obj.id(),
        part.capacity(),
        capacity,
        part.hash_size(),
        hash_size
    );
    part.block.commit_resize(heap.allocator(), bytes);
    part.rebuild(capacity, hash_size);
    Ok(())
}

/// Resize the entries part to hold at least `new_capacity` entries.
pub fn resize_entries(heap: &Heap, obj: &ObjRef, new_capacity: u32) -> Result<(), JsError> {
    realloc_part::<StrPart>(heap, obj, new_capacity)
}

/// Rebuild the entries-part hash index, dropping tombstones and dead slots.
/// The index is freed when the part is below the hash threshold.
pub fn resize_hash(heap: &Heap, obj: &ObjRef) -> Result<(), JsError> {
    let capacity = obj.try_borrow().ok_or_else(busy)?.strprops.capacity();
    realloc_part::<StrPart>(heap, obj, capacity)
}

/// Insert a new property into part `S`, growing it when full. The caller
/// has checked that the key is not present.
pub(crate) fn insert_prop<S: PartSelector>(
    heap: &Heap,
    obj: &ObjRef,
    key: S::Key,
    value: PropValue,
    flags: u8,
) -> Result<u32, JsError> {
    let full = !S::part(&*obj.try_borrow().ok_or_else(busy)?).has_room();
    if full {
        let live = S::part(&*obj.try_borrow().ok_or_else(busy)?).live_count();
        realloc_part::<S>(heap, obj, live.saturating_add(grow_step(live)))?;
    }
    let mut o = obj.try_borrow_mut().ok_or_else(busy)?;
    S::part_mut(&mut o)
        .push_entry(key, value, flags)
        .ok_or_else(|| JsError::internal_error("no room after resize"))
}

// ============================================================================
// Array items
// ============================================================================

const ABANDON_MINSIZE: u32 = 256;
const FAST_RESIZE_LIMIT: u32 = 9;

/// Whether an items part of `size` slots with `used` live ones is too sparse.
pub(crate) fn density_check(used: u32, size: u32, limit: u32) -> bool {
    size >= ABANDON_MINSIZE && used < limit.saturating_mul(size >> 3)
}

/// Resize the array-items part to exactly `new_len` slots, filling new ones
/// with `Unused`.
pub fn resize_items(heap: &Heap, obj: &ObjRef, new_len: u32) -> Result<(), JsError> {
    let bytes = slot(new_len).saturating_mul(mem::size_of::<Value>());
    let _critical = heap.start_critical();
    let current = || obj.try_borrow().map(|o| o.items.block.size()).unwrap_or(0);
    heap.mem_realloc_indirect_checked(&current, bytes)?;

    let dropped = {
        let mut o = obj.try_borrow_mut().ok_or_else(busy)?;
        log::trace!(
            "store: resize items of object {}: {} -> {}",
            obj.id(),
            o.items.len(),
            new_len
        );
        o.items.block.commit_resize(heap.allocator(), bytes);
        let dropped = if slot(new_len) < o.items.values.len() {
            o.items.values.split_off(slot(new_len))
        } else {
            Vec::new()
        };
        o.items.values.resize(slot(new_len), Value::Unused);
        o.items.values.shrink_to_fit();
        dropped
    };
    drop(dropped);
    Ok(())
}

/// Move every used array item into the index-properties part as a WEC data
/// property and drop the items part. One-way.
pub fn abandon_array_items(heap: &Heap, obj: &ObjRef) -> Result<(), JsError> {
    let (has_items, used, idx_live) = {
        let o = obj.try_borrow().ok_or_else(busy)?;
        (o.has_array_items(), o.items.stats().0, o.idxprops.live_count())
    };
    if !has_items {
        return Ok(());
    }
    let needed = idx_live.saturating_add(used);
    let room = {
        let o = obj.try_borrow().ok_or_else(busy)?;
        o.idxprops.capacity().saturating_sub(o.idxprops.next())
    };
    if room < used {
        realloc_part::<IdxPart>(heap, obj, needed)?;
    }

    let old_items = {
        let mut o = obj.try_borrow_mut().ok_or_else(busy)?;
        let items = mem::take(&mut o.items);
        o.set_array_items(false);
        for (i, v) in items.values.iter().enumerate() {
            if v.is_unused() {
                continue;
            }
            let idx = u32::try_from(i).unwrap_or(u32::MAX);
            if o.idxprops.find(&idx).is_none() {
                o.idxprops
                    .push_entry(idx, PropValue::Data(v.clone()), attrs::WEC);
            }
        }
        items
    };
    log::trace!(
        "store: abandoned {} array items of object {}",
        used,
        obj.id()
    );
    drop(old_items);
    Ok(())
}

/// Make `items[idx]` writable, growing the items part when the array stays
/// dense enough. `Ok(false)` means the object has (or now has) no items part
/// and the index must be stored as an index property.
pub fn obtain_arridx_slot(heap: &Heap, obj: &ObjRef, idx: u32) -> Result<bool, JsError> {
    let (has_items, len) = {
        let o = obj.try_borrow().ok_or_else(busy)?;
        (o.has_array_items(), o.items.len())
    };
    if !has_items {
        return Ok(false);
    }
    if idx < len {
        return Ok(true);
    }
    let min_len = idx.saturating_add(1);
    let slow_check = min_len >= ABANDON_MINSIZE
        && idx > FAST_RESIZE_LIMIT.saturating_mul(len.saturating_add(7) >> 3);
    if slow_check {
        let used = obj.try_borrow().ok_or_else(busy)?.items.stats().0;
        if density_check(used, idx, heap.config().abandon_limit) {
            log::trace!(
                "store: write to index {} would make object {} too sparse",
                idx,
                obj.id()
            );
            abandon_array_items(heap, obj)?;
            return Ok(false);
        }
    }
    let new_len = min_len.saturating_add(grow_step(min_len));
    resize_items(heap, obj, new_len)?;
    Ok(true)
}

/// Shrink every part to its live content. Sparse items are abandoned.
pub fn compact(heap: &Heap, obj: &ObjRef) -> Result<(), JsError> {
    let (str_live, has_items, used, min_size) = {
        let o = obj.try_borrow().ok_or_else(busy)?;
        let (used, min_size) = o.items.stats();
        (o.strprops.live_count(), o.has_array_items(), used, min_size)
    };
    realloc_part::<StrPart>(heap, obj, str_live)?;
    if has_items {
        if density_check(used, min_size, heap.config().abandon_limit) {
            abandon_array_items(heap, obj)?;
        } else {
            resize_items(heap, obj, min_size)?;
        }
    }
    let idx_live = obj.try_borrow().ok_or_else(busy)?.idxprops.live_count();
    realloc_part::<IdxPart>(heap, obj, idx_live)?;
    log::trace!("store: compacted object {}", obj.id());
    Ok(())
}
