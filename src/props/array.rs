//! Array exotic behaviour: `length` coercion and shrinking.

use crate::error::{JsError, MSG_INVALID_ARRAY_LENGTH};
use crate::heap::Heap;
use crate::object::store;
use crate::object::{ObjRef, attrs};
use crate::prelude::*;
use crate::props::{read, write};
use crate::value::{Value, to_uint32};

/// ToArrayLength: a number that survives ToUint32 unchanged.
pub fn to_array_length(value: &Value) -> Result<u32, JsError> {
    let n = value.to_number();
    let len = to_uint32(n);
    if f64::from(len) == n {
        Ok(len)
    } else {
        Err(JsError::range_error(MSG_INVALID_ARRAY_LENGTH))
    }
}

/// Delete every index `>= new_len`, highest first, stopping at the first
/// non-configurable one. Returns the length actually reached; the caller
/// stores it.
pub(crate) fn shrink(heap: &Heap, obj: &ObjRef, old_len: u32, new_len: u32) -> Result<u32, JsError> {
    if new_len >= old_len {
        return Ok(new_len);
    }
    let has_items = read(obj)?.has_array_items();
    if has_items {
        // Items are always configurable.
        let items_len = read(obj)?.items.len();
        if items_len > new_len {
            store::resize_items(heap, obj, new_len)?;
        }
    }

    let mut doomed: Vec<(u32, u8)> = read(obj)?
        .idxprops
        .iter()
        .filter(|(_, idx, _, _)| **idx >= new_len)
        .map(|(_, idx, _, a)| (*idx, a))
        .collect();
    doomed.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    let mut reached = new_len;
    let mut removed = Vec::with_capacity(doomed.len());
    {
        let mut o = write(obj)?;
        for (idx, flags) in doomed {
            if flags & attrs::CONFIGURABLE == 0 {
                reached = idx.saturating_add(1);
                break;
            }
            if let Some(slot) = o.idxprops.find(&idx) {
                removed.push(o.idxprops.delete_at(slot));
            }
        }
    }
    log::trace!(
        "array: object {} length {} -> {} ({} sparse indices removed)",
        obj.id(),
        old_len,
        reached,
        removed.len()
    );
    drop(removed);
    Ok(reached)
}

/// Grow `length` to cover a newly written index.
pub(crate) fn note_index_write(obj: &ObjRef, idx: u32) -> Result<(), JsError> {
    let mut o = write(obj)?;
    if let Some(length) = o.array_length() {
        if idx >= length {
            o.set_array_length(idx.saturating_add(1));
        }
    }
    Ok(())
}
