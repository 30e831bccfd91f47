//! Slot lookup over the property parts.

use crate::object::store::PropValue;
use crate::object::HObject;
use crate::value::{HString, PropKey, Value};

/// Where an own property lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Dense array item at this index
    Item(u32),
    /// Index-properties slot
    Idx(u32),
    /// Entries-part slot
    Str(u32),
}

/// Find a string/symbol key in the entries part.
pub fn lookup_strprop(obj: &HObject, key: &HString) -> Option<u32> {
    obj.strprops.find(key)
}

/// Find an index key in the index-properties part. Dense array items are
/// checked by the caller first.
pub fn lookup_idxprop(obj: &HObject, idx: u32) -> Option<u32> {
    obj.idxprops.find(&idx)
}

/// Dense array item at `idx`, unless out of range or unused.
pub fn lookup_item(obj: &HObject, idx: u32) -> Option<&Value> {
    if !obj.has_array_items() {
        return None;
    }
    obj.items.get(idx).filter(|v| !v.is_unused())
}

/// Locate a stored (non-virtual) own property.
pub fn find_slot(obj: &HObject, key: &PropKey) -> Option<Slot> {
    match key {
        PropKey::Index(idx) => {
            if lookup_item(obj, *idx).is_some() {
                return Some(Slot::Item(*idx));
            }
            lookup_idxprop(obj, *idx).map(Slot::Idx)
        }
        PropKey::Str(s) => lookup_strprop(obj, s).map(Slot::Str),
    }
}

/// Value and attributes of a stored slot. Array items are WEC data.
pub fn slot_value(obj: &HObject, slot: Slot) -> Option<(PropValue, u8)> {
    match slot {
        Slot::Item(idx) => lookup_item(obj, idx)
            .map(|v| (PropValue::Data(v.clone()), crate::object::attrs::WEC)),
        Slot::Idx(i) => obj
            .idxprops
            .value_at(i)
            .map(|v| (v.clone(), obj.idxprops.attrs_at(i))),
        Slot::Str(i) => obj
            .strprops
            .value_at(i)
            .map(|v| (v.clone(), obj.strprops.attrs_at(i))),
    }
}

/// Attributes of a stored slot.
pub fn slot_attrs(obj: &HObject, slot: Slot) -> u8 {
    match slot {
        Slot::Item(_) => crate::object::attrs::WEC,
        Slot::Idx(i) => obj.idxprops.attrs_at(i),
        Slot::Str(i) => obj.strprops.attrs_at(i),
    }
}

/// Plain own-property lookup: value and attributes of a stored property.
pub fn get_own_stored(obj: &HObject, key: &PropKey) -> Option<(PropValue, u8)> {
    find_slot(obj, key).and_then(|slot| slot_value(obj, slot))
}
