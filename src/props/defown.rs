//! [[DefineOwnProperty]] with exotic dispatch.

use crate::error::{JsError, MSG_DEFINE_REJECTED, MSG_NOT_EXTENSIBLE, MSG_PROXY_REJECTED};
use crate::heap::Heap;
use crate::object::lookup::{self, Slot};
use crate::object::store::{self, IdxPart, StrPart};
use crate::object::{HObject, ObjRef, ObjectClass, PropValue, ProxyData, TypedArrayView, attrs};
use crate::prelude::*;
use crate::props::{
    PropDesc, PropertyDescriptor, arguments, array, defprop, fail, pinned, proxy, read, with_pinned,
    write,
};
use crate::thread::Thread;
use crate::value::{HString, PropKey, Value};

const MSG_LENGTH_NOT_WRITABLE: &str = "length not writable";

fn same_fn(a: Option<&ObjRef>, b: Option<&ObjRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => ObjRef::ptr_eq(x, y),
        _ => false,
    }
}

/// Whether `desc` may be applied to an existing property `current`
/// (ValidateAndApplyPropertyDescriptor without the apply step).
pub fn is_compatible(current: &PropertyDescriptor, desc: &PropDesc) -> bool {
    if current.configurable() {
        return true;
    }
    if desc.has(defprop::HAVE_CONFIGURABLE) && desc.has(defprop::CONFIGURABLE) {
        return false;
    }
    if desc.has(defprop::HAVE_ENUMERABLE) && desc.has(defprop::ENUMERABLE) != current.enumerable() {
        return false;
    }
    if desc.is_generic_desc() {
        return true;
    }
    if desc.is_accessor_desc() != current.is_accessor() {
        return false;
    }
    if current.is_accessor() {
        if desc.has(defprop::HAVE_GETTER) && !same_fn(desc.get.as_ref(), current.getter()) {
            return false;
        }
        return !desc.has(defprop::HAVE_SETTER) || same_fn(desc.set.as_ref(), current.setter());
    }
    if current.writable() {
        return true;
    }
    if desc.has(defprop::HAVE_WRITABLE) && desc.has(defprop::WRITABLE) {
        return false;
    }
    !desc.has(defprop::HAVE_VALUE)
        || Value::same_value(&desc.value, current.data().unwrap_or(&Value::Undefined))
}

fn set_bit(flags: &mut u8, bit: u8, on: bool) {
    if on {
        *flags |= bit;
    } else {
        *flags &= !bit;
    }
}

/// Apply `desc` over `current`, or over the defaults of a new property.
/// Data/accessor conversion keeps only enumerable and configurable.
fn merged(current: Option<&PropertyDescriptor>, desc: &PropDesc) -> (PropValue, u8) {
    let empty_accessor = PropValue::Accessor {
        get: None,
        set: None,
    };
    let (mut value, mut flags) = match current {
        Some(cur) if desc.is_accessor_desc() && !cur.is_accessor() => {
            (empty_accessor, cur.attrs & attrs::EC)
        }
        Some(cur) if desc.is_data_desc() && cur.is_accessor() => {
            (PropValue::default(), cur.attrs & attrs::EC)
        }
        Some(cur) => (cur.value.clone(), cur.attrs),
        None if desc.is_accessor_desc() => (empty_accessor, attrs::NONE),
        None => (PropValue::default(), attrs::NONE),
    };
    match &mut value {
        PropValue::Data(v) => {
            if desc.has(defprop::HAVE_VALUE) {
                *v = if desc.value.is_unused() {
                    Value::Undefined
                } else {
                    desc.value.clone()
                };
            }
            if desc.has(defprop::HAVE_WRITABLE) {
                set_bit(&mut flags, attrs::WRITABLE, desc.has(defprop::WRITABLE));
            }
            flags &= !attrs::ACCESSOR;
        }
        PropValue::Accessor { get, set } => {
            if desc.has(defprop::HAVE_GETTER) {
                *get = desc.get.clone();
            }
            if desc.has(defprop::HAVE_SETTER) {
                *set = desc.set.clone();
            }
            flags = (flags & !attrs::WRITABLE) | attrs::ACCESSOR;
        }
    }
    if desc.has(defprop::HAVE_ENUMERABLE) {
        set_bit(&mut flags, attrs::ENUMERABLE, desc.has(defprop::ENUMERABLE));
    }
    if desc.has(defprop::HAVE_CONFIGURABLE) {
        set_bit(&mut flags, attrs::CONFIGURABLE, desc.has(defprop::CONFIGURABLE));
    }
    (value, flags)
}

// ═══════════════════════════════════════════════════════════════
// Storage updates
// ═══════════════════════════════════════════════════════════════

fn write_item(obj: &ObjRef, idx: u32, value: Value) -> Result<(), JsError> {
    let old = write(obj)?
        .items
        .get_mut(idx)
        .map(|slot| mem::replace(slot, value));
    drop(old);
    Ok(())
}

fn write_slot(obj: &ObjRef, slot: Slot, value: PropValue, flags: u8) -> Result<(), JsError> {
    let old = {
        let mut o = write(obj)?;
        match slot {
            Slot::Idx(i) => {
                o.idxprops.set_attrs(i, flags);
                o.idxprops.value_at_mut(i).map(|v| mem::replace(v, value))
            }
            Slot::Str(i) => {
                o.strprops.set_attrs(i, flags);
                o.strprops.value_at_mut(i).map(|v| mem::replace(v, value))
            }
            Slot::Item(_) => return Err(JsError::internal_error("item slot written as property")),
        }
    };
    drop(old);
    Ok(())
}

/// Store an updated existing property. Items that stop being plain WEC data
/// force the array out of items mode.
fn update_slot(
    heap: &Heap,
    obj: &ObjRef,
    key: &PropKey,
    slot: Slot,
    value: PropValue,
    flags: u8,
) -> Result<(), JsError> {
    let Slot::Item(idx) = slot else {
        return write_slot(obj, slot, value, flags);
    };
    match value {
        PropValue::Data(v) if flags == attrs::WEC => write_item(obj, idx, v),
        value => {
            store::abandon_array_items(heap, obj)?;
            let moved = lookup::find_slot(&*read(obj)?, key)
                .ok_or_else(|| JsError::internal_error("item lost while abandoning"))?;
            write_slot(obj, moved, value, flags)
        }
    }
}

/// Add a new property.
fn add_prop(
    heap: &Heap,
    obj: &ObjRef,
    key: &PropKey,
    value: PropValue,
    flags: u8,
) -> Result<(), JsError> {
    let idx = match key {
        PropKey::Str(s) => {
            store::insert_prop::<StrPart>(heap, obj, s.clone(), value, flags)?;
            return Ok(());
        }
        PropKey::Index(idx) => *idx,
    };
    if read(obj)?.has_array_items() {
        match &value {
            PropValue::Data(v) if flags == attrs::WEC => {
                if store::obtain_arridx_slot(heap, obj, idx)? {
                    return write_item(obj, idx, v.clone());
                }
            }
            _ => store::abandon_array_items(heap, obj)?,
        }
    }
    store::insert_prop::<IdxPart>(heap, obj, idx, value, flags)?;
    Ok(())
}

/// OrdinaryDefineOwnProperty over the stored parts.
pub(crate) fn define_ordinary(
    heap: &Heap,
    obj: &ObjRef,
    key: &PropKey,
    desc: &PropDesc,
) -> Result<bool, JsError> {
    let throw = desc.throws();
    let force = desc.has(defprop::FORCE);
    let (slot, current, extensible) = {
        let o = read(obj)?;
        let slot = lookup::find_slot(&o, key);
        let current = slot
            .and_then(|s| lookup::slot_value(&o, s))
            .map(|(v, a)| PropertyDescriptor::new(v, a));
        (slot, current, o.is_extensible())
    };
    match (slot, current) {
        (Some(slot), Some(current)) => {
            if !force && !is_compatible(&current, desc) {
                return fail(throw, MSG_DEFINE_REJECTED);
            }
            let (value, flags) = merged(Some(&current), desc);
            update_slot(heap, obj, key, slot, value, flags)?;
        }
        _ => {
            if !extensible && !force {
                return fail(throw, MSG_NOT_EXTENSIBLE);
            }
            let (value, flags) = merged(None, desc);
            add_prop(heap, obj, key, value, flags)?;
        }
    }
    Ok(true)
}

// ═══════════════════════════════════════════════════════════════
// Exotic classes
// ═══════════════════════════════════════════════════════════════

/// Virtual properties never change; only compatible no-op defines succeed.
fn define_virtual(current: PropertyDescriptor, desc: &PropDesc) -> Result<bool, JsError> {
    if is_compatible(&current, desc) {
        Ok(true)
    } else {
        fail(desc.throws(), MSG_DEFINE_REJECTED)
    }
}

fn define_array_length(heap: &Heap, obj: &ObjRef, desc: &PropDesc) -> Result<bool, JsError> {
    let throw = desc.throws();
    if desc.is_accessor_desc()
        || (desc.has(defprop::HAVE_CONFIGURABLE) && desc.has(defprop::CONFIGURABLE))
        || (desc.has(defprop::HAVE_ENUMERABLE) && desc.has(defprop::ENUMERABLE))
    {
        return fail(throw, MSG_DEFINE_REJECTED);
    }
    let new_len = if desc.has(defprop::HAVE_VALUE) {
        Some(array::to_array_length(&desc.value)?)
    } else {
        None
    };
    let wants_writable = desc.has(defprop::HAVE_WRITABLE) && desc.has(defprop::WRITABLE);
    let wants_readonly = desc.has(defprop::HAVE_WRITABLE) && !desc.has(defprop::WRITABLE);
    let (old_len, writable) = {
        let o = read(obj)?;
        (o.array_length().unwrap_or(0), o.is_length_writable())
    };

    if !writable {
        if wants_writable || new_len.is_some_and(|n| n != old_len) {
            return fail(throw, MSG_DEFINE_REJECTED);
        }
        return Ok(true);
    }
    let Some(new_len) = new_len else {
        if wants_readonly {
            write(obj)?.set_length_nonwritable();
        }
        return Ok(true);
    };

    let reached = array::shrink(heap, obj, old_len, new_len)?;
    {
        let mut o = write(obj)?;
        o.set_array_length(reached);
        if wants_readonly {
            o.set_length_nonwritable();
        }
    }
    if reached != new_len {
        return fail(throw, MSG_DEFINE_REJECTED);
    }
    Ok(true)
}

fn define_array(heap: &Heap, obj: &ObjRef, key: &PropKey, desc: &PropDesc) -> Result<bool, JsError> {
    let idx = match key {
        PropKey::Str(s) if s.is_length() => return define_array_length(heap, obj, desc),
        PropKey::Str(_) => return define_ordinary(heap, obj, key, desc),
        PropKey::Index(idx) => *idx,
    };
    let beyond_frozen_length = {
        let o = read(obj)?;
        idx >= o.array_length().unwrap_or(0) && !o.is_length_writable()
    };
    if beyond_frozen_length {
        return fail(desc.throws(), MSG_LENGTH_NOT_WRITABLE);
    }
    let ok = define_ordinary(heap, obj, key, desc)?;
    if ok {
        array::note_index_write(obj, idx)?;
    }
    Ok(ok)
}

fn define_string_object(
    heap: &Heap,
    obj: &ObjRef,
    s: &HString,
    key: &PropKey,
    desc: &PropDesc,
) -> Result<bool, JsError> {
    match key {
        PropKey::Str(k) if k.is_length() => define_virtual(
            PropertyDescriptor::new(PropValue::Data(Value::from(s.charlen())), attrs::NONE),
            desc,
        ),
        PropKey::Index(idx) if *idx < s.charlen() => {
            let mut buf = [0u8; 4];
            let text = match s.char_at(*idx) {
                Some(c) => heap.intern(c.encode_utf8(&mut buf))?,
                None => return fail(desc.throws(), MSG_DEFINE_REJECTED),
            };
            define_virtual(
                PropertyDescriptor::new(PropValue::Data(Value::String(text)), attrs::E),
                desc,
            )
        }
        _ => define_ordinary(heap, obj, key, desc),
    }
}

fn define_typed_array(
    heap: &Heap,
    obj: &ObjRef,
    view: &TypedArrayView,
    key: &PropKey,
    desc: &PropDesc,
) -> Result<bool, JsError> {
    let throw = desc.throws();
    match key {
        PropKey::Str(k) if k.is_length() => define_virtual(
            PropertyDescriptor::new(
                PropValue::Data(Value::from(view.effective_length())),
                attrs::NONE,
            ),
            desc,
        ),
        PropKey::Index(idx) => {
            let refused = |have: u16, bit: u16| desc.has(have) && !desc.has(bit);
            if view.get(*idx).is_none()
                || desc.is_accessor_desc()
                || refused(defprop::HAVE_CONFIGURABLE, defprop::CONFIGURABLE)
                || refused(defprop::HAVE_ENUMERABLE, defprop::ENUMERABLE)
                || refused(defprop::HAVE_WRITABLE, defprop::WRITABLE)
            {
                return fail(throw, MSG_DEFINE_REJECTED);
            }
            if desc.has(defprop::HAVE_VALUE) {
                view.set(*idx, desc.value.to_number());
            }
            Ok(true)
        }
        PropKey::Str(k) if k.is_canonical_numeric() => fail(throw, MSG_DEFINE_REJECTED),
        PropKey::Str(_) => define_ordinary(heap, obj, key, desc),
    }
}

fn define_arguments(
    heap: &Heap,
    obj: &ObjRef,
    key: &PropKey,
    desc: &PropDesc,
) -> Result<bool, JsError> {
    let PropKey::Index(idx) = key else {
        return define_ordinary(heap, obj, key, desc);
    };
    if !arguments::is_mapped(&*read(obj)?, *idx) {
        return define_ordinary(heap, obj, key, desc);
    }
    let mut desc = desc.clone();
    let freezing = desc.has(defprop::HAVE_WRITABLE) && !desc.has(defprop::WRITABLE);
    if desc.is_data_desc() && !desc.has(defprop::HAVE_VALUE) && freezing {
        if let Some(live) = arguments::mapped_value(&*read(obj)?, *idx) {
            desc = desc.value(live);
        }
    }
    if !define_ordinary(heap, obj, key, &desc)? {
        return Ok(false);
    }
    if desc.is_accessor_desc() {
        arguments::unmap(obj, *idx)?;
    } else {
        if desc.has(defprop::HAVE_VALUE) {
            arguments::write_mapped(obj, *idx, desc.value.clone())?;
        }
        if freezing {
            arguments::unmap(obj, *idx)?;
        }
    }
    Ok(true)
}

/// Class of an object as far as define is concerned.
enum DefineTarget {
    Proxy(ProxyData),
    Array,
    StringObject(HString),
    TypedArray(TypedArrayView),
    Arguments,
    Ordinary,
}

fn classify(o: &HObject) -> DefineTarget {
    match &o.class {
        ObjectClass::Proxy(data) => DefineTarget::Proxy(data.clone()),
        ObjectClass::Array { .. } => DefineTarget::Array,
        ObjectClass::StringObject(s) => DefineTarget::StringObject(s.clone()),
        ObjectClass::TypedArray(view) => DefineTarget::TypedArray(view.clone()),
        ObjectClass::Arguments(_) => DefineTarget::Arguments,
        _ => DefineTarget::Ordinary,
    }
}

/// [[DefineOwnProperty]]. A refused define returns `Ok(false)`, or a
/// TypeError when the descriptor carries `THROW`.
pub fn defown(thr: &mut Thread, obj: &ObjRef, key: &PropKey, desc: &PropDesc) -> Result<bool, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    let heap = thr.heap().clone();
    with_pinned(thr, obj, |thr, slot| {
        let mut cur = pinned(thr, slot)?;
        for _ in 0..limit {
            let target = classify(&*read(&cur)?);
            match target {
                DefineTarget::Proxy(data) => {
                    let (target, handler) = proxy::parts(&data)?;
                    match proxy::get_trap(thr, &handler, "defineProperty")? {
                        Some(trap) => {
                            if proxy::define_trap(thr, &trap, &handler, &target, key, desc)? {
                                return Ok(true);
                            }
                            return fail(desc.throws(), MSG_PROXY_REJECTED);
                        }
                        None => {
                            thr.replace_at(slot, Value::Object(target.clone()));
                            cur = target;
                        }
                    }
                }
                DefineTarget::Array => return define_array(&heap, &cur, key, desc),
                DefineTarget::StringObject(s) => {
                    return define_string_object(&heap, &cur, &s, key, desc);
                }
                DefineTarget::TypedArray(view) => {
                    return define_typed_array(&heap, &cur, &view, key, desc);
                }
                DefineTarget::Arguments => return define_arguments(&heap, &cur, key, desc),
                DefineTarget::Ordinary => return define_ordinary(&heap, &cur, key, desc),
            }
        }
        log::warn!("defown: proxy chain exceeds sanity limit");
        Err(JsError::range_error("proxy chain too long"))
    })
}
