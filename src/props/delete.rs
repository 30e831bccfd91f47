//! [[Delete]] and the `delete` operator.

use crate::error::{JsError, MSG_NOT_CONFIGURABLE, MSG_PROXY_REJECTED};
use crate::object::lookup::{self, Slot};
use crate::object::{ObjRef, ObjectClass, PropValue, ProxyData, attrs};
use crate::prelude::*;
use crate::props::{arguments, fail, pinned, proxy, read, to_prop_key, with_pinned, write};
use crate::thread::Thread;
use crate::value::{PropKey, Value};

/// Remove a stored property. Absent keys delete successfully.
fn delete_stored(obj: &ObjRef, key: &PropKey, strict: bool) -> Result<bool, JsError> {
    let slot = {
        let o = read(obj)?;
        match lookup::find_slot(&o, key) {
            Some(slot) => {
                if lookup::slot_attrs(&o, slot) & attrs::CONFIGURABLE == 0 {
                    return fail(strict, MSG_NOT_CONFIGURABLE);
                }
                slot
            }
            None => return Ok(true),
        }
    };
    let old = {
        let mut o = write(obj)?;
        match slot {
            Slot::Item(idx) => o
                .items
                .get_mut(idx)
                .map(|v| mem::replace(v, Value::Unused))
                .map(PropValue::Data),
            Slot::Idx(i) => o.idxprops.delete_at(i),
            Slot::Str(i) => o.strprops.delete_at(i),
        }
    };
    drop(old);
    Ok(true)
}

enum DeleteTarget {
    Proxy(ProxyData),
    /// Key names a virtual, non-configurable property
    Virtual,
    /// Typed array key that never reaches the stored parts
    Captured,
    Arguments,
    Ordinary,
}

fn classify(class: &ObjectClass, key: &PropKey) -> DeleteTarget {
    match class {
        ObjectClass::Proxy(data) => DeleteTarget::Proxy(data.clone()),
        ObjectClass::Array { .. } if key.is_length() => DeleteTarget::Virtual,
        ObjectClass::StringObject(s) => match key {
            PropKey::Str(k) if k.is_length() => DeleteTarget::Virtual,
            PropKey::Index(idx) if *idx < s.charlen() => DeleteTarget::Virtual,
            _ => DeleteTarget::Ordinary,
        },
        ObjectClass::TypedArray(view) => match key {
            PropKey::Str(k) if k.is_length() => DeleteTarget::Virtual,
            PropKey::Index(idx) if view.get(*idx).is_some() => DeleteTarget::Virtual,
            PropKey::Index(_) => DeleteTarget::Captured,
            PropKey::Str(k) if k.is_canonical_numeric() => DeleteTarget::Captured,
            PropKey::Str(_) => DeleteTarget::Ordinary,
        },
        ObjectClass::Arguments(_) => DeleteTarget::Arguments,
        _ => DeleteTarget::Ordinary,
    }
}

/// Delete `obj[key]`. A refused delete returns `Ok(false)`, or a TypeError
/// when `strict`.
pub fn delete_prop(thr: &mut Thread, obj: &ObjRef, key: &PropKey, strict: bool) -> Result<bool, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    with_pinned(thr, obj, |thr, slot| {
        let mut cur = pinned(thr, slot)?;
        for _ in 0..limit {
            let target = classify(&read(&cur)?.class, key);
            match target {
                DeleteTarget::Proxy(data) => {
                    let (target, handler) = proxy::parts(&data)?;
                    match proxy::get_trap(thr, &handler, "deleteProperty")? {
                        Some(trap) => {
                            if proxy::delete_trap(thr, &trap, &handler, &target, key)? {
                                return Ok(true);
                            }
                            return fail(strict, MSG_PROXY_REJECTED);
                        }
                        None => {
                            thr.replace_at(slot, Value::Object(target.clone()));
                            cur = target;
                        }
                    }
                }
                DeleteTarget::Virtual => return fail(strict, MSG_NOT_CONFIGURABLE),
                DeleteTarget::Captured => return Ok(true),
                DeleteTarget::Arguments => {
                    let deleted = delete_stored(&cur, key, strict)?;
                    if deleted {
                        if let PropKey::Index(idx) = key {
                            arguments::unmap(&cur, *idx)?;
                        }
                    }
                    return Ok(deleted);
                }
                DeleteTarget::Ordinary => return delete_stored(&cur, key, strict),
            }
        }
        log::warn!("delete: proxy chain exceeds sanity limit");
        Err(JsError::range_error("proxy chain too long"))
    })
}

/// `delete base[key]` for any base value.
pub fn delete_value(thr: &mut Thread, base: &Value, key: &Value, strict: bool) -> Result<bool, JsError> {
    let heap = thr.heap().clone();
    match base {
        Value::Unused | Value::Undefined | Value::Null => Err(JsError::type_error(format!(
            "cannot delete property {} of {}",
            key.to_display_string(),
            base.to_display_string()
        ))),
        Value::Object(obj) => {
            let key = to_prop_key(&heap, key)?;
            delete_prop(thr, obj, &key, strict)
        }
        Value::String(s) if !s.is_symbol() => {
            let key = to_prop_key(&heap, key)?;
            let own = match &key {
                PropKey::Str(k) => k.is_length(),
                PropKey::Index(idx) => *idx < s.charlen(),
            };
            if own {
                fail(strict, MSG_NOT_CONFIGURABLE)
            } else {
                Ok(true)
            }
        }
        Value::Buffer(buf) => {
            let key = to_prop_key(&heap, key)?;
            let own = match &key {
                PropKey::Str(k) => k.is_length(),
                PropKey::Index(idx) => usize::try_from(*idx).is_ok_and(|i| i < buf.len()),
            };
            if own {
                fail(strict, MSG_NOT_CONFIGURABLE)
            } else {
                Ok(true)
            }
        }
        _ => {
            // Coerce anyway so invalid keys still throw.
            to_prop_key(&heap, key)?;
            Ok(true)
        }
    }
}
