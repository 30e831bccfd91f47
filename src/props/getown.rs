//! [[GetOwnProperty]] with exotic dispatch.
//!
//! [`getown_unsafe`] classifies a lookup without allocating or calling user
//! code. The safe path pins the object on the value stack, finishes what the
//! unsafe path cannot (character strings, proxy traps) and follows proxy
//! targets.

use crate::error::JsError;
use crate::object::lookup;
use crate::object::{HObject, ObjRef, ObjectClass, PropValue, ProxyData, attrs};
use crate::props::{
    PropertyDescriptor, arguments, pinned, proxy, push_propdesc, read, with_pinned,
};
use crate::thread::Thread;
use crate::value::{PropKey, Value};

/// Outcome of a lookup that ran no side effects.
#[derive(Debug, Clone)]
pub(crate) enum OwnLookup {
    Found(PropertyDescriptor),
    /// Character of a String object, still to be interned
    Char(char),
    NotFound,
    /// Not found, and the class forbids any further lookup (no inheritance)
    Captured,
    /// Proxies need the safe path
    Proxy(ProxyData),
}

fn stored(obj: &HObject, key: &PropKey) -> OwnLookup {
    match lookup::get_own_stored(obj, key) {
        Some((value, flags)) => OwnLookup::Found(PropertyDescriptor::new(value, flags)),
        None => OwnLookup::NotFound,
    }
}

fn virtual_data(value: Value, flags: u8) -> OwnLookup {
    OwnLookup::Found(PropertyDescriptor::new(PropValue::Data(value), flags))
}

/// Own property lookup without side effects.
pub(crate) fn getown_unsafe(obj: &HObject, key: &PropKey) -> OwnLookup {
    match &obj.class {
        ObjectClass::Array { length } if key.is_length() => {
            let flags = if obj.is_length_writable() {
                attrs::W
            } else {
                attrs::NONE
            };
            virtual_data(Value::from(*length), flags)
        }
        ObjectClass::StringObject(s) => match key {
            PropKey::Str(k) if k.is_length() => virtual_data(Value::from(s.charlen()), attrs::NONE),
            PropKey::Index(idx) if *idx < s.charlen() => match s.char_at(*idx) {
                Some(c) => OwnLookup::Char(c),
                None => OwnLookup::NotFound,
            },
            _ => stored(obj, key),
        },
        ObjectClass::TypedArray(view) => match key {
            PropKey::Str(k) if k.is_length() => {
                virtual_data(Value::from(view.effective_length()), attrs::NONE)
            }
            PropKey::Index(idx) => match view.get(*idx) {
                Some(n) => virtual_data(Value::Number(n), attrs::WEC),
                None => OwnLookup::Captured,
            },
            PropKey::Str(k) if k.is_canonical_numeric() => OwnLookup::Captured,
            PropKey::Str(_) => stored(obj, key),
        },
        ObjectClass::Arguments(_) => {
            let found = stored(obj, key);
            match (found, key) {
                (OwnLookup::Found(desc), PropKey::Index(idx)) if !desc.is_accessor() => {
                    match arguments::mapped_value(obj, *idx) {
                        Some(live) => OwnLookup::Found(PropertyDescriptor::new(
                            PropValue::Data(live),
                            desc.attrs,
                        )),
                        None => OwnLookup::Found(desc),
                    }
                }
                (other, _) => other,
            }
        }
        ObjectClass::Proxy(data) => OwnLookup::Proxy(data.clone()),
        _ => stored(obj, key),
    }
}

/// Own property descriptor of `obj[key]`, running proxy traps as needed.
pub fn getown_desc(
    thr: &mut Thread,
    obj: &ObjRef,
    key: &PropKey,
) -> Result<Option<PropertyDescriptor>, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    with_pinned(thr, obj, |thr, slot| {
        let mut cur = pinned(thr, slot)?;
        for _ in 0..limit {
            let found = getown_unsafe(&*read(&cur)?, key);
            match found {
                OwnLookup::Found(desc) => return Ok(Some(desc)),
                OwnLookup::Char(c) => {
                    let mut buf = [0u8; 4];
                    let s = thr.heap().intern(c.encode_utf8(&mut buf))?;
                    return Ok(Some(PropertyDescriptor::new(
                        PropValue::Data(Value::String(s)),
                        attrs::E,
                    )));
                }
                OwnLookup::NotFound | OwnLookup::Captured => return Ok(None),
                OwnLookup::Proxy(data) => {
                    let (target, handler) = proxy::parts(&data)?;
                    match proxy::get_trap(thr, &handler, "getOwnPropertyDescriptor")? {
                        Some(trap) => {
                            return proxy::getown_trap(thr, &trap, &handler, &target, key);
                        }
                        None => {
                            thr.replace_at(slot, Value::Object(target.clone()));
                            cur = target;
                        }
                    }
                }
            }
        }
        log::warn!("getown: proxy chain exceeds sanity limit");
        Err(JsError::range_error("proxy chain too long"))
    })
}

/// [[GetOwnProperty]] in the descriptor convention: pushes the values and
/// returns the attribute byte, or returns -1 with nothing pushed.
pub fn getown(thr: &mut Thread, obj: &ObjRef, key: &PropKey) -> Result<i32, JsError> {
    match getown_desc(thr, obj, key)? {
        Some(desc) => Ok(push_propdesc(thr, &desc)),
        None => Ok(-1),
    }
}
