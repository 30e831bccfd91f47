//! [[Get]]: own lookup up the prototype chain, getters and the proxy `get`
//! trap.

use crate::error::JsError;
use crate::object::{ObjRef, PropValue};
use crate::props::getown::{OwnLookup, getown_unsafe};
use crate::props::{PropertyDescriptor, pinned, proxy, read, with_pinned};
use crate::thread::Thread;
use crate::value::{PropKey, Value};

fn char_value(thr: &Thread, c: char) -> Result<Value, JsError> {
    let mut buf = [0u8; 4];
    Ok(Value::String(thr.heap().intern(c.encode_utf8(&mut buf))?))
}

fn property_value(
    thr: &mut Thread,
    desc: PropertyDescriptor,
    receiver: &Value,
) -> Result<Value, JsError> {
    match desc.value {
        PropValue::Data(v) => Ok(v),
        PropValue::Accessor { get: Some(getter), .. } => {
            thr.call(&Value::Object(getter), receiver, &[])
        }
        PropValue::Accessor { get: None, .. } => Ok(Value::Undefined),
    }
}

/// `obj[key]` with `receiver` as `this` for getters.
pub fn get_object(
    thr: &mut Thread,
    obj: &ObjRef,
    key: &PropKey,
    receiver: &Value,
) -> Result<Value, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    with_pinned(thr, obj, |thr, slot| {
        let mut cur = pinned(thr, slot)?;
        for _ in 0..limit {
            let found = getown_unsafe(&*read(&cur)?, key);
            let next = match found {
                OwnLookup::Found(desc) => return property_value(thr, desc, receiver),
                OwnLookup::Char(c) => return char_value(thr, c),
                OwnLookup::Captured => return Ok(Value::Undefined),
                OwnLookup::NotFound => match read(&cur)?.prototype.clone() {
                    Some(proto) => proto,
                    None => return Ok(Value::Undefined),
                },
                OwnLookup::Proxy(data) => {
                    let (target, handler) = proxy::parts(&data)?;
                    match proxy::get_trap(thr, &handler, "get")? {
                        Some(trap) => {
                            return proxy::get_trap_call(thr, &trap, &handler, &target, key, receiver);
                        }
                        None => target,
                    }
                }
            };
            thr.replace_at(slot, Value::Object(next.clone()));
            cur = next;
        }
        log::warn!("get: prototype chain exceeds sanity limit");
        Err(JsError::range_error("prototype chain limit"))
    })
}

/// `base[key]` for any base value. Primitives look up their virtual
/// properties, then the matching prototype.
pub fn get_value(thr: &mut Thread, base: &Value, key: &PropKey) -> Result<Value, JsError> {
    let heap = thr.heap().clone();
    let proto = match base {
        Value::Unused | Value::Undefined | Value::Null => {
            return Err(JsError::type_error(format!(
                "cannot read property {} of {}",
                key,
                base.to_display_string()
            )));
        }
        Value::Object(obj) => return get_object(thr, obj, key, base),
        Value::String(s) if !s.is_symbol() => {
            match key {
                PropKey::Str(k) if k.is_length() => return Ok(Value::from(s.charlen())),
                PropKey::Index(idx) => {
                    if let Some(c) = s.char_at(*idx) {
                        return char_value(thr, c);
                    }
                }
                PropKey::Str(_) => {}
            }
            heap.object_prototype().clone()
        }
        Value::Buffer(buf) => {
            match key {
                PropKey::Str(k) if k.is_length() => {
                    return Ok(Value::Number(buf.len() as f64));
                }
                PropKey::Index(idx) => {
                    let byte = usize::try_from(*idx)
                        .ok()
                        .and_then(|i| buf.bytes().get(i).copied());
                    return Ok(byte.map(|b| Value::Number(f64::from(b))).unwrap_or_default());
                }
                PropKey::Str(k) if k.is_canonical_numeric() => return Ok(Value::Undefined),
                PropKey::Str(_) => {}
            }
            heap.object_prototype().clone()
        }
        Value::LightFunc(_) => heap.function_prototype().clone(),
        Value::String(_) | Value::Boolean(_) | Value::Number(_) | Value::Pointer(_) => {
            heap.object_prototype().clone()
        }
    };
    get_object(thr, &proto, key, base)
}
