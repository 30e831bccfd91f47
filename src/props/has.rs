//! [[HasProperty]] and the `in` operator.

use crate::error::JsError;
use crate::object::ObjRef;
use crate::props::getown::{OwnLookup, getown_unsafe};
use crate::props::{pinned, proxy, read, to_prop_key, with_pinned};
use crate::thread::Thread;
use crate::value::{PropKey, Value};

/// Whether `obj` has `key` as an own or inherited property.
pub fn has_prop(thr: &mut Thread, obj: &ObjRef, key: &PropKey) -> Result<bool, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    with_pinned(thr, obj, |thr, slot| {
        let mut cur = pinned(thr, slot)?;
        for _ in 0..limit {
            let found = getown_unsafe(&*read(&cur)?, key);
            let next = match found {
                OwnLookup::Found(_) | OwnLookup::Char(_) => return Ok(true),
                OwnLookup::Captured => return Ok(false),
                OwnLookup::NotFound => match read(&cur)?.prototype.clone() {
                    Some(proto) => proto,
                    None => return Ok(false),
                },
                OwnLookup::Proxy(data) => {
                    let (target, handler) = proxy::parts(&data)?;
                    match proxy::get_trap(thr, &handler, "has")? {
                        Some(trap) => return proxy::has_trap(thr, &trap, &handler, &target, key),
                        None => target,
                    }
                }
            };
            thr.replace_at(slot, Value::Object(next.clone()));
            cur = next;
        }
        log::warn!("has: prototype chain exceeds sanity limit");
        Err(JsError::range_error("prototype chain limit"))
    })
}

/// `key in base`. Only objects, buffers and lightfuncs are valid bases.
pub fn has_value(thr: &mut Thread, base: &Value, key: &Value) -> Result<bool, JsError> {
    let heap = thr.heap().clone();
    match base {
        Value::Object(obj) => {
            let key = to_prop_key(&heap, key)?;
            has_prop(thr, obj, &key)
        }
        Value::Buffer(buf) => {
            let key = to_prop_key(&heap, key)?;
            match &key {
                PropKey::Str(k) if k.is_length() => Ok(true),
                PropKey::Index(idx) => {
                    Ok(usize::try_from(*idx).is_ok_and(|i| i < buf.len()))
                }
                PropKey::Str(k) if k.is_canonical_numeric() => Ok(false),
                PropKey::Str(_) => has_prop(thr, heap.object_prototype(), &key),
            }
        }
        Value::LightFunc(_) => {
            let key = to_prop_key(&heap, key)?;
            has_prop(thr, heap.function_prototype(), &key)
        }
        other => Err(JsError::type_error(format!(
            "invalid base value {}",
            other.to_display_string()
        ))),
    }
}
