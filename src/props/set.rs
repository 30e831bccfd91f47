//! [[Set]]: the assignment `base[key] = value`.
//!
//! The prototype chain is searched for the property first. Setters found
//! anywhere on the chain capture the write; writable data properties let the
//! value land on the original base object, through [[DefineOwnProperty]] so
//! array `length`, typed array elements and mapped arguments keep their
//! exotic behaviour.

use crate::error::{
    JsError, MSG_NOT_WRITABLE, MSG_PROXY_REJECTED, MSG_SETTER_UNDEFINED,
};
use crate::object::{ObjRef, PropValue, attrs};
use crate::props::getown::{OwnLookup, getown_desc, getown_unsafe};
use crate::props::{PropDesc, defown, fail, pinned, proxy, read, with_pinned};
use crate::thread::Thread;
use crate::value::{PropKey, Value};

const MSG_PRIMITIVE_BASE: &str = "cannot write property of primitive";

fn desc_for(value: &Value, strict: bool, new_property: bool) -> PropDesc {
    let desc = if new_property {
        PropDesc::data(value.clone(), attrs::WEC)
    } else {
        PropDesc::new().value(value.clone())
    };
    if strict { desc.throwing() } else { desc }
}

/// Write `value` as an own data property of `receiver`. An existing own
/// property is updated in place, a missing one is created.
fn write_receiver(
    thr: &mut Thread,
    receiver: &ObjRef,
    key: &PropKey,
    value: &Value,
    strict: bool,
) -> Result<bool, JsError> {
    match getown_desc(thr, receiver, key)? {
        Some(existing) if existing.is_accessor() => fail(strict, MSG_SETTER_UNDEFINED),
        Some(existing) if !existing.writable() => fail(strict, MSG_NOT_WRITABLE),
        Some(_) => defown::defown(thr, receiver, key, &desc_for(value, strict, false)),
        None => defown::defown(thr, receiver, key, &desc_for(value, strict, true)),
    }
}

fn call_setter(
    thr: &mut Thread,
    setter: Option<ObjRef>,
    base: &Value,
    value: &Value,
    strict: bool,
) -> Result<bool, JsError> {
    match setter {
        Some(setter) => {
            thr.call(&Value::Object(setter), base, &[value.clone()])?;
            Ok(true)
        }
        None => fail(strict, MSG_SETTER_UNDEFINED),
    }
}

/// Walk from `start` up the prototype chain. `orig` is the object written to
/// when no setter captures the write; `None` for primitive bases, which
/// refuse every data write.
fn put_chain(
    thr: &mut Thread,
    start: &ObjRef,
    orig: Option<&ObjRef>,
    base: &Value,
    key: &PropKey,
    value: &Value,
    strict: bool,
) -> Result<bool, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    with_pinned(thr, start, |thr, slot| {
        let mut cur = pinned(thr, slot)?;
        for _ in 0..limit {
            let found = getown_unsafe(&*read(&cur)?, key);
            let next = match found {
                OwnLookup::Found(desc) => {
                    if let PropValue::Accessor { set, .. } = desc.value {
                        return call_setter(thr, set, base, value, strict);
                    }
                    let Some(orig) = orig else {
                        return fail(strict, MSG_PRIMITIVE_BASE);
                    };
                    if !desc.writable() {
                        return fail(strict, MSG_NOT_WRITABLE);
                    }
                    if ObjRef::ptr_eq(&cur, orig) {
                        let desc = desc_for(value, strict, false);
                        return defown::defown(thr, orig, key, &desc);
                    }
                    return write_receiver(thr, orig, key, value, strict);
                }
                OwnLookup::Char(_) => return fail(strict, MSG_NOT_WRITABLE),
                // Typed array writes outside the view are dropped.
                OwnLookup::Captured => return Ok(true),
                OwnLookup::NotFound => {
                    let proto = read(&cur)?.prototype.clone();
                    match (proto, orig) {
                        (Some(proto), _) => proto,
                        (None, Some(orig)) => return write_receiver(thr, orig, key, value, strict),
                        (None, None) => return fail(strict, MSG_PRIMITIVE_BASE),
                    }
                }
                OwnLookup::Proxy(data) => {
                    let (target, handler) = proxy::parts(&data)?;
                    match proxy::get_trap(thr, &handler, "set")? {
                        Some(trap) => {
                            let ok = proxy::set_trap_call(
                                thr, &trap, &handler, &target, key, value, base,
                            )?;
                            return if ok { Ok(true) } else { fail(strict, MSG_PROXY_REJECTED) };
                        }
                        None => target,
                    }
                }
            };
            thr.replace_at(slot, Value::Object(next.clone()));
            cur = next;
        }
        log::warn!("put: prototype chain exceeds sanity limit");
        Err(JsError::range_error("prototype chain limit"))
    })
}

/// `base[key] = value`. A refused write returns `Ok(false)`, or a TypeError
/// when `strict`. Undefined and null bases always throw.
pub fn put_value(
    thr: &mut Thread,
    base: &Value,
    key: &PropKey,
    value: &Value,
    strict: bool,
) -> Result<bool, JsError> {
    let heap = thr.heap().clone();
    let proto = match base {
        Value::Unused | Value::Undefined | Value::Null => {
            return Err(JsError::type_error(format!(
                "cannot write property {} of {}",
                key,
                base.to_display_string()
            )));
        }
        Value::Object(obj) => return put_chain(thr, obj, Some(obj), base, key, value, strict),
        Value::String(s) if !s.is_symbol() => {
            let virtual_key = match key {
                PropKey::Str(k) => k.is_length(),
                PropKey::Index(idx) => *idx < s.charlen(),
            };
            if virtual_key {
                return fail(strict, MSG_NOT_WRITABLE);
            }
            heap.object_prototype().clone()
        }
        Value::Buffer(buf) => match key {
            PropKey::Str(k) if k.is_length() => return fail(strict, MSG_NOT_WRITABLE),
            PropKey::Index(idx) => {
                let byte = crate::value::to_uint32(value.to_number()) as u8;
                if let Ok(i) = usize::try_from(*idx) {
                    if let Some(slot) = buf.bytes_mut().get_mut(i) {
                        *slot = byte;
                    }
                }
                return Ok(true);
            }
            PropKey::Str(k) if k.is_canonical_numeric() => return Ok(true),
            PropKey::Str(_) => heap.object_prototype().clone(),
        },
        Value::LightFunc(_) => heap.function_prototype().clone(),
        Value::String(_) | Value::Boolean(_) | Value::Number(_) | Value::Pointer(_) => {
            heap.object_prototype().clone()
        }
    };
    put_chain(thr, &proto, None, base, key, value, strict)
}
