//! Proxy trap plumbing and descriptor conversion for trap arguments and
//! results.

use crate::error::{JsError, MSG_INVALID_TRAP_RESULT, MSG_PROXY_REVOKED};
use crate::object::store::{self, StrPart};
use crate::object::{ObjRef, ObjectClass, PropValue, ProxyData, attrs};
use crate::props::{
    PropDesc, PropertyDescriptor, defown, get, getown, has, key_to_value, read, seal,
};
use crate::prelude::*;
use crate::thread::Thread;
use crate::value::{PropKey, Value};

/// Proxy payload of `obj`, if it is a proxy.
pub(crate) fn proxy_data(obj: &ObjRef) -> Option<ProxyData> {
    match &obj.try_borrow()?.class {
        ObjectClass::Proxy(data) => Some(data.clone()),
        _ => None,
    }
}

/// Target and handler of a live proxy.
pub(crate) fn parts(data: &ProxyData) -> Result<(ObjRef, ObjRef), JsError> {
    match (&data.target, &data.handler) {
        (Some(target), Some(handler)) => Ok((target.clone(), handler.clone())),
        _ => Err(JsError::type_error(MSG_PROXY_REVOKED)),
    }
}

fn is_callable(value: &Value) -> bool {
    match value {
        Value::LightFunc(_) => true,
        Value::Object(obj) => obj.try_borrow().is_some_and(|o| o.is_callable()),
        _ => false,
    }
}

/// Look up trap `name` on `handler`. Absent (undefined or null) traps fall
/// back to the target.
pub(crate) fn get_trap(
    thr: &mut Thread,
    handler: &ObjRef,
    name: &str,
) -> Result<Option<Value>, JsError> {
    let key = PropKey::Str(thr.heap().intern(name)?);
    let trap = get::get_object(thr, handler, &key, &Value::Object(handler.clone()))?;
    if trap.is_null_or_undefined() {
        return Ok(None);
    }
    if !is_callable(&trap) {
        return Err(JsError::type_error(format!("trap {} not callable", name)));
    }
    log::trace!("proxy: calling {} trap", name);
    Ok(Some(trap))
}

fn call_trap(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    args: &[Value],
) -> Result<Value, JsError> {
    thr.call(trap, &Value::Object(handler.clone()), args)
}

fn invalid_result() -> JsError {
    JsError::type_error(MSG_INVALID_TRAP_RESULT)
}

// ═══════════════════════════════════════════════════════════════
// Descriptor objects
// ═══════════════════════════════════════════════════════════════

fn accessor_fn(value: Value) -> Result<Option<ObjRef>, JsError> {
    match value {
        Value::Undefined => Ok(None),
        Value::Object(obj) if obj.try_borrow().is_some_and(|o| o.is_callable()) => Ok(Some(obj)),
        _ => Err(JsError::type_error("invalid descriptor")),
    }
}

/// ToPropertyDescriptor: read a descriptor object into a partial descriptor.
pub(crate) fn to_property_descriptor(thr: &mut Thread, obj: &ObjRef) -> Result<PropDesc, JsError> {
    let receiver = Value::Object(obj.clone());
    let field = |thr: &mut Thread, name: &str| -> Result<Option<Value>, JsError> {
        let key = PropKey::Str(thr.heap().intern(name)?);
        if has::has_prop(thr, obj, &key)? {
            Ok(Some(get::get_object(thr, obj, &key, &receiver)?))
        } else {
            Ok(None)
        }
    };
    let mut desc = PropDesc::new();
    if let Some(v) = field(thr, "enumerable")? {
        desc = desc.enumerable(v.to_boolean());
    }
    if let Some(v) = field(thr, "configurable")? {
        desc = desc.configurable(v.to_boolean());
    }
    if let Some(v) = field(thr, "value")? {
        desc = desc.value(v);
    }
    if let Some(v) = field(thr, "writable")? {
        desc = desc.writable(v.to_boolean());
    }
    if let Some(v) = field(thr, "get")? {
        desc = desc.getter(accessor_fn(v)?);
    }
    if let Some(v) = field(thr, "set")? {
        desc = desc.setter(accessor_fn(v)?);
    }
    if desc.is_accessor_desc() && desc.is_data_desc() {
        return Err(JsError::type_error("invalid descriptor"));
    }
    Ok(desc)
}

/// FromPropertyDescriptor: a plain object carrying the present fields.
pub(crate) fn from_property_descriptor(thr: &mut Thread, desc: &PropDesc) -> Result<ObjRef, JsError> {
    use crate::props::defprop;
    let heap = thr.heap().clone();
    let obj = heap.new_object()?;
    let fn_value = |f: &Option<ObjRef>| f.clone().map(Value::Object).unwrap_or_default();
    let fields = [
        (defprop::HAVE_VALUE, "value", desc.value.clone()),
        (
            defprop::HAVE_WRITABLE,
            "writable",
            Value::Boolean(desc.has(defprop::WRITABLE)),
        ),
        (defprop::HAVE_GETTER, "get", fn_value(&desc.get)),
        (defprop::HAVE_SETTER, "set", fn_value(&desc.set)),
        (
            defprop::HAVE_ENUMERABLE,
            "enumerable",
            Value::Boolean(desc.has(defprop::ENUMERABLE)),
        ),
        (
            defprop::HAVE_CONFIGURABLE,
            "configurable",
            Value::Boolean(desc.has(defprop::CONFIGURABLE)),
        ),
    ];
    for (flag, name, value) in fields {
        if desc.has(flag) {
            let key = heap.intern(name)?;
            store::insert_prop::<StrPart>(&heap, &obj, key, PropValue::Data(value), attrs::WEC)?;
        }
    }
    Ok(obj)
}

/// Fill in the defaults of a partial descriptor.
pub(crate) fn complete_descriptor(desc: &PropDesc) -> PropertyDescriptor {
    let bits = desc.attr_bits();
    if desc.is_accessor_desc() {
        PropertyDescriptor::new(
            PropValue::Accessor {
                get: desc.get.clone(),
                set: desc.set.clone(),
            },
            bits & attrs::EC,
        )
    } else {
        PropertyDescriptor::new(PropValue::Data(desc.value.clone()), bits)
    }
}

// ═══════════════════════════════════════════════════════════════
// Traps
// ═══════════════════════════════════════════════════════════════

/// `getOwnPropertyDescriptor` trap with its result invariants.
pub(crate) fn getown_trap(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
    key: &PropKey,
) -> Result<Option<PropertyDescriptor>, JsError> {
    let key_value = key_to_value(thr.heap(), key)?;
    let result = call_trap(thr, trap, handler, &[Value::Object(target.clone()), key_value])?;
    let target_desc = getown::getown_desc(thr, target, key)?;
    let extensible = seal::is_extensible_obj(target)?;
    match result {
        Value::Undefined => {
            if let Some(td) = &target_desc {
                if !td.configurable() || !extensible {
                    return Err(invalid_result());
                }
            }
            Ok(None)
        }
        Value::Object(desc_obj) => {
            let partial = to_property_descriptor(thr, &desc_obj)?;
            let complete = complete_descriptor(&partial);
            match &target_desc {
                None if !extensible || !complete.configurable() => return Err(invalid_result()),
                Some(td) => {
                    if !defown::is_compatible(td, &partial) {
                        return Err(invalid_result());
                    }
                    if !complete.configurable() && td.configurable() {
                        return Err(invalid_result());
                    }
                }
                None => {}
            }
            Ok(Some(complete))
        }
        _ => Err(invalid_result()),
    }
}

/// `has` trap: a false result may not hide a non-configurable property or
/// any property of a non-extensible target.
pub(crate) fn has_trap(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
    key: &PropKey,
) -> Result<bool, JsError> {
    let key_value = key_to_value(thr.heap(), key)?;
    let result = call_trap(thr, trap, handler, &[Value::Object(target.clone()), key_value])?
        .to_boolean();
    if !result {
        if let Some(td) = getown::getown_desc(thr, target, key)? {
            if !td.configurable() || !seal::is_extensible_obj(target)? {
                return Err(invalid_result());
            }
        }
    }
    Ok(result)
}

/// `deleteProperty` trap. `Ok(false)` is a refusal by the trap.
pub(crate) fn delete_trap(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
    key: &PropKey,
) -> Result<bool, JsError> {
    let key_value = key_to_value(thr.heap(), key)?;
    let result = call_trap(thr, trap, handler, &[Value::Object(target.clone()), key_value])?
        .to_boolean();
    if result {
        if let Some(td) = getown::getown_desc(thr, target, key)? {
            if !td.configurable() || !seal::is_extensible_obj(target)? {
                return Err(invalid_result());
            }
        }
    }
    Ok(result)
}

/// `defineProperty` trap. `Ok(false)` is a refusal by the trap.
pub(crate) fn define_trap(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
    key: &PropKey,
    desc: &PropDesc,
) -> Result<bool, JsError> {
    use crate::props::defprop;
    let key_value = key_to_value(thr.heap(), key)?;
    let desc_obj = from_property_descriptor(thr, desc)?;
    let args = [
        Value::Object(target.clone()),
        key_value,
        Value::Object(desc_obj),
    ];
    if !call_trap(thr, trap, handler, &args)?.to_boolean() {
        return Ok(false);
    }
    let setting_non_configurable =
        desc.has(defprop::HAVE_CONFIGURABLE) && !desc.has(defprop::CONFIGURABLE);
    match getown::getown_desc(thr, target, key)? {
        None => {
            if !seal::is_extensible_obj(target)? || setting_non_configurable {
                return Err(invalid_result());
            }
        }
        Some(td) => {
            if !defown::is_compatible(&td, desc) || (setting_non_configurable && td.configurable()) {
                return Err(invalid_result());
            }
        }
    }
    Ok(true)
}

/// `get` trap: non-configurable target properties pin the result.
pub(crate) fn get_trap_call(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
    key: &PropKey,
    receiver: &Value,
) -> Result<Value, JsError> {
    let key_value = key_to_value(thr.heap(), key)?;
    let args = [Value::Object(target.clone()), key_value, receiver.clone()];
    let result = call_trap(thr, trap, handler, &args)?;
    if let Some(td) = getown::getown_desc(thr, target, key)? {
        if !td.configurable() {
            let pinned_value = td.data().filter(|_| !td.writable());
            if let Some(v) = pinned_value {
                if !Value::same_value(v, &result) {
                    return Err(invalid_result());
                }
            }
            if td.is_accessor() && td.getter().is_none() && !result.is_undefined() {
                return Err(invalid_result());
            }
        }
    }
    Ok(result)
}

/// `set` trap. `Ok(false)` is a refusal by the trap; a success may not
/// change a non-configurable read-only target value or write through a
/// missing setter.
pub(crate) fn set_trap_call(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
    key: &PropKey,
    value: &Value,
    receiver: &Value,
) -> Result<bool, JsError> {
    let key_value = key_to_value(thr.heap(), key)?;
    let args = [
        Value::Object(target.clone()),
        key_value,
        value.clone(),
        receiver.clone(),
    ];
    if !call_trap(thr, trap, handler, &args)?.to_boolean() {
        return Ok(false);
    }
    if let Some(td) = getown::getown_desc(thr, target, key)? {
        if !td.configurable() {
            if let Some(v) = td.data().filter(|_| !td.writable()) {
                if !Value::same_value(v, value) {
                    return Err(invalid_result());
                }
            }
            if td.is_accessor() && td.setter().is_none() {
                return Err(invalid_result());
            }
        }
    }
    Ok(true)
}

/// `ownKeys` trap: the result must be an array-like of unique strings and
/// symbols covering every non-configurable target key (and, for a
/// non-extensible target, exactly the target's keys).
pub(crate) fn own_keys_trap(
    thr: &mut Thread,
    trap: &Value,
    handler: &ObjRef,
    target: &ObjRef,
) -> Result<Vec<PropKey>, JsError> {
    let rejected = || JsError::type_error(crate::error::MSG_PROXY_REJECTED);
    let result = call_trap(thr, trap, handler, &[Value::Object(target.clone())])?;
    let Value::Object(list) = result else {
        return Err(rejected());
    };
    let length_key = PropKey::Str(thr.heap().intern("length")?);
    let receiver = Value::Object(list.clone());
    let length = get::get_object(thr, &list, &length_key, &receiver)?.to_number();
    let length = crate::value::to_uint32(length);

    let mut keys: Vec<PropKey> = Vec::new();
    let mut seen: FxHashSet<PropKey> = FxHashSet::default();
    for i in 0..length {
        match get::get_object(thr, &list, &PropKey::Index(i), &receiver)? {
            Value::String(s) => {
                let key = crate::props::string_key(s);
                if !seen.insert(key.clone()) {
                    return Err(rejected());
                }
                keys.push(key);
            }
            _ => return Err(rejected()),
        }
    }

    let extensible = seal::is_extensible_obj(target)?;
    let target_keys = crate::props::ownkeys::own_prop_keys(
        thr,
        target,
        crate::props::ownkeys::INCLUDE_ALL,
    )?;
    for tk in &target_keys {
        if seen.contains(tk) {
            continue;
        }
        if !extensible {
            return Err(rejected());
        }
        let non_configurable = getown::getown_desc(thr, target, tk)?
            .is_some_and(|td| !td.configurable());
        if non_configurable {
            return Err(rejected());
        }
    }
    if !extensible && keys.len() != target_keys.len() {
        return Err(rejected());
    }
    Ok(keys)
}

/// True when `obj` is a revoked proxy.
pub fn is_revoked(obj: &ObjRef) -> Result<bool, JsError> {
    Ok(match &read(obj)?.class {
        ObjectClass::Proxy(data) => data.is_revoked(),
        _ => false,
    })
}
