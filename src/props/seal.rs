//! `Object.preventExtensions`, `Object.seal`, `Object.freeze` and the
//! matching integrity tests.

use crate::error::JsError;
use crate::object::{ObjRef, ObjectClass, store};
use crate::props::ownkeys::{self, INCLUDE_ALL};
use crate::props::{PropDesc, getown, defown, proxy, read, write};
use crate::thread::Thread;
use crate::value::Value;

const MSG_FREEZE_BUFFER: &str = "cannot freeze non-empty buffer";

/// Follow proxy targets to the object whose flags actually apply.
fn resolve_proxies(obj: &ObjRef) -> Result<ObjRef, JsError> {
    let mut cur = obj.clone();
    while let Some(data) = proxy::proxy_data(&cur) {
        let (target, _) = proxy::parts(&data)?;
        cur = target;
    }
    Ok(cur)
}

/// Extensibility of `obj`, looking through proxies without running traps.
pub(crate) fn is_extensible_obj(obj: &ObjRef) -> Result<bool, JsError> {
    let target = resolve_proxies(obj)?;
    let extensible = read(&target)?.is_extensible();
    Ok(extensible)
}

pub fn is_extensible(_thr: &mut Thread, value: &Value) -> Result<bool, JsError> {
    match value {
        Value::Object(obj) => is_extensible_obj(obj),
        _ => Ok(false),
    }
}

/// Clear the extensible flag and compact. Primitives succeed trivially.
pub fn prevent_extensions(thr: &mut Thread, value: &Value) -> Result<bool, JsError> {
    let Value::Object(obj) = value else {
        return Ok(true);
    };
    let target = resolve_proxies(obj)?;
    write(&target)?.clear_extensible();
    store::compact(thr.heap(), &target)?;
    Ok(true)
}

/// Seal or freeze: non-extensible, then every own key redefined
/// non-configurable (and non-writable data when freezing).
pub fn seal_freeze(thr: &mut Thread, value: &Value, freeze: bool) -> Result<(), JsError> {
    let obj = match value {
        Value::Object(obj) => obj.clone(),
        Value::Buffer(buf) if freeze && !buf.is_empty() => {
            return Err(JsError::type_error(MSG_FREEZE_BUFFER));
        }
        _ => return Ok(()),
    };
    let (non_empty_view, has_items) = {
        let o = read(&obj)?;
        let view = matches!(&o.class, ObjectClass::TypedArray(v) if v.effective_length() > 0);
        (view, o.has_array_items())
    };
    if freeze && non_empty_view {
        return Err(JsError::type_error(MSG_FREEZE_BUFFER));
    }

    prevent_extensions(thr, value)?;
    if has_items {
        store::abandon_array_items(thr.heap(), &obj)?;
    }

    let keys = ownkeys::own_prop_keys(thr, &obj, INCLUDE_ALL)?;
    log::debug!(
        "{}: object {} ({} keys)",
        if freeze { "freeze" } else { "seal" },
        obj.id(),
        keys.len()
    );
    for key in &keys {
        let Some(current) = getown::getown_desc(thr, &obj, key)? else {
            continue;
        };
        let mut desc = PropDesc::new().configurable(false).throwing();
        if freeze && !current.is_accessor() {
            desc = desc.writable(false);
        }
        defown::defown(thr, &obj, key, &desc)?;
    }
    if proxy::proxy_data(&obj).is_none() {
        store::compact(thr.heap(), &obj)?;
    }
    Ok(())
}

/// `Object.isSealed` (`frozen == false`) or `Object.isFrozen`.
pub fn test_integrity(thr: &mut Thread, value: &Value, frozen: bool) -> Result<bool, JsError> {
    let obj = match value {
        Value::Object(obj) => obj.clone(),
        Value::Buffer(buf) => return Ok(buf.is_empty()),
        _ => return Ok(true),
    };
    if is_extensible_obj(&obj)? {
        return Ok(false);
    }
    let keys = ownkeys::own_prop_keys(thr, &obj, INCLUDE_ALL)?;
    for key in &keys {
        let Some(desc) = getown::getown_desc(thr, &obj, key)? else {
            continue;
        };
        if desc.configurable() || (frozen && !desc.is_accessor() && desc.writable()) {
            return Ok(false);
        }
    }
    Ok(true)
}
