//! [[OwnPropertyKeys]] with enumeration filters.
//!
//! Order: array indices ascending, then string keys in insertion order
//! (virtual `length` first), then symbols in insertion order. The hash index
//! never influences the order.

use crate::error::JsError;
use crate::object::{HObject, ObjRef, ObjectClass, attrs};
use crate::props::{getown, key_to_value, proxy, read};
use crate::thread::Thread;
use crate::value::{HString, PropKey, Value};

pub const INCLUDE_ARRIDX: u32 = 1 << 0;
pub const INCLUDE_STRING: u32 = 1 << 1;
pub const INCLUDE_SYMBOL: u32 = 1 << 2;
pub const INCLUDE_HIDDEN: u32 = 1 << 3;
pub const REQUIRE_ENUMERABLE: u32 = 1 << 4;
/// Treat a proxy as the plain object it is, without traps or target
pub const NO_PROXY_BEHAVIOR: u32 = 1 << 5;

/// Every key of every kind.
pub const INCLUDE_ALL: u32 = INCLUDE_ARRIDX | INCLUDE_STRING | INCLUDE_SYMBOL | INCLUDE_HIDDEN;
/// `Object.keys` filter.
pub const ENUMERABLE_KEYS: u32 = INCLUDE_ARRIDX | INCLUDE_STRING | REQUIRE_ENUMERABLE;

fn key_wanted(key: &PropKey, flags: u32) -> bool {
    match key {
        PropKey::Index(_) => flags & INCLUDE_ARRIDX != 0,
        PropKey::Str(s) if s.is_symbol() => {
            flags & INCLUDE_SYMBOL != 0 && (!s.is_hidden() || flags & INCLUDE_HIDDEN != 0)
        }
        PropKey::Str(_) => flags & INCLUDE_STRING != 0,
    }
}

fn attrs_wanted(flags: u32, prop_attrs: u8) -> bool {
    flags & REQUIRE_ENUMERABLE == 0 || prop_attrs & attrs::ENUMERABLE != 0
}

/// Own keys of a non-proxy object, without side effects.
fn collect_plain(o: &HObject, flags: u32, length: &HString) -> Vec<PropKey> {
    let mut keys: Vec<PropKey> = Vec::new();

    if flags & INCLUDE_ARRIDX != 0 {
        let mut indices: Vec<u32> = Vec::new();
        match &o.class {
            ObjectClass::StringObject(s) if attrs_wanted(flags, attrs::E) => {
                indices.extend(0..s.charlen());
            }
            ObjectClass::TypedArray(view) => indices.extend(0..view.effective_length()),
            _ => {}
        }
        if o.has_array_items() {
            indices.extend(
                (0..o.items.len()).filter(|i| o.items.get(*i).is_some_and(|v| !v.is_unused())),
            );
        }
        indices.extend(
            o.idxprops
                .iter()
                .filter(|(_, _, _, a)| attrs_wanted(flags, *a))
                .map(|(_, idx, _, _)| *idx),
        );
        indices.sort_unstable();
        indices.dedup();
        keys.extend(indices.into_iter().map(PropKey::Index));
    }

    let virtual_length = match &o.class {
        ObjectClass::Array { .. } | ObjectClass::StringObject(_) | ObjectClass::TypedArray(_) => {
            flags & REQUIRE_ENUMERABLE == 0
        }
        _ => false,
    };
    if virtual_length && flags & INCLUDE_STRING != 0 {
        keys.push(PropKey::Str(length.clone()));
    }

    let stored = o
        .strprops
        .iter()
        .filter(|(_, _, _, a)| attrs_wanted(flags, *a))
        .map(|(_, k, _, _)| k);
    let (symbols, strings): (Vec<&HString>, Vec<&HString>) = stored.partition(|k| k.is_symbol());
    for k in strings.into_iter().chain(symbols) {
        let key = PropKey::Str(k.clone());
        if key_wanted(&key, flags) {
            keys.push(key);
        }
    }
    keys
}

/// Own property keys of `obj` filtered by `flags`.
pub fn own_prop_keys(thr: &mut Thread, obj: &ObjRef, flags: u32) -> Result<Vec<PropKey>, JsError> {
    let length = thr.heap().intern("length")?;
    let limit = thr.heap().config().prototype_chain_sanity;
    let mut cur = obj.clone();
    for _ in 0..limit {
        let data = if flags & NO_PROXY_BEHAVIOR == 0 {
            proxy::proxy_data(&cur)
        } else {
            None
        };
        let Some(data) = data else {
            return Ok(collect_plain(&*read(&cur)?, flags, &length));
        };
        let (target, handler) = proxy::parts(&data)?;
        let Some(trap) = proxy::get_trap(thr, &handler, "ownKeys")? else {
            cur = target;
            continue;
        };
        let all = proxy::own_keys_trap(thr, &trap, &handler, &target)?;
        let mut keys = Vec::with_capacity(all.len());
        for key in all {
            if !key_wanted(&key, flags) {
                continue;
            }
            if flags & REQUIRE_ENUMERABLE != 0 {
                let enumerable = getown::getown_desc(thr, &cur, &key)?
                    .is_some_and(|d| d.enumerable());
                if !enumerable {
                    continue;
                }
            }
            keys.push(key);
        }
        return Ok(keys);
    }
    log::warn!("ownkeys: proxy chain exceeds sanity limit");
    Err(JsError::range_error("proxy chain too long"))
}

/// Own property keys as script values (index keys as strings).
pub fn own_keys(thr: &mut Thread, obj: &ObjRef, flags: u32) -> Result<Vec<Value>, JsError> {
    let keys = own_prop_keys(thr, obj, flags)?;
    let heap = thr.heap().clone();
    keys.iter().map(|k| key_to_value(&heap, k)).collect()
}
