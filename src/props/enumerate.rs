//! for-in style enumeration: a key snapshot over the prototype chain.
//!
//! Keys are collected level by level with [`own_prop_keys`]. A key seen on a
//! nearer object shadows the same key further up, even when the nearer one is
//! not enumerable. Keys deleted after the snapshot are skipped when reached.

use crate::error::JsError;
use crate::object::ObjRef;
use crate::prelude::*;
use crate::props::ownkeys::{
    INCLUDE_ARRIDX, INCLUDE_HIDDEN, INCLUDE_STRING, INCLUDE_SYMBOL, REQUIRE_ENUMERABLE,
    own_prop_keys,
};
use crate::props::{get, has, key_to_value, proxy, read};
use crate::thread::Thread;
use crate::value::{PropKey, Value};

/// Only the object's own keys, no prototype walk
pub const ENUM_OWN_ONLY: u32 = 1 << 6;
/// `for (k in obj)`: enumerable string and index keys over the whole chain.
pub const FOR_IN_KEYS: u32 = INCLUDE_ARRIDX | INCLUDE_STRING | REQUIRE_ENUMERABLE;

const KIND_FLAGS: u32 = INCLUDE_ARRIDX | INCLUDE_STRING | INCLUDE_SYMBOL | INCLUDE_HIDDEN;

/// Snapshot of the keys to visit plus a cursor.
#[derive(Debug)]
pub struct Enumerator {
    target: ObjRef,
    keys: Vec<PropKey>,
    next: usize,
}

impl Enumerator {
    pub fn target(&self) -> &ObjRef {
        &self.target
    }

    /// Keys in the snapshot, visited or not.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Prototype used for the walk. Proxies have no `getPrototypeOf` trap here
/// and report their target's prototype.
fn walk_parent(cur: &ObjRef, limit: u32) -> Result<Option<ObjRef>, JsError> {
    let mut obj = cur.clone();
    for _ in 0..limit {
        let Some(data) = proxy::proxy_data(&obj) else {
            return Ok(read(&obj)?.prototype.clone());
        };
        let (target, _) = proxy::parts(&data)?;
        obj = target;
    }
    Err(JsError::range_error("proxy chain too long"))
}

/// Snapshot the keys of `obj` (and its prototypes unless [`ENUM_OWN_ONLY`])
/// filtered by the own-keys `flags`.
pub fn enumerate(thr: &mut Thread, obj: &ObjRef, flags: u32) -> Result<Enumerator, JsError> {
    let limit = thr.heap().config().prototype_chain_sanity;
    let mut keys: Vec<PropKey> = Vec::new();
    let mut seen: FxHashSet<PropKey> = FxHashSet::default();
    let mut cur = Some(obj.clone());
    let mut depth = 0u32;
    while let Some(level) = cur {
        if depth >= limit {
            log::warn!("enumerate: prototype chain exceeds sanity limit");
            return Err(JsError::range_error("prototype chain limit"));
        }
        depth += 1;
        let all = own_prop_keys(thr, &level, flags & KIND_FLAGS)?;
        let visible: FxHashSet<PropKey> = if flags & REQUIRE_ENUMERABLE != 0 {
            own_prop_keys(thr, &level, flags & !ENUM_OWN_ONLY)?.into_iter().collect()
        } else {
            all.iter().cloned().collect()
        };
        for key in all {
            if seen.insert(key.clone()) && visible.contains(&key) {
                keys.push(key);
            }
        }
        if flags & ENUM_OWN_ONLY != 0 {
            break;
        }
        cur = walk_parent(&level, limit)?;
    }
    log::trace!("enumerate: {} keys over {} levels", keys.len(), depth);
    Ok(Enumerator {
        target: obj.clone(),
        keys,
        next: 0,
    })
}

/// Next key still present on the target, or `None` when done.
pub fn next_key(thr: &mut Thread, en: &mut Enumerator) -> Result<Option<PropKey>, JsError> {
    while let Some(key) = en.keys.get(en.next).cloned() {
        en.next += 1;
        if has::has_prop(thr, &en.target, &key)? {
            return Ok(Some(key));
        }
    }
    Ok(None)
}

/// Next key with its current value, keys as script values.
pub fn next_entry(
    thr: &mut Thread,
    en: &mut Enumerator,
) -> Result<Option<(Value, Value)>, JsError> {
    let Some(key) = next_key(thr, en)? else {
        return Ok(None);
    };
    let target = en.target.clone();
    let value = get::get_object(thr, &target, &key, &Value::Object(target.clone()))?;
    Ok(Some((key_to_value(thr.heap(), &key)?, value)))
}
