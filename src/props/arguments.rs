//! Arguments objects and their parameter map.
//!
//! A non-strict Arguments object maps each passed argument below the formal
//! parameter count to the formal's binding in a declarative environment. The
//! map is a plain object whose index properties hold the binding names.

use crate::error::JsError;
use crate::heap::Heap;
use crate::object::store::{self, IdxPart, StrPart};
use crate::object::{ArgumentsData, HObject, ObjRef, ObjectClass, PropValue, attrs};
use crate::prelude::*;
use crate::props::{read, write};
use crate::thread::Thread;
use crate::value::{HString, Value};

/// Environment and binding name an argument index is mapped to.
pub(crate) fn binding(obj: &HObject, idx: u32) -> Option<(ObjRef, HString)> {
    let ObjectClass::Arguments(data) = &obj.class else {
        return None;
    };
    let map = data.map.as_ref()?;
    let env = data.env.as_ref()?;
    let m = map.try_borrow()?;
    let slot = m.idxprops.find(&idx)?;
    let name = m.idxprops.value_at(slot)?.data()?.as_string()?.clone();
    Some((env.clone(), name))
}

pub(crate) fn is_mapped(obj: &HObject, idx: u32) -> bool {
    binding(obj, idx).is_some()
}

/// Live value of a mapped argument.
pub(crate) fn mapped_value(obj: &HObject, idx: u32) -> Option<Value> {
    let (env, name) = binding(obj, idx)?;
    let e = env.try_borrow()?;
    match &e.class {
        ObjectClass::Environment(record) => record.bindings.get(&name).cloned(),
        _ => None,
    }
}

/// Write through a mapped argument to its binding.
pub(crate) fn write_mapped(obj: &ObjRef, idx: u32, value: Value) -> Result<(), JsError> {
    let Some((env, name)) = binding(&*read(obj)?, idx) else {
        return Ok(());
    };
    let old = match &mut write(&env)?.class {
        ObjectClass::Environment(record) => record.bindings.insert(name, value),
        _ => None,
    };
    drop(old);
    Ok(())
}

/// Sever the mapping of `idx`; the index is never consulted again.
pub(crate) fn unmap(obj: &ObjRef, idx: u32) -> Result<(), JsError> {
    let map = match &read(obj)?.class {
        ObjectClass::Arguments(data) => data.map.clone(),
        _ => None,
    };
    let Some(map) = map else {
        return Ok(());
    };
    let old = {
        let mut m = write(&map)?;
        match m.idxprops.find(&idx) {
            Some(slot) => m.idxprops.delete_at(slot),
            None => None,
        }
    };
    if old.is_some() {
        log::trace!("arguments: index {} of object {} unmapped", idx, obj.id());
    }
    drop(old);
    Ok(())
}

/// Create an Arguments object holding `args`, with a `length` property and,
/// for non-strict calls, a parameter map into `env`.
pub fn create_arguments(
    thr: &mut Thread,
    formals: &[HString],
    args: &[Value],
    env: &ObjRef,
    strict: bool,
) -> Result<ObjRef, JsError> {
    let heap: Heap = thr.heap().clone();
    let mapped = if strict {
        0
    } else {
        formals.len().min(args.len())
    };

    let map = if mapped > 0 {
        Some(heap.alloc_object(ObjectClass::Object, None)?)
    } else {
        None
    };
    let obj = heap.new_arguments(ArgumentsData {
        map: map.clone(),
        env: map.as_ref().map(|_| env.clone()),
    })?;

    let count = u32::try_from(args.len())
        .map_err(|_| JsError::range_error(crate::error::MSG_INVALID_ARRAY_LENGTH))?;
    if count > 0 {
        store::realloc_part::<IdxPart>(&heap, &obj, count)?;
    }
    for (idx, value) in (0..count).zip(args) {
        store::insert_prop::<IdxPart>(&heap, &obj, idx, PropValue::Data(value.clone()), attrs::WEC)?;
    }
    let length = heap.intern("length")?;
    store::insert_prop::<StrPart>(
        &heap,
        &obj,
        length,
        PropValue::Data(Value::from(count)),
        attrs::WC,
    )?;

    if let Some(map) = &map {
        // Later formals win over earlier ones with the same name.
        let mut seen: FxHashSet<HString> = FxHashSet::default();
        for (idx, name) in (0..count).zip(formals).take(mapped).rev() {
            if !seen.insert(name.clone()) {
                continue;
            }
            store::insert_prop::<IdxPart>(
                &heap,
                map,
                idx,
                PropValue::Data(Value::String(name.clone())),
                attrs::WEC,
            )?;
            let old = match &mut write(env)?.class {
                ObjectClass::Environment(record) => {
                    if record.bindings.contains_key(name) {
                        None
                    } else {
                        record
                            .bindings
                            .insert(name.clone(), args.get(slot(idx)).cloned().unwrap_or_default())
                    }
                }
                _ => return Err(JsError::type_error("invalid environment")),
            };
            drop(old);
        }
        log::trace!(
            "arguments: object {} maps {} of {} arguments",
            obj.id(),
            seen.len(),
            count
        );
    }
    Ok(obj)
}

fn slot(idx: u32) -> usize {
    usize::try_from(idx).unwrap_or(usize::MAX)
}
