// Tests for Arguments objects and their parameter map

use super::{key, num, obj, setup};
use esheap::{HString, ObjRef, ObjectClass, PropDesc, Thread, Value, attrs};

/// Build an Arguments object and pop it back off the value stack.
#[allow(clippy::expect_used)]
pub fn push(
    thr: &mut Thread,
    formals: &[HString],
    args: &[Value],
    env: &ObjRef,
    strict: bool,
) -> ObjRef {
    let top = thr.top();
    let a = thr
        .push_arguments(formals, args, env, strict)
        .expect("push_arguments failed");
    assert_eq!(thr.top(), top + 1);
    thr.set_top(top);
    a
}

/// Current value of binding `name` in a declarative environment.
pub fn binding(env: &ObjRef, name: &str) -> Option<Value> {
    let e = env.borrow();
    match e.class() {
        ObjectClass::Environment(record) => record
            .bindings
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v.clone()),
        _ => None,
    }
}

fn formals(heap: &esheap::Heap, names: &[&str]) -> Vec<HString> {
    names.iter().map(|n| heap.intern(n).unwrap()).collect()
}

#[test]
fn test_length_and_values() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let args = [num(1.0), num(2.0), num(3.0)];
    let a = push(&mut thr, &formals(&heap, &["x"]), &args, &env, false);
    let d = thr.get_own_property(&a, &key(&heap, "length")).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::WC);
    assert_eq!(d.data().and_then(Value::as_number), Some(3.0));
    assert_eq!(thr.get_prop(&obj(&a), &num(2.0)).unwrap().as_number(), Some(3.0));
    let names = super::key_names(&mut thr, &a, esheap::ENUMERABLE_KEYS);
    assert_eq!(names, ["0", "1", "2"]);
}

#[test]
fn test_mapped_write_goes_to_binding() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let a = push(&mut thr, &formals(&heap, &["x", "y"]), &[num(1.0), num(2.0)], &env, false);
    assert_eq!(binding(&env, "y").and_then(|v| v.as_number()), Some(2.0));

    thr.def_prop(&a, &num(1.0), PropDesc::new().value(num(20.0))).unwrap();
    assert_eq!(binding(&env, "y").and_then(|v| v.as_number()), Some(20.0));
    assert_eq!(thr.get_prop(&obj(&a), &num(1.0)).unwrap().as_number(), Some(20.0));
}

#[test]
fn test_unmapped_indices_and_strict_calls() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    // Index 1 has no formal: writing it leaves the environment alone.
    let a = push(&mut thr, &formals(&heap, &["x"]), &[num(1.0), num(2.0)], &env, false);
    thr.def_prop(&a, &num(1.0), PropDesc::new().value(num(9.0))).unwrap();
    assert_eq!(binding(&env, "x").and_then(|v| v.as_number()), Some(1.0));

    let strict_env = heap.new_environment().unwrap();
    let s = push(&mut thr, &formals(&heap, &["x"]), &[num(1.0)], &strict_env, true);
    thr.def_prop(&s, &num(0.0), PropDesc::new().value(num(5.0))).unwrap();
    assert!(binding(&strict_env, "x").is_none());
}

#[test]
fn test_delete_unmaps() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let a = push(&mut thr, &formals(&heap, &["x"]), &[num(1.0)], &env, false);
    assert!(thr.del_prop(&obj(&a), &num(0.0)).unwrap());
    assert!(!thr.has_prop(&obj(&a), &num(0.0)).unwrap());

    // Redefining the index does not restore the alias.
    thr.def_prop(&a, &num(0.0), PropDesc::data(num(7.0), attrs::WEC)).unwrap();
    assert_eq!(binding(&env, "x").and_then(|v| v.as_number()), Some(1.0));
}

#[test]
fn test_accessor_and_readonly_define_unmap() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let a = push(&mut thr, &formals(&heap, &["x", "y"]), &[num(1.0), num(2.0)], &env, false);

    // writable:false syncs the current value first, then unmaps.
    thr.def_prop(&a, &num(0.0), PropDesc::new().writable(false)).unwrap();
    let d = thr.get_own_property(&a, &num(0.0)).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::EC);
    assert_eq!(d.data().and_then(Value::as_number), Some(1.0));

    let getter = super::native(&heap, "g", |_, _, _| Ok(Value::from(42.0)));
    thr.def_prop(&a, &num(1.0), PropDesc::new().getter(Some(getter))).unwrap();
    assert_eq!(thr.get_prop(&obj(&a), &num(1.0)).unwrap().as_number(), Some(42.0));
    assert_eq!(binding(&env, "y").and_then(|v| v.as_number()), Some(2.0));
}

#[test]
fn test_duplicate_formals_map_to_last() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let a = push(&mut thr, &formals(&heap, &["x", "x"]), &[num(1.0), num(2.0)], &env, false);
    assert_eq!(binding(&env, "x").and_then(|v| v.as_number()), Some(2.0));
    thr.def_prop(&a, &num(1.0), PropDesc::new().value(num(8.0))).unwrap();
    assert_eq!(binding(&env, "x").and_then(|v| v.as_number()), Some(8.0));
    // Index 0 is not an alias of the later `x`.
    thr.def_prop(&a, &num(0.0), PropDesc::new().value(num(3.0))).unwrap();
    assert_eq!(binding(&env, "x").and_then(|v| v.as_number()), Some(8.0));
}
