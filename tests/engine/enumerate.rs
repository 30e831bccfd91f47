// Tests for for-in enumeration over the prototype chain

use super::{key, num, obj, setup};
use esheap::{
    ENUM_OWN_ONLY, Enumerator, FOR_IN_KEYS, INCLUDE_ARRIDX, INCLUDE_STRING, PropDesc, Thread, Value,
    attrs,
};

fn names(thr: &mut Thread, en: &mut Enumerator) -> Vec<String> {
    let mut out = Vec::new();
    while let Some((k, _)) = thr.enum_next(en).unwrap() {
        out.push(k.to_display_string());
    }
    out
}

#[test]
fn test_own_then_inherited_order() {
    let (heap, mut thr) = setup();
    let proto = super::object_with(&mut thr, &[("inherited", num(1.0)), ("a", num(1.0))]);
    let arr = heap.new_array(&[num(10.0), num(11.0)]).unwrap();
    arr.borrow_mut().set_prototype(Some(proto));
    thr.def_prop(&arr, &key(&heap, "a"), PropDesc::data(num(2.0), attrs::WEC)).unwrap();

    let mut en = thr.enumerate(&arr, FOR_IN_KEYS).unwrap();
    assert_eq!(en.len(), 4);
    assert_eq!(names(&mut thr, &mut en), ["0", "1", "a", "inherited"]);

    let mut en = thr.enumerate(&arr, FOR_IN_KEYS | ENUM_OWN_ONLY).unwrap();
    assert_eq!(names(&mut thr, &mut en), ["0", "1", "a"]);
}

#[test]
fn test_non_enumerable_own_key_hides_inherited() {
    let (heap, mut thr) = setup();
    let proto = super::object_with(&mut thr, &[("x", num(1.0)), ("y", num(1.0))]);
    let o = heap.new_object().unwrap();
    o.borrow_mut().set_prototype(Some(proto));
    thr.def_prop(&o, &key(&heap, "x"), PropDesc::data(num(2.0), attrs::W)).unwrap();

    let mut en = thr.enumerate(&o, FOR_IN_KEYS).unwrap();
    assert_eq!(names(&mut thr, &mut en), ["y"]);

    // Without the enumerable filter the own key wins.
    let mut en = thr.enumerate(&o, INCLUDE_ARRIDX | INCLUDE_STRING).unwrap();
    let first = thr.enum_next(&mut en).unwrap().unwrap();
    assert_eq!(first.0.to_display_string(), "x");
    assert_eq!(first.1.as_number(), Some(2.0));
}

#[test]
fn test_deleted_keys_are_skipped() {
    let (heap, mut thr) = setup();
    let o = super::object_with(&mut thr, &[("a", num(1.0)), ("b", num(2.0)), ("c", num(3.0))]);
    let mut en = thr.enumerate(&o, FOR_IN_KEYS).unwrap();
    let (k, v) = thr.enum_next(&mut en).unwrap().unwrap();
    assert_eq!(k.to_display_string(), "a");
    assert_eq!(v.as_number(), Some(1.0));

    assert!(thr.del_prop(&obj(&o), &key(&heap, "b")).unwrap());
    // Keys added after the snapshot are not visited.
    thr.def_prop(&o, &key(&heap, "d"), PropDesc::data(num(4.0), attrs::WEC)).unwrap();
    assert_eq!(names(&mut thr, &mut en), ["c"]);
    assert!(thr.enum_next(&mut en).unwrap().is_none());
}

#[test]
fn test_string_object_and_proxy_targets() {
    let (heap, mut thr) = setup();
    let s = heap.new_string_object(heap.intern("hi").unwrap()).unwrap();
    let mut en = thr.enumerate(&s, FOR_IN_KEYS | ENUM_OWN_ONLY).unwrap();
    assert_eq!(names(&mut thr, &mut en), ["0", "1"]);

    let target = super::object_with(&mut thr, &[("t", Value::Null)]);
    let handler = heap.new_object().unwrap();
    let p = heap.new_proxy(target, handler).unwrap();
    let mut en = thr.enumerate(&p, FOR_IN_KEYS).unwrap();
    assert_eq!(names(&mut thr, &mut en), ["t"]);
    assert_eq!(thr.top(), 0);
}
