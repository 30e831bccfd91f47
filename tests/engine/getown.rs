// Tests for [[GetOwnProperty]] and the descriptor stack convention

use super::{key, native, num, obj, setup};
use esheap::{ElementType, PropDesc, Value, attrs};

#[test]
fn test_data_descriptor_pushes_one_value() {
    let (heap, mut thr) = setup();
    let o = super::object_with(&mut thr, &[("a", num(7.0))]);
    let top = thr.top();
    let code = thr.get_own_prop_desc(&o, &key(&heap, "a")).unwrap();
    assert_eq!(code, i32::from(attrs::WEC));
    assert_eq!(thr.top(), top + 1);
    assert_eq!(thr.get(-1).unwrap().as_number(), Some(7.0));
    thr.set_top(top);

    let code = thr.get_own_prop_desc(&o, &key(&heap, "missing")).unwrap();
    assert_eq!(code, -1);
    assert_eq!(thr.top(), top);
}

#[test]
fn test_accessor_descriptor_pushes_getter_and_setter() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    let getter = native(&heap, "get", |_, _, _| Ok(Value::from(1.0)));
    let desc = PropDesc::accessor(Some(getter.clone()), None, attrs::EC);
    thr.def_prop(&o, &key(&heap, "g"), desc).unwrap();

    let top = thr.top();
    let code = thr.get_own_prop_desc(&o, &key(&heap, "g")).unwrap();
    assert_eq!(code, i32::from(attrs::EC | attrs::ACCESSOR));
    assert_eq!(thr.top(), top + 2);
    let set = thr.pop().unwrap();
    let get = thr.pop().unwrap();
    assert!(set.is_undefined());
    assert!(get.as_object().is_some_and(|g| esheap::ObjRef::ptr_eq(g, &getter)));
}

#[test]
fn test_array_virtual_length() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[num(1.0), Value::Unused, num(3.0)]).unwrap();
    let d = thr.get_own_property(&arr, &key(&heap, "length")).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::W);
    assert_eq!(d.data().and_then(Value::as_number), Some(3.0));

    // Holes are not own properties.
    assert!(thr.get_own_property(&arr, &num(1.0)).unwrap().is_none());
    let d = thr.get_own_property(&arr, &num(2.0)).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::WEC);
}

#[test]
fn test_string_object_characters() {
    let (heap, mut thr) = setup();
    let s = heap.new_string_object(heap.intern("héllo").unwrap()).unwrap();
    let d = thr.get_own_property(&s, &num(1.0)).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::E);
    assert_eq!(d.data().map(Value::to_display_string).as_deref(), Some("é"));
    let d = thr.get_own_property(&s, &key(&heap, "length")).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::NONE);
    assert_eq!(d.data().and_then(Value::as_number), Some(5.0));
    assert!(thr.get_own_property(&s, &num(5.0)).unwrap().is_none());
}

#[test]
fn test_string_object_counts_code_points() {
    let (heap, mut thr) = setup();
    // U+1F600 is outside the BMP: one character, not a surrogate pair.
    let s = heap.new_string_object(heap.intern("a\u{1F600}b").unwrap()).unwrap();
    let d = thr.get_own_property(&s, &key(&heap, "length")).unwrap().unwrap();
    assert_eq!(d.data().and_then(Value::as_number), Some(3.0));
    let d = thr.get_own_property(&s, &num(1.0)).unwrap().unwrap();
    assert_eq!(d.data().map(Value::to_display_string).as_deref(), Some("\u{1F600}"));
    assert_eq!(thr.get_prop(&obj(&s), &num(2.0)).unwrap().to_display_string(), "b");
}

#[test]
fn test_typed_array_indices_and_captured_keys() {
    let (heap, mut thr) = setup();
    let buf = heap.alloc_buffer(vec![0; 8]).unwrap();
    let ta = heap.new_typed_array(buf, 0, 4, ElementType::Uint16).unwrap();
    thr.def_prop(&ta, &num(2.0), PropDesc::new().value(num(513.0))).unwrap();

    let d = thr.get_own_property(&ta, &num(2.0)).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::WEC);
    assert_eq!(d.data().and_then(Value::as_number), Some(513.0));
    let d = thr.get_own_property(&ta, &key(&heap, "length")).unwrap().unwrap();
    assert_eq!(d.data().and_then(Value::as_number), Some(4.0));

    // Out of range and canonical numeric strings never reach the prototype.
    let proto = heap.object_prototype().clone();
    thr.def_prop(&proto, &key(&heap, "1.5"), PropDesc::data(Value::Null, attrs::WEC))
        .unwrap();
    assert!(thr.get_own_property(&ta, &num(9.0)).unwrap().is_none());
    assert!(!thr.has_prop(&obj(&ta), &key(&heap, "1.5")).unwrap());
    assert!(thr.get_prop(&obj(&ta), &key(&heap, "1.5")).unwrap().is_undefined());
    thr.del_prop(&obj(&proto), &key(&heap, "1.5")).unwrap();
}

#[test]
fn test_arguments_reads_live_binding() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let formals = [heap.intern("a").unwrap()];
    let args = super::arguments::push(&mut thr, &formals, &[num(1.0)], &env, false);
    thr.def_prop(&args, &num(0.0), PropDesc::new().value(num(5.0))).unwrap();
    let d = thr.get_own_property(&args, &num(0.0)).unwrap().unwrap();
    assert_eq!(d.data().and_then(Value::as_number), Some(5.0));
    assert_eq!(super::arguments::binding(&env, "a").and_then(|v| v.as_number()), Some(5.0));
}

#[test]
fn test_invalid_key_type_is_type_error() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    let err = thr.get_own_prop_desc(&o, &obj(&o)).unwrap_err();
    assert_eq!(err.kind(), esheap::ErrorKind::Type);
}
