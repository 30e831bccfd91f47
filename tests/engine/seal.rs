// Tests for preventExtensions, seal, freeze and the integrity checks

use super::{key, native, num, obj, setup};
use esheap::{ElementType, ErrorKind, PropDesc, Value, attrs};

#[test]
fn test_prevent_extensions() {
    let (heap, mut thr) = setup();
    let o = super::object_with(&mut thr, &[("a", num(1.0))]);
    assert!(thr.is_extensible(&obj(&o)).unwrap());
    assert!(thr.prevent_extensions(&obj(&o)).unwrap());
    assert!(!thr.is_extensible(&obj(&o)).unwrap());
    // Not sealed: `a` is still configurable.
    assert!(!thr.is_sealed(&obj(&o)).unwrap());
    assert!(thr.del_prop(&obj(&o), &key(&heap, "a")).unwrap());
    // With no properties left, a non-extensible object is frozen.
    assert!(thr.is_frozen(&obj(&o)).unwrap());
    assert!(thr.prevent_extensions(&num(1.0)).unwrap());
}

#[test]
fn test_seal_and_freeze_plain_object() {
    let (heap, mut thr) = setup();
    let o = super::object_with(&mut thr, &[("a", num(1.0)), ("b", num(2.0))]);
    thr.seal(&obj(&o)).unwrap();
    assert!(thr.is_sealed(&obj(&o)).unwrap());
    assert!(!thr.is_frozen(&obj(&o)).unwrap());
    assert!(!thr.del_prop(&obj(&o), &key(&heap, "a")).unwrap());
    // Sealed data stays writable.
    assert!(thr.def_prop(&o, &key(&heap, "a"), PropDesc::new().value(num(5.0))).unwrap());

    thr.freeze(&obj(&o)).unwrap();
    assert!(thr.is_frozen(&obj(&o)).unwrap());
    let d = thr.get_own_property(&o, &key(&heap, "a")).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::E);
    assert_eq!(d.data().and_then(Value::as_number), Some(5.0));
    assert!(!thr.def_prop(&o, &key(&heap, "a"), PropDesc::new().value(num(6.0))).unwrap());
    assert!(!thr.def_prop(&o, &key(&heap, "c"), PropDesc::data(num(1.0), attrs::WEC)).unwrap());
}

#[test]
fn test_freeze_keeps_accessors_callable() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    let getter = native(&heap, "get", |_, _, _| Ok(Value::from(3.0)));
    thr.def_prop(&o, &key(&heap, "g"), PropDesc::accessor(Some(getter), None, attrs::EC))
        .unwrap();
    thr.freeze(&obj(&o)).unwrap();
    let d = thr.get_own_property(&o, &key(&heap, "g")).unwrap().unwrap();
    assert!(d.is_accessor());
    assert_eq!(d.attrs, attrs::E | attrs::ACCESSOR);
    assert_eq!(thr.get_prop(&obj(&o), &key(&heap, "g")).unwrap().as_number(), Some(3.0));
    assert!(thr.is_frozen(&obj(&o)).unwrap());
}

#[test]
fn test_freeze_array() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[num(1.0), num(2.0), num(3.0)]).unwrap();
    thr.freeze(&obj(&arr)).unwrap();
    {
        let b = arr.borrow();
        assert!(!b.has_array_items());
        assert!(!b.is_length_writable());
        assert_eq!(b.idxprops().live_count(), 3);
    }
    assert!(thr.is_frozen(&obj(&arr)).unwrap());
    assert!(!thr.def_prop(&arr, &num(3.0), PropDesc::data(num(4.0), attrs::WEC)).unwrap());
    let len = key(&heap, "length");
    assert!(!thr.def_prop(&arr, &len, PropDesc::new().value(num(0.0))).unwrap());
    assert_eq!(arr.borrow().array_length(), Some(3));
}

#[test]
fn test_string_object_freezes() {
    let (heap, mut thr) = setup();
    let s = heap.new_string_object(heap.intern("hi").unwrap()).unwrap();
    assert!(!thr.is_frozen(&obj(&s)).unwrap());
    thr.freeze(&obj(&s)).unwrap();
    assert!(thr.is_frozen(&obj(&s)).unwrap());
}

#[test]
fn test_buffers_and_typed_arrays() {
    let (heap, mut thr) = setup();
    let buf = heap.alloc_buffer(vec![1, 2]).unwrap();
    let ta = heap.new_typed_array(buf.clone(), 0, 2, ElementType::Uint8).unwrap();
    let err = thr.freeze(&obj(&ta)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "cannot freeze non-empty buffer");

    let err = thr.freeze(&Value::Buffer(buf.clone())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(!thr.is_frozen(&Value::Buffer(buf)).unwrap());

    // An empty view has nothing to freeze.
    let empty = heap.alloc_buffer(Vec::new()).unwrap();
    let view = heap.new_typed_array(empty, 0, 0, ElementType::Float64).unwrap();
    thr.freeze(&obj(&view)).unwrap();
    assert!(thr.is_frozen(&obj(&view)).unwrap());
}

#[test]
fn test_primitives_are_already_frozen() {
    let (heap, mut thr) = setup();
    let s = Value::String(heap.intern("text").unwrap());
    for v in [Value::Undefined, num(4.0), s] {
        thr.freeze(&v).unwrap();
        assert!(thr.is_frozen(&v).unwrap());
        assert!(thr.is_sealed(&v).unwrap());
        assert!(!thr.is_extensible(&v).unwrap());
    }
}
