// End-to-end scenarios mixing several operations

use super::{arg, key, native, num, obj, setup};
use esheap::{ErrorKind, PropDesc, Value, attrs};

#[test]
fn test_delete_then_has() {
    let (heap, mut thr) = setup();
    let o = super::object_with(&mut thr, &[("foo", num(1.0))]);
    let foo = key(&heap, "foo");
    assert!(thr.del_prop(&obj(&o), &foo).unwrap());
    assert!(!thr.has_prop(&obj(&o), &foo).unwrap());
    assert!(thr.get_prop(&obj(&o), &foo).unwrap().is_undefined());
}

#[test]
fn test_array_length_delete_strictness() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[num(1.0), num(2.0)]).unwrap();
    let len = key(&heap, "length");
    assert!(!thr.del_prop(&obj(&arr), &len).unwrap());

    let f = native(&heap, "deleteLength", |thr, _, args| {
        let k = Value::String(thr.heap().intern("length")?);
        thr.del_prop(&arg(args, 0), &k).map(Value::Boolean)
    });
    let err = thr.call(&obj(&f), &Value::Undefined, &[obj(&arr)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(arr.borrow().array_length(), Some(2));
}

#[test]
fn test_string_object_index_delete_strictness() {
    let (heap, mut thr) = setup();
    let s = heap.new_string_object(heap.intern("abc").unwrap()).unwrap();
    assert!(!thr.del_prop(&obj(&s), &num(1.0)).unwrap());

    let f = native(&heap, "deleteIndex", |thr, _, args| {
        thr.del_prop(&arg(args, 0), &Value::from(1.0)).map(Value::Boolean)
    });
    let err = thr.call(&obj(&f), &Value::Undefined, &[obj(&s)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "property not configurable");
    assert!(thr.has_prop(&obj(&s), &num(1.0)).unwrap());
}

#[test]
fn test_many_keys_half_deleted() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    for i in 0..1000 {
        let k = key(&heap, &format!("key{}", i));
        thr.def_prop(&o, &k, PropDesc::data(num(f64::from(i)), attrs::WEC)).unwrap();
    }
    for i in (0..1000).step_by(2) {
        assert!(thr.del_prop(&obj(&o), &key(&heap, &format!("key{}", i))).unwrap());
    }
    let names = super::key_names(&mut thr, &o, esheap::ENUMERABLE_KEYS);
    assert_eq!(names.len(), 500);
    assert_eq!(names.first().map(String::as_str), Some("key1"));
    assert_eq!(names.last().map(String::as_str), Some("key999"));

    heap.compact(&o).unwrap();
    assert_eq!(o.borrow().strprops().live_count(), 500);
    for i in [1, 501, 999] {
        let v = thr.get_prop(&obj(&o), &key(&heap, &format!("key{}", i))).unwrap();
        assert_eq!(v.as_number(), Some(f64::from(i)));
    }
    assert!(!thr.has_prop(&obj(&o), &key(&heap, "key500")).unwrap());
}

#[test]
fn test_proxy_delete_refusal() {
    let (heap, mut thr) = setup();
    let target = super::object_with(&mut thr, &[("x", num(1.0))]);
    let trap = native(&heap, "deleteProperty", |_, _, _| Ok(Value::Boolean(false)));
    let handler = super::object_with(&mut thr, &[("deleteProperty", obj(&trap))]);
    let p = heap.new_proxy(target.clone(), handler).unwrap();
    assert!(!thr.del_prop(&obj(&p), &key(&heap, "x")).unwrap());
    assert!(thr.has_prop(&obj(&target), &key(&heap, "x")).unwrap());
}

#[test]
fn test_proxy_delete_refusal_strict() {
    let (heap, mut thr) = setup();
    let target = super::object_with(&mut thr, &[("x", num(1.0))]);
    let trap = native(&heap, "deleteProperty", |_, _, _| Ok(Value::Boolean(false)));
    let handler = super::object_with(&mut thr, &[("deleteProperty", obj(&trap))]);
    let p = heap.new_proxy(target.clone(), handler).unwrap();

    let f = native(&heap, "deleteX", |thr, _, args| {
        let k = Value::String(thr.heap().intern("x")?);
        thr.del_prop(&arg(args, 0), &k).map(Value::Boolean)
    });
    let err = thr.call(&obj(&f), &Value::Undefined, &[obj(&p)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "proxy rejected");
    assert!(thr.has_prop(&obj(&target), &key(&heap, "x")).unwrap());
}

#[test]
fn test_array_grows_then_shrinks_through_length() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[]).unwrap();
    for i in 0..50u32 {
        thr.def_prop(&arr, &num(f64::from(i)), PropDesc::data(num(f64::from(i)), attrs::WEC))
            .unwrap();
    }
    let len = key(&heap, "length");
    assert!(thr.def_prop(&arr, &len, PropDesc::new().value(num(10.0))).unwrap());
    assert_eq!(super::key_names(&mut thr, &arr, esheap::ENUMERABLE_KEYS).len(), 10);
    heap.compact(&arr).unwrap();
    assert!(arr.borrow().items().len() <= 10);
    assert_eq!(thr.get_prop(&obj(&arr), &num(9.0)).unwrap().as_number(), Some(9.0));
}
