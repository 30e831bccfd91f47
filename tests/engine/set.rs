// Tests for [[Set]]: prototype lookup, exotic receivers and strictness

use super::arguments::{binding, push};
use super::{arg, key, native, num, obj, setup};
use esheap::{ElementType, ErrorKind, ObjRef, PropDesc, Value, attrs};

fn child_of(heap: &esheap::Heap, proto: &ObjRef) -> ObjRef {
    let o = heap.new_object().unwrap();
    o.borrow_mut().set_prototype(Some(proto.clone()));
    o
}

/// Native `(base, key, value) => base[key] = value`, run with throwing semantics.
fn putter(heap: &esheap::Heap) -> ObjRef {
    native(heap, "put", |thr, _, args| {
        thr.put_prop(&arg(args, 0), &arg(args, 1), &arg(args, 2)).map(Value::Boolean)
    })
}

#[test]
fn test_put_shadows_inherited_data() {
    let (heap, mut thr) = setup();
    let proto = super::object_with(&mut thr, &[("x", num(1.0))]);
    let o = child_of(&heap, &proto);
    let x = key(&heap, "x");
    assert!(thr.put_prop(&obj(&o), &x, &num(2.0)).unwrap());

    let d = thr.get_own_property(&o, &x).unwrap().unwrap();
    assert_eq!(d.attrs, attrs::WEC);
    assert_eq!(d.data().and_then(Value::as_number), Some(2.0));
    assert_eq!(thr.get_prop(&obj(&proto), &x).unwrap().as_number(), Some(1.0));
}

#[test]
fn test_inherited_setter_gets_receiver() {
    let (heap, mut thr) = setup();
    let log = super::object_with(&mut thr, &[]);
    let seen = log.clone();
    let setter = native(&heap, "set", move |thr, this, args| {
        let heap = thr.heap().clone();
        let this_key = Value::String(heap.intern("this")?);
        thr.def_prop(&seen, &this_key, PropDesc::data(this.clone(), attrs::WEC))?;
        let value_key = Value::String(heap.intern("v")?);
        thr.def_prop(&seen, &value_key, PropDesc::data(arg(args, 0), attrs::WEC))?;
        Ok(Value::Undefined)
    });
    let proto = heap.new_object().unwrap();
    let desc = PropDesc::accessor(None, Some(setter), attrs::CONFIGURABLE);
    thr.def_prop(&proto, &key(&heap, "x"), desc).unwrap();
    let o = child_of(&heap, &proto);

    assert!(thr.put_prop(&obj(&o), &key(&heap, "x"), &num(7.0)).unwrap());
    assert_eq!(thr.get_prop(&obj(&log), &key(&heap, "v")).unwrap().as_number(), Some(7.0));
    let this = thr.get_prop(&obj(&log), &key(&heap, "this")).unwrap();
    assert!(matches!(this, Value::Object(t) if ObjRef::ptr_eq(&t, &o)));
    // The setter captured the write; nothing landed on the receiver.
    assert!(thr.get_own_property(&o, &key(&heap, "x")).unwrap().is_none());
}

#[test]
fn test_accessor_without_setter() {
    let (heap, mut thr) = setup();
    let getter = native(&heap, "get", |_, _, _| Ok(Value::from(1.0)));
    let o = heap.new_object().unwrap();
    let desc = PropDesc::accessor(Some(getter), None, attrs::CONFIGURABLE);
    thr.def_prop(&o, &key(&heap, "x"), desc).unwrap();
    assert!(!thr.put_prop(&obj(&o), &key(&heap, "x"), &num(2.0)).unwrap());

    let put = putter(&heap);
    let err = thr
        .call(&obj(&put), &Value::Undefined, &[obj(&o), key(&heap, "x"), num(2.0)])
        .unwrap_err();
    assert_eq!(err.message(), "setter undefined");
}

#[test]
fn test_inherited_readonly_blocks_write() {
    let (heap, mut thr) = setup();
    let proto = heap.new_object().unwrap();
    thr.def_prop(&proto, &key(&heap, "ro"), PropDesc::data(num(1.0), attrs::NONE)).unwrap();
    let o = child_of(&heap, &proto);
    assert!(!thr.put_prop(&obj(&o), &key(&heap, "ro"), &num(2.0)).unwrap());
    assert!(thr.get_own_property(&o, &key(&heap, "ro")).unwrap().is_none());

    let put = putter(&heap);
    let err = thr
        .call(&obj(&put), &Value::Undefined, &[obj(&o), key(&heap, "ro"), num(2.0)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "not writable");
}

#[test]
fn test_non_extensible_receiver() {
    let (heap, mut thr) = setup();
    let o = super::object_with(&mut thr, &[("a", num(1.0))]);
    thr.prevent_extensions(&obj(&o)).unwrap();
    assert!(!thr.put_prop(&obj(&o), &key(&heap, "b"), &num(2.0)).unwrap());
    // Existing properties stay writable.
    assert!(thr.put_prop(&obj(&o), &key(&heap, "a"), &num(3.0)).unwrap());
    assert_eq!(thr.get_prop(&obj(&o), &key(&heap, "a")).unwrap().as_number(), Some(3.0));

    let put = putter(&heap);
    let err = thr
        .call(&obj(&put), &Value::Undefined, &[obj(&o), key(&heap, "b"), num(2.0)])
        .unwrap_err();
    assert_eq!(err.message(), "not extensible");
}

#[test]
fn test_array_writes_track_length() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[num(0.0), num(1.0)]).unwrap();
    let a = obj(&arr);
    assert!(thr.put_prop(&a, &num(2.0), &num(2.0)).unwrap());
    assert_eq!(arr.borrow().array_length(), Some(3));
    assert!(thr.put_prop(&a, &num(10.0), &num(10.0)).unwrap());
    assert_eq!(arr.borrow().array_length(), Some(11));

    assert!(thr.put_prop(&a, &key(&heap, "length"), &num(1.0)).unwrap());
    assert_eq!(arr.borrow().array_length(), Some(1));
    assert!(!thr.has_prop(&a, &num(2.0)).unwrap());
    assert_eq!(thr.get_prop(&a, &num(0.0)).unwrap().as_number(), Some(0.0));

    let err = thr.put_prop(&a, &key(&heap, "length"), &num(-1.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[test]
fn test_write_past_readonly_length() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[num(1.0)]).unwrap();
    thr.def_prop(&arr, &key(&heap, "length"), PropDesc::new().writable(false)).unwrap();
    assert!(!thr.put_prop(&obj(&arr), &num(1.0), &num(2.0)).unwrap());
    assert!(thr.put_prop(&obj(&arr), &num(0.0), &num(5.0)).unwrap());
    assert_eq!(arr.borrow().array_length(), Some(1));

    let put = putter(&heap);
    let err = thr
        .call(&obj(&put), &Value::Undefined, &[obj(&arr), num(1.0), num(2.0)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_mapped_arguments_write_through() {
    let (heap, mut thr) = setup();
    let env = heap.new_environment().unwrap();
    let formals = [heap.intern("x").unwrap()];
    let a = push(&mut thr, &formals, &[num(1.0)], &env, false);
    assert!(thr.put_prop(&obj(&a), &num(0.0), &num(9.0)).unwrap());
    assert_eq!(binding(&env, "x").and_then(|v| v.as_number()), Some(9.0));
    assert_eq!(thr.get_prop(&obj(&a), &num(0.0)).unwrap().as_number(), Some(9.0));
}

#[test]
fn test_typed_array_element_coercion() {
    let (heap, mut thr) = setup();
    let buf = heap.alloc_buffer(vec![0; 2]).unwrap();
    let ta = heap.new_typed_array(buf.clone(), 0, 2, ElementType::Uint8).unwrap();
    assert!(thr.put_prop(&obj(&ta), &num(0.0), &num(257.0)).unwrap());
    assert!(thr.put_prop(&obj(&ta), &num(1.0), &num(-1.0)).unwrap());
    assert_eq!(buf.bytes().as_slice(), &[1, 255]);

    // Out of range element writes are dropped without creating a property.
    assert!(thr.put_prop(&obj(&ta), &num(5.0), &num(1.0)).unwrap());
    assert!(!thr.has_prop(&obj(&ta), &num(5.0)).unwrap());
    assert_eq!(buf.len(), 2);
}

#[test]
fn test_string_object_indices_are_readonly() {
    let (heap, mut thr) = setup();
    let s = heap.new_string_object(heap.intern("ab").unwrap()).unwrap();
    assert!(!thr.put_prop(&obj(&s), &num(0.0), &key(&heap, "z")).unwrap());
    assert!(!thr.put_prop(&obj(&s), &key(&heap, "length"), &num(0.0)).unwrap());
    // Past the string, indices are ordinary.
    assert!(thr.put_prop(&obj(&s), &num(5.0), &num(1.0)).unwrap());
    assert_eq!(thr.get_prop(&obj(&s), &num(5.0)).unwrap().as_number(), Some(1.0));
}

#[test]
fn test_proxy_set_trap() {
    let (heap, mut thr) = setup();
    let target = heap.new_object().unwrap();
    thr.def_prop(&target, &key(&heap, "fixed"), PropDesc::data(num(1.0), attrs::NONE))
        .unwrap();
    let log = super::object_with(&mut thr, &[]);
    let seen = log.clone();
    let trap = native(&heap, "set", move |thr, _, args| {
        let name = arg(args, 1).to_display_string();
        let k = Value::String(thr.heap().intern(&name)?);
        thr.def_prop(&seen, &k, PropDesc::data(arg(args, 2), attrs::WEC))?;
        Ok(Value::Boolean(!name.starts_with("no")))
    });
    let handler = super::object_with(&mut thr, &[("set", obj(&trap))]);
    let p = heap.new_proxy(target.clone(), handler).unwrap();

    assert!(thr.put_prop(&obj(&p), &key(&heap, "yes"), &num(1.0)).unwrap());
    assert_eq!(thr.get_prop(&obj(&log), &key(&heap, "yes")).unwrap().as_number(), Some(1.0));
    assert!(!thr.has_prop(&obj(&target), &key(&heap, "yes")).unwrap());
    assert!(!thr.put_prop(&obj(&p), &key(&heap, "nope"), &num(1.0)).unwrap());

    let put = putter(&heap);
    let err = thr
        .call(&obj(&put), &Value::Undefined, &[obj(&p), key(&heap, "nope"), num(1.0)])
        .unwrap_err();
    assert_eq!(err.message(), "proxy rejected");

    // Reporting success for a fixed, read-only target value is a lie.
    let err = thr.put_prop(&obj(&p), &key(&heap, "fixed"), &num(2.0)).unwrap_err();
    assert_eq!(err.message(), "invalid trap result");
    assert!(thr.put_prop(&obj(&p), &key(&heap, "fixed"), &num(1.0)).unwrap());
}

#[test]
fn test_proxy_without_set_trap_forwards() {
    let (heap, mut thr) = setup();
    let target = heap.new_object().unwrap();
    let handler = heap.new_object().unwrap();
    let p = heap.new_proxy(target.clone(), handler).unwrap();
    assert!(thr.put_prop(&obj(&p), &key(&heap, "x"), &num(4.0)).unwrap());
    assert_eq!(thr.get_prop(&obj(&target), &key(&heap, "x")).unwrap().as_number(), Some(4.0));
}

#[test]
fn test_put_on_undefined_throws() {
    let (heap, mut thr) = setup();
    let err = thr.put_prop(&Value::Undefined, &key(&heap, "x"), &num(1.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(thr.top(), 0);
}
