// Tests for the property store: entries part, hash index, array items, compaction

use super::{key, num, obj, setup};
use esheap::{PropDesc, Value, attrs};

// ═══════════════════════════════════════════════════════════════════════════
// Entries part
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_entries_grow_and_keep_insertion_order() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    for i in 0..20 {
        let k = key(&heap, &format!("k{}", i));
        assert!(thr.def_prop(&o, &k, PropDesc::data(num(i as f64), attrs::WEC)).unwrap());
    }
    {
        let b = o.borrow();
        assert_eq!(b.strprops().live_count(), 20);
        assert!(b.strprops().capacity() >= 20);
    }
    let names = super::key_names(&mut thr, &o, esheap::INCLUDE_ALL);
    let expected: Vec<String> = (0..20).map(|i| format!("k{}", i)).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_hash_index_appears_above_limit() {
    let (heap, mut thr) = setup();
    let limit = heap.config().hash_prop_limit;
    let o = heap.new_object().unwrap();
    let k = key(&heap, "first");
    thr.def_prop(&o, &k, PropDesc::data(Value::Null, attrs::WEC)).unwrap();
    assert_eq!(o.borrow().strprops().hash_size(), 0);

    for i in 0..limit * 2 {
        let k = key(&heap, &format!("p{}", i));
        thr.def_prop(&o, &k, PropDesc::data(num(i as f64), attrs::WEC)).unwrap();
    }
    let b = o.borrow();
    let hash_size = b.strprops().hash_size();
    assert!(hash_size.is_power_of_two());
    assert!(hash_size > b.strprops().capacity());
    drop(b);

    // Every key is still reachable through the hash.
    for i in 0..limit * 2 {
        let k = key(&heap, &format!("p{}", i));
        let v = thr.get_prop(&obj(&o), &k).unwrap();
        assert_eq!(v.as_number(), Some(i as f64));
    }
}

#[test]
fn test_deleted_keys_are_not_found_through_hash() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    for i in 0..100 {
        let k = key(&heap, &format!("x{}", i));
        thr.def_prop(&o, &k, PropDesc::data(num(i as f64), attrs::WEC)).unwrap();
    }
    for i in (0..100).step_by(3) {
        assert!(thr.del_prop(&obj(&o), &key(&heap, &format!("x{}", i))).unwrap());
    }
    for i in 0..100 {
        let present = thr.has_prop(&obj(&o), &key(&heap, &format!("x{}", i))).unwrap();
        assert_eq!(present, i % 3 != 0, "key x{}", i);
    }
    // Re-adding a deleted key lands at the end of the order.
    let k = key(&heap, "x0");
    thr.def_prop(&o, &k, PropDesc::data(Value::Null, attrs::WEC)).unwrap();
    let names = super::key_names(&mut thr, &o, esheap::INCLUDE_STRING);
    assert_eq!(names.last().map(String::as_str), Some("x0"));
}

#[test]
fn test_compact_shrinks_to_live_content() {
    let (heap, mut thr) = setup();
    let o = heap.new_object().unwrap();
    for i in 0..64 {
        let k = key(&heap, &format!("c{}", i));
        thr.def_prop(&o, &k, PropDesc::data(num(i as f64), attrs::WEC)).unwrap();
    }
    for i in 0..48 {
        thr.del_prop(&obj(&o), &key(&heap, &format!("c{}", i))).unwrap();
    }
    heap.compact(&o).unwrap();
    {
        let b = o.borrow();
        assert_eq!(b.strprops().capacity(), 16);
        assert_eq!(b.strprops().live_count(), 16);
        assert_eq!(b.strprops().hash_size(), 0);
    }
    let names = super::key_names(&mut thr, &o, esheap::INCLUDE_STRING);
    let expected: Vec<String> = (48..64).map(|i| format!("c{}", i)).collect();
    assert_eq!(names, expected);
}

// ═══════════════════════════════════════════════════════════════════════════
// Array items
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sequential_writes_stay_dense() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[]).unwrap();
    for i in 0..300u32 {
        thr.def_prop(&arr, &num(f64::from(i)), PropDesc::data(num(f64::from(i)), attrs::WEC))
            .unwrap();
    }
    let b = arr.borrow();
    assert!(b.has_array_items());
    assert_eq!(b.array_length(), Some(300));
    assert!(b.items().len() >= 300);
    assert_eq!(b.idxprops().live_count(), 0);
}

#[test]
fn test_far_write_abandons_items() {
    let (heap, mut thr) = setup();
    let arr = heap.new_array(&[num(1.0), num(2.0)]).unwrap();
    thr.def_prop(&arr, &num(100_000.0), PropDesc::data(Value::Null, attrs::WEC))
        .unwrap();
    {
        let b = arr.borrow();
        assert!(!b.has_array_items());
        assert_eq!(b.array_length(), Some(100_001));
        assert_eq!(b.idxprops().live_count(), 3);
    }
    let v = thr.get_prop(&obj(&arr), &num(1.0)).unwrap();
    assert_eq!(v.as_number(), Some(2.0));
    let names = super::key_names(&mut thr, &arr, esheap::INCLUDE_ARRIDX);
    assert_eq!(names, ["0", "1", "100000"]);
}

#[test]
fn test_compact_trims_trailing_holes() {
    let (heap, mut thr) = setup();
    let values: Vec<Value> = (0..10).map(|i| num(f64::from(i))).collect();
    let arr = heap.new_array(&values).unwrap();
    thr.del_prop(&obj(&arr), &num(9.0)).unwrap();
    thr.del_prop(&obj(&arr), &num(8.0)).unwrap();
    heap.compact(&arr).unwrap();
    let b = arr.borrow();
    assert!(b.has_array_items());
    assert_eq!(b.items().len(), 8);
    assert_eq!(b.array_length(), Some(10));
}

#[test]
fn test_array_length_shrink_truncates_items() {
    let (heap, mut thr) = setup();
    let values: Vec<Value> = (0..5).map(|i| num(f64::from(i))).collect();
    let arr = heap.new_array(&values).unwrap();
    let len = key(&heap, "length");
    assert!(thr.def_prop(&arr, &len, PropDesc::new().value(num(2.0))).unwrap());
    assert_eq!(arr.borrow().array_length(), Some(2));
    assert!(!thr.has_prop(&obj(&arr), &num(3.0)).unwrap());
    let names = super::key_names(&mut thr, &arr, esheap::INCLUDE_ALL);
    assert_eq!(names, ["0", "1", "length"]);
}
