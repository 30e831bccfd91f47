// Tests for the allocator front-end: GC retries, emergency mode, refusal

use super::{key, num, obj};
use esheap::{
    AllocatorRef, ErrorKind, Heap, HeapConfig, LimitAllocator, ObjRef, PropDesc, Thread, Value,
    attrs,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Heap without voluntary GC on a budgeted allocator (initially unlimited).
fn limited_heap() -> (Heap, Rc<RefCell<LimitAllocator>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let limiter = Rc::new(RefCell::new(LimitAllocator::new(usize::MAX)));
    let allocator: AllocatorRef = limiter.clone();
    (Heap::with_config(HeapConfig::without_voluntary_gc(), allocator), limiter)
}

fn freeze_budget(heap: &Heap, limiter: &Rc<RefCell<LimitAllocator>>) {
    let in_use = heap.mem_in_use();
    limiter.borrow_mut().set_limit(in_use);
}

fn garbage_cycle(thr: &mut Thread) {
    let heap = thr.heap().clone();
    let a = heap.new_object().unwrap();
    let b = heap.new_object().unwrap();
    let k = key(&heap, "peer");
    thr.def_prop(&a, &k, PropDesc::data(obj(&b), attrs::WEC)).unwrap();
    thr.def_prop(&b, &k, PropDesc::data(obj(&a), attrs::WEC)).unwrap();
}

#[test]
fn test_accounting_follows_objects() {
    let (heap, _limiter) = limited_heap();
    let start = heap.mem_in_use();
    let o = heap.new_object().unwrap();
    let with_object = heap.mem_in_use();
    assert!(with_object > start);
    drop(o);
    assert_eq!(heap.mem_in_use(), start);
}

#[test]
fn test_refusal_after_retries_is_alloc_error() {
    let (heap, limiter) = limited_heap();
    let retries = heap.config().alloc_retry_limit;
    freeze_budget(&heap, &limiter);
    let count = heap.ms_count();

    let err = heap.new_object().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Alloc);
    assert_eq!(err.message(), "alloc failed");
    assert_eq!(heap.ms_count(), count + u64::from(retries));
    assert!(limiter.borrow().refusals() >= 1 + retries as usize);

    // Zero-sized requests never reach the allocator.
    assert!(heap.mem_alloc(0).is_some());
    assert!(heap.mem_alloc(1).is_none());
}

#[test]
fn test_gc_retry_reclaims_cycles() {
    let (heap, limiter) = limited_heap();
    let mut thr = Thread::new(heap.clone());
    garbage_cycle(&mut thr);
    freeze_budget(&heap, &limiter);
    let count = heap.ms_count();

    // The first retry pass frees the cycle, making room for the new object.
    let o = heap.new_object().unwrap();
    assert_eq!(heap.ms_count(), count + 1);
    assert_eq!(limiter.borrow().refusals(), 1);
    drop(o);
}

#[test]
fn test_emergency_pass_compacts_objects() {
    let (heap, limiter) = limited_heap();
    let mut thr = Thread::new(heap.clone());
    let o = heap.new_object().unwrap();
    // Hold the keys so ordinary passes have no strings to free.
    let keys: Vec<Value> = (0..64).map(|i| key(&heap, &format!("p{}", i))).collect();
    for (i, k) in keys.iter().enumerate() {
        thr.def_prop(&o, k, PropDesc::data(num(i as f64), attrs::WEC)).unwrap();
    }
    for k in keys.iter().take(48) {
        assert!(thr.del_prop(&obj(&o), k).unwrap());
    }
    assert!(o.borrow().strprops().capacity() >= 64);
    freeze_budget(&heap, &limiter);
    let count = heap.ms_count();

    // Two ordinary passes free nothing; the first emergency pass compacts
    // `o` and the one byte fits.
    let buf = heap.alloc_buffer(vec![0]).unwrap();
    assert_eq!(buf.len(), 1);
    let emergency_at = u64::from(heap.config().emergency_limit);
    assert_eq!(heap.ms_count(), count + emergency_at);
    assert_eq!(o.borrow().strprops().capacity(), 16);
    assert_eq!(o.borrow().strprops().live_count(), 16);
}

#[test]
fn test_growth_failure_leaves_object_intact() {
    let (heap, limiter) = limited_heap();
    let mut thr = Thread::new(heap.clone());
    let o = super::object_with(&mut thr, &[("a", num(1.0))]);
    let keys: Vec<Value> = (0..40).map(|i| key(&heap, &format!("k{}", i))).collect();
    freeze_budget(&heap, &limiter);

    let mut defined = 0;
    let mut failure = None;
    for k in &keys {
        match thr.def_prop(&o, k, PropDesc::data(Value::Null, attrs::WEC)) {
            Ok(ok) => {
                assert!(ok);
                defined += 1;
            }
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }
    let err = failure.unwrap();
    assert_eq!(err.kind(), ErrorKind::Alloc);
    // Everything defined before the failure is still there.
    assert_eq!(o.borrow().strprops().live_count(), 1 + defined);
    assert_eq!(thr.get_prop(&obj(&o), &key(&heap, "a")).unwrap().as_number(), Some(1.0));

    limiter.borrow_mut().set_limit(usize::MAX);
    assert!(thr.def_prop(&o, &keys[0], PropDesc::data(Value::Null, attrs::WEC)).is_ok());
}

#[test]
fn test_double_fault_when_error_cannot_be_created() {
    let (heap, limiter) = limited_heap();
    let mut thr = Thread::new(heap.clone());
    freeze_budget(&heap, &limiter);
    let err = heap.new_object().unwrap_err();
    let v = thr.error_to_value(&err);
    let sentinel = v.as_object().cloned().unwrap();
    assert!(ObjRef::ptr_eq(&sentinel, heap.double_error()));

    limiter.borrow_mut().set_limit(usize::MAX);
    let v = thr.error_to_value(&err);
    assert!(!ObjRef::ptr_eq(v.as_object().unwrap(), heap.double_error()));
}
