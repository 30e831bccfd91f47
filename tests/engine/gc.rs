// Tests for reference counting, mark-and-sweep and finalizers

use super::{arg, create_test_heap, key, native, obj, setup};
use esheap::{Heap, MsFlags, ObjRef, PropDesc, Thread, Value, attrs};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn live(heap: &Heap) -> usize {
    heap.gc_stats().live_objects
}

fn link(thr: &mut Thread, from: &ObjRef, to: &ObjRef) {
    let heap = thr.heap().clone();
    let ok = thr
        .def_prop(from, &key(&heap, "next"), PropDesc::data(obj(to), attrs::WEC))
        .unwrap();
    assert!(ok);
}

/// Finalizer that records each call's `heap_destruct` flag.
fn recording_finalizer(heap: &Heap, calls: &Rc<RefCell<Vec<bool>>>) -> ObjRef {
    let calls = calls.clone();
    native(heap, "finalizer", move |_, _, args| {
        calls.borrow_mut().push(arg(args, 1).to_boolean());
        Ok(Value::Undefined)
    })
}

#[test]
fn test_refcount_releases_immediately() {
    let heap = create_test_heap();
    let before = live(&heap);
    let o = heap.new_object().unwrap();
    let arr = heap.new_array(&[obj(&o)]).unwrap();
    assert_eq!(live(&heap), before + 2);
    drop(o);
    assert_eq!(live(&heap), before + 2);
    drop(arr);
    assert_eq!(live(&heap), before);
}

#[test]
fn test_cycles_need_mark_and_sweep() {
    let (heap, mut thr) = setup();
    let before = live(&heap);
    let a = heap.new_object().unwrap();
    let b = heap.new_object().unwrap();
    link(&mut thr, &a, &b);
    link(&mut thr, &b, &a);
    drop(a);
    drop(b);
    assert_eq!(live(&heap), before + 2);

    let count = heap.ms_count();
    assert!(heap.mark_and_sweep(MsFlags::empty()));
    assert_eq!(heap.ms_count(), count + 1);
    assert_eq!(live(&heap), before);
}

#[test]
fn test_reachable_objects_survive() {
    let (heap, mut thr) = setup();
    let root = heap.new_object().unwrap();
    let child = heap.new_object().unwrap();
    link(&mut thr, &root, &child);
    link(&mut thr, &child, &root);
    drop(child);
    heap.mark_and_sweep(MsFlags::empty());
    let next = thr.get_prop(&obj(&root), &key(&heap, "next")).unwrap();
    assert!(next.as_object().is_some());
    drop(next);

    // Values on the thread's stack are roots too.
    thr.push(obj(&root));
    let before = live(&heap);
    drop(root);
    heap.mark_and_sweep(MsFlags::empty());
    assert_eq!(live(&heap), before);
    thr.set_top(0);
    heap.mark_and_sweep(MsFlags::empty());
    assert_eq!(live(&heap), before - 2);
}

#[test]
fn test_finalizer_runs_once_on_refzero() {
    let heap = create_test_heap();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let o = heap.new_object().unwrap();
    heap.set_finalizer(&o, Some(recording_finalizer(&heap, &calls)));
    let before = live(&heap);
    drop(o);
    assert_eq!(heap.gc_stats().pending_finalizers, 1);
    heap.process_finalizers();
    assert_eq!(*calls.borrow(), [false]);
    // Object and finalizer function are both gone.
    assert_eq!(live(&heap), before - 2);
    heap.mark_and_sweep(MsFlags::empty());
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn test_finalizer_on_unreachable_cycle() {
    let (heap, mut thr) = setup();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let before = live(&heap);
    let a = heap.new_object().unwrap();
    let b = heap.new_object().unwrap();
    link(&mut thr, &a, &b);
    link(&mut thr, &b, &a);
    heap.set_finalizer(&a, Some(recording_finalizer(&heap, &calls)));
    drop(a);
    drop(b);

    // First pass rescues the cycle and runs the finalizer.
    heap.mark_and_sweep(MsFlags::empty());
    assert_eq!(*calls.borrow(), [false]);
    assert_eq!(live(&heap), before + 3);
    // Second pass frees it; the finalizer does not run again.
    heap.mark_and_sweep(MsFlags::empty());
    assert_eq!(live(&heap), before);
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn test_finalizer_can_resurrect() {
    let (heap, mut thr) = setup();
    let keeper = heap.new_object().unwrap();
    let saved = keeper.clone();
    let fin = native(&heap, "resurrect", move |thr, _, args| {
        let k = Value::String(thr.heap().intern("saved")?);
        thr.def_prop(&saved, &k, PropDesc::data(arg(args, 0), attrs::WEC))?;
        Ok(Value::Undefined)
    });
    let o = heap.new_object().unwrap();
    heap.set_finalizer(&o, Some(fin));
    drop(o);
    heap.process_finalizers();
    let back = thr.get_prop(&obj(&keeper), &key(&heap, "saved")).unwrap();
    let back = back.as_object().cloned().unwrap();
    assert!(back.is_finalized());
}

#[test]
fn test_critical_section_defers_finalizers() {
    let heap = create_test_heap();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let o = heap.new_object().unwrap();
    heap.set_finalizer(&o, Some(recording_finalizer(&heap, &calls)));
    {
        let _critical = heap.start_critical();
        assert!(heap.ms_base_flags().contains(MsFlags::NO_OBJECT_COMPACTION));
        drop(o);
        heap.process_finalizers();
        heap.mark_and_sweep(MsFlags::empty());
        assert!(calls.borrow().is_empty());
    }
    assert_eq!(heap.ms_base_flags(), MsFlags::empty());
    heap.process_finalizers();
    assert_eq!(*calls.borrow(), [false]);
}

#[test]
fn test_destroy_runs_remaining_finalizers() {
    let heap = create_test_heap();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let kept = heap.new_object().unwrap();
    heap.set_finalizer(&kept, Some(recording_finalizer(&heap, &calls)));
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let other = native(&heap, "other", move |_, _, _| {
        flag.set(true);
        Ok(Value::Undefined)
    });
    let second = heap.new_object().unwrap();
    heap.set_finalizer(&second, Some(other));

    heap.destroy();
    assert_eq!(*calls.borrow(), [true]);
    assert!(ran.get());
    drop(kept);
    drop(second);
}

#[test]
fn test_voluntary_gc_collects_garbage() {
    let mut config = esheap::HeapConfig::default();
    config.gc_trigger_mult = 0;
    config.gc_trigger_add = 16;
    let allocator: esheap::AllocatorRef =
        Rc::new(RefCell::new(esheap::DefaultAllocator::default()));
    let heap = Heap::with_config(config, allocator);
    let mut thr = Thread::new(heap.clone());
    for _ in 0..20 {
        let a = heap.new_object().unwrap();
        let b = heap.new_object().unwrap();
        link(&mut thr, &a, &b);
        link(&mut thr, &b, &a);
    }
    assert!(heap.ms_count() > 0);
    assert!(heap.ms_trigger() <= 16);
    assert!(live(&heap) < 40);
}
