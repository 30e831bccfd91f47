#![no_main]

use esheap::{Heap, MsFlags, PropDesc, Thread, Value, attrs};
use libfuzzer_sys::fuzz_target;

const MAX_OPS: usize = 4_096;

// Each input byte pair is one operation on a small pool of objects:
// high nibble selects the operation, the rest picks object and key.
fuzz_target!(|data: &[u8]| {
    let heap = Heap::new();
    let mut thr = Thread::new(heap.clone());
    let Ok(objects) = (0..4)
        .map(|i| if i % 2 == 0 { heap.new_object() } else { heap.new_array(&[]) })
        .collect::<Result<Vec<_>, _>>()
    else {
        return;
    };
    let keys: Vec<Value> = ["a", "b", "length", "0", "1", "4294967295"]
        .iter()
        .filter_map(|s| heap.intern(s).ok())
        .map(Value::String)
        .chain((0..6).map(|i| Value::from(f64::from(i * 37))))
        .collect();

    for pair in data.chunks_exact(2).take(MAX_OPS) {
        let (op, arg) = (pair[0], pair[1]);
        let obj = &objects[usize::from(arg) % objects.len()];
        let key = &keys[usize::from(arg >> 2) % keys.len()];
        let target = Value::Object(obj.clone());
        let _ = match op >> 4 {
            0..=3 => thr
                .def_prop(obj, key, PropDesc::data(Value::from(f64::from(op)), op & 0x07))
                .map(|_| ()),
            4 => thr
                .def_prop(obj, key, PropDesc::new().writable(op & 1 != 0))
                .map(|_| ()),
            5 => thr.del_prop(&target, key).map(|_| ()),
            6 => thr.get_prop(&target, key).map(|_| ()),
            7 => thr.has_prop(&target, key).map(|_| ()),
            8 => thr.own_keys(obj, esheap::INCLUDE_ALL).map(|_| ()),
            9 => heap.compact(obj),
            10 => thr.seal(&target),
            11 => thr.freeze(&target),
            12 => thr.prevent_extensions(&target).map(|_| ()),
            13 => {
                let other = Value::Object(objects[usize::from(op) % objects.len()].clone());
                thr.def_prop(obj, key, PropDesc::data(other, attrs::WEC)).map(|_| ())
            }
            _ => {
                heap.mark_and_sweep(MsFlags::empty());
                Ok(())
            }
        };
    }
    heap.destroy();
});
