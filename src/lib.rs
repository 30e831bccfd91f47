//! Object heap and property engine for an embeddable ECMAScript engine
//!
//! Objects keep their properties in three parts: an insertion-ordered
//! entries part (with an optional hash index), a dense array-items part and
//! a sparse index-properties part. The property engine layers the
//! [[GetOwnProperty]], [[DefineOwnProperty]], [[Set]], [[Delete]],
//! [[HasProperty]] and [[OwnPropertyKeys]] semantics of every exotic class on
//! top, along with for-in enumeration. Memory goes through an allocator
//! front-end that retries with garbage collection, and objects are reclaimed by reference counting backed by mark-and-sweep.
//!
//! # Example
//!
//! ```
//! use esheap::{Heap, PropDesc, Thread, Value, attrs};
//!
//! let heap = Heap::new();
//! let mut thr = Thread::new(heap.clone());
//! let obj = heap.new_object().unwrap();
//! let key = Value::String(heap.intern("answer").unwrap());
//!
//! thr.def_prop(&obj, &key, PropDesc::data(Value::from(42.0), attrs::WEC)).unwrap();
//! let value = thr.get_prop(&Value::Object(obj.clone()), &key).unwrap();
//! assert_eq!(value.as_number(), Some(42.0));
//!
//! assert!(thr.del_prop(&Value::Object(obj.clone()), &key).unwrap());
//! assert!(!thr.has_prop(&Value::Object(obj), &key).unwrap());
//! ```

pub mod config;
pub mod error;
pub mod gc;
pub mod heap;
pub mod memory;
pub mod object;
pub mod prelude;
pub mod props;
pub mod string_dict;
pub mod thread;
pub mod value;

pub use config::HeapConfig;
pub use error::{ErrorKind, JsError};
pub use gc::GcStats;
pub use heap::{Heap, MsFlags};
pub use memory::{Allocator, AllocatorRef, DefaultAllocator, LimitAllocator};
pub use object::{
    ElementType, HObject, ObjRef, ObjectClass, PropValue, TypedArrayView, attrs,
};
pub use props::enumerate::{ENUM_OWN_ONLY, Enumerator, FOR_IN_KEYS};
pub use props::ownkeys::{
    ENUMERABLE_KEYS, INCLUDE_ALL, INCLUDE_ARRIDX, INCLUDE_HIDDEN, INCLUDE_STRING, INCLUDE_SYMBOL,
    NO_PROXY_BEHAVIOR, REQUIRE_ENUMERABLE,
};
pub use props::{PropDesc, PropertyDescriptor, defprop};
pub use thread::Thread;
pub use value::{HBuffer, HString, LightFunc, PropKey, Value};
