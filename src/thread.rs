//! Execution context: value stack, native call depth and the public
//! property API.
//!
//! Every public property operation runs pending finalizers before returning,
//! once no borrow of any object is held.

use crate::error::JsError;
use crate::heap::Heap;
use crate::object::{BoundFunction, NativeFn, ObjRef, ObjectClass};
use crate::prelude::*;
use crate::props::enumerate::Enumerator;
use crate::props::{self, PropDesc, PropertyDescriptor};
use crate::value::{HString, Value};

/// Maximum nesting of native calls.
const MAX_CALL_DEPTH: u32 = 1000;

/// What a callable value resolves to.
enum Callee {
    Native(NativeFn),
    Bound(BoundFunction),
    ProxyTarget(Option<ObjRef>),
}

/// One execution context on a heap.
pub struct Thread {
    heap: Heap,
    stack: Vec<Value>,
    /// Nesting depth of native calls; nonzero means "inside a C call"
    call_depth: u32,
}

impl Thread {
    pub fn new(heap: Heap) -> Self {
        Thread {
            heap,
            stack: Vec::new(),
            call_depth: 0,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Whether a native call is active. Operations inside one use strict
    /// (throwing) failure semantics.
    pub fn in_native_call(&self) -> bool {
        self.call_depth > 0
    }

    pub fn call_depth(&self) -> u32 {
        self.call_depth
    }

    // ═══════════════════════════════════════════════════════════════
    // Value stack
    // ═══════════════════════════════════════════════════════════════

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Pop `n` values, returned bottom first.
    pub fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len().saturating_sub(n);
        self.stack.split_off(at)
    }

    /// Number of values on the stack.
    pub fn top(&self) -> usize {
        self.stack.len()
    }

    pub fn set_top(&mut self, top: usize) {
        self.stack.truncate(top);
    }

    /// Resolve a stack index; negative indices count from the top.
    pub fn normalize_index(&self, index: i32) -> Result<usize, JsError> {
        let len = self.stack.len();
        let resolved = if index < 0 {
            len.checked_sub(usize::try_from(index.unsigned_abs()).unwrap_or(usize::MAX))
        } else {
            usize::try_from(index).ok().filter(|i| *i < len)
        };
        resolved.ok_or_else(|| JsError::range_error(format!("invalid stack index {}", index)))
    }

    pub fn get(&self, index: i32) -> Result<Value, JsError> {
        let i = self.normalize_index(index)?;
        self.stack
            .get(i)
            .cloned()
            .ok_or_else(|| JsError::range_error(format!("invalid stack index {}", index)))
    }

    pub(crate) fn get_at(&self, slot: usize) -> Option<&Value> {
        self.stack.get(slot)
    }

    pub(crate) fn replace_at(&mut self, slot: usize, value: Value) -> Option<Value> {
        self.stack.get_mut(slot).map(|s| mem::replace(s, value))
    }

    // ═══════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════

    fn enter<T>(
        &mut self,
        f: impl FnOnce(&mut Thread) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(JsError::range_error("call stack limit"));
        }
        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }

    /// Call a function value with `this` and `args`.
    pub fn call(&mut self, func: &Value, this: &Value, args: &[Value]) -> Result<Value, JsError> {
        let mut func = func.clone();
        let mut this = this.clone();
        let mut args: Vec<Value> = args.to_vec();
        // Bound functions and proxies are unwrapped iteratively.
        for _ in 0..self.heap.config().prototype_chain_sanity {
            let obj = match &func {
                Value::LightFunc(lf) => {
                    let f = lf.func;
                    return self.enter(|thr| f(thr, &this, &args));
                }
                Value::Object(obj) => obj.clone(),
                other => {
                    return Err(JsError::type_error(format!(
                        "{} not callable",
                        other.type_name()
                    )));
                }
            };
            let callee = match obj.try_borrow().map(|o| match &o.class {
                ObjectClass::NativeFunction(nf) => Some(Callee::Native(nf.func.clone())),
                ObjectClass::BoundFunction(bf) => Some(Callee::Bound(bf.clone())),
                ObjectClass::Proxy(p) => Some(Callee::ProxyTarget(p.target.clone())),
                _ => None,
            }) {
                Some(Some(callee)) => callee,
                _ => return Err(JsError::type_error("object not callable")),
            };
            match callee {
                Callee::Native(f) => return self.enter(|thr| f(thr, &this, &args)),
                Callee::Bound(bound) => {
                    func = Value::Object(bound.target);
                    this = bound.this;
                    let mut full = bound.args;
                    full.extend(args);
                    args = full;
                }
                Callee::ProxyTarget(Some(target)) => func = Value::Object(target),
                Callee::ProxyTarget(None) => {
                    return Err(JsError::type_error(crate::error::MSG_PROXY_REVOKED));
                }
            }
        }
        log::warn!("call: bound function chain exceeds sanity limit");
        Err(JsError::range_error("bound function chain too long"))
    }

    // ═══════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════

    /// Materialize an error as a script value. A failure while doing so, or
    /// an error raised while another is being created, yields the heap's
    /// pre-built double error.
    pub fn error_to_value(&mut self, err: &JsError) -> Value {
        let double_error = || Value::Object(self.heap.double_error().clone());
        match err {
            JsError::Thrown(value) => value.clone(),
            JsError::DoubleFault => double_error(),
            _ => {
                if self.heap.creating_error() {
                    log::warn!("error: double fault while creating {}", err);
                    return double_error();
                }
                self.heap.enter_error_creation();
                let created = self.heap.new_error(err.kind(), &err.message());
                self.heap.leave_error_creation();
                match created {
                    Ok(obj) => Value::Object(obj),
                    Err(inner) => {
                        log::warn!("error: cannot create {}: {}", err, inner);
                        double_error()
                    }
                }
            }
        }
    }

    fn finish<T>(&mut self, result: Result<T, JsError>) -> Result<T, JsError> {
        self.heap.process_finalizers();
        result
    }

    // ═══════════════════════════════════════════════════════════════
    // Property API
    // ═══════════════════════════════════════════════════════════════

    /// Delete `obj[key]`. Strict (throwing) inside a native call, otherwise
    /// a refused delete returns false.
    pub fn del_prop(&mut self, obj: &Value, key: &Value) -> Result<bool, JsError> {
        let strict = self.in_native_call();
        let result = props::delete::delete_value(self, obj, key, strict);
        self.finish(result)
    }

    /// Push the own property descriptor of `obj[key]` using the descriptor
    /// convention: returns -1 with nothing pushed, or the attribute byte with
    /// one value (data) or getter and setter (accessor) pushed.
    pub fn get_own_prop_desc(&mut self, obj: &ObjRef, key: &Value) -> Result<i32, JsError> {
        let result = props::to_prop_key(&self.heap, key)
            .and_then(|key| props::getown::getown(self, obj, &key));
        self.finish(result)
    }

    /// Own property descriptor of `obj[key]` as an owned value.
    pub fn get_own_property(
        &mut self,
        obj: &ObjRef,
        key: &Value,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let code = self.get_own_prop_desc(obj, key)?;
        Ok(props::pop_propdesc(self, code))
    }

    /// Define `obj[key]` from `desc`. Failure returns false, or throws when
    /// the descriptor asks for it or a native call is active.
    pub fn def_prop(&mut self, obj: &ObjRef, key: &Value, desc: PropDesc) -> Result<bool, JsError> {
        let desc = if self.in_native_call() {
            desc.throwing()
        } else {
            desc
        };
        let result = props::to_prop_key(&self.heap, key)
            .and_then(|key| props::defown::defown(self, obj, &key, &desc));
        self.finish(result)
    }

    /// `key in obj`.
    pub fn has_prop(&mut self, obj: &Value, key: &Value) -> Result<bool, JsError> {
        let result = props::has::has_value(self, obj, key);
        self.finish(result)
    }

    /// `obj[key]`.
    pub fn get_prop(&mut self, obj: &Value, key: &Value) -> Result<Value, JsError> {
        let result = props::to_prop_key(&self.heap, key)
            .and_then(|key| props::get::get_value(self, obj, &key));
        self.finish(result)
    }

    /// `obj[key] = value`. A refused write returns `false` outside native
    /// calls and throws a TypeError inside them.
    pub fn put_prop(&mut self, obj: &Value, key: &Value, value: &Value) -> Result<bool, JsError> {
        let strict = self.in_native_call();
        let result = props::to_prop_key(&self.heap, key)
            .and_then(|key| props::set::put_value(self, obj, &key, value, strict));
        self.finish(result)
    }

    /// Snapshot the keys `for (k in obj)` would visit; `flags` as in
    /// [`props::enumerate`].
    pub fn enumerate(&mut self, obj: &ObjRef, flags: u32) -> Result<Enumerator, JsError> {
        let result = props::enumerate::enumerate(self, obj, flags);
        self.finish(result)
    }

    /// Next live key of `en` with its value, or `None` once exhausted.
    pub fn enum_next(&mut self, en: &mut Enumerator) -> Result<Option<(Value, Value)>, JsError> {
        let result = props::enumerate::next_entry(self, en);
        self.finish(result)
    }

    /// Own property keys filtered by `flags` (see [`props::ownkeys`]).
    pub fn own_keys(&mut self, obj: &ObjRef, flags: u32) -> Result<Vec<Value>, JsError> {
        let result = props::ownkeys::own_keys(self, obj, flags);
        self.finish(result)
    }

    pub fn prevent_extensions(&mut self, obj: &Value) -> Result<bool, JsError> {
        let result = props::seal::prevent_extensions(self, obj);
        self.finish(result)
    }

    pub fn seal(&mut self, obj: &Value) -> Result<(), JsError> {
        let result = props::seal::seal_freeze(self, obj, false);
        self.finish(result)
    }

    pub fn freeze(&mut self, obj: &Value) -> Result<(), JsError> {
        let result = props::seal::seal_freeze(self, obj, true);
        self.finish(result)
    }

    pub fn is_sealed(&mut self, obj: &Value) -> Result<bool, JsError> {
        let result = props::seal::test_integrity(self, obj, false);
        self.finish(result)
    }

    pub fn is_frozen(&mut self, obj: &Value) -> Result<bool, JsError> {
        let result = props::seal::test_integrity(self, obj, true);
        self.finish(result)
    }

    pub fn is_extensible(&mut self, obj: &Value) -> Result<bool, JsError> {
        let result = props::seal::is_extensible(self, obj);
        self.finish(result)
    }

    /// Build an Arguments object for a call with `formals` parameter names.
    /// Non-strict calls map each passed argument below the formal count to
    /// its binding in `env`.
    pub fn push_arguments(
        &mut self,
        formals: &[HString],
        args: &[Value],
        env: &ObjRef,
        strict: bool,
    ) -> Result<ObjRef, JsError> {
        let result = props::arguments::create_arguments(self, formals, args, env, strict);
        if let Ok(obj) = &result {
            self.push(Value::Object(obj.clone()));
        }
        self.finish(result)
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("stack", &self.stack.len())
            .field("call_depth", &self.call_depth)
            .finish()
    }
}
