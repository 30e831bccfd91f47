//! Property engine: exotic [[GetOwnProperty]], [[DefineOwnProperty]],
//! [[Set]], [[Delete]], [[HasProperty]] and [[OwnPropertyKeys]] over every object
//! class, plus for-in enumeration and the integrity operations built on them.
//!
//! Operations that may allocate or call user code (getters, proxy traps,
//! finalizers) take `&mut Thread` and never hold an object borrow across such
//! a call. Operations that cannot take `&HObject` or `&ObjRef` only.

pub mod arguments;
pub mod array;
pub mod defown;
pub mod delete;
pub mod enumerate;
pub mod get;
pub mod getown;
pub mod has;
pub mod ownkeys;
pub mod proxy;
pub mod seal;
pub mod set;

use crate::error::JsError;
use crate::heap::Heap;
use crate::object::{ObjRef, PropValue, attrs};
use crate::prelude::*;
use crate::thread::Thread;
use crate::value::{HString, PropKey, Value, number_to_arridx, number_to_string};

// ═══════════════════════════════════════════════════════════════
// Descriptors
// ═══════════════════════════════════════════════════════════════

/// A complete own property descriptor.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub value: PropValue,
    /// Attribute byte; `attrs::ACCESSOR` is set for accessors
    pub attrs: u8,
}

impl PropertyDescriptor {
    pub fn new(value: PropValue, flags: u8) -> Self {
        let flags = if value.is_accessor() {
            (flags | attrs::ACCESSOR) & !attrs::WRITABLE
        } else {
            flags & !attrs::ACCESSOR
        };
        PropertyDescriptor {
            value,
            attrs: flags,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.value.is_accessor()
    }

    pub fn writable(&self) -> bool {
        self.attrs & attrs::WRITABLE != 0
    }

    pub fn enumerable(&self) -> bool {
        self.attrs & attrs::ENUMERABLE != 0
    }

    pub fn configurable(&self) -> bool {
        self.attrs & attrs::CONFIGURABLE != 0
    }

    /// Value of a data property.
    pub fn data(&self) -> Option<&Value> {
        self.value.data()
    }

    pub fn getter(&self) -> Option<&ObjRef> {
        match &self.value {
            PropValue::Accessor { get, .. } => get.as_ref(),
            PropValue::Data(_) => None,
        }
    }

    pub fn setter(&self) -> Option<&ObjRef> {
        match &self.value {
            PropValue::Accessor { set, .. } => set.as_ref(),
            PropValue::Data(_) => None,
        }
    }
}

/// Flags of a [`PropDesc`].
pub mod defprop {
    pub const WRITABLE: u16 = 1 << 0;
    pub const ENUMERABLE: u16 = 1 << 1;
    pub const CONFIGURABLE: u16 = 1 << 2;
    pub const HAVE_WRITABLE: u16 = 1 << 3;
    pub const HAVE_ENUMERABLE: u16 = 1 << 4;
    pub const HAVE_CONFIGURABLE: u16 = 1 << 5;
    pub const HAVE_VALUE: u16 = 1 << 6;
    pub const HAVE_GETTER: u16 = 1 << 7;
    pub const HAVE_SETTER: u16 = 1 << 8;
    /// Skip validation and extensibility checks
    pub const FORCE: u16 = 1 << 9;
    /// Throw a TypeError on failure instead of returning false
    pub const THROW: u16 = 1 << 10;
}

/// A (possibly partial) descriptor passed to define.
#[derive(Debug, Clone, Default)]
pub struct PropDesc {
    pub(crate) flags: u16,
    pub(crate) value: Value,
    pub(crate) get: Option<ObjRef>,
    pub(crate) set: Option<ObjRef>,
}

impl PropDesc {
    /// Generic descriptor with no fields.
    pub fn new() -> Self {
        PropDesc::default()
    }

    /// Data descriptor with every field present.
    pub fn data(value: Value, flags: u8) -> Self {
        PropDesc::new()
            .value(value)
            .writable(flags & attrs::WRITABLE != 0)
            .enumerable(flags & attrs::ENUMERABLE != 0)
            .configurable(flags & attrs::CONFIGURABLE != 0)
    }

    /// Accessor descriptor with every field present.
    pub fn accessor(get: Option<ObjRef>, set: Option<ObjRef>, flags: u8) -> Self {
        PropDesc::new()
            .getter(get)
            .setter(set)
            .enumerable(flags & attrs::ENUMERABLE != 0)
            .configurable(flags & attrs::CONFIGURABLE != 0)
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = value;
        self.flags |= defprop::HAVE_VALUE;
        self
    }

    fn with_bit(mut self, have: u16, bit: u16, on: bool) -> Self {
        self.flags |= have;
        if on {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
        self
    }

    pub fn writable(self, on: bool) -> Self {
        self.with_bit(defprop::HAVE_WRITABLE, defprop::WRITABLE, on)
    }

    pub fn enumerable(self, on: bool) -> Self {
        self.with_bit(defprop::HAVE_ENUMERABLE, defprop::ENUMERABLE, on)
    }

    pub fn configurable(self, on: bool) -> Self {
        self.with_bit(defprop::HAVE_CONFIGURABLE, defprop::CONFIGURABLE, on)
    }

    pub fn getter(mut self, get: Option<ObjRef>) -> Self {
        self.get = get;
        self.flags |= defprop::HAVE_GETTER;
        self
    }

    pub fn setter(mut self, set: Option<ObjRef>) -> Self {
        self.set = set;
        self.flags |= defprop::HAVE_SETTER;
        self
    }

    pub fn throwing(mut self) -> Self {
        self.flags |= defprop::THROW;
        self
    }

    pub fn forced(mut self) -> Self {
        self.flags |= defprop::FORCE;
        self
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub(crate) fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn is_accessor_desc(&self) -> bool {
        self.has(defprop::HAVE_GETTER | defprop::HAVE_SETTER)
    }

    pub fn is_data_desc(&self) -> bool {
        self.has(defprop::HAVE_VALUE | defprop::HAVE_WRITABLE)
    }

    pub fn is_generic_desc(&self) -> bool {
        !self.is_accessor_desc() && !self.is_data_desc()
    }

    pub(crate) fn throws(&self) -> bool {
        self.has(defprop::THROW)
    }

    /// Attribute bits given by the descriptor, missing ones cleared.
    pub(crate) fn attr_bits(&self) -> u8 {
        let mut bits = 0;
        if self.has(defprop::WRITABLE) {
            bits |= attrs::WRITABLE;
        }
        if self.has(defprop::ENUMERABLE) {
            bits |= attrs::ENUMERABLE;
        }
        if self.has(defprop::CONFIGURABLE) {
            bits |= attrs::CONFIGURABLE;
        }
        bits
    }
}

// ═══════════════════════════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════════════════════════

/// Key of an interned string: array indices become index keys.
pub fn string_key(s: HString) -> PropKey {
    if s.is_arridx() {
        PropKey::Index(s.arridx())
    } else {
        PropKey::Str(s)
    }
}

/// Coerce a value to a property key. `0xFFFF_FFFF` is not an array index and
/// is keyed by its string form.
pub fn to_prop_key(heap: &Heap, key: &Value) -> Result<PropKey, JsError> {
    match key {
        Value::String(s) => Ok(string_key(s.clone())),
        Value::Number(n) => match number_to_arridx(*n) {
            Some(idx) => Ok(PropKey::Index(idx)),
            None => Ok(string_key(heap.intern(&number_to_string(*n))?)),
        },
        Value::Object(obj) => {
            let boxed = obj.try_borrow().and_then(|o| o.internal_string());
            match boxed {
                Some(s) => Ok(string_key(s)),
                None => Err(JsError::type_error("cannot coerce object to property key")),
            }
        }
        other => Ok(string_key(heap.intern(&other.to_display_string())?)),
    }
}

/// Key as a script value; index keys become their decimal string.
pub fn key_to_value(heap: &Heap, key: &PropKey) -> Result<Value, JsError> {
    match key {
        PropKey::Index(idx) => Ok(Value::String(heap.intern(&format!("{}", idx))?)),
        PropKey::Str(s) => Ok(Value::String(s.clone())),
    }
}

// ═══════════════════════════════════════════════════════════════
// Descriptor convention on the value stack
// ═══════════════════════════════════════════════════════════════

/// Push a found property: one value for data, getter and setter for
/// accessors. Returns the attribute byte.
pub fn push_propdesc(thr: &mut Thread, desc: &PropertyDescriptor) -> i32 {
    match &desc.value {
        PropValue::Data(v) => thr.push(v.clone()),
        PropValue::Accessor { get, set } => {
            thr.push(get.clone().map(Value::Object).unwrap_or_default());
            thr.push(set.clone().map(Value::Object).unwrap_or_default());
        }
    }
    i32::from(desc.attrs)
}

/// Number of stack values behind a descriptor return code.
pub fn propdesc_valcount(code: i32) -> usize {
    if code < 0 {
        0
    } else if code & i32::from(attrs::ACCESSOR) != 0 {
        2
    } else {
        1
    }
}

/// Pop the values behind `code` back into a descriptor.
pub fn pop_propdesc(thr: &mut Thread, code: i32) -> Option<PropertyDescriptor> {
    let flags = u8::try_from(code).ok()?;
    let mut values = thr.pop_n(propdesc_valcount(code)).into_iter();
    let value = if flags & attrs::ACCESSOR != 0 {
        let get = values.next().and_then(|v| v.as_object().cloned());
        let set = values.next().and_then(|v| v.as_object().cloned());
        PropValue::Accessor { get, set }
    } else {
        PropValue::Data(values.next().unwrap_or_default())
    };
    Some(PropertyDescriptor::new(value, flags))
}

// ═══════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════

/// Refuse an operation: TypeError when `throw`, else `false`.
pub(crate) fn fail(throw: bool, message: &str) -> Result<bool, JsError> {
    if throw {
        Err(JsError::type_error(message))
    } else {
        Ok(false)
    }
}

/// Run `f` with `obj` pinned on the value stack. `f` gets the pinned slot and
/// must re-read the object from it after any call that can run user code.
pub(crate) fn with_pinned<T>(
    thr: &mut Thread,
    obj: &ObjRef,
    f: impl FnOnce(&mut Thread, usize) -> Result<T, JsError>,
) -> Result<T, JsError> {
    let top = thr.top();
    thr.push(Value::Object(obj.clone()));
    let result = f(thr, top);
    thr.set_top(top);
    result
}

/// The object pinned in `slot`.
pub(crate) fn pinned(thr: &Thread, slot: usize) -> Result<ObjRef, JsError> {
    thr.get_at(slot)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| JsError::internal_error("pinned object lost"))
}

fn busy() -> JsError {
    JsError::internal_error("object is borrowed")
}

/// Shared borrow for a short, non-reentrant read.
pub(crate) fn read(obj: &ObjRef) -> Result<Ref<'_, crate::object::HObject>, JsError> {
    obj.try_borrow().ok_or_else(busy)
}

/// Exclusive borrow for a short, non-reentrant update.
pub(crate) fn write(obj: &ObjRef) -> Result<RefMut<'_, crate::object::HObject>, JsError> {
    obj.try_borrow_mut().ok_or_else(busy)
}
