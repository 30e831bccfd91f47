//! Heap objects.
//!
//! An `HObject` is a common header (flags, prototype, finalizer) plus three
//! property parts and a per-htype payload:
//!
//! * the entries part (`strprops`): string and symbol keys, insertion ordered
//! * the index-properties part (`idxprops`): sparse array-index keys
//! * the array-items part (`items`): dense `Value` slots, valid only while the
//!   `ARRAY_ITEMS` flag is set
//!
//! Storage and capacity management live in [`store`], slot lookup in [`lookup`].

pub mod lookup;
pub mod store;

use crate::memory::MemBlock;
use crate::error::JsError;
use crate::gc::{Gc, GcPtr, Traceable};
use crate::prelude::*;
use crate::thread::Thread;
use crate::value::{HBuffer, HString, Value};

pub use store::{PropPart, PropValue};

/// Handle to a heap object.
pub type ObjRef = Gc<HObject>;

// ============================================================================
// Attributes and flags
// ============================================================================

/// Property attribute bits stored per slot.
pub mod attrs {
    pub const WRITABLE: u8 = 1 << 0;
    pub const ENUMERABLE: u8 = 1 << 1;
    pub const CONFIGURABLE: u8 = 1 << 2;
    pub const ACCESSOR: u8 = 1 << 3;

    pub const NONE: u8 = 0;
    pub const WEC: u8 = WRITABLE | ENUMERABLE | CONFIGURABLE;
    pub const WC: u8 = WRITABLE | CONFIGURABLE;
    pub const EC: u8 = ENUMERABLE | CONFIGURABLE;
    pub const E: u8 = ENUMERABLE;
    pub const W: u8 = WRITABLE;
}

pub(crate) const FLAG_EXTENSIBLE: u16 = 1 << 0;
pub(crate) const FLAG_ARRAY_ITEMS: u16 = 1 << 1;
pub(crate) const FLAG_LENGTH_NONWRITABLE: u16 = 1 << 2;

// ============================================================================
// Payloads
// ============================================================================

/// Native function body.
pub type NativeFn = Rc<dyn Fn(&mut Thread, &Value, &[Value]) -> Result<Value, JsError>>;

#[derive(Clone)]
pub struct NativeFunction {
    pub func: NativeFn,
    pub name: Option<HString>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({:?})", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct BoundFunction {
    pub target: ObjRef,
    pub this: Value,
    pub args: Vec<Value>,
}

/// Proxy target and handler; both `None` once revoked.
#[derive(Debug, Clone, Default)]
pub struct ProxyData {
    pub target: Option<ObjRef>,
    pub handler: Option<ObjRef>,
}

impl ProxyData {
    pub fn is_revoked(&self) -> bool {
        self.target.is_none() || self.handler.is_none()
    }
}

/// Parameter map of a mapped Arguments object.
///
/// `map` is a plain object whose index keys name the environment binding each
/// argument index aliases; removing a map entry severs the alias.
#[derive(Debug, Clone, Default)]
pub struct ArgumentsData {
    pub map: Option<ObjRef>,
    pub env: Option<ObjRef>,
}

/// Declarative environment record (bindings in declaration order).
#[derive(Debug, Default)]
pub struct Environment {
    pub bindings: IndexMap<HString, Value>,
}

impl Clone for Environment {
    fn clone(&self) -> Self {
        let mut bindings = index_map_new();
        for (k, v) in &self.bindings {
            bindings.insert(k.clone(), v.clone());
        }
        Environment { bindings }
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            bindings: index_map_new(),
        }
    }
}

/// Element type of a typed array view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Uint8,
    Uint8Clamped,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::Uint8 | ElementType::Uint8Clamped | ElementType::Int8 => 1,
            ElementType::Uint16 | ElementType::Int16 => 2,
            ElementType::Uint32 | ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            ElementType::Uint8 => "Uint8Array",
            ElementType::Uint8Clamped => "Uint8ClampedArray",
            ElementType::Int8 => "Int8Array",
            ElementType::Uint16 => "Uint16Array",
            ElementType::Int16 => "Int16Array",
            ElementType::Uint32 => "Uint32Array",
            ElementType::Int32 => "Int32Array",
            ElementType::Float32 => "Float32Array",
            ElementType::Float64 => "Float64Array",
        }
    }

    /// Decode one little-endian element.
    fn decode(self, bytes: &[u8]) -> Option<f64> {
        Some(match self {
            ElementType::Uint8 | ElementType::Uint8Clamped => f64::from(*bytes.first()?),
            ElementType::Int8 => f64::from(i8::from_le_bytes([*bytes.first()?])),
            ElementType::Uint16 => f64::from(u16::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::Int16 => f64::from(i16::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::Uint32 => f64::from(u32::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::Int32 => f64::from(i32::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::Float32 => f64::from(f32::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::Float64 => f64::from_le_bytes(bytes.try_into().ok()?),
        })
    }

    /// Encode one element with the type's number conversion.
    fn encode(self, value: f64, out: &mut [u8]) {
        let int = crate::value::to_uint32(value);
        match self {
            ElementType::Uint8 | ElementType::Int8 => {
                if let Some(b) = out.first_mut() {
                    *b = int as u8;
                }
            }
            ElementType::Uint8Clamped => {
                if let Some(b) = out.first_mut() {
                    *b = clamp_u8(value);
                }
            }
            ElementType::Uint16 | ElementType::Int16 => out.copy_from_slice(&(int as u16).to_le_bytes()),
            ElementType::Uint32 | ElementType::Int32 => out.copy_from_slice(&int.to_le_bytes()),
            ElementType::Float32 => out.copy_from_slice(&(value as f32).to_le_bytes()),
            ElementType::Float64 => out.copy_from_slice(&value.to_le_bytes()),
        }
    }
}

/// ToUint8Clamp: round half to even, saturating.
fn clamp_u8(value: f64) -> u8 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value >= 255.0 {
        return 255;
    }
    let f = math::floor(value);
    let diff = value - f;
    let rounded = if diff > 0.5 || (diff == 0.5 && f % 2.0 != 0.0) {
        f + 1.0
    } else {
        f
    };
    rounded as u8
}

/// Typed array view over a buffer.
#[derive(Debug, Clone)]
pub struct TypedArrayView {
    pub buffer: HBuffer,
    pub byte_offset: usize,
    pub length: u32,
    pub elem: ElementType,
}

impl TypedArrayView {
    fn byte_range(&self, index: u32) -> Option<core::ops::Range<usize>> {
        let size = self.elem.size();
        let start = self
            .byte_offset
            .checked_add(usize::try_from(index).ok()?.checked_mul(size)?)?;
        Some(start..start.checked_add(size)?)
    }

    /// Logical element count; a view no longer covered by its buffer has length 0.
    pub fn effective_length(&self) -> u32 {
        let needed = usize::try_from(self.length)
            .ok()
            .and_then(|l| l.checked_mul(self.elem.size()))
            .and_then(|b| b.checked_add(self.byte_offset));
        match needed {
            Some(end) if end <= self.buffer.len() => self.length,
            _ => 0,
        }
    }

    pub fn get(&self, index: u32) -> Option<f64> {
        if index >= self.effective_length() {
            return None;
        }
        let range = self.byte_range(index)?;
        let bytes = self.buffer.bytes();
        self.elem.decode(bytes.get(range)?)
    }

    /// Write an element; false when out of range.
    pub fn set(&self, index: u32, value: f64) -> bool {
        if index >= self.effective_length() {
            return false;
        }
        let Some(range) = self.byte_range(index) else {
            return false;
        };
        let mut bytes = self.buffer.bytes_mut();
        match bytes.get_mut(range) {
            Some(slot) => {
                self.elem.encode(value, slot);
                true
            }
            None => false,
        }
    }
}

/// Heap object sub-kind (htype) and its payload.
#[derive(Debug, Clone, Default)]
pub enum ObjectClass {
    #[default]
    Object,
    Array {
        length: u32,
    },
    Arguments(ArgumentsData),
    StringObject(HString),
    Error,
    NativeFunction(NativeFunction),
    BoundFunction(BoundFunction),
    Proxy(ProxyData),
    TypedArray(TypedArrayView),
    Environment(Environment),
}

// ============================================================================
// HObject
// ============================================================================

/// The array-items part.
#[derive(Debug, Default)]
pub struct ArrayItems {
    pub(crate) values: Vec<Value>,
    pub(crate) block: MemBlock,
}

impl ArrayItems {
    pub fn len(&self) -> u32 {
        u32::try_from(self.values.len()).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Value> {
        self.values.get(usize::try_from(index).ok()?)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Value> {
        self.values.get_mut(usize::try_from(index).ok()?)
    }

    /// Number of non-`Unused` slots and the smallest length holding all of them.
    pub fn stats(&self) -> (u32, u32) {
        let mut used = 0u32;
        let mut min_size = 0u32;
        for (i, v) in self.values.iter().enumerate() {
            if !v.is_unused() {
                used += 1;
                min_size = u32::try_from(i + 1).unwrap_or(u32::MAX);
            }
        }
        (used, min_size)
    }
}

/// A heap-allocated object.
#[derive(Debug, Default)]
pub struct HObject {
    pub(crate) class: ObjectClass,
    pub(crate) flags: u16,
    pub(crate) prototype: Option<ObjRef>,
    pub(crate) strprops: PropPart<HString>,
    pub(crate) idxprops: PropPart<u32>,
    pub(crate) items: ArrayItems,
    pub(crate) finalizer: Option<ObjRef>,
    pub(crate) header: MemBlock,
}

impl HObject {
    pub(crate) fn new(class: ObjectClass, prototype: Option<ObjRef>, header: MemBlock) -> Self {
        HObject {
            class,
            flags: FLAG_EXTENSIBLE,
            prototype,
            header,
            ..HObject::default()
        }
    }

    pub fn class(&self) -> &ObjectClass {
        &self.class
    }

    pub fn class_name(&self) -> &'static str {
        match &self.class {
            ObjectClass::Object | ObjectClass::Environment(_) => "Object",
            ObjectClass::Array { .. } => "Array",
            ObjectClass::Arguments(_) => "Arguments",
            ObjectClass::StringObject(_) => "String",
            ObjectClass::Error => "Error",
            ObjectClass::NativeFunction(_) | ObjectClass::BoundFunction(_) => "Function",
            ObjectClass::Proxy(_) => "Proxy",
            ObjectClass::TypedArray(view) => view.elem.class_name(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.class, ObjectClass::Array { .. })
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.class, ObjectClass::Proxy(_))
    }

    pub fn is_callable(&self) -> bool {
        match &self.class {
            ObjectClass::NativeFunction(_) | ObjectClass::BoundFunction(_) => true,
            ObjectClass::Proxy(data) => data
                .target
                .as_ref()
                .and_then(|t| t.try_borrow().map(|t| t.is_callable()))
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_extensible(&self) -> bool {
        self.flags & FLAG_EXTENSIBLE != 0
    }

    pub(crate) fn clear_extensible(&mut self) {
        self.flags &= !FLAG_EXTENSIBLE;
    }

    pub fn has_array_items(&self) -> bool {
        self.flags & FLAG_ARRAY_ITEMS != 0
    }

    pub(crate) fn set_array_items(&mut self, on: bool) {
        if on {
            self.flags |= FLAG_ARRAY_ITEMS;
        } else {
            self.flags &= !FLAG_ARRAY_ITEMS;
        }
    }

    pub fn is_length_writable(&self) -> bool {
        self.flags & FLAG_LENGTH_NONWRITABLE == 0
    }

    pub(crate) fn set_length_nonwritable(&mut self) {
        self.flags |= FLAG_LENGTH_NONWRITABLE;
    }

    /// `length` of an Array object.
    pub fn array_length(&self) -> Option<u32> {
        match self.class {
            ObjectClass::Array { length } => Some(length),
            _ => None,
        }
    }

    pub(crate) fn set_array_length(&mut self, new_length: u32) {
        if let ObjectClass::Array { length } = &mut self.class {
            *length = new_length;
        }
    }

    pub fn prototype(&self) -> Option<&ObjRef> {
        self.prototype.as_ref()
    }

    pub fn set_prototype(&mut self, prototype: Option<ObjRef>) {
        self.prototype = prototype;
    }

    /// Boxed primitive string of a String object.
    pub fn internal_string(&self) -> Option<HString> {
        match &self.class {
            ObjectClass::StringObject(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn finalizer(&self) -> Option<&ObjRef> {
        self.finalizer.as_ref()
    }

    pub fn strprops(&self) -> &PropPart<HString> {
        &self.strprops
    }

    pub fn idxprops(&self) -> &PropPart<u32> {
        &self.idxprops
    }

    pub fn items(&self) -> &ArrayItems {
        &self.items
    }
}

fn trace_value<F: FnMut(GcPtr<HObject>)>(value: &Value, visitor: &mut F) {
    if let Value::Object(obj) = value {
        visitor(obj.copy_ref());
    }
}

fn trace_prop<F: FnMut(GcPtr<HObject>)>(prop: &PropValue, visitor: &mut F) {
    match prop {
        PropValue::Data(value) => trace_value(value, visitor),
        PropValue::Accessor { get, set } => {
            for obj in [get, set].into_iter().flatten() {
                visitor(obj.copy_ref());
            }
        }
    }
}

impl Traceable for HObject {
    fn trace<F: FnMut(GcPtr<Self>)>(&self, mut visitor: F) {
        let visitor = &mut visitor;
        if let Some(proto) = &self.prototype {
            visitor(proto.copy_ref());
        }
        if let Some(finalizer) = &self.finalizer {
            visitor(finalizer.copy_ref());
        }
        for prop in self.strprops.values() {
            trace_prop(prop, visitor);
        }
        for prop in self.idxprops.values() {
            trace_prop(prop, visitor);
        }
        for value in &self.items.values {
            trace_value(value, visitor);
        }
        match &self.class {
            ObjectClass::Arguments(args) => {
                for obj in [&args.map, &args.env].into_iter().flatten() {
                    visitor(obj.copy_ref());
                }
            }
            ObjectClass::BoundFunction(bound) => {
                visitor(bound.target.copy_ref());
                trace_value(&bound.this, visitor);
                for arg in &bound.args {
                    trace_value(arg, visitor);
                }
            }
            ObjectClass::Proxy(proxy) => {
                for obj in [&proxy.target, &proxy.handler].into_iter().flatten() {
                    visitor(obj.copy_ref());
                }
            }
            ObjectClass::Environment(env) => {
                for value in env.bindings.values() {
                    trace_value(value, visitor);
                }
            }
            ObjectClass::Object
            | ObjectClass::Array { .. }
            | ObjectClass::StringObject(_)
            | ObjectClass::Error
            | ObjectClass::NativeFunction(_)
            | ObjectClass::TypedArray(_) => {}
        }
    }

    fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }
}
