//! Tagged values and heap strings
//!
//! `Value` is the tval of the engine: one enum covering every ECMAScript value
//! plus the internal `Unused` sentinel used by array items. Cloning a value that
//! refers to a heap payload takes a reference to it.

use crate::memory::MemBlock;
use crate::error::JsError;
use crate::object::ObjRef;
use crate::prelude::*;
use crate::string_dict::StringDict;
use crate::thread::Thread;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// This trait makes it explicit when a clone is cheap (just incrementing a reference count)
/// vs when it might be expensive (copying data).
pub trait CheapClone: Clone {
    /// Create a cheap (reference-counted) clone of this value.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// Reserved "not an array index" marker.
pub const ARRIDX_NONE: u32 = 0xFFFF_FFFF;

/// Largest valid array index.
pub const ARRIDX_MAX: u32 = 0xFFFF_FFFE;

// ============================================================================
// HString
// ============================================================================

const STR_SYMBOL: u8 = 1 << 0;
const STR_HIDDEN: u8 = 1 << 1;
const STR_LENGTH: u8 = 1 << 2;
const STR_CANNUM: u8 = 1 << 3;
const STR_ASCII: u8 = 1 << 4;

/// Bytes charged to the allocator for a string besides its text.
pub(crate) const HSTRING_HEADER_SIZE: usize = mem::size_of::<HStringData>();

pub struct HStringData {
    text: Box<str>,
    hash: u32,
    arridx: u32,
    charlen: u32,
    flags: u8,
    _block: MemBlock,
    /// Intern table to unregister from when the last reference goes away
    dict: Option<Weak<RefCell<StringDict>>>,
}

impl Drop for HStringData {
    fn drop(&mut self) {
        if let Some(dict) = self.dict.as_ref().and_then(Weak::upgrade) {
            if let Ok(mut dict) = dict.try_borrow_mut() {
                dict.remove_dead(&self.text);
            }
        }
    }
}

/// An immutable heap string: interned text or a symbol.
///
/// Interned strings are unique per content, so key comparison is pointer
/// comparison. Symbols are never interned and compare by identity only.
#[derive(Clone)]
pub struct HString(Rc<HStringData>);

impl CheapClone for HString {}

impl HString {
    pub(crate) fn new_interned(
        text: &str,
        block: MemBlock,
        dict: Weak<RefCell<StringDict>>,
    ) -> Self {
        let arridx = string_to_arridx(text);
        let mut flags = 0;
        if text == "length" {
            flags |= STR_LENGTH;
        }
        if arridx == ARRIDX_NONE && is_canonical_numeric(text) {
            flags |= STR_CANNUM;
        }
        if text.is_ascii() {
            flags |= STR_ASCII;
        }
        HString(Rc::new(HStringData {
            text: text.into(),
            hash: fx_hash32(text.as_bytes()),
            arridx,
            charlen: u32::try_from(text.chars().count()).unwrap_or(u32::MAX),
            flags,
            _block: block,
            dict: Some(dict),
        }))
    }

    pub(crate) fn new_symbol(description: &str, hidden: bool, block: MemBlock, serial: u32) -> Self {
        let mut flags = STR_SYMBOL;
        if hidden {
            flags |= STR_HIDDEN;
        }
        HString(Rc::new(HStringData {
            text: description.into(),
            hash: fx_hash32(description.as_bytes()) ^ serial.rotate_left(16),
            arridx: ARRIDX_NONE,
            charlen: u32::try_from(description.chars().count()).unwrap_or(u32::MAX),
            flags,
            _block: block,
            dict: None,
        }))
    }

    /// Text of the string (description for symbols).
    pub fn as_str(&self) -> &str {
        &self.0.text
    }

    pub fn hash(&self) -> u32 {
        self.0.hash
    }

    /// Array index value, or `ARRIDX_NONE`.
    pub fn arridx(&self) -> u32 {
        self.0.arridx
    }

    pub fn is_arridx(&self) -> bool {
        self.0.arridx != ARRIDX_NONE
    }

    pub fn is_symbol(&self) -> bool {
        self.0.flags & STR_SYMBOL != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.0.flags & STR_HIDDEN != 0
    }

    /// The string key `length` (never a symbol).
    pub fn is_length(&self) -> bool {
        self.0.flags & STR_LENGTH != 0
    }

    /// CanonicalNumericIndexString that is not an array index ("-0", "1.5", "NaN", ...).
    pub fn is_canonical_numeric(&self) -> bool {
        self.0.flags & STR_CANNUM != 0
    }

    /// Character length (code points).
    pub fn charlen(&self) -> u32 {
        self.0.charlen
    }

    /// Character at a code point index.
    pub fn char_at(&self, index: u32) -> Option<char> {
        let index = usize::try_from(index).ok()?;
        if self.0.flags & STR_ASCII != 0 {
            return self.0.text.as_bytes().get(index).map(|b| char::from(*b));
        }
        self.0.text.chars().nth(index)
    }

    pub fn ptr_eq(a: &HString, b: &HString) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Number of references to this string (for tests and diagnostics).
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub(crate) fn downgrade(&self) -> Weak<HStringData> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_rc(data: Rc<HStringData>) -> Self {
        HString(data)
    }
}

impl PartialEq for HString {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        !self.is_symbol() && !other.is_symbol() && self.0.text == other.0.text
    }
}

impl Eq for HString {}

impl Hash for HString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0.hash);
    }
}

impl fmt::Debug for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_symbol() {
            write!(f, "Symbol({})", self.as_str())
        } else {
            write!(f, "{:?}", self.as_str())
        }
    }
}

impl fmt::Display for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Array index of a string: canonical decimal without leading zeros, below 2^32-1.
pub fn string_to_arridx(s: &str) -> u32 {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 {
        return ARRIDX_NONE;
    }
    if bytes.len() > 1 && bytes.first() == Some(&b'0') {
        return ARRIDX_NONE;
    }
    let mut acc: u64 = 0;
    for b in bytes {
        if !b.is_ascii_digit() {
            return ARRIDX_NONE;
        }
        acc = acc * 10 + u64::from(b - b'0');
    }
    match u32::try_from(acc) {
        Ok(v) if v != ARRIDX_NONE => v,
        _ => ARRIDX_NONE,
    }
}

/// ToString(ToNumber(s)) == s, or s == "-0".
pub fn is_canonical_numeric(s: &str) -> bool {
    if s == "-0" {
        return true;
    }
    let n = string_to_number(s);
    number_to_string(n) == s
}

// ============================================================================
// Numbers
// ============================================================================

/// Number::toString(10) with ECMAScript formatting rules.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return String::from("NaN");
    }
    if n == 0.0 {
        return String::from("0");
    }
    if n.is_infinite() {
        return String::from(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // Shortest round-trip digits and decimal exponent.
    let sci = format!("{:e}", n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let digits: Vec<u8> = mantissa.bytes().filter(u8::is_ascii_digit).collect();
    let k = i32::try_from(digits.len()).unwrap_or(i32::MAX);
    let point = exp + 1;

    let mut out = String::new();
    let push_digits = |out: &mut String, ds: &[u8]| {
        for d in ds {
            out.push(char::from(*d));
        }
    };
    if k <= point && point <= 21 {
        push_digits(&mut out, &digits);
        for _ in 0..(point - k) {
            out.push('0');
        }
    } else if 0 < point && point <= 21 {
        let split = usize::try_from(point).unwrap_or(0);
        let (int_part, frac_part) = digits.split_at(split.min(digits.len()));
        push_digits(&mut out, int_part);
        out.push('.');
        push_digits(&mut out, frac_part);
    } else if -6 < point && point <= 0 {
        out.push_str("0.");
        for _ in 0..(-point) {
            out.push('0');
        }
        push_digits(&mut out, &digits);
    } else {
        let (first, rest) = digits.split_at(1.min(digits.len()));
        push_digits(&mut out, first);
        if !rest.is_empty() {
            out.push('.');
            push_digits(&mut out, rest);
        }
        let e = point - 1;
        out.push('e');
        out.push(if e < 0 { '-' } else { '+' });
        out.push_str(&format!("{}", e.unsigned_abs()));
    }
    out
}

fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// StringToNumber.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_js_whitespace);
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix_body = |prefix_lower: &str, prefix_upper: &str| {
        t.strip_prefix(prefix_lower)
            .or_else(|| t.strip_prefix(prefix_upper))
    };
    for (lower, upper, radix) in [("0x", "0X", 16), ("0o", "0O", 8), ("0b", "0B", 2)] {
        if let Some(body) = radix_body(lower, upper) {
            if body.is_empty() {
                return f64::NAN;
            }
            let mut acc = 0.0f64;
            for c in body.chars() {
                match c.to_digit(radix) {
                    Some(d) => acc = acc * f64::from(radix) + f64::from(d),
                    None => return f64::NAN,
                }
            }
            return acc;
        }
    }
    let valid = t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToUint32.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let t = math::trunc(n);
    let m = math::rem_euclid(t, 4_294_967_296.0);
    m as u32
}

/// Array index of a number, if it is an integer in `0..=ARRIDX_MAX`.
pub fn number_to_arridx(n: f64) -> Option<u32> {
    if n >= 0.0 && n <= f64::from(ARRIDX_MAX) && math::trunc(n) == n {
        Some(n as u32)
    } else {
        None
    }
}

// ============================================================================
// Buffers
// ============================================================================

pub struct BufferData {
    bytes: RefCell<Vec<u8>>,
    _block: MemBlock,
}

/// A fixed-size byte buffer (plain buffer value and ArrayBuffer backing store).
#[derive(Clone)]
pub struct HBuffer(Rc<BufferData>);

impl CheapClone for HBuffer {}

impl HBuffer {
    pub(crate) fn new(bytes: Vec<u8>, block: MemBlock) -> Self {
        HBuffer(Rc::new(BufferData {
            bytes: RefCell::new(bytes),
            _block: block,
        }))
    }

    pub fn len(&self) -> usize {
        self.0.bytes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> Ref<'_, Vec<u8>> {
        self.0.bytes.borrow()
    }

    pub fn bytes_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.0.bytes.borrow_mut()
    }

    /// Shrink the buffer (views over the tail become out of bounds).
    pub fn truncate(&self, len: usize) {
        self.0.bytes.borrow_mut().truncate(len);
    }

    pub fn ptr_eq(a: &HBuffer, b: &HBuffer) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for HBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({})", self.len())
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Signature of a native function: `(thread, this, args) -> result`.
pub type NativeFnPtr = fn(&mut Thread, &Value, &[Value]) -> Result<Value, JsError>;

/// A native function with no heap object behind it.
#[derive(Clone, Copy)]
pub struct LightFunc {
    pub func: NativeFnPtr,
    pub magic: i16,
}

impl fmt::Debug for LightFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightFunc(magic={})", self.magic)
    }
}

// ============================================================================
// Value
// ============================================================================

/// A tagged value
#[derive(Clone, Default)]
pub enum Value {
    /// Empty array slot marker; never returned to callers
    Unused,
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(HString),
    Object(ObjRef),
    Buffer(HBuffer),
    Pointer(usize),
    LightFunc(LightFunc),
}

impl Value {
    pub fn is_unused(&self) -> bool {
        matches!(self, Value::Unused)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined | Value::Unused)
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&HString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unused | Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(s) if s.is_symbol() => "symbol",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Buffer(_) => "buffer",
            Value::Pointer(_) => "pointer",
            Value::LightFunc(_) => "function",
        }
    }

    /// ToBoolean
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Unused | Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => s.is_symbol() || !s.as_str().is_empty(),
            Value::Object(_) | Value::Buffer(_) | Value::LightFunc(_) => true,
            Value::Pointer(p) => *p != 0,
        }
    }

    /// ToNumber for values that need no user code. Objects other than
    /// boxed strings would need ToPrimitive and become NaN here.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Unused | Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) if s.is_symbol() => f64::NAN,
            Value::String(s) => string_to_number(s.as_str()),
            Value::Object(obj) => match obj.try_borrow().and_then(|o| o.internal_string()) {
                Some(s) => string_to_number(s.as_str()),
                None => f64::NAN,
            },
            Value::Buffer(_) | Value::Pointer(_) | Value::LightFunc(_) => f64::NAN,
        }
    }

    /// SameValue
    pub fn same_value(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Unused, Value::Unused)
            | (Value::Undefined, Value::Undefined)
            | (Value::Null, Value::Null) => true,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => {
                if x.is_nan() && y.is_nan() {
                    true
                } else if *x == 0.0 && *y == 0.0 {
                    x.is_sign_negative() == y.is_sign_negative()
                } else {
                    x == y
                }
            }
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => ObjRef::ptr_eq(x, y),
            (Value::Buffer(x), Value::Buffer(y)) => HBuffer::ptr_eq(x, y),
            (Value::Pointer(x), Value::Pointer(y)) => x == y,
            (Value::LightFunc(x), Value::LightFunc(y)) => {
                core::ptr::fn_addr_eq(x.func, y.func) && x.magic == y.magic
            }
            _ => false,
        }
    }

    /// Human-readable rendering for error messages.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Unused => String::from("unused"),
            Value::Undefined => String::from("undefined"),
            Value::Null => String::from("null"),
            Value::Boolean(b) => format!("{}", b),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) if s.is_symbol() => format!("Symbol({})", s.as_str()),
            Value::String(s) => String::from(s.as_str()),
            Value::Object(obj) => match obj.try_borrow() {
                Some(o) => format!("[object {}]", o.class_name()),
                None => String::from("[object Object]"),
            },
            Value::Buffer(_) => String::from("[object Uint8Array]"),
            Value::Pointer(p) => format!("{:#x}", p),
            Value::LightFunc(_) => String::from("function () { [lightfunc code] }"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unused => write!(f, "<unused>"),
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "Object#{}", obj.id()),
            Value::Buffer(b) => write!(f, "{:?}", b),
            Value::Pointer(p) => write!(f, "Pointer({:#x})", p),
            Value::LightFunc(lf) => write!(f, "{:?}", lf),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<HString> for Value {
    fn from(s: HString) -> Self {
        Value::String(s)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Object(obj)
    }
}

// ============================================================================
// Property keys
// ============================================================================

/// A coerced property key: array index or non-index string/symbol.
///
/// Strings that are valid array indices are always represented as `Index`, so
/// the two variants never describe the same property.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Index(u32),
    Str(HString),
}

impl PropKey {
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropKey::Str(s) if s.is_symbol())
    }

    pub fn is_length(&self) -> bool {
        matches!(self, PropKey::Str(s) if s.is_length())
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropKey::Index(idx) => Some(*idx),
            PropKey::Str(_) => None,
        }
    }

    pub fn as_str_key(&self) -> Option<&HString> {
        match self {
            PropKey::Str(s) => Some(s),
            PropKey::Index(_) => None,
        }
    }
}

impl fmt::Debug for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Index(idx) => write!(f, "{}", idx),
            PropKey::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Index(idx) => write!(f, "{}", idx),
            PropKey::Str(s) if s.is_symbol() => write!(f, "Symbol({})", s.as_str()),
            PropKey::Str(s) => f.write_str(s.as_str()),
        }
    }
}
