//! String intern table.
//!
//! Guarantees that the same text always yields the same `HString` while any
//! reference to it is alive, which is what lets property lookup compare keys
//! by pointer. Entries are weak: a string is freed when its last reference
//! goes away and unregisters itself; entries missed that way are swept by
//! mark-and-sweep.

use crate::memory::MemBlock;
use crate::prelude::*;
use crate::value::{HString, HStringData};

/// Intern table mapping text to the live string with that content.
pub struct StringDict {
    strings: FxHashMap<Box<str>, Weak<HStringData>>,
    /// Strings kept alive for the lifetime of the heap
    pinned: Vec<HString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
            pinned: Vec::new(),
        }
    }

    /// Look up a live string by content.
    pub fn get(&self, text: &str) -> Option<HString> {
        self.strings
            .get(text)
            .and_then(Weak::upgrade)
            .map(HString::from_rc)
    }

    /// Get an existing string or insert a new one backed by `block`.
    pub(crate) fn get_or_insert(
        &mut self,
        text: &str,
        block: MemBlock,
        self_weak: Weak<RefCell<StringDict>>,
    ) -> HString {
        if let Some(existing) = self.get(text) {
            return existing;
        }
        let s = HString::new_interned(text, block, self_weak);
        self.strings.insert(text.into(), s.downgrade());
        s
    }

    /// Keep a string alive for the lifetime of the table.
    pub(crate) fn pin(&mut self, s: HString) {
        self.pinned.push(s);
    }

    /// Remove an entry if its string is gone.
    pub(crate) fn remove_dead(&mut self, text: &str) {
        let dead = self
            .strings
            .get(text)
            .is_some_and(|weak| weak.strong_count() == 0);
        if dead {
            self.strings.remove(text);
        }
    }

    /// Drop entries whose strings are gone. Returns the number of live entries.
    pub fn sweep(&mut self) -> usize {
        let before = self.strings.len();
        self.strings.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - self.strings.len();
        if removed > 0 {
            log::trace!("stringtable: swept {} dead entries", removed);
        }
        self.strings.len()
    }

    /// Release spare table capacity.
    pub fn shrink(&mut self) {
        self.strings.shrink_to_fit();
    }

    /// Number of unique strings in the table.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

/// Strings the heap pins at creation: descriptor fields, trap names and the
/// keys the property engine itself needs.
pub(crate) const COMMON_STRINGS: &[&str] = &[
    "length",
    "value",
    "writable",
    "enumerable",
    "configurable",
    "get",
    "set",
    "name",
    "message",
    "getOwnPropertyDescriptor",
    "defineProperty",
    "deleteProperty",
    "has",
    "ownKeys",
    "undefined",
    "null",
    "true",
    "false",
];
