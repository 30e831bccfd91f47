//! Prelude module for no_std compatibility.
//!
//! This module re-exports types from core/alloc/std based on feature flags,
//! allowing the rest of the codebase to use a consistent import path.

// ═══════════════════════════════════════════════════════════════════════════════
// Core types (always available)
// ═══════════════════════════════════════════════════════════════════════════════

pub use core::{
    cell::{Cell, Ref, RefCell, RefMut},
    fmt,
    hash::{BuildHasherDefault, Hash, Hasher},
    mem,
    ptr::NonNull,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Alloc types (conditional on std vs no_std)
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "std")]
pub use std::{
    boxed::Box,
    format,
    rc::{Rc, Weak},
    string::{String, ToString},
    vec,
    vec::Vec,
};

#[cfg(not(feature = "std"))]
pub use alloc::{
    boxed::Box,
    format,
    rc::{Rc, Weak},
    string::{String, ToString},
    vec,
    vec::Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
// HashMap - use hashbrown for no_std, std::collections for std
// ═══════════════════════════════════════════════════════════════════════════════

// FxHashMap/FxHashSet - use rustc-hash for std, define our own for no_std
#[cfg(feature = "std")]
pub use rustc_hash::{FxHashMap, FxHashSet};

#[cfg(not(feature = "std"))]
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;

#[cfg(not(feature = "std"))]
pub type FxHashSet<T> = hashbrown::HashSet<T, BuildHasherDefault<rustc_hash::FxHasher>>;

pub use rustc_hash::FxHasher;

// ═══════════════════════════════════════════════════════════════════════════════
// IndexMap - use FxHasher for both std and no_std
// ═══════════════════════════════════════════════════════════════════════════════

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}


/// Hash a byte string with FxHasher, folded to 32 bits.
#[inline]
pub fn fx_hash32(bytes: &[u8]) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

// ═══════════════════════════════════════════════════════════════════════════════
// Math functions - use std in std mode, libm in no_std mode
// ═══════════════════════════════════════════════════════════════════════════════

/// Math operations module providing cross-platform math functions
pub mod math {
    #[cfg(feature = "std")]
    #[inline]
    pub fn floor(x: f64) -> f64 {
        x.floor()
    }

    #[cfg(not(feature = "std"))]
    #[inline]
    pub fn floor(x: f64) -> f64 {
        libm::floor(x)
    }

    #[cfg(feature = "std")]
    #[inline]
    pub fn trunc(x: f64) -> f64 {
        x.trunc()
    }

    #[cfg(not(feature = "std"))]
    #[inline]
    pub fn trunc(x: f64) -> f64 {
        libm::trunc(x)
    }

    /// Euclidean remainder (modulo) - always returns positive result
    #[cfg(feature = "std")]
    #[inline]
    pub fn rem_euclid(x: f64, y: f64) -> f64 {
        x.rem_euclid(y)
    }

    /// Euclidean remainder (modulo) - always returns positive result
    #[cfg(not(feature = "std"))]
    #[inline]
    pub fn rem_euclid(x: f64, y: f64) -> f64 {
        let r = libm::fmod(x, y);
        if r < 0.0 { r + libm::fabs(y) } else { r }
    }
}
