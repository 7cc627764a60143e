//! Symbol handles for interned strings.
//!
//! A [`Sym`] is a pointer-sized handle to a string record owned by a
//! [`SymPool`](crate::pool::SymPool). Because the pool keeps exactly one
//! record per distinct content, two symbols from the same pool are equal
//! exactly when they point at the same record:
//!
//! - `==` and `Hash` look only at the address, O(1)
//! - `<` compares the bytes lexicographically
//! - the bytes, a NUL-terminated view and an owned copy are all available
//!   from the handle itself, no pool lookup needed
//!
//! The empty string is not stored. It is represented by [`Sym::EMPTY`],
//! which can be created without a pool.
//!
//! # Examples
//!
//! ```
//! use tessera_mem::{Sym, SymPool};
//!
//! let pool = SymPool::new();
//! let a = pool.intern("node");
//! let b = pool.intern(String::from("node"));
//!
//! assert_eq!(a, b);
//! assert_eq!(a.as_bytes(), b"node");
//! assert_eq!(a.as_c_str(), c"node");
//! assert!(Sym::EMPTY < a);
//! ```

use std::cmp::Ordering;
use std::ffi::CStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Index;
use std::ptr::NonNull;
use std::str::Utf8Error;

#[cfg(feature = "symbols")]
use hashbrown::{HashMap, HashSet};

#[cfg(not(feature = "symbols"))]
use std::collections::{HashMap, HashSet};

/// Header of a string record in a pool's string arena.
///
/// The header is immediately followed by `len` content bytes and one NUL.
#[repr(C)]
pub(crate) struct Record {
    len: usize,
}

impl Record {
    /// Bytes a record with `len` content bytes occupies.
    pub(crate) const fn size_for(len: usize) -> usize {
        mem::size_of::<Record>() + len + 1
    }

    /// Writes a record for `bytes` into `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must be aligned for `Record` and valid for writes of
    /// `Record::size_for(bytes.len())` bytes.
    pub(crate) unsafe fn write(dst: NonNull<u8>, bytes: &[u8]) -> NonNull<Record> {
        let record = dst.cast::<Record>();
        // SAFETY: guaranteed by the caller.
        unsafe {
            record.as_ptr().write(Record { len: bytes.len() });
            let chars = Self::chars(record);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), chars.as_ptr(), bytes.len());
            chars.as_ptr().add(bytes.len()).write(0);
        }
        record
    }

    /// Content length of the record.
    ///
    /// # Safety
    ///
    /// `record` must point to a live record.
    pub(crate) unsafe fn len(record: NonNull<Record>) -> usize {
        // SAFETY: guaranteed by the caller.
        unsafe { (*record.as_ptr()).len }
    }

    /// # Safety
    ///
    /// `record` must point into an allocation of at least
    /// `size_of::<Record>()` bytes.
    unsafe fn chars(record: NonNull<Record>) -> NonNull<u8> {
        // SAFETY: the content bytes follow the header inside the same
        // allocation, so this stays in bounds.
        unsafe { record.cast::<u8>().add(mem::size_of::<Record>()) }
    }

    /// Content bytes followed by the terminating NUL.
    ///
    /// # Safety
    ///
    /// `record` must point to a live record that outlives `'a`.
    pub(crate) unsafe fn bytes_with_nul<'a>(record: NonNull<Record>) -> &'a [u8] {
        // SAFETY: guaranteed by the caller; `write` initialized len + 1 bytes.
        unsafe {
            let len = Self::len(record);
            std::slice::from_raw_parts(Self::chars(record).as_ptr(), len + 1)
        }
    }
}

/// An interned string.
///
/// `Sym<'p>` borrows the pool it came from, so it can never outlive the
/// record it points at. It is `Copy` and as large as a pointer.
///
/// Equality and hashing use the record address and are only meaningful
/// between symbols of the same pool. Ordering compares content.
#[derive(Clone, Copy)]
pub struct Sym<'p> {
    record: Option<NonNull<Record>>,
    _pool: PhantomData<&'p [u8]>,
}

impl<'p> Sym<'p> {
    /// The empty symbol.
    pub const EMPTY: Sym<'static> = Sym {
        record: None,
        _pool: PhantomData,
    };

    /// Wraps a record owned by a pool that lives for `'p`.
    pub(crate) const fn from_record(record: NonNull<Record>) -> Self {
        Sym {
            record: Some(record),
            _pool: PhantomData,
        }
    }

    /// Returns the content length in bytes.
    #[must_use]
    pub fn len(self) -> usize {
        match self.record {
            // SAFETY: the record lives as long as the pool borrow 'p.
            Some(record) => unsafe { Record::len(record) },
            None => 0,
        }
    }

    /// Returns true for the empty symbol.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.record.is_none()
    }

    /// Returns the content bytes.
    #[must_use]
    pub fn as_bytes(self) -> &'p [u8] {
        let bytes = self.as_bytes_with_nul();
        &bytes[..bytes.len() - 1]
    }

    /// Returns the content bytes followed by the stored NUL.
    #[must_use]
    pub fn as_bytes_with_nul(self) -> &'p [u8] {
        match self.record {
            // SAFETY: the record lives as long as the pool borrow 'p.
            Some(record) => unsafe { Record::bytes_with_nul(record) },
            None => &b"\0"[..],
        }
    }

    /// Returns the content as a C string, without copying.
    ///
    /// Content containing a NUL byte is cut off at the first one, as any C
    /// consumer would see it.
    #[must_use]
    pub fn as_c_str(self) -> &'p CStr {
        CStr::from_bytes_until_nul(self.as_bytes_with_nul()).unwrap_or_default()
    }

    /// Returns the content as `&str` if it is valid UTF-8.
    pub fn as_str(self) -> Result<&'p str, Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    /// Returns an owned copy of the content.
    #[must_use]
    pub fn to_vec(self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Returns the content as a string, replacing invalid UTF-8.
    #[must_use]
    pub fn to_string_lossy(self) -> std::borrow::Cow<'p, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Returns the byte at `index`, if any.
    #[must_use]
    pub fn get(self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }

    /// Returns the first byte, if any.
    #[must_use]
    pub fn first(self) -> Option<u8> {
        self.as_bytes().first().copied()
    }

    /// Returns the last byte, if any.
    #[must_use]
    pub fn last(self) -> Option<u8> {
        self.as_bytes().last().copied()
    }

    /// Iterates over the content bytes. Supports `.rev()`.
    pub fn iter(self) -> std::iter::Copied<std::slice::Iter<'p, u8>> {
        self.as_bytes().iter().copied()
    }

    /// Address of the record, zero for the empty symbol.
    fn addr(self) -> usize {
        self.record.map_or(0, |record| record.as_ptr() as usize)
    }
}

impl Default for Sym<'_> {
    fn default() -> Self {
        Sym::EMPTY
    }
}

impl PartialEq for Sym<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for Sym<'_> {}

impl Hash for Sym<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr());
    }
}

impl PartialOrd for Sym<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sym<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.record == other.record {
            return Ordering::Equal;
        }
        self.as_bytes().cmp(other.as_bytes())
    }
}

// A symbol compares against a byte as against the one-byte string `[c]`.
impl PartialEq<u8> for Sym<'_> {
    fn eq(&self, c: &u8) -> bool {
        self.as_bytes() == [*c]
    }
}

impl PartialOrd<u8> for Sym<'_> {
    fn partial_cmp(&self, c: &u8) -> Option<Ordering> {
        Some(self.as_bytes().cmp(&[*c][..]))
    }
}

impl Index<usize> for Sym<'_> {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.as_bytes()[index]
    }
}

impl<'p> IntoIterator for Sym<'p> {
    type Item = u8;
    type IntoIter = std::iter::Copied<std::slice::Iter<'p, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl AsRef<[u8]> for Sym<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Sym<'_>> for Vec<u8> {
    fn from(sym: Sym<'_>) -> Self {
        sym.to_vec()
    }
}

impl fmt::Display for Sym<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for Sym<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sym({:?})", self.to_string_lossy())
    }
}

/// Build hasher for identity-keyed symbol containers.
pub type SymBuildHasher = fxhash::FxBuildHasher;

/// Map keyed by symbol identity.
pub type SymMap<'p, V> = HashMap<Sym<'p>, V, SymBuildHasher>;

/// Set of symbols, by identity.
pub type SymSet<'p> = HashSet<Sym<'p>, SymBuildHasher>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SymPool;

    #[test]
    fn test_empty_symbol() {
        let empty = Sym::EMPTY;
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert_eq!(empty.as_bytes(), b"");
        assert_eq!(empty.as_bytes_with_nul(), b"\0");
        assert_eq!(empty.as_c_str(), c"");
        assert_eq!(empty.first(), None);
        assert_eq!(empty.last(), None);
        assert_eq!(empty, Sym::default());
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn test_accessors() {
        let pool = SymPool::new();
        let xyz = pool.intern("xyz");

        assert!(!xyz.is_empty());
        assert_eq!(xyz.len(), 3);
        assert_eq!(xyz[0], b'x');
        assert_eq!(xyz.get(2), Some(b'z'));
        assert_eq!(xyz.get(3), None);
        assert_eq!(xyz.first(), Some(b'x'));
        assert_eq!(xyz.last(), Some(b'z'));
        assert_eq!(xyz.as_bytes_with_nul(), b"xyz\0");
        assert_eq!(xyz.as_c_str(), c"xyz");
        assert_eq!(xyz.as_str(), Ok("xyz"));
        assert_eq!(xyz.to_vec(), b"xyz".to_vec());
        assert_eq!(Vec::from(xyz), b"xyz".to_vec());
    }

    #[test]
    fn test_iteration() {
        let pool = SymPool::new();
        let xyz = pool.intern("xyz");

        let forward: Vec<u8> = xyz.into_iter().collect();
        assert_eq!(forward, b"xyz");

        let backward: String = xyz.iter().rev().map(char::from).collect();
        assert_eq!(backward, "zyx");
    }

    #[test]
    fn test_c_str_stops_at_interior_nul() {
        let pool = SymPool::new();
        let sym = pool.intern(b"ab\0cd");

        assert_eq!(sym.len(), 5);
        assert_eq!(sym.as_c_str(), c"ab");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let pool = SymPool::new();
        let ab = pool.intern("ab");
        let b = pool.intern("b");
        let abc = pool.intern("abc");

        assert!(ab < b);
        assert!(ab < abc);
        assert!(abc < b);
        assert!(Sym::EMPTY < ab);
        assert_eq!(ab.cmp(&pool.intern("ab")), Ordering::Equal);

        let mut sorted = vec![b, abc, Sym::EMPTY, ab];
        sorted.sort();
        assert_eq!(sorted, [Sym::EMPTY, ab, abc, b]);
    }

    #[test]
    fn test_byte_comparisons() {
        let pool = SymPool::new();
        let b = pool.intern("b");
        let bc = pool.intern("bc");

        assert!(b == b'b');
        assert!(b != b'a');
        assert!(b <= b'b');
        assert!(b >= b'b');
        assert!(b < b'c');
        assert!(b > b'a');
        assert!(bc < b'c');
        assert!(bc > b'a');
        assert!(bc > b'b');
        assert!(Sym::EMPTY < b'a');
    }

    #[test]
    fn test_display_and_debug() {
        let pool = SymPool::new();
        let sym = pool.intern("main");
        assert_eq!(sym.to_string(), "main");
        assert_eq!(format!("{sym:?}"), "Sym(\"main\")");

        let raw = pool.intern(&[0xff, b'a'][..]);
        assert!(raw.as_str().is_err());
        assert_eq!(raw.to_string(), "\u{fffd}a");
    }

    #[test]
    fn test_sym_map_uses_identity() {
        let pool = SymPool::new();
        let mut map: SymMap<'_, u32> = SymMap::default();

        map.insert(pool.intern("x"), 1);
        map.insert(pool.intern("y"), 2);
        map.insert(pool.intern("x"), 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&pool.intern("x")), Some(&3));

        let set: SymSet<'_> = ["a", "b", "a", ""].iter().map(|s| pool.intern(s)).collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Sym::EMPTY));
    }
}
