//! Symbol pool: hash-consed string storage.
//!
//! A [`SymPool`] stores every distinct string exactly once and hands out
//! [`Sym`] handles to the stored copy. Strings are written as records into
//! one arena; a content-keyed set, whose slot arrays live in a second arena,
//! finds the canonical record for a given content.
//!
//! # Interning
//!
//! Interning a non-empty string first writes it into the string arena, then
//! looks the content up. On a hit the tentative record is rolled back, so a
//! repeated string costs no memory; on a miss the new record becomes
//! canonical. The empty string never touches either arena.
//!
//! # Examples
//!
//! ```
//! use tessera_mem::{Sym, SymPool};
//!
//! let pool = SymPool::new();
//!
//! let a = pool.intern("abc");
//! let e = pool.intern("");
//! let b = pool.intern("abc");
//! let c = pool.intern("abd");
//!
//! assert_eq!(a, b);
//! assert_ne!(a, c);
//! assert_eq!(e, Sym::EMPTY);
//! assert_eq!(pool.len(), 2);
//! ```
//!
//! # Threading
//!
//! A pool is single-threaded. Interning goes through `&self` so symbols can
//! be held while more are interned; the borrow they keep on the pool stops
//! it from being dropped, moved or swapped underneath them.

use std::cell::RefCell;
use std::ffi::CStr;
use std::fmt;

use tessera_log::trace;

use crate::arena::{Arena, ArenaStats};
use crate::factory::ArenaFactory;
use crate::sym::{Record, Sym};
use crate::table::{Probe, RecordSet};

/// Page size of the index arena in a default pool.
const INDEX_PAGE_SIZE: usize = 64 * 1024;

/// Pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of distinct non-empty strings.
    pub symbols: usize,
    /// Arena holding the string records.
    pub strings: ArenaStats,
    /// Arena holding the index slot arrays.
    pub index: ArenaStats,
}

/// Interning pool producing [`Sym`] handles.
pub struct SymPool {
    strings: Arena,
    index: RefCell<RecordSet>,
}

impl SymPool {
    /// Creates a pool with default arena page sizes.
    ///
    /// No memory is allocated until the first non-empty string is interned.
    #[must_use]
    pub fn new() -> Self {
        Self::from_arenas(Arena::new(), Arena::with_page_size(INDEX_PAGE_SIZE))
    }

    /// Creates a pool whose arenas both come from `factory`.
    #[must_use]
    pub fn with_factory(factory: &ArenaFactory) -> Self {
        Self::from_arenas(factory.create_arena(), factory.create_arena())
    }

    fn from_arenas(strings: Arena, index: Arena) -> Self {
        SymPool {
            strings,
            index: RefCell::new(RecordSet::new(index)),
        }
    }

    /// Interns `bytes` and returns its canonical symbol.
    ///
    /// Equal content always yields the same symbol from the same pool. Empty
    /// input yields [`Sym::EMPTY`] without allocating.
    pub fn intern(&self, bytes: impl AsRef<[u8]>) -> Sym<'_> {
        self.intern_bytes(bytes.as_ref())
    }

    /// Interns a string slice.
    pub fn intern_str(&self, s: &str) -> Sym<'_> {
        self.intern_bytes(s.as_bytes())
    }

    /// Interns a NUL-terminated string.
    ///
    /// A missing string and a string of just the terminator both yield
    /// [`Sym::EMPTY`].
    ///
    /// ```
    /// use tessera_mem::{Sym, SymPool};
    ///
    /// let pool = SymPool::new();
    /// assert_eq!(pool.intern_c_str(None), Sym::EMPTY);
    /// assert_eq!(pool.intern_c_str(Some(c"")), Sym::EMPTY);
    /// assert_eq!(pool.intern_c_str(Some(c"id")), pool.intern("id"));
    /// ```
    pub fn intern_c_str(&self, s: Option<&CStr>) -> Sym<'_> {
        match s {
            Some(s) => self.intern_bytes(s.to_bytes()),
            None => Sym::EMPTY,
        }
    }

    fn intern_bytes(&self, bytes: &[u8]) -> Sym<'_> {
        if bytes.is_empty() {
            return Sym::EMPTY;
        }

        let hash = fxhash::hash64(bytes);
        let mut index = self.index.borrow_mut();

        let state = self.strings.save();
        self.strings.align(std::mem::align_of::<Record>());
        let dst = self.strings.allocate(Record::size_for(bytes.len()));
        // SAFETY: the arena aligned and sized `dst` for this record.
        let record = unsafe { Record::write(dst, bytes) };

        let mut probe = index.probe(hash, bytes);
        if matches!(probe, Probe::Vacant(_)) && index.reserve_one() {
            probe = index.probe(hash, bytes);
        }

        match probe {
            Probe::Found(existing) => {
                // SAFETY: the tentative record was allocated after `state`
                // and was never handed out.
                unsafe { self.strings.rewind(state) };
                trace!("intern hit for {} bytes", bytes.len());
                Sym::from_record(existing)
            }
            Probe::Vacant(slot) => {
                index.insert_at(slot, hash, record);
                Sym::from_record(record)
            }
        }
    }

    /// Returns the symbol for `bytes` if it has been interned.
    ///
    /// Never allocates. The empty string is always found.
    pub fn lookup(&self, bytes: impl AsRef<[u8]>) -> Option<Sym<'_>> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Some(Sym::EMPTY);
        }

        match self.index.borrow().probe(fxhash::hash64(bytes), bytes) {
            Probe::Found(record) => Some(Sym::from_record(record)),
            Probe::Vacant(_) => None,
        }
    }

    /// Returns the number of distinct non-empty strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.borrow().len()
    }

    /// Returns true if no non-empty string has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exchanges the contents of two pools.
    pub fn swap(&mut self, other: &mut SymPool) {
        std::mem::swap(self, other);
    }

    /// Returns pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let index = self.index.borrow();
        PoolStats {
            symbols: index.len(),
            strings: self.strings.stats(),
            index: index.arena().stats(),
        }
    }
}

impl Default for SymPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymPool")
            .field("symbols", &self.len())
            .field("strings", &self.strings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_content() {
        let pool = SymPool::new();
        for s in [
            "a",
            "ab",
            "abc",
            "abcd",
            "abcde",
            "abcdef",
            "abcdefg",
            "abcdefgh",
            "abcdefghi",
            "abcdefghij",
        ] {
            assert_eq!(pool.intern(s).as_bytes(), s.as_bytes());
        }
        assert_eq!(pool.len(), 10);
    }

    #[test]
    fn test_intern_is_idempotent() {
        let pool = SymPool::new();
        let first = pool.intern("identifier");
        let second = pool.intern(String::from("identifier"));
        let third = pool.intern_str("identifier");

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_empty_forms_normalize() {
        let pool = SymPool::new();

        assert_eq!(pool.intern(""), Sym::EMPTY);
        assert_eq!(pool.intern(b""), Sym::EMPTY);
        assert_eq!(pool.intern_c_str(None), Sym::EMPTY);
        assert_eq!(pool.intern_c_str(Some(c"")), Sym::EMPTY);
        assert!(pool.is_empty());
        assert_eq!(pool.stats().strings.page_count, 0);
        assert_eq!(pool.stats().index.page_count, 0);
    }

    #[test]
    fn test_repeat_intern_does_not_grow_storage() {
        let pool = SymPool::new();
        let _ = pool.intern("repeated");
        let before = pool.stats();

        for _ in 0..100 {
            let _ = pool.intern("repeated");
        }

        assert_eq!(pool.stats(), before);
    }

    #[test]
    fn test_repeat_intern_at_load_limit_keeps_index() {
        let pool = SymPool::new();
        // 14 of 16 slots is the most the first slot array holds.
        let syms: Vec<_> = (0..14).map(|i| pool.intern(format!("name{i}"))).collect();
        let before = pool.stats();

        for (i, sym) in syms.iter().enumerate() {
            assert_eq!(pool.intern(format!("name{i}")), *sym);
        }
        assert_eq!(pool.stats(), before);

        let _ = pool.intern("name14");
        assert!(pool.stats().index.allocated > before.index.allocated);
        assert_eq!(pool.len(), 15);
    }

    #[test]
    fn test_records_are_nul_terminated_and_packed() {
        let pool = SymPool::new();
        let a = pool.intern("abc");
        let b = pool.intern("de");

        assert_eq!(a.as_bytes_with_nul(), b"abc\0");
        assert_eq!(b.as_bytes_with_nul(), b"de\0");

        let header = std::mem::size_of::<usize>();
        let used = pool.stats().strings.allocated;
        // "abc" record padded to the next usize boundary, then "de".
        let first = (header + 4).next_multiple_of(header);
        assert_eq!(used, first + header + 3);
    }

    #[test]
    fn test_lookup_does_not_insert() {
        let pool = SymPool::new();
        assert_eq!(pool.lookup("missing"), None);
        assert_eq!(pool.lookup(""), Some(Sym::EMPTY));
        assert!(pool.is_empty());

        let sym = pool.intern("present");
        assert_eq!(pool.lookup("present"), Some(sym));
        assert_eq!(pool.lookup("presen"), None);
    }

    #[test]
    fn test_rollback_survives_page_boundary() {
        // 64-byte string pages: a tentative duplicate record that spills into
        // a fresh page cannot be rolled back, but the result is still the
        // canonical symbol.
        let pool = SymPool::with_factory(&ArenaFactory::new(64));
        let canonical = pool.intern("0123456789abcdef0123456789");
        let _ = pool.intern("filler-filler-filler");

        let pages = pool.stats().strings.page_count;
        let again = pool.intern("0123456789abcdef0123456789");

        assert_eq!(again, canonical);
        assert!(pool.stats().strings.page_count > pages);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_many_symbols() {
        let pool = SymPool::with_factory(&ArenaFactory::new(1024));
        let syms: Vec<_> = (0..2000)
            .map(|i| pool.intern(format!("identifier_{i}")))
            .collect();

        assert_eq!(pool.len(), 2000);
        for (i, sym) in syms.iter().enumerate() {
            assert_eq!(pool.intern(format!("identifier_{i}")), *sym);
            assert_eq!(sym.as_str(), Ok(format!("identifier_{i}").as_str()));
        }
    }

    #[test]
    fn test_swap_pools() {
        let mut left = SymPool::new();
        let mut right = SymPool::new();
        let _ = left.intern("only-left");

        left.swap(&mut right);

        assert!(left.is_empty());
        assert_eq!(right.len(), 1);
        assert!(right.lookup("only-left").is_some());
    }

    #[test]
    fn test_debug_output() {
        let pool = SymPool::new();
        let _ = pool.intern("x");
        let out = format!("{pool:?}");
        assert!(out.starts_with("SymPool { symbols: 1"));
    }
}
