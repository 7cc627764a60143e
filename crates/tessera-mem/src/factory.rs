//! Factory for creating arenas with a shared page size.
//!
//! `ArenaFactory` is the configuration point for arena page sizes. It does
//! not pool or reuse arenas: every call to [`ArenaFactory::create_arena`]
//! returns a fresh, empty arena, which releases its pages when dropped.
//!
//! # Examples
//!
//! ```
//! use tessera_mem::factory::ArenaFactory;
//! use tessera_mem::SymPool;
//!
//! // Small pages for a short-lived, phase-scoped pool.
//! let factory = ArenaFactory::new(16 * 1024);
//!
//! let arena = factory.create_arena();
//! assert_eq!(arena.page_size(), 16 * 1024);
//!
//! let pool = SymPool::with_factory(&factory);
//! assert_eq!(pool.intern("x").len(), 1);
//! ```

use crate::arena::{Arena, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};

/// Creates [`Arena`]s with a configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFactory {
    /// Page size of arenas created by this factory.
    page_size: usize,
}

impl ArenaFactory {
    /// Creates a factory for arenas with `page_size` byte pages.
    ///
    /// Sizes below [`MIN_PAGE_SIZE`] are rounded up.
    #[must_use]
    pub const fn new(page_size: usize) -> Self {
        let page_size = if page_size < MIN_PAGE_SIZE {
            MIN_PAGE_SIZE
        } else {
            page_size
        };
        Self { page_size }
    }

    /// Returns the page size used for new arenas.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Creates a new, empty arena.
    #[must_use]
    pub fn create_arena(&self) -> Arena {
        Arena::with_page_size(self.page_size)
    }
}

impl Default for ArenaFactory {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
