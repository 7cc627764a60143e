//! Page arena for parser and compiler data.
//!
//! [`Arena`] hands out memory from large pages by bumping an offset. It never
//! frees an individual allocation: every page lives until the arena is
//! dropped, and then all of them are released in one step. This gives:
//!
//! - **Fast allocation**: a bounds check and an addition on the hot path
//! - **Stable addresses**: pages are never moved or resized
//! - **Bulk release**: dropping the arena returns every page at once
//!
//! # Pages
//!
//! Pages are created lazily, the first one on the first allocation. When a
//! request does not fit in the rest of the current page, a new page of
//! `max(page_size, request)` bytes becomes current and the tail of the old
//! page is abandoned.
//!
//! # Rollback
//!
//! [`Arena::save`] captures the cursor and [`Arena::rollback`] restores it,
//! which makes the bytes of the most recent allocation available again. The
//! restore only happens if no page was created in between; otherwise it is
//! silently ignored and the memory stays used.
//!
//! # Threading
//!
//! An arena is single-threaded. It can be moved to another thread, but it
//! cannot be shared: allocation goes through `&self` with non-atomic cells.
//!
//! # Examples
//!
//! ```
//! use tessera_mem::arena::Arena;
//!
//! let arena = Arena::with_page_size(4096);
//!
//! let numbers = arena.allocate_array::<u64>(4);
//! unsafe {
//!     for i in 0..4 {
//!         numbers.as_ptr().add(i).write(i as u64 * 10);
//!     }
//!     assert_eq!(*numbers.as_ptr().add(3), 30);
//! }
//!
//! let name = arena.alloc_slice_copy(b"main");
//! assert_eq!(name, b"main");
//!
//! // Everything is released here.
//! ```

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use tessera_log::{debug, error, trace};

use crate::error::ArenaAllocError;

/// Default page size (1 MiB).
pub const DEFAULT_PAGE_SIZE: usize = 1024 * 1024;

/// Smallest page size an arena will use; smaller requests are rounded up.
pub const MIN_PAGE_SIZE: usize = 16;

/// Alignment of every page's base address.
///
/// Typed allocations may not ask for more than this.
pub const PAGE_ALIGNMENT: usize = 16;

/// Arena allocation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Bytes consumed from pages, alignment padding included.
    pub allocated: usize,
    /// Number of pages owned by the arena.
    pub page_count: usize,
    /// Sum of all page capacities in bytes.
    pub capacity: usize,
}

/// A save point produced by [`Arena::save`].
///
/// Only meaningful for the arena it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaState {
    pages: usize,
    offset: usize,
    allocated: usize,
}

impl ArenaState {
    /// Number of pages the arena had when the state was taken.
    #[must_use]
    pub const fn page_count(self) -> usize {
        self.pages
    }

    /// Cursor offset into the then-current page.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }
}

/// One page of arena memory, freed on drop.
struct Page {
    start: NonNull<u8>,
    capacity: usize,
}

impl Page {
    fn new(capacity: usize) -> Result<Self, ArenaAllocError> {
        let layout = Layout::from_size_align(capacity, PAGE_ALIGNMENT).map_err(|_| {
            ArenaAllocError::CapacityOverflow {
                requested: capacity,
            }
        })?;

        // SAFETY: capacity >= MIN_PAGE_SIZE > 0, so the layout is not zero-sized.
        let start = unsafe { alloc::alloc(layout) };
        let start = NonNull::new(start).ok_or(ArenaAllocError::OutOfMemory { layout })?;

        Ok(Page { start, capacity })
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: the same layout was validated in `Page::new`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.capacity, PAGE_ALIGNMENT);
            alloc::dealloc(self.start.as_ptr(), layout);
        }
    }
}

/// Single-threaded page arena with bump allocation and rollback.
///
/// Allocation takes `&self`, so allocations can be held while more are made.
/// Operations that can invalidate memory handed out earlier ([`rollback`],
/// [`swap`]) take `&mut self`, which the borrow checker only grants once
/// every borrowed allocation is gone.
///
/// Raw pointers returned by [`allocate`] and [`allocate_array`] are not
/// tracked. They stay valid until the arena is dropped, except that a
/// rollback may hand the same bytes out again.
///
/// [`rollback`]: Arena::rollback
/// [`swap`]: Arena::swap
/// [`allocate`]: Arena::allocate
/// [`allocate_array`]: Arena::allocate_array
pub struct Arena {
    /// All pages, oldest first. Only ever appended to.
    pages: RefCell<Vec<Page>>,
    /// Capacity used for new pages unless a request is larger.
    page_size: usize,
    /// Base of the current page, `None` before the first allocation.
    current: Cell<Option<NonNull<u8>>>,
    /// Capacity of the current page.
    limit: Cell<usize>,
    /// Cursor into the current page.
    offset: Cell<usize>,
    /// Bytes consumed so far, see [`ArenaStats::allocated`].
    allocated: Cell<usize>,
}

// SAFETY: the arena exclusively owns its pages and nothing in it refers to
// thread-local state. It is not `Sync`, so the cells are never shared.
unsafe impl Send for Arena {}

impl Arena {
    /// Creates an arena with [`DEFAULT_PAGE_SIZE`] pages.
    ///
    /// No memory is allocated until the first request.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an arena whose pages hold `page_size` bytes.
    ///
    /// Sizes below [`MIN_PAGE_SIZE`] are rounded up.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Arena {
            pages: RefCell::new(Vec::new()),
            page_size: page_size.max(MIN_PAGE_SIZE),
            current: Cell::new(None),
            limit: Cell::new(0),
            offset: Cell::new(0),
            allocated: Cell::new(0),
        }
    }

    /// Returns the configured page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages created so far.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }

    /// Allocates `bytes` uninitialized bytes.
    ///
    /// The returned range is exclusively the caller's and stays valid for the
    /// lifetime of the arena. No alignment is applied beyond what the cursor
    /// already has; see [`align`](Arena::align).
    ///
    /// # Panics
    ///
    /// Exhaustion is fatal: a refused page aborts through
    /// [`std::alloc::handle_alloc_error`], an impossible size panics.
    #[inline]
    pub fn allocate(&self, bytes: usize) -> NonNull<u8> {
        match self.try_allocate(bytes) {
            Ok(ptr) => ptr,
            Err(err) => exhausted(err),
        }
    }

    /// Fallible form of [`allocate`](Arena::allocate).
    ///
    /// On error the arena is left exactly as it was.
    pub fn try_allocate(&self, bytes: usize) -> Result<NonNull<u8>, ArenaAllocError> {
        let offset = self.offset.get();

        if let Some(base) = self.current.get() {
            if offset
                .checked_add(bytes)
                .is_some_and(|end| end <= self.limit.get())
            {
                self.offset.set(offset + bytes);
                self.allocated.set(self.allocated.get() + bytes);
                // SAFETY: offset + bytes <= limit, so the range lies inside
                // the current page.
                return Ok(unsafe { base.add(offset) });
            }
        }

        let base = self.grow(bytes)?;
        self.offset.set(bytes);
        self.allocated.set(self.allocated.get() + bytes);
        Ok(base)
    }

    /// Appends a page big enough for `bytes` and makes it current.
    #[cold]
    fn grow(&self, bytes: usize) -> Result<NonNull<u8>, ArenaAllocError> {
        let capacity = self.page_size.max(bytes);
        let page = Page::new(capacity)?;
        let start = page.start;

        let mut pages = self.pages.borrow_mut();
        pages.push(page);
        debug!("page #{} allocated with {} bytes", pages.len(), capacity);

        self.current.set(Some(start));
        self.limit.set(capacity);
        self.offset.set(0);
        Ok(start)
    }

    /// Rounds the cursor up to the next multiple of `alignment`.
    ///
    /// Only the offset within the current page is rounded; page bases are
    /// aligned to [`PAGE_ALIGNMENT`], so this yields aligned addresses for
    /// any alignment up to that.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two.
    #[inline]
    pub fn align(&self, alignment: usize) {
        assert!(
            alignment.is_power_of_two(),
            "alignment must be a power of two, got {alignment}"
        );
        let offset = self.offset.get();
        let aligned = (offset + alignment - 1) & !(alignment - 1);
        // Padding past the end of the page is never handed out.
        let padding = aligned.min(self.limit.get()).saturating_sub(offset);
        self.allocated.set(self.allocated.get() + padding);
        self.offset.set(aligned);
    }

    /// Allocates uninitialized storage for `count` values of `T`.
    ///
    /// The cursor is aligned to `align_of::<T>()` first, then
    /// `count * max(size_of::<T>(), align_of::<T>())` bytes are reserved.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs more than [`PAGE_ALIGNMENT`], or if the total size
    /// overflows. Exhaustion is fatal as for [`allocate`](Arena::allocate).
    pub fn allocate_array<T>(&self, count: usize) -> NonNull<T> {
        let align = mem::align_of::<T>();
        assert!(
            align <= PAGE_ALIGNMENT,
            "arena pages are aligned to {PAGE_ALIGNMENT} bytes, type needs {align}"
        );

        let stride = mem::size_of::<T>().max(align);
        let Some(bytes) = count.checked_mul(stride) else {
            exhausted(ArenaAllocError::CapacityOverflow {
                requested: usize::MAX,
            })
        };

        self.align(align);
        self.allocate(bytes).cast::<T>()
    }

    /// Moves `value` into the arena.
    ///
    /// Dropping the returned [`ArenaBox`] runs `T`'s destructor; the bytes
    /// themselves are only released with the arena.
    pub fn construct<T>(&self, value: T) -> ArenaBox<'_, T> {
        let ptr = self.allocate_array::<T>(1);
        // SAFETY: ptr is fresh, aligned for T and large enough for one T.
        unsafe { ptr.as_ptr().write(value) };
        ArenaBox {
            ptr,
            _arena: PhantomData,
            _value: PhantomData,
        }
    }

    /// Copies `src` into the arena and returns the arena-owned copy.
    pub fn alloc_slice_copy(&self, src: &[u8]) -> &mut [u8] {
        if src.is_empty() {
            return &mut [];
        }

        let ptr = self.allocate(src.len());
        // SAFETY: ptr is valid for src.len() fresh bytes that nothing else
        // refers to, and cannot overlap src.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            std::slice::from_raw_parts_mut(ptr.as_ptr(), src.len())
        }
    }

    /// Captures the cursor for a later [`rollback`](Arena::rollback).
    #[must_use]
    pub fn save(&self) -> ArenaState {
        ArenaState {
            pages: self.page_count(),
            offset: self.offset.get(),
            allocated: self.allocated.get(),
        }
    }

    /// Alias for [`save`](Arena::save).
    #[must_use]
    pub fn state(&self) -> ArenaState {
        self.save()
    }

    /// Restores the cursor captured in `state`.
    ///
    /// This undoes the allocations made since `state`, but only if they all
    /// came from the same page. If a page was created since, nothing happens.
    ///
    /// ```
    /// use tessera_mem::arena::Arena;
    ///
    /// let mut arena = Arena::with_page_size(256);
    /// let _warm = arena.allocate(8);
    ///
    /// let state = arena.save();
    /// let first = arena.allocate(32);
    /// arena.rollback(state);
    ///
    /// assert_eq!(arena.allocate(32), first);
    /// ```
    pub fn rollback(&mut self, state: ArenaState) {
        // SAFETY: `&mut self` proves that no borrow handed out by this arena
        // is still alive.
        unsafe { self.rewind(state) };
    }

    /// Shared-reference form of [`rollback`](Arena::rollback).
    ///
    /// # Safety
    ///
    /// Nothing allocated since `state` may be referenced after this call.
    pub(crate) unsafe fn rewind(&self, state: ArenaState) {
        if state.pages != self.page_count() {
            trace!(
                "rollback ignored: {} pages now, {} at save point",
                self.page_count(),
                state.pages
            );
            return;
        }
        self.offset.set(state.offset);
        self.allocated.set(state.allocated);
    }

    /// Exchanges the pages and configuration of two arenas.
    pub fn swap(&mut self, other: &mut Arena) {
        mem::swap(self, other);
    }

    /// Returns allocation statistics.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let pages = self.pages.borrow();
        ArenaStats {
            allocated: self.allocated.get(),
            page_count: pages.len(),
            capacity: pages.iter().map(|page| page.capacity).sum(),
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("page_size", &self.page_size)
            .field("page_count", &self.page_count())
            .field("offset", &self.offset.get())
            .finish()
    }
}

#[cold]
#[inline(never)]
fn exhausted(err: ArenaAllocError) -> ! {
    error!("{err}");
    match err {
        ArenaAllocError::OutOfMemory { layout } => alloc::handle_alloc_error(layout),
        ArenaAllocError::CapacityOverflow { .. } => panic!("{err}"),
    }
}

/// A value placed in an [`Arena`] by [`Arena::construct`].
///
/// Behaves like a `Box` whose drop only runs the destructor. The storage is
/// reclaimed when the arena itself is dropped.
pub struct ArenaBox<'a, T> {
    ptr: NonNull<T>,
    _arena: PhantomData<&'a Arena>,
    _value: PhantomData<T>,
}

impl<'a, T> ArenaBox<'a, T> {
    /// Gives up ownership without running the destructor.
    pub fn leak(this: Self) -> &'a mut T {
        let ptr = this.ptr;
        mem::forget(this);
        // SAFETY: the value is initialized, exclusively owned and its storage
        // lives as long as the arena borrow 'a.
        unsafe { &mut *ptr.as_ptr() }
    }

    /// Returns the address of the value inside the arena.
    #[must_use]
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }
}

impl<T> Deref for ArenaBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: initialized in `Arena::construct` and owned by self.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for ArenaBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: initialized in `Arena::construct` and owned by self.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for ArenaBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized and dropped exactly once here.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
    }
}

impl<T: fmt::Debug> fmt::Debug for ArenaBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
