//! Content-keyed set of string records.
//!
//! The set is an open-addressing hash table with linear probing. Its slot
//! arrays are carved out of a dedicated [`Arena`]; when the table grows, the
//! old array is simply abandoned and reclaimed together with the arena.
//!
//! Home slots come from the top bits of the hash. `fxhash` ends with a
//! multiply, so its low bits only see the tail of the key.

use std::ptr::NonNull;

use tessera_log::debug;

use crate::arena::Arena;
use crate::sym::Record;

/// Slot count of the first slot array.
const INITIAL_CAPACITY: usize = 16;

#[derive(Clone, Copy)]
struct Slot {
    hash: u64,
    record: Option<NonNull<Record>>,
}

impl Slot {
    const VACANT: Slot = Slot {
        hash: 0,
        record: None,
    };
}

/// Outcome of [`RecordSet::probe`].
pub(crate) enum Probe {
    /// A record with the probed content exists.
    Found(NonNull<Record>),
    /// No such record; the index is the vacant slot to fill.
    Vacant(usize),
}

pub(crate) struct RecordSet {
    arena: Arena,
    slots: NonNull<Slot>,
    /// Number of slots, zero or a power of two.
    capacity: usize,
    /// `64 - log2(capacity)`; shifts a hash down to its home slot.
    shift: u32,
    len: usize,
}

// SAFETY: the slot arrays live in the set's own arena, and the records they
// point at live in an arena owned by the same pool, which moves with it.
unsafe impl Send for RecordSet {}

impl RecordSet {
    pub(crate) fn new(arena: Arena) -> Self {
        RecordSet {
            arena,
            slots: NonNull::dangling(),
            capacity: 0,
            shift: u64::BITS,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    #[inline]
    fn home(&self, hash: u64) -> usize {
        hash.checked_shr(self.shift).unwrap_or(0) as usize
    }

    fn slots(&self) -> &[Slot] {
        // SAFETY: `slots` points at `capacity` initialized slots in the
        // arena, or is dangling with capacity zero.
        unsafe { std::slice::from_raw_parts(self.slots.as_ptr(), self.capacity) }
    }

    fn slots_mut(&mut self) -> &mut [Slot] {
        // SAFETY: as in `slots`, and `&mut self` makes the access unique.
        unsafe { std::slice::from_raw_parts_mut(self.slots.as_ptr(), self.capacity) }
    }

    /// Makes sure one more record can be inserted without growing.
    ///
    /// Returns `true` if the slot array was replaced, which invalidates any
    /// vacant slot index from an earlier [`probe`](Self::probe).
    pub(crate) fn reserve_one(&mut self) -> bool {
        // Keep the load factor at or below 7/8.
        if (self.len + 1) * 8 > self.capacity * 7 {
            self.grow();
            return true;
        }
        false
    }

    /// Looks for a record with `hash` whose content equals `bytes`.
    pub(crate) fn probe(&self, hash: u64, bytes: &[u8]) -> Probe {
        if self.capacity == 0 {
            return Probe::Vacant(0);
        }

        let mask = self.capacity - 1;
        let slots = self.slots();
        let mut index = self.home(hash);
        loop {
            let slot = slots[index];
            match slot.record {
                None => return Probe::Vacant(index),
                Some(record) if slot.hash == hash => {
                    // SAFETY: records in the set live as long as the pool.
                    let stored = unsafe { Record::bytes_with_nul(record) };
                    if &stored[..stored.len() - 1] == bytes {
                        return Probe::Found(record);
                    }
                }
                Some(_) => {}
            }
            index = (index + 1) & mask;
        }
    }

    /// Fills the vacant slot `index` returned by the last probe.
    pub(crate) fn insert_at(&mut self, index: usize, hash: u64, record: NonNull<Record>) {
        let slot = &mut self.slots_mut()[index];
        debug_assert!(slot.record.is_none());
        *slot = Slot {
            hash,
            record: Some(record),
        };
        self.len += 1;
    }

    #[cold]
    fn grow(&mut self) {
        let capacity = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity * 2
        };

        let slots = self.arena.allocate_array::<Slot>(capacity);
        for i in 0..capacity {
            // SAFETY: the array was just allocated for `capacity` slots.
            unsafe { slots.as_ptr().add(i).write(Slot::VACANT) };
        }

        let old = std::mem::replace(&mut self.slots, slots);
        let old_capacity = std::mem::replace(&mut self.capacity, capacity);
        self.shift = u64::BITS - capacity.trailing_zeros();
        debug!("record set grown from {} to {} slots", old_capacity, capacity);

        let mask = capacity - 1;
        for i in 0..old_capacity {
            // SAFETY: the old array stays allocated in the arena.
            let slot = unsafe { *old.as_ptr().add(i) };
            if slot.record.is_none() {
                continue;
            }
            let mut index = self.home(slot.hash);
            let new_slots = self.slots_mut();
            while new_slots[index].record.is_some() {
                index = (index + 1) & mask;
            }
            new_slots[index] = slot;
        }
    }
}
