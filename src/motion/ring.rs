//! Fixed-capacity circular buffer addressed by index.
//!
//! Records are written at the add cursor and consumed from the get cursor. Two slots
//! are always left between the cursors: the slot just behind `get` may still be read
//! by the context that consumed it, so one more add would overwrite live data.

use core::ops::{Index, IndexMut};

/// Circular buffer of `N` slots with plain integer cursors.
///
/// Usable capacity is `N - 2`.
#[derive(Debug)]
pub struct Ring<T, const N: usize> {
    slots: [T; N],
    add: usize,
    get: usize,
}

impl<T, const N: usize> Ring<T, N> {
    const LEAD_FITS: () = assert!(N >= 3, "a ring needs at least three slots");

    /// Create a ring with every slot initialised by `f(index)`.
    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LEAD_FITS;
        Self {
            slots: core::array::from_fn(f),
            add: 0,
            get: 0,
        }
    }

    /// Number of records the ring can hold.
    #[inline]
    pub const fn capacity() -> usize {
        N - 2
    }

    /// Slot after `index`.
    #[inline]
    pub const fn next(index: usize) -> usize {
        (index + 1) % N
    }

    /// Slot before `index`.
    #[inline]
    pub const fn prev(index: usize) -> usize {
        (index + N - 1) % N
    }

    /// Slot the next add writes.
    #[inline]
    pub fn add_index(&self) -> usize {
        self.add
    }

    /// Oldest unconsumed slot.
    #[inline]
    pub fn get_index(&self) -> usize {
        self.get
    }

    /// Number of unconsumed records.
    #[inline]
    pub fn len(&self) -> usize {
        (self.add + N - self.get) % N
    }

    /// Check if no record is waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.add == self.get
    }

    /// Check if one more add would break the two-slot lead.
    #[inline]
    pub fn is_full(&self) -> bool {
        (self.add + 2) % N == self.get
    }

    /// Write `value` at the add cursor and advance it.
    ///
    /// Returns the written slot, or hands `value` back when the ring is full.
    pub fn push(&mut self, value: T) -> core::result::Result<usize, T> {
        if self.is_full() {
            return Err(value);
        }
        let slot = self.add;
        self.slots[slot] = value;
        self.add = Self::next(slot);
        Ok(slot)
    }

    /// Advance the add cursor over a slot already written in place.
    pub fn commit_add(&mut self) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let slot = self.add;
        self.add = Self::next(slot);
        Some(slot)
    }

    /// Consume the oldest record, returning its slot.
    ///
    /// The slot stays readable until the add cursor comes round to it again.
    pub fn advance_get(&mut self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let slot = self.get;
        self.get = Self::next(slot);
        Some(slot)
    }

    /// Drop every record, restarting both cursors at `index`.
    pub fn clear_at(&mut self, index: usize) {
        let index = index % N;
        self.add = index;
        self.get = index;
    }

    /// Slots from `from` up to, but excluding, `to`, in ring order.
    pub fn span(from: usize, to: usize) -> impl Iterator<Item = usize> {
        let count = (to + N - from) % N;
        (0..count).map(move |i| (from + i) % N)
    }
}

impl<T, const N: usize> Index<usize> for Ring<T, N> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.slots[index]
    }
}

impl<T, const N: usize> IndexMut<usize> for Ring<T, N> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.slots[index]
    }
}
