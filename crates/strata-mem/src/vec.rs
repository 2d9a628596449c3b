//! Growable array stored in an [`Arena`].
//!
//! `ArenaVec` grows by doubling its capacity through
//! [`Arena::reallocate_aligned`]. Each growth leaves the previous buffer
//! behind as dead space until the arena is reset, so doubling keeps the
//! total waste below the final buffer size.

use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use strata_log::trace;

use crate::arena::Arena;
use crate::config::ARR_INIT_CAPACITY;

/// A growable array of `Copy` values living in an arena.
///
/// Elements are never dropped: arena memory is reclaimed in bulk, so only
/// `Copy` types are accepted.
///
/// # Examples
///
/// ```
/// use strata_mem::{Arena, ArenaVec};
///
/// let arena = Arena::new(4096);
/// let mut numbers = ArenaVec::new_in(&arena);
///
/// for i in 0..1000u32 {
///     numbers.push(i);
/// }
///
/// assert_eq!(numbers.len(), 1000);
/// assert_eq!(numbers[999], 999);
/// ```
pub struct ArenaVec<'a, T: Copy> {
    arena: &'a Arena,
    ptr: NonNull<T>,
    len: usize,
    cap: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Copy> ArenaVec<'a, T> {
    /// Creates an empty vector. Nothing is allocated until the first push.
    #[must_use]
    pub fn new_in(arena: &'a Arena) -> Self {
        ArenaVec {
            arena,
            ptr: NonNull::dangling(),
            len: 0,
            cap: if size_of::<T>() == 0 { usize::MAX } else { 0 },
            _marker: PhantomData,
        }
    }

    /// Creates an empty vector with room for at least `capacity` elements.
    #[must_use]
    pub fn with_capacity_in(capacity: usize, arena: &'a Arena) -> Self {
        let mut vec = Self::new_in(arena);
        vec.reserve(capacity);
        vec
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements that fit before the next growth.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The arena backing this vector.
    #[must_use]
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Appends one element, growing the buffer if it is full.
    pub fn push(&mut self, item: T) {
        if self.len == self.cap {
            self.grow(self.len + 1);
        }

        // SAFETY: len < cap after the growth check.
        unsafe { self.ptr.as_ptr().add(self.len).write(item) };
        self.len += 1;
    }

    /// Appends every element of `items`.
    pub fn extend_from_slice(&mut self, items: &[T]) {
        self.reserve(items.len());

        // SAFETY: reserve guarantees room for items.len() more elements, and
        // `items` cannot alias our buffer's unused tail.
        unsafe {
            ptr::copy_nonoverlapping(
                items.as_ptr(),
                self.ptr.as_ptr().add(self.len),
                items.len(),
            );
        }
        self.len += items.len();
    }

    /// Ensures room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics if the required capacity overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self
            .len
            .checked_add(additional)
            .expect("ArenaVec capacity overflow");
        if needed > self.cap {
            self.grow(needed);
        }
    }

    /// Removes every element, keeping the buffer.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the element at the old `len - 1` was initialized.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// The initialized elements.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is aligned and the first `len` elements are
        // initialized; a dangling pointer is fine for `len == 0`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The initialized elements, mutably.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in `as_slice`, and `&mut self` gives exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// The allocated but unused tail of the buffer.
    pub fn spare_capacity_mut(&mut self) -> &mut [MaybeUninit<T>] {
        // SAFETY: `[len, cap)` lies inside our buffer and is not covered by
        // any initialized-element slice.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.ptr.as_ptr().add(self.len).cast::<MaybeUninit<T>>(),
                self.cap - self.len,
            )
        }
    }

    /// Sets the length.
    ///
    /// # Safety
    ///
    /// `new_len <= capacity()` and the first `new_len` elements must be
    /// initialized.
    pub unsafe fn set_len(&mut self, new_len: usize) {
        debug_assert!(new_len <= self.cap);
        self.len = new_len;
    }

    /// Doubles the capacity (starting from `ARR_INIT_CAPACITY`) until it
    /// reaches `min_cap`, then moves the elements into the new buffer.
    fn grow(&mut self, min_cap: usize) {
        let mut new_cap = if self.cap == 0 {
            ARR_INIT_CAPACITY
        } else {
            self.cap.saturating_mul(2)
        };
        while new_cap < min_cap {
            new_cap = new_cap.saturating_mul(2);
        }

        let elem = size_of::<T>();
        let new_bytes = new_cap
            .checked_mul(elem)
            .expect("ArenaVec capacity overflow");
        let align = align_of::<T>();

        let new_ptr = if self.cap == 0 {
            self.arena.allocate_aligned(new_bytes, align)
        } else {
            // SAFETY: our buffer is readable for `len * elem` bytes and is
            // not written during the call.
            unsafe {
                self.arena.reallocate_aligned(
                    self.ptr.cast(),
                    self.len * elem,
                    new_bytes,
                    align,
                )
            }
        };

        trace!(
            "ArenaVec grew from {} to {} elements ({} bytes)",
            self.cap,
            new_cap,
            new_bytes
        );
        self.ptr = new_ptr.cast();
        self.cap = new_cap;
    }
}

impl<T: Copy> Deref for ArenaVec<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy> DerefMut for ArenaVec<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Copy> Extend<T> for ArenaVec<'_, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for item in iter {
            self.push(item);
        }
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for ArenaVec<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
