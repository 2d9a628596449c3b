//! Region-chained arena allocator.
//!
//! An [`Arena`] owns an append-only chain of [`Region`]s, each one an
//! anonymous OS mapping with a bump cursor. Allocation walks the chain and
//! takes the first region with enough room (first-fit); when none has room a
//! new region is mapped and linked at the tail. Nothing is ever freed on its
//! own: memory is reclaimed in bulk by [`Arena::reset`] (cursors rewound,
//! mappings kept) or [`Arena::destroy`] / drop (mappings returned to the OS).
//!
//! # Thread Safety
//!
//! `Arena` is `Send + Sync`. Every allocation and reallocation takes a single
//! per-arena `Mutex` guarding the chain and all cursors; callers are served
//! in lock acquisition order. Memory already handed out is never touched by
//! the arena again, except for the copy in a reallocation the owner asked for.
//!
//! `reset`, `destroy` and `init` take `&mut self`, so they cannot run while
//! any other thread is allocating, and any slice borrowed from the arena
//! must be dead before they are called.
//!
//! # Growth Policy
//!
//! - First region: `align_size(size_hint)` bytes
//! - Appended region: `max(default region bytes, align_size(request))`
//!
//! where [`align_size`] rounds header plus request up to whole pages.
//!
//! # Examples
//!
//! ```
//! use strata_mem::Arena;
//!
//! let mut arena = Arena::new(4096);
//!
//! let numbers = arena.alloc_bytes(40);
//! numbers[0] = 7;
//! let greeting = arena.alloc_str("hello");
//! assert_eq!(greeting, "hello");
//!
//! arena.reset(); // both borrows above must be dead by now
//! assert_eq!(arena.stats().total_used, 0);
//! ```

// Allow precision loss in statistics calculations - acceptable for reporting purposes
#![allow(clippy::cast_precision_loss)]

use std::fmt::{self, Write as _};
use std::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard, PoisonError};

use strata_log::{debug, error, trace, warn};

use crate::config::{ArenaConfig, DEFAULT_REGION_PAGES, HEADER_ALIGN};
use crate::error::{Error, Result};
use crate::os;
use crate::region::{HEADER_SIZE, Region, RegionInfo};

/// Rounds `HEADER_SIZE + requested` up to a whole number of OS pages.
///
/// This is the mapping size needed for a region that can serve `requested`
/// bytes.
///
/// # Errors
///
/// Returns `Error::SizeOverflow` if the sum or the rounding overflows.
///
/// # Examples
///
/// ```
/// use strata_mem::arena::align_size;
/// use strata_mem::os::page_size;
///
/// assert_eq!(align_size(1).unwrap(), page_size());
/// assert_eq!(align_size(page_size()).unwrap(), 2 * page_size());
/// ```
pub fn align_size(requested: usize) -> Result<usize> {
    HEADER_SIZE
        .checked_add(requested)
        .and_then(os::round_to_pages)
        .ok_or(Error::SizeOverflow { requested })
}

/// Worst-case padding a fresh region needs before an `align`-aligned block.
/// Region data starts `HEADER_ALIGN`-aligned, so smaller alignments are free.
const fn alignment_slack(align: usize) -> usize {
    if align <= HEADER_ALIGN { 0 } else { align - 1 }
}

/// The region chain. Only ever touched through the arena's mutex or `&mut`.
struct Chain {
    head: Option<NonNull<Region>>,
    tail: Option<NonNull<Region>>,
    len: usize,
}

// SAFETY: the chain exclusively owns its mappings; nothing in it is tied to
// the creating thread. Shared access is serialized by the arena's Mutex.
unsafe impl Send for Chain {}

impl Chain {
    const fn new() -> Self {
        Chain {
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn regions(&self) -> impl Iterator<Item = NonNull<Region>> + '_ {
        // SAFETY: every linked region stays mapped until `release_all`,
        // which needs `&mut self`.
        std::iter::successors(self.head, |region| unsafe { region.as_ref().next() })
    }

    fn append(&mut self, region: NonNull<Region>) {
        match self.tail {
            // SAFETY: tail is a live region owned by this chain.
            Some(mut tail) => unsafe { tail.as_mut().set_next(Some(region)) },
            None => self.head = Some(region),
        }
        self.tail = Some(region);
        self.len += 1;
    }

    /// First-fit over the chain, appending a region when nothing fits.
    fn bump(
        &mut self,
        size: usize,
        align: usize,
        config: &ArenaConfig,
    ) -> Result<NonNull<u8>> {
        if self.head.is_none() {
            return Err(Error::Uninitialized);
        }

        for mut region in self.regions() {
            // SAFETY: the caller holds the lock (or `&mut Arena`), so no one
            // else is touching this header.
            if let Some(ptr) = unsafe { region.as_mut() }.bump(size, align) {
                return Ok(ptr);
            }
        }

        let padded = size
            .checked_add(alignment_slack(align))
            .ok_or(Error::SizeOverflow { requested: size })?;
        let total = align_size(padded)?.max(config.default_region_bytes());

        let mut region = Region::acquire(total)?;
        self.append(region);
        debug!(
            "appended region {} ({} bytes) for a {} byte request",
            self.len - 1,
            total,
            size
        );

        // SAFETY: just acquired and linked; we still hold exclusive access.
        let ptr = unsafe { region.as_mut() }
            .bump(size, align)
            .expect("fresh region is sized for the request");
        Ok(ptr)
    }

    /// Unmaps every region and empties the chain. Returns how many were released.
    fn release_all(&mut self) -> usize {
        let mut cursor = self.head.take();
        self.tail = None;
        self.len = 0;

        let mut released = 0;
        while let Some(region) = cursor {
            // SAFETY: read `next` before the header is unmapped; each region
            // is released exactly once since the chain was detached above.
            unsafe {
                cursor = region.as_ref().next();
                Region::release(region);
            }
            released += 1;
        }
        released
    }
}

/// Thread-safe region-based arena.
///
/// See the [module documentation](self) for the growth policy and the
/// locking discipline.
pub struct Arena {
    /// Region chain and cursors, serialized by one lock.
    chain: Mutex<Chain>,
    /// Sizing for appended regions.
    config: ArenaConfig,
}

impl Arena {
    /// Creates an arena with no regions.
    ///
    /// It must be initialized with [`Arena::init`] before allocating.
    #[must_use]
    pub const fn empty() -> Self {
        Self::empty_with_config(ArenaConfig::new(DEFAULT_REGION_PAGES))
    }

    /// Creates an arena with no regions and the given configuration.
    #[must_use]
    pub const fn empty_with_config(config: ArenaConfig) -> Self {
        Arena {
            chain: Mutex::new(Chain::new()),
            config,
        }
    }

    /// Creates an arena whose first region can hold at least `size_hint`
    /// bytes.
    ///
    /// # Panics
    ///
    /// Panics if the first region cannot be mapped.
    #[must_use]
    pub fn new(size_hint: usize) -> Self {
        Self::with_config(size_hint, ArenaConfig::default())
    }

    /// Creates an initialized arena with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if the first region cannot be mapped.
    #[must_use]
    pub fn with_config(size_hint: usize, config: ArenaConfig) -> Self {
        let mut arena = Self::empty_with_config(config);
        arena.init(size_hint);
        arena
    }

    /// Fallible form of [`Arena::new`].
    ///
    /// # Errors
    ///
    /// Returns the error from sizing or mapping the first region.
    pub fn try_new(size_hint: usize) -> Result<Self> {
        let mut arena = Self::empty();
        arena.try_init(size_hint)?;
        Ok(arena)
    }

    /// Establishes the first region, sized `align_size(size_hint)`.
    ///
    /// A live arena is destroyed first, so `init` also serves to re-create
    /// an arena after [`Arena::destroy`].
    ///
    /// # Panics
    ///
    /// Panics if the region cannot be mapped.
    pub fn init(&mut self, size_hint: usize) {
        if let Err(err) = self.try_init(size_hint) {
            fatal(&err);
        }
    }

    /// Fallible form of [`Arena::init`].
    ///
    /// # Errors
    ///
    /// Returns `Error::SizeOverflow` if `size_hint` cannot be sized; the
    /// arena is left untouched. Returns `Error::MapFailed` if the region
    /// cannot be mapped; the old chain is already released by then, so the
    /// arena is left without regions.
    pub fn try_init(&mut self, size_hint: usize) -> Result<()> {
        let total = align_size(size_hint)?;

        let chain = self.chain_mut();
        if chain.head.is_some() {
            warn!(
                "init on a live arena; releasing {} existing regions",
                chain.len
            );
            chain.release_all();
        }

        let region = Region::acquire(total)?;
        chain.append(region);
        self.chain.clear_poison();

        debug!("arena initialized with a {} byte region", total);
        Ok(())
    }

    /// Returns whether the arena currently owns any region.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lock().head.is_some()
    }

    /// The arena's configuration.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        // A panic under the lock happens before the chain is modified, so
        // the chain is consistent even when the mutex is poisoned.
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn chain_mut(&mut self) -> &mut Chain {
        self.chain.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates `size` bytes with no alignment guarantee.
    ///
    /// The block stays valid until the arena is reset, destroyed or dropped.
    /// Its contents are unspecified.
    ///
    /// # Panics
    ///
    /// Panics if the arena is uninitialized or a new region cannot be mapped.
    #[must_use]
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        self.try_allocate(size).unwrap_or_else(|err| fatal(&err))
    }

    /// Fallible form of [`Arena::allocate`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Uninitialized`, `Error::SizeOverflow` or
    /// `Error::MapFailed`.
    pub fn try_allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.try_allocate_aligned(size, 1)
    }

    /// Allocates `size` bytes at an address that is a multiple of `align`.
    ///
    /// The cursor is padded within the chosen region; the padding is lost
    /// until the next reset.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two, the arena is uninitialized,
    /// or a new region cannot be mapped.
    #[must_use]
    pub fn allocate_aligned(&self, size: usize, align: usize) -> NonNull<u8> {
        self.try_allocate_aligned(size, align)
            .unwrap_or_else(|err| fatal(&err))
    }

    /// Fallible form of [`Arena::allocate_aligned`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAlignment` in addition to the errors of
    /// [`Arena::try_allocate`].
    pub fn try_allocate_aligned(
        &self,
        size: usize,
        align: usize,
    ) -> Result<NonNull<u8>> {
        if !align.is_power_of_two() {
            return Err(Error::InvalidAlignment { alignment: align });
        }

        let ptr = self.lock().bump(size, align, &self.config)?;
        trace!("allocated {} bytes at {:p}", size, ptr);
        Ok(ptr)
    }

    /// Allocates a zero-filled byte slice borrowed from the arena.
    ///
    /// # Panics
    ///
    /// Same as [`Arena::allocate`].
    #[allow(clippy::mut_from_ref)] // Each call hands out a fresh, disjoint block
    pub fn alloc_bytes(&self, size: usize) -> &mut [u8] {
        let ptr = self.allocate(size);

        // SAFETY: `ptr` is valid for `size` bytes, disjoint from every other
        // live allocation, and stays mapped while `&self` is borrowed
        // (reset/destroy need `&mut self`).
        unsafe {
            ptr::write_bytes(ptr.as_ptr(), 0, size);
            std::slice::from_raw_parts_mut(ptr.as_ptr(), size)
        }
    }

    /// Copies `src` into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy(&self, src: &[u8]) -> &mut [u8] {
        let ptr = self.allocate(src.len());

        // SAFETY: fresh block of `src.len()` bytes that cannot overlap `src`
        // (it was just carved out of arena memory no one else holds).
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            std::slice::from_raw_parts_mut(ptr.as_ptr(), src.len())
        }
    }

    /// Copies `s` into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_str(&self, s: &str) -> &mut str {
        let bytes = self.alloc_slice_copy(s.as_bytes());
        // SAFETY: byte-for-byte copy of a valid `str`.
        unsafe { std::str::from_utf8_unchecked_mut(bytes) }
    }

    /// Grows (or keeps) a block by copying it into a fresh allocation.
    ///
    /// - `new_size < old_size`: returns `old` unchanged; nothing is reclaimed.
    /// - otherwise: allocates `new_size` bytes and copies the first
    ///   `old_size` bytes of `old` into it while holding the arena lock. The
    ///   old block becomes dead space until the next reset.
    ///
    /// Callers that grow repeatedly should grow geometrically, since every
    /// call orphans the previous block.
    ///
    /// # Safety
    ///
    /// `old` must be readable for `old_size` bytes and must not be written
    /// concurrently with this call.
    ///
    /// # Panics
    ///
    /// Same as [`Arena::allocate`].
    #[must_use]
    pub unsafe fn reallocate(
        &self,
        old: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> NonNull<u8> {
        // SAFETY: forwarded caller contract.
        unsafe { self.reallocate_aligned(old, old_size, new_size, 1) }
    }

    /// [`Arena::reallocate`] with the new block aligned to `align`.
    ///
    /// # Safety
    ///
    /// Same as [`Arena::reallocate`].
    ///
    /// # Panics
    ///
    /// Same as [`Arena::allocate_aligned`].
    #[must_use]
    pub unsafe fn reallocate_aligned(
        &self,
        old: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> NonNull<u8> {
        if new_size < old_size {
            return old;
        }
        if !align.is_power_of_two() {
            fatal(&Error::InvalidAlignment { alignment: align });
        }

        let new = {
            let mut chain = self.lock();
            let new = chain
                .bump(new_size, align, &self.config)
                .unwrap_or_else(|err| fatal(&err));

            // SAFETY: `old` is readable for `old_size` bytes (caller), `new`
            // is a fresh block of at least that many bytes, and a fresh
            // block never overlaps a block handed out earlier.
            unsafe {
                ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size);
            }
            new
        };

        trace!(
            "reallocated {:p} ({} bytes) to {:p} ({} bytes)",
            old,
            old_size,
            new,
            new_size
        );
        new
    }

    /// Safe form of [`Arena::reallocate`] over a borrowed slice.
    ///
    /// Shrinking returns a prefix of `old` at the same address. Growing
    /// returns a new block holding a copy of `old` followed by zeros.
    #[allow(clippy::mut_from_ref)]
    pub fn realloc_bytes<'a>(
        &'a self,
        old: &'a mut [u8],
        new_size: usize,
    ) -> &'a mut [u8] {
        let old_size = old.len();
        if new_size < old_size {
            return &mut old[..new_size];
        }

        // SAFETY: `old` is a live exclusive borrow, readable for its length
        // and not written during the call.
        unsafe {
            let new = self.reallocate(NonNull::from(&mut *old).cast(), old_size, new_size);
            ptr::write_bytes(new.as_ptr().add(old_size), 0, new_size - old_size);
            std::slice::from_raw_parts_mut(new.as_ptr(), new_size)
        }
    }

    /// Rewinds every region's cursor, keeping all mappings for reuse.
    ///
    /// Every pointer obtained from the arena is invalid afterwards. The
    /// `&mut self` receiver guarantees no other operation is in flight.
    pub fn reset(&mut self) {
        let chain = self.chain_mut();

        let mut count = 0;
        for mut region in chain.regions() {
            // SAFETY: exclusive access through `&mut self`.
            unsafe { region.as_mut().rewind() };
            count += 1;
        }
        self.chain.clear_poison();

        debug!("arena reset: {} regions rewound", count);
    }

    /// Unmaps every region. The arena must be re-initialized with
    /// [`Arena::init`] before it can allocate again.
    pub fn destroy(&mut self) {
        let released = self.chain_mut().release_all();
        self.chain.clear_poison();

        debug!("arena destroyed: {} regions released", released);
    }

    /// Whether `[ptr, ptr + len)` lies inside the data area of one of this
    /// arena's regions.
    #[must_use]
    pub fn owns(&self, ptr: *const u8, len: usize) -> bool {
        let chain = self.lock();
        // SAFETY: regions stay mapped while the lock is held.
        chain
            .regions()
            .any(|region| unsafe { region.as_ref() }.contains(ptr, len))
    }

    /// Snapshot of every region header, in chain order.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionInfo> {
        let chain = self.lock();
        chain
            .regions()
            .enumerate()
            // SAFETY: regions stay mapped while the lock is held.
            .map(|(index, region)| unsafe { region.as_ref() }.info(index))
            .collect()
    }

    /// Renders [`Arena::regions`] as text: address, data start, next link,
    /// capacity, used and free bytes per region.
    #[must_use]
    pub fn dump(&self) -> String {
        const RULE: &str = "=============================";

        let mut out = String::new();
        let _ = writeln!(out, "{RULE}");
        for info in self.regions() {
            let _ = writeln!(out, "{info}");
        }
        let _ = writeln!(out, "{RULE}");
        out
    }

    /// Writes [`Arena::dump`] to the log at debug level.
    pub fn log_dump(&self) {
        debug!("arena state:\n{}", self.dump());
    }

    /// Returns statistics about the arena's memory usage.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let regions = self.regions();

        let total_capacity: usize = regions.iter().map(|r| r.capacity).sum();
        let total_used: usize = regions.iter().map(|r| r.used).sum();
        let total_mapped: usize = regions.iter().map(RegionInfo::mapped_bytes).sum();

        ArenaStats {
            total_regions: regions.len(),
            total_capacity,
            total_used,
            total_mapped,
            unused_ratio: if total_capacity > 0 {
                1.0 - (total_used as f64 / total_capacity as f64)
            } else {
                0.0
            },
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.chain_mut().release_all();
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Arena")
            .field("regions", &stats.total_regions)
            .field("capacity", &stats.total_capacity)
            .field("used", &stats.total_used)
            .field("config", &self.config)
            .finish()
    }
}

/// Statistics about arena memory usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaStats {
    /// Number of regions in the chain.
    pub total_regions: usize,
    /// Usable bytes across all regions.
    pub total_capacity: usize,
    /// Bytes handed out across all regions, padding and orphaned blocks
    /// included.
    pub total_used: usize,
    /// Bytes mapped from the OS, headers included.
    pub total_mapped: usize,
    /// Unused memory ratio (0.0 = fully utilized, 1.0 = completely empty).
    pub unused_ratio: f64,
}

#[cold]
#[track_caller]
fn fatal(err: &Error) -> ! {
    error!("{err}");
    panic!("arena allocation failed: {err}");
}
