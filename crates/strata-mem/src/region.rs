//! A single OS-mapped block with a bump cursor.
//!
//! The `Region` header is written into the first bytes of its own mapping;
//! usable memory starts [`HEADER_SIZE`] bytes after the mapping base:
//!
//! ```text
//!   base                 data                              base + total
//!   ┌────────────────────┬─────────────────┬───────────────────────────┐
//!   │ Region header      │ used            │ remaining                 │
//!   │ next/capacity/...  │ (handed out)    │                           │
//!   └────────────────────┴─────────────────┴───────────────────────────┘
//!                        ◄──────────────── capacity ──────────────────►
//! ```
//!
//! Regions are linked into a chain owned by an [`Arena`](crate::Arena). A
//! region is never partially freed; its whole mapping is released at once.

use std::fmt;
use std::ptr::NonNull;

use strata_log::{debug, error};

use crate::config::HEADER_ALIGN;
use crate::error::Result;
use crate::os;

/// Bookkeeping header stored at the start of every region's mapping.
#[repr(C)]
pub struct Region {
    /// Next region in the owning arena's chain.
    next: Option<NonNull<Region>>,
    /// Usable bytes, header excluded.
    capacity: usize,
    /// Bytes handed out so far.
    used: usize,
    /// `capacity - used`, kept alongside `used` for first-fit checks.
    remaining: usize,
    /// First usable byte, `HEADER_SIZE` past the mapping base.
    data: NonNull<u8>,
}

/// Bytes reserved at the start of each mapping for the [`Region`] header.
pub const HEADER_SIZE: usize =
    (size_of::<Region>() + HEADER_ALIGN - 1) & !(HEADER_ALIGN - 1);

impl Region {
    /// Maps `total_bytes` from the OS and writes a fresh header into it.
    ///
    /// `total_bytes` includes the header and should be a whole number of
    /// pages (see [`align_size`](crate::arena::align_size)).
    ///
    /// # Errors
    ///
    /// Returns `Error::MapFailed` if the OS cannot satisfy the mapping.
    pub(crate) fn acquire(total_bytes: usize) -> Result<NonNull<Region>> {
        debug_assert!(total_bytes > HEADER_SIZE);

        let base = os::map(total_bytes)?;
        let region = base.cast::<Region>();
        let capacity = total_bytes - HEADER_SIZE;

        // SAFETY: the mapping is page aligned (so aligned for `Region`),
        // writable, and at least HEADER_SIZE bytes long. `data` stays inside
        // the same mapping.
        unsafe {
            region.as_ptr().write(Region {
                next: None,
                capacity,
                used: 0,
                remaining: capacity,
                data: base.add(HEADER_SIZE),
            });
        }

        debug!("acquired region at {:p}: {} usable bytes", base, capacity);
        Ok(region)
    }

    /// Unmaps the region's whole block.
    ///
    /// # Safety
    ///
    /// `region` must come from [`Region::acquire`], must not have been
    /// released before, and nothing may touch it or its data afterwards.
    pub(crate) unsafe fn release(region: NonNull<Region>) {
        // SAFETY: the header is still mapped (caller guarantee).
        let capacity = unsafe { region.as_ref().capacity };
        let total = HEADER_SIZE + capacity;

        // SAFETY: `region` is the base of a live mapping of `total` bytes.
        let unmapped = unsafe { os::unmap(region.cast(), total) };
        if unmapped {
            debug!("released region at {:p}: {} bytes", region, total);
        } else {
            error!(
                "munmap failed for region at {:p} ({} bytes): {}",
                region,
                total,
                std::io::Error::last_os_error()
            );
        }
        debug_assert!(unmapped, "munmap failed for region at {region:p}");
    }

    /// Hands out `size` bytes at the cursor, first padding the cursor to
    /// `align`. Returns `None` and leaves the cursor untouched if the
    /// padded request does not fit.
    ///
    /// With `align == 1` this is a plain bump of exactly `size` bytes.
    pub(crate) fn bump(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        debug_assert!(align.is_power_of_two());

        let cursor = self.data.as_ptr().addr() + self.used;
        let padding = cursor.next_multiple_of(align) - cursor;
        let needed = padding.checked_add(size)?;

        if needed > self.remaining {
            return None;
        }

        // SAFETY: used + padding + size <= capacity, so the result lies in
        // `[data, data + capacity]` of this mapping.
        let ptr = unsafe { self.data.add(self.used + padding) };
        self.used += needed;
        self.remaining -= needed;

        debug_assert_eq!(self.used + self.remaining, self.capacity);
        Some(ptr)
    }

    /// Rewinds the cursor to the start of the data area.
    pub(crate) fn rewind(&mut self) {
        self.used = 0;
        self.remaining = self.capacity;
    }

    pub(crate) fn set_next(&mut self, next: Option<NonNull<Region>>) {
        self.next = next;
    }

    /// Next region in the chain.
    #[must_use]
    pub fn next(&self) -> Option<NonNull<Region>> {
        self.next
    }

    /// Usable bytes, header excluded.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes handed out since acquisition or the last rewind.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still available at the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// First usable byte.
    #[must_use]
    pub fn data(&self) -> NonNull<u8> {
        self.data
    }

    /// Whether `[ptr, ptr + len)` lies within this region's data area.
    #[must_use]
    pub fn contains(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.data.as_ptr().addr();
        let addr = ptr.addr();
        addr >= start
            && addr
                .checked_add(len)
                .is_some_and(|end| end <= start + self.capacity)
    }

    pub(crate) fn info(&self, index: usize) -> RegionInfo {
        RegionInfo {
            index,
            base: (self as *const Region).addr(),
            data: self.data.as_ptr().addr(),
            next: self.next.map(|n| n.as_ptr().addr()),
            capacity: self.capacity,
            used: self.used,
            remaining: self.remaining,
        }
    }
}

/// A point-in-time copy of one region's header, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    /// Position in the chain, starting at 0.
    pub index: usize,
    /// Address of the region header (mapping base).
    pub base: usize,
    /// Address of the first usable byte.
    pub data: usize,
    /// Address of the next region's header, if any.
    pub next: Option<usize>,
    /// Usable bytes.
    pub capacity: usize,
    /// Bytes handed out.
    pub used: usize,
    /// Bytes still free.
    pub remaining: usize,
}

impl RegionInfo {
    /// Bytes mapped from the OS for this region, header included.
    #[must_use]
    pub fn mapped_bytes(&self) -> usize {
        HEADER_SIZE + self.capacity
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===> Region {}:", self.index)?;
        writeln!(f, "Address:    {:#x}", self.base)?;
        writeln!(f, "Starts at:  {:#x}", self.data)?;
        match self.next {
            Some(next) => writeln!(f, "Next:       {next:#x}")?,
            None => writeln!(f, "Next:       null")?,
        }
        writeln!(f, "Capacity:   {} bytes", self.capacity)?;
        writeln!(f, "Used:       {} bytes", self.used)?;
        writeln!(f, "Free:       {} bytes", self.remaining)
    }
}
