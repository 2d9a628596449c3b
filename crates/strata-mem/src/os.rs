//! Operating-system virtual memory: page size and anonymous mappings.

use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Used only if `sysconf` cannot report a page size.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the OS page size in bytes. Queried once and cached.
#[must_use]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        match usize::try_from(raw) {
            Ok(size) if size.is_power_of_two() => size,
            _ => FALLBACK_PAGE_SIZE,
        }
    })
}

/// Rounds `bytes` up to a whole number of pages, or `None` on overflow.
#[must_use]
pub fn round_to_pages(bytes: usize) -> Option<usize> {
    let page = page_size();
    bytes.checked_add(page - 1).map(|n| n & !(page - 1))
}

/// Maps `len` bytes of private, zero-filled, read/write memory.
///
/// # Errors
///
/// Returns `Error::MapFailed` carrying the OS `errno` when `mmap` fails.
pub fn map(len: usize) -> Result<NonNull<u8>> {
    // SAFETY: an anonymous private mapping with a null hint does not alias
    // any existing memory. The result is checked against MAP_FAILED.
    let raw = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if raw == libc::MAP_FAILED {
        let errno = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(0);
        return Err(Error::MapFailed { size: len, errno });
    }

    NonNull::new(raw.cast::<u8>()).ok_or(Error::MapFailed {
        size: len,
        errno: 0,
    })
}

/// Unmaps a block previously returned by [`map`].
///
/// Returns `false` if the OS rejected the request.
///
/// # Safety
///
/// `base` and `len` must describe exactly one live mapping from [`map`], and
/// nothing may access the block afterwards.
pub unsafe fn unmap(base: NonNull<u8>, len: usize) -> bool {
    // SAFETY: guaranteed by the caller.
    unsafe { libc::munmap(base.as_ptr().cast(), len) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        let page = page_size();
        assert!(page.is_power_of_two());
        assert!(page >= 4096);
        assert_eq!(page, page_size());
    }

    #[test]
    fn test_round_to_pages() {
        let page = page_size();
        assert_eq!(round_to_pages(0), Some(0));
        assert_eq!(round_to_pages(1), Some(page));
        assert_eq!(round_to_pages(page), Some(page));
        assert_eq!(round_to_pages(page + 1), Some(2 * page));
        assert_eq!(round_to_pages(usize::MAX), None);
    }

    #[test]
    fn test_map_is_zeroed_and_writable() {
        let len = page_size();
        let base = map(len).unwrap();

        unsafe {
            let bytes = std::slice::from_raw_parts_mut(base.as_ptr(), len);
            assert!(bytes.iter().all(|&b| b == 0));
            bytes[0] = 0xAB;
            bytes[len - 1] = 0xCD;
            assert_eq!(bytes[0], 0xAB);

            assert!(unmap(base, len));
        }
    }

    #[test]
    fn test_map_is_page_aligned() {
        let len = 3 * page_size();
        let base = map(len).unwrap();
        assert_eq!(base.as_ptr().addr() % page_size(), 0);
        unsafe {
            assert!(unmap(base, len));
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_unmap_reports_failure() {
        let len = 2 * page_size();
        let base = map(len).unwrap();

        // not page aligned: the kernel refuses it
        let inside = unsafe { base.add(1) };
        assert!(!unsafe { unmap(inside, page_size()) });

        assert!(unsafe { unmap(base, len) });
    }

    #[test]
    fn test_map_failure_reports_errno() {
        let err = map(1 << 60).unwrap_err();
        match err {
            Error::MapFailed { size, errno } => {
                assert_eq!(size, 1 << 60);
                assert_ne!(errno, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
