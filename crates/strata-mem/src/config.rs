//! Sizing constants and per-arena configuration.

use crate::os;

/// Default size of an appended region, in OS pages.
///
/// A region appended for a request smaller than this is mapped at this size
/// so that small allocations do not each trigger a new mapping.
pub const DEFAULT_REGION_PAGES: usize = 2;

/// Starting capacity, in elements, of [`ArenaVec`](crate::ArenaVec) and
/// [`ArenaString`](crate::ArenaString) on their first growth.
pub const ARR_INIT_CAPACITY: usize = 256;

/// Alignment of the region header, and therefore of each region's data start.
pub const HEADER_ALIGN: usize = 16;

/// Per-arena settings.
///
/// # Examples
///
/// ```
/// use strata_mem::{Arena, ArenaConfig};
///
/// let config = ArenaConfig::new(8);
/// let arena = Arena::with_config(1024, config);
/// assert_eq!(arena.config().default_region_pages(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    default_region_pages: usize,
}

impl ArenaConfig {
    /// Creates a configuration whose appended regions default to `pages`
    /// OS pages. Zero is clamped to one page.
    #[must_use]
    pub const fn new(pages: usize) -> Self {
        Self {
            default_region_pages: if pages == 0 { 1 } else { pages },
        }
    }

    /// Returns a copy with a different default region size.
    #[must_use]
    pub const fn with_default_region_pages(self, pages: usize) -> Self {
        Self::new(pages)
    }

    /// Default region size in pages.
    #[must_use]
    pub const fn default_region_pages(&self) -> usize {
        self.default_region_pages
    }

    /// Default region size in bytes, header included.
    #[must_use]
    pub fn default_region_bytes(&self) -> usize {
        self.default_region_pages.saturating_mul(os::page_size())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_PAGES)
    }
}
