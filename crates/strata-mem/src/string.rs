//! Growable, NUL-terminated UTF-8 string stored in an [`Arena`].

use std::fmt;
use std::ops::Deref;

use crate::arena::Arena;
use crate::vec::ArenaVec;

/// A growable string in an arena that always keeps a trailing NUL byte
/// after its contents once anything has been written, so the buffer can be
/// handed to C APIs directly.
///
/// # Examples
///
/// ```
/// use strata_mem::{Arena, ArenaString};
///
/// let arena = Arena::new(4096);
/// let mut s = ArenaString::new_in(&arena);
/// s.push_str("region");
/// s.push('!');
///
/// assert_eq!(s.as_str(), "region!");
/// assert_eq!(s.as_bytes_with_nul(), b"region!\0");
/// ```
pub struct ArenaString<'a> {
    buf: ArenaVec<'a, u8>,
}

impl<'a> ArenaString<'a> {
    /// Creates an empty string. Nothing is allocated until the first write.
    #[must_use]
    pub fn new_in(arena: &'a Arena) -> Self {
        ArenaString {
            buf: ArenaVec::new_in(arena),
        }
    }

    /// Creates a string holding a copy of `s`.
    #[must_use]
    pub fn from_str_in(s: &str, arena: &'a Arena) -> Self {
        let mut string = Self::new_in(arena);
        string.push_str(s);
        string
    }

    /// Length in bytes, terminator excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Buffer size in bytes, terminator slot included.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Appends one character.
    pub fn push(&mut self, ch: char) {
        let mut utf8 = [0; 4];
        self.push_str(ch.encode_utf8(&mut utf8));
    }

    /// Appends a string slice.
    pub fn push_str(&mut self, s: &str) {
        // one extra byte for the terminator
        self.buf.reserve(s.len() + 1);
        self.buf.extend_from_slice(s.as_bytes());
        self.terminate();
    }

    /// Truncates to zero length, keeping the buffer.
    pub fn clear(&mut self) {
        self.buf.clear();
        if self.buf.capacity() > 0 {
            self.terminate();
        }
    }

    fn terminate(&mut self) {
        self.buf.spare_capacity_mut()[0].write(0);
    }

    /// The contents as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: only whole `&str`s and encoded chars are ever appended.
        unsafe { std::str::from_utf8_unchecked(self.buf.as_slice()) }
    }

    /// The contents followed by the NUL terminator.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        if self.buf.capacity() == 0 {
            return b"\0";
        }

        // SAFETY: once the buffer exists, the byte at `len` is always the
        // terminator written by `terminate`, and `len < capacity`.
        unsafe { std::slice::from_raw_parts(self.buf.as_ptr(), self.buf.len() + 1) }
    }
}

impl Deref for ArenaString<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Write for ArenaString<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl fmt::Display for ArenaString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ArenaString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq<str> for ArenaString<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ArenaString<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
