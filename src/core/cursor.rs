/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! The byte cursor wraps the message buffer and tracks a read position.
//! It never reads past `len` and performs no header-folding awareness of
//! its own; that belongs to the header lexer.

/// Shared cursor behaviour. Implemented by both the read-only [`Cursor`]
/// and the mutating [`CursorMut`] so that most of the parser is generic
/// over mutation capability, but only `CursorMut` exposes `patch` and
/// `grow_for_base64`.
pub trait ByteCursor<'x> {
    fn data(&self) -> &[u8];
    fn offset(&self) -> usize;
    fn set_offset(&mut self, offset: usize);
    fn len(&self) -> usize {
        self.data().len()
    }
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_eof(&self) -> bool {
        self.offset() >= self.len()
    }

    fn remaining(&self) -> &[u8] {
        &self.data()[self.offset()..]
    }

    fn peek(&self) -> Option<u8> {
        self.data().get(self.offset()).copied()
    }

    fn peek_at(&self, delta: usize) -> Option<u8> {
        self.data().get(self.offset() + delta).copied()
    }

    fn peek_char(&self, ch: u8) -> bool {
        self.peek() == Some(ch)
    }

    fn advance(&mut self, n: usize) {
        self.set_offset((self.offset() + n).min(self.len()));
    }

    fn next(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.advance(1);
        Some(ch)
    }

    fn try_skip_char(&mut self, ch: u8) -> bool {
        if self.peek_char(ch) {
            self.advance(1);
            true
        } else {
            false
        }
    }

    fn try_skip(&mut self, bytes: &[u8]) -> bool {
        if self.remaining().starts_with(bytes) {
            self.advance(bytes.len());
            true
        } else {
            false
        }
    }

    fn next_is_space(&self) -> bool {
        matches!(self.peek(), Some(b' ') | Some(b'\t'))
    }

    /// If the byte after the current position (i.e. the byte following a
    /// just-consumed `\n`) is linear whitespace, consumes it and returns
    /// `true` — this marks the next line as a header continuation (fold)
    /// rather than a new logical line.
    fn try_next_is_space(&mut self) -> bool {
        if self.next_is_space() {
            self.advance(1);
            true
        } else {
            false
        }
    }

    fn bytes(&self, range: std::ops::Range<usize>) -> &[u8] {
        &self.data()[range]
    }

    /// Returns the slice from `start` to the current offset.
    fn slice_from(&self, start: usize) -> &[u8] {
        &self.data()[start..self.offset()]
    }

    /// Returns the next logical line, up to and including the terminating
    /// `\n` or end of buffer, without unfolding continuations. Advances
    /// past it.
    fn get_line(&mut self) -> &[u8] {
        let start = self.offset();
        let data = self.data();
        let mut end = start;
        while end < data.len() && data[end] != b'\n' {
            end += 1;
        }
        if end < data.len() {
            end += 1; // include the \n
        }
        self.set_offset(end);
        &self.data()[start..end]
    }

    fn checkpoint(&mut self);
    fn restore(&mut self);

    /// True only for `CursorMut` — gates the binary-to-base64 recode path
    /// (§4.7) structurally so a read-only `Cursor` can never attempt it.
    fn supports_binary_recode(&self) -> bool {
        false
    }

    /// Overwrites `range` with `replacement`, which may be a different
    /// length, and returns the signed byte delta (`replacement.len() as
    /// isize - range.len() as isize`). `Cursor` cannot mutate its buffer
    /// and always returns `0` without touching anything.
    fn try_replace_range(&mut self, _range: std::ops::Range<usize>, _replacement: &[u8]) -> isize {
        0
    }
}

/// Read-only view over message bytes. Used whenever the caller has not
/// opted into binary-to-base64 re-encoding.
pub struct Cursor<'x> {
    data: &'x [u8],
    offset: usize,
    saved: usize,
}

impl<'x> Cursor<'x> {
    pub fn new(data: &'x [u8]) -> Self {
        Cursor {
            data,
            offset: 0,
            saved: 0,
        }
    }
}

impl<'x> ByteCursor<'x> for Cursor<'x> {
    fn data(&self) -> &[u8] {
        self.data
    }
    fn offset(&self) -> usize {
        self.offset
    }
    fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }
    fn checkpoint(&mut self) {
        self.saved = self.offset;
    }
    fn restore(&mut self) {
        self.offset = self.saved;
    }
}

/// Mutable view over a caller-owned, writable message buffer. Only this
/// cursor type can patch a `Content-Transfer-Encoding: binary` token and
/// expand the buffer with base64 bytes (§4.7). A read-only [`Cursor`]
/// structurally cannot reach that code path.
pub struct CursorMut<'x> {
    data: &'x mut Vec<u8>,
    offset: usize,
    saved: usize,
}

impl<'x> CursorMut<'x> {
    pub fn new(data: &'x mut Vec<u8>) -> Self {
        CursorMut {
            data,
            offset: 0,
            saved: 0,
        }
    }

    /// Overwrites `len` bytes at `at` with `replacement`, which must be
    /// exactly `len` bytes long. Used to rewrite the CTE token in place.
    pub fn patch(&mut self, at: usize, replacement: &[u8]) {
        self.data[at..at + replacement.len()].copy_from_slice(replacement);
    }

    /// Grows the buffer by inserting `bytes` at `at`, shifting everything
    /// from `at` onward to the right (a memmove). Returns the delta, which
    /// callers add to any offset they are tracking past `at`.
    pub fn splice_in(&mut self, at: usize, bytes: &[u8]) -> usize {
        self.data.splice(at..at, bytes.iter().copied());
        bytes.len()
    }

    pub fn into_inner(self) -> &'x mut Vec<u8> {
        self.data
    }

    /// Overwrites `range` with `replacement`, growing or shrinking the
    /// buffer as needed, and returns the signed byte delta.
    pub fn replace_range(&mut self, range: std::ops::Range<usize>, replacement: &[u8]) -> isize {
        let old_len = range.len() as isize;
        self.data.splice(range, replacement.iter().copied());
        replacement.len() as isize - old_len
    }
}

impl<'x> ByteCursor<'x> for CursorMut<'x> {
    fn data(&self) -> &[u8] {
        self.data
    }
    fn offset(&self) -> usize {
        self.offset
    }
    fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }
    fn checkpoint(&mut self) {
        self.saved = self.offset;
    }
    fn restore(&mut self) {
        self.offset = self.saved;
    }
    fn supports_binary_recode(&self) -> bool {
        true
    }
    fn try_replace_range(&mut self, range: std::ops::Range<usize>, replacement: &[u8]) -> isize {
        self.replace_range(range, replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_line_includes_terminator() {
        let mut cur = Cursor::new(b"foo\nbar");
        assert_eq!(cur.get_line(), b"foo\n");
        assert_eq!(cur.get_line(), b"bar");
        assert!(cur.is_eof());
    }

    #[test]
    fn checkpoint_restore_roundtrips() {
        let mut cur = Cursor::new(b"abcdef");
        cur.advance(3);
        cur.checkpoint();
        cur.advance(2);
        assert_eq!(cur.offset(), 5);
        cur.restore();
        assert_eq!(cur.offset(), 3);
    }

    #[test]
    fn cursor_mut_patch_and_splice() {
        let mut buf = b"hello binary world".to_vec();
        {
            let mut cur = CursorMut::new(&mut buf);
            cur.patch(6, b"base64");
        }
        assert_eq!(&buf, b"hello base64 world");

        let mut buf2 = b"AB".to_vec();
        {
            let mut cur = CursorMut::new(&mut buf2);
            let delta = cur.splice_in(1, b"XY");
            assert_eq!(delta, 2);
        }
        assert_eq!(&buf2, b"AXYB");
    }
}
