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

//! Binary Recoder (`SPEC_FULL.md` §4.7): for a leaf part whose
//! `Content-Transfer-Encoding` token was `BINARY` and whose cursor is in
//! encode mode, rewrites the CTE token in place and replaces the content
//! bytes with their base64 expansion. A read-only [`crate::core::Cursor`]
//! cannot reach this path at all — [`crate::core::ByteCursor::supports_binary_recode`]
//! is `false` for it, so the call site below is a no-op by construction,
//! not by a runtime check the caller has to remember.

use crate::collab::CharsetService;
use crate::core::cursor::ByteCursor;

pub struct RecodeOutcome {
    pub content_size: usize,
    pub content_lines: usize,
    pub delta: isize,
}

/// If `cur` supports binary recode, replaces `[content_offset,
/// content_offset + content_size)` with the base64 encoding of those same
/// bytes and patches the six-byte CTE token at `cte_range` to `base64`.
/// Returns `None` when the cursor is read-only (nothing was touched) or
/// `cte_range`'s length isn't exactly six bytes (`"binary"`/`"BINARY"`
/// are always six, but a caller that got here via a non-`BINARY` token
/// has no range worth trusting).
pub fn recode_binary<'x, C: ByteCursor<'x>>(
    cur: &mut C,
    content_offset: usize,
    content_size: usize,
    cte_range: std::ops::Range<usize>,
    charset: &dyn CharsetService,
) -> Option<RecodeOutcome> {
    if !cur.supports_binary_recode() || cte_range.len() != 6 {
        return None;
    }

    let raw = cur.bytes(content_offset..content_offset + content_size).to_vec();
    let (encoded, lines) = charset.encode_mimebody(&raw);

    cur.try_replace_range(cte_range, b"base64");
    let delta = cur.try_replace_range(content_offset..content_offset + content_size, &encoded);

    Some(RecodeOutcome {
        content_size: encoded.len(),
        content_lines: lines,
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::support::DefaultCharsetService;
    use crate::core::cursor::CursorMut;

    #[test]
    fn recodes_binary_content_and_patches_token() {
        let mut buf = b"Content-Transfer-Encoding: binary\r\n\r\n\x00\x01\x02\x03\x04\x05\x06\x07\x08".to_vec();
        let cte_range = 28..34;
        let content_offset = 38;
        let content_size = 9;
        let charset = DefaultCharsetService::default();
        let delta;
        {
            let mut cur = CursorMut::new(&mut buf);
            let outcome =
                recode_binary(&mut cur, content_offset, content_size, cte_range.clone(), &charset).unwrap();
            assert_eq!(outcome.content_size, 12);
            delta = outcome.delta;
        }
        assert_eq!(delta, 3);
        assert_eq!(&buf[28..34], b"base64");
        assert_eq!(&buf[content_offset..content_offset + 12], b"AAECAwQFBgcI");
    }

    #[test]
    fn read_only_cursor_never_recodes() {
        use crate::core::cursor::Cursor;
        let buf = b"abcdef".to_vec();
        let charset = DefaultCharsetService::default();
        let mut cur = Cursor::new(&buf);
        assert!(recode_binary(&mut cur, 0, 6, 0..6, &charset).is_none());
    }
}
