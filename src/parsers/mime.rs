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

//! Content scanning shared by leaf parts (§4.7) and multipart preamble /
//! epilogue spans (§4.6): read lines until one matches a boundary
//! currently on the stack, counting lines and migrating the CRLF that
//! immediately precedes a matched boundary onto the boundary's own span
//! (the delimiter owns its leading CRLF it is introduced by).

use crate::core::boundary::{BoundaryMatch, BoundaryStack};
use crate::core::cursor::ByteCursor;

pub struct ScanResult {
    pub content_size: usize,
    pub content_lines: usize,
    pub boundary_size: usize,
    pub boundary_lines: usize,
    pub matched: BoundaryMatch,
}

pub(crate) fn strip_newline(line: &[u8]) -> &[u8] {
    match line.len() {
        0 => line,
        n if line[n - 1] == b'\n' => {
            if n >= 2 && line[n - 2] == b'\r' {
                &line[..n - 2]
            } else {
                &line[..n - 1]
            }
        }
        _ => line,
    }
}

/// Scans from the cursor's current position until a boundary line is
/// found or the buffer is exhausted. Used both for leaf content (§4.7)
/// and for multipart preamble/epilogue spans (§4.6) — the two differ
/// only in how the caller interprets `matched`.
pub fn scan_until_boundary<'x, C: ByteCursor<'x>>(
    cur: &mut C,
    boundaries: &BoundaryStack,
) -> ScanResult {
    let content_start = cur.offset();
    let mut content_lines = 0usize;
    let mut content_end = content_start;

    loop {
        if cur.is_eof() {
            return ScanResult {
                content_size: cur.offset() - content_start,
                content_lines,
                boundary_size: 0,
                boundary_lines: 0,
                matched: BoundaryMatch::None,
            };
        }

        let line_start = cur.offset();
        let line = cur.get_line();
        let trimmed = strip_newline(line);

        if trimmed.starts_with(b"--") {
            match boundaries.matches(trimmed) {
                BoundaryMatch::None => {
                    content_lines += 1;
                    content_end = cur.offset();
                }
                matched => {
                    let line_end = cur.offset();
                    let boundary_start = if content_lines > 0 {
                        if content_end >= 2 && cur.bytes(content_end - 2..content_end) == b"\r\n" {
                            content_end - 2
                        } else {
                            content_end - 1
                        }
                    } else {
                        line_start
                    };
                    return ScanResult {
                        content_size: boundary_start - content_start,
                        content_lines,
                        boundary_size: line_end - boundary_start,
                        boundary_lines: 1,
                        matched,
                    };
                }
            }
        } else {
            content_lines += 1;
            content_end = cur.offset();
        }
    }
}

/// Consumes the CRLF (or bare LF) that separates a just-matched opening
/// boundary line from the headers of the part it introduces. A stray
/// run of trailing whitespace on the boundary line itself (legal per
/// RFC 2046, some MUAs emit `--boundary \r\n`) is also absorbed here.
pub fn skip_crlf<'x, C: ByteCursor<'x>>(cur: &mut C) {
    loop {
        match cur.peek() {
            Some(b'\r') | Some(b' ') | Some(b'\t') => {
                cur.advance(1);
            }
            Some(b'\n') => {
                cur.advance(1);
                break;
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    #[test]
    fn scan_stops_at_boundary_and_migrates_crlf() {
        let data = b"preamble\r\n--X\r\nnext";
        let mut cur = Cursor::new(data);
        let mut stack = BoundaryStack::new(true);
        stack.push(b"X");
        let r = scan_until_boundary(&mut cur, &stack);
        assert_eq!(r.content_size, 8); // "preamble", CRLF migrated out
        assert_eq!(r.content_lines, 1);
        assert_eq!(r.boundary_size, 7); // \r\n + "--X\r\n"
        assert_eq!(r.boundary_lines, 1);
        assert_eq!(r.matched, BoundaryMatch::Opening(0));
    }

    #[test]
    fn scan_with_no_preceding_content_does_not_migrate() {
        let data = b"--X\r\nnext";
        let mut cur = Cursor::new(data);
        let mut stack = BoundaryStack::new(true);
        stack.push(b"X");
        let r = scan_until_boundary(&mut cur, &stack);
        assert_eq!(r.content_size, 0);
        assert_eq!(r.content_lines, 0);
        assert_eq!(r.boundary_size, 5);
    }

    #[test]
    fn scan_runs_to_eof_without_boundary() {
        let data = b"hello\r\nworld\r\n";
        let mut cur = Cursor::new(data);
        let stack = BoundaryStack::new(true);
        let r = scan_until_boundary(&mut cur, &stack);
        assert_eq!(r.matched, BoundaryMatch::None);
        assert_eq!(r.content_lines, 2);
        assert_eq!(r.content_size, data.len());
    }
}
