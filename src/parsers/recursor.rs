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

//! Body-Part Recursor (`SPEC_FULL.md` §4.5-§4.7): turns a header block plus
//! a content scan into one [`Body`] node, recursing into `multipart/*` and
//! `message/*` children and propagating whichever boundary line ended a
//! child's content back up to whichever ancestor owns it.

use std::borrow::Cow;

use crate::collab::{CharsetService, DigestService, Encoding};
use crate::config::{Config, GuidMode};
use crate::core::body::{Body, BodyKind, Guid};
use crate::core::boundary::{BoundaryMatch, BoundaryStack};
use crate::core::cursor::ByteCursor;
use crate::error::ParseWarning;
use crate::parsers::binary_recode::recode_binary;
use crate::parsers::header::{parse_headers, HeaderBlock};
use crate::parsers::mime::{scan_until_boundary, skip_crlf};

/// How a body part's content span ended, handed back to whichever caller
/// pushed the boundary (or is scanning a preamble/epilogue span) so it
/// knows whether the boundary it just consumed belongs to it.
#[derive(Debug, PartialEq, Eq)]
pub enum RecurseExit {
    /// Ran to end of buffer with no boundary in sight.
    Eof,
    /// Stopped on a boundary line; `depth` is the stack index it matched,
    /// so a caller at a shallower depth knows the line wasn't meant for it
    /// and must stop likewise without consuming anything further.
    HitBoundary(BoundaryMatch),
}

pub struct Collaborators<'a> {
    pub charset: &'a dyn CharsetService,
    pub address: &'a dyn crate::collab::AddressParserService,
    pub digest: &'a dyn DigestService,
}

/// Parses one body part (and, recursively, any children) starting at the
/// cursor's current offset. `depth` is this part's position in
/// `boundaries` *before* any boundary of its own is pushed — i.e. the
/// depth at which a sibling boundary line terminates this part's content.
pub fn parse_body_part<'x, C: ByteCursor<'x>>(
    cur: &mut C,
    boundaries: &mut BoundaryStack,
    depth: usize,
    cfg: &Config,
    collab: &Collaborators,
    warnings: &mut Vec<ParseWarning>,
    nesting_warned: &mut bool,
) -> (Body<'x>, RecurseExit) {
    let header_offset = cur.offset();
    let header_block = parse_headers(cur, boundaries, cfg);
    warnings.extend(header_block.warnings.iter().cloned());

    let mut body = body_from_header_block(&header_block, header_offset, collab);

    if let Some((boundary_len, m)) = header_block.saw_boundary {
        // Malformed input: a boundary line stood in for the blank
        // separator. There is no content at all; the boundary itself
        // becomes this part's trailing delimiter.
        body.content_offset = header_block.header_end;
        body.content_size = 0;
        body.content_lines = 0;
        body.boundary_size = boundary_len;
        body.boundary_lines = 1;
        return (body, RecurseExit::HitBoundary(m));
    }

    body.content_offset = cur.offset();

    let ctype_is_multipart = body.ctype.eq_ignore_ascii_case("multipart");
    let ctype_is_message = body.ctype.eq_ignore_ascii_case("message")
        && (body.subtype.eq_ignore_ascii_case("rfc822") || body.subtype.eq_ignore_ascii_case("global"));

    if ctype_is_multipart {
        if let Some(boundary_value) = body.boundary().map(str::to_string) {
            return parse_multipart(
                cur,
                boundaries,
                depth,
                &boundary_value,
                body,
                cfg,
                collab,
                warnings,
                nesting_warned,
            );
        }
        // No boundary parameter: degrades to an opaque leaf, per §4.6.
    } else if ctype_is_message {
        if depth < cfg.boundary_nesting_limit as usize {
            let (child, exit) =
                parse_body_part(cur, boundaries, depth, cfg, collab, warnings, nesting_warned);
            body.content_size = child.header_size + child.content_size + child.boundary_size;
            body.content_lines = child.header_lines + child.content_lines + child.boundary_lines;
            body.kind = BodyKind::Message(Box::new(child));
            apply_guid(&mut body, cur, collab, cfg);
            return (body, exit);
        } else {
            warn_nesting_limit_once(nesting_warned, warnings, cfg, depth as u32);
        }
    }

    let scan = scan_until_boundary(cur, boundaries);
    body.content_size = scan.content_size;
    body.content_lines = scan.content_lines;
    body.boundary_size = scan.boundary_size;
    body.boundary_lines = scan.boundary_lines;

    maybe_recode_binary(&mut body, cur, &header_block, collab);
    apply_guid(&mut body, cur, collab, cfg);

    let exit = match scan.matched {
        BoundaryMatch::None => RecurseExit::Eof,
        m => RecurseExit::HitBoundary(m),
    };
    (body, exit)
}

/// Parses a `multipart/*` entity: pushes its own boundary, scans the
/// preamble, loops over children while the stack stays at least as deep
/// as this part's own boundary, then scans the epilogue if a boundary
/// closed exactly at this depth.
#[allow(clippy::too_many_arguments)]
fn parse_multipart<'x, C: ByteCursor<'x>>(
    cur: &mut C,
    boundaries: &mut BoundaryStack,
    depth: usize,
    boundary_value: &str,
    mut body: Body<'x>,
    cfg: &Config,
    collab: &Collaborators,
    warnings: &mut Vec<ParseWarning>,
    nesting_warned: &mut bool,
) -> (Body<'x>, RecurseExit) {
    if depth >= cfg.boundary_nesting_limit as usize {
        warn_nesting_limit_once(nesting_warned, warnings, cfg, depth as u32);
        let scan = scan_until_boundary(cur, boundaries);
        body.content_size = scan.content_size;
        body.content_lines = scan.content_lines;
        body.boundary_size = scan.boundary_size;
        body.boundary_lines = scan.boundary_lines;
        let exit = match scan.matched {
            BoundaryMatch::None => RecurseExit::Eof,
            m => RecurseExit::HitBoundary(m),
        };
        return (body, exit);
    }

    let my_index = boundaries.push(boundary_value.as_bytes());

    let preamble = scan_until_boundary(cur, boundaries);
    let mut total_size = preamble.content_size;
    let mut total_lines = preamble.content_lines;
    let mut children = Vec::new();

    let mut exit_for_parent = RecurseExit::Eof;
    let mut ended_at_own_depth = false;

    match preamble.matched {
        BoundaryMatch::None => {
            // Ran off the end of the buffer without ever seeing the
            // opening delimiter: this multipart has no children at all.
            boundaries.truncate(my_index);
            body.content_size = total_size;
            body.content_lines = total_lines;
            body.kind = BodyKind::Multipart(children);
            return (body, RecurseExit::Eof);
        }
        BoundaryMatch::Closing(i) if i == my_index => {
            total_size += preamble.boundary_size;
            total_lines += preamble.boundary_lines;
            ended_at_own_depth = true;
        }
        BoundaryMatch::Opening(i) if i == my_index => {
            total_size += preamble.boundary_size;
            total_lines += preamble.boundary_lines;
            skip_crlf(cur);

            loop {
                let child_depth = boundaries.depth();
                let (child, child_exit) =
                    parse_body_part(cur, boundaries, child_depth, cfg, collab, warnings, nesting_warned);
                total_size += child.header_size + child.content_size + child.boundary_size;
                total_lines += child.header_lines + child.content_lines + child.boundary_lines;
                children.push(child);

                match child_exit {
                    RecurseExit::Eof => {
                        // No closing delimiter anywhere: this multipart's
                        // scope (and everything nested under it) ends here.
                        boundaries.truncate(0);
                        body.content_size = total_size;
                        body.content_lines = total_lines;
                        body.kind = BodyKind::Multipart(children);
                        return (body, RecurseExit::Eof);
                    }
                    RecurseExit::HitBoundary(BoundaryMatch::Opening(i)) if i == my_index => {
                        skip_crlf(cur);
                        continue;
                    }
                    RecurseExit::HitBoundary(BoundaryMatch::Closing(i)) if i == my_index => {
                        ended_at_own_depth = true;
                        break;
                    }
                    RecurseExit::HitBoundary(m) => {
                        // An ancestor's boundary fired instead of ours:
                        // this multipart closes implicitly, and the
                        // last child already paid for the delimiter's
                        // bytes, so they are not double counted here.
                        boundaries.truncate(my_index);
                        body.content_size = total_size;
                        body.content_lines = total_lines;
                        body.kind = BodyKind::Multipart(children);
                        return (body, RecurseExit::HitBoundary(m));
                    }
                }
            }
        }
        BoundaryMatch::Opening(_) | BoundaryMatch::Closing(_) => {
            // An ancestor's boundary fired before this multipart's own
            // opening delimiter ever appeared: it never actually got any
            // content of its own, and the ancestor's line is left for
            // that ancestor to consume via the returned exit.
            boundaries.truncate(my_index);
            body.content_size = total_size;
            body.content_lines = total_lines;
            body.kind = BodyKind::Multipart(children);
            return (body, RecurseExit::HitBoundary(preamble.matched));
        }
    }

    boundaries.truncate(my_index);

    if ended_at_own_depth {
        let epilogue = scan_until_boundary(cur, boundaries);
        total_size += epilogue.content_size;
        total_lines += epilogue.content_lines;
        match epilogue.matched {
            BoundaryMatch::None => exit_for_parent = RecurseExit::Eof,
            m => {
                total_size += epilogue.boundary_size;
                total_lines += epilogue.boundary_lines;
                exit_for_parent = RecurseExit::HitBoundary(m);
            }
        }
    }

    body.content_size = total_size;
    body.content_lines = total_lines;
    body.kind = BodyKind::Multipart(children);
    (body, exit_for_parent)
}

fn warn_nesting_limit_once(
    nesting_warned: &mut bool,
    warnings: &mut Vec<ParseWarning>,
    cfg: &Config,
    depth: u32,
) {
    if !*nesting_warned {
        tracing::warn!(limit = cfg.boundary_nesting_limit, depth, "boundary nesting limit exceeded");
        warnings.push(ParseWarning::BoundaryNestingLimitExceeded {
            limit: cfg.boundary_nesting_limit,
            depth,
        });
        *nesting_warned = true;
    }
}

/// Builds the ENVELOPE-shaping fields from a header block: every entity
/// has its own header set, and so its own envelope, though only the root
/// and any `message/rfc822` children normally have callers read it.
/// `sender`/`reply_to` default to `from` when the corresponding header
/// was absent, per §4.8.
fn envelope_from_header_block<'x>(
    block: &HeaderBlock<'x>,
    collab: &Collaborators,
) -> crate::core::body::Envelope<'x> {
    let from = block
        .from
        .as_deref()
        .map(|s| collab.address.parse_addr_list(s))
        .unwrap_or_default();
    let sender = block
        .sender
        .as_deref()
        .map(|s| collab.address.parse_addr_list(s))
        .unwrap_or_else(|| from.clone());
    let reply_to = block
        .reply_to
        .as_deref()
        .map(|s| collab.address.parse_addr_list(s))
        .unwrap_or_else(|| from.clone());
    let to = block
        .to
        .as_deref()
        .map(|s| collab.address.parse_addr_list(s))
        .unwrap_or_default();
    let cc = block
        .cc
        .as_deref()
        .map(|s| collab.address.parse_addr_list(s))
        .unwrap_or_default();
    let bcc = block
        .bcc
        .as_deref()
        .map(|s| collab.address.parse_addr_list(s))
        .unwrap_or_default();

    crate::core::body::Envelope {
        date: block.date,
        subject: block.subject.clone(),
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to: block.in_reply_to.clone(),
        message_id: block.message_id.clone(),
        references: block.references.clone(),
        received_date: block.received_date,
    }
}

/// Builds the structural (non-content) fields of a `Body` from a parsed
/// header block: type/subtype defaulting (invariant 3), params, and the
/// header-span bookkeeping the recursor does not touch again.
fn body_from_header_block<'x>(
    block: &HeaderBlock<'x>,
    header_offset: usize,
    collab: &Collaborators,
) -> Body<'x> {
    let (ctype, subtype, params) = match &block.content_type {
        Some(ct) => (
            ct.c_type.clone(),
            ct.c_subtype.clone().unwrap_or(Cow::Borrowed("")),
            ct.params.clone(),
        ),
        None => (Cow::Borrowed("TEXT"), Cow::Borrowed("PLAIN"), Vec::new()),
    };

    let (disposition, disposition_params) = match &block.disposition {
        Some(d) => (Some(d.c_type.clone()), d.params.clone()),
        None => (None, Vec::new()),
    };

    let encoding = block.cte.as_ref().map(|c| c.token.clone());

    Body {
        ctype,
        subtype,
        params,
        disposition,
        disposition_params,
        language: block.language.clone(),
        location: block.location.clone(),
        id: block.id.clone(),
        description: block.description.clone(),
        encoding,
        md5: block.md5.clone(),
        header_offset,
        header_size: block.header_end - header_offset,
        header_lines: block.header_lines,
        content_offset: 0,
        content_size: 0,
        content_lines: 0,
        boundary_size: 0,
        boundary_lines: 0,
        kind: BodyKind::Leaf,
        envelope: Some(Box::new(envelope_from_header_block(block, collab))),
        cache_headers: block.cache_headers.clone(),
        guid: None,
        decoded_body: None,
    }
}

/// If this leaf's `Content-Transfer-Encoding` was `BINARY` and the cursor
/// is mutating, rewrites it to base64 in place and updates the affected
/// `Body` fields. A no-op on a read-only cursor or any other encoding.
fn maybe_recode_binary<'x, C: ByteCursor<'x>>(
    body: &mut Body<'x>,
    cur: &mut C,
    header_block: &HeaderBlock<'x>,
    collab: &Collaborators,
) {
    let cte = match &header_block.cte {
        Some(c) if Encoding::from_token(&c.token) == Encoding::Binary => c,
        _ => return,
    };
    if let Some(outcome) = recode_binary(
        cur,
        body.content_offset,
        body.content_size,
        cte.range.clone(),
        collab.charset,
    ) {
        body.content_size = outcome.content_size;
        body.content_lines = outcome.content_lines;
        body.encoding = Some(Cow::Borrowed("BASE64"));
    }
}

fn apply_guid<'x, C: ByteCursor<'x>>(
    body: &mut Body<'x>,
    cur: &C,
    collab: &Collaborators,
    cfg: &Config,
) {
    if cfg.guid_mode != GuidMode::Enabled {
        return;
    }
    if body.content_size == 0 {
        body.guid = Some(Guid(Vec::new()));
        return;
    }
    let bytes = cur.bytes(body.content_offset..body.content_offset + body.content_size);
    body.guid = Some(collab.digest.digest(bytes));
}
