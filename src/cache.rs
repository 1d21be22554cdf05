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

//! Cache Writer (`SPEC_FULL.md` §4.8): serialises a parsed [`Body`] tree
//! into the ten length-prefixed, 4-byte-padded fields an IMAP index record
//! carries — ENVELOPE, BODYSTRUCTURE, HEADERS, BODY, a binary SECTION
//! TABLE, the four search-form address lists, and the MIME-decoded
//! SUBJECT. None of the wire grammar below is specific to any one IMAP
//! server; it mirrors the parenthesised-list/atom/literal syntax RFC 3501
//! defines for `FETCH (ENVELOPE BODYSTRUCTURE)` responses.

use std::borrow::Cow;

use crate::collab::{CharsetService, Encoding};
use crate::core::address::{Addr, Address};
use crate::core::body::{Body, BodyKind, Envelope};
use crate::core::datetime::DateTime;
use crate::core::param::ParamList;

/// A string is forced to literal form (`{N}\r\n<bytes>`) when it contains
/// any of these bytes, carries a high bit, or is 1024 bytes or longer
/// (§4.8 "String encoding").
fn needs_literal(s: &str) -> bool {
    s.len() >= 1024 || s.bytes().any(|b| b >= 0x80 || matches!(b, b'\r' | b'\n' | b'"' | b'%' | b'\\'))
}

fn write_nil(out: &mut Vec<u8>) {
    out.extend_from_slice(b"NIL");
}

fn write_atom_string(out: &mut Vec<u8>, s: &str) {
    if needs_literal(s) {
        out.extend_from_slice(format!("{{{}}}\r\n", s.len()).as_bytes());
        out.extend_from_slice(s.as_bytes());
    } else {
        out.push(b'"');
        out.extend_from_slice(s.as_bytes());
        out.push(b'"');
    }
}

fn write_opt_string(out: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => write_atom_string(out, s),
        None => write_nil(out),
    }
}

fn write_number(out: &mut Vec<u8>, n: u64) {
    out.extend_from_slice(n.to_string().as_bytes());
}

/// `(name route mailbox domain)`, or `NIL` for a group-start marker with
/// no mailbox at all.
fn write_addr_tuple(out: &mut Vec<u8>, addr: &Addr) {
    out.push(b'(');
    write_opt_string(out, addr.name.as_deref());
    out.push(b' ');
    write_opt_string(out, addr.route.as_deref());
    out.push(b' ');
    write_opt_string(out, addr.mailbox.as_deref());
    out.push(b' ');
    write_opt_string(out, addr.domain.as_deref());
    out.push(b')');
}

/// A full address-list position for ENVELOPE: `NIL` when empty, else a
/// parenthesised list of 4-tuples. Groups flatten to their bracketing
/// start/end markers the way RFC 3501 encodes them over the wire.
fn write_envelope_address(out: &mut Vec<u8>, addr: &Address) {
    if addr.is_empty() {
        write_nil(out);
        return;
    }
    out.push(b'(');
    match addr {
        Address::List(list) => {
            for a in list {
                write_addr_tuple(out, a);
            }
        }
        Address::Group(groups) => {
            for g in groups {
                out.push(b'(');
                write_opt_string(out, g.name.as_deref());
                out.push(b' ');
                write_nil(out);
                write_nil(out);
                write_nil(out);
                out.push(b')');
                for a in &g.addresses {
                    write_addr_tuple(out, a);
                }
                out.push(b'(');
                write_nil(out);
                write_nil(out);
                write_nil(out);
                write_nil(out);
                out.push(b')');
            }
        }
    }
    out.push(b')');
}

/// ENVELOPE: `(date subject from sender reply-to to cc bcc in-reply-to
/// message-id)`, with `sender`/`reply-to` already defaulted to `from` by
/// the recursor when it built the envelope.
fn write_envelope(out: &mut Vec<u8>, env: &Envelope, charset: &dyn CharsetService) {
    out.push(b'(');
    match env.date {
        Some(d) => write_atom_string(out, &d.to_rfc822()),
        None => write_nil(out),
    }
    out.push(b' ');
    write_opt_string(
        out,
        env.subject.as_deref().map(|s| charset.decode_mime_header(s)).as_deref(),
    );
    out.push(b' ');
    write_envelope_address(out, &env.from);
    out.push(b' ');
    write_envelope_address(out, &env.sender);
    out.push(b' ');
    write_envelope_address(out, &env.reply_to);
    out.push(b' ');
    write_envelope_address(out, &env.to);
    out.push(b' ');
    write_envelope_address(out, &env.cc);
    out.push(b' ');
    write_envelope_address(out, &env.bcc);
    out.push(b' ');
    write_opt_string(out, env.in_reply_to.first().map(|s| s.as_ref()));
    out.push(b' ');
    write_opt_string(out, env.message_id.as_deref());
    out.push(b')');
}

/// Search-form address list (§4.8, fields 6-9): `<mailbox@domain>` in
/// lowercase per entry, comma-separated, name kept in its original case;
/// a group round-trips as `display-name: addr1, addr2;`.
fn write_search_address(body: &Address) -> String {
    fn render_addr(a: &Addr, out: &mut String) {
        if !out.is_empty() {
            out.push_str(", ");
        }
        if let Some(name) = &a.name {
            out.push_str(name);
            out.push(' ');
        }
        out.push('<');
        if let Some(m) = &a.mailbox {
            out.push_str(&m.to_lowercase());
        }
        if let Some(d) = &a.domain {
            out.push('@');
            out.push_str(&d.to_lowercase());
        }
        out.push('>');
    }

    let mut out = String::new();
    match body {
        Address::List(list) => {
            for a in list {
                render_addr(a, &mut out);
            }
        }
        Address::Group(groups) => {
            for g in groups {
                if !out.is_empty() {
                    out.push_str(", ");
                }
                if let Some(name) = &g.name {
                    out.push_str(name);
                    out.push(':');
                    out.push(' ');
                }
                let mut inner = String::new();
                for a in &g.addresses {
                    render_addr(a, &mut inner);
                }
                out.push_str(&inner);
                out.push(';');
            }
        }
    }
    out
}

/// `(name (attribute value ...))`, or `NIL` when there is no name at all.
fn write_disposition(out: &mut Vec<u8>, body: &Body) {
    match &body.disposition {
        Some(kind) => {
            out.push(b'(');
            write_atom_string(out, &kind.to_uppercase());
            out.push(b' ');
            write_params(out, body.disposition_params.as_slice().iter());
            out.push(b')');
        }
        None => write_nil(out),
    }
}

fn write_params<'a>(out: &mut Vec<u8>, params: impl Iterator<Item = &'a crate::core::param::Param<'a>>) {
    let params: Vec<_> = params.collect();
    if params.is_empty() {
        write_nil(out);
        return;
    }
    out.push(b'(');
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        write_atom_string(out, &p.attribute.to_uppercase());
        out.push(b' ');
        write_atom_string(out, &p.value);
    }
    out.push(b')');
}

fn write_language(out: &mut Vec<u8>, language: &[Cow<str>]) {
    match language.len() {
        0 => write_nil(out),
        1 => write_atom_string(out, &language[0]),
        _ => {
            out.push(b'(');
            for (i, l) in language.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_atom_string(out, l);
            }
            out.push(b')');
        }
    }
}

/// BODYSTRUCTURE (extended form, §4.8 field 2). Leaves carry
/// `(type subtype (params) id description encoding size [lines]) md5
/// disposition language location`; `TEXT/*` leaves additionally report a
/// line count before `md5`, matching RFC 3501's extended text form.
/// Multipart entities list their children before `subtype (params)
/// disposition language location`. `message/rfc822` additionally nests the
/// inner envelope and body between `encoding`/`size` and the line count.
fn write_bodystructure(out: &mut Vec<u8>, body: &Body, charset: &dyn CharsetService) {
    out.push(b'(');
    match &body.kind {
        BodyKind::Multipart(children) => {
            if children.is_empty() {
                // Zero-part multiparts serialise as a zero-length TEXT/PLAIN.
                write_bodystructure(out, &Body::new_default("TEXT", "PLAIN"), charset);
            } else {
                for child in children {
                    write_bodystructure(out, child, charset);
                }
            }
            out.push(b' ');
            write_atom_string(out, &body.subtype.to_uppercase());
            out.push(b' ');
            write_params(out, body.params.iter());
            out.push(b' ');
            write_disposition(out, body);
            out.push(b' ');
            write_language(out, &body.language);
            out.push(b' ');
            write_opt_string(out, body.location.as_deref());
        }
        BodyKind::Message(inner) => {
            write_atom_string(out, "MESSAGE");
            out.push(b' ');
            write_atom_string(out, "RFC822");
            out.push(b' ');
            write_params(out, body.params.iter());
            out.push(b' ');
            write_opt_string(out, body.id.as_deref());
            out.push(b' ');
            write_opt_string(out, body.description.as_deref());
            out.push(b' ');
            write_atom_string(out, body.encoding.as_deref().unwrap_or("7BIT"));
            out.push(b' ');
            write_number(out, body.content_size as u64);
            out.push(b' ');
            if let Some(env) = &inner.envelope {
                write_envelope(out, env, charset);
            } else {
                write_nil(out);
            }
            out.push(b' ');
            write_bodystructure(out, inner, charset);
            out.push(b' ');
            write_number(out, body.content_lines as u64);
            out.push(b' ');
            write_opt_string(out, body.md5.as_deref());
            out.push(b' ');
            write_disposition(out, body);
            out.push(b' ');
            write_language(out, &body.language);
            out.push(b' ');
            write_opt_string(out, body.location.as_deref());
        }
        BodyKind::Leaf => {
            let is_text = body.ctype.eq_ignore_ascii_case("text");
            write_atom_string(out, &body.ctype.to_uppercase());
            out.push(b' ');
            write_atom_string(out, &body.subtype.to_uppercase());
            out.push(b' ');
            write_params(out, body.params.iter());
            out.push(b' ');
            write_opt_string(out, body.id.as_deref());
            out.push(b' ');
            write_opt_string(out, body.description.as_deref());
            out.push(b' ');
            write_atom_string(out, body.encoding.as_deref().unwrap_or("7BIT"));
            out.push(b' ');
            write_number(out, body.content_size as u64);
            if is_text {
                out.push(b' ');
                write_number(out, body.content_lines as u64);
            }
            out.push(b' ');
            write_opt_string(out, body.md5.as_deref());
            out.push(b' ');
            write_disposition(out, body);
            out.push(b' ');
            write_language(out, &body.language);
            out.push(b' ');
            write_opt_string(out, body.location.as_deref());
        }
    }
    out.push(b')');
}

/// BODY (non-extended form, §4.8 field 4): identical to BODYSTRUCTURE but
/// without `disposition`/`language`/`location` on any node.
fn write_body_nonextended(out: &mut Vec<u8>, body: &Body, charset: &dyn CharsetService) {
    out.push(b'(');
    match &body.kind {
        BodyKind::Multipart(children) => {
            if children.is_empty() {
                write_body_nonextended(out, &Body::new_default("TEXT", "PLAIN"), charset);
            } else {
                for child in children {
                    write_body_nonextended(out, child, charset);
                }
            }
            out.push(b' ');
            write_atom_string(out, &body.subtype.to_uppercase());
        }
        BodyKind::Message(inner) => {
            write_atom_string(out, "MESSAGE");
            out.push(b' ');
            write_atom_string(out, "RFC822");
            out.push(b' ');
            write_params(out, body.params.iter());
            out.push(b' ');
            write_opt_string(out, body.id.as_deref());
            out.push(b' ');
            write_opt_string(out, body.description.as_deref());
            out.push(b' ');
            write_atom_string(out, body.encoding.as_deref().unwrap_or("7BIT"));
            out.push(b' ');
            write_number(out, body.content_size as u64);
            out.push(b' ');
            if let Some(env) = &inner.envelope {
                write_envelope(out, env, charset);
            } else {
                write_nil(out);
            }
            out.push(b' ');
            write_body_nonextended(out, inner, charset);
            out.push(b' ');
            write_number(out, body.content_lines as u64);
        }
        BodyKind::Leaf => {
            let is_text = body.ctype.eq_ignore_ascii_case("text");
            write_atom_string(out, &body.ctype.to_uppercase());
            out.push(b' ');
            write_atom_string(out, &body.subtype.to_uppercase());
            out.push(b' ');
            write_params(out, body.params.iter());
            out.push(b' ');
            write_opt_string(out, body.id.as_deref());
            out.push(b' ');
            write_opt_string(out, body.description.as_deref());
            out.push(b' ');
            write_atom_string(out, body.encoding.as_deref().unwrap_or("7BIT"));
            out.push(b' ');
            write_number(out, body.content_size as u64);
            if is_text {
                out.push(b' ');
                write_number(out, body.content_lines as u64);
            }
        }
    }
    out.push(b')');
}

/// SECTION TABLE (§4.8 field 5): binary, big-endian 32-bit words. Each
/// node emits `n = numparts + 1` followed by one 5-word tuple per part —
/// part 0 is the node's own span (the synthetic wrapper text for a
/// `MESSAGE/RFC822`, or a zero/`-1` sentinel row for a plain multipart) —
/// then recurses depth-first into each child.
fn write_section_table(out: &mut Vec<u8>, body: &Body, charset: &dyn CharsetService) {
    fn push_word(out: &mut Vec<u8>, w: u32) {
        out.extend_from_slice(&w.to_be_bytes());
    }

    fn charset_encoding_word(body: &Body, charset: &dyn CharsetService) -> u32 {
        let charset_id = body
            .charset()
            .and_then(|c| charset.lookup(c))
            .map(|c| c.0)
            .unwrap_or(crate::collab::CharsetId::UNKNOWN.0);
        let encoding = Encoding::from_token(body.encoding.as_deref().unwrap_or("7BIT")) as u32;
        ((charset_id as u32) << 16) | encoding
    }

    fn push_part_row(out: &mut Vec<u8>, body: &Body, charset: &dyn CharsetService) {
        push_word(out, body.header_offset as u32);
        push_word(out, body.header_size as u32);
        push_word(out, body.content_offset as u32);
        push_word(out, body.content_size as u32);
        push_word(out, charset_encoding_word(body, charset));
    }

    match &body.kind {
        BodyKind::Leaf => {
            push_word(out, 0);
        }
        BodyKind::Message(inner) => {
            push_word(out, 2);
            push_part_row(out, body, charset);
            push_part_row(out, inner, charset);
            write_section_table(out, inner, charset);
        }
        BodyKind::Multipart(children) => {
            push_word(out, children.len() as u32 + 1);
            // Synthetic part 0: sentinel row for a plain multipart's own
            // (non-existent) text.
            push_word(out, 0);
            push_word(out, 0);
            push_word(out, 0);
            push_word(out, 0);
            push_word(out, u32::MAX);
            for child in children {
                push_part_row(out, child, charset);
            }
            for child in children {
                write_section_table(out, child, charset);
            }
        }
    }
}

/// One length-prefixed, 4-byte-padded cache field: a big-endian `u32`
/// byte length followed by the bytes, zero-padded up to the next 4-byte
/// boundary.
fn write_framed_field(record: &mut Vec<u8>, bytes: &[u8]) {
    record.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    record.extend_from_slice(bytes);
    let pad = (4 - (bytes.len() % 4)) % 4;
    record.extend(std::iter::repeat(0u8).take(pad));
}

/// Serialises the ten cache fields (§4.8) for the root `Body` of a parsed
/// message into one contiguous byte sequence.
pub fn build_cache_record(root: &Body, charset: &dyn CharsetService) -> Vec<u8> {
    let mut record = Vec::new();

    let mut envelope_bytes = Vec::new();
    if let Some(env) = &root.envelope {
        write_envelope(&mut envelope_bytes, env, charset);
    } else {
        write_nil(&mut envelope_bytes);
    }
    write_framed_field(&mut record, &envelope_bytes);

    let mut bodystructure_bytes = Vec::new();
    write_bodystructure(&mut bodystructure_bytes, root, charset);
    write_framed_field(&mut record, &bodystructure_bytes);

    write_framed_field(&mut record, &root.cache_headers);

    let mut body_bytes = Vec::new();
    write_body_nonextended(&mut body_bytes, root, charset);
    write_framed_field(&mut record, &body_bytes);

    let mut section_bytes = Vec::new();
    write_section_table(&mut section_bytes, root, charset);
    write_framed_field(&mut record, &section_bytes);

    let empty = Address::List(Vec::new());
    let (from, to, cc, bcc) = match root.envelope.as_deref() {
        Some(e) => (&e.from, &e.to, &e.cc, &e.bcc),
        None => (&empty, &empty, &empty, &empty),
    };
    write_framed_field(&mut record, write_search_address(from).as_bytes());
    write_framed_field(&mut record, write_search_address(to).as_bytes());
    write_framed_field(&mut record, write_search_address(cc).as_bytes());
    write_framed_field(&mut record, write_search_address(bcc).as_bytes());

    let subject = root
        .envelope
        .as_deref()
        .and_then(|e| e.subject.as_deref())
        .map(|s| charset.decode_mime_header(s))
        .unwrap_or_default();
    write_framed_field(&mut record, subject.as_bytes());

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::support::{DefaultAddressParser, DefaultCharsetService};
    use crate::collab::AddressParserService;
    use crate::config::Config;
    use crate::core::cursor::Cursor;
    use crate::core::boundary::BoundaryStack;
    use crate::parsers::recursor::{parse_body_part, Collaborators};
    use crate::collab::support::DefaultDigestService;

    fn parse<'x>(data: &'x [u8], charset: &DefaultCharsetService) -> Body<'x> {
        let mut cur = Cursor::new(data);
        let mut boundaries = BoundaryStack::new(true);
        let cfg = Config::new();
        let address = DefaultAddressParser;
        let digest = DefaultDigestService;
        let collab = Collaborators {
            charset,
            address: &address,
            digest: &digest,
        };
        let mut warnings = Vec::new();
        let mut warned = false;
        parse_body_part(&mut cur, &mut boundaries, 0, &cfg, &collab, &mut warnings, &mut warned).0
    }

    #[test]
    fn needs_literal_flags_forbidden_bytes_and_length() {
        assert!(!needs_literal("hello"));
        assert!(needs_literal("has\"quote"));
        assert!(needs_literal(&"x".repeat(1024)));
    }

    #[test]
    fn simple_text_message_matches_scenario_shape() {
        let data = b"From: a@b\r\nSubject: hi\r\nContent-Type: text/plain; charset=us-ascii\r\n\r\nfoo\r\n";
        let charset = DefaultCharsetService::default();
        let body = parse(data, &charset);
        let mut out = Vec::new();
        write_bodystructure(&mut out, &body, &charset);
        let s = String::from_utf8(out).unwrap();
        assert!(s.starts_with("(\"TEXT\" \"PLAIN\""));
        assert!(s.contains("\"CHARSET\" \"us-ascii\""));
        assert!(s.contains("\"7BIT\""));
    }

    #[test]
    fn search_address_lowercases_mailbox_and_domain() {
        let address = DefaultAddressParser.parse_addr_list("Art <Art@Vandelay.COM>");
        let rendered = write_search_address(&address);
        assert_eq!(rendered, "Art <art@vandelay.com>");
    }

    #[test]
    fn framed_field_pads_to_four_bytes() {
        let mut record = Vec::new();
        write_framed_field(&mut record, b"abc");
        assert_eq!(&record[0..4], &3u32.to_be_bytes());
        assert_eq!(&record[4..7], b"abc");
        assert_eq!(&record[7..8], &[0]);
    }

    #[test]
    fn cache_record_contains_ten_framed_fields() {
        let data = b"From: a@b\r\nSubject: hi\r\nContent-Type: text/plain\r\n\r\nfoo\r\n";
        let charset = DefaultCharsetService::default();
        let body = parse(data, &charset);
        let record = build_cache_record(&body, &charset);
        let mut pos = 0;
        let mut count = 0;
        while pos < record.len() {
            let len = u32::from_be_bytes(record[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4 + len + (4 - len % 4) % 4;
            count += 1;
        }
        assert_eq!(count, 10);
    }
}
