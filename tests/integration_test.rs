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

use mime_cache::collab::support::{DefaultAddressParser, DefaultCharsetService, DefaultDigestService};
use mime_cache::config::Config;
use mime_cache::{build_cache_record, parse, parse_encode, Body, BodyKind, Collaborators};

fn default_collab() -> (DefaultCharsetService, DefaultAddressParser, DefaultDigestService) {
    (
        DefaultCharsetService::default(),
        DefaultAddressParser,
        DefaultDigestService,
    )
}

fn collaborators<'a>(
    charset: &'a DefaultCharsetService,
    address: &'a DefaultAddressParser,
    digest: &'a DefaultDigestService,
) -> Collaborators<'a> {
    Collaborators {
        charset,
        address,
        digest,
    }
}

// S1: minimal text message.
#[test]
fn s1_minimal_text_message() {
    let data = b"From: a@b\r\nSubject: hi\r\n\r\nhello\r\n";
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();

    let message = parse(data, &cfg, &collab);
    assert_eq!(message.root.ctype, "TEXT");
    assert_eq!(message.root.subtype, "PLAIN");
    assert_eq!(message.root.content_size, 7);
    assert_eq!(message.root.content_lines, 1);

    let envelope = message.root.envelope.as_deref().unwrap();
    assert_eq!(envelope.subject.as_deref(), Some("hi"));
    let from = envelope.from.first().unwrap();
    assert_eq!(from.mailbox.as_deref(), Some("a"));
    assert_eq!(from.domain.as_deref(), Some("b"));
    // sender/reply-to default to from when absent.
    assert_eq!(envelope.sender.first().unwrap().mailbox.as_deref(), Some("a"));
    assert_eq!(envelope.reply_to.first().unwrap().mailbox.as_deref(), Some("a"));

    let record = build_cache_record(&message.root, &charset);
    // Ten framed fields, each a 4-byte big-endian length plus padded bytes.
    let mut pos = 0;
    let mut count = 0;
    while pos < record.len() {
        let len = u32::from_be_bytes(record[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4 + len + (4 - len % 4) % 4;
        count += 1;
    }
    assert_eq!(count, 10);
}

// S2: simple multipart with a preamble and two one-line children.
#[test]
fn s2_simple_multipart() {
    let data = concat!(
        "Content-Type: multipart/mixed; boundary=X\r\n\r\n",
        "preamble\r\n",
        "--X\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "A\r\n",
        "--X\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "B\r\n",
        "--X--\r\n"
    );
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();

    let message = parse(data.as_bytes(), &cfg, &collab);
    assert!(message.root.is_multipart());
    let children = message.root.children();
    assert_eq!(children.len(), 2);
    for child in children {
        assert_eq!(child.content_size, 3); // "A\r\n" / "B\r\n"
        assert_eq!(child.content_lines, 1);
    }
}

// S3: binary content is recoded to base64 only under parse_encode.
#[test]
fn s3_binary_reencoding() {
    let mut data =
        b"Content-Type: application/octet-stream\r\nContent-Transfer-Encoding: binary\r\n\r\n\x00\x01\x02\x03\x04\x05\x06\x07\x08"
            .to_vec();
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();

    let message = parse_encode(&mut data, &cfg, &collab);
    assert_eq!(message.root.encoding.as_deref(), Some("BASE64"));
    assert_eq!(message.root.content_size, 12);
    assert!(message.raw.windows(6).any(|w| w == b"base64"));
    assert!(message.raw.windows(12).any(|w| w == b"AAECAwQFBgcI"));
}

// S4: RFC 2231 continuations fold into one attribute, kept percent-encoded.
#[test]
fn s4_rfc2231_continuation() {
    let data = b"Content-Type: a/b; x*0*=us-ascii''hello%20; x*1=world\r\n\r\nbody\r\n";
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();

    let message = parse(data, &cfg, &collab);
    let param = message.root.params.iter().find(|p| p.attribute == "X*").unwrap();
    assert_eq!(param.value, "us-ascii''hello%20world");
    // Invariant 5: no folded attribute keeps a numeric *N/*N* suffix; only
    // the encoded-continuation marker ("X*") survives.
    assert!(!message.root.params.iter().any(|p| p.attribute.chars().any(|c| c.is_ascii_digit())));
}

// S5: substring boundary matching differs between strict and lax mode.
#[test]
fn s5_substring_boundary_modes() {
    let data = concat!(
        "Content-Type: multipart/mixed; boundary=AA\r\n\r\n",
        "--AAB\r\n",
        "Content-Type: text/plain\r\n\r\nx\r\n",
        "--AA--\r\n"
    );
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);

    let lax_cfg = Config::new().rfc2046_strict(false);
    let lax = parse(data.as_bytes(), &lax_cfg, &collab);
    assert!(lax.root.is_multipart());
    assert_eq!(lax.root.children().len(), 1, "lax mode treats --AAB as opening boundary AA");

    let strict_cfg = Config::new().rfc2046_strict(true);
    let strict = parse(data.as_bytes(), &strict_cfg, &collab);
    assert!(strict.root.is_multipart());
    // In strict mode "--AAB" is not a legal continuation of "AA" (the next
    // byte must be whitespace or "--"), so it is never recognised as a
    // delimiter and the whole rest of the message becomes unterminated
    // content with no children.
    assert_eq!(strict.root.children().len(), 0);
}

// S6: two/three-digit year resolution and an unparseable year rejection.
#[test]
fn s6_date_extremes() {
    let data_2000 = b"From: a@b\r\nDate: Sat, 1 Jan 00 12:00:00 +0000\r\n\r\nx\r\n";
    let data_1985 = b"From: a@b\r\nDate: Sat, 1 Jan 85 12:00:00 -0500\r\n\r\nx\r\n";
    let data_bad = b"From: a@b\r\nDate: Sat, 1 Jan 12345 12:00:00 GMT\r\n\r\nx\r\n";

    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();

    let m2000 = parse(data_2000, &cfg, &collab);
    assert_eq!(m2000.root.envelope.as_deref().unwrap().date.unwrap().year, 2000);

    let m1985 = parse(data_1985, &cfg, &collab);
    let dt = m1985.root.envelope.as_deref().unwrap().date.unwrap();
    assert_eq!(dt.year, 1985);
    assert_eq!(dt.tz_hour, 5);
    assert!(dt.tz_before_gmt);

    let mbad = parse(data_bad, &cfg, &collab);
    assert!(mbad.root.envelope.as_deref().unwrap().date.is_none());
}

// Testable property 1: offset closure.
#[test]
fn property_offset_closure() {
    let data = concat!(
        "Content-Type: multipart/mixed; boundary=X\r\n\r\n",
        "--X\r\nContent-Type: text/plain\r\n\r\none\r\n",
        "--X\r\nContent-Type: message/rfc822\r\n\r\n",
        "From: x@y\r\nSubject: inner\r\n\r\ninner body\r\n",
        "--X--\r\n"
    );
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();
    let message = parse(data.as_bytes(), &cfg, &collab);

    fn check_closure(body: &Body, msg_len: usize) {
        assert_eq!(body.content_offset, body.header_offset + body.header_size);
        assert!(body.content_offset + body.content_size <= msg_len);
        match &body.kind {
            BodyKind::Multipart(children) => children.iter().for_each(|c| check_closure(c, msg_len)),
            BodyKind::Message(inner) => check_closure(inner, msg_len),
            BodyKind::Leaf => {}
        }
    }
    check_closure(&message.root, message.raw.len());
}

// Testable property 2: a multipart's children never overrun the parent's
// own content span.
#[test]
fn property_size_additivity() {
    let data = concat!(
        "Content-Type: multipart/mixed; boundary=X\r\n\r\n",
        "preamble\r\n",
        "--X\r\nContent-Type: text/plain\r\n\r\none\r\n",
        "--X\r\nContent-Type: text/plain\r\n\r\ntwo\r\n",
        "--X--\r\n",
        "epilogue\r\n"
    );
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();
    let message = parse(data.as_bytes(), &cfg, &collab);

    let children_total: usize = message
        .root
        .children()
        .iter()
        .map(|c| c.header_size + c.content_size + c.boundary_size)
        .sum();
    assert!(message.root.content_size >= children_total);
}

// Testable property 4: round-trip byte fidelity for a non-binary leaf.
#[test]
fn property_round_trip_byte_fidelity() {
    let data = b"Content-Type: text/plain\r\n\r\nexact bytes here\r\n";
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();
    let message = parse(data, &cfg, &collab);
    let start = message.root.content_offset;
    let end = start + message.root.content_size;
    assert_eq!(&message.raw[start..end], &data[start..end]);
}

// Testable property 6: search-form address canonicalisation (exercised
// through the cache writer, since that's the only place this crate
// renders the search form).
#[test]
fn property_search_address_canonicalisation() {
    let data = b"From: Art Vandelay <Art@Vandelay.COM>\r\nSubject: x\r\n\r\nbody\r\n";
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();
    let message = parse(data, &cfg, &collab);
    let record = build_cache_record(&message.root, &charset);

    // The FROM search-form field is the 6th of the ten framed fields.
    let mut pos = 0;
    let mut field = Vec::new();
    for _ in 0..6 {
        let len = u32::from_be_bytes(record[pos..pos + 4].try_into().unwrap()) as usize;
        field = record[pos + 4..pos + 4 + len].to_vec();
        pos += 4 + len + (4 - len % 4) % 4;
    }
    let rendered = String::from_utf8(field).unwrap();
    assert_eq!(rendered, "Art Vandelay <art@vandelay.com>");
}

// Testable property 7: RFC 2231 promotion merges a plain continuation with
// an encoded one into a single value under the `*`-marked attribute name.
#[test]
fn property_rfc2231_promotion() {
    let data = b"Content-Type: a/b; a*0=simple; a*1*=us-ascii''percent%20\r\n\r\nbody\r\n";
    let (charset, address, digest) = default_collab();
    let collab = collaborators(&charset, &address, &digest);
    let cfg = Config::new();
    let message = parse(data, &cfg, &collab);
    let param = message.root.params.iter().find(|p| p.attribute == "A*").unwrap();
    assert_eq!(param.value, "simpleus-ascii''percent%20");
}
