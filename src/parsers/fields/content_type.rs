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

//! `Content-Type` / `Content-Disposition` field parser and RFC 2231
//! parameter folder. Continuations are concatenated here, but left
//! percent-encoded with any `charset'lang'` prefix intact; decoding
//! that into text is the caller's [`crate::collab::CharsetService`]
//! job. A merged attribute that had at least one percent-encoded
//! segment is renamed `name*`, matching invariant 5 (no folded
//! attribute keeps its numeric `*N`/`*N*` suffix).

use std::borrow::Cow;

use crate::core::cursor::ByteCursor;
use crate::core::param::Param;
use crate::decoders::hex::decode_hex;
use crate::error::ParseWarning;

#[derive(Clone, Copy, PartialEq, Debug)]
enum State {
    Type,
    SubType,
    AttributeName,
    AttributeValue,
    AttributeQuotedValue,
    Comment,
}

/// `(attribute, position, raw value)` awaiting merge, in parse order.
type Continuation = (String, u32, String);

pub struct ParsedContentType<'x> {
    pub c_type: Cow<'x, str>,
    pub c_subtype: Option<Cow<'x, str>>,
    pub params: Vec<Param<'x>>,
    pub warning: Option<ParseWarning>,
}

struct Folder {
    state: State,
    state_stack: Vec<State>,

    c_type: Option<String>,
    c_subtype: Option<String>,

    attr_name: Option<String>,
    attr_position: u32,

    values: Vec<String>,
    attributes: Vec<(String, String)>,
    continuations: Vec<Continuation>,
    /// Names of attributes that had at least one `*N*=` (percent-encoded)
    /// continuation, so the merged attribute is renamed `name*` instead of
    /// `name` once folding is done.
    encoded_attrs: Vec<String>,

    token_start: usize,
    token_end: usize,

    is_continuation: bool,
    is_encoded_attribute: bool,
    is_escaped: bool,
    remove_crlf: bool,
    is_token_start: bool,
    malformed: bool,
}

impl Folder {
    fn reset(&mut self) {
        self.token_start = 0;
        self.is_token_start = true;
    }

    fn slice<'x>(&self, data: &[u8], to_cur: Option<usize>) -> String {
        let end = to_cur.unwrap_or(self.token_end);
        String::from_utf8_lossy(&data[self.token_start - 1..end]).into_owned()
    }

    fn add_attribute(&mut self, data: &[u8]) -> bool {
        if self.token_start == 0 {
            return false;
        }
        let mut value = self.slice(data, None);
        value.make_ascii_uppercase();
        match self.state {
            State::AttributeName => self.attr_name = Some(value),
            State::Type => self.c_type = Some(value),
            State::SubType => self.c_subtype = Some(value),
            _ => unreachable!(),
        }
        self.reset();
        true
    }

    fn add_partial_value(&mut self, data: &[u8], offset: usize, to_cur_pos: bool) {
        if self.token_start == 0 {
            return;
        }
        let in_quote = self.state == State::AttributeQuotedValue;
        let end = if in_quote && to_cur_pos {
            offset - 1
        } else {
            self.token_end
        };
        self.values.push(self.slice(data, Some(end)));
        if !in_quote {
            self.values.push(" ".to_string());
        }
        self.reset();
    }

    fn add_value(&mut self, data: &[u8]) {
        if self.attr_name.is_none() {
            return;
        }
        let has_values = !self.values.is_empty();
        let value = if self.token_start > 0 {
            Some(if !self.remove_crlf {
                self.slice(data, None)
            } else {
                self.remove_crlf = false;
                String::from_utf8_lossy(
                    &data[self.token_start - 1..self.token_end]
                        .iter()
                        .copied()
                        .filter(|&c| c != b'\r' && c != b'\n')
                        .collect::<Vec<_>>(),
                )
                .into_owned()
            })
        } else {
            if !has_values {
                return;
            }
            None
        };

        if !self.is_continuation {
            let final_value = if !has_values {
                value.unwrap()
            } else {
                let mut v = self.values.concat();
                if let Some(value) = value {
                    v.push_str(&value);
                }
                v
            };
            self.attributes.push((self.attr_name.take().unwrap(), final_value));
        } else {
            let attr_name = self.attr_name.take().unwrap();
            let value = if let Some(value) = value {
                if has_values {
                    format!("{}{}", self.values.concat(), value)
                } else {
                    value
                }
            } else {
                self.values.concat()
            };

            // The merged value is kept percent-encoded with its
            // `charset'lang'` prefix intact; interpreting it is the
            // charset collaborator's job. Only the %-escape syntax itself
            // is checked here, to flag a malformed continuation.
            if self.is_encoded_attribute {
                let (ok, _) = decode_hex(value.as_bytes());
                if !ok {
                    self.malformed = true;
                }
                if !self.encoded_attrs.iter().any(|n| n == &attr_name) {
                    self.encoded_attrs.push(attr_name.clone());
                }
                self.is_encoded_attribute = false;
            }

            if self.attr_position > 0 {
                self.continuations.push((attr_name, self.attr_position, value));
                self.attr_position = 0;
            } else {
                self.attributes.push((attr_name, value));
            }
            self.is_continuation = false;
        }

        if has_values {
            self.values.clear();
        }
        self.reset();
    }

    fn add_attr_position(&mut self, data: &[u8]) -> bool {
        if self.token_start == 0 {
            return false;
        }
        self.attr_position = self.slice(data, None).parse().unwrap_or(0);
        self.reset();
        true
    }

    fn merge_continuations(&mut self) {
        self.continuations.sort_by(|a, b| a.1.cmp(&b.1));
        for (key, _, value) in self.continuations.drain(..) {
            if let Some((_, old)) = self.attributes.iter_mut().find(|(n, _)| n == &key) {
                old.push_str(&value);
            } else {
                self.attributes.push((key, value));
            }
        }
    }
}

/// Parses a `Content-Type` or `Content-Disposition` field value starting
/// at the cursor's current position, up to and including its terminating
/// unfolded `\n`. Leaves the cursor positioned after that `\n`.
pub fn parse_content_type<'x, C: ByteCursor<'x>>(cur: &mut C) -> Option<ParsedContentType<'x>> {
    let data = cur.data().to_vec();
    let mut p = Folder {
        state: State::Type,
        state_stack: Vec::new(),
        c_type: None,
        c_subtype: None,
        attr_name: None,
        attr_position: 0,
        values: Vec::new(),
        attributes: Vec::new(),
        continuations: Vec::new(),
        encoded_attrs: Vec::new(),
        token_start: 0,
        token_end: 0,
        is_continuation: false,
        is_encoded_attribute: false,
        is_escaped: false,
        remove_crlf: false,
        is_token_start: true,
        malformed: false,
    };

    while let Some(ch) = cur.next() {
        match ch {
            b' ' | b'\t' => {
                p.is_token_start = true;
                if p.state == State::AttributeQuotedValue {
                    if p.token_start == 0 {
                        p.token_start = cur.offset();
                        p.token_end = p.token_start;
                    } else {
                        p.token_end = cur.offset();
                    }
                }
                continue;
            }
            b'\n' => {
                let next_is_space = cur.next_is_space();
                match p.state {
                    State::Type | State::AttributeName | State::SubType => {
                        p.add_attribute(&data);
                    }
                    State::AttributeValue => p.add_value(&data),
                    State::AttributeQuotedValue => {
                        if next_is_space {
                            p.remove_crlf = true;
                            continue;
                        } else {
                            p.add_value(&data);
                        }
                    }
                    _ => (),
                }

                if next_is_space {
                    p.state = State::AttributeName;
                    cur.advance(1);
                    p.is_token_start = true;
                    continue;
                } else {
                    if !p.continuations.is_empty() {
                        p.merge_continuations();
                    }
                    let warning = if p.malformed {
                        Some(ParseWarning::MalformedParameter { offset: cur.offset() })
                    } else {
                        None
                    };
                    let encoded_attrs = p.encoded_attrs;
                    return p.c_type.map(|c_type| ParsedContentType {
                        c_type: c_type.into(),
                        c_subtype: p.c_subtype.map(Into::into),
                        params: p
                            .attributes
                            .into_iter()
                            .map(|(a, v)| {
                                let name = if encoded_attrs.iter().any(|n| n == &a) {
                                    format!("{a}*")
                                } else {
                                    a
                                };
                                Param::new(name, v)
                            })
                            .collect(),
                        warning,
                    });
                }
            }
            b'/' if p.state == State::Type => {
                p.add_attribute(&data);
                p.state = State::SubType;
                continue;
            }
            b';' => match p.state {
                State::Type | State::SubType | State::AttributeName => {
                    p.add_attribute(&data);
                    p.state = State::AttributeName;
                    continue;
                }
                State::AttributeValue => {
                    if !p.is_escaped {
                        p.add_value(&data);
                        p.state = State::AttributeName;
                    } else {
                        p.is_escaped = false;
                    }
                    continue;
                }
                _ => (),
            },
            b'*' if p.state == State::AttributeName => {
                if !p.is_continuation {
                    p.is_continuation = p.add_attribute(&data);
                } else if !p.is_encoded_attribute {
                    p.add_attr_position(&data);
                    p.is_encoded_attribute = true;
                } else {
                    p.reset();
                }
                continue;
            }
            b'=' => match p.state {
                State::AttributeName => {
                    if !p.is_continuation {
                        if !p.add_attribute(&data) {
                            continue;
                        }
                    } else if !p.is_encoded_attribute {
                        p.is_encoded_attribute = !p.add_attr_position(&data);
                    } else {
                        p.reset();
                    }
                    p.state = State::AttributeValue;
                    continue;
                }
                _ => (),
            },
            b'\"' => match p.state {
                State::AttributeValue => {
                    p.is_token_start = true;
                    p.state = State::AttributeQuotedValue;
                    continue;
                }
                State::AttributeQuotedValue => {
                    if !p.is_escaped {
                        p.add_value(&data);
                        p.state = State::AttributeName;
                        continue;
                    } else {
                        p.is_escaped = false;
                    }
                }
                _ => continue,
            },
            b'\\' => match p.state {
                State::AttributeQuotedValue | State::AttributeValue => {
                    if !p.is_escaped {
                        p.add_partial_value(&data, cur.offset(), true);
                        p.is_escaped = true;
                        continue;
                    } else {
                        p.is_escaped = false;
                    }
                }
                State::Comment => p.is_escaped = !p.is_escaped,
                _ => continue,
            },
            b'(' if p.state != State::AttributeQuotedValue => {
                if !p.is_escaped {
                    match p.state {
                        State::Type | State::AttributeName | State::SubType => {
                            p.add_attribute(&data);
                        }
                        State::AttributeValue => p.add_value(&data),
                        _ => (),
                    }
                    p.state_stack.push(p.state);
                    p.state = State::Comment;
                } else {
                    p.is_escaped = false;
                }
                continue;
            }
            b')' if p.state == State::Comment => {
                if !p.is_escaped {
                    p.state = p.state_stack.pop().unwrap();
                    p.reset();
                } else {
                    p.is_escaped = false;
                }
                continue;
            }
            b'\r' => continue,
            _ => (),
        }

        if p.is_escaped {
            p.is_escaped = false;
        }
        if p.is_token_start {
            p.is_token_start = false;
        }
        if p.token_start == 0 {
            p.token_start = cur.offset();
            p.token_end = p.token_start;
        } else {
            p.token_end = cur.offset();
        }
    }

    if !p.continuations.is_empty() {
        p.merge_continuations();
    }
    let encoded_attrs = p.encoded_attrs;
    p.c_type.map(|c_type| ParsedContentType {
        c_type: c_type.into(),
        c_subtype: p.c_subtype.map(Into::into),
        params: p
            .attributes
            .into_iter()
            .map(|(a, v)| {
                let name = if encoded_attrs.iter().any(|n| n == &a) {
                    format!("{a}*")
                } else {
                    a
                };
                Param::new(name, v)
            })
            .collect(),
        warning: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::Cursor;

    fn parse(s: &str) -> ParsedContentType<'static> {
        let mut cur = Cursor::new(s.as_bytes());
        parse_content_type(&mut cur).unwrap()
    }

    #[test]
    fn parses_type_and_subtype() {
        let r = parse("text/plain\n");
        assert_eq!(r.c_type, "TEXT");
        assert_eq!(r.c_subtype.as_deref(), Some("PLAIN"));
    }

    #[test]
    fn parses_quoted_boundary_parameter() {
        let r = parse("multipart/mixed; boundary=\"frontier\"\n");
        assert_eq!(r.c_type, "MULTIPART");
        assert_eq!(
            r.params.iter().find(|p| p.attribute == "BOUNDARY").map(|p| p.value.as_ref()),
            Some("frontier")
        );
    }

    #[test]
    fn folds_rfc2231_continuations() {
        let r = parse(
            "application/x-stuff;\n title*0*=us-ascii'en'This%20is%20;\n title*1*=%2A%2A%2Afun%2A%2A%2A%20;\n title*2=\"isn't it!\"\n",
        );
        let title = r.params.iter().find(|p| p.attribute == "TITLE*").unwrap();
        assert_eq!(title.value, "us-ascii'en'This%20is%20%2A%2A%2Afun%2A%2A%2A%20isn't it!");
    }

    #[test]
    fn lax_on_missing_subtype() {
        let mut cur = Cursor::new(b"text\n");
        let r = parse_content_type(&mut cur).unwrap();
        assert_eq!(r.c_type, "TEXT");
        assert!(r.c_subtype.is_none());
    }
}
