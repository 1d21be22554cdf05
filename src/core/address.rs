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

use std::borrow::Cow;

/// One RFC 822 mailbox: `name route mailbox domain`, matching the 4-tuple
/// the cache writer emits for ENVELOPE addresses. The source represents
/// this as a singly-linked list element; here it is a plain struct held in
/// an ordered `Vec`, per the redesign note on linked-list address/param
/// structures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Addr<'x> {
    pub name: Option<Cow<'x, str>>,
    pub route: Option<Cow<'x, str>>,
    pub mailbox: Option<Cow<'x, str>>,
    pub domain: Option<Cow<'x, str>>,
}

/// An RFC 822 group: `display-name: addr1, addr2;`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group<'x> {
    pub name: Option<Cow<'x, str>>,
    pub addresses: Vec<Addr<'x>>,
}

/// Either a flat address list or a sequence of (possibly ungrouped)
/// groups. A list whose addresses were never grouped is represented as
/// `Address::List`; encountering a group opener during address-list
/// parsing promotes the whole value to `Address::Group`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address<'x> {
    List(Vec<Addr<'x>>),
    Group(Vec<Group<'x>>),
}

impl<'x> Addr<'x> {
    pub fn new(
        name: Option<Cow<'x, str>>,
        mailbox: Option<Cow<'x, str>>,
        domain: Option<Cow<'x, str>>,
    ) -> Self {
        Addr {
            name,
            route: None,
            mailbox,
            domain,
        }
    }

    /// `mailbox@domain`, or just `mailbox` for a route-only / malformed
    /// address. Returns `None` when both are absent (a group marker).
    pub fn address(&self) -> Option<String> {
        match (&self.mailbox, &self.domain) {
            (Some(m), Some(d)) => Some(format!("{m}@{d}")),
            (Some(m), None) => Some(m.to_string()),
            _ => None,
        }
    }

    /// True for the synthetic entry (`mailbox` set, `domain` unset) that
    /// opens an RFC 822 group in the source's linked-list encoding.
    pub fn is_group_start(&self) -> bool {
        self.mailbox.is_some() && self.domain.is_none() && self.name.is_some()
    }

    pub fn into_owned(self) -> Addr<'static> {
        Addr {
            name: self.name.map(|s| Cow::Owned(s.into_owned())),
            route: self.route.map(|s| Cow::Owned(s.into_owned())),
            mailbox: self.mailbox.map(|s| Cow::Owned(s.into_owned())),
            domain: self.domain.map(|s| Cow::Owned(s.into_owned())),
        }
    }
}

impl<'x> Group<'x> {
    pub fn new(name: Option<Cow<'x, str>>, addresses: Vec<Addr<'x>>) -> Self {
        Group { name, addresses }
    }

    pub fn into_owned(self) -> Group<'static> {
        Group {
            name: self.name.map(|s| Cow::Owned(s.into_owned())),
            addresses: self.addresses.into_iter().map(Addr::into_owned).collect(),
        }
    }
}

impl<'x> Address<'x> {
    pub fn first(&self) -> Option<&Addr<'x>> {
        match self {
            Address::List(list) => list.first(),
            Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).next(),
        }
    }

    pub fn as_list(&self) -> Option<&[Addr<'x>]> {
        match self {
            Address::List(list) => Some(list),
            Address::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&[Group<'x>]> {
        match self {
            Address::List(_) => None,
            Address::Group(groups) => Some(groups),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Addr<'x>> + '_> {
        match self {
            Address::List(list) => Box::new(list.iter()),
            Address::Group(groups) => Box::new(groups.iter().flat_map(|g| g.addresses.iter())),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Address::List(list) => list.is_empty(),
            Address::Group(groups) => groups.is_empty(),
        }
    }

    pub fn into_owned(self) -> Address<'static> {
        match self {
            Address::List(list) => Address::List(list.into_iter().map(Addr::into_owned).collect()),
            Address::Group(groups) => {
                Address::Group(groups.into_iter().map(Group::into_owned).collect())
            }
        }
    }
}

impl Default for Address<'static> {
    fn default() -> Self {
        Address::List(Vec::new())
    }
}
