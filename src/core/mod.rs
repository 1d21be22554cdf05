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

pub mod address;
pub mod body;
pub mod boundary;
pub mod cursor;
pub mod datetime;
pub mod message;
pub mod param;

pub use address::{Addr, Address, Group};
pub use body::{Body, BodyKind, Envelope, Guid};
pub use boundary::{BoundaryMatch, BoundaryStack};
pub use cursor::{ByteCursor, Cursor, CursorMut};
pub use datetime::DateTime;
pub use message::ParsedMessage;
pub use param::{Param, ParamList};
