use std::fmt::{Display, Formatter};

use bytes::{Buf, BufMut, BytesMut};

use crate::packet::ParseError;

/// Position of a packet in one sender's cyclic sequence space.
///
/// Each sender numbers its packets independently with a 32-bit counter that
///  wraps at 2^32, so ids are unique per sender (within a window) but never
///  comparable across senders. There is deliberately no `Ord` implementation:
///  plain integer comparison is wrong once the counter wraps, ordering goes
///  through [`PacketId::diff`] instead.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PacketId(u32);

impl Display for PacketId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PacketId {
    pub const ZERO: PacketId = PacketId(0);

    const HALF_RANGE: u32 = 1 << 31;

    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    /// The id following this one in the sender's stream, wrapping at 2^32.
    pub fn next(&self) -> PacketId {
        PacketId(self.0.wrapping_add(1))
    }

    /// The minimal signed circular step from `self` to `to` on the 2^32
    ///  circle, with magnitude bounded by 2^31 - 1.
    ///
    /// A positive result means `to` follows `self`; the magnitude is the
    ///  apparent gap between the two ids. Only meaningful for ids drawn from
    ///  the *same* sender's sequence space.
    ///
    /// When the two ids are exactly half the space apart, circular distance
    ///  is ambiguous - either direction is equally short. That case saturates
    ///  to `i32::MAX` or `-i32::MAX`, with the sign chosen by raw ascending
    ///  order of the two values, so that `a.diff(b) == -b.diff(a)` holds for
    ///  all inputs. `i32::MIN` is never returned.
    pub fn diff(self, to: PacketId) -> i32 {
        let forward = to.0.wrapping_sub(self.0);
        if forward == Self::HALF_RANGE {
            if self.0 < to.0 {
                i32::MAX
            } else {
                -i32::MAX
            }
        } else {
            forward as i32
        }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32(self.0);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<PacketId, ParseError> {
        let raw = buf.try_get_u32().map_err(|_| ParseError::Truncated)?;
        Ok(PacketId(raw))
    }
}
