use bytes::{Buf, BufMut, Bytes, BytesMut};
use bytes_varint::{VarIntSupport, VarIntSupportMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::{debug, trace};

use crate::packet_id::PacketId;

/// The protocol version this codec speaks. Packets declaring any other
///  version are rejected during parsing.
pub const PROTOCOL_VERSION: u8 = 1;

/// Upper bound for sender and peer names on the wire. Names are length
///  prefixed with a single byte, so this is also the natural limit of the
///  encoding.
pub const MAX_SENDER_LEN: usize = 255;

/// Upper bound for the number of piggy-backed receiver ack entries per
///  packet. Bounding the count means a hostile count field can never drive
///  parsing into unbounded allocation.
///
/// NB: must stay below 128 so the count always fits a single varint byte.
pub const MAX_RECEIVERS: usize = 64;

/// Kind of a packet. The codec frames every kind identically - what a kind
///  *means* (and which kinds may carry which payloads) is owned by the
///  repair layer consuming parsed packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketKind {
    /// Application payload.
    Data = 0,
    /// A re-sent [`Data`](PacketKind::Data) packet, same framing.
    Repair = 1,
    /// Asks the group to re-send one packet of one sender, see
    ///  [`control::RepairRequest`](crate::control::RepairRequest).
    RepairRequest = 2,
    /// Gossip snapshot of known senders, see
    ///  [`control::SessionInfo`](crate::control::SessionInfo).
    Session = 3,
    /// The sender leaves the group.
    Bye = 4,
}

/// Marks a packet as one piece of a larger logical message that was split
///  across multiple transmission units.
///
/// Invariant: `total >= 1 && part <= total`. A packet without a fragment
///  descriptor is a complete, unfragmented unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub part: u32,
    pub total: u32,
}

/// One piggy-backed acknowledgement entry: what the packet's sender believes
///  `peer` has already seen. Entry order is preserved on the wire; the codec
///  does not de-duplicate or interpret entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverAck {
    pub peer: String,
    pub last_seen: PacketId,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("sender or peer name must be 1..={MAX_SENDER_LEN} bytes, was {0}")]
    InvalidSender(usize),
    #[error("invalid fragment descriptor: part {part} of {total}")]
    InvalidFragment { part: u32, total: u32 },
    #[error("receiver ack list is full ({MAX_RECEIVERS} entries)")]
    TooManyReceivers,
    #[error("serialized packet would be {required} bytes, maximum is {max}")]
    Oversize { required: usize, max: usize },
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("packet is truncated")]
    Truncated,
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),
    #[error("invalid fragment descriptor")]
    InvalidFragment,
    #[error("invalid sender or peer name")]
    InvalidSender,
    #[error("receiver ack count {0} exceeds the protocol bound of {MAX_RECEIVERS}")]
    TooManyReceivers(usize),
}

/// One unit of transmission on the multicast wire.
///
/// An outgoing packet is built incrementally - kind, sender and id first,
///  then the optional fragment descriptor, then receiver acks, then the
///  payload - and is immutable once serialized. Every building step
///  validates, so [`Packet::ser`] itself is infallible and its output never
///  exceeds the `max_size` the packet was created with. `max_size` is a
///  transport configuration value (MTU-driven), not a protocol constant.
///
/// An incoming packet is produced whole by [`Packet::deser`] and is
///  read-only for its entire lifetime.
#[derive(Debug, Clone)]
pub struct Packet {
    kind: PacketKind,
    version: u8,
    sender: String,
    packet_id: PacketId,
    fragment: Option<Fragment>,
    receiver_acks: Vec<ReceiverAck>,
    payload: Bytes,
    max_size: usize,
}

/// Logical equality covers the wire-visible fields only: `max_size` is a
///  local construction bound and does not travel.
impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.version == other.version
            && self.sender == other.sender
            && self.packet_id == other.packet_id
            && self.fragment == other.fragment
            && self.receiver_acks == other.receiver_acks
            && self.payload == other.payload
    }
}
impl Eq for Packet {}

impl Packet {
    pub fn new(
        kind: PacketKind,
        sender: &str,
        packet_id: PacketId,
        max_size: usize,
    ) -> Result<Packet, BuildError> {
        if sender.is_empty() || sender.len() > MAX_SENDER_LEN {
            return Err(BuildError::InvalidSender(sender.len()));
        }

        let packet = Packet {
            kind,
            version: PROTOCOL_VERSION,
            sender: sender.to_owned(),
            packet_id,
            fragment: None,
            receiver_acks: Vec::new(),
            payload: Bytes::new(),
            max_size,
        };
        if packet.serialized_len() > max_size {
            return Err(BuildError::Oversize {
                required: packet.serialized_len(),
                max: max_size,
            });
        }
        Ok(packet)
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    pub fn fragment(&self) -> Option<Fragment> {
        self.fragment
    }

    pub fn receiver_acks(&self) -> &[ReceiverAck] {
        &self.receiver_acks
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Attaches a fragment descriptor, marking this packet as `part` of
    ///  `total` pieces of a larger logical message.
    pub fn set_fragment(&mut self, part: u32, total: u32) -> Result<(), BuildError> {
        if total == 0 || part > total {
            return Err(BuildError::InvalidFragment { part, total });
        }

        let previous = self.fragment.replace(Fragment { part, total });
        if self.serialized_len() > self.max_size {
            let required = self.serialized_len();
            self.fragment = previous;
            return Err(BuildError::Oversize {
                required,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Appends a receiver ack entry. Entries keep their insertion order on
    ///  the wire.
    pub fn add_receiver(&mut self, peer: &str, last_seen: PacketId) -> Result<(), BuildError> {
        if self.receiver_acks.len() >= MAX_RECEIVERS {
            return Err(BuildError::TooManyReceivers);
        }
        if peer.is_empty() || peer.len() > MAX_SENDER_LEN {
            return Err(BuildError::InvalidSender(peer.len()));
        }

        self.receiver_acks.push(ReceiverAck {
            peer: peer.to_owned(),
            last_seen,
        });
        if self.serialized_len() > self.max_size {
            let required = self.serialized_len();
            self.receiver_acks.pop();
            return Err(BuildError::Oversize {
                required,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Sets the payload, replacing any previous one. Fails with `Oversize`
    ///  iff header + acks + payload would exceed the packet's `max_size`;
    ///  a serialized size of exactly `max_size` is accepted.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), BuildError> {
        let required = self.serialized_len_with_payload(payload.len());
        if required > self.max_size {
            debug!(
                "payload of {} bytes would grow the packet to {} bytes, maximum is {}",
                payload.len(),
                required,
                self.max_size
            );
            return Err(BuildError::Oversize {
                required,
                max: self.max_size,
            });
        }
        self.payload = Bytes::copy_from_slice(payload);
        Ok(())
    }

    /// Exact length of the serialized packet.
    pub fn serialized_len(&self) -> usize {
        self.serialized_len_with_payload(self.payload.len())
    }

    fn serialized_len_with_payload(&self, payload_len: usize) -> usize {
        // kind, version, sender length prefix + bytes, packet id, fragment marker
        let mut len = 1 + 1 + 1 + self.sender.len() + 4 + 1;
        if self.fragment.is_some() {
            len += 2 * 4;
        }
        // ack count is a single varint byte since MAX_RECEIVERS < 128
        len += 1;
        for ack in &self.receiver_acks {
            len += 1 + ack.peer.len() + 4;
        }
        len + payload_len
    }

    /// Deterministic serialization: the same logical packet always produces
    ///  the same bytes, and the total length never exceeds `max_size`.
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(self.kind.into());
        buf.put_u8(self.version);
        ser_name(&self.sender, buf);
        self.packet_id.ser(buf);
        match self.fragment {
            None => buf.put_u8(0),
            Some(Fragment { part, total }) => {
                buf.put_u8(1);
                buf.put_u32(part);
                buf.put_u32(total);
            }
        }
        buf.put_usize_varint(self.receiver_acks.len());
        for ack in &self.receiver_acks {
            ser_name(&ack.peer, buf);
            ack.last_seen.ser(buf);
        }
        buf.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.ser(&mut buf);
        debug_assert_eq!(buf.len(), self.serialized_len());
        debug_assert!(buf.len() <= self.max_size);
        buf.freeze()
    }

    /// Parses one received datagram into a packet.
    ///
    /// Every length-prefixed field is validated against the remaining buffer
    ///  *before* anything is sliced or allocated, so parsing terminates in
    ///  time linear in the input length, allocates at most proportionally to
    ///  it, and never panics on adversarial input. Each call is independent -
    ///  a malformed datagram affects nothing but itself.
    ///
    /// The payload is everything after the receiver ack list, so the input
    ///  must be exactly one datagram.
    pub fn deser(buf: &mut impl Buf) -> Result<Packet, ParseError> {
        let datagram_len = buf.remaining();

        let raw_kind = buf.try_get_u8().map_err(|_| ParseError::Truncated)?;
        let kind =
            PacketKind::try_from(raw_kind).map_err(|_| ParseError::UnknownKind(raw_kind))?;

        let version = buf.try_get_u8().map_err(|_| ParseError::Truncated)?;
        if version != PROTOCOL_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        let sender = deser_name(buf)?;
        let packet_id = PacketId::deser(buf)?;

        let fragment = match buf.try_get_u8().map_err(|_| ParseError::Truncated)? {
            0 => None,
            1 => {
                let part = buf.try_get_u32().map_err(|_| ParseError::Truncated)?;
                let total = buf.try_get_u32().map_err(|_| ParseError::Truncated)?;
                if total == 0 || part > total {
                    return Err(ParseError::InvalidFragment);
                }
                Some(Fragment { part, total })
            }
            _ => return Err(ParseError::InvalidFragment),
        };

        let num_acks = buf.try_get_usize_varint().map_err(|_| ParseError::Truncated)?;
        if num_acks > MAX_RECEIVERS {
            return Err(ParseError::TooManyReceivers(num_acks));
        }
        let mut receiver_acks = Vec::with_capacity(num_acks);
        for _ in 0..num_acks {
            let peer = deser_name(buf)?;
            let last_seen = PacketId::deser(buf)?;
            receiver_acks.push(ReceiverAck { peer, last_seen });
        }

        let payload = buf.copy_to_bytes(buf.remaining());

        trace!(
            "parsed {:?} packet #{} from '{}' with {} ack(s) and {} payload byte(s)",
            kind,
            packet_id,
            sender,
            receiver_acks.len(),
            payload.len()
        );

        Ok(Packet {
            kind,
            version,
            sender,
            packet_id,
            fragment,
            receiver_acks,
            payload,
            // a parsed packet is bounded by the datagram it arrived in
            max_size: datagram_len,
        })
    }
}

pub(crate) fn ser_name(name: &str, buf: &mut BytesMut) {
    debug_assert!(!name.is_empty() && name.len() <= MAX_SENDER_LEN);
    buf.put_u8(name.len() as u8);
    buf.put_slice(name.as_bytes());
}

pub(crate) fn deser_name(buf: &mut impl Buf) -> Result<String, ParseError> {
    let len = buf.try_get_u8().map_err(|_| ParseError::Truncated)? as usize;
    if len == 0 {
        return Err(ParseError::InvalidSender);
    }
    if buf.remaining() < len {
        return Err(ParseError::Truncated);
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ParseError::InvalidSender)
}
