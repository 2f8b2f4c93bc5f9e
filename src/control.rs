//! Codecs for the structured payloads carried by control packets. These are
//!  pure wire translation - deciding *when* to request a repair or gossip a
//!  session snapshot is the repair layer's business.

use bytes::{Buf, BytesMut};
use bytes_varint::{VarIntSupport, VarIntSupportMut};

use crate::packet::{deser_name, ser_name, ParseError, MAX_RECEIVERS};
use crate::packet_id::PacketId;

/// Payload of a [`RepairRequest`](crate::PacketKind::RepairRequest) packet:
///  asks the group to re-send one packet of one sender's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairRequest {
    /// The sender whose stream the missing packet belongs to - not
    ///  necessarily the participant asking.
    pub sender: String,
    pub packet_id: PacketId,
}

impl RepairRequest {
    pub fn ser(&self, buf: &mut BytesMut) {
        ser_name(&self.sender, buf);
        self.packet_id.ser(buf);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<RepairRequest, ParseError> {
        let sender = deser_name(buf)?;
        let packet_id = PacketId::deser(buf)?;
        Ok(RepairRequest { sender, packet_id })
    }
}

/// Payload of a [`Session`](crate::PacketKind::Session) packet: a gossip
///  snapshot of the senders a participant knows about and the highest packet
///  id it has seen from each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub senders: Vec<(String, PacketId)>,
}

impl SessionInfo {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_usize_varint(self.senders.len());
        for (sender, last_id) in &self.senders {
            ser_name(sender, buf);
            last_id.ser(buf);
        }
    }

    pub fn deser(buf: &mut impl Buf) -> Result<SessionInfo, ParseError> {
        let num_senders = buf.try_get_usize_varint().map_err(|_| ParseError::Truncated)?;
        if num_senders > MAX_RECEIVERS {
            return Err(ParseError::TooManyReceivers(num_senders));
        }
        let mut senders = Vec::with_capacity(num_senders);
        for _ in 0..num_senders {
            let sender = deser_name(buf)?;
            let last_id = PacketId::deser(buf)?;
            senders.push((sender, last_id));
        }
        Ok(SessionInfo { senders })
    }
}
