//! Sans-IO core of a reliable-multicast group-messaging protocol: the binary
//!  packet codec and the wraparound sequence-number arithmetic that repair and
//!  retransmission logic is built on.
//!
//! ## Design goals
//!
//! * The protocol is serverless: participants on a link-local network segment
//!   exchange packets over an unreliable multicast transport, with no
//!   dedicated coordinator
//!   * each sender owns an independent, monotonically advancing sequence of
//!     32-bit packet ids, wrapping at 2^32. Ids from different senders are
//!     never compared with each other
//!   * receivers gossip their per-sender delivery progress by piggy-backing
//!     acknowledgement entries on outgoing packets, so the repair layer can
//!     decide whom to repair and when a packet is fully acknowledged
//! * This crate is the codec and the sequence arithmetic only. Socket and
//!   multicast-group handling, the repair scheduler and causal delivery all
//!   live outside it and talk to it through byte buffers
//!   * no operation blocks, suspends or performs I/O; all failure is returned
//!     synchronously to the caller
//!   * a single malformed or adversarial datagram yields a parse error that
//!     the caller drops; it must never halt the receive loop
//! * Packets are never larger than a configured maximum size. The maximum is
//!   MTU-driven and owned by the transport configuration, not baked into the
//!   codec - it is passed in when a packet is built
//!
//! ## Wire format
//!
//! All numbers in network byte order (BE), list counts as varints:
//!
//! ```ascii
//! 0: packet kind (u8):
//!    * 0 DATA           application payload
//!    * 1 REPAIR         re-sent DATA packet, same framing
//!    * 2 REPAIR_REQUEST asks the group to re-send one packet of one sender
//!    * 3 SESSION        gossip snapshot of known senders
//!    * 4 BYE            sender leaves the group
//! 1: protocol version (u8)
//! 2: sender name length (u8, 1..=255), followed by that many UTF-8 bytes
//! *: packet id (u32 BE) - position in the sender's cyclic sequence space
//! *: fragment marker (u8): 0 if this packet is a complete, unfragmented
//!     unit; 1 if it is one piece of a larger logical message, followed by
//!     part index (u32 BE) and parts total (u32 BE). Other marker values are
//!     invalid
//! *: receiver ack count (varint), then per entry:
//!     peer name length (u8, 1..=255) + peer bytes + last seen packet id
//!     (u32 BE). Entry order is preserved on the wire
//! *: payload - everything up to the end of the packet
//! ```
//!
//! ## Control payloads
//!
//! The codec frames every kind identically; what a kind *means* is the repair
//!  layer's business. Two control kinds carry a structured payload for which
//!  [`control`] provides the codec:
//!
//! *REPAIR_REQUEST*
//!
//! ```ascii
//! 0: sender name length (u8) + sender bytes
//! *: packet id of the packet to re-send (u32 BE)
//! ```
//!
//! *SESSION*
//!
//! ```ascii
//! 0: number of entries (varint)
//! *: (repeated) sender name length (u8) + sender bytes
//!     + highest packet id seen from that sender (u32 BE)
//! ```
//!
//! ## Sequence arithmetic
//!
//! Packet ids wrap at 2^32, so ordering and gap estimation go through
//!  [`PacketId::diff`] - the minimal signed circular step between two ids of
//!  the *same* sender - instead of plain integer comparison. A value near the
//!  top of the space compared against a value near zero is "close" in
//!  circular terms, with the wrap contributing the sign and a small
//!  magnitude.

pub mod control;
pub mod packet;
pub mod packet_id;

pub use packet::{BuildError, Fragment, Packet, PacketKind, ParseError, ReceiverAck};
pub use packet_id::PacketId;

#[cfg(test)]
mod tests {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::TRACE)
            .try_init()
            .ok();
    }
}
