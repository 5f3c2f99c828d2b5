//! Wire codec for L2TP control messages (RFC 2661 / RFC 3931)
//!
//! This crate owns the byte layer of the L2TP control protocol: parsing a
//! datagram of concatenated control messages, typed AVP (Attribute Value
//! Pair) encoding and decoding, per-message-type AVP validation, and
//! builders for the control connection establishment exchange. It holds no
//! transport or state machine; sequence number management and
//! retransmission live above it.
//!
//! The receive path supports L2TPv2; L2TPv3 messages can be built and
//! encoded but not decoded. All multi-octet fields are big-endian, and
//! decoded messages own their bytes, so nothing borrows from the receive
//! buffer.
//!
//! # Examples
//!
//! ```
//! use l2tp_proto::message::{build_sccrq, parse_message_buffer, MessageType, TunnelConfig};
//!
//! let cfg = TunnelConfig {
//!     local_tunnel_id: 1,
//!     peer_tunnel_id: 0,
//!     host_name: "lac.example.net".to_owned(),
//!     framing_caps: 0x3,
//! };
//!
//! let mut sccrq = build_sccrq(&cfg).unwrap();
//! sccrq.set_sequence_numbers(0, 0);
//! let wire = sccrq.to_bytes();
//!
//! let received = parse_message_buffer(&wire).unwrap();
//! assert_eq!(received.len(), 1);
//! assert_eq!(received[0].message_type(), MessageType::Sccrq);
//! received[0].validate().unwrap();
//! ```

pub mod avp;
pub mod message;

pub use avp::{
    parse_avp_buffer, Avp, AvpDataKind, AvpError, AvpType, AvpValue, MessageType, ResultCode,
};
pub use message::{
    build_hello, build_scccn, build_sccrp, build_sccrq, build_stopccn, parse_message_buffer,
    ControlMessage, MessageError, MessageSpec, ProtocolVersion, TunnelConfig, V2ControlMessage,
    V3ControlMessage,
};
