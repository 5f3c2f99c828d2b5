//! L2TP control message codec (RFC 2661 / RFC 3931)
//!
//! A control message is a 12-octet header followed by a sequence of AVPs.
//! The version nibble of the header's first word selects the layout: L2TPv2
//! carries 16-bit tunnel and session IDs, L2TPv3 a 32-bit control connection
//! ID. Both variants share the first 4 octets (flags/version word and
//! length), which is enough to split a datagram holding several
//! concatenated messages.
//!
//! Decoding is implemented for L2TPv2; an L2TPv3 message in the input fails
//! with [`MessageError::UnimplementedV3Decode`]. Encoding is implemented for
//! both versions.
//!
//! # Examples
//!
//! Parsing a ZLB (zero-length-body) acknowledgement:
//!
//! ```
//! use l2tp_proto::message::{parse_message_buffer, MessageType, ProtocolVersion};
//!
//! let buf = vec![
//!     0xC8, 0x02, // T=1, L=1, S=1, Ver: 2
//!     0x00, 0x0C, // Length: 12
//!     0x00, 0x01, // Tunnel ID: 1
//!     0x00, 0x00, // Session ID: 0
//!     0x00, 0x02, // Ns: 2
//!     0x00, 0x01, // Nr: 1
//! ];
//!
//! let msgs = parse_message_buffer(&buf).unwrap();
//! assert_eq!(msgs.len(), 1);
//! assert_eq!(msgs[0].version(), ProtocolVersion::V2);
//! assert!(msgs[0].avps().is_empty());
//! assert_eq!(msgs[0].message_type(), MessageType::Ack);
//! ```

pub mod header;
pub mod spec;
pub mod v2;
pub mod v3;

use std::fmt::{self, Formatter};

use thiserror::Error;
use zerocopy::FromBytes;

use crate::avp::{Avp, AvpError, AvpType};
pub use crate::avp::MessageType;
pub use header::{
    CommonHeader, V2Header, V3Header, COMMON_HEADER_LEN, CONTROL_MESSAGE_MAX_LEN,
    CONTROL_MESSAGE_MIN_LEN, V2_HEADER_LEN, V3_HEADER_LEN,
};
pub use spec::MessageSpec;
pub use v2::{
    build_hello, build_scccn, build_sccrp, build_sccrq, build_stopccn, TunnelConfig,
    V2ControlMessage,
};
pub use v3::V3ControlMessage;

/// L2TP protocol version, from the low nibble of the header's first word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// L2TPv2 (RFC 2661)
    V2,
    /// L2TPv3 (RFC 3931)
    V3,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V2 => write!(f, "L2TPv2"),
            ProtocolVersion::V3 => write!(f, "L2TPv3"),
        }
    }
}

/// Errors raised by the control message codec.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The header's version nibble is neither 2 nor 3.
    #[error("illegal L2TP protocol version {0}")]
    IllegalProtocolVersion(u8),

    /// The buffer ends before the header does.
    #[error("truncated {what}: need {need} octets, have {have}")]
    TruncatedHeader {
        /// Which header was being read.
        what: &'static str,
        /// Octets required.
        need: usize,
        /// Octets available.
        have: usize,
    },

    /// The header's length field is below the header size or runs past the
    /// end of the buffer.
    #[error("message declares length {length} but buffer holds {available} octets")]
    MalformedLength {
        /// Declared message length.
        length: u16,
        /// Octets available, header included.
        available: usize,
    },

    /// The AVP sequence in the message body failed to parse.
    #[error("malformed AVP sequence")]
    AvpSequence(#[source] AvpError),

    /// A non-empty message body does not start with a Message Type AVP.
    #[error("first AVP is not Message Type")]
    FirstAvpNotMessageType,

    /// L2TPv3 control message decoding is not implemented.
    #[error("L2TPv3 control message decoding is not implemented")]
    UnimplementedV3Decode,

    /// No validation table exists for this message type.
    #[error("no AVP table for {0} messages")]
    NoSpecForMessageType(MessageType),

    /// The message carries an AVP its type does not allow.
    #[error("unexpected {avp_type} AVP in {message_type} message")]
    UnexpectedAvp {
        /// The offending attribute.
        avp_type: AvpType,
        /// The message carrying it.
        message_type: MessageType,
    },

    /// The message is missing an AVP its type requires.
    #[error("{message_type} message is missing mandatory {avp_type} AVP")]
    MissingMandatoryAvp {
        /// The absent attribute.
        avp_type: AvpType,
        /// The message missing it.
        message_type: MessageType,
    },

    /// An AVP value failed to decode during validation or building.
    #[error("failed to decode {avp_type} AVP")]
    AvpDecode {
        /// The offending attribute.
        avp_type: AvpType,
        /// The underlying codec error.
        #[source]
        source: AvpError,
    },

    /// A tunnel or session ID does not fit the protocol's 16-bit field.
    #[error("ID {0} out of range for a 16-bit field")]
    IdOutOfRange(u32),

    /// Appending an AVP would overflow the header's 16-bit length field.
    #[error("message length {length} exceeds the 16-bit length field")]
    OversizeMessage {
        /// The length the message would have reached.
        length: usize,
    },

    /// Deep (per-value) validation is not implemented for this message type.
    #[error("deep validation of {0} messages is not implemented")]
    UnimplementedDeepValidator(MessageType),
}

/// A decoded or built control message of either protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// An L2TPv2 message
    V2(V2ControlMessage),
    /// An L2TPv3 message
    V3(V3ControlMessage),
}

impl ControlMessage {
    /// Returns the protocol version.
    pub fn version(&self) -> ProtocolVersion {
        match self {
            ControlMessage::V2(_) => ProtocolVersion::V2,
            ControlMessage::V3(_) => ProtocolVersion::V3,
        }
    }

    /// Returns the total encoded length in octets, header included.
    pub fn len(&self) -> usize {
        match self {
            ControlMessage::V2(m) => m.len(),
            ControlMessage::V3(m) => m.len(),
        }
    }

    /// Returns whether the message body is empty (ZLB).
    pub fn is_empty(&self) -> bool {
        self.avps().is_empty()
    }

    /// Returns the Ns sequence number.
    pub fn ns(&self) -> u16 {
        match self {
            ControlMessage::V2(m) => m.ns(),
            ControlMessage::V3(m) => m.ns(),
        }
    }

    /// Returns the Nr sequence number.
    pub fn nr(&self) -> u16 {
        match self {
            ControlMessage::V2(m) => m.nr(),
            ControlMessage::V3(m) => m.nr(),
        }
    }

    /// Returns the message's AVPs in wire order.
    pub fn avps(&self) -> &[Avp] {
        match self {
            ControlMessage::V2(m) => m.avps(),
            ControlMessage::V3(m) => m.avps(),
        }
    }

    /// Returns the control message type derived from the first AVP, or
    /// [`MessageType::Ack`] for an empty body.
    ///
    /// # Panics
    ///
    /// Panics if a non-empty message does not start with a well-formed
    /// Message Type AVP. Decoding and building both establish that
    /// invariant, so this only fires on a hand-assembled message.
    pub fn message_type(&self) -> MessageType {
        match self {
            ControlMessage::V2(m) => m.message_type(),
            ControlMessage::V3(m) => m.message_type(),
        }
    }

    /// Appends an AVP, updating the header length field. Fails with
    /// [`MessageError::OversizeMessage`] if the message would outgrow the
    /// header's 16-bit length field.
    pub fn append_avp(&mut self, avp: Avp) -> Result<(), MessageError> {
        match self {
            ControlMessage::V2(m) => m.append_avp(avp),
            ControlMessage::V3(m) => m.append_avp(avp),
        }
    }

    /// Stamps the Ns/Nr sequence numbers prior to transmission.
    pub fn set_sequence_numbers(&mut self, ns: u16, nr: u16) {
        match self {
            ControlMessage::V2(m) => m.set_sequence_numbers(ns, nr),
            ControlMessage::V3(m) => m.set_sequence_numbers(ns, nr),
        }
    }

    /// Encodes the message to its wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ControlMessage::V2(m) => m.to_bytes(),
            ControlMessage::V3(m) => m.to_bytes(),
        }
    }

    /// Checks the AVP sequence against the table for this message type.
    pub fn validate(&self) -> Result<(), MessageError> {
        match self {
            ControlMessage::V2(m) => m.validate(),
            ControlMessage::V3(m) => m.validate(),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ns={} nr={} len={}",
            self.version(),
            self.message_type(),
            self.ns(),
            self.nr(),
            self.len()
        )
    }
}

/// Splits a buffer of concatenated control messages and decodes each one.
///
/// A single datagram may carry several messages back to back; each message's
/// length field (header included) locates the next. The whole parse fails on
/// the first malformed message, returning no partial results. Fewer than
/// [`CONTROL_MESSAGE_MIN_LEN`] trailing octets are ignored, so an empty
/// buffer yields an empty sequence.
pub fn parse_message_buffer(buf: &[u8]) -> Result<Vec<ControlMessage>, MessageError> {
    let mut messages = Vec::new();
    let mut rest = buf;
    while rest.len() >= CONTROL_MESSAGE_MIN_LEN {
        let (common, after) =
            CommonHeader::read_from_prefix(rest).map_err(|_| MessageError::TruncatedHeader {
                what: "common header",
                need: COMMON_HEADER_LEN,
                have: rest.len(),
            })?;
        let version = common.version()?;
        let length = common.length() as usize;
        let body = length
            .checked_sub(COMMON_HEADER_LEN)
            .filter(|body| *body <= after.len())
            .ok_or(MessageError::MalformedLength {
                length: common.length(),
                available: rest.len(),
            })?;

        let frame = &rest[..COMMON_HEADER_LEN + body];
        let message = match version {
            ProtocolVersion::V2 => ControlMessage::V2(V2ControlMessage::from_bytes(frame)?),
            ProtocolVersion::V3 => ControlMessage::V3(V3ControlMessage::from_bytes(frame)?),
        };
        messages.push(message);
        rest = &rest[frame.len()..];
    }
    Ok(messages)
}
