//! L2TPv2 control messages: decoding, encoding and builders
//!
//! # Examples
//!
//! Building an SCCRQ and reading it back:
//!
//! ```
//! use l2tp_proto::message::{build_sccrq, parse_message_buffer, MessageType, TunnelConfig};
//!
//! let cfg = TunnelConfig {
//!     local_tunnel_id: 9,
//!     peer_tunnel_id: 0,
//!     host_name: "lac.example.net".to_owned(),
//!     framing_caps: 0x3,
//! };
//!
//! let sccrq = build_sccrq(&cfg).unwrap();
//! assert_eq!(sccrq.message_type(), MessageType::Sccrq);
//! sccrq.validate().unwrap();
//!
//! let msgs = parse_message_buffer(&sccrq.to_bytes()).unwrap();
//! assert_eq!(msgs[0].message_type(), MessageType::Sccrq);
//! ```

use zerocopy::{FromBytes, IntoBytes};

use crate::avp::{Avp, AvpType, AvpValue, MessageType, ResultCode};

use super::header::{V2Header, CONTROL_MESSAGE_MAX_LEN, V2_HEADER_LEN};
use super::{spec, MessageError};

/// A decoded or built L2TPv2 control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2ControlMessage {
    header: V2Header,
    avps: Vec<Avp>,
}

impl V2ControlMessage {
    pub(crate) fn new(header: V2Header, avps: Vec<Avp>) -> Self {
        Self { header, avps }
    }

    /// Decodes one message from a frame.
    ///
    /// The body spans the header's declared length; octets past it are
    /// ignored, and a declared length running past the frame is
    /// [`MessageError::MalformedLength`]. Splitting a buffer of
    /// concatenated messages is
    /// [`parse_message_buffer`](super::parse_message_buffer)'s job. A
    /// 12-octet body-less frame is a ZLB and decodes to an empty AVP
    /// sequence; a longer body must start with a well-formed Message Type
    /// AVP carrying a 2-octet value.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, MessageError> {
        let (header, _) =
            V2Header::read_from_prefix(frame).map_err(|_| MessageError::TruncatedHeader {
                what: "L2TPv2 header",
                need: V2_HEADER_LEN,
                have: frame.len(),
            })?;
        let declared = header.length() as usize;
        if declared < V2_HEADER_LEN || declared > frame.len() {
            return Err(MessageError::MalformedLength {
                length: header.length(),
                available: frame.len(),
            });
        }
        let body = &frame[V2_HEADER_LEN..declared];

        let avps = if body.is_empty() {
            Vec::new()
        } else {
            let avps =
                crate::avp::parse_avp_buffer(body).map_err(MessageError::AvpSequence)?;
            match avps.first() {
                Some(first) if first.avp_type() == AvpType::MessageType => {
                    first.decode_message_type().map_err(|source| {
                        MessageError::AvpDecode {
                            avp_type: AvpType::MessageType,
                            source,
                        }
                    })?;
                }
                _ => return Err(MessageError::FirstAvpNotMessageType),
            }
            avps
        };

        Ok(Self { header, avps })
    }

    /// Returns the header.
    #[inline]
    pub fn header(&self) -> &V2Header {
        &self.header
    }

    /// Returns the Tunnel ID.
    #[inline]
    pub fn tunnel_id(&self) -> u16 {
        self.header.tunnel_id()
    }

    /// Returns the Session ID.
    #[inline]
    pub fn session_id(&self) -> u16 {
        self.header.session_id()
    }

    /// Returns the Ns sequence number.
    #[inline]
    pub fn ns(&self) -> u16 {
        self.header.ns()
    }

    /// Returns the Nr sequence number.
    #[inline]
    pub fn nr(&self) -> u16 {
        self.header.nr()
    }

    /// Returns the total encoded length in octets, header included.
    #[inline]
    pub fn len(&self) -> usize {
        self.header.length() as usize
    }

    /// Returns whether the message body is empty (ZLB).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.avps.is_empty()
    }

    /// Returns the message's AVPs in wire order.
    #[inline]
    pub fn avps(&self) -> &[Avp] {
        &self.avps
    }

    /// Returns the control message type derived from the first AVP, or
    /// [`MessageType::Ack`] for a ZLB.
    ///
    /// # Panics
    ///
    /// Panics if a non-empty message does not start with a well-formed
    /// Message Type AVP. [`from_bytes`](Self::from_bytes) and the builders
    /// both establish that invariant.
    pub fn message_type(&self) -> MessageType {
        let Some(first) = self.avps.first() else {
            return MessageType::Ack;
        };
        match first.decode_message_type() {
            Ok(mt) => mt,
            Err(e) => panic!("first AVP is not a well-formed Message Type AVP: {}", e),
        }
    }

    /// Appends an AVP, updating the header length field. Fails with
    /// [`MessageError::OversizeMessage`] if the message would outgrow the
    /// header's 16-bit length field, leaving the message unchanged.
    pub fn append_avp(&mut self, avp: Avp) -> Result<(), MessageError> {
        let length = self.len() + avp.total_len();
        if length > CONTROL_MESSAGE_MAX_LEN {
            return Err(MessageError::OversizeMessage { length });
        }
        self.header.set_length(length as u16);
        self.avps.push(avp);
        Ok(())
    }

    /// Stamps the Ns/Nr sequence numbers prior to transmission.
    pub fn set_sequence_numbers(&mut self, ns: u16, nr: u16) {
        self.header.set_ns(ns);
        self.header.set_nr(nr);
    }

    /// Encodes the message to its wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(self.header.as_bytes());
        for avp in &self.avps {
            avp.encode_into(&mut out);
        }
        out
    }

    /// Checks the AVP sequence against the table for this message type.
    pub fn validate(&self) -> Result<(), MessageError> {
        spec::validate(self.message_type(), &self.avps)
    }
}

/// Local parameters for building control connection establishment messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Tunnel ID assigned by this end, carried in the Assigned Tunnel ID
    /// AVP. Must fit the protocol's 16-bit field.
    pub local_tunnel_id: u32,
    /// Tunnel ID assigned by the peer, stamped into the header. Zero until
    /// the peer's SCCRQ/SCCRP names one. Must fit 16 bits.
    pub peer_tunnel_id: u32,
    /// Host name sent in the Host Name AVP.
    pub host_name: String,
    /// Framing Capabilities AVP bitmask (bit 0 sync, bit 1 async).
    pub framing_caps: u32,
}

fn v2_id(id: u32) -> Result<u16, MessageError> {
    u16::try_from(id).map_err(|_| MessageError::IdOutOfRange(id))
}

fn build(peer_tunnel_id: u32, message_type: MessageType) -> Result<V2ControlMessage, MessageError> {
    let header = V2Header::new(v2_id(peer_tunnel_id)?, 0);
    let mut msg = V2ControlMessage::new(header, Vec::new());
    append(
        &mut msg,
        AvpType::MessageType,
        AvpValue::U16(message_type.to_u16()),
    )?;
    Ok(msg)
}

fn append(
    msg: &mut V2ControlMessage,
    avp_type: AvpType,
    value: AvpValue,
) -> Result<(), MessageError> {
    let avp = Avp::new(0, avp_type, value)
        .map_err(|source| MessageError::AvpDecode { avp_type, source })?;
    msg.append_avp(avp)
}

/// Builds a Start-Control-Connection-Request.
///
/// The header Tunnel ID is the peer's (zero at this point in the
/// handshake); our ID travels in the Assigned Tunnel ID AVP. Sequence
/// numbers are left at zero for the transmit path to stamp.
pub fn build_sccrq(cfg: &TunnelConfig) -> Result<V2ControlMessage, MessageError> {
    let local_id = v2_id(cfg.local_tunnel_id)?;
    let mut msg = build(cfg.peer_tunnel_id, MessageType::Sccrq)?;
    append(&mut msg, AvpType::ProtocolVersion, AvpValue::Bytes(vec![1, 0]))?;
    append(
        &mut msg,
        AvpType::HostName,
        AvpValue::Text(cfg.host_name.clone()),
    )?;
    append(
        &mut msg,
        AvpType::FramingCapabilities,
        AvpValue::U32(cfg.framing_caps),
    )?;
    append(&mut msg, AvpType::AssignedTunnelId, AvpValue::U16(local_id))?;
    Ok(msg)
}

/// Builds a Start-Control-Connection-Reply.
pub fn build_sccrp(cfg: &TunnelConfig) -> Result<V2ControlMessage, MessageError> {
    let local_id = v2_id(cfg.local_tunnel_id)?;
    let mut msg = build(cfg.peer_tunnel_id, MessageType::Sccrp)?;
    append(&mut msg, AvpType::ProtocolVersion, AvpValue::Bytes(vec![1, 0]))?;
    append(
        &mut msg,
        AvpType::FramingCapabilities,
        AvpValue::U32(cfg.framing_caps),
    )?;
    append(
        &mut msg,
        AvpType::HostName,
        AvpValue::Text(cfg.host_name.clone()),
    )?;
    append(&mut msg, AvpType::AssignedTunnelId, AvpValue::U16(local_id))?;
    Ok(msg)
}

/// Builds a Start-Control-Connection-Connected.
pub fn build_scccn(cfg: &TunnelConfig) -> Result<V2ControlMessage, MessageError> {
    build(cfg.peer_tunnel_id, MessageType::Scccn)
}

/// Builds a Stop-Control-Connection-Notification carrying the given result
/// code.
pub fn build_stopccn(
    cfg: &TunnelConfig,
    result: ResultCode,
) -> Result<V2ControlMessage, MessageError> {
    let local_id = v2_id(cfg.local_tunnel_id)?;
    let mut msg = build(cfg.peer_tunnel_id, MessageType::StopCcn)?;
    append(&mut msg, AvpType::AssignedTunnelId, AvpValue::U16(local_id))?;
    append(&mut msg, AvpType::ResultCode, AvpValue::ResultCode(result))?;
    Ok(msg)
}

/// Builds a Hello keep-alive.
pub fn build_hello(cfg: &TunnelConfig) -> Result<V2ControlMessage, MessageError> {
    build(cfg.peer_tunnel_id, MessageType::Hello)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TunnelConfig {
        TunnelConfig {
            local_tunnel_id: 9,
            peer_tunnel_id: 2,
            host_name: "lac.example.net".to_owned(),
            framing_caps: 0x3,
        }
    }

    #[test]
    fn test_build_sccrq() {
        let msg = build_sccrq(&cfg()).unwrap();
        assert_eq!(msg.message_type(), MessageType::Sccrq);
        assert_eq!(msg.tunnel_id(), 2);
        assert_eq!(msg.session_id(), 0);
        assert_eq!(msg.ns(), 0);
        assert_eq!(msg.nr(), 0);
        assert_eq!(msg.avps().len(), 5);
        // 12 + 8 + 8 + (6 + 15) + 10 + 8
        assert_eq!(msg.len(), 67);
        msg.validate().unwrap();
    }

    #[test]
    fn test_build_sccrp() {
        let msg = build_sccrp(&cfg()).unwrap();
        assert_eq!(msg.message_type(), MessageType::Sccrp);
        assert_eq!(msg.avps().len(), 5);
        msg.validate().unwrap();
    }

    #[test]
    fn test_build_scccn_and_hello() {
        let msg = build_scccn(&cfg()).unwrap();
        assert_eq!(msg.message_type(), MessageType::Scccn);
        assert_eq!(msg.avps().len(), 1);
        assert_eq!(msg.len(), 20);
        msg.validate().unwrap();

        let msg = build_hello(&cfg()).unwrap();
        assert_eq!(msg.message_type(), MessageType::Hello);
        assert_eq!(msg.len(), 20);
        msg.validate().unwrap();
    }

    #[test]
    fn test_build_stopccn() {
        let rc = ResultCode {
            result: 1,
            error: Some(0),
            message: "goodbye".to_owned(),
        };
        let msg = build_stopccn(&cfg(), rc.clone()).unwrap();
        assert_eq!(msg.message_type(), MessageType::StopCcn);
        msg.validate().unwrap();
        assert_eq!(
            msg.avps()[2].decode().unwrap(),
            AvpValue::ResultCode(rc)
        );
    }

    #[test]
    fn test_local_id_out_of_range() {
        let mut c = cfg();
        c.local_tunnel_id = 70_000;
        let err = build_sccrq(&c).unwrap_err();
        assert!(matches!(err, MessageError::IdOutOfRange(70_000)));
        let err = build_stopccn(&c, ResultCode::new(1)).unwrap_err();
        assert!(matches!(err, MessageError::IdOutOfRange(70_000)));
    }

    #[test]
    fn test_peer_id_out_of_range() {
        let mut c = cfg();
        c.peer_tunnel_id = 0x1_0000;
        let err = build_hello(&c).unwrap_err();
        assert!(matches!(err, MessageError::IdOutOfRange(0x1_0000)));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let msg = build_stopccn(&cfg(), ResultCode::new(1)).unwrap();
        msg.validate().unwrap();
        msg.validate().unwrap();
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let msg = build_sccrq(&cfg()).unwrap();
        let wire = msg.to_bytes();
        assert_eq!(wire.len(), msg.len());

        let decoded = V2ControlMessage::from_bytes(&wire).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_append_avp_updates_length() {
        let mut msg = build_hello(&cfg()).unwrap();
        let before = msg.len();
        let avp = Avp::new(0, AvpType::VendorName, AvpValue::Text("acme".into())).unwrap();
        msg.append_avp(avp).unwrap();
        assert_eq!(msg.len(), before + 10);
        assert_eq!(msg.to_bytes().len(), msg.len());
    }

    #[test]
    fn test_append_avp_rejects_oversize_message() {
        let mut msg = build_hello(&cfg()).unwrap();
        let pad = Avp::new(0, AvpType::Challenge, AvpValue::Bytes(vec![0; 1000])).unwrap();
        for _ in 0..65 {
            msg.append_avp(pad.clone()).unwrap();
        }
        assert_eq!(msg.len(), 65_410);
        let err = msg.append_avp(pad).unwrap_err();
        assert!(matches!(err, MessageError::OversizeMessage { length: 66_416 }));
        // The failed append leaves the message intact and encodable
        assert_eq!(msg.len(), 65_410);
        assert_eq!(msg.to_bytes().len(), 65_410);
    }

    #[test]
    fn test_set_sequence_numbers() {
        let mut msg = build_hello(&cfg()).unwrap();
        msg.set_sequence_numbers(5, 3);
        assert_eq!(msg.ns(), 5);
        assert_eq!(msg.nr(), 3);
        let wire = msg.to_bytes();
        assert_eq!(&wire[8..12], &[0x00, 0x05, 0x00, 0x03]);
    }

    #[test]
    fn test_zlb_decodes_to_empty_message() {
        let buf = [
            0xC8, 0x02, 0x00, 0x0C, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02,
        ];
        let msg = V2ControlMessage::from_bytes(&buf).unwrap();
        assert!(msg.is_empty());
        assert_eq!(msg.message_type(), MessageType::Ack);
        assert_eq!(msg.tunnel_id(), 4);
    }

    #[test]
    fn test_truncated_frame() {
        let buf = [0xC8, 0x02, 0x00, 0x0C, 0x00, 0x04];
        let err = V2ControlMessage::from_bytes(&buf).unwrap_err();
        assert!(matches!(
            err,
            MessageError::TruncatedHeader { need: 12, have: 6, .. }
        ));
    }

    #[test]
    fn test_malformed_message_type_value_rejected_at_decode() {
        // First AVP is type 0 (Message Type) but carries 3 octets
        let buf = [
            0xC8, 0x02, 0x00, 0x15, // Length: 21
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x80, 0x09, 0x00, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC,
        ];
        let err = V2ControlMessage::from_bytes(&buf).unwrap_err();
        assert!(matches!(
            err,
            MessageError::AvpDecode {
                avp_type: AvpType::MessageType,
                ..
            }
        ));
        // The frame never reaches the caller through the buffer parser
        assert!(crate::message::parse_message_buffer(&buf).is_err());
    }

    #[test]
    fn test_body_bounded_by_declared_length() {
        // A 20-octet Hello frame with 3 octets of trailing garbage
        let mut buf = build_hello(&cfg()).unwrap().to_bytes();
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let msg = V2ControlMessage::from_bytes(&buf).unwrap();
        assert_eq!(msg.len(), 20);
        assert_eq!(msg.avps().len(), 1);
        assert_eq!(msg.message_type(), MessageType::Hello);
    }

    #[test]
    fn test_declared_length_past_frame_end() {
        let mut buf = build_hello(&cfg()).unwrap().to_bytes();
        buf[3] = 0x40; // Length: 64 in a 20-octet frame
        let err = V2ControlMessage::from_bytes(&buf).unwrap_err();
        assert!(matches!(
            err,
            MessageError::MalformedLength {
                length: 64,
                available: 20
            }
        ));
    }

    #[test]
    fn test_bad_avp_sequence() {
        // 3 octets of body cannot hold an AVP header
        let buf = [
            0xC8, 0x02, 0x00, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xAA, 0xBB,
            0xCC,
        ];
        let err = V2ControlMessage::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, MessageError::AvpSequence(_)));
    }

    #[test]
    #[should_panic(expected = "not a well-formed Message Type")]
    fn test_message_type_panics_on_hand_assembled_body() {
        let avp = Avp::new(0, AvpType::HostName, AvpValue::Text("x".into())).unwrap();
        let msg = V2ControlMessage::new(V2Header::new(0, 0), vec![avp]);
        msg.message_type();
    }
}
