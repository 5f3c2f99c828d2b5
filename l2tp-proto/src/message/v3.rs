//! L2TPv3 control messages
//!
//! Only the transmit side is implemented: messages can be built and
//! encoded, but decoding an L2TPv3 frame fails with
//! [`MessageError::UnimplementedV3Decode`]. RFC 3931 AVP semantics (notably
//! the Message Type digest and control connection setup AVPs) differ enough
//! from RFC 2661 that a receive path needs its own tables.

use zerocopy::IntoBytes;

use crate::avp::{Avp, AvpType, MessageType};

use super::header::{V3Header, CONTROL_MESSAGE_MAX_LEN};
use super::{spec, MessageError};

/// A built L2TPv3 control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3ControlMessage {
    header: V3Header,
    avps: Vec<Avp>,
}

impl V3ControlMessage {
    /// A new message addressed to the given control connection, with
    /// sequence numbers zeroed for the transmit path to stamp.
    ///
    /// A non-empty AVP sequence must start with a well-formed Message Type
    /// AVP, and the whole sequence must fit the header's 16-bit length
    /// field.
    pub fn new(control_connection_id: u32, avps: Vec<Avp>) -> Result<Self, MessageError> {
        if let Some(first) = avps.first() {
            if first.avp_type() != AvpType::MessageType {
                return Err(MessageError::FirstAvpNotMessageType);
            }
            first.decode_message_type().map_err(|source| {
                MessageError::AvpDecode {
                    avp_type: AvpType::MessageType,
                    source,
                }
            })?;
        }
        let mut msg = Self {
            header: V3Header::new(control_connection_id),
            avps: Vec::with_capacity(avps.len()),
        };
        for avp in avps {
            msg.append_avp(avp)?;
        }
        Ok(msg)
    }

    /// Decoding L2TPv3 control messages is not implemented; this always
    /// fails with [`MessageError::UnimplementedV3Decode`].
    pub fn from_bytes(_frame: &[u8]) -> Result<Self, MessageError> {
        Err(MessageError::UnimplementedV3Decode)
    }

    /// Returns the header.
    #[inline]
    pub fn header(&self) -> &V3Header {
        &self.header
    }

    /// Returns the Control Connection ID.
    #[inline]
    pub fn control_connection_id(&self) -> u32 {
        self.header.control_connection_id()
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
    /// [`MessageType::Ack`] for an empty body.
    ///
    /// # Panics
    ///
    /// Panics if a non-empty message does not start with a well-formed
    /// Message Type AVP.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::{AvpType, AvpValue};
    use crate::message::parse_message_buffer;

    fn message_type_avp(mt: MessageType) -> Avp {
        Avp::new(0, AvpType::MessageType, AvpValue::U16(mt.to_u16())).unwrap()
    }

    #[test]
    fn test_decode_unimplemented() {
        let buf = [
            0xC8, 0x03, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        let err = V3ControlMessage::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, MessageError::UnimplementedV3Decode));
    }

    #[test]
    fn test_buffer_parse_rejects_v3() {
        // A v3 ZLB in an otherwise valid buffer aborts the whole parse
        let buf = [
            0xC8, 0x03, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        let err = parse_message_buffer(&buf).unwrap_err();
        assert!(matches!(err, MessageError::UnimplementedV3Decode));
    }

    #[test]
    fn test_encode_empty_message() {
        let msg = V3ControlMessage::new(0x01020304, Vec::new()).unwrap();
        assert_eq!(msg.len(), 12);
        assert_eq!(msg.message_type(), MessageType::Ack);
        let wire = msg.to_bytes();
        assert_eq!(
            wire,
            vec![0xC8, 0x03, 0x00, 0x0C, 0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_with_avps() {
        let mut msg =
            V3ControlMessage::new(7, vec![message_type_avp(MessageType::Hello)]).unwrap();
        assert_eq!(msg.message_type(), MessageType::Hello);
        assert_eq!(msg.len(), 20);

        msg.set_sequence_numbers(2, 9);
        let wire = msg.to_bytes();
        assert_eq!(wire.len(), 20);
        assert_eq!(&wire[..2], &[0xC8, 0x03]);
        assert_eq!(&wire[8..12], &[0x00, 0x02, 0x00, 0x09]);
    }

    #[test]
    fn test_new_rejects_bad_first_avp() {
        let host = Avp::new(0, AvpType::HostName, AvpValue::Text("x".into())).unwrap();
        let err = V3ControlMessage::new(7, vec![host]).unwrap_err();
        assert!(matches!(err, MessageError::FirstAvpNotMessageType));
    }

    #[test]
    fn test_append_avp_rejects_oversize_message() {
        let mut msg =
            V3ControlMessage::new(7, vec![message_type_avp(MessageType::Hello)]).unwrap();
        let pad = Avp::new(0, AvpType::Challenge, AvpValue::Bytes(vec![0; 1000])).unwrap();
        for _ in 0..65 {
            msg.append_avp(pad.clone()).unwrap();
        }
        assert_eq!(msg.len(), 65_410);
        let err = msg.append_avp(pad).unwrap_err();
        assert!(matches!(err, MessageError::OversizeMessage { length: 66_416 }));
        assert_eq!(msg.len(), 65_410);
        assert_eq!(msg.avps().len(), 66);
    }
}
