//! Per-message-type AVP tables and validation
//!
//! Each control connection management message type has a table of the AVPs
//! RFC 2661 requires and permits. Shallow validation walks a message's AVP
//! sequence against its table: every present AVP must be listed and must
//! decode, and every mandatory AVP must be present. Order beyond the
//! leading Message Type AVP is not checked, matching the RFC's "in any
//! order" rule.

use smallvec::SmallVec;

use crate::avp::{Avp, AvpType, AvpValue, MessageType};

use super::v2::V2ControlMessage;
use super::MessageError;

/// The AVPs a message type requires and permits.
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    /// AVPs that must be present.
    pub mandatory: &'static [AvpType],
    /// AVPs that may be present.
    pub optional: &'static [AvpType],
}

static SCCRQ: MessageSpec = MessageSpec {
    mandatory: &[
        AvpType::MessageType,
        AvpType::ProtocolVersion,
        AvpType::HostName,
        AvpType::FramingCapabilities,
        AvpType::AssignedTunnelId,
    ],
    optional: &[
        AvpType::BearerCapabilities,
        AvpType::ReceiveWindowSize,
        AvpType::Challenge,
        AvpType::TieBreaker,
        AvpType::FirmwareRevision,
        AvpType::VendorName,
    ],
};

static SCCRP: MessageSpec = MessageSpec {
    mandatory: &[
        AvpType::MessageType,
        AvpType::ProtocolVersion,
        AvpType::FramingCapabilities,
        AvpType::HostName,
        AvpType::AssignedTunnelId,
    ],
    optional: &[
        AvpType::BearerCapabilities,
        AvpType::ReceiveWindowSize,
        AvpType::Challenge,
        AvpType::ChallengeResponse,
        AvpType::TieBreaker,
        AvpType::FirmwareRevision,
        AvpType::VendorName,
    ],
};

static SCCCN: MessageSpec = MessageSpec {
    mandatory: &[AvpType::MessageType],
    optional: &[AvpType::ChallengeResponse],
};

static STOPCCN: MessageSpec = MessageSpec {
    mandatory: &[
        AvpType::MessageType,
        AvpType::AssignedTunnelId,
        AvpType::ResultCode,
    ],
    optional: &[],
};

static HELLO: MessageSpec = MessageSpec {
    mandatory: &[AvpType::MessageType],
    optional: &[],
};

/// Looks up the AVP table for a message type.
///
/// Tables exist for the control connection management messages (SCCRQ,
/// SCCRP, SCCCN, StopCCN, Hello); call management messages have none yet
/// and validate as [`MessageError::NoSpecForMessageType`].
pub fn for_message(message_type: MessageType) -> Option<&'static MessageSpec> {
    match message_type {
        MessageType::Sccrq => Some(&SCCRQ),
        MessageType::Sccrp => Some(&SCCRP),
        MessageType::Scccn => Some(&SCCCN),
        MessageType::StopCcn => Some(&STOPCCN),
        MessageType::Hello => Some(&HELLO),
        _ => None,
    }
}

/// Shallow-validates an AVP sequence against the table for `message_type`.
pub(crate) fn validate(
    message_type: MessageType,
    avps: &[Avp],
) -> Result<(), MessageError> {
    let spec = for_message(message_type)
        .ok_or(MessageError::NoSpecForMessageType(message_type))?;

    let mut seen: SmallVec<[bool; 8]> = SmallVec::from_elem(false, spec.mandatory.len());
    for avp in avps {
        let avp_type = avp.avp_type();
        match spec.mandatory.iter().position(|t| *t == avp_type) {
            Some(idx) => seen[idx] = true,
            None if spec.optional.contains(&avp_type) => {}
            None => {
                return Err(MessageError::UnexpectedAvp {
                    avp_type,
                    message_type,
                });
            }
        }
        avp.decode()
            .map_err(|source| MessageError::AvpDecode { avp_type, source })?;
    }

    if let Some(idx) = seen.iter().position(|s| !s) {
        return Err(MessageError::MissingMandatoryAvp {
            avp_type: spec.mandatory[idx],
            message_type,
        });
    }
    Ok(())
}

/// Deep-validates an SCCRP: beyond the shallow table check, each mandatory
/// AVP's value must have the shape a control connection originator relies
/// on before moving to the connected state.
pub fn validate_sccrp(msg: &V2ControlMessage) -> Result<(), MessageError> {
    validate(MessageType::Sccrp, msg.avps())?;
    for avp in msg.avps() {
        let avp_type = avp.avp_type();
        let value = avp
            .decode()
            .map_err(|source| MessageError::AvpDecode { avp_type, source })?;
        match (avp_type, &value) {
            // Version octet pair, always {1, 0} for RFC 2661
            (AvpType::ProtocolVersion, AvpValue::Bytes(b)) if b.len() == 2 => {}
            (AvpType::ProtocolVersion, _) => {
                return Err(MessageError::AvpDecode {
                    avp_type,
                    source: crate::avp::AvpError::WrongValueLength {
                        avp_type,
                        expected: 2,
                        have: avp.value().len(),
                    },
                });
            }
            (AvpType::FramingCapabilities, AvpValue::U32(_)) => {}
            (AvpType::HostName, AvpValue::Text(_)) => {}
            (AvpType::AssignedTunnelId, AvpValue::U16(_)) => {}
            // Shallow validation already typed the rest
            _ => {}
        }
    }
    Ok(())
}

/// Deep validation of SCCCN is not implemented (challenge response
/// verification needs the shared secret).
pub fn validate_scccn(_msg: &V2ControlMessage) -> Result<(), MessageError> {
    Err(MessageError::UnimplementedDeepValidator(MessageType::Scccn))
}

/// Deep validation of StopCCN is not implemented.
pub fn validate_stopccn(_msg: &V2ControlMessage) -> Result<(), MessageError> {
    Err(MessageError::UnimplementedDeepValidator(MessageType::StopCcn))
}

/// Deep validation of Hello is not implemented.
pub fn validate_hello(_msg: &V2ControlMessage) -> Result<(), MessageError> {
    Err(MessageError::UnimplementedDeepValidator(MessageType::Hello))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{build_hello, build_sccrp, parse_message_buffer, TunnelConfig};

    fn cfg() -> TunnelConfig {
        TunnelConfig {
            local_tunnel_id: 3,
            peer_tunnel_id: 1,
            host_name: "lns".to_owned(),
            framing_caps: 0x1,
        }
    }

    #[test]
    fn test_table_lookup() {
        assert!(for_message(MessageType::Sccrq).is_some());
        assert!(for_message(MessageType::Hello).is_some());
        assert!(for_message(MessageType::Icrq).is_none());
        assert!(for_message(MessageType::Ack).is_none());
        assert!(for_message(MessageType::Unknown(99)).is_none());
    }

    #[test]
    fn test_no_spec_for_message_type() {
        // An OCRQ-shaped body: Message Type AVP carrying 7
        let buf = [
            0xC8, 0x02, 0x00, 0x14, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x80, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07,
        ];
        let msgs = parse_message_buffer(&buf).unwrap();
        let err = msgs[0].validate().unwrap_err();
        assert!(matches!(
            err,
            MessageError::NoSpecForMessageType(MessageType::Ocrq)
        ));
    }

    #[test]
    fn test_unexpected_avp() {
        let mut msg = build_hello(&cfg()).unwrap();
        let avp = Avp::new(0, AvpType::HostName, AvpValue::Text("x".into())).unwrap();
        msg.append_avp(avp).unwrap();
        let err = msg.validate().unwrap_err();
        assert!(matches!(
            err,
            MessageError::UnexpectedAvp {
                avp_type: AvpType::HostName,
                message_type: MessageType::Hello
            }
        ));
    }

    #[test]
    fn test_optional_avp_accepted() {
        let mut msg = crate::message::build_sccrq(&cfg()).unwrap();
        let avp = Avp::new(0, AvpType::VendorName, AvpValue::Text("acme".into())).unwrap();
        msg.append_avp(avp).unwrap();
        msg.validate().unwrap();
    }

    #[test]
    fn test_avp_decode_failure() {
        // SCCRQ with a 3-octet Framing Capabilities AVP, wire-crafted
        let buf = [
            0xC8, 0x02, 0x00, 0x1D, // Length: 29
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // Message Type: SCCRQ
            0x80, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            // Framing Capabilities, 3-octet value
            0x80, 0x09, 0x00, 0x00, 0x00, 0x03, 0xAA, 0xBB, 0xCC,
        ];
        let msgs = parse_message_buffer(&buf).unwrap();
        let err = msgs[0].validate().unwrap_err();
        assert!(matches!(
            err,
            MessageError::AvpDecode {
                avp_type: AvpType::FramingCapabilities,
                ..
            }
        ));
    }

    #[test]
    fn test_deep_validate_sccrp() {
        let msg = build_sccrp(&cfg()).unwrap();
        validate_sccrp(&msg).unwrap();
    }

    #[test]
    fn test_deep_validate_sccrp_bad_protocol_version() {
        // SCCRP whose Protocol Version AVP carries 3 octets
        let mut buf = vec![
            0xC8, 0x02, 0x00, 0x38, // Length: 56
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // Message Type: SCCRP
            0x80, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
            // Protocol Version, 3 octets
            0x80, 0x09, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x00,
            // Framing Capabilities
            0x80, 0x0A, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01,
            // Host Name: "lns"
            0x80, 0x09, 0x00, 0x00, 0x00, 0x07, b'l', b'n', b's',
        ];
        buf.extend_from_slice(&[
            // Assigned Tunnel ID: 3
            0x80, 0x08, 0x00, 0x00, 0x00, 0x09, 0x00, 0x03,
        ]);
        assert_eq!(buf.len(), 56);

        let msg = V2ControlMessage::from_bytes(&buf).unwrap();
        let err = validate_sccrp(&msg).unwrap_err();
        assert!(matches!(
            err,
            MessageError::AvpDecode {
                avp_type: AvpType::ProtocolVersion,
                ..
            }
        ));
    }

    #[test]
    fn test_deep_validator_stubs() {
        let msg = build_hello(&cfg()).unwrap();
        assert!(matches!(
            validate_hello(&msg).unwrap_err(),
            MessageError::UnimplementedDeepValidator(MessageType::Hello)
        ));
        assert!(matches!(
            validate_scccn(&msg).unwrap_err(),
            MessageError::UnimplementedDeepValidator(MessageType::Scccn)
        ));
        assert!(matches!(
            validate_stopccn(&msg).unwrap_err(),
            MessageError::UnimplementedDeepValidator(MessageType::StopCcn)
        ));
    }
}
