//! AVP (Attribute Value Pair) codec for L2TP control messages
//!
//! Control message bodies are a sequence of back-to-back AVPs as defined in
//! RFC 2661 section 4.1:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |M|H| rsvd  |      Length       |           Vendor ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Attribute Type        |        Attribute Value...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The 10-bit Length field counts the 6-octet header plus the value. Decoded
//! AVPs own a copy of their value bytes, so a parsed sequence never borrows
//! from the receive buffer.
//!
//! Hidden AVPs (H bit set) use an obfuscation scheme this crate does not
//! implement; parsing one fails with [`AvpError::HiddenNotSupported`].
//!
//! # Examples
//!
//! ```
//! use l2tp_proto::avp::{parse_avp_buffer, AvpType, AvpValue};
//!
//! // A single Message Type AVP carrying SCCRQ (1)
//! let buf = vec![
//!     0x80, 0x08, // M=1, H=0, Length: 8
//!     0x00, 0x00, // Vendor ID: 0 (IETF)
//!     0x00, 0x00, // Attribute Type: Message Type
//!     0x00, 0x01, // Value: 1
//! ];
//!
//! let avps = parse_avp_buffer(&buf).unwrap();
//! assert_eq!(avps.len(), 1);
//! assert_eq!(avps[0].avp_type(), AvpType::MessageType);
//! assert!(avps[0].is_mandatory());
//! assert_eq!(avps[0].decode().unwrap(), AvpValue::U16(1));
//! ```

use std::fmt::{self, Formatter};

use thiserror::Error;
use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, IntoBytes, Unaligned};

/// Errors raised by the AVP codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvpError {
    /// Fewer octets remain than an AVP header requires.
    #[error("AVP buffer too short: need {need} octets, have {have}")]
    TooShort {
        /// Octets required.
        need: usize,
        /// Octets available.
        have: usize,
    },

    /// The AVP's declared length is below the header size or runs past the
    /// end of the buffer.
    #[error("AVP declares length {length} but buffer holds {available} octets")]
    BadLength {
        /// Declared total length.
        length: usize,
        /// Octets available.
        available: usize,
    },

    /// The H (hidden) bit is set; attribute hiding is not supported.
    #[error("hidden AVPs are not supported")]
    HiddenNotSupported,

    /// The supplied value does not match the attribute's RFC data type.
    #[error("{avp_type} AVP does not carry a {expected} value")]
    WrongKind {
        /// The attribute being built or decoded.
        avp_type: AvpType,
        /// The data kind the attribute requires.
        expected: AvpDataKind,
    },

    /// The value payload has the wrong size for the attribute's data type.
    #[error("{avp_type} AVP value is {have} octets, expected {expected}")]
    WrongValueLength {
        /// The attribute being decoded.
        avp_type: AvpType,
        /// Octets the data type requires.
        expected: usize,
        /// Octets present.
        have: usize,
    },

    /// A string-typed attribute value is not valid UTF-8.
    #[error("{avp_type} AVP value is not valid UTF-8")]
    BadString {
        /// The attribute being decoded.
        avp_type: AvpType,
    },

    /// The value is too large for the AVP header's 10-bit length field.
    #[error("AVP value of {length} octets overflows the 10-bit length field")]
    Oversize {
        /// Value octet count.
        length: usize,
    },
}

/// L2TP AVP attribute types from RFC 2661 section 4.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvpType {
    /// Message Type AVP
    MessageType,
    /// Result Code AVP
    ResultCode,
    /// Protocol Version AVP
    ProtocolVersion,
    /// Framing Capabilities AVP
    FramingCapabilities,
    /// Bearer Capabilities AVP
    BearerCapabilities,
    /// Tie Breaker AVP
    TieBreaker,
    /// Firmware Revision AVP
    FirmwareRevision,
    /// Host Name AVP
    HostName,
    /// Vendor Name AVP
    VendorName,
    /// Assigned Tunnel ID AVP
    AssignedTunnelId,
    /// Receive Window Size AVP
    ReceiveWindowSize,
    /// Challenge AVP
    Challenge,
    /// Cause Code AVP (Q.931)
    Q931CauseCode,
    /// Challenge Response AVP
    ChallengeResponse,
    /// Assigned Session ID AVP
    AssignedSessionId,
    /// Call Serial Number AVP
    CallSerialNumber,
    /// Minimum BPS AVP
    MinimumBps,
    /// Maximum BPS AVP
    MaximumBps,
    /// Bearer Type AVP
    BearerType,
    /// Framing Type AVP
    FramingType,
    /// Called Number AVP
    CalledNumber,
    /// Calling Number AVP
    CallingNumber,
    /// Sub-Address AVP
    SubAddress,
    /// Tx Connect Speed AVP
    TxConnectSpeed,
    /// Physical Channel ID AVP
    PhysicalChannelId,
    /// Initial Received LCP CONFREQ AVP
    InitialReceivedLcpConfreq,
    /// Last Sent LCP CONFREQ AVP
    LastSentLcpConfreq,
    /// Last Received LCP CONFREQ AVP
    LastReceivedLcpConfreq,
    /// Proxy Authen Type AVP
    ProxyAuthenType,
    /// Proxy Authen Name AVP
    ProxyAuthenName,
    /// Proxy Authen Challenge AVP
    ProxyAuthenChallenge,
    /// Proxy Authen ID AVP
    ProxyAuthenId,
    /// Proxy Authen Response AVP
    ProxyAuthenResponse,
    /// Call Errors AVP
    CallErrors,
    /// ACCM AVP
    Accm,
    /// Random Vector AVP
    RandomVector,
    /// Private Group ID AVP
    PrivateGroupId,
    /// Rx Connect Speed AVP
    RxConnectSpeed,
    /// Sequencing Required AVP
    SequencingRequired,
    /// Unknown attribute type
    Unknown(u16),
}

impl From<u16> for AvpType {
    fn from(value: u16) -> Self {
        match value {
            0 => AvpType::MessageType,
            1 => AvpType::ResultCode,
            2 => AvpType::ProtocolVersion,
            3 => AvpType::FramingCapabilities,
            4 => AvpType::BearerCapabilities,
            5 => AvpType::TieBreaker,
            6 => AvpType::FirmwareRevision,
            7 => AvpType::HostName,
            8 => AvpType::VendorName,
            9 => AvpType::AssignedTunnelId,
            10 => AvpType::ReceiveWindowSize,
            11 => AvpType::Challenge,
            12 => AvpType::Q931CauseCode,
            13 => AvpType::ChallengeResponse,
            14 => AvpType::AssignedSessionId,
            15 => AvpType::CallSerialNumber,
            16 => AvpType::MinimumBps,
            17 => AvpType::MaximumBps,
            18 => AvpType::BearerType,
            19 => AvpType::FramingType,
            21 => AvpType::CalledNumber,
            22 => AvpType::CallingNumber,
            23 => AvpType::SubAddress,
            24 => AvpType::TxConnectSpeed,
            25 => AvpType::PhysicalChannelId,
            26 => AvpType::InitialReceivedLcpConfreq,
            27 => AvpType::LastSentLcpConfreq,
            28 => AvpType::LastReceivedLcpConfreq,
            29 => AvpType::ProxyAuthenType,
            30 => AvpType::ProxyAuthenName,
            31 => AvpType::ProxyAuthenChallenge,
            32 => AvpType::ProxyAuthenId,
            33 => AvpType::ProxyAuthenResponse,
            34 => AvpType::CallErrors,
            35 => AvpType::Accm,
            36 => AvpType::RandomVector,
            37 => AvpType::PrivateGroupId,
            38 => AvpType::RxConnectSpeed,
            39 => AvpType::SequencingRequired,
            v => AvpType::Unknown(v),
        }
    }
}

impl AvpType {
    /// Returns the wire attribute number.
    pub fn to_u16(self) -> u16 {
        match self {
            AvpType::MessageType => 0,
            AvpType::ResultCode => 1,
            AvpType::ProtocolVersion => 2,
            AvpType::FramingCapabilities => 3,
            AvpType::BearerCapabilities => 4,
            AvpType::TieBreaker => 5,
            AvpType::FirmwareRevision => 6,
            AvpType::HostName => 7,
            AvpType::VendorName => 8,
            AvpType::AssignedTunnelId => 9,
            AvpType::ReceiveWindowSize => 10,
            AvpType::Challenge => 11,
            AvpType::Q931CauseCode => 12,
            AvpType::ChallengeResponse => 13,
            AvpType::AssignedSessionId => 14,
            AvpType::CallSerialNumber => 15,
            AvpType::MinimumBps => 16,
            AvpType::MaximumBps => 17,
            AvpType::BearerType => 18,
            AvpType::FramingType => 19,
            AvpType::CalledNumber => 21,
            AvpType::CallingNumber => 22,
            AvpType::SubAddress => 23,
            AvpType::TxConnectSpeed => 24,
            AvpType::PhysicalChannelId => 25,
            AvpType::InitialReceivedLcpConfreq => 26,
            AvpType::LastSentLcpConfreq => 27,
            AvpType::LastReceivedLcpConfreq => 28,
            AvpType::ProxyAuthenType => 29,
            AvpType::ProxyAuthenName => 30,
            AvpType::ProxyAuthenChallenge => 31,
            AvpType::ProxyAuthenId => 32,
            AvpType::ProxyAuthenResponse => 33,
            AvpType::CallErrors => 34,
            AvpType::Accm => 35,
            AvpType::RandomVector => 36,
            AvpType::PrivateGroupId => 37,
            AvpType::RxConnectSpeed => 38,
            AvpType::SequencingRequired => 39,
            AvpType::Unknown(v) => v,
        }
    }

    /// Returns the RFC data type carried in this attribute's value.
    pub fn data_kind(self) -> AvpDataKind {
        match self {
            AvpType::MessageType
            | AvpType::FirmwareRevision
            | AvpType::AssignedTunnelId
            | AvpType::ReceiveWindowSize
            | AvpType::AssignedSessionId
            | AvpType::ProxyAuthenType
            | AvpType::ProxyAuthenId => AvpDataKind::U16,
            AvpType::FramingCapabilities
            | AvpType::BearerCapabilities
            | AvpType::CallSerialNumber
            | AvpType::MinimumBps
            | AvpType::MaximumBps
            | AvpType::BearerType
            | AvpType::FramingType
            | AvpType::TxConnectSpeed
            | AvpType::RxConnectSpeed
            | AvpType::PhysicalChannelId => AvpDataKind::U32,
            AvpType::TieBreaker => AvpDataKind::U64,
            AvpType::HostName
            | AvpType::VendorName
            | AvpType::CalledNumber
            | AvpType::CallingNumber
            | AvpType::SubAddress
            | AvpType::ProxyAuthenName => AvpDataKind::Text,
            AvpType::ResultCode => AvpDataKind::ResultCode,
            _ => AvpDataKind::Bytes,
        }
    }

    /// Returns whether RFC 2661 requires the M bit set for this attribute.
    fn mandatory_on_wire(self) -> bool {
        !matches!(
            self,
            AvpType::TieBreaker
                | AvpType::FirmwareRevision
                | AvpType::VendorName
                | AvpType::PhysicalChannelId
                | AvpType::InitialReceivedLcpConfreq
                | AvpType::LastSentLcpConfreq
                | AvpType::LastReceivedLcpConfreq
                | AvpType::ProxyAuthenType
                | AvpType::ProxyAuthenName
                | AvpType::ProxyAuthenChallenge
                | AvpType::ProxyAuthenId
                | AvpType::ProxyAuthenResponse
                | AvpType::PrivateGroupId
                | AvpType::RxConnectSpeed
                | AvpType::Unknown(_)
        )
    }
}

impl fmt::Display for AvpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AvpType::MessageType => write!(f, "Message Type"),
            AvpType::ResultCode => write!(f, "Result Code"),
            AvpType::ProtocolVersion => write!(f, "Protocol Version"),
            AvpType::FramingCapabilities => write!(f, "Framing Capabilities"),
            AvpType::BearerCapabilities => write!(f, "Bearer Capabilities"),
            AvpType::TieBreaker => write!(f, "Tie Breaker"),
            AvpType::FirmwareRevision => write!(f, "Firmware Revision"),
            AvpType::HostName => write!(f, "Host Name"),
            AvpType::VendorName => write!(f, "Vendor Name"),
            AvpType::AssignedTunnelId => write!(f, "Assigned Tunnel ID"),
            AvpType::ReceiveWindowSize => write!(f, "Receive Window Size"),
            AvpType::Challenge => write!(f, "Challenge"),
            AvpType::Q931CauseCode => write!(f, "Q.931 Cause Code"),
            AvpType::ChallengeResponse => write!(f, "Challenge Response"),
            AvpType::AssignedSessionId => write!(f, "Assigned Session ID"),
            AvpType::CallSerialNumber => write!(f, "Call Serial Number"),
            AvpType::MinimumBps => write!(f, "Minimum BPS"),
            AvpType::MaximumBps => write!(f, "Maximum BPS"),
            AvpType::BearerType => write!(f, "Bearer Type"),
            AvpType::FramingType => write!(f, "Framing Type"),
            AvpType::CalledNumber => write!(f, "Called Number"),
            AvpType::CallingNumber => write!(f, "Calling Number"),
            AvpType::SubAddress => write!(f, "Sub-Address"),
            AvpType::TxConnectSpeed => write!(f, "Tx Connect Speed"),
            AvpType::PhysicalChannelId => write!(f, "Physical Channel ID"),
            AvpType::InitialReceivedLcpConfreq => write!(f, "Initial Received LCP CONFREQ"),
            AvpType::LastSentLcpConfreq => write!(f, "Last Sent LCP CONFREQ"),
            AvpType::LastReceivedLcpConfreq => write!(f, "Last Received LCP CONFREQ"),
            AvpType::ProxyAuthenType => write!(f, "Proxy Authen Type"),
            AvpType::ProxyAuthenName => write!(f, "Proxy Authen Name"),
            AvpType::ProxyAuthenChallenge => write!(f, "Proxy Authen Challenge"),
            AvpType::ProxyAuthenId => write!(f, "Proxy Authen ID"),
            AvpType::ProxyAuthenResponse => write!(f, "Proxy Authen Response"),
            AvpType::CallErrors => write!(f, "Call Errors"),
            AvpType::Accm => write!(f, "ACCM"),
            AvpType::RandomVector => write!(f, "Random Vector"),
            AvpType::PrivateGroupId => write!(f, "Private Group ID"),
            AvpType::RxConnectSpeed => write!(f, "Rx Connect Speed"),
            AvpType::SequencingRequired => write!(f, "Sequencing Required"),
            AvpType::Unknown(v) => write!(f, "Unknown({})", v),
        }
    }
}

/// L2TPv2 control message types from RFC 2661 section 3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Start-Control-Connection-Request
    Sccrq,
    /// Start-Control-Connection-Reply
    Sccrp,
    /// Start-Control-Connection-Connected
    Scccn,
    /// Stop-Control-Connection-Notification
    StopCcn,
    /// Hello (keep-alive)
    Hello,
    /// Outgoing-Call-Request
    Ocrq,
    /// Outgoing-Call-Reply
    Ocrp,
    /// Outgoing-Call-Connected
    Occn,
    /// Incoming-Call-Request
    Icrq,
    /// Incoming-Call-Reply
    Icrp,
    /// Incoming-Call-Connected
    Iccn,
    /// Call-Disconnect-Notify
    Cdn,
    /// WAN-Error-Notify
    Wen,
    /// Set-Link-Info
    Sli,
    /// Explicit acknowledgement; also the derived pseudo-type of a
    /// zero-length-body message, which carries no Message Type AVP
    Ack,
    /// Unknown message type
    Unknown(u16),
}

impl From<u16> for MessageType {
    fn from(value: u16) -> Self {
        match value {
            1 => MessageType::Sccrq,
            2 => MessageType::Sccrp,
            3 => MessageType::Scccn,
            4 => MessageType::StopCcn,
            6 => MessageType::Hello,
            7 => MessageType::Ocrq,
            8 => MessageType::Ocrp,
            9 => MessageType::Occn,
            10 => MessageType::Icrq,
            11 => MessageType::Icrp,
            12 => MessageType::Iccn,
            14 => MessageType::Cdn,
            15 => MessageType::Wen,
            16 => MessageType::Sli,
            20 => MessageType::Ack,
            v => MessageType::Unknown(v),
        }
    }
}

impl MessageType {
    /// Returns the wire message type number.
    pub fn to_u16(self) -> u16 {
        match self {
            MessageType::Sccrq => 1,
            MessageType::Sccrp => 2,
            MessageType::Scccn => 3,
            MessageType::StopCcn => 4,
            MessageType::Hello => 6,
            MessageType::Ocrq => 7,
            MessageType::Ocrp => 8,
            MessageType::Occn => 9,
            MessageType::Icrq => 10,
            MessageType::Icrp => 11,
            MessageType::Iccn => 12,
            MessageType::Cdn => 14,
            MessageType::Wen => 15,
            MessageType::Sli => 16,
            MessageType::Ack => 20,
            MessageType::Unknown(v) => v,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Sccrq => write!(f, "SCCRQ"),
            MessageType::Sccrp => write!(f, "SCCRP"),
            MessageType::Scccn => write!(f, "SCCCN"),
            MessageType::StopCcn => write!(f, "StopCCN"),
            MessageType::Hello => write!(f, "Hello"),
            MessageType::Ocrq => write!(f, "OCRQ"),
            MessageType::Ocrp => write!(f, "OCRP"),
            MessageType::Occn => write!(f, "OCCN"),
            MessageType::Icrq => write!(f, "ICRQ"),
            MessageType::Icrp => write!(f, "ICRP"),
            MessageType::Iccn => write!(f, "ICCN"),
            MessageType::Cdn => write!(f, "CDN"),
            MessageType::Wen => write!(f, "WEN"),
            MessageType::Sli => write!(f, "SLI"),
            MessageType::Ack => write!(f, "ACK"),
            MessageType::Unknown(v) => write!(f, "Unknown({})", v),
        }
    }
}

/// The data type an attribute's value decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvpDataKind {
    /// 16-bit big-endian integer
    U16,
    /// 32-bit big-endian integer
    U32,
    /// 64-bit big-endian integer
    U64,
    /// Opaque byte string
    Bytes,
    /// UTF-8 text
    Text,
    /// Result code structure (StopCCN / CDN)
    ResultCode,
}

impl fmt::Display for AvpDataKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AvpDataKind::U16 => write!(f, "16-bit integer"),
            AvpDataKind::U32 => write!(f, "32-bit integer"),
            AvpDataKind::U64 => write!(f, "64-bit integer"),
            AvpDataKind::Bytes => write!(f, "byte string"),
            AvpDataKind::Text => write!(f, "text string"),
            AvpDataKind::ResultCode => write!(f, "result code"),
        }
    }
}

/// A typed AVP value, produced by [`Avp::decode`] and consumed by
/// [`Avp::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvpValue {
    /// 16-bit integer value
    U16(u16),
    /// 32-bit integer value
    U32(u32),
    /// 64-bit integer value
    U64(u64),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// UTF-8 text
    Text(String),
    /// Result code structure
    ResultCode(ResultCode),
}

/// Result Code AVP value (RFC 2661 section 4.4.2): a result code, an
/// optional error code, and an optional error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCode {
    /// Result code
    pub result: u16,
    /// Optional error code
    pub error: Option<u16>,
    /// Human-readable error message, possibly empty
    pub message: String,
}

impl ResultCode {
    /// A bare result code with no error information.
    pub fn new(result: u16) -> Self {
        Self {
            result,
            error: None,
            message: String::new(),
        }
    }

    fn from_value(avp_type: AvpType, value: &[u8]) -> Result<Self, AvpError> {
        if value.len() < 2 {
            return Err(AvpError::WrongValueLength {
                avp_type,
                expected: 2,
                have: value.len(),
            });
        }
        let result = u16::from_be_bytes([value[0], value[1]]);
        if value.len() < 4 {
            return Ok(ResultCode::new(result));
        }
        let error = u16::from_be_bytes([value[2], value[3]]);
        let message = std::str::from_utf8(&value[4..])
            .map_err(|_| AvpError::BadString { avp_type })?
            .to_owned();
        Ok(ResultCode {
            result,
            error: Some(error),
            message,
        })
    }

    fn to_value(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.message.len());
        out.extend_from_slice(&self.result.to_be_bytes());
        if self.error.is_some() || !self.message.is_empty() {
            out.extend_from_slice(&self.error.unwrap_or(0).to_be_bytes());
            out.extend_from_slice(self.message.as_bytes());
        }
        out
    }
}

/// AVP wire header (6 octets)
#[repr(C, packed)]
#[derive(
    FromBytes, IntoBytes, Unaligned, Debug, Clone, Copy, zerocopy::KnownLayout, zerocopy::Immutable,
)]
struct AvpHeader {
    flags_len: U16<BigEndian>,
    vendor_id: U16<BigEndian>,
    attribute_type: U16<BigEndian>,
}

impl AvpHeader {
    /// Mandatory bit
    const FLAG_MANDATORY: u16 = 0x8000;
    /// Hidden bit
    const FLAG_HIDDEN: u16 = 0x4000;
    /// Length mask (bits 0-9); the length includes this header
    const LENGTH_MASK: u16 = 0x03FF;

    /// Header size in octets
    const LEN: usize = 6;

    fn new(mandatory: bool, vendor_id: u16, attribute_type: u16, total_len: u16) -> Self {
        let mut flags_len = total_len & Self::LENGTH_MASK;
        if mandatory {
            flags_len |= Self::FLAG_MANDATORY;
        }
        Self {
            flags_len: U16::new(flags_len),
            vendor_id: U16::new(vendor_id),
            attribute_type: U16::new(attribute_type),
        }
    }

    #[inline]
    fn is_mandatory(&self) -> bool {
        (self.flags_len.get() & Self::FLAG_MANDATORY) != 0
    }

    #[inline]
    fn is_hidden(&self) -> bool {
        (self.flags_len.get() & Self::FLAG_HIDDEN) != 0
    }

    #[inline]
    fn total_len(&self) -> usize {
        (self.flags_len.get() & Self::LENGTH_MASK) as usize
    }
}

/// A decoded AVP owning a copy of its value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    mandatory: bool,
    vendor_id: u16,
    avp_type: AvpType,
    value: Vec<u8>,
}

impl Avp {
    /// Builds an AVP from a typed value.
    ///
    /// The value kind must match the attribute's RFC data type; the M bit is
    /// set according to the RFC's per-attribute rules. A `vendor_id` of 0
    /// denotes an IETF-defined attribute.
    pub fn new(vendor_id: u16, avp_type: AvpType, value: AvpValue) -> Result<Self, AvpError> {
        let kind = avp_type.data_kind();
        let bytes = match (kind, value) {
            (AvpDataKind::U16, AvpValue::U16(v)) => v.to_be_bytes().to_vec(),
            (AvpDataKind::U32, AvpValue::U32(v)) => v.to_be_bytes().to_vec(),
            (AvpDataKind::U64, AvpValue::U64(v)) => v.to_be_bytes().to_vec(),
            (AvpDataKind::Bytes, AvpValue::Bytes(v)) => v,
            (AvpDataKind::Text, AvpValue::Text(v)) => v.into_bytes(),
            (AvpDataKind::ResultCode, AvpValue::ResultCode(v)) => v.to_value(),
            (expected, _) => return Err(AvpError::WrongKind { avp_type, expected }),
        };
        if AvpHeader::LEN + bytes.len() > AvpHeader::LENGTH_MASK as usize {
            return Err(AvpError::Oversize {
                length: bytes.len(),
            });
        }
        Ok(Avp {
            mandatory: avp_type.mandatory_on_wire(),
            vendor_id,
            avp_type,
            value: bytes,
        })
    }

    /// Returns the attribute type.
    #[inline]
    pub fn avp_type(&self) -> AvpType {
        self.avp_type
    }

    /// Returns the vendor ID (0 for IETF-defined attributes).
    #[inline]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Returns whether the M (mandatory) bit is set.
    #[inline]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Returns the raw value bytes.
    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the total encoded length, header plus value, in octets.
    #[inline]
    pub fn total_len(&self) -> usize {
        AvpHeader::LEN + self.value.len()
    }

    /// Decodes the value according to the attribute's RFC data type.
    pub fn decode(&self) -> Result<AvpValue, AvpError> {
        match self.avp_type.data_kind() {
            AvpDataKind::U16 => self.fixed::<2>().map(|b| AvpValue::U16(u16::from_be_bytes(b))),
            AvpDataKind::U32 => self.fixed::<4>().map(|b| AvpValue::U32(u32::from_be_bytes(b))),
            AvpDataKind::U64 => self.fixed::<8>().map(|b| AvpValue::U64(u64::from_be_bytes(b))),
            AvpDataKind::Bytes => Ok(AvpValue::Bytes(self.value.clone())),
            AvpDataKind::Text => match std::str::from_utf8(&self.value) {
                Ok(s) => Ok(AvpValue::Text(s.to_owned())),
                Err(_) => Err(AvpError::BadString {
                    avp_type: self.avp_type,
                }),
            },
            AvpDataKind::ResultCode => {
                ResultCode::from_value(self.avp_type, &self.value).map(AvpValue::ResultCode)
            }
        }
    }

    /// Decodes a Message Type AVP's value as a control message type.
    pub fn decode_message_type(&self) -> Result<MessageType, AvpError> {
        if self.avp_type != AvpType::MessageType {
            return Err(AvpError::WrongKind {
                avp_type: self.avp_type,
                expected: AvpDataKind::U16,
            });
        }
        self.fixed::<2>()
            .map(|b| MessageType::from(u16::from_be_bytes(b)))
    }

    /// Appends the wire representation (header plus value) to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let header = AvpHeader::new(
            self.mandatory,
            self.vendor_id,
            self.avp_type.to_u16(),
            self.total_len() as u16,
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.value);
    }

    fn fixed<const N: usize>(&self) -> Result<[u8; N], AvpError> {
        self.value.as_slice().try_into().map_err(|_| {
            AvpError::WrongValueLength {
                avp_type: self.avp_type,
                expected: N,
                have: self.value.len(),
            }
        })
    }
}

impl fmt::Display for Avp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} AVP vendor={} len={}{}",
            self.avp_type,
            self.vendor_id,
            self.total_len(),
            if self.mandatory { " [M]" } else { "" }
        )
    }
}

/// Parses a buffer of back-to-back AVPs into an ordered sequence.
///
/// The sequence preserves wire order and duplicates; deduplication and
/// per-message semantics are the caller's concern. An empty buffer yields an
/// empty sequence.
pub fn parse_avp_buffer(buf: &[u8]) -> Result<Vec<Avp>, AvpError> {
    let mut avps = Vec::new();
    let mut rest = buf;
    while !rest.is_empty() {
        let (header, _) = AvpHeader::read_from_prefix(rest).map_err(|_| AvpError::TooShort {
            need: AvpHeader::LEN,
            have: rest.len(),
        })?;
        if header.is_hidden() {
            return Err(AvpError::HiddenNotSupported);
        }
        let total = header.total_len();
        if total < AvpHeader::LEN || total > rest.len() {
            return Err(AvpError::BadLength {
                length: total,
                available: rest.len(),
            });
        }
        avps.push(Avp {
            mandatory: header.is_mandatory(),
            vendor_id: header.vendor_id.get(),
            avp_type: AvpType::from(header.attribute_type.get()),
            value: rest[AvpHeader::LEN..total].to_vec(),
        });
        rest = &rest[total..];
    }
    Ok(avps)
}
