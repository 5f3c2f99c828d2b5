//! Control message header layouts
//!
//! L2TPv2 control header (RFC 2661 section 3.1):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |T|L|x|x|S|x|O|P|x|x|x|x|  Ver  |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Tunnel ID           |           Session ID          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |              Ns               |              Nr               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The L2TPv3 control header (RFC 3931 section 4.1.2.1) replaces the
//! 16-bit tunnel/session ID pair with a 32-bit control connection ID. Both
//! headers are 12 octets, and both begin with the same 4-octet prefix of
//! flags/version word and length, which is all a framer needs to walk a
//! buffer of concatenated messages.
//!
//! Control messages always have T, L and S set, and Length counts the
//! header itself, so a ZLB is exactly 12 octets.

use std::fmt::{self, Formatter};

use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, IntoBytes, Unaligned};

use super::{MessageError, ProtocolVersion};

/// Shared header prefix size in octets
pub const COMMON_HEADER_LEN: usize = 4;
/// L2TPv2 control header size in octets
pub const V2_HEADER_LEN: usize = 12;
/// L2TPv3 control header size in octets
pub const V3_HEADER_LEN: usize = 12;
/// Smallest valid control message (a ZLB) in octets
pub const CONTROL_MESSAGE_MIN_LEN: usize = 12;
/// Largest encodable control message, bounded by the 16-bit length field
pub const CONTROL_MESSAGE_MAX_LEN: usize = 65535;

/// The 4-octet prefix shared by both header layouts.
#[repr(C, packed)]
#[derive(
    FromBytes,
    IntoBytes,
    Unaligned,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    zerocopy::KnownLayout,
    zerocopy::Immutable,
)]
pub struct CommonHeader {
    flags_ver: U16<BigEndian>,
    length: U16<BigEndian>,
}

impl CommonHeader {
    /// T bit: message is a control message
    pub const FLAG_TYPE: u16 = 0x8000;
    /// L bit: Length field present
    pub const FLAG_LENGTH: u16 = 0x4000;
    /// S bit: Ns/Nr fields present
    pub const FLAG_SEQUENCE: u16 = 0x0800;
    /// Version nibble mask
    pub const VERSION_MASK: u16 = 0x000F;

    fn new(flags_ver: u16, length: u16) -> Self {
        Self {
            flags_ver: U16::new(flags_ver),
            length: U16::new(length),
        }
    }

    /// Extracts the protocol version from the version nibble.
    pub fn version(&self) -> Result<ProtocolVersion, MessageError> {
        match (self.flags_ver.get() & Self::VERSION_MASK) as u8 {
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            v => Err(MessageError::IllegalProtocolVersion(v)),
        }
    }

    /// Returns the raw flags/version word.
    #[inline]
    pub fn flags_ver(&self) -> u16 {
        self.flags_ver.get()
    }

    /// Returns the message length in octets, header included.
    #[inline]
    pub fn length(&self) -> u16 {
        self.length.get()
    }

    #[inline]
    pub(crate) fn set_length(&mut self, length: u16) {
        self.length.set(length);
    }
}

/// L2TPv2 control message header (12 octets)
#[repr(C, packed)]
#[derive(
    FromBytes,
    IntoBytes,
    Unaligned,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    zerocopy::KnownLayout,
    zerocopy::Immutable,
)]
pub struct V2Header {
    common: CommonHeader,
    tunnel_id: U16<BigEndian>,
    session_id: U16<BigEndian>,
    ns: U16<BigEndian>,
    nr: U16<BigEndian>,
}

impl V2Header {
    /// Flags/version word of a freshly built control message:
    /// T, L and S set, version 2.
    const FLAGS_CONTROL: u16 = 0xC802;

    /// A header for a new message carrying no AVPs yet.
    pub(crate) fn new(tunnel_id: u16, session_id: u16) -> Self {
        Self {
            common: CommonHeader::new(Self::FLAGS_CONTROL, V2_HEADER_LEN as u16),
            tunnel_id: U16::new(tunnel_id),
            session_id: U16::new(session_id),
            ns: U16::new(0),
            nr: U16::new(0),
        }
    }

    /// Returns the shared 4-octet prefix.
    #[inline]
    pub fn common(&self) -> &CommonHeader {
        &self.common
    }

    /// Returns the message length in octets, header included.
    #[inline]
    pub fn length(&self) -> u16 {
        self.common.length()
    }

    /// Returns the Tunnel ID.
    #[inline]
    pub fn tunnel_id(&self) -> u16 {
        self.tunnel_id.get()
    }

    /// Returns the Session ID.
    #[inline]
    pub fn session_id(&self) -> u16 {
        self.session_id.get()
    }

    /// Returns the Ns sequence number.
    #[inline]
    pub fn ns(&self) -> u16 {
        self.ns.get()
    }

    /// Returns the Nr sequence number.
    #[inline]
    pub fn nr(&self) -> u16 {
        self.nr.get()
    }

    #[inline]
    pub(crate) fn set_length(&mut self, length: u16) {
        self.common.set_length(length);
    }

    #[inline]
    pub(crate) fn set_ns(&mut self, ns: u16) {
        self.ns.set(ns);
    }

    #[inline]
    pub(crate) fn set_nr(&mut self, nr: u16) {
        self.nr.set(nr);
    }
}

impl fmt::Display for V2Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L2TPv2 header tid={} sid={} ns={} nr={} len={}",
            self.tunnel_id(),
            self.session_id(),
            self.ns(),
            self.nr(),
            self.length()
        )
    }
}

/// L2TPv3 control message header (12 octets)
#[repr(C, packed)]
#[derive(
    FromBytes,
    IntoBytes,
    Unaligned,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    zerocopy::KnownLayout,
    zerocopy::Immutable,
)]
pub struct V3Header {
    common: CommonHeader,
    control_connection_id: U32<BigEndian>,
    ns: U16<BigEndian>,
    nr: U16<BigEndian>,
}

impl V3Header {
    /// Flags/version word of a freshly built control message:
    /// T, L and S set, version 3.
    const FLAGS_CONTROL: u16 = 0xC803;

    /// A header for a new message carrying no AVPs yet.
    pub(crate) fn new(control_connection_id: u32) -> Self {
        Self {
            common: CommonHeader::new(Self::FLAGS_CONTROL, V3_HEADER_LEN as u16),
            control_connection_id: U32::new(control_connection_id),
            ns: U16::new(0),
            nr: U16::new(0),
        }
    }

    /// Returns the shared 4-octet prefix.
    #[inline]
    pub fn common(&self) -> &CommonHeader {
        &self.common
    }

    /// Returns the message length in octets, header included.
    #[inline]
    pub fn length(&self) -> u16 {
        self.common.length()
    }

    /// Returns the Control Connection ID.
    #[inline]
    pub fn control_connection_id(&self) -> u32 {
        self.control_connection_id.get()
    }

    /// Returns the Ns sequence number.
    #[inline]
    pub fn ns(&self) -> u16 {
        self.ns.get()
    }

    /// Returns the Nr sequence number.
    #[inline]
    pub fn nr(&self) -> u16 {
        self.nr.get()
    }

    #[inline]
    pub(crate) fn set_length(&mut self, length: u16) {
        self.common.set_length(length);
    }

    #[inline]
    pub(crate) fn set_ns(&mut self, ns: u16) {
        self.ns.set(ns);
    }

    #[inline]
    pub(crate) fn set_nr(&mut self, nr: u16) {
        self.nr.set(nr);
    }
}

impl fmt::Display for V3Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L2TPv3 header ccid={} ns={} nr={} len={}",
            self.control_connection_id(),
            self.ns(),
            self.nr(),
            self.length()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(std::mem::size_of::<CommonHeader>(), COMMON_HEADER_LEN);
        assert_eq!(std::mem::size_of::<V2Header>(), V2_HEADER_LEN);
        assert_eq!(std::mem::size_of::<V3Header>(), V3_HEADER_LEN);
    }

    #[test]
    fn test_version_extraction() {
        let buf = [0xC8, 0x02, 0x00, 0x0C];
        let h = CommonHeader::read_from_bytes(&buf).unwrap();
        assert_eq!(h.version().unwrap(), ProtocolVersion::V2);
        assert_eq!(h.length(), 12);

        let buf = [0xC8, 0x03, 0x00, 0x0C];
        let h = CommonHeader::read_from_bytes(&buf).unwrap();
        assert_eq!(h.version().unwrap(), ProtocolVersion::V3);

        let buf = [0xC8, 0x00, 0x00, 0x0C];
        let h = CommonHeader::read_from_bytes(&buf).unwrap();
        assert!(matches!(
            h.version().unwrap_err(),
            MessageError::IllegalProtocolVersion(0)
        ));
    }

    #[test]
    fn test_new_v2_header_flags_word() {
        let h = V2Header::new(7, 0);
        assert_eq!(h.common().flags_ver(), 0xC802);
        assert_eq!(h.length(), 12);
        assert_eq!(h.tunnel_id(), 7);
        let bytes = h.as_bytes();
        assert_eq!(&bytes[..4], &[0xC8, 0x02, 0x00, 0x0C]);
    }

    #[test]
    fn test_new_v3_header_flags_word() {
        let h = V3Header::new(0xDEADBEEF);
        assert_eq!(h.common().flags_ver(), 0xC803);
        assert_eq!(h.control_connection_id(), 0xDEADBEEF);
        assert_eq!(h.as_bytes()[..2], [0xC8, 0x03]);
    }

    #[test]
    fn test_reserved_flag_bits_preserved() {
        // A peer setting reserved x bits survives a parse/encode pass
        let buf = [0xCA, 0x12, 0x00, 0x0C, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let h = V2Header::read_from_bytes(&buf).unwrap();
        assert_eq!(h.common().flags_ver(), 0xCA12);
        assert_eq!(h.as_bytes(), &buf[..]);
    }
}
