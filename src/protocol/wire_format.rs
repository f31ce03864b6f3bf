//! Wire format encoding and decoding.
//!
//! Implements the MBIM 1.0 control-message headers, bit-exact against that
//! specification:
//! ```text
//! ┌──────────────┬────────────────┬────────────────┐
//! │ MessageType  │ MessageLength  │ TransactionId  │   MBIM_MESSAGE_HEADER
//! │ 4 bytes LE   │ 4 bytes LE     │ 4 bytes LE     │   (every message)
//! └──────────────┴────────────────┴────────────────┘
//! ┌────────────────┬─────────────────┐
//! │ TotalFragments │ CurrentFragment │   MBIM_FRAGMENT_HEADER
//! │ 4 bytes LE     │ 4 bytes LE      │   (command-class messages only)
//! └────────────────┴─────────────────┘
//! ┌─────────────────┬───────┬──────────────────┬───────────────┐
//! │ DeviceServiceId │ CID   │ CommandType /    │ InfoBuffer    │
//! │ 16 bytes        │ 4 LE  │ Status, 4 LE     │ Length, 4 LE  │
//! └─────────────────┴───────┴──────────────────┴───────────────┘
//!   (first fragment of MBIM_COMMAND_MSG / MBIM_COMMAND_DONE_MSG)
//! ```
//!
//! All multi-byte integers are Little Endian. `MessageLength` counts the
//! whole encapsulated transfer, headers included. Service UUIDs travel as
//! their 16 canonical bytes.

use uuid::Uuid;

use crate::error::ReassemblyError;

/// MBIM_MESSAGE_HEADER size in bytes (fixed, exactly 12).
pub const MESSAGE_HEADER_SIZE: usize = 12;

/// MBIM_FRAGMENT_HEADER size in bytes.
pub const FRAGMENT_HEADER_SIZE: usize = 8;

/// Command header size on the first fragment of a command or command-done.
pub const COMMAND_HEADER_SIZE: usize = 28;

/// Indication header size (no command-type/status field).
pub const INDICATION_HEADER_SIZE: usize = 24;

/// Total overhead of the first fragment of a command-class message.
pub const FIRST_FRAGMENT_OVERHEAD: usize =
    MESSAGE_HEADER_SIZE + FRAGMENT_HEADER_SIZE + COMMAND_HEADER_SIZE;

/// Total overhead of every continuation fragment.
pub const CONTINUATION_OVERHEAD: usize = MESSAGE_HEADER_SIZE + FRAGMENT_HEADER_SIZE;

/// Smallest negotiated control transfer size MBIM 1.0 permits
/// (wMaxControlMessage floor).
pub const MIN_CONTROL_TRANSFER_SIZE: usize = 64;

/// Control message types defined by MBIM 1.0.
///
/// Host-to-function types occupy the low range; function-to-host types set
/// the top bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// MBIM_OPEN_MSG
    Open,
    /// MBIM_CLOSE_MSG
    Close,
    /// MBIM_COMMAND_MSG
    Command,
    /// MBIM_HOST_ERROR_MSG
    HostError,
    /// MBIM_OPEN_DONE
    OpenDone,
    /// MBIM_CLOSE_DONE
    CloseDone,
    /// MBIM_COMMAND_DONE
    CommandDone,
    /// MBIM_FUNCTION_ERROR_MSG
    FunctionError,
    /// MBIM_INDICATE_STATUS_MSG
    IndicateStatus,
}

impl MessageType {
    /// Wire value of this message type.
    pub fn to_wire(self) -> u32 {
        match self {
            MessageType::Open => 0x0000_0001,
            MessageType::Close => 0x0000_0002,
            MessageType::Command => 0x0000_0003,
            MessageType::HostError => 0x0000_0004,
            MessageType::OpenDone => 0x8000_0001,
            MessageType::CloseDone => 0x8000_0002,
            MessageType::CommandDone => 0x8000_0003,
            MessageType::FunctionError => 0x8000_0004,
            MessageType::IndicateStatus => 0x8000_0007,
        }
    }

    /// Decode a wire value, `None` if MBIM 1.0 does not define it.
    pub fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            0x0000_0001 => Some(MessageType::Open),
            0x0000_0002 => Some(MessageType::Close),
            0x0000_0003 => Some(MessageType::Command),
            0x0000_0004 => Some(MessageType::HostError),
            0x8000_0001 => Some(MessageType::OpenDone),
            0x8000_0002 => Some(MessageType::CloseDone),
            0x8000_0003 => Some(MessageType::CommandDone),
            0x8000_0004 => Some(MessageType::FunctionError),
            0x8000_0007 => Some(MessageType::IndicateStatus),
            _ => None,
        }
    }

    /// Whether messages of this type carry MBIM_FRAGMENT_HEADER and may span
    /// multiple transfers.
    #[inline]
    pub fn is_fragmentable(self) -> bool {
        matches!(
            self,
            MessageType::Command | MessageType::CommandDone | MessageType::IndicateStatus
        )
    }

    /// Whether this type travels function-to-host.
    #[inline]
    pub fn is_function_to_host(self) -> bool {
        self.to_wire() & 0x8000_0000 != 0
    }
}

/// Decoded MBIM_MESSAGE_HEADER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Control message type.
    pub message_type: MessageType,
    /// Length of the whole transfer in bytes, headers included.
    pub message_length: u32,
    /// Transaction identifier correlating request and response.
    pub transaction_id: u32,
}

impl MessageHeader {
    /// Create a new message header.
    pub fn new(message_type: MessageType, message_length: u32, transaction_id: u32) -> Self {
        Self {
            message_type,
            message_length,
            transaction_id,
        }
    }

    /// Encode the header to bytes (Little Endian).
    pub fn encode(&self) -> [u8; MESSAGE_HEADER_SIZE] {
        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than [`MESSAGE_HEADER_SIZE`].
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= MESSAGE_HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.message_type.to_wire().to_le_bytes());
        buf[4..8].copy_from_slice(&self.message_length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.transaction_id.to_le_bytes());
    }

    /// Decode a header from bytes (Little Endian).
    pub fn decode(buf: &[u8]) -> Result<Self, ReassemblyError> {
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Err(ReassemblyError::Truncated {
                needed: MESSAGE_HEADER_SIZE,
                got: buf.len(),
            });
        }
        let raw_type = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let message_type =
            MessageType::from_wire(raw_type).ok_or(ReassemblyError::UnknownMessageType(raw_type))?;
        Ok(Self {
            message_type,
            message_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            transaction_id: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// Decoded MBIM_FRAGMENT_HEADER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Number of fragments the logical message spans.
    pub total_fragments: u32,
    /// Zero-based index of this fragment.
    pub current_fragment: u32,
}

impl FragmentHeader {
    /// Create a new fragment header.
    pub fn new(total_fragments: u32, current_fragment: u32) -> Self {
        Self {
            total_fragments,
            current_fragment,
        }
    }

    /// Encode the header to bytes (Little Endian).
    pub fn encode(&self) -> [u8; FRAGMENT_HEADER_SIZE] {
        let mut buf = [0u8; FRAGMENT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.total_fragments.to_le_bytes());
        buf[4..8].copy_from_slice(&self.current_fragment.to_le_bytes());
        buf
    }

    /// Decode a fragment header from bytes (Little Endian).
    pub fn decode(buf: &[u8]) -> Result<Self, ReassemblyError> {
        if buf.len() < FRAGMENT_HEADER_SIZE {
            return Err(ReassemblyError::Truncated {
                needed: FRAGMENT_HEADER_SIZE,
                got: buf.len(),
            });
        }
        Ok(Self {
            total_fragments: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            current_fragment: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// Command header carried on the first fragment of a command-class message.
///
/// The fourth field is CommandType on MBIM_COMMAND_MSG and Status on
/// MBIM_COMMAND_DONE; it is stored raw as `detail`. Indications carry no
/// fourth field at all, so `detail` is 0 for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Device service scoping the command.
    pub service_id: Uuid,
    /// Command identifier within the service.
    pub cid: u32,
    /// CommandType (requests) or Status (responses); 0 for indications.
    pub detail: u32,
    /// Total InformationBuffer length across all fragments.
    pub information_length: u32,
}

impl CommandHeader {
    /// Create a new command header.
    pub fn new(service_id: Uuid, cid: u32, detail: u32, information_length: u32) -> Self {
        Self {
            service_id,
            cid,
            detail,
            information_length,
        }
    }

    /// Encode to the 28-byte command layout.
    pub fn encode(&self) -> [u8; COMMAND_HEADER_SIZE] {
        let mut buf = [0u8; COMMAND_HEADER_SIZE];
        buf[0..16].copy_from_slice(self.service_id.as_bytes());
        buf[16..20].copy_from_slice(&self.cid.to_le_bytes());
        buf[20..24].copy_from_slice(&self.detail.to_le_bytes());
        buf[24..28].copy_from_slice(&self.information_length.to_le_bytes());
        buf
    }

    /// Encode to the 24-byte indication layout (no detail field).
    pub fn encode_indication(&self) -> [u8; INDICATION_HEADER_SIZE] {
        let mut buf = [0u8; INDICATION_HEADER_SIZE];
        buf[0..16].copy_from_slice(self.service_id.as_bytes());
        buf[16..20].copy_from_slice(&self.cid.to_le_bytes());
        buf[20..24].copy_from_slice(&self.information_length.to_le_bytes());
        buf
    }

    /// Decode the 28-byte command layout.
    pub fn decode(buf: &[u8]) -> Result<Self, ReassemblyError> {
        if buf.len() < COMMAND_HEADER_SIZE {
            return Err(ReassemblyError::Truncated {
                needed: COMMAND_HEADER_SIZE,
                got: buf.len(),
            });
        }
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes.copy_from_slice(&buf[0..16]);
        Ok(Self {
            service_id: Uuid::from_bytes(uuid_bytes),
            cid: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            detail: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            information_length: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
        })
    }

    /// Decode the 24-byte indication layout.
    pub fn decode_indication(buf: &[u8]) -> Result<Self, ReassemblyError> {
        if buf.len() < INDICATION_HEADER_SIZE {
            return Err(ReassemblyError::Truncated {
                needed: INDICATION_HEADER_SIZE,
                got: buf.len(),
            });
        }
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes.copy_from_slice(&buf[0..16]);
        Ok(Self {
            service_id: Uuid::from_bytes(uuid_bytes),
            cid: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            detail: 0,
            information_length: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UUID_BASIC_CONNECT;

    #[test]
    fn test_message_header_encode_decode_roundtrip() {
        let original = MessageHeader::new(MessageType::Command, 48, 7);
        let encoded = original.encode();
        let decoded = MessageHeader::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_message_header_little_endian_byte_order() {
        let header = MessageHeader::new(MessageType::CommandDone, 0x0102_0304, 0x0A0B_0C0D);
        let bytes = header.encode();

        // MessageType: 0x80000003 in LE
        assert_eq!(bytes[0], 0x03);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(bytes[2], 0x00);
        assert_eq!(bytes[3], 0x80);

        // MessageLength: 0x01020304 in LE
        assert_eq!(bytes[4], 0x04);
        assert_eq!(bytes[5], 0x03);
        assert_eq!(bytes[6], 0x02);
        assert_eq!(bytes[7], 0x01);

        // TransactionId: 0x0A0B0C0D in LE
        assert_eq!(bytes[8], 0x0D);
        assert_eq!(bytes[9], 0x0C);
        assert_eq!(bytes[10], 0x0B);
        assert_eq!(bytes[11], 0x0A);
    }

    #[test]
    fn test_message_header_size_is_exactly_12() {
        assert_eq!(MESSAGE_HEADER_SIZE, 12);
        let header = MessageHeader::new(MessageType::Open, 16, 1);
        assert_eq!(header.encode().len(), 12);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 11]; // One byte short
        assert!(matches!(
            MessageHeader::decode(&buf),
            Err(ReassemblyError::Truncated { needed: 12, got: 11 })
        ));
    }

    #[test]
    fn test_decode_unknown_message_type() {
        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&0x4242_4242u32.to_le_bytes());
        assert!(matches!(
            MessageHeader::decode(&buf),
            Err(ReassemblyError::UnknownMessageType(0x4242_4242))
        ));
    }

    #[test]
    fn test_message_type_wire_values() {
        assert_eq!(MessageType::Open.to_wire(), 0x0000_0001);
        assert_eq!(MessageType::Close.to_wire(), 0x0000_0002);
        assert_eq!(MessageType::Command.to_wire(), 0x0000_0003);
        assert_eq!(MessageType::OpenDone.to_wire(), 0x8000_0001);
        assert_eq!(MessageType::CloseDone.to_wire(), 0x8000_0002);
        assert_eq!(MessageType::CommandDone.to_wire(), 0x8000_0003);
        assert_eq!(MessageType::IndicateStatus.to_wire(), 0x8000_0007);
    }

    #[test]
    fn test_message_type_roundtrip() {
        for mt in [
            MessageType::Open,
            MessageType::Close,
            MessageType::Command,
            MessageType::HostError,
            MessageType::OpenDone,
            MessageType::CloseDone,
            MessageType::CommandDone,
            MessageType::FunctionError,
            MessageType::IndicateStatus,
        ] {
            assert_eq!(MessageType::from_wire(mt.to_wire()), Some(mt));
        }
    }

    #[test]
    fn test_message_type_direction() {
        assert!(!MessageType::Command.is_function_to_host());
        assert!(MessageType::CommandDone.is_function_to_host());
        assert!(MessageType::IndicateStatus.is_function_to_host());
    }

    #[test]
    fn test_fragmentable_types() {
        assert!(MessageType::Command.is_fragmentable());
        assert!(MessageType::CommandDone.is_fragmentable());
        assert!(MessageType::IndicateStatus.is_fragmentable());
        assert!(!MessageType::Open.is_fragmentable());
        assert!(!MessageType::OpenDone.is_fragmentable());
        assert!(!MessageType::Close.is_fragmentable());
    }

    #[test]
    fn test_fragment_header_order_total_then_current() {
        // MBIM 1.0 puts TotalFragments before CurrentFragment.
        let header = FragmentHeader::new(3, 1);
        let bytes = header.encode();
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes[4], 1);

        let decoded = FragmentHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.total_fragments, 3);
        assert_eq!(decoded.current_fragment, 1);
    }

    #[test]
    fn test_fragment_header_truncated() {
        let buf = [0u8; 7];
        assert!(matches!(
            FragmentHeader::decode(&buf),
            Err(ReassemblyError::Truncated { needed: 8, got: 7 })
        ));
    }

    #[test]
    fn test_command_header_roundtrip() {
        let original = CommandHeader::new(UUID_BASIC_CONNECT, 1, 0, 256);
        let encoded = original.encode();
        assert_eq!(encoded.len(), COMMAND_HEADER_SIZE);
        let decoded = CommandHeader::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_command_header_uuid_on_wire_first() {
        let header = CommandHeader::new(UUID_BASIC_CONNECT, 0x0102_0304, 1, 0);
        let bytes = header.encode();
        assert_eq!(&bytes[0..16], UUID_BASIC_CONNECT.as_bytes());
        // CID in LE right after the UUID
        assert_eq!(bytes[16], 0x04);
        assert_eq!(bytes[19], 0x01);
    }

    #[test]
    fn test_indication_header_has_no_detail() {
        let header = CommandHeader::new(UUID_BASIC_CONNECT, 11, 0, 8);
        let encoded = header.encode_indication();
        assert_eq!(encoded.len(), INDICATION_HEADER_SIZE);
        let decoded = CommandHeader::decode_indication(&encoded).unwrap();
        assert_eq!(decoded.service_id, UUID_BASIC_CONNECT);
        assert_eq!(decoded.cid, 11);
        assert_eq!(decoded.detail, 0);
        assert_eq!(decoded.information_length, 8);
    }

    #[test]
    fn test_overhead_constants() {
        assert_eq!(FIRST_FRAGMENT_OVERHEAD, 48);
        assert_eq!(CONTINUATION_OVERHEAD, 20);
    }
}
