//! Packet struct with typed accessors.
//!
//! A [`Packet`] is the decoded form of one encapsulated control transfer:
//! exactly what crosses the wire in a single send or notification read.
//! Command-class messages may span several packets; OPEN/CLOSE handshakes
//! and error messages always occupy exactly one. Payload chunks use
//! `bytes::Bytes` for zero-copy sharing.

use bytes::Bytes;

use super::wire_format::{
    CommandHeader, FragmentHeader, MessageHeader, MessageType, COMMAND_HEADER_SIZE,
    CONTINUATION_OVERHEAD, FIRST_FRAGMENT_OVERHEAD, FRAGMENT_HEADER_SIZE, INDICATION_HEADER_SIZE,
    MESSAGE_HEADER_SIZE,
};
use crate::error::ReassemblyError;

/// One encapsulated control transfer, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Control message type.
    pub message_type: MessageType,
    /// Transaction this transfer belongs to.
    pub transaction_id: u32,
    /// Zero-based fragment index; 0 for unfragmentable types.
    pub fragment_index: u32,
    /// Total fragments in the logical message; 1 for unfragmentable types.
    pub fragment_count: u32,
    /// Command header, present exactly on fragment 0 of command-class
    /// messages.
    pub first: Option<CommandHeader>,
    /// InformationBuffer chunk, or the raw body for handshake messages.
    pub chunk: Bytes,
}

impl Packet {
    /// Build an MBIM_OPEN_MSG advertising the host's maximum control
    /// transfer size.
    pub fn open(transaction_id: u32, max_control_transfer: u32) -> Self {
        Self {
            message_type: MessageType::Open,
            transaction_id,
            fragment_index: 0,
            fragment_count: 1,
            first: None,
            chunk: Bytes::copy_from_slice(&max_control_transfer.to_le_bytes()),
        }
    }

    /// Build an MBIM_CLOSE_MSG.
    pub fn close(transaction_id: u32) -> Self {
        Self {
            message_type: MessageType::Close,
            transaction_id,
            fragment_index: 0,
            fragment_count: 1,
            first: None,
            chunk: Bytes::new(),
        }
    }

    /// Build an MBIM_OPEN_DONE carrying a status code. Function side; used
    /// by simulated devices.
    pub fn open_done(transaction_id: u32, status: u32) -> Self {
        Self {
            message_type: MessageType::OpenDone,
            transaction_id,
            fragment_index: 0,
            fragment_count: 1,
            first: None,
            chunk: Bytes::copy_from_slice(&status.to_le_bytes()),
        }
    }

    /// Build an MBIM_CLOSE_DONE carrying a status code. Function side; used
    /// by simulated devices.
    pub fn close_done(transaction_id: u32, status: u32) -> Self {
        Self {
            message_type: MessageType::CloseDone,
            transaction_id,
            fragment_index: 0,
            fragment_count: 1,
            first: None,
            chunk: Bytes::copy_from_slice(&status.to_le_bytes()),
        }
    }

    /// Get the chunk length in bytes.
    #[inline]
    pub fn chunk_len(&self) -> usize {
        self.chunk.len()
    }

    /// Check if this transfer travels function-to-host.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.message_type.is_function_to_host()
    }

    /// Status code of a handshake reply (OPEN_DONE / CLOSE_DONE /
    /// FUNCTION_ERROR body). `None` if the body is too short or the type
    /// carries no status in its body.
    pub fn status(&self) -> Option<u32> {
        match self.message_type {
            MessageType::OpenDone | MessageType::CloseDone | MessageType::FunctionError => {
                if self.chunk.len() >= 4 {
                    Some(u32::from_le_bytes([
                        self.chunk[0],
                        self.chunk[1],
                        self.chunk[2],
                        self.chunk[3],
                    ]))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Encoded size of this packet in bytes.
    pub fn encoded_len(&self) -> usize {
        let header_len = if self.message_type.is_fragmentable() {
            match (self.fragment_index, &self.first) {
                (0, Some(_)) if self.message_type == MessageType::IndicateStatus => {
                    CONTINUATION_OVERHEAD + INDICATION_HEADER_SIZE
                }
                (0, Some(_)) => FIRST_FRAGMENT_OVERHEAD,
                _ => CONTINUATION_OVERHEAD,
            }
        } else {
            MESSAGE_HEADER_SIZE
        };
        header_len + self.chunk.len()
    }

    /// Encode this packet to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let total = self.encoded_len();
        let mut buf = Vec::with_capacity(total);

        let header = MessageHeader::new(self.message_type, total as u32, self.transaction_id);
        buf.extend_from_slice(&header.encode());

        if self.message_type.is_fragmentable() {
            let fragment = FragmentHeader::new(self.fragment_count, self.fragment_index);
            buf.extend_from_slice(&fragment.encode());

            if self.fragment_index == 0 {
                if let Some(first) = &self.first {
                    if self.message_type == MessageType::IndicateStatus {
                        buf.extend_from_slice(&first.encode_indication());
                    } else {
                        buf.extend_from_slice(&first.encode());
                    }
                }
            }
        }

        buf.extend_from_slice(&self.chunk);
        buf
    }

    /// Decode one encapsulated transfer.
    ///
    /// The buffer must hold exactly one message: `MessageLength` is checked
    /// against the bytes supplied and any disagreement is a
    /// [`ReassemblyError::LengthMismatch`].
    pub fn decode(buf: &[u8]) -> Result<Self, ReassemblyError> {
        let header = MessageHeader::decode(buf)?;
        if header.message_length as usize != buf.len() {
            return Err(ReassemblyError::LengthMismatch {
                declared: header.message_length as usize,
                actual: buf.len(),
            });
        }

        if !header.message_type.is_fragmentable() {
            return Ok(Self {
                message_type: header.message_type,
                transaction_id: header.transaction_id,
                fragment_index: 0,
                fragment_count: 1,
                first: None,
                chunk: Bytes::copy_from_slice(&buf[MESSAGE_HEADER_SIZE..]),
            });
        }

        let fragment = FragmentHeader::decode(&buf[MESSAGE_HEADER_SIZE..])?;
        let body = &buf[MESSAGE_HEADER_SIZE + FRAGMENT_HEADER_SIZE..];

        let (first, chunk) = if fragment.current_fragment == 0 {
            if header.message_type == MessageType::IndicateStatus {
                let first = CommandHeader::decode_indication(body)?;
                (Some(first), &body[INDICATION_HEADER_SIZE..])
            } else {
                let first = CommandHeader::decode(body)?;
                (Some(first), &body[COMMAND_HEADER_SIZE..])
            }
        } else {
            (None, body)
        };

        Ok(Self {
            message_type: header.message_type,
            transaction_id: header.transaction_id,
            fragment_index: fragment.current_fragment,
            fragment_count: fragment.total_fragments,
            first,
            chunk: Bytes::copy_from_slice(chunk),
        })
    }
}
