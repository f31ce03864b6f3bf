//! Fragmentation and reassembly of logical messages.
//!
//! [`generate_request_packets`] splits a command into the minimum number of
//! transfers that fit the negotiated maximum control transfer size;
//! [`parse_response_packets`] is its inverse for command responses. Both
//! ends of the split are pure: no transport state, no clocks.

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

use super::packet::Packet;
use super::wire_format::{
    CommandHeader, MessageType, CONTINUATION_OVERHEAD, FIRST_FRAGMENT_OVERHEAD,
    MIN_CONTROL_TRANSFER_SIZE,
};
use crate::error::{MbimError, ReassemblyError, Result};
use crate::message::{CommandMessage, ResponseMessage};

/// Split a command into ordered wire packets.
///
/// The first fragment carries the command header so a receiver can
/// pre-allocate its reassembly buffer; continuations carry raw payload. An
/// empty payload still yields exactly one packet with a zero-length chunk,
/// so a Query with no information buffer remains observable on the wire.
///
/// # Errors
///
/// Rejects transfer sizes below the MBIM 1.0 floor of 64 bytes.
pub fn generate_request_packets(
    message: &CommandMessage,
    max_transfer_size: usize,
) -> Result<Vec<Packet>> {
    let header = CommandHeader::new(
        message.service_id,
        message.cid,
        message.command_type.to_wire(),
        message.payload.len() as u32,
    );
    fragment_command(
        MessageType::Command,
        message.transaction_id,
        header,
        &message.payload,
        max_transfer_size,
    )
}

/// Split a command response into ordered wire packets.
///
/// Function side of the exchange; used by simulated devices standing in for
/// modem firmware in tests and demos.
pub fn generate_response_packets(
    transaction_id: u32,
    service_id: Uuid,
    command_id: u32,
    status: u32,
    payload: &Bytes,
    max_transfer_size: usize,
) -> Result<Vec<Packet>> {
    let header = CommandHeader::new(service_id, command_id, status, payload.len() as u32);
    fragment_command(
        MessageType::CommandDone,
        transaction_id,
        header,
        payload,
        max_transfer_size,
    )
}

fn fragment_command(
    message_type: MessageType,
    transaction_id: u32,
    header: CommandHeader,
    payload: &Bytes,
    max_transfer_size: usize,
) -> Result<Vec<Packet>> {
    if max_transfer_size < MIN_CONTROL_TRANSFER_SIZE {
        return Err(MbimError::Protocol(format!(
            "max transfer size {} below MBIM minimum {}",
            max_transfer_size, MIN_CONTROL_TRANSFER_SIZE
        )));
    }

    // Header overhead is fixed per position, so capacities are computed once.
    let first_capacity = max_transfer_size - FIRST_FRAGMENT_OVERHEAD;
    let continuation_capacity = max_transfer_size - CONTINUATION_OVERHEAD;

    let total = payload.len();
    let fragment_count: u32 = if total <= first_capacity {
        1
    } else {
        (1 + (total - first_capacity).div_ceil(continuation_capacity)) as u32
    };

    let mut packets = Vec::with_capacity(fragment_count as usize);
    let first_end = total.min(first_capacity);
    packets.push(Packet {
        message_type,
        transaction_id,
        fragment_index: 0,
        fragment_count,
        first: Some(header),
        chunk: payload.slice(0..first_end),
    });

    let mut offset = first_end;
    let mut index = 1u32;
    while offset < total {
        let end = total.min(offset + continuation_capacity);
        packets.push(Packet {
            message_type,
            transaction_id,
            fragment_index: index,
            fragment_count,
            first: None,
            chunk: payload.slice(offset..end),
        });
        offset = end;
        index += 1;
    }

    Ok(packets)
}

/// Reassemble a complete fragment set into a [`ResponseMessage`].
///
/// The set may be supplied in any order; chunks are concatenated in
/// fragment-index order. A response exists only when every index in
/// `[0, fragment_count)` is present exactly once — duplicates and gaps are
/// errors, never silently patched over.
pub fn parse_response_packets(
    packets: &[Packet],
) -> std::result::Result<ResponseMessage, ReassemblyError> {
    let first = packets.first().ok_or(ReassemblyError::EmptyFragmentSet)?;
    let transaction_id = first.transaction_id;
    let fragment_count = first.fragment_count;

    if fragment_count == 0 {
        return Err(ReassemblyError::FragmentCountMismatch {
            expected: 1,
            found: 0,
        });
    }

    let mut slots: Vec<Option<&Packet>> = vec![None; fragment_count as usize];
    for packet in packets {
        if packet.transaction_id != transaction_id {
            return Err(ReassemblyError::TransactionMismatch {
                expected: transaction_id,
                found: packet.transaction_id,
            });
        }
        if packet.message_type != MessageType::CommandDone {
            return Err(ReassemblyError::UnexpectedMessageType(
                packet.message_type.to_wire(),
            ));
        }
        if packet.fragment_count != fragment_count {
            return Err(ReassemblyError::FragmentCountMismatch {
                expected: fragment_count,
                found: packet.fragment_count,
            });
        }
        if packet.fragment_index >= fragment_count {
            return Err(ReassemblyError::InvalidFragmentIndex {
                index: packet.fragment_index,
                count: fragment_count,
            });
        }
        let slot = &mut slots[packet.fragment_index as usize];
        if slot.is_some() {
            return Err(ReassemblyError::DuplicateFragment {
                transaction_id,
                index: packet.fragment_index,
            });
        }
        *slot = Some(packet);
    }

    let received = slots.iter().filter(|s| s.is_some()).count() as u32;
    if received != fragment_count {
        return Err(ReassemblyError::IncompleteFragmentSet {
            transaction_id,
            received,
            expected: fragment_count,
        });
    }

    let header = slots[0]
        .and_then(|p| p.first)
        .ok_or(ReassemblyError::MissingCommandHeader { transaction_id })?;

    let mut payload = BytesMut::with_capacity(header.information_length as usize);
    for packet in slots.iter().flatten() {
        payload.extend_from_slice(&packet.chunk);
    }

    if payload.len() != header.information_length as usize {
        return Err(ReassemblyError::LengthMismatch {
            declared: header.information_length as usize,
            actual: payload.len(),
        });
    }

    Ok(ResponseMessage::new(
        transaction_id,
        header.service_id,
        header.cid,
        header.detail,
        payload.freeze(),
    ))
}
