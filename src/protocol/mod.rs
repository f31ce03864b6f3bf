//! Protocol module - wire format, packets, and fragmentation.
//!
//! This module implements the MBIM 1.0 control protocol layer:
//! - message/fragment/command header encoding and decoding
//! - [`Packet`], the decoded form of one encapsulated transfer
//! - fragmentation of commands and reassembly of responses

mod fragment;
mod packet;
mod wire_format;

pub use fragment::{generate_request_packets, generate_response_packets, parse_response_packets};
pub use packet::Packet;
pub use wire_format::{
    CommandHeader, FragmentHeader, MessageHeader, MessageType, COMMAND_HEADER_SIZE,
    CONTINUATION_OVERHEAD, FIRST_FRAGMENT_OVERHEAD, FRAGMENT_HEADER_SIZE, INDICATION_HEADER_SIZE,
    MESSAGE_HEADER_SIZE, MIN_CONTROL_TRANSFER_SIZE,
};
