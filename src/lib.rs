//! # mbim-compliance
//!
//! MBIM (Mobile Broadband Interface Model) control-channel protocol engine
//! for compliance-testing cellular modem firmware.
//!
//! The engine encodes logical command messages into transport-sized wire
//! packets, fragments and reassembles them across a device's negotiated
//! maximum transfer size, correlates asynchronous and possibly out-of-order
//! responses back to their originating requests by transaction id, and
//! raises structured assertion failures tied to specification clause
//! numbers when observed behavior diverges from the protocol contract.
//!
//! ## Architecture
//!
//! - **Message model** ([`message`]): command/response value types and the
//!   transaction id generator.
//! - **Protocol** ([`protocol`]): bit-exact MBIM 1.0 headers, packets, and
//!   fragmentation.
//! - **Channel** ([`channel`]): the transport session — outbound command
//!   path plus an inbound buffer filled asynchronously by the device's
//!   notification path.
//! - **Correlator** ([`correlator`]): bounded polling that matches buffered
//!   packets to outstanding transaction ids.
//! - **Assertions** ([`assertion`]): clause-tagged compliance verdicts.
//! - **Sequences** ([`sequence`]): ordered steps sharing one device context.
//!
//! ## Example
//!
//! ```ignore
//! use mbim_compliance::{
//!     constants, Channel, CommandMessage, CommandType, Correlator,
//!     DeviceContext, DeviceHandle, InterfaceDescriptor,
//! };
//!
//! let descriptor = InterfaceDescriptor {
//!     communication_interface: 0,
//!     interrupt_endpoint: 0x81,
//!     max_control_transfer_size: 64,
//! };
//! let channel = Channel::open(device_handle, &descriptor)?;
//!
//! let message = CommandMessage::new(
//!     ctx.transaction_ids(),
//!     constants::UUID_BASIC_CONNECT,
//!     constants::cid::DEVICE_CAPS,
//!     CommandType::Query,
//!     Bytes::new(),
//! )?;
//! let packets = generate_request_packets(&message, 64)?;
//! channel.unidirectional_transaction(&packets).await?;
//!
//! let outcome = Correlator::new()
//!     .poll(&channel, &[message.transaction_id], timeout)
//!     .await;
//! ```

pub mod assertion;
pub mod channel;
pub mod constants;
pub mod correlator;
pub mod error;
pub mod message;
pub mod protocol;
pub mod sequence;
pub mod transport;

pub use assertion::{assert_response_matches, ComplianceRegistry};
pub use channel::Channel;
pub use correlator::{Correlator, PollOutcome};
pub use error::{MbimError, ReassemblyError, Result};
pub use message::{CommandMessage, CommandType, ResponseMessage, TransactionIdGenerator};
pub use protocol::{generate_request_packets, parse_response_packets, Packet};
pub use sequence::{DeviceContext, SequenceRunner, Step};
pub use transport::{DeviceEndpoint, DeviceHandle, InterfaceDescriptor};
