//! Transport seam - device handle and interface descriptors.
//!
//! Device enumeration and USB bring-up happen upstream; the engine receives
//! a [`DeviceHandle`] already wired to the function's control endpoints. The
//! handle exposes two logical directions: an outbound sender for
//! encapsulated commands and an inbound receiver fed by the device's
//! notification path.
//!
//! [`DeviceHandle::simulated_pair`] returns the handle together with the far
//! side, [`DeviceEndpoint`], so tests and demos can stand in for the modem
//! firmware under test.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{MbimError, Result};
use crate::protocol::MIN_CONTROL_TRANSFER_SIZE;

/// Default queue depth for a simulated device pair.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// USB endpoint direction bit: IN (device to host).
const ENDPOINT_DIR_IN: u8 = 0x80;

/// Descriptor data the discovery step caches for channel open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    /// bInterfaceNumber of the MBIM communication interface.
    pub communication_interface: u8,
    /// bEndpointAddress of the interrupt notification endpoint.
    pub interrupt_endpoint: u8,
    /// Negotiated wMaxControlMessage in bytes.
    pub max_control_transfer_size: usize,
}

impl InterfaceDescriptor {
    /// Validate the descriptor for channel open.
    ///
    /// The notification endpoint must be an IN endpoint and the negotiated
    /// transfer size must meet the MBIM 1.0 floor.
    pub fn validate(&self) -> Result<()> {
        if self.interrupt_endpoint & ENDPOINT_DIR_IN == 0 {
            return Err(MbimError::ChannelOpen(format!(
                "endpoint {:#04x} is not an IN endpoint",
                self.interrupt_endpoint
            )));
        }
        if self.max_control_transfer_size < MIN_CONTROL_TRANSFER_SIZE {
            return Err(MbimError::ChannelOpen(format!(
                "max control transfer size {} below MBIM minimum {}",
                self.max_control_transfer_size, MIN_CONTROL_TRANSFER_SIZE
            )));
        }
        Ok(())
    }
}

/// Host-side handle to an open device, supplied by descriptor discovery.
#[derive(Debug)]
pub struct DeviceHandle {
    interfaces: Vec<u8>,
    command_tx: mpsc::Sender<Bytes>,
    response_rx: mpsc::Receiver<Bytes>,
}

impl DeviceHandle {
    /// Assemble a handle from an upstream transport backend.
    ///
    /// `interfaces` lists the interface numbers the device will let the
    /// host claim; `command_tx` carries encapsulated commands toward the
    /// function and `response_rx` is fed by its notification path.
    pub fn from_parts(
        interfaces: Vec<u8>,
        command_tx: mpsc::Sender<Bytes>,
        response_rx: mpsc::Receiver<Bytes>,
    ) -> Self {
        Self {
            interfaces,
            command_tx,
            response_rx,
        }
    }

    /// Create an in-memory device pair for simulators and tests.
    pub fn simulated_pair(interfaces: &[u8], queue_depth: usize) -> (DeviceHandle, DeviceEndpoint) {
        let (command_tx, command_rx) = mpsc::channel(queue_depth.max(1));
        let (response_tx, response_rx) = mpsc::channel(queue_depth.max(1));
        (
            DeviceHandle::from_parts(interfaces.to_vec(), command_tx, response_rx),
            DeviceEndpoint {
                command_rx,
                response_tx,
            },
        )
    }

    /// Whether the device exposes the given interface for claiming.
    pub fn can_claim(&self, interface_number: u8) -> bool {
        self.interfaces.contains(&interface_number)
    }

    /// Split the handle into its outbound and inbound directions.
    pub(crate) fn into_split(self) -> (mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>) {
        (self.command_tx, self.response_rx)
    }
}

/// Far side of a simulated device pair.
///
/// A simulator reads encapsulated commands with [`recv_command`] and answers
/// through [`send_response`], playing the modem firmware's role.
///
/// [`recv_command`]: DeviceEndpoint::recv_command
/// [`send_response`]: DeviceEndpoint::send_response
#[derive(Debug)]
pub struct DeviceEndpoint {
    command_rx: mpsc::Receiver<Bytes>,
    response_tx: mpsc::Sender<Bytes>,
}

impl DeviceEndpoint {
    /// Receive the next encapsulated command, `None` once the host closed.
    pub async fn recv_command(&mut self) -> Option<Bytes> {
        self.command_rx.recv().await
    }

    /// Queue an encapsulated response on the notification path.
    pub async fn send_response(&self, transfer: Bytes) -> Result<()> {
        self.response_tx
            .send(transfer)
            .await
            .map_err(|_| MbimError::ChannelClosed)
    }
}
