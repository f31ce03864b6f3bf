//! Control channel over the device transport.
//!
//! The [`Channel`] owns one MBIM control session: an outbound path for
//! encapsulated commands and an inbound buffer fed asynchronously by the
//! device's notification path. A spawned reader task decodes each incoming
//! transfer into a [`Packet`] and appends it to the buffer; the engine only
//! ever observes the inbound side through [`get_outstanding_packets`],
//! which drains destructively.
//!
//! Sending is fire-and-forget: `unidirectional_transaction` never waits for
//! a reply, so a test can put two requests in flight and probe whether the
//! function demultiplexes them correctly.
//!
//! [`get_outstanding_packets`]: Channel::get_outstanding_packets

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{MbimError, Result};
use crate::protocol::Packet;
use crate::transport::{DeviceHandle, InterfaceDescriptor};

/// An open MBIM control channel.
pub struct Channel {
    /// Outbound path; `None` once closed.
    command_tx: Option<mpsc::Sender<Bytes>>,
    /// Inbound buffer, filled by the reader task.
    inbound: Arc<Mutex<VecDeque<Packet>>>,
    /// Reader task handle, aborted on close.
    reader: Option<JoinHandle<()>>,
}

impl Channel {
    /// Open the control channel.
    ///
    /// Validates the descriptor, claims the communication interface, and
    /// starts the inbound reader. Fails with [`MbimError::ChannelOpen`] when
    /// the descriptor is invalid or the device does not expose the requested
    /// interface.
    pub fn open(handle: DeviceHandle, descriptor: &InterfaceDescriptor) -> Result<Self> {
        descriptor.validate()?;
        if !handle.can_claim(descriptor.communication_interface) {
            return Err(MbimError::ChannelOpen(format!(
                "device rejected claim of interface {}",
                descriptor.communication_interface
            )));
        }

        let (command_tx, mut response_rx) = handle.into_split();
        let inbound = Arc::new(Mutex::new(VecDeque::new()));

        let buffer = inbound.clone();
        let reader = tokio::spawn(async move {
            while let Some(transfer) = response_rx.recv().await {
                match Packet::decode(&transfer) {
                    Ok(packet) => {
                        if let Ok(mut queue) = buffer.lock() {
                            queue.push_back(packet);
                        }
                    }
                    // Malformed transfers never abort the reader; the
                    // transaction they belonged to will surface as
                    // unresolved.
                    Err(e) => {
                        tracing::warn!("dropping malformed encapsulated response: {}", e);
                    }
                }
            }
            tracing::debug!("notification path closed");
        });

        Ok(Self {
            command_tx: Some(command_tx),
            inbound,
            reader: Some(reader),
        })
    }

    /// Send packets in order without waiting for any reply.
    ///
    /// The caller polls for responses separately; nothing here pairs a
    /// request with its reply.
    pub async fn unidirectional_transaction(&self, packets: &[Packet]) -> Result<()> {
        let tx = self.command_tx.as_ref().ok_or(MbimError::ChannelClosed)?;
        for packet in packets {
            tx.send(Bytes::from(packet.encode()))
                .await
                .map_err(|_| MbimError::ChannelClosed)?;
        }
        Ok(())
    }

    /// Drain the inbound buffer.
    ///
    /// Draining is destructive: returned packets are removed; a caller that
    /// needs to re-inspect them must retain its own copy.
    pub fn get_outstanding_packets(&self) -> Vec<Packet> {
        match self.inbound.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Release the transport. Idempotent.
    pub fn close(&mut self) {
        self.command_tx = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_none()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}
