//! Response correlation with bounded polling.
//!
//! The device under test may answer outstanding requests asynchronously and
//! in arbitrary order; the [`Correlator`] makes that safe for a
//! single-threaded caller. Each poll pass drains the channel's inbound
//! buffer, groups packets by transaction id, and attempts reassembly per
//! group, sleeping a short backoff between passes until every requested id
//! resolves or the wall-clock bound elapses.
//!
//! A timeout is an expected, testable outcome here, so `poll` returns a
//! [`PollOutcome`] instead of an error. Retrying is the caller's decision.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::channel::Channel;
use crate::error::{MbimError, Result};
use crate::message::ResponseMessage;
use crate::protocol::{parse_response_packets, MessageType, Packet};

/// Default sleep between buffer-drain passes.
pub const DEFAULT_POLL_BACKOFF: Duration = Duration::from_millis(50);

/// Default wall-clock bound for a poll invocation.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one bounded poll invocation.
#[derive(Debug)]
pub enum PollOutcome {
    /// Every requested transaction resolved to a complete response.
    Resolved(HashMap<u32, ResponseMessage>),
    /// The bound elapsed with transactions still unresolved.
    ///
    /// Responses that did resolve are returned; nothing continues in the
    /// background after this point.
    TimedOut {
        /// Responses resolved before the deadline.
        responses: HashMap<u32, ResponseMessage>,
        /// Transaction ids that never resolved.
        unresolved: Vec<u32>,
    },
}

impl PollOutcome {
    /// Convert the outcome into a result, mapping a timeout to
    /// [`MbimError::PollTimeout`]. For callers where anything short of full
    /// resolution aborts the sequence.
    pub fn into_result(self) -> Result<HashMap<u32, ResponseMessage>> {
        match self {
            PollOutcome::Resolved(responses) => Ok(responses),
            PollOutcome::TimedOut { unresolved, .. } => Err(MbimError::PollTimeout { unresolved }),
        }
    }
}

/// Matches buffered inbound packets to outstanding transaction ids.
#[derive(Debug, Clone)]
pub struct Correlator {
    backoff: Duration,
}

impl Correlator {
    /// Create a correlator with the default backoff.
    pub fn new() -> Self {
        Self {
            backoff: DEFAULT_POLL_BACKOFF,
        }
    }

    /// Create a correlator with a custom backoff between drain passes.
    pub fn with_backoff(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// Resolve the given transaction ids within a wall-clock bound.
    ///
    /// Packets whose transaction id is not in the pending set are dropped,
    /// not buffered for a future poll: correlation is scoped to the ids the
    /// caller explicitly asked about. Resolution order is arbitrary; each id
    /// resolves only to the response whose header fields carry that id.
    pub async fn poll(
        &self,
        channel: &Channel,
        pending_ids: &[u32],
        timeout: Duration,
    ) -> PollOutcome {
        let deadline = Instant::now() + timeout;

        let mut remaining: HashSet<u32> = pending_ids.iter().copied().collect();
        let mut groups: HashMap<u32, Vec<Packet>> = HashMap::new();
        let mut responses: HashMap<u32, ResponseMessage> = HashMap::new();

        loop {
            for packet in channel.get_outstanding_packets() {
                self.accept(&mut groups, &remaining, packet);
            }

            remaining.retain(|&id| {
                let Some(group) = groups.get(&id) else {
                    return true;
                };
                let count = group[0].fragment_count as usize;
                if group.len() < count {
                    return true;
                }
                match parse_response_packets(group) {
                    Ok(response) => {
                        responses.insert(id, response);
                        false
                    }
                    // A defective set can never resolve; reported as
                    // unresolved without disturbing the other ids.
                    Err(e) => {
                        tracing::warn!("transaction {}: reassembly failed: {}", id, e);
                        true
                    }
                }
            });

            if remaining.is_empty() {
                return PollOutcome::Resolved(responses);
            }
            let now = Instant::now();
            if now >= deadline {
                let mut unresolved: Vec<u32> = remaining.into_iter().collect();
                unresolved.sort_unstable();
                return PollOutcome::TimedOut {
                    responses,
                    unresolved,
                };
            }
            tokio::time::sleep(self.backoff.min(deadline - now)).await;
        }
    }

    /// Wait for an unfragmented handshake reply (OPEN_DONE / CLOSE_DONE).
    ///
    /// Same bounded drain loop as [`poll`], but matching on message type
    /// instead of reassembling fragments. Non-matching packets are dropped.
    ///
    /// [`poll`]: Correlator::poll
    pub async fn poll_for_control(
        &self,
        channel: &Channel,
        transaction_id: u32,
        message_type: MessageType,
        timeout: Duration,
    ) -> Result<Packet> {
        let deadline = Instant::now() + timeout;

        loop {
            for packet in channel.get_outstanding_packets() {
                if packet.transaction_id == transaction_id && packet.message_type == message_type {
                    return Ok(packet);
                }
                tracing::debug!(
                    "ignoring {:?} for transaction {} while waiting for {:?}/{}",
                    packet.message_type,
                    packet.transaction_id,
                    message_type,
                    transaction_id
                );
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(MbimError::PollTimeout {
                    unresolved: vec![transaction_id],
                });
            }
            tokio::time::sleep(self.backoff.min(deadline - now)).await;
        }
    }

    /// File one drained packet into its transaction group.
    fn accept(
        &self,
        groups: &mut HashMap<u32, Vec<Packet>>,
        remaining: &HashSet<u32>,
        packet: Packet,
    ) {
        if !remaining.contains(&packet.transaction_id) {
            tracing::debug!(
                "dropping packet for transaction {} outside the pending set",
                packet.transaction_id
            );
            return;
        }
        if packet.message_type != MessageType::CommandDone {
            tracing::debug!(
                "dropping {:?} for pending transaction {}",
                packet.message_type,
                packet.transaction_id
            );
            return;
        }

        let group = groups.entry(packet.transaction_id).or_default();
        if let Some(existing) = group
            .iter()
            .find(|p| p.fragment_index == packet.fragment_index)
        {
            // Duplicates are an error, never an overwrite. The newcomer is
            // dropped so one corrupt transfer cannot wedge the other
            // transactions still in flight.
            if existing.chunk != packet.chunk {
                tracing::warn!(
                    "transaction {}: duplicate fragment {} with differing content dropped",
                    packet.transaction_id,
                    packet.fragment_index
                );
            } else {
                tracing::debug!(
                    "transaction {}: duplicate fragment {} dropped",
                    packet.transaction_id,
                    packet.fragment_index
                );
            }
            return;
        }
        group.push(packet);
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::constants::{cid, status, UUID_BASIC_CONNECT};
    use crate::protocol::generate_response_packets;
    use crate::transport::{DeviceHandle, InterfaceDescriptor, DEFAULT_QUEUE_DEPTH};

    fn open_pair() -> (Channel, crate::transport::DeviceEndpoint) {
        let (handle, endpoint) = DeviceHandle::simulated_pair(&[0], DEFAULT_QUEUE_DEPTH);
        let descriptor = InterfaceDescriptor {
            communication_interface: 0,
            interrupt_endpoint: 0x81,
            max_control_transfer_size: 64,
        };
        (Channel::open(handle, &descriptor).unwrap(), endpoint)
    }

    fn correlator() -> Correlator {
        Correlator::with_backoff(Duration::from_millis(2))
    }

    async fn send_all(endpoint: &crate::transport::DeviceEndpoint, packets: &[Packet]) {
        for packet in packets {
            endpoint
                .send_response(Bytes::from(packet.encode()))
                .await
                .unwrap();
        }
    }

    fn response_set(transaction_id: u32, command_id: u32, payload: &[u8]) -> Vec<Packet> {
        generate_response_packets(
            transaction_id,
            UUID_BASIC_CONNECT,
            command_id,
            status::SUCCESS,
            &Bytes::copy_from_slice(payload),
            64,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let (channel, endpoint) = open_pair();

        let a = response_set(1, cid::DEVICE_CAPS, b"first");
        let b = response_set(2, cid::DEVICE_SERVICES, b"second");

        // B's complete set arrives before A's.
        send_all(&endpoint, &b).await;
        send_all(&endpoint, &a).await;

        let outcome = correlator()
            .poll(&channel, &[1, 2], Duration::from_secs(1))
            .await;
        let responses = outcome.into_result().unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[&1].payload(), b"first");
        assert_eq!(responses[&1].cid(), cid::DEVICE_CAPS);
        assert_eq!(responses[&2].payload(), b"second");
        assert_eq!(responses[&2].cid(), cid::DEVICE_SERVICES);
    }

    #[tokio::test]
    async fn test_interleaved_fragments_resolve() {
        let (channel, endpoint) = open_pair();

        let payload: Vec<u8> = (0..120u8).collect();
        let a = response_set(1, cid::DEVICE_CAPS, &payload);
        let b = response_set(2, cid::DEVICE_CAPS, &payload);
        assert!(a.len() >= 2);

        // Interleave the two transactions fragment by fragment.
        let mut mixed = Vec::new();
        for i in 0..a.len().max(b.len()) {
            if let Some(p) = b.get(i) {
                mixed.push(p.clone());
            }
            if let Some(p) = a.get(i) {
                mixed.push(p.clone());
            }
        }
        send_all(&endpoint, &mixed).await;

        let responses = correlator()
            .poll(&channel, &[1, 2], Duration::from_secs(1))
            .await
            .into_result()
            .unwrap();
        assert_eq!(responses[&1].payload(), &payload[..]);
        assert_eq!(responses[&2].payload(), &payload[..]);
    }

    #[tokio::test]
    async fn test_unrelated_packets_ignored() {
        let (channel, endpoint) = open_pair();

        send_all(&endpoint, &response_set(99, cid::RADIO_STATE, b"noise")).await;
        send_all(&endpoint, &response_set(5, cid::DEVICE_CAPS, b"wanted")).await;

        let responses = correlator()
            .poll(&channel, &[5], Duration::from_secs(1))
            .await
            .into_result()
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[&5].payload(), b"wanted");
    }

    #[tokio::test]
    async fn test_timeout_reports_unresolved() {
        let (channel, endpoint) = open_pair();

        send_all(&endpoint, &response_set(1, cid::DEVICE_CAPS, b"only one")).await;

        let outcome = correlator()
            .poll(&channel, &[1, 2, 3], Duration::from_millis(30))
            .await;
        match outcome {
            PollOutcome::TimedOut {
                responses,
                unresolved,
            } => {
                assert_eq!(responses.len(), 1);
                assert!(responses.contains_key(&1));
                assert_eq!(unresolved, vec![2, 3]);
            }
            PollOutcome::Resolved(_) => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn test_timeout_converts_to_error() {
        let (channel, _endpoint) = open_pair();
        let outcome = correlator()
            .poll(&channel, &[9], Duration::from_millis(10))
            .await;
        assert!(matches!(
            outcome.into_result(),
            Err(MbimError::PollTimeout { unresolved }) if unresolved == vec![9]
        ));
    }

    #[tokio::test]
    async fn test_partial_set_waits_for_late_fragment() {
        let (channel, endpoint) = open_pair();

        let payload: Vec<u8> = (0..100u8).collect();
        let set = response_set(4, cid::DEVICE_CAPS, &payload);
        assert_eq!(set.len(), 3);

        // First two fragments now, the last one after a delay.
        send_all(&endpoint, &set[..2]).await;
        let late = set[2].clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            endpoint
                .send_response(Bytes::from(late.encode()))
                .await
                .unwrap();
        });

        let responses = correlator()
            .poll(&channel, &[4], Duration::from_secs(1))
            .await
            .into_result()
            .unwrap();
        assert_eq!(responses[&4].payload(), &payload[..]);
    }

    #[tokio::test]
    async fn test_duplicate_fragment_does_not_wedge_poll() {
        let (channel, endpoint) = open_pair();

        let payload: Vec<u8> = (0..100u8).collect();
        let set = response_set(4, cid::DEVICE_CAPS, &payload);

        // Re-deliver fragment 1 before the set completes.
        send_all(&endpoint, &set[..2]).await;
        send_all(&endpoint, &set[1..2]).await;
        send_all(&endpoint, &set[2..]).await;

        let responses = correlator()
            .poll(&channel, &[4], Duration::from_secs(1))
            .await
            .into_result()
            .unwrap();
        assert_eq!(responses[&4].payload(), &payload[..]);
    }

    #[tokio::test]
    async fn test_poll_for_control_matches_handshake() {
        let (channel, endpoint) = open_pair();

        endpoint
            .send_response(Bytes::from(Packet::open_done(1, status::SUCCESS).encode()))
            .await
            .unwrap();

        let packet = correlator()
            .poll_for_control(&channel, 1, MessageType::OpenDone, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(packet.status(), Some(status::SUCCESS));
    }

    #[tokio::test]
    async fn test_poll_for_control_times_out() {
        let (channel, _endpoint) = open_pair();
        let result = correlator()
            .poll_for_control(&channel, 1, MessageType::OpenDone, Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(MbimError::PollTimeout { .. })));
    }
}
