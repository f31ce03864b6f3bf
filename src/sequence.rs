//! Ordered multi-step interactions against one device context.
//!
//! A compliance test is a sequence: descriptor discovery, then channel
//! open, then one or more command exchanges, all sharing a
//! [`DeviceContext`]. Each step either mutates the context (caching
//! discovered descriptors, installing the open channel) or performs a
//! protocol exchange; the first failure aborts the remaining steps and
//! propagates to the caller.
//!
//! The context is exclusively owned by the running sequence and passed by
//! reference into each step. Steps keep no hidden state of their own, so a
//! sequence can be re-run against a fresh context.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::assertion::assert_response_matches;
use crate::channel::Channel;
use crate::constants::status;
use crate::correlator::{Correlator, DEFAULT_POLL_TIMEOUT};
use crate::error::{MbimError, Result};
use crate::message::{CommandMessage, CommandType, ResponseMessage, TransactionIdGenerator};
use crate::protocol::{generate_request_packets, MessageType, Packet};
use crate::transport::{DeviceHandle, InterfaceDescriptor};

/// Boxed future returned by step implementations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared state threaded through a sequence.
///
/// Holds the device handle until the channel-open step consumes it, the
/// cached descriptor information, the open channel, the session's
/// transaction id generator, and the responses collected by exchange steps.
pub struct DeviceContext {
    device: Option<DeviceHandle>,
    /// Descriptor data cached by an earlier discovery step.
    pub descriptor_cache: Option<InterfaceDescriptor>,
    /// The open control channel, installed by [`OpenChannelStep`].
    pub channel: Option<Channel>,
    ids: TransactionIdGenerator,
    /// Responses recorded by [`CommandExchangeStep`]s, in execution order.
    pub responses: Vec<ResponseMessage>,
}

impl DeviceContext {
    /// Create a context for a freshly supplied device handle.
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device: Some(device),
            descriptor_cache: None,
            channel: None,
            ids: TransactionIdGenerator::new(),
            responses: Vec::new(),
        }
    }

    /// Cache descriptor information discovered upstream.
    pub fn update_descriptor_cache(&mut self, descriptor: InterfaceDescriptor) {
        self.descriptor_cache = Some(descriptor);
    }

    /// The session's transaction id generator.
    pub fn transaction_ids(&mut self) -> &mut TransactionIdGenerator {
        &mut self.ids
    }

    /// Negotiated maximum control transfer size from the descriptor cache.
    pub fn max_control_transfer_size(&self) -> Result<usize> {
        self.descriptor_cache
            .map(|d| d.max_control_transfer_size)
            .ok_or_else(|| MbimError::Protocol("descriptor cache not populated".to_string()))
    }

    /// The open channel, or an error if no open step ran.
    pub fn channel(&self) -> Result<&Channel> {
        self.channel
            .as_ref()
            .ok_or_else(|| MbimError::Protocol("channel not open".to_string()))
    }

    fn take_device(&mut self) -> Result<DeviceHandle> {
        self.device
            .take()
            .ok_or_else(|| MbimError::Protocol("device handle already consumed".to_string()))
    }
}

/// One step of a sequence.
pub trait Step: Send {
    /// Step name for diagnostics.
    fn name(&self) -> &'static str;

    /// Execute against the shared context.
    fn run<'a>(&'a mut self, ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>>;
}

/// Composes ordered steps against one context.
///
/// # Example
///
/// ```ignore
/// let mut runner = SequenceRunner::new()
///     .step(CacheDescriptorsStep::new(descriptor))
///     .step(OpenChannelStep)
///     .step(MbimOpenStep::new());
/// runner.run(&mut ctx).await?;
/// ```
pub struct SequenceRunner {
    steps: Vec<Box<dyn Step>>,
}

impl SequenceRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Number of composed steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the runner has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run all steps in order, aborting on the first failure.
    pub async fn run(&mut self, ctx: &mut DeviceContext) -> Result<()> {
        for step in &mut self.steps {
            tracing::debug!("running step {}", step.name());
            if let Err(e) = step.run(ctx).await {
                tracing::error!("step {} failed: {}", step.name(), e);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Default for SequenceRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache collaborator-supplied descriptor data into the context.
pub struct CacheDescriptorsStep {
    descriptor: InterfaceDescriptor,
}

impl CacheDescriptorsStep {
    /// Create the step from discovered descriptor data.
    pub fn new(descriptor: InterfaceDescriptor) -> Self {
        Self { descriptor }
    }
}

impl Step for CacheDescriptorsStep {
    fn name(&self) -> &'static str {
        "cache_descriptors"
    }

    fn run<'a>(&'a mut self, ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.update_descriptor_cache(self.descriptor);
            Ok(())
        })
    }
}

/// Consume the device handle and install the open channel.
pub struct OpenChannelStep;

impl Step for OpenChannelStep {
    fn name(&self) -> &'static str {
        "open_channel"
    }

    fn run<'a>(&'a mut self, ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let descriptor = ctx.descriptor_cache.ok_or_else(|| {
                MbimError::ChannelOpen("descriptor cache not populated".to_string())
            })?;
            let device = ctx.take_device()?;
            ctx.channel = Some(Channel::open(device, &descriptor)?);
            Ok(())
        })
    }
}

/// MBIM_OPEN handshake advertising the negotiated transfer size.
pub struct MbimOpenStep {
    correlator: Correlator,
    timeout: Duration,
}

impl MbimOpenStep {
    /// Create the step with default poll settings.
    pub fn new() -> Self {
        Self {
            correlator: Correlator::new(),
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the poll settings.
    pub fn with_poll(correlator: Correlator, timeout: Duration) -> Self {
        Self {
            correlator,
            timeout,
        }
    }
}

impl Default for MbimOpenStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for MbimOpenStep {
    fn name(&self) -> &'static str {
        "mbim_open"
    }

    fn run<'a>(&'a mut self, ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let transaction_id = ctx.transaction_ids().next_id()?;
            let max = ctx.max_control_transfer_size()?;
            let channel = ctx.channel()?;

            channel
                .unidirectional_transaction(&[Packet::open(transaction_id, max as u32)])
                .await?;
            let reply = self
                .correlator
                .poll_for_control(channel, transaction_id, MessageType::OpenDone, self.timeout)
                .await?;

            match reply.status() {
                Some(status::SUCCESS) => Ok(()),
                Some(other) => Err(MbimError::OpenRejected { status: other }),
                None => Err(MbimError::Protocol(
                    "MBIM_OPEN_DONE carried no status".to_string(),
                )),
            }
        })
    }
}

/// MBIM_CLOSE handshake, then release of the channel.
pub struct MbimCloseStep {
    correlator: Correlator,
    timeout: Duration,
}

impl MbimCloseStep {
    /// Create the step with default poll settings.
    pub fn new() -> Self {
        Self {
            correlator: Correlator::new(),
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the poll settings.
    pub fn with_poll(correlator: Correlator, timeout: Duration) -> Self {
        Self {
            correlator,
            timeout,
        }
    }
}

impl Default for MbimCloseStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for MbimCloseStep {
    fn name(&self) -> &'static str {
        "mbim_close"
    }

    fn run<'a>(&'a mut self, ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let transaction_id = ctx.transaction_ids().next_id()?;
            {
                let channel = ctx.channel()?;
                channel
                    .unidirectional_transaction(&[Packet::close(transaction_id)])
                    .await?;
                self.correlator
                    .poll_for_control(channel, transaction_id, MessageType::CloseDone, self.timeout)
                    .await?;
            }
            if let Some(channel) = ctx.channel.as_mut() {
                channel.close();
            }
            Ok(())
        })
    }
}

/// One full command exchange: build, fragment, send, poll, assert, record.
pub struct CommandExchangeStep {
    service_id: Uuid,
    cid: u32,
    command_type: CommandType,
    payload: Bytes,
    clause: String,
    correlator: Correlator,
    timeout: Duration,
}

impl CommandExchangeStep {
    /// Create an exchange asserting correlation under the given clause.
    pub fn new(
        service_id: Uuid,
        command_id: u32,
        command_type: CommandType,
        payload: Bytes,
        clause: &str,
    ) -> Self {
        Self {
            service_id,
            cid: command_id,
            command_type,
            payload,
            clause: clause.to_string(),
            correlator: Correlator::new(),
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the poll settings.
    pub fn with_poll(mut self, correlator: Correlator, timeout: Duration) -> Self {
        self.correlator = correlator;
        self.timeout = timeout;
        self
    }
}

impl Step for CommandExchangeStep {
    fn name(&self) -> &'static str {
        "command_exchange"
    }

    fn run<'a>(&'a mut self, ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let message = CommandMessage::new(
                ctx.transaction_ids(),
                self.service_id,
                self.cid,
                self.command_type,
                self.payload.clone(),
            )?;
            let max = ctx.max_control_transfer_size()?;
            let packets = generate_request_packets(&message, max)?;

            let response = {
                let channel = ctx.channel()?;
                channel.unidirectional_transaction(&packets).await?;
                let mut responses = self
                    .correlator
                    .poll(channel, &[message.transaction_id], self.timeout)
                    .await
                    .into_result()?;
                responses
                    .remove(&message.transaction_id)
                    .ok_or_else(|| {
                        MbimError::Protocol("resolved set missing polled transaction".to_string())
                    })?
            };

            assert_response_matches(&message, &response, &self.clause)?;
            ctx.responses.push(response);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{cid, UUID_BASIC_CONNECT};
    use crate::protocol::generate_response_packets;
    use crate::transport::{DeviceEndpoint, DEFAULT_QUEUE_DEPTH};

    fn descriptor() -> InterfaceDescriptor {
        InterfaceDescriptor {
            communication_interface: 0,
            interrupt_endpoint: 0x81,
            max_control_transfer_size: 64,
        }
    }

    fn fast_poll() -> (Correlator, Duration) {
        (
            Correlator::with_backoff(Duration::from_millis(2)),
            Duration::from_secs(1),
        )
    }

    /// Minimal simulated function: answers OPEN/CLOSE handshakes and echoes
    /// command payloads back with SUCCESS.
    async fn echo_function(mut endpoint: DeviceEndpoint) {
        while let Some(raw) = endpoint.recv_command().await {
            let Ok(packet) = Packet::decode(&raw) else {
                continue;
            };
            let replies = match packet.message_type {
                MessageType::Open => vec![Packet::open_done(packet.transaction_id, status::SUCCESS)],
                MessageType::Close => {
                    vec![Packet::close_done(packet.transaction_id, status::SUCCESS)]
                }
                MessageType::Command => {
                    let Some(first) = packet.first else { continue };
                    generate_response_packets(
                        packet.transaction_id,
                        first.service_id,
                        first.cid,
                        status::SUCCESS,
                        &packet.chunk,
                        64,
                    )
                    .unwrap_or_default()
                }
                _ => continue,
            };
            for reply in replies {
                if endpoint
                    .send_response(Bytes::from(reply.encode()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    }

    struct FailingStep;

    impl Step for FailingStep {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run<'a>(&'a mut self, _ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(MbimError::Protocol("deliberate".to_string())) })
        }
    }

    struct RecordingStep {
        ran: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl Step for RecordingStep {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn run<'a>(&'a mut self, _ctx: &'a mut DeviceContext) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_step_failure_aborts_sequence() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let (handle, _endpoint) = DeviceHandle::simulated_pair(&[0], 4);
        let mut ctx = DeviceContext::new(handle);

        let ran = Arc::new(AtomicBool::new(false));
        let mut runner = SequenceRunner::new()
            .step(FailingStep)
            .step(RecordingStep { ran: ran.clone() });

        assert!(runner.run(&mut ctx).await.is_err());
        assert!(!ran.load(Ordering::SeqCst), "later step must not run");
    }

    #[tokio::test]
    async fn test_cache_and_open_channel_steps() {
        let (handle, _endpoint) = DeviceHandle::simulated_pair(&[0], 4);
        let mut ctx = DeviceContext::new(handle);

        let mut runner = SequenceRunner::new()
            .step(CacheDescriptorsStep::new(descriptor()))
            .step(OpenChannelStep);
        runner.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.descriptor_cache, Some(descriptor()));
        assert!(ctx.channel.is_some());
        assert_eq!(ctx.max_control_transfer_size().unwrap(), 64);
    }

    #[tokio::test]
    async fn test_open_channel_requires_descriptor_cache() {
        let (handle, _endpoint) = DeviceHandle::simulated_pair(&[0], 4);
        let mut ctx = DeviceContext::new(handle);

        let mut runner = SequenceRunner::new().step(OpenChannelStep);
        assert!(matches!(
            runner.run(&mut ctx).await,
            Err(MbimError::ChannelOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_full_sequence_against_echo_function() {
        let (handle, endpoint) = DeviceHandle::simulated_pair(&[0], DEFAULT_QUEUE_DEPTH);
        tokio::spawn(echo_function(endpoint));

        let mut ctx = DeviceContext::new(handle);
        let (correlator, timeout) = fast_poll();

        let mut runner = SequenceRunner::new()
            .step(CacheDescriptorsStep::new(descriptor()))
            .step(OpenChannelStep)
            .step(MbimOpenStep::with_poll(correlator.clone(), timeout))
            .step(
                CommandExchangeStep::new(
                    UUID_BASIC_CONNECT,
                    cid::DEVICE_CAPS,
                    CommandType::Query,
                    Bytes::from_static(b"caps-probe"),
                    "mbim1.0:8.1.2#2",
                )
                .with_poll(correlator.clone(), timeout),
            )
            .step(MbimCloseStep::with_poll(correlator, timeout));

        runner.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.responses.len(), 1);
        assert_eq!(ctx.responses[0].payload(), b"caps-probe");
        assert_eq!(ctx.responses[0].cid(), cid::DEVICE_CAPS);
        assert!(ctx.channel.as_ref().is_some_and(Channel::is_closed));
    }

    #[tokio::test]
    async fn test_mbim_open_rejection_surfaces_status() {
        let (handle, mut endpoint) = DeviceHandle::simulated_pair(&[0], DEFAULT_QUEUE_DEPTH);
        tokio::spawn(async move {
            while let Some(raw) = endpoint.recv_command().await {
                let Ok(packet) = Packet::decode(&raw) else {
                    continue;
                };
                if packet.message_type == MessageType::Open {
                    let reply = Packet::open_done(packet.transaction_id, status::FAILURE);
                    if endpoint
                        .send_response(Bytes::from(reply.encode()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });

        let mut ctx = DeviceContext::new(handle);
        let (correlator, timeout) = fast_poll();
        let mut runner = SequenceRunner::new()
            .step(CacheDescriptorsStep::new(descriptor()))
            .step(OpenChannelStep)
            .step(MbimOpenStep::with_poll(correlator, timeout));

        assert!(matches!(
            runner.run(&mut ctx).await,
            Err(MbimError::OpenRejected {
                status: status::FAILURE
            })
        ));
    }
}
