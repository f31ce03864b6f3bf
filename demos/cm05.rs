//! CM_05-style exchange against a simulated function.
//!
//! Sends two consecutive Query commands with no synchronous pairing, lets
//! the simulated modem answer them in reverse order, and verifies that the
//! responses correlate to their requests by transaction id, service id, and
//! cid.
//!
//! Run with: `cargo run --example cm05`

use std::time::Duration;

use bytes::Bytes;

use mbim_compliance::assertion::assert_response_matches;
use mbim_compliance::constants::{cid, status, UUID_BASIC_CONNECT};
use mbim_compliance::protocol::{generate_response_packets, MessageType, Packet};
use mbim_compliance::sequence::{
    CacheDescriptorsStep, MbimOpenStep, OpenChannelStep, SequenceRunner,
};
use mbim_compliance::{
    generate_request_packets, CommandMessage, Correlator, DeviceContext, DeviceEndpoint,
    DeviceHandle, InterfaceDescriptor, Result, CommandType,
};

const TRANSFER_SIZE: usize = 64;

/// Simulated modem firmware: acknowledges MBIM_OPEN, buffers command
/// requests, and answers them in reverse arrival order.
async fn simulated_function(mut endpoint: DeviceEndpoint) {
    let mut pending: Vec<Packet> = Vec::new();

    while let Some(raw) = endpoint.recv_command().await {
        let Ok(packet) = Packet::decode(&raw) else {
            continue;
        };
        match packet.message_type {
            MessageType::Open => {
                let done = Packet::open_done(packet.transaction_id, status::SUCCESS);
                if endpoint
                    .send_response(Bytes::from(done.encode()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            MessageType::Command => {
                pending.push(packet);
                // Answer once two requests are in flight, newest first.
                if pending.len() == 2 {
                    for request in pending.drain(..).rev() {
                        let Some(first) = request.first else { continue };
                        let replies = match generate_response_packets(
                            request.transaction_id,
                            first.service_id,
                            first.cid,
                            status::SUCCESS,
                            &Bytes::new(),
                            TRANSFER_SIZE,
                        ) {
                            Ok(replies) => replies,
                            Err(_) => continue,
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
            }
            _ => {}
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (handle, endpoint) = DeviceHandle::simulated_pair(&[0], 64);
    tokio::spawn(simulated_function(endpoint));

    let descriptor = InterfaceDescriptor {
        communication_interface: 0,
        interrupt_endpoint: 0x81,
        max_control_transfer_size: TRANSFER_SIZE,
    };

    // Precondition: cache descriptors, open the channel, MBIM_OPEN.
    let mut ctx = DeviceContext::new(handle);
    let correlator = Correlator::with_backoff(Duration::from_millis(5));
    SequenceRunner::new()
        .step(CacheDescriptorsStep::new(descriptor))
        .step(OpenChannelStep)
        .step(MbimOpenStep::with_poll(
            correlator.clone(),
            Duration::from_secs(5),
        ))
        .run(&mut ctx)
        .await?;
    tracing::info!("channel open, MBIM_OPEN acknowledged");

    // Step 1: DEVICE_CAPS query, fire-and-forget.
    let caps = CommandMessage::new(
        ctx.transaction_ids(),
        UUID_BASIC_CONNECT,
        cid::DEVICE_CAPS,
        CommandType::Query,
        Bytes::new(),
    )?;
    let caps_packets = generate_request_packets(&caps, TRANSFER_SIZE)?;

    // Step 2: DEVICE_SERVICES query while the first is still in flight.
    let services = CommandMessage::new(
        ctx.transaction_ids(),
        UUID_BASIC_CONNECT,
        cid::DEVICE_SERVICES,
        CommandType::Query,
        Bytes::new(),
    )?;
    let services_packets = generate_request_packets(&services, TRANSFER_SIZE)?;

    let channel = ctx.channel()?;
    channel.unidirectional_transaction(&caps_packets).await?;
    channel.unidirectional_transaction(&services_packets).await?;

    // Step 3: poll for both transactions; arrival order is the function's
    // business, not ours.
    let responses = correlator
        .poll(
            channel,
            &[caps.transaction_id, services.transaction_id],
            Duration::from_secs(5),
        )
        .await
        .into_result()?;

    for (request, label) in [(&caps, "DEVICE_CAPS"), (&services, "DEVICE_SERVICES")] {
        let response = &responses[&request.transaction_id];
        assert_response_matches(request, response, "mbim1.0:8.1.2#2")?;
        tracing::info!(
            "{} response correlated: transaction {}, status {:#010x}",
            label,
            response.transaction_id(),
            response.status()
        );
    }

    tracing::info!("CM_05 verdict: pass");
    Ok(())
}
