//! MQTT 3.1.1 protocol engine.
//!
//! [`MqttEngine`] drives a single broker session over any [`Transport`]. It is
//! not a background task: inbound traffic and keep-alive pings are only
//! serviced while the caller is inside one of its methods, normally
//! [`ProtocolEngine::yield_for`].

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};
use ubilink_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    qos::QoS,
    return_code::SubscribeReturnCode,
    topic::{topic_matches, validate_publish_topic, validate_subscribe_filter},
};
use ubilink_packets::{
    connect::{ConnectPacket, ConnectPayload},
    disconnect::DisconnectPacket,
    pingreq::PingReqPacket,
    publish::PublishPacket,
    subscribe::{SubscribePacket, SubscribePayload},
    ControlPacket, PacketType,
};

use crate::countdown::Countdown;
use crate::error::{EngineError, TransportError};
use crate::message::{Message, MessageData, MessageHandler};
use crate::options::ConnectOptions;
use crate::transport::Transport;

/// Largest packet, fixed header included, the engine sends or accepts.
pub const MAX_PACKET_SIZE: usize = 1000;
/// Number of subscription filters that can carry a message handler.
pub const MAX_MESSAGE_HANDLERS: usize = 20;
/// How long a request waits for its acknowledgement.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// The MQTT session capability a [`Session`](crate::Session) drives.
#[allow(async_fn_in_trait)]
pub trait ProtocolEngine {
    type Transport: Transport;

    fn transport(&self) -> &Self::Transport;

    fn transport_mut(&mut self) -> &mut Self::Transport;

    /// Perform the CONNECT/CONNACK handshake over an already open transport.
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), EngineError>;

    async fn subscribe(
        &mut self,
        topic_filter: &str,
        qos: QoS,
        handler: Option<MessageHandler>,
    ) -> Result<(), EngineError>;

    async fn publish(&mut self, topic: &str, message: &Message) -> Result<(), EngineError>;

    /// Service inbound packets and keep-alive for `budget`.
    async fn yield_for(&mut self, budget: Duration) -> Result<(), EngineError>;

    /// End the MQTT session. The transport is left open.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

struct HandlerSlot {
    topic_filter: String,
    handler: MessageHandler,
}

pub struct MqttEngine<T> {
    transport: T,
    command_timeout: Duration,
    keep_alive_ms: u64,
    clean_session: bool,
    last_sent: Countdown,
    last_received: Countdown,
    ping_outstanding: bool,
    connected: bool,
    packet_id: u16,
    handlers: heapless::Vec<HandlerSlot, MAX_MESSAGE_HANDLERS>,
    read_buf: BytesMut,
}

impl<T: Transport> MqttEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            keep_alive_ms: 0,
            clean_session: true,
            last_sent: Countdown::default(),
            last_received: Countdown::default(),
            ping_outstanding: false,
            connected: false,
            packet_id: 0,
            handlers: heapless::Vec::new(),
            read_buf: BytesMut::with_capacity(MAX_PACKET_SIZE),
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn next_packet_id(&mut self) -> u16 {
        self.packet_id = if self.packet_id == u16::MAX {
            1
        } else {
            self.packet_id + 1
        };
        self.packet_id
    }

    fn close_session(&mut self) {
        if self.connected {
            debug!("Closing MQTT session");
        }

        self.connected = false;
        self.ping_outstanding = false;

        // A clean session forgets its subscriptions on the broker side as well.
        if self.clean_session {
            self.handlers.clear();
        }
    }

    async fn send_packet(&mut self, packet: ControlPacket) -> Result<(), EngineError> {
        let mut buffer = BytesMut::new();
        packet.encode(&mut buffer);

        if buffer.len() > MAX_PACKET_SIZE {
            return Err(EngineError::PacketTooLarge(buffer.len()));
        }

        trace!("Sending {:?}", packet.packet_type());
        self.transport.write(&buffer, self.command_timeout).await?;
        self.last_sent.countdown_ms(self.keep_alive_ms);

        Ok(())
    }

    /// Read at most one packet, all of it within `timer`. `Ok(None)` means nothing
    /// arrived before `timer` expired or the packet was of a type this engine ignores.
    async fn read_packet(&mut self, timer: &Countdown) -> Result<Option<ControlPacket>, EngineError> {
        let mut byte = [0u8; 1];

        if self.transport.read(&mut byte, timer.left()).await? == 0 {
            return Ok(None);
        }

        self.read_buf.clear();
        self.read_buf.put_u8(byte[0]);

        loop {
            read_exact(&mut self.transport, &mut byte, timer).await?;
            self.read_buf.put_u8(byte[0]);

            if byte[0] & 0b1000_0000 == 0 {
                break;
            }

            if self.read_buf.len() == 5 {
                return Err(Error::MalformedPacket("remaining length exceeds four bytes").into());
            }
        }

        let remaining_len = VariableByteInteger::decode(&mut &self.read_buf[1..])?.0 as usize;
        let header_len = self.read_buf.len();
        let total = header_len + remaining_len;

        if total > MAX_PACKET_SIZE {
            return Err(EngineError::PacketTooLarge(total));
        }

        self.read_buf.resize(total, 0);
        read_exact(&mut self.transport, &mut self.read_buf[header_len..], timer).await?;

        self.last_received.countdown_ms(self.keep_alive_ms);

        match ControlPacket::parse(&mut self.read_buf) {
            Ok(packet) => {
                trace!("Received {:?}", packet.packet_type());
                Ok(Some(packet))
            }
            Err(Error::UnsupportedPacket(packet_type)) => {
                debug!("Ignoring packet type {:#04x}", packet_type);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn deliver(&self, publish: &PublishPacket) {
        let message = Message {
            qos: publish.qos_level,
            retained: publish.retain,
            dup: publish.dup,
            id: publish.packet_id.unwrap_or(0),
            payload: publish.payload.clone(),
        };
        let data = MessageData {
            topic_name: &publish.topic_name,
            message: &message,
        };

        let mut delivered = false;

        for slot in self
            .handlers
            .iter()
            .filter(|slot| topic_matches(&slot.topic_filter, &publish.topic_name))
        {
            (slot.handler)(&data);
            delivered = true;
        }

        if !delivered {
            debug!(topic = %publish.topic_name, "No handler for inbound message");
        }
    }

    async fn keep_alive(&mut self) -> Result<(), EngineError> {
        if self.keep_alive_ms == 0 {
            return Ok(());
        }

        if self.last_sent.expired() || self.last_received.expired() {
            if self.ping_outstanding {
                return Err(EngineError::KeepAliveTimeout);
            }

            debug!("Sending PINGREQ");
            self.send_packet(ControlPacket::PingReq(PingReqPacket {}))
                .await?;
            // The broker gets one full interval to answer.
            self.last_received.countdown_ms(self.keep_alive_ms);
            self.ping_outstanding = true;
        }

        Ok(())
    }

    /// One read/dispatch/keep-alive round.
    async fn cycle(&mut self, timer: &Countdown) -> Result<Option<ControlPacket>, EngineError> {
        let packet = self.read_packet(timer).await?;

        match &packet {
            Some(ControlPacket::Publish(publish)) => self.deliver(publish),
            Some(ControlPacket::PingResp(_)) => self.ping_outstanding = false,
            _ => {}
        }

        self.keep_alive().await?;

        Ok(packet)
    }

    async fn wait_for(&mut self, packet_type: PacketType) -> Result<ControlPacket, EngineError> {
        let timer = Countdown::from_duration(self.command_timeout);

        loop {
            if let Some(packet) = self.cycle(&timer).await? {
                if packet.packet_type() == packet_type {
                    return Ok(packet);
                }
            }

            if timer.expired() {
                return Err(EngineError::Timeout(packet_type));
            }
        }
    }

    async fn request(
        &mut self,
        packet: ControlPacket,
        response: PacketType,
    ) -> Result<ControlPacket, EngineError> {
        self.send_packet(packet).await?;
        self.wait_for(response).await
    }
}

impl<T: Transport> ProtocolEngine for MqttEngine<T> {
    type Transport = T;

    fn transport(&self) -> &T {
        &self.transport
    }

    fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), EngineError> {
        if self.connected {
            return Err(EngineError::AlreadyConnected);
        }

        self.keep_alive_ms = u64::from(options.keep_alive) * 1000;
        self.clean_session = options.clean_session;
        self.ping_outstanding = false;
        self.last_received.countdown(u64::from(options.keep_alive));

        let packet = ConnectPacket::new(
            options.protocol_version,
            options.keep_alive,
            options.clean_session,
            ConnectPayload {
                client_id: options.client_id.clone(),
                user_name: options.username.clone(),
                password: options.password.clone(),
            },
        );

        let connack = match self
            .request(ControlPacket::Connect(packet), PacketType::ConnAck)
            .await?
        {
            ControlPacket::ConnAck(connack) => connack,
            other => return Err(EngineError::UnexpectedPacket(other.packet_type())),
        };

        if !connack.return_code.is_accepted() {
            debug!("CONNACK refused: {}", connack.return_code);
            return Err(EngineError::Refused(connack.return_code));
        }

        debug!(
            client_id = %options.client_id,
            session_present = connack.flags.session_present,
            "MQTT session established"
        );
        self.connected = true;

        Ok(())
    }

    async fn subscribe(
        &mut self,
        topic_filter: &str,
        qos: QoS,
        handler: Option<MessageHandler>,
    ) -> Result<(), EngineError> {
        if !self.connected {
            return Err(EngineError::NotConnected);
        }

        validate_subscribe_filter(topic_filter)?;

        let packet = SubscribePacket {
            packet_id: self.next_packet_id(),
            payload: vec![SubscribePayload {
                topic_filter: topic_filter.to_string(),
                qos,
            }],
        };

        let suback = match self
            .request(ControlPacket::Subscribe(packet), PacketType::SubAck)
            .await
        {
            Ok(ControlPacket::SubAck(suback)) => suback,
            Ok(other) => return Err(EngineError::UnexpectedPacket(other.packet_type())),
            Err(e) => {
                self.close_session();
                return Err(e);
            }
        };

        match suback.return_codes.first() {
            Some(SubscribeReturnCode::Granted(granted)) => {
                debug!(topic_filter, ?granted, "Subscribed");
            }
            _ => return Err(EngineError::SubscribeRejected),
        }

        let Some(handler) = handler else {
            return Ok(());
        };

        if let Some(slot) = self
            .handlers
            .iter_mut()
            .find(|slot| slot.topic_filter == topic_filter)
        {
            slot.handler = handler;
            return Ok(());
        }

        self.handlers
            .push(HandlerSlot {
                topic_filter: topic_filter.to_string(),
                handler,
            })
            .map_err(|_| EngineError::HandlerTableFull)
    }

    async fn publish(&mut self, topic: &str, message: &Message) -> Result<(), EngineError> {
        if !self.connected {
            return Err(EngineError::NotConnected);
        }

        if message.qos != QoS::AtMostOnce {
            return Err(EngineError::UnsupportedQoS(message.qos));
        }

        validate_publish_topic(topic)?;

        let packet = PublishPacket {
            dup: message.dup,
            qos_level: message.qos,
            retain: message.retained,
            topic_name: topic.to_string(),
            packet_id: None,
            payload: message.payload.clone(),
        };

        match self.send_packet(ControlPacket::Publish(packet)).await {
            Ok(()) => Ok(()),
            Err(e @ EngineError::PacketTooLarge(_)) => Err(e),
            Err(e) => {
                self.close_session();
                Err(e)
            }
        }
    }

    async fn yield_for(&mut self, budget: Duration) -> Result<(), EngineError> {
        let timer = Countdown::from_duration(budget);

        loop {
            if let Err(e) = self.cycle(&timer).await {
                debug!("Yield failed: {}", e);
                self.close_session();
                return Err(e);
            }

            if timer.expired() {
                return Ok(());
            }
        }
    }

    async fn disconnect(&mut self) {
        if self.connected {
            if let Err(e) = self
                .send_packet(ControlPacket::Disconnect(DisconnectPacket {}))
                .await
            {
                debug!("Failed to send DISCONNECT: {}", e);
            }
        }

        self.close_session();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Fill `buf`, failing with a timeout once `timer` expires with bytes still missing.
async fn read_exact<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
    timer: &Countdown,
) -> Result<(), EngineError> {
    let mut filled = 0;

    while filled < buf.len() {
        let n = transport.read(&mut buf[filled..], timer.left()).await?;

        if n == 0 && timer.expired() {
            return Err(TransportError::Timeout.into());
        }

        filled += n;
    }

    Ok(())
}
