//! MQTT 3.1.1 control packets spoken by the ubilink device client.
//!
//! Only the packets a QoS 0 client exchanges are modelled. Any other packet
//! type is recognised by [`PacketType`] and reported as
//! [`Error::UnsupportedPacket`] so a caller can skip it.

pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod pingreq;
pub mod pingresp;
pub mod publish;
pub mod suback;
pub mod subscribe;

use std::convert::{TryFrom, TryInto};

use bytes::{Buf, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    Result,
};

use crate::{
    connack::ConnAckPacket, connect::ConnectPacket, disconnect::DisconnectPacket,
    pingreq::PingReqPacket, pingresp::PingRespPacket, publish::PublishPacket,
    suback::SubAckPacket, subscribe::SubscribePacket,
};

#[derive(PartialEq, Eq, Debug)]
pub enum ControlPacket {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
}

#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PacketType {
    Connect = 0x01,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        use PacketType::*;

        let res = match value {
            0x01 => Connect,
            0x02 => ConnAck,
            0x03 => Publish,
            0x04 => PubAck,
            0x05 => PubRec,
            0x06 => PubRel,
            0x07 => PubComp,
            0x08 => Subscribe,
            0x09 => SubAck,
            0x0a => Unsubscribe,
            0x0b => UnsubAck,
            0x0c => PingReq,
            0x0d => PingResp,
            0x0e => Disconnect,
            _ => return Err(Error::MalformedPacket("unknown packet type")),
        };

        Ok(res)
    }
}

/// Decode the fixed header that precedes every packet body: returns the
/// first byte and the remaining length.
pub(crate) fn decode_fixed_header<T: Buf>(buffer: &mut T) -> Result<(u8, usize)> {
    let header = u8::decode(buffer)?;
    let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;

    if buffer.remaining() < remaining_len {
        return Err(Error::PacketIncomplete);
    }

    Ok((header, remaining_len))
}

/// Write a fixed header for a body of `remaining_len` bytes.
pub(crate) fn encode_fixed_header(header: u8, remaining_len: usize, buffer: &mut BytesMut) {
    header.encode(buffer);
    VariableByteInteger(remaining_len as u32).encode(buffer);
}

impl ControlPacket {
    /// Total length of the first packet in `src`, fixed header included.
    ///
    /// Returns [`Error::PacketIncomplete`] until the whole packet is buffered.
    pub fn frame_length(src: &[u8]) -> Result<usize> {
        let mut peeker = src;

        u8::decode(&mut peeker)?;
        let remaining_len = VariableByteInteger::decode(&mut peeker)?;
        let total = 1 + remaining_len.encoded_size() + remaining_len.0 as usize;

        if src.len() >= total {
            return Ok(total);
        }

        Err(Error::PacketIncomplete)
    }

    /// Parse one complete packet from the front of `src`, consuming it.
    pub fn parse(src: &mut BytesMut) -> Result<ControlPacket> {
        use ControlPacket::*;

        let frame_len = Self::frame_length(src)?;
        let mut frame = src.split_to(frame_len);

        let packet = match (frame[0] >> 4).try_into()? {
            PacketType::Connect => Connect(ConnectPacket::decode(&mut frame)?),
            PacketType::ConnAck => ConnAck(ConnAckPacket::decode(&mut frame)?),
            PacketType::Publish => Publish(PublishPacket::decode(&mut frame)?),
            PacketType::Subscribe => Subscribe(SubscribePacket::decode(&mut frame)?),
            PacketType::SubAck => SubAck(SubAckPacket::decode(&mut frame)?),
            PacketType::PingReq => PingReq(PingReqPacket::decode(&mut frame)?),
            PacketType::PingResp => PingResp(PingRespPacket::decode(&mut frame)?),
            PacketType::Disconnect => Disconnect(DisconnectPacket::decode(&mut frame)?),
            other => return Err(Error::UnsupportedPacket(other as u8)),
        };

        Ok(packet)
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            ControlPacket::Connect(_) => PacketType::Connect,
            ControlPacket::ConnAck(_) => PacketType::ConnAck,
            ControlPacket::Publish(_) => PacketType::Publish,
            ControlPacket::Subscribe(_) => PacketType::Subscribe,
            ControlPacket::SubAck(_) => PacketType::SubAck,
            ControlPacket::PingReq(_) => PacketType::PingReq,
            ControlPacket::PingResp(_) => PacketType::PingResp,
            ControlPacket::Disconnect(_) => PacketType::Disconnect,
        }
    }
}

impl Encoder for ControlPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        use ControlPacket::*;

        match self {
            Connect(p) => p.encode(buffer),
            ConnAck(p) => p.encode(buffer),
            Publish(p) => p.encode(buffer),
            Subscribe(p) => p.encode(buffer),
            SubAck(p) => p.encode(buffer),
            PingReq(p) => p.encode(buffer),
            PingResp(p) => p.encode(buffer),
            Disconnect(p) => p.encode(buffer),
        }
    }
}
