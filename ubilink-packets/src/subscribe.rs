use std::mem;

use bytes::{Buf, BufMut, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder},
    error::Error,
    qos::QoS,
};

use crate::{decode_fixed_header, encode_fixed_header};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribePayload {
    pub topic_filter: String,
    pub qos: QoS,
}

impl Encoder for SubscribePayload {
    fn encode(&self, buffer: &mut BytesMut) {
        self.topic_filter.encode(buffer);
        buffer.put_u8(self.qos as u8);
    }

    fn encoded_size(&self) -> usize {
        self.topic_filter.encoded_size() + mem::size_of::<u8>()
    }
}

impl Decoder for SubscribePayload {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let topic_filter = String::decode(buffer)?;
        let options = u8::decode(buffer)?;

        if (options & 0b1111_1100) != 0 {
            return Err(Error::MalformedPacket("reserved subscription option bits set"));
        }

        let qos: QoS = options.into();
        if !qos.is_valid() {
            return Err(Error::MalformedPacket("subscription qos 3 is reserved"));
        }

        Ok(SubscribePayload { topic_filter, qos })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub payload: Vec<SubscribePayload>,
}

const PACKET_TYPE: u8 = 0x08;

impl Encoder for SubscribePacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut remaining_len = 0;

        remaining_len += self.packet_id.encoded_size();
        remaining_len += self.payload.encoded_size();

        // SUBSCRIBE carries the mandatory 0b0010 flags in its fixed header.
        encode_fixed_header((PACKET_TYPE << 4) | 0b0000_0010, remaining_len, buffer);

        self.packet_id.encode(buffer);
        self.payload.encode(buffer);
    }
}

impl Decoder for SubscribePacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let (header, remaining_len) = decode_fixed_header(buffer)?;

        if (header & 0b0000_1111) != 0b0000_0010 {
            return Err(Error::MalformedPacket("invalid subscribe header flags"));
        }

        let next_packet = buffer.remaining() - remaining_len;
        let packet_id = u16::decode(buffer)?;

        let mut payload = Vec::new();

        while buffer.remaining() > next_packet {
            payload.push(SubscribePayload::decode(buffer)?);
        }

        if payload.is_empty() {
            return Err(Error::MalformedPacket("subscribe without topic filters"));
        }

        Ok(SubscribePacket { packet_id, payload })
    }
}
