use bytes::{Buf, BufMut, Bytes, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder},
    error::Error,
    qos::QoS,
};

use crate::{decode_fixed_header, encode_fixed_header};

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos_level: QoS,
    pub retain: bool,
    pub topic_name: String,
    /// Present only when `qos_level` is above QoS 0.
    pub packet_id: Option<u16>,
    pub payload: Bytes,
}

const PACKET_TYPE: u8 = 0x03;

impl PublishPacket {
    fn fixed_header(&self) -> u8 {
        let mut header = PACKET_TYPE << 4;

        if self.dup {
            header |= 0b0000_1000;
        }

        header |= (self.qos_level as u8 & 0b0000_0011) << 1;

        if self.retain {
            header |= 0b0000_0001;
        }

        header
    }
}

impl Encoder for PublishPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut remaining_len = 0;

        remaining_len += self.topic_name.encoded_size();
        remaining_len += self.packet_id.encoded_size();
        remaining_len += self.payload.len();

        encode_fixed_header(self.fixed_header(), remaining_len, buffer);

        self.topic_name.encode(buffer);
        self.packet_id.encode(buffer);
        buffer.put_slice(&self.payload);
    }
}

impl Decoder for PublishPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let (header, remaining_len) = decode_fixed_header(buffer)?;
        let body_start = buffer.remaining();

        let dup = (header & 0b0000_1000) != 0;
        let qos_level: QoS = ((header & 0b0000_0110) >> 1).into();
        let retain = (header & 0b0000_0001) != 0;

        if !qos_level.is_valid() {
            return Err(Error::MalformedPacket("publish qos 3 is reserved"));
        }

        let topic_name = String::decode(buffer)?;
        let packet_id = match qos_level {
            QoS::AtMostOnce => None,
            _ => Some(u16::decode(buffer)?),
        };

        let consumed = body_start - buffer.remaining();
        if consumed > remaining_len {
            return Err(Error::MalformedPacket("publish header runs past the packet"));
        }

        let payload = buffer.copy_to_bytes(remaining_len - consumed);

        Ok(PublishPacket {
            dup,
            qos_level,
            retain,
            topic_name,
            packet_id,
            payload,
        })
    }
}
