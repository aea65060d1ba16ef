use bytes::{Buf, BufMut, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder},
    error::Error,
    return_code::SubscribeReturnCode,
};

use crate::{decode_fixed_header, encode_fixed_header};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubAckPacket {
    pub packet_id: u16,
    /// One entry per topic filter of the acknowledged SUBSCRIBE, in order.
    pub return_codes: Vec<SubscribeReturnCode>,
}

const PACKET_TYPE: u8 = 0x09;

impl Encoder for SubAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let remaining_len = self.packet_id.encoded_size() + self.return_codes.len();

        encode_fixed_header(PACKET_TYPE << 4, remaining_len, buffer);

        self.packet_id.encode(buffer);
        for code in &self.return_codes {
            buffer.put_u8(code.as_u8());
        }
    }
}

impl Decoder for SubAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let (_, remaining_len) = decode_fixed_header(buffer)?;

        if remaining_len < 3 {
            return Err(Error::MalformedPacket("suback without return codes"));
        }

        let next_packet = buffer.remaining() - remaining_len;
        let packet_id = u16::decode(buffer)?;

        let mut return_codes = Vec::new();

        while buffer.remaining() > next_packet {
            return_codes.push(u8::decode(buffer)?.into());
        }

        Ok(SubAckPacket {
            packet_id,
            return_codes,
        })
    }
}
