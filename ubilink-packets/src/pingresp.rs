use bytes::{Buf, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder},
    error::Error,
};

use crate::{decode_fixed_header, encode_fixed_header};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct PingRespPacket {}

const PACKET_TYPE: u8 = 0x0d;

impl Encoder for PingRespPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        encode_fixed_header(PACKET_TYPE << 4, 0, buffer);
    }
}

impl Decoder for PingRespPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let (_, remaining_len) = decode_fixed_header(buffer)?;

        if remaining_len != 0 {
            return Err(Error::MalformedPacket("pingresp must not carry a body"));
        }

        Ok(Self {})
    }
}
