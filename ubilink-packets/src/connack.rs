use std::mem;

use bytes::{Buf, BufMut, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder},
    error::Error,
    return_code::ConnectReturnCode,
};

use crate::{decode_fixed_header, encode_fixed_header};

#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub struct ConnAckFlags {
    pub session_present: bool,
}

impl Encoder for ConnAckFlags {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(self.session_present as u8);
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u8>()
    }
}

impl Decoder for ConnAckFlags {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let encoded = u8::decode(buffer)?;

        if (0b1111_1110 & encoded) != 0 {
            return Err(Error::MalformedPacket("reserved connack flags set"));
        }

        Ok(ConnAckFlags {
            session_present: (0b0000_0001 & encoded) != 0,
        })
    }
}

#[derive(Default, Debug, Eq, PartialEq, Clone, Copy)]
pub struct ConnAckPacket {
    pub flags: ConnAckFlags,
    pub return_code: ConnectReturnCode,
}

const PACKET_TYPE: u8 = 0x02;

impl Encoder for ConnAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let remaining_len = self.flags.encoded_size() + mem::size_of::<u8>();

        encode_fixed_header(PACKET_TYPE << 4, remaining_len, buffer);

        self.flags.encode(buffer);
        buffer.put_u8(self.return_code.as_u8());
    }
}

impl Decoder for ConnAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let (_, remaining_len) = decode_fixed_header(buffer)?;

        if remaining_len != 2 {
            return Err(Error::MalformedPacket("connack remaining length must be 2"));
        }

        let flags = ConnAckFlags::decode(buffer)?;
        let return_code = u8::decode(buffer)?.into();

        Ok(ConnAckPacket { flags, return_code })
    }
}
