use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use ubilink_core::{
    codec::{Decoder, Encoder},
    error::Error,
    protocol::ProtocolVersion,
};

use crate::{decode_fixed_header, encode_fixed_header};

#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub struct ConnectFlags {
    pub user_name: bool,
    pub password: bool,
    pub clean_session: bool,
}

impl Encoder for ConnectFlags {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut flags: u8 = 0;

        if self.user_name {
            flags = 0b1000_0000;
        }

        if self.password {
            flags |= 0b0100_0000;
        }

        if self.clean_session {
            flags |= 0b0000_0010;
        }

        buffer.put_u8(flags);
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u8>()
    }
}

impl Decoder for ConnectFlags {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let byte = u8::decode(buffer)?;

        if (byte & 0b0000_0001) != 0 {
            return Err(Error::MalformedPacket("reserved connect flag set"));
        }

        if (byte & 0b0011_1100) != 0 {
            return Err(Error::MalformedPacket("will messages are not supported"));
        }

        Ok(ConnectFlags {
            user_name: (byte & 0b1000_0000) != 0,
            password: (byte & 0b0100_0000) != 0,
            clean_session: (byte & 0b0000_0010) != 0,
        })
    }
}

#[derive(Default, Debug, Eq, PartialEq, Clone)]
pub struct ConnectPayload {
    pub client_id: String,
    pub user_name: Option<String>,
    pub password: Option<Bytes>,
}

impl Encoder for ConnectPayload {
    fn encode(&self, buffer: &mut BytesMut) {
        self.client_id.encode(buffer);
        self.user_name.encode(buffer);
        self.password.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let mut len = 0;

        len += self.client_id.encoded_size();
        len += self.user_name.encoded_size();
        len += self.password.encoded_size();

        len
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConnectPacket {
    pub protocol_version: ProtocolVersion,
    pub flags: ConnectFlags,
    pub keepalive: u16,
    pub payload: ConnectPayload,
}

impl ConnectPacket {
    /// Build a packet whose flags agree with the credentials present in the payload.
    pub fn new(
        protocol_version: ProtocolVersion,
        keepalive: u16,
        clean_session: bool,
        payload: ConnectPayload,
    ) -> Self {
        let flags = ConnectFlags {
            user_name: payload.user_name.is_some(),
            password: payload.password.is_some(),
            clean_session,
        };

        ConnectPacket {
            protocol_version,
            flags,
            keepalive,
            payload,
        }
    }
}

const PACKET_TYPE: u8 = 0x01;

impl Encoder for ConnectPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let protocol_name = self.protocol_version.protocol_name();
        let protocol_level = self.protocol_version.protocol_level();

        let mut remaining_len = 0;

        remaining_len += protocol_name.encoded_size();
        remaining_len += protocol_level.encoded_size();
        remaining_len += self.flags.encoded_size();
        remaining_len += self.keepalive.encoded_size();
        remaining_len += self.payload.encoded_size();

        encode_fixed_header(PACKET_TYPE << 4, remaining_len, buffer);

        protocol_name.encode(buffer);
        protocol_level.encode(buffer);
        self.flags.encode(buffer);
        self.keepalive.encode(buffer);
        self.payload.encode(buffer);
    }
}

impl Decoder for ConnectPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        decode_fixed_header(buffer)?;

        let protocol_name = String::decode(buffer)?;
        let protocol_level = u8::decode(buffer)?;
        let protocol_version = ProtocolVersion::from_name_and_level(&protocol_name, protocol_level)
            .ok_or(Error::MalformedPacket("unsupported protocol name or level"))?;

        let flags = ConnectFlags::decode(buffer)?;
        let keepalive = u16::decode(buffer)?;

        let client_id = String::decode(buffer)?;
        let user_name = if flags.user_name {
            Some(String::decode(buffer)?)
        } else {
            None
        };
        let password = if flags.password {
            Some(Bytes::decode(buffer)?)
        } else {
            None
        };

        Ok(ConnectPacket {
            protocol_version,
            flags,
            keepalive,
            payload: ConnectPayload {
                client_id,
                user_name,
                password,
            },
        })
    }
}
