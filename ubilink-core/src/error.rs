use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Packet is not complete")]
    PacketIncomplete,

    #[error("Malformed packet: {0}")]
    MalformedPacket(&'static str),

    #[error("Unsupported packet type: {0:#04x}")]
    UnsupportedPacket(u8),
}
