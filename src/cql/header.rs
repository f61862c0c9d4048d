use bitflags::bitflags;
use bytes::{BufMut, BytesMut};

/// Protocol version spoken on every outgoing frame.
pub const PROTOCOL_VERSION: u8 = 0x04;

const PROTOCOL_VERSION_MASK: u8 = 0x7F;
const MESSAGE_DIRECTION_MASK: u8 = 0x80;

bitflags! {
    /// Frame header flag bits. Only WARNING is acted upon; the others are
    /// recognized but never set by this client.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        const COMPRESSION    = 0x01;
        const TRACING        = 0x02;
        const CUSTOM_PAYLOAD = 0x04;
        const WARNING        = 0x08;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Request,
    Response,
}

/// The fixed 9-byte frame header:
/// `<byte version><byte flags><u16 stream><byte opcode><i32 length>`.
#[derive(Debug, Clone)]
pub struct Header {
    version: u8,
    pub flags: FrameFlags,
    pub stream_id: u16,
    pub op_code: u8,
    pub body_length: i32,
}

impl Header {
    pub fn new(
        direction: MessageDirection,
        stream_id: u16,
        op_code: u8,
        body_length: i32,
    ) -> Header {
        let version = match direction {
            MessageDirection::Request => PROTOCOL_VERSION,
            MessageDirection::Response => PROTOCOL_VERSION | MESSAGE_DIRECTION_MASK,
        };

        Header {
            version,
            flags: FrameFlags::empty(),
            stream_id,
            op_code,
            body_length,
        }
    }

    pub fn protocol_version(&self) -> u8 {
        self.version & PROTOCOL_VERSION_MASK
    }

    pub fn direction(&self) -> MessageDirection {
        if self.version & MESSAGE_DIRECTION_MASK == 0 {
            MessageDirection::Request
        } else {
            MessageDirection::Response
        }
    }

    pub fn from_bytes(src: &[u8]) -> Header {
        Header {
            version: src[0],
            flags: FrameFlags::from_bits_truncate(src[1]),
            stream_id: u16::from_be_bytes([src[2], src[3]]),
            op_code: src[4],
            body_length: i32::from_be_bytes([src[5], src[6], src[7], src[8]]),
        }
    }

    pub fn to_bytes(&self, dst: &mut BytesMut) {
        dst.put_u8(self.version);
        dst.put_u8(self.flags.bits());
        dst.put_u16(self.stream_id);
        dst.put_u8(self.op_code);
        dst.put_i32(self.body_length);
    }
}
