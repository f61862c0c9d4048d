use crate::cql::header::{FrameFlags, Header, MessageDirection};
use crate::cql::opcode::Opcode;
use crate::error::CqlError;
use crate::serde::reader::{int, short, string};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// An outgoing frame. Clients send requests on stream 0 (synchronous calls)
/// or stream 1 (pipelined EXECUTEs); tests use the response direction to play
/// the server side of an exchange.
#[derive(Debug, Clone)]
pub struct Request {
    pub opcode: Opcode,
    pub stream_id: u16,
    pub direction: MessageDirection,
    pub body: Bytes,
}

impl Request {
    pub fn new(opcode: Opcode, body: Bytes) -> Request {
        Request {
            opcode,
            stream_id: 0,
            direction: MessageDirection::Request,
            body,
        }
    }

    pub fn with_stream(opcode: Opcode, body: Bytes, stream_id: u16) -> Request {
        Request {
            stream_id,
            ..Request::new(opcode, body)
        }
    }

    pub fn response(opcode: Opcode, body: Bytes) -> Request {
        Request {
            direction: MessageDirection::Response,
            ..Request::new(opcode, body)
        }
    }
}

/// A decoded incoming frame. Warnings have already been stripped from the
/// front of the body; `raw` keeps the full header+body image for diagnostics.
#[derive(Debug, Clone)]
pub struct Frame {
    pub opcode: Opcode,
    pub stream_id: u16,
    pub body: Bytes,
    pub warnings: Vec<String>,
    pub raw: Bytes,
}

impl Frame {
    /// Decodes this frame's body as an ERROR payload:
    /// `<int code><string message>`. A truncated body degrades to the
    /// protocol error instead.
    pub(crate) fn server_error(&self) -> CqlError {
        fn parse(mut body: Bytes) -> crate::error::Result<(u32, String)> {
            let code = int!(body) as u32;
            let message = string!(body);
            Ok((code, message))
        }

        match parse(self.body.clone()) {
            Ok((code, message)) => CqlError::Server { code, message },
            Err(err) => err,
        }
    }
}

pub struct FrameCodec {}

impl FrameCodec {
    pub fn new() -> Self {
        FrameCodec {}
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new()
    }
}

impl Encoder<Request> for FrameCodec {
    type Error = CqlError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        tracing::trace!(opcode = ?item.opcode, stream = item.stream_id, "encoding frame");

        let header = Header::new(
            item.direction,
            item.stream_id,
            item.opcode.op_code(),
            item.body.len() as i32,
        );

        dst.reserve(9 + item.body.len());
        header.to_bytes(dst);
        dst.extend_from_slice(&item.body);

        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CqlError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 9 {
            return Ok(None);
        }

        let declared = i32::from_be_bytes([src[5], src[6], src[7], src[8]]);
        if declared < 0 {
            return Err(CqlError::Protocol(format!(
                "negative frame body length {declared}"
            )));
        }

        let body_length = declared as usize;
        if src.len() < 9 + body_length {
            src.reserve(9 + body_length - src.len());
            return Ok(None);
        }

        let raw = Bytes::copy_from_slice(&src[..9 + body_length]);
        let header = Header::from_bytes(&src.split_to(9));
        let mut body = src.split_to(body_length).freeze();

        let opcode = Opcode::from_op_code(header.op_code)?;
        tracing::trace!(?opcode, stream = header.stream_id, "decoding frame");

        let mut warnings = Vec::new();
        if header.flags.contains(FrameFlags::WARNING) {
            let count = short!(body);
            for _ in 0..count {
                let warning = string!(body);
                tracing::warn!(%warning, "server warning");
                warnings.push(warning);
            }
        }

        Ok(Some(Frame {
            opcode,
            stream_id: header.stream_id,
            body,
            warnings,
            raw,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn response_bytes(opcode: Opcode, flags: u8, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(0x84);
        buf.put_u8(flags);
        buf.put_u16(0);
        buf.put_u8(opcode.op_code());
        buf.put_i32(body.len() as i32);
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn encodes_header_and_body() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();
        codec
            .encode(
                Request::new(Opcode::Options, Bytes::new()),
                &mut dst,
            )
            .unwrap();
        assert_eq!(&dst[..], &[0x04, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn waits_for_a_complete_frame() {
        let mut codec = FrameCodec::new();
        let mut src = response_bytes(Opcode::Ready, 0, &[0xAA, 0xBB]);

        let mut partial = BytesMut::from(&src[..5]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut partial = BytesMut::from(&src[..10]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Ready);
        assert_eq!(&frame.body[..], &[0xAA, 0xBB]);
        assert_eq!(frame.raw.len(), 11);
    }

    #[test]
    fn strips_warnings_from_the_body() {
        let mut body = BytesMut::new();
        body.put_u16(1);
        body.put_u16(8);
        body.extend_from_slice(b"too slow");
        body.put_i32(0x0001); // RESULT kind Void

        let mut src = response_bytes(Opcode::Result, 0x08, &body);
        let frame = FrameCodec::new().decode(&mut src).unwrap().unwrap();

        assert_eq!(frame.warnings, vec!["too slow".to_string()]);
        assert_eq!(&frame.body[..], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn error_frames_carry_code_and_message() {
        let mut body = BytesMut::new();
        body.put_u32(0x1200);
        body.put_u16(12);
        body.extend_from_slice(b"syntax error");

        let mut src = response_bytes(Opcode::Error, 0, &body);
        let frame = FrameCodec::new().decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Error);
        // The raw image survives for diagnostics.
        assert_eq!(frame.raw.len(), 9 + 18);

        match frame.server_error() {
            CqlError::Server { code, message } => {
                assert_eq!(code, 0x1200);
                assert_eq!(message, "syntax error");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn warnings_on_error_frames_survive_decoding() {
        let mut body = BytesMut::new();
        body.put_u16(1);
        body.put_u16(4);
        body.extend_from_slice(b"slow");
        body.put_u32(0x1001);
        body.put_u16(10);
        body.extend_from_slice(b"overloaded");

        let mut src = response_bytes(Opcode::Error, 0x08, &body);
        let frame = FrameCodec::new().decode(&mut src).unwrap().unwrap();

        assert_eq!(frame.warnings, vec!["slow".to_string()]);
        assert!(matches!(
            frame.server_error(),
            CqlError::Server { code: 0x1001, .. }
        ));
    }

    #[test]
    fn unknown_opcode_is_a_protocol_error() {
        let mut src = response_bytes(Opcode::Ready, 0, &[]);
        src[4] = 0x7E;
        assert!(matches!(
            FrameCodec::new().decode(&mut src),
            Err(CqlError::Protocol(_))
        ));
    }
}
