//! Readers for the protocol's primitive notations. Each macro pops its value
//! from the front of a `Bytes`/`BytesMut` buffer and bails out of the calling
//! function with a protocol error when the buffer is too short. Callers must
//! return `crate::error::Result` and have `bytes::Buf` in scope.

macro_rules! short {
    ($src:expr) => {{
        if $src.remaining() < 2 {
            return Err($crate::error::CqlError::protocol("truncated [short]"));
        }
        $src.get_u16()
    }};
}

macro_rules! int {
    ($src:expr) => {{
        if $src.remaining() < 4 {
            return Err($crate::error::CqlError::protocol("truncated [int]"));
        }
        $src.get_i32()
    }};
}

pub(crate) use int;
pub(crate) use short;

macro_rules! string {
    ($src:expr) => {{
        let length = short!($src) as usize;
        if $src.remaining() < length {
            return Err($crate::error::CqlError::protocol("truncated [string]"));
        }
        String::from_utf8_lossy(&$src.copy_to_bytes(length)).to_string()
    }};
}

/// `[short bytes]`: same length prefix as `[string]`, but the content stays
/// binary (prepared statement ids are not UTF-8).
macro_rules! short_bytes {
    ($src:expr) => {{
        let length = short!($src) as usize;
        if $src.remaining() < length {
            return Err($crate::error::CqlError::protocol("truncated [short bytes]"));
        }
        $src.copy_to_bytes(length)
    }};
}

/// `[bytes]`: i32 length, where -1 (0xFFFFFFFF) is the null sentinel. A null
/// is distinct from a zero-length value.
macro_rules! bytes {
    ($src:expr) => {{
        let length = int!($src);
        if length < 0 {
            None
        } else {
            if $src.remaining() < length as usize {
                return Err($crate::error::CqlError::protocol("truncated [bytes]"));
            }
            Some($src.copy_to_bytes(length as usize))
        }
    }};
}

pub(crate) use bytes;
pub(crate) use short_bytes;
pub(crate) use string;

#[cfg(test)]
mod tests {
    use crate::error::Result;
    use bytes::{Buf, Bytes};

    #[test]
    fn pops_fixed_width_values() {
        fn read(mut src: Bytes) -> Result<(u16, i32)> {
            Ok((short!(src), int!(src)))
        }
        let src = Bytes::from_static(&[0x00, 0x2A, 0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(read(src).unwrap(), (42, -2));
    }

    #[test]
    fn pops_strings() {
        fn read(mut src: Bytes) -> Result<String> {
            Ok(string!(src))
        }
        let src = Bytes::from_static(b"\x00\x05hello");
        assert_eq!(read(src).unwrap(), "hello");
    }

    #[test]
    fn null_bytes_sentinel_is_not_empty() {
        fn read(mut src: Bytes) -> Result<Option<Bytes>> {
            Ok(bytes!(src))
        }
        assert_eq!(read(Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF])).unwrap(), None);
        assert_eq!(
            read(Bytes::from_static(&[0x00, 0x00, 0x00, 0x00])).unwrap(),
            Some(Bytes::new())
        );
    }

    #[test]
    fn truncated_input_is_an_error() {
        fn read(mut src: Bytes) -> Result<i32> {
            Ok(int!(src))
        }
        assert!(read(Bytes::from_static(&[0x01, 0x02])).is_err());
    }
}
